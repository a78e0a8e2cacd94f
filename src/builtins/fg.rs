use std::io::Write;

use nix::unistd::Pid;

use crate::builtins::{self, BuiltinCommand};
use crate::errors::{Error, Result};
use crate::shell::Shell;

pub struct Fg;

impl BuiltinCommand for Fg {
    const NAME: &'static str = builtins::FG_NAME;

    const HELP: &'static str = "\
fg: fg <pid | %pid>
    Move the background job with the given process ID to the foreground
    and wait for it. A stopped job is resumed first.";

    fn run(shell: &mut Shell, args: Vec<String>, _stdout: &mut dyn Write) -> Result<()> {
        let arg = args
            .first()
            .ok_or_else(|| Error::builtin_command(Self::usage(), 2))?;

        let digits = arg.trim_start_matches('%');
        let pid = digits.parse::<i32>().map_err(|_| {
            Error::builtin_command(format!("fg: {}: arguments must be process IDs", arg), 1)
        })?;

        shell.put_job_in_foreground(Pid::from_raw(pid))?;
        Ok(())
    }
}
