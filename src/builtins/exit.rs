use std::io::Write;
use std::process::ExitStatus;

use crate::builtins::{self, BuiltinCommand};
use crate::errors::{Error, Result};
use crate::shell::Shell;
use crate::util::ShellExitStatusExt;

pub struct Exit;

impl BuiltinCommand for Exit {
    const NAME: &'static str = builtins::EXIT_NAME;

    const HELP: &'static str = "\
exit: exit [n]
    Exit the shell with a status of N. Refuses to exit while background
    jobs remain. If N is omitted, the exit status is that of the last
    command executed.";

    fn run(shell: &mut Shell, args: Vec<String>, _stdout: &mut dyn Write) -> Result<()> {
        if shell.has_background_jobs() {
            return Err(Error::builtin_command(
                "exit: there are background jobs running",
                1,
            ));
        }
        let status_code = args
            .get(0)
            .map(|arg| {
                arg.parse::<i32>().unwrap_or_else(|_| {
                    eprintln!("msh: exit: {}: numeric argument required", arg);
                    2
                })
            })
            .map(ExitStatus::from_status);
        shell.exit(status_code);
    }
}
