use std::io::Write;

use failure::ResultExt;

use crate::builtins::{self, BuiltinCommand};
use crate::errors::{Error, ErrorKind, Result};
use crate::shell::Shell;

pub struct History;

impl BuiltinCommand for History {
    const NAME: &'static str = builtins::HISTORY_NAME;

    const HELP: &'static str = "\
history: history [-i n]
    Display the history list, most recent entry first at index 0. With
    `-i n', re-run the stored entry at index N as if freshly typed.";

    fn run(shell: &mut Shell, args: Vec<String>, stdout: &mut dyn Write) -> Result<()> {
        match args.first().map(String::as_str) {
            None => {
                write!(stdout, "{}", shell.history()).context(ErrorKind::Io)?;
                Ok(())
            }
            Some("-i") => {
                let arg = args
                    .get(1)
                    .ok_or_else(|| Error::builtin_command(Self::usage(), 2))?;
                let index = arg.parse::<usize>().map_err(|_| {
                    Error::builtin_command(
                        format!("history: {}: nonnegative numeric argument required", arg),
                        1,
                    )
                })?;
                shell.replay_history(index)
            }
            Some(arg) => Err(Error::builtin_command(
                format!("history: {}: unknown option", arg),
                2,
            )),
        }
    }
}
