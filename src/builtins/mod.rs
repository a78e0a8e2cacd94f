//! Msh builtins
//!
//! This module includes the implementations of the shell builtin commands.
//! Builtins are dispatched by the first token of a non-pipeline command and
//! never reach the executor. They run inside the shell process and write to
//! the shell's own standard output; a redirect on a builtin line is parsed
//! but not applied.

use std::io;
use std::io::Write;

use crate::errors::{ErrorKind, Result};
use crate::parse::SimpleCommand;
use crate::shell::Shell;

use self::exit::Exit;
use self::fg::Fg;
use self::history::History;
use self::jobs::Jobs;
use self::terminate::TerminateBackground;

mod exit;
mod fg;
mod history;
mod jobs;
mod terminate;

pub const EXIT_NAME: &str = "exit";
pub const FG_NAME: &str = "fg";
pub const HISTORY_NAME: &str = "history";
pub const JOBS_NAME: &str = "jobs";
pub const TERMINATE_BG_NAME: &str = "terminate_bg";

/// Represents a msh builtin command such as fg or history.
pub trait BuiltinCommand {
    /// The NAME of the command.
    const NAME: &'static str;
    /// The help string to display to the user.
    const HELP: &'static str;
    /// The usage string to display to the user.
    fn usage() -> String {
        Self::HELP.lines().nth(0).unwrap_or(Self::NAME).to_owned()
    }
    /// Runs the command with the given arguments in the `shell` environment.
    fn run(shell: &mut Shell, args: Vec<String>, stdout: &mut dyn Write) -> Result<()>;
}

pub fn is_builtin<T: AsRef<str>>(program: T) -> bool {
    [
        EXIT_NAME,
        FG_NAME,
        HISTORY_NAME,
        JOBS_NAME,
        TERMINATE_BG_NAME,
    ]
    .contains(&program.as_ref())
}

/// precondition: command is a builtin.
/// Returns (`exit_status_code`, `builtin_result`)
pub fn run(shell: &mut Shell, command: &SimpleCommand) -> (i32, Result<()>) {
    assert!(is_builtin(&command.program));
    let args = command.args.clone();
    let mut stdout = io::stdout();
    let result = match command.program.as_str() {
        EXIT_NAME => Exit::run(shell, args, &mut stdout),
        FG_NAME => Fg::run(shell, args, &mut stdout),
        HISTORY_NAME => History::run(shell, args, &mut stdout),
        JOBS_NAME => Jobs::run(shell, args, &mut stdout),
        TERMINATE_BG_NAME => TerminateBackground::run(shell, args, &mut stdout),
        _ => unreachable!(),
    };

    let exit_status = get_builtin_exit_status(&result);
    (exit_status, result)
}

fn get_builtin_exit_status(result: &Result<()>) -> i32 {
    if let Err(ref e) = *result {
        match *e.kind() {
            ErrorKind::BuiltinCommand { code, .. } => code,
            _ => 1,
        }
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names() {
        assert!(is_builtin("exit"));
        assert!(is_builtin("fg"));
        assert!(is_builtin("history"));
        assert!(is_builtin("jobs"));
        assert!(is_builtin("terminate_bg"));
        assert!(!is_builtin("ls"));
        assert!(!is_builtin("historyx"));
    }
}
