use std::io::Write;

use failure::ResultExt;

use crate::builtins::{self, BuiltinCommand};
use crate::errors::{ErrorKind, Result};
use crate::shell::Shell;

pub struct Jobs;

impl BuiltinCommand for Jobs {
    const NAME: &'static str = builtins::JOBS_NAME;

    const HELP: &'static str = "\
jobs: jobs
    List the background jobs the shell is tracking, one per line with
    pid, state and the original command line.";

    fn run(shell: &mut Shell, _args: Vec<String>, stdout: &mut dyn Write) -> Result<()> {
        for job in shell.jobs() {
            writeln!(stdout, "{}", job).context(ErrorKind::Io)?;
        }
        Ok(())
    }
}
