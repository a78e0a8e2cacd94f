use std::io::Write;

use crate::builtins::{self, BuiltinCommand};
use crate::errors::Result;
use crate::shell::Shell;

pub struct TerminateBackground;

impl BuiltinCommand for TerminateBackground {
    const NAME: &'static str = builtins::TERMINATE_BG_NAME;

    const HELP: &'static str = "\
terminate_bg: terminate_bg
    Kill every background job and collect each one before returning.
    Foreground processes are unaffected.";

    fn run(shell: &mut Shell, _args: Vec<String>, _stdout: &mut dyn Write) -> Result<()> {
        shell.kill_background_jobs()
    }
}
