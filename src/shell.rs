//! Msh - Shell module
//!
//! The Shell itself is responsible for the read/dispatch loop, for managing
//! background jobs and for maintaining the command history ring.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{self, ExitStatus};

use failure::ResultExt;
use nix::unistd::Pid;

use crate::builtins;
use crate::errors::{Error, ErrorKind, Result};
use crate::execute_command;
use crate::history::HistoryRing;
use crate::jobs::{self, Job, JobManager};
use crate::parse::{self, Command, ParsedJob};
use crate::util::ShellExitStatusExt;

const PROMPT: &str = "msh: ";

/// Longest input line accepted at the prompt, in bytes.
pub const MAX_LINE_LEN: usize = 128;

const SYNTAX_ERROR_EXIT_STATUS: i32 = 2;
const COMMAND_NOT_FOUND_EXIT_STATUS: i32 = 127;

/// Msh Shell
#[derive(Debug)]
pub struct Shell {
    history: HistoryRing,
    job_manager: JobManager,
    /// Exit status of last command executed.
    last_exit_status: ExitStatus,
    config: ShellConfig,
}

impl Shell {
    /// Constructs a new Shell to manage running jobs and command history.
    pub fn new(config: ShellConfig) -> Result<Shell> {
        if config.enable_job_control {
            jobs::initialize_job_control()?;
        }

        info!("msh started up");
        Ok(Shell {
            history: HistoryRing::with_capacity(config.command_history_capacity),
            job_manager: Default::default(),
            last_exit_status: ExitStatus::from_success(),
            config,
        })
    }

    /// Runs jobs from stdin until EOF is received.
    pub fn execute_from_stdin(&mut self) {
        loop {
            if self.config.enable_job_control {
                // Collect background jobs that exited, removing them from
                // the table.
                self.job_manager.reap();
            }

            let input = match self.prompt() {
                Ok(Some(line)) => line.trim().to_owned(),
                Ok(None) => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // The only fatal error: stdin is gone for good.
                    eprintln!("msh: error reading input: {}", e);
                    error!("fatal read error: {}", e);
                    process::exit(ExitStatus::from_failure().code().unwrap_or(1));
                }
            };

            if input.len() > MAX_LINE_LEN {
                eprintln!("msh: input line too long (max {} bytes)", MAX_LINE_LEN);
                continue;
            }

            let temp_result = self.execute_command_string(&input);
            log_if_err!(temp_result, "execute_command_string");
        }
    }

    /// Prints the prompt and reads one line.
    /// Returns `Ok(None)` when end of input is reached.
    fn prompt(&mut self) -> io::Result<Option<String>> {
        if self.config.display_messages {
            print!("{}", PROMPT);
            io::stdout().flush()?;
        }

        let mut line = String::new();
        let bytes_read = io::stdin().read_line(&mut line)?;
        if bytes_read == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Runs a job from a command string.
    pub fn execute_command_string(&mut self, input: &str) -> Result<()> {
        let job = match ParsedJob::parse(input) {
            Ok(Some(job)) => job,
            Ok(None) => return Ok(()),
            Err(e) => {
                if let ErrorKind::Syntax(ref line) = *e.kind() {
                    eprintln!("msh: syntax error near: {}", line);
                    self.last_exit_status = ExitStatus::from_status(SYNTAX_ERROR_EXIT_STATUS);
                    return Ok(());
                }
                return Err(e);
            }
        };

        // Replay invocations are dispatched but never recorded, so a stored
        // line can never itself be a replay trigger.
        if self.config.enable_command_history && !is_replay_invocation(&job.input) {
            self.history.record(&job.input);
        }

        self.dispatch(&job)
    }

    /// Runs a msh script from a file.
    pub fn execute_commands_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut f = File::open(path).context(ErrorKind::Io)?;
        let mut buffer = String::new();
        f.read_to_string(&mut buffer).context(ErrorKind::Io)?;

        for line in buffer.split('\n') {
            self.execute_command_string(line)?
        }

        Ok(())
    }

    /// Runs one parsed job, either as a builtin or as external processes.
    fn dispatch(&mut self, job: &ParsedJob) -> Result<()> {
        if let Command::Simple(ref command) = job.command {
            if builtins::is_builtin(&command.program) {
                let (status_code, result) = builtins::run(self, command);
                self.last_exit_status = ExitStatus::from_status(status_code);
                if let Err(e) = result {
                    eprintln!("msh: {}", e);
                }
                return Ok(());
            }
        }

        match execute_command::run_job(&mut self.job_manager, job) {
            Ok(Some(status)) => {
                self.last_exit_status = status;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => match e.kind().clone() {
                ErrorKind::CommandNotFound(command) => {
                    eprintln!("msh: {}: command not found", command);
                    self.last_exit_status =
                        ExitStatus::from_status(COMMAND_NOT_FOUND_EXIT_STATUS);
                    Ok(())
                }
                ErrorKind::JobTableFull(..) | ErrorKind::Io => {
                    eprintln!("msh: {}", e);
                    self.last_exit_status = ExitStatus::from_failure();
                    Ok(())
                }
                _ => Err(e),
            },
        }
    }

    /// Returns `true` if the shell has background jobs.
    pub fn has_background_jobs(&self) -> bool {
        self.job_manager.has_jobs()
    }

    /// Returns the shell's background jobs (running and stopped).
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.job_manager.jobs()
    }

    /// The command history ring.
    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    /// Promotes the background job with `pid` to the foreground and blocks
    /// until it terminates or stops again.
    pub fn put_job_in_foreground(&mut self, pid: Pid) -> Result<ExitStatus> {
        let status = self.job_manager.put_job_in_foreground(pid)?;
        self.last_exit_status = status;
        Ok(status)
    }

    /// Kills every background job, collecting each before returning.
    pub fn kill_background_jobs(&mut self) -> Result<()> {
        self.job_manager.kill_all_jobs()
    }

    /// Re-feeds the stored line at `index` through the full dispatch path,
    /// exactly as if freshly typed.
    ///
    /// A stored line that is itself a replay invocation is rejected rather
    /// than recursed into.
    pub fn replay_history(&mut self, index: usize) -> Result<()> {
        let line = self
            .history
            .at(index)
            .ok_or_else(|| Error::no_such_history_entry(index))?
            .to_owned();

        if is_replay_invocation(&line) {
            return Err(Error::builtin_command(
                "history: refusing to replay a history replay",
                1,
            ));
        }

        self.execute_command_string(&line)
    }

    /// Exit the shell.
    ///
    /// Valid exit codes are between 0 and 255. Like bash and its descendents,
    /// positive n becomes n % 256 and negative n becomes (256 + n) % 256.
    ///
    /// Exit the shell with a status of n. If n is None, then the exit status
    /// is that of the last command executed.
    pub fn exit(&mut self, n: Option<ExitStatus>) -> ! {
        if self.config.display_messages {
            println!("exit");
        }

        let code = match n {
            Some(n) => n.code().unwrap_or(1),
            None => self.last_exit_status.code().unwrap_or(1),
        };
        let code_like_u8 = if code < 0 {
            (256 + code) % 256
        } else {
            code % 256
        };

        info!("msh has shut down");
        process::exit(code_like_u8);
    }
}

/// Is this line a `history -i` replay trigger?
fn is_replay_invocation(line: &str) -> bool {
    let (tokens, _) = parse::tokenize(line);
    tokens.first().map_or(false, |t| t == "history")
        && tokens.get(1).map_or(false, |t| t == "-i")
}

/// Policy object to control a Shell's behavior
#[derive(Debug, Copy, Clone)]
pub struct ShellConfig {
    /// Determines if new command entries will be added to the shell's
    /// command history.
    enable_command_history: bool,

    /// Number of entries to store in the shell's command history
    command_history_capacity: usize,

    /// Determines if job control (background jobs, fg, reaping) is
    /// supported.
    enable_job_control: bool,

    /// Determines if the prompt and some messages (e.g. "exit") should be
    /// displayed.
    display_messages: bool,
}

impl ShellConfig {
    /// Creates an interactive shell, e.g. command history, job control
    ///
    /// # Complete List
    /// - Command History is enabled
    /// - Job Control is enabled
    /// - The prompt and some additional messages are displayed
    pub fn interactive(command_history_capacity: usize) -> ShellConfig {
        ShellConfig {
            enable_command_history: true,
            command_history_capacity,
            enable_job_control: true,
            display_messages: true,
        }
    }

    /// Creates a noninteractive shell, e.g. no command history, no job
    /// control
    ///
    /// # Complete List
    /// - Command History is disabled. Commands are not saved. The history
    ///   builtin command is not affected by this option.
    /// - Job Control is disabled.
    /// - Fewer messages are displayed
    pub fn noninteractive() -> ShellConfig {
        Default::default()
    }
}

impl Default for ShellConfig {
    fn default() -> ShellConfig {
        ShellConfig {
            enable_command_history: false,
            command_history_capacity: 0,
            enable_job_control: false,
            display_messages: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_invocation_detection() {
        assert!(is_replay_invocation("history -i 3"));
        assert!(is_replay_invocation("  history -i 0"));
        assert!(!is_replay_invocation("history"));
        assert!(!is_replay_invocation("echo history -i 3"));
    }

    #[test]
    fn replay_of_replay_is_rejected() {
        let mut shell = Shell::new(ShellConfig::noninteractive()).unwrap();
        shell.history.record("history -i 1");
        let result = shell.replay_history(0);
        match result {
            Err(ref e) => match *e.kind() {
                ErrorKind::BuiltinCommand { .. } => {}
                ref kind => panic!("unexpected error kind: {:?}", kind),
            },
            Ok(()) => panic!("replay of a replay succeeded"),
        }
    }

    #[test]
    fn replay_unset_slot_is_an_error() {
        let mut shell = Shell::new(ShellConfig::noninteractive()).unwrap();
        let result = shell.replay_history(4);
        match result {
            Err(ref e) => match *e.kind() {
                ErrorKind::NoSuchHistoryEntry(index) => assert_eq!(index, 4),
                ref kind => panic!("unexpected error kind: {:?}", kind),
            },
            Ok(()) => panic!("replay of an unset slot succeeded"),
        }
    }
}
