//! Process spawning for simple commands and two-stage pipelines.

use std::env;
use std::fs::{File, OpenOptions};
use std::io;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

use failure::{Fail, ResultExt};
use nix::unistd::Pid;

use crate::errors::{Error, ErrorKind, Result};
use crate::jobs::JobManager;
use crate::parse::{self, OutputRedirect, SimpleCommand};
use crate::path_search;

/// What a child's stdin is wired to when no file redirect overrides it.
#[derive(Debug)]
enum Stdin {
    Inherit,
    Pipe(ChildStdout),
}

/// What a child's stdout is wired to when no file redirect overrides it.
#[derive(Debug)]
enum Output {
    Inherit,
    CreatePipe,
}

/// Runs an external job. Returns the foreground exit status, or `None` when
/// the job was sent to the background.
pub fn run_job(
    job_manager: &mut JobManager,
    job: &parse::ParsedJob,
) -> Result<Option<ExitStatus>> {
    match job.command {
        parse::Command::Simple(ref command) => run_simple(job_manager, job, command),
        parse::Command::Pipeline(ref first, ref second) => {
            run_pipeline(first, second).map(Some)
        }
    }
}

fn run_simple(
    job_manager: &mut JobManager,
    job: &parse::ParsedJob,
    command: &SimpleCommand,
) -> Result<Option<ExitStatus>> {
    let child = spawn_process(command, Stdin::Inherit, Output::Inherit)?;
    let pid = Pid::from_raw(child.id() as i32);

    if job.background {
        if let Err(e) = job_manager.add_job(pid, &job.input) {
            // Table full: the spawn is dropped, not tracked silently.
            kill_and_collect(child);
            return Err(e);
        }
        Ok(None)
    } else {
        job_manager.wait_for_foreground(pid, &job.input).map(Some)
    }
}

/// Connects the left command's stdout to the right command's stdin and waits
/// for both children.
///
/// The parent's pipe handles are owned values, so every early return drops
/// them closed; the reader always observes end-of-stream no matter how
/// either resolution turns out. A pipeline is a synchronous unit: the parent
/// waits for both children even when the line ended in `&`.
fn run_pipeline(first: &SimpleCommand, second: &SimpleCommand) -> Result<ExitStatus> {
    let mut left = spawn_process(first, Stdin::Inherit, Output::CreatePipe)?;

    // None when a file redirect on the left won over the pipe.
    let stdin = match left.stdout.take() {
        Some(stdout) => Stdin::Pipe(stdout),
        None => Stdin::Inherit,
    };

    let mut right = match spawn_process(second, stdin, Output::Inherit) {
        Ok(right) => right,
        Err(e) => {
            // The dropped pipe end gives the writer EOF/EPIPE; collect it
            // before reporting the right-hand failure.
            let temp_result = left.wait();
            log_if_err!(temp_result, "waiting for abandoned pipeline writer");
            return Err(e);
        }
    };

    left.wait().context(ErrorKind::Io)?;
    let status = right.wait().context(ErrorKind::Io)?;
    Ok(status)
}

/// Resolves the executable, applies the redirection plan and spawns the
/// child. File redirects win over pipe wiring on the redirected stream only.
fn spawn_process(command: &SimpleCommand, stdin: Stdin, stdout: Output) -> Result<Child> {
    let search_path = env::var("PATH").unwrap_or_default();
    let executable = path_search::resolve(&command.program, &search_path)
        .ok_or_else(|| Error::command_not_found(&command.program))?;

    let mut invocation = Command::new(&executable);
    invocation.args(&command.args);

    match (&command.redirects.stdin, stdin) {
        (Some(filename), _) => {
            let file = File::open(filename).context(ErrorKind::Io)?;
            invocation.stdin(file);
        }
        (None, Stdin::Pipe(pipe)) => {
            invocation.stdin(pipe);
        }
        (None, Stdin::Inherit) => {}
    }

    match (&command.redirects.stdout, stdout) {
        (Some(redirect), _) => {
            invocation.stdout(open_output_file(redirect)?);
        }
        (None, Output::CreatePipe) => {
            invocation.stdout(Stdio::piped());
        }
        (None, Output::Inherit) => {}
    }

    if let Some(ref filename) = command.redirects.stderr {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(filename)
            .context(ErrorKind::Io)?;
        invocation.stderr(file);
    }

    invocation.spawn().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            // The binary disappeared between resolution and exec.
            Error::command_not_found(&command.program)
        } else {
            e.context(ErrorKind::Io).into()
        }
    })
}

fn open_output_file(redirect: &OutputRedirect) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true);
    if redirect.append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    let file = options.open(&redirect.filename).context(ErrorKind::Io)?;
    Ok(file)
}

fn kill_and_collect(mut child: Child) {
    let temp_result = child.kill().and_then(|()| child.wait().map(drop));
    log_if_err!(
        temp_result,
        "failed to collect over-capacity child ({})",
        child.id()
    );
}
