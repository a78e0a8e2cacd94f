//! Background job bookkeeping.
//!
//! The shell tracks at most [`JOB_TABLE_CAPACITY`] background jobs by pid.
//! The foreground process is a single scalar, not a table entry: it is
//! published to [`FOREGROUND_PID`] before the blocking wait and cleared
//! right after, so the SIGTSTP handler can always tell whether a foreground
//! process exists. Reaping is a non-blocking `waitpid` pass run from the
//! main loop before each prompt rather than from a signal handler, which
//! keeps all table mutation on one thread of control.

use std::fmt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicI32, Ordering};

use failure::{Fail, ResultExt};
use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::errors::{Error, ErrorKind, Result};
use crate::util::ShellExitStatusExt;

/// Most background jobs the table will hold; insertion beyond this fails
/// loudly rather than overwriting.
pub const JOB_TABLE_CAPACITY: usize = 20;

/// Exit status reported for a foreground job that was stopped rather than
/// terminated (128 + SIGTSTP).
const STOPPED_EXIT_STATUS: i32 = 148;

const NO_FOREGROUND: i32 = -1;

/// Pid of the process the shell is currently blocked on, or
/// [`NO_FOREGROUND`]. Shared with the SIGTSTP handler, hence atomic.
static FOREGROUND_PID: AtomicI32 = AtomicI32::new(NO_FOREGROUND);

/// Forwards a terminal suspend to the foreground process only.
///
/// Runs in signal context: one atomic load and kill(2), nothing else.
extern "C" fn handle_sigtstp(_signal: libc::c_int) {
    let pid = FOREGROUND_PID.load(Ordering::SeqCst);
    if pid != NO_FOREGROUND {
        unsafe {
            libc::kill(pid, libc::SIGTERM);
        }
    }
}

/// Installs the interactive signal disposition: suspend requests are
/// forwarded to the foreground process, interrupt/quit do not kill the
/// shell itself. SIGCHLD keeps its default disposition; exits are collected
/// by [`JobManager::reap`].
pub fn initialize_job_control() -> Result<()> {
    let forward_suspend = SigAction::new(
        SigHandler::Handler(handle_sigtstp),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    unsafe {
        signal::sigaction(Signal::SIGTSTP, &forward_suspend).context(ErrorKind::Nix)?;
        signal::sigaction(Signal::SIGINT, &ignore).context(ErrorKind::Nix)?;
        signal::sigaction(Signal::SIGQUIT, &ignore).context(ErrorKind::Nix)?;
    }
    Ok(())
}

fn set_foreground(pid: Pid) {
    FOREGROUND_PID.store(pid.as_raw(), Ordering::SeqCst);
}

fn clear_foreground() {
    FOREGROUND_PID.store(NO_FOREGROUND, Ordering::SeqCst);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JobState {
    Running,
    Stopped,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            JobState::Running => write!(f, "Running"),
            JobState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// A background process the shell is responsible for.
#[derive(Clone, Debug)]
pub struct Job {
    pid: Pid,
    /// The original command line entered.
    pub command: String,
    state: JobState,
}

impl Job {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> JobState {
        self.state
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}]\t{}\t{}", self.pid, self.state, self.command)
    }
}

/// Pid-keyed registry of background jobs, bounded at a fixed capacity.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    capacity: usize,
}

impl JobTable {
    pub fn with_capacity(capacity: usize) -> JobTable {
        JobTable {
            jobs: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds a job, failing with `JobTableFull` once `capacity` entries are
    /// live.
    pub fn insert(&mut self, pid: Pid, command: &str, state: JobState) -> Result<()> {
        if self.jobs.len() == self.capacity {
            return Err(Error::job_table_full(self.capacity));
        }
        self.jobs.push(Job {
            pid,
            command: command.to_owned(),
            state,
        });
        Ok(())
    }

    pub fn remove(&mut self, pid: Pid) -> Option<Job> {
        self.jobs
            .iter()
            .position(|job| job.pid == pid)
            .map(|index| self.jobs.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Owns the job table and the wait/reap logic around it.
#[derive(Debug)]
pub struct JobManager {
    table: JobTable,
}

impl JobManager {
    pub fn new() -> JobManager {
        JobManager {
            table: JobTable::with_capacity(JOB_TABLE_CAPACITY),
        }
    }

    pub fn has_jobs(&self) -> bool {
        !self.table.is_empty()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.table.iter()
    }

    /// Registers a freshly spawned background job and announces it.
    pub fn add_job(&mut self, pid: Pid, command: &str) -> Result<()> {
        self.table.insert(pid, command, JobState::Running)?;
        println!("[{}] {}", pid, command);
        Ok(())
    }

    /// Collects every child that has exited without blocking, removing
    /// finished jobs from the table.
    pub fn reap(&mut self) {
        loop {
            match wait::waitpid(None, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, _)) | Ok(WaitStatus::Signaled(pid, ..)) => {
                    if let Some(job) = self.table.remove(pid) {
                        println!("[{}]\tDone\t{}", pid, job.command);
                    }
                }
                Ok(WaitStatus::StillAlive) | Err(nix::Error::Sys(Errno::ECHILD)) => break,
                Ok(_) => continue,
                Err(e) => {
                    error!("reap: waitpid: {}", e);
                    break;
                }
            }
        }
    }

    /// Blocks until the specific foreground `pid` terminates or stops,
    /// publishing it for the suspend handler while waiting.
    ///
    /// A stopped process re-enters the table as a `Stopped` job.
    pub fn wait_for_foreground(&mut self, pid: Pid, command: &str) -> Result<ExitStatus> {
        set_foreground(pid);
        let status = loop {
            match wait::waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Exited(_, code)) => break ExitStatus::from_status(code),
                Ok(WaitStatus::Signaled(_, sig, _)) => {
                    break ExitStatus::from_status(128 + sig as i32)
                }
                Ok(WaitStatus::Stopped(..)) => {
                    let temp_result = self.table.insert(pid, command, JobState::Stopped);
                    log_if_err!(temp_result, "stopped job ({}) could not rejoin the table", pid);
                    println!("[{}]\tStopped\t{}", pid, command);
                    break ExitStatus::from_status(STOPPED_EXIT_STATUS);
                }
                Ok(_) => continue,
                Err(nix::Error::Sys(Errno::EINTR)) => continue,
                Err(e) => {
                    clear_foreground();
                    return Err(e.context(ErrorKind::Nix).into());
                }
            }
        };
        clear_foreground();
        Ok(status)
    }

    /// Promotes a background job to the foreground.
    ///
    /// The job leaves the table, is resumed if it was stopped, and is then
    /// waited on like any foreground process. An unknown pid is an error
    /// with no state change.
    pub fn put_job_in_foreground(&mut self, pid: Pid) -> Result<ExitStatus> {
        debug!("putting job ({}) in foreground", pid);
        let job = self
            .table
            .remove(pid)
            .ok_or_else(|| Error::no_such_job(pid.to_string()))?;
        if job.state() == JobState::Stopped {
            signal::kill(pid, Signal::SIGCONT).context(ErrorKind::Nix)?;
        }
        self.wait_for_foreground(pid, &job.command)
    }

    /// Kills every background job and collects each one before returning.
    pub fn kill_all_jobs(&mut self) -> Result<()> {
        while let Some(job) = self.table.jobs.pop() {
            println!("Terminating background process {}", job.pid());
            match signal::kill(job.pid(), Signal::SIGKILL) {
                // Already gone; the reaper just hadn't collected it yet.
                Err(nix::Error::Sys(Errno::ESRCH)) => continue,
                other => other.context(ErrorKind::Nix)?,
            };
            match wait::waitpid(job.pid(), None) {
                Ok(_) | Err(nix::Error::Sys(Errno::ECHILD)) => {}
                Err(e) => return Err(e.context(ErrorKind::Nix).into()),
            }
        }
        Ok(())
    }
}

impl Default for JobManager {
    fn default() -> JobManager {
        JobManager::new()
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use lazy_static::lazy_static;

    use super::*;

    lazy_static! {
        // reap waits on any child of the process; tests that spawn real
        // children must not overlap.
        static ref LIVE_CHILD_LOCK: Mutex<()> = Mutex::new(());
    }

    fn fake_pid(n: i32) -> Pid {
        Pid::from_raw(10_000 + n)
    }

    fn spawn_background(manager: &mut JobManager) -> Pid {
        let child = Command::new("true").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);
        manager.add_job(pid, "true &").unwrap();
        pid
    }

    fn full_table(capacity: usize) -> JobTable {
        let mut table = JobTable::with_capacity(capacity);
        for n in 0..capacity {
            table
                .insert(fake_pid(n as i32), "sleep 100 &", JobState::Running)
                .unwrap();
        }
        table
    }

    #[test]
    fn insert_and_remove_by_pid() {
        let mut table = JobTable::with_capacity(4);
        table.insert(fake_pid(1), "cat &", JobState::Running).unwrap();
        table.insert(fake_pid(2), "sleep 5 &", JobState::Running).unwrap();

        let job = table.remove(fake_pid(1)).unwrap();
        assert_eq!(job.pid(), fake_pid(1));
        assert_eq!(job.command, "cat &");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_unknown_pid_is_none() {
        let mut table = JobTable::with_capacity(4);
        table.insert(fake_pid(1), "cat &", JobState::Running).unwrap();
        assert!(table.remove(fake_pid(99)).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn capacity_boundary() {
        let mut table = full_table(JOB_TABLE_CAPACITY);
        let result = table.insert(fake_pid(999), "one too many &", JobState::Running);
        match result {
            Err(ref e) => match e.kind() {
                ErrorKind::JobTableFull(capacity) => assert_eq!(*capacity, JOB_TABLE_CAPACITY),
                kind => panic!("unexpected error kind: {:?}", kind),
            },
            Ok(()) => panic!("insert beyond capacity succeeded"),
        }
        assert_eq!(table.len(), JOB_TABLE_CAPACITY);
    }

    #[test]
    fn freed_slot_is_reusable() {
        let mut table = full_table(JOB_TABLE_CAPACITY);
        table.remove(fake_pid(0)).unwrap();
        assert!(table
            .insert(fake_pid(999), "echo &", JobState::Running)
            .is_ok());
        assert_eq!(table.len(), JOB_TABLE_CAPACITY);
    }

    #[test]
    fn reap_removes_exited_child_without_user_action() {
        let _guard = LIVE_CHILD_LOCK.lock().unwrap();
        let mut manager = JobManager::new();
        spawn_background(&mut manager);

        for _ in 0..100 {
            manager.reap();
            if !manager.has_jobs() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!manager.has_jobs());
    }

    #[test]
    fn promote_running_child_to_foreground() {
        let _guard = LIVE_CHILD_LOCK.lock().unwrap();
        let mut manager = JobManager::new();
        let pid = spawn_background(&mut manager);

        let status = manager.put_job_in_foreground(pid).unwrap();
        assert!(status.success());
        assert!(!manager.has_jobs());
    }

    #[test]
    fn promote_unknown_pid_changes_nothing() {
        let mut manager = JobManager::new();
        manager.add_job(fake_pid(2), "cat &").unwrap();

        let result = manager.put_job_in_foreground(fake_pid(1));
        match result {
            Err(ref e) => match e.kind() {
                ErrorKind::NoSuchJob(ref job) => assert_eq!(job, &fake_pid(1).to_string()),
                kind => panic!("unexpected error kind: {:?}", kind),
            },
            Ok(_) => panic!("promotion of an unknown pid succeeded"),
        }
        assert_eq!(manager.jobs().count(), 1);
    }

    #[test]
    fn stopped_state_round_trip() {
        let mut table = JobTable::with_capacity(4);
        table.insert(fake_pid(7), "vi", JobState::Stopped).unwrap();
        let job = table.remove(fake_pid(7)).unwrap();
        assert_eq!(job.state(), JobState::Stopped);
    }
}
