//! Msh - a small interactive command shell.
//!
//! The library half of the crate: line parsing, PATH resolution, process
//! spawning, background job bookkeeping and command history. The `msh`
//! binary is a thin wrapper around [`Shell`](shell/struct.Shell.html).

#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]

#[macro_use]
extern crate log;

/// Logs an `Err` result without interrupting the caller.
macro_rules! log_if_err {
    ($result:expr, $($arg:tt)*) => {
        if let Err(ref e) = $result {
            error!("{}: {}", format_args!($($arg)*), e);
        }
    };
}

mod builtins;
pub mod errors;
mod execute_command;
pub mod history;
pub mod jobs;
pub mod parse;
pub mod path_search;
pub mod shell;
mod util;

pub use crate::shell::{Shell, ShellConfig};
pub use crate::util::ShellExitStatusExt;
