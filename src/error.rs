//! Error types for REPL command execution.
//!
//! Startup failures (bad CLI arguments, unreadable image, bad superblock
//! magic) are not modeled here — they propagate out of `main` as
//! `anyhow::Error` and end the process. `CommandError` only covers failures
//! that are caught at the REPL dispatch boundary and reported without
//! unwinding the loop.

use std::fmt;

#[derive(Debug)]
pub enum CommandError {
    /// Malformed command line: unknown flag, duplicate flag, missing `-n`
    /// argument, wrong number of positional arguments.
    UsageError(String),
    /// Path does not resolve to any node in the tree.
    NotFound(String),
    /// Path resolves to a node of the wrong kind for the command
    /// (e.g. `print` on a directory).
    WrongType(String),
    /// A syntactically present argument has an invalid value (e.g. `-n`
    /// with a negative or non-numeric count).
    BadArgument(String),
    /// The image could not be read where the command expected valid data.
    DataReadError(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UsageError(msg) => write!(f, "Usage Error : {msg}"),
            CommandError::NotFound(msg) => write!(f, "Not Found : {msg}"),
            CommandError::WrongType(msg) => write!(f, "Wrong Type : {msg}"),
            CommandError::BadArgument(msg) => write!(f, "Bad Argument : {msg}"),
            CommandError::DataReadError(msg) => write!(f, "Data Read Error : {msg}"),
        }
    }
}

impl std::error::Error for CommandError {}
