use std::io;

use thiserror::Error;

use crate::{channel::ShellFailure, lifecycle::LifecycleState};

/// Closed set of reasons an initialization can be refused. Each names a
/// precondition of the target application's data that was not met.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitFailure {
    /// Key-material file absent and the platform has no default secret.
    #[error("key-material file not found")]
    NoKeyInfo,
    /// Key-material file present but no secret could be read from it.
    #[error("key-material file holds no device secret")]
    NullImei,
    /// Neither a last-login value nor any known account was found.
    #[error("no account identifier found")]
    NoUin,
    /// Candidate accounts exist but none has a store file on disk.
    #[error("no store file matches any known account")]
    NoDbFileMatchesUin,
}

impl InitFailure {
    /// Stable numeric code, suitable for user-facing reports.
    pub fn code(self) -> u8 {
        match self {
            InitFailure::NoKeyInfo => 0,
            InitFailure::NullImei => 1,
            InitFailure::NoUin => 2,
            InitFailure::NoDbFileMatchesUin => 3,
        }
    }
}

/// Everything that can abort an initialization attempt: one of the closed
/// [`InitFailure`] reasons, or an infrastructure failure surfaced separately.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Failure(#[from] InitFailure),
    /// Cipher primitive unavailable or rejected its key.
    #[error("cipher failure: {reason}")]
    Crypto { reason: String },
    /// Store could not be opened, verified or queried.
    #[error("store failure: {reason}")]
    Store { reason: String },
    /// A required privileged copy or read failed.
    #[error(transparent)]
    Channel(#[from] ShellFailure),
    #[error("configuration cache failure: {0}")]
    Config(#[source] anyhow::Error),
    #[error("io failure: {0}")]
    Io(#[from] io::Error),
    /// The background initialization task did not run to completion.
    #[error("initialization interrupted: {reason}")]
    Interrupted { reason: String },
    #[error("operation not allowed in state {state}")]
    InvalidState { state: LifecycleState },
}

impl InitError {
    /// The closed failure reason, when this is not an infrastructure error.
    pub fn failure(&self) -> Option<InitFailure> {
        match self {
            InitError::Failure(failure) => Some(*failure),
            _ => None,
        }
    }
}
