use std::io;

use thiserror::Error;
use werecord_core::{channel::ShellFailure, failure::InitError, lifecycle::LifecycleState};
use werecord_storage::store::StoreError;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("environment is not started (state: {state})")]
    NotStarted { state: LifecycleState },
    #[error("store handle is closed")]
    StoreClosed,
    #[error("no environment has been created")]
    NoEnvironment,
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Channel(#[from] ShellFailure),
    #[error("io failure: {0}")]
    Io(#[from] io::Error),
}
