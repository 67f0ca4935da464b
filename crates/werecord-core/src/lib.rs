//! Core contracts for werecord: account model, initialization failures,
//! collaborator traits (privileged file channel, configuration cache) and the
//! on-disk layout of the target application.
//! Concrete implementations live in `werecord-storage`.

pub mod account;
pub mod channel;
pub mod config;
pub mod failure;
pub mod layout;
pub mod lifecycle;
