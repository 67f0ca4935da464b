//! Lifecycle controller tying key extraction, enumeration, store access and
//! account resolution into one owned context.

pub mod environment;
pub mod error;
pub mod host;
pub mod notifier;

pub use environment::{Environment, EnvironmentSettings};
pub use error::EnvError;
pub use host::EnvironmentHost;
pub use notifier::ObserverId;
