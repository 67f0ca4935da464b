//! Account discovery and selection for the target application: preference
//! parsing, enumeration against on-disk stores, and current-account
//! resolution.

pub mod enumerate;
pub mod prefs;
pub mod resolve;
