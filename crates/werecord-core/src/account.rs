use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::layout::TargetLayout;

/// One identity discovered inside the target application.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Opaque account id; may stay unknown after resolution.
    pub account_id: Option<String>,
    /// Key used to locate files and derive the store passphrase.
    pub uin: String,
    pub nickname: Option<String>,
    pub phone_number: Option<String>,
    pub alias: Option<String>,
    pub original_store_path: PathBuf,
    pub working_store_path: Option<PathBuf>,
    pub backup_store_path: Option<PathBuf>,
    /// Set once the store has been opened with it; never logged.
    #[serde(skip_serializing)]
    pub store_password: Option<String>,
    pub is_last_login: bool,
    pub is_currently_selected: bool,
}

impl Account {
    /// Account known only by its uin, as produced during enumeration.
    pub fn new(uin: impl Into<String>, layout: &TargetLayout) -> Self {
        let uin = uin.into();
        let original_store_path = layout.original_store_path(&uin);
        Self {
            uin,
            original_store_path,
            ..Self::default()
        }
    }

    /// Human-facing label: nickname, then alias, then uin.
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .or(self.alias.as_deref())
            .unwrap_or(&self.uin)
    }
}

/// Access mode of the open encrypted store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn from_edit_mode(enabled: bool) -> Self {
        if enabled {
            AccessMode::ReadWrite
        } else {
            AccessMode::ReadOnly
        }
    }
}
