use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Persisted user preferences and cached derivation inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    /// Device secret recovered by a previous initialization.
    pub device_secret: Option<String>,
    /// Account the user last worked with.
    pub last_used_uin: Option<String>,
    /// Open the store read-write instead of read-only.
    #[serde(default)]
    pub edit_mode: bool,
    /// The cached device secret is only trusted once this is set.
    #[serde(default)]
    pub intro_done: bool,
}

/// Key/value configuration collaborator.
#[async_trait]
pub trait ConfigCache: Send + Sync {
    async fn device_secret(&self) -> Result<Option<String>>;
    async fn set_device_secret(&self, secret: &str) -> Result<()>;
    async fn last_used_uin(&self) -> Result<Option<String>>;
    async fn set_last_used_uin(&self, uin: &str) -> Result<()>;
    async fn edit_mode_enabled(&self) -> Result<bool>;
    async fn set_edit_mode_enabled(&self, enabled: bool) -> Result<()>;
    async fn intro_done(&self) -> Result<bool>;
    async fn set_intro_done(&self, done: bool) -> Result<()>;
}

/// Configuration cache kept in memory, for tests and throwaway sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfigCache {
    inner: Arc<Mutex<Preferences>>,
}

impl InMemoryConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preferences(prefs: Preferences) -> Self {
        Self {
            inner: Arc::new(Mutex::new(prefs)),
        }
    }

    /// Copy of the current preferences.
    pub fn snapshot(&self) -> Result<Preferences> {
        self.read(|prefs| prefs.clone())
    }

    fn read<T>(&self, f: impl FnOnce(&Preferences) -> T) -> Result<T> {
        let guard = self
            .inner
            .lock()
            .map_err(|err| anyhow::anyhow!("lock poisoned: {err}"))?;
        Ok(f(&guard))
    }

    fn write(&self, f: impl FnOnce(&mut Preferences)) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| anyhow::anyhow!("lock poisoned: {err}"))?;
        f(&mut guard);
        Ok(())
    }
}

#[async_trait]
impl ConfigCache for InMemoryConfigCache {
    async fn device_secret(&self) -> Result<Option<String>> {
        self.read(|p| p.device_secret.clone())
    }

    async fn set_device_secret(&self, secret: &str) -> Result<()> {
        self.write(|p| p.device_secret = Some(secret.to_string()))
    }

    async fn last_used_uin(&self) -> Result<Option<String>> {
        self.read(|p| p.last_used_uin.clone())
    }

    async fn set_last_used_uin(&self, uin: &str) -> Result<()> {
        self.write(|p| p.last_used_uin = Some(uin.to_string()))
    }

    async fn edit_mode_enabled(&self) -> Result<bool> {
        self.read(|p| p.edit_mode)
    }

    async fn set_edit_mode_enabled(&self, enabled: bool) -> Result<()> {
        self.write(|p| p.edit_mode = enabled)
    }

    async fn intro_done(&self) -> Result<bool> {
        self.read(|p| p.intro_done)
    }

    async fn set_intro_done(&self, done: bool) -> Result<()> {
        self.write(|p| p.intro_done = done)
    }
}
