use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::instrument;
use werecord_core::config::{ConfigCache, Preferences};

/// Configuration cache persisted as a TOML file. Every write replaces the
/// file atomically.
pub struct TomlPreferences {
    path: PathBuf,
    // Serializes read-modify-write cycles from concurrent callers.
    write_lock: Mutex<()>,
}

impl TomlPreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current preferences; defaults when the file is missing or empty.
    pub fn load(&self) -> Result<Preferences> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Preferences::default());
        }
        toml::from_str(&contents).with_context(|| format!("parsing {}", self.path.display()))
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn update(&self, f: impl FnOnce(&mut Preferences)) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|err| anyhow::anyhow!("lock poisoned: {err}"))?;
        let mut prefs = self.load()?;
        f(&mut prefs);
        write_atomically(&self.path, &toml::to_string_pretty(&prefs)?)
    }
}

fn write_atomically(path: &Path, body: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(body.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ConfigCache for TomlPreferences {
    async fn device_secret(&self) -> Result<Option<String>> {
        Ok(self.load()?.device_secret)
    }

    async fn set_device_secret(&self, secret: &str) -> Result<()> {
        self.update(|p| p.device_secret = Some(secret.to_string()))
    }

    async fn last_used_uin(&self) -> Result<Option<String>> {
        Ok(self.load()?.last_used_uin)
    }

    async fn set_last_used_uin(&self, uin: &str) -> Result<()> {
        self.update(|p| p.last_used_uin = Some(uin.to_string()))
    }

    async fn edit_mode_enabled(&self) -> Result<bool> {
        Ok(self.load()?.edit_mode)
    }

    async fn set_edit_mode_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|p| p.edit_mode = enabled)
    }

    async fn intro_done(&self) -> Result<bool> {
        Ok(self.load()?.intro_done)
    }

    async fn set_intro_done(&self, done: bool) -> Result<()> {
        self.update(|p| p.intro_done = done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_when_file_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefs = TomlPreferences::new(dir.path().join("prefs.toml"));
        assert_eq!(prefs.load().expect("load"), Preferences::default());
        assert_eq!(prefs.device_secret().await.expect("get"), None);
        assert!(!prefs.intro_done().await.expect("get"));
    }

    #[tokio::test]
    async fn persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("prefs.toml");

        let prefs = TomlPreferences::new(&path);
        prefs.set_device_secret("A1B2").await.expect("set");
        prefs.set_last_used_uin("555").await.expect("set");
        prefs.set_edit_mode_enabled(true).await.expect("set");

        let reloaded = TomlPreferences::new(&path);
        assert_eq!(
            reloaded.load().expect("load"),
            Preferences {
                device_secret: Some("A1B2".into()),
                last_used_uin: Some("555".into()),
                edit_mode: true,
                intro_done: false,
            }
        );
    }

    #[tokio::test]
    async fn tolerates_empty_file_and_partial_tables() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.toml");
        fs::write(&path, "  \n").expect("write");
        let prefs = TomlPreferences::new(&path);
        assert_eq!(prefs.load().expect("load"), Preferences::default());

        fs::write(&path, "last_used_uin = \"9\"\n").expect("write");
        assert_eq!(prefs.last_used_uin().await.expect("get").as_deref(), Some("9"));
        assert!(!prefs.edit_mode_enabled().await.expect("get"));
    }

    #[test]
    fn rejects_malformed_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.toml");
        fs::write(&path, "edit_mode = \"maybe\"").expect("write");
        assert!(TomlPreferences::new(&path).load().is_err());
    }
}
