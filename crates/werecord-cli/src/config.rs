use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

/// User-level configuration loaded from `~/.config/werecord/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Data directory of the target app; defaults to the Android location.
    pub target_data_dir: Option<PathBuf>,
    /// Where working copies and backups go.
    pub files_dir: Option<PathBuf>,
    /// Android API level of the host. Unset disables the default-secret fallback.
    pub platform_sdk: Option<u32>,
    /// How files of the target are reached.
    pub channel: Option<ChannelKind>,
    /// Override for the preferences file.
    pub preferences_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Through `su -c`.
    #[default]
    Su,
    /// Plain filesystem access.
    Local,
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("werecord").join("config.toml"))
}

/// Write the given config to the default path unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_to_path_if_missing(config, &default_path()?)
}

fn write_to_path_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_from_path(dir.path().join("config.toml")).expect("load");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn returns_default_when_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "  \n").expect("write temp config");
        assert_eq!(load_from_path(&path).expect("load"), Config::default());
    }

    #[test]
    fn parses_custom_config() {
        let contents = r#"
            target_data_dir = "/data/data/com.tencent.mm"
            files_dir = "/tmp/werecord"
            platform_sdk = 30
            channel = "local"
            preferences_path = "/tmp/werecord/prefs.toml"
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        let cfg = load_from_path(&path).expect("load");
        assert_eq!(
            cfg,
            Config {
                target_data_dir: Some(PathBuf::from("/data/data/com.tencent.mm")),
                files_dir: Some(PathBuf::from("/tmp/werecord")),
                platform_sdk: Some(30),
                channel: Some(ChannelKind::Local),
                preferences_path: Some(PathBuf::from("/tmp/werecord/prefs.toml")),
            }
        );
    }

    #[test]
    fn rejects_unknown_channel() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, r#"channel = "adb""#).expect("write temp config");
        assert!(load_from_path(&path).is_err());
    }

    #[test]
    fn write_default_creates_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            files_dir: Some(PathBuf::from("/tmp/werecord")),
            ..Config::default()
        };

        write_to_path_if_missing(&cfg, &path).expect("write should succeed");
        let other = Config {
            platform_sdk: Some(33),
            ..Config::default()
        };
        let second = write_to_path_if_missing(&other, &path).expect("second write ok");
        assert_eq!(second, path);
        assert_eq!(load_from_path(&path).expect("load"), cfg);
    }
}
