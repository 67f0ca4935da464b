use std::{path::PathBuf, sync::Arc};

use crate::config::{ChannelKind, Config};
use color_eyre::Result;
use dirs::data_dir;
use tracing::debug;
use werecord_core::{
    channel::{FileChannel, LocalFileChannel},
    layout::{Platform, TargetLayout, WorkLayout},
};
use werecord_env::EnvironmentSettings;
use werecord_storage::{preferences::TomlPreferences, shell_channel::SuFileChannel};

const PREFERENCES_FILE: &str = "preferences.toml";

/// Resolve the default files directory for werecord.
pub fn default_files_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("werecord"))
}

fn files_dir(config: &Config) -> Result<PathBuf> {
    match &config.files_dir {
        Some(dir) => Ok(dir.clone()),
        None => default_files_dir(),
    }
}

/// Layouts and platform described by the config.
pub fn settings_from_config(config: &Config) -> Result<EnvironmentSettings> {
    let target = config
        .target_data_dir
        .as_ref()
        .map(TargetLayout::new)
        .unwrap_or_else(TargetLayout::android_default);
    let work = WorkLayout::new(files_dir(config)?);
    debug!(target = %target.data_dir().display(), files = %work.files_dir().display(), "resolved layouts");
    Ok(EnvironmentSettings {
        target,
        work,
        platform: Platform::new(config.platform_sdk.unwrap_or_default()),
    })
}

pub fn channel_from_config(config: &Config) -> Arc<dyn FileChannel> {
    match config.channel.unwrap_or_default() {
        ChannelKind::Su => Arc::new(SuFileChannel::new()),
        ChannelKind::Local => Arc::new(LocalFileChannel::new()),
    }
}

/// Preferences backed by a TOML file in the files directory unless overridden.
pub fn preferences_from_config(config: &Config) -> Result<Arc<TomlPreferences>> {
    let path = match &config.preferences_path {
        Some(path) => path.clone(),
        None => files_dir(config)?.join(PREFERENCES_FILE),
    };
    debug!(path = %path.display(), "using preferences file");
    Ok(Arc::new(TomlPreferences::new(path)))
}
