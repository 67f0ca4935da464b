use std::{fs, path::Path};

use rc4::{consts::U8, KeyInit, Rc4, StreamCipher};
use tracing::{debug, info, instrument};
use werecord_core::{
    channel::FileChannel,
    config::ConfigCache,
    failure::{InitError, InitFailure},
    layout::{Platform, TargetLayout, WorkLayout},
};

/// RC4 key protecting the target's key-material file.
pub const KEY_INFO_CIPHER_KEY: [u8; 8] = [95, 119, 69, 99, 72, 65, 84, 95];

/// Secret the target itself falls back to when the platform hides the
/// key-material file.
pub const DEFAULT_DEVICE_SECRET: &str = "1234567890ABCDEF";

/// Apply the key-material keystream in place. RC4 is symmetric, so this both
/// encrypts and decrypts.
pub fn apply_key_info_cipher(data: &mut [u8]) -> Result<(), InitError> {
    let mut cipher =
        Rc4::<U8>::new_from_slice(&KEY_INFO_CIPHER_KEY).map_err(|e| InitError::Crypto {
            reason: format!("rc4 init failed: {e}"),
        })?;
    cipher.apply_keystream(data);
    Ok(())
}

/// Decrypt key material and return its first line, the device secret.
pub fn secret_from_key_info(mut data: Vec<u8>) -> Result<String, InitError> {
    apply_key_info_cipher(&mut data)?;
    first_line(&data).ok_or(InitError::Failure(InitFailure::NullImei))
}

/// Decrypt a key-material file that is already readable by this process.
pub fn decrypt_key_info_file(path: &Path) -> Result<String, InitError> {
    secret_from_key_info(fs::read(path)?)
}

fn first_line(plain: &[u8]) -> Option<String> {
    let line = plain.split(|b| *b == b'\n').next()?;
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(line).into_owned())
}

/// Where a device secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Cache,
    KeyInfo,
    PlatformDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSecret {
    pub value: String,
    pub source: SecretSource,
}

/// Recovers the per-installation device secret, from cache or from the
/// target's key-material file.
pub struct DeviceSecretExtractor<'a> {
    channel: &'a dyn FileChannel,
    config: &'a dyn ConfigCache,
    target: &'a TargetLayout,
    work: &'a WorkLayout,
    platform: Platform,
}

impl<'a> DeviceSecretExtractor<'a> {
    pub fn new(
        channel: &'a dyn FileChannel,
        config: &'a dyn ConfigCache,
        target: &'a TargetLayout,
        work: &'a WorkLayout,
        platform: Platform,
    ) -> Self {
        Self {
            channel,
            config,
            target,
            work,
            platform,
        }
    }

    /// Find the device secret. Nothing is written to the cache here; call
    /// [`DeviceSecretExtractor::remember`] once a store has opened with it.
    #[instrument(skip_all, fields(sdk = self.platform.sdk_int))]
    pub async fn get_device_secret(&self) -> Result<DeviceSecret, InitError> {
        if self.config.intro_done().await.map_err(InitError::Config)? {
            if let Some(value) = self.config.device_secret().await.map_err(InitError::Config)? {
                debug!("using cached device secret");
                return Ok(DeviceSecret {
                    value,
                    source: SecretSource::Cache,
                });
            }
        }

        let key_info = self.target.key_info_path();
        if self.channel.exists(&key_info).await {
            Ok(DeviceSecret {
                value: self.read_key_info(&key_info).await?,
                source: SecretSource::KeyInfo,
            })
        } else if self.platform.permits_default_secret() {
            info!("key-material file absent, using platform default secret");
            Ok(DeviceSecret {
                value: DEFAULT_DEVICE_SECRET.to_string(),
                source: SecretSource::PlatformDefault,
            })
        } else {
            Err(InitFailure::NoKeyInfo.into())
        }
    }

    /// Cache a secret that has proven to open a store.
    pub async fn remember(&self, secret: &DeviceSecret) -> Result<(), InitError> {
        if secret.source == SecretSource::Cache {
            return Ok(());
        }
        self.config
            .set_device_secret(&secret.value)
            .await
            .map_err(InitError::Config)
    }

    async fn read_key_info(&self, key_info: &Path) -> Result<String, InitError> {
        // Deleted when dropped, on every exit path.
        let temp = tempfile::Builder::new()
            .prefix("init_info")
            .tempfile_in(self.work.files_dir())?;
        self.channel.copy(key_info, temp.path(), true).await?;
        let bytes = fs::read(temp.path())?;
        debug!(len = bytes.len(), "decrypting key material");
        secret_from_key_info(bytes)
    }
}

#[cfg(test)]
mod tests {
    use werecord_core::{
        channel::LocalFileChannel,
        config::{InMemoryConfigCache, Preferences},
    };

    use super::*;

    fn encrypt(plain: &[u8]) -> Vec<u8> {
        let mut data = plain.to_vec();
        apply_key_info_cipher(&mut data).expect("cipher");
        data
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        target: TargetLayout,
        work: WorkLayout,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = TargetLayout::new(dir.path().join("target"));
        let work = WorkLayout::new(dir.path().join("files"));
        fs::create_dir_all(target.key_info_path().parent().expect("parent")).expect("mkdir");
        work.ensure_dirs().expect("work dirs");
        Fixture {
            _dir: dir,
            target,
            work,
        }
    }

    fn temp_leftovers(work: &WorkLayout) -> Vec<String> {
        fs::read_dir(work.files_dir())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("init_info"))
            .collect()
    }

    #[test]
    fn cipher_round_trips_known_line() {
        let plain = b"352584061234567\nsecond line\n";
        let encrypted = encrypt(plain);
        assert_ne!(encrypted, plain.to_vec());

        let secret = secret_from_key_info(encrypted).expect("decrypt");
        assert_eq!(secret, "352584061234567");
    }

    #[test]
    fn empty_plaintext_is_null_imei() {
        let err = secret_from_key_info(encrypt(b"")).expect_err("no line");
        assert_eq!(err.failure(), Some(InitFailure::NullImei));
        let err = secret_from_key_info(encrypt(b"\r\nrest")).expect_err("empty line");
        assert_eq!(err.failure(), Some(InitFailure::NullImei));
    }

    #[test]
    fn strips_carriage_return() {
        let secret = secret_from_key_info(encrypt(b"ABC123\r\n")).expect("decrypt");
        assert_eq!(secret, "ABC123");
    }

    #[tokio::test]
    async fn reads_secret_and_caches_only_when_remembered() {
        let fx = fixture();
        fs::write(fx.target.key_info_path(), encrypt(b"IMEI-0001\n")).expect("write");
        let config = InMemoryConfigCache::new();
        let channel = LocalFileChannel::new();
        let extractor =
            DeviceSecretExtractor::new(&channel, &config, &fx.target, &fx.work, Platform::new(28));

        let secret = extractor.get_device_secret().await.expect("secret");
        assert_eq!(secret.value, "IMEI-0001");
        assert_eq!(secret.source, SecretSource::KeyInfo);
        assert!(temp_leftovers(&fx.work).is_empty(), "temp file must be removed");
        assert_eq!(config.device_secret().await.expect("cache"), None);

        extractor.remember(&secret).await.expect("remember");
        assert_eq!(
            config.device_secret().await.expect("cache").as_deref(),
            Some("IMEI-0001")
        );
    }

    #[tokio::test]
    async fn remembering_a_cached_secret_writes_nothing() {
        let fx = fixture();
        let config = InMemoryConfigCache::new();
        let channel = LocalFileChannel::new();
        let extractor =
            DeviceSecretExtractor::new(&channel, &config, &fx.target, &fx.work, Platform::new(28));

        let cached = DeviceSecret {
            value: "CACHED".into(),
            source: SecretSource::Cache,
        };
        extractor.remember(&cached).await.expect("remember");
        assert_eq!(config.device_secret().await.expect("cache"), None);
    }

    #[tokio::test]
    async fn removes_temp_file_when_secret_is_missing() {
        let fx = fixture();
        fs::write(fx.target.key_info_path(), encrypt(b"")).expect("write");
        let config = InMemoryConfigCache::new();
        let channel = LocalFileChannel::new();
        let extractor =
            DeviceSecretExtractor::new(&channel, &config, &fx.target, &fx.work, Platform::new(28));

        let err = extractor.get_device_secret().await.expect_err("null imei");
        assert_eq!(err.failure(), Some(InitFailure::NullImei));
        assert!(temp_leftovers(&fx.work).is_empty());
        assert_eq!(config.device_secret().await.expect("cache"), None);
    }

    #[tokio::test]
    async fn cached_secret_requires_intro_done() {
        let fx = fixture();
        fs::write(fx.target.key_info_path(), encrypt(b"FROM-FILE\n")).expect("write");
        let channel = LocalFileChannel::new();

        let untrusted = InMemoryConfigCache::with_preferences(Preferences {
            device_secret: Some("CACHED".into()),
            ..Preferences::default()
        });
        let extractor =
            DeviceSecretExtractor::new(&channel, &untrusted, &fx.target, &fx.work, Platform::new(28));
        assert_eq!(extractor.get_device_secret().await.expect("secret").value, "FROM-FILE");

        let trusted = InMemoryConfigCache::with_preferences(Preferences {
            device_secret: Some("CACHED".into()),
            intro_done: true,
            ..Preferences::default()
        });
        let extractor =
            DeviceSecretExtractor::new(&channel, &trusted, &fx.target, &fx.work, Platform::new(28));
        let secret = extractor.get_device_secret().await.expect("secret");
        assert_eq!(secret.value, "CACHED");
        assert_eq!(secret.source, SecretSource::Cache);
    }

    #[tokio::test]
    async fn missing_key_info_depends_on_platform() {
        let fx = fixture();
        let channel = LocalFileChannel::new();

        let config = InMemoryConfigCache::new();
        let old = DeviceSecretExtractor::new(&channel, &config, &fx.target, &fx.work, Platform::new(28));
        let err = old.get_device_secret().await.expect_err("no key info");
        assert_eq!(err.failure(), Some(InitFailure::NoKeyInfo));

        let recent =
            DeviceSecretExtractor::new(&channel, &config, &fx.target, &fx.work, Platform::new(30));
        let secret = recent.get_device_secret().await.expect("fallback");
        assert_eq!(secret.value, DEFAULT_DEVICE_SECRET);
        assert_eq!(secret.source, SecretSource::PlatformDefault);
    }
}
