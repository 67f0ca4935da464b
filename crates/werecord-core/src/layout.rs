use std::{
    fs, io,
    path::{Path, PathBuf},
};

use md5::{Digest, Md5};

/// Package name of the target application.
pub const TARGET_PACKAGE: &str = "com.tencent.mm";

/// First platform API level that sandboxes the key-material file away.
pub const DEFAULT_SECRET_MIN_SDK: u32 = 29;

/// Lowercase hex MD5 of a string.
pub fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Where the target application keeps its private data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    data_dir: PathBuf,
}

impl TargetLayout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Layout under the standard Android data root (`/data/data`).
    pub fn android_default() -> Self {
        Self::new(Path::new("/data/data").join(TARGET_PACKAGE))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn micro_msg_dir(&self) -> PathBuf {
        self.data_dir.join("MicroMsg")
    }

    pub fn shared_prefs_dir(&self) -> PathBuf {
        self.data_dir.join("shared_prefs")
    }

    pub fn key_info_path(&self) -> PathBuf {
        self.data_dir.join("files").join("KeyInfo.bin")
    }

    pub fn last_login_prefs_path(&self) -> PathBuf {
        self.shared_prefs_dir()
            .join(format!("{TARGET_PACKAGE}_preferences.xml"))
    }

    pub fn known_accounts_prefs_path(&self) -> PathBuf {
        self.shared_prefs_dir().join("app_brand_global_sp.xml")
    }

    pub fn account_switch_prefs_path(&self) -> PathBuf {
        self.shared_prefs_dir()
            .join(format!("{TARGET_PACKAGE}_preferences_account_switch.xml"))
    }

    /// Per-account directory: `MicroMsg/<md5("mm" ++ uin)>`.
    pub fn account_dir(&self, uin: &str) -> PathBuf {
        self.micro_msg_dir().join(md5_hex(&format!("mm{uin}")))
    }

    pub fn original_store_path(&self, uin: &str) -> PathBuf {
        self.account_dir(uin).join("EnMicroMsg.db")
    }
}

/// Private working area of this application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkLayout {
    files_dir: PathBuf,
}

impl WorkLayout {
    pub fn new(files_dir: impl Into<PathBuf>) -> Self {
        Self {
            files_dir: files_dir.into(),
        }
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    pub fn store_dir(&self) -> PathBuf {
        self.files_dir.join(md5_hex("database_backup"))
    }

    pub fn avatar_backup_dir(&self) -> PathBuf {
        self.files_dir.join(md5_hex("avatar_backup"))
    }

    pub fn working_store_path(&self, uin: &str) -> PathBuf {
        self.store_dir().join(md5_hex(uin))
    }

    pub fn backup_store_path(&self) -> PathBuf {
        self.store_dir().join(md5_hex("backup"))
    }

    /// Create the working directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(self.store_dir())?;
        fs::create_dir_all(self.avatar_backup_dir())?;
        Ok(())
    }
}

/// Facts about the host platform that gate extraction behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Platform {
    pub sdk_int: u32,
}

impl Platform {
    pub fn new(sdk_int: u32) -> Self {
        Self { sdk_int }
    }

    /// Recent platforms hide the key-material file; the target then falls
    /// back to a fixed device secret.
    pub fn permits_default_secret(&self) -> bool {
        self.sdk_int >= DEFAULT_SECRET_MIN_SDK
    }
}
