use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, instrument, warn};
use werecord_core::{
    account::{AccessMode, Account},
    channel::FileChannel,
    failure::InitError,
    layout::WorkLayout,
};

use crate::{passphrase::derive_passphrase, store::EncryptedStore};

/// Copy the account's store into the working area and open the copy with the
/// derived passphrase.
///
/// The copy is refreshed on every call. On success the account records its
/// working path and passphrase.
#[instrument(skip_all, fields(?mode))]
pub async fn derive_and_open(
    channel: &dyn FileChannel,
    work: &WorkLayout,
    account: &mut Account,
    secret: &str,
    mode: AccessMode,
) -> Result<EncryptedStore, InitError> {
    let passphrase = derive_passphrase(secret, &account.uin);
    let working = work.working_store_path(&account.uin);

    let guard = WorkingCopyGuard::new(working.clone());
    channel
        .copy(&account.original_store_path, &working, true)
        .await?;
    debug!(working = %working.display(), "working copy refreshed");

    let store = open_blocking(working.clone(), passphrase.clone(), mode).await?;
    guard.keep();
    account.working_store_path = Some(working);
    account.store_password = Some(passphrase);
    Ok(store)
}

/// Deletes a working copy when dropped, unless [`WorkingCopyGuard::keep`] was
/// called first.
#[derive(Debug)]
pub struct WorkingCopyGuard {
    path: Option<PathBuf>,
}

impl WorkingCopyGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for WorkingCopyGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(err) = remove_working_copy(&path) {
                warn!(%err, path = %path.display(), "failed to discard working copy");
            }
        }
    }
}

/// Remove a working copy. A copy that is already gone is not an error.
pub fn remove_working_copy(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "working copy removed");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Run [`EncryptedStore::open`] on the blocking pool.
pub async fn open_blocking(
    path: PathBuf,
    passphrase: String,
    mode: AccessMode,
) -> Result<EncryptedStore, InitError> {
    tokio::task::spawn_blocking(move || EncryptedStore::open(&path, &passphrase, mode))
        .await
        .map_err(|e| InitError::Interrupted {
            reason: format!("store open task: {e}"),
        })?
        .map_err(InitError::from)
}
