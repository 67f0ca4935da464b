use std::{fmt::Write as _, path::PathBuf, sync::Arc};

use tracing::{debug, info, instrument, warn};
use werecord_accounts::{
    enumerate::{AccountEnumerator, Enumeration},
    resolve::{enrich_profile, read_switch_history, reconcile_switch_history, resolve_current},
};
use werecord_core::{
    account::{AccessMode, Account},
    channel::FileChannel,
    config::ConfigCache,
    failure::InitError,
    layout::{Platform, TargetLayout, WorkLayout},
    lifecycle::{LifecycleObserver, LifecycleState},
};
use werecord_storage::{
    key_info::DeviceSecretExtractor,
    opener::{derive_and_open, open_blocking, remove_working_copy, WorkingCopyGuard},
    store::EncryptedStore,
};

use crate::{
    error::EnvError,
    notifier::{Notifier, ObserverId},
};

/// Where the target lives, where our own files go, and what platform we run on.
#[derive(Debug, Clone)]
pub struct EnvironmentSettings {
    pub target: TargetLayout,
    pub work: WorkLayout,
    pub platform: Platform,
}

/// State produced by a successful initialization.
struct Session {
    accounts: Vec<Account>,
    current: usize,
    known_uins: Vec<String>,
    store: Option<EncryptedStore>,
}

impl Session {
    fn current(&self) -> &Account {
        &self.accounts[self.current]
    }

    fn current_mut(&mut self) -> &mut Account {
        &mut self.accounts[self.current]
    }
}

/// One access context over the target's data.
///
/// Starts in `Created`, becomes `Started` after [`Environment::initialize`]
/// and ends in `Destroyed`. A destroyed context is never reused.
pub struct Environment {
    channel: Arc<dyn FileChannel>,
    config: Arc<dyn ConfigCache>,
    settings: EnvironmentSettings,
    state: LifecycleState,
    session: Option<Session>,
    notifier: Notifier,
}

impl Environment {
    /// Build a context in `Created`. Being the initial state, `Created` is
    /// never delivered to observers.
    pub fn new(
        channel: Arc<dyn FileChannel>,
        config: Arc<dyn ConfigCache>,
        settings: EnvironmentSettings,
    ) -> Result<Self, EnvError> {
        let notifier = Notifier::spawn()?;
        Ok(Self {
            channel,
            config,
            settings,
            state: LifecycleState::Created,
            session: None,
            notifier,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn settings(&self) -> &EnvironmentSettings {
        &self.settings
    }

    pub fn add_observer(&mut self, observer: Arc<dyn LifecycleObserver>) -> ObserverId {
        self.notifier.attach(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) {
        self.notifier.detach(id);
    }

    /// Block until every queued notification has been delivered.
    pub fn flush_notifications(&self) {
        self.notifier.flush();
    }

    /// Extract the secret, find the account, open its store and resolve the
    /// current account. The pipeline runs as a single background task.
    ///
    /// On failure the context stays `Created`.
    #[instrument(skip_all, fields(state = %self.state))]
    pub async fn initialize(&mut self) -> Result<(), InitError> {
        if self.state != LifecycleState::Created {
            return Err(InitError::InvalidState { state: self.state });
        }

        let pipeline = Pipeline {
            channel: Arc::clone(&self.channel),
            config: Arc::clone(&self.config),
            settings: self.settings.clone(),
        };
        let session = tokio::spawn(pipeline.run())
            .await
            .map_err(|e| InitError::Interrupted {
                reason: format!("initialization task: {e}"),
            })??;

        info!(
            uin = %session.current().uin,
            accounts = session.accounts.len(),
            "environment initialized"
        );
        self.session = Some(session);
        self.transition(LifecycleState::Started);
        Ok(())
    }

    /// Close the store and open the same working copy again in `mode`.
    ///
    /// Nothing is re-copied or re-resolved. If the new open fails the context
    /// stays `Started` without a store handle.
    #[instrument(skip(self))]
    pub async fn reopen(&mut self, mode: AccessMode) -> Result<(), EnvError> {
        let session = self.started_session_mut()?;
        if let Some(store) = session.store.take() {
            store.close()?;
        }

        let account = session.current();
        let (Some(path), Some(passphrase)) = (
            account.working_store_path.clone(),
            account.store_password.clone(),
        ) else {
            return Err(EnvError::StoreClosed);
        };
        let store = open_blocking(path, passphrase, mode).await?;
        self.started_session_mut()?.store = Some(store);
        debug!(?mode, "store reopened");
        Ok(())
    }

    /// Close the store, delete the working copy and move to `Destroyed`.
    /// Calling it again is a no-op.
    #[instrument(skip_all, fields(state = %self.state))]
    pub fn destroy(&mut self) -> Result<(), EnvError> {
        if self.state == LifecycleState::Destroyed {
            return Ok(());
        }

        let mut outcome = Ok(());
        if let Some(mut session) = self.session.take() {
            if let Some(store) = session.store.take() {
                if let Err(err) = store.close() {
                    warn!(%err, "closing store failed");
                }
            }
            if let Some(path) = &session.current().working_store_path {
                if let Err(err) = remove_working_copy(path) {
                    outcome = Err(EnvError::Io(err));
                }
            }
        }

        self.transition(LifecycleState::Destroyed);
        outcome
    }

    pub fn current_account(&self) -> Result<&Account, EnvError> {
        Ok(self.started_session()?.current())
    }

    pub fn accounts(&self) -> Result<&[Account], EnvError> {
        Ok(&self.started_session()?.accounts)
    }

    /// Every uin the target remembers, for account switching.
    pub fn known_uins(&self) -> Result<&[String], EnvError> {
        Ok(&self.started_session()?.known_uins)
    }

    pub fn store(&self) -> Result<&EncryptedStore, EnvError> {
        self.started_session()?
            .store
            .as_ref()
            .ok_or(EnvError::StoreClosed)
    }

    /// Copy the current account's original store to the backup location.
    #[instrument(skip_all)]
    pub async fn backup_original_store(&mut self) -> Result<PathBuf, EnvError> {
        let destination = self.settings.work.backup_store_path();
        let channel = Arc::clone(&self.channel);
        let source = self.started_session()?.current().original_store_path.clone();

        channel.copy(&source, &destination, true).await?;
        let session = self.started_session_mut()?;
        session.current_mut().backup_store_path = Some(destination.clone());
        info!(backup = %destination.display(), "original store backed up");
        Ok(destination)
    }

    /// The user block of the diagnostics report, when started.
    pub fn diagnostics_user_block(&self) -> Option<String> {
        let session = self.started_session().ok()?;
        let account = session.current();
        let mut block = String::new();
        let _ = writeln!(block, "pragmaKeyed: {}", account.store_password.is_some());
        let _ = writeln!(
            block,
            "dirPath: {}",
            self.settings.target.account_dir(&account.uin).display()
        );
        let _ = writeln!(
            block,
            "workerDbPath: {}",
            account
                .working_store_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );
        Some(block)
    }

    fn started_session(&self) -> Result<&Session, EnvError> {
        match (&self.session, self.state) {
            (Some(session), LifecycleState::Started) => Ok(session),
            _ => Err(EnvError::NotStarted { state: self.state }),
        }
    }

    fn started_session_mut(&mut self) -> Result<&mut Session, EnvError> {
        let state = self.state;
        match (&mut self.session, state) {
            (Some(session), LifecycleState::Started) => Ok(session),
            _ => Err(EnvError::NotStarted { state }),
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "ignoring illegal transition");
            return;
        }
        self.state = next;
        info!(state = %next, "environment state changed");
        self.notifier.publish(next);
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        if let Err(err) = self.destroy() {
            warn!(%err, "destroy on drop failed");
        }
    }
}

/// Owned inputs of the initialization task.
struct Pipeline {
    channel: Arc<dyn FileChannel>,
    config: Arc<dyn ConfigCache>,
    settings: EnvironmentSettings,
}

impl Pipeline {
    async fn run(self) -> Result<Session, InitError> {
        let Self {
            channel,
            config,
            settings,
        } = self;
        let EnvironmentSettings {
            target,
            work,
            platform,
        } = settings;

        work.ensure_dirs()?;

        let extractor = DeviceSecretExtractor::new(&*channel, &*config, &target, &work, platform);
        let secret = extractor.get_device_secret().await?;

        let Enumeration {
            mut accounts,
            last_login_uin,
            known_uins,
        } = AccountEnumerator::new(&*channel, &target)
            .enumerate_accounts()
            .await?;

        // Enumeration yields exactly one seed, so the account resolved below
        // is the one whose store gets opened here.
        let seed = 0;
        let discard = WorkingCopyGuard::new(work.working_store_path(&accounts[seed].uin));
        let mode = AccessMode::from_edit_mode(
            config.edit_mode_enabled().await.map_err(InitError::Config)?,
        );
        let store = derive_and_open(&*channel, &work, &mut accounts[seed], &secret.value, mode)
            .await?;

        let persisted = config.last_used_uin().await.map_err(InitError::Config)?;
        let resolution = resolve_current(
            &mut accounts,
            last_login_uin.as_deref(),
            persisted.as_deref(),
        )?;
        enrich_profile(&mut accounts[resolution.index], &store)?;

        // Only a verified store may change the configuration.
        extractor.remember(&secret).await?;
        if let Some(uin) = &resolution.persist_last_used {
            config
                .set_last_used_uin(uin)
                .await
                .map_err(InitError::Config)?;
        }

        let history = read_switch_history(&*channel, &target).await;
        if reconcile_switch_history(&mut accounts, &history) {
            debug!("account ids filled from switch history");
        }

        discard.keep();
        Ok(Session {
            accounts,
            current: resolution.index,
            known_uins,
            store: Some(store),
        })
    }
}
