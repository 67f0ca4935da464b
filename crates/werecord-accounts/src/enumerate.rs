use std::path::Path;

use tracing::{debug, info, instrument};
use werecord_core::{
    account::Account,
    channel::FileChannel,
    failure::{InitError, InitFailure},
    layout::TargetLayout,
};

use crate::prefs::{extract_all, extract_first, KNOWN_UIN, LAST_LOGIN_UIN};

/// Outcome of account discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumeration {
    /// Accounts seeding resolution. Holds the single account whose store
    /// was found.
    pub accounts: Vec<Account>,
    /// Value of the last-login preference, if any.
    pub last_login_uin: Option<String>,
    /// Every previously used account, in document order.
    pub known_uins: Vec<String>,
}

/// Discovers accounts from the target's preference files.
pub struct AccountEnumerator<'a> {
    channel: &'a dyn FileChannel,
    target: &'a TargetLayout,
}

impl<'a> AccountEnumerator<'a> {
    pub fn new(channel: &'a dyn FileChannel, target: &'a TargetLayout) -> Self {
        Self { channel, target }
    }

    /// Read the last-login preference. A missing file yields `None`.
    pub async fn last_login_uin(&self) -> Result<Option<String>, InitError> {
        let text = self.read_optional(&self.target.last_login_prefs_path()).await?;
        Ok(text.and_then(|t| extract_first(&t, &LAST_LOGIN_UIN)))
    }

    /// Read the known-accounts preference. A missing file yields no uins.
    pub async fn known_uins(&self) -> Result<Vec<String>, InitError> {
        let text = self
            .read_optional(&self.target.known_accounts_prefs_path())
            .await?;
        Ok(text.map(|t| extract_all(&t, &KNOWN_UIN)).unwrap_or_default())
    }

    /// Pick the account to open.
    ///
    /// The last-login account wins when its store exists. Otherwise the known
    /// accounts are scanned in order and the first one with a store is used;
    /// every candidate is probed before giving up.
    #[instrument(skip_all)]
    pub async fn enumerate_accounts(&self) -> Result<Enumeration, InitError> {
        let last_login_uin = self.last_login_uin().await?;
        let known_uins = self.known_uins().await?;
        debug!(
            has_last_login = last_login_uin.is_some(),
            known = known_uins.len(),
            "account preferences read"
        );

        if let Some(uin) = &last_login_uin {
            let mut account = Account::new(uin.clone(), self.target);
            if self.channel.exists(&account.original_store_path).await {
                info!("using last-login account");
                account.is_last_login = true;
                return Ok(Enumeration {
                    accounts: vec![account],
                    last_login_uin,
                    known_uins,
                });
            }
        }

        if known_uins.is_empty() {
            return Err(InitFailure::NoUin.into());
        }

        let mut seed = None;
        for (position, uin) in known_uins.iter().enumerate() {
            let account = Account::new(uin.clone(), self.target);
            if self.channel.exists(&account.original_store_path).await {
                info!(position, "using known account");
                seed = Some(account);
                break;
            }
            debug!(position, "no store for candidate, continuing scan");
        }

        match seed {
            Some(account) => Ok(Enumeration {
                accounts: vec![account],
                last_login_uin,
                known_uins,
            }),
            None => Err(InitFailure::NoDbFileMatchesUin.into()),
        }
    }

    async fn read_optional(&self, path: &Path) -> Result<Option<String>, InitError> {
        if !self.channel.exists(path).await {
            return Ok(None);
        }
        Ok(Some(self.channel.read_text(path).await?))
    }
}
