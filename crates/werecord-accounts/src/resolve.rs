use tracing::{debug, instrument};
use werecord_core::{
    account::Account, channel::FileChannel, failure::InitFailure, layout::TargetLayout,
};
use werecord_storage::store::{EncryptedStore, StoreError};

use crate::prefs::{extract_all, SWITCH_HISTORY_ID};

/// `userinfo` row ids of the profile fields.
pub const USER_INFO_ACCOUNT_ID: i64 = 2;
pub const USER_INFO_NICKNAME: i64 = 4;
pub const USER_INFO_PHONE_NUMBER: i64 = 6;
pub const USER_INFO_ALIAS: i64 = 42;

pub const PROFILE_KEYS: [i64; 4] = [
    USER_INFO_ACCOUNT_ID,
    USER_INFO_NICKNAME,
    USER_INFO_PHONE_NUMBER,
    USER_INFO_ALIAS,
];

/// Which rule picked the current account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Matched the persisted last-used account.
    LastUsed,
    /// Matched the target's last-login account.
    LastLogin,
    /// Nothing matched; first candidate.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Index of the current account in the candidate slice.
    pub index: usize,
    pub selection: Selection,
    /// Value to persist as the new last-used account, if any.
    pub persist_last_used: Option<String>,
}

/// Pick the current account.
///
/// Precedence: persisted last-used, then last-login, then the first
/// candidate. Flags on `accounts` are updated in place.
pub fn resolve_current(
    accounts: &mut [Account],
    last_login_uin: Option<&str>,
    persisted_last_used: Option<&str>,
) -> Result<Resolution, InitFailure> {
    if accounts.is_empty() {
        return Err(InitFailure::NoUin);
    }

    for account in accounts.iter_mut() {
        account.is_currently_selected = false;
        if last_login_uin == Some(account.uin.as_str()) {
            account.is_last_login = true;
        }
    }

    let position = |uin: Option<&str>| {
        uin.and_then(|uin| accounts.iter().position(|account| account.uin == uin))
    };

    let resolution = if let Some(index) = position(persisted_last_used) {
        Resolution {
            index,
            selection: Selection::LastUsed,
            persist_last_used: None,
        }
    } else if let Some(index) = position(last_login_uin) {
        Resolution {
            index,
            selection: Selection::LastLogin,
            persist_last_used: persisted_last_used
                .is_none()
                .then(|| accounts[index].uin.clone()),
        }
    } else {
        Resolution {
            index: 0,
            selection: Selection::Fallback,
            persist_last_used: None,
        }
    };

    accounts[resolution.index].is_currently_selected = true;
    debug!(selection = ?resolution.selection, "current account resolved");
    Ok(resolution)
}

/// Map `userinfo` rows onto profile fields. Unknown ids are ignored.
pub fn apply_profile(account: &mut Account, rows: impl IntoIterator<Item = (i64, String)>) {
    for (id, value) in rows {
        match id {
            USER_INFO_ACCOUNT_ID => account.account_id = Some(value),
            USER_INFO_NICKNAME => account.nickname = Some(value),
            USER_INFO_PHONE_NUMBER => account.phone_number = Some(value),
            USER_INFO_ALIAS => account.alias = Some(value),
            _ => {}
        }
    }
}

/// Fill profile fields from the opened store.
#[instrument(skip_all)]
pub fn enrich_profile(account: &mut Account, store: &EncryptedStore) -> Result<(), StoreError> {
    let rows = store.user_info(&PROFILE_KEYS)?;
    apply_profile(account, rows);
    Ok(())
}

/// Zip account-switch history ids onto accounts still missing an id. Applies
/// only when the history has exactly one id per account.
pub fn reconcile_switch_history(accounts: &mut [Account], ids: &[String]) -> bool {
    if ids.len() != accounts.len() {
        return false;
    }
    for (account, id) in accounts.iter_mut().zip(ids) {
        if account.account_id.is_none() {
            account.account_id = Some(id.clone());
        }
    }
    true
}

/// Ids listed in the target's account-switch history. A missing or
/// unreadable file yields none.
pub async fn read_switch_history(channel: &dyn FileChannel, target: &TargetLayout) -> Vec<String> {
    let path = target.account_switch_prefs_path();
    if !channel.exists(&path).await {
        return Vec::new();
    }
    match channel.read_text(&path).await {
        Ok(text) => extract_all(&text, &SWITCH_HISTORY_ID),
        Err(err) => {
            debug!(%err, "ignoring unreadable switch history");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use werecord_core::channel::LocalFileChannel;

    use super::*;

    fn accounts(uins: &[&str]) -> Vec<Account> {
        let layout = TargetLayout::new("/data/data/com.tencent.mm");
        uins.iter().map(|uin| Account::new(*uin, &layout)).collect()
    }

    #[test]
    fn persisted_last_used_wins() {
        let mut list = accounts(&["A", "B", "C"]);
        let resolution = resolve_current(&mut list, Some("B"), Some("C")).expect("resolve");
        assert_eq!(resolution.index, 2);
        assert_eq!(resolution.selection, Selection::LastUsed);
        assert_eq!(resolution.persist_last_used, None);
        assert!(list[2].is_currently_selected);
        assert!(list[1].is_last_login);
        assert!(!list[1].is_currently_selected);
    }

    #[test]
    fn last_login_wins_without_matching_last_used() {
        let mut list = accounts(&["A", "B", "C"]);
        let resolution = resolve_current(&mut list, Some("B"), None).expect("resolve");
        assert_eq!(resolution.index, 1);
        assert_eq!(resolution.selection, Selection::LastLogin);
        assert_eq!(resolution.persist_last_used.as_deref(), Some("B"));
        assert!(list[1].is_last_login);
        assert!(list[1].is_currently_selected);

        // A stale persisted value does not get overwritten.
        let mut list = accounts(&["A", "B", "C"]);
        let resolution = resolve_current(&mut list, Some("B"), Some("Z")).expect("resolve");
        assert_eq!(resolution.selection, Selection::LastLogin);
        assert_eq!(resolution.persist_last_used, None);
    }

    #[test]
    fn falls_back_to_first_candidate() {
        let mut list = accounts(&["A", "B", "C"]);
        let resolution = resolve_current(&mut list, Some("X"), Some("Y")).expect("resolve");
        assert_eq!(resolution.index, 0);
        assert_eq!(resolution.selection, Selection::Fallback);
        assert!(list[0].is_currently_selected);
        assert!(list.iter().all(|a| !a.is_last_login));
    }

    #[test]
    fn empty_candidates_are_rejected() {
        let err = resolve_current(&mut [], Some("A"), None).expect_err("empty");
        assert_eq!(err, InitFailure::NoUin);
    }

    #[test]
    fn applies_known_profile_rows_only() {
        let mut list = accounts(&["A"]);
        apply_profile(
            &mut list[0],
            vec![
                (2, "wxid_a".to_string()),
                (4, "Alice".to_string()),
                (6, "13800000000".to_string()),
                (42, "alice_w".to_string()),
                (7, "ignored".to_string()),
            ],
        );
        let account = &list[0];
        assert_eq!(account.account_id.as_deref(), Some("wxid_a"));
        assert_eq!(account.nickname.as_deref(), Some("Alice"));
        assert_eq!(account.phone_number.as_deref(), Some("13800000000"));
        assert_eq!(account.alias.as_deref(), Some("alice_w"));
    }

    #[test]
    fn switch_history_fills_missing_ids_when_counts_match() {
        let mut list = accounts(&["A", "B"]);
        list[0].account_id = Some("wxid_known".into());
        let ids = vec!["wxid_1".to_string(), "wxid_2".to_string()];

        assert!(reconcile_switch_history(&mut list, &ids));
        assert_eq!(list[0].account_id.as_deref(), Some("wxid_known"));
        assert_eq!(list[1].account_id.as_deref(), Some("wxid_2"));

        let mut list = accounts(&["A", "B"]);
        assert!(!reconcile_switch_history(&mut list, &ids[..1]));
        assert!(list.iter().all(|a| a.account_id.is_none()));
    }

    #[tokio::test]
    async fn reads_switch_history_and_tolerates_absence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = TargetLayout::new(dir.path());
        let channel = LocalFileChannel::new();
        assert!(read_switch_history(&channel, &target).await.is_empty());

        fs::create_dir_all(target.shared_prefs_dir()).expect("mkdir");
        fs::write(
            target.account_switch_prefs_path(),
            "<map>\n  <set name=\"ids\">\n    <string>wxid_x</string>\n  </set>\n</map>\n",
        )
        .expect("write");
        assert_eq!(read_switch_history(&channel, &target).await, vec!["wxid_x"]);
    }
}
