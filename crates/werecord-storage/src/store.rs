//! SQLCipher-backed access to the target's encrypted store.

use std::path::{Path, PathBuf};

use rusqlite::{types::Value, Connection, OpenFlags};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use werecord_core::{account::AccessMode, failure::InitError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },
    /// Wrong passphrase or corrupt file.
    #[error("store at {path} is not readable: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

impl From<StoreError> for InitError {
    fn from(err: StoreError) -> Self {
        InitError::Store {
            reason: err.to_string(),
        }
    }
}

/// An open handle on a working copy of the target's store.
pub struct EncryptedStore {
    conn: Connection,
    path: PathBuf,
    mode: AccessMode,
}

impl EncryptedStore {
    /// Open an existing store, bring its cipher format up to date, key it in
    /// `mode` and check that it decrypts.
    ///
    /// The migration may rewrite the file in place, so `path` must be a
    /// private working copy, never the target's own store.
    #[instrument(skip(passphrase), fields(path = %path.display()))]
    pub fn open(path: &Path, passphrase: &str, mode: AccessMode) -> Result<Self, StoreError> {
        if !path.is_file() {
            return Err(StoreError::Open {
                path: path.display().to_string(),
                reason: "no such file".to_string(),
            });
        }

        run_compatibility_migration(path, passphrase);

        let flags = match mode {
            AccessMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            AccessMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
        } | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = open_keyed(path, passphrase, flags)?;
        verify_readable(&conn, path)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            mode,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Rows of the `userinfo` table for the given ids. NULL values are
    /// skipped; integers are rendered in decimal.
    pub fn user_info(&self, ids: &[i64]) -> Result<Vec<(i64, String)>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!("SELECT id, value FROM userinfo WHERE id IN ({placeholders}) ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Value>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, value) = row?;
            if let Some(text) = value_as_text(value) {
                out.push((id, text));
            }
        }
        Ok(out)
    }

    /// Close the handle, surfacing any error SQLite reports.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, err)| StoreError::Query(err))
    }
}

fn open_keyed(path: &Path, passphrase: &str, flags: OpenFlags) -> Result<Connection, StoreError> {
    let conn = Connection::open_with_flags(path, flags).map_err(|e| StoreError::Open {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    // PRAGMA key must be the first statement on the connection.
    conn.execute_batch(&format!(
        "PRAGMA key = '{}';",
        passphrase.replace('\'', "''")
    ))
    .map_err(|e| StoreError::Open {
        path: path.display().to_string(),
        reason: format!("keying failed: {e}"),
    })?;
    Ok(conn)
}

/// Bring older cipher formats up to date. Runs on every open; a store that is
/// already current reports `0` and is left untouched.
///
/// Migration attaches a scratch database, so it needs its own read-write
/// connection that may create files, whatever mode the caller asked for.
fn run_compatibility_migration(path: &Path, passphrase: &str) {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = match open_keyed(path, passphrase, flags) {
        Ok(conn) => conn,
        Err(err) => {
            warn!(%err, "cipher migration skipped");
            return;
        }
    };
    match conn.query_row("PRAGMA cipher_migrate", [], |row| row.get::<_, Value>(0)) {
        Ok(Value::Integer(0)) => debug!("cipher migration: up to date"),
        Ok(Value::Text(status)) if status == "0" => debug!("cipher migration: up to date"),
        Ok(other) => warn!(?other, "cipher migration reported a non-zero status"),
        Err(err) => warn!(%err, "cipher migration hook failed"),
    }
    if let Err((_, err)) = conn.close() {
        warn!(%err, "closing migration connection failed");
    }
}

fn verify_readable(conn: &Connection, path: &Path) -> Result<(), StoreError> {
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|tables| debug!(tables, "store verified"))
    .map_err(|e| StoreError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn value_as_text(value: Value) -> Option<String> {
    match value {
        Value::Text(text) => Some(text),
        Value::Integer(n) => Some(n.to_string()),
        Value::Real(r) => Some(r.to_string()),
        Value::Blob(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Null => None,
    }
}
