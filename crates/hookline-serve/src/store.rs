//! SQLite-backed event history and suspect-identifier alias registry.
//!
//! Both stores share one connection behind a mutex, so every multi-statement
//! operation observes a consistent snapshot: the retention trim can never
//! race an append into deleting the row it just ranked as most recent.
//!
//! # Retention
//!
//! The event table is append-only with a server-assigned creation timestamp.
//! [`EventStore::trim_to_recent`] keeps the N most recently created rows and
//! deletes the rest in bounded batches inside a single transaction. Running
//! it twice in a row is a no-op.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;

/// Rows deleted per statement during a retention trim.
const TRIM_BATCH_SIZE: u32 = 500;

/// Create the tables if they do not exist yet.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS events (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            payload    TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_created_at
            ON events (created_at DESC, id DESC);
        CREATE TABLE IF NOT EXISTS invalid_user_ids (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            value      TEXT NOT NULL UNIQUE,
            aliased_to TEXT,
            created_at TEXT NOT NULL
        );",
    )
}

// =============================================================================
// Event store
// =============================================================================

/// Append-only record of ingested events with a retention trim.
pub struct EventStore {
    db: Arc<Mutex<Connection>>,
}

impl EventStore {
    /// Create a store view over a shared connection.
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    /// Insert a new immutable event with a server-assigned creation
    /// timestamp. Existing events are never mutated.
    pub fn append(&self, payload: &Value) -> rusqlite::Result<i64> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO events (payload, created_at) VALUES (?1, ?2)",
            params![payload.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Delete every event ranked beyond `limit` by descending creation time.
    ///
    /// Deletes run in batches of [`TRIM_BATCH_SIZE`] inside one transaction
    /// to bound statement size. Returns the number of rows deleted.
    /// Idempotent: a second run deletes nothing.
    pub fn trim_to_recent(&self, limit: u32) -> rusqlite::Result<usize> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        let mut total = 0usize;
        loop {
            let deleted = tx.execute(
                "DELETE FROM events WHERE id IN (
                    SELECT id FROM events
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?1 OFFSET ?2
                )",
                params![TRIM_BATCH_SIZE, limit],
            )?;
            total += deleted;
            if deleted == 0 {
                break;
            }
        }

        tx.commit()?;

        if total > 0 {
            tracing::debug!(deleted = total, limit, "trimmed event history");
        }
        Ok(total)
    }

    /// All stored payloads in insertion order (oldest first).
    pub fn list(&self) -> rusqlite::Result<Vec<Value>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare("SELECT payload FROM events ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            let raw: String = row.get(0)?;
            Ok(serde_json::from_str(&raw).unwrap_or(Value::Null))
        })?;
        rows.collect()
    }

    /// Number of stored events.
    pub fn count(&self) -> rusqlite::Result<u32> {
        let conn = self.db.lock();
        conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
    }
}

// =============================================================================
// Alias registry
// =============================================================================

/// A suspect identifier and the canonical ID it has been reconciled to,
/// if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasEntry {
    /// The raw fake-guid-shaped identifier value.
    pub value: String,
    /// Canonical identifier set by an operator, `None` until reconciled.
    pub aliased_to: Option<String>,
}

impl AliasEntry {
    /// Whether the entry has been reconciled to a canonical identifier.
    pub fn is_aliased(&self) -> bool {
        self.aliased_to.is_some()
    }
}

/// Registry of previously-seen suspect identifiers.
pub struct AliasRegistry {
    db: Arc<Mutex<Connection>>,
}

impl AliasRegistry {
    /// Create a registry view over a shared connection.
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    /// Look up an entry by its raw value.
    pub fn lookup(&self, value: &str) -> rusqlite::Result<Option<AliasEntry>> {
        let conn = self.db.lock();
        conn.query_row(
            "SELECT value, aliased_to FROM invalid_user_ids WHERE value = ?1",
            params![value],
            |row| {
                Ok(AliasEntry {
                    value: row.get(0)?,
                    aliased_to: row.get(1)?,
                })
            },
        )
        .optional()
    }

    /// Ensure an entry exists for `value`, with no canonical mapping yet.
    ///
    /// A single conflict-ignoring insert keyed on the unique `value` column,
    /// safe under concurrent requests observing the same value.
    pub fn find_or_create(&self, value: &str) -> rusqlite::Result<()> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO invalid_user_ids (value, aliased_to, created_at)
             VALUES (?1, NULL, ?2)
             ON CONFLICT(value) DO NOTHING",
            params![value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Record the canonical identifier for a suspect value.
    ///
    /// Returns `false` when the value was never observed.
    pub fn set_alias(&self, value: &str, canonical_id: &str) -> rusqlite::Result<bool> {
        let conn = self.db.lock();
        let updated = conn.execute(
            "UPDATE invalid_user_ids SET aliased_to = ?2 WHERE value = ?1",
            params![value, canonical_id],
        )?;
        Ok(updated > 0)
    }

    /// Entries with no canonical mapping yet, oldest first.
    pub fn unreconciled(&self) -> rusqlite::Result<Vec<AliasEntry>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT value, aliased_to FROM invalid_user_ids
             WHERE aliased_to IS NULL ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AliasEntry {
                value: row.get(0)?,
                aliased_to: row.get(1)?,
            })
        })?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    // =========================================================================
    // Event store
    // =========================================================================

    #[test]
    fn test_append_and_list_in_insertion_order() {
        let store = EventStore::new(test_db());

        store.append(&json!({"n": 1})).unwrap();
        store.append(&json!({"n": 2})).unwrap();

        let events = store.list().unwrap();
        assert_eq!(events, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[test]
    fn test_trim_keeps_most_recent() {
        let store = EventStore::new(test_db());

        for n in 0..10 {
            store.append(&json!({"n": n})).unwrap();
        }

        let deleted = store.trim_to_recent(3).unwrap();
        assert_eq!(deleted, 7);
        assert_eq!(
            store.list().unwrap(),
            vec![json!({"n": 7}), json!({"n": 8}), json!({"n": 9})]
        );
    }

    #[test]
    fn test_trim_is_idempotent() {
        let store = EventStore::new(test_db());

        for n in 0..10 {
            store.append(&json!({"n": n})).unwrap();
        }

        store.trim_to_recent(5).unwrap();
        let after_first = store.list().unwrap();

        let deleted = store.trim_to_recent(5).unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(store.list().unwrap(), after_first);
    }

    #[test]
    fn test_trim_under_limit_is_noop() {
        let store = EventStore::new(test_db());

        store.append(&json!({"n": 1})).unwrap();
        assert_eq!(store.trim_to_recent(100).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_trim_deletes_in_batches() {
        let store = EventStore::new(test_db());

        // More excess rows than one delete batch.
        let excess = TRIM_BATCH_SIZE as usize + 50;
        for n in 0..(excess + 2) {
            store.append(&json!({"n": n})).unwrap();
        }

        assert_eq!(store.trim_to_recent(2).unwrap(), excess);
        assert_eq!(store.count().unwrap(), 2);
    }

    // =========================================================================
    // Alias registry
    // =========================================================================

    #[test]
    fn test_find_or_create_is_idempotent() {
        let registry = AliasRegistry::new(test_db());

        registry.find_or_create("abcd-efgh").unwrap();
        registry.find_or_create("abcd-efgh").unwrap();

        let entry = registry.lookup("abcd-efgh").unwrap().unwrap();
        assert_eq!(entry.value, "abcd-efgh");
        assert_eq!(entry.aliased_to, None);
        assert!(!entry.is_aliased());
    }

    #[test]
    fn test_find_or_create_keeps_existing_alias() {
        let registry = AliasRegistry::new(test_db());

        registry.find_or_create("abcd-efgh").unwrap();
        assert!(registry.set_alias("abcd-efgh", "1234").unwrap());

        // Re-observing the value must not clear the reconciliation.
        registry.find_or_create("abcd-efgh").unwrap();
        let entry = registry.lookup("abcd-efgh").unwrap().unwrap();
        assert_eq!(entry.aliased_to.as_deref(), Some("1234"));
    }

    #[test]
    fn test_set_alias_unknown_value() {
        let registry = AliasRegistry::new(test_db());
        assert!(!registry.set_alias("never-seen", "1234").unwrap());
    }

    #[test]
    fn test_unreconciled_excludes_aliased_entries() {
        let registry = AliasRegistry::new(test_db());

        registry.find_or_create("123-456").unwrap();
        registry.find_or_create("789-012").unwrap();
        registry.set_alias("123-456", "1234").unwrap();

        let entries = registry.unreconciled().unwrap();
        assert_eq!(
            entries,
            vec![AliasEntry {
                value: "789-012".to_string(),
                aliased_to: None,
            }]
        );
    }

    #[test]
    fn test_lookup_missing_value() {
        let registry = AliasRegistry::new(test_db());
        assert_eq!(registry.lookup("missing").unwrap(), None);
    }
}
