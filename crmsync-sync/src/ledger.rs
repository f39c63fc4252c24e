//! Durable ledger of failed synchronization attempts.
//!
//! Uses a separate SQLite file so the ledger survives independently of the
//! entity store. At most one active (neither resolved nor archived) row exists
//! per entity; recording a new failure for that entity updates it in place.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use crmsync_model::now_millis;
use crmsync_types::{EntityId, EntityRef, EntityType};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// A persisted sync failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncErrorRecord {
    pub id: i64,
    pub entity_id: EntityId,
    pub entity_type: EntityType,
    pub entity_name: Option<String>,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SyncErrorRecord {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.entity_type, self.entity_id)
    }

    /// Neither resolved nor archived.
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none() && self.archived_at.is_none()
    }
}

struct RawRecord {
    id: i64,
    entity_type: String,
    entity_id: String,
    entity_name: Option<String>,
    error_message: String,
    created_at: i64,
    updated_at: i64,
    archived_at: Option<i64>,
    resolved_at: Option<i64>,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            entity_name: row.get(3)?,
            error_message: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            archived_at: row.get(7)?,
            resolved_at: row.get(8)?,
        })
    }

    fn into_record(self) -> SyncResult<SyncErrorRecord> {
        let entity_type = self
            .entity_type
            .parse()
            .map_err(|e| SyncError::Ledger(format!("corrupt ledger row {}: {e}", self.id)))?;
        let entity_id = EntityId::parse(&self.entity_id)
            .map_err(|e| SyncError::Ledger(format!("corrupt ledger row {}: {e}", self.id)))?;
        Ok(SyncErrorRecord {
            id: self.id,
            entity_id,
            entity_type,
            entity_name: self.entity_name,
            error_message: self.error_message,
            created_at: timestamp(self.created_at),
            updated_at: timestamp(self.updated_at),
            archived_at: self.archived_at.map(timestamp),
            resolved_at: self.resolved_at.map(timestamp),
        })
    }
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

const COLUMNS: &str = "id, entity_type, entity_id, entity_name, error_message,
                       created_at, updated_at, archived_at, resolved_at";

const ACTIVE: &str = "resolved_at IS NULL AND archived_at IS NULL";

/// Persistent sync error ledger backed by SQLite.
#[derive(Clone)]
pub struct SyncErrorLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SyncErrorLedger {
    /// Opens (or creates) a ledger at the given path.
    pub fn open(path: &str) -> SyncResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| SyncError::Ledger(format!("failed to open sync error ledger: {e}")))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory ledger (for testing).
    pub fn open_in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SyncError::Ledger(format!("failed to open in-memory ledger: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> SyncResult<Self> {
        let ledger = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn conn(&self) -> SyncResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SyncError::Ledger("ledger lock poisoned".to_string()))
    }

    fn init_schema(&self) -> SyncResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sync_errors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                entity_name TEXT,
                error_message TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                archived_at INTEGER,
                resolved_at INTEGER
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_sync_errors_active
                ON sync_errors (entity_type, entity_id)
                WHERE resolved_at IS NULL AND archived_at IS NULL;
            ",
        )
        .map_err(|e| SyncError::Ledger(format!("failed to init ledger schema: {e}")))?;
        Ok(())
    }

    fn fetch(conn: &Connection, id: i64) -> SyncResult<Option<SyncErrorRecord>> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM sync_errors WHERE id = ?1"),
            params![id],
            RawRecord::from_row,
        )
        .optional()
        .map_err(|e| SyncError::Ledger(format!("failed to load sync error {id}: {e}")))?
        .map(RawRecord::into_record)
        .transpose()
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> SyncResult<Vec<SyncErrorRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| SyncError::Ledger(format!("failed to prepare ledger query: {e}")))?;
        let rows = stmt
            .query_map(params, RawRecord::from_row)
            .map_err(|e| SyncError::Ledger(format!("failed to query ledger: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| SyncError::Ledger(format!("failed to read ledger row: {e}")))?;
            records.push(raw.into_record()?);
        }
        Ok(records)
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Records a failure for `entity`, updating its active row if one exists.
    pub fn record(
        &self,
        entity: &EntityRef,
        entity_name: Option<&str>,
        message: &str,
    ) -> SyncResult<SyncErrorRecord> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| SyncError::Ledger(format!("failed to begin ledger transaction: {e}")))?;
        let now = now_millis();
        let entity_type = entity.entity_type.as_str();
        let entity_id = entity.id.to_string();

        let active: Option<i64> = tx
            .query_row(
                &format!("SELECT id FROM sync_errors WHERE entity_type = ?1 AND entity_id = ?2 AND {ACTIVE}"),
                params![entity_type, entity_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| SyncError::Ledger(format!("failed to look up active sync error: {e}")))?;

        let id = match active {
            Some(id) => {
                tx.execute(
                    "UPDATE sync_errors
                     SET error_message = ?1, entity_name = COALESCE(?2, entity_name), updated_at = ?3
                     WHERE id = ?4",
                    params![message, entity_name, now, id],
                )
                .map_err(|e| SyncError::Ledger(format!("failed to update sync error {id}: {e}")))?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO sync_errors (entity_type, entity_id, entity_name, error_message, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![entity_type, entity_id, entity_name, message, now],
                )
                .map_err(|e| SyncError::Ledger(format!("failed to insert sync error: {e}")))?;
                tx.last_insert_rowid()
            }
        };

        let record = Self::fetch(&tx, id)?.ok_or(SyncError::RecordNotFound(id))?;
        tx.commit()
            .map_err(|e| SyncError::Ledger(format!("failed to commit sync error: {e}")))?;

        debug!(id, "Recorded sync error for {entity}");
        Ok(record)
    }

    /// Marks a record resolved. Resolving twice keeps the first timestamp.
    pub fn resolve(&self, id: i64) -> SyncResult<SyncErrorRecord> {
        self.close(id, "resolved_at")
    }

    /// Hides a record from active listings. Archiving twice keeps the first timestamp.
    pub fn archive(&self, id: i64) -> SyncResult<SyncErrorRecord> {
        self.close(id, "archived_at")
    }

    fn close(&self, id: i64, column: &str) -> SyncResult<SyncErrorRecord> {
        let conn = self.conn()?;
        let now = now_millis();
        conn.execute(
            &format!("UPDATE sync_errors SET {column} = ?1, updated_at = ?1 WHERE id = ?2 AND {column} IS NULL"),
            params![now, id],
        )
        .map_err(|e| SyncError::Ledger(format!("failed to set {column} on sync error {id}: {e}")))?;

        let record = Self::fetch(&conn, id)?.ok_or(SyncError::RecordNotFound(id))?;
        info!(id, "Sync error {column} set");
        Ok(record)
    }

    /// Resolves the active record of `entity`, if any. Returns the number of
    /// rows closed (0 or 1).
    pub fn resolve_for_entity(&self, entity: &EntityRef) -> SyncResult<usize> {
        let conn = self.conn()?;
        let now = now_millis();
        let closed = conn
            .execute(
                &format!(
                    "UPDATE sync_errors SET resolved_at = ?1, updated_at = ?1
                     WHERE entity_type = ?2 AND entity_id = ?3 AND {ACTIVE}"
                ),
                params![now, entity.entity_type.as_str(), entity.id.to_string()],
            )
            .map_err(|e| SyncError::Ledger(format!("failed to resolve sync errors for {entity}: {e}")))?;
        if closed > 0 {
            debug!("Auto-resolved sync error for {entity}");
        }
        Ok(closed)
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn get(&self, id: i64) -> SyncResult<Option<SyncErrorRecord>> {
        let conn = self.conn()?;
        Self::fetch(&conn, id)
    }

    /// Records that are neither resolved nor archived, oldest first.
    pub fn list_active(&self) -> SyncResult<Vec<SyncErrorRecord>> {
        self.query(
            &format!("SELECT {COLUMNS} FROM sync_errors WHERE {ACTIVE} ORDER BY id"),
            [],
        )
    }

    /// Every record, newest first, paginated.
    pub fn list_all(&self, limit: u32, offset: u32) -> SyncResult<Vec<SyncErrorRecord>> {
        self.query(
            &format!("SELECT {COLUMNS} FROM sync_errors ORDER BY id DESC LIMIT ?1 OFFSET ?2"),
            params![limit, offset],
        )
    }

    /// The active record of `entity`, if any.
    pub fn active_for(&self, entity: &EntityRef) -> SyncResult<Option<SyncErrorRecord>> {
        Ok(self
            .query(
                &format!("SELECT {COLUMNS} FROM sync_errors WHERE entity_type = ?1 AND entity_id = ?2 AND {ACTIVE}"),
                params![entity.entity_type.as_str(), entity.id.to_string()],
            )?
            .into_iter()
            .next())
    }

    pub fn count_active(&self) -> SyncResult<u64> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT COUNT(*) FROM sync_errors WHERE {ACTIVE}"),
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as u64)
        .map_err(|e| SyncError::Ledger(format!("failed to count sync errors: {e}")))
    }
}
