//! Local entity store backed by SQLite.
//!
//! Every write is guarded by the entity's `version`: an update only lands if the
//! stored version still equals the version the caller read. Interactive edits
//! and sync writes can therefore interleave without a global lock.

use crate::error::{StorageError, StorageResult};
use crmsync_model::{now_millis, Entity};
use crmsync_types::{BusinessUnitId, EntityId, EntityRef, EntityType, RemoteId, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const ENTITY_COLUMNS: &str = "id, entity_type, data, owner_id, business_unit_id, remote_id, \
                              version, created_at, modified_at, modified_by";

/// Persistent store for local CRM entities.
#[derive(Clone)]
pub struct EntityStore {
    conn: Arc<Mutex<Connection>>,
}

impl EntityStore {
    /// Opens (or creates) an entity store at the given path.
    pub fn open(path: &str) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory entity store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entities (
                id TEXT PRIMARY KEY,
                entity_type TEXT NOT NULL,
                data TEXT NOT NULL,
                owner_id TEXT,
                business_unit_id TEXT,
                remote_id TEXT,
                version INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                modified_at INTEGER NOT NULL,
                modified_by TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_entities_type ON entities (entity_type);

            CREATE UNIQUE INDEX IF NOT EXISTS idx_entities_remote
                ON entities (entity_type, remote_id) WHERE remote_id IS NOT NULL;

            CREATE TABLE IF NOT EXISTS entity_links (
                from_id TEXT NOT NULL,
                to_id TEXT NOT NULL,
                UNIQUE(from_id, to_id)
            );

            CREATE TABLE IF NOT EXISTS entity_editors (
                entity_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                UNIQUE(entity_id, user_id)
            );
            ",
        )?;
        Ok(())
    }

    // ── Entities ─────────────────────────────────────────────────

    /// Inserts a new entity. The stored copy starts at version 1.
    pub fn insert(&self, entity: &Entity) -> StorageResult<Entity> {
        let conn = self.conn()?;
        let mut stored = entity.clone();
        stored.version = 1;
        conn.execute(
            &format!("INSERT INTO entities ({ENTITY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                stored.id.to_string(),
                stored.entity_type.as_str(),
                serde_json::to_string(&stored.data)?,
                stored.owner_id.map(|u| u.to_string()),
                stored.business_unit_id.map(|b| b.to_string()),
                stored.remote_id.as_ref().map(|r| r.as_str().to_string()),
                stored.version,
                stored.created_at,
                stored.modified_at,
                stored.modified_by,
            ],
        )?;
        debug!("Inserted {}", stored.entity_ref());
        Ok(stored)
    }

    /// Loads an entity by id.
    pub fn get(&self, id: &EntityId) -> StorageResult<Option<Entity>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?1"),
                params![id.to_string()],
                RawEntity::from_row,
            )
            .optional()?;
        raw.map(RawEntity::into_entity).transpose()
    }

    /// Loads an entity by typed reference; a type mismatch counts as not found.
    pub fn get_ref(&self, entity: &EntityRef) -> StorageResult<Option<Entity>> {
        Ok(self
            .get(&entity.id)?
            .filter(|e| e.entity_type == entity.entity_type))
    }

    /// Finds the local entity linked to a remote record.
    pub fn find_by_remote_id(
        &self,
        entity_type: EntityType,
        remote_id: &RemoteId,
    ) -> StorageResult<Option<Entity>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_type = ?1 AND remote_id = ?2"
                ),
                params![entity_type.as_str(), remote_id.as_str()],
                RawEntity::from_row,
            )
            .optional()?;
        raw.map(RawEntity::into_entity).transpose()
    }

    /// Lists every entity of a type, oldest first.
    pub fn list_by_type(&self, entity_type: EntityType) -> StorageResult<Vec<Entity>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_type = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![entity_type.as_str()], RawEntity::from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_entity()?);
        }
        Ok(result)
    }

    /// Writes `entity` if the stored version still equals `entity.version`.
    /// Returns the stored copy with its version bumped.
    pub fn update(&self, entity: &Entity, causer: &str) -> StorageResult<Entity> {
        let conn = self.conn()?;
        let mut stored = entity.clone();
        stored.version = entity.version + 1;
        stored.modified_at = now_millis();
        stored.modified_by = Some(causer.to_string());

        let changed = conn.execute(
            "UPDATE entities SET data = ?1, owner_id = ?2, business_unit_id = ?3, remote_id = ?4,
                    version = ?5, modified_at = ?6, modified_by = ?7
             WHERE id = ?8 AND version = ?9",
            params![
                serde_json::to_string(&stored.data)?,
                stored.owner_id.map(|u| u.to_string()),
                stored.business_unit_id.map(|b| b.to_string()),
                stored.remote_id.as_ref().map(|r| r.as_str().to_string()),
                stored.version,
                stored.modified_at,
                stored.modified_by,
                stored.id.to_string(),
                entity.version,
            ],
        )?;

        if changed == 0 {
            return Err(missing_or_conflict(&conn, entity));
        }
        debug!("Updated {} to version {}", stored.entity_ref(), stored.version);
        Ok(stored)
    }

    /// Moves ownership of an entity in one transaction.
    ///
    /// When `keep_previous_as_editor` is set, the previous owner is granted an
    /// editor row instead of losing access.
    pub fn change_owner(
        &self,
        entity: &Entity,
        new_owner: UserId,
        keep_previous_as_editor: bool,
        causer: &str,
    ) -> StorageResult<Entity> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut stored = entity.clone();
        stored.owner_id = Some(new_owner);
        stored.version = entity.version + 1;
        stored.modified_at = now_millis();
        stored.modified_by = Some(causer.to_string());

        let changed = tx.execute(
            "UPDATE entities SET owner_id = ?1, version = ?2, modified_at = ?3, modified_by = ?4
             WHERE id = ?5 AND version = ?6",
            params![
                new_owner.to_string(),
                stored.version,
                stored.modified_at,
                stored.modified_by,
                stored.id.to_string(),
                entity.version,
            ],
        )?;
        if changed == 0 {
            return Err(missing_or_conflict(&tx, entity));
        }

        if keep_previous_as_editor {
            if let Some(previous) = entity.owner_id.filter(|p| *p != new_owner) {
                tx.execute(
                    "INSERT OR IGNORE INTO entity_editors (entity_id, user_id) VALUES (?1, ?2)",
                    params![entity.id.to_string(), previous.to_string()],
                )?;
            }
        }

        tx.commit()?;
        debug!("Changed owner of {} to {}", stored.entity_ref(), new_owner);
        Ok(stored)
    }

    // ── Links ────────────────────────────────────────────────────

    /// Records a directed link (e.g. company -> contact).
    pub fn link(&self, from: &EntityId, to: &EntityId) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO entity_links (from_id, to_id) VALUES (?1, ?2)",
            params![from.to_string(), to.to_string()],
        )?;
        Ok(())
    }

    /// Loads the entities directly linked from `from`.
    pub fn linked(&self, from: &EntityId) -> StorageResult<Vec<Entity>> {
        let conn = self.conn()?;
        let columns = ENTITY_COLUMNS
            .split(", ")
            .map(|c| format!("e.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {columns} FROM entity_links l JOIN entities e ON e.id = l.to_id
             WHERE l.from_id = ?1 ORDER BY e.created_at, e.id"
        ))?;
        let rows = stmt.query_map(params![from.to_string()], RawEntity::from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_entity()?);
        }
        Ok(result)
    }

    // ── Editors ──────────────────────────────────────────────────

    /// Users holding a secondary editor grant on an entity.
    pub fn editors(&self, entity_id: &EntityId) -> StorageResult<Vec<UserId>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT user_id FROM entity_editors WHERE entity_id = ?1 ORDER BY user_id")?;
        let rows = stmt.query_map(params![entity_id.to_string()], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(parse_id(&row?, "user_id")?);
        }
        Ok(result)
    }
}

fn missing_or_conflict(conn: &Connection, entity: &Entity) -> StorageError {
    let exists = conn
        .query_row(
            "SELECT 1 FROM entities WHERE id = ?1",
            params![entity.id.to_string()],
            |_| Ok(()),
        )
        .optional();
    match exists {
        Ok(Some(())) => StorageError::Conflict {
            entity: entity.entity_ref().to_string(),
            expected: entity.version,
        },
        Ok(None) => StorageError::NotFound(entity.entity_ref().to_string()),
        Err(e) => e.into(),
    }
}

fn parse_id<T: std::str::FromStr>(s: &str, column: &str) -> StorageResult<T>
where
    T::Err: std::fmt::Display,
{
    s.parse()
        .map_err(|e| StorageError::InvalidData(format!("invalid {column} '{s}': {e}")))
}

struct RawEntity {
    id: String,
    entity_type: String,
    data: String,
    owner_id: Option<String>,
    business_unit_id: Option<String>,
    remote_id: Option<String>,
    version: i64,
    created_at: i64,
    modified_at: i64,
    modified_by: Option<String>,
}

impl RawEntity {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            data: row.get(2)?,
            owner_id: row.get(3)?,
            business_unit_id: row.get(4)?,
            remote_id: row.get(5)?,
            version: row.get(6)?,
            created_at: row.get(7)?,
            modified_at: row.get(8)?,
            modified_by: row.get(9)?,
        })
    }

    fn into_entity(self) -> StorageResult<Entity> {
        let owner_id: Option<UserId> = self
            .owner_id
            .as_deref()
            .map(|s| parse_id(s, "owner_id"))
            .transpose()?;
        let business_unit_id: Option<BusinessUnitId> = self
            .business_unit_id
            .as_deref()
            .map(|s| parse_id(s, "business_unit_id"))
            .transpose()?;

        Ok(Entity {
            id: parse_id(&self.id, "id")?,
            entity_type: parse_id(&self.entity_type, "entity_type")?,
            data: serde_json::from_str(&self.data)?,
            owner_id,
            business_unit_id,
            remote_id: self.remote_id.map(RemoteId::from),
            version: self.version,
            created_at: self.created_at,
            modified_at: self.modified_at,
            modified_by: self.modified_by,
        })
    }
}
