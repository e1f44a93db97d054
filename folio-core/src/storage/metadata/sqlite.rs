use super::{MetadataStore, ResourceIter, apply_change, validate_all};
use crate::error::{FolioError, Result};
use crate::identifier::{Identifier, IdentifierMinter};
use crate::resource::{Resource, SchemaRegistry};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Metadata store persisted to a single SQLite database file.
///
/// Resources are stored as JSON bodies. Every identifier-valued attribute
/// value is mirrored into `resource_references`, rewritten in the same
/// transaction as the body it came from.
pub struct SqliteMetadataStore {
    db_path: PathBuf,
    schemas: Arc<SchemaRegistry>,
    minter: IdentifierMinter,
}

impl SqliteMetadataStore {
    pub fn new(db_path: impl AsRef<Path>, schemas: Arc<SchemaRegistry>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self {
            db_path,
            schemas,
            minter: IdentifierMinter::new(),
        };
        store.init_schema()?;
        tracing::info!("Opened metadata database at {:?}", store.db_path);
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn get_conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.get_conn()?;

        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS resources (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_resources_kind ON resources(kind, id)",
            [],
        )?;

        // Inverse index: one row per identifier value held by a resource
        conn.execute(
            "CREATE TABLE IF NOT EXISTS resource_references (
                record_id TEXT NOT NULL,
                attribute TEXT NOT NULL,
                position INTEGER NOT NULL,
                target_id TEXT NOT NULL,
                PRIMARY KEY (record_id, attribute, position)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_resource_references_target
             ON resource_references(attribute, target_id)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS deleted_resources (
                id TEXT PRIMARY KEY,
                deleted_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Write one validated resource inside an open transaction.
    fn write_resource(&self, tx: &Transaction<'_>, mut resource: Resource) -> Result<Resource> {
        let id = match resource.id() {
            Some(id) => {
                let deleted: Option<String> = tx
                    .query_row(
                        "SELECT id FROM deleted_resources WHERE id = ?1",
                        [id.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?;
                if deleted.is_some() {
                    return Err(FolioError::Deleted(id.clone()));
                }
                id.clone()
            }
            None => self.minter.mint()?,
        };

        let now = Utc::now();
        let existing_created_at: Option<String> = tx
            .query_row(
                "SELECT created_at FROM resources WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let created_at = match existing_created_at {
            Some(raw) => parse_timestamp(&raw)?,
            None => now,
        };

        resource.mark_persisted(id.clone(), created_at, now);
        let body = serde_json::to_string(&resource)?;

        tx.execute(
            "INSERT OR REPLACE INTO resources (id, kind, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.as_str(),
                resource.kind(),
                body,
                created_at.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "DELETE FROM resource_references WHERE record_id = ?1",
            [id.as_str()],
        )?;

        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO resource_references (record_id, attribute, position, target_id)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (attribute, values) in resource.attributes() {
                for (position, value) in values.iter().enumerate() {
                    if let Some(target) = value.as_id() {
                        insert.execute(params![
                            id.as_str(),
                            attribute,
                            position as i64,
                            target.as_str()
                        ])?;
                    }
                }
            }
        }

        tracing::debug!("Saved {} {}", resource.kind(), id);
        Ok(resource)
    }

    fn query_bodies(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Resource>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, |row| row.get::<_, String>(0))?;

        let mut resources = Vec::new();
        for row in rows {
            resources.push(decode_body(&row?)?);
        }
        Ok(resources)
    }
}

fn decode_body(body: &str) -> Result<Resource> {
    Ok(serde_json::from_str(body)?)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| FolioError::Internal(format!("corrupt timestamp {}: {}", raw, e)))
}

impl MetadataStore for SqliteMetadataStore {
    fn save(&self, mut resource: Resource) -> Result<Resource> {
        self.schemas.validate(&mut resource)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let saved = self.write_resource(&tx, resource)?;
        tx.commit()?;
        Ok(saved)
    }

    fn save_all(&self, resources: Vec<Resource>) -> Result<Vec<Resource>> {
        let resources = validate_all(&self.schemas, resources)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut saved = Vec::with_capacity(resources.len());
        for resource in resources {
            saved.push(self.write_resource(&tx, resource)?);
        }
        tx.commit()?;
        Ok(saved)
    }

    fn find_by(&self, id: &Identifier) -> Result<Option<Resource>> {
        let conn = self.get_conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM resources WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        body.as_deref().map(decode_body).transpose()
    }

    fn update_with(
        &self,
        id: &Identifier,
        change: &mut dyn FnMut(&mut Resource) -> Result<Vec<Resource>>,
    ) -> Result<Option<Vec<Resource>>> {
        let mut conn = self.get_conn()?;
        // IMMEDIATE takes the write lock before the read below
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let body: Option<String> = tx
            .query_row(
                "SELECT body FROM resources WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(body) = body else {
            return Ok(None);
        };

        let batch = validate_all(&self.schemas, apply_change(decode_body(&body)?, change)?)?;
        let mut saved = Vec::with_capacity(batch.len());
        for resource in batch {
            saved.push(self.write_resource(&tx, resource)?);
        }
        tx.commit()?;
        Ok(Some(saved))
    }

    fn find_all(&self) -> Result<ResourceIter> {
        let resources = self.query_bodies("SELECT body FROM resources ORDER BY id", &[])?;
        Ok(Box::new(resources.into_iter()))
    }

    fn find_all_of_kind(&self, kind: &str) -> Result<ResourceIter> {
        let resources = self.query_bodies(
            "SELECT body FROM resources WHERE kind = ?1 ORDER BY id",
            &[&kind],
        )?;
        Ok(Box::new(resources.into_iter()))
    }

    fn count_all_of_kind(&self, kind: &str) -> Result<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM resources WHERE kind = ?1",
            [kind],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn find_inverse_references_by_id(
        &self,
        target: &Identifier,
        attribute: &str,
    ) -> Result<Vec<Resource>> {
        self.query_bodies(
            "SELECT r.body FROM resources r
             WHERE EXISTS (SELECT 1 FROM resources t WHERE t.id = ?2)
               AND r.id IN (
                   SELECT record_id FROM resource_references
                   WHERE attribute = ?1 AND target_id = ?2
               )
             ORDER BY r.id",
            &[&attribute, &target.as_str()],
        )
    }

    fn delete(&self, id: &Identifier) -> Result<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let affected = tx.execute("DELETE FROM resources WHERE id = ?1", [id.as_str()])?;
        if affected > 0 {
            tx.execute(
                "DELETE FROM resource_references WHERE record_id = ?1",
                [id.as_str()],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO deleted_resources (id, deleted_at) VALUES (?1, ?2)",
                params![id.as_str(), Utc::now().to_rfc3339()],
            )?;
        }
        tx.commit()?;

        if affected > 0 {
            tracing::debug!("Deleted resource {}", id);
        }
        Ok(affected > 0)
    }

    fn wipe(&self) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT OR IGNORE INTO deleted_resources (id, deleted_at)
             SELECT id, ?1 FROM resources",
            [Utc::now().to_rfc3339()],
        )?;
        tx.execute("DELETE FROM resource_references", [])?;
        tx.execute("DELETE FROM resources", [])?;
        tx.commit()?;
        Ok(())
    }
}
