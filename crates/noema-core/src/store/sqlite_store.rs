//! SQLite-backed Concept Store (C1).
//!
//! Uses separate reader/writer connections for interior mutability, the way
//! the storage layer this crate grew out of does: every method takes `&self`
//! so `ConceptStore` is `Send + Sync` and callers hold it behind `Arc`
//! instead of `Arc<Mutex<_>>`.

use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::codec::LaplaceCodec;
use crate::concept::{Concept, RelationKind, Relations};
use crate::oid::Oid;

/// Concept store error type.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("concept not found: {0}")]
    NotFound(Oid),
    #[error("write conflict, retry: {0}")]
    Conflict(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("initialization error: {0}")]
    Init(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

fn next_change_seq(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "UPDATE change_counter SET next_seq = next_seq + 1 WHERE id = 0 RETURNING next_seq - 1",
        [],
        |row| row.get(0),
    )
}

fn relation_table(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::IsA => "relations_is_a",
        RelationKind::PartOf => "relations_part_of",
        RelationKind::AssociatedWith => "relations_associated_with",
    }
}

fn load_relations(conn: &Connection, oid: &Oid) -> Result<Relations> {
    let mut relations = Relations::default();
    for kind in [RelationKind::IsA, RelationKind::PartOf, RelationKind::AssociatedWith] {
        let table = relation_table(kind);
        let mut stmt = conn.prepare(&format!("SELECT target_oid FROM {table} WHERE source_oid = ?1"))?;
        let targets = stmt
            .query_map(params![oid.as_str()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for target in targets {
            relations.add(kind, Oid::from(target));
        }
    }
    Ok(relations)
}

/// Transactional, durable store of [`Concept`]s.
///
/// Every mutation bumps a monotonic `change_seq` counter on the affected
/// row; [`ConceptStore::iter_dirty_since`] uses that counter as a watermark
/// so the maintenance sync worker can resume an interrupted sweep exactly
/// where it left off.
pub struct ConceptStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

/// An open write transaction against a [`ConceptStore`].
///
/// Every mutator here writes straight to the held connection, but nothing
/// becomes visible to the store's reader connection until [`ConceptTxn::commit`]
/// runs `COMMIT` (SQLite's WAL isolation does the rest). Dropping a
/// transaction without calling `commit`/`abort` rolls it back, so a panic or
/// an early `?` return never leaves a half-applied write held open.
///
/// Built on a raw `BEGIN IMMEDIATE`/`COMMIT` pair over the held
/// `MutexGuard` rather than `rusqlite::Transaction`, which borrows the
/// `Connection` it wraps and so cannot be stored next to the guard it must
/// borrow from in the same struct.
pub struct ConceptTxn<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl<'a> ConceptTxn<'a> {
    fn begin(conn: MutexGuard<'a, Connection>) -> Result<Self> {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self { conn, finished: false })
    }

    /// Commit every mutation issued through this transaction.
    pub fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    /// Discard every mutation issued through this transaction.
    pub fn abort(mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        self.finished = true;
        Ok(())
    }

    /// Insert a brand-new concept.
    pub fn create(&self, concept: &Concept) -> Result<()> {
        let embedding_json = concept
            .geometric_embedding
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Init(e.to_string()))?;
        let hypervector_json = concept
            .hypervector
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Init(e.to_string()))?;

        let result = self.conn.execute(
            "INSERT INTO concepts (
                oid, symbolic_name, created_at, updated_at,
                geometric_embedding, embedding_model_tag, hypervector, codec_tag,
                stale, deprecated, change_seq
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                concept.oid.as_str(),
                concept.symbolic_name,
                concept.created_at.to_rfc3339(),
                concept.updated_at.to_rfc3339(),
                embedding_json,
                concept.embedding_model_tag,
                hypervector_json,
                concept.codec_tag,
                concept.stale as i64,
                concept.deprecated as i64,
                next_change_seq(&self.conn)?,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_busy(&e) => Err(StoreError::Conflict(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Set the geometric embedding for a concept (GCE ingestion path).
    ///
    /// Per spec, this also marks the hypervector stale: its encoding was
    /// produced from the embedding being replaced. A caller that supplies a
    /// fresh hypervector in the same transaction (`set_hypervector` after
    /// this call) clears `stale` again, since that write lands last.
    pub fn set_embedding(&self, oid: &Oid, embedding: Vec<f32>, model_tag: String) -> Result<()> {
        let json = serde_json::to_string(&embedding).map_err(|e| StoreError::Init(e.to_string()))?;
        let seq = next_change_seq(&self.conn)?;
        let rows = self.conn.execute(
            "UPDATE concepts SET geometric_embedding = ?1, embedding_model_tag = ?2,
                stale = 1, updated_at = ?3, change_seq = ?4
             WHERE oid = ?5",
            params![json, model_tag, Utc::now().to_rfc3339(), seq, oid.as_str()],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(oid.clone()));
        }
        Ok(())
    }

    /// Set the hypervector encoding for a concept, clearing `stale`.
    pub fn set_hypervector(&self, oid: &Oid, hypervector: Vec<i8>, codec_tag: String) -> Result<()> {
        let json = serde_json::to_string(&hypervector).map_err(|e| StoreError::Init(e.to_string()))?;
        let seq = next_change_seq(&self.conn)?;
        let rows = self.conn.execute(
            "UPDATE concepts SET hypervector = ?1, codec_tag = ?2, stale = 0,
                updated_at = ?3, change_seq = ?4
             WHERE oid = ?5",
            params![json, codec_tag, Utc::now().to_rfc3339(), seq, oid.as_str()],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(oid.clone()));
        }
        Ok(())
    }

    /// Mark a concept's hypervector stale (its codec_tag no longer matches
    /// the live codec). Does not re-encode; that's the sync worker's job.
    pub fn mark_stale(&self, oid: &Oid) -> Result<()> {
        let seq = next_change_seq(&self.conn)?;
        let rows = self.conn.execute(
            "UPDATE concepts SET stale = 1, updated_at = ?1, change_seq = ?2 WHERE oid = ?3",
            params![Utc::now().to_rfc3339(), seq, oid.as_str()],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(oid.clone()));
        }
        Ok(())
    }

    /// Mark every live (non-deprecated) concept stale. Called after a codec refit.
    pub fn mark_all_stale(&self) -> Result<usize> {
        let seq = next_change_seq(&self.conn)?;
        let rows = self.conn.execute(
            "UPDATE concepts SET stale = 1, updated_at = ?1, change_seq = ?2 WHERE deprecated = 0",
            params![Utc::now().to_rfc3339(), seq],
        )?;
        Ok(rows)
    }

    pub fn mark_deprecated(&self, oid: &Oid) -> Result<()> {
        let seq = next_change_seq(&self.conn)?;
        let rows = self.conn.execute(
            "UPDATE concepts SET deprecated = 1, updated_at = ?1, change_seq = ?2 WHERE oid = ?3",
            params![Utc::now().to_rfc3339(), seq, oid.as_str()],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(oid.clone()));
        }
        Ok(())
    }

    pub fn add_relation(&self, source: &Oid, kind: RelationKind, target: &Oid) -> Result<()> {
        let table = relation_table(kind);
        self.conn.execute(
            &format!("INSERT OR IGNORE INTO {table} (source_oid, target_oid) VALUES (?1, ?2)"),
            params![source.as_str(), target.as_str()],
        )?;
        let seq = next_change_seq(&self.conn)?;
        self.conn.execute(
            "UPDATE concepts SET updated_at = ?1, change_seq = ?2 WHERE oid = ?3",
            params![Utc::now().to_rfc3339(), seq, source.as_str()],
        )?;
        Ok(())
    }

    pub fn remove_relation(&self, source: &Oid, kind: RelationKind, target: &Oid) -> Result<()> {
        let table = relation_table(kind);
        self.conn.execute(
            &format!("DELETE FROM {table} WHERE source_oid = ?1 AND target_oid = ?2"),
            params![source.as_str(), target.as_str()],
        )?;
        let seq = next_change_seq(&self.conn)?;
        self.conn.execute(
            "UPDATE concepts SET updated_at = ?1, change_seq = ?2 WHERE oid = ?3",
            params![Utc::now().to_rfc3339(), seq, source.as_str()],
        )?;
        Ok(())
    }
}

impl Drop for ConceptTxn<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

impl ConceptStore {
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open (creating if needed) the store at `db_path`, or the platform
    /// default data directory if `None`.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("com", "noema", "core").ok_or_else(|| {
                    StoreError::Init("could not determine project directories".to_string())
                })?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(0o700);
                    let _ = std::fs::set_permissions(data_dir, perms);
                }
                data_dir.join("noema.db")
            }
        };

        let writer_conn = Connection::open(&path)?;

        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    /// In-memory store, for tests. Reader and writer connect to the same
    /// process-local shared-cache database (a bare `:memory:` connection
    /// per handle would give each its own, disconnected database).
    pub fn open_in_memory() -> Result<Self> {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let uri = format!("file:noema_mem_{id}?mode=memory&cache=shared");
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let writer_conn = Connection::open_with_flags(&uri, flags)?;
        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open_with_flags(&uri, flags)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    /// Open a transaction. Every mutating call on [`ConceptStore`] itself is
    /// a thin `begin` + one `ConceptTxn` method + `commit` wrapper over
    /// this; callers that need more than one mutation to land atomically
    /// should use this directly instead.
    pub fn begin(&self) -> Result<ConceptTxn<'_>> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("writer lock poisoned".into()))?;
        ConceptTxn::begin(writer)
    }

    /// Insert a brand-new concept.
    pub fn create(&self, concept: &Concept) -> Result<()> {
        let txn = self.begin()?;
        txn.create(concept)?;
        txn.commit()
    }

    /// Fetch a concept by OID, including its relations.
    pub fn get(&self, oid: &Oid) -> Result<Option<Concept>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("reader lock poisoned".into()))?;

        let row = reader
            .query_row(
                "SELECT symbolic_name, created_at, updated_at, geometric_embedding,
                        embedding_model_tag, hypervector, codec_tag, stale, deprecated
                 FROM concepts WHERE oid = ?1",
                params![oid.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, i64>(7)?,
                        row.get::<_, i64>(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((name, created_at, updated_at, embedding, model_tag, hv, codec_tag, stale, deprecated)) =
            row
        else {
            return Ok(None);
        };

        let relations = load_relations(&reader, oid)?;

        Ok(Some(Concept {
            oid: oid.clone(),
            symbolic_name: name,
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StoreError::Init(e.to_string()))?,
            updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StoreError::Init(e.to_string()))?,
            geometric_embedding: embedding
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(|e| StoreError::Init(e.to_string()))?,
            embedding_model_tag: model_tag,
            hypervector: hv
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(|e| StoreError::Init(e.to_string()))?,
            codec_tag,
            stale: stale != 0,
            deprecated: deprecated != 0,
            relations,
        }))
    }

    /// Set the geometric embedding for a concept (GCE ingestion path).
    pub fn set_embedding(&self, oid: &Oid, embedding: Vec<f32>, model_tag: String) -> Result<()> {
        let txn = self.begin()?;
        txn.set_embedding(oid, embedding, model_tag)?;
        txn.commit()
    }

    /// Set the hypervector encoding for a concept, clearing `stale`.
    pub fn set_hypervector(&self, oid: &Oid, hypervector: Vec<i8>, codec_tag: String) -> Result<()> {
        let txn = self.begin()?;
        txn.set_hypervector(oid, hypervector, codec_tag)?;
        txn.commit()
    }

    /// Mark a concept's hypervector stale (its codec_tag no longer matches
    /// the live codec). Does not re-encode; that's the sync worker's job.
    pub fn mark_stale(&self, oid: &Oid) -> Result<()> {
        let txn = self.begin()?;
        txn.mark_stale(oid)?;
        txn.commit()
    }

    /// Mark every live (non-deprecated) concept stale. Called after a codec refit.
    pub fn mark_all_stale(&self) -> Result<usize> {
        let txn = self.begin()?;
        let rows = txn.mark_all_stale()?;
        txn.commit()?;
        Ok(rows)
    }

    pub fn mark_deprecated(&self, oid: &Oid) -> Result<()> {
        let txn = self.begin()?;
        txn.mark_deprecated(oid)?;
        txn.commit()
    }

    pub fn add_relation(&self, source: &Oid, kind: RelationKind, target: &Oid) -> Result<()> {
        let txn = self.begin()?;
        txn.add_relation(source, kind, target)?;
        txn.commit()
    }

    pub fn remove_relation(&self, source: &Oid, kind: RelationKind, target: &Oid) -> Result<()> {
        let txn = self.begin()?;
        txn.remove_relation(source, kind, target)?;
        txn.commit()
    }

    /// All non-deprecated concepts, unordered.
    pub fn iter_all(&self) -> Result<Vec<Concept>> {
        let oids = {
            let reader = self
                .reader
                .lock()
                .map_err(|_| StoreError::Init("reader lock poisoned".into()))?;
            let mut stmt = reader.prepare("SELECT oid FROM concepts WHERE deprecated = 0")?;
            stmt.query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        oids.into_iter()
            .map(|oid| {
                self.get(&Oid::from(oid.clone()))?
                    .ok_or_else(|| StoreError::NotFound(Oid::from(oid)))
            })
            .collect()
    }

    /// Concepts whose `change_seq` exceeds `watermark`, plus the new high
    /// watermark to pass on the next sweep. The maintenance sync worker only
    /// advances its stored watermark after successfully applying these to
    /// both L1 and L2 (spec invariant: a crash mid-sweep just replays).
    pub fn iter_dirty_since(&self, watermark: i64) -> Result<(Vec<Concept>, i64)> {
        let rows: Vec<(String, i64)> = {
            let reader = self
                .reader
                .lock()
                .map_err(|_| StoreError::Init("reader lock poisoned".into()))?;
            let mut stmt = reader.prepare(
                "SELECT oid, change_seq FROM concepts WHERE change_seq > ?1 ORDER BY change_seq ASC",
            )?;
            stmt.query_map(params![watermark], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let new_watermark = rows.last().map(|(_, seq)| *seq).unwrap_or(watermark);
        let concepts = rows
            .into_iter()
            .filter_map(|(oid, _)| self.get(&Oid::from(oid)).transpose())
            .collect::<Result<Vec<_>>>()?;
        Ok((concepts, new_watermark))
    }

    /// Persist a freshly fit codec's parameters, keyed by its own tag, and
    /// publish it as the current one.
    pub fn save_codec(&self, codec: &LaplaceCodec) -> Result<()> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("writer lock poisoned".into()))?;
        let blob = codec.to_json().map_err(|e| StoreError::Init(e.to_string()))?;
        writer.execute(
            "INSERT OR REPLACE INTO codec_params (codec_tag, params_json, fit_at) VALUES (?1, ?2, ?3)",
            params![codec.tag(), blob, Utc::now().to_rfc3339()],
        )?;
        writer.execute(
            "INSERT INTO codec_current (id, codec_tag) VALUES (0, ?1)
             ON CONFLICT(id) DO UPDATE SET codec_tag = excluded.codec_tag",
            params![codec.tag()],
        )?;
        Ok(())
    }

    /// Load whichever codec is currently published, if a `fit_codec` has
    /// ever succeeded against this store.
    pub fn load_current_codec(&self) -> Result<Option<LaplaceCodec>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("reader lock poisoned".into()))?;
        let blob: Option<String> = reader
            .query_row(
                "SELECT p.params_json FROM codec_current c
                 JOIN codec_params p ON p.codec_tag = c.codec_tag
                 WHERE c.id = 0",
                [],
                |row| row.get(0),
            )
            .optional()?;
        blob.map(|b| LaplaceCodec::from_json(&b).map_err(|e| StoreError::Init(e.to_string())))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConceptStore {
        ConceptStore::open_in_memory().unwrap()
    }

    #[test]
    fn create_and_get_roundtrips() {
        let store = store();
        let c = Concept::new("dog".to_string());
        store.create(&c).unwrap();
        let fetched = store.get(&c.oid).unwrap().unwrap();
        assert_eq!(fetched.symbolic_name, "dog");
    }

    #[test]
    fn get_missing_returns_none() {
        let store = store();
        assert!(store.get(&Oid::new()).unwrap().is_none());
    }

    #[test]
    fn set_embedding_then_set_hypervector_clears_stale() {
        let store = store();
        let c = Concept::new("cat".to_string());
        store.create(&c).unwrap();
        store.set_embedding(&c.oid, vec![1.0, 2.0], "m1".to_string()).unwrap();
        assert!(store.get(&c.oid).unwrap().unwrap().stale);
        store.set_hypervector(&c.oid, vec![1, -1], "codec1".to_string()).unwrap();
        assert!(!store.get(&c.oid).unwrap().unwrap().stale);
    }

    #[test]
    fn set_embedding_marks_hypervector_stale() {
        let store = store();
        let c = Concept::new("cat".to_string());
        store.create(&c).unwrap();
        store.set_embedding(&c.oid, vec![1.0, 2.0], "m1".to_string()).unwrap();
        store.set_hypervector(&c.oid, vec![1, -1], "codec1".to_string()).unwrap();
        assert!(!store.get(&c.oid).unwrap().unwrap().stale);

        // A later embedding update invalidates the hypervector that was
        // encoded from the old embedding, even without an explicit
        // `mark_stale` call.
        store.set_embedding(&c.oid, vec![3.0, 4.0], "m1".to_string()).unwrap();
        assert!(store.get(&c.oid).unwrap().unwrap().stale);
    }

    #[test]
    fn relations_roundtrip() {
        let store = store();
        let a = Concept::new("king".to_string());
        let b = Concept::new("royalty".to_string());
        store.create(&a).unwrap();
        store.create(&b).unwrap();
        store.add_relation(&a.oid, RelationKind::IsA, &b.oid).unwrap();

        let fetched = store.get(&a.oid).unwrap().unwrap();
        assert!(fetched.relations.is_a.contains(&b.oid));

        store.remove_relation(&a.oid, RelationKind::IsA, &b.oid).unwrap();
        let fetched = store.get(&a.oid).unwrap().unwrap();
        assert!(!fetched.relations.is_a.contains(&b.oid));
    }

    #[test]
    fn iter_dirty_since_only_returns_changes_past_watermark() {
        let store = store();
        let a = Concept::new("a".to_string());
        store.create(&a).unwrap();
        let (dirty, wm1) = store.iter_dirty_since(0).unwrap();
        assert_eq!(dirty.len(), 1);

        let (dirty2, wm2) = store.iter_dirty_since(wm1).unwrap();
        assert!(dirty2.is_empty());
        assert_eq!(wm1, wm2);

        store.set_embedding(&a.oid, vec![1.0], "m".to_string()).unwrap();
        let (dirty3, wm3) = store.iter_dirty_since(wm1).unwrap();
        assert_eq!(dirty3.len(), 1);
        assert!(wm3 > wm1);
    }

    #[test]
    fn mark_deprecated_excludes_from_iter_all() {
        let store = store();
        let a = Concept::new("a".to_string());
        store.create(&a).unwrap();
        store.mark_deprecated(&a.oid).unwrap();
        assert!(store.iter_all().unwrap().is_empty());
    }

    #[test]
    fn aborted_transaction_is_invisible_to_readers() {
        let store = store();
        let txn = store.begin().unwrap();
        let c = Concept::new("ghost".to_string());
        txn.create(&c).unwrap();
        txn.abort().unwrap();
        assert!(store.get(&c.oid).unwrap().is_none());
    }

    #[test]
    fn dropping_a_transaction_without_commit_rolls_back() {
        let store = store();
        let c = Concept::new("dropped".to_string());
        {
            let txn = store.begin().unwrap();
            txn.create(&c).unwrap();
            // txn dropped here without commit/abort
        }
        assert!(store.get(&c.oid).unwrap().is_none());
    }

    #[test]
    fn multiple_mutations_in_one_transaction_commit_together() {
        let store = store();
        let a = Concept::new("multi".to_string());
        let txn = store.begin().unwrap();
        txn.create(&a).unwrap();
        txn.set_embedding(&a.oid, vec![1.0, 0.0], "m".to_string()).unwrap();
        txn.set_hypervector(&a.oid, vec![1, -1], "codec1".to_string()).unwrap();
        txn.commit().unwrap();

        let fetched = store.get(&a.oid).unwrap().unwrap();
        assert_eq!(fetched.geometric_embedding, Some(vec![1.0, 0.0]));
        assert!(!fetched.stale);
    }

    fn sample_codec() -> LaplaceCodec {
        let samples: Vec<Vec<f32>> = (0..16)
            .map(|i| vec![(i as f32).sin(), (i as f32).cos(), i as f32 * 0.1])
            .collect();
        LaplaceCodec::fit(&samples, 64, 4, 7).unwrap()
    }

    #[test]
    fn no_codec_saved_yet_returns_none() {
        let store = store();
        assert!(store.load_current_codec().unwrap().is_none());
    }

    #[test]
    fn save_then_load_codec_roundtrips() {
        let store = store();
        let codec = sample_codec();
        store.save_codec(&codec).unwrap();

        let loaded = store.load_current_codec().unwrap().unwrap();
        assert_eq!(loaded.tag(), codec.tag());

        let probe = vec![vec![0.3, -0.1, 0.7]];
        assert_eq!(
            codec.encode(&probe).unwrap(),
            loaded.encode(&probe).unwrap()
        );
    }

    #[test]
    fn saving_a_second_codec_repoints_current() {
        let store = store();
        let first = sample_codec();
        store.save_codec(&first).unwrap();

        let samples: Vec<Vec<f32>> = (0..16)
            .map(|i| vec![(i as f32 * 0.3).sin(), (i as f32 * 0.7).cos(), i as f32])
            .collect();
        let second = LaplaceCodec::fit(&samples, 64, 4, 11).unwrap();
        store.save_codec(&second).unwrap();

        let loaded = store.load_current_codec().unwrap().unwrap();
        assert_eq!(loaded.tag(), second.tag());
    }
}
