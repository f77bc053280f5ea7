//! Database migrations for the concept store.

/// A database migration.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

/// Migration definitions, applied in order.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial concept schema",
    up: MIGRATION_V1_UP,
}];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS concepts (
    oid TEXT PRIMARY KEY,
    symbolic_name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    geometric_embedding TEXT,
    embedding_model_tag TEXT,
    hypervector TEXT,
    codec_tag TEXT,

    stale INTEGER NOT NULL DEFAULT 0,
    deprecated INTEGER NOT NULL DEFAULT 0,

    change_seq INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_concepts_change_seq ON concepts(change_seq);
CREATE INDEX IF NOT EXISTS idx_concepts_stale ON concepts(stale);
CREATE INDEX IF NOT EXISTS idx_concepts_deprecated ON concepts(deprecated);

-- Monotonic change-sequence counter driving the dirty watermark
-- (crate::store::sqlite_store's iter_dirty_since).
CREATE TABLE IF NOT EXISTS change_counter (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    next_seq INTEGER NOT NULL
);
INSERT OR IGNORE INTO change_counter (id, next_seq) VALUES (0, 1);

CREATE TABLE IF NOT EXISTS relations_is_a (
    source_oid TEXT NOT NULL,
    target_oid TEXT NOT NULL,
    PRIMARY KEY (source_oid, target_oid),
    FOREIGN KEY (source_oid) REFERENCES concepts(oid) ON DELETE CASCADE,
    FOREIGN KEY (target_oid) REFERENCES concepts(oid) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS relations_part_of (
    source_oid TEXT NOT NULL,
    target_oid TEXT NOT NULL,
    PRIMARY KEY (source_oid, target_oid),
    FOREIGN KEY (source_oid) REFERENCES concepts(oid) ON DELETE CASCADE,
    FOREIGN KEY (target_oid) REFERENCES concepts(oid) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS relations_associated_with (
    source_oid TEXT NOT NULL,
    target_oid TEXT NOT NULL,
    PRIMARY KEY (source_oid, target_oid),
    FOREIGN KEY (source_oid) REFERENCES concepts(oid) ON DELETE CASCADE,
    FOREIGN KEY (target_oid) REFERENCES concepts(oid) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_is_a_target ON relations_is_a(target_oid);
CREATE INDEX IF NOT EXISTS idx_part_of_target ON relations_part_of(target_oid);
CREATE INDEX IF NOT EXISTS idx_assoc_target ON relations_associated_with(target_oid);

-- Fit codec parameters, persisted as a single JSON blob keyed by the
-- codec's own tag, plus a one-row pointer to the currently published one.
CREATE TABLE IF NOT EXISTS codec_params (
    codec_tag TEXT PRIMARY KEY,
    params_json TEXT NOT NULL,
    fit_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS codec_current (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    codec_tag TEXT NOT NULL REFERENCES codec_params(codec_tag)
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// Get the current schema version from the database.
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply every migration newer than the database's current version.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
