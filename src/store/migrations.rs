//! Numbered migrations, applied in order, recorded in `kysely_migration`,
//! each wrapped in its own transaction (spec §4.1).
//!
//! The tracking table name matches the persisted layout named in spec §6
//! rather than the teacher's own `migration` table, since that name is part
//! of this system's on-disk contract.

use sqlx::SqlitePool;

/// One migration: a name (used as the dedup/ordering key in
/// `kysely_migration`) and the SQL to run inside its own transaction.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

const INDEX_MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_sources",
        sql: r#"
            CREATE TABLE IF NOT EXISTS sources (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                name TEXT NOT NULL UNIQUE,
                owner TEXT,
                repo TEXT,
                library_db_path TEXT NOT NULL,
                last_sync_at TEXT,
                last_commit TEXT,
                last_etag TEXT,
                last_error TEXT,
                git_ref TEXT,
                docs_path TEXT,
                ingest_mode TEXT,
                version_label TEXT,
                root_url TEXT,
                allowed_paths TEXT NOT NULL DEFAULT '[]',
                denied_paths TEXT NOT NULL DEFAULT '[]',
                max_depth INTEGER,
                max_pages INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        name: "0002_source_versions",
        sql: r#"
            CREATE TABLE IF NOT EXISTS source_versions (
                source_id TEXT NOT NULL,
                version_label TEXT NOT NULL,
                git_ref TEXT,
                commit_sha TEXT,
                tree_hash TEXT,
                etag TEXT,
                synced_at TEXT NOT NULL,
                PRIMARY KEY (source_id, version_label)
            );
            CREATE INDEX IF NOT EXISTS idx_source_versions_source
                ON source_versions(source_id);
        "#,
    },
];

const LIBRARY_MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_document_blobs",
        sql: r#"
            CREATE TABLE IF NOT EXISTS document_blobs (
                hash TEXT PRIMARY KEY,
                content TEXT NOT NULL
            );
        "#,
    },
    Migration {
        name: "0002_documents",
        sql: r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                version_label TEXT NOT NULL,
                uri TEXT NOT NULL,
                title TEXT NOT NULL,
                hash TEXT NOT NULL REFERENCES document_blobs(hash),
                content_type TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(path, version_label)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_active
                ON documents(version_label, active);
        "#,
    },
    Migration {
        name: "0003_chunks",
        sql: r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL REFERENCES documents(id),
                position INTEGER NOT NULL,
                chunk_type TEXT NOT NULL,
                language TEXT,
                symbol_name TEXT,
                symbol_type TEXT,
                symbol_id TEXT,
                symbol_part_index INTEGER,
                symbol_part_count INTEGER,
                line_start INTEGER,
                line_end INTEGER,
                char_start INTEGER,
                char_end INTEGER,
                token_count INTEGER NOT NULL,
                chunk_sha TEXT NOT NULL,
                content TEXT NOT NULL,
                doc_path TEXT NOT NULL,
                doc_uri TEXT NOT NULL,
                doc_title TEXT NOT NULL,
                context_path TEXT NOT NULL,
                UNIQUE(document_id, position)
            );
        "#,
    },
    Migration {
        name: "0004_chunks_fts",
        sql: r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
                content,
                doc_title,
                doc_path,
                context_path,
                doc_uri,
                tokenize = 'porter unicode61',
                content = 'chunks',
                content_rowid = 'id'
            );

            CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
                INSERT INTO chunks_fts(rowid, content, doc_title, doc_path, context_path, doc_uri)
                VALUES (new.id, new.content, new.doc_title, new.doc_path, new.context_path, new.doc_uri);
            END;

            CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
                INSERT INTO chunks_fts(chunks_fts, rowid, content, doc_title, doc_path, context_path, doc_uri)
                VALUES ('delete', old.id, old.content, old.doc_title, old.doc_path, old.context_path, old.doc_uri);
            END;

            CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
                INSERT INTO chunks_fts(chunks_fts, rowid, content, doc_title, doc_path, context_path, doc_uri)
                VALUES ('delete', old.id, old.content, old.doc_title, old.doc_path, old.context_path, old.doc_uri);
                INSERT INTO chunks_fts(rowid, content, doc_title, doc_path, context_path, doc_uri)
                VALUES (new.id, new.content, new.doc_title, new.doc_path, new.context_path, new.doc_uri);
            END;
        "#,
    },
    Migration {
        name: "0005_chunk_vectors",
        sql: r#"
            CREATE TABLE IF NOT EXISTS chunk_vectors (
                chunk_id INTEGER NOT NULL REFERENCES chunks(id),
                document_id TEXT NOT NULL,
                model_uri TEXT NOT NULL,
                dims INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                PRIMARY KEY (chunk_id, model_uri)
            );
        "#,
    },
    Migration {
        name: "0006_crawl_pages",
        sql: r#"
            CREATE TABLE IF NOT EXISTS crawl_pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                url TEXT NOT NULL,
                normalized_url TEXT NOT NULL,
                depth INTEGER NOT NULL,
                status TEXT NOT NULL,
                last_error TEXT,
                UNIQUE(source_id, normalized_url)
            );
            CREATE INDEX IF NOT EXISTS idx_crawl_pages_pop
                ON crawl_pages(status, depth, id);
        "#,
    },
];

async fn ensure_migration_table(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS kysely_migration (name TEXT PRIMARY KEY, applied_at TEXT NOT NULL)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn apply(pool: &SqlitePool, migrations: &[Migration]) -> sqlx::Result<()> {
    ensure_migration_table(pool).await?;

    for migration in migrations {
        let already: Option<String> =
            sqlx::query_scalar("SELECT name FROM kysely_migration WHERE name = ?")
                .bind(migration.name)
                .fetch_optional(pool)
                .await?;
        if already.is_some() {
            continue;
        }

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(migration.sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO kysely_migration (name, applied_at) VALUES (?, ?)")
            .bind(migration.name)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::debug!(migration = migration.name, "applied migration");
    }

    Ok(())
}

/// Apply all index-DB migrations.
pub async fn run_index_migrations(pool: &SqlitePool) -> sqlx::Result<()> {
    apply(pool, INDEX_MIGRATIONS).await
}

/// Apply all library-DB migrations.
pub async fn run_library_migrations(pool: &SqlitePool) -> sqlx::Result<()> {
    apply(pool, LIBRARY_MIGRATIONS).await
}

/// (Re)create the vector table for a library DB at the given dimensionality.
/// Dropping and recreating is the documented response to a dimension change
/// (spec §3 invariant 5, §4.1, §9, §8 scenario 6).
pub async fn ensure_vector_table(pool: &SqlitePool, dims: i64) -> sqlx::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chunk_vectors_meta (id INTEGER PRIMARY KEY CHECK (id = 1), dims INTEGER NOT NULL)",
    )
    .execute(pool)
    .await?;

    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT dims FROM chunk_vectors_meta WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;

    if let Some(existing_dims) = existing {
        if existing_dims == dims {
            return Ok(());
        }
        tracing::warn!(
            old_dims = existing_dims,
            new_dims = dims,
            "embedding dimensionality changed, rebuilding vector table"
        );
        sqlx::query("DELETE FROM chunk_vectors").execute(pool).await?;
    }

    sqlx::query("INSERT OR REPLACE INTO chunk_vectors_meta (id, dims) VALUES (1, ?)")
        .bind(dims)
        .execute(pool)
        .await?;

    Ok(())
}
