use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{CommitOutcome, RecordStore, StoreKind};
use crate::api::types::{keys, AttachedFile, RecordMetadata, RecordUrl, ScrapedRecord};
use crate::error::{HarvestError, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS projetos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    id_externo INTEGER NOT NULL UNIQUE,
    url TEXT NOT NULL UNIQUE,
    numero_processo TEXT,
    numero_projeto TEXT,
    ementa TEXT,
    data_abertura TEXT,
    data_ultima_tramitacao TEXT,
    situacao TEXT,
    situacao_plenaria TEXT,
    localizacao_atual TEXT,
    has_votacoes INTEGER NOT NULL DEFAULT 0,
    has_tramitacoes INTEGER NOT NULL DEFAULT 0,
    metadata_json TEXT NOT NULL,
    scraped_at TEXT
);

CREATE TABLE IF NOT EXISTS autores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    nome TEXT NOT NULL,
    partido TEXT
);

CREATE TABLE IF NOT EXISTS projeto_autores (
    projeto_id INTEGER NOT NULL REFERENCES projetos(id_externo),
    autor_id INTEGER NOT NULL REFERENCES autores(id),
    ordem INTEGER NOT NULL,
    PRIMARY KEY (projeto_id, autor_id)
);

CREATE TABLE IF NOT EXISTS anexos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    projeto_id INTEGER NOT NULL REFERENCES projetos(id_externo),
    titulo TEXT NOT NULL,
    url TEXT NOT NULL,
    caminho_local TEXT,
    UNIQUE (projeto_id, url)
);

CREATE INDEX IF NOT EXISTS idx_anexos_projeto ON anexos(projeto_id);
"#;

/// Relational store. Every commit is its own transaction, so there is
/// nothing to flush.
#[derive(Debug)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database and its schema
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let is_new_file = !db_path.exists();
        let init_path = db_path.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = Self::connect(&init_path)?;
            conn.execute_batch(SCHEMA)?;

            if is_new_file {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(&init_path, std::fs::Permissions::from_mode(0o600))?;
                }
            }
            Ok(())
        })
        .await
        .map_err(|e| HarvestError::Storage(format!("Failed to spawn database initialization: {}", e)))??;

        Ok(Self { db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Run `f` against a fresh connection on the blocking pool.
    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = Self::connect(&db_path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| HarvestError::Storage(format!("Failed to spawn database operation: {}", e)))?
    }

    fn insert_record(tx: &Transaction<'_>, record: &ScrapedRecord) -> Result<CommitOutcome> {
        let metadata = &record.metadata;
        let metadata_json = serde_json::to_string(metadata)?;

        let inserted = tx.execute(
            r#"
            INSERT OR IGNORE INTO projetos
            (id_externo, url, numero_processo, numero_projeto, ementa, data_abertura,
             data_ultima_tramitacao, situacao, situacao_plenaria, localizacao_atual,
             has_votacoes, has_tramitacoes, metadata_json, scraped_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                record.external_id as i64,
                record.url.as_str(),
                metadata.processing_number(),
                metadata.get(keys::PROJETO),
                metadata.get(keys::EMENTA),
                metadata.opening_date().map(|d| d.to_string()),
                metadata.last_movement_date().map(|d| d.to_string()),
                metadata.status(),
                metadata.plenary_status(),
                metadata.get(keys::LOCALIZACAO_ATUAL),
                record.has_votes,
                record.has_history,
                metadata_json,
                record.scraped_at.map(|t| t.to_rfc3339()),
            ],
        )?;

        if inserted == 0 {
            return Ok(CommitOutcome::Duplicate);
        }

        for (order, author) in metadata.authors().iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO autores (slug, nome, partido) VALUES (?1, ?2, ?3)
                ON CONFLICT(slug) DO UPDATE SET
                    nome = excluded.nome,
                    partido = COALESCE(excluded.partido, autores.partido)
                "#,
                params![author.slug, author.name, author.party],
            )?;
            let author_id: i64 = tx.query_row(
                "SELECT id FROM autores WHERE slug = ?1",
                params![author.slug],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO projeto_autores (projeto_id, autor_id, ordem) VALUES (?1, ?2, ?3)",
                params![record.external_id as i64, author_id, order as i64],
            )?;
        }

        for file in &record.files {
            tx.execute(
                r#"
                INSERT OR IGNORE INTO anexos (projeto_id, titulo, url, caminho_local)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    record.external_id as i64,
                    file.name,
                    file.remote_url,
                    file.local_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                ],
            )?;
        }

        Ok(CommitOutcome::Inserted)
    }
}

struct ProjetoRow {
    id: i64,
    url: String,
    metadata_json: String,
    has_votes: bool,
    has_history: bool,
    scraped_at: Option<String>,
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Sqlite
    }

    async fn load_known_ids(&self) -> Result<HashSet<u64>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT id_externo FROM projetos")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .map(|id| id.map(|id| id as u64))
                .collect::<std::result::Result<HashSet<u64>, _>>()?;
            Ok(ids)
        })
        .await
    }

    async fn commit(&mut self, record: &ScrapedRecord) -> Result<CommitOutcome> {
        let record = record.clone();
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            match Self::insert_record(&tx, &record) {
                Ok(outcome) => {
                    tx.commit()?;
                    debug!("Committed {} ({:?})", record.external_id, outcome);
                    Ok(outcome)
                }
                Err(e) => {
                    if let Err(rollback) = tx.rollback() {
                        warn!("Rollback of {} failed: {}", record.external_id, rollback);
                    }
                    Err(e)
                }
            }
        })
        .await
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    async fn records(&self) -> Result<Vec<ScrapedRecord>> {
        let (rows, attachments) = self
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id_externo, url, metadata_json, has_votacoes, has_tramitacoes, scraped_at
                    FROM projetos ORDER BY id
                    "#,
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(ProjetoRow {
                            id: row.get(0)?,
                            url: row.get(1)?,
                            metadata_json: row.get(2)?,
                            has_votes: row.get(3)?,
                            has_history: row.get(4)?,
                            scraped_at: row.get(5)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                let mut stmt =
                    conn.prepare("SELECT projeto_id, titulo, url, caminho_local FROM anexos ORDER BY id")?;
                let mut attachments: HashMap<i64, Vec<AttachedFile>> = HashMap::new();
                let files = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        AttachedFile {
                            name: row.get(1)?,
                            remote_url: row.get(2)?,
                            local_path: row.get::<_, Option<String>>(3)?.map(PathBuf::from),
                        },
                    ))
                })?;
                for file in files {
                    let (projeto_id, file) = file?;
                    attachments.entry(projeto_id).or_default().push(file);
                }
                Ok((rows, attachments))
            })
            .await?;

        let mut attachments = attachments;
        rows.into_iter()
            .map(|row| -> Result<ScrapedRecord> {
                let metadata: RecordMetadata = serde_json::from_str(&row.metadata_json)?;
                let scraped_at = row
                    .scraped_at
                    .as_deref()
                    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                    .map(|t| t.with_timezone(&Utc));
                Ok(ScrapedRecord {
                    url: RecordUrl::parse(&row.url)?,
                    external_id: row.id as u64,
                    metadata,
                    has_votes: row.has_votes,
                    has_history: row.has_history,
                    files: attachments.remove(&row.id).unwrap_or_default(),
                    scraped_at,
                })
            })
            .collect()
    }
}

impl SqliteStore {
    /// Names of the authors linked to a record, in credit order.
    pub async fn authors_of(&self, external_id: u64) -> Result<Vec<String>> {
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT a.nome FROM projeto_autores pa
                JOIN autores a ON a.id = pa.autor_id
                WHERE pa.projeto_id = ?1 ORDER BY pa.ordem
                "#,
            )?;
            let names = stmt
                .query_map(params![external_id as i64], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(names)
        })
        .await
    }

    /// Whether a record row exists, independent of the other tables.
    pub async fn contains(&self, external_id: u64) -> Result<bool> {
        self.with_connection(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM projetos WHERE id_externo = ?1",
                    params![external_id as i64],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }
}
