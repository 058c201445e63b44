use crate::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// One persisted aggregate per (funnel_name, periodo). The pair is the upsert
/// conflict target, so a period can never accumulate duplicate rows for the
/// same funnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedFunnel {
    pub id: Option<Uuid>,
    pub funnel_name: String,
    pub periodo: String,
    pub investido: f64,
    pub faturamento_trafego: f64,
    pub roas_trafego: f64,
    pub numero_alunos: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "success" => SyncStatus::Success,
            _ => SyncStatus::Error,
        }
    }
}

/// Append-only audit record, one per sync run regardless of outcome. Never
/// updated or deleted by this pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: Option<Uuid>,
    pub log_type: String,
    pub status: SyncStatus,
    pub message: String,
    pub records_synced: i64,
    pub created_at: DateTime<Utc>,
}

impl SyncLogEntry {
    pub fn success(log_type: &str, message: String, records_synced: i64) -> Self {
        Self {
            id: None,
            log_type: log_type.to_string(),
            status: SyncStatus::Success,
            message,
            records_synced,
            created_at: Utc::now(),
        }
    }

    pub fn error(log_type: &str, message: String) -> Self {
        Self {
            id: None,
            log_type: log_type.to_string(),
            status: SyncStatus::Error,
            message,
            records_synced: 0,
            created_at: Utc::now(),
        }
    }
}

/// Storage seam for aggregates and the sync log.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert or overwrite the row keyed by (funnel_name, periodo). Last write
    /// wins; no partial-field merge. On return the record carries the
    /// persisted id and created_at.
    async fn upsert_funnel(&self, funnel: &mut AggregatedFunnel) -> Result<()>;

    /// Persisted rows for a period, most recently updated first.
    async fn funnels_for_period(&self, periodo: &str) -> Result<Vec<AggregatedFunnel>>;

    /// Appends one audit entry and assigns it an id.
    async fn append_sync_log(&self, entry: &mut SyncLogEntry) -> Result<()>;

    /// Most recent log entry of the given type, if any.
    async fn latest_sync_log(&self, log_type: &str) -> Result<Option<SyncLogEntry>>;
}

/// In-memory storage implementation for development/testing.
pub struct InMemoryStorage {
    funnels: Arc<Mutex<HashMap<(String, String), AggregatedFunnel>>>,
    sync_logs: Arc<Mutex<Vec<SyncLogEntry>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            funnels: Arc::new(Mutex::new(HashMap::new())),
            sync_logs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of audit entries written so far; test helper.
    pub fn sync_log_count(&self) -> usize {
        self.sync_logs.lock().unwrap().len()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_funnel(&self, funnel: &mut AggregatedFunnel) -> Result<()> {
        let key = (funnel.funnel_name.clone(), funnel.periodo.clone());
        let mut funnels = self.funnels.lock().unwrap();

        if let Some(existing) = funnels.get(&key) {
            funnel.id = existing.id;
            funnel.created_at = existing.created_at;
        } else {
            funnel.id = Some(Uuid::new_v4());
        }
        funnels.insert(key, funnel.clone());

        debug!(
            funnel = %funnel.funnel_name,
            periodo = %funnel.periodo,
            "Upserted aggregated funnel"
        );
        Ok(())
    }

    async fn funnels_for_period(&self, periodo: &str) -> Result<Vec<AggregatedFunnel>> {
        let funnels = self.funnels.lock().unwrap();
        let mut rows: Vec<AggregatedFunnel> = funnels
            .values()
            .filter(|f| f.periodo == periodo)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn append_sync_log(&self, entry: &mut SyncLogEntry) -> Result<()> {
        entry.id = Some(Uuid::new_v4());
        let mut logs = self.sync_logs.lock().unwrap();
        logs.push(entry.clone());
        debug!(log_type = %entry.log_type, status = ?entry.status, "Appended sync log entry");
        Ok(())
    }

    async fn latest_sync_log(&self, log_type: &str) -> Result<Option<SyncLogEntry>> {
        let logs = self.sync_logs.lock().unwrap();
        Ok(logs
            .iter()
            .filter(|e| e.log_type == log_type)
            .max_by_key(|e| e.created_at)
            .cloned())
    }
}

/// SQLite-backed storage. The conflict target on (funnel_name, periodo) makes
/// the upsert idempotent at the statement level; no application locking is
/// layered on top.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| SyncError::Persistence(format!("failed to open database: {e}")))?;
        Self::from_connection(conn)
    }

    /// Private in-memory database; test helper.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SyncError::Persistence(format!("failed to open database: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS funis_agregados (
                id                  TEXT PRIMARY KEY,
                funnel_name         TEXT NOT NULL,
                periodo             TEXT NOT NULL,
                investido           REAL NOT NULL,
                faturamento_trafego REAL NOT NULL,
                roas_trafego        REAL NOT NULL,
                numero_alunos       INTEGER NOT NULL,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL,
                UNIQUE (funnel_name, periodo)
            );
            CREATE TABLE IF NOT EXISTS sync_logs (
                id             TEXT PRIMARY KEY,
                log_type       TEXT NOT NULL,
                status         TEXT NOT NULL,
                message        TEXT NOT NULL,
                records_synced INTEGER NOT NULL,
                created_at     TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| SyncError::Persistence(format!("failed to create schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_funnel(row: &rusqlite::Row<'_>) -> rusqlite::Result<AggregatedFunnel> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(AggregatedFunnel {
        id: Uuid::parse_str(&id).ok(),
        funnel_name: row.get(1)?,
        periodo: row.get(2)?,
        investido: row.get(3)?,
        faturamento_trafego: row.get(4)?,
        roas_trafego: row.get(5)?,
        numero_alunos: row.get(6)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn upsert_funnel(&self, funnel: &mut AggregatedFunnel) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let new_id = funnel.id.unwrap_or_else(Uuid::new_v4);

        conn.execute(
            "INSERT INTO funis_agregados
                 (id, funnel_name, periodo, investido, faturamento_trafego,
                  roas_trafego, numero_alunos, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(funnel_name, periodo) DO UPDATE SET
                 investido = excluded.investido,
                 faturamento_trafego = excluded.faturamento_trafego,
                 roas_trafego = excluded.roas_trafego,
                 numero_alunos = excluded.numero_alunos,
                 updated_at = excluded.updated_at",
            params![
                new_id.to_string(),
                funnel.funnel_name,
                funnel.periodo,
                funnel.investido,
                funnel.faturamento_trafego,
                funnel.roas_trafego,
                funnel.numero_alunos,
                funnel.created_at.to_rfc3339(),
                funnel.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| SyncError::Persistence(format!("failed to upsert funnel: {e}")))?;

        // Reflect the persisted identity: on conflict the original id and
        // created_at survive, not the ones we just proposed.
        let (id, created_at): (String, String) = conn
            .query_row(
                "SELECT id, created_at FROM funis_agregados
                 WHERE funnel_name = ?1 AND periodo = ?2",
                params![funnel.funnel_name, funnel.periodo],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| SyncError::Persistence(format!("failed to read back funnel: {e}")))?;
        funnel.id = Uuid::parse_str(&id).ok();
        funnel.created_at = parse_timestamp(&created_at);

        debug!(
            funnel = %funnel.funnel_name,
            periodo = %funnel.periodo,
            "Upserted aggregated funnel"
        );
        Ok(())
    }

    async fn funnels_for_period(&self, periodo: &str) -> Result<Vec<AggregatedFunnel>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, funnel_name, periodo, investido, faturamento_trafego,
                        roas_trafego, numero_alunos, created_at, updated_at
                 FROM funis_agregados
                 WHERE periodo = ?1
                 ORDER BY updated_at DESC",
            )
            .map_err(|e| SyncError::Persistence(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(params![periodo], row_to_funnel)
            .map_err(|e| SyncError::Persistence(format!("failed to query funnels: {e}")))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(
                row.map_err(|e| SyncError::Persistence(format!("failed to read row: {e}")))?,
            );
        }
        Ok(results)
    }

    async fn append_sync_log(&self, entry: &mut SyncLogEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4();

        conn.execute(
            "INSERT INTO sync_logs (id, log_type, status, message, records_synced, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                entry.log_type,
                entry.status.as_str(),
                entry.message,
                entry.records_synced,
                entry.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| SyncError::Persistence(format!("failed to append sync log: {e}")))?;

        entry.id = Some(id);
        Ok(())
    }

    async fn latest_sync_log(&self, log_type: &str) -> Result<Option<SyncLogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, log_type, status, message, records_synced, created_at
                 FROM sync_logs
                 WHERE log_type = ?1
                 ORDER BY created_at DESC
                 LIMIT 1",
            )
            .map_err(|e| SyncError::Persistence(format!("failed to prepare query: {e}")))?;

        let mut rows = stmt
            .query(params![log_type])
            .map_err(|e| SyncError::Persistence(format!("failed to query sync logs: {e}")))?;

        match rows
            .next()
            .map_err(|e| SyncError::Persistence(format!("failed to read row: {e}")))?
        {
            Some(row) => {
                let id: String = row
                    .get(0)
                    .map_err(|e| SyncError::Persistence(format!("failed to read row: {e}")))?;
                let status: String = row
                    .get(2)
                    .map_err(|e| SyncError::Persistence(format!("failed to read row: {e}")))?;
                let created_at: String = row
                    .get(5)
                    .map_err(|e| SyncError::Persistence(format!("failed to read row: {e}")))?;
                Ok(Some(SyncLogEntry {
                    id: Uuid::parse_str(&id).ok(),
                    log_type: row.get(1).map_err(|e| {
                        SyncError::Persistence(format!("failed to read row: {e}"))
                    })?,
                    status: SyncStatus::parse(&status),
                    message: row.get(3).map_err(|e| {
                        SyncError::Persistence(format!("failed to read row: {e}"))
                    })?,
                    records_synced: row.get(4).map_err(|e| {
                        SyncError::Persistence(format!("failed to read row: {e}"))
                    })?,
                    created_at: parse_timestamp(&created_at),
                }))
            }
            None => Ok(None),
        }
    }
}
