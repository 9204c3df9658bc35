//! Result store for LaunchGuard
//!
//! Persists token launches, their append-only assessment history and the
//! incomplete/aborted markers recorded when an analysis yields no verdict.
//! `SqliteAssessmentStore` is the production store (WAL mode);
//! `MemoryAssessmentStore` backs tests and ephemeral runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite, SqliteConnection};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AssessmentRecord, Chain, FailureKind, FailureRecord, RiskAssessment, TokenLaunch,
};

/// Type alias for the SQLite connection pool
pub type DbPool = Pool<Sqlite>;

const SCHEMA: &str = include_str!("../database/schema.sql");

/// Initialize the database connection pool
pub async fn init_pool(config: &DatabaseConfig) -> EngineResult<DbPool> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::Storage(sqlx::Error::Io(e))
            })?;
            info!("Created database directory: {:?}", parent);
        }
    }

    let db_url = format!("sqlite:{}?mode=rwc", config.path.display());

    let connect_options = SqliteConnectOptions::from_str(&db_url)?
        // Enable WAL mode for concurrent reads
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5))
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(connect_options)
        .await?;

    info!(
        "Database pool initialized: {:?} (max {} connections)",
        config.path, config.max_connections
    );

    Ok(pool)
}

/// Apply the bundled schema. Every statement is idempotent.
pub async fn run_migrations(pool: &DbPool) -> EngineResult<()> {
    let schema: String = SCHEMA
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    // SQLite doesn't support multiple statements in one query
    for statement in schema.split(';') {
        let stmt = statement.trim();
        if stmt.is_empty() {
            continue;
        }
        sqlx::query(stmt).execute(pool).await?;
    }

    info!("Database schema applied successfully");
    Ok(())
}

/// Where verdicts and failure markers are kept
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Append a new epoch for the launch. The store assigns the epoch
    /// (previous max + 1), the record id and the timestamp.
    async fn record(
        &self,
        launch: &TokenLaunch,
        assessment: &RiskAssessment,
    ) -> EngineResult<AssessmentRecord>;

    /// Analysis was abandoned before aggregation
    async fn record_incomplete(&self, launch: &TokenLaunch, reason: &str)
        -> EngineResult<FailureRecord>;

    /// Analysis could not run at all
    async fn record_aborted(&self, launch: &TokenLaunch, reason: &str)
        -> EngineResult<FailureRecord>;

    /// All epochs for a token, oldest first
    async fn history(&self, chain: Chain, address: &str) -> EngineResult<Vec<AssessmentRecord>>;

    async fn latest(&self, chain: Chain, address: &str) -> EngineResult<Option<AssessmentRecord>>;

    /// Most recent assessments across all tokens, newest first
    async fn recent(&self, limit: usize) -> EngineResult<Vec<AssessmentRecord>>;

    async fn failures(&self, chain: Chain, address: &str) -> EngineResult<Vec<FailureRecord>>;

    /// Whether the launch was seen before (assessed or failed)
    async fn is_known(&self, chain: Chain, address: &str) -> EngineResult<bool>;
}

/// SQLite-backed store
#[derive(Clone)]
pub struct SqliteAssessmentStore {
    pool: DbPool,
}

const RECORD_COLUMNS: &str = r#"
    r.id, r.epoch, r.assessment_json, r.assessed_at,
    l.chain, l.contract_address, l.creator_address, l.name, l.symbol,
    l.total_supply, l.pool_address, l.discovered_at
"#;

impl SqliteAssessmentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open the database at `config.path` and apply the schema
    pub async fn open(config: &DatabaseConfig) -> EngineResult<Self> {
        let pool = init_pool(config).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn insert_launch(conn: &mut SqliteConnection, launch: &TokenLaunch) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO token_launches (
                chain, contract_address, creator_address, name, symbol,
                total_supply, pool_address, discovered_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(launch.chain.as_str())
        .bind(&launch.address)
        .bind(&launch.creator)
        .bind(&launch.name)
        .bind(&launch.symbol)
        .bind(launch.total_supply.map(|s| s.to_string()))
        .bind(&launch.pool_address)
        .bind(launch.discovered_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn record_failure(
        &self,
        launch: &TokenLaunch,
        kind: FailureKind,
        reason: &str,
    ) -> EngineResult<FailureRecord> {
        let recorded_at = Utc::now();
        let mut tx = self.pool.begin().await?;
        Self::insert_launch(&mut *tx, launch).await?;
        sqlx::query(
            r#"
            INSERT INTO assessment_failures (chain, contract_address, kind, reason, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(launch.chain.as_str())
        .bind(&launch.address)
        .bind(kind.to_string())
        .bind(reason)
        .bind(recorded_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(FailureRecord {
            launch: launch.clone(),
            kind,
            reason: reason.to_string(),
            recorded_at,
        })
    }
}

fn launch_from_row(row: &SqliteRow) -> EngineResult<TokenLaunch> {
    let chain: String = row.try_get("chain")?;
    let total_supply: Option<String> = row.try_get("total_supply")?;
    Ok(TokenLaunch {
        chain: chain.parse().map_err(|e| EngineError::Internal(format!("stored chain: {}", e)))?,
        address: row.try_get("contract_address")?,
        creator: row.try_get("creator_address")?,
        discovered_at: row.try_get("discovered_at")?,
        name: row.try_get("name")?,
        symbol: row.try_get("symbol")?,
        total_supply: total_supply.and_then(|s| s.parse().ok()),
        pool_address: row.try_get("pool_address")?,
    })
}

fn record_from_row(row: &SqliteRow) -> EngineResult<AssessmentRecord> {
    let id: String = row.try_get("id")?;
    let epoch: i64 = row.try_get("epoch")?;
    let json: String = row.try_get("assessment_json")?;
    let assessment: RiskAssessment = serde_json::from_str(&json)
        .map_err(|e| EngineError::Internal(format!("stored assessment: {}", e)))?;

    Ok(AssessmentRecord {
        id: Uuid::parse_str(&id)
            .map_err(|e| EngineError::Internal(format!("stored assessment id: {}", e)))?,
        launch: launch_from_row(row)?,
        epoch: epoch as u32,
        assessed_at: row.try_get::<DateTime<Utc>, _>("assessed_at")?,
        assessment,
    })
}

#[async_trait]
impl AssessmentStore for SqliteAssessmentStore {
    async fn record(
        &self,
        launch: &TokenLaunch,
        assessment: &RiskAssessment,
    ) -> EngineResult<AssessmentRecord> {
        let id = Uuid::new_v4();
        let assessed_at = Utc::now();
        let json = serde_json::to_string(assessment)
            .map_err(|e| EngineError::Internal(format!("serialize assessment: {}", e)))?;

        let mut tx = self.pool.begin().await?;
        Self::insert_launch(&mut *tx, launch).await?;

        // Epoch is computed inside the insert so concurrent writers cannot collide
        let epoch: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO risk_assessments (
                id, chain, contract_address, epoch, score, level, assessment_json, assessed_at
            )
            SELECT ?, ?, ?, COALESCE(MAX(epoch), 0) + 1, ?, ?, ?, ?
            FROM risk_assessments
            WHERE chain = ? AND contract_address = ?
            RETURNING epoch
            "#,
        )
        .bind(id.to_string())
        .bind(launch.chain.as_str())
        .bind(&launch.address)
        .bind(assessment.score)
        .bind(assessment.level.as_str())
        .bind(&json)
        .bind(assessed_at)
        .bind(launch.chain.as_str())
        .bind(&launch.address)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AssessmentRecord {
            id,
            launch: launch.clone(),
            epoch: epoch as u32,
            assessed_at,
            assessment: assessment.clone(),
        })
    }

    async fn record_incomplete(
        &self,
        launch: &TokenLaunch,
        reason: &str,
    ) -> EngineResult<FailureRecord> {
        self.record_failure(launch, FailureKind::Incomplete, reason).await
    }

    async fn record_aborted(&self, launch: &TokenLaunch, reason: &str) -> EngineResult<FailureRecord> {
        self.record_failure(launch, FailureKind::Aborted, reason).await
    }

    async fn history(&self, chain: Chain, address: &str) -> EngineResult<Vec<AssessmentRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM risk_assessments r
            JOIN token_launches l
              ON l.chain = r.chain AND l.contract_address = r.contract_address
            WHERE r.chain = ? AND r.contract_address = ?
            ORDER BY r.epoch ASC
            "#
        ))
        .bind(chain.as_str())
        .bind(address)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn latest(&self, chain: Chain, address: &str) -> EngineResult<Option<AssessmentRecord>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM risk_assessments r
            JOIN token_launches l
              ON l.chain = r.chain AND l.contract_address = r.contract_address
            WHERE r.chain = ? AND r.contract_address = ?
            ORDER BY r.epoch DESC
            LIMIT 1
            "#
        ))
        .bind(chain.as_str())
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn recent(&self, limit: usize) -> EngineResult<Vec<AssessmentRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM risk_assessments r
            JOIN token_launches l
              ON l.chain = r.chain AND l.contract_address = r.contract_address
            ORDER BY r.assessed_at DESC, r.epoch DESC
            LIMIT ?
            "#
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn failures(&self, chain: Chain, address: &str) -> EngineResult<Vec<FailureRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT f.kind, f.reason, f.recorded_at,
                   l.chain, l.contract_address, l.creator_address, l.name, l.symbol,
                   l.total_supply, l.pool_address, l.discovered_at
            FROM assessment_failures f
            JOIN token_launches l
              ON l.chain = f.chain AND l.contract_address = f.contract_address
            WHERE f.chain = ? AND f.contract_address = ?
            ORDER BY f.id ASC
            "#,
        )
        .bind(chain.as_str())
        .bind(address)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> EngineResult<FailureRecord> {
                let kind: String = row.try_get("kind")?;
                Ok(FailureRecord {
                    launch: launch_from_row(row)?,
                    kind: match kind.as_str() {
                        "aborted" => FailureKind::Aborted,
                        _ => FailureKind::Incomplete,
                    },
                    reason: row.try_get("reason")?,
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }

    async fn is_known(&self, chain: Chain, address: &str) -> EngineResult<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM token_launches WHERE chain = ? AND contract_address = ?",
        )
        .bind(chain.as_str())
        .bind(address)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0 > 0)
    }
}

#[derive(Default)]
struct MemoryState {
    launches: HashMap<(Chain, String), TokenLaunch>,
    records: Vec<AssessmentRecord>,
    failures: Vec<FailureRecord>,
}

/// In-memory store with the same append-only semantics
#[derive(Default)]
pub struct MemoryAssessmentStore {
    state: Mutex<MemoryState>,
}

impl MemoryAssessmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn all_failures(&self) -> Vec<FailureRecord> {
        self.state.lock().failures.clone()
    }

    fn push_failure(&self, launch: &TokenLaunch, kind: FailureKind, reason: &str) -> FailureRecord {
        let mut state = self.state.lock();
        state
            .launches
            .entry((launch.chain, launch.address.clone()))
            .or_insert_with(|| launch.clone());
        let failure = FailureRecord {
            launch: launch.clone(),
            kind,
            reason: reason.to_string(),
            recorded_at: Utc::now(),
        };
        state.failures.push(failure.clone());
        failure
    }
}

#[async_trait]
impl AssessmentStore for MemoryAssessmentStore {
    async fn record(
        &self,
        launch: &TokenLaunch,
        assessment: &RiskAssessment,
    ) -> EngineResult<AssessmentRecord> {
        let mut state = self.state.lock();
        let key = (launch.chain, launch.address.clone());
        let stored_launch = state
            .launches
            .entry(key)
            .or_insert_with(|| launch.clone())
            .clone();
        let epoch = state
            .records
            .iter()
            .filter(|r| r.launch.chain == launch.chain && r.launch.address == launch.address)
            .map(|r| r.epoch)
            .max()
            .unwrap_or(0)
            + 1;

        let record = AssessmentRecord {
            id: Uuid::new_v4(),
            launch: stored_launch,
            epoch,
            assessed_at: Utc::now(),
            assessment: assessment.clone(),
        };
        state.records.push(record.clone());
        Ok(record)
    }

    async fn record_incomplete(
        &self,
        launch: &TokenLaunch,
        reason: &str,
    ) -> EngineResult<FailureRecord> {
        Ok(self.push_failure(launch, FailureKind::Incomplete, reason))
    }

    async fn record_aborted(&self, launch: &TokenLaunch, reason: &str) -> EngineResult<FailureRecord> {
        Ok(self.push_failure(launch, FailureKind::Aborted, reason))
    }

    async fn history(&self, chain: Chain, address: &str) -> EngineResult<Vec<AssessmentRecord>> {
        let state = self.state.lock();
        let mut records: Vec<AssessmentRecord> = state
            .records
            .iter()
            .filter(|r| r.launch.chain == chain && r.launch.address == address)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.epoch);
        Ok(records)
    }

    async fn latest(&self, chain: Chain, address: &str) -> EngineResult<Option<AssessmentRecord>> {
        Ok(self.history(chain, address).await?.pop())
    }

    async fn recent(&self, limit: usize) -> EngineResult<Vec<AssessmentRecord>> {
        let state = self.state.lock();
        Ok(state.records.iter().rev().take(limit).cloned().collect())
    }

    async fn failures(&self, chain: Chain, address: &str) -> EngineResult<Vec<FailureRecord>> {
        let state = self.state.lock();
        Ok(state
            .failures
            .iter()
            .filter(|f| f.launch.chain == chain && f.launch.address == address)
            .cloned()
            .collect())
    }

    async fn is_known(&self, chain: Chain, address: &str) -> EngineResult<bool> {
        Ok(self
            .state
            .lock()
            .launches
            .contains_key(&(chain, address.to_string())))
    }
}
