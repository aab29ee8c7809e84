//! Snapshot persistence and HTTP fetch utilities for Phone Deal Watch.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use pdw_core::{ProductVariant, Snapshot, Stock};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const CRATE_NAME: &str = "pdw-storage";

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("unknown stock value `{0}` in snapshot row")]
    UnknownStock(String),
}

/// The narrow persistence interface the pipeline sees: the full prior
/// snapshot in, a full replacement out. No incremental upserts.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn read_all(&self) -> Result<Snapshot, StoreError>;

    /// Drop-then-bulk-write: afterwards the store holds exactly
    /// `deals`, nothing else.
    async fn replace_all(&self, deals: &Snapshot) -> Result<(), StoreError>;
}

/// Postgres-backed store. One row per deal key; the whole table is the
/// snapshot.
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("connecting to the snapshot database")?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .context("applying snapshot store migrations")
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn read_all(&self) -> Result<Snapshot, StoreError> {
        let rows = sqlx::query(
            "SELECT brand, model, spec, condition, color, stock, cash_price, rrp, link \
             FROM deals",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut snapshot = Snapshot::new();
        for row in rows {
            let stock_raw: String = row.try_get("stock")?;
            let stock = Stock::from_catalog(&stock_raw)
                .ok_or_else(|| StoreError::UnknownStock(stock_raw.clone()))?;
            let deal = ProductVariant {
                brand: row.try_get("brand")?,
                model: row.try_get("model")?,
                spec: row.try_get("spec")?,
                condition: row.try_get("condition")?,
                color: row.try_get("color")?,
                stock,
                cash_price: row.try_get("cash_price")?,
                rrp: row.try_get("rrp")?,
                link: row.try_get("link")?,
            };
            snapshot.insert(deal.deal_key(), deal);
        }
        Ok(snapshot)
    }

    async fn replace_all(&self, deals: &Snapshot) -> Result<(), StoreError> {
        debug!(deals = deals.len(), "rewriting snapshot");
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM deals").execute(&mut *tx).await?;
        for deal in deals.values() {
            sqlx::query(
                "INSERT INTO deals \
                 (brand, model, spec, condition, color, stock, cash_price, rrp, link) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(&deal.brand)
            .bind(&deal.model)
            .bind(&deal.spec)
            .bind(&deal.condition)
            .bind(&deal.color)
            .bind(deal.stock.as_str())
            .bind(deal.cash_price)
            .bind(deal.rrp)
            .bind(&deal.link)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// In-memory store used by tests.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<Snapshot>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn read_all(&self) -> Result<Snapshot, StoreError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn replace_all(&self, deals: &Snapshot) -> Result<(), StoreError> {
        *self.inner.lock().await = deals.clone();
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

/// Thin reqwest wrapper: one client reused across every catalog fetch
/// of a run.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(url, "fetching");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Run `action` up to `max_attempts` times, re-attempting immediately,
/// and return the first success or the last error once the bound is
/// exhausted. The call site decides whether that error is fatal or the
/// item is skippable.
pub async fn retry<T, E, F, Fut>(max_attempts: usize, mut action: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match action().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < max_attempts => {
                warn!(attempt, %error, "attempt failed, retrying");
            }
            Err(error) => return Err(error),
        }
    }
}
