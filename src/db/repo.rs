use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tracing::{instrument, warn};

use super::model::OverrideLedger;
use crate::model::Product;

pub type Pool = SqlitePool;

/// Ledger slot names. Each slot holds one JSON document in `override_entries`.
pub const ADDED_KEY: &str = "inventory_added_products";
pub const EDITED_KEY: &str = "inventory_edited_products";
pub const DELETED_KEY: &str = "inventory_deleted_ids";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)
        .context("invalid database URL")?
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/` and make sure the
/// parent directory exists. In-memory URLs and other schemes pass through.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match path_part.strip_prefix("~/") {
        Some(tail) => match std::env::var("HOME") {
            Ok(home) => format!("{}/{}", home.trim_end_matches('/'), tail),
            Err(_) => path_part.to_string(),
        },
        None => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Durable home of the override ledger. One row per slot, each holding a
/// JSON document; readers recover silently from missing or corrupt values,
/// writers report every failure.
#[derive(Debug, Clone)]
pub struct OverrideStore {
    pool: Pool,
}

impl OverrideStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn read_slot(&self, key: &str) -> Result<Option<String>> {
        let value =
            sqlx::query_scalar::<_, String>("SELECT value FROM override_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn write_slot(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO override_entries (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to persist override entry")?;
        Ok(())
    }

    pub async fn added(&self) -> Result<Vec<Product>> {
        let raw = self.read_slot(ADDED_KEY).await?;
        Ok(decode_slot(ADDED_KEY, raw))
    }

    pub async fn edited(&self) -> Result<BTreeMap<u64, Product>> {
        let raw = self.read_slot(EDITED_KEY).await?;
        Ok(decode_slot(EDITED_KEY, raw))
    }

    /// Deleted ids in first-recorded order, duplicates collapsed.
    pub async fn deleted_ids(&self) -> Result<Vec<u64>> {
        let raw = self.read_slot(DELETED_KEY).await?;
        let stored: Vec<u64> = decode_slot(DELETED_KEY, raw);
        let mut ids = Vec::with_capacity(stored.len());
        for id in stored {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    #[instrument(skip_all)]
    pub async fn load(&self) -> Result<OverrideLedger> {
        Ok(OverrideLedger {
            added: self.added().await?,
            edited: self.edited().await?,
            deleted: self.deleted_ids().await?,
        })
    }

    #[instrument(skip_all)]
    pub async fn record_addition(&self, product: &Product) -> Result<()> {
        let mut added = self.added().await?;
        added.push(product.clone());
        let json = serde_json::to_string(&added).context("failed to encode added products")?;
        self.write_slot(ADDED_KEY, &json).await
    }

    #[instrument(skip_all)]
    pub async fn record_edit(&self, product: &Product) -> Result<()> {
        let mut edited = self.edited().await?;
        edited.insert(product.id, product.clone());
        let json = serde_json::to_string(&edited).context("failed to encode edited products")?;
        self.write_slot(EDITED_KEY, &json).await
    }

    #[instrument(skip_all)]
    pub async fn record_deletion(&self, id: u64) -> Result<()> {
        let mut deleted = self.deleted_ids().await?;
        if !deleted.contains(&id) {
            deleted.push(id);
        }
        let json = serde_json::to_string(&deleted).context("failed to encode deleted ids")?;
        self.write_slot(DELETED_KEY, &json).await
    }
}

/// An absent slot is an empty collection. A present but undecodable slot is
/// treated the same way, logged, and left in place until the next write
/// replaces it.
fn decode_slot<T: DeserializeOwned + Default>(key: &str, raw: Option<String>) -> T {
    let Some(raw) = raw else {
        return T::default();
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(key, %err, "override entry is corrupt; treating as empty");
            T::default()
        }
    }
}
