//! Ledger store abstraction.
//!
//! All persistent state lives in an external key-value store. The trait
//! below covers exactly the operations the service needs: scalar
//! get/set, JSON blobs, prefix enumeration for the pending-marker
//! namespaces, a bounded list for the bankroll history, and atomic
//! counters for bankroll adjustments and stats.

pub mod keys;
pub mod memory;
pub mod upstash;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors surfaced by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store rejected {command}: {message}")]
    Rejected { command: String, message: String },

    #[error("unexpected store response for {command}: {message}")]
    UnexpectedResponse { command: String, message: String },
}

/// Key-value store operations used by the service.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Set only if the key does not exist. Returns whether the write
    /// happened.
    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Enumerate keys matching a glob pattern such as `pending_pick:*`.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Atomically add a float delta to a numeric scalar, returning the
    /// new value. Missing keys start from zero.
    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, StoreError>;

    /// Atomically increment an integer counter, returning the new value.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    async fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError>;

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError>;
}

/// Read a JSON blob. Returns `None` when the key is absent.
pub async fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("Corrupt JSON at key {key}"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Write a value as a JSON blob.
pub async fn set_json<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialise value for key {key}"))?;
    store.set(key, &raw).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
