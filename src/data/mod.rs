//! Outbound data providers.
//!
//! Defines the `FixtureSource` seam consumed by the settlement
//! reconciler and the tips drafting flow, plus its API-Football
//! implementation.

pub mod fixtures;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::FixtureSnapshot;

/// Abstraction over the football fixtures/results provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FixtureSource: Send + Sync {
    /// Fetch a single fixture by provider id. `None` when the provider
    /// has no record of it.
    async fn fixture_by_id(&self, id: u64) -> Result<Option<FixtureSnapshot>>;

    /// Fetch the fixtures scheduled on a `YYYY-MM-DD` date in the
    /// configured priority leagues.
    async fn fixtures_by_date(&self, date: &str) -> Result<Vec<FixtureSnapshot>>;
}
