pub mod cache;
pub mod query;
pub mod tradingview;

use crate::domain::filter::FilterConfig;
use crate::domain::preset::PresetComparison;
use crate::domain::scan::ScanResult;
use crate::screener::cache::QueryCache;
use crate::screener::query::{build_query, ScanQuery};
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MIN_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;
pub const DEFAULT_LIMIT: usize = 200;

#[async_trait::async_trait]
pub trait ScreenerClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn scan(&self, query: &ScanQuery) -> Result<ScanResult>;
}

/// Everything that determines a scan's outcome. Used as the cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    pub filters: FilterConfig,
    pub limit: usize,
    pub preset_comparison: PresetComparison,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            filters: FilterConfig::default(),
            limit: DEFAULT_LIMIT,
            preset_comparison: PresetComparison::Inclusive,
        }
    }
}

impl ScanParams {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (MIN_LIMIT..=MAX_LIMIT).contains(&self.limit),
            "limit must be {MIN_LIMIT}..={MAX_LIMIT} (got {})",
            self.limit
        );
        self.filters.validate()
    }

    /// Canonical encoding of the whole parameter tuple.
    pub fn cache_key(&self, market: &str) -> Result<String> {
        let params = serde_json::to_string(self).context("failed to encode scan params")?;
        Ok(format!("{market}|{params}"))
    }
}

#[derive(Debug, Clone)]
pub struct ScreenerRun {
    pub query: ScanQuery,
    pub result: ScanResult,
    pub cache_hit: bool,
}

/// Builds and executes scanner queries, memoizing results per parameter tuple.
pub struct Screener {
    client: Arc<dyn ScreenerClient>,
    cache: Arc<QueryCache>,
    market: String,
}

impl Screener {
    pub fn new(client: Arc<dyn ScreenerClient>, cache: Arc<QueryCache>, market: &str) -> Self {
        Self {
            client,
            cache,
            market: market.to_string(),
        }
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub async fn run(&self, params: &ScanParams) -> Result<ScreenerRun> {
        params.validate()?;

        let query = build_query(params, &self.market);
        let key = params.cache_key(&self.market)?;
        let now = chrono::Utc::now();

        if let Some(result) = self.cache.get(&key, now).await {
            tracing::debug!(rows = result.len(), "screener cache hit");
            return Ok(ScreenerRun {
                query,
                result,
                cache_hit: true,
            });
        }

        tracing::info!(
            provider = self.client.provider_name(),
            market = %self.market,
            mode = %params.filters.mode,
            predicates = query.predicates.len(),
            limit = params.limit,
            "running screener query"
        );

        let result = self
            .client
            .scan(&query)
            .await
            .with_context(|| format!("{} scan failed", self.client.provider_name()))?;

        self.cache.insert(key, result.clone(), now).await;

        Ok(ScreenerRun {
            query,
            result,
            cache_hit: false,
        })
    }
}
