pub mod yahoo;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Lookback window requested for local enrichment.
pub const LOOKBACK: &str = "6mo";

/// One daily OHLC bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[async_trait::async_trait]
pub trait HistoryClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Daily bars for `symbol` over `lookback`, oldest first. An unknown or
    /// delisted symbol yields an empty series rather than an error.
    async fn fetch_daily(&self, symbol: &str, lookback: &str) -> Result<Vec<Bar>>;
}
