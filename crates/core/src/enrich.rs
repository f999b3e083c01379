use crate::domain::scan::{EnrichedRow, ScanResult};
use crate::history::{HistoryClient, LOOKBACK};
use crate::indicators::{latest_atr, latest_rsi, DEFAULT_PERIOD};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Rows (from the top of the result) that get local indicators.
pub const ENRICH_LIMIT: usize = 25;
pub const MIN_BARS: usize = DEFAULT_PERIOD + 1;

/// Why a symbol got no enrichment row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EnrichmentFailure {
    EmptySeries,
    InsufficientHistory { bars: usize, needed: usize },
    Fetch { message: String },
}

impl EnrichmentFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            EnrichmentFailure::EmptySeries => "empty_series",
            EnrichmentFailure::InsufficientHistory { .. } => "insufficient_history",
            EnrichmentFailure::Fetch { .. } => "fetch",
        }
    }
}

impl fmt::Display for EnrichmentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentFailure::EmptySeries => write!(f, "history source returned no bars"),
            EnrichmentFailure::InsufficientHistory { bars, needed } => {
                write!(f, "only {bars} bars, need at least {needed}")
            }
            EnrichmentFailure::Fetch { message } => write!(f, "history fetch failed: {message}"),
        }
    }
}

impl std::error::Error for EnrichmentFailure {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolFailure {
    pub ticker: String,
    pub symbol: String,
    #[serde(flatten)]
    pub failure: EnrichmentFailure,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichmentReport {
    pub attempted: usize,
    pub rows: Vec<EnrichedRow>,
    pub failures: Vec<SymbolFailure>,
}

impl EnrichmentReport {
    pub fn failure_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut out = BTreeMap::new();
        for f in &self.failures {
            *out.entry(f.failure.kind()).or_insert(0) += 1;
        }
        out
    }
}

/// Maps a scanner ticker (`EXCHANGE:SYMBOL`) to the history source's symbol.
pub fn history_symbol(ticker: &str, default_suffix: &str) -> String {
    let (exchange, symbol) = match ticker.split_once(':') {
        Some((ex, sym)) => (Some(ex), sym),
        None => (None, ticker),
    };
    let suffix = match exchange.map(|e| e.to_ascii_uppercase()).as_deref() {
        Some("NSE") => ".NS",
        Some("BSE") => ".BO",
        _ => default_suffix,
    };
    format!("{}{}", symbol.trim(), suffix)
}

pub struct Enricher {
    client: Arc<dyn HistoryClient>,
    default_suffix: String,
    limit: usize,
}

impl Enricher {
    pub fn new(client: Arc<dyn HistoryClient>, default_suffix: &str) -> Self {
        Self {
            client,
            default_suffix: default_suffix.to_string(),
            limit: ENRICH_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(ENRICH_LIMIT);
        self
    }

    pub async fn enrich_symbol(&self, ticker: &str) -> Result<EnrichedRow, EnrichmentFailure> {
        let symbol = history_symbol(ticker, &self.default_suffix);
        let bars = self
            .client
            .fetch_daily(&symbol, LOOKBACK)
            .await
            .map_err(|err| EnrichmentFailure::Fetch {
                message: format!("{err:#}"),
            })?;

        if bars.is_empty() {
            return Err(EnrichmentFailure::EmptySeries);
        }

        let insufficient = || EnrichmentFailure::InsufficientHistory {
            bars: bars.len(),
            needed: MIN_BARS,
        };
        let rsi_14 = latest_rsi(&bars, DEFAULT_PERIOD).ok_or_else(insufficient)?;
        let atr_14 = latest_atr(&bars, DEFAULT_PERIOD).ok_or_else(insufficient)?;

        Ok(EnrichedRow {
            ticker: ticker.to_string(),
            rsi_14,
            atr_14,
            bars: bars.len(),
        })
    }

    /// Enriches the first rows of `result`, one symbol at a time. A failing
    /// symbol is recorded and skipped; it never aborts the batch.
    pub async fn enrich(&self, result: &ScanResult) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();

        for row in result.rows.iter().take(self.limit) {
            report.attempted += 1;
            match self.enrich_symbol(&row.ticker).await {
                Ok(enriched) => report.rows.push(enriched),
                Err(failure) => {
                    tracing::warn!(
                        ticker = %row.ticker,
                        provider = self.client.provider_name(),
                        reason = failure.kind(),
                        error = %failure,
                        "enrichment skipped symbol"
                    );
                    report.failures.push(SymbolFailure {
                        ticker: row.ticker.clone(),
                        symbol: history_symbol(&row.ticker, &self.default_suffix),
                        failure,
                    });
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            enriched = report.rows.len(),
            failed = report.failures.len(),
            "enrichment finished"
        );
        report
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::history::{Bar, HistoryClient};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned series per history symbol; unknown symbols fail.
    #[derive(Default)]
    pub struct FakeHistory {
        pub series: HashMap<String, Vec<Bar>>,
        pub requested: Mutex<Vec<String>>,
    }

    impl FakeHistory {
        pub fn with(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
            self.series.insert(symbol.to_string(), bars);
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().map(|g| g.clone()).unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl HistoryClient for FakeHistory {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_daily(&self, symbol: &str, lookback: &str) -> anyhow::Result<Vec<Bar>> {
            anyhow::ensure!(lookback == "6mo", "unexpected lookback {lookback}");
            if let Ok(mut g) = self.requested.lock() {
                g.push(symbol.to_string());
            }
            self.series
                .get(symbol)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("connection reset fetching {symbol}"))
        }
    }

    pub fn trending_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar {
                    timestamp: i as i64 * 86_400,
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                }
            })
            .collect()
    }
}
