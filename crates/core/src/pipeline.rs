use crate::config::Settings;
use crate::domain::scan::ScanResult;
use crate::enrich::{EnrichmentReport, Enricher};
use crate::history::yahoo::YahooChartClient;
use crate::screener::cache::QueryCache;
use crate::screener::query::ScanQuery;
use crate::screener::tradingview::TradingViewClient;
use crate::screener::{ScanParams, Screener};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Matches,
    NoMatches,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub market: String,
    pub params: ScanParams,
    pub outcome: ScanOutcome,
    pub cache_hit: bool,
    /// Matches reported upstream, before the row limit and the RSI guard.
    pub total_count: u64,
    pub removed_by_rsi_guard: usize,
    pub result: ScanResult,
    pub enrichment: Option<EnrichmentReport>,
}

/// Drops rows whose RSI is missing or violates the query's RSI predicates.
/// Returns the number of rows removed.
pub fn apply_rsi_guard(result: &mut ScanResult, query: &ScanQuery) -> usize {
    let guard = query.rsi_guard();
    if guard.is_empty() {
        return 0;
    }
    let before = result.rows.len();
    result.rows.retain(|row| guard.iter().all(|p| p.matches(row)));
    before - result.rows.len()
}

/// One user-triggered run: query (memoized), RSI guard, optional enrichment.
pub async fn run_scan(
    screener: &Screener,
    enricher: Option<&Enricher>,
    params: &ScanParams,
) -> Result<ScanReport> {
    let run_id = Uuid::new_v4();
    let run = screener.run(params).await?;
    let mut result = run.result;
    let total_count = result.total_count;

    let mut removed_by_rsi_guard = 0;
    if !result.is_empty() && params.filters.mode.includes_technical() {
        removed_by_rsi_guard = apply_rsi_guard(&mut result, &run.query);
        if removed_by_rsi_guard > 0 {
            tracing::warn!(
                %run_id,
                removed = removed_by_rsi_guard,
                "rows outside the RSI range were returned upstream; dropped"
            );
        }
    }

    let outcome = if result.is_empty() {
        ScanOutcome::NoMatches
    } else {
        ScanOutcome::Matches
    };

    let enrichment = match (outcome, enricher) {
        (ScanOutcome::Matches, Some(enricher)) => {
            let report = enricher.enrich(&result).await;
            result.merge_enrichment(report.rows.clone());
            Some(report)
        }
        _ => None,
    };

    tracing::info!(
        %run_id,
        market = screener.market(),
        mode = %params.filters.mode,
        cache_hit = run.cache_hit,
        total_count,
        rows = result.len(),
        ?outcome,
        "scan finished"
    );

    Ok(ScanReport {
        run_id,
        generated_at: Utc::now(),
        market: screener.market().to_string(),
        params: params.clone(),
        outcome,
        cache_hit: run.cache_hit,
        total_count,
        removed_by_rsi_guard,
        result,
        enrichment,
    })
}

/// Screener and enricher wired to the configured remote services.
pub struct ScanService {
    screener: Screener,
    enricher: Enricher,
}

impl ScanService {
    pub fn new(screener: Screener, enricher: Enricher) -> Self {
        Self { screener, enricher }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Arc::new(TradingViewClient::from_settings(settings)?);
        let cache = Arc::new(QueryCache::new(settings.cache_ttl_secs));
        let history = Arc::new(YahooChartClient::from_settings(settings)?);

        Ok(Self::new(
            Screener::new(client, cache, &settings.market),
            Enricher::new(history, &settings.history_default_suffix),
        ))
    }

    pub fn screener(&self) -> &Screener {
        &self.screener
    }

    pub async fn run(&self, params: &ScanParams, enrich: bool) -> Result<ScanReport> {
        run_scan(&self.screener, enrich.then_some(&self.enricher), params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::{FilterConfig, ScreenerMode};
    use crate::domain::preset::{PresetComparison, PresetName};
    use crate::enrich::testing::{trending_bars, FakeHistory};
    use crate::screener::cache::QueryCache;
    use crate::screener::testing::{stock, FakeScreener};
    use std::sync::Arc;

    fn technical_params() -> ScanParams {
        ScanParams {
            filters: FilterConfig {
                rsi_min: Some(40.0),
                rsi_max: Some(70.0),
                adx_min: Some(20.0),
                ..FilterConfig::with_mode(ScreenerMode::Technical)
            },
            ..ScanParams::default()
        }
    }

    fn screener(fake: FakeScreener) -> Screener {
        Screener::new(Arc::new(fake), Arc::new(QueryCache::new(300)), "india")
    }

    fn tickers(report: &ScanReport) -> Vec<&str> {
        report.result.rows.iter().map(|r| r.ticker.as_str()).collect()
    }

    #[tokio::test]
    async fn includes_matching_stock_and_excludes_overbought_one() {
        let s = screener(FakeScreener::new(vec![
            stock("NSE:GOOD", 65.0, 25.0),
            stock("NSE:HOT", 75.0, 40.0),
        ]));
        let report = run_scan(&s, None, &technical_params()).await.unwrap();

        assert_eq!(report.outcome, ScanOutcome::Matches);
        assert_eq!(tickers(&report), ["NSE:GOOD"]);
    }

    #[tokio::test]
    async fn rsi_guard_catches_rows_upstream_let_through() {
        let mut fake = FakeScreener::new(vec![
            stock("NSE:GOOD", 65.0, 25.0),
            stock("NSE:HOT", 75.0, 25.0),
            stock("NSE:EDGE", 70.0, 25.0),
            stock("NSE:NORSI", 0.0, 25.0),
        ]);
        fake.universe[3].rsi = None;
        fake.ignore_predicates = true;
        let s = screener(fake);

        let report = run_scan(&s, None, &technical_params()).await.unwrap();
        assert_eq!(tickers(&report), ["NSE:GOOD", "NSE:EDGE"]);
        assert_eq!(report.removed_by_rsi_guard, 2);
        assert_eq!(report.total_count, 4);
        for row in &report.result.rows {
            let rsi = row.rsi.unwrap();
            assert!((40.0..=70.0).contains(&rsi));
        }
    }

    #[tokio::test]
    async fn strict_swing_preset_guard_excludes_rsi_bounds() {
        let mut fake = FakeScreener::new(vec![
            stock("NSE:LOW", 45.0, 30.0),
            stock("NSE:MID", 55.0, 30.0),
            stock("NSE:HIGH", 65.0, 30.0),
        ]);
        fake.ignore_predicates = true;
        let s = screener(fake);
        let params = ScanParams {
            filters: FilterConfig {
                preset: PresetName::Swing,
                ..FilterConfig::with_mode(ScreenerMode::Hybrid)
            },
            preset_comparison: PresetComparison::Strict,
            ..ScanParams::default()
        };

        let report = run_scan(&s, None, &params).await.unwrap();
        assert_eq!(tickers(&report), ["NSE:MID"]);
        assert_eq!(report.removed_by_rsi_guard, 2);

        let inclusive = ScanParams {
            preset_comparison: PresetComparison::Inclusive,
            ..params
        };
        let report = run_scan(&s, None, &inclusive).await.unwrap();
        assert_eq!(tickers(&report), ["NSE:LOW", "NSE:MID", "NSE:HIGH"]);
    }

    #[tokio::test]
    async fn fundamental_mode_skips_rsi_guard() {
        let mut fake = FakeScreener::new(vec![stock("NSE:HOT", 90.0, 5.0)]);
        fake.ignore_predicates = true;
        let s = screener(fake);
        let params = ScanParams {
            filters: FilterConfig::with_mode(ScreenerMode::Fundamental),
            ..ScanParams::default()
        };

        let report = run_scan(&s, None, &params).await.unwrap();
        assert_eq!(report.removed_by_rsi_guard, 0);
        assert_eq!(report.result.len(), 1);
    }

    #[tokio::test]
    async fn empty_result_is_no_matches_and_skips_enrichment() {
        let s = screener(FakeScreener::new(vec![stock("NSE:HOT", 85.0, 25.0)]));
        let history = Arc::new(FakeHistory::default());
        let enricher = Enricher::new(history.clone(), ".NS");

        let report = run_scan(&s, Some(&enricher), &technical_params())
            .await
            .unwrap();
        assert_eq!(report.outcome, ScanOutcome::NoMatches);
        assert!(report.result.is_empty());
        assert!(report.enrichment.is_none());
        assert!(history.requested().is_empty());
    }

    #[tokio::test]
    async fn enrichment_is_left_joined_onto_rows() {
        let s = screener(FakeScreener::new(vec![
            stock("NSE:A", 50.0, 25.0),
            stock("NSE:B", 55.0, 25.0),
            stock("NSE:C", 60.0, 25.0),
        ]));
        let history = FakeHistory::default()
            .with("A.NS", trending_bars(100))
            .with("B.NS", Vec::new())
            .with("C.NS", trending_bars(100));
        let enricher = Enricher::new(Arc::new(history), ".NS");

        let report = run_scan(&s, Some(&enricher), &technical_params())
            .await
            .unwrap();

        let rows = &report.result.rows;
        assert_eq!(rows.len(), 3);
        assert!(rows[0].enrichment.is_some());
        assert!(rows[1].enrichment.is_none());
        assert!(rows[2].enrichment.is_some());

        let enrichment = report.enrichment.unwrap();
        assert_eq!(enrichment.rows.len(), 2);
        assert_eq!(enrichment.failure_counts().get("empty_series"), Some(&1));
    }

    #[tokio::test]
    async fn service_enriches_only_when_asked() {
        let service = ScanService::new(
            screener(FakeScreener::new(vec![stock("NSE:A", 50.0, 25.0)])),
            Enricher::new(
                Arc::new(FakeHistory::default().with("A.NS", trending_bars(30))),
                ".NS",
            ),
        );
        let params = technical_params();

        let plain = service.run(&params, false).await.unwrap();
        assert!(plain.enrichment.is_none());
        assert!(plain.result.rows[0].enrichment.is_none());

        let enriched = service.run(&params, true).await.unwrap();
        assert!(enriched.cache_hit);
        assert_eq!(enriched.enrichment.map(|e| e.rows.len()), Some(1));
        assert!(enriched.result.rows[0].enrichment.is_some());
    }

    #[tokio::test]
    async fn repeated_run_is_identical_and_served_from_cache() {
        let s = screener(FakeScreener::new(vec![
            stock("NSE:A", 50.0, 25.0),
            stock("NSE:B", 55.0, 25.0),
        ]));
        let params = technical_params();

        let first = run_scan(&s, None, &params).await.unwrap();
        let second = run_scan(&s, None, &params).await.unwrap();
        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.result, second.result);
        assert_ne!(first.run_id, second.run_id);
    }
}
