use crate::config::Settings;
use crate::history::{Bar, HistoryClient};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

#[derive(Debug, Clone)]
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.history_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build history http client")?;

        Ok(Self {
            http,
            base_url: settings.history_base_url.clone(),
        })
    }

    fn url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            symbol
        )
    }
}

#[async_trait::async_trait]
impl HistoryClient for YahooChartClient {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_daily(&self, symbol: &str, lookback: &str) -> Result<Vec<Bar>> {
        let res = self
            .http
            .get(self.url(symbol))
            .query(&[("range", lookback), ("interval", "1d")])
            .send()
            .await
            .context("history request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read history response")?;

        decode_response(status, &text)
    }
}

/// Unknown symbols come back as 404, with either a chart.error body or an
/// HTML page. Both mean there is no series.
fn decode_response(status: StatusCode, text: &str) -> Result<Vec<Bar>> {
    if status == StatusCode::NOT_FOUND {
        return Ok(Vec::new());
    }
    if !status.is_success() {
        anyhow::bail!("history HTTP {status}: {text}");
    }

    let body = serde_json::from_str::<ChartResponse>(text)
        .with_context(|| format!("history response is not valid JSON: {text}"))?;
    parse_chart(body)
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartData>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

fn parse_chart(body: ChartResponse) -> Result<Vec<Bar>> {
    if let Some(err) = body.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Ok(Vec::new());
        }
        anyhow::bail!("history API error [{}]: {}", err.code, err.description);
    }

    let Some(data) = body.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let Some(q) = data.indicators.quote.first() else {
        return Ok(Vec::new());
    };

    // Bars with any missing OHLC field (halts, partial sessions) are dropped.
    let bars = data
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            Some(Bar {
                timestamp: *ts,
                open: value_at(&q.open, i)?,
                high: value_at(&q.high, i)?,
                low: value_at(&q.low, i)?,
                close: value_at(&q.close, i)?,
            })
        })
        .collect();
    Ok(bars)
}

fn value_at(v: &[Option<f64>], i: usize) -> Option<f64> {
    v.get(i).copied().flatten()
}
