use crate::config::Settings;
use crate::domain::scan::{Column, ScanResult, ScanRow};
use crate::screener::query::ScanQuery;
use crate::screener::ScreenerClient;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TradingViewClient {
    http: reqwest::Client,
    base_url: String,
}

impl TradingViewClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.screener_timeout_secs))
            .build()
            .context("failed to build screener http client")?;

        Ok(Self {
            http,
            base_url: settings.screener_base_url.clone(),
        })
    }

    fn url(&self, market: &str) -> String {
        format!("{}/{}/scan", self.base_url.trim_end_matches('/'), market)
    }
}

#[async_trait::async_trait]
impl ScreenerClient for TradingViewClient {
    fn provider_name(&self) -> &'static str {
        "tradingview"
    }

    async fn scan(&self, query: &ScanQuery) -> Result<ScanResult> {
        let url = self.url(&query.market);
        let res = self
            .http
            .post(url)
            .json(&query.body())
            .send()
            .await
            .context("screener request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read screener response")?;
        if !status.is_success() {
            anyhow::bail!("screener HTTP {status}: {text}");
        }

        let raw = serde_json::from_str::<ScannerResponse>(&text)
            .with_context(|| format!("screener response is not valid JSON: {text}"))?;
        parse_response(raw, &query.columns)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ScannerResponse {
    #[serde(rename = "totalCount", default)]
    total_count: u64,
    #[serde(default)]
    data: Option<Vec<ScannerRow>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScannerRow {
    s: String,
    #[serde(default)]
    d: Vec<Value>,
}

fn parse_response(raw: ScannerResponse, columns: &[Column]) -> Result<ScanResult> {
    let data = raw.data.unwrap_or_default();
    let mut rows = Vec::with_capacity(data.len());
    for item in data {
        rows.push(ScanRow::from_wire(&item.s, columns, &item.d)?);
    }

    Ok(ScanResult {
        total_count: raw.total_count,
        rows,
    })
}
