use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Scanner fields referenced by queries and result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Name,
    Sector,
    Industry,
    Close,
    Volume,
    MarketCap,
    PeTtm,
    Roe,
    Roic,
    NetMargin,
    FreeCashFlow,
    DebtToEquity,
    Ema20,
    Ema50,
    Ema200,
    Rsi,
    Adx,
    BbUpper,
    BbLower,
    Type,
}

impl Column {
    /// Fields requested on every scan, in wire order.
    pub const REQUESTED: [Column; 19] = [
        Column::Name,
        Column::Sector,
        Column::Industry,
        Column::Close,
        Column::Volume,
        Column::MarketCap,
        Column::PeTtm,
        Column::Roe,
        Column::Roic,
        Column::NetMargin,
        Column::FreeCashFlow,
        Column::DebtToEquity,
        Column::Ema20,
        Column::Ema50,
        Column::Ema200,
        Column::Rsi,
        Column::Adx,
        Column::BbUpper,
        Column::BbLower,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::Name => "name",
            Column::Sector => "sector",
            Column::Industry => "industry",
            Column::Close => "close",
            Column::Volume => "volume",
            Column::MarketCap => "market_cap_basic",
            Column::PeTtm => "price_earnings_ttm",
            Column::Roe => "return_on_equity",
            Column::Roic => "return_on_invested_capital",
            Column::NetMargin => "net_margin",
            Column::FreeCashFlow => "free_cash_flow_ttm",
            Column::DebtToEquity => "debt_to_equity",
            Column::Ema20 => "EMA20",
            Column::Ema50 => "EMA50",
            Column::Ema200 => "EMA200",
            Column::Rsi => "RSI",
            Column::Adx => "ADX",
            Column::BbUpper => "BB.upper",
            Column::BbLower => "BB.lower",
            Column::Type => "type",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Column::REQUESTED
            .into_iter()
            .chain(std::iter::once(Column::Type))
            .find(|c| c.as_str() == s)
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            Column::Name | Column::Sector | Column::Industry | Column::Type
        )
    }
}

/// Locally computed indicators for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRow {
    pub ticker: String,
    pub rsi_14: f64,
    pub atr_14: f64,
    pub bars: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanRow {
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ttm: Option<f64>,
    pub roe: Option<f64>,
    pub roic: Option<f64>,
    pub net_margin: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub ema20: Option<f64>,
    pub ema50: Option<f64>,
    pub ema200: Option<f64>,
    pub rsi: Option<f64>,
    pub adx: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichedRow>,
}

impl ScanRow {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Self::default()
        }
    }

    /// Builds a row from one scanner data entry whose values are aligned with `columns`.
    pub fn from_wire(ticker: &str, columns: &[Column], values: &[Value]) -> anyhow::Result<Self> {
        anyhow::ensure!(!ticker.trim().is_empty(), "ticker must be non-empty");
        anyhow::ensure!(
            columns.len() == values.len(),
            "row {ticker} has {} values for {} columns",
            values.len(),
            columns.len()
        );

        let mut row = Self::new(ticker);
        for (col, value) in columns.iter().zip(values) {
            row.set(*col, value)
                .with_context(|| format!("row {ticker}: bad value for {}", col.as_str()))?;
        }
        Ok(row)
    }

    fn set(&mut self, col: Column, value: &Value) -> anyhow::Result<()> {
        if value.is_null() {
            return Ok(());
        }

        if col.is_text() {
            let s = value
                .as_str()
                .with_context(|| format!("expected string, got {value}"))?
                .to_string();
            match col {
                Column::Name => self.name = Some(s),
                Column::Sector => self.sector = Some(s),
                Column::Industry => self.industry = Some(s),
                _ => {}
            }
            return Ok(());
        }

        let n = value
            .as_f64()
            .with_context(|| format!("expected number, got {value}"))?;
        if let Some(slot) = self.number_slot(col) {
            *slot = Some(n);
        }
        Ok(())
    }

    fn number_slot(&mut self, col: Column) -> Option<&mut Option<f64>> {
        Some(match col {
            Column::Close => &mut self.close,
            Column::Volume => &mut self.volume,
            Column::MarketCap => &mut self.market_cap,
            Column::PeTtm => &mut self.pe_ttm,
            Column::Roe => &mut self.roe,
            Column::Roic => &mut self.roic,
            Column::NetMargin => &mut self.net_margin,
            Column::FreeCashFlow => &mut self.free_cash_flow,
            Column::DebtToEquity => &mut self.debt_to_equity,
            Column::Ema20 => &mut self.ema20,
            Column::Ema50 => &mut self.ema50,
            Column::Ema200 => &mut self.ema200,
            Column::Rsi => &mut self.rsi,
            Column::Adx => &mut self.adx,
            Column::BbUpper => &mut self.bb_upper,
            Column::BbLower => &mut self.bb_lower,
            Column::Name | Column::Sector | Column::Industry | Column::Type => return None,
        })
    }

    pub fn number(&self, col: Column) -> Option<f64> {
        match col {
            Column::Close => self.close,
            Column::Volume => self.volume,
            Column::MarketCap => self.market_cap,
            Column::PeTtm => self.pe_ttm,
            Column::Roe => self.roe,
            Column::Roic => self.roic,
            Column::NetMargin => self.net_margin,
            Column::FreeCashFlow => self.free_cash_flow,
            Column::DebtToEquity => self.debt_to_equity,
            Column::Ema20 => self.ema20,
            Column::Ema50 => self.ema50,
            Column::Ema200 => self.ema200,
            Column::Rsi => self.rsi,
            Column::Adx => self.adx,
            Column::BbUpper => self.bb_upper,
            Column::BbLower => self.bb_lower,
            Column::Name | Column::Sector | Column::Industry | Column::Type => None,
        }
    }

    pub fn text(&self, col: Column) -> Option<&str> {
        match col {
            Column::Name => self.name.as_deref(),
            Column::Sector => self.sector.as_deref(),
            Column::Industry => self.industry.as_deref(),
            _ => None,
        }
    }
}

/// Rows returned by one scanner query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Matches reported upstream, before the row limit.
    pub total_count: u64,
    pub rows: Vec<ScanRow>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Left join on ticker. Rows without a matching enrichment row are left untouched.
    pub fn merge_enrichment(&mut self, enriched: Vec<EnrichedRow>) {
        let mut by_ticker: HashMap<String, EnrichedRow> = enriched
            .into_iter()
            .map(|e| (e.ticker.clone(), e))
            .collect();

        for row in &mut self.rows {
            if let Some(e) = by_ticker.remove(&row.ticker) {
                row.enrichment = Some(e);
            }
        }

        if !by_ticker.is_empty() {
            tracing::warn!(
                unmatched = by_ticker.len(),
                "enrichment rows without a matching scan row were dropped"
            );
        }
    }
}
