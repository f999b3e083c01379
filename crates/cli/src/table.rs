use screener_core::domain::scan::ScanRow;
use screener_core::pipeline::ScanReport;
use std::fmt::Write as _;

const HEADERS: [&str; 10] = [
    "ticker", "name", "close", "RSI", "ADX", "P/E", "ROE", "D/E", "RSI14*", "ATR14*",
];

fn num(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_finite() => format!("{v:.2}"),
        _ => "-".to_string(),
    }
}

fn cells(row: &ScanRow) -> [String; 10] {
    let local = row.enrichment.as_ref();
    [
        row.ticker.clone(),
        row.name.clone().unwrap_or_else(|| "-".to_string()),
        num(row.close),
        num(row.rsi),
        num(row.adx),
        num(row.pe_ttm),
        num(row.roe),
        num(row.debt_to_equity),
        num(local.map(|e| e.rsi_14)),
        num(local.map(|e| e.atr_14)),
    ]
}

/// Plain-text table of the report rows, widths fitted to content.
pub fn render(report: &ScanReport) -> String {
    let rows: Vec<[String; 10]> = report.result.rows.iter().map(cells).collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} rows shown ({} matched upstream, {} mode)",
        rows.len(),
        report.total_count,
        report.params.filters.mode
    );

    let line = |out: &mut String, cells: &[&str]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    };

    line(&mut out, &HEADERS);
    for row in &rows {
        let refs: Vec<&str> = row.iter().map(String::as_str).collect();
        line(&mut out, &refs);
    }

    if let Some(enrichment) = &report.enrichment {
        let _ = write!(
            out,
            "* local indicators: {}/{} symbols",
            enrichment.rows.len(),
            enrichment.attempted
        );
        let counts = enrichment.failure_counts();
        if !counts.is_empty() {
            let parts: Vec<String> = counts.iter().map(|(k, v)| format!("{k}={v}")).collect();
            let _ = write!(out, " (skipped: {})", parts.join(", "));
        }
        out.push('\n');
    }

    out
}
