use anyhow::Context;
use clap::Parser;
use screener_core::domain::filter::{EmaReference, FilterConfig, ScreenerMode};
use screener_core::domain::preset::{PresetComparison, PresetName};
use screener_core::export::EXPORT_FILENAME;
use screener_core::pipeline::{ScanOutcome, ScanService};
use screener_core::screener::{ScanParams, DEFAULT_LIMIT};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod table;

#[derive(Debug, Parser)]
#[command(name = "screener", about = "Technical / fundamental / hybrid stock screener")]
struct Args {
    /// Which filter groups to apply.
    #[arg(long, default_value = "technical")]
    mode: ScreenerMode,

    /// Named preset (hybrid mode only). Overrides the thresholds it defines.
    #[arg(long)]
    preset: Option<PresetName>,

    /// Operators for preset thresholds: inclusive (>=, <=) or strict (>, <).
    /// Defaults to SCREENER_PRESET_COMPARISON, then inclusive.
    #[arg(long)]
    preset_comparison: Option<PresetComparison>,

    #[arg(long)]
    rsi_min: Option<f64>,

    #[arg(long)]
    rsi_max: Option<f64>,

    #[arg(long)]
    adx_min: Option<f64>,

    /// Require close above this EMA: none, ema20, ema50, ema200.
    #[arg(long)]
    ema: Option<EmaReference>,

    #[arg(long)]
    pe_max: Option<f64>,

    /// Minimum return on capital (%), matched against ROIC.
    #[arg(long)]
    roce_min: Option<f64>,

    #[arg(long)]
    roe_min: Option<f64>,

    #[arg(long)]
    de_max: Option<f64>,

    #[arg(long)]
    net_margin_min: Option<f64>,

    /// Maximum rows requested from the scanner (50..=500).
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,

    /// Compute RSI(14) and ATR(14) locally for the first 25 rows.
    #[arg(long)]
    enrich: bool,

    /// Write an .xlsx export (defaults to indian_stock_screener.xlsx).
    #[arg(long, num_args = 0..=1, default_missing_value = EXPORT_FILENAME)]
    export: Option<PathBuf>,

    /// Print the full report as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn scan_params(&self, default_comparison: PresetComparison) -> ScanParams {
        let mut filters = FilterConfig {
            rsi_min: self.rsi_min,
            rsi_max: self.rsi_max,
            adx_min: self.adx_min,
            ema: self.ema,
            pe_max: self.pe_max,
            roce_min: self.roce_min,
            roe_min: self.roe_min,
            de_max: self.de_max,
            net_margin_min: self.net_margin_min,
            ..FilterConfig::with_mode(self.mode)
        };

        match self.preset {
            Some(preset) if self.mode == ScreenerMode::Hybrid => filters.preset = preset,
            Some(preset) if preset != PresetName::Custom => {
                tracing::warn!(%preset, mode = %self.mode, "presets only apply in hybrid mode; ignoring");
            }
            _ => {}
        }

        ScanParams {
            filters,
            limit: self.limit,
            preset_comparison: self.preset_comparison.unwrap_or(default_comparison),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = screener_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let params = args.scan_params(settings.preset_comparison);

    let service = ScanService::from_settings(&settings)?;
    let report = match service.run(&params, args.enrich).await {
        Ok(report) => report,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %format!("{err:#}"), "screener run failed");
            return Err(err);
        }
    };

    if args.json {
        let out = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{out}");
    } else if report.outcome == ScanOutcome::NoMatches {
        println!("No stocks matched the criteria.");
    } else {
        print!("{}", table::render(&report));
    }

    if let Some(path) = args.export.as_deref() {
        let bytes = screener_core::export::write_xlsx(&report.result.rows)?;
        std::fs::write(path, bytes)
            .with_context(|| format!("failed to write export to {}", path.display()))?;
        tracing::info!(path = %path.display(), rows = report.result.len(), "wrote xlsx export");
    }

    Ok(())
}

fn init_sentry(settings: &screener_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
