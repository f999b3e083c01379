pub mod domain;
pub mod enrich;
pub mod export;
pub mod history;
pub mod indicators;
pub mod pipeline;
pub mod screener;

pub mod config {
    use crate::domain::preset::PresetComparison;
    use anyhow::Context;

    pub const DEFAULT_SCREENER_BASE_URL: &str = "https://scanner.tradingview.com";
    pub const DEFAULT_MARKET: &str = "india";
    pub const DEFAULT_HISTORY_BASE_URL: &str = "https://query1.finance.yahoo.com";
    pub const DEFAULT_HISTORY_SUFFIX: &str = ".NS";
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_CACHE_TTL_SECS: u64 = 300;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub screener_base_url: String,
        pub market: String,
        pub screener_timeout_secs: u64,
        pub cache_ttl_secs: u64,
        pub preset_comparison: PresetComparison,
        pub history_base_url: String,
        pub history_timeout_secs: u64,
        pub history_default_suffix: String,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                screener_base_url: DEFAULT_SCREENER_BASE_URL.to_string(),
                market: DEFAULT_MARKET.to_string(),
                screener_timeout_secs: DEFAULT_TIMEOUT_SECS,
                cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
                preset_comparison: PresetComparison::Inclusive,
                history_base_url: DEFAULT_HISTORY_BASE_URL.to_string(),
                history_timeout_secs: DEFAULT_TIMEOUT_SECS,
                history_default_suffix: DEFAULT_HISTORY_SUFFIX.to_string(),
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();

            let preset_comparison = match non_empty_var("SCREENER_PRESET_COMPARISON") {
                Some(s) => s
                    .parse::<PresetComparison>()
                    .context("SCREENER_PRESET_COMPARISON is invalid")?,
                None => defaults.preset_comparison,
            };

            Ok(Self {
                screener_base_url: non_empty_var("SCREENER_BASE_URL")
                    .unwrap_or(defaults.screener_base_url),
                market: non_empty_var("SCREENER_MARKET").unwrap_or(defaults.market),
                screener_timeout_secs: parsed_var("SCREENER_TIMEOUT_SECS")?
                    .unwrap_or(defaults.screener_timeout_secs),
                cache_ttl_secs: parsed_var("SCREENER_CACHE_TTL_SECS")?
                    .unwrap_or(defaults.cache_ttl_secs),
                preset_comparison,
                history_base_url: non_empty_var("HISTORY_BASE_URL")
                    .unwrap_or(defaults.history_base_url),
                history_timeout_secs: parsed_var("HISTORY_TIMEOUT_SECS")?
                    .unwrap_or(defaults.history_timeout_secs),
                history_default_suffix: non_empty_var("HISTORY_DEFAULT_SUFFIX")
                    .unwrap_or(defaults.history_default_suffix),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    fn parsed_var(key: &str) -> anyhow::Result<Option<u64>> {
        non_empty_var(key)
            .map(|s| {
                s.trim()
                    .parse::<u64>()
                    .with_context(|| format!("{key} must be a non-negative integer (got {s})"))
            })
            .transpose()
    }
}
