use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Scanner parameters. Pattern thresholds are fixed in `reversal` and not configurable.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// REST endpoint of the spot exchange
    pub base_url: String,
    /// Optional API key, sent as a header when present
    pub api_key: Option<String>,
    /// Settlement asset symbols must be quoted in
    pub quote_asset: String,
    /// Candles requested per (symbol, timeframe)
    pub candle_limit: usize,
    /// Pause after each full sweep
    pub sweep_pause: Duration,
    /// Upper bound on a single fetch call
    pub fetch_timeout: Duration,
    /// Initial state of the audible notification toggle
    pub notifications_enabled: bool,
    /// Start scanning as soon as the process boots
    pub autostart: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            api_key: None,
            quote_asset: "USDT".to_string(),
            candle_limit: 10,
            sweep_pause: Duration::from_millis(1_000),
            fetch_timeout: Duration::from_millis(10_000),
            notifications_enabled: false,
            autostart: false,
        }
    }
}

impl ScannerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_str("BINANCE_BASE_URL", &defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            api_key: env_opt("BINANCE_API_KEY"),
            quote_asset: env_str("SCAN_QUOTE_ASSET", &defaults.quote_asset).to_uppercase(),
            candle_limit: env_parse("SCAN_CANDLE_LIMIT", defaults.candle_limit),
            sweep_pause: Duration::from_millis(env_parse("SCAN_SWEEP_PAUSE_MS", 1_000)),
            fetch_timeout: Duration::from_millis(env_parse("SCAN_FETCH_TIMEOUT_MS", 10_000)),
            notifications_enabled: env_bool("SCAN_NOTIFY", defaults.notifications_enabled),
            autostart: env_bool("SCAN_AUTOSTART", defaults.autostart),
        }
    }
}

/// HTTP listener and log sink.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Directory for the rolling log file. Unset logs to stdout only.
    pub log_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind: env_str("BIND", "0.0.0.0"),
            port: env_parse("PORT", 3000),
            log_dir: env_opt("LOG_DIR").map(PathBuf::from),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_str(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_opt(name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    env_opt(name)
        .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"))
        .unwrap_or(default)
}
