use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Split a comma-separated list, skipping empty entries.
///
/// `"Dresden,,Basel,"` -> `["Dresden", "Basel"]`
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a comma-separated list of positive integers. Invalid entries are dropped.
pub fn parse_usize_list(raw: &str) -> Vec<usize> {
    parse_list(raw)
        .iter()
        .filter_map(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .collect()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    pub features: FeatureSettings,
    pub ingest: IngestConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `PARKCAST_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("PARKCAST_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            database: DatabaseConfig::from_env_profiled(p),
            model: ModelConfig::from_env_profiled(p),
            features: FeatureSettings::from_env_profiled(p),
            ingest: IngestConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:    {}:{}", self.server.host, self.server.port);
        tracing::info!("  database:  {}", self.database.path.display());
        match &self.model.path {
            Some(path) => tracing::info!("  model:     kind={}, path={}", self.model.kind, path.display()),
            None => tracing::info!("  model:     kind={}, dir={}", self.model.kind, self.model.dir.display()),
        }
        tracing::info!("  features:  lags={:?}, windows={:?}", self.features.lags, self.features.windows);
        tracing::info!(
            "  ingest:    cities=[{}], interval={}s",
            self.ingest.cities.join(", "),
            self.ingest.interval_secs
        );
    }

    /// Return a view safe for API responses.
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "database": { "path": self.database.path },
            "model": { "kind": self.model.kind, "dir": self.model.dir, "path": self.model.path },
            "features": { "lags": self.features.lags, "windows": self.features.windows },
            "ingest": {
                "cities": self.ingest.cities,
                "interval_secs": self.ingest.interval_secs,
                "base_url": self.ingest.base_url,
            },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    /// Half-width of the forecast band, in occupancy percentage points.
    pub confidence_band: f64,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_parse(p, "PORT", 8000),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
            confidence_band: profiled_env_parse(p, "CONFIDENCE_BAND", 10.0),
        }
    }
}

// ── Database ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl DatabaseConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            path: PathBuf::from(profiled_env_or(p, "DATABASE_PATH", "data/parking.db")),
            max_connections: profiled_env_parse(p, "DB_MAX_CONNECTIONS", 5),
        }
    }
}

// ── Model ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub dir: PathBuf,
    /// "gradient_boosting" or "random_forest" ("xgboost"/"lightgbm" are aliases).
    pub kind: String,
    /// Explicit model file; overrides the per-kind default under `dir`.
    pub path: Option<PathBuf>,
}

impl ModelConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            dir: PathBuf::from(profiled_env_or(p, "MODEL_DIR", "models")),
            kind: profiled_env_or(p, "MODEL_KIND", "gradient_boosting"),
            path: profiled_env_opt(p, "MODEL_PATH").map(PathBuf::from),
        }
    }
}

// ── Features ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSettings {
    pub lags: Vec<usize>,
    pub windows: Vec<usize>,
}

impl FeatureSettings {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            lags: parse_usize_list(&profiled_env_or(p, "FEATURE_LAGS", "1,2,3")),
            windows: parse_usize_list(&profiled_env_or(p, "FEATURE_WINDOWS", "3")),
        }
    }
}

// ── Ingest ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub cities: Vec<String>,
    pub interval_secs: u64,
    pub base_url: String,
    pub http_timeout_secs: u64,
}

impl IngestConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            cities: parse_list(&profiled_env_or(p, "INGEST_CITIES", "")),
            interval_secs: profiled_env_parse(p, "INGEST_INTERVAL_SECS", 300),
            base_url: profiled_env_or(p, "PARKENDD_BASE_URL", "https://api.parkendd.de"),
            http_timeout_secs: profiled_env_parse(p, "INGEST_HTTP_TIMEOUT_SECS", 30),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_single() {
        assert_eq!(parse_list("Dresden"), vec!["Dresden"]);
    }

    #[test]
    fn parse_list_multiple() {
        assert_eq!(
            parse_list("Dresden,Basel,Hamburg"),
            vec!["Dresden", "Basel", "Hamburg"]
        );
    }

    #[test]
    fn parse_list_empty_and_gaps() {
        assert!(parse_list("").is_empty());
        assert_eq!(parse_list(",Dresden,,Basel,"), vec!["Dresden", "Basel"]);
    }

    #[test]
    fn parse_usize_list_drops_invalid() {
        assert_eq!(parse_usize_list("1, 2,x,0,24"), vec![1, 2, 24]);
    }

    #[test]
    fn profile_label_defaults() {
        let cfg = Config::for_profile("");
        assert_eq!(cfg.profile_label(), "default");
        assert_eq!(Config::for_profile("prod").profile_label(), "PROD");
        let summary = cfg.redacted_summary();
        assert_eq!(summary["profile"], "default");
        assert_eq!(summary["server"]["port"], 8000);
    }

    #[test]
    fn ingest_interval_is_never_zero() {
        let cfg = IngestConfig {
            cities: vec![],
            interval_secs: 0,
            base_url: String::new(),
            http_timeout_secs: 30,
        };
        assert_eq!(cfg.interval(), Duration::from_secs(1));
    }
}
