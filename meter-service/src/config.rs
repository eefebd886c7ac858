use serde::Deserialize;
use std::fs;

use crate::validation::ValidationPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
    /// Upper bound on the decoded size of an uploaded photo.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

fn default_max_image_bytes() -> usize {
    2 * 1024 * 1024
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub uri: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub timeout_secs: u64,
    pub letter_language: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            primary_model: "gemini-2.0-flash".to_string(),
            fallback_model: "gemini-1.5-pro".to_string(),
            timeout_secs: 60,
            letter_language: "Russian".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub validation: ValidationPolicy,
    #[serde(default)]
    pub import: ImportConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("METER_SERVICE_CONFIG").unwrap_or_else(|_| "meter-service.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config {path}: {e}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        if cfg.store.kind == StoreKind::Postgres && cfg.store.uri.is_none() {
            anyhow::bail!("store.uri is required when store.kind = \"postgres\"");
        }
        if cfg.validation.history_window < 2 {
            anyhow::bail!(
                "validation.history_window must be at least 2, got {}",
                cfg.validation.history_window
            );
        }
        let multiplier = cfg.validation.anomaly_multiplier;
        if !(multiplier.is_finite() && multiplier > 0.0) {
            anyhow::bail!("validation.anomaly_multiplier must be a positive number, got {multiplier}");
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [http]
            bind_addr = "127.0.0.1:8080"

            [store]
            kind = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.http.max_image_bytes, 2 * 1024 * 1024);
        assert_eq!(cfg.store.kind, StoreKind::Memory);
        assert_eq!(cfg.gemini.primary_model, "gemini-2.0-flash");
        assert_eq!(cfg.gemini.fallback_model, "gemini-1.5-pro");
        assert_eq!(cfg.validation, ValidationPolicy::default());
        assert_eq!(cfg.import.max_retries, 3);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [http]
            bind_addr = "0.0.0.0:8080"
            max_image_bytes = 1048576

            [store]
            kind = "postgres"
            uri = "postgres://meters@localhost/meters"
            max_connections = 10

            [gemini]
            letter_language = "English"

            [validation]
            history_window = 12
            anomaly_multiplier = 2.5

            [metrics]
            bind_addr = "0.0.0.0:9000"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.store.max_connections, 10);
        assert_eq!(cfg.gemini.letter_language, "English");
        assert_eq!(cfg.gemini.timeout_secs, 60);
        assert_eq!(cfg.validation.history_window, 12);
        assert_eq!(cfg.validation.anomaly_multiplier, 2.5);
        assert_eq!(cfg.metrics.map(|m| m.bind_addr).as_deref(), Some("0.0.0.0:9000"));
    }

    #[test]
    fn postgres_store_needs_a_uri() {
        let res = AppConfig::from_toml(
            r#"
            [http]
            bind_addr = "0.0.0.0:8080"

            [store]
            kind = "postgres"
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn example_config_parses() {
        let cfg = AppConfig::from_toml(include_str!("../meter-service.example.toml")).unwrap();
        assert_eq!(cfg.store.kind, StoreKind::Postgres);
        assert_eq!(cfg.validation, ValidationPolicy::default());
    }

    fn with_validation(section: &str) -> anyhow::Result<AppConfig> {
        AppConfig::from_toml(&format!(
            r#"
            [http]
            bind_addr = "0.0.0.0:8080"

            [store]
            kind = "memory"

            [validation]
            {section}
            "#
        ))
    }

    #[test]
    fn history_window_needs_two_readings() {
        assert!(with_validation("history_window = 0").is_err());
        assert!(with_validation("history_window = 1").is_err());
        assert_eq!(with_validation("history_window = 2").unwrap().validation.history_window, 2);
    }

    #[test]
    fn anomaly_multiplier_must_be_positive() {
        assert!(with_validation("anomaly_multiplier = -1.0").is_err());
        assert!(with_validation("anomaly_multiplier = 0.0").is_err());
        assert!(with_validation("anomaly_multiplier = nan").is_err());
        assert!(with_validation("anomaly_multiplier = inf").is_err());
        assert_eq!(with_validation("anomaly_multiplier = 1.5").unwrap().validation.anomaly_multiplier, 1.5);
    }
}
