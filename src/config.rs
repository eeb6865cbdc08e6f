use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT_SECONDS, DEFAULT_BATCH_SIZE, DEFAULT_BUSINESS_TYPE,
    DEFAULT_CONFIG_PATH, DEFAULT_LOG_LEVEL, DEFAULT_OUTPUT_PATH, DEFAULT_PAGE_TOKEN_DELAY,
    DEFAULT_RADIUS_METERS,
};
use crate::error::{Result, ScraperError};
use crate::storage::StorageKind;
use crate::transform::SourceSchema;

/// Settings as read from `config.toml` and the environment, before validation.
///
/// Every field is optional so the file, the environment and the command line can each fill in
/// part of the picture; [`RawConfig::resolve`] applies defaults and checks the result.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub api: RawApiConfig,
    pub search: RawSearchConfig,
    pub pipeline: RawPipelineConfig,
    pub storage: RawStorageConfig,
    pub logging: RawLoggingConfig,
}

#[derive(Default, Clone, Deserialize)]
#[serde(default)]
pub struct RawApiConfig {
    pub key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub page_token_delay_ms: Option<u64>,
}

impl fmt::Debug for RawApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawApiConfig")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("page_token_delay_ms", &self.page_token_delay_ms)
            .finish()
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RawSearchConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: Option<u32>,
    pub business_type: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RawPipelineConfig {
    pub source: Option<String>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RawStorageConfig {
    pub kind: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RawLoggingConfig {
    pub level: Option<String>,
}

/// Fully resolved, immutable settings for one invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub search: SearchParams,
    pub pipeline: PipelineOptions,
    pub storage: StorageConfig,
    pub log_level: String,
}

#[derive(Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub page_token_delay: Duration,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("page_token_delay", &self.page_token_delay)
            .finish()
    }
}

/// Where to search and for what.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: u32,
    pub business_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub batch_size: usize,
    pub source: SourceSchema,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            source: SourceSchema::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub path: Option<PathBuf>,
}

impl RawConfig {
    /// Load the TOML file at `path`, or `config.toml` if it exists when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ScraperError::Config(format!("Invalid config file: {e}")))
    }

    /// Overlay values from the process environment (after loading `.env`).
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup. Blank values count as unset.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("MAPS_API_KEY") {
            self.api.key = Some(v);
        }
        if let Some(v) = get("MAPS_API_BASE_URL") {
            self.api.base_url = Some(v);
        }
        if let Some(v) = parse_env(&get, "API_TIMEOUT_SECONDS")? {
            self.api.timeout_seconds = Some(v);
        }
        if let Some(v) = parse_env(&get, "PAGE_TOKEN_DELAY_MS")? {
            self.api.page_token_delay_ms = Some(v);
        }
        if let Some(v) = parse_env(&get, "SEARCH_LATITUDE")? {
            self.search.latitude = Some(v);
        }
        if let Some(v) = parse_env(&get, "SEARCH_LONGITUDE")? {
            self.search.longitude = Some(v);
        }
        if let Some(v) = parse_env(&get, "SEARCH_RADIUS_METERS")? {
            self.search.radius_meters = Some(v);
        }
        if let Some(v) = get("TARGET_BUSINESS_TYPE") {
            self.search.business_type = Some(v);
        }
        if let Some(v) = get("PIPELINE_SOURCE") {
            self.pipeline.source = Some(v);
        }
        if let Some(v) = parse_env(&get, "BATCH_SIZE")? {
            self.pipeline.batch_size = Some(v);
        }
        if let Some(v) = get("OUTPUT_STORAGE_TYPE") {
            self.storage.kind = Some(v);
        }
        if let Some(v) = get("OUTPUT_FILE_PATH") {
            self.storage.path = Some(v);
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.logging.level = Some(v);
        }
        Ok(())
    }

    /// Apply defaults and validate. Every failure here is a configuration error.
    pub fn resolve(self) -> Result<AppConfig> {
        let api_key = self
            .api
            .key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| config_error("API key is required (MAPS_API_KEY or [api].key)"))?;
        let base_url = self
            .api
            .base_url
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let timeout_seconds = self.api.timeout_seconds.unwrap_or(DEFAULT_API_TIMEOUT_SECONDS);
        if timeout_seconds == 0 {
            return Err(config_error("API timeout must be positive"));
        }
        let page_token_delay = self
            .api
            .page_token_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PAGE_TOKEN_DELAY);

        let latitude = self
            .search
            .latitude
            .ok_or_else(|| config_error("search latitude is required"))?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(config_error(format!(
                "latitude {latitude} is outside [-90, 90]"
            )));
        }
        let longitude = self
            .search
            .longitude
            .ok_or_else(|| config_error("search longitude is required"))?;
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(config_error(format!(
                "longitude {longitude} is outside [-180, 180]"
            )));
        }
        let radius_meters = self.search.radius_meters.unwrap_or(DEFAULT_RADIUS_METERS);
        if radius_meters == 0 {
            return Err(config_error("search radius must be positive"));
        }
        let business_type = self
            .search
            .business_type
            .unwrap_or_else(|| DEFAULT_BUSINESS_TYPE.to_string());
        if business_type.trim().is_empty() {
            return Err(config_error("business type must not be blank"));
        }

        let batch_size = self.pipeline.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(config_error("batch size must be positive"));
        }
        let source = match self.pipeline.source {
            Some(s) => s.parse::<SourceSchema>().map_err(config_error)?,
            None => SourceSchema::default(),
        };

        let kind = match self.storage.kind {
            Some(s) => s.parse::<StorageKind>().map_err(config_error)?,
            None => StorageKind::Csv,
        };
        let path = match (kind, self.storage.path) {
            (StorageKind::Memory, path) => path.map(PathBuf::from),
            (_, Some(path)) if !path.trim().is_empty() => Some(PathBuf::from(path)),
            (_, Some(_)) => {
                return Err(config_error(format!("Missing 'file_path' for {kind} storage")))
            }
            (_, None) => Some(PathBuf::from(DEFAULT_OUTPUT_PATH)),
        };

        let log_level = match self.logging.level {
            Some(level) => level
                .trim()
                .parse::<Level>()
                .map_err(|_| {
                    config_error(format!(
                        "log level '{level}' is invalid (expected trace, debug, info, warn or error)"
                    ))
                })?
                .as_str()
                .to_lowercase(),
            None => DEFAULT_LOG_LEVEL.to_string(),
        };

        Ok(AppConfig {
            api: ApiConfig {
                api_key,
                base_url,
                timeout: Duration::from_secs(timeout_seconds),
                page_token_delay,
            },
            search: SearchParams {
                latitude,
                longitude,
                radius_meters,
                business_type,
            },
            pipeline: PipelineOptions { batch_size, source },
            storage: StorageConfig { kind, path },
            log_level,
        })
    }
}

fn parse_env<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| config_error(format!("{key}='{raw}' is invalid: {e}"))),
        None => Ok(None),
    }
}

fn config_error(message: impl Into<String>) -> ScraperError {
    ScraperError::Config(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn minimal() -> RawConfig {
        RawConfig::from_toml_str(
            r#"
            [api]
            key = "test-key"

            [search]
            latitude = 47.61
            longitude = -122.33
            "#,
        )
        .unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_fill_unset_values() {
        let config = minimal().resolve().unwrap();
        assert_eq!(config.search.radius_meters, 5000);
        assert_eq!(config.search.business_type, "restaurant");
        assert_eq!(config.pipeline.batch_size, 100);
        assert_eq!(config.pipeline.source, SourceSchema::Details);
        assert_eq!(config.storage.kind, StorageKind::Csv);
        assert_eq!(config.storage.path, Some(PathBuf::from("businesses.csv")));
        assert_eq!(config.api.page_token_delay, Duration::from_secs(2));
        assert_eq!(config.api.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut raw = minimal();
        raw.apply_env_from(env(&[
            ("SEARCH_RADIUS_METERS", "1200"),
            ("TARGET_BUSINESS_TYPE", "cafe"),
            ("PIPELINE_SOURCE", "nearby"),
            ("BATCH_SIZE", "25"),
            ("OUTPUT_STORAGE_TYPE", "jsonl"),
            ("OUTPUT_FILE_PATH", "out/places.jsonl"),
        ]))
        .unwrap();

        let config = raw.resolve().unwrap();
        assert_eq!(config.search.radius_meters, 1200);
        assert_eq!(config.search.business_type, "cafe");
        assert_eq!(config.pipeline.source, SourceSchema::Nearby);
        assert_eq!(config.pipeline.batch_size, 25);
        assert_eq!(config.storage.kind, StorageKind::JsonLines);
        assert_eq!(config.storage.path, Some(PathBuf::from("out/places.jsonl")));
    }

    #[test]
    fn test_unparseable_env_value_is_config_error() {
        let mut raw = minimal();
        let err = raw
            .apply_env_from(env(&[("SEARCH_RADIUS_METERS", "five km")]))
            .unwrap_err();
        assert!(matches!(err, ScraperError::Config(_)));
        assert!(err.to_string().contains("SEARCH_RADIUS_METERS"));
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let mut raw = minimal();
        raw.api.key = Some("   ".to_string());
        assert!(matches!(raw.resolve(), Err(ScraperError::Config(_))));
    }

    #[test]
    fn test_missing_coordinates_are_rejected() {
        let mut raw = minimal();
        raw.search.latitude = None;
        let err = raw.resolve().unwrap_err();
        assert!(err.to_string().contains("latitude"));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let mut raw = minimal();
        raw.search.longitude = Some(200.0);
        assert!(raw.resolve().is_err());

        let mut raw = minimal();
        raw.pipeline.batch_size = Some(0);
        assert!(raw.resolve().is_err());

        let mut raw = minimal();
        raw.search.radius_meters = Some(0);
        assert!(raw.resolve().is_err());
    }

    #[test]
    fn test_unknown_storage_and_source_are_rejected() {
        let mut raw = minimal();
        raw.storage.kind = Some("postgresql".to_string());
        let err = raw.resolve().unwrap_err();
        assert!(err.to_string().contains("Unsupported storage type: postgresql"));

        let mut raw = minimal();
        raw.pipeline.source = Some("sideways".to_string());
        assert!(matches!(raw.resolve(), Err(ScraperError::Config(_))));
    }

    #[test]
    fn test_file_storage_requires_path() {
        let mut raw = minimal();
        raw.storage.path = Some(String::new());
        let err = raw.resolve().unwrap_err();
        assert!(err.to_string().contains("Missing 'file_path' for csv storage"));
    }

    #[test]
    fn test_log_level_is_validated() {
        let mut raw = minimal();
        raw.apply_env_from(env(&[("LOG_LEVEL", "loud")])).unwrap();
        let err = raw.resolve().unwrap_err();
        assert!(matches!(err, ScraperError::Config(_)));
        assert!(err.to_string().contains("log level 'loud' is invalid"));

        let mut raw = minimal();
        raw.logging.level = Some(" DEBUG ".to_string());
        assert_eq!(raw.resolve().unwrap().log_level, "debug");

        assert_eq!(minimal().resolve().unwrap().log_level, "info");
    }

    #[test]
    fn test_debug_output_redacts_api_key() {
        let config = minimal().resolve().unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("test-key"));
        assert!(!format!("{:?}", minimal()).contains("test-key"));
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let err = RawConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ScraperError::Config(_)));
    }
}
