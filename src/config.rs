use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::catalog::CatalogSource;
use crate::constants::{diagnosis, endpoints, runtime, search};
use crate::error::AppError;

/// Where the static stock list comes from. Without either field the list is
/// fetched from `{api_base}/stock.json`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CatalogConfig {
    pub url: Option<String>,
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrackingConfig {
    /// POST target for tracking records; log-only when unset
    pub endpoint: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            enabled: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DiagnosisTimings {
    pub tick_interval_ms: u64,
    pub simulated_step: f64,
    pub simulated_duration_ms: u64,
    pub settle_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub fast_tier_ceiling: f64,
    pub slow_tier_ceiling: f64,
    pub fast_tier_max_step: f64,
    pub slow_tier_max_step: f64,
}

impl Default for DiagnosisTimings {
    fn default() -> Self {
        Self {
            tick_interval_ms: millis(diagnosis::TICK_INTERVAL),
            simulated_step: diagnosis::SIMULATED_STEP,
            simulated_duration_ms: millis(diagnosis::SIMULATED_DURATION),
            settle_delay_ms: millis(diagnosis::SETTLE_DELAY),
            request_timeout_ms: millis(diagnosis::REQUEST_TIMEOUT),
            fast_tier_ceiling: diagnosis::FAST_TIER_CEILING,
            slow_tier_ceiling: diagnosis::SLOW_TIER_CEILING,
            fast_tier_max_step: diagnosis::FAST_TIER_MAX_STEP,
            slow_tier_max_step: diagnosis::SLOW_TIER_MAX_STEP,
        }
    }
}

impl DiagnosisTimings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn simulated_duration(&self) -> Duration {
        Duration::from_millis(self.simulated_duration_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Base of the diagnosis endpoint; falls back to `api_base`
    #[serde(default)]
    pub diagnosis_base: Option<String>,

    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub diagnosis: DiagnosisTimings,
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default = "default_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            diagnosis_base: None,
            catalog: CatalogConfig::default(),
            server: ServerConfig::default(),
            tracking: TrackingConfig::default(),
            diagnosis: DiagnosisTimings::default(),
            search: SearchConfig::default(),
            event_bus_capacity: default_bus_capacity(),
        }
    }
}

impl AppConfig {
    /// Load `config.yaml` (or `STOCK_DIAGNOSIS_CONFIG`), then apply environment
    /// overrides. A missing file is not an error.
    pub fn load() -> Result<Self, AppError> {
        let path = std::env::var("STOCK_DIAGNOSIS_CONFIG")
            .unwrap_or_else(|_| runtime::DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_from(Path::new(&path))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            warn!("⚠️ [CONFIG] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        info!("[CONFIG] Loaded {}", path.display());
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, AppError> {
        // Strip BOM if present
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(base) = std::env::var("STOCK_API_BASE") {
            self.api_base = base;
        }
        if let Ok(base) = std::env::var("DIAGNOSIS_API_URL") {
            self.diagnosis_base = Some(base);
        }
        if let Ok(endpoint) = std::env::var("TRACKING_ENDPOINT") {
            self.tracking.endpoint = Some(endpoint);
        }
        if let Ok(bind) = std::env::var("BIND_ADDR") {
            self.server.bind = bind;
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        Url::parse(&self.api_base)?;
        if let Some(base) = self.diagnosis_base.as_deref().filter(|b| !b.is_empty()) {
            Url::parse(base)?;
        }
        if self.search.page_size == 0 {
            return Err(AppError::Config("search.page_size must be at least 1".into()));
        }
        if self.event_bus_capacity == 0 {
            return Err(AppError::Config("event_bus_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Base URL the diagnosis endpoint hangs off. An empty override means
    /// "same origin as the quote API".
    pub fn diagnosis_base(&self) -> &str {
        match self.diagnosis_base.as_deref() {
            Some(base) if !base.is_empty() => base,
            _ => &self.api_base,
        }
    }

    /// A local file wins over a URL; without either the list is served next
    /// to the quote API.
    pub fn catalog_source(&self) -> Result<CatalogSource, url::ParseError> {
        if let Some(path) = &self.catalog.path {
            return Ok(CatalogSource::File(path.clone()));
        }
        match self.catalog.url.as_deref() {
            Some(url) => Ok(CatalogSource::Url(Url::parse(url)?)),
            None => Ok(CatalogSource::Url(endpoint(&self.api_base, endpoints::CATALOG)?)),
        }
    }
}

/// Join an endpoint path onto a configured base URL.
pub fn endpoint(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let trimmed = base.trim_end_matches('/');
    Url::parse(&format!("{}{}", trimmed, path))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_api_base() -> String {
    runtime::DEFAULT_API_BASE.to_string()
}

fn default_bind() -> String {
    runtime::DEFAULT_BIND_ADDR.to_string()
}

fn default_page_size() -> usize {
    search::PAGE_SIZE
}

fn default_bus_capacity() -> usize {
    runtime::DEFAULT_EVENT_BUS_CAPACITY
}

fn default_true() -> bool {
    true
}
