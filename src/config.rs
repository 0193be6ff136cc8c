//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Default coalescing delay for persistence writes.
pub const DEFAULT_PERSIST_DEBOUNCE: Duration = Duration::from_millis(250);

// == Cache Config ==
/// Policy for a single cache namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Namespacing identifier for the persisted blob
    pub storage_key: String,
    /// Size above which the cleanup sweep starts evicting
    pub max_size: usize,
    /// TTL applied when `set` is called without one
    pub default_ttl: Duration,
    /// Period of the background cleanup sweep
    pub cleanup_interval: Duration,
    /// Whether entries are written to and restored from durable storage
    pub persist_to_storage: bool,
    /// How long the persistence writer waits to coalesce mutations
    pub persist_debounce: Duration,
}

impl CacheConfig {
    /// Creates a persisted namespace config with the given size and TTL policy.
    pub fn new(storage_key: impl Into<String>, max_size: usize, default_ttl: Duration) -> Self {
        Self {
            storage_key: storage_key.into(),
            max_size,
            default_ttl,
            cleanup_interval: Duration::from_secs(60),
            persist_to_storage: true,
            persist_debounce: DEFAULT_PERSIST_DEBOUNCE,
        }
    }

    /// Small, short-lived cache for rendered component fragments.
    pub fn component() -> Self {
        Self::new("component_cache", 50, Duration::from_secs(5 * 60))
    }

    /// Medium cache for API payloads.
    pub fn data() -> Self {
        Self::new("data_cache", 100, Duration::from_secs(10 * 60))
            .with_cleanup_interval(Duration::from_secs(2 * 60))
    }

    /// Large, long-lived cache for image sources.
    pub fn image() -> Self {
        Self::new("image_cache", 200, Duration::from_secs(30 * 60))
            .with_cleanup_interval(Duration::from_secs(5 * 60))
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persist_to_storage = enabled;
        self
    }

    pub fn with_persist_debounce(mut self, debounce: Duration) -> Self {
        self.persist_debounce = debounce;
        self
    }

    /// Overrides the size/TTL/interval policy from `<PREFIX>_MAX_SIZE`,
    /// `<PREFIX>_TTL` and `<PREFIX>_CLEANUP_INTERVAL` (seconds).
    fn apply_env(mut self, prefix: &str, persist_debounce: Duration) -> Self {
        self.max_size = env_or(&format!("{}_MAX_SIZE", prefix), self.max_size);
        self.default_ttl = Duration::from_secs(env_or(
            &format!("{}_TTL", prefix),
            self.default_ttl.as_secs(),
        ));
        self.cleanup_interval =
            env_interval_secs(&format!("{}_CLEANUP_INTERVAL", prefix), self.cleanup_interval);
        self.persist_debounce = persist_debounce;
        self
    }
}

// == Optimization Settings ==
/// Tuning for the optimization manager.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationSettings {
    /// Interval between memory samples
    pub memory_check_interval: Duration,
    /// Usage ratio (0.0..=1.0) at which a pressure sweep runs
    pub pressure_threshold: f64,
    /// Fraction of `max_size` each cache is shrunk to under pressure
    pub pressure_shrink_ratio: f64,
    /// Locators preloaded into the data cache at startup
    pub critical_resources: Vec<String>,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            memory_check_interval: Duration::from_secs(30),
            pressure_threshold: 0.8,
            pressure_shrink_ratio: 0.5,
            critical_resources: Vec::new(),
        }
    }
}

// == Config ==
/// Process configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one JSON file per persisted namespace
    pub storage_dir: PathBuf,
    pub component: CacheConfig,
    pub data: CacheConfig,
    pub image: CacheConfig,
    pub optimization: OptimizationSettings,
    /// Memory budget used as the pressure denominator, in bytes
    pub memory_budget_bytes: u64,
    /// Base URL for relative locators
    pub fetch_base_url: Option<String>,
    /// Routes prefetched into the data cache after startup
    pub prefetch_routes: Vec<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_STORAGE_DIR` - Persistence directory (default: `.cache/resource_cache`)
    /// - `CACHE_PERSIST_DEBOUNCE_MS` - Persistence coalescing delay (default: 250)
    /// - `{COMPONENT,DATA,IMAGE}_CACHE_{MAX_SIZE,TTL,CLEANUP_INTERVAL}` - Per-namespace policy
    /// - `MEMORY_CHECK_INTERVAL` - Seconds between memory samples (default: 30)
    /// - `MEMORY_PRESSURE_THRESHOLD` - Usage ratio triggering a sweep (default: 0.8)
    /// - `MEMORY_PRESSURE_SHRINK_RATIO` - Capacity fraction kept under pressure (default: 0.5)
    /// - `MEMORY_BUDGET_MB` - Memory budget (default: 512)
    /// - `FETCH_BASE_URL` - Base URL for relative locators (default: unset)
    /// - `CRITICAL_RESOURCES`, `PREFETCH_ROUTES` - Comma separated lists
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let debounce = Duration::from_millis(env_or(
            "CACHE_PERSIST_DEBOUNCE_MS",
            DEFAULT_PERSIST_DEBOUNCE.as_millis() as u64,
        ));

        let optimization = OptimizationSettings {
            memory_check_interval: env_interval_secs(
                "MEMORY_CHECK_INTERVAL",
                defaults.optimization.memory_check_interval,
            ),
            pressure_threshold: env_ratio(
                "MEMORY_PRESSURE_THRESHOLD",
                defaults.optimization.pressure_threshold,
            ),
            pressure_shrink_ratio: env_ratio(
                "MEMORY_PRESSURE_SHRINK_RATIO",
                defaults.optimization.pressure_shrink_ratio,
            ),
            critical_resources: env_list("CRITICAL_RESOURCES"),
        };

        Self {
            storage_dir: env::var("CACHE_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            component: defaults.component.apply_env("COMPONENT_CACHE", debounce),
            data: defaults.data.apply_env("DATA_CACHE", debounce),
            image: defaults.image.apply_env("IMAGE_CACHE", debounce),
            optimization,
            memory_budget_bytes: env_or("MEMORY_BUDGET_MB", 512u64).saturating_mul(1024 * 1024),
            fetch_base_url: env::var("FETCH_BASE_URL").ok().filter(|v| !v.is_empty()),
            prefetch_routes: env_list("PREFETCH_ROUTES"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(".cache/resource_cache"),
            component: CacheConfig::component(),
            data: CacheConfig::data(),
            image: CacheConfig::image(),
            optimization: OptimizationSettings::default(),
            memory_budget_bytes: 512 * 1024 * 1024,
            fetch_base_url: None,
            prefetch_routes: Vec::new(),
        }
    }
}

/// Parses an environment variable, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Reads a ratio in `0.0..=1.0`. Non-finite or out-of-range values fall back
/// to `default` with a warning.
fn env_ratio(name: &str, default: f64) -> f64 {
    let value = env_or(name, default);
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        value
    } else {
        warn!(var = name, value, default, "Ratio outside 0.0..=1.0, using default");
        default
    }
}

/// Reads a period in whole seconds. Zero falls back to `default` with a warning.
fn env_interval_secs(name: &str, default: Duration) -> Duration {
    match env_or(name, default.as_secs()) {
        0 => {
            warn!(var = name, "Interval must be at least one second, using default");
            default
        }
        secs => Duration::from_secs(secs),
    }
}

fn env_list(name: &str) -> Vec<String> {
    env::var(name)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
