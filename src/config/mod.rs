//! Configuration management.
//!
//! Values are layered: built-in defaults, then a TOML file, then environment
//! variables. Environment always wins. An invalid value in either layer fails
//! loading. Nothing in the load path logs.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `RAPIDSTOCK_DATABASE_PATH` | `database_path` |
//! | `RAPIDSTOCK_SEARCH_BACKEND` | `search.backend` (`meilisearch` or `memory`) |
//! | `MEILI_URL` | `search.url` |
//! | `MEILI_MASTER_KEY`, then `MEILI_API_KEY` | `search.api_key` |
//! | `RAPIDSTOCK_SEARCH_TIMEOUT_MS` | `search.timeout_ms` |
//! | `RAPIDSTOCK_SEARCH_BREAKER_*` | `search.breaker` |
//! | `RAPIDSTOCK_LOG_FORMAT` | `logging.format` |
//! | `RAPIDSTOCK_LOG_FILE` | `logging.file` |

use crate::models::EntityKind;
use crate::observability::LogFormat;
use crate::storage::StorageResilienceConfig;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default Meilisearch endpoint.
pub const DEFAULT_SEARCH_URL: &str = "http://127.0.0.1:7700";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "RAPIDSTOCK_CONFIG_PATH";

/// Main configuration for rapidstock.
#[derive(Debug, Clone)]
pub struct RapidstockConfig {
    /// Path to the `SQLite` system-of-record database.
    pub database_path: PathBuf,
    /// Search index configuration.
    pub search: SearchConfig,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Search backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchBackendKind {
    /// Remote Meilisearch server.
    #[default]
    Meilisearch,
    /// Process-local in-memory collections.
    Memory,
}

impl SearchBackendKind {
    /// Parses a backend name; unknown names yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "meilisearch" | "meili" => Some(Self::Meilisearch),
            "memory" | "in-memory" | "inmemory" => Some(Self::Memory),
            _ => None,
        }
    }

    /// Returns the backend name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Meilisearch => "meilisearch",
            Self::Memory => "memory",
        }
    }
}

/// Collection names per entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    /// Product collection.
    pub products: String,
    /// Category collection.
    pub categories: String,
    /// Attribute collection.
    pub attributes: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            products: EntityKind::Product.plural().to_string(),
            categories: EntityKind::Category.plural().to_string(),
            attributes: EntityKind::Attribute.plural().to_string(),
        }
    }
}

impl CollectionNames {
    /// Returns the collection that mirrors `kind`.
    #[must_use]
    pub fn name_for(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Product => &self.products,
            EntityKind::Category => &self.categories,
            EntityKind::Attribute => &self.attributes,
        }
    }
}

/// Search index configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Which backend to use.
    pub backend: SearchBackendKind,
    /// Meilisearch base URL.
    pub url: String,
    /// API key sent as a bearer token.
    pub api_key: Option<SecretString>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Maximum wait for an asynchronous backend task in milliseconds.
    pub task_timeout_ms: u64,
    /// Collection names.
    pub collections: CollectionNames,
    /// Circuit breaker settings.
    pub breaker: StorageResilienceConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackendKind::default(),
            url: DEFAULT_SEARCH_URL.to_string(),
            api_key: None,
            timeout_ms: 5_000,
            connect_timeout_ms: 2_000,
            task_timeout_ms: 10_000,
            collections: CollectionNames::default(),
            breaker: StorageResilienceConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// Optional log file; logs go to stderr when unset.
    pub file: Option<PathBuf>,
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info,rapidstock=debug`).
    pub filter: Option<String>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Database path.
    pub database_path: Option<String>,
    /// Search section.
    pub search: Option<ConfigFileSearch>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Search section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileSearch {
    /// Backend name.
    pub backend: Option<String>,
    /// Base URL.
    pub url: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Task wait timeout.
    pub task_timeout_ms: Option<u64>,
    /// Collection names.
    pub collections: Option<ConfigFileCollections>,
    /// Circuit breaker.
    pub breaker: Option<ConfigFileBreaker>,
}

/// Collections section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileCollections {
    /// Product collection.
    pub products: Option<String>,
    /// Category collection.
    pub categories: Option<String>,
    /// Attribute collection.
    pub attributes: Option<String>,
}

/// Circuit breaker section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileBreaker {
    /// Consecutive failures before opening.
    pub failure_threshold: Option<u32>,
    /// Open duration in milliseconds.
    pub reset_timeout_ms: Option<u64>,
    /// Trial calls while half-open.
    pub half_open_max_calls: Option<u32>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// Format name.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
}

impl Default for RapidstockConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            search: SearchConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Default database location: `<data dir>/rapidstock/rapidstock.db`.
fn default_database_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("rapidstock.db"),
        |dirs| dirs.data_local_dir().join("rapidstock").join("rapidstock.db"),
    )
}

impl RapidstockConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration the way the binary does.
    ///
    /// Uses `explicit` if given, then `RAPIDSTOCK_CONFIG_PATH`, then the
    /// platform config directory; environment overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed, or an
    /// environment override is invalid.
    pub fn load(explicit: Option<&Path>) -> crate::Result<Self> {
        let base = if let Some(path) = explicit {
            Self::load_from_file(path)?
        } else if let Some(path) = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
        {
            Self::load_from_file(Path::new(&path))?
        } else {
            Self::load_default()?
        };
        base.with_env_overrides()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the platform config directory.
    ///
    /// Checks `<config dir>/rapidstock/config.toml`, then
    /// `~/.config/rapidstock/config.toml`, and uses the first that exists.
    /// Returns defaults if neither exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file found cannot be read or parsed.
    pub fn load_default() -> crate::Result<Self> {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Ok(Self::default());
        };

        let candidates = [
            base_dirs.config_dir().join("rapidstock").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("rapidstock")
                .join("config.toml"),
        ];
        candidates
            .iter()
            .find(|p| p.exists())
            .map_or_else(|| Ok(Self::default()), |path| Self::load_from_file(path))
    }

    /// Converts a `ConfigFile` to `RapidstockConfig`.
    fn from_config_file(file: ConfigFile) -> crate::Result<Self> {
        let mut config = Self::default();

        if let Some(path) = file.database_path {
            config.database_path = PathBuf::from(path);
        }
        if let Some(search) = file.search {
            config.search.apply_file(search)?;
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format).ok_or_else(|| {
                    crate::Error::InvalidInput(format!("unknown log format '{format}'"))
                })?;
            }
            config.logging.file = logging.file.map(PathBuf::from);
            config.logging.filter = logging.filter;
        }

        Ok(config)
    }

    /// Applies environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for an unrecognized backend or
    /// log format, or a timeout that is not a positive integer.
    pub fn with_env_overrides(mut self) -> crate::Result<Self> {
        self.apply_env(&env_value)?;
        Ok(self)
    }

    fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) -> crate::Result<()> {
        if let Some(path) = env("RAPIDSTOCK_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        self.search.apply_env(env)?;
        if let Some(format) = env("RAPIDSTOCK_LOG_FORMAT") {
            self.logging.format = LogFormat::parse(&format).ok_or_else(|| {
                crate::Error::InvalidInput(format!("unknown RAPIDSTOCK_LOG_FORMAT '{format}'"))
            })?;
        }
        if let Some(file) = env("RAPIDSTOCK_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }
        Ok(())
    }
}

impl SearchConfig {
    fn apply_file(&mut self, file: ConfigFileSearch) -> crate::Result<()> {
        if let Some(backend) = file.backend {
            self.backend = SearchBackendKind::parse(&backend).ok_or_else(|| {
                crate::Error::InvalidInput(format!("unknown search backend '{backend}'"))
            })?;
        }
        if let Some(url) = file.url {
            self.url = url;
        }
        if let Some(key) = file.api_key.filter(|k| !k.is_empty()) {
            self.api_key = Some(SecretString::from(key));
        }
        if let Some(ms) = file.timeout_ms {
            self.timeout_ms = positive_ms("search.timeout_ms", ms)?;
        }
        if let Some(ms) = file.connect_timeout_ms {
            self.connect_timeout_ms = positive_ms("search.connect_timeout_ms", ms)?;
        }
        if let Some(ms) = file.task_timeout_ms {
            self.task_timeout_ms = positive_ms("search.task_timeout_ms", ms)?;
        }
        if let Some(collections) = file.collections {
            let names = &mut self.collections;
            for (slot, value) in [
                (&mut names.products, collections.products),
                (&mut names.categories, collections.categories),
                (&mut names.attributes, collections.attributes),
            ] {
                if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                    *slot = value;
                }
            }
        }
        if let Some(breaker) = file.breaker {
            if let Some(v) = breaker.failure_threshold {
                self.breaker = self.breaker.clone().with_failure_threshold(v.max(1));
            }
            if let Some(v) = breaker.reset_timeout_ms {
                self.breaker = self.breaker.clone().with_reset_timeout_ms(v);
            }
            if let Some(v) = breaker.half_open_max_calls {
                self.breaker = self.breaker.clone().with_half_open_max_calls(v.max(1));
            }
        }
        Ok(())
    }

    /// Applies search-related environment overrides.
    ///
    /// `MEILI_MASTER_KEY` takes precedence over `MEILI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for an unrecognized
    /// `RAPIDSTOCK_SEARCH_BACKEND` or a bad `RAPIDSTOCK_SEARCH_TIMEOUT_MS`.
    pub fn with_env_overrides(mut self) -> crate::Result<Self> {
        self.apply_env(&env_value)?;
        Ok(self)
    }

    fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) -> crate::Result<()> {
        if let Some(backend) = env("RAPIDSTOCK_SEARCH_BACKEND") {
            self.backend = SearchBackendKind::parse(&backend).ok_or_else(|| {
                crate::Error::InvalidInput(format!(
                    "unknown RAPIDSTOCK_SEARCH_BACKEND '{backend}' (expected meilisearch or memory)"
                ))
            })?;
        }
        if let Some(url) = env("MEILI_URL") {
            self.url = url;
        }
        if let Some(key) = env("MEILI_MASTER_KEY").or_else(|| env("MEILI_API_KEY")) {
            self.api_key = Some(SecretString::from(key));
        }
        if let Some(raw) = env("RAPIDSTOCK_SEARCH_TIMEOUT_MS") {
            let ms = raw.parse().map_err(|_| {
                crate::Error::InvalidInput(format!("RAPIDSTOCK_SEARCH_TIMEOUT_MS '{raw}' is not a number"))
            })?;
            self.timeout_ms = positive_ms("RAPIDSTOCK_SEARCH_TIMEOUT_MS", ms)?;
        }
        self.breaker = self.breaker.clone().with_env_overrides();
        Ok(())
    }
}

/// Rejects a zero timeout.
fn positive_ms(key: &str, ms: u64) -> crate::Result<u64> {
    if ms == 0 {
        return Err(crate::Error::InvalidInput(format!(
            "{key} must be at least 1 millisecond"
        )));
    }
    Ok(ms)
}

/// Reads a non-empty environment variable.
fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
