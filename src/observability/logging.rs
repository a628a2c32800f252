//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter directive when neither `RUST_LOG` nor config provides one.
const DEFAULT_FILTER: &str = "warn,rapidstock=info";

/// Filter directive used with `--verbose`.
const VERBOSE_FILTER: &str = "info,rapidstock=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
    /// Single-line human-readable output.
    Compact,
}

impl LogFormat {
    /// Parses a format name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Optional file to append to instead of stderr.
    pub file: Option<PathBuf>,
    /// Event filter.
    pub filter: EnvFilter,
}

impl LoggingConfig {
    /// Builds logging configuration from settings.
    ///
    /// Filter precedence: `--verbose`, then `RUST_LOG`, then the configured
    /// directive, then the built-in default. An unparsable directive falls back
    /// to the default.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let directive = if verbose {
            VERBOSE_FILTER.to_string()
        } else {
            std::env::var(EnvFilter::DEFAULT_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| settings.filter.clone())
                .unwrap_or_else(|| DEFAULT_FILTER.to_string())
        };

        Self {
            format: settings.format,
            file: settings.file.clone(),
            filter: parse_filter(&directive),
        }
    }
}

fn parse_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("json", Some(LogFormat::Json) ; "json")]
    #[test_case("Pretty", Some(LogFormat::Pretty) ; "pretty any case")]
    #[test_case("compact", Some(LogFormat::Compact) ; "compact")]
    #[test_case("xml", None ; "unknown")]
    fn test_log_format_parse(raw: &str, expected: Option<LogFormat>) {
        assert_eq!(LogFormat::parse(raw), expected);
    }

    #[test]
    fn test_verbose_overrides_configured_filter() {
        let settings = LoggingSettings {
            filter: Some("error".to_string()),
            ..LoggingSettings::default()
        };
        let config = LoggingConfig::from_settings(&settings, true);
        assert_eq!(config.filter.to_string(), parse_filter(VERBOSE_FILTER).to_string());
    }

    #[test]
    fn test_invalid_directive_falls_back() {
        let filter = parse_filter("rapidstock=notalevel");
        assert_eq!(filter.to_string(), parse_filter(DEFAULT_FILTER).to_string());
    }
}
