//! Operator-facing configuration and its provisioned, immutable form.
//!
//! [`ResponseLoggerConfig`] mirrors the options an operator writes down (sizes as
//! human-readable strings, levels as names). [`ResponseLoggerConfig::provision`]
//! validates it once at startup and produces [`Settings`], which every exchange
//! shares read-only.

use serde::Deserialize;
use tracing::warn;

use crate::level::parse_level;
use crate::size::{parse_size, SizeError};

pub const DEFAULT_LOGGER_NAME: &str = "response_logger";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_MAX_BODY_SIZE: &str = "1MB";
/// `DEFAULT_MAX_BODY_SIZE` in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 1 << 20;

/// Errors raised while provisioning a configuration. These are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid max_body_size {value:?}: {source}")]
    InvalidBodySize {
        value: String,
        #[source]
        source: SizeError,
    },
    #[error("max_body_size of {0} bytes does not fit in memory on this platform")]
    BodySizeOverflow(u64),
}

/// Configuration for the response logging middleware.
///
/// Unknown options are rejected when deserializing, so a typo in a config file
/// fails at startup rather than being silently ignored.
///
/// # Examples
///
/// ```rust
/// use response_logger::ResponseLoggerConfig;
///
/// let settings = ResponseLoggerConfig::default()
///     .include_response_body(true)
///     .max_body_size("64KB")
///     .skip_path("/health")
///     .provision()
///     .unwrap();
///
/// assert_eq!(settings.max_body_size, 65_536);
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponseLoggerConfig {
    /// Name attached to every emitted record
    pub logger_name: String,
    /// Level used for exchanges with a status below 400
    pub log_level: String,
    /// Whether to capture request bodies
    pub include_request_body: bool,
    /// Whether to capture response bodies
    pub include_response_body: bool,
    /// Upper bound on captured bytes per body, e.g. `"1MB"`
    pub max_body_size: String,
    /// Status codes whose exchanges are never logged
    pub skip_status_codes: Vec<u16>,
    /// Path substrings whose exchanges are never logged
    pub skip_paths: Vec<String>,
    /// Request headers surfaced in the `headers` field
    pub include_headers: Vec<String>,
}

impl Default for ResponseLoggerConfig {
    fn default() -> Self {
        Self {
            logger_name: DEFAULT_LOGGER_NAME.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            include_request_body: false,
            include_response_body: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE.to_string(),
            skip_status_codes: Vec::new(),
            skip_paths: Vec::new(),
            include_headers: Vec::new(),
        }
    }
}

impl ResponseLoggerConfig {
    pub fn logger_name(mut self, name: impl Into<String>) -> Self {
        self.logger_name = name.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn include_request_body(mut self, enabled: bool) -> Self {
        self.include_request_body = enabled;
        self
    }

    pub fn include_response_body(mut self, enabled: bool) -> Self {
        self.include_response_body = enabled;
        self
    }

    pub fn max_body_size(mut self, size: impl Into<String>) -> Self {
        self.max_body_size = size.into();
        self
    }

    pub fn skip_status_code(mut self, status: u16) -> Self {
        self.skip_status_codes.push(status);
        self
    }

    pub fn skip_path(mut self, path: impl Into<String>) -> Self {
        self.skip_paths.push(path.into());
        self
    }

    pub fn include_header(mut self, name: impl Into<String>) -> Self {
        self.include_headers.push(name.into());
        self
    }

    /// Validate the configuration and freeze it into [`Settings`].
    pub fn provision(self) -> Result<Settings, ConfigError> {
        let bytes =
            parse_size(&self.max_body_size).map_err(|source| ConfigError::InvalidBodySize {
                value: self.max_body_size.clone(),
                source,
            })?;
        let max_body_size =
            usize::try_from(bytes).map_err(|_| ConfigError::BodySizeOverflow(bytes))?;

        if parse_level(&self.log_level).is_none() {
            warn!(
                log_level = %self.log_level,
                "Unrecognized log_level; exchanges below 400 will be logged at info"
            );
        }

        Ok(Settings {
            logger_name: self.logger_name,
            log_level: self.log_level,
            include_request_body: self.include_request_body,
            include_response_body: self.include_response_body,
            max_body_size,
            skip_status_codes: self.skip_status_codes,
            skip_paths: self.skip_paths,
            include_headers: self.include_headers,
        })
    }
}

/// Provisioned configuration, shared read-only by all concurrent exchanges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub logger_name: String,
    pub log_level: String,
    pub include_request_body: bool,
    pub include_response_body: bool,
    /// Maximum captured bytes per body
    pub max_body_size: usize,
    pub skip_status_codes: Vec<u16>,
    pub skip_paths: Vec<String>,
    pub include_headers: Vec<String>,
}

/// Equivalent to provisioning [`ResponseLoggerConfig::default`].
impl Default for Settings {
    fn default() -> Self {
        let config = ResponseLoggerConfig::default();
        Self {
            logger_name: config.logger_name,
            log_level: config.log_level,
            include_request_body: config.include_request_body,
            include_response_body: config.include_response_body,
            max_body_size: DEFAULT_MAX_BODY_BYTES,
            skip_status_codes: config.skip_status_codes,
            skip_paths: config.skip_paths,
            include_headers: config.include_headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_provisions_to_default_settings() {
        let settings = ResponseLoggerConfig::default().provision().unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_body_size, 1_048_576);
    }

    #[test]
    fn test_default_body_size_constants_agree() {
        let parsed = parse_size(DEFAULT_MAX_BODY_SIZE).unwrap();
        assert_eq!(parsed, DEFAULT_MAX_BODY_BYTES as u64);

        // Changing a config default carries over to Settings
        let settings = Settings::default();
        assert_eq!(settings.logger_name, DEFAULT_LOGGER_NAME);
        assert_eq!(settings.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_builder() {
        let settings = ResponseLoggerConfig::default()
            .logger_name("edge")
            .log_level("debug")
            .include_request_body(true)
            .include_response_body(true)
            .max_body_size("512KB")
            .skip_status_code(404)
            .skip_path("/health")
            .include_header("X-Request-Id")
            .provision()
            .unwrap();

        assert_eq!(settings.logger_name, "edge");
        assert_eq!(settings.log_level, "debug");
        assert!(settings.include_request_body);
        assert!(settings.include_response_body);
        assert_eq!(settings.max_body_size, 524_288);
        assert_eq!(settings.skip_status_codes, vec![404]);
        assert_eq!(settings.skip_paths, vec!["/health".to_string()]);
        assert_eq!(settings.include_headers, vec!["X-Request-Id".to_string()]);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ResponseLoggerConfig = serde_json::from_str(
            r#"{
                "log_level": "warn",
                "max_body_size": "2KB",
                "skip_status_codes": [404, 301],
                "skip_paths": ["/metrics"]
            }"#,
        )
        .unwrap();

        assert_eq!(config.logger_name, "response_logger");
        assert!(!config.include_response_body);

        let settings = config.provision().unwrap();
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.max_body_size, 2048);
        assert_eq!(settings.skip_status_codes, vec![404, 301]);
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let result: Result<ResponseLoggerConfig, _> =
            serde_json::from_str(r#"{ "max_body": "1MB" }"#);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("max_body"));
    }

    #[test]
    fn test_invalid_size_fails_provisioning() {
        let err = ResponseLoggerConfig::default()
            .max_body_size("10XY")
            .provision()
            .unwrap_err();

        match &err {
            ConfigError::InvalidBodySize { value, source } => {
                assert_eq!(value, "10XY");
                assert_eq!(*source, SizeError::UnknownUnit("XY".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("10XY"));
    }

    #[test]
    fn test_unrecognized_level_is_kept() {
        let settings = ResponseLoggerConfig::default()
            .log_level("bogus")
            .provision()
            .unwrap();
        assert_eq!(settings.log_level, "bogus");
    }
}
