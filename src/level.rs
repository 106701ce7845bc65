//! Severity selection for a completed exchange.

use tracing::Level;

/// Pick the severity for an exchange.
///
/// Server errors are always `ERROR` and client errors always `WARN`. Anything
/// below 400 uses `configured_default`, matched exactly against `"debug"`,
/// `"info"`, `"warn"` and `"error"`; unrecognized values fall back to `INFO`.
pub fn select_level(status: u16, configured_default: &str) -> Level {
    match status {
        500.. => Level::ERROR,
        400..=499 => Level::WARN,
        _ => parse_level(configured_default).unwrap_or(Level::INFO),
    }
}

/// Map a configured level name to a [`Level`], if it is one we recognize.
pub(crate) fn parse_level(name: &str) -> Option<Level> {
    match name {
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}
