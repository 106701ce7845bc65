//! Assembly of the structured fields and the final [`LogRecord`] for an exchange.

use std::collections::BTreeMap;
use tracing::Level;

use crate::config::Settings;
use crate::level::select_level;
use crate::types::{Exchange, Field, FieldValue, LogRecord, ResponseOutcome};

/// Build the ordered field list for one exchange.
///
/// The nine base fields are always present. `headers`, `request_body` and
/// `response_body` are only added when configured and non-empty, and `error`
/// only when the exchange failed.
pub fn build_fields(
    exchange: &Exchange,
    outcome: &ResponseOutcome,
    settings: &Settings,
) -> Vec<Field> {
    let mut fields = vec![
        Field::new("method", FieldValue::Text(exchange.method.clone())),
        Field::new("path", FieldValue::Text(exchange.path.clone())),
        Field::new("query", FieldValue::Text(exchange.query.clone())),
        Field::new("status", FieldValue::Number(u64::from(outcome.status.as_u16()))),
        Field::new("size", FieldValue::Number(outcome.bytes_written)),
        Field::new("duration", FieldValue::Duration(outcome.duration)),
        Field::new("remote_addr", FieldValue::Text(exchange.remote_addr.clone())),
        Field::new("user_agent", FieldValue::Text(exchange.user_agent.clone())),
        Field::new("referer", FieldValue::Text(exchange.referer.clone())),
    ];

    if !settings.include_headers.is_empty() {
        let headers: BTreeMap<String, String> = exchange
            .headers
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if !headers.is_empty() {
            fields.push(Field::new("headers", FieldValue::Headers(headers)));
        }
    }

    if settings.include_request_body {
        if let Some(body) = exchange.request_body.as_ref().filter(|b| !b.is_empty()) {
            fields.push(Field::new("request_body", FieldValue::Bytes(body.clone())));
        }
    }

    if settings.include_response_body {
        if let Some(body) = outcome.body.as_ref().filter(|b| !b.is_empty()) {
            let body = body.slice(..body.len().min(settings.max_body_size));
            fields.push(Field::new("response_body", FieldValue::Bytes(body)));
        }
    }

    if let Some(error) = &outcome.error {
        fields.push(Field::new("error", FieldValue::Text(error.clone())));
    }

    fields
}

/// Build the complete record: message, level and fields.
///
/// Failed exchanges are always logged at `ERROR`; otherwise the level comes from
/// [`select_level`].
pub fn build_record(
    exchange: &Exchange,
    outcome: &ResponseOutcome,
    settings: &Settings,
) -> LogRecord {
    let status = outcome.status.as_u16();
    let level = if outcome.error.is_some() {
        Level::ERROR
    } else {
        select_level(status, &settings.log_level)
    };

    LogRecord {
        logger: settings.logger_name.clone(),
        correlation_id: exchange.correlation_id,
        level,
        message: format!("{} {} → {}", exchange.method, exchange.path, status),
        fields: build_fields(exchange, outcome, settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use bytes::Bytes;
    use std::time::{Duration, Instant};

    fn exchange() -> Exchange {
        Exchange {
            correlation_id: 7,
            started: Instant::now(),
            method: "GET".to_string(),
            path: "/api/x".to_string(),
            query: "q=1".to_string(),
            remote_addr: "127.0.0.1:4000".to_string(),
            user_agent: "test-agent".to_string(),
            referer: String::new(),
            headers: vec![
                ("X-Request-Id".to_string(), "abc".to_string()),
                ("X-Empty".to_string(), String::new()),
            ],
            request_body: Some(Bytes::from_static(b"request")),
        }
    }

    fn outcome() -> ResponseOutcome {
        ResponseOutcome {
            status: StatusCode::CREATED,
            bytes_written: 2,
            body: Some(Bytes::from_static(b"ok")),
            error: None,
            duration: Duration::from_millis(12),
        }
    }

    const BASE: [&str; 9] = [
        "method",
        "path",
        "query",
        "status",
        "size",
        "duration",
        "remote_addr",
        "user_agent",
        "referer",
    ];

    #[test]
    fn test_base_fields_only_by_default() {
        let record = build_record(&exchange(), &outcome(), &Settings::default());
        assert_eq!(record.field_names(), BASE.to_vec());
        assert_eq!(record.field("status"), Some(&FieldValue::Number(201)));
        assert_eq!(record.field("size"), Some(&FieldValue::Number(2)));
        assert_eq!(
            record.field("duration"),
            Some(&FieldValue::Duration(Duration::from_millis(12)))
        );
    }

    #[test]
    fn test_full_field_order() {
        let settings = Settings {
            include_request_body: true,
            include_response_body: true,
            include_headers: vec!["X-Request-Id".to_string(), "X-Empty".to_string()],
            ..Settings::default()
        };
        let record = build_record(&exchange(), &outcome(), &settings);

        let mut expected = BASE.to_vec();
        expected.extend(["headers", "request_body", "response_body"]);
        assert_eq!(record.field_names(), expected);

        // Only present, non-empty headers are surfaced
        let headers = BTreeMap::from([("X-Request-Id".to_string(), "abc".to_string())]);
        assert_eq!(record.field("headers"), Some(&FieldValue::Headers(headers)));
        assert_eq!(
            record.field("request_body"),
            Some(&FieldValue::Bytes(Bytes::from_static(b"request")))
        );
    }

    #[test]
    fn test_empty_optional_fields_are_omitted() {
        let settings = Settings {
            include_request_body: true,
            include_response_body: true,
            include_headers: vec!["X-Empty".to_string()],
            ..Settings::default()
        };
        let mut exchange = exchange();
        exchange.headers = vec![("X-Empty".to_string(), String::new())];
        exchange.request_body = Some(Bytes::new());
        let mut outcome = outcome();
        outcome.body = Some(Bytes::new());

        let record = build_record(&exchange, &outcome, &settings);
        assert_eq!(record.field_names(), BASE.to_vec());
    }

    #[test]
    fn test_response_body_is_cut_to_max_size() {
        let settings = Settings {
            include_response_body: true,
            max_body_size: 3,
            ..Settings::default()
        };
        let mut outcome = outcome();
        outcome.body = Some(Bytes::from_static(b"abcdef"));

        let record = build_record(&exchange(), &outcome, &settings);
        assert_eq!(
            record.field("response_body"),
            Some(&FieldValue::Bytes(Bytes::from_static(b"abc")))
        );
    }

    #[test]
    fn test_captured_bodies_ignored_when_disabled() {
        let record = build_record(&exchange(), &outcome(), &Settings::default());
        assert!(record.field("request_body").is_none());
        assert!(record.field("response_body").is_none());
    }

    #[test]
    fn test_message_and_level() {
        let settings = Settings {
            log_level: "debug".to_string(),
            logger_name: "edge".to_string(),
            ..Settings::default()
        };
        let record = build_record(&exchange(), &outcome(), &settings);
        assert_eq!(record.message, "GET /api/x → 201");
        assert_eq!(record.level, Level::DEBUG);
        assert_eq!(record.logger, "edge");
        assert_eq!(record.correlation_id, 7);

        let mut failing = outcome();
        failing.status = StatusCode::SERVICE_UNAVAILABLE;
        let record = build_record(&exchange(), &failing, &settings);
        assert_eq!(record.level, Level::ERROR);
    }

    #[test]
    fn test_error_is_appended_and_forces_error_level() {
        let mut outcome = outcome();
        outcome.status = StatusCode::OK;
        outcome.error = Some("connection reset".to_string());

        let record = build_record(&exchange(), &outcome, &Settings::default());
        assert_eq!(record.level, Level::ERROR);
        assert_eq!(record.field_names().last(), Some(&"error"));
        assert_eq!(
            record.field("error"),
            Some(&FieldValue::Text("connection reset".to_string()))
        );
    }
}
