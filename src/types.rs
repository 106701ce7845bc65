//! Data types for captured exchanges and the log records built from them.
//!
//! An [`Exchange`] is the request side of one request/response pair, snapshotted
//! when the request enters the middleware. A [`ResponseOutcome`] is filled in
//! once the response has been fully forwarded (or has failed). The two are
//! combined into a [`LogRecord`] by [`crate::fields::build_record`].

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderMap, StatusCode},
};
use bytes::Bytes;
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::{
    collections::BTreeMap,
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant, SystemTime},
};
use tracing::Level;

/// Global counter for correlation IDs, combined with the process start time
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(1);
static PROCESS_START_TIME: std::sync::OnceLock<u64> = std::sync::OnceLock::new();

/// Generate a unique correlation ID combining process start time and counter
pub(crate) fn generate_correlation_id() -> u64 {
    let start_time = *PROCESS_START_TIME.get_or_init(|| {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    });

    let counter = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed);

    // High 32 bits: process start timestamp, Low 32 bits: counter
    (start_time << 32) | (counter & 0xFFFF_FFFF)
}

/// Request-side snapshot of one exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Unique identifier shared by everything emitted for this exchange
    pub correlation_id: u64,
    /// When the request entered the middleware
    pub started: Instant,
    pub method: String,
    pub path: String,
    /// Raw query string, without the leading `?`
    pub query: String,
    /// Peer address, when the server was built with connect info
    pub remote_addr: String,
    pub user_agent: String,
    pub referer: String,
    /// Configured header name -> value, for configured headers present on the request
    pub headers: Vec<(String, String)>,
    /// Captured request body, when request body capture is enabled
    pub request_body: Option<Bytes>,
}

impl Exchange {
    /// Snapshot `request`, surfacing the headers named in `include_headers`.
    pub fn from_request(request: &Request, include_headers: &[String]) -> Self {
        let headers = request.headers();
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        Self {
            correlation_id: generate_correlation_id(),
            started: Instant::now(),
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            query: request.uri().query().unwrap_or_default().to_string(),
            remote_addr,
            user_agent: header_str(headers, header::USER_AGENT.as_str()),
            referer: header_str(headers, header::REFERER.as_str()),
            headers: include_headers
                .iter()
                .map(|name| (name.clone(), header_str(headers, name)))
                .collect(),
            request_body: None,
        }
    }
}

/// Header value as text, or empty if missing, invalid, or not visible ASCII
fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Response-side result of one exchange.
#[derive(Debug, Clone)]
pub struct ResponseOutcome {
    /// Status of the response; `200 OK` if the downstream never produced one
    pub status: StatusCode,
    /// Total body bytes forwarded to the client
    pub bytes_written: u64,
    /// Captured response body, when response body capture is enabled
    pub body: Option<Bytes>,
    /// Downstream or stream error, if the exchange did not complete cleanly
    pub error: Option<String>,
    /// Time from request entry until the response body finished
    pub duration: Duration,
}

/// Value of a single structured field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(u64),
    /// Serialized as fractional seconds
    Duration(#[serde(serialize_with = "serialize_secs")] Duration),
    Headers(BTreeMap<String, String>),
    /// Raw bytes, serialized as (lossy) UTF-8 text
    Bytes(#[serde(serialize_with = "serialize_lossy")] Bytes),
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

fn serialize_lossy<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

/// A named field of a log record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub value: FieldValue,
}

impl Field {
    pub fn new(name: &'static str, value: FieldValue) -> Self {
        Self { name, value }
    }
}

/// One structured log record, ready for a [`crate::LogSink`].
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub logger: String,
    pub correlation_id: u64,
    pub level: Level,
    /// `"<METHOD> <PATH> → <STATUS>"`
    pub message: String,
    /// Fields in emission order
    pub fields: Vec<Field>,
}

impl LogRecord {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Names of the fields, in emission order.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Serializable view of the fields that preserves their order.
    pub fn fields_map(&self) -> FieldsMap<'_> {
        FieldsMap(&self.fields)
    }
}

/// Serializes a field list as a map, keeping emission order.
pub struct FieldsMap<'a>(&'a [Field]);

impl Serialize for FieldsMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in self.0 {
            map.serialize_entry(field.name, &field.value)?;
        }
        map.end()
    }
}
