//! # Response Logger
//!
//! An Axum/tower middleware that observes each request/response exchange as it
//! flows back through a server or proxy, and emits one structured log record per
//! exchange: method, path, status, response size, duration, selected request
//! headers, and optionally bounded copies of the request and response bodies.
//!
//! ## Features
//!
//! - **Stream-aware**: response bodies are tapped as they stream to the client,
//!   never buffered or altered
//! - **Bounded capture**: at most `max_body_size` bytes of each body are copied
//! - **Skip rules**: suppress records by path substring or status code
//! - **Status-aware levels**: 5xx logs at `ERROR`, 4xx at `WARN`
//! - **Background emission**: records are handed to a [`LogSink`] off the
//!   request path; a failing sink never affects a response
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use response_logger::{ResponseLoggerConfig, ResponseLoggerLayer, TracingSink};
//!
//! async fn hello() -> &'static str {
//!     "Hello, World!"
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ResponseLoggerConfig::default()
//!         .include_response_body(true)
//!         .max_body_size("64KB")
//!         .skip_path("/health")
//!         .skip_status_code(404)
//!         .include_header("X-Request-Id");
//!
//!     let layer = ResponseLoggerLayer::from_config(config, TracingSink)
//!         .expect("invalid response logger configuration");
//!
//!     let app = Router::new().route("/hello", get(hello)).layer(layer);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! ## Custom Sinks
//!
//! Implement the [`LogSink`] trait to send records somewhere else:
//!
//! ```rust
//! use response_logger::{LogRecord, LogSink, SinkError};
//!
//! #[derive(Debug)]
//! struct StdoutSink;
//!
//! impl LogSink for StdoutSink {
//!     async fn emit(&self, record: LogRecord) -> Result<(), SinkError> {
//!         let fields = serde_json::to_string(&record.fields_map())?;
//!         println!("[{}] {} {}", record.level, record.message, fields);
//!         Ok(())
//!     }
//! }
//! ```

use axum::{extract::Request, http::StatusCode, response::Response};
use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tower::{Layer, Service};
use tracing::{debug, error, instrument, warn};

pub mod body_wrapper;
use body_wrapper::{capture_request_body, tap_body, TapSummary};

pub mod config;
pub use config::{ConfigError, ResponseLoggerConfig, Settings};

pub mod fields;
use fields::build_record;

pub mod filter;
use filter::{skip_by_path, skip_by_status};

pub mod level;
pub use level::select_level;

pub mod multi_sink;
pub use multi_sink::MultiSink;

pub mod size;
pub use size::{parse_size, SizeError};

pub mod tracing_sink;
pub use tracing_sink::TracingSink;

pub mod types;
pub use types::{Exchange, Field, FieldValue, LogRecord, ResponseOutcome};

/// Error reported by a [`LogSink`]. Never surfaced to the request path.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to encode log fields: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("log sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for completed log records.
///
/// Records are emitted from a background task, one at a time, in the order in
/// which exchanges completed. A returned error is reported through `tracing` and
/// otherwise ignored.
///
/// # Examples
///
/// ```rust
/// use response_logger::{LogRecord, LogSink, SinkError};
/// use tracing::info;
///
/// #[derive(Debug)]
/// struct MySink;
///
/// impl LogSink for MySink {
///     async fn emit(&self, record: LogRecord) -> Result<(), SinkError> {
///         info!(level = %record.level, "{}", record.message);
///         Ok(())
///     }
/// }
/// ```
pub trait LogSink: Send + Sync + 'static {
    /// Emit one record.
    fn emit(&self, record: LogRecord) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Tower layer for the response logging middleware.
///
/// This is the main entry point. It spawns a background task that forwards
/// completed records to the provided [`LogSink`], so it must be created inside a
/// Tokio runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use response_logger::{ResponseLoggerLayer, Settings, TracingSink};
/// use axum::{routing::get, Router};
///
/// # async fn hello() -> &'static str { "Hello" }
/// # #[tokio::main]
/// # async fn main() {
/// let layer = ResponseLoggerLayer::new(Settings::default(), TracingSink);
///
/// let app: Router = Router::new()
///     .route("/hello", get(hello))
///     .layer(layer);
/// # }
/// ```
#[derive(Clone)]
pub struct ResponseLoggerLayer {
    settings: Arc<Settings>,
    tx: mpsc::UnboundedSender<LogRecord>,
}

impl ResponseLoggerLayer {
    /// Create a layer from provisioned settings.
    ///
    /// Spawns the background task that runs `sink` for every record.
    pub fn new<K: LogSink>(settings: Settings, sink: K) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogRecord>();

        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let correlation_id = record.correlation_id;
                if let Err(e) = sink.emit(record).await {
                    warn!(correlation_id = %correlation_id, error = %e, "Failed to emit response log record");
                }
            }
        });

        Self {
            settings: Arc::new(settings),
            tx,
        }
    }

    /// Provision `config` and create a layer from it.
    pub fn from_config<K: LogSink>(
        config: ResponseLoggerConfig,
        sink: K,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(config.provision()?, sink))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl<S> Layer<S> for ResponseLoggerLayer {
    type Service = ResponseLoggerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResponseLoggerService {
            inner,
            settings: self.settings.clone(),
            tx: self.tx.clone(),
        }
    }
}

/// Tower service implementation for the response logging middleware.
///
/// Wraps an inner service and logs each exchange that passes through it. Users
/// typically don't interact with this type directly - it's created by
/// [`ResponseLoggerLayer`].
#[derive(Clone)]
pub struct ResponseLoggerService<S> {
    inner: S,
    settings: Arc<Settings>,
    tx: mpsc::UnboundedSender<LogRecord>,
}

/// Hand a finished record to the background task.
fn dispatch(tx: &mpsc::UnboundedSender<LogRecord>, record: LogRecord) {
    let correlation_id = record.correlation_id;
    if tx.send(record).is_err() {
        error!(correlation_id = %correlation_id, "Failed to send log record to background task");
    }
}

/// Error recorded for an exchange whose future was dropped before the
/// downstream service produced a response.
pub const CANCELLED_ERROR: &str = "request cancelled before a response was produced";

/// An exchange that still owes exactly one record.
///
/// It travels with the exchange: first inside the service future, then inside
/// the response body tap. If it is dropped without having reported (the future
/// was cancelled or timed out while the downstream was pending), it reports the
/// default status with [`CANCELLED_ERROR`].
struct PendingExchange {
    exchange: Exchange,
    settings: Arc<Settings>,
    tx: mpsc::UnboundedSender<LogRecord>,
    done: bool,
}

impl PendingExchange {
    fn new(exchange: Exchange, settings: Arc<Settings>, tx: mpsc::UnboundedSender<LogRecord>) -> Self {
        Self {
            exchange,
            settings,
            tx,
            done: false,
        }
    }

    /// Emit the record for a response, or for a failure when `status` is the
    /// default one.
    fn report(mut self, status: StatusCode, summary: TapSummary) {
        self.done = true;
        self.emit(status, summary);
    }

    /// Finish without a record.
    fn dismiss(mut self) {
        self.done = true;
    }

    fn emit(&self, status: StatusCode, summary: TapSummary) {
        if skip_by_status(status.as_u16(), &self.settings.skip_status_codes) {
            return;
        }
        let outcome = ResponseOutcome {
            status,
            bytes_written: summary.bytes_written,
            body: summary.captured,
            error: summary.error,
            duration: self.exchange.started.elapsed(),
        };
        dispatch(&self.tx, build_record(&self.exchange, &outcome, &self.settings));
    }
}

impl Drop for PendingExchange {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        debug!(correlation_id = %self.exchange.correlation_id, "Exchange dropped before a response was produced");
        self.emit(
            StatusCode::OK,
            TapSummary {
                error: Some(CANCELLED_ERROR.to_string()),
                ..TapSummary::default()
            },
        );
    }
}

impl<S> Service<Request> for ResponseLoggerService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Display + Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    #[instrument(skip_all)]
    fn call(&mut self, request: Request) -> Self::Future {
        let settings = self.settings.clone();

        if skip_by_path(request.uri().path(), &settings.skip_paths) {
            debug!(path = %request.uri().path(), "Path matches skip rule, bypassing capture");
            return Box::pin(self.inner.call(request));
        }

        let exchange = Exchange::from_request(&request, &settings.include_headers);
        let correlation_id = exchange.correlation_id;
        let mut pending = PendingExchange::new(exchange, settings.clone(), self.tx.clone());

        // The ready service goes into the future; a fresh clone takes its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let request = if settings.include_request_body {
                let (parts, body) = request.into_parts();
                let (body, captured) = capture_request_body(body, settings.max_body_size).await;
                debug!(correlation_id = %correlation_id, captured = captured.len(), "Request body captured");
                pending.exchange.request_body = Some(captured);
                Request::from_parts(parts, body)
            } else {
                request
            };

            match inner.call(request).await {
                Ok(response) => {
                    let status = response.status();
                    if skip_by_status(status.as_u16(), &settings.skip_status_codes) {
                        debug!(correlation_id = %correlation_id, status = %status, "Status matches skip rule, not logging");
                        pending.dismiss();
                        return Ok(response);
                    }

                    let capture_limit = settings
                        .include_response_body
                        .then_some(settings.max_body_size);
                    let (parts, body) = response.into_parts();
                    let body = tap_body(body, capture_limit, move |summary: TapSummary| {
                        pending.report(status, summary);
                    });

                    Ok(Response::from_parts(parts, body))
                }
                Err(e) => {
                    // No response was produced; report the default status with the error.
                    pending.report(
                        StatusCode::OK,
                        TapSummary {
                            error: Some(e.to_string()),
                            ..TapSummary::default()
                        },
                    );
                    Err(e)
                }
            }
        })
    }
}
