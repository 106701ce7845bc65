//! Composite sink for fanning one record out to several sinks.
//!
//! [`MultiSink`] holds an arbitrary number of [`LogSink`] implementations and
//! emits every record to all of them concurrently.
//!
//! # Example
//!
//! ```rust
//! use response_logger::{MultiSink, TracingSink};
//!
//! let sink = MultiSink::new().with(TracingSink);
//! assert_eq!(sink.len(), 1);
//!
//! // Use with ResponseLoggerLayer
//! // let layer = ResponseLoggerLayer::new(settings, sink);
//! ```

use crate::{LogRecord, LogSink, SinkError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type BoxFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

/// Dyn-compatible counterpart of [`LogSink`], for type erasure.
trait DynSink: Send + Sync + 'static {
    fn emit_boxed(&self, record: LogRecord) -> BoxFuture<'_>;
}

struct SinkWrapper<S: LogSink> {
    inner: S,
}

impl<S: LogSink> DynSink for SinkWrapper<S> {
    fn emit_boxed(&self, record: LogRecord) -> BoxFuture<'_> {
        Box::pin(self.inner.emit(record))
    }
}

/// A sink that delegates to multiple inner sinks.
///
/// Every inner sink receives every record, even when another one fails. If any
/// of them fails, the first failure (in insertion order) is returned.
#[derive(Clone, Default)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn DynSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink. Returns self for builder pattern.
    pub fn with<S: LogSink>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(SinkWrapper { inner: sink }));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }
}

impl LogSink for MultiSink {
    async fn emit(&self, record: LogRecord) -> Result<(), SinkError> {
        let futures: Vec<_> = self
            .sinks
            .iter()
            .map(|s| {
                let record = record.clone();
                let sink = s.clone();
                async move { sink.emit_boxed(record).await }
            })
            .collect();

        futures::future::join_all(futures)
            .await
            .into_iter()
            .find(Result::is_err)
            .unwrap_or(Ok(()))
    }
}
