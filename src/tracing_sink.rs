//! Default sink that writes records through the `tracing` crate.
//!
//! [`TracingSink`] is both a ready-to-use sink and an example of how to
//! implement [`LogSink`].

use tracing::{debug, error, info, warn, Level};

use crate::{LogRecord, LogSink, SinkError};

/// Emits each record as one `tracing` event at the record's level.
///
/// The event carries the logger name and correlation ID as their own fields, the
/// ordered record fields as a JSON object in `fields`, and the record message as
/// the event message.
///
/// # Examples
///
/// ```rust,no_run
/// use response_logger::{ResponseLoggerLayer, Settings, TracingSink};
///
/// # #[tokio::main]
/// # async fn main() {
/// let layer = ResponseLoggerLayer::new(Settings::default(), TracingSink);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    async fn emit(&self, record: LogRecord) -> Result<(), SinkError> {
        let fields = serde_json::to_string(&record.fields_map())?;
        let logger = record.logger.as_str();
        let correlation_id = record.correlation_id;
        let message = record.message.as_str();

        if record.level == Level::ERROR {
            error!(logger, correlation_id, fields = %fields, "{message}");
        } else if record.level == Level::WARN {
            warn!(logger, correlation_id, fields = %fields, "{message}");
        } else if record.level == Level::INFO {
            info!(logger, correlation_id, fields = %fields, "{message}");
        } else {
            debug!(logger, correlation_id, fields = %fields, "{message}");
        }
        Ok(())
    }
}
