mod postgres;
mod records;

pub use postgres::*;
pub use records::*;

use std::sync::Arc;

/// Append-only event retention boundary. Best-effort by contract: a
/// failed write is logged and forgotten, the game path never waits on it.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, event: Telemetry);
}

/// Sink used when no relational store is configured.
pub struct NoopSink;

#[async_trait::async_trait]
impl EventSink for NoopSink {
    async fn record(&self, event: Telemetry) {
        log::debug!("telemetry dropped (no sink): {:?}", event);
    }
}

/// Fire-and-forget write, the only way the session layer records events.
pub fn record(sink: &Arc<dyn EventSink>, event: Telemetry) {
    let sink = sink.clone();
    tokio::spawn(async move { sink.record(event).await });
}
