mod registry;
mod server;
mod session;

pub use registry::*;
pub use server::*;

use crate::config::Settings;
use crate::deps::DepRegistry;
use crate::limiter::Limiter;
use crate::queue::QueueStore;
use crate::reconnect::Coordinator;
use crate::room::RoomRegistry;
use crate::telemetry::EventSink;
use std::sync::Arc;

/// Everything a connection needs, wired once at startup.
pub struct App {
    pub settings: Arc<Settings>,
    pub sessions: Arc<SessionRegistry>,
    pub rooms: Arc<RoomRegistry>,
    pub queue: Arc<dyn QueueStore>,
    pub limiter: Arc<dyn Limiter>,
    pub reconnect: Arc<Coordinator>,
    pub sink: Arc<dyn EventSink>,
    pub deps: Arc<DepRegistry>,
}
