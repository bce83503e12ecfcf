mod client;
mod error;
mod server;
mod views;

pub use client::*;
pub use error::*;
pub use server::*;
pub use views::*;

/// Outbound channel of a connected socket. Room actors and the
/// matchmaker address sockets only through these handles.
pub type Outbox = tokio::sync::mpsc::UnboundedSender<ServerEvent>;
