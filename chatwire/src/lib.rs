//! # chatwire
//!
//! Tick-driven websocket clients for a game-backend chat service and the
//! dedicated-server fleet channels.
//!
//! ## Features
//!
//! - **Reconnecting**: exponential backoff with jitter, give-up after a total
//!   timeout, keep-alive pings
//! - **Envelope framing**: messages split over several frames between
//!   `CaSr`/`CaEd` markers are reassembled before parsing
//! - **Correlated requests**: every request carries a message id; the
//!   matching response fires its continuation exactly once
//! - **Notifications**: one replaceable handler per push kind
//!
//! ## Tick loop
//!
//! Nothing runs on its own. The host owns the client and calls `tick` from its
//! frame loop; socket events, callbacks and timers are all driven from there.
//!
//! ```rust,ignore
//! use chatwire::{ChatClient, ChatConfig};
//! use chatwire_ws::WsSocketFactory;
//!
//! let config = ChatConfig::new("ws://example.net/chat/");
//! let factory = WsSocketFactory::new(&config.url).with_bearer(token);
//! let mut chat = ChatClient::new(config, factory);
//!
//! chat.on_chat(|notif| println!("{}: {}", notif.sender_id, notif.message));
//! chat.connect();
//!
//! loop {
//!     chat.tick(frame_time);
//! }
//! ```
//!
//! The transport is a [`TransportSocket`] built by a [`SocketFactory`], so the
//! same clients run against `chatwire-ws` in production and an in-memory
//! socket in tests.

// Tracing macros - no-op when feature disabled
#[cfg(feature = "tracing")]
macro_rules! trace_debug { ($($arg:tt)*) => { tracing::debug!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug { ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }} }

#[cfg(feature = "tracing")]
macro_rules! trace_info { ($($arg:tt)*) => { tracing::info!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_info { ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }} }

#[cfg(feature = "tracing")]
macro_rules! trace_warn { ($($arg:tt)*) => { tracing::warn!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn { ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }} }

mod error;

pub mod ams;
pub mod chat;
pub mod config;
pub mod connection;
pub mod correlator;
pub mod dispatcher;
pub mod dshub;
pub mod envelope;
pub mod models;
pub mod timer;
pub mod transport;

pub use ams::AmsClient;
pub use chat::{ChatClient, ChatMethod, ChatNotification};
pub use config::{AmsConfig, ChatConfig, ConnectionConfig, DsHubConfig};
pub use connection::{ConnectionState, ReconnectingConnection};
pub use correlator::{MessageId, RequestCorrelator};
pub use dispatcher::{NotificationDispatcher, NotificationKind};
pub use dshub::{DsHubClient, DsHubTopic};
pub use envelope::{process_fragment, EnvelopeFramer};
pub use error::{Error, Result};
pub use timer::RepeatingTimer;
pub use transport::{SocketEvent, SocketFactory, TransportSocket};
