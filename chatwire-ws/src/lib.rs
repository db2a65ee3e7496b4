//! # chatwire-ws
//!
//! Tungstenite-backed [`TransportSocket`](chatwire::TransportSocket) for the
//! chatwire clients.
//!
//! The handshake is blocking; afterwards the stream is switched to
//! non-blocking so `receive` can be polled from a game tick loop without
//! stalling it.
//!
//! Only plain `ws://` endpoints are supported. tungstenite is built without a
//! TLS backend, so a `wss://` URL is rejected with
//! [`WsError::UnsupportedScheme`] and reported as a connect error.
//!
//! ```rust,no_run
//! use chatwire::{ChatClient, ChatConfig};
//! use chatwire_ws::WsSocketFactory;
//! use std::time::Duration;
//!
//! let config = ChatConfig::new("ws://127.0.0.1:8080/chat/");
//! let factory = WsSocketFactory::new(&config.url).with_bearer("token");
//! let mut chat = ChatClient::new(config, factory);
//! chat.connect();
//! chat.tick(Duration::from_millis(16));
//! ```

// Tracing macros - no-op when feature disabled
#[cfg(feature = "tracing")]
macro_rules! trace_debug { ($($arg:tt)*) => { tracing::debug!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug { ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }} }

#[cfg(feature = "tracing")]
macro_rules! trace_warn { ($($arg:tt)*) => { tracing::warn!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn { ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }} }

mod error;
mod socket;

pub use error::{Result, WsError};
pub use socket::{WsSocket, WsSocketFactory};
