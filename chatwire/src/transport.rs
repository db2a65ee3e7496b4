//! Transport socket capability.
//!
//! Connections never talk to a concrete websocket. They own a
//! [`TransportSocket`] built by a [`SocketFactory`], drain its events during
//! `tick`, and write text frames to it. `chatwire-ws` provides the tungstenite
//! implementation; tests use the in-memory socket from `chatwire-test-support`.

use std::io;

/// Event produced by a transport socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Handshake completed.
    Connected,
    /// One text frame arrived.
    Message(String),
    /// Connection attempt or established connection failed.
    Error(String),
    /// Peer or local side closed the connection.
    Closed {
        code: u16,
        reason: String,
        was_clean: bool,
    },
}

/// Raw text-message websocket.
///
/// Implementations queue events internally and hand them out from
/// [`receive`](TransportSocket::receive); they never call back into the owner.
pub trait TransportSocket {
    /// Start connecting. Completion is reported as `Connected` or `Error`.
    fn connect(&mut self);

    /// Close the connection. `force` skips the close handshake.
    fn disconnect(&mut self, force: bool);

    /// Send one text frame.
    fn send(&mut self, text: &str) -> io::Result<()>;

    /// Send a keep-alive.
    fn ping(&mut self) -> io::Result<()>;

    /// Check if the handshake completed and the socket is still open.
    fn is_connected(&self) -> bool;

    /// Drain queued events into `handler`, returns count drained.
    fn receive(&mut self, handler: &mut dyn FnMut(SocketEvent)) -> usize;
}

/// Builds a fresh socket for every connection attempt.
pub trait SocketFactory {
    fn create(&mut self) -> Box<dyn TransportSocket>;

    /// Add a handshake header to every socket created from now on.
    ///
    /// Factories without a handshake ignore it.
    fn set_header(&mut self, _name: &str, _value: &str) {}
}

impl<F> SocketFactory for F
where
    F: FnMut() -> Box<dyn TransportSocket>,
{
    fn create(&mut self) -> Box<dyn TransportSocket> {
        self()
    }
}
