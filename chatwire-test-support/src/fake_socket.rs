//! In-memory transport socket.
//!
//! A [`FakeServer`] plays the remote end. Every socket its factory creates
//! shares the server state; only the most recently created socket is live,
//! older ones go deaf the moment a new one is built.
//!
//! ```
//! use chatwire::{ChatClient, ChatConfig};
//! use chatwire_test_support::FakeServer;
//! use std::time::Duration;
//!
//! let server = FakeServer::new();
//! let mut chat = ChatClient::new(ChatConfig::new("ws://fake"), server.factory());
//! chat.connect();
//! server.accept();
//! chat.tick(Duration::ZERO);
//! assert!(chat.is_connected());
//! ```

use chatwire::{SocketEvent, SocketFactory, TransportSocket};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

#[derive(Default)]
struct ServerState {
    /// Id of the live socket; 0 before the first one is created.
    current: usize,
    sockets_created: usize,
    connect_calls: usize,
    connected: bool,
    auto_accept: bool,
    fail_sends: bool,
    events: VecDeque<SocketEvent>,
    sent: Vec<String>,
    pings: usize,
    headers: Vec<(String, String)>,
}

/// Server side of the fake transport.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Rc<RefCell<ServerState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept every connection attempt without a separate `accept` call.
    pub fn auto_accepting() -> Self {
        let server = Self::new();
        server.state.borrow_mut().auto_accept = true;
        server
    }

    pub fn factory(&self) -> FakeSocketFactory {
        FakeSocketFactory {
            state: self.state.clone(),
        }
    }

    /// Complete the pending handshake.
    pub fn accept(&self) {
        let mut state = self.state.borrow_mut();
        state.connected = true;
        state.events.push_back(SocketEvent::Connected);
    }

    /// Fail the pending handshake.
    pub fn refuse(&self, reason: &str) {
        let mut state = self.state.borrow_mut();
        state.connected = false;
        state.events.push_back(SocketEvent::Error(reason.to_string()));
    }

    /// Deliver one raw text frame.
    pub fn deliver(&self, frame: impl Into<String>) {
        self.state
            .borrow_mut()
            .events
            .push_back(SocketEvent::Message(frame.into()));
    }

    /// Deliver a payload wrapped in the default chat envelope.
    pub fn deliver_enveloped(&self, payload: &Value) {
        self.deliver(format!("CaSr{}CaEd", payload));
    }

    pub fn deliver_all<I, S>(&self, frames: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for frame in frames {
            self.deliver(frame);
        }
    }

    /// Close the live connection with a status code.
    pub fn close(&self, code: u16, reason: &str) {
        let mut state = self.state.borrow_mut();
        state.connected = false;
        state.events.push_back(SocketEvent::Closed {
            code,
            reason: reason.to_string(),
            was_clean: true,
        });
    }

    /// Drop the live connection abruptly: an error followed by an abnormal close.
    pub fn drop_connection(&self, reason: &str) {
        let mut state = self.state.borrow_mut();
        state.connected = false;
        state.events.push_back(SocketEvent::Error(reason.to_string()));
        state.events.push_back(SocketEvent::Closed {
            code: 1006,
            reason: reason.to_string(),
            was_clean: false,
        });
    }

    /// Make every following `send` fail with a broken pipe.
    pub fn fail_sends(&self, fail: bool) {
        self.state.borrow_mut().fail_sends = fail;
    }

    /// Frames the client sent, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.state.borrow().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.state.borrow_mut().sent)
    }

    /// Sent frames parsed as JSON. Panics on a frame that is not JSON.
    pub fn sent_json(&self) -> Vec<Value> {
        self.state
            .borrow()
            .sent
            .iter()
            .map(|s| serde_json::from_str(s).expect("client sent non-JSON frame"))
            .collect()
    }

    /// The most recent request the client sent, parsed.
    pub fn last_request(&self) -> Option<Value> {
        self.sent_json().pop()
    }

    pub fn pings(&self) -> usize {
        self.state.borrow().pings
    }

    pub fn sockets_created(&self) -> usize {
        self.state.borrow().sockets_created
    }

    /// Number of `connect` calls across all sockets.
    pub fn connect_calls(&self) -> usize {
        self.state.borrow().connect_calls
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    /// Headers set on the factory so far.
    pub fn headers(&self) -> Vec<(String, String)> {
        self.state.borrow().headers.clone()
    }
}

/// Socket handed to the client under test.
pub struct FakeSocket {
    id: usize,
    state: Rc<RefCell<ServerState>>,
}

impl FakeSocket {
    fn is_live(&self) -> bool {
        self.state.borrow().current == self.id
    }
}

impl TransportSocket for FakeSocket {
    fn connect(&mut self) {
        if !self.is_live() {
            return;
        }
        let mut state = self.state.borrow_mut();
        state.connect_calls += 1;
        if state.auto_accept {
            state.connected = true;
            state.events.push_back(SocketEvent::Connected);
        }
    }

    fn disconnect(&mut self, _force: bool) {
        if self.is_live() {
            let mut state = self.state.borrow_mut();
            state.connected = false;
            state.events.clear();
        }
    }

    fn send(&mut self, text: &str) -> io::Result<()> {
        if !self.is_connected() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "fake socket closed"));
        }
        let mut state = self.state.borrow_mut();
        if state.fail_sends {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "fake send failure"));
        }
        state.sent.push(text.to_string());
        Ok(())
    }

    fn ping(&mut self) -> io::Result<()> {
        if !self.is_connected() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "fake socket closed"));
        }
        self.state.borrow_mut().pings += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.is_live() && self.state.borrow().connected
    }

    fn receive(&mut self, handler: &mut dyn FnMut(SocketEvent)) -> usize {
        if !self.is_live() {
            return 0;
        }
        let drained: Vec<SocketEvent> = self.state.borrow_mut().events.drain(..).collect();
        let count = drained.len();
        for event in drained {
            handler(event);
        }
        count
    }
}

/// Builds [`FakeSocket`]s bound to one [`FakeServer`].
pub struct FakeSocketFactory {
    state: Rc<RefCell<ServerState>>,
}

impl SocketFactory for FakeSocketFactory {
    fn create(&mut self) -> Box<dyn TransportSocket> {
        let mut state = self.state.borrow_mut();
        state.sockets_created += 1;
        state.current = state.sockets_created;
        state.connected = false;
        state.events.clear();
        Box::new(FakeSocket {
            id: state.current,
            state: self.state.clone(),
        })
    }

    fn set_header(&mut self, name: &str, value: &str) {
        let mut state = self.state.borrow_mut();
        state.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        state.headers.push((name.to_string(), value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_newest_socket_is_live() {
        let server = FakeServer::new();
        let mut factory = server.factory();
        let mut old = factory.create();
        old.connect();
        server.accept();

        let mut new = factory.create();
        new.connect();
        server.accept();

        let mut seen = 0;
        assert_eq!(old.receive(&mut |_| seen += 1), 0);
        assert!(!old.is_connected());
        assert_eq!(new.receive(&mut |_| seen += 1), 1);
        assert!(new.is_connected());
        assert_eq!(server.connect_calls(), 2);
        assert_eq!(server.sockets_created(), 2);
    }

    #[test]
    fn test_send_records_frames() {
        let server = FakeServer::auto_accepting();
        let mut socket = server.factory().create();
        assert!(socket.send("early").is_err());
        socket.connect();
        socket.send("{\"a\":1}").unwrap();
        assert_eq!(server.sent(), vec!["{\"a\":1}"]);
        assert_eq!(server.last_request().unwrap()["a"], 1);
    }
}
