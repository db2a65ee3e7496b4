//! WebSocket transport socket.

use std::collections::VecDeque;
use std::io;
use std::net::TcpStream;

use chatwire::{SocketEvent, SocketFactory, TransportSocket};
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::client::Request;
use tungstenite::http::{HeaderName, HeaderValue};
use tungstenite::protocol::WebSocket;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::Message;

use crate::{Result, WsError};

/// Close code reported when the stream dies without a close frame.
const ABNORMAL_CLOSE: u16 = 1006;
/// Close code reported for a close frame without a status.
const NO_STATUS_CLOSE: u16 = 1005;

/// One websocket connection attempt.
///
/// Events are queued while reading and handed out by `receive`, so the
/// owner never gets called back from inside a socket method.
pub struct WsSocket {
    url: String,
    headers: Vec<(String, String)>,
    ws: Option<WebSocket<MaybeTlsStream<TcpStream>>>,
    events: VecDeque<SocketEvent>,
}

impl WsSocket {
    pub fn new(url: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            headers,
            ws: None,
            events: VecDeque::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the handshake request with the configured headers.
    pub fn request(&self) -> Result<Request> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|_| WsError::invalid_url(&self.url))?;
        if request.uri().scheme_str() != Some("ws") {
            return Err(WsError::UnsupportedScheme(self.url.clone()));
        }

        for (name, value) in &self.headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| WsError::invalid_header(name, e))?;
            let value = HeaderValue::from_str(value).map_err(|e| WsError::invalid_header(name, e))?;
            request.headers_mut().insert(header, value);
        }
        Ok(request)
    }

    fn open(&self) -> Result<WebSocket<MaybeTlsStream<TcpStream>>> {
        let (ws, _response) = tungstenite::connect(self.request()?)?;

        // Set non-blocking for game loop compatibility
        if let MaybeTlsStream::Plain(ref stream) = ws.get_ref() {
            stream.set_nonblocking(true)?;
        }
        Ok(ws)
    }

    fn lost(&mut self, reason: String) {
        self.ws = None;
        self.events.push_back(SocketEvent::Error(reason.clone()));
        self.events.push_back(SocketEvent::Closed {
            code: ABNORMAL_CLOSE,
            reason,
            was_clean: false,
        });
    }

    fn read_available(&mut self) {
        loop {
            let Some(ws) = self.ws.as_mut() else {
                return;
            };

            match ws.read() {
                Ok(Message::Text(text)) => {
                    self.events.push_back(SocketEvent::Message(text.to_string()));
                }
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => self.events.push_back(SocketEvent::Message(text)),
                    Err(_) => trace_warn!("dropping non-UTF-8 binary frame"),
                },
                // tungstenite queues the pong itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    let (code, reason) = match frame {
                        Some(f) => (u16::from(f.code), f.reason.to_string()),
                        None => (NO_STATUS_CLOSE, String::new()),
                    };
                    let _ = ws.flush();
                    self.ws = None;
                    self.events.push_back(SocketEvent::Closed {
                        code,
                        reason,
                        was_clean: true,
                    });
                    return;
                }
                Err(tungstenite::Error::Io(ref e)) if e.kind() == io::ErrorKind::WouldBlock => {
                    return;
                }
                Err(e) => {
                    trace_debug!("websocket read failed: {}", e);
                    self.lost(e.to_string());
                    return;
                }
            }
        }
    }

    fn write(&mut self, message: Message) -> io::Result<()> {
        let Some(ws) = self.ws.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
        };
        match ws.send(message) {
            Ok(()) => Ok(()),
            // Frame is queued and goes out on the next flush
            Err(tungstenite::Error::Io(ref e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(ws_to_io(e)),
        }
    }
}

impl TransportSocket for WsSocket {
    fn connect(&mut self) {
        if self.ws.is_some() {
            return;
        }
        match self.open() {
            Ok(ws) => {
                self.ws = Some(ws);
                self.events.push_back(SocketEvent::Connected);
            }
            Err(e) => {
                trace_debug!("connect to {} failed: {}", self.url, e);
                self.events.push_back(SocketEvent::Error(e.to_string()));
            }
        }
    }

    fn disconnect(&mut self, force: bool) {
        if let Some(mut ws) = self.ws.take() {
            let _ = ws.close(None);
            if !force {
                let _ = ws.flush();
            }
        }
    }

    fn send(&mut self, text: &str) -> io::Result<()> {
        self.write(Message::Text(text.to_owned()))
    }

    fn ping(&mut self) -> io::Result<()> {
        self.write(Message::Ping(Vec::new()))
    }

    fn is_connected(&self) -> bool {
        self.ws.as_ref().is_some_and(|ws| ws.can_write())
    }

    fn receive(&mut self, handler: &mut dyn FnMut(SocketEvent)) -> usize {
        self.read_available();

        let mut count = 0;
        while let Some(event) = self.events.pop_front() {
            handler(event);
            count += 1;
        }
        count
    }
}

/// Creates a [`WsSocket`] per connection attempt.
#[derive(Debug, Clone)]
pub struct WsSocketFactory {
    url: String,
    headers: Vec<(String, String)>,
}

impl WsSocketFactory {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_header(name.into(), value.into());
        self
    }

    /// Authenticate the handshake with a bearer token.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn insert_header(&mut self, name: String, value: String) {
        match self.headers.iter().position(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(i) => self.headers[i].1 = value,
            None => self.headers.push((name, value)),
        }
    }
}

impl SocketFactory for WsSocketFactory {
    fn create(&mut self) -> Box<dyn TransportSocket> {
        Box::new(WsSocket::new(self.url.clone(), self.headers.clone()))
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.insert_header(name.to_string(), value.to_string());
    }
}

fn ws_to_io(e: tungstenite::Error) -> io::Error {
    match e {
        tungstenite::Error::Io(io_err) => io_err,
        tungstenite::Error::ConnectionClosed => {
            io::Error::new(io::ErrorKind::ConnectionReset, "WebSocket connection closed")
        }
        tungstenite::Error::AlreadyClosed => {
            io::Error::new(io::ErrorKind::NotConnected, "WebSocket already closed")
        }
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}
