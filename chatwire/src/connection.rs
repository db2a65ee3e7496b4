//! Persistent connection with backoff reconnect and keep-alive.
//!
//! The connection is a state machine advanced by [`ReconnectingConnection::tick`].
//! Each tick drains the transport socket, fires lifecycle callbacks, hands
//! inbound text frames back to the owner and advances the ping, backoff and
//! give-up clocks by the elapsed time the host supplies.

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::timer::RepeatingTimer;
use crate::transport::{SocketEvent, SocketFactory, TransportSocket};
use rand::Rng;
use std::time::Duration;

/// Close codes the server uses for deliberate, application-level disconnects.
const SERVER_CLOSE_CODES: std::ops::Range<u16> = 4000..5000;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, no reconnect scheduled.
    Disconnected,
    /// An attempt is in flight.
    Connecting,
    Connected,
    /// Connection lost, waiting out the backoff delay.
    Reconnecting,
}

pub type ConnectSuccessHandler = Box<dyn FnMut()>;
pub type ConnectErrorHandler = Box<dyn FnMut(&str)>;
pub type ConnectionClosedHandler = Box<dyn FnMut(u16, &str, bool)>;
pub type ReconnectedHandler = Box<dyn FnMut(u32)>;
pub type ReconnectExhaustedHandler = Box<dyn FnMut(Duration)>;

#[derive(Default)]
struct LifecycleHandlers {
    on_connect_success: Option<ConnectSuccessHandler>,
    on_connect_error: Option<ConnectErrorHandler>,
    on_closed: Option<ConnectionClosedHandler>,
    on_reconnected: Option<ReconnectedHandler>,
    on_reconnect_exhausted: Option<ReconnectExhaustedHandler>,
}

/// One logical connection on top of a droppable transport.
pub struct ReconnectingConnection {
    config: ConnectionConfig,
    factory: Box<dyn SocketFactory>,
    socket: Option<Box<dyn TransportSocket>>,
    state: ConnectionState,
    /// Bumped whenever a new socket is created.
    generation: u64,

    backoff_delay: Duration,
    randomized_backoff_delay: Duration,
    time_since_last_reconnect: Duration,
    /// `Some` from the moment the connection is lost until it is restored.
    time_since_connection_lost: Option<Duration>,
    reconnect_attempts: u32,
    connection_error_pending: bool,
    ping: Option<RepeatingTimer>,

    handlers: LifecycleHandlers,
}

impl ReconnectingConnection {
    /// Out-of-range settings are tolerated: jitter is clamped when applied.
    /// Call [`ConnectionConfig::validate`] first to reject them instead.
    pub fn new(config: ConnectionConfig, factory: impl SocketFactory + 'static) -> Self {
        if let Err(e) = config.validate() {
            trace_warn!("connection config out of range: {}", e);
        }
        let initial = config.initial_backoff_delay();
        Self {
            config,
            factory: Box::new(factory),
            socket: None,
            state: ConnectionState::Disconnected,
            generation: 0,
            backoff_delay: initial,
            randomized_backoff_delay: initial,
            time_since_last_reconnect: Duration::ZERO,
            time_since_connection_lost: None,
            reconnect_attempts: 0,
            connection_error_pending: false,
            ping: None,
            handlers: LifecycleHandlers::default(),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Counter identifying the current socket; changes on every attempt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True iff a socket exists and reports connected.
    pub fn is_connected(&self) -> bool {
        self.socket.as_ref().is_some_and(|s| s.is_connected())
    }

    /// True between losing the connection and either restoring it or giving up.
    pub fn is_reconnecting(&self) -> bool {
        self.time_since_connection_lost.is_some()
    }

    /// Backoff delay the next attempt will be scheduled with.
    pub fn backoff_delay(&self) -> Duration {
        self.backoff_delay
    }

    /// Jittered wait currently in effect.
    pub fn current_wait(&self) -> Duration {
        self.randomized_backoff_delay
    }

    /// Attempts made since the connection was lost.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn time_since_connection_lost(&self) -> Option<Duration> {
        self.time_since_connection_lost
    }

    /// True while the keep-alive timer is registered.
    pub fn has_ping_timer(&self) -> bool {
        self.ping.is_some()
    }

    /// Handshake header for the next socket the factory builds.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.factory.set_header(name, value);
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the connection. No-op while connected or an attempt is in flight.
    pub fn connect(&mut self) {
        match self.state {
            ConnectionState::Connected | ConnectionState::Connecting => {}
            ConnectionState::Reconnecting => {
                trace_debug!("explicit connect while reconnecting; attempting now");
                self.attempt_reconnect();
            }
            ConnectionState::Disconnected => {
                self.reset_backoff();
                self.time_since_connection_lost = None;
                self.reconnect_attempts = 0;
                self.start_attempt();
            }
        }
    }

    /// Force-close the socket and stop reconnecting.
    ///
    /// Returns false when there was nothing to tear down.
    pub fn disconnect(&mut self) -> bool {
        if self.state == ConnectionState::Disconnected && self.socket.is_none() {
            return false;
        }

        if let Some(mut socket) = self.socket.take() {
            socket.disconnect(true);
        }
        self.state = ConnectionState::Disconnected;
        self.ping = None;
        self.time_since_connection_lost = None;
        self.connection_error_pending = false;
        trace_info!("disconnected");
        true
    }

    /// Send one text frame.
    pub fn send(&mut self, text: &str) -> Result<()> {
        match self.socket.as_mut() {
            Some(socket) if socket.is_connected() => Ok(socket.send(text)?),
            _ => Err(Error::NotConnected),
        }
    }

    /// Send a keep-alive now.
    pub fn send_ping(&mut self) -> Result<()> {
        match self.socket.as_mut() {
            Some(socket) if socket.is_connected() => Ok(socket.ping()?),
            _ => Err(Error::NotConnected),
        }
    }

    /// Drain socket events and advance the clocks by `delta`.
    ///
    /// Returns the text frames that arrived, in order. Lifecycle callbacks
    /// fire during the drain, ahead of any frame handling the caller does;
    /// owners that need frames and lifecycle events interleaved in arrival
    /// order use [`poll`](Self::poll), [`handle_event`](Self::handle_event)
    /// and [`advance`](Self::advance) instead.
    pub fn tick(&mut self, delta: Duration) -> Vec<String> {
        let mut frames = Vec::new();
        for event in self.poll() {
            if let Some(frame) = self.handle_event(event) {
                frames.push(frame);
            }
        }

        self.advance(delta);
        frames
    }

    /// Take every event the socket has queued, in arrival order.
    pub fn poll(&mut self) -> Vec<SocketEvent> {
        let mut events = Vec::new();
        if let Some(socket) = self.socket.as_mut() {
            socket.receive(&mut |event| events.push(event));
        }
        events
    }

    /// Apply one polled event. Text frames are handed back untouched,
    /// everything else updates the state machine and fires its callbacks.
    pub fn handle_event(&mut self, event: SocketEvent) -> Option<String> {
        match event {
            SocketEvent::Message(text) => Some(text),
            other => {
                self.handle_lifecycle(other);
                None
            }
        }
    }

    /// Advance the ping, backoff and give-up clocks by `delta`.
    pub fn advance(&mut self, delta: Duration) {
        match self.state {
            ConnectionState::Connected => {
                let due = self.ping.as_mut().is_some_and(|t| t.advance(delta));
                if due {
                    if let Err(e) = self.send_ping() {
                        trace_debug!("ping failed: {}", e);
                    }
                }
            }
            ConnectionState::Connecting => {
                if let Some(lost) = self.time_since_connection_lost.as_mut() {
                    *lost += delta;
                }
            }
            ConnectionState::Reconnecting => {
                let lost = self.time_since_connection_lost.unwrap_or_default() + delta;
                self.time_since_connection_lost = Some(lost);
                self.time_since_last_reconnect += delta;

                if lost >= self.config.total_timeout() {
                    self.give_up(lost);
                } else if self.time_since_last_reconnect >= self.randomized_backoff_delay {
                    self.attempt_reconnect();
                }
            }
            ConnectionState::Disconnected => {}
        }
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    pub fn on_connect_success<F>(&mut self, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.handlers.on_connect_success = Some(Box::new(handler));
    }

    pub fn on_connect_error<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.handlers.on_connect_error = Some(Box::new(handler));
    }

    /// Set handler for closes: `(status code, reason, was clean)`.
    pub fn on_connection_closed<F>(&mut self, handler: F)
    where
        F: FnMut(u16, &str, bool) + 'static,
    {
        self.handlers.on_closed = Some(Box::new(handler));
    }

    /// Set handler for a restored connection.
    /// The handler receives the number of attempts it took.
    pub fn on_reconnected<F>(&mut self, handler: F)
    where
        F: FnMut(u32) + 'static,
    {
        self.handlers.on_reconnected = Some(Box::new(handler));
    }

    /// Set handler for giving up after `total_timeout`.
    /// The handler receives how long the connection had been down.
    pub fn on_reconnect_exhausted<F>(&mut self, handler: F)
    where
        F: FnMut(Duration) + 'static,
    {
        self.handlers.on_reconnect_exhausted = Some(Box::new(handler));
    }

    pub fn unbind_handlers(&mut self) {
        self.handlers = LifecycleHandlers::default();
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn handle_lifecycle(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Connected => self.on_socket_connected(),
            SocketEvent::Error(error) => self.on_socket_error(&error),
            SocketEvent::Closed {
                code,
                reason,
                was_clean,
            } => self.on_socket_closed(code, &reason, was_clean),
            SocketEvent::Message(_) => {}
        }
    }

    fn on_socket_connected(&mut self) {
        let restored_after = self
            .time_since_connection_lost
            .take()
            .map(|_| self.reconnect_attempts);

        self.state = ConnectionState::Connected;
        self.reset_backoff();
        self.reconnect_attempts = 0;
        self.connection_error_pending = false;
        self.ping = Some(RepeatingTimer::new(self.config.ping_delay()));
        trace_info!("connected");

        if let Some(handler) = self.handlers.on_connect_success.as_mut() {
            handler();
        }
        if let Some(attempts) = restored_after {
            trace_info!("connection restored after {} attempts", attempts);
            if let Some(handler) = self.handlers.on_reconnected.as_mut() {
                handler(attempts);
            }
        }
    }

    fn on_socket_error(&mut self, error: &str) {
        trace_warn!("connection error: {}", error);
        self.connection_error_pending = true;

        if let Some(handler) = self.handlers.on_connect_error.as_mut() {
            handler(error);
        }

        let lost = match self.state {
            ConnectionState::Connecting => true,
            ConnectionState::Connected => !self.is_connected(),
            ConnectionState::Reconnecting | ConnectionState::Disconnected => false,
        };
        if lost {
            self.begin_reconnect();
        }
    }

    fn on_socket_closed(&mut self, code: u16, reason: &str, was_clean: bool) {
        trace_warn!(
            "connection closed. status code: {}; reason: {}; clean: {}",
            code,
            reason,
            was_clean
        );

        if let Some(handler) = self.handlers.on_closed.as_mut() {
            handler(code, reason, was_clean);
        }

        let after_error = std::mem::take(&mut self.connection_error_pending);
        let server_initiated =
            self.config.stop_on_server_close && SERVER_CLOSE_CODES.contains(&code) && !after_error;

        match self.state {
            ConnectionState::Disconnected => {}
            _ if server_initiated => {
                trace_info!("server closed the connection with {}; not reconnecting", code);
                self.socket = None;
                self.state = ConnectionState::Disconnected;
                self.ping = None;
                self.time_since_connection_lost = None;
            }
            ConnectionState::Reconnecting => {}
            ConnectionState::Connected | ConnectionState::Connecting => self.begin_reconnect(),
        }
    }

    fn begin_reconnect(&mut self) {
        self.state = ConnectionState::Reconnecting;
        self.ping = None;
        if self.time_since_connection_lost.is_none() {
            self.time_since_connection_lost = Some(Duration::ZERO);
        }
        self.time_since_last_reconnect = Duration::ZERO;
        self.randomized_backoff_delay = self.randomize(self.backoff_delay);
        trace_debug!(
            "reconnecting in {:?} (backoff {:?})",
            self.randomized_backoff_delay,
            self.backoff_delay
        );
    }

    fn attempt_reconnect(&mut self) {
        self.reconnect_attempts += 1;
        self.time_since_last_reconnect = Duration::ZERO;
        self.backoff_delay = (self.backoff_delay * 2).min(self.config.max_backoff_delay());
        trace_info!("reconnect attempt {}", self.reconnect_attempts);
        self.start_attempt();
    }

    fn start_attempt(&mut self) {
        if let Some(mut old) = self.socket.take() {
            old.disconnect(true);
        }
        let mut socket = self.factory.create();
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        socket.connect();
        self.socket = Some(socket);
    }

    fn give_up(&mut self, lost: Duration) {
        trace_warn!("giving up after {:?} disconnected", lost);
        if let Some(mut socket) = self.socket.take() {
            socket.disconnect(true);
        }
        self.state = ConnectionState::Disconnected;
        self.ping = None;
        self.time_since_connection_lost = None;
        self.connection_error_pending = false;

        if let Some(handler) = self.handlers.on_reconnect_exhausted.as_mut() {
            handler(lost);
        }
    }

    fn reset_backoff(&mut self) {
        self.backoff_delay = self.config.initial_backoff_delay();
        self.randomized_backoff_delay = self.backoff_delay;
        self.time_since_last_reconnect = Duration::ZERO;
    }

    /// Shave up to `backoff_jitter` of the delay so peers spread out, without
    /// ever waiting longer than the delay itself.
    fn randomize(&self, delay: Duration) -> Duration {
        let jitter = self.config.backoff_jitter;
        if jitter.is_nan() || jitter <= 0.0 {
            return delay;
        }
        let shave = rand::thread_rng().gen_range(0.0..=jitter.min(1.0));
        delay.mul_f64((1.0 - shave).max(0.0))
    }
}

impl Drop for ReconnectingConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    #[derive(Default)]
    struct Shared {
        created: usize,
        connects: usize,
        connected: bool,
        sent: Vec<String>,
        pings: usize,
        queue: VecDeque<SocketEvent>,
    }

    struct StubSocket(Rc<RefCell<Shared>>);

    impl TransportSocket for StubSocket {
        fn connect(&mut self) {
            self.0.borrow_mut().connects += 1;
        }

        fn disconnect(&mut self, _force: bool) {
            self.0.borrow_mut().connected = false;
        }

        fn send(&mut self, text: &str) -> io::Result<()> {
            self.0.borrow_mut().sent.push(text.to_string());
            Ok(())
        }

        fn ping(&mut self) -> io::Result<()> {
            self.0.borrow_mut().pings += 1;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.0.borrow().connected
        }

        fn receive(&mut self, handler: &mut dyn FnMut(SocketEvent)) -> usize {
            let drained: Vec<_> = self.0.borrow_mut().queue.drain(..).collect();
            let n = drained.len();
            for event in drained {
                if event == SocketEvent::Connected {
                    self.0.borrow_mut().connected = true;
                }
                if matches!(event, SocketEvent::Closed { .. }) {
                    self.0.borrow_mut().connected = false;
                }
                handler(event);
            }
            n
        }
    }

    fn stub(config: ConnectionConfig) -> (ReconnectingConnection, Rc<RefCell<Shared>>) {
        let shared = Rc::new(RefCell::new(Shared::default()));
        let s = shared.clone();
        let factory = move || -> Box<dyn TransportSocket> {
            s.borrow_mut().created += 1;
            Box::new(StubSocket(s.clone()))
        };
        (ReconnectingConnection::new(config, factory), shared)
    }

    fn no_jitter() -> ConnectionConfig {
        ConnectionConfig::default().with_jitter(0.0)
    }

    fn push(shared: &Rc<RefCell<Shared>>, event: SocketEvent) {
        shared.borrow_mut().queue.push_back(event);
    }

    fn closed(code: u16) -> SocketEvent {
        SocketEvent::Closed {
            code,
            reason: "gone".into(),
            was_clean: false,
        }
    }

    #[test]
    fn test_connect_is_idempotent() {
        let (mut conn, shared) = stub(no_jitter());
        conn.connect();
        conn.connect();
        assert_eq!(shared.borrow().connects, 1);
        assert_eq!(conn.state(), ConnectionState::Connecting);

        push(&shared, SocketEvent::Connected);
        conn.tick(Duration::ZERO);
        conn.connect();
        assert_eq!(shared.borrow().connects, 1);
        assert!(conn.is_connected());
        assert!(conn.has_ping_timer());
    }

    #[test]
    fn test_disconnect_twice_is_noop() {
        let (mut conn, shared) = stub(no_jitter());
        conn.connect();
        push(&shared, SocketEvent::Connected);
        conn.tick(Duration::ZERO);

        assert!(conn.disconnect());
        assert!(!conn.disconnect());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.has_ping_timer());
    }

    #[test]
    fn test_ping_every_delay() {
        let (mut conn, shared) = stub(no_jitter().with_ping_delay(Duration::from_secs(5)));
        conn.connect();
        push(&shared, SocketEvent::Connected);
        conn.tick(Duration::ZERO);

        conn.tick(Duration::from_secs(4));
        assert_eq!(shared.borrow().pings, 0);
        conn.tick(Duration::from_secs(1));
        assert_eq!(shared.borrow().pings, 1);
        conn.tick(Duration::from_secs(5));
        assert_eq!(shared.borrow().pings, 2);
    }

    #[test]
    fn test_frames_returned_in_order() {
        let (mut conn, shared) = stub(no_jitter());
        conn.connect();
        push(&shared, SocketEvent::Connected);
        push(&shared, SocketEvent::Message("a".into()));
        push(&shared, SocketEvent::Message("b".into()));
        assert_eq!(conn.tick(Duration::ZERO), vec!["a", "b"]);
    }

    #[test]
    fn test_close_schedules_one_attempt_after_initial_backoff() {
        let (mut conn, shared) = stub(no_jitter());
        conn.connect();
        push(&shared, SocketEvent::Connected);
        conn.tick(Duration::ZERO);

        push(&shared, closed(1006));
        conn.tick(Duration::ZERO);
        assert_eq!(conn.state(), ConnectionState::Reconnecting);
        assert!(conn.is_reconnecting());

        conn.tick(Duration::from_millis(900));
        assert_eq!(shared.borrow().connects, 1);
        conn.tick(Duration::from_millis(200));
        assert_eq!(shared.borrow().connects, 2);
        conn.tick(Duration::from_millis(200));
        assert_eq!(shared.borrow().connects, 2);
        assert_eq!(conn.reconnect_attempts(), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let cfg = no_jitter()
            .with_backoff(Duration::from_secs(1), Duration::from_secs(4))
            .with_total_timeout(Duration::from_secs(3600));
        let (mut conn, shared) = stub(cfg);
        conn.connect();
        push(&shared, SocketEvent::Error("refused".into()));
        conn.tick(Duration::ZERO);

        let mut waits = Vec::new();
        for _ in 0..5 {
            waits.push(conn.current_wait());
            conn.tick(conn.current_wait());
            push(&shared, SocketEvent::Error("refused".into()));
            conn.tick(Duration::ZERO);
        }

        let secs: Vec<u64> = waits.iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![1, 2, 4, 4, 4]);
    }

    #[test]
    fn test_jitter_never_exceeds_delay() {
        let cfg = ConnectionConfig::default()
            .with_jitter(0.5)
            .with_backoff(Duration::from_secs(2), Duration::from_secs(8))
            .with_total_timeout(Duration::from_secs(3600));
        let (mut conn, shared) = stub(cfg);
        conn.connect();
        for _ in 0..10 {
            push(&shared, SocketEvent::Error("refused".into()));
            conn.tick(Duration::ZERO);
            let wait = conn.current_wait();
            assert!(wait <= conn.backoff_delay());
            assert!(wait <= Duration::from_secs(8));
            conn.tick(wait);
        }
    }

    #[test]
    fn test_gives_up_after_total_timeout() {
        let exhausted = Rc::new(RefCell::new(None));
        let e = exhausted.clone();
        let cfg = no_jitter().with_total_timeout(Duration::from_secs(10));
        let (mut conn, shared) = stub(cfg);
        conn.on_reconnect_exhausted(move |d| *e.borrow_mut() = Some(d));
        conn.connect();
        push(&shared, SocketEvent::Connected);
        conn.tick(Duration::ZERO);
        push(&shared, closed(1006));
        conn.tick(Duration::ZERO);

        for _ in 0..40 {
            conn.tick(Duration::from_millis(500));
            push(&shared, SocketEvent::Error("refused".into()));
        }
        let attempts = shared.borrow().connects;
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(exhausted.borrow().is_some());

        conn.tick(Duration::from_secs(120));
        assert_eq!(shared.borrow().connects, attempts);

        conn.connect();
        assert_eq!(shared.borrow().connects, attempts + 1);
    }

    #[test]
    fn test_server_close_code_is_terminal() {
        let (mut conn, shared) = stub(no_jitter());
        conn.connect();
        push(&shared, SocketEvent::Connected);
        conn.tick(Duration::ZERO);

        push(&shared, closed(4003));
        conn.tick(Duration::ZERO);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        conn.tick(Duration::from_secs(30));
        assert_eq!(shared.borrow().connects, 1);
    }

    #[test]
    fn test_server_close_after_error_reconnects() {
        let (mut conn, shared) = stub(no_jitter());
        conn.connect();
        push(&shared, SocketEvent::Connected);
        conn.tick(Duration::ZERO);

        shared.borrow_mut().connected = true;
        push(&shared, SocketEvent::Error("reset".into()));
        push(&shared, closed(4000));
        conn.tick(Duration::ZERO);
        assert_eq!(conn.state(), ConnectionState::Reconnecting);
    }

    #[test]
    fn test_reconnected_handler_reports_attempts() {
        let reported = Rc::new(RefCell::new(Vec::new()));
        let r = reported.clone();
        let (mut conn, shared) = stub(no_jitter());
        conn.on_reconnected(move |n| r.borrow_mut().push(n));
        conn.connect();
        push(&shared, SocketEvent::Connected);
        conn.tick(Duration::ZERO);
        assert!(reported.borrow().is_empty());

        push(&shared, closed(1006));
        conn.tick(Duration::ZERO);
        conn.tick(Duration::from_secs(1));
        push(&shared, SocketEvent::Error("refused".into()));
        conn.tick(Duration::ZERO);
        conn.tick(Duration::from_secs(2));
        push(&shared, SocketEvent::Connected);
        conn.tick(Duration::ZERO);

        assert_eq!(*reported.borrow(), vec![2]);
        assert_eq!(conn.backoff_delay(), Duration::from_secs(1));
        assert!(!conn.is_reconnecting());
    }

    #[test]
    fn test_send_requires_connection() {
        let (mut conn, shared) = stub(no_jitter());
        assert!(matches!(conn.send("x"), Err(Error::NotConnected)));
        conn.connect();
        push(&shared, SocketEvent::Connected);
        conn.tick(Duration::ZERO);
        conn.send("x").unwrap();
        assert_eq!(shared.borrow().sent, vec!["x"]);
    }

    #[test]
    fn test_out_of_range_jitter_is_clamped() {
        let mut cfg = ConnectionConfig::default().with_total_timeout(Duration::from_secs(3600));
        cfg.backoff_jitter = 3.0;
        assert!(cfg.validate().is_err());

        let (mut conn, shared) = stub(cfg);
        conn.connect();
        for _ in 0..20 {
            push(&shared, SocketEvent::Error("refused".into()));
            for event in conn.poll() {
                conn.handle_event(event);
            }
            assert_eq!(conn.state(), ConnectionState::Reconnecting);
            assert!(conn.current_wait() <= conn.backoff_delay());
            conn.advance(conn.current_wait());
            assert_eq!(conn.state(), ConnectionState::Connecting);
        }
    }

    #[test]
    fn test_poll_keeps_arrival_order() {
        let closes = Rc::new(RefCell::new(0));
        let c = closes.clone();
        let (mut conn, shared) = stub(no_jitter());
        conn.on_connection_closed(move |_, _, _| *c.borrow_mut() += 1);
        conn.connect();
        push(&shared, SocketEvent::Connected);
        push(&shared, SocketEvent::Message("last words".into()));
        push(&shared, closed(1006));

        let events = conn.poll();
        assert_eq!(events.len(), 3);
        let mut seen = Vec::new();
        for event in events {
            if let Some(frame) = conn.handle_event(event) {
                assert_eq!(*closes.borrow(), 0);
                seen.push(frame);
            }
        }
        assert_eq!(seen, vec!["last words"]);
        assert_eq!(*closes.borrow(), 1);
        assert_eq!(conn.state(), ConnectionState::Reconnecting);
    }
}
