//! DS Hub client: session and matchmaking pushes for a dedicated server.
//!
//! Every inbound message is `{"topic": "...", "payload": {...}}`. The hub never
//! answers requests; the server only listens.

use crate::config::DsHubConfig;
use crate::connection::{ConnectionState, ReconnectingConnection};
use crate::dispatcher::{typed_handler, NotificationDispatcher, NotificationKind};
use crate::models::{BackfillProposalNotif, GameSession, ServerClaimedNotif};
use crate::transport::SocketFactory;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Topics pushed by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DsHubTopic {
    ServerClaimed,
    BackfillProposal,
    SessionMemberChanged,
}

impl NotificationKind for DsHubTopic {
    fn from_wire(name: &str) -> Option<Self> {
        match name {
            "serverClaimed" => Some(Self::ServerClaimed),
            "BACKFILL_PROPOSAL" => Some(Self::BackfillProposal),
            "SESSION_MEMBER_CHANGED" => Some(Self::SessionMemberChanged),
            _ => None,
        }
    }

    fn wire_name(&self) -> &'static str {
        match self {
            Self::ServerClaimed => "serverClaimed",
            Self::BackfillProposal => "BACKFILL_PROPOSAL",
            Self::SessionMemberChanged => "SESSION_MEMBER_CHANGED",
        }
    }
}

pub struct DsHubClient {
    config: DsHubConfig,
    connection: ReconnectingConnection,
    server_name: String,
    topics: NotificationDispatcher<DsHubTopic>,
}

impl DsHubClient {
    pub fn new(config: DsHubConfig, factory: impl SocketFactory + 'static) -> Self {
        let connection = ReconnectingConnection::new(config.connection.clone(), factory);
        Self {
            config,
            connection,
            server_name: String::new(),
            topics: NotificationDispatcher::new(),
        }
    }

    pub fn config(&self) -> &DsHubConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Name this server registered under, set by [`connect`](Self::connect).
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Connect as `server_name`. The name travels in a handshake header.
    pub fn connect(&mut self, server_name: &str) {
        self.server_name = server_name.to_string();
        self.connection
            .set_header(&self.config.server_name_header, server_name);
        trace_info!("connecting to {} as {}", self.config.url, server_name);
        self.connection.connect();
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    pub fn tick(&mut self, delta: Duration) {
        for event in self.connection.poll() {
            if let Some(frame) = self.connection.handle_event(event) {
                self.on_message(&frame);
            }
        }
        self.connection.advance(delta);
    }

    /// Route one topic to a typed handler, replacing any previous one.
    pub fn on_topic<T, F>(&mut self, topic: DsHubTopic, handler: F)
    where
        T: DeserializeOwned,
        F: FnMut(T) + 'static,
    {
        self.topics.set(topic, typed_handler(handler));
    }

    pub fn on_server_claimed<F: FnMut(ServerClaimedNotif) + 'static>(&mut self, handler: F) {
        self.on_topic(DsHubTopic::ServerClaimed, handler);
    }

    pub fn on_backfill_proposal<F: FnMut(BackfillProposalNotif) + 'static>(&mut self, handler: F) {
        self.on_topic(DsHubTopic::BackfillProposal, handler);
    }

    pub fn on_session_member_changed<F: FnMut(GameSession) + 'static>(&mut self, handler: F) {
        self.on_topic(DsHubTopic::SessionMemberChanged, handler);
    }

    pub fn on_connect_success<F>(&mut self, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.connection.on_connect_success(handler);
    }

    pub fn on_connect_error<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.connection.on_connect_error(handler);
    }

    pub fn on_connection_closed<F>(&mut self, handler: F)
    where
        F: FnMut(u16, &str, bool) + 'static,
    {
        self.connection.on_connection_closed(handler);
    }

    pub fn unbind_all(&mut self) {
        self.connection.unbind_handlers();
        self.topics.clear();
    }

    fn on_message(&mut self, message: &str) {
        trace_debug!("DS hub message: {}", message);

        let mut value: Value = match serde_json::from_str(message) {
            Ok(v) => v,
            Err(e) => {
                trace_warn!("failed to parse DS hub message as a JSON object: {}", e);
                return;
            }
        };

        let topic = value.get("topic").and_then(Value::as_str).map(str::to_owned);
        let payload = value.get_mut("payload").filter(|p| p.is_object()).map(Value::take);
        let (Some(topic), Some(payload)) = (topic, payload) else {
            trace_warn!("DS hub message without a topic and payload");
            return;
        };

        let Some(kind) = DsHubTopic::from_wire(&topic) else {
            trace_debug!("ignoring DS hub topic {}", topic);
            return;
        };

        if let Err(e) = self.topics.dispatch(kind, payload) {
            trace_warn!("failed to convert payload for {}: {}", topic, e);
        }
    }
}
