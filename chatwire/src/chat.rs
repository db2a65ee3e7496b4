//! Chat service client.
//!
//! JSON-RPC style requests and pushes over one reconnecting websocket:
//!
//! ```text
//! -> {"jsonrpc":"2.0","method":"sendChat","params":{...},"id":"sendChat-7"}
//! <- CaSr{"jsonrpc":"2.0","id":"sendChat-7","result":{...}}CaEd
//! <- CaSr{"jsonrpc":"2.0","method":"eventNewChat","params":{...}}CaEd
//! ```
//!
//! Responses are matched to their request by id. Messages without a pending
//! id are treated as notifications and routed by `method`.

use crate::config::ChatConfig;
use crate::connection::{ConnectionState, ReconnectingConnection};
use crate::correlator::{Continuation, MessageId, RequestCorrelator};
use crate::dispatcher::{typed_handler, NotificationDispatcher, NotificationKind};
use crate::envelope::EnvelopeFramer;
use crate::error::{Error, Result};
use crate::models::*;
use crate::transport::SocketFactory;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const JSONRPC_VERSION: &str = "2.0";

/// Push messages the chat service sends without a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatNotification {
    NewChat,
    ReadChat,
    AddedToTopic,
    RemovedFromTopic,
    TopicUpdated,
    TopicDeleted,
    UserBanned,
    UserUnbanned,
    /// Carries the chat session id.
    Connected,
    Disconnected,
}

impl NotificationKind for ChatNotification {
    fn from_wire(name: &str) -> Option<Self> {
        Some(match name {
            "eventNewChat" => Self::NewChat,
            "eventReadChat" => Self::ReadChat,
            "eventAddedToTopic" => Self::AddedToTopic,
            "eventRemovedFromTopic" => Self::RemovedFromTopic,
            "eventTopicUpdated" => Self::TopicUpdated,
            "eventTopicDeleted" => Self::TopicDeleted,
            "eventUserBanned" => Self::UserBanned,
            "eventUserUnbanned" => Self::UserUnbanned,
            "eventConnected" => Self::Connected,
            "eventDisconnected" => Self::Disconnected,
            _ => return None,
        })
    }

    fn wire_name(&self) -> &'static str {
        match self {
            Self::NewChat => "eventNewChat",
            Self::ReadChat => "eventReadChat",
            Self::AddedToTopic => "eventAddedToTopic",
            Self::RemovedFromTopic => "eventRemovedFromTopic",
            Self::TopicUpdated => "eventTopicUpdated",
            Self::TopicDeleted => "eventTopicDeleted",
            Self::UserBanned => "eventUserBanned",
            Self::UserUnbanned => "eventUserUnbanned",
            Self::Connected => "eventConnected",
            Self::Disconnected => "eventDisconnected",
        }
    }
}

/// Request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatMethod {
    CreateTopic,
    SendChat,
    QueryTopic,
    QueryTopicById,
    QueryPersonalTopic,
    QueryGroupTopic,
    QueryPublicTopic,
    QueryChat,
    ReadChat,
    UpdateTopic,
    DeleteTopic,
    AddUserToTopic,
    RemoveUserFromTopic,
    JoinTopic,
    QuitTopic,
    RefreshToken,
    BlockUser,
    UnblockUser,
}

impl ChatMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTopic => "createTopic",
            Self::SendChat => "sendChat",
            Self::QueryTopic => "queryTopic",
            Self::QueryTopicById => "queryTopicById",
            Self::QueryPersonalTopic => "queryPersonalTopic",
            Self::QueryGroupTopic => "queryGroupTopic",
            Self::QueryPublicTopic => "queryPublicTopic",
            Self::QueryChat => "queryChat",
            Self::ReadChat => "readChat",
            Self::UpdateTopic => "actionUpdateTopic",
            Self::DeleteTopic => "actionDeleteTopic",
            Self::AddUserToTopic => "actionAddUserToTopic",
            Self::RemoveUserFromTopic => "actionRemoveUserFromTopic",
            Self::JoinTopic => "actionJoinTopic",
            Self::QuitTopic => "actionQuitTopic",
            Self::RefreshToken => "refreshToken",
            Self::BlockUser => "blockUser",
            Self::UnblockUser => "unblockUser",
        }
    }
}

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    method: &'a str,
    params: P,
    id: &'a str,
}

#[derive(Deserialize)]
struct RpcMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

pub type ParsingErrorHandler = Box<dyn FnMut(&Error)>;

/// Chat service client.
pub struct ChatClient {
    config: ChatConfig,
    connection: ReconnectingConnection,
    framer: EnvelopeFramer,
    correlator: RequestCorrelator,
    notifications: NotificationDispatcher<ChatNotification>,
    on_parsing_error: Option<ParsingErrorHandler>,
    session_id: Option<String>,
    socket_generation: u64,
}

impl ChatClient {
    pub fn new(config: ChatConfig, factory: impl SocketFactory + 'static) -> Self {
        let connection = ReconnectingConnection::new(config.connection.clone(), factory);
        let framer = EnvelopeFramer::new(config.envelope_start.clone(), config.envelope_end.clone());
        Self {
            config,
            connection,
            framer,
            correlator: RequestCorrelator::new(),
            notifications: NotificationDispatcher::new(),
            on_parsing_error: None,
            session_id: None,
            socket_generation: 0,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn connection(&self) -> &ReconnectingConnection {
        &self.connection
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Session id from the server's connected notice, if one arrived.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.correlator.len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.correlator.contains(id)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn connect(&mut self) {
        trace_info!("connecting to chat at {}", self.config.url);
        self.connection.connect();
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
        self.connection_lost();
    }

    pub fn send_ping(&mut self) -> Result<()> {
        self.connection.send_ping()
    }

    /// Drive the connection and handle everything that arrived.
    ///
    /// Frames and lifecycle events are handled in the order they arrived.
    pub fn tick(&mut self, delta: Duration) {
        self.sync_socket_generation();

        let mut was_connected = self.connection.state() == ConnectionState::Connected;
        for event in self.connection.poll() {
            if let Some(frame) = self.connection.handle_event(event) {
                self.on_frame(&frame);
            }
            was_connected = self.check_connection_lost(was_connected);
        }

        self.connection.advance(delta);
        self.check_connection_lost(was_connected);
        self.sync_socket_generation();
    }

    /// A new socket never continues a message the previous one started.
    fn sync_socket_generation(&mut self) {
        if self.connection.generation() != self.socket_generation {
            self.socket_generation = self.connection.generation();
            self.framer.reset();
        }
    }

    fn check_connection_lost(&mut self, was_connected: bool) -> bool {
        let connected = self.connection.state() == ConnectionState::Connected;
        if was_connected && !connected {
            self.connection_lost();
        }
        connected
    }

    fn connection_lost(&mut self) {
        self.framer.reset();
        self.session_id = None;
        if self.config.fail_pending_on_disconnect {
            let failed = self.correlator.fail_all(|| Error::Disconnected);
            if failed > 0 {
                trace_debug!("failed {} pending requests on disconnect", failed);
            }
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Send one request and register its continuation.
    ///
    /// The continuation is dropped unfired if the send fails.
    pub fn send_request<T, P, S, E>(
        &mut self,
        method: ChatMethod,
        params: P,
        on_success: S,
        on_error: E,
    ) -> Result<MessageId>
    where
        T: DeserializeOwned,
        P: Serialize,
        S: FnOnce(T) + 'static,
        E: FnOnce(Error) + 'static,
    {
        if !self.connection.is_connected() {
            return Err(Error::NotConnected);
        }

        let name = method.as_str();
        let id = self.correlator.next_message_id(name);
        let content = serde_json::to_string(&RpcRequest {
            jsonrpc: JSONRPC_VERSION,
            method: name,
            params,
            id: &id,
        })?;

        let continuation: Continuation = Box::new(move |outcome: Result<Value>| {
            match outcome.and_then(|value| Ok(serde_json::from_value::<T>(value)?)) {
                Ok(response) => on_success(response),
                Err(e) => on_error(e),
            }
        });
        self.correlator.register(id.clone(), name, continuation);

        if let Err(e) = self.connection.send(&content) {
            self.correlator.cancel(&id);
            return Err(e);
        }
        trace_debug!("sent {} as {}", name, id);
        Ok(id)
    }

    pub fn create_personal_topic<S, E>(
        &mut self,
        target_user_id: &str,
        on_success: S,
        on_error: E,
    ) -> Result<MessageId>
    where
        S: FnOnce(ActionTopicResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        let request = CreateTopicRequest::personal(target_user_id);
        self.send_request(ChatMethod::CreateTopic, request, on_success, on_error)
    }

    pub fn create_group_topic<S, E>(
        &mut self,
        request: &CreateTopicRequest,
        on_success: S,
        on_error: E,
    ) -> Result<MessageId>
    where
        S: FnOnce(ActionTopicResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        let mut request = request.clone();
        request.topic_type = TopicType::Group;
        self.send_request(ChatMethod::CreateTopic, request, on_success, on_error)
    }

    pub fn update_topic<S, E>(
        &mut self,
        request: &UpdateTopicRequest,
        on_success: S,
        on_error: E,
    ) -> Result<MessageId>
    where
        S: FnOnce(ActionTopicResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        self.send_request(ChatMethod::UpdateTopic, request, on_success, on_error)
    }

    pub fn delete_topic<S, E>(&mut self, topic_id: &str, on_success: S, on_error: E) -> Result<MessageId>
    where
        S: FnOnce(ActionTopicResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        let params = json!({ "topicId": topic_id });
        self.send_request(ChatMethod::DeleteTopic, params, on_success, on_error)
    }

    pub fn add_user_to_topic<S, E>(
        &mut self,
        request: &TopicUserRequest,
        on_success: S,
        on_error: E,
    ) -> Result<MessageId>
    where
        S: FnOnce(ActionUserTopicResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        self.send_request(ChatMethod::AddUserToTopic, request, on_success, on_error)
    }

    pub fn remove_user_from_topic<S, E>(
        &mut self,
        request: &TopicUserRequest,
        on_success: S,
        on_error: E,
    ) -> Result<MessageId>
    where
        S: FnOnce(ActionUserTopicResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        self.send_request(ChatMethod::RemoveUserFromTopic, request, on_success, on_error)
    }

    /// Join a joinable group topic.
    pub fn join_topic<S, E>(&mut self, topic_id: &str, on_success: S, on_error: E) -> Result<MessageId>
    where
        S: FnOnce(ActionTopicResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        let params = json!({ "topicId": topic_id });
        self.send_request(ChatMethod::JoinTopic, params, on_success, on_error)
    }

    pub fn quit_topic<S, E>(&mut self, topic_id: &str, on_success: S, on_error: E) -> Result<MessageId>
    where
        S: FnOnce(ActionTopicResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        let params = json!({ "topicId": topic_id });
        self.send_request(ChatMethod::QuitTopic, params, on_success, on_error)
    }

    pub fn send_chat<S, E>(
        &mut self,
        topic_id: &str,
        message: &str,
        on_success: S,
        on_error: E,
    ) -> Result<MessageId>
    where
        S: FnOnce(SendChatResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        let params = json!({ "topicId": topic_id, "message": message });
        self.send_request(ChatMethod::SendChat, params, on_success, on_error)
    }

    /// Topics the caller belongs to, filtered by keyword.
    pub fn query_topic<S, E>(
        &mut self,
        request: &QueryTopicRequest,
        on_success: S,
        on_error: E,
    ) -> Result<MessageId>
    where
        S: FnOnce(QueryTopicResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        self.send_request(ChatMethod::QueryTopic, request, on_success, on_error)
    }

    pub fn query_topic_by_id<S, E>(&mut self, topic_id: &str, on_success: S, on_error: E) -> Result<MessageId>
    where
        S: FnOnce(QueryTopicByIdResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        let params = json!({ "topicId": topic_id });
        self.send_request(ChatMethod::QueryTopicById, params, on_success, on_error)
    }

    pub fn query_personal_topic<S, E>(
        &mut self,
        offset: u32,
        limit: u32,
        on_success: S,
        on_error: E,
    ) -> Result<MessageId>
    where
        S: FnOnce(QueryTopicResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        let request = QueryTopicRequest::new("", offset, limit);
        self.send_request(ChatMethod::QueryPersonalTopic, request, on_success, on_error)
    }

    pub fn query_group_topic<S, E>(
        &mut self,
        request: &QueryTopicRequest,
        on_success: S,
        on_error: E,
    ) -> Result<MessageId>
    where
        S: FnOnce(QueryTopicResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        self.send_request(ChatMethod::QueryGroupTopic, request, on_success, on_error)
    }

    /// Joinable topics, including ones the caller is not a member of.
    pub fn query_public_topic<S, E>(
        &mut self,
        request: &QueryTopicRequest,
        on_success: S,
        on_error: E,
    ) -> Result<MessageId>
    where
        S: FnOnce(QueryPublicTopicResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        self.send_request(ChatMethod::QueryPublicTopic, request, on_success, on_error)
    }

    pub fn query_chat<S, E>(
        &mut self,
        request: &QueryChatRequest,
        on_success: S,
        on_error: E,
    ) -> Result<MessageId>
    where
        S: FnOnce(QueryChatResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        self.send_request(ChatMethod::QueryChat, request, on_success, on_error)
    }

    /// Mark chats as read.
    pub fn read_chat<I, S, E>(&mut self, chat_ids: I, on_success: S, on_error: E) -> Result<MessageId>
    where
        I: IntoIterator<Item = String>,
        S: FnOnce(ReadChatResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        let ids: Vec<String> = chat_ids.into_iter().collect();
        let params = json!({ "chatIds": ids });
        self.send_request(ChatMethod::ReadChat, params, on_success, on_error)
    }

    pub fn block_user<S, E>(&mut self, user_id: &str, on_success: S, on_error: E) -> Result<MessageId>
    where
        S: FnOnce(BlockUserResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        let params = json!({ "userId": user_id });
        self.send_request(ChatMethod::BlockUser, params, on_success, on_error)
    }

    pub fn unblock_user<S, E>(&mut self, user_id: &str, on_success: S, on_error: E) -> Result<MessageId>
    where
        S: FnOnce(BlockUserResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        let params = json!({ "userId": user_id });
        self.send_request(ChatMethod::UnblockUser, params, on_success, on_error)
    }

    /// Hand the service a fresh access token for the current session.
    pub fn refresh_token<S, E>(&mut self, access_token: &str, on_success: S, on_error: E) -> Result<MessageId>
    where
        S: FnOnce(RefreshTokenResponse) + 'static,
        E: FnOnce(Error) + 'static,
    {
        let params = json!({ "token": access_token });
        self.send_request(ChatMethod::RefreshToken, params, on_success, on_error)
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

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

    pub fn on_reconnected<F>(&mut self, handler: F)
    where
        F: FnMut(u32) + 'static,
    {
        self.connection.on_reconnected(handler);
    }

    pub fn on_reconnect_exhausted<F>(&mut self, handler: F)
    where
        F: FnMut(Duration) + 'static,
    {
        self.connection.on_reconnect_exhausted(handler);
    }

    /// Set handler for inbound messages that could not be interpreted.
    pub fn on_parsing_error<F>(&mut self, handler: F)
    where
        F: FnMut(&Error) + 'static,
    {
        self.on_parsing_error = Some(Box::new(handler));
    }

    /// Route one notification kind to a typed handler, replacing any previous one.
    pub fn on_notification<T, F>(&mut self, kind: ChatNotification, handler: F)
    where
        T: DeserializeOwned,
        F: FnMut(T) + 'static,
    {
        self.notifications.set(kind, typed_handler(handler));
    }

    pub fn on_chat<F: FnMut(ChatNotif) + 'static>(&mut self, handler: F) {
        self.on_notification(ChatNotification::NewChat, handler);
    }

    pub fn on_read_chat<F: FnMut(ReadChatNotif) + 'static>(&mut self, handler: F) {
        self.on_notification(ChatNotification::ReadChat, handler);
    }

    pub fn on_added_to_topic<F: FnMut(UpdateUserTopicNotif) + 'static>(&mut self, handler: F) {
        self.on_notification(ChatNotification::AddedToTopic, handler);
    }

    pub fn on_removed_from_topic<F: FnMut(UpdateUserTopicNotif) + 'static>(&mut self, handler: F) {
        self.on_notification(ChatNotification::RemovedFromTopic, handler);
    }

    pub fn on_topic_updated<F: FnMut(UpdateTopicNotif) + 'static>(&mut self, handler: F) {
        self.on_notification(ChatNotification::TopicUpdated, handler);
    }

    pub fn on_topic_deleted<F: FnMut(UpdateTopicNotif) + 'static>(&mut self, handler: F) {
        self.on_notification(ChatNotification::TopicDeleted, handler);
    }

    pub fn on_user_banned<F: FnMut(UserBanUnbanNotif) + 'static>(&mut self, handler: F) {
        self.on_notification(ChatNotification::UserBanned, handler);
    }

    pub fn on_user_unbanned<F: FnMut(UserBanUnbanNotif) + 'static>(&mut self, handler: F) {
        self.on_notification(ChatNotification::UserUnbanned, handler);
    }

    pub fn on_session_connected<F: FnMut(ConnectNotif) + 'static>(&mut self, handler: F) {
        self.on_notification(ChatNotification::Connected, handler);
    }

    pub fn on_disconnect_notif<F: FnMut(DisconnectNotif) + 'static>(&mut self, handler: F) {
        self.on_notification(ChatNotification::Disconnected, handler);
    }

    /// Drop every callback and forget pending requests without firing them.
    pub fn unbind_all(&mut self) {
        self.connection.unbind_handlers();
        self.notifications.clear();
        self.on_parsing_error = None;
        self.correlator.clear();
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    fn on_frame(&mut self, frame: &str) {
        if frame.is_empty() {
            trace_debug!("empty frame");
            return;
        }
        if let Some(message) = self.framer.process(frame) {
            self.on_message(&message);
        }
    }

    fn on_message(&mut self, message: &str) {
        let parsed: RpcMessage = match serde_json::from_str(message) {
            Ok(m) => m,
            Err(e) => {
                trace_warn!("unparseable chat message: {}", e);
                self.report_parsing_error(Error::from(e));
                return;
            }
        };

        if let Some(id) = parsed.id.as_deref() {
            if self.correlator.contains(id) {
                let outcome = match parsed.error {
                    Some(err) => Err(Error::server(err.code, err.message)),
                    None => Ok(parsed.result.unwrap_or(Value::Null)),
                };
                self.correlator.resolve(id, parsed.method.as_deref(), outcome);
                return;
            }
        }

        if parsed.id.is_none() && parsed.method.is_none() {
            trace_warn!("chat message carries neither id nor method");
            self.report_parsing_error(Error::parse("message has neither id nor method"));
            return;
        }

        let Some(kind) = parsed.method.as_deref().and_then(ChatNotification::from_wire) else {
            trace_debug!(
                "dropping unmatched message id={:?} method={:?}",
                parsed.id,
                parsed.method
            );
            return;
        };

        let params = parsed.params.unwrap_or(Value::Null);
        if kind == ChatNotification::Connected {
            match serde_json::from_value::<ConnectNotif>(params.clone()) {
                Ok(notif) => self.session_id = Some(notif.connection_id),
                Err(e) => trace_warn!("bad connected notice: {}", e),
            }
        }

        if let Err(e) = self.notifications.dispatch(kind, params) {
            trace_warn!("could not convert {} payload: {}", kind.wire_name(), e);
            self.report_parsing_error(e);
        }
    }

    fn report_parsing_error(&mut self, error: Error) {
        if let Some(handler) = self.on_parsing_error.as_mut() {
            handler(&error);
        }
    }
}
