//! Wire models for the chat service and DS Hub pushes.
//!
//! Only the fields the clients read or write are modelled; unknown fields are
//! ignored and missing ones fall back to defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Topic kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopicType {
    #[default]
    Personal,
    Group,
}

// ============================================================================
// Requests
// ============================================================================

/// Create a personal or group topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateTopicRequest {
    #[serde(rename = "type")]
    pub topic_type: TopicType,
    pub name: String,
    pub members: Vec<String>,
    pub admins: Vec<String>,
    pub is_joinable: bool,
}

impl CreateTopicRequest {
    /// One-to-one topic between the caller and `target_user_id`.
    pub fn personal(target_user_id: impl Into<String>) -> Self {
        Self {
            topic_type: TopicType::Personal,
            members: vec![target_user_id.into()],
            ..Self::default()
        }
    }

    pub fn group(
        name: impl Into<String>,
        members: impl IntoIterator<Item = String>,
        admins: impl IntoIterator<Item = String>,
        is_joinable: bool,
    ) -> Self {
        Self {
            topic_type: TopicType::Group,
            name: name.into(),
            members: members.into_iter().collect(),
            admins: admins.into_iter().collect(),
            is_joinable,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateTopicRequest {
    pub topic_id: String,
    pub name: String,
    pub is_joinable: bool,
}

/// Add or remove one member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicUserRequest {
    pub topic_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryTopicRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub keyword: String,
    pub offset: u32,
    pub limit: u32,
}

impl QueryTopicRequest {
    pub fn new(keyword: impl Into<String>, offset: u32, limit: u32) -> Self {
        Self {
            keyword: keyword.into(),
            offset,
            limit,
        }
    }
}

/// Page of chat history for one topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryChatRequest {
    pub topic_id: String,
    pub limit: u32,
    /// Only messages created before this unix time (seconds), 0 for latest.
    #[serde(skip_serializing_if = "is_zero")]
    pub last_chat_created_at: i64,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

// ============================================================================
// Responses
// ============================================================================

/// Result of a topic action (create, update, delete, join, quit).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionTopicResponse {
    pub topic_id: String,
    pub processed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionUserTopicResponse {
    pub topic_id: String,
    pub user_id: String,
    pub processed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendChatResponse {
    pub topic_id: String,
    pub chat_id: String,
    pub processed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicInfo {
    pub topic_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub topic_type: TopicType,
    pub members: Vec<String>,
    pub is_joinable: bool,
    pub is_channel: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryTopicResponse {
    pub data: Vec<TopicInfo>,
    pub processed: i64,
}

/// Entry of a public topic listing. Carries no membership details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicTopicInfo {
    pub topic_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryPublicTopicResponse {
    pub data: Vec<PublicTopicInfo>,
    pub processed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryTopicByIdResponse {
    pub data: TopicInfo,
    pub processed: i64,
}

/// One chat message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatData {
    pub chat_id: String,
    pub topic_id: String,
    pub sender_id: String,
    pub message: String,
    pub created_at: i64,
    pub read_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryChatResponse {
    pub data: Vec<ChatData>,
    pub processed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadChatResponse {
    pub processed: i64,
}

/// Block or unblock result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockUserResponse {
    pub user_id: String,
    pub processed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshTokenResponse {
    pub success: bool,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatNotif {
    pub chat_id: String,
    pub topic_id: String,
    pub sender_id: String,
    pub message: String,
    pub created_at: i64,
}

/// Read receipts, chat id to read time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadChatNotif {
    pub read_chat: HashMap<String, i64>,
}

/// Added to or removed from a topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateUserTopicNotif {
    pub topic_id: String,
    pub name: String,
    pub user_id: String,
    pub sender_id: String,
    #[serde(rename = "type")]
    pub topic_type: TopicType,
    pub is_channel: bool,
}

/// Topic renamed or deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateTopicNotif {
    pub topic_id: String,
    pub name: String,
    pub sender_id: String,
    pub is_channel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserBanUnbanNotif {
    pub user_id: String,
    pub namespace: String,
    pub reason: String,
    pub end_date: String,
    pub enable: bool,
}

/// Sent once by the server after the handshake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectNotif {
    pub connection_id: String,
}

/// Server is about to drop the connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisconnectNotif {
    pub connection_id: String,
    pub message: String,
}

// ============================================================================
// DS Hub payloads
// ============================================================================

/// A session claimed this dedicated server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerClaimedNotif {
    pub session_id: String,
    pub namespace: String,
    pub game_mode: String,
    pub match_id: String,
    pub region: String,
}

/// Team layout a backfill proposal would produce.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProposedTeam {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackfillProposalNotif {
    pub backfill_ticket_id: String,
    pub proposal_id: String,
    pub match_pool: String,
    pub match_session_id: String,
    pub proposed_teams: Vec<ProposedTeam>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionMember {
    pub id: String,
    pub status: String,
}

/// Game session snapshot pushed when its member list changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameSession {
    pub id: String,
    pub namespace: String,
    pub match_pool: String,
    pub members: Vec<SessionMember>,
    pub version: i64,
}
