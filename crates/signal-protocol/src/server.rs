//! Events sent from the relay to a client.

use crate::sdp::SignalPayload;
use common::types::{ConnectionId, UserProfile};
use serde::{Deserialize, Serialize};

/// One participant as seen in membership broadcasts and snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub id: ConnectionId,
    #[serde(flatten)]
    pub profile: UserProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
}

/// A chat message as delivered to the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatBroadcast {
    pub from: ConnectionId,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub message: String,
    pub time: String,
}

/// A relay-originated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A participant joined (or was admitted into) the room.
    ParticipantJoined(ParticipantSnapshot),

    /// Full membership snapshot, sent to a joiner or admitted participant.
    /// Always a complete replacement, never a delta.
    RoomParticipants(Vec<ParticipantSnapshot>),

    /// A participant left the room.
    #[serde(rename_all = "camelCase")]
    ParticipantLeft { id: ConnectionId },

    /// Relayed SDP/ICE payload, tagged with the sender.
    #[serde(rename_all = "camelCase")]
    Signal {
        from: ConnectionId,
        data: SignalPayload,
    },

    /// Chat message broadcast to the whole room, sender included.
    Chat(ChatBroadcast),

    /// The room's pinned message changed; last write wins.
    PinMessage(ChatBroadcast),

    /// The room's pinned message was cleared.
    UnpinMessage,

    /// A pending joiner is knocking.
    #[serde(rename_all = "camelCase")]
    AccessRequest {
        id: ConnectionId,
        user: UserProfile,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        org: Option<String>,
    },

    /// You have been admitted into the room.
    Admitted,

    /// You have been removed from the room.
    Kicked,

    /// A host asked you to mute yourself (advisory only).
    Muted,

    /// A participant started presenting.
    #[serde(rename_all = "camelCase")]
    ScreenShareStart { user_id: ConnectionId },

    /// A participant stopped presenting. Sent directly to a preempted
    /// presenter as a forced-stop directive, and broadcast to the room.
    #[serde(rename_all = "camelCase")]
    ScreenShareStop { user_id: ConnectionId },

    /// Unicast reply to a screen-share status query; `None` when nobody
    /// is presenting.
    #[serde(rename_all = "camelCase")]
    ScreenShareStatus { user_id: Option<ConnectionId> },
}
