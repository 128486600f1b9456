//! Events sent from a client to the relay.

use crate::sdp::SignalPayload;
use crate::server::ChatBroadcast;
use common::types::{ConnectionId, MeetingId, UserProfile};
use serde::{Deserialize, Serialize};

/// A client-originated relay event.
///
/// `type` selects the variant, `payload` carries the fields. Unknown event
/// types fail deserialization and are dropped by the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join a meeting, creating the room on first use.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        meeting_id: MeetingId,
        user: UserProfile,
    },

    /// Point-to-point SDP/ICE exchange, routed by explicit target.
    #[serde(rename_all = "camelCase")]
    Signal {
        meeting_id: MeetingId,
        to: ConnectionId,
        data: SignalPayload,
    },

    /// Chat message, broadcast to the whole room including the sender.
    #[serde(rename_all = "camelCase")]
    Chat {
        meeting_id: MeetingId,
        user: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        message: String,
        time: String,
    },

    /// Pin a chat message for the room; last write wins.
    #[serde(rename_all = "camelCase")]
    PinMessage {
        meeting_id: MeetingId,
        msg: ChatBroadcast,
    },

    /// Clear the room's pinned message.
    #[serde(rename_all = "camelCase")]
    UnpinMessage { meeting_id: MeetingId },

    /// Waiting-room knock: notify current members of a pending joiner.
    #[serde(rename_all = "camelCase")]
    RequestAccess {
        meeting_id: MeetingId,
        user: UserProfile,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        org: Option<String>,
    },

    /// Admit a pending joiner into the room.
    #[serde(rename_all = "camelCase")]
    Admit {
        meeting_id: MeetingId,
        target: ConnectionId,
    },

    /// Force a participant out of the room.
    #[serde(rename_all = "camelCase")]
    Kick {
        meeting_id: MeetingId,
        target: ConnectionId,
    },

    /// Ask a participant to mute themselves (advisory only).
    #[serde(rename_all = "camelCase")]
    Mute {
        meeting_id: MeetingId,
        target: ConnectionId,
    },

    /// Claim the meeting's screen-share slot.
    #[serde(rename_all = "camelCase")]
    ScreenShareStart {
        meeting_id: MeetingId,
        user_id: ConnectionId,
    },

    /// Release the meeting's screen-share slot.
    #[serde(rename_all = "camelCase")]
    ScreenShareStop {
        meeting_id: MeetingId,
        user_id: ConnectionId,
    },

    /// Query the current presenter; answered by unicast.
    #[serde(rename_all = "camelCase")]
    GetScreenShareStatus { meeting_id: MeetingId },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::sdp::SessionDescription;

    #[test]
    fn join_room_parses_browser_shape() {
        let json = r#"{"type":"join-room","payload":{"meetingId":"room1","user":{"name":"Asha","avatar":"https://a.example/p.png","email":"asha@example.com","deviceType":"desktop"}}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event,
            ClientEvent::JoinRoom { ref meeting_id, ref user }
                if meeting_id.as_str() == "room1" && user.name == "Asha"
        ));
    }

    #[test]
    fn signal_event_round_trips() {
        let event = ClientEvent::Signal {
            meeting_id: MeetingId::new("room1"),
            to: ConnectionId::new("peer-2"),
            data: SignalPayload::from_sdp(SessionDescription::offer("v=0")),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"signal"#));
        assert!(json.contains(r#""to":"peer-2""#));

        let back: ClientEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn kebab_case_tags_match_wire_names() {
        let event = ClientEvent::GetScreenShareStatus {
            meeting_id: MeetingId::new("m"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"get-screen-share-status""#));
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let json = r#"{"type":"reboot-server","payload":{}}"#;
        assert!(serde_json::from_str::<ClientEvent>(json).is_err());
    }
}
