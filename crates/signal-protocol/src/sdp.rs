//! Session description and ICE candidate payload shapes.
//!
//! These mirror the browser's `RTCSessionDescriptionInit` and
//! `RTCIceCandidateInit` dictionaries. The relay never inspects them; only
//! the two peers involved in a negotiation do.

use serde::{Deserialize, Serialize};

/// The kind of a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// A session description as exchanged during negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    #[must_use]
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    #[must_use]
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// An ICE candidate as exchanged during negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

/// Payload of a `signal` event: exactly one of an SDP or an ICE candidate.
///
/// Kept as two optional fields rather than an enum because that is the wire
/// shape clients produce; [`SignalPayload::classify`] resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SignalPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<IceCandidate>,
}

/// Resolved view of a [`SignalPayload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    Offer(SessionDescription),
    Answer(SessionDescription),
    Candidate(IceCandidate),
    /// Neither field present; carried for defensive handling.
    Empty,
}

impl SignalPayload {
    #[must_use]
    pub fn from_sdp(sdp: SessionDescription) -> Self {
        Self {
            sdp: Some(sdp),
            candidate: None,
        }
    }

    #[must_use]
    pub fn from_candidate(candidate: IceCandidate) -> Self {
        Self {
            sdp: None,
            candidate: Some(candidate),
        }
    }

    /// Resolve the payload into its signal kind. SDP wins if a confused
    /// sender set both fields.
    #[must_use]
    pub fn classify(self) -> SignalKind {
        match (self.sdp, self.candidate) {
            (Some(desc), _) => match desc.kind {
                SdpType::Offer => SignalKind::Offer(desc),
                SdpType::Answer => SignalKind::Answer(desc),
            },
            (None, Some(candidate)) => SignalKind::Candidate(candidate),
            (None, None) => SignalKind::Empty,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn sdp_payload_round_trips() {
        let payload = SignalPayload::from_sdp(SessionDescription::offer("v=0..."));
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"sdp":{"type":"offer","sdp":"v=0..."}}"#);

        let back: SignalPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn candidate_payload_classifies() {
        let payload = SignalPayload::from_candidate(IceCandidate {
            candidate: "candidate:0 1 UDP ...".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
        });
        assert!(matches!(payload.classify(), SignalKind::Candidate(_)));
    }

    #[test]
    fn empty_payload_classifies_as_empty() {
        assert_eq!(SignalPayload::default().classify(), SignalKind::Empty);
    }

    #[test]
    fn browser_candidate_shape_parses() {
        let json = r#"{"candidate":{"candidate":"candidate:1 1 UDP 2122252543 192.0.2.1 54321 typ host","sdpMid":"0","sdpMLineIndex":0}}"#;
        let payload: SignalPayload = serde_json::from_str(json).unwrap();
        let kind = payload.classify();
        assert!(
            matches!(&kind, SignalKind::Candidate(c) if c.sdp_m_line_index == Some(0)),
            "expected candidate, got {kind:?}"
        );
    }
}
