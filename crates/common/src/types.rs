//! Identifier newtypes and participant profile types.
//!
//! Meeting and connection identifiers are opaque strings: meeting ids are
//! minted by the dashboard (typically UUIDs) and connection ids are assigned
//! by the relay transport when a socket attaches. Neither side interprets
//! their contents.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a meeting (room).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingId(String);

impl MeetingId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MeetingId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a client's transport session.
///
/// Doubles as a lightweight participant id for as long as the connection
/// lives, mirroring how the relay addresses point-to-point events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random connection id (UUIDv4).
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Device class reported by the client at join time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
    #[default]
    Unknown,
}

/// Participant profile snapshot captured at join time.
///
/// Supplied by the collaborating identity layer and treated as opaque,
/// pre-validated data; the relay never re-derives trust from these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, rename = "deviceType")]
    pub device_type: DeviceType,
}

impl UserProfile {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::random(), ConnectionId::random());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = MeetingId::new("room1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"room1\"");

        let back: MeetingId = serde_json::from_str("\"room1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn profile_tolerates_missing_optional_fields() {
        let profile: UserProfile = serde_json::from_str(r#"{"name":"Asha"}"#).unwrap();
        assert_eq!(profile.name, "Asha");
        assert_eq!(profile.avatar, None);
        assert_eq!(profile.device_type, DeviceType::Unknown);
    }

    #[test]
    fn profile_round_trips_device_type() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"name":"Asha","deviceType":"mobile"}"#).unwrap();
        assert_eq!(profile.device_type, DeviceType::Mobile);

        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("\"deviceType\":\"mobile\""));
    }
}
