//! Room membership bookkeeping.
//!
//! The registry is a plain in-memory structure owned exclusively by the
//! relay actor; it is never touched from more than one task. Rooms are
//! created lazily on first join and deleted as soon as their participant
//! set empties, so an idle server holds no room state at all.
//!
//! Operation contract: every operation tolerates unknown meeting ids and
//! unknown connection ids. Nothing here returns an error; the relay's
//! routing layer decides what (if anything) to tell clients.

use common::types::{ConnectionId, MeetingId, UserProfile};
use signal_protocol::ParticipantSnapshot;
use std::collections::HashMap;
use tracing::debug;

/// Profile recorded for a waiting-room joiner, consumed on admit.
#[derive(Debug, Clone)]
pub struct PendingJoin {
    pub profile: UserProfile,
    pub org: Option<String>,
}

/// State of one meeting room.
#[derive(Debug, Default)]
pub struct Room {
    /// Joined connections in insertion order. First entry is the host by
    /// convention. Membership is set-like: a connection appears at most once.
    participants: Vec<ConnectionId>,
    /// Profile snapshot captured at join time, keyed by member.
    users: HashMap<ConnectionId, UserProfile>,
    /// Organization strings for access-gated joins, keyed by member.
    orgs: HashMap<ConnectionId, String>,
    /// Waiting-room joiners that knocked but are not members yet.
    pending: HashMap<ConnectionId, PendingJoin>,
}

impl Room {
    fn snapshot_of(&self, id: &ConnectionId) -> ParticipantSnapshot {
        ParticipantSnapshot {
            id: id.clone(),
            profile: self.users.get(id).cloned().unwrap_or_default(),
            org: self.orgs.get(id).cloned(),
        }
    }
}

/// In-memory mapping of meeting ids to rooms.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<MeetingId, Room>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `connection` to the room for `meeting`, creating the room if
    /// absent. Re-joining refreshes the stored profile without duplicating
    /// the membership entry.
    pub fn join(&mut self, meeting: &MeetingId, connection: &ConnectionId, profile: UserProfile) {
        let room = self.rooms.entry(meeting.clone()).or_default();
        if !room.participants.contains(connection) {
            room.participants.push(connection.clone());
        }
        room.users.insert(connection.clone(), profile);
        room.pending.remove(connection);

        debug!(
            target: "relay.registry",
            meeting_id = %meeting,
            connection_id = %connection,
            participants = room.participants.len(),
            "Participant joined room"
        );
    }

    /// Remove `connection` from the room for `meeting`. Idempotent: leaving
    /// a room one is not in (or that does not exist) is a no-op. The room is
    /// deleted when its participant set empties.
    pub fn leave(&mut self, meeting: &MeetingId, connection: &ConnectionId) {
        let Some(room) = self.rooms.get_mut(meeting) else {
            return;
        };

        room.participants.retain(|id| id != connection);
        room.users.remove(connection);
        room.orgs.remove(connection);
        room.pending.remove(connection);

        if room.participants.is_empty() {
            self.rooms.remove(meeting);
            debug!(
                target: "relay.registry",
                meeting_id = %meeting,
                "Last participant left, room removed"
            );
        }
    }

    /// Record a waiting-room knock so a later [`admit`](Self::admit) can
    /// install a real profile. No-op when the room does not exist (there is
    /// nobody inside who could admit).
    pub fn record_pending(
        &mut self,
        meeting: &MeetingId,
        connection: &ConnectionId,
        profile: UserProfile,
        org: Option<String>,
    ) {
        if let Some(room) = self.rooms.get_mut(meeting) {
            room.pending
                .insert(connection.clone(), PendingJoin { profile, org });
        }
    }

    /// Admit a previously-pending connection into the room without a fresh
    /// join. Never overwrites an existing profile, never duplicates the
    /// membership entry. Returns `false` when the room does not exist.
    pub fn admit(&mut self, meeting: &MeetingId, connection: &ConnectionId) -> bool {
        let Some(room) = self.rooms.get_mut(meeting) else {
            return false;
        };

        if !room.participants.contains(connection) {
            room.participants.push(connection.clone());
        }

        if let Some(pending) = room.pending.remove(connection) {
            room.users.entry(connection.clone()).or_insert(pending.profile);
            if let (Some(org), None) = (pending.org, room.orgs.get(connection)) {
                room.orgs.insert(connection.clone(), org);
            }
        } else {
            room.users.entry(connection.clone()).or_default();
        }

        debug!(
            target: "relay.registry",
            meeting_id = %meeting,
            connection_id = %connection,
            "Participant admitted"
        );
        true
    }

    /// Snapshot of the room's members, in registry-insertion order.
    #[must_use]
    pub fn list_participants(&self, meeting: &MeetingId) -> Vec<ParticipantSnapshot> {
        self.rooms.get(meeting).map_or_else(Vec::new, |room| {
            room.participants
                .iter()
                .map(|id| room.snapshot_of(id))
                .collect()
        })
    }

    /// Snapshot of a single member, if present.
    #[must_use]
    pub fn snapshot_of(&self, meeting: &MeetingId, connection: &ConnectionId) -> Option<ParticipantSnapshot> {
        let room = self.rooms.get(meeting)?;
        room.participants
            .contains(connection)
            .then(|| room.snapshot_of(connection))
    }

    /// Whether `connection` is a member of `meeting`.
    #[must_use]
    pub fn is_member(&self, meeting: &MeetingId, connection: &ConnectionId) -> bool {
        self.rooms
            .get(meeting)
            .is_some_and(|room| room.participants.contains(connection))
    }

    /// The meetings `connection` is currently joined to, for disconnect
    /// sweeps. A connection may in principle be in several rooms.
    #[must_use]
    pub fn rooms_of(&self, connection: &ConnectionId) -> Vec<MeetingId> {
        self.rooms
            .iter()
            .filter(|(_, room)| room.participants.contains(connection))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Number of live rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Total participants across all rooms.
    #[must_use]
    pub fn total_participants(&self) -> usize {
        self.rooms.values().map(|room| room.participants.len()).sum()
    }
}
