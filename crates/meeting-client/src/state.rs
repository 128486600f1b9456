//! Local meeting state store.
//!
//! Everything a meeting UI renders from: the participant roster, the chat
//! log, the pinned message and the active presenter. The store is a plain
//! struct owned by the session actor; reads go through snapshots.

use common::types::ConnectionId;
use signal_protocol::{ChatBroadcast, ParticipantSnapshot};
use uuid::Uuid;

/// A chat entry with its locally assigned identity.
///
/// Identity is the generated id, never the content: two participants saying
/// the same thing at the same time are two entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub msg: ChatBroadcast,
}

/// The client's view of one meeting.
#[derive(Debug, Default)]
pub struct MeetingState {
    participants: Vec<ParticipantSnapshot>,
    chat: Vec<ChatMessage>,
    pinned: Option<ChatBroadcast>,
    presenter: Option<ConnectionId>,
}

impl MeetingState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole roster with an authoritative snapshot.
    pub fn replace_participants(&mut self, participants: Vec<ParticipantSnapshot>) {
        self.participants = participants;
    }

    /// Insert or update a single participant, preserving roster order for
    /// existing entries.
    pub fn patch_participant(&mut self, snapshot: ParticipantSnapshot) {
        if let Some(existing) = self
            .participants
            .iter_mut()
            .find(|p| p.id == snapshot.id)
        {
            *existing = snapshot;
        } else {
            self.participants.push(snapshot);
        }
    }

    /// Remove a participant. Returns whether it was present.
    pub fn remove_participant(&mut self, id: &ConnectionId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p.id != *id);
        self.participants.len() != before
    }

    #[must_use]
    pub fn participants(&self) -> &[ParticipantSnapshot] {
        &self.participants
    }

    /// Append a chat message, assigning it a fresh id.
    pub fn push_chat(&mut self, msg: ChatBroadcast) -> Uuid {
        let id = Uuid::new_v4();
        self.chat.push(ChatMessage { id, msg });
        id
    }

    #[must_use]
    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn pin(&mut self, msg: ChatBroadcast) {
        self.pinned = Some(msg);
    }

    pub fn unpin(&mut self) {
        self.pinned = None;
    }

    #[must_use]
    pub fn pinned(&self) -> Option<&ChatBroadcast> {
        self.pinned.as_ref()
    }

    pub fn set_presenter(&mut self, presenter: Option<ConnectionId>) {
        self.presenter = presenter;
    }

    /// Clear the presenter, but only if `id` is the one presenting. A stale
    /// stop for a preempted presenter must not clear the current one.
    pub fn clear_presenter_if(&mut self, id: &ConnectionId) {
        if self.presenter.as_ref() == Some(id) {
            self.presenter = None;
        }
    }

    #[must_use]
    pub fn presenter(&self) -> Option<&ConnectionId> {
        self.presenter.as_ref()
    }

    /// Drop all meeting state; used on leave and kick.
    pub fn clear(&mut self) {
        self.participants.clear();
        self.chat.clear();
        self.pinned = None;
        self.presenter = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::types::UserProfile;

    fn snapshot(id: &str, name: &str) -> ParticipantSnapshot {
        ParticipantSnapshot {
            id: ConnectionId::new(id),
            profile: UserProfile::named(name),
            org: None,
        }
    }

    fn chat(user: &str, message: &str) -> ChatBroadcast {
        ChatBroadcast {
            from: ConnectionId::new(user),
            user: user.to_string(),
            avatar: None,
            email: None,
            message: message.to_string(),
            time: "10:00".to_string(),
        }
    }

    #[test]
    fn identical_chat_content_coexists() {
        let mut state = MeetingState::new();
        let first = state.push_chat(chat("a", "hello"));
        let second = state.push_chat(chat("a", "hello"));

        assert_ne!(first, second);
        assert_eq!(state.chat().len(), 2);
        assert_eq!(state.chat()[0].msg, state.chat()[1].msg);
    }

    #[test]
    fn patch_updates_in_place_and_appends_new() {
        let mut state = MeetingState::new();
        state.replace_participants(vec![snapshot("a", "A"), snapshot("b", "B")]);

        state.patch_participant(snapshot("a", "A renamed"));
        state.patch_participant(snapshot("c", "C"));

        let names: Vec<_> = state
            .participants()
            .iter()
            .map(|p| p.profile.name.as_str())
            .collect();
        assert_eq!(names, vec!["A renamed", "B", "C"]);
    }

    #[test]
    fn remove_reports_presence() {
        let mut state = MeetingState::new();
        state.replace_participants(vec![snapshot("a", "A")]);

        assert!(state.remove_participant(&ConnectionId::new("a")));
        assert!(!state.remove_participant(&ConnectionId::new("a")));
        assert!(state.participants().is_empty());
    }

    #[test]
    fn pin_survives_roster_replacement() {
        let mut state = MeetingState::new();
        state.pin(chat("a", "pinned"));
        state.replace_participants(vec![snapshot("b", "B")]);

        assert_eq!(state.pinned().unwrap().message, "pinned");
        state.unpin();
        assert!(state.pinned().is_none());
    }

    #[test]
    fn stale_presenter_stop_is_ignored() {
        let mut state = MeetingState::new();
        state.set_presenter(Some(ConnectionId::new("b")));

        state.clear_presenter_if(&ConnectionId::new("a"));
        assert_eq!(state.presenter(), Some(&ConnectionId::new("b")));

        state.clear_presenter_if(&ConnectionId::new("b"));
        assert!(state.presenter().is_none());
    }

    #[test]
    fn clear_drops_everything() {
        let mut state = MeetingState::new();
        state.replace_participants(vec![snapshot("a", "A")]);
        state.push_chat(chat("a", "hi"));
        state.pin(chat("a", "hi"));
        state.set_presenter(Some(ConnectionId::new("a")));

        state.clear();
        assert!(state.participants().is_empty());
        assert!(state.chat().is_empty());
        assert!(state.pinned().is_none());
        assert!(state.presenter().is_none());
    }
}
