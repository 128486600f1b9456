//! Screen-share slot arbitration.
//!
//! Each meeting has at most one active presenter. A new presenter preempts
//! the current one; the relay turns the preemption into a forced-stop
//! directive delivered to the previous presenter's connection.

use common::types::{ConnectionId, MeetingId};
use std::collections::HashMap;
use tracing::debug;

/// Outcome of a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareStart {
    /// The presenter now holds the slot. `preempted` names the previous
    /// presenter that must be force-stopped, if there was one.
    Started { preempted: Option<ConnectionId> },
    /// The presenter already held the slot; nothing to do.
    AlreadyPresenting,
}

/// Per-meeting active screen-share slots.
#[derive(Debug, Default)]
pub struct ScreenShareArbiter {
    active: HashMap<MeetingId, ConnectionId>,
}

impl ScreenShareArbiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `presenter` as the meeting's active presenter.
    ///
    /// Idempotent for the current presenter: restarting one's own share
    /// never triggers preemption against oneself.
    pub fn start(&mut self, meeting: &MeetingId, presenter: &ConnectionId) -> ShareStart {
        let previous = self.active.get(meeting);
        if previous == Some(presenter) {
            return ShareStart::AlreadyPresenting;
        }

        let preempted = self.active.insert(meeting.clone(), presenter.clone());
        debug!(
            target: "relay.share",
            meeting_id = %meeting,
            presenter_id = %presenter,
            preempted = preempted.as_ref().map(ToString::to_string),
            "Screen share started"
        );
        ShareStart::Started { preempted }
    }

    /// Clear the slot, but only on an exact `(meeting, presenter)` match.
    ///
    /// A stale stop from a presenter that was already preempted must not
    /// clear the current presenter's share. Returns whether the slot was
    /// cleared.
    pub fn stop(&mut self, meeting: &MeetingId, presenter: &ConnectionId) -> bool {
        if self.active.get(meeting) == Some(presenter) {
            self.active.remove(meeting);
            debug!(
                target: "relay.share",
                meeting_id = %meeting,
                presenter_id = %presenter,
                "Screen share stopped"
            );
            true
        } else {
            false
        }
    }

    /// The meeting's active presenter, if any.
    #[must_use]
    pub fn status(&self, meeting: &MeetingId) -> Option<&ConnectionId> {
        self.active.get(meeting)
    }

    /// Clear every slot held by a disconnecting presenter, returning the
    /// meetings whose shares ended (treated as implicit forced stops).
    pub fn presenter_disconnected(&mut self, presenter: &ConnectionId) -> Vec<MeetingId> {
        let ended: Vec<MeetingId> = self
            .active
            .iter()
            .filter(|(_, holder)| *holder == presenter)
            .map(|(meeting, _)| meeting.clone())
            .collect();
        for meeting in &ended {
            self.active.remove(meeting);
        }
        ended
    }
}
