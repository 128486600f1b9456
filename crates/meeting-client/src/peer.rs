//! Peer session types and the media transport seam.
//!
//! [`PeerTransport`] is the boundary between negotiation logic and the real
//! media stack (an `RTCPeerConnection` in the browser build, a fake in
//! tests). The engine owns one transport per remote peer and drives it
//! through the calls below; the transport never talks to the relay itself.

use crate::errors::NegotiationError;
use common::types::ConnectionId;
use signal_protocol::{IceCandidate, SessionDescription};
use tokio::time::Instant;

/// SDP exchange state of one peer session.
///
/// Mirrors the WebRTC signaling state machine, reduced to the three states
/// the engine actually transitions through. Signals that would move the
/// machine from anywhere else are rejected without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    /// No exchange in flight; offers may be created or accepted.
    Stable,
    /// We sent an offer and are waiting for the answer.
    HaveLocalOffer,
    /// We received an offer and are producing the answer.
    HaveRemoteOffer,
}

impl SignalingState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::HaveLocalOffer => "have-local-offer",
            Self::HaveRemoteOffer => "have-remote-offer",
        }
    }
}

/// Lifecycle phase of one peer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPhase {
    /// We initiated this connection (we offer, we renegotiate).
    Outbound,
    /// The remote side initiated; we only answer.
    Inbound,
    /// Media is flowing.
    Connected,
    /// Torn down; the session is about to be dropped.
    Closed,
}

/// Connection health as reported by the media transport.
///
/// Matches the browser `RTCPeerConnectionState` vocabulary so the embedding
/// layer can forward state-change callbacks verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// The media stack behind one peer session.
///
/// All calls are synchronous from the engine's point of view; an async
/// media stack buffers internally and reports completion through
/// connection-state callbacks.
pub trait PeerTransport: Send {
    /// Produce an SDP offer for the current local media.
    fn create_offer(&mut self) -> Result<SessionDescription, NegotiationError>;

    /// Produce an SDP answer to the previously applied remote offer.
    fn create_answer(&mut self) -> Result<SessionDescription, NegotiationError>;

    fn set_local_description(
        &mut self,
        desc: &SessionDescription,
    ) -> Result<(), NegotiationError>;

    fn set_remote_description(
        &mut self,
        desc: &SessionDescription,
    ) -> Result<(), NegotiationError>;

    fn add_ice_candidate(&mut self, candidate: &IceCandidate) -> Result<(), NegotiationError>;

    /// Begin an ICE restart, returning the restart offer to signal.
    fn restart_ice(&mut self) -> Result<SessionDescription, NegotiationError>;

    /// Enable or disable the outgoing audio track.
    fn set_outbound_audio_enabled(&mut self, enabled: bool);

    /// Tear the transport down. Must be idempotent.
    fn close(&mut self);
}

/// Builds a fresh transport for a remote peer.
pub type TransportFactory = Box<dyn Fn(&ConnectionId) -> Box<dyn PeerTransport> + Send>;

/// Negotiation state for one remote peer, owned by the engine.
pub struct PeerSession {
    pub(crate) transport: Box<dyn PeerTransport>,
    pub(crate) phase: PeerPhase,
    pub(crate) signaling: SignalingState,
    /// Whether we created this session by offering (controls renegotiation).
    pub(crate) locally_initiated: bool,
    /// Whether a remote description has been applied yet. Candidates that
    /// arrive before it are queued in `pending_candidates`.
    pub(crate) remote_set: bool,
    pub(crate) pending_candidates: Vec<IceCandidate>,
    /// When the transport last reported disconnected/failed, if it has not
    /// recovered since.
    pub(crate) degraded_since: Option<Instant>,
    /// Whether an ICE restart has already been issued for the current
    /// degradation.
    pub(crate) restarted: bool,
}

impl PeerSession {
    pub(crate) fn new(transport: Box<dyn PeerTransport>, locally_initiated: bool) -> Self {
        Self {
            transport,
            phase: if locally_initiated {
                PeerPhase::Outbound
            } else {
                PeerPhase::Inbound
            },
            signaling: SignalingState::Stable,
            locally_initiated,
            remote_set: false,
            pending_candidates: Vec::new(),
            degraded_since: None,
            restarted: false,
        }
    }
}
