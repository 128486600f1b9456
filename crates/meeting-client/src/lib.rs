//! Parley Meeting Client Core
//!
//! The transport-independent half of a meeting client: everything between
//! the signaling socket and the actual media stack.
//!
//! - [`engine`] - per-peer WebRTC negotiation state machines
//! - [`peer`] - peer session types and the [`peer::PeerTransport`] seam
//! - [`state`] - the local meeting state store (participants, chat, pins)
//! - [`session`] - the client session actor tying the pieces together
//!
//! Media itself (capture, encode, the browser `RTCPeerConnection`) lives
//! behind the [`peer::PeerTransport`] trait; this crate only decides *when*
//! each transport call happens and what signal goes back to the relay.

pub mod engine;
pub mod errors;
pub mod peer;
pub mod session;
pub mod state;

pub use engine::PeerNegotiationEngine;
pub use errors::NegotiationError;
pub use peer::{PeerConnectionState, PeerTransport, SignalingState, TransportFactory};
pub use session::{ClientSession, ClientSessionHandle, SessionConfig};
pub use state::MeetingState;
