//! Client-side negotiation error types.

use common::types::ConnectionId;
use thiserror::Error;

/// Errors surfaced by the peer negotiation engine.
///
/// `InvalidTransition` is the important one: it is returned *instead of*
/// mutating a peer session when a signal arrives in the wrong state, so a
/// stale offer or answer can never corrupt an established connection.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// An offer was requested before any local media was available.
    #[error("no local media available for offer")]
    NoLocalMedia,

    /// A signal arrived that the peer's signaling state does not permit.
    #[error("rejected {kind} while {state}")]
    InvalidTransition {
        kind: &'static str,
        state: &'static str,
    },

    /// A signal referenced a peer with no session.
    #[error("unknown peer: {0}")]
    UnknownPeer(ConnectionId),

    /// The underlying media transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The outgoing event channel to the relay is gone.
    #[error("signaling outbox closed")]
    OutboxClosed,
}

/// Errors from the client session actor's handle.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session actor's mailbox is gone (actor stopped or cancelled).
    #[error("session mailbox closed: {0}")]
    MailboxClosed(String),

    /// A query's reply channel was dropped before the actor answered.
    #[error("session response dropped: {0}")]
    ResponseDropped(String),
}
