//! Relay error types.
//!
//! Per-event failures (malformed payloads, departed targets) are not errors
//! at all: the relay drops them silently per the best-effort contract. The
//! variants here cover infrastructure failures only.

use thiserror::Error;

/// Signaling relay error type.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The relay actor's mailbox is gone (actor stopped or cancelled).
    #[error("relay mailbox closed: {0}")]
    MailboxClosed(String),

    /// A query's reply channel was dropped before the actor answered.
    #[error("relay response dropped: {0}")]
    ResponseDropped(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
