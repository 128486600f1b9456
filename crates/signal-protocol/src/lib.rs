//! Wire protocol for the Parley signaling relay.
//!
//! Every frame on the relay socket is a JSON object of the shape
//! `{"type": "<event-name>", "payload": ...}`. Event names and payload
//! fields match what the browser client emits, so the enums here are the
//! single source of truth for both directions of the channel.

pub mod client;
pub mod sdp;
pub mod server;

pub use client::ClientEvent;
pub use sdp::{IceCandidate, SdpType, SessionDescription, SignalKind, SignalPayload};
pub use server::{ChatBroadcast, ParticipantSnapshot, ServerEvent};
