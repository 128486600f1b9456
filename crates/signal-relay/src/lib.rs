//! Parley Signaling Relay
//!
//! A single-process relay server for browser video meetings. It owns three
//! pieces of server-side state and nothing else:
//!
//! - Room registry: meeting id -> participant set + profile snapshots
//! - Screen-share arbiter: at most one active presenter per meeting
//! - Connection table: connection id -> outbound event channel
//!
//! Peers exchange media directly; the relay only routes control messages.
//!
//! # Architecture
//!
//! All state lives inside one `RelayActor` task. WebSocket reader tasks feed
//! client events into its mailbox; the actor mutates the registry/arbiter and
//! fans events out over per-connection channels, serially. Because every
//! mutation happens inside one mailbox loop, events within a room are
//! delivered in the order the relay processed them, and disconnect cleanup
//! completes before the next event is taken.
//!
//! # Modules
//!
//! - [`relay`] - the relay actor and its handle
//! - [`registry`] - room membership bookkeeping
//! - [`share`] - screen-share slot arbitration
//! - [`ws`] - axum WebSocket transport
//! - [`config`] - configuration from environment
//! - [`observability`] - health endpoints and metrics

pub mod config;
pub mod errors;
pub mod observability;
pub mod registry;
pub mod relay;
pub mod share;
pub mod ws;
