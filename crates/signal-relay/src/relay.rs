//! `RelayActor` - the single task that owns all relay state.
//!
//! Every connected socket registers an outbound channel here and feeds its
//! decoded client events into the mailbox. The actor mutates the room
//! registry and screen-share arbiter, then fans resulting server events out
//! to the right connections. Processing is strictly serial, which is what
//! gives in-room broadcasts their ordering guarantee, and what lets the
//! registry and arbiter stay lock-free plain structs.
//!
//! Delivery is best-effort: a closed or backed-up outbound channel is
//! logged and skipped. Senders are never told whether a target received an
//! event.

use crate::errors::RelayError;
use crate::observability::metrics;
use crate::registry::RoomRegistry;
use crate::share::{ScreenShareArbiter, ShareStart};

use common::types::{ConnectionId, MeetingId};
use signal_protocol::{ClientEvent, ParticipantSnapshot, ServerEvent};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Mailbox buffer for the relay actor.
const RELAY_CHANNEL_BUFFER: usize = 1000;

/// Outbound buffer per connection. A client that cannot drain this many
/// events is considered backed up and starts losing best-effort events.
pub const OUTBOUND_CHANNEL_BUFFER: usize = 64;

/// Messages accepted by the relay actor.
pub enum RelayMessage {
    /// A new connection attached; `sender` is its outbound event channel.
    Register {
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerEvent>,
    },
    /// A connection's transport closed. Cleanup (registry leave, share
    /// release, departure broadcasts) happens synchronously inside this
    /// message, before the next one is taken.
    Deregister { connection_id: ConnectionId },
    /// A decoded client event.
    Event {
        from: ConnectionId,
        event: ClientEvent,
    },
    /// Query: ordered membership snapshot of a meeting.
    RoomSnapshot {
        meeting_id: MeetingId,
        respond_to: oneshot::Sender<Vec<ParticipantSnapshot>>,
    },
    /// Query: active presenter of a meeting.
    Presenter {
        meeting_id: MeetingId,
        respond_to: oneshot::Sender<Option<ConnectionId>>,
    },
}

/// Handle to the relay actor.
#[derive(Clone)]
pub struct RelayHandle {
    sender: mpsc::Sender<RelayMessage>,
    cancel_token: CancellationToken,
}

impl RelayHandle {
    /// Attach a connection's outbound channel.
    pub async fn register(
        &self,
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Result<(), RelayError> {
        self.sender
            .send(RelayMessage::Register {
                connection_id,
                sender,
            })
            .await
            .map_err(|e| RelayError::MailboxClosed(e.to_string()))
    }

    /// Detach a connection and clean up everything it owned.
    pub async fn deregister(&self, connection_id: ConnectionId) -> Result<(), RelayError> {
        self.sender
            .send(RelayMessage::Deregister { connection_id })
            .await
            .map_err(|e| RelayError::MailboxClosed(e.to_string()))
    }

    /// Submit a client event for routing.
    pub async fn event(&self, from: ConnectionId, event: ClientEvent) -> Result<(), RelayError> {
        self.sender
            .send(RelayMessage::Event { from, event })
            .await
            .map_err(|e| RelayError::MailboxClosed(e.to_string()))
    }

    /// Ordered membership snapshot of a meeting.
    pub async fn room_snapshot(
        &self,
        meeting_id: MeetingId,
    ) -> Result<Vec<ParticipantSnapshot>, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::RoomSnapshot {
                meeting_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RelayError::MailboxClosed(e.to_string()))?;
        rx.await
            .map_err(|e| RelayError::ResponseDropped(e.to_string()))
    }

    /// Active presenter of a meeting, if any.
    pub async fn presenter(
        &self,
        meeting_id: MeetingId,
    ) -> Result<Option<ConnectionId>, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::Presenter {
                meeting_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RelayError::MailboxClosed(e.to_string()))?;
        rx.await
            .map_err(|e| RelayError::ResponseDropped(e.to_string()))
    }

    /// Cancel the relay actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The relay actor implementation.
pub struct RelayActor {
    receiver: mpsc::Receiver<RelayMessage>,
    cancel_token: CancellationToken,
    registry: RoomRegistry,
    shares: ScreenShareArbiter,
    connections: HashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
}

impl RelayActor {
    /// Spawn the relay actor, returning its handle and task join handle.
    pub fn spawn(cancel_token: CancellationToken) -> (RelayHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(RELAY_CHANNEL_BUFFER);

        let actor = Self {
            receiver,
            cancel_token: cancel_token.clone(),
            registry: RoomRegistry::new(),
            shares: ScreenShareArbiter::new(),
            connections: HashMap::new(),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RelayHandle {
            sender,
            cancel_token,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "relay.actor")]
    async fn run(mut self) {
        info!(target: "relay.actor", "RelayActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: "relay.actor", "RelayActor received cancellation signal");
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!(target: "relay.actor", "RelayActor channel closed, exiting");
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "relay.actor",
            connections = self.connections.len(),
            rooms = self.registry.room_count(),
            "RelayActor stopped"
        );
    }

    fn handle_message(&mut self, message: RelayMessage) {
        match message {
            RelayMessage::Register {
                connection_id,
                sender,
            } => {
                debug!(
                    target: "relay.actor",
                    connection_id = %connection_id,
                    "Connection registered"
                );
                self.connections.insert(connection_id, sender);
                metrics::set_connections_active(self.connections.len());
            }

            RelayMessage::Deregister { connection_id } => {
                self.handle_disconnect(&connection_id);
            }

            RelayMessage::Event { from, event } => {
                metrics::record_event(event_name(&event));
                self.handle_event(from, event);
            }

            RelayMessage::RoomSnapshot {
                meeting_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.registry.list_participants(&meeting_id));
            }

            RelayMessage::Presenter {
                meeting_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.shares.status(&meeting_id).cloned());
            }
        }
    }

    /// Route one client event.
    #[instrument(skip_all, fields(connection_id = %from))]
    fn handle_event(&mut self, from: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom { meeting_id, user } => {
                self.registry.join(&meeting_id, &from, user);
                metrics::set_rooms_active(self.registry.room_count());

                if let Some(snapshot) = self.registry.snapshot_of(&meeting_id, &from) {
                    self.broadcast(&meeting_id, &ServerEvent::ParticipantJoined(snapshot), None);
                }
                let participants = self.registry.list_participants(&meeting_id);
                self.unicast(&from, ServerEvent::RoomParticipants(participants));
            }

            ClientEvent::Signal {
                meeting_id: _,
                to,
                data,
            } => {
                // Point-to-point; a departed target makes this a no-op.
                self.unicast(&to, ServerEvent::Signal { from, data });
            }

            ClientEvent::Chat {
                meeting_id,
                user,
                avatar,
                email,
                message,
                time,
            } => {
                if meeting_id.as_str().is_empty() || user.is_empty() || message.is_empty() {
                    debug!(target: "relay.actor", "Dropping malformed chat event");
                    return;
                }
                self.broadcast(
                    &meeting_id,
                    &ServerEvent::Chat(signal_protocol::ChatBroadcast {
                        from,
                        user,
                        avatar,
                        email,
                        message,
                        time,
                    }),
                    None,
                );
            }

            ClientEvent::PinMessage { meeting_id, msg } => {
                self.broadcast(&meeting_id, &ServerEvent::PinMessage(msg), None);
            }

            ClientEvent::UnpinMessage { meeting_id } => {
                self.broadcast(&meeting_id, &ServerEvent::UnpinMessage, None);
            }

            ClientEvent::RequestAccess {
                meeting_id,
                user,
                org,
            } => {
                self.registry
                    .record_pending(&meeting_id, &from, user.clone(), org.clone());
                self.broadcast(
                    &meeting_id,
                    &ServerEvent::AccessRequest {
                        id: from.clone(),
                        user,
                        org,
                    },
                    Some(&from),
                );
            }

            ClientEvent::Admit { meeting_id, target } => {
                if !self.registry.admit(&meeting_id, &target) {
                    debug!(
                        target: "relay.actor",
                        meeting_id = %meeting_id,
                        "Admit into unknown room ignored"
                    );
                    return;
                }
                self.unicast(&target, ServerEvent::Admitted);
                if let Some(snapshot) = self.registry.snapshot_of(&meeting_id, &target) {
                    self.broadcast(&meeting_id, &ServerEvent::ParticipantJoined(snapshot), None);
                }
                let participants = self.registry.list_participants(&meeting_id);
                self.unicast(&target, ServerEvent::RoomParticipants(participants));
            }

            ClientEvent::Kick { meeting_id, target } => {
                self.unicast(&target, ServerEvent::Kicked);
                self.registry.leave(&meeting_id, &target);
                metrics::set_rooms_active(self.registry.room_count());
            }

            ClientEvent::Mute {
                meeting_id: _,
                target,
            } => {
                // Advisory only; the registry holds no mute flag.
                self.unicast(&target, ServerEvent::Muted);
            }

            ClientEvent::ScreenShareStart {
                meeting_id,
                user_id,
            } => match self.shares.start(&meeting_id, &user_id) {
                ShareStart::Started { preempted } => {
                    if let Some(previous) = preempted {
                        // Forced stop goes straight to the previous
                        // presenter's connection.
                        self.unicast(
                            &previous,
                            ServerEvent::ScreenShareStop {
                                user_id: previous.clone(),
                            },
                        );
                    }
                    self.broadcast(
                        &meeting_id,
                        &ServerEvent::ScreenShareStart { user_id },
                        Some(&from),
                    );
                }
                ShareStart::AlreadyPresenting => {
                    debug!(
                        target: "relay.actor",
                        meeting_id = %meeting_id,
                        "Duplicate screen-share start ignored"
                    );
                }
            },

            ClientEvent::ScreenShareStop {
                meeting_id,
                user_id,
            } => {
                // Broadcast regardless of whether the slot matched; a stale
                // stop must not clear the current share but the room still
                // hears that this presenter stopped.
                self.shares.stop(&meeting_id, &user_id);
                self.broadcast(
                    &meeting_id,
                    &ServerEvent::ScreenShareStop { user_id },
                    Some(&from),
                );
            }

            ClientEvent::GetScreenShareStatus { meeting_id } => {
                let user_id = self.shares.status(&meeting_id).cloned();
                self.unicast(&from, ServerEvent::ScreenShareStatus { user_id });
            }
        }
    }

    /// Synchronous disconnect cleanup: leave every joined room (broadcasting
    /// the departure), release any screen-share slots, drop the channel.
    fn handle_disconnect(&mut self, connection_id: &ConnectionId) {
        for meeting_id in self.registry.rooms_of(connection_id) {
            self.registry.leave(&meeting_id, connection_id);
            self.broadcast(
                &meeting_id,
                &ServerEvent::ParticipantLeft {
                    id: connection_id.clone(),
                },
                None,
            );
        }

        for meeting_id in self.shares.presenter_disconnected(connection_id) {
            self.broadcast(
                &meeting_id,
                &ServerEvent::ScreenShareStop {
                    user_id: connection_id.clone(),
                },
                None,
            );
        }

        self.connections.remove(connection_id);
        metrics::set_connections_active(self.connections.len());
        metrics::set_rooms_active(self.registry.room_count());

        debug!(
            target: "relay.actor",
            connection_id = %connection_id,
            "Connection deregistered"
        );
    }

    /// Best-effort unicast to one connection.
    fn unicast(&self, target: &ConnectionId, event: ServerEvent) {
        let Some(sender) = self.connections.get(target) else {
            debug!(
                target: "relay.actor",
                connection_id = %target,
                "Unicast target no longer connected"
            );
            return;
        };
        if let Err(e) = sender.try_send(event) {
            warn!(
                target: "relay.actor",
                connection_id = %target,
                error = %e,
                "Dropping event for backed-up or closed connection"
            );
        }
    }

    /// Best-effort broadcast to a room's current members, optionally
    /// excluding one connection.
    fn broadcast(&self, meeting_id: &MeetingId, event: &ServerEvent, except: Option<&ConnectionId>) {
        for participant in self.registry.list_participants(meeting_id) {
            if Some(&participant.id) == except {
                continue;
            }
            self.unicast(&participant.id, event.clone());
        }
    }
}

/// Stable event name for metrics and logs.
fn event_name(event: &ClientEvent) -> &'static str {
    match event {
        ClientEvent::JoinRoom { .. } => "join-room",
        ClientEvent::Signal { .. } => "signal",
        ClientEvent::Chat { .. } => "chat",
        ClientEvent::PinMessage { .. } => "pin-message",
        ClientEvent::UnpinMessage { .. } => "unpin-message",
        ClientEvent::RequestAccess { .. } => "request-access",
        ClientEvent::Admit { .. } => "admit",
        ClientEvent::Kick { .. } => "kick",
        ClientEvent::Mute { .. } => "mute",
        ClientEvent::ScreenShareStart { .. } => "screen-share-start",
        ClientEvent::ScreenShareStop { .. } => "screen-share-stop",
        ClientEvent::GetScreenShareStatus { .. } => "get-screen-share-status",
    }
}
