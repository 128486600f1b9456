//! Client session actor.
//!
//! One actor per joined meeting. It owns the negotiation engine and the
//! state store, consumes server events from the socket reader, and emits
//! client events into an outbox the socket writer drains. UI-facing calls
//! go through [`ClientSessionHandle`]; snapshots are the read path.
//!
//! Teardown is synchronous: by the time a leave or kick has been processed,
//! every peer transport is closed and the state store is empty.

use crate::engine::PeerNegotiationEngine;
use crate::errors::{NegotiationError, SessionError};
use crate::peer::{PeerConnectionState, TransportFactory};
use crate::state::{ChatMessage, MeetingState};

use common::types::{ConnectionId, MeetingId, UserProfile};
use signal_protocol::{ChatBroadcast, ClientEvent, ParticipantSnapshot, ServerEvent, SignalPayload};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Mailbox buffer for the session actor.
const SESSION_CHANNEL_BUFFER: usize = 256;

/// How often degraded peers are checked for ICE restarts.
const RESTART_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Session parameters fixed at spawn.
pub struct SessionConfig {
    pub meeting_id: MeetingId,
    /// Our own connection id, as assigned by the relay transport.
    pub local_id: ConnectionId,
    pub profile: UserProfile,
}

/// A waiting-room knock the host can act on.
#[derive(Debug, Clone)]
pub struct AccessKnock {
    pub id: ConnectionId,
    pub user: UserProfile,
    pub org: Option<String>,
}

/// Read-only view of the session for rendering.
#[derive(Debug)]
pub struct SessionSnapshot {
    pub participants: Vec<ParticipantSnapshot>,
    pub chat: Vec<ChatMessage>,
    pub pinned: Option<ChatBroadcast>,
    pub presenter: Option<ConnectionId>,
    pub knocks: Vec<AccessKnock>,
    pub admitted: bool,
    pub mic_muted: bool,
    pub sharing: bool,
}

/// Messages accepted by the session actor.
pub enum SessionMessage {
    /// An event decoded off the signaling socket.
    ServerEvent(ServerEvent),
    /// Local media availability changed (capture started or stopped).
    LocalMedia(bool),
    /// The media transport reported a connection-state change for a peer.
    ConnectionState {
        peer: ConnectionId,
        state: PeerConnectionState,
    },
    SendChat {
        message: String,
        time: String,
    },
    SetMicMuted(bool),
    Pin(ChatBroadcast),
    Unpin,
    Admit(ConnectionId),
    StartScreenShare,
    StopScreenShare,
    Leave,
    Snapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}

/// Handle to the session actor.
#[derive(Clone)]
pub struct ClientSessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
}

impl ClientSessionHandle {
    async fn send(&self, message: SessionMessage) -> Result<(), SessionError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| SessionError::MailboxClosed(e.to_string()))
    }

    /// Feed a decoded server event into the session.
    pub async fn server_event(&self, event: ServerEvent) -> Result<(), SessionError> {
        self.send(SessionMessage::ServerEvent(event)).await
    }

    /// Report local media availability.
    pub async fn set_local_media(&self, available: bool) -> Result<(), SessionError> {
        self.send(SessionMessage::LocalMedia(available)).await
    }

    /// Report a peer connection-state change from the media layer.
    pub async fn connection_state(
        &self,
        peer: ConnectionId,
        state: PeerConnectionState,
    ) -> Result<(), SessionError> {
        self.send(SessionMessage::ConnectionState { peer, state })
            .await
    }

    pub async fn send_chat(
        &self,
        message: impl Into<String>,
        time: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.send(SessionMessage::SendChat {
            message: message.into(),
            time: time.into(),
        })
        .await
    }

    pub async fn set_mic_muted(&self, muted: bool) -> Result<(), SessionError> {
        self.send(SessionMessage::SetMicMuted(muted)).await
    }

    pub async fn pin(&self, msg: ChatBroadcast) -> Result<(), SessionError> {
        self.send(SessionMessage::Pin(msg)).await
    }

    pub async fn unpin(&self) -> Result<(), SessionError> {
        self.send(SessionMessage::Unpin).await
    }

    /// Admit a waiting-room knocker (host action).
    pub async fn admit(&self, target: ConnectionId) -> Result<(), SessionError> {
        self.send(SessionMessage::Admit(target)).await
    }

    pub async fn start_screen_share(&self) -> Result<(), SessionError> {
        self.send(SessionMessage::StartScreenShare).await
    }

    pub async fn stop_screen_share(&self) -> Result<(), SessionError> {
        self.send(SessionMessage::StopScreenShare).await
    }

    /// Leave the meeting and tear the session down.
    pub async fn leave(&self) -> Result<(), SessionError> {
        self.send(SessionMessage::Leave).await
    }

    /// Snapshot of the current meeting state.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::Snapshot { respond_to: tx }).await?;
        rx.await
            .map_err(|e| SessionError::ResponseDropped(e.to_string()))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The session actor implementation.
pub struct ClientSession {
    receiver: mpsc::Receiver<SessionMessage>,
    cancel_token: CancellationToken,
    config: SessionConfig,
    engine: PeerNegotiationEngine,
    state: MeetingState,
    /// Outgoing client events; the socket writer drains the paired receiver.
    outbox: mpsc::UnboundedSender<ClientEvent>,
    knocks: Vec<AccessKnock>,
    admitted: bool,
    mic_muted: bool,
    sharing: bool,
}

impl ClientSession {
    /// Spawn a session for one meeting.
    ///
    /// Returns the handle, the outbox receiver the socket writer must
    /// drain, and the actor task. The join-room event is emitted
    /// immediately.
    pub fn spawn(
        config: SessionConfig,
        factory: TransportFactory,
    ) -> (
        ClientSessionHandle,
        mpsc::UnboundedReceiver<ClientEvent>,
        JoinHandle<()>,
    ) {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_BUFFER);
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        let engine = PeerNegotiationEngine::new(
            config.meeting_id.clone(),
            factory,
            outbox_tx.clone(),
        );

        let actor = Self {
            receiver,
            cancel_token: cancel_token.clone(),
            config,
            engine,
            state: MeetingState::new(),
            outbox: outbox_tx,
            knocks: Vec::new(),
            admitted: false,
            mic_muted: false,
            sharing: false,
        };

        let task_handle = tokio::spawn(actor.run());

        (
            ClientSessionHandle {
                sender,
                cancel_token,
            },
            outbox_rx,
            task_handle,
        )
    }

    #[instrument(skip_all, fields(meeting_id = %self.config.meeting_id, local_id = %self.config.local_id))]
    async fn run(mut self) {
        info!(target: "client.session", "Session started");

        self.emit(ClientEvent::JoinRoom {
            meeting_id: self.config.meeting_id.clone(),
            user: self.config.profile.clone(),
        });

        let mut restart_ticker = tokio::time::interval(RESTART_CHECK_INTERVAL);
        restart_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(target: "client.session", "Session cancelled");
                    break;
                }

                _ = restart_ticker.tick() => {
                    self.engine.check_restarts(Instant::now());
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            if !self.handle_message(message) {
                                break;
                            }
                        }
                        None => {
                            debug!(target: "client.session", "Session channel closed");
                            break;
                        }
                    }
                }
            }
        }

        self.teardown();
        info!(target: "client.session", "Session stopped");
    }

    /// Returns false when the session should stop.
    fn handle_message(&mut self, message: SessionMessage) -> bool {
        match message {
            SessionMessage::ServerEvent(event) => return self.handle_server_event(event),

            SessionMessage::LocalMedia(available) => {
                self.engine.set_local_media(available);
                if available {
                    self.connect_roster();
                }
            }

            SessionMessage::ConnectionState { peer, state } => {
                self.engine
                    .connection_state_changed(&peer, state, Instant::now());
            }

            SessionMessage::SendChat { message, time } => {
                // Our own copy arrives back in the room broadcast.
                self.emit(ClientEvent::Chat {
                    meeting_id: self.config.meeting_id.clone(),
                    user: self.config.profile.name.clone(),
                    avatar: self.config.profile.avatar.clone(),
                    email: self.config.profile.email.clone(),
                    message,
                    time,
                });
            }

            SessionMessage::SetMicMuted(muted) => {
                self.mic_muted = muted;
                self.engine.set_mic_muted(muted);
            }

            SessionMessage::Pin(msg) => {
                self.emit(ClientEvent::PinMessage {
                    meeting_id: self.config.meeting_id.clone(),
                    msg,
                });
            }

            SessionMessage::Unpin => {
                self.emit(ClientEvent::UnpinMessage {
                    meeting_id: self.config.meeting_id.clone(),
                });
            }

            SessionMessage::Admit(target) => {
                self.knocks.retain(|knock| knock.id != target);
                self.emit(ClientEvent::Admit {
                    meeting_id: self.config.meeting_id.clone(),
                    target,
                });
            }

            SessionMessage::StartScreenShare => {
                self.sharing = true;
                self.state
                    .set_presenter(Some(self.config.local_id.clone()));
                self.emit(ClientEvent::ScreenShareStart {
                    meeting_id: self.config.meeting_id.clone(),
                    user_id: self.config.local_id.clone(),
                });
            }

            SessionMessage::StopScreenShare => {
                if self.sharing {
                    self.sharing = false;
                    self.state.clear_presenter_if(&self.config.local_id);
                    self.emit(ClientEvent::ScreenShareStop {
                        meeting_id: self.config.meeting_id.clone(),
                        user_id: self.config.local_id.clone(),
                    });
                }
            }

            SessionMessage::Leave => {
                info!(target: "client.session", "Leaving meeting");
                return false;
            }

            SessionMessage::Snapshot { respond_to } => {
                let _ = respond_to.send(SessionSnapshot {
                    participants: self.state.participants().to_vec(),
                    chat: self.state.chat().to_vec(),
                    pinned: self.state.pinned().cloned(),
                    presenter: self.state.presenter().cloned(),
                    knocks: self.knocks.clone(),
                    admitted: self.admitted,
                    mic_muted: self.mic_muted,
                    sharing: self.sharing,
                });
            }
        }
        true
    }

    /// Returns false when the event ends the session.
    fn handle_server_event(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::RoomParticipants(participants) => {
                self.state.replace_participants(participants);
                self.connect_roster();
            }

            ServerEvent::ParticipantJoined(snapshot) => {
                if snapshot.id == self.config.local_id {
                    // Our own join echo.
                    return true;
                }
                let peer = snapshot.id.clone();
                self.state.patch_participant(snapshot);
                if !self.engine.has_peer(&peer) {
                    self.offer_to(&peer);
                }
            }

            ServerEvent::ParticipantLeft { id } => {
                self.state.remove_participant(&id);
                self.state.clear_presenter_if(&id);
                self.engine.close_connection(&id);
            }

            ServerEvent::Signal { from, data } => self.handle_signal(&from, data),

            ServerEvent::Chat(msg) => {
                self.state.push_chat(msg);
            }

            ServerEvent::PinMessage(msg) => self.state.pin(msg),
            ServerEvent::UnpinMessage => self.state.unpin(),

            ServerEvent::AccessRequest { id, user, org } => {
                debug!(target: "client.session", knocker_id = %id, "Access requested");
                self.knocks.retain(|knock| knock.id != id);
                self.knocks.push(AccessKnock { id, user, org });
            }

            ServerEvent::Admitted => {
                info!(target: "client.session", "Admitted to meeting");
                self.admitted = true;
            }

            ServerEvent::Kicked => {
                info!(target: "client.session", "Kicked from meeting");
                return false;
            }

            ServerEvent::Muted => {
                info!(target: "client.session", "Muted by host");
                self.mic_muted = true;
                self.engine.set_mic_muted(true);
            }

            ServerEvent::ScreenShareStart { user_id } => {
                self.state.set_presenter(Some(user_id));
            }

            ServerEvent::ScreenShareStop { user_id } => {
                if user_id == self.config.local_id {
                    // Forced stop: another participant preempted our share.
                    self.sharing = false;
                }
                self.state.clear_presenter_if(&user_id);
            }

            ServerEvent::ScreenShareStatus { user_id } => {
                self.state.set_presenter(user_id);
            }
        }
        true
    }

    fn handle_signal(&mut self, from: &ConnectionId, data: SignalPayload) {
        match self.engine.handle_signal(from, data) {
            Ok(()) => {}
            Err(NegotiationError::InvalidTransition { kind, state }) => {
                // Stale or duplicate signal; the session is untouched.
                debug!(
                    target: "client.session",
                    peer_id = %from,
                    kind,
                    state,
                    "Rejected out-of-order signal"
                );
            }
            Err(e) => {
                warn!(target: "client.session", peer_id = %from, error = %e, "Signal handling failed");
            }
        }
    }

    /// Offer to every roster member we have no session with, and
    /// renegotiate the ones we do (after a media change).
    fn connect_roster(&mut self) {
        let local_id = self.config.local_id.clone();
        let peers: Vec<ConnectionId> = self
            .state
            .participants()
            .iter()
            .map(|p| p.id.clone())
            .filter(|id| *id != local_id)
            .collect();

        for peer in peers {
            if self.engine.has_peer(&peer) {
                if let Err(e) = self.engine.renegotiate(&peer) {
                    warn!(target: "client.session", peer_id = %peer, error = %e, "Renegotiation failed");
                }
            } else {
                self.offer_to(&peer);
            }
        }
    }

    fn offer_to(&mut self, peer: &ConnectionId) {
        match self.engine.create_offer(peer) {
            Ok(()) => {}
            Err(NegotiationError::NoLocalMedia) => {
                // Listen-only: we answer their offers instead.
                debug!(target: "client.session", peer_id = %peer, "No local media, skipping offer");
            }
            Err(e) => {
                warn!(target: "client.session", peer_id = %peer, error = %e, "Offer failed");
            }
        }
    }

    fn emit(&self, event: ClientEvent) {
        if self.outbox.send(event).is_err() {
            warn!(target: "client.session", "Signaling outbox closed, event dropped");
        }
    }

    /// Close every transport and drop all meeting state.
    fn teardown(&mut self) {
        self.engine.close_all();
        self.state.clear();
        self.knocks.clear();
        self.sharing = false;
        self.cancel_token.cancel();
    }
}
