//! Per-peer negotiation state machines.
//!
//! The engine owns one [`PeerSession`] per remote participant and enforces
//! the signaling state machine over them: an offer is only accepted while
//! stable, an answer only while we have a local offer outstanding, and a
//! rejected signal leaves the session untouched. ICE candidates that arrive
//! before the remote description are queued and drained afterwards;
//! individual candidate failures are logged and swallowed.
//!
//! Degraded connections are healed by a single ICE restart per degradation,
//! issued only after the transport has stayed disconnected for the grace
//! period (transient blips recover on their own).

use crate::errors::NegotiationError;
use crate::peer::{
    PeerConnectionState, PeerPhase, PeerSession, SignalingState, TransportFactory,
};

use common::types::{ConnectionId, MeetingId};
use signal_protocol::{ClientEvent, IceCandidate, SignalKind, SignalPayload};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// How long a connection may stay degraded before an ICE restart is issued.
pub const DEFAULT_RESTART_GRACE: Duration = Duration::from_secs(2);

/// Drives WebRTC negotiation for every remote peer in one meeting.
pub struct PeerNegotiationEngine {
    meeting_id: MeetingId,
    factory: TransportFactory,
    /// Outgoing signaling events, consumed by the socket writer.
    outbox: mpsc::UnboundedSender<ClientEvent>,
    peers: HashMap<ConnectionId, PeerSession>,
    has_local_media: bool,
    restart_grace: Duration,
}

impl PeerNegotiationEngine {
    pub fn new(
        meeting_id: MeetingId,
        factory: TransportFactory,
        outbox: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        Self {
            meeting_id,
            factory,
            outbox,
            peers: HashMap::new(),
            has_local_media: false,
            restart_grace: DEFAULT_RESTART_GRACE,
        }
    }

    #[must_use]
    pub fn with_restart_grace(mut self, grace: Duration) -> Self {
        self.restart_grace = grace;
        self
    }

    /// Record whether local capture produced any media. Offers require it;
    /// without it the client participates listen-only and simply answers
    /// inbound offers.
    pub fn set_local_media(&mut self, available: bool) {
        self.has_local_media = available;
    }

    #[must_use]
    pub fn has_peer(&self, peer: &ConnectionId) -> bool {
        self.peers.contains_key(peer)
    }

    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn peers(&self) -> Vec<ConnectionId> {
        self.peers.keys().cloned().collect()
    }

    #[must_use]
    pub fn signaling_state(&self, peer: &ConnectionId) -> Option<SignalingState> {
        self.peers.get(peer).map(|session| session.signaling)
    }

    /// Open an outbound session toward `peer` and signal the offer.
    ///
    /// An existing session for the same peer is stale by definition (the
    /// peer reconnected under the same id) and is closed and replaced.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::NoLocalMedia`] when no local media is available,
    /// or a transport error from offer creation.
    pub fn create_offer(&mut self, peer: &ConnectionId) -> Result<(), NegotiationError> {
        if !self.has_local_media {
            return Err(NegotiationError::NoLocalMedia);
        }

        if let Some(mut stale) = self.peers.remove(peer) {
            debug!(target: "client.engine", peer_id = %peer, "Replacing stale peer session");
            stale.transport.close();
        }

        let mut session = PeerSession::new((self.factory)(peer), true);
        let offer = session.transport.create_offer()?;
        session.transport.set_local_description(&offer)?;
        session.signaling = SignalingState::HaveLocalOffer;
        self.peers.insert(peer.clone(), session);

        self.send_signal(peer, SignalPayload::from_sdp(offer))
    }

    /// Apply a signal received from `from`.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::InvalidTransition`] for an offer or answer the
    /// current signaling state does not permit (the session is untouched),
    /// [`NegotiationError::UnknownPeer`] for an answer or candidate with no
    /// session, or a transport error.
    pub fn handle_signal(
        &mut self,
        from: &ConnectionId,
        payload: SignalPayload,
    ) -> Result<(), NegotiationError> {
        match payload.classify() {
            SignalKind::Offer(offer) => {
                // A first offer creates the inbound session; a renegotiation
                // offer reuses the existing one.
                if !self.peers.contains_key(from) {
                    self.peers
                        .insert(from.clone(), PeerSession::new((self.factory)(from), false));
                }
                let Some(session) = self.peers.get_mut(from) else {
                    return Err(NegotiationError::UnknownPeer(from.clone()));
                };

                if session.signaling != SignalingState::Stable {
                    return Err(NegotiationError::InvalidTransition {
                        kind: "offer",
                        state: session.signaling.as_str(),
                    });
                }

                // Transition only after the transport has accepted the
                // description; on failure the session stays stable and a
                // corrected offer can still land.
                session.transport.set_remote_description(&offer)?;
                session.signaling = SignalingState::HaveRemoteOffer;
                session.remote_set = true;
                drain_candidates(session, from);

                let answer = session.transport.create_answer()?;
                session.transport.set_local_description(&answer)?;
                session.signaling = SignalingState::Stable;

                self.send_signal(from, SignalPayload::from_sdp(answer))
            }

            SignalKind::Answer(answer) => {
                let Some(session) = self.peers.get_mut(from) else {
                    return Err(NegotiationError::UnknownPeer(from.clone()));
                };

                if session.signaling != SignalingState::HaveLocalOffer {
                    return Err(NegotiationError::InvalidTransition {
                        kind: "answer",
                        state: session.signaling.as_str(),
                    });
                }

                session.transport.set_remote_description(&answer)?;
                session.remote_set = true;
                session.signaling = SignalingState::Stable;
                drain_candidates(session, from);
                Ok(())
            }

            SignalKind::Candidate(candidate) => {
                let Some(session) = self.peers.get_mut(from) else {
                    return Err(NegotiationError::UnknownPeer(from.clone()));
                };

                if session.remote_set {
                    apply_candidate(session, from, &candidate);
                } else {
                    session.pending_candidates.push(candidate);
                }
                Ok(())
            }

            SignalKind::Empty => {
                debug!(target: "client.engine", peer_id = %from, "Ignoring empty signal payload");
                Ok(())
            }
        }
    }

    /// Renegotiate with `peer` after local media changed.
    ///
    /// Only the initiating side renegotiates, and only while stable; in any
    /// other state this is a no-op (the in-flight exchange will settle with
    /// the new state anyway).
    ///
    /// # Errors
    ///
    /// A transport error from offer creation.
    pub fn renegotiate(&mut self, peer: &ConnectionId) -> Result<(), NegotiationError> {
        let Some(session) = self.peers.get_mut(peer) else {
            return Ok(());
        };
        if !session.locally_initiated || session.signaling != SignalingState::Stable {
            return Ok(());
        }

        let offer = session.transport.create_offer()?;
        session.transport.set_local_description(&offer)?;
        session.signaling = SignalingState::HaveLocalOffer;
        session.remote_set = false;
        self.send_signal(peer, SignalPayload::from_sdp(offer))
    }

    /// Close and drop the session for `peer`. Idempotent.
    pub fn close_connection(&mut self, peer: &ConnectionId) {
        if let Some(mut session) = self.peers.remove(peer) {
            session.phase = PeerPhase::Closed;
            session.transport.close();
            debug!(target: "client.engine", peer_id = %peer, "Peer session closed");
        }
    }

    /// Close every session; used on leave and kick.
    pub fn close_all(&mut self) {
        for (peer, mut session) in self.peers.drain() {
            session.phase = PeerPhase::Closed;
            session.transport.close();
            debug!(target: "client.engine", peer_id = %peer, "Peer session closed");
        }
    }

    /// Apply a mic mute change to every peer transport in one pass.
    pub fn set_mic_muted(&mut self, muted: bool) {
        for session in self.peers.values_mut() {
            session.transport.set_outbound_audio_enabled(!muted);
        }
    }

    /// Record a transport connection-state change for `peer`.
    pub fn connection_state_changed(
        &mut self,
        peer: &ConnectionId,
        state: PeerConnectionState,
        now: Instant,
    ) {
        let Some(session) = self.peers.get_mut(peer) else {
            return;
        };

        match state {
            PeerConnectionState::Connected => {
                session.phase = PeerPhase::Connected;
                session.degraded_since = None;
                session.restarted = false;
            }
            PeerConnectionState::Disconnected | PeerConnectionState::Failed => {
                if session.degraded_since.is_none() {
                    debug!(target: "client.engine", peer_id = %peer, "Peer connection degraded");
                    session.degraded_since = Some(now);
                }
            }
            PeerConnectionState::New
            | PeerConnectionState::Connecting
            | PeerConnectionState::Closed => {}
        }
    }

    /// Issue ICE restarts for peers degraded past the grace period.
    ///
    /// At most one restart per degradation; a connection that recovers
    /// (reports connected) re-arms.
    pub fn check_restarts(&mut self, now: Instant) {
        let mut restart_offers = Vec::new();

        for (peer, session) in &mut self.peers {
            let Some(since) = session.degraded_since else {
                continue;
            };
            if session.restarted || now.duration_since(since) < self.restart_grace {
                continue;
            }

            match session.transport.restart_ice() {
                Ok(offer) => {
                    if let Err(e) = session.transport.set_local_description(&offer) {
                        warn!(target: "client.engine", peer_id = %peer, error = %e, "ICE restart offer failed to apply");
                        continue;
                    }
                    session.signaling = SignalingState::HaveLocalOffer;
                    session.remote_set = false;
                    session.restarted = true;
                    restart_offers.push((peer.clone(), offer));
                }
                Err(e) => {
                    warn!(target: "client.engine", peer_id = %peer, error = %e, "ICE restart failed");
                    session.restarted = true;
                }
            }
        }

        for (peer, offer) in restart_offers {
            if let Err(e) = self.send_signal(&peer, SignalPayload::from_sdp(offer)) {
                warn!(target: "client.engine", peer_id = %peer, error = %e, "Failed to signal ICE restart");
            }
        }
    }

    fn send_signal(
        &self,
        to: &ConnectionId,
        data: SignalPayload,
    ) -> Result<(), NegotiationError> {
        self.outbox
            .send(ClientEvent::Signal {
                meeting_id: self.meeting_id.clone(),
                to: to.clone(),
                data,
            })
            .map_err(|_| NegotiationError::OutboxClosed)
    }
}

/// Flush candidates queued before the remote description landed.
fn drain_candidates(session: &mut PeerSession, peer: &ConnectionId) {
    for candidate in std::mem::take(&mut session.pending_candidates) {
        apply_candidate(session, peer, &candidate);
    }
}

/// Candidate failures are non-fatal: one bad candidate must not abort the
/// connection when others may still succeed.
fn apply_candidate(session: &mut PeerSession, peer: &ConnectionId, candidate: &IceCandidate) {
    if let Err(e) = session.transport.add_ice_candidate(candidate) {
        warn!(target: "client.engine", peer_id = %peer, error = %e, "Failed to add ICE candidate");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use signal_protocol::{SdpType, SessionDescription};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        CreateOffer,
        CreateAnswer,
        SetLocal(SdpType),
        SetRemote(SdpType),
        AddCandidate(String),
        RestartIce,
        AudioEnabled(bool),
        Close,
    }

    #[derive(Default)]
    struct FakeTransport {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_candidates: bool,
        fail_first_remote: bool,
    }

    impl FakeTransport {
        fn log(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl crate::peer::PeerTransport for FakeTransport {
        fn create_offer(&mut self) -> Result<SessionDescription, NegotiationError> {
            self.log(Call::CreateOffer);
            Ok(SessionDescription::offer("v=0 offer"))
        }

        fn create_answer(&mut self) -> Result<SessionDescription, NegotiationError> {
            self.log(Call::CreateAnswer);
            Ok(SessionDescription::answer("v=0 answer"))
        }

        fn set_local_description(
            &mut self,
            desc: &SessionDescription,
        ) -> Result<(), NegotiationError> {
            self.log(Call::SetLocal(desc.kind));
            Ok(())
        }

        fn set_remote_description(
            &mut self,
            desc: &SessionDescription,
        ) -> Result<(), NegotiationError> {
            self.log(Call::SetRemote(desc.kind));
            if self.fail_first_remote {
                self.fail_first_remote = false;
                return Err(NegotiationError::Transport("sdp parse failed".to_string()));
            }
            Ok(())
        }

        fn add_ice_candidate(&mut self, candidate: &IceCandidate) -> Result<(), NegotiationError> {
            self.log(Call::AddCandidate(candidate.candidate.clone()));
            if self.fail_candidates {
                return Err(NegotiationError::Transport("bad candidate".to_string()));
            }
            Ok(())
        }

        fn restart_ice(&mut self) -> Result<SessionDescription, NegotiationError> {
            self.log(Call::RestartIce);
            Ok(SessionDescription::offer("v=0 restart"))
        }

        fn set_outbound_audio_enabled(&mut self, enabled: bool) {
            self.log(Call::AudioEnabled(enabled));
        }

        fn close(&mut self) {
            self.log(Call::Close);
        }
    }

    struct Harness {
        engine: PeerNegotiationEngine,
        outbox_rx: mpsc::UnboundedReceiver<ClientEvent>,
        /// Call logs per constructed transport, in construction order.
        logs: Arc<Mutex<Vec<Arc<Mutex<Vec<Call>>>>>>,
    }

    impl Harness {
        fn new() -> Self {
            Self::build(false, false)
        }

        fn with_failing_candidates(fail_candidates: bool) -> Self {
            Self::build(fail_candidates, false)
        }

        fn with_failing_first_remote() -> Self {
            Self::build(false, true)
        }

        fn build(fail_candidates: bool, fail_first_remote: bool) -> Self {
            let logs: Arc<Mutex<Vec<Arc<Mutex<Vec<Call>>>>>> = Arc::default();
            let factory_logs = Arc::clone(&logs);
            let factory: TransportFactory = Box::new(move |_peer| {
                let calls = Arc::new(Mutex::new(Vec::new()));
                factory_logs.lock().unwrap().push(Arc::clone(&calls));
                Box::new(FakeTransport {
                    calls,
                    fail_candidates,
                    fail_first_remote,
                })
            });

            let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
            let mut engine =
                PeerNegotiationEngine::new(MeetingId::new("m"), factory, outbox_tx);
            engine.set_local_media(true);

            Self {
                engine,
                outbox_rx,
                logs,
            }
        }

        fn calls(&self, transport_index: usize) -> Vec<Call> {
            self.logs.lock().unwrap()[transport_index]
                .lock()
                .unwrap()
                .clone()
        }

        fn next_signal(&mut self) -> SignalPayload {
            match self.outbox_rx.try_recv().expect("expected outgoing event") {
                ClientEvent::Signal { data, .. } => data,
                other => unreachable!("expected signal, got {other:?}"),
            }
        }
    }

    fn peer(id: &str) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[tokio::test]
    async fn create_offer_requires_local_media() {
        let mut harness = Harness::new();
        harness.engine.set_local_media(false);

        let result = harness.engine.create_offer(&peer("p"));
        assert!(matches!(result, Err(NegotiationError::NoLocalMedia)));
        assert_eq!(harness.engine.peer_count(), 0);
    }

    #[tokio::test]
    async fn create_offer_signals_and_enters_have_local_offer() {
        let mut harness = Harness::new();
        harness.engine.create_offer(&peer("p")).unwrap();

        assert_eq!(
            harness.engine.signaling_state(&peer("p")),
            Some(SignalingState::HaveLocalOffer)
        );
        let signal = harness.next_signal();
        assert_eq!(signal.sdp.unwrap().kind, SdpType::Offer);
        assert_eq!(
            harness.calls(0),
            vec![Call::CreateOffer, Call::SetLocal(SdpType::Offer)]
        );
    }

    #[tokio::test]
    async fn repeated_offer_replaces_stale_session() {
        let mut harness = Harness::new();
        harness.engine.create_offer(&peer("p")).unwrap();
        harness.engine.create_offer(&peer("p")).unwrap();

        assert_eq!(harness.engine.peer_count(), 1);
        // First transport was closed when the second took over.
        assert!(harness.calls(0).contains(&Call::Close));
        assert!(!harness.calls(1).contains(&Call::Close));
    }

    #[tokio::test]
    async fn inbound_offer_produces_answer() {
        let mut harness = Harness::new();
        harness
            .engine
            .handle_signal(
                &peer("p"),
                SignalPayload::from_sdp(SessionDescription::offer("v=0")),
            )
            .unwrap();

        assert_eq!(
            harness.engine.signaling_state(&peer("p")),
            Some(SignalingState::Stable)
        );
        let signal = harness.next_signal();
        assert_eq!(signal.sdp.unwrap().kind, SdpType::Answer);
    }

    #[tokio::test]
    async fn answer_in_stable_is_rejected_without_mutation() {
        let mut harness = Harness::new();
        // Establish a stable session via a full exchange.
        harness.engine.create_offer(&peer("p")).unwrap();
        harness
            .engine
            .handle_signal(
                &peer("p"),
                SignalPayload::from_sdp(SessionDescription::answer("v=0")),
            )
            .unwrap();
        let calls_before = harness.calls(0);

        // Stale duplicate answer: typed rejection, session untouched.
        let result = harness.engine.handle_signal(
            &peer("p"),
            SignalPayload::from_sdp(SessionDescription::answer("v=0 dup")),
        );
        assert!(matches!(
            result,
            Err(NegotiationError::InvalidTransition {
                kind: "answer",
                state: "stable"
            })
        ));
        assert_eq!(
            harness.engine.signaling_state(&peer("p")),
            Some(SignalingState::Stable)
        );
        assert_eq!(harness.calls(0), calls_before);
    }

    #[tokio::test]
    async fn failed_remote_offer_leaves_session_stable_for_retry() {
        let mut harness = Harness::with_failing_first_remote();

        let result = harness.engine.handle_signal(
            &peer("p"),
            SignalPayload::from_sdp(SessionDescription::offer("v=0 bad")),
        );
        assert!(matches!(result, Err(NegotiationError::Transport(_))));
        assert_eq!(
            harness.engine.signaling_state(&peer("p")),
            Some(SignalingState::Stable)
        );

        // A corrected offer from the same peer is accepted and answered.
        harness
            .engine
            .handle_signal(
                &peer("p"),
                SignalPayload::from_sdp(SessionDescription::offer("v=0 good")),
            )
            .unwrap();
        assert_eq!(harness.next_signal().sdp.unwrap().kind, SdpType::Answer);
    }

    #[tokio::test]
    async fn offer_glare_is_rejected() {
        let mut harness = Harness::new();
        harness.engine.create_offer(&peer("p")).unwrap();

        let result = harness.engine.handle_signal(
            &peer("p"),
            SignalPayload::from_sdp(SessionDescription::offer("v=0 glare")),
        );
        assert!(matches!(
            result,
            Err(NegotiationError::InvalidTransition {
                kind: "offer",
                state: "have-local-offer"
            })
        ));
    }

    #[tokio::test]
    async fn answer_for_unknown_peer_is_rejected() {
        let mut harness = Harness::new();
        let result = harness.engine.handle_signal(
            &peer("ghost"),
            SignalPayload::from_sdp(SessionDescription::answer("v=0")),
        );
        assert!(matches!(result, Err(NegotiationError::UnknownPeer(_))));
    }

    #[tokio::test]
    async fn early_candidates_are_queued_until_remote_description() {
        let mut harness = Harness::new();
        harness.engine.create_offer(&peer("p")).unwrap();

        for n in 0..2 {
            harness
                .engine
                .handle_signal(
                    &peer("p"),
                    SignalPayload::from_candidate(IceCandidate {
                        candidate: format!("candidate:{n}"),
                        sdp_mid: Some("0".to_string()),
                        sdp_m_line_index: Some(0),
                    }),
                )
                .unwrap();
        }
        // Not applied yet.
        assert!(!harness
            .calls(0)
            .iter()
            .any(|c| matches!(c, Call::AddCandidate(_))));

        harness
            .engine
            .handle_signal(
                &peer("p"),
                SignalPayload::from_sdp(SessionDescription::answer("v=0")),
            )
            .unwrap();

        let applied: Vec<_> = harness
            .calls(0)
            .into_iter()
            .filter(|c| matches!(c, Call::AddCandidate(_)))
            .collect();
        assert_eq!(
            applied,
            vec![
                Call::AddCandidate("candidate:0".to_string()),
                Call::AddCandidate("candidate:1".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn candidate_failure_is_not_fatal() {
        let mut harness = Harness::with_failing_candidates(true);
        harness
            .engine
            .handle_signal(
                &peer("p"),
                SignalPayload::from_sdp(SessionDescription::offer("v=0")),
            )
            .unwrap();

        let result = harness.engine.handle_signal(
            &peer("p"),
            SignalPayload::from_candidate(IceCandidate {
                candidate: "candidate:bad".to_string(),
                sdp_mid: None,
                sdp_m_line_index: None,
            }),
        );
        assert!(result.is_ok());
        assert!(harness.engine.has_peer(&peer("p")));
    }

    #[tokio::test]
    async fn mute_fans_out_to_every_transport() {
        let mut harness = Harness::new();
        harness.engine.create_offer(&peer("a")).unwrap();
        harness.engine.create_offer(&peer("b")).unwrap();

        harness.engine.set_mic_muted(true);
        for i in 0..2 {
            let audio: Vec<_> = harness
                .calls(i)
                .into_iter()
                .filter(|c| matches!(c, Call::AudioEnabled(_)))
                .collect();
            assert_eq!(audio, vec![Call::AudioEnabled(false)]);
        }

        harness.engine.set_mic_muted(false);
        assert!(harness.calls(0).contains(&Call::AudioEnabled(true)));
    }

    #[tokio::test]
    async fn renegotiate_only_when_initiator_and_stable() {
        let mut harness = Harness::new();
        // Inbound session: we are not the initiator.
        harness
            .engine
            .handle_signal(
                &peer("in"),
                SignalPayload::from_sdp(SessionDescription::offer("v=0")),
            )
            .unwrap();
        harness.next_signal(); // answer
        harness.engine.renegotiate(&peer("in")).unwrap();
        assert!(harness.outbox_rx.try_recv().is_err());

        // Outbound and stable: renegotiation goes out.
        harness.engine.create_offer(&peer("out")).unwrap();
        harness.next_signal();
        harness
            .engine
            .handle_signal(
                &peer("out"),
                SignalPayload::from_sdp(SessionDescription::answer("v=0")),
            )
            .unwrap();
        harness.engine.renegotiate(&peer("out")).unwrap();
        assert_eq!(
            harness.engine.signaling_state(&peer("out")),
            Some(SignalingState::HaveLocalOffer)
        );
        assert_eq!(harness.next_signal().sdp.unwrap().kind, SdpType::Offer);
    }

    #[tokio::test]
    async fn close_connection_is_idempotent() {
        let mut harness = Harness::new();
        harness.engine.create_offer(&peer("p")).unwrap();

        harness.engine.close_connection(&peer("p"));
        harness.engine.close_connection(&peer("p"));

        assert_eq!(harness.engine.peer_count(), 0);
        let closes = harness
            .calls(0)
            .into_iter()
            .filter(|c| *c == Call::Close)
            .count();
        assert_eq!(closes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ice_restart_waits_for_grace_period() {
        let mut harness = Harness::new();
        harness.engine.create_offer(&peer("p")).unwrap();
        harness
            .engine
            .handle_signal(
                &peer("p"),
                SignalPayload::from_sdp(SessionDescription::answer("v=0")),
            )
            .unwrap();
        harness.next_signal();

        harness.engine.connection_state_changed(
            &peer("p"),
            PeerConnectionState::Disconnected,
            Instant::now(),
        );

        // Within the grace period: no restart yet.
        tokio::time::advance(Duration::from_secs(1)).await;
        harness.engine.check_restarts(Instant::now());
        assert!(!harness.calls(0).contains(&Call::RestartIce));

        // Past the grace period: exactly one restart.
        tokio::time::advance(Duration::from_millis(1100)).await;
        harness.engine.check_restarts(Instant::now());
        assert!(harness.calls(0).contains(&Call::RestartIce));
        assert_eq!(
            harness.engine.signaling_state(&peer("p")),
            Some(SignalingState::HaveLocalOffer)
        );
        assert_eq!(harness.next_signal().sdp.unwrap().kind, SdpType::Offer);

        // Still degraded: no second restart for the same degradation.
        tokio::time::advance(Duration::from_secs(10)).await;
        harness.engine.check_restarts(Instant::now());
        let restarts = harness
            .calls(0)
            .into_iter()
            .filter(|c| *c == Call::RestartIce)
            .count();
        assert_eq!(restarts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_rearms_the_restart() {
        let mut harness = Harness::new();
        harness.engine.create_offer(&peer("p")).unwrap();
        harness
            .engine
            .handle_signal(
                &peer("p"),
                SignalPayload::from_sdp(SessionDescription::answer("v=0")),
            )
            .unwrap();

        harness.engine.connection_state_changed(
            &peer("p"),
            PeerConnectionState::Failed,
            Instant::now(),
        );
        tokio::time::advance(Duration::from_secs(3)).await;
        harness.engine.check_restarts(Instant::now());

        // Recovered, then degraded again: a second restart is allowed.
        harness.engine.connection_state_changed(
            &peer("p"),
            PeerConnectionState::Connected,
            Instant::now(),
        );
        harness
            .engine
            .handle_signal(
                &peer("p"),
                SignalPayload::from_sdp(SessionDescription::answer("v=0 restart")),
            )
            .unwrap();
        harness.engine.connection_state_changed(
            &peer("p"),
            PeerConnectionState::Disconnected,
            Instant::now(),
        );
        tokio::time::advance(Duration::from_secs(3)).await;
        harness.engine.check_restarts(Instant::now());

        let restarts = harness
            .calls(0)
            .into_iter()
            .filter(|c| *c == Call::RestartIce)
            .count();
        assert_eq!(restarts, 2);
    }
}
