use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::channel::ManagedChannel;
use crate::connection::candidate_queue::CandidateQueue;
use crate::connection::connection::Shared;
use crate::connection::connection_command::{ConnectionCommand, Reply};
use crate::connection::connection_config::{ConnectionConfig, ConnectionOptions, Politeness};
use crate::connection::control_channel::{ControlChannels, ControlSide};
use crate::connection::timers::{TimerFired, TimerKind, Timers};
use crate::events::{ConnectionEvent, RemoteTrack, stream_key};
use crate::transport::{
    Connectivity, LocalTrack, NativeSignalingState, RawChannel, RawChannelId, Transport,
    TransportEvent, TransportEventSink, TransportFactory,
};
use parley_core::utils::{CONTROL_CHANNEL_PREFIX, is_control_label};
use parley_core::{
    CloseReason, ControlMessage, Error, IceCandidate, IdGenerator, Payload, Result, SdpType,
    SessionDescription, SignalingState,
};

/// The task that owns one connection.
///
/// Transport events, handle commands and timer firings are processed one at a
/// time, each to completion. Transport events win ties so everything an
/// operation triggered is observed before the next command runs.
pub(crate) struct ConnectionActor {
    config: ConnectionConfig,
    ids: Arc<dyn IdGenerator>,
    transports: Arc<dyn TransportFactory>,
    shared: Arc<Shared>,

    command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    transport_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    transport_rx: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
    timer_rx: mpsc::UnboundedReceiver<TimerFired>,
    timers: Timers,

    transport: Option<Arc<dyn Transport>>,
    /// Bumped on every teardown and every new transport; older events are dropped.
    generation: u64,

    state: SignalingState,
    polite: Option<bool>,
    can_renegotiate: bool,
    has_local_description: bool,
    ice_connected: bool,
    /// Set once the current transport reached `complete`; roles are settled from then on.
    established: bool,
    permanently_closed: bool,
    ping: Option<Duration>,

    candidates: Vec<IceCandidate>,
    all_candidates_reported: bool,
    queued_candidates: CandidateQueue,
    local_offer: Option<SessionDescription>,

    control: ControlChannels,
    channels_by_raw: HashMap<RawChannelId, ManagedChannel>,
    local_channels: Vec<ManagedChannel>,
    remote_channels: Vec<ManagedChannel>,
    tracks: Vec<LocalTrack>,
    warned_candidate_errors: bool,
}

impl ConnectionActor {
    pub fn new(
        options: ConnectionOptions,
        command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        shared: Arc<Shared>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let polite = options.config.politeness.fixed();

        Self {
            config: options.config,
            ids: options.ids,
            transports: options.transports,
            shared,
            command_rx,
            transport_tx,
            transport_rx,
            timer_rx,
            timers: Timers::new(timer_tx),
            transport: None,
            generation: 0,
            state: SignalingState::Closed,
            polite,
            can_renegotiate: false,
            has_local_description: false,
            ice_connected: false,
            established: false,
            permanently_closed: false,
            ping: None,
            candidates: Vec::new(),
            all_candidates_reported: false,
            queued_candidates: CandidateQueue::default(),
            local_offer: None,
            control: ControlChannels::default(),
            channels_by_raw: HashMap::new(),
            local_channels: Vec::new(),
            remote_channels: Vec::new(),
            tracks: Vec::new(),
            warned_candidate_errors: false,
        }
    }

    pub async fn run(mut self) {
        debug!("Connection task started");

        loop {
            tokio::select! {
                biased;

                Some((generation, event)) = self.transport_rx.recv() => {
                    if generation == self.generation {
                        self.handle_transport_event(event).await;
                    } else {
                        trace!("Dropping {:?} from replaced transport #{}", event, generation);
                    }
                }

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        debug!("Every connection handle is gone. Shutting down.");
                        break;
                    };
                    self.handle_command(cmd).await;
                }

                Some(fired) = self.timer_rx.recv() => {
                    if let Some(kind) = self.timers.accept(fired) {
                        self.handle_timer(kind).await;
                    }
                }
            }

            self.publish();
        }

        self.teardown().await;
        debug!("Connection task finished");
    }

    async fn handle_command(&mut self, cmd: ConnectionCommand) {
        match cmd {
            ConnectionCommand::Init { reply } => {
                let res = self.init().await;
                self.respond(reply, res);
            }
            ConnectionCommand::Offer { renegotiate, reply } => {
                let res = self.offer(renegotiate).await;
                self.respond(reply, res);
            }
            ConnectionCommand::ReceiveOffer { offer, reply } => {
                let res = self.receive_offer(offer).await;
                self.respond(reply, res);
            }
            ConnectionCommand::ReceiveAnswer { answer, reply } => {
                let res = self.receive_answer(answer).await;
                self.respond(reply, res);
            }
            ConnectionCommand::ReceiveIceCandidate { candidate, reply } => {
                let res = self.receive_ice_candidate(candidate).await;
                self.respond(reply, res);
            }
            ConnectionCommand::CreateChannel { label, reply } => {
                let res = self.create_channel(label).await;
                self.respond(reply, res);
            }
            ConnectionCommand::AddTrack { track, reply } => {
                let res = self.add_track(track).await;
                self.respond(reply, res);
            }
            ConnectionCommand::RemoveTrack { track_id, reply } => {
                let res = self.remove_track(&track_id).await;
                self.respond(reply, res);
            }
            ConnectionCommand::AddStream { tracks, reply } => {
                let res = self.add_stream(tracks).await;
                self.respond(reply, res);
            }
            ConnectionCommand::RemoveStream { stream_id, reply } => {
                let res = self.remove_stream(&stream_id).await;
                self.respond(reply, res);
            }
            ConnectionCommand::Close { reply } => {
                let res = self.close().await;
                self.respond(reply, res);
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::CandidateDiscovered(candidate) => self.on_local_candidate(candidate),

            TransportEvent::CandidateGatheringComplete => self.report_all_candidates(),

            TransportEvent::CandidateError(e) => {
                error!(
                    "STUN/TURN server error from {:?}: {} {}",
                    e.url,
                    e.error_code.unwrap_or_default(),
                    e.error_text.as_deref().unwrap_or("")
                );
                self.emit(ConnectionEvent::CandidateError(e));
            }

            TransportEvent::ChannelArrived(raw) => self.on_channel_arrived(raw),

            TransportEvent::ChannelOpened(id) => self.on_channel_opened(id),

            TransportEvent::ChannelMessage(id, payload) => self.on_channel_message(id, payload).await,

            TransportEvent::ChannelClosed(id) => self.on_channel_closed(id).await,

            TransportEvent::ChannelError(id, e) => {
                warn!("Data channel {} reported an error: {}", id, e);
            }

            TransportEvent::ConnectivityChanged(connectivity) => {
                self.on_connectivity(connectivity).await
            }

            TransportEvent::SignalingChanged(native) => self.apply_native_state(native).await,

            TransportEvent::NegotiationNeeded => self.on_negotiation_needed().await,

            TransportEvent::TrackAdded(track) => {
                let stream_id = stream_key(&track.stream_id(), &track.id());
                info!("Remote track {} added to stream {}", track.id(), stream_id);
                self.emit(ConnectionEvent::StreamAdded {
                    stream_id,
                    track: RemoteTrack(track),
                });
            }
        }
    }

    async fn handle_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::PingInterval => {
                if self.control.local_is_open() {
                    self.send_ping();
                } else {
                    self.drop_session(CloseReason::ControlChannelClosed).await;
                }
            }
            TimerKind::DisconnectTimeout => {
                warn!(
                    "No pong within {:?}, dropping the session",
                    self.config.disconnect_timeout
                );
                self.drop_session(CloseReason::KeepaliveTimeout).await;
            }
            TimerKind::ConnectTimeout => {
                warn!(
                    "Not connected within {:?} of applying the answer",
                    self.config.connect_timeout
                );
                self.drop_session(CloseReason::ConnectTimeout).await;
            }
            TimerKind::Reconnect => self.reconnect().await,
        }
    }

    // ---- application operations ----

    async fn init(&mut self) -> Result<()> {
        if !matches!(
            self.state,
            SignalingState::Closed | SignalingState::Reconnecting
        ) {
            return Err(Error::AlreadyOpen);
        }

        self.timers.cancel(TimerKind::Reconnect);
        self.permanently_closed = false;
        self.open_transport().await?;
        self.set_state(SignalingState::AwaitingOffer, None, false);
        Ok(())
    }

    async fn offer(&mut self, renegotiate: bool) -> Result<()> {
        let transport = self.require_transport("offer")?;
        let first = self.state == SignalingState::AwaitingOffer;

        if !first {
            if !renegotiate || !self.can_renegotiate {
                return Err(Error::InvalidState {
                    operation: "offer",
                    state: self.state,
                });
            }
            if self.polite == Some(true) {
                if !self.control.relay(&ControlMessage::Negotiate) {
                    return Err(Error::InvalidState {
                        operation: "offer",
                        state: self.state,
                    });
                }
                debug!("Asked the impolite peer to renegotiate");
                return Ok(());
            }
        }

        if first && self.config.politeness == Politeness::FirstOfferer {
            self.polite = Some(false);
        }
        self.candidates.clear();
        self.all_candidates_reported = false;
        self.bind_local_channels(&transport).await?;

        let was_renegotiable = self.can_renegotiate;
        self.can_renegotiate = false;
        let offer = match make_offer(&transport, renegotiate && !first).await {
            Ok(offer) => offer,
            Err(e) => {
                self.can_renegotiate = was_renegotiable;
                return Err(e.into());
            }
        };

        self.has_local_description = true;
        self.local_offer = Some(offer.clone());
        self.apply_native_state(NativeSignalingState::HaveLocalOffer).await;

        info!(renegotiate, "Offer created");
        if !self.control.relay(&ControlMessage::Signal(offer.clone())) {
            self.emit(ConnectionEvent::OfferReady(offer));
        }
        Ok(())
    }

    async fn receive_offer(&mut self, offer: SessionDescription) -> Result<()> {
        offer.expect_type(SdpType::Offer)?;
        let mut transport = self.require_transport("receive_offer")?;

        if self.state == SignalingState::AwaitingAnswer {
            if !self.yields_to(&offer) {
                info!("Ignoring colliding offer, our own offer stands");
                return Ok(());
            }
            info!("Offer collision, discarding our offer to answer the peer");
            transport = self.replace_transport().await?;
        }

        if !self.has_local_description && self.config.politeness == Politeness::FirstOfferer {
            self.polite = Some(true);
        }
        self.candidates.clear();
        self.all_candidates_reported = false;
        self.bind_local_channels(&transport).await?;

        let was_renegotiable = self.can_renegotiate;
        self.can_renegotiate = false;
        if let Err(e) = transport.set_remote_description(offer).await {
            self.can_renegotiate = was_renegotiable;
            return Err(e.into());
        }
        self.apply_native_state(NativeSignalingState::HaveRemoteOffer).await;

        let answer = match make_answer(&transport).await {
            Ok(answer) => answer,
            Err(e) => {
                self.can_renegotiate = was_renegotiable;
                return Err(e.into());
            }
        };
        self.has_local_description = true;
        self.can_renegotiate = true;
        self.apply_native_state(NativeSignalingState::Stable).await;
        if self.state != SignalingState::Complete {
            self.timers
                .schedule(TimerKind::ConnectTimeout, self.config.connect_timeout);
        }

        info!("Answer created");
        if !self.control.relay(&ControlMessage::Signal(answer.clone())) {
            self.emit(ConnectionEvent::AnswerReady(answer));
        }
        Ok(())
    }

    async fn receive_answer(&mut self, answer: SessionDescription) -> Result<()> {
        answer.expect_type(SdpType::Answer)?;
        let transport = self.require_transport("receive_answer")?;

        if !matches!(
            self.state,
            SignalingState::AwaitingAnswer | SignalingState::Complete
        ) {
            return Err(Error::InvalidState {
                operation: "receive_answer",
                state: self.state,
            });
        }

        transport.set_remote_description(answer).await?;
        self.local_offer = None;
        self.can_renegotiate = true;
        self.apply_native_state(NativeSignalingState::Stable).await;
        if self.state != SignalingState::Complete {
            self.timers
                .schedule(TimerKind::ConnectTimeout, self.config.connect_timeout);
        }
        Ok(())
    }

    async fn receive_ice_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        if self.permanently_closed {
            return Err(Error::AlreadyClosed);
        }

        if self.state.accepts_candidates()
            && let Some(transport) = self.transport.clone()
        {
            self.flush_candidates().await;
            transport.add_ice_candidate(candidate).await?;
            return Ok(());
        }

        self.queued_candidates.push(candidate);
        debug!(
            "Queued remote candidate ({} pending)",
            self.queued_candidates.len()
        );
        Ok(())
    }

    async fn create_channel(&mut self, label: Option<String>) -> Result<ManagedChannel> {
        if self.permanently_closed {
            return Err(Error::AlreadyClosed);
        }
        if self.state == SignalingState::Closed {
            return Err(Error::NotInitialized);
        }

        let label = label.unwrap_or_else(|| self.ids.next_id());
        if is_control_label(&label) {
            return Err(Error::ReservedLabel(label));
        }
        if let Some(existing) = self
            .local_channels
            .iter()
            .find(|c| c.label() == label && !c.is_permanently_closed())
        {
            return Ok(existing.clone());
        }

        let channel = ManagedChannel::new(label.as_str(), false);
        if let Some(transport) = self.transport.clone() {
            let raw = transport.create_channel(&label).await?;
            self.channels_by_raw.insert(raw.id(), channel.clone());
            channel.bind(raw);
        }
        self.local_channels.retain(|c| c.label() != label);
        self.local_channels.push(channel.clone());

        info!("Local channel '{}' created", label);
        self.emit(ConnectionEvent::ChannelOpened {
            channel: channel.clone(),
            remote: false,
        });
        Ok(channel)
    }

    async fn add_track(&mut self, track: LocalTrack) -> Result<()> {
        let transport = self.require_transport("add_track")?;
        transport.add_track(track.clone()).await?;
        self.tracks.retain(|t| t.id() != track.id());
        self.tracks.push(track);
        Ok(())
    }

    async fn remove_track(&mut self, track_id: &str) -> Result<()> {
        let transport = self.require_transport("remove_track")?;
        self.tracks.retain(|t| t.id() != track_id);
        transport.remove_track(track_id).await?;
        Ok(())
    }

    async fn add_stream(&mut self, tracks: Vec<LocalTrack>) -> Result<()> {
        for track in tracks {
            self.add_track(track).await?;
        }
        Ok(())
    }

    async fn remove_stream(&mut self, stream_id: &str) -> Result<()> {
        self.require_transport("remove_stream")?;
        let track_ids: Vec<String> = self
            .tracks
            .iter()
            .filter(|t| t.stream_id() == stream_id)
            .map(|t| t.id().to_owned())
            .collect();

        for track_id in track_ids {
            self.remove_track(&track_id).await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.state == SignalingState::Closed {
            self.timers.cancel_all();
            self.permanently_closed = true;
            return Ok(());
        }

        info!("Closing connection");
        self.permanently_closed = true;
        self.teardown().await;
        self.set_state(SignalingState::Closed, Some(CloseReason::Explicit), false);
        Ok(())
    }

    // ---- state machine ----

    fn set_state(&mut self, state: SignalingState, reason: Option<CloseReason>, fatal: bool) {
        if self.state == state {
            return;
        }
        info!("Signaling state {} -> {}", self.state, state);
        self.state = state;
        self.emit(ConnectionEvent::SignalingStateChanged {
            state,
            reason,
            fatal,
        });
    }

    async fn apply_native_state(&mut self, native: NativeSignalingState) {
        match native {
            NativeSignalingState::Stable => {
                if self.ice_connected {
                    self.mark_complete().await;
                } else if self.has_local_description {
                    self.set_state(SignalingState::Negotiating, None, false);
                    self.flush_candidates().await;
                } else {
                    self.set_state(SignalingState::AwaitingOffer, None, false);
                }
            }
            NativeSignalingState::HaveLocalOffer => {
                self.set_state(SignalingState::AwaitingAnswer, None, false);
            }
            NativeSignalingState::HaveRemoteOffer
            | NativeSignalingState::HaveLocalPranswer
            | NativeSignalingState::HaveRemotePranswer => {
                self.set_state(SignalingState::Negotiating, None, false);
                self.flush_candidates().await;
            }
            NativeSignalingState::Closed => {
                self.drop_session(CloseReason::TransportClosed).await;
            }
        }
    }

    async fn on_connectivity(&mut self, connectivity: Connectivity) {
        debug!("ICE connectivity: {:?}", connectivity);
        match connectivity {
            Connectivity::Connected | Connectivity::Completed => {
                self.ice_connected = true;
                if connectivity == Connectivity::Completed {
                    self.report_all_candidates();
                }
                self.mark_complete().await;
            }
            Connectivity::New | Connectivity::Checking => self.ice_connected = false,
            Connectivity::Failed => self.drop_session(CloseReason::IceFailed).await,
            Connectivity::Disconnected | Connectivity::Closed => {
                self.drop_session(CloseReason::TransportClosed).await;
            }
        }
    }

    async fn mark_complete(&mut self) {
        self.timers.cancel(TimerKind::ConnectTimeout);
        self.established = true;
        self.set_state(SignalingState::Complete, None, false);
        self.flush_candidates().await;
    }

    async fn flush_candidates(&mut self) {
        if self.queued_candidates.is_empty() || !self.state.accepts_candidates() {
            return;
        }
        let Some(transport) = self.transport.clone() else {
            return;
        };

        let pending = self.queued_candidates.drain();
        debug!("Applying {} queued remote candidates", pending.len());
        for candidate in pending {
            if let Err(e) = transport.add_ice_candidate(candidate).await {
                warn!("Queued remote candidate rejected: {:#}", e);
            }
        }
    }

    fn on_local_candidate(&mut self, candidate: IceCandidate) {
        self.candidates.push(candidate.clone());
        if !self
            .control
            .relay(&ControlMessage::Candidate(candidate.clone()))
        {
            self.emit(ConnectionEvent::CandidateDiscovered(candidate));
        }
    }

    fn report_all_candidates(&mut self) {
        if self.all_candidates_reported {
            return;
        }
        self.all_candidates_reported = true;
        debug!("Gathered {} local candidates", self.candidates.len());
        self.emit(ConnectionEvent::AllCandidatesDiscovered(
            self.candidates.clone(),
        ));
    }

    /// Decides an offer collision. A settled role wins; on first contact with
    /// no fixed role both sides hold an unanswered offer, so the one with the
    /// smaller offer yields.
    fn yields_to(&mut self, remote_offer: &SessionDescription) -> bool {
        if let Some(polite) = self.config.politeness.fixed() {
            return polite;
        }
        if self.established
            && let Some(polite) = self.polite
        {
            return polite;
        }

        let polite = self
            .local_offer
            .as_ref()
            .is_none_or(|local| local.sdp < remote_offer.sdp);
        self.polite = Some(polite);
        polite
    }

    async fn on_negotiation_needed(&mut self) {
        self.emit(ConnectionEvent::NegotiationNeeded);
        if !self.config.auto_renegotiate {
            debug!("Negotiation needed, left to the application");
            return;
        }
        if !self.has_local_description || self.state != SignalingState::Complete {
            debug!("Negotiation needed before the session is up; ignored");
            return;
        }

        if self.polite == Some(true) {
            if !self.control.relay(&ControlMessage::Negotiate) {
                warn!("Renegotiation needed but no control channel is open");
            }
            return;
        }

        if !self.can_renegotiate {
            debug!("Renegotiation already in flight");
            return;
        }
        if let Err(e) = self.offer(true).await {
            warn!("Renegotiation failed: {}", e);
        }
    }

    async fn on_negotiate_request(&mut self) {
        if self.polite == Some(true) {
            warn!("Ignoring negotiate request, only the impolite side offers on request");
            return;
        }
        if self.state != SignalingState::Complete || !self.can_renegotiate {
            debug!("Negotiate request coalesced into the negotiation in flight");
            return;
        }
        if let Err(e) = self.offer(true).await {
            warn!("Requested renegotiation failed: {}", e);
        }
    }

    // ---- channels ----

    fn on_channel_arrived(&mut self, raw: Arc<dyn RawChannel>) {
        if is_control_label(raw.label()) {
            if self.control.attach_remote(raw.clone()) {
                debug!("Remote control channel '{}' attached", raw.label());
            } else {
                warn!("Ignoring extra remote control channel '{}'", raw.label());
            }
            return;
        }

        let label = raw.label().to_owned();
        let existing = self
            .remote_channels
            .iter()
            .find(|c| c.label() == label && !c.is_permanently_closed())
            .cloned();

        let (channel, fresh) = match existing {
            Some(channel) => (channel, false),
            None => {
                self.remote_channels.retain(|c| c.label() != label);
                let channel = ManagedChannel::new(label.as_str(), true);
                self.remote_channels.push(channel.clone());
                (channel, true)
            }
        };

        if let Some(old) = channel.raw_id() {
            self.channels_by_raw.remove(&old);
        }
        self.channels_by_raw.insert(raw.id(), channel.clone());
        channel.bind(raw);

        if fresh {
            info!("Remote channel '{}' arrived", label);
            self.emit(ConnectionEvent::ChannelOpened {
                channel,
                remote: true,
            });
        } else {
            debug!("Remote channel '{}' rebound", label);
        }
    }

    fn on_channel_opened(&mut self, id: RawChannelId) {
        match self.control.side_of(id) {
            Some(ControlSide::Local) => {
                debug!("Control channel open, starting keepalive");
                self.send_ping();
            }
            Some(ControlSide::Remote) => {}
            None => {
                if let Some(channel) = self.channels_by_raw.get(&id) {
                    channel.handle_open();
                }
            }
        }
    }

    async fn on_channel_message(&mut self, id: RawChannelId, payload: Payload) {
        if let Some(side) = self.control.side_of(id) {
            self.on_control_frame(side, payload).await;
            return;
        }
        match self.channels_by_raw.get(&id) {
            Some(channel) => channel.handle_message(payload),
            None => debug!("Message on unbound raw channel {}", id),
        }
    }

    async fn on_channel_closed(&mut self, id: RawChannelId) {
        if let Some(side) = self.control.side_of(id) {
            info!("{:?} control channel closed", side);
            self.control.detach(side);
            if side == ControlSide::Local {
                self.set_ping(None);
            }
            self.drop_session(CloseReason::ControlChannelClosed).await;
            return;
        }

        if let Some(channel) = self.channels_by_raw.remove(&id) {
            debug!("Channel '{}' lost its raw channel {}", channel.label(), id);
            channel.unbind();
        }
    }

    async fn bind_local_channels(&mut self, transport: &Arc<dyn Transport>) -> Result<()> {
        for channel in &self.local_channels {
            if channel.is_permanently_closed() || channel.is_bound() {
                continue;
            }
            let raw = transport.create_channel(channel.label()).await?;
            self.channels_by_raw.insert(raw.id(), channel.clone());
            channel.bind(raw);
        }
        Ok(())
    }

    // ---- control channel ----

    async fn on_control_frame(&mut self, side: ControlSide, payload: Payload) {
        let Payload::Text(text) = payload else {
            warn!("Discarding control frame: {}", Error::MalformedSignal("binary frame".into()));
            return;
        };
        let message = match ControlMessage::decode(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Discarding control frame: {}", e);
                return;
            }
        };
        trace!("Control frame '{}' on {:?} channel", message.kind(), side);

        let res = match message {
            ControlMessage::Ping => {
                self.control.reply(side, &ControlMessage::Pong);
                Ok(())
            }
            ControlMessage::Pong => {
                if side == ControlSide::Local {
                    self.on_pong();
                }
                Ok(())
            }
            ControlMessage::Negotiate => {
                self.on_negotiate_request().await;
                Ok(())
            }
            ControlMessage::Signal(desc) => match desc.sdp_type {
                SdpType::Offer => self.receive_offer(desc).await,
                SdpType::Answer => self.receive_answer(desc).await,
                other => Err(Error::UnsupportedSignalType(other.to_string())),
            },
            ControlMessage::Candidate(candidate) => self.receive_ice_candidate(candidate).await,
        };

        if let Err(e) = res {
            warn!("Control signal rejected: {}", e);
        }
    }

    fn send_ping(&mut self) {
        if self.control.send_ping() {
            self.timers
                .schedule(TimerKind::DisconnectTimeout, self.config.disconnect_timeout);
        }
    }

    fn on_pong(&mut self) {
        self.timers.cancel(TimerKind::DisconnectTimeout);
        let Some(round_trip) = self.control.take_round_trip() else {
            return;
        };
        self.set_ping(Some(round_trip));
        self.timers
            .schedule(TimerKind::PingInterval, self.config.ping_interval);
    }

    fn set_ping(&mut self, ping: Option<Duration>) {
        if ping.is_none() && self.ping.is_none() {
            return;
        }
        self.ping = ping;
        self.emit(ConnectionEvent::PingChanged(ping));
    }

    // ---- transport lifecycle ----

    fn require_transport(&self, operation: &'static str) -> Result<Arc<dyn Transport>> {
        if let Some(transport) = &self.transport {
            return Ok(transport.clone());
        }
        if self.state == SignalingState::Reconnecting {
            return Err(Error::InvalidState {
                operation,
                state: self.state,
            });
        }
        if self.permanently_closed {
            Err(Error::AlreadyClosed)
        } else {
            Err(Error::NotInitialized)
        }
    }

    async fn open_transport(&mut self) -> Result<Arc<dyn Transport>> {
        self.generation += 1;
        let sink = TransportEventSink::new(self.generation, self.transport_tx.clone());
        let transport = self.transports.create(&self.config.transport, sink).await?;

        if !transport.reports_candidate_errors() && !self.warned_candidate_errors {
            warn!("Transport does not report candidate errors, STUN/TURN failures will go undetected");
            self.warned_candidate_errors = true;
        }

        let label = format!("{CONTROL_CHANNEL_PREFIX}{}", self.ids.next_id());
        let control = match transport.create_channel(&label).await {
            Ok(control) => control,
            Err(e) => {
                let _ = transport.close().await;
                return Err(e.into());
            }
        };
        self.control.set_local(control);

        for track in &self.tracks {
            if let Err(e) = transport.add_track(track.clone()).await {
                warn!("Could not restore local track '{}': {:#}", track.id(), e);
            }
        }

        self.candidates.clear();
        self.all_candidates_reported = false;
        self.has_local_description = false;
        self.ice_connected = false;
        self.established = false;
        self.can_renegotiate = false;
        self.local_offer = None;
        self.transport = Some(transport.clone());
        debug!("Transport #{} ready", self.generation);
        Ok(transport)
    }

    /// Swaps in a fresh transport, keeping remote candidates already queued for the peer's offer.
    async fn replace_transport(&mut self) -> Result<Arc<dyn Transport>> {
        let queued = std::mem::take(&mut self.queued_candidates);
        self.teardown().await;
        self.queued_candidates = queued;
        self.open_transport().await
    }

    /// Releases everything tied to the current transport. Managed channels keep their queues.
    async fn teardown(&mut self) {
        self.timers.cancel_all();
        self.generation += 1;
        self.control.close_all();
        self.channels_by_raw.clear();
        for channel in self.local_channels.iter().chain(&self.remote_channels) {
            channel.unbind();
        }

        if let Some(transport) = self.transport.take()
            && let Err(e) = transport.close().await
        {
            debug!("Transport close failed: {:#}", e);
        }

        self.set_ping(None);
        self.candidates.clear();
        self.all_candidates_reported = false;
        self.queued_candidates.clear();
        self.local_offer = None;
        self.has_local_description = false;
        self.ice_connected = false;
        self.established = false;
        self.can_renegotiate = false;
    }

    /// Loses the session without the application asking for it.
    async fn drop_session(&mut self, reason: CloseReason) {
        if self.permanently_closed
            || matches!(
                self.state,
                SignalingState::Closed | SignalingState::Reconnecting
            )
        {
            return;
        }

        warn!("Connection dropped: {}", reason);
        self.teardown().await;

        match self.config.reconnect_delay {
            Some(delay) => {
                let delay = if self.polite == Some(true) {
                    delay / 2
                } else {
                    delay
                };
                self.timers.schedule(TimerKind::Reconnect, delay);
                self.set_state(SignalingState::Reconnecting, Some(reason), true);
            }
            None => self.set_state(SignalingState::Closed, Some(reason), true),
        }
    }

    async fn reconnect(&mut self) {
        if self.permanently_closed || self.state != SignalingState::Reconnecting {
            return;
        }

        info!("Re-initializing after drop");
        if let Err(e) = self.init().await {
            warn!("Reconnect failed: {}", e);
            if let Some(delay) = self.config.reconnect_delay {
                self.timers.schedule(TimerKind::Reconnect, delay);
            }
            return;
        }

        if self.polite == Some(false)
            && let Err(e) = self.offer(false).await
        {
            warn!("Reconnect offer failed: {}", e);
        }
    }

    // ---- plumbing ----

    fn emit(&self, event: ConnectionEvent) {
        self.publish();
        self.shared.events.emit(event);
    }

    fn respond<T>(&self, reply: Reply<T>, result: Result<T>) {
        self.publish();
        let _ = reply.send(result);
    }

    fn publish(&self) {
        let mut snapshot = self.shared.snapshot.write();
        snapshot.state = self.state;
        snapshot.ping = self.ping;
        snapshot.polite = self.polite;
        snapshot.can_renegotiate = self.can_renegotiate;
        snapshot.permanently_closed = self.permanently_closed;
        snapshot.candidates.clone_from(&self.candidates);
        snapshot.local_channels.clone_from(&self.local_channels);
        snapshot.remote_channels.clone_from(&self.remote_channels);
    }
}

async fn make_offer(
    transport: &Arc<dyn Transport>,
    ice_restart: bool,
) -> anyhow::Result<SessionDescription> {
    let offer = transport.create_offer(ice_restart).await?;
    transport.set_local_description(offer.clone()).await?;
    Ok(offer)
}

async fn make_answer(transport: &Arc<dyn Transport>) -> anyhow::Result<SessionDescription> {
    let answer = transport.create_answer().await?;
    transport.set_local_description(answer.clone()).await?;
    Ok(answer)
}
