use crate::transport::raw_channel::{RawChannel, RawChannelId};
use crate::transport::transport_config::TransportConfig;
use crate::transport::transport_event::{
    Connectivity, NativeSignalingState, TransportEvent, TransportEventSink,
};
use crate::transport::transport_primitive::{LocalTrack, Transport, TransportFactory};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use parley_core::{IceCandidate, Payload, SdpType, SessionDescription};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

/// Builds `WebrtcTransport`s backed by the `webrtc` crate.
#[derive(Default, Clone)]
pub struct WebrtcTransportFactory;

#[async_trait]
impl TransportFactory for WebrtcTransportFactory {
    async fn create(
        &self,
        config: &TransportConfig,
        sink: TransportEventSink,
    ) -> Result<Arc<dyn Transport>> {
        let transport = WebrtcTransport::new(config, sink).await?;
        Ok(Arc::new(transport))
    }
}

pub struct WebrtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    sink: TransportEventSink,
    next_channel_id: Arc<AtomicU64>,
    senders: Mutex<HashMap<String, Arc<RTCRtpSender>>>,
}

impl WebrtcTransport {
    pub async fn new(config: &TransportConfig, sink: TransportEventSink) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);
        let next_channel_id = Arc::new(AtomicU64::new(0));

        let ice_sink = sink.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let sink = ice_sink.clone();
            Box::pin(async move {
                let Some(candidate) = c else {
                    sink.emit(TransportEvent::CandidateGatheringComplete);
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => sink.emit(TransportEvent::CandidateDiscovered(from_rtc_candidate(init))),
                    Err(e) => warn!("Failed to serialize local ICE candidate: {:?}", e),
                }
            })
        }));

        let ice_state_sink = sink.clone();
        peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                let sink = ice_state_sink.clone();
                Box::pin(async move {
                    debug!("ICE connection state changed: {:?}", s);
                    if let Some(state) = map_connectivity(s) {
                        sink.emit(TransportEvent::ConnectivityChanged(state));
                    }
                })
            },
        ));

        let signaling_sink = sink.clone();
        peer_connection.on_signaling_state_change(Box::new(move |s: RTCSignalingState| {
            let sink = signaling_sink.clone();
            Box::pin(async move {
                debug!("Native signaling state changed: {:?}", s);
                if let Some(state) = map_signaling(s) {
                    sink.emit(TransportEvent::SignalingChanged(state));
                }
            })
        }));

        let negotiation_sink = sink.clone();
        peer_connection.on_negotiation_needed(Box::new(move || {
            let sink = negotiation_sink.clone();
            Box::pin(async move {
                sink.emit(TransportEvent::NegotiationNeeded);
            })
        }));

        let dc_sink = sink.clone();
        let dc_ids = next_channel_id.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let sink = dc_sink.clone();
            let id = RawChannelId(dc_ids.fetch_add(1, Ordering::Relaxed));

            Box::pin(async move {
                info!("Remote data channel '{}' arrived as {}", dc.label(), id);
                let channel = WebrtcChannel::wire(dc, id, sink.clone());
                sink.emit(TransportEvent::ChannelArrived(channel));
            })
        }));

        let track_sink = sink.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let sink = track_sink.clone();
                Box::pin(async move {
                    sink.emit(TransportEvent::TrackAdded(track));
                })
            },
        ));

        Ok(Self {
            peer_connection,
            sink,
            next_channel_id,
            senders: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl Transport for WebrtcTransport {
    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription> {
        let options = RTCOfferOptions {
            ice_restart,
            ..Default::default()
        };
        let offer = self.peer_connection.create_offer(Some(options)).await?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        from_rtc_description(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc_description(desc)?;
        self.peer_connection.set_local_description(desc).await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc_description(desc)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .context("Failed to apply remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn create_channel(&self, label: &str) -> Result<Arc<dyn RawChannel>> {
        let dc = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .with_context(|| format!("Failed to create data channel '{label}'"))?;
        let id = RawChannelId(self.next_channel_id.fetch_add(1, Ordering::Relaxed));
        debug!("Local data channel '{}' created as {}", label, id);
        Ok(WebrtcChannel::wire(dc, id, self.sink.clone()))
    }

    async fn add_track(&self, track: LocalTrack) -> Result<()> {
        let track_id = track.id().to_owned();
        let sender = self.peer_connection.add_track(track).await?;
        self.senders.lock().insert(track_id, sender);
        Ok(())
    }

    async fn remove_track(&self, track_id: &str) -> Result<()> {
        let Some(sender) = self.senders.lock().remove(track_id) else {
            bail!("No local track with id '{track_id}'");
        };
        self.peer_connection.remove_track(&sender).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// A `RTCDataChannel` with its callbacks routed into a `TransportEventSink`.
///
/// Outbound payloads go through a single writer task, which keeps `send`
/// synchronous and ordered.
struct WebrtcChannel {
    id: RawChannelId,
    label: String,
    dc: Arc<RTCDataChannel>,
    outbound: mpsc::UnboundedSender<Payload>,
}

impl WebrtcChannel {
    fn wire(dc: Arc<RTCDataChannel>, id: RawChannelId, sink: TransportEventSink) -> Arc<Self> {
        let open_sink = sink.clone();
        dc.on_open(Box::new(move || {
            Box::pin(async move {
                open_sink.emit(TransportEvent::ChannelOpened(id));
            })
        }));

        let close_sink = sink.clone();
        dc.on_close(Box::new(move || {
            let sink = close_sink.clone();
            Box::pin(async move {
                sink.emit(TransportEvent::ChannelClosed(id));
            })
        }));

        let msg_sink = sink.clone();
        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let sink = msg_sink.clone();
            Box::pin(async move {
                let payload = if msg.is_string {
                    Payload::Text(String::from_utf8_lossy(&msg.data).into_owned())
                } else {
                    Payload::Binary(Bytes::from(msg.data.to_vec()))
                };
                sink.emit(TransportEvent::ChannelMessage(id, payload));
            })
        }));

        let err_sink = sink;
        dc.on_error(Box::new(move |e: webrtc::Error| {
            let sink = err_sink.clone();
            Box::pin(async move {
                sink.emit(TransportEvent::ChannelError(id, e.to_string()));
            })
        }));

        let (outbound, mut rx) = mpsc::unbounded_channel::<Payload>();
        let writer = dc.clone();
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                let res = match payload {
                    Payload::Text(text) => writer.send_text(text).await,
                    Payload::Binary(data) => writer.send(&data).await,
                };
                if let Err(e) = res {
                    warn!("Data channel '{}' write failed: {}", writer.label(), e);
                }
            }
        });

        Arc::new(Self {
            id,
            label: dc.label().to_owned(),
            dc,
            outbound,
        })
    }
}

impl RawChannel for WebrtcChannel {
    fn id(&self) -> RawChannelId {
        self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn is_open(&self) -> bool {
        self.dc.ready_state() == RTCDataChannelState::Open
    }

    fn send(&self, payload: Payload) -> Result<()> {
        self.outbound
            .send(payload)
            .map_err(|_| anyhow::anyhow!("Data channel '{}' writer has stopped", self.label))
    }

    fn close(&self) {
        let dc = self.dc.clone();
        tokio::spawn(async move {
            if let Err(e) = dc.close().await {
                debug!("Closing data channel '{}' failed: {}", dc.label(), e);
            }
        });
    }
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
        SdpType::Rollback => bail!("Rollback descriptions are not supported by this transport"),
    };
    Ok(rtc)
}

fn from_rtc_description(desc: RTCSessionDescription) -> Result<SessionDescription> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        RTCSdpType::Unspecified => bail!("Transport produced a description without a type"),
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: desc.sdp,
    })
}

fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn map_connectivity(state: RTCIceConnectionState) -> Option<Connectivity> {
    let mapped = match state {
        RTCIceConnectionState::New => Connectivity::New,
        RTCIceConnectionState::Checking => Connectivity::Checking,
        RTCIceConnectionState::Connected => Connectivity::Connected,
        RTCIceConnectionState::Completed => Connectivity::Completed,
        RTCIceConnectionState::Disconnected => Connectivity::Disconnected,
        RTCIceConnectionState::Failed => Connectivity::Failed,
        RTCIceConnectionState::Closed => Connectivity::Closed,
        RTCIceConnectionState::Unspecified => return None,
    };
    Some(mapped)
}

fn map_signaling(state: RTCSignalingState) -> Option<NativeSignalingState> {
    let mapped = match state {
        RTCSignalingState::Stable => NativeSignalingState::Stable,
        RTCSignalingState::HaveLocalOffer => NativeSignalingState::HaveLocalOffer,
        RTCSignalingState::HaveRemoteOffer => NativeSignalingState::HaveRemoteOffer,
        RTCSignalingState::HaveLocalPranswer => NativeSignalingState::HaveLocalPranswer,
        RTCSignalingState::HaveRemotePranswer => NativeSignalingState::HaveRemotePranswer,
        RTCSignalingState::Closed => NativeSignalingState::Closed,
        RTCSignalingState::Unspecified => return None,
    };
    Some(mapped)
}
