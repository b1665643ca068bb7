use crate::transport::raw_channel::RawChannel;
use crate::transport::transport_config::TransportConfig;
use crate::transport::transport_event::TransportEventSink;
use anyhow::Result;
use async_trait::async_trait;
use parley_core::{IceCandidate, SessionDescription};
use std::sync::Arc;
use webrtc::track::track_local::TrackLocal;

pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

/// The peer-connection primitive a `Connection` drives.
///
/// It owns ICE, DTLS and SCTP; the connection only orchestrates it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn create_channel(&self, label: &str) -> Result<Arc<dyn RawChannel>>;

    async fn add_track(&self, track: LocalTrack) -> Result<()>;

    async fn remove_track(&self, track_id: &str) -> Result<()>;

    /// Whether `TransportEvent::CandidateError` is ever emitted.
    fn reports_candidate_errors(&self) -> bool {
        false
    }

    async fn close(&self) -> Result<()>;
}

/// Creates a fresh transport for every (re)initialization of a connection.
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    async fn create(
        &self,
        config: &TransportConfig,
        sink: TransportEventSink,
    ) -> Result<Arc<dyn Transport>>;
}
