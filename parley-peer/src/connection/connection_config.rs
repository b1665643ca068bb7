use crate::transport::{TransportConfig, TransportFactory, WebrtcTransportFactory};
use parley_core::{IdGenerator, RandomIds, SessionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// How a connection decides whether it is the polite side of the collision protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Politeness {
    /// Whoever offers first is impolite; the side that receives that offer is polite.
    #[default]
    FirstOfferer,
    Polite,
    Impolite,
}

impl Politeness {
    /// Race-free assignment from ids both peers already know: the smaller id is polite.
    pub fn from_session_ids(local: &SessionId, remote: &SessionId) -> Self {
        if local < remote {
            Politeness::Polite
        } else {
            Politeness::Impolite
        }
    }

    pub(crate) fn fixed(self) -> Option<bool> {
        match self {
            Politeness::FirstOfferer => None,
            Politeness::Polite => Some(true),
            Politeness::Impolite => Some(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub transport: TransportConfig,
    #[serde(with = "millis")]
    pub ping_interval: Duration,
    /// How long a ping may go unanswered before the session is dropped.
    #[serde(with = "millis")]
    pub disconnect_timeout: Duration,
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
    /// `None` turns every drop into a terminal close.
    #[serde(with = "millis::option")]
    pub reconnect_delay: Option<Duration>,
    pub politeness: Politeness,
    /// When `false`, negotiation-needed is only reported through
    /// `ConnectionEvent::NegotiationNeeded` and renegotiating is up to the application.
    pub auto_renegotiate: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            ping_interval: Duration::from_millis(1000),
            disconnect_timeout: Duration::from_millis(1500),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Some(Duration::from_secs(2)),
            politeness: Politeness::FirstOfferer,
            auto_renegotiate: true,
        }
    }
}

/// Config plus the injectable collaborators of a connection.
#[derive(Clone)]
pub struct ConnectionOptions {
    pub config: ConnectionConfig,
    pub ids: Arc<dyn IdGenerator>,
    pub transports: Arc<dyn TransportFactory>,
}

impl ConnectionOptions {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            ids: Arc::new(RandomIds),
            transports: Arc::new(WebrtcTransportFactory),
        }
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_transport_factory(mut self, transports: Arc<dyn TransportFactory>) -> Self {
        self.transports = transports;
        self
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new(ConnectionConfig::default())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
        }
    }
}
