use eddy_observability::ErrorKind;
use rdkafka::error::KafkaError as RdKafkaError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum KafkaError {
    #[snafu(display("Kafka client error"))]
    Client { source: RdKafkaError },
    #[snafu(display("No brokers reachable through {bootstrap_servers}"))]
    NoBrokers { bootstrap_servers: String },
    #[snafu(display("Invalid Kafka setting {setting:?}, expected key=value"))]
    InvalidSetting { setting: String },
    #[snafu(display("Blocking Kafka call did not complete"))]
    Join { source: tokio::task::JoinError },
}

pub type Result<T, E = KafkaError> = std::result::Result<T, E>;

impl KafkaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Client {
                source: RdKafkaError::ClientConfig(..),
            }
            | Self::InvalidSetting { .. } => ErrorKind::Configuration,
            Self::Client { .. } | Self::NoBrokers { .. } => ErrorKind::Temporary,
            Self::Join { .. } => ErrorKind::Internal,
        }
    }
}
