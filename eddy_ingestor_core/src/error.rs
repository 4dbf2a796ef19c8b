use eddy_data_lake::DataLakeError;
use eddy_observability::ErrorKind;
use snafu::Snafu;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by an [`EventSource`](crate::EventSource) or its
/// [`Connector`](crate::Connector).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    #[snafu(display("Failed to connect to the broker: {source}"))]
    Connect { source: BoxError },
    #[snafu(display("Failed to receive message: {source}"))]
    Receive { source: BoxError },
    #[snafu(display("Failed to commit consumption position: {source}"))]
    Commit { source: BoxError },
    #[snafu(display("Invalid source configuration: {source}"))]
    Configuration { source: BoxError },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SupervisorError {
    #[snafu(display("Broker unavailable after {attempts} attempts"))]
    Unavailable { attempts: u32, source: SourceError },
    #[snafu(display("Broker connection rejected"))]
    Rejected { source: SourceError },
    #[snafu(display("Connection cancelled"))]
    Cancelled,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    #[snafu(display("Failed to acquire broker connection"))]
    Acquire { source: SupervisorError },
    #[snafu(display("Failed to poll broker"))]
    Poll { source: SourceError },
    #[snafu(display("Failed to write batch of {records} records after {attempts} attempts"))]
    Write {
        records: usize,
        attempts: u32,
        source: DataLakeError,
    },
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

impl SourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect { .. } | Self::Receive { .. } | Self::Commit { .. } => {
                ErrorKind::Temporary
            }
            Self::Configuration { .. } => ErrorKind::Configuration,
        }
    }
}

impl SupervisorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::Rejected { source } => source.kind(),
            Self::Cancelled => ErrorKind::Internal,
        }
    }
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Acquire { source } => source.kind(),
            Self::Poll { source } => source.kind(),
            Self::Write { source, .. } => source.kind(),
        }
    }
}
