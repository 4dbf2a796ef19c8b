use eddy_data_lake::DataLakeError;
use eddy_ingestor_core::IngestError;
use eddy_observability::ErrorKind;
use snafu::Snafu;

/// CLI error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CliError {
    #[snafu(display("Invalid {name} argument: {message}"))]
    InvalidArgument { name: &'static str, message: String },
    #[snafu(display("Failed to open table"))]
    DataLake { source: DataLakeError },
    #[snafu(display("Ingestion failed"))]
    Ingest { source: IngestError },
    #[snafu(display("Failed to read {path}"))]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to serialize event"))]
    JsonSerialize { source: serde_json::Error },
    #[snafu(display("{rejected} of {total} messages were rejected"))]
    Rejected { rejected: usize, total: usize },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

impl CliError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } | Self::Io { .. } => ErrorKind::Configuration,
            Self::DataLake { source } => source.kind(),
            Self::Ingest { source } => source.kind(),
            Self::JsonSerialize { .. } => ErrorKind::Internal,
            Self::Rejected { .. } => ErrorKind::Validation,
        }
    }
}
