use arrow::error::ArrowError;
use deltalake_core::DeltaTableError;
use eddy_observability::ErrorKind;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DataLakeError {
    #[snafu(display("Failed to open Delta table at {table_uri}"))]
    OpenTable {
        table_uri: String,
        source: DeltaTableError,
    },
    #[snafu(display("Failed to append {records} records to Delta table at {table_uri}"))]
    Append {
        table_uri: String,
        records: usize,
        source: DeltaTableError,
    },
    #[snafu(display("Failed to convert events to Arrow"))]
    Arrow { source: ArrowError },
    #[snafu(display("Invalid table location: {message}"))]
    InvalidLocation { message: String },
    #[snafu(display("Internal error: {message}"))]
    Internal { message: String },
}

pub type Result<T, E = DataLakeError> = std::result::Result<T, E>;

impl DataLakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OpenTable { source, .. } | Self::Append { source, .. } => delta_error_kind(source),
            Self::Arrow { .. } | Self::Internal { .. } => ErrorKind::Internal,
            Self::InvalidLocation { .. } => ErrorKind::Configuration,
        }
    }
}

fn delta_error_kind(error: &DeltaTableError) -> ErrorKind {
    match error {
        DeltaTableError::InvalidTableLocation(_) => ErrorKind::Configuration,
        DeltaTableError::SchemaMismatch { .. } => ErrorKind::Validation,
        _ => ErrorKind::Temporary,
    }
}
