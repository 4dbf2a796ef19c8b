use eddy_observability::ErrorKind;
use snafu::Snafu;

/// Reasons a raw message is rejected by the normalizer.
///
/// Rejections are never retried: the same bytes can never normalize.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum NormalizeError {
    #[snafu(display("Message payload is empty"))]
    EmptyPayload,
    #[snafu(display("Message is not valid JSON"))]
    InvalidJson { source: serde_json::Error },
    #[snafu(display("Message must be a JSON object, found {found}"))]
    NotAnObject { found: &'static str },
}

pub type Result<T, E = NormalizeError> = std::result::Result<T, E>;

impl NormalizeError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
