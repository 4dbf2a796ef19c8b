/// Coarse classification shared by every eddy error type.
///
/// The ingest loop uses it to decide whether an operation is worth retrying,
/// and the binary uses it to pick the process exit status.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad flags or environment, needs an operator fix.
    Configuration,

    /// Input that can never be accepted, such as a malformed message.
    Validation,

    /// Network, storage or broker hiccup. Retrying may succeed.
    Temporary,

    /// A dependency stayed unreachable after every retry was spent.
    Unavailable,

    /// Bugs and invariant violations.
    Internal,
}

impl ErrorKind {
    /// Whether this error is retryable.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Temporary)
    }

    /// sysexits-style exit code for this error category.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Configuration => 78, // EX_CONFIG
            Self::Validation => 65,    // EX_DATAERR
            Self::Temporary => 75,     // EX_TEMPFAIL
            Self::Unavailable => 69,   // EX_UNAVAILABLE
            Self::Internal => 70,      // EX_SOFTWARE
        }
    }
}
