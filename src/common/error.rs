use thiserror::Error;

// Error
//------------------------------------------------------------------------------

/// Failure outcomes of detection, decoding and encoding.
///
/// `NotFound`, `Format` and `Checksum` are ordinary results of scanning an image and are
/// recoverable by trying another region, orientation or configuration. `InvalidArgument`
/// signals a caller bug such as unencodable content.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum ScanError {
    #[error("no barcode found")]
    NotFound,
    #[error("malformed symbol: {0}")]
    Format(&'static str),
    #[error("too many errors to correct")]
    Checksum,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ScanError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// True for the outcomes a retry ladder is allowed to swallow.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidArgument(_))
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
