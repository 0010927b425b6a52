//! Error taxonomy for scanner operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DoxieError>;

/// Every core operation returns either its decoded result or one of these.
///
/// Nothing is retried internally. [`DoxieError::is_transient`] tells callers
/// which errors are worth retrying after a short delay.
#[derive(Debug, Error)]
pub enum DoxieError {
    /// Neither discovery probe produced a valid status response in time.
    #[error("doxie: scanner not found on Wi-Fi network")]
    DeviceNotFound,

    /// The request timed out or the connection could not be made.
    #[error("doxie: scanner unreachable: {0}")]
    DeviceUnreachable(String),

    /// The scanner answered with a status outside the documented success set.
    #[error("doxie: request error http {0}")]
    UnexpectedStatus(u16),

    /// `scans.json` returned an empty body, the scanner memory is busy.
    #[error("doxie: scan(s) not found, scanner memory may be busy")]
    ScansUnavailable,

    /// A scan or thumbnail request returned 200 with no data.
    #[error("doxie: error downloading scan")]
    DownloadFailed,

    #[error("doxie: scan {0} not found")]
    ScanNotFound(String),

    /// Thumbnails are generated some seconds after a scan completes.
    #[error("doxie: thumbnail for {0} not yet generated")]
    ThumbnailNotReady(String),

    #[error("doxie: error deleting scan(s), http {0}")]
    DeleteFailed(u16),

    #[error("doxie: malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("doxie: malformed image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("doxie: invalid scanner url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("doxie: socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("doxie: failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl DoxieError {
    /// True when the scanner is in a transient state and the same call may
    /// succeed a few seconds later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DoxieError::ScansUnavailable
                | DoxieError::DownloadFailed
                | DoxieError::ThumbnailNotReady(_)
        )
    }

    /// True for timeouts and connection failures, as opposed to HTTP errors.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            DoxieError::DeviceUnreachable(_) | DoxieError::DeviceNotFound
        )
    }
}
