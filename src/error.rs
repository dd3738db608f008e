use std::sync::Arc;

/// Remote statuses treated as transient.
const TEMPORARY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Error type returned by this crate.
///
/// The variants follow the phase that produced them, so the first failing
/// phase of a request can be read straight off the value.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or request configuration rejected before any I/O.
    #[error("validation error: {0}")]
    Validation(String),
    /// Request construction failed, e.g. the body could not be encoded.
    #[error("build error: {0}")]
    Build(String),
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(Arc<reqwest::Error>),
    /// Non-success HTTP status, decoded from the error payload when possible.
    #[error("remote error {status}: {message}")]
    Remote {
        status: u16,
        /// Provider-specific error code, if the payload carried one.
        code: Option<String>,
        message: String,
        /// Raw response body.
        body: String,
    },
    /// Response body could not be decoded into the output payload.
    #[error("decode error: {0}")]
    Decode(String),
    /// The request's cancellation token fired.
    #[error("request canceled")]
    Canceled,
    /// The request's deadline passed before it completed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// Stable code used to match against `RetryConfig::retry_error_codes`.
    pub fn code(&self) -> String {
        match self {
            Self::Validation(_) => "InvalidParameter".to_owned(),
            Self::Build(_) => "SerializationError".to_owned(),
            Self::Transport(_) => "RequestError".to_owned(),
            Self::Remote { status, code, .. } => {
                code.clone().unwrap_or_else(|| status.to_string())
            }
            Self::Decode(_) => "DeserializationError".to_owned(),
            Self::Canceled => "RequestCanceled".to_owned(),
            Self::DeadlineExceeded => "DeadlineExceeded".to_owned(),
        }
    }

    /// HTTP status of a remote error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Whether the error came from cancellation or an expired deadline.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Arc::new(err))
    }
}

/// Errors that can report whether retrying them may succeed.
pub trait Temporary {
    fn is_temporary(&self) -> bool;
}

impl Temporary for reqwest::Error {
    fn is_temporary(&self) -> bool {
        self.is_timeout() || self.is_connect() || self.is_request() || self.is_body()
    }
}

impl Temporary for Error {
    fn is_temporary(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_temporary(),
            Self::Remote { status, .. } => TEMPORARY_STATUSES.contains(status),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, Temporary};

    fn remote(status: u16, code: Option<&str>) -> Error {
        Error::Remote {
            status,
            code: code.map(str::to_owned),
            message: "boom".to_owned(),
            body: String::new(),
        }
    }

    #[test]
    fn remote_code_falls_back_to_status() {
        assert_eq!(remote(503, None).code(), "503");
        assert_eq!(remote(400, Some("ORDER_EXISTS")).code(), "ORDER_EXISTS");
    }

    #[test]
    fn phase_errors_are_never_temporary() {
        assert!(!Error::Validation("amount".to_owned()).is_temporary());
        assert!(!Error::Build("encode".to_owned()).is_temporary());
        assert!(!Error::Decode("json".to_owned()).is_temporary());
        assert!(!Error::Canceled.is_temporary());
    }

    #[test]
    fn throttling_and_server_errors_are_temporary() {
        for status in [429, 500, 502, 503, 504] {
            assert!(remote(status, None).is_temporary(), "status {status}");
        }
        assert!(!remote(400, None).is_temporary());
        assert!(!remote(404, None).is_temporary());
    }

    #[test]
    fn interruption_classification() {
        assert!(Error::Canceled.is_interruption());
        assert!(Error::DeadlineExceeded.is_interruption());
        assert!(!remote(500, None).is_interruption());
        assert_eq!(Error::Canceled.code(), "RequestCanceled");
    }
}
