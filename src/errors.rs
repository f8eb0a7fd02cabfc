use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("API credentials not set")]
    MissingCredentials,
    #[error("{resource} request failed with status {status}: {body}")]
    Status {
        resource: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error classes the host surfaces to the user. The connection test
/// reports exactly these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Unauthorized,
    BadRequest,
    NotFound,
    Http(StatusCode),
    Transport,
    Other,
}

impl CrmError {
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::MissingCredentials => ErrorClass::Configuration,
            Self::Status { status, .. } => match *status {
                StatusCode::UNAUTHORIZED => ErrorClass::Unauthorized,
                StatusCode::BAD_REQUEST => ErrorClass::BadRequest,
                StatusCode::NOT_FOUND => ErrorClass::NotFound,
                other => ErrorClass::Http(other),
            },
            Self::Transport(_) => ErrorClass::Transport,
            Self::Decode(_) | Self::Storage(_) | Self::Io(_) => ErrorClass::Other,
        }
    }
}

pub type CrmResult<T> = Result<T, CrmError>;
