use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Profile is not loaded")]
    ProfileNotLoaded,
    #[error("Missing access token (is the user authenticated?)")]
    MissingAccessToken,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid {operation} response: missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },
    #[error("failed to decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        source: serde_json::Error,
    },
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("Cannot compute store base URL: empty username")]
    EmptyUsername,
    #[error("Store health failed ({status}): {body}")]
    StoreHealth { status: u16, body: String },
}

impl ClientError {
    /// Local validation failures, as opposed to anything the network reported.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ProfileNotLoaded
                | Self::MissingField { .. }
                | Self::Decode { .. }
                | Self::EmptyUsername
        )
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
