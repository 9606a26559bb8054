use thiserror::Error;

/// Engine error taxonomy. Validation errors never touch the network;
/// execution-service errors are non-fatal and leave the match running.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no match in progress")]
    NoMatch,

    #[error("no language selected")]
    NoLanguage,

    #[error("no active problem selected")]
    NoActiveProblem,

    #[error("request timed out")]
    Timeout,

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// True for failures the caller should show and move past, rather than
    /// tear the session down.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ClientError::Io(_))
    }
}
