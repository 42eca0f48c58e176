use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not signed in or session expired")]
    Unauthorized,

    #[error("backend responded with status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway error: {0}")]
    Gateway(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("timed out waiting for the backend")]
    Timeout,

    #[error("gateway closed the connection")]
    Disconnected,

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}
