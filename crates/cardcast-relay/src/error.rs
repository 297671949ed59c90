use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed update: {0}")]
    MalformedUpdate(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "telegram")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
}
