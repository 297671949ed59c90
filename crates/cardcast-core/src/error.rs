use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid card text: {0:?}")]
    InvalidCard(String),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to persist {aggregate}: {reason}")]
    Persist {
        aggregate: &'static str,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}
