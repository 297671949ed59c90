use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state directory not usable: {0}")]
    NotADirectory(std::path::PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("atomic replace failed: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("invalid aggregate name: {0:?}")]
    InvalidName(String),
}
