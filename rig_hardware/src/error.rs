use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("device disconnected")]
    Disconnected,
    #[error("device timeout")]
    Timeout,
    #[error("device rejected command: {0}")]
    Rejected(String),
    #[error("malformed device frame: {0}")]
    Protocol(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
