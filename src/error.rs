use thiserror::Error;

#[derive(Error, Debug)]
pub enum TsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation was called out of order (before `initialize`, twice,
    /// while a segment is open, ...).
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unsupported stream: {0}")]
    UnsupportedStream(String),

    #[error("invalid encryption signal: {0}")]
    InvalidSignal(String),

    #[error("malformed pes packet: {0}")]
    MalformedPacket(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("parser error: {0}")]
    Parser(String),
}

pub type Result<T> = std::result::Result<T, TsError>;
