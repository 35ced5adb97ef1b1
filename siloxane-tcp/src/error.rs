use thiserror::Error;

#[derive(Debug, Error)]
pub enum TcpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no address resolved for {0}")]
    NoAddress(String),

    #[error("frame too large: {size} bytes (limit {limit})")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("empty frame")]
    EmptyFrame,

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}
