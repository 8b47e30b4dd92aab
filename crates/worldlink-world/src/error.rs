/// Errors surfaced by the world protocol client.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// Channel-level error.
    #[error("channel error: {0}")]
    Channel(#[from] worldlink_channel::ChannelError),

    /// The handshake reply did not carry the expected success token.
    #[error("handshake rejected: {0}")]
    Handshake(String),

    /// No handshake reply arrived within the configured wait.
    #[error("no handshake reply within {0:?}")]
    HandshakeTimeout(std::time::Duration),

    /// Payload serialization/deserialization error.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// The client has been shut down.
    #[error("client is not running")]
    NotRunning,
}

pub type Result<T> = std::result::Result<T, WorldError>;
