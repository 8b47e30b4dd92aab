/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] worldlink_frame::FrameError),

    /// Payload serialization error.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Socket-level error during connection setup.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel has been closed, locally or by the peer.
    #[error("channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ChannelError>;
