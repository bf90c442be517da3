/// Errors that can occur while reading or writing line records.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A record could not be serialized.
    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// An I/O error occurred while reading records.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
