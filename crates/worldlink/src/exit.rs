use std::fmt;
use std::io;

use worldlink_channel::ChannelError;
use worldlink_frame::FrameError;
use worldlink_track::TrackError;
use worldlink_world::WorldError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Io(source) => io_error(context, source),
        ChannelError::Frame(FrameError::Io(source)) => io_error(context, source),
        ChannelError::Frame(other) => CliError::new(DATA_INVALID, format!("{context}: {other}")),
        ChannelError::Encode(source) => CliError::new(DATA_INVALID, format!("{context}: {source}")),
        ChannelError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn world_error(context: &str, err: WorldError) -> CliError {
    match err {
        WorldError::Channel(source) => channel_error(context, source),
        WorldError::HandshakeTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        WorldError::Handshake(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        WorldError::Payload(source) => CliError::new(DATA_INVALID, format!("{context}: {source}")),
        WorldError::NotRunning => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn track_error(context: &str, err: TrackError) -> CliError {
    match err {
        TrackError::InsufficientStock { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        TrackError::World(source) => world_error(context, source),
    }
}
