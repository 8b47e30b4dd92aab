//! Reliable send/receive primitive over a TCP stream.
//!
//! A [`ReliableChannel`] owns two background threads: a receiver that drains
//! the socket into a payload queue, and a retransmitter that resends every
//! unacknowledged frame on a doubling backoff. Outbound messages declare
//! their child sequence-number slots through the [`Sequenced`] trait; `send`
//! fills the unset slots from a strictly increasing allocator and tracks the
//! encoded frame under every carried number until the peer acknowledges it.
//!
//! Any I/O failure in either background thread is terminal for the channel
//! instance. Callers observe closure through [`ReliableChannel::recv`] and
//! reconnect at a higher layer.

pub mod channel;
pub mod error;
pub mod message;

pub use channel::{ChannelConfig, ReliableChannel};
pub use error::{ChannelError, Result};
pub use message::Sequenced;
