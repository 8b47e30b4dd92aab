//! Varint length-prefixed message framing for the world simulator protocol.
//!
//! Every message on the wire is a base-128 varint length prefix (7 bits per
//! byte, continuation bit set on all but the last byte, least-significant
//! group first) followed by that many payload bytes. Frames may span
//! arbitrarily many reads, and a single read may contain several frames.
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD, MAX_VARINT_LEN};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
