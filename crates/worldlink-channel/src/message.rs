/// An outbound wire message that carries client-allocated sequence numbers.
///
/// Each message kind enumerates its child sequence-number slots explicitly;
/// there is no runtime introspection of the payload. A slot value of 0 means
/// "unset" and is filled by the channel's allocator during `send`. Messages
/// with no slots (handshake, ACK-only or disconnect envelopes) are
/// transmitted without retransmission tracking.
pub trait Sequenced {
    /// Mutable references to every child sequence-number slot, in wire order.
    fn sequence_slots(&mut self) -> Vec<&mut u64>;
}
