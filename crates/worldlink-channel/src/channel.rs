use std::collections::BTreeMap;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tracing::{debug, trace, warn};
use worldlink_frame::{encode_frame, FrameConfig, FrameError, FrameReader, FrameWriter};

use crate::error::{ChannelError, Result};
use crate::message::Sequenced;

/// Configuration for a [`ReliableChannel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Initial retransmission interval. Doubles after every pass.
    pub retry_initial: Duration,
    /// Ceiling for the doubled retransmission interval.
    pub retry_ceiling: Duration,
    /// Granularity at which sleeping loops observe the shutdown flag.
    pub shutdown_tick: Duration,
    /// Maximum payload size accepted in either direction.
    pub max_payload_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            retry_initial: Duration::from_millis(500),
            retry_ceiling: Duration::from_secs(4),
            shutdown_tick: Duration::from_millis(50),
            max_payload_size: worldlink_frame::DEFAULT_MAX_PAYLOAD,
        }
    }
}

struct TxState {
    /// Next sequence number to allocate. Starts at 1; 0 is the wire-level
    /// "unset" sentinel and is never issued.
    next_seq: u64,
    /// Sequence number → encoded frame, awaiting acknowledgment.
    pending: BTreeMap<u64, Vec<u8>>,
    writer: FrameWriter<TcpStream>,
}

struct Shared {
    stream: TcpStream,
    tx: Mutex<TxState>,
    closed: AtomicBool,
    config: ChannelConfig,
}

impl Shared {
    fn set_closed(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bi-directional exactly-once-observed channel with automatic retransmission.
///
/// `send` may be called concurrently from any thread; a dedicated receiver
/// thread feeds the queue drained by `recv`. Any I/O failure in a background
/// thread is terminal for this instance.
pub struct ReliableChannel {
    shared: Arc<Shared>,
    rx: Mutex<Receiver<Bytes>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ReliableChannel {
    /// Connect to `addr` with default configuration.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with_config(addr, ChannelConfig::default())
    }

    /// Connect to `addr` with explicit configuration.
    ///
    /// `TCP_NODELAY` is set so small command envelopes are not delayed behind
    /// Nagle batching.
    pub fn connect_with_config(addr: impl ToSocketAddrs, config: ChannelConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Self::from_stream(stream, config)
    }

    /// Build a channel over an already-connected stream.
    pub fn from_stream(stream: TcpStream, config: ChannelConfig) -> Result<Self> {
        let reader_stream = stream.try_clone()?;
        let writer_stream = stream.try_clone()?;

        let frame_config = FrameConfig {
            max_payload_size: config.max_payload_size,
        };

        let shared = Arc::new(Shared {
            stream,
            tx: Mutex::new(TxState {
                next_seq: 1,
                pending: BTreeMap::new(),
                writer: FrameWriter::with_config(writer_stream, frame_config.clone()),
            }),
            closed: AtomicBool::new(false),
            config,
        });

        let (queue_tx, queue_rx) = mpsc::channel();

        let recv_shared = Arc::clone(&shared);
        let recv_handle = thread::Builder::new()
            .name("worldlink-recv".into())
            .spawn(move || recv_loop(recv_shared, reader_stream, frame_config, queue_tx))?;

        let retx_shared = Arc::clone(&shared);
        let retx_handle = thread::Builder::new()
            .name("worldlink-retransmit".into())
            .spawn(move || retransmit_loop(retx_shared))?;

        Ok(Self {
            shared,
            rx: Mutex::new(queue_rx),
            threads: Mutex::new(vec![recv_handle, retx_handle]),
        })
    }

    /// Serialize `msg`, transmit it, and return all sequence numbers carried.
    ///
    /// Every unset (zero) slot reported by [`Sequenced::sequence_slots`] is
    /// filled from the allocator; the encoded frame is registered in the
    /// pending set under every carried number and resent until acknowledged.
    pub fn send<M: Serialize + Sequenced>(&self, msg: &mut M) -> Result<Vec<u64>> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }

        let mut tx = lock(&self.shared.tx);

        let mut carried = Vec::new();
        for slot in msg.sequence_slots() {
            if *slot == 0 {
                *slot = tx.next_seq;
                tx.next_seq += 1;
            }
            carried.push(*slot);
        }

        let body = serde_json::to_vec(&*msg)?;
        if body.len() > self.shared.config.max_payload_size {
            return Err(ChannelError::Frame(FrameError::PayloadTooLarge {
                size: body.len(),
                max: self.shared.config.max_payload_size,
            }));
        }

        let mut framed = BytesMut::new();
        encode_frame(&body, &mut framed);

        if let Err(err) = tx.writer.send_raw(&framed) {
            drop(tx);
            self.shared.set_closed();
            return Err(err.into());
        }

        let frame = framed.to_vec();
        for seq in &carried {
            tx.pending.insert(*seq, frame.clone());
        }

        debug!(seqs = ?carried, bytes = body.len(), "frame sent");
        Ok(carried)
    }

    /// Pull the next deframed payload, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` on timeout without side effects and
    /// `Err(ChannelError::Closed)` once the channel is closed and drained.
    pub fn recv(&self, timeout: Duration) -> Result<Option<Bytes>> {
        match lock(&self.rx).recv_timeout(timeout) {
            Ok(payload) => Ok(Some(payload)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ChannelError::Closed),
        }
    }

    /// Remove `seq` from the pending set. No-op if absent.
    pub fn mark_acked(&self, seq: u64) {
        if lock(&self.shared.tx).pending.remove(&seq).is_some() {
            trace!(seq, "acked");
        }
    }

    /// Snapshot of currently unacknowledged sequence numbers.
    pub fn pending_acks(&self) -> Vec<u64> {
        lock(&self.shared.tx).pending.keys().copied().collect()
    }

    /// Whether the channel has been closed, locally or by the peer.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Address of the remote peer.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.shared.stream.peer_addr()?)
    }

    /// Set the shutdown flag and half-close the socket.
    ///
    /// Idempotent. Background threads observe closure and exit within one
    /// shutdown tick; blocked reads fail fast.
    pub fn close(&self) {
        self.shared.set_closed();
    }
}

impl Drop for ReliableChannel {
    fn drop(&mut self) {
        self.close();
        for handle in lock(&self.threads).drain(..) {
            let _ = handle.join();
        }
    }
}

/// Reads raw bytes, extracts complete frames, and enqueues payloads.
///
/// A zero-length read or I/O error marks the channel closed; dropping the
/// queue sender unblocks any pending `recv` with a closed signal.
fn recv_loop(
    shared: Arc<Shared>,
    stream: TcpStream,
    frame_config: FrameConfig,
    queue: Sender<Bytes>,
) {
    let mut reader = FrameReader::with_config(stream, frame_config);

    loop {
        if shared.closed.load(Ordering::SeqCst) {
            break;
        }

        match reader.read_frame() {
            Ok(payload) => {
                trace!(bytes = payload.len(), "frame received");
                if queue.send(payload).is_err() {
                    break;
                }
            }
            Err(FrameError::ConnectionClosed) => {
                if shared.closed.load(Ordering::SeqCst) {
                    debug!("connection closed locally");
                } else {
                    warn!("connection closed by peer");
                }
                break;
            }
            Err(err) => {
                if !shared.closed.load(Ordering::SeqCst) {
                    warn!(%err, "receive loop failed");
                }
                break;
            }
        }
    }

    shared.set_closed();
}

/// Resends every pending frame byte-for-byte on a doubling interval.
///
/// A write failure marks the channel closed.
fn retransmit_loop(shared: Arc<Shared>) {
    let mut interval = shared.config.retry_initial;

    loop {
        if !sleep_while_open(&shared, interval) {
            break;
        }

        let mut failed = false;
        {
            let mut tx = lock(&shared.tx);
            let TxState {
                ref pending,
                ref mut writer,
                ..
            } = *tx;

            for (seq, frame) in pending {
                if let Err(err) = writer.send_raw(frame) {
                    warn!(seq, %err, "retransmit failed");
                    failed = true;
                    break;
                }
                trace!(seq, "retransmitted");
            }
        }

        if failed {
            shared.set_closed();
            break;
        }

        interval = (interval * 2).min(shared.config.retry_ceiling);
    }
}

/// Sleep for `total`, waking every shutdown tick to observe the closed flag.
/// Returns false once the channel is closed.
fn sleep_while_open(shared: &Shared, total: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if shared.closed.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(shared.config.shutdown_tick.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::TcpListener;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Envelope {
        items: Vec<Item>,
        #[serde(default)]
        note: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Item {
        seq: u64,
        payload: String,
    }

    impl Item {
        fn new(payload: &str) -> Self {
            Self {
                seq: 0,
                payload: payload.to_string(),
            }
        }
    }

    impl Sequenced for Envelope {
        fn sequence_slots(&mut self) -> Vec<&mut u64> {
            self.items.iter_mut().map(|item| &mut item.seq).collect()
        }
    }

    fn fast_config() -> ChannelConfig {
        ChannelConfig {
            retry_initial: Duration::from_millis(20),
            retry_ceiling: Duration::from_millis(80),
            shutdown_tick: Duration::from_millis(5),
            ..ChannelConfig::default()
        }
    }

    /// Loopback pair: client-side channel plus the raw server stream.
    fn pair(config: ChannelConfig) -> (ReliableChannel, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let channel = ReliableChannel::connect_with_config(addr, config).unwrap();
        let (server, _) = listener.accept().unwrap();
        (channel, server)
    }

    fn read_payload(server: &mut TcpStream) -> Vec<u8> {
        let mut reader = FrameReader::new(server.try_clone().unwrap());
        reader.read_frame().unwrap().to_vec()
    }

    #[test]
    fn sequence_numbers_strictly_increase() {
        let (channel, _server) = pair(ChannelConfig::default());

        let mut seen = Vec::new();
        for n in 0..5 {
            let mut env = Envelope {
                items: vec![Item::new("a"), Item::new("b")],
                note: format!("batch-{n}"),
            };
            seen.extend(channel.send(&mut env).unwrap());
        }

        assert_eq!(seen.len(), 10);
        for window in seen.windows(2) {
            assert!(window[0] < window[1], "{seen:?} not strictly increasing");
        }
    }

    #[test]
    fn preset_sequence_numbers_are_preserved() {
        let (channel, _server) = pair(ChannelConfig::default());

        let mut env = Envelope {
            items: vec![
                Item {
                    seq: 7,
                    payload: "preset".to_string(),
                },
                Item::new("fresh"),
            ],
            note: String::new(),
        };
        let carried = channel.send(&mut env).unwrap();

        assert_eq!(carried[0], 7);
        assert_ne!(carried[1], 0);
        assert_ne!(carried[1], 7);
    }

    #[test]
    fn messages_without_slots_are_not_tracked() {
        let (channel, mut server) = pair(ChannelConfig::default());

        let mut env = Envelope {
            items: Vec::new(),
            note: "ack-only".to_string(),
        };
        let carried = channel.send(&mut env).unwrap();

        assert!(carried.is_empty());
        assert!(channel.pending_acks().is_empty());

        // Still hits the wire exactly once.
        let decoded: Envelope = serde_json::from_slice(&read_payload(&mut server)).unwrap();
        assert_eq!(decoded.note, "ack-only");
    }

    #[test]
    fn mark_acked_is_idempotent() {
        let (channel, _server) = pair(ChannelConfig::default());

        let mut env = Envelope {
            items: vec![Item::new("x")],
            note: String::new(),
        };
        let carried = channel.send(&mut env).unwrap();
        assert_eq!(channel.pending_acks(), carried);

        channel.mark_acked(carried[0]);
        channel.mark_acked(carried[0]);
        channel.mark_acked(9999); // absent: no-op

        assert!(channel.pending_acks().is_empty());
    }

    #[test]
    fn unacked_frame_is_retransmitted_byte_for_byte() {
        let (channel, server) = pair(fast_config());
        let mut reader = FrameReader::new(server);

        let mut env = Envelope {
            items: vec![Item::new("resend-me")],
            note: String::new(),
        };
        channel.send(&mut env).unwrap();

        let first = reader.read_frame().unwrap();
        // Several backoff intervals later the frame must still be identical.
        let second = reader.read_frame().unwrap();
        let third = reader.read_frame().unwrap();

        assert_eq!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn ack_stops_retransmission() {
        let (channel, mut server) = pair(fast_config());

        let mut env = Envelope {
            items: vec![Item::new("once")],
            note: String::new(),
        };
        let carried = channel.send(&mut env).unwrap();

        let _ = read_payload(&mut server);
        channel.mark_acked(carried[0]);

        // Allow any in-flight resend to land, then drain and expect silence.
        thread::sleep(Duration::from_millis(120));
        server
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        let mut sink = Vec::new();
        let _ = server.read_to_end(&mut sink); // times out
        thread::sleep(Duration::from_millis(120));

        let mut probe = [0u8; 64];
        let err = server.read(&mut probe);
        assert!(
            matches!(err, Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock
                || e.kind() == std::io::ErrorKind::TimedOut),
            "expected quiet wire after ack, got {err:?}"
        );
    }

    #[test]
    fn recv_times_out_without_side_effects() {
        let (channel, _server) = pair(ChannelConfig::default());

        let got = channel.recv(Duration::from_millis(30)).unwrap();
        assert!(got.is_none());
        assert!(!channel.is_closed());
    }

    #[test]
    fn recv_delivers_server_frames() {
        let (channel, server) = pair(ChannelConfig::default());

        let mut writer = FrameWriter::new(server);
        writer.send(b"{\"items\":[]}").unwrap();

        let payload = channel
            .recv(Duration::from_secs(1))
            .unwrap()
            .expect("frame should arrive");
        assert_eq!(payload.as_ref(), b"{\"items\":[]}");
    }

    #[test]
    fn peer_close_surfaces_as_closed() {
        let (channel, server) = pair(fast_config());
        drop(server);

        let mut closed = false;
        for _ in 0..50 {
            match channel.recv(Duration::from_millis(20)) {
                Err(ChannelError::Closed) => {
                    closed = true;
                    break;
                }
                Ok(None) => continue,
                other => panic!("unexpected recv result: {other:?}"),
            }
        }
        assert!(closed);
        assert!(channel.is_closed());
    }

    #[test]
    fn send_after_close_fails() {
        let (channel, _server) = pair(ChannelConfig::default());
        channel.close();
        channel.close(); // idempotent

        let mut env = Envelope {
            items: vec![Item::new("late")],
            note: String::new(),
        };
        assert!(matches!(
            channel.send(&mut env),
            Err(ChannelError::Closed)
        ));
    }
}
