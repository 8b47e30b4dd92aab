use std::collections::{HashMap, HashSet};
use std::net::ToSocketAddrs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};
use worldlink_channel::{ChannelConfig, ReliableChannel};

use crate::error::{Result, WorldError};
use crate::event::{normalize, DomainEvent};
use crate::wire::{
    BuyRequest, CommandBatch, ConnectReply, ConnectRequest, LoadRequest, PackRequest, Product,
    QueryRequest, ResponseBatch, WarehouseSite,
};

/// Configuration for a [`WorldClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum wait for the handshake reply.
    pub handshake_timeout: Duration,
    /// Keep-alive interval. Must stay below the server's idle timeout.
    pub heartbeat_interval: Duration,
    /// Dispatch-loop poll timeout; exists solely to notice shutdown promptly.
    pub dispatch_poll: Duration,
    /// Capacity of the application-visible event queue.
    pub event_queue_bound: usize,
    /// Simulation speed factor attached to outbound command envelopes.
    pub sim_speed: Option<u32>,
    /// Underlying channel configuration.
    pub channel: ChannelConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(10),
            dispatch_poll: Duration::from_millis(100),
            event_queue_bound: 128,
            sim_speed: None,
            channel: ChannelConfig::default(),
        }
    }
}

#[derive(Default)]
struct PackGate {
    /// Warehouses with at least one confirmed arrival.
    ready: HashSet<u64>,
    /// Pack requests held until their warehouse reports an arrival.
    held: HashMap<u64, Vec<PackRequest>>,
}

struct ClientShared {
    channel: ReliableChannel,
    running: AtomicBool,
    world_id: u64,
    /// Server sequence numbers received but not yet acknowledged back.
    ack_outbox: Mutex<Vec<u64>>,
    pack_gate: Mutex<PackGate>,
    events: SyncSender<DomainEvent>,
    config: ClientConfig,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stateful client for one world session.
///
/// `connect` performs the handshake and starts the dispatch and heartbeat
/// threads; command methods may be called concurrently from any thread.
/// Events are drained through [`WorldClient::poll_event`]; the stream ends
/// with a `Finished` or `Disconnected` sentinel.
pub struct WorldClient {
    shared: Arc<ClientShared>,
    events_rx: Mutex<Receiver<DomainEvent>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for WorldClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldClient").finish_non_exhaustive()
    }
}

impl WorldClient {
    /// Connect to the world server and perform the handshake.
    ///
    /// Fails with [`WorldError::HandshakeTimeout`] if no reply arrives within
    /// the configured wait and [`WorldError::Handshake`] if the reply's result
    /// token is not the success value. On success the dispatch and heartbeat
    /// threads are running and the server-assigned world id is available via
    /// [`WorldClient::world_id`].
    pub fn connect(
        addr: impl ToSocketAddrs,
        warehouses: &[WarehouseSite],
        config: ClientConfig,
    ) -> Result<Self> {
        let channel = ReliableChannel::connect_with_config(addr, config.channel.clone())?;
        if let Ok(peer) = channel.peer_addr() {
            info!(%peer, "connecting to world");
        }

        let mut hello = ConnectRequest {
            is_warehouse_client: true,
            warehouses: warehouses.to_vec(),
            world_id: None,
        };
        channel.send(&mut hello)?;

        let raw = channel
            .recv(config.handshake_timeout)?
            .ok_or(WorldError::HandshakeTimeout(config.handshake_timeout))?;
        let reply: ConnectReply = serde_json::from_slice(&raw)?;
        if !reply.is_ok() {
            return Err(WorldError::Handshake(reply.result));
        }
        info!(world_id = reply.world_id, "handshake complete");

        let (events_tx, events_rx) = mpsc::sync_channel(config.event_queue_bound);
        let shared = Arc::new(ClientShared {
            channel,
            running: AtomicBool::new(true),
            world_id: reply.world_id,
            ack_outbox: Mutex::new(Vec::new()),
            pack_gate: Mutex::new(PackGate::default()),
            events: events_tx,
            config,
        });

        let dispatch_shared = Arc::clone(&shared);
        let dispatch_handle = thread::Builder::new()
            .name("worldlink-dispatch".into())
            .spawn(move || dispatch_loop(dispatch_shared))
            .map_err(worldlink_channel::ChannelError::Io)?;

        let heartbeat_shared = Arc::clone(&shared);
        let heartbeat_handle = thread::Builder::new()
            .name("worldlink-heartbeat".into())
            .spawn(move || heartbeat_loop(heartbeat_shared))
            .map_err(worldlink_channel::ChannelError::Io)?;

        Ok(Self {
            shared,
            events_rx: Mutex::new(events_rx),
            threads: Mutex::new(vec![dispatch_handle, heartbeat_handle]),
        })
    }

    /// Server-assigned world id for this session.
    pub fn world_id(&self) -> u64 {
        self.shared.world_id
    }

    /// Whether the client is still connected and dispatching.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Client sequence numbers still awaiting a server acknowledgment.
    pub fn pending_commands(&self) -> Vec<u64> {
        self.shared.channel.pending_acks()
    }

    /// Replenish stock at `warehouse`. Returns the allocated sequence number.
    pub fn buy(&self, warehouse: u64, things: Vec<Product>) -> Result<u64> {
        self.ensure_running()?;
        let batch = CommandBatch {
            buy: vec![BuyRequest {
                warehouse,
                things,
                seq: 0,
            }],
            ..CommandBatch::default()
        };
        let carried = send_batch(&self.shared, batch)?;
        Ok(carried.into_iter().next().unwrap_or_default())
    }

    /// Pack `shipment` at `warehouse`.
    ///
    /// If the warehouse has not yet reported a confirmed arrival, the request
    /// is held and released automatically the instant an arrival for that
    /// warehouse is processed; callers never poll.
    pub fn pack(&self, warehouse: u64, things: Vec<Product>, shipment: u64) -> Result<()> {
        self.ensure_running()?;
        let request = PackRequest {
            warehouse,
            things,
            shipment,
            seq: 0,
        };

        {
            let mut gate = lock(&self.shared.pack_gate);
            if !gate.ready.contains(&warehouse) {
                info!(warehouse, shipment, "holding pack until stock arrives");
                gate.held.entry(warehouse).or_default().push(request);
                return Ok(());
            }
        }

        let batch = CommandBatch {
            pack: vec![request],
            ..CommandBatch::default()
        };
        send_batch(&self.shared, batch)?;
        Ok(())
    }

    /// Load `shipment` onto `truck` at `warehouse`.
    pub fn load(&self, warehouse: u64, truck: u64, shipment: u64) -> Result<u64> {
        self.ensure_running()?;
        let batch = CommandBatch {
            load: vec![LoadRequest {
                warehouse,
                truck,
                shipment,
                seq: 0,
            }],
            ..CommandBatch::default()
        };
        let carried = send_batch(&self.shared, batch)?;
        Ok(carried.into_iter().next().unwrap_or_default())
    }

    /// Query the status of `package`.
    pub fn query(&self, package: u64) -> Result<u64> {
        self.ensure_running()?;
        let batch = CommandBatch {
            queries: vec![QueryRequest { package, seq: 0 }],
            ..CommandBatch::default()
        };
        let carried = send_batch(&self.shared, batch)?;
        Ok(carried.into_iter().next().unwrap_or_default())
    }

    /// Pull the next domain event, waiting up to `timeout`.
    pub fn poll_event(&self, timeout: Duration) -> Option<DomainEvent> {
        match lock(&self.events_rx).recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Shut the client down.
    ///
    /// Idempotent: flips the running flag, best-effort sends a disconnect
    /// notice, closes the channel, and joins the background threads (each
    /// observes closure within one poll tick).
    pub fn shutdown(&self) {
        shutdown_shared(&self.shared);

        let current = thread::current().id();
        for handle in lock(&self.threads).drain(..) {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(WorldError::NotRunning)
        }
    }
}

impl Drop for WorldClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Attach drained ACKs and the speed factor, then transmit.
fn send_batch(shared: &ClientShared, mut batch: CommandBatch) -> Result<Vec<u64>> {
    {
        let mut outbox = lock(&shared.ack_outbox);
        batch.acks.append(&mut outbox);
    }
    if batch.sim_speed.is_none() {
        batch.sim_speed = shared.config.sim_speed;
    }
    Ok(shared.channel.send(&mut batch)?)
}

/// Push an event to the bounded queue; a full queue drops the newest event
/// with a warning rather than blocking the network path.
fn emit_event(shared: &ClientShared, event: DomainEvent) {
    match shared.events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            warn!(?event, "event queue full, dropping newest event");
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

/// Mark `warehouse` as stocked and transmit any held pack requests, each
/// exactly once.
fn release_held_packs(shared: &ClientShared, warehouse: u64) {
    let held = {
        let mut gate = lock(&shared.pack_gate);
        gate.ready.insert(warehouse);
        gate.held.remove(&warehouse).unwrap_or_default()
    };

    for request in held {
        info!(warehouse, shipment = request.shipment, "releasing held pack");
        let batch = CommandBatch {
            pack: vec![request],
            ..CommandBatch::default()
        };
        if let Err(err) = send_batch(shared, batch) {
            warn!(%err, "failed to transmit released pack");
        }
    }
}

/// Flush the ACK outbox toward the peer if it is non-empty.
fn flush_acks(shared: &ClientShared) {
    let has_acks = !lock(&shared.ack_outbox).is_empty();
    if !has_acks {
        return;
    }
    if let Err(err) = send_batch(shared, CommandBatch::default()) {
        warn!(%err, "ack flush failed");
    }
}

/// Apply one inbound response batch. Returns true on the terminal flag.
fn handle_batch(shared: &ClientShared, batch: &ResponseBatch) -> bool {
    for ack in &batch.acks {
        shared.channel.mark_acked(*ack);
    }
    // A rejection also stops retransmission of the rejected command.
    for fault in &batch.errors {
        warn!(
            origin_seq = fault.origin_seq,
            message = %fault.message,
            "world rejected command"
        );
        shared.channel.mark_acked(fault.origin_seq);
    }

    for arrival in &batch.arrived {
        release_held_packs(shared, arrival.warehouse);
    }

    for event in normalize(batch) {
        emit_event(shared, event);
    }

    // Bound peer-side retry pressure: acknowledge this batch now instead of
    // waiting for the next heartbeat.
    let to_ack = batch.ack_numbers();
    if !to_ack.is_empty() {
        lock(&shared.ack_outbox).extend(to_ack);
        flush_acks(shared);
    }

    batch.finished
}

/// Receives deframed batches and turns them into ACK bookkeeping plus events.
fn dispatch_loop(shared: Arc<ClientShared>) {
    while shared.running.load(Ordering::SeqCst) {
        match shared.channel.recv(shared.config.dispatch_poll) {
            Ok(None) => continue,
            Ok(Some(raw)) => {
                let batch: ResponseBatch = match serde_json::from_slice(&raw) {
                    Ok(batch) => batch,
                    Err(err) => {
                        warn!(%err, "malformed response payload, skipping");
                        continue;
                    }
                };
                trace!(acks = batch.acks.len(), "response batch received");

                if handle_batch(&shared, &batch) {
                    info!("world reported finished, disconnecting");
                    emit_event(&shared, DomainEvent::Finished);
                    shutdown_shared(&shared);
                    break;
                }
            }
            Err(_) => {
                if shared.running.load(Ordering::SeqCst) {
                    warn!("channel closed mid-session");
                    emit_event(&shared, DomainEvent::Disconnected);
                    shutdown_shared(&shared);
                }
                break;
            }
        }
    }
}

/// Keeps the connection alive and bounds ACK latency during idle periods.
fn heartbeat_loop(shared: Arc<ClientShared>) {
    loop {
        if !sleep_while_running(&shared, shared.config.heartbeat_interval) {
            break;
        }

        match send_batch(&shared, CommandBatch::default()) {
            Ok(_) => trace!("heartbeat sent"),
            Err(err) => {
                if shared.running.load(Ordering::SeqCst) {
                    warn!(%err, "heartbeat failed");
                }
                break;
            }
        }
    }
}

fn shutdown_shared(shared: &ClientShared) {
    if !shared.running.swap(false, Ordering::SeqCst) {
        return;
    }

    let mut goodbye = CommandBatch {
        disconnect: Some(true),
        ..CommandBatch::default()
    };
    if let Err(err) = shared.channel.send(&mut goodbye) {
        debug!(%err, "disconnect notice not sent");
    }

    shared.channel.close();
    info!("world client shut down");
}

/// Sleep for `total`, waking on the channel's shutdown tick to observe the
/// running flag. Returns false once the client stops running.
fn sleep_while_running(shared: &ClientShared, total: Duration) -> bool {
    let deadline = Instant::now() + total;
    let tick = shared.config.channel.shutdown_tick;
    loop {
        if !shared.running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(tick.min(deadline - now));
    }
}
