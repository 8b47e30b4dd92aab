//! Wire schema for the world simulator protocol.
//!
//! One outbound frame is either a [`ConnectRequest`] (first frame of a
//! session) or a [`CommandBatch`] bundling sub-requests, each carrying its
//! own client-allocated sequence number (0 = unset). Inbound frames are a
//! single [`ConnectReply`] followed by [`ResponseBatch`]es whose sub-messages
//! carry server-allocated sequence numbers that must be acknowledged back.

use serde::{Deserialize, Serialize};
use worldlink_channel::Sequenced;

/// Success token carried by a [`ConnectReply`].
pub const CONNECT_OK: &str = "connected!";

/// A product line item: catalog id, human description, quantity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: u64,
    #[serde(default)]
    pub description: String,
    pub count: u32,
}

impl Product {
    pub fn new(id: u64, description: impl Into<String>, count: u32) -> Self {
        Self {
            id,
            description: description.into(),
            count,
        }
    }
}

/// Initial warehouse declared during the handshake: id plus grid coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WarehouseSite {
    pub id: u64,
    pub x: i32,
    pub y: i32,
}

/// Handshake request: initiating role plus warehouse topology.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Distinguishes the warehouse-side client from the carrier side.
    pub is_warehouse_client: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warehouses: Vec<WarehouseSite>,
    /// Rejoin an existing world instead of creating one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_id: Option<u64>,
}

/// Handshake reply: server-assigned world id plus a result token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectReply {
    pub world_id: u64,
    pub result: String,
}

impl ConnectReply {
    pub fn is_ok(&self) -> bool {
        self.result == CONNECT_OK
    }
}

/// Replenish stock at a warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuyRequest {
    pub warehouse: u64,
    pub things: Vec<Product>,
    #[serde(default)]
    pub seq: u64,
}

/// Pack a shipment's items at a warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackRequest {
    pub warehouse: u64,
    pub things: Vec<Product>,
    pub shipment: u64,
    #[serde(default)]
    pub seq: u64,
}

/// Load a packed shipment onto a truck.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadRequest {
    pub warehouse: u64,
    pub truck: u64,
    pub shipment: u64,
    #[serde(default)]
    pub seq: u64,
}

/// Ask for the current status of a package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRequest {
    pub package: u64,
    #[serde(default)]
    pub seq: u64,
}

/// Outbound envelope: repeated sub-requests plus accumulated ACKs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandBatch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buy: Vec<BuyRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pack: Vec<PackRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub load: Vec<LoadRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<QueryRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acks: Vec<u64>,
    /// Simulation speed factor applied by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sim_speed: Option<u32>,
    /// Graceful session teardown notice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnect: Option<bool>,
}

impl CommandBatch {
    /// True when the envelope carries no sub-requests (ACK/heartbeat only).
    pub fn is_empty(&self) -> bool {
        self.buy.is_empty() && self.pack.is_empty() && self.load.is_empty() && self.queries.is_empty()
    }
}

impl Sequenced for CommandBatch {
    fn sequence_slots(&mut self) -> Vec<&mut u64> {
        let mut slots = Vec::new();
        slots.extend(self.buy.iter_mut().map(|r| &mut r.seq));
        slots.extend(self.pack.iter_mut().map(|r| &mut r.seq));
        slots.extend(self.load.iter_mut().map(|r| &mut r.seq));
        slots.extend(self.queries.iter_mut().map(|r| &mut r.seq));
        slots
    }
}

impl Sequenced for ConnectRequest {
    // The handshake carries no child requests; its delivery is covered by the
    // bounded connect wait, not the retransmission set.
    fn sequence_slots(&mut self) -> Vec<&mut u64> {
        Vec::new()
    }
}

/// Confirmed stock arrival at a warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Arrival {
    pub warehouse: u64,
    pub things: Vec<Product>,
    #[serde(default)]
    pub seq: u64,
}

/// A shipment finished packing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackReady {
    pub shipment: u64,
    #[serde(default)]
    pub seq: u64,
}

/// A shipment was loaded onto its truck.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TruckLoaded {
    pub shipment: u64,
    #[serde(default)]
    pub seq: u64,
}

/// Queried package status report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageUpdate {
    pub package: u64,
    pub status: String,
    #[serde(default)]
    pub seq: u64,
}

/// The server rejected a command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorldFault {
    pub message: String,
    /// Sequence number of the command being rejected.
    pub origin_seq: u64,
    #[serde(default)]
    pub seq: u64,
}

/// Inbound envelope: repeated sub-responses, ACK list, terminal flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseBatch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arrived: Vec<Arrival>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ready: Vec<PackReady>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loaded: Vec<TruckLoaded>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_status: Vec<PackageUpdate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<WorldFault>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acks: Vec<u64>,
    #[serde(default)]
    pub finished: bool,
}

impl ResponseBatch {
    /// Server-allocated sequence numbers that must be acknowledged back.
    pub fn ack_numbers(&self) -> Vec<u64> {
        let mut seqs = Vec::new();
        seqs.extend(self.arrived.iter().map(|m| m.seq));
        seqs.extend(self.ready.iter().map(|m| m.seq));
        seqs.extend(self.loaded.iter().map(|m| m.seq));
        seqs.extend(self.package_status.iter().map(|m| m.seq));
        seqs.extend(self.errors.iter().map(|m| m.seq));
        seqs
    }
}
