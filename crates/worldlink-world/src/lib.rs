//! World protocol client for the warehouse automation simulator.
//!
//! Builds domain command envelopes (buy/pack/load/query) over a
//! [`worldlink_channel::ReliableChannel`], manages the connect handshake and
//! keep-alive heartbeats, buffers pack commands until stock is confirmed
//! present, and demultiplexes inbound response batches into discrete
//! [`DomainEvent`]s on a bounded queue.

pub mod client;
pub mod error;
pub mod event;
pub mod wire;

pub use client::{ClientConfig, WorldClient};
pub use error::{Result, WorldError};
pub use event::DomainEvent;
pub use wire::{
    Arrival, BuyRequest, CommandBatch, ConnectReply, ConnectRequest, LoadRequest, PackReady,
    PackRequest, PackageUpdate, Product, QueryRequest, ResponseBatch, TruckLoaded, WarehouseSite,
    WorldFault, CONNECT_OK,
};
