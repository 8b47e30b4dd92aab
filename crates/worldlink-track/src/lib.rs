//! Inventory and shipment lifecycle tracking.
//!
//! Consumes [`worldlink_world::DomainEvent`]s, advances each shipment along a
//! monotonic status machine, and credits warehouse stock on confirmed
//! arrivals. All mutable state lives in one owned store exposed only through
//! [`LifecycleTracker`] methods.

pub mod error;
pub mod status;
pub mod tracker;

pub use error::{Result, TrackError};
pub use status::ShipmentStatus;
pub use tracker::{LifecycleTracker, PurchaseSink, Shipment, TrackerSnapshot};
