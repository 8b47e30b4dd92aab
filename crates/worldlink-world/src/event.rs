use crate::wire::{Product, ResponseBatch};

/// A normalized application-level notification derived from a response batch.
///
/// Each protocol-borne variant is tagged with the server sequence number of
/// the sub-message it came from. `Finished` and `Disconnected` are terminal
/// sentinels emitted by the client itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// Purchased stock arrived at a warehouse.
    Arrived {
        warehouse: u64,
        things: Vec<Product>,
        seq: u64,
    },
    /// A shipment finished packing.
    Packed { shipment: u64, seq: u64 },
    /// A shipment was loaded onto its truck.
    Loaded { shipment: u64, seq: u64 },
    /// Reported status of a queried package.
    PackageStatus {
        package: u64,
        status: String,
        seq: u64,
    },
    /// The server rejected a command.
    Fault {
        message: String,
        origin_seq: u64,
        seq: u64,
    },
    /// The server declared the session finished.
    Finished,
    /// The channel closed mid-session.
    Disconnected,
}

/// Convert every sub-message of `batch` into a discrete event, in the order
/// the server listed them. The terminal `finished` flag is not an event here;
/// the dispatch loop emits the sentinel itself.
pub fn normalize(batch: &ResponseBatch) -> Vec<DomainEvent> {
    let mut events = Vec::new();

    for arrival in &batch.arrived {
        events.push(DomainEvent::Arrived {
            warehouse: arrival.warehouse,
            things: arrival.things.clone(),
            seq: arrival.seq,
        });
    }
    for ready in &batch.ready {
        events.push(DomainEvent::Packed {
            shipment: ready.shipment,
            seq: ready.seq,
        });
    }
    for loaded in &batch.loaded {
        events.push(DomainEvent::Loaded {
            shipment: loaded.shipment,
            seq: loaded.seq,
        });
    }
    for update in &batch.package_status {
        events.push(DomainEvent::PackageStatus {
            package: update.package,
            status: update.status.clone(),
            seq: update.seq,
        });
    }
    for fault in &batch.errors {
        events.push(DomainEvent::Fault {
            message: fault.message.clone(),
            origin_seq: fault.origin_seq,
            seq: fault.seq,
        });
    }

    events
}
