use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};
use worldlink_world::{DomainEvent, Product, WorldClient};

use crate::error::{Result, TrackError};
use crate::status::ShipmentStatus;

/// Issues purchase commands toward the world.
///
/// Seam between the tracker and the protocol client so order creation is
/// testable without a socket.
pub trait PurchaseSink {
    fn purchase(&self, warehouse: u64, things: Vec<Product>) -> worldlink_world::Result<u64>;
}

impl PurchaseSink for WorldClient {
    fn purchase(&self, warehouse: u64, things: Vec<Product>) -> worldlink_world::Result<u64> {
        self.buy(warehouse, things)
    }
}

/// One trackable shipment progressing from `packing` to `delivered`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    pub id: u64,
    pub warehouse: u64,
    /// Requested items: product id → quantity.
    pub items: BTreeMap<u64, u32>,
    pub destination: (i32, i32),
    pub status: ShipmentStatus,
}

/// Point-in-time copy of tracker state for read paths.
#[derive(Debug, Clone, Default)]
pub struct TrackerSnapshot {
    pub shipments: Vec<Shipment>,
    pub stock: BTreeMap<u64, u64>,
}

#[derive(Default)]
struct TrackerState {
    shipments: HashMap<u64, Shipment>,
    /// Product id → units on hand, credited only by confirmed arrivals.
    stock: BTreeMap<u64, u64>,
    next_shipment_id: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Consumes domain events and drives the shipment status machine.
///
/// Shipment status only advances forward along the fixed order, never
/// regresses, and is frozen once `delivered`. Stock is credited only by
/// confirmed arrival events, never speculatively.
pub struct LifecycleTracker {
    state: Mutex<TrackerState>,
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                next_shipment_id: 1,
                ..TrackerState::default()
            }),
        }
    }

    /// Build a tracker with pre-seeded stock records.
    pub fn with_stock(initial: impl IntoIterator<Item = (u64, u64)>) -> Self {
        let tracker = Self::new();
        lock(&tracker.state).stock.extend(initial);
        tracker
    }

    /// Create an order after a stock check and issue the purchase command.
    ///
    /// Fails with [`TrackError::InsufficientStock`] without mutating any
    /// state if any requested item exceeds the recorded stock. Otherwise the
    /// shipment is persisted at `packing` and the purchase goes out through
    /// `sink`.
    pub fn create_order(
        &self,
        sink: &dyn PurchaseSink,
        warehouse: u64,
        items: &BTreeMap<u64, u32>,
        destination: (i32, i32),
    ) -> Result<u64> {
        let id = {
            let mut state = lock(&self.state);

            for (product, need) in items {
                let have = state.stock.get(product).copied().unwrap_or(0);
                if have < u64::from(*need) {
                    return Err(TrackError::InsufficientStock {
                        product: *product,
                        have,
                        need: u64::from(*need),
                    });
                }
            }

            let id = state.next_shipment_id;
            state.next_shipment_id += 1;
            state.shipments.insert(
                id,
                Shipment {
                    id,
                    warehouse,
                    items: items.clone(),
                    destination,
                    status: ShipmentStatus::Packing,
                },
            );
            id
        };

        let things = items
            .iter()
            .map(|(product, count)| Product::new(*product, "", *count))
            .collect();
        if let Err(err) = sink.purchase(warehouse, things) {
            // The order never made it onto the wire; take the record back.
            lock(&self.state).shipments.remove(&id);
            return Err(err.into());
        }

        info!(shipment = id, warehouse, "order created");
        Ok(id)
    }

    /// Apply one domain event to the store.
    ///
    /// Events for unknown shipments are logged and ignored; an arrival for an
    /// unknown product creates a zero-stock record and credits it.
    pub fn apply(&self, event: &DomainEvent) {
        match event {
            DomainEvent::Arrived {
                warehouse, things, ..
            } => {
                let mut state = lock(&self.state);
                for product in things {
                    let slot = state.stock.entry(product.id).or_insert(0);
                    *slot += u64::from(product.count);
                }
                info!(warehouse, items = things.len(), "stock credited");
            }
            DomainEvent::Packed { shipment, .. } => {
                self.advance(*shipment, ShipmentStatus::Packed);
            }
            DomainEvent::Loaded { shipment, .. } => {
                self.advance(*shipment, ShipmentStatus::Loaded);
            }
            DomainEvent::PackageStatus {
                package, status, ..
            } => match ShipmentStatus::parse(status) {
                Some(target) => self.advance(*package, target),
                None => warn!(package, %status, "unparseable package status, ignoring"),
            },
            DomainEvent::Fault {
                message, origin_seq, ..
            } => {
                warn!(origin_seq, %message, "world fault");
            }
            DomainEvent::Finished => info!("world session finished"),
            DomainEvent::Disconnected => warn!("world connection lost"),
        }
    }

    /// Last-known status of a shipment.
    pub fn status_of(&self, shipment: u64) -> Option<ShipmentStatus> {
        lock(&self.state)
            .shipments
            .get(&shipment)
            .map(|record| record.status)
    }

    /// Recorded stock for a product. Unknown products read as zero.
    pub fn stock_of(&self, product: u64) -> u64 {
        lock(&self.state).stock.get(&product).copied().unwrap_or(0)
    }

    /// Copy of a shipment record.
    pub fn shipment(&self, id: u64) -> Option<Shipment> {
        lock(&self.state).shipments.get(&id).cloned()
    }

    /// Point-in-time copy of all shipments and stock, ordered by id.
    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = lock(&self.state);
        let mut shipments: Vec<Shipment> = state.shipments.values().cloned().collect();
        shipments.sort_by_key(|shipment| shipment.id);
        TrackerSnapshot {
            shipments,
            stock: state.stock.clone(),
        }
    }

    fn advance(&self, shipment: u64, target: ShipmentStatus) {
        let mut state = lock(&self.state);
        let Some(record) = state.shipments.get_mut(&shipment) else {
            warn!(shipment, status = %target, "event for unknown shipment, ignoring");
            return;
        };

        if target > record.status {
            debug!(shipment, from = %record.status, to = %target, "status advanced");
            record.status = target;
        } else {
            debug!(shipment, current = %record.status, reported = %target, "stale status, ignoring");
        }
    }
}
