use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use worldlink_track::{LifecycleTracker, ShipmentStatus};
use worldlink_world::{ClientConfig, DomainEvent, Product, WorldClient};

use crate::cmd::{parse_dest, parse_duration, parse_product, parse_warehouses, OrderArgs};
use crate::exit::{
    track_error, world_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT,
};
use crate::output::{print_summary, OutputFormat};

/// Drive one shipment end to end: replenish stock, place the order once the
/// stock has arrived, pack, load, and follow status events until delivery.
pub fn run(args: OrderArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let warehouses = parse_warehouses(&args.warehouses)?;
    let destination = parse_dest(&args.dest)?;

    let products: Vec<Product> = args
        .products
        .iter()
        .map(|input| parse_product(input))
        .collect::<CliResult<_>>()?;
    let items: BTreeMap<u64, u32> = products
        .iter()
        .map(|product| (product.id, product.count))
        .collect();
    let warehouse = warehouses[0].id;

    let config = ClientConfig {
        sim_speed: args.sim_speed,
        ..ClientConfig::default()
    };
    let client = WorldClient::connect(args.addr.as_str(), &warehouses, config)
        .map_err(|err| world_error("connect failed", err))?;
    info!(world_id = client.world_id(), "connected");

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&interrupted);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .map_err(|err| CliError::new(INTERNAL, format!("signal handler: {err}")))?;
    }

    let tracker = LifecycleTracker::new();

    client
        .buy(warehouse, products.clone())
        .map_err(|err| world_error("purchase failed", err))?;
    info!(warehouse, "stock purchase sent, waiting for arrival");

    let deadline = Instant::now() + timeout;
    let mut shipment: Option<u64> = None;

    while Instant::now() < deadline && !interrupted.load(Ordering::SeqCst) {
        let Some(event) = client.poll_event(Duration::from_millis(200)) else {
            if !client.is_running() {
                break;
            }
            continue;
        };

        let terminal = matches!(event, DomainEvent::Finished | DomainEvent::Disconnected);
        tracker.apply(&event);

        if matches!(event, DomainEvent::Arrived { .. }) && shipment.is_none() {
            let id = tracker
                .create_order(&client, warehouse, &items, destination)
                .map_err(|err| track_error("order rejected", err))?;
            client
                .pack(warehouse, products.clone(), id)
                .map_err(|err| world_error("pack failed", err))?;
            shipment = Some(id);
        }

        if let DomainEvent::Packed { shipment: packed, .. } = event {
            if shipment == Some(packed) {
                if let Err(err) = client.load(warehouse, args.truck, packed) {
                    warn!(%err, "load command failed");
                }
            }
        }

        if let Some(id) = shipment {
            if tracker.status_of(id) == Some(ShipmentStatus::Delivered) {
                info!(shipment = id, "delivered");
                break;
            }
        }

        if terminal {
            break;
        }
    }

    print_summary(&tracker.snapshot(), format);
    client.shutdown();

    let delivered = shipment
        .map(|id| tracker.status_of(id) == Some(ShipmentStatus::Delivered))
        .unwrap_or(false);

    if delivered || interrupted.load(Ordering::SeqCst) {
        Ok(SUCCESS)
    } else {
        Err(CliError::new(
            TIMEOUT,
            format!("shipment not delivered within {}", args.timeout),
        ))
    }
}
