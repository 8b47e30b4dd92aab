use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::Table;
use worldlink_track::TrackerSnapshot;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Text for an interactive terminal, JSON when piped.
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            OutputFormat::Text
        } else {
            OutputFormat::Json
        }
    }
}

pub fn print_probe(addr: &str, world_id: u64, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("world {world_id} reachable at {addr}"),
        OutputFormat::Json => {
            let value = serde_json::json!({
                "addr": addr,
                "world_id": world_id,
            });
            println!("{value}");
        }
    }
}

pub fn print_summary(snapshot: &TrackerSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            let mut shipments = Table::new();
            shipments.set_header(vec!["shipment", "warehouse", "status", "items"]);
            for shipment in &snapshot.shipments {
                let items = shipment
                    .items
                    .iter()
                    .map(|(product, count)| format!("{product}x{count}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                shipments.add_row(vec![
                    shipment.id.to_string(),
                    shipment.warehouse.to_string(),
                    shipment.status.to_string(),
                    items,
                ]);
            }
            println!("{shipments}");

            let mut stock = Table::new();
            stock.set_header(vec!["product", "units"]);
            for (product, units) in &snapshot.stock {
                stock.add_row(vec![product.to_string(), units.to_string()]);
            }
            println!("{stock}");
        }
        OutputFormat::Json => {
            let shipments: Vec<serde_json::Value> = snapshot
                .shipments
                .iter()
                .map(|shipment| {
                    serde_json::json!({
                        "id": shipment.id,
                        "warehouse": shipment.warehouse,
                        "status": shipment.status.as_str(),
                        "destination": { "x": shipment.destination.0, "y": shipment.destination.1 },
                        "items": shipment
                            .items
                            .iter()
                            .map(|(product, count)| {
                                serde_json::json!({ "product": product, "count": count })
                            })
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            let stock: Vec<serde_json::Value> = snapshot
                .stock
                .iter()
                .map(|(product, units)| serde_json::json!({ "product": product, "units": units }))
                .collect();

            let value = serde_json::json!({
                "shipments": shipments,
                "stock": stock,
            });
            println!("{value}");
        }
    }
}
