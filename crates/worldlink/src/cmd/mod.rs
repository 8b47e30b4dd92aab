use std::time::Duration;

use clap::{Args, Subcommand};
use worldlink_world::{Product, WarehouseSite};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod order;
pub mod probe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe the world server with a handshake round-trip.
    Probe(ProbeArgs),
    /// Purchase stock, place an order, and track it to delivery.
    Order(OrderArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Probe(args) => probe::run(args, format),
        Command::Order(args) => order::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// World server address (host:port).
    pub addr: String,
    /// Warehouse declared during the handshake (id,x,y). Repeatable.
    #[arg(long = "warehouse", value_name = "ID,X,Y")]
    pub warehouses: Vec<String>,
    /// Handshake timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct OrderArgs {
    /// World server address (host:port).
    pub addr: String,
    /// Warehouse topology (id,x,y). The order is placed at the first one.
    #[arg(long = "warehouse", value_name = "ID,X,Y", required = true)]
    pub warehouses: Vec<String>,
    /// Product to order (id:count). Repeatable.
    #[arg(long = "product", value_name = "ID:COUNT", required = true)]
    pub products: Vec<String>,
    /// Destination grid coordinates.
    #[arg(long, value_name = "X,Y", default_value = "0,0")]
    pub dest: String,
    /// Truck used for loading once the shipment is packed.
    #[arg(long, default_value = "1")]
    pub truck: u64,
    /// Simulation speed factor passed to the world.
    #[arg(long, env = "WORLDLINK_SIM_SPEED")]
    pub sim_speed: Option<u32>,
    /// Give up if the shipment has not been delivered after this long.
    #[arg(long, default_value = "120s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

/// Parse an `id,x,y` warehouse triple.
pub fn parse_warehouse(input: &str) -> CliResult<WarehouseSite> {
    let parts: Vec<&str> = input.split(',').collect();
    if parts.len() != 3 {
        return Err(CliError::new(
            USAGE,
            format!("expected ID,X,Y warehouse triple, got: {input}"),
        ));
    }
    let id = parts[0]
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid warehouse id: {input}")))?;
    let x = parts[1]
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid warehouse x: {input}")))?;
    let y = parts[2]
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid warehouse y: {input}")))?;
    Ok(WarehouseSite { id, x, y })
}

pub fn parse_warehouses(inputs: &[String]) -> CliResult<Vec<WarehouseSite>> {
    inputs.iter().map(|input| parse_warehouse(input)).collect()
}

/// Parse an `id:count` product pair.
pub fn parse_product(input: &str) -> CliResult<Product> {
    let (id, count) = input.split_once(':').ok_or_else(|| {
        CliError::new(USAGE, format!("expected ID:COUNT product pair, got: {input}"))
    })?;
    let id = id
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid product id: {input}")))?;
    let count = count
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid product count: {input}")))?;
    Ok(Product::new(id, format!("product-{id}"), count))
}

/// Parse an `x,y` destination pair.
pub fn parse_dest(input: &str) -> CliResult<(i32, i32)> {
    let (x, y) = input.split_once(',').ok_or_else(|| {
        CliError::new(USAGE, format!("expected X,Y destination pair, got: {input}"))
    })?;
    let x = x
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid destination x: {input}")))?;
    let y = y
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid destination y: {input}")))?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_warehouse_triple() {
        let site = parse_warehouse("1, 3, 4").unwrap();
        assert_eq!((site.id, site.x, site.y), (1, 3, 4));

        assert!(parse_warehouse("1,3").is_err());
        assert!(parse_warehouse("a,b,c").is_err());
    }

    #[test]
    fn parse_product_pair() {
        let product = parse_product("101:5").unwrap();
        assert_eq!((product.id, product.count), (101, 5));

        assert!(parse_product("101").is_err());
        assert!(parse_product("101:lots").is_err());
    }

    #[test]
    fn parse_dest_pair() {
        assert_eq!(parse_dest("7,7").unwrap(), (7, 7));
        assert_eq!(parse_dest("-3, 12").unwrap(), (-3, 12));
        assert!(parse_dest("7").is_err());
    }
}
