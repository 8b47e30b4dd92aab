use worldlink_world::{ClientConfig, WorldClient};

use crate::cmd::{parse_duration, parse_warehouses, ProbeArgs};
use crate::exit::{world_error, CliResult, SUCCESS};
use crate::output::{print_probe, OutputFormat};

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let warehouses = parse_warehouses(&args.warehouses)?;

    let config = ClientConfig {
        handshake_timeout: timeout,
        ..ClientConfig::default()
    };

    let client = WorldClient::connect(args.addr.as_str(), &warehouses, config)
        .map_err(|err| world_error("connect failed", err))?;

    print_probe(&args.addr, client.world_id(), format);

    client.shutdown();
    Ok(SUCCESS)
}
