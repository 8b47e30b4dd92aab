use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("worldlink {}", env!("CARGO_PKG_VERSION"));
    if args.extended {
        println!("rust-version: {}", env!("CARGO_PKG_RUST_VERSION"));
        println!("repository: {}", env!("CARGO_PKG_REPOSITORY"));
    }
    Ok(SUCCESS)
}
