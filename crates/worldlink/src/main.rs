mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "worldlink", version, about = "Warehouse world simulator client")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_probe_subcommand() {
        let cli = Cli::try_parse_from([
            "worldlink",
            "probe",
            "127.0.0.1:23456",
            "--warehouse",
            "1,3,4",
            "--timeout",
            "3s",
        ])
        .expect("probe args should parse");

        assert!(matches!(cli.command, Command::Probe(_)));
    }

    #[test]
    fn parses_order_subcommand() {
        let cli = Cli::try_parse_from([
            "worldlink",
            "order",
            "127.0.0.1:23456",
            "--warehouse",
            "1,10,20",
            "--product",
            "101:5",
            "--dest",
            "7,7",
        ])
        .expect("order args should parse");

        assert!(matches!(cli.command, Command::Order(_)));
    }

    #[test]
    fn order_requires_a_product() {
        let err = Cli::try_parse_from([
            "worldlink",
            "order",
            "127.0.0.1:23456",
            "--warehouse",
            "1,10,20",
        ])
        .expect_err("missing --product should fail");

        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }
}
