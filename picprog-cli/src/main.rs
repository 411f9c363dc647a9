//! picprog CLI - command-line tool for the two-stage in-circuit flash programmer.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use env_logger::Env;
use std::path::PathBuf;

mod commands;
mod config;
mod serial;

use config::Config;
use serial::SerialChannel;

/// picprog - host tool for the ICSP flash programmer.
#[derive(Parser)]
#[command(name = "picprog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port the programmer is attached to.
    #[arg(short, long, env = "PICPROG_PORT")]
    port: Option<String>,

    /// Baud rate for the CDC-ACM link.
    #[arg(short, long, env = "PICPROG_BAUD")]
    baud: Option<u32>,

    /// Verbose output level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Check that the programmer firmware is alive.
    Ping,
    /// Report the programmer firmware's version string.
    Version,
    /// Bring the target up and upload the ramapp.
    Connect,
    /// Release the target and ICSP lines.
    Disconnect,
    /// Pulse the target's reset line.
    Reset,
    /// Read the raw MTAP status byte.
    DeviceStatus,
    /// Erase the entire chip.
    ChipErase,
    /// Stream a binary image into flash via the double-buffered fast-write path.
    FastWrite {
        /// Path to the binary image. Its size must be a nonzero multiple of 256 bytes.
        file: PathBuf,

        /// Target flash address, e.g. `0x1D000000`.
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,
    },
    /// List serial ports visible to the host.
    ListPorts,
}

fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(s, 16).map_err(|e| format!("invalid hex address: {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    if let Commands::ListPorts = cli.command {
        return cmd_list_ports();
    }

    let config = Config::load();
    let port = config
        .resolve_port(cli.port.clone())
        .context("no serial port specified; pass --port or set PICPROG_PORT")?;
    let baud = config.resolve_baud(cli.baud);

    log::debug!("opening {port} at {baud} baud");
    let mut channel = SerialChannel::open(&port, baud)
        .with_context(|| format!("failed to open serial port {port}"))?;

    match cli.command {
        Commands::Ping => {
            commands::ping(&mut channel)?;
            println!("{}", style("ping ok").green());
        },
        Commands::Version => {
            let version = commands::version(&mut channel)?;
            println!("{}", version);
        },
        Commands::Connect => {
            commands::connect(&mut channel)?;
            println!("{}", style("connected").green());
        },
        Commands::Disconnect => {
            commands::disconnect(&mut channel)?;
            println!("{}", style("disconnected").green());
        },
        Commands::Reset => {
            commands::reset(&mut channel)?;
            println!("{}", style("reset").green());
        },
        Commands::DeviceStatus => {
            let status = commands::device_status(&mut channel)?;
            println!("status: 0x{status:02X}");
        },
        Commands::ChipErase => {
            println!("{} erasing chip, this can take a few seconds...", style("i").blue());
            commands::chip_erase(&mut channel)?;
            println!("{}", style("chip erased").green());
        },
        Commands::FastWrite { file, address } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            println!(
                "{} writing {} bytes to 0x{:08X}",
                style("i").blue(),
                data.len(),
                address
            );
            commands::fast_write(&mut channel, address, &data)?;
        },
        Commands::ListPorts => unreachable!("handled above"),
    }

    Ok(())
}

fn cmd_list_ports() -> Result<()> {
    println!("{}", style("Available Serial Ports").bold().underlined());
    let ports = serial::list_ports().context("failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("  {}", style("no serial ports found").dim());
    } else {
        for port in ports {
            println!("  {} {}", style("-").green(), port);
        }
    }
    Ok(())
}
