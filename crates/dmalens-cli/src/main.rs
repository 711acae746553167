use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dmalens_core::{Config, ShutdownSignal};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;
mod hex_utils;

#[derive(Parser)]
#[command(name = "dmalens")]
#[command(about = "Remote process memory inspector")]
struct Args {
    #[arg(short, long, default_value = "dmalens.json")]
    config: PathBuf,

    /// Target process name (overrides the config file)
    #[arg(short, long)]
    process: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the target process and module base
    Info {
        /// Module to resolve (defaults to the configured module)
        #[arg(short, long)]
        module: Option<String>,
    },
    /// Dump raw memory at an address
    Hexdump {
        /// Hex address to read from
        address: String,
        /// Number of bytes to read
        #[arg(default_value_t = 256)]
        size: usize,
        /// Print an ASCII column
        #[arg(short, long)]
        ascii: bool,
    },
    /// Walk a pointer chain from the module base
    Chain {
        /// Comma-separated hex offsets, e.g. 0x17F8D28,0x88,0x28
        offsets: String,
    },
    /// Periodically snapshot typed values via scatter reads
    Watch {
        /// Hex addresses to read each tick
        #[arg(required = true)]
        addresses: Vec<String>,
        /// How to decode each address
        #[arg(long, value_enum, default_value = "ptr")]
        r#as: commands::watch::WatchType,
        /// Follow each decoded pointer and read an i32 at this hex offset
        #[arg(long)]
        deref: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dmalens=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to load config from {:?}: {e}, using defaults", args.config);
            Config::default()
        }
    };
    if let Some(process) = args.process {
        config.process_name = process;
    }

    let shutdown = Arc::new(ShutdownSignal::new());
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.trigger())?;
    }

    match args.command {
        Command::Info { module } => commands::info::run(&config, module.as_deref(), &shutdown),
        Command::Hexdump {
            address,
            size,
            ascii,
        } => commands::hexdump::run(&config, &address, size, ascii, &shutdown),
        Command::Chain { offsets } => commands::chain::run(&config, &offsets, &shutdown),
        Command::Watch {
            addresses,
            r#as,
            deref,
        } => commands::watch::run(&config, &addresses, r#as, deref.as_deref(), &shutdown),
    }
}
