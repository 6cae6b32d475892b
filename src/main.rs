//! capiclient - query controllers on a remote capi server.
//!
//! Connects one application to the server named by the configuration file,
//! the environment or the command line, runs a single operation and prints
//! the result.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use capi_remote::config::default_config_path;
use capi_remote::{BackendConfig, ClientBackend, RegisterParams};

#[derive(Debug, Parser)]
#[command(name = "capiclient", version, about = "Remote CAPI client")]
struct Args {
    /// Configuration file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// capi server host name or address
    #[arg(long)]
    host: Option<String>,

    /// capi server port or service name
    #[arg(long)]
    service: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect and run the local self-test operation
    SelfTest,
    /// Print the manufacturer of a controller
    Manufacturer { controller: u32 },
    /// Print the CAPI and manufacturer versions of a controller
    Version { controller: u32 },
    /// Print the serial number of a controller
    Serial { controller: u32 },
    /// Dump the CAPI profile of a controller (0 = all controllers)
    Profile { controller: u32 },
    /// Start the D-channel of a controller
    Start { controller: u32 },
    /// Register an application and print the assigned id
    Register {
        #[arg(long, default_value_t = 2)]
        max_logical_connections: u32,
        #[arg(long, default_value_t = 7)]
        max_b_data_blocks: u32,
        #[arg(long, default_value_t = 2048)]
        max_b_data_len: u32,
        #[arg(long, default_value_t = 1024)]
        max_msg_data_size: u32,
    },
}

fn load_config(args: &Args) -> Result<BackendConfig> {
    let path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config = if args.config.is_some() || path.exists() {
        BackendConfig::load(&path)?.with_env_overrides()
    } else {
        BackendConfig::from_env()
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(service) = &args.service {
        config.service = service.clone();
    }
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    let backend = ClientBackend::new(load_config(&args)?);
    let config = backend.config();
    tracing::info!("Using capi server {}:{}", config.host, config.service);

    let mut app = backend.alloc_app()?;

    match args.command {
        Command::SelfTest => {
            app.dispatch(capi_remote::models::CAPI_IOCTL_TEST_REQ, &mut [0u8; 4])?;
            println!("connected");
        }
        Command::Manufacturer { controller } => {
            let name = app
                .manufacturer(controller)
                .with_context(|| format!("manufacturer query for controller {}", controller))?;
            println!("{}", name);
        }
        Command::Version { controller } => {
            let version = app
                .version(controller)
                .with_context(|| format!("version query for controller {}", controller))?;
            println!(
                "CAPI {}.{} (manufacturer {}.{})",
                version.major, version.minor, version.manufacturer_major, version.manufacturer_minor
            );
        }
        Command::Serial { controller } => {
            let serial = app
                .serial(controller)
                .with_context(|| format!("serial query for controller {}", controller))?;
            println!("{}", serial);
        }
        Command::Profile { controller } => {
            let profile = app
                .profile(controller)
                .with_context(|| format!("profile query for controller {}", controller))?;
            for row in profile.chunks(16) {
                let hex: Vec<String> = row.iter().map(|b| format!("{:02x}", b)).collect();
                println!("{}", hex.join(" "));
            }
        }
        Command::Start { controller } => {
            app.start_d_channel(controller)
                .with_context(|| format!("starting D-channel of controller {}", controller))?;
            println!("started");
        }
        Command::Register {
            max_logical_connections,
            max_b_data_blocks,
            max_b_data_len,
            max_msg_data_size,
        } => {
            let registered = app
                .register(RegisterParams {
                    max_logical_connections,
                    max_b_data_blocks,
                    max_b_data_len,
                    max_msg_data_size,
                    app_id: 0,
                })
                .context("registration")?;
            println!("{}", registered.app_id);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "capiclient=info,capi_remote=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args) {
        tracing::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
