//! Comproxy Host - serves host contexts over a channel and probes them.
//!
//! `serve` plays the far side: it wraps a genuine host context for each
//! requested owner and answers proxies over TCP. `probe` plays the near
//! side: it attaches a proxy to one owner and prints what a plugin would see.

mod probe;
mod serve;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use comproxy_core::{HostConfig, Tuid};
use std::net::SocketAddr;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "comproxy-host")]
#[command(about = "Host context channel server and probe")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve a host context to proxies over TCP
    Serve(ServeArgs),
    /// Attach to a served context and print its snapshot as JSON
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = HostConfig::DEFAULT_HOST)]
    pub host: String,

    /// Name the host context reports
    #[arg(long, default_value = HostConfig::DEFAULT_NAME)]
    pub name: String,

    /// Instance ids that receive the context (repeatable)
    #[arg(long = "owner")]
    pub owners: Vec<u64>,

    /// Also hand the context to the global owner
    #[arg(long)]
    pub global: bool,

    /// Plugin interfaces reported as supported; enables IPlugInterfaceSupport
    #[arg(long = "plug-interface")]
    pub plug_interfaces: Vec<Tuid>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Address of a running `serve`
    #[arg(long)]
    pub addr: SocketAddr,

    /// Instance id to attach to (omit for the global context)
    #[arg(long)]
    pub owner: Option<u64>,

    /// Forward one create_instance call for an IMessage
    #[arg(long)]
    pub create_message: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout carries the port line and probe reports
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Command::Serve(args) => {
            info!("Starting comproxy host");
            serve::run(args).await
        }
        Command::Probe(args) => tokio::task::spawn_blocking(move || probe::run(args)).await?,
    }
}
