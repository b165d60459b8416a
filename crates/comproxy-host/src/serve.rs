//! Far side: wrap a genuine host context and serve it over TCP.

use crate::ServeArgs;
use anyhow::{Context, Result};
use comproxy_core::abi::HostApplication;
use comproxy_core::config::HostConfig;
use comproxy_core::host_application::{BasicHostApplication, HostApplicationAdapter};
use comproxy_core::ipc::{AdapterHost, ChannelServer};
use comproxy_core::registry::{ContextRegistry, OwnerKey};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Owners that receive the context. Without any explicit owner the global
/// context is served.
pub fn owners(args: &ServeArgs) -> Vec<OwnerKey> {
    let mut owners: Vec<OwnerKey> = args.owners.iter().copied().map(OwnerKey::Instance).collect();
    if args.global || owners.is_empty() {
        owners.push(OwnerKey::Global);
    }
    owners.sort();
    owners.dedup();
    owners
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let mut host = BasicHostApplication::new(args.name.clone());
    if !args.plug_interfaces.is_empty() {
        host = host.with_plug_interfaces(args.plug_interfaces.clone());
    }
    let host: Arc<dyn HostApplication> = Arc::new(host);

    let adapters = Arc::new(ContextRegistry::<HostApplicationAdapter>::new("host context adapters"));
    for owner in owners(&args) {
        HostApplicationAdapter::observe(&adapters, owner, Some(host.clone()))
            .with_context(|| format!("Failed to register the host context for {}", owner))?;
        info!("Serving '{}' to {}", args.name, owner);
    }

    let mut dispatch = AdapterHost::new();
    dispatch.register(adapters.clone());

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;
    let mut handle = ChannelServer::bind(Arc::new(dispatch), addr).await?;

    // Print port for the parent process to read (intentional stdout)
    println!("{}{}", HostConfig::PORT_ANNOUNCEMENT_PREFIX, handle.port());

    info!("Channel server running on {}", handle.addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    handle.shutdown();
    for owner in adapters.active_owners() {
        adapters.teardown(owner);
    }
    Ok(())
}
