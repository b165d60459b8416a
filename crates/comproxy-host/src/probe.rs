//! Near side: attach a proxy to a served context and report what it sees.

use crate::ProbeArgs;
use anyhow::Result;
use comproxy_core::abi::{HostApplication, ObjectHandle, TResult, IMESSAGE_IID};
use comproxy_core::host_application::{HostApplicationProxy, HostApplicationSnapshot};
use comproxy_core::ipc::{Channel, ContextClient, TcpChannel};
use comproxy_core::registry::{ContextRegistry, OwnerKey};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// JSON report printed on stdout.
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub owner: Option<u64>,
    /// `None` when the far side has no context for this owner.
    pub snapshot: Option<HostApplicationSnapshot>,
    pub interfaces: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_instance: Option<CreateInstanceReport>,
}

#[derive(Debug, Serialize)]
pub struct CreateInstanceReport {
    pub result: TResult,
    pub result_name: Option<&'static str>,
    pub instance: Option<ObjectHandle>,
}

pub fn probe(client: &ContextClient, owner: OwnerKey, create_message: bool) -> Result<ProbeReport> {
    let proxies = ContextRegistry::<HostApplicationProxy>::new("host context proxies");
    let proxy = match client.attach(&proxies, owner)? {
        Some(proxy) => proxy,
        None => {
            info!("No host context available for {}", owner);
            return Ok(ProbeReport {
                owner: owner.instance_id(),
                snapshot: None,
                interfaces: Vec::new(),
                create_instance: None,
            });
        }
    };

    let create_instance = if create_message {
        let mut instance = None;
        let result = proxy.create_instance(&IMESSAGE_IID, &IMESSAGE_IID, &mut instance);
        debug!("create_instance() returned {}", result);
        Some(CreateInstanceReport {
            result,
            result_name: result.name(),
            instance,
        })
    } else {
        None
    };

    let snapshot = proxy.snapshot().clone();
    let report = ProbeReport {
        owner: owner.instance_id(),
        interfaces: snapshot.interfaces.names(),
        snapshot: Some(snapshot),
        create_instance,
    };

    proxies.teardown(owner);
    Ok(report)
}

pub fn run(args: ProbeArgs) -> Result<()> {
    let owner = OwnerKey::from_instance_id(args.owner);
    let channel: Arc<dyn Channel> = Arc::new(TcpChannel::connect(args.addr)?);
    let client = ContextClient::new(channel);

    let report = probe(&client, owner, args.create_message)?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}
