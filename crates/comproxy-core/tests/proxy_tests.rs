//! End-to-end tests for host context proxies.
//!
//! Each test wires a near-side proxy registry to a far-side adapter registry
//! through a real channel and checks what a plugin observes.

use comproxy_core::abi::{
    read_string128, FUnknown, HostApplication, InterfaceSet, ObjectHandle, TResult, FUNKNOWN_IID,
    IATTRIBUTE_LIST_IID, IMESSAGE_IID, IPLUG_INTERFACE_SUPPORT_IID, STRING128_LEN,
};
use comproxy_core::host_application::{
    BasicHostApplication, HostApplicationAdapter, HostApplicationProxy, HostApplicationSnapshot,
};
use comproxy_core::ipc::{
    AdapterHost, Channel, ChannelServer, ChannelServerHandle, ContextClient, Dispatch, LoopbackChannel,
    TcpChannel,
};
use comproxy_core::registry::{ContextRegistry, ContextState, OwnerKey};
use comproxy_core::ProxyError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

struct Bridge {
    adapters: Arc<ContextRegistry<HostApplicationAdapter>>,
    proxies: Arc<ContextRegistry<HostApplicationProxy>>,
    channel: Arc<LoopbackChannel<AdapterHost>>,
    client: ContextClient,
}

impl Bridge {
    fn new() -> Self {
        let adapters: Arc<ContextRegistry<HostApplicationAdapter>> =
            Arc::new(ContextRegistry::new("host context adapters"));
        let mut host = AdapterHost::new();
        host.register(adapters.clone());

        let channel = Arc::new(LoopbackChannel::new(Arc::new(host)));
        let client = ContextClient::new(channel.clone());

        Self {
            adapters,
            proxies: Arc::new(ContextRegistry::new("host context proxies")),
            channel,
            client,
        }
    }

    fn observe(&self, owner: OwnerKey, host: Arc<BasicHostApplication>) {
        HostApplicationAdapter::observe(&self.adapters, owner, Some(host))
            .unwrap()
            .unwrap();
    }

    fn attach(&self, owner: OwnerKey) -> Arc<HostApplicationProxy> {
        self.client
            .attach(&self.proxies, owner)
            .unwrap()
            .expect("context should be available")
    }
}

fn name_of(proxy: &HostApplicationProxy) -> (TResult, String) {
    let mut buffer = [0xFFFF_u16; STRING128_LEN];
    let result = proxy.get_name(&mut buffer);
    (result, read_string128(&buffer))
}

#[test]
fn test_full_scenario_my_host() {
    let bridge = Bridge::new();
    let owner = OwnerKey::Instance(42);
    bridge.observe(owner, Arc::new(BasicHostApplication::new("MyHost")));

    let proxy = bridge.attach(owner);
    assert_eq!(bridge.channel.sends(), 1);
    assert_eq!(proxy.snapshot().owner_instance_id, Some(42));
    assert_eq!(proxy.snapshot().name.as_deref(), Some("MyHost"));

    assert_eq!(name_of(&proxy), (TResult::OK, "MyHost".to_string()));
    assert_eq!(bridge.channel.sends(), 1, "get_name must be answered locally");

    let mut obj = None;
    assert_eq!(
        proxy.create_instance(&IMESSAGE_IID, &IMESSAGE_IID, &mut obj),
        TResult::OK
    );
    assert_eq!(obj, Some(ObjectHandle(1)));
    assert_eq!(bridge.channel.sends(), 2, "create_instance must forward exactly once");
}

#[test]
fn test_forwarded_failure_is_returned_verbatim() {
    let bridge = Bridge::new();
    let owner = OwnerKey::Instance(1);
    let host = Arc::new(BasicHostApplication::new("Host"));
    bridge.observe(owner, host.clone());
    let proxy = bridge.attach(owner);

    let mut obj = None;
    assert_eq!(
        proxy.create_instance(&IMESSAGE_IID, &FUNKNOWN_IID, &mut obj),
        TResult::FALSE
    );
    assert_eq!(obj, None);
    assert_eq!(host.created(), 0);
}

#[test]
fn test_identity_methods_are_local() {
    let bridge = Bridge::new();
    let owner = OwnerKey::Instance(3);
    bridge.observe(owner, Arc::new(BasicHostApplication::new("Host")));
    let proxy = bridge.attach(owner);
    let sends = bridge.channel.sends();

    assert_eq!(
        proxy.query_interface(&IPLUG_INTERFACE_SUPPORT_IID),
        Err(TResult::NO_INTERFACE)
    );
    assert_eq!(proxy.query_interface(&IMESSAGE_IID), Err(TResult::NO_INTERFACE));
    assert_eq!(proxy.query_interface(&FUNKNOWN_IID), Ok(InterfaceSet::UNKNOWN));
    assert_eq!(proxy.release(), 1);
    assert_eq!(proxy.add_ref(), 2);
    assert_eq!(proxy.release(), 1);

    assert_eq!(bridge.channel.sends(), sends);
}

#[test]
fn test_owner_teardown_prunes_context() {
    let bridge = Bridge::new();
    let owner = OwnerKey::Instance(42);
    bridge.observe(owner, Arc::new(BasicHostApplication::new("MyHost")));

    let far_binding = bridge.adapters.bind(owner);
    let near_binding = bridge.proxies.bind(owner);
    let proxy = bridge.attach(owner);
    assert_eq!(bridge.proxies.state(owner), ContextState::Active);

    drop(near_binding);
    drop(far_binding);

    assert!(bridge.proxies.lookup(owner).is_none());
    assert!(bridge.adapters.lookup(owner).is_none());
    assert_eq!(bridge.proxies.state(owner), ContextState::Destroyed);

    // The owner's reference went away with it, so the proxy is inert
    let sends = bridge.channel.sends();
    let mut obj = None;
    assert_eq!(
        proxy.create_instance(&IMESSAGE_IID, &IMESSAGE_IID, &mut obj),
        TResult::NOT_INITIALIZED
    );
    assert_eq!(bridge.channel.sends(), sends);

    match bridge.client.attach(&bridge.proxies, owner) {
        Err(ProxyError::ContextDestroyed { owner: o }) => assert_eq!(o, owner),
        other => panic!("Expected ContextDestroyed, got {:?}", other.map(|p| p.is_some())),
    }
}

#[test]
fn test_teardown_leaves_other_owners_alone() {
    let bridge = Bridge::new();
    bridge.observe(OwnerKey::Instance(1), Arc::new(BasicHostApplication::new("One")));
    bridge.observe(OwnerKey::Instance(2), Arc::new(BasicHostApplication::new("Two")));
    bridge.observe(OwnerKey::Global, Arc::new(BasicHostApplication::new("Factory")));

    bridge.adapters.teardown(OwnerKey::Instance(1));

    assert_eq!(
        bridge.adapters.active_owners(),
        vec![OwnerKey::Global, OwnerKey::Instance(2)]
    );
    let global = bridge.attach(OwnerKey::Global);
    assert_eq!(name_of(&global).1, "Factory");
    assert_eq!(global.snapshot().owner_instance_id, None);
}

#[test]
fn test_absent_context_builds_no_proxy() {
    let bridge = Bridge::new();
    let owner = OwnerKey::Instance(5);

    assert!(HostApplicationAdapter::observe(&bridge.adapters, owner, None)
        .unwrap()
        .is_none());
    assert_eq!(bridge.adapters.state(owner), ContextState::Uninitialized);

    assert!(bridge.client.attach(&bridge.proxies, owner).unwrap().is_none());
    assert_eq!(bridge.proxies.state(owner), ContextState::Uninitialized);
    assert!(bridge.proxies.is_empty());
}

#[test]
fn test_teardown_of_owner_without_context() {
    let bridge = Bridge::new();
    let owner = OwnerKey::Instance(5);
    assert!(HostApplicationAdapter::observe(&bridge.adapters, owner, None)
        .unwrap()
        .is_none());

    assert!(bridge.adapters.teardown(owner).is_none());
    assert_eq!(bridge.adapters.state(owner), ContextState::Uninitialized);

    // Still "no context", not "destroyed"
    assert!(bridge.client.attach(&bridge.proxies, owner).unwrap().is_none());
    assert_eq!(bridge.proxies.state(owner), ContextState::Uninitialized);
}

#[test]
fn test_second_activation_is_refused() {
    let bridge = Bridge::new();
    let owner = OwnerKey::Instance(8);
    bridge.observe(owner, Arc::new(BasicHostApplication::new("First")));

    let result = HostApplicationAdapter::observe(
        &bridge.adapters,
        owner,
        Some(Arc::new(BasicHostApplication::new("Second"))),
    );
    assert!(matches!(result, Err(ProxyError::AlreadyActive { .. })));

    let proxy = bridge.attach(owner);
    assert_eq!(name_of(&proxy).1, "First");
}

#[test]
fn test_plug_interface_support_is_forwarded() {
    let bridge = Bridge::new();
    let owner = OwnerKey::Instance(11);
    bridge.observe(
        owner,
        Arc::new(BasicHostApplication::new("Host").with_plug_interfaces(vec![IMESSAGE_IID])),
    );
    let proxy = bridge.attach(owner);

    assert_eq!(
        proxy.query_interface(&IPLUG_INTERFACE_SUPPORT_IID),
        Ok(InterfaceSet::PLUG_INTERFACE_SUPPORT)
    );
    let support = proxy.plug_interface_support().expect("capability was captured");

    let sends = bridge.channel.sends();
    assert_eq!(support.is_plug_interface_supported(&IMESSAGE_IID), TResult::TRUE);
    assert_eq!(support.is_plug_interface_supported(&IATTRIBUTE_LIST_IID), TResult::FALSE);
    assert_eq!(bridge.channel.sends(), sends + 2);
}

#[test]
fn test_concurrent_owners_see_no_crosstalk() {
    let bridge = Arc::new(Bridge::new());
    let seven = Arc::new(BasicHostApplication::new("Seven").with_plug_interfaces(vec![IMESSAGE_IID]));
    let nine = Arc::new(BasicHostApplication::new("Nine").with_plug_interfaces(vec![IATTRIBUTE_LIST_IID]));
    bridge.observe(OwnerKey::Instance(7), seven.clone());
    bridge.observe(OwnerKey::Instance(9), nine.clone());

    let cases = [
        (7, "Seven", IMESSAGE_IID, IATTRIBUTE_LIST_IID),
        (9, "Nine", IATTRIBUTE_LIST_IID, IMESSAGE_IID),
    ];

    let workers: Vec<_> = cases
        .into_iter()
        .map(|(id, name, supported, unsupported)| {
            let bridge = bridge.clone();
            thread::spawn(move || {
                let proxy = bridge.attach(OwnerKey::Instance(id));
                let support = proxy.plug_interface_support().expect("capability was captured");

                for _ in 0..50 {
                    assert_eq!(name_of(&proxy).1, name);
                    assert_eq!(support.is_plug_interface_supported(&supported), TResult::TRUE);
                    assert_eq!(support.is_plug_interface_supported(&unsupported), TResult::FALSE);

                    let mut obj = None;
                    assert_eq!(proxy.create_instance(&supported, &supported, &mut obj), TResult::OK);
                    assert!(obj.is_some());
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(seven.created(), 50);
    assert_eq!(nine.created(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_attach_over_tcp() {
    let adapters: Arc<ContextRegistry<HostApplicationAdapter>> =
        Arc::new(ContextRegistry::new("host context adapters"));
    let host = Arc::new(BasicHostApplication::new("MyHost"));
    HostApplicationAdapter::observe(&adapters, OwnerKey::Instance(42), Some(host.clone()))
        .unwrap()
        .unwrap();

    let mut dispatch = AdapterHost::new();
    dispatch.register(adapters);
    let mut server = ChannelServer::start(Arc::new(dispatch)).await.unwrap();
    let addr = server.addr();

    let (name, result) = tokio::task::spawn_blocking(move || {
        let channel: Arc<dyn Channel> = Arc::new(TcpChannel::connect(addr)?);
        let client = ContextClient::new(channel);
        let proxies = ContextRegistry::<HostApplicationProxy>::new("host context proxies");

        let proxy = client
            .attach(&proxies, OwnerKey::Instance(42))?
            .ok_or(ProxyError::NoContext {
                owner: OwnerKey::Instance(42),
            })?;
        let mut obj = None;
        let result = proxy.create_instance(&IATTRIBUTE_LIST_IID, &IATTRIBUTE_LIST_IID, &mut obj);
        Ok::<_, ProxyError>((name_of(&proxy).1, result))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(name, "MyHost");
    assert_eq!(result, TResult::OK);
    assert_eq!(host.created(), 1);

    server.shutdown();
}

/// Dispatcher that lets a rival attach the same owner while the first
/// attach is waiting for its snapshot.
struct RivalAttach {
    inner: AdapterHost,
    proxies: Arc<ContextRegistry<HostApplicationProxy>>,
    rival: ContextClient,
    rival_snapshot: Mutex<Option<HostApplicationSnapshot>>,
}

impl Dispatch for RivalAttach {
    fn dispatch(&self, request: &[u8]) -> Vec<u8> {
        let reply = self.inner.dispatch(request);
        if let Some(snapshot) = self.rival_snapshot.lock().unwrap().take() {
            self.rival.instantiate(&self.proxies, snapshot).unwrap();
        }
        reply
    }
}

#[test]
fn test_losing_an_attach_race_returns_the_winner() {
    let owner = OwnerKey::Instance(4);
    let adapters: Arc<ContextRegistry<HostApplicationAdapter>> =
        Arc::new(ContextRegistry::new("host context adapters"));
    HostApplicationAdapter::observe(&adapters, owner, Some(Arc::new(BasicHostApplication::new("Host"))))
        .unwrap()
        .unwrap();
    let mut inner = AdapterHost::new();
    inner.register(adapters);

    let proxies: Arc<ContextRegistry<HostApplicationProxy>> =
        Arc::new(ContextRegistry::new("host context proxies"));
    let rival = ContextClient::new(Arc::new(LoopbackChannel::new(Arc::new(AdapterHost::new()))));
    let dispatch = RivalAttach {
        inner,
        proxies: proxies.clone(),
        rival,
        rival_snapshot: Mutex::new(Some(HostApplicationSnapshot {
            owner_instance_id: Some(4),
            name: Some("Host".to_string()),
            interfaces: InterfaceSet::UNKNOWN | InterfaceSet::HOST_APPLICATION,
        })),
    };
    let client = ContextClient::new(Arc::new(LoopbackChannel::new(Arc::new(dispatch))));

    let attached = client.attach(&proxies, owner).unwrap().unwrap();

    let registered = proxies.lookup(owner).unwrap();
    assert!(Arc::ptr_eq(&attached, &registered));
    assert_eq!(proxies.len(), 1);
}

#[test]
fn test_concurrent_attach_shares_one_proxy() {
    let bridge = Arc::new(Bridge::new());
    let owner = OwnerKey::Instance(6);
    bridge.observe(owner, Arc::new(BasicHostApplication::new("Shared")));

    let attached: Vec<Arc<HostApplicationProxy>> = (0..8)
        .map(|_| {
            let bridge = bridge.clone();
            thread::spawn(move || bridge.attach(owner))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|worker| worker.join().unwrap())
        .collect();

    for proxy in &attached {
        assert!(Arc::ptr_eq(proxy, &attached[0]));
    }
    assert_eq!(bridge.proxies.len(), 1);
}

async fn serve(adapters: Arc<ContextRegistry<HostApplicationAdapter>>) -> ChannelServerHandle {
    let mut dispatch = AdapterHost::new();
    dispatch.register(adapters);
    ChannelServer::start(Arc::new(dispatch)).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_owners_over_tcp() {
    let adapters: Arc<ContextRegistry<HostApplicationAdapter>> =
        Arc::new(ContextRegistry::new("host context adapters"));
    let seven = Arc::new(
        BasicHostApplication::new("Seven")
            .with_plug_interfaces(vec![IMESSAGE_IID])
            .with_first_handle(7000),
    );
    let nine = Arc::new(
        BasicHostApplication::new("Nine")
            .with_plug_interfaces(vec![IATTRIBUTE_LIST_IID])
            .with_first_handle(9000),
    );
    HostApplicationAdapter::observe(&adapters, OwnerKey::Instance(7), Some(seven.clone()))
        .unwrap()
        .unwrap();
    HostApplicationAdapter::observe(&adapters, OwnerKey::Instance(9), Some(nine.clone()))
        .unwrap()
        .unwrap();
    let mut server = serve(adapters).await;
    let addr = server.addr();

    tokio::task::spawn_blocking(move || {
        // Both owners share one connection, as all proxies in a process do
        let channel: Arc<dyn Channel> = Arc::new(TcpChannel::connect(addr).unwrap());
        let client = Arc::new(ContextClient::new(channel));
        let proxies: Arc<ContextRegistry<HostApplicationProxy>> =
            Arc::new(ContextRegistry::new("host context proxies"));

        let cases = [
            (7, "Seven", IMESSAGE_IID, IATTRIBUTE_LIST_IID, 7000),
            (9, "Nine", IATTRIBUTE_LIST_IID, IMESSAGE_IID, 9000),
        ];
        let workers: Vec<_> = cases
            .into_iter()
            .map(|(id, name, supported, unsupported, first_handle)| {
                let client = client.clone();
                let proxies = proxies.clone();
                thread::spawn(move || {
                    let proxy = client.attach(&proxies, OwnerKey::Instance(id)).unwrap().unwrap();
                    let support = proxy.plug_interface_support().expect("capability was captured");

                    for i in 0..50 {
                        assert_eq!(name_of(&proxy), (TResult::OK, name.to_string()));
                        assert_eq!(support.is_plug_interface_supported(&supported), TResult::TRUE);
                        assert_eq!(support.is_plug_interface_supported(&unsupported), TResult::FALSE);

                        let mut obj = None;
                        assert_eq!(proxy.create_instance(&supported, &supported, &mut obj), TResult::OK);
                        assert_eq!(obj, Some(ObjectHandle(first_handle + i)));
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
    })
    .await
    .unwrap();

    assert_eq!(seven.created(), 50);
    assert_eq!(nine.created(), 50);
    server.shutdown();
}

/// Answers like `inner`, but holds the reply to request number `stall_at`
/// back for `stall`.
struct StallOneRequest {
    inner: AdapterHost,
    stall_at: usize,
    stall: Duration,
    seen: AtomicUsize,
}

impl Dispatch for StallOneRequest {
    fn dispatch(&self, request: &[u8]) -> Vec<u8> {
        let reply = self.inner.dispatch(request);
        if self.seen.fetch_add(1, Ordering::SeqCst) == self.stall_at {
            thread::sleep(self.stall);
        }
        reply
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timed_out_call_fails_alone() {
    let adapters: Arc<ContextRegistry<HostApplicationAdapter>> =
        Arc::new(ContextRegistry::new("host context adapters"));
    let host = Arc::new(BasicHostApplication::new("MyHost"));
    HostApplicationAdapter::observe(&adapters, OwnerKey::Instance(42), Some(host.clone()))
        .unwrap()
        .unwrap();
    let mut inner = AdapterHost::new();
    inner.register(adapters);
    // Request 0 is the snapshot, request 1 the first create_instance
    let dispatch = StallOneRequest {
        inner,
        stall_at: 1,
        stall: Duration::from_millis(600),
        seen: AtomicUsize::new(0),
    };
    let mut server = ChannelServer::start(Arc::new(dispatch)).await.unwrap();
    let addr = server.addr();

    let results = tokio::task::spawn_blocking(move || {
        let channel: Arc<dyn Channel> =
            Arc::new(TcpChannel::connect_with_timeout(addr, Duration::from_millis(200)).unwrap());
        let client = ContextClient::new(channel);
        let proxies = ContextRegistry::<HostApplicationProxy>::new("host context proxies");
        let proxy = client.attach(&proxies, OwnerKey::Instance(42)).unwrap().unwrap();

        (0..4)
            .map(|_| {
                let mut obj = None;
                let result = proxy.create_instance(&IMESSAGE_IID, &IMESSAGE_IID, &mut obj);
                (result, obj)
            })
            .collect::<Vec<_>>()
    })
    .await
    .unwrap();

    assert_eq!(results[0], (TResult::INTERNAL_ERROR, None));
    // The stalled call still ran on the far side and took handle 1
    assert_eq!(
        results[1..],
        [
            (TResult::OK, Some(ObjectHandle(2))),
            (TResult::OK, Some(ObjectHandle(3))),
            (TResult::OK, Some(ObjectHandle(4))),
        ]
    );

    server.shutdown();
}
