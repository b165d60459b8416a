//! A genuine in-process host context.

use crate::abi::{
    write_string128, FUnknown, HostApplication, InterfaceSet, ObjectHandle, PlugInterfaceSupport, RefCount,
    String128, TResult, Tuid, IATTRIBUTE_LIST_IID, IMESSAGE_IID,
};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Host context that can name itself and create message objects.
///
/// Created objects are represented by fresh [`ObjectHandle`]s; nothing else
/// about them is modelled. When built with
/// [`with_plug_interfaces`](Self::with_plug_interfaces) it also implements
/// `IPlugInterfaceSupport` and reports exactly those interfaces as supported.
#[derive(Debug)]
pub struct BasicHostApplication {
    name: String,
    plug_interfaces: Option<Vec<Tuid>>,
    next_handle: AtomicU64,
    created: AtomicU64,
    refs: RefCount,
}

impl BasicHostApplication {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plug_interfaces: None,
            next_handle: AtomicU64::new(1),
            created: AtomicU64::new(0),
            refs: RefCount::new(),
        }
    }

    pub fn with_plug_interfaces(mut self, interfaces: Vec<Tuid>) -> Self {
        self.plug_interfaces = Some(interfaces);
        self
    }

    /// Start handing out handles at `first` instead of 1.
    pub fn with_first_handle(self, first: u64) -> Self {
        self.next_handle.store(first, Ordering::SeqCst);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of objects handed out by `create_instance`.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.get()
    }

    fn interfaces(&self) -> InterfaceSet {
        let mut set = InterfaceSet::UNKNOWN | InterfaceSet::HOST_APPLICATION;
        if self.plug_interfaces.is_some() {
            set |= InterfaceSet::PLUG_INTERFACE_SUPPORT;
        }
        set
    }
}

impl FUnknown for BasicHostApplication {
    fn query_interface(&self, iid: &Tuid) -> Result<InterfaceSet, TResult> {
        let capability = self.interfaces().resolve(iid)?;
        self.add_ref();
        Ok(capability)
    }

    fn add_ref(&self) -> u32 {
        self.refs.acquire()
    }

    fn release(&self) -> u32 {
        match self.refs.release() {
            Some(0) => {
                debug!("Host context '{}' released", self.name);
                0
            }
            Some(remaining) => remaining,
            None => 0,
        }
    }
}

impl HostApplication for BasicHostApplication {
    fn get_name(&self, name: &mut String128) -> TResult {
        let units: Vec<u16> = self.name.encode_utf16().collect();
        write_string128(name, &units);
        TResult::OK
    }

    fn create_instance(&self, cid: &Tuid, iid: &Tuid, obj: &mut Option<ObjectHandle>) -> TResult {
        if cid != iid || !(*iid == IMESSAGE_IID || *iid == IATTRIBUTE_LIST_IID) {
            *obj = None;
            return TResult::FALSE;
        }

        let handle = ObjectHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.created.fetch_add(1, Ordering::SeqCst);
        debug!("Created {} for {}", handle, iid);
        *obj = Some(handle);
        TResult::OK
    }

    fn plug_interface_support(&self) -> Option<&dyn PlugInterfaceSupport> {
        if self.plug_interfaces.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

impl PlugInterfaceSupport for BasicHostApplication {
    fn is_plug_interface_supported(&self, iid: &Tuid) -> TResult {
        match &self.plug_interfaces {
            Some(interfaces) if interfaces.contains(iid) => TResult::TRUE,
            _ => TResult::FALSE,
        }
    }
}
