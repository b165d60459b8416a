//! Request/reply plumbing between proxies and adapters.
//!
//! Every proxy in a process shares one synchronous [`Channel`]. A forwarded
//! call travels as a [`RequestEnvelope`] tagged with the interface and the
//! owner it belongs to, and comes back as a [`ReplyEnvelope`] carrying either
//! the encoded result or a failure.
//!
//! # Architecture
//!
//! - **Near side**: [`ContextClient`] owns the channel and builds proxies; each
//!   proxy holds a non-owning [`Forwarder`]
//! - **Far side**: [`AdapterHost`] routes envelopes to adapter registries,
//!   either in-process through [`LoopbackChannel`] or over TCP through
//!   [`ChannelServer`] and [`TcpChannel`]
//! - **Protocol**: Envelope types and length-prefixed framing shared by both

pub mod channel;
pub mod client;
pub mod dispatch;
pub mod forward;
pub mod protocol;
pub mod server;

pub use channel::{Channel, Dispatch, LoopbackChannel};
pub use client::TcpChannel;
pub use dispatch::{AdapterHost, InterfaceService};
pub use forward::{ContextClient, Forwarder};
pub use protocol::{
    read_frame, read_frame_async, write_frame, write_frame_async, FailureKind, Operation, ReplyEnvelope,
    ReplyStatus, RequestEnvelope,
};
pub use server::{ChannelServer, ChannelServerHandle};
