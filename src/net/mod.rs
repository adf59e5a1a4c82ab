//! Realtime multiplayer: wire protocol, link, bridge and synchronizer

pub mod bridge;
pub mod link;
pub mod protocol;
pub mod snapshot;
pub mod sync;

pub use link::{LinkEndpoint, RealtimeLink};
pub use protocol::{InboundEvent, OutboundEvent, ProtocolError};
pub use sync::{LocalEffect, NetworkSynchronizer, RemotePhase, RemotePlayer, SyncConfig};
