//! # Chrome DevTools Protocol (CDP) layer
//!
//! Transport, typed commands and event plumbing the page driver is built on.
//!
//! ## Module structure
//! - `traits`: the [`Transport`] abstraction and raw [`CdpEvent`]
//! - `types`: JSON-RPC wire envelopes
//! - `protocol`: typed commands, replies and event payloads per domain
//! - `events`: decoding raw notifications into typed events
//! - `bus`: multicast [`EventBus`] with per-subscriber taps
//! - `caller`: binds a token, transport and session into a [`CallContext`]
//! - `connection`: WebSocket transport
//! - `mock`: in-memory transport for tests

pub mod traits;
pub mod types;
pub mod protocol;
pub mod events;
pub mod bus;
pub mod caller;
pub mod connection;
pub mod mock;

pub use bus::{EventBus, EventStream};
pub use caller::{call, CallContext, Caller};
pub use connection::{CdpWebSocketConnection, ConnectionState};
pub use events::{decode_as, Event, EventKind, ProtocolEvent};
pub use mock::{MockTransport, RecordedCall};
pub use protocol::Command;
pub use traits::{CdpEvent, Transport};
