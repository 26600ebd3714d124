//! Live event delivery.
//!
//! The [`EventHub`] tracks live client connections keyed by user and fans
//! out [`Event`]s to them. Delivery is best-effort and at-most-once: nothing
//! is queued for users without connections, and a connection whose write
//! fails or times out is pruned and closed.

pub mod channel;
pub mod connection;
pub mod error;
pub mod event;
pub mod hub;

pub use channel::ChannelTransport;
pub use connection::{Connection, ConnectionId, DEFAULT_WRITE_TIMEOUT, Transport};
pub use error::HubError;
pub use event::{Event, EventType};
pub use hub::EventHub;
