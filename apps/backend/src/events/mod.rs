//! Domain events pushed to the transport layer.

pub mod envelope;
pub mod hub;

pub use envelope::{ArenaEvent, Envelope};
pub use hub::{EventHub, EventSink, RecordingSink, Subscription};
