//! Message channels.
//!
//! Bidirectional, named-event transport abstraction between the page
//! instrumentation and the inspector panel. Two shapes: [`EventBus`] for
//! in-process pub/sub with deferred delivery, and [`PortChannel`] riding a
//! physical [`Transport`](transport::TransportTx) across a process
//! boundary.

mod emitter;
mod envelope;
mod errors;
mod port;
pub mod transport;

pub use emitter::EventBus;
pub use envelope::Envelope;
pub use errors::{ChannelError, ChannelResult};
pub use port::PortChannel;
pub use transport::{pair_transport, BroadcastHub, PairLink, TransportLink};

use std::sync::Arc;

use serde_json::Value;

/// Handle returned by [`Channel::subscribe`], used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Event handler. Invoked with the envelope args, never re-entered
/// synchronously by the dispatch that triggered it.
pub type Listener = Arc<dyn Fn(Value) + Send + Sync>;

/// Bidirectional named-event channel.
pub trait Channel: Send + Sync {
    /// Registers a listener; handlers for one event fire in registration
    /// order.
    fn subscribe(&self, event: &str, listener: Listener) -> ListenerId;

    /// Removes one listener. Returns whether it was present.
    fn unsubscribe(&self, event: &str, id: ListenerId) -> bool;

    /// Removes the listeners of one event, or every listener.
    fn unsubscribe_all(&self, event: Option<&str>);

    /// Sends an event. True means a transport-level send was attempted,
    /// not that delivery happened.
    fn dispatch(&self, event: &str, args: Value) -> bool;

    /// Releases listeners and the underlying transport hookup.
    fn close(&self);
}
