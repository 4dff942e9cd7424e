//! Runtime events: types and publish/subscribe channel.
//!
//! This module groups the event **data model** and the **channel** used to
//! publish/subscribe to events emitted by the scheduler, registry, navigation
//! machine, failure boundary and orchestrator.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Channel`] generic synchronous topic channel with snapshot dispatch
//! - [`EventChannel`] the `Channel<Event>` shared by every component
//! - [`Subscription`] token that removes a callback
//!
//! ## Quick reference
//! - **Publishers**: every component, through [`EventChannel::emit`].
//! - **Consumers**: user callbacks, the `LogWriter` subscriber, and the
//!   navigation machine's direct subscribers (a private `Channel<Transition>`).

mod channel;
mod event;

pub use channel::{Channel, Subscription, ALL_TOPICS};
pub use event::{Event, EventKind};

/// The event channel shared by all components.
pub type EventChannel = Channel<Event>;

impl Channel<Event> {
    /// Publishes `event` on its kind's topic.
    pub fn emit(&self, event: Event) -> usize {
        self.publish(event.kind.topic(), &event)
    }
}
