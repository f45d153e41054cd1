//! Lessor Events - in-process publish/subscribe for provider events
//!
//! The bus fans every published [`EventEnvelope`] out to all current
//! subscribers. Publishing never blocks: each subscriber owns a bounded ring,
//! and one that falls behind loses its oldest events rather than stalling the
//! publisher. Late subscribers see only events published after they joined.

#![deny(unsafe_code)]

mod bus;

pub use bus::{EventBus, Subscription, DEFAULT_CAPACITY};
pub use lessor_types::{EventEnvelope, EventSource, ProviderEvent};
