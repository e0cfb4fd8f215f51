//! Built-in behaviors
//!
//! - **Broker:** topic-based publish/subscribe over a [`SubscriptionRegistry`]
//! - **Forwarder:** round-robin load balancing over a fixed worker pool
//! - **Aggregator:** buffers responses and flushes them in batches
//! - **Publisher, Subscriber, Listener, Responder, Dispatcher:** the other
//!   participants of the demo setups

mod aggregator;
mod broker;
mod dispatcher;
mod forwarder;
mod listener;
mod publisher;
mod responder;

pub use aggregator::{AggregationBuffer, Aggregator, BatchHandler, DEFAULT_BATCH_THRESHOLD, Response};
pub use broker::{Broker, SubscriptionRegistry};
pub use dispatcher::Dispatcher;
pub use forwarder::{Forwarder, RoundRobin};
pub use listener::{Listener, Subscriber};
pub use publisher::Publisher;
pub use responder::Responder;
