//! Envelope - one addressed unit of communication between actors

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::Address;

/// Open key/value payload carried by an envelope
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata keys used by the built-in patterns
///
/// These are conventions, not a schema. Behaviors ignore keys they don't know.
pub mod keys {
    pub const ACTION: &str = "action";
    pub const TOPIC: &str = "topic";
    pub const DATA: &str = "data";
    pub const REQUEST: &str = "request";
    pub const REQUEST_ID: &str = "request_id";
    /// Legacy correlation key, accepted when `request_id` is absent
    pub const ID: &str = "id";
    pub const RESPONDER: &str = "responder";
    pub const RESPONSE: &str = "response";
    pub const TASK: &str = "task";
}

/// Values of the `action` key understood by the broker
pub mod actions {
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const PUBLISH: &str = "publish";
}

/// Build metadata from key/value pairs
///
/// ```
/// use mailroom::envelope::meta;
/// let m = meta([("action", "subscribe"), ("topic", "news")]);
/// assert_eq!(m["topic"], "news");
/// ```
pub fn meta<I, K, V>(pairs: I) -> Metadata
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// An addressed message
///
/// Sender and recipient are filled in by the sending side before enqueue.
/// Envelopes have no mutators: a behavior that wants to forward or reply
/// builds a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    sender: Address,
    recipient: Address,
    metadata: Metadata,
}

impl Envelope {
    pub fn new(sender: Address, recipient: Address, metadata: Metadata) -> Self {
        Self {
            sender,
            recipient,
            metadata,
        }
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    pub fn recipient(&self) -> &Address {
        &self.recipient
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Get a metadata value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Get a metadata value if it is a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// The `action` key, if present
    pub fn action(&self) -> Option<&str> {
        self.get_str(keys::ACTION)
    }

    /// The `topic` key, if present
    pub fn topic(&self) -> Option<&str> {
        self.get_str(keys::TOPIC)
    }

    /// Consume the envelope, returning its metadata
    pub fn into_metadata(self) -> Metadata {
        self.metadata
    }
}
