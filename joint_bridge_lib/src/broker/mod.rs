//! Subscription side of the joint feed.

pub mod channel;
pub mod zenoh_source;

pub use channel::*;
pub use zenoh_source::*;

use crate::types::BrokerMessage;
use eyre::Result;

/// A subscribed channel that can be polled without blocking.
pub trait MessageSource {
    fn channel(&self) -> &str;

    /// Fetch at most one pending message and return immediately.
    ///
    /// With `ignore_subscribe_messages`, subscribe/unsubscribe
    /// acknowledgements are consumed silently and `None` is returned in
    /// their place. An error means the connection itself is gone.
    fn get_message(&mut self, ignore_subscribe_messages: bool) -> Result<Option<BrokerMessage>>;
}
