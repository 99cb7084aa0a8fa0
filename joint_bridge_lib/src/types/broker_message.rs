use serde::{Deserialize, Serialize};

/// Kind of event delivered by a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Acknowledgement that a channel subscription became active
    Subscribe,
    /// Acknowledgement that a channel subscription was dropped
    Unsubscribe,
    /// Published payload
    Message,
    /// Retraction of a previously published value
    Delete,
}

impl MessageKind {
    /// Subscription bookkeeping rather than data.
    pub fn is_control(&self) -> bool {
        matches!(self, MessageKind::Subscribe | MessageKind::Unsubscribe)
    }

    /// Only genuine payloads are handed to the decoder.
    pub fn is_payload(&self) -> bool {
        matches!(self, MessageKind::Message)
    }
}

/// One event fetched from a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerMessage {
    pub kind: MessageKind,
    pub channel: String,
    pub data: Vec<u8>,
}

impl BrokerMessage {
    pub fn payload(channel: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: MessageKind::Message,
            channel: channel.into(),
            data: data.into(),
        }
    }

    pub fn subscribed(channel: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Subscribe,
            channel: channel.into(),
            data: Vec::new(),
        }
    }

    pub fn unsubscribed(channel: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Unsubscribe,
            channel: channel.into(),
            data: Vec::new(),
        }
    }
}
