use super::MessageSource;
use crate::types::{BrokerMessage, JointCommand};
use eyre::Result;
use flume::{Receiver, Sender, TryRecvError};

/// In-process stand-in for a broker subscription.
///
/// Behaves like a freshly subscribed channel: the first fetch yields the
/// subscribe acknowledgement, then published messages in order. A dropped
/// publisher reads as a quiet channel.
pub struct ChannelSource {
    channel: String,
    rx: Receiver<BrokerMessage>,
}

/// Publishing end of a [`ChannelSource`].
#[derive(Clone)]
pub struct ChannelPublisher {
    channel: String,
    tx: Sender<BrokerMessage>,
}

impl ChannelSource {
    pub fn subscribe(channel: &str) -> (ChannelPublisher, ChannelSource) {
        let (tx, rx) = flume::unbounded();
        let publisher = ChannelPublisher {
            channel: channel.to_string(),
            tx,
        };
        // Unbounded and the receiver is alive, so this cannot fail
        let _ = publisher.tx.send(BrokerMessage::subscribed(channel));

        (
            publisher,
            ChannelSource {
                channel: channel.to_string(),
                rx,
            },
        )
    }

    /// Messages waiting to be fetched.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl MessageSource for ChannelSource {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn get_message(&mut self, ignore_subscribe_messages: bool) -> Result<Option<BrokerMessage>> {
        match self.rx.try_recv() {
            Ok(message) if ignore_subscribe_messages && message.kind.is_control() => Ok(None),
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }
}

impl ChannelPublisher {
    /// Publish a raw payload. Returns false once the subscriber is gone.
    pub fn publish(&self, data: impl Into<Vec<u8>>) -> bool {
        self.send(BrokerMessage::payload(self.channel.as_str(), data))
    }

    pub fn publish_command(&self, command: &JointCommand) -> Result<bool> {
        Ok(self.publish(command.encode()?))
    }

    /// Deliver an arbitrary event, control messages included.
    pub fn send(&self, message: BrokerMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageKind;

    #[test]
    fn test_first_fetch_is_subscribe_ack() {
        let (_publisher, mut source) = ChannelSource::subscribe("isaac_feed");
        let ack = source.get_message(false).unwrap().unwrap();
        assert_eq!(ack.kind, MessageKind::Subscribe);
        assert_eq!(ack.channel, "isaac_feed");
        assert!(source.get_message(false).unwrap().is_none());
    }

    #[test]
    fn test_ignore_control_consumes_ack() {
        let (publisher, mut source) = ChannelSource::subscribe("isaac_feed");
        publisher.publish(&b"{}"[..]);

        // Ack is swallowed, and only one message is consumed per fetch
        assert!(source.get_message(true).unwrap().is_none());
        assert_eq!(source.pending(), 1);

        let message = source.get_message(true).unwrap().unwrap();
        assert_eq!(message.kind, MessageKind::Message);
        assert_eq!(message.data, b"{}".to_vec());
    }

    #[test]
    fn test_messages_arrive_in_order() {
        let (publisher, mut source) = ChannelSource::subscribe("feed");
        source.get_message(true).unwrap();

        publisher
            .publish_command(&JointCommand::new(vec![1.0]))
            .unwrap();
        publisher
            .publish_command(&JointCommand::new(vec![2.0]))
            .unwrap();

        let first = source.get_message(true).unwrap().unwrap();
        let second = source.get_message(true).unwrap().unwrap();
        assert_eq!(JointCommand::decode(&first.data, 1).unwrap().joints, vec![1.0]);
        assert_eq!(JointCommand::decode(&second.data, 1).unwrap().joints, vec![2.0]);
    }

    #[test]
    fn test_dropped_publisher_reads_as_quiet() {
        let (publisher, mut source) = ChannelSource::subscribe("feed");
        drop(publisher);

        source.get_message(true).unwrap();
        assert!(source.get_message(true).unwrap().is_none());
        assert!(source.get_message(false).unwrap().is_none());
    }

    #[test]
    fn test_publish_after_subscriber_dropped() {
        let (publisher, source) = ChannelSource::subscribe("feed");
        drop(source);
        assert!(!publisher.publish(&b"{}"[..]));
    }
}
