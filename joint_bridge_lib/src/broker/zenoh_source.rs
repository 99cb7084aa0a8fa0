use super::MessageSource;
use crate::types::{BrokerConfig, BrokerMessage, MessageKind};
use eyre::Result;
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::Subscriber;
use zenoh::sample::{Sample, SampleKind};
use zenoh::{Config, Session};

/// Build a zenoh session config that connects to the configured router.
pub fn zenoh_config(broker: &BrokerConfig) -> Result<Config> {
    let mut config = Config::default();
    config
        .insert_json5("mode", &format!("\"{}\"", broker.mode))
        .map_err(|e| eyre::eyre!("Failed to set Zenoh mode: {}", e))?;
    config
        .insert_json5("connect/endpoints", &format!("[\"{}\"]", broker.endpoint()))
        .map_err(|e| eyre::eyre!("Failed to set Zenoh endpoint: {}", e))?;
    Ok(config)
}

/// Subscription to the joint feed over zenoh.
///
/// The session is held for as long as the source lives. Right after the
/// subscriber is declared the source reports one subscribe acknowledgement,
/// like any other broker subscription.
pub struct ZenohSource {
    channel: String,
    subscriber: Subscriber<FifoChannelHandler<Sample>>,
    // Keeps the session open for the subscriber
    _session: Session,
    ack_pending: bool,
}

impl ZenohSource {
    pub async fn connect(broker: &BrokerConfig) -> Result<Self> {
        let config = zenoh_config(broker)?;
        let session = zenoh::open(config)
            .await
            .map_err(|e| {
                eyre::eyre!("Failed to open Zenoh session to {}: {}", broker.endpoint(), e)
            })?;

        tracing::info!("Zenoh session ID: {}", session.zid());

        let subscriber = session
            .declare_subscriber(broker.channel.clone())
            .await
            .map_err(|e| eyre::eyre!("Failed to declare subscriber {}: {}", broker.channel, e))?;
        tracing::info!("Subscriber: {}", broker.channel);

        Ok(Self {
            channel: broker.channel.clone(),
            subscriber,
            _session: session,
            ack_pending: true,
        })
    }
}

impl MessageSource for ZenohSource {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn get_message(&mut self, ignore_subscribe_messages: bool) -> Result<Option<BrokerMessage>> {
        if self.ack_pending {
            self.ack_pending = false;
            if !ignore_subscribe_messages {
                return Ok(Some(BrokerMessage::subscribed(self.channel.as_str())));
            }
            return Ok(None);
        }

        let sample = self
            .subscriber
            .try_recv()
            .map_err(|e| eyre::eyre!("Subscription to {} closed: {}", self.channel, e))?;

        Ok(sample.map(|sample| {
            let kind = match sample.kind() {
                SampleKind::Put => MessageKind::Message,
                SampleKind::Delete => MessageKind::Delete,
            };
            BrokerMessage {
                kind,
                channel: sample.key_expr().as_str().to_string(),
                data: sample.payload().to_bytes().into_owned(),
            }
        }))
    }
}
