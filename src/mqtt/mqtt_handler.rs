use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, MqttOptions, Packet, QoS,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::{BrokerUrlError, MqttConfig};
use super::message_manager::{BrokerEvent, MQTTMessage};
use crate::bridge::{BridgeEvent, BrokerLink, LinkError};

#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("Invalid broker address: {0}")]
    BrokerUrl(#[from] BrokerUrlError),
}

/// Default client id: `<name>_<pid in hex>`.
pub fn client_id(config: &MqttConfig, name: &str) -> String {
    config
        .client_id
        .clone()
        .unwrap_or_else(|| format!("{}_{:x}", name, std::process::id()))
}

/// Maps one rumqttc notification to bridge events.
///
/// Outgoing notifications and keep-alive traffic map to nothing.
pub fn translate(event: &Event) -> Vec<BrokerEvent> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => match ack.code {
            ConnectReturnCode::Success => vec![BrokerEvent::Connected],
            code => vec![
                BrokerEvent::Error(format!("connection refused: {:?}", code)),
                BrokerEvent::Closed,
            ],
        },
        Event::Incoming(Packet::Publish(publish)) => vec![BrokerEvent::Message(
            MQTTMessage::from_topic(publish.topic.clone(), publish.payload.to_vec()),
        )],
        Event::Incoming(Packet::Disconnect) => vec![BrokerEvent::Closed],
        _ => Vec::new(),
    }
}

/// Owns the rumqttc event loop. rumqttc reconnects on the next poll after an
/// error, so the loop only needs to pace itself.
pub struct MqttHandler {
    client: AsyncClient,
    eventloop: EventLoop,
    config: MqttConfig,
}

impl MqttHandler {
    /// Builds the client with a retained last will of `"0"` on `will_topic`.
    pub fn new(config: MqttConfig, client_id: String, will_topic: &str) -> Result<Self, MqttError> {
        let (host, port) = config.broker_address()?;
        info!("Connecting to MQTT broker {}:{} as {}", host, port, client_id);

        let mut mqtt_options = MqttOptions::new(client_id, host, port);
        mqtt_options
            .set_keep_alive(Duration::from_secs(config.keep_alive_secs))
            .set_last_will(LastWill::new(will_topic, "0", QoS::AtMostOnce, true));
        if let Some((user, password)) = config.credentials() {
            mqtt_options.set_credentials(user, password);
        }

        let (client, eventloop) = AsyncClient::new(mqtt_options, config.request_capacity);

        Ok(MqttHandler {
            client,
            eventloop,
            config,
        })
    }

    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher {
            client: self.client.clone(),
        }
    }

    pub fn spawn(self, events: mpsc::Sender<BridgeEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    async fn run(mut self, events: mpsc::Sender<BridgeEvent>) {
        let backoff = Duration::from_millis(self.config.reconnect_interval_ms);

        loop {
            let (translated, failed) = match self.eventloop.poll().await {
                Ok(event) => (translate(&event), false),
                Err(e) => {
                    warn!("MQTT connection error: {}", e);
                    (vec![BrokerEvent::Error(e.to_string()), BrokerEvent::Closed], true)
                }
            };

            for event in translated {
                if events.send(event.into()).await.is_err() {
                    info!("Bridge stopped, MQTT handler exiting");
                    return;
                }
            }

            if failed {
                debug!("Retrying broker in {:?}", backoff);
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Non-blocking publish side of the rumqttc client, QoS 0 throughout.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl BrokerLink for MqttPublisher {
    fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), LinkError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, retain, payload)
            .map_err(|e| LinkError::Broker(e.to_string()))
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), LinkError> {
        self.client
            .try_subscribe(filter, QoS::AtMostOnce)
            .map_err(|e| LinkError::Broker(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, Outgoing, Publish};

    #[test]
    fn connack_success_is_connected() {
        let event = Event::Incoming(Packet::ConnAck(ConnAck::new(
            ConnectReturnCode::Success,
            false,
        )));
        assert_eq!(translate(&event), vec![BrokerEvent::Connected]);
    }

    #[test]
    fn refused_connack_closes() {
        let event = Event::Incoming(Packet::ConnAck(ConnAck::new(
            ConnectReturnCode::NotAuthorized,
            false,
        )));
        let translated = translate(&event);
        assert_eq!(translated.len(), 2);
        assert!(matches!(translated[0], BrokerEvent::Error(_)));
        assert_eq!(translated[1], BrokerEvent::Closed);
    }

    #[test]
    fn publish_becomes_message() {
        let event = Event::Incoming(Packet::Publish(Publish::new(
            "cul/set/FS20/123401",
            QoS::AtMostOnce,
            "on",
        )));
        match translate(&event).as_slice() {
            [BrokerEvent::Message(message)] => {
                assert_eq!(message.topic, "cul/set/FS20/123401");
                assert_eq!(message.text(), "on");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn disconnect_and_outgoing() {
        assert_eq!(
            translate(&Event::Incoming(Packet::Disconnect)),
            vec![BrokerEvent::Closed]
        );
        assert!(translate(&Event::Incoming(Packet::PingResp)).is_empty());
        assert!(translate(&Event::Outgoing(Outgoing::PingReq)).is_empty());
    }

    #[test]
    fn client_id_defaults_to_name_and_pid() {
        let mut config = MqttConfig::default();
        let id = client_id(&config, "cul");
        assert_eq!(id, format!("cul_{:x}", std::process::id()));

        config.client_id = Some("fixed".to_string());
        assert_eq!(client_id(&config, "cul"), "fixed");
    }

    #[tokio::test]
    async fn new_rejects_bad_url() {
        let config = MqttConfig {
            url: "ws://broker".to_string(),
            ..MqttConfig::default()
        };
        assert!(matches!(
            MqttHandler::new(config, "cul_1".to_string(), "cul/connected"),
            Err(MqttError::BrokerUrl(BrokerUrlError::UnsupportedScheme(_)))
        ));
    }

    #[tokio::test]
    async fn publisher_queues_without_network() {
        let handler = MqttHandler::new(MqttConfig::default(), "cul_1".to_string(), "cul/connected")
            .expect("valid config");
        let mut publisher = handler.publisher();

        assert!(publisher.publish("cul/connected", b"1".to_vec(), true).is_ok());
        assert!(publisher.subscribe("cul/set/#").is_ok());
    }
}
