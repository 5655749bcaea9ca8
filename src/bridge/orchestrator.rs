//! Event dispatch between the CUL link and the broker
//!
//! # Event Handling
//!
//! | event           | effect                                                        |
//! |-----------------|---------------------------------------------------------------|
//! | broker connect  | mark broker up, publish status if changed, subscribe `set/#`  |
//! | broker close    | mark broker down (only if it was up), publish status          |
//! | broker error    | log only; the close that follows carries the state change     |
//! | broker message  | forward `set` commands to the transceiver                     |
//! | rf ready        | mark rf up, send the `V` query, publish status if changed     |
//! | rf data         | normalize, map, publish telemetry                             |
//! | rf close        | mark rf down, publish status if changed                       |
//!
//! Telemetry is published whether or not the broker is currently connected;
//! the MQTT client decides whether to queue or drop it. This can be switched
//! off with `drop_telemetry_while_offline`.

use super::command::Command;
use super::state::{ConnectionState, StatusCode};
use super::{BridgeEvent, BrokerLink, RfLink};
use crate::cul::RfEvent;
use crate::mqtt::message_manager::{BrokerEvent, MQTTMessage};
use crate::telemetry::{encode_payload, normalize, DeviceEvent, PublishedMessage, TopicMap};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Probe sent once the transceiver is ready; culfw answers with its version
const VERSION_QUERY: &str = "V";

/// Topic namespaces of the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Namespace for status and telemetry: `<name>/connected`, `<name>/status/...`
    pub name: String,
    /// Namespace for commands: `<prefix>/set/#`
    pub prefix: String,
    pub drop_telemetry_while_offline: bool,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            name: "cul".to_string(),
            prefix: "cul".to_string(),
            drop_telemetry_while_offline: false,
        }
    }
}

impl BridgeSettings {
    pub fn status_topic(&self) -> String {
        format!("{}/connected", self.name)
    }

    pub fn telemetry_topic(&self, mapped: &str) -> String {
        format!("{}/status/{}", self.name, mapped)
    }

    pub fn command_filter(&self) -> String {
        format!("{}/set/#", self.prefix)
    }

    fn command_prefix(&self) -> String {
        format!("{}/set/", self.prefix)
    }
}

/// Reacts to adapter events; owns the connection state.
pub struct Bridge<B, R> {
    settings: BridgeSettings,
    topics: TopicMap,
    state: ConnectionState,
    broker: B,
    rf: R,
}

impl<B: BrokerLink, R: RfLink> Bridge<B, R> {
    pub fn new(settings: BridgeSettings, topics: TopicMap, broker: B, rf: R) -> Self {
        info!(
            "Bridge '{}' created with {} topic mappings",
            settings.name,
            topics.len()
        );
        Self {
            settings,
            topics,
            state: ConnectionState::new(),
            broker,
            rf,
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn status(&self) -> StatusCode {
        self.state.status()
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn rf(&self) -> &R {
        &self.rf
    }

    /// Publishes the initial status, `1`.
    ///
    /// The client queues this until the first connection is up. A transceiver
    /// that became ready before this point does not raise it to `2`; the
    /// broker connect publishes the full code.
    pub fn start(&mut self) {
        if self.state.rf_connected() {
            debug!("Transceiver ready before the initial status");
        }
        self.publish_status(StatusCode::BrokerOnly);
    }

    /// Handles events until both adapters have dropped their senders.
    pub async fn run(mut self, mut events: mpsc::Receiver<BridgeEvent>) {
        self.start();
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        info!("Event channel closed, bridge stopped");
    }

    pub fn handle(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Broker(BrokerEvent::Connected) => self.on_broker_connect(),
            BridgeEvent::Broker(BrokerEvent::Closed) => self.on_broker_close(),
            BridgeEvent::Broker(BrokerEvent::Error(error)) => {
                error!("mqtt error: {}", error);
            }
            BridgeEvent::Broker(BrokerEvent::Message(message)) => self.on_broker_message(message),
            BridgeEvent::Rf(RfEvent::Ready) => self.on_rf_ready(),
            BridgeEvent::Rf(RfEvent::Data(event)) => self.on_rf_data(&event),
            BridgeEvent::Rf(RfEvent::Closed) => self.on_rf_close(),
        }
    }

    fn on_broker_connect(&mut self) {
        info!("mqtt connected");
        if let Some(code) = self.state.broker_up() {
            self.publish_status(code);
        }

        let filter = self.settings.command_filter();
        match self.broker.subscribe(&filter) {
            Ok(()) => debug!("Subscribed to {}", filter),
            Err(e) => error!("Failed to subscribe to {}: {}", filter, e),
        }
    }

    fn on_broker_close(&mut self) {
        if !self.state.broker_connected() {
            return;
        }
        info!("mqtt closed");
        if let Some(code) = self.state.broker_down() {
            self.publish_status(code);
        }
    }

    fn on_broker_message(&mut self, message: MQTTMessage) {
        let Some(suffix) = message.topic.strip_prefix(&self.settings.command_prefix()) else {
            debug!("Ignoring message outside command namespace: {}", message);
            return;
        };

        let fragment = self.topics.resolve(suffix);
        match Command::parse(fragment, &message.content) {
            Ok(command) => {
                let wire = command.to_wire();
                info!("Forwarding {} as {}", message.topic, wire);
                if let Err(e) = self.rf.write(&wire) {
                    warn!("Could not forward {}: {}", message.topic, e);
                }
            }
            Err(e) => warn!("Ignoring command on {}: {}", message.topic, e),
        }
    }

    fn on_rf_ready(&mut self) {
        info!("cul ready");
        let change = self.state.rf_up();
        if let Err(e) = self.rf.write(VERSION_QUERY) {
            warn!("Version query failed: {}", e);
        }
        if let Some(code) = change {
            self.publish_status(code);
        }
    }

    fn on_rf_data(&mut self, event: &DeviceEvent) {
        debug!("< {:?}", event);
        if self.settings.drop_telemetry_while_offline && !self.state.broker_connected() {
            debug!("Broker offline, dropping frame from {}", event.address);
            return;
        }

        let ts = chrono::Utc::now().timestamp_millis();
        for envelope in normalize(event) {
            let topic = self.settings.telemetry_topic(self.topics.map(&envelope.fragment));
            let message = PublishedMessage::new(topic, envelope, ts);
            self.publish_telemetry(&message);
        }
    }

    fn on_rf_close(&mut self) {
        info!("cul closed");
        if let Some(code) = self.state.rf_down() {
            self.publish_status(code);
        }
    }

    fn publish_telemetry(&mut self, message: &PublishedMessage) {
        let payload = match encode_payload(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Could not encode payload for {}: {}", message.topic, e);
                return;
            }
        };
        debug!("> {} {}", message.topic, String::from_utf8_lossy(&payload));
        if let Err(e) = self.broker.publish(&message.topic, payload, message.retain) {
            debug!("Telemetry for {} not queued: {}", message.topic, e);
        }
    }

    fn publish_status(&mut self, code: StatusCode) {
        let topic = self.settings.status_topic();
        debug!("> {} {}", topic, code);
        if let Err(e) = self
            .broker
            .publish(&topic, code.as_payload().as_bytes().to_vec(), true)
        {
            warn!("Status {} not queued: {}", code, e);
        }
    }
}
