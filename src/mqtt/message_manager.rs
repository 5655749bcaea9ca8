use chrono::NaiveDateTime;
use std::borrow::Cow;
use std::fmt;

/// A message received from the broker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MQTTMessage {
    pub topic: String,
    pub content: Vec<u8>,
    pub timestamp: NaiveDateTime,
}

impl fmt::Display for MQTTMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = self.text();
        let preview: String = text.chars().take(32).collect();
        write!(f, "{} {} - {}", self.timestamp, self.topic, preview)
    }
}

impl MQTTMessage {
    pub fn from_topic(topic: String, content: Vec<u8>) -> Self {
        MQTTMessage {
            topic,
            content,
            timestamp: chrono::Local::now().naive_local(),
        }
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Lifecycle and traffic notifications from the broker link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// Broker accepted the connection
    Connected,
    /// Connection is gone; rumqttc reconnects on its own
    Closed,
    Error(String),
    Message(MQTTMessage),
}
