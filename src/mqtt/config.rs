use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerUrlError {
    #[error("Unsupported broker URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid broker port in {0}")]
    InvalidPort(String),

    #[error("Broker URL has no host: {0}")]
    MissingHost(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MqttConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    pub reconnect_interval_ms: u64,
    /// Requests rumqttc buffers before `try_publish` starts failing
    pub request_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            url: "mqtt://127.0.0.1".to_string(),
            username: None,
            password: None,
            client_id: None,
            keep_alive_secs: 5,
            reconnect_interval_ms: 1000,
            request_capacity: 100,
        }
    }
}

impl MqttConfig {
    /// Host and port from `mqtt://host[:port]` or `tcp://host[:port]`.
    pub fn broker_address(&self) -> Result<(String, u16), BrokerUrlError> {
        let rest = match self.url.split_once("://") {
            Some(("mqtt" | "tcp", rest)) => rest,
            Some((scheme, _)) => return Err(BrokerUrlError::UnsupportedScheme(scheme.to_string())),
            None => self.url.as_str(),
        };
        let authority = rest.split('/').next().unwrap_or(rest);
        let authority = authority.rsplit('@').next().unwrap_or(authority);

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .map_err(|_| BrokerUrlError::InvalidPort(self.url.clone()))?,
            ),
            None => (authority, 1883),
        };
        if host.is_empty() {
            return Err(BrokerUrlError::MissingHost(self.url.clone()));
        }
        Ok((host.to_string(), port))
    }

    /// Credentials are only used when both parts are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Some((user.as_str(), password.as_str())),
            _ => None,
        }
    }
}
