//! MQTT bridge between a broker and one cover task.
//!
//! Subscribes to command and sensor topics and publishes state updates:
//!
//! **Subscribe Topics:**
//! - `<prefix>/command` - `open`, `close`, `stop`, `shade`, a bare position,
//!   or JSON `{"command": "set_position", "position": 40}`
//! - `<prefix>/position/set` - Target position, plain or `{"position": 40}`
//! - `<prefix>/sensor/<id>` - Motion sensor state (`on` / `off`)
//! - `<prefix>/service/<name>` - Service call such as `set_cover_position`,
//!   parameters as a JSON object
//!
//! **Publish Topics:**
//! - `<prefix>/state` - Full state JSON
//! - `<prefix>/position` - Committed position (retained)
//! - `<prefix>/action/<namespace>/<action>` - Action requests, parameters as JSON
//!
//! The same [`MqttBridge`] value serves as the cover's [`ActionInvoker`] and
//! [`StatePublisher`]; [`MqttBridge::run`] drives the connection and feeds
//! incoming messages to a [`CoverHandle`] from a separate forwarding task, so
//! the event loop keeps polling while the cover waits on its own publishes.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ClientError, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::commands::{coerce_position, CoverCommand};
use crate::cover::{CoverState, SensorEvent};
use crate::runner::CoverHandle;
use crate::traits::{ActionCall, ActionInvoker, StatePublisher};

/// Capacity of the client request queue.
const REQUEST_CAPACITY: usize = 64;

/// Pause before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

// ============================================================================
// Configuration
// ============================================================================

/// Runtime MQTT client configuration for `rumqttc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttRuntimeConfig {
    /// MQTT broker hostname
    pub host: String,
    /// MQTT broker port
    pub port: u16,
    /// Client ID
    pub client_id: String,
    /// Topic prefix (default: "shutters/cover")
    pub topic_prefix: String,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Broker username
    pub username: Option<String>,
    /// Broker password
    pub password: Option<String>,
}

impl Default for MqttRuntimeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "rs-shutters".to_string(),
            topic_prefix: "shutters/cover".to_string(),
            keep_alive_secs: 30,
            username: None,
            password: None,
        }
    }
}

impl MqttRuntimeConfig {
    /// Create a new config with the given broker address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the client ID
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    /// Set the topic prefix
    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    /// Set broker credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Full topic for `suffix`
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.topic_prefix.trim_end_matches('/'), suffix)
    }

    /// Topic an action request is published to
    pub fn action_topic(&self, call: &ActionCall) -> String {
        self.topic(&format!("action/{}/{}", call.namespace, call.action))
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(u64::from(self.keep_alive_secs)));
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            options.set_credentials(user, pass);
        }
        options
    }

    fn subscriptions(&self) -> [String; 4] {
        [
            self.topic("command"),
            self.topic("position/set"),
            self.topic("sensor/+"),
            self.topic("service/+"),
        ]
    }
}

// ============================================================================
// Inbound Messages
// ============================================================================

/// A message from the broker addressed to the cover.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A command to run.
    Command(CoverCommand),
    /// A motion sensor report.
    Sensor(SensorEvent),
}

/// Interpret a message on `topic`. Returns `None` for foreign topics and
/// unusable payloads.
pub fn parse_inbound(config: &MqttRuntimeConfig, topic: &str, payload: &[u8]) -> Option<Inbound> {
    let suffix = topic
        .strip_prefix(config.topic_prefix.trim_end_matches('/'))?
        .strip_prefix('/')?;
    let text = std::str::from_utf8(payload).ok()?.trim();

    match suffix {
        "command" => serde_json::from_str::<CoverCommand>(text)
            .ok()
            .or_else(|| CoverCommand::from_text(text))
            .map(Inbound::Command),
        "position/set" => {
            let value = serde_json::from_str::<serde_json::Value>(text).ok();
            let position = match &value {
                Some(serde_json::Value::Object(map)) => map.get("position").and_then(coerce_position),
                Some(other) => coerce_position(other),
                None => text.parse::<f64>().ok().filter(|p| !p.is_nan()),
            }?;
            Some(Inbound::Command(CoverCommand::SetPosition { position }))
        }
        other => {
            if let Some(service) = other.strip_prefix("service/") {
                return service_command(service, text).map(Inbound::Command);
            }
            let entity_id = other.strip_prefix("sensor/")?;
            if entity_id.is_empty() || entity_id.contains('/') {
                return None;
            }
            let state = text.to_ascii_lowercase();
            Some(Inbound::Sensor(SensorEvent::new(
                entity_id,
                Some(state.as_str()).filter(|s| !s.is_empty()),
            )))
        }
    }
}

fn service_command(name: &str, text: &str) -> Option<CoverCommand> {
    if name.is_empty() || name.contains('/') {
        return None;
    }
    let data = serde_json::from_str(text).unwrap_or(serde_json::Value::Null);
    CoverCommand::from_service(name, &data)
}

// ============================================================================
// MQTT Bridge
// ============================================================================

/// Connects one cover to an MQTT broker.
#[derive(Clone, Debug)]
pub struct MqttBridge {
    client: AsyncClient,
    config: MqttRuntimeConfig,
}

impl MqttBridge {
    /// Create the client. Nothing is sent until [`run`](Self::run) polls the
    /// returned event loop.
    pub fn new(config: MqttRuntimeConfig) -> (Self, EventLoop) {
        let (client, eventloop) = AsyncClient::new(config.options(), REQUEST_CAPACITY);
        (Self { client, config }, eventloop)
    }

    /// Active configuration.
    pub fn config(&self) -> &MqttRuntimeConfig {
        &self.config
    }

    /// Drive the connection, forwarding inbound messages to `cover`.
    ///
    /// Subscriptions are (re)established on every connect. Connection errors
    /// are logged and retried. Returns once the cover task has ended.
    pub async fn run(self, mut eventloop: EventLoop, cover: CoverHandle) -> Result<(), MqttError> {
        let (inbound, queue) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward(queue, cover.clone()));

        while !cover.is_closed() {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(host = %self.config.host, port = self.config.port, "MQTT connected");
                    for topic in self.config.subscriptions() {
                        self.client.try_subscribe(topic, QoS::AtLeastOnce)?;
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match parse_inbound(&self.config, &publish.topic, &publish.payload) {
                        // never awaits the cover: its actions need this loop polled
                        Some(message) => {
                            let _ = inbound.send(message);
                        }
                        None => debug!(topic = %publish.topic, "ignored MQTT message"),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "MQTT connection error");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
        debug!("cover closed, MQTT bridge stopping");
        drop(inbound);
        forwarder.abort();
        let _ = self.client.try_disconnect();
        Ok(())
    }
}

/// Hand inbound messages to the cover in arrival order.
async fn forward(mut queue: mpsc::UnboundedReceiver<Inbound>, cover: CoverHandle) {
    while let Some(message) = queue.recv().await {
        deliver(message, &cover).await;
    }
}

async fn deliver(message: Inbound, cover: &CoverHandle) {
    match message {
        Inbound::Command(command) => {
            debug!(command = command.as_str(), "MQTT command");
            // the result is only logged; waiting here would hold up later messages
            match cover.submit(command).await {
                Ok(reply) => {
                    tokio::spawn(async move {
                        if let Ok(Err(e)) = reply.await {
                            error!(command = command.as_str(), error = %e, "MQTT command failed");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "cover unavailable"),
            }
        }
        Inbound::Sensor(event) => {
            if let Err(e) = cover.sensor_event(event).await {
                warn!(error = %e, "cover unavailable");
            }
        }
    }
}

#[async_trait]
impl ActionInvoker for MqttBridge {
    type Error = MqttError;

    async fn call(&self, call: ActionCall) -> Result<(), MqttError> {
        let topic = self.config.action_topic(&call);
        let payload = serde_json::to_vec(&call.data)?;
        debug!(%topic, "publishing action");
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }
}

impl StatePublisher for MqttBridge {
    fn publish(&self, state: &CoverState) {
        let json = match serde_json::to_vec(state) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to encode state");
                return;
            }
        };
        let results = [
            self.client
                .try_publish(self.config.topic("state"), QoS::AtLeastOnce, false, json),
            self.client.try_publish(
                self.config.topic("position"),
                QoS::AtLeastOnce,
                true,
                state.position.to_string(),
            ),
        ];
        for result in results {
            if let Err(e) = result {
                warn!(error = %e, "failed to publish state");
            }
        }
    }
}

/// MQTT-related errors
#[derive(Debug, Error)]
pub enum MqttError {
    /// The client request queue rejected a request
    #[error("MQTT client error: {0}")]
    Client(#[from] ClientError),
    /// The broker connection failed
    #[error("MQTT connection error: {0}")]
    Connection(#[from] ConnectionError),
    /// A payload could not be encoded
    #[error("MQTT payload error: {0}")]
    Encode(#[from] serde_json::Error),
}
