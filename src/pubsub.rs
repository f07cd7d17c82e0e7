//! Pub/sub side channel: the JSON sample payload and its MQTT transport.

use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::{format_timestamp, parse_timestamp, Sample};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(3);
const REQUEST_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("cannot encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("publish failed: {0}")]
    Transport(String),
}

/// Message exchanged on the channel: `{"time": "...", "value_mV": 1234, "pH": 7.0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePayload {
    pub time: String,
    #[serde(rename = "value_mV")]
    pub value_mv: f64,
    #[serde(rename = "pH", default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
}

impl From<&Sample> for SamplePayload {
    fn from(sample: &Sample) -> Self {
        Self {
            time: format_timestamp(&sample.time),
            value_mv: sample.value,
            ph: sample.ph,
        }
    }
}

impl SamplePayload {
    pub fn to_json(&self) -> Result<String, PublishError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// The sample carried by this payload, or `None` if `time` does not parse.
    pub fn into_sample(self) -> Option<Sample> {
        let time = parse_timestamp(&self.time)?;
        Some(Sample::new(time, self.value_mv, self.ph))
    }
}

/// Best-effort sink for freshly collected samples.
pub trait SamplePublisher {
    /// Hands the payload to the transport without waiting for delivery.
    fn publish(&mut self, payload: &SamplePayload) -> Result<(), PublishError>;

    /// Releases the transport. Later publishes may fail.
    fn close(&mut self) {}
}

/// Broker connection settings shared by the collector and the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub channel: String,
    pub client_id: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            username: None,
            password: None,
            channel: "analog_in_channel".into(),
            client_id: None,
        }
    }
}

impl BrokerConfig {
    /// Configured client id, or `<role>-<random>` so two processes never share one.
    pub fn client_id(&self, role: &str) -> String {
        match &self.client_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("{role}-{:08x}", rand::thread_rng().gen::<u32>()),
        }
    }

    pub fn mqtt_options(&self, role: &str) -> MqttOptions {
        let mut opts = MqttOptions::new(self.client_id(role), &self.host, self.port);
        opts.set_keep_alive(KEEP_ALIVE);
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            opts.set_credentials(user, pass);
        }
        opts
    }
}

/// Publishes samples to the configured channel; the event loop runs as a background task.
pub struct MqttPublisher {
    client: AsyncClient,
    channel: String,
}

impl MqttPublisher {
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: &BrokerConfig) -> Self {
        let (client, eventloop) =
            AsyncClient::new(config.mqtt_options("phscope-collect"), REQUEST_CAPACITY);
        info!(
            "Publishing samples to '{}' on {}:{}",
            config.channel, config.host, config.port
        );
        tokio::spawn(drive(eventloop, None));
        Self {
            client,
            channel: config.channel.clone(),
        }
    }
}

impl SamplePublisher for MqttPublisher {
    fn publish(&mut self, payload: &SamplePayload) -> Result<(), PublishError> {
        let json = payload.to_json()?;
        self.client
            .try_publish(&self.channel, QoS::AtLeastOnce, false, json.into_bytes())
            .map_err(|e| PublishError::Transport(e.to_string()))
    }

    fn close(&mut self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!("MQTT disconnect: {e}");
        }
    }
}

/// Subscription whose raw message bodies arrive on an mpsc receiver.
pub struct MqttSubscription {
    client: AsyncClient,
    channel: String,
    task: JoinHandle<()>,
}

impl MqttSubscription {
    /// Connects and subscribes; resubscribes after every reconnect.
    pub fn start(config: &BrokerConfig) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (client, eventloop) =
            AsyncClient::new(config.mqtt_options("phscope-relay"), REQUEST_CAPACITY);
        let (tx, rx) = mpsc::channel(REQUEST_CAPACITY);
        let resubscribe = Resubscribe {
            client: client.clone(),
            channel: config.channel.clone(),
            tx,
        };
        let task = tokio::spawn(drive(eventloop, Some(resubscribe)));
        let subscription = Self {
            client,
            channel: config.channel.clone(),
            task,
        };
        (subscription, rx)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Unsubscribes, disconnects and waits briefly for the event loop to stop.
    ///
    /// Takes the receiver from `start` so the event loop is never left blocked on a full
    /// channel; unread messages are discarded.
    pub async fn close(self, messages: mpsc::Receiver<Vec<u8>>) {
        if let Err(e) = self.client.unsubscribe(&self.channel).await {
            debug!("MQTT unsubscribe: {e}");
        }
        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT disconnect: {e}");
        }
        drop(messages);
        if tokio::time::timeout(CLOSE_TIMEOUT, self.task).await.is_err() {
            debug!("MQTT event loop did not stop in time");
        }
        info!("Unsubscribed from '{}'.", self.channel);
    }
}

struct Resubscribe {
    client: AsyncClient,
    channel: String,
    tx: mpsc::Sender<Vec<u8>>,
}

/// Polls the event loop until a DISCONNECT goes out or the receiver is dropped.
async fn drive(mut eventloop: EventLoop, subscriber: Option<Resubscribe>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to MQTT broker");
                if let Some(sub) = &subscriber {
                    if let Err(e) = sub.client.try_subscribe(&sub.channel, QoS::AtLeastOnce) {
                        warn!("Cannot subscribe to '{}': {e}", sub.channel);
                    } else {
                        info!("Subscribed to '{}'", sub.channel);
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if let Some(sub) = &subscriber {
                    if sub.tx.send(publish.payload.to_vec()).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT connection error: {e}");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
