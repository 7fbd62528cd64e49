//! MQTT adapter — the device's message-bus endpoint.
//!
//! Outbound: [`MqttNotifier`] implements [`Notifier`]; publish failures are
//! logged and swallowed.  Inbound: a pump thread drains the connection's
//! event stream, parses command text, and enqueues it.  Enqueue rejections
//! are answered on the response topic — the transport notifies the
//! requester, it never retries on its own.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};
use log::{info, warn};

use crate::app::ports::Notifier;
use crate::command::{parse, split_command, CommandKind, CommandSender};
use crate::config::SystemConfig;
use crate::drivers::task;

/// Inbound pump thread parameters.
const PUMP_PRIORITY: u8 = 3;
const PUMP_STACK_KB: usize = 6;

pub struct MqttNotifier {
    client: Mutex<EspMqttClient<'static>>,
}

impl Notifier for MqttNotifier {
    fn publish(&self, topic: &str, message: &str) {
        let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = client.enqueue(topic, QoS::AtLeastOnce, false, message.as_bytes()) {
            warn!("mqtt publish to {topic} failed: {e}");
        }
    }
}

impl MqttNotifier {
    fn subscribe(&self, topic: &str) {
        let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        match client.subscribe(topic, QoS::AtLeastOnce) {
            Ok(_) => info!("subscribed to {topic}"),
            Err(e) => warn!("subscribe to {topic} failed: {e}"),
        }
    }
}

/// Connect to the broker and wire the inbound command path.
///
/// Returns the shared notifier; the event pump keeps running for the life
/// of the process (the broker connection auto-reconnects underneath it).
pub fn start(cfg: &SystemConfig, sender: CommandSender) -> anyhow::Result<Arc<MqttNotifier>> {
    let conf = MqttClientConfiguration {
        client_id: Some(&cfg.mqtt_client_id),
        keep_alive_interval: Some(Duration::from_secs(60)),
        network_timeout: Duration::from_secs(30),
        ..Default::default()
    };
    let (client, mut connection) =
        EspMqttClient::new(&cfg.mqtt_broker, &conf).context("mqtt client init")?;
    let notifier = Arc::new(MqttNotifier {
        client: Mutex::new(client),
    });

    let pump = Arc::clone(&notifier);
    let command_topic = cfg.topics.command.clone();
    let response_topic = cfg.topics.response.clone();
    task::spawn_worker(PUMP_PRIORITY, PUMP_STACK_KB, "mqtt-rx\0", move || {
        info!("mqtt event pump started");
        while let Ok(event) = connection.next() {
            match event.payload() {
                EventPayload::Connected(_) => {
                    info!("mqtt connected");
                    pump.subscribe(&command_topic);
                }
                EventPayload::Received { topic, data, .. } => {
                    if topic == Some(command_topic.as_str()) {
                        handle_inbound(data, &sender, &pump, &response_topic);
                    }
                }
                EventPayload::Disconnected => {
                    warn!("mqtt disconnected, waiting for auto-reconnect");
                }
                _ => {}
            }
        }
        warn!("mqtt event pump stopped");
    });

    Ok(notifier)
}

/// Parse and enqueue one inbound command frame.
fn handle_inbound(
    data: &[u8],
    sender: &CommandSender,
    notifier: &MqttNotifier,
    response_topic: &str,
) {
    let Ok(text) = core::str::from_utf8(data) else {
        warn!("dropping non-UTF8 command payload ({} bytes)", data.len());
        return;
    };
    let (word, payload) = split_command(text);
    let kind = parse(word);
    if kind == CommandKind::Unknown {
        warn!("unknown command: {text:?}");
        notifier.publish(response_topic, "unknown command");
        return;
    }
    if let Err(e) = sender.enqueue(kind, payload) {
        warn!("enqueue {kind:?} rejected: {e}");
        notifier.publish(response_topic, "busy, try again later");
    }
}
