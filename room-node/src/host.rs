use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{info, warn};

use hvac_common::{EventKind, TOPIC_NODE_STATUS_PREFIX};

use crate::room::{RoomModel, RoomSettings};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let node_tag = std::env::var("NODE_TAG").unwrap_or_else(|_| "R3-INKOM".to_string());
    let settings = match std::env::var("ROOM_SETTINGS") {
        Ok(raw) => serde_json::from_str::<RoomSettings>(&raw).context("invalid ROOM_SETTINGS")?,
        Err(_) => RoomSettings::default(),
    };
    let interval_secs = std::env::var("ROOM_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(60)
        .max(1);

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);

    let mut mqtt_options = MqttOptions::new(format!("hvac-room-{node_tag}"), mqtt_host, mqtt_port);

    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);
    let topic = format!("{TOPIC_NODE_STATUS_PREFIX}{node_tag}");

    mqtt.publish(
        topic.as_str(),
        QoS::AtLeastOnce,
        false,
        EventKind::Heartbeat.to_payload(),
    )
    .await
    .context("failed to publish room node online status")?;

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("room node mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    info!("room node {node_tag} publishing on {topic} every {interval_secs}s");

    let mut room = RoomModel::new(settings.clone(), settings.setpoint_c - 1.0);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        for event in room.step() {
            info!(
                "{node_tag}: {:.2} C, {:.0}% -> {event:?}",
                room.temp_c(),
                room.humidity_pct()
            );
            mqtt.publish(topic.as_str(), QoS::AtLeastOnce, false, event.to_payload())
                .await
                .context("failed to publish room node status")?;
        }
    }
}
