//! MQTT transport implementation on rumqttc

mod client;
mod connection;

pub use client::MqttTransport;
pub use connection::{configure_mqtt_options, ConnectionState};
