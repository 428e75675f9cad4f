//! Connection state and option assembly for the MQTT transport

use crate::transport::QosLevel;
use rumqttc::v5::{mqttbytes::QoS, MqttOptions};
use std::time::Duration;

/// Connection state for the MQTT transport
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Initial state - attempting to connect
    Connecting,
    /// Successfully connected and ready for operations
    Connected,
    /// Disconnected with reason
    Disconnected(String),
}

/// Assemble MQTT options for a connection instance
///
/// The client id embeds the per-connection instance id, so two connections
/// from the same process never collide on the broker.
pub fn configure_mqtt_options(
    instance_id: &str,
    host: &str,
    port: u16,
    keep_alive_secs: u64,
) -> MqttOptions {
    let client_id = format!("mqrpc-{instance_id}");
    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(Duration::from_secs(keep_alive_secs));
    // Default broker packet limit is too small for large result documents
    options.set_max_packet_size(Some(256 * 1024));
    options
}

pub(crate) fn to_mqtt_qos(qos: QosLevel) -> QoS {
    match qos {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_mapping() {
        assert_eq!(to_mqtt_qos(QosLevel::AtMostOnce), QoS::AtMostOnce);
        assert_eq!(to_mqtt_qos(QosLevel::AtLeastOnce), QoS::AtLeastOnce);
        assert_eq!(to_mqtt_qos(QosLevel::ExactlyOnce), QoS::ExactlyOnce);
    }

    #[test]
    fn test_connection_state_equality() {
        assert_eq!(ConnectionState::Connected, ConnectionState::Connected);
        assert_ne!(
            ConnectionState::Connected,
            ConnectionState::Disconnected("gone".to_string())
        );
    }

    #[test]
    fn test_configure_mqtt_options() {
        let options = configure_mqtt_options("abc123", "localhost", 1883, 60);
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
    }
}
