//! MQTT publish transport.
//!
//! Channel keys: `broker` (required, `mqtt://` or `mqtts://`), `topic`
//! (required), `qos`, `retain`, `client_id`, `username`, `password`,
//! `keepalive` (seconds) and `insecure`.

use super::{Fields, TransportError, tls};
use crate::config::MqttDefaults;
use crate::manifest::{ChannelConfig, ManifestError};
use rumqttc::{Client, Event, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use ureq::http::Uri;

const PROTOCOL: &str = "MQTT";
const PLAIN_PORT: u16 = 1883;
const TLS_PORT: u16 = 8883;

/// Room for the fixed header, topic, and properties on top of the payload.
const PACKET_OVERHEAD: usize = 64 * 1024;

/// Connection and publish parameters derived from an MQTT channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    /// Broker address as configured, used in logs and errors.
    pub broker: String,
    /// Broker host name.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Whether the connection uses TLS.
    pub tls: bool,
    /// Skip certificate verification on TLS connections.
    pub insecure: bool,
    /// Topic to publish to.
    pub topic: String,
    /// Quality of service level, 0 to 2.
    pub qos: u8,
    /// Publish with the retain flag.
    pub retain: bool,
    /// MQTT client identifier.
    pub client_id: String,
    /// Optional user name.
    pub username: Option<String>,
    /// Optional password, sent only with a user name.
    pub password: Option<String>,
    /// Keep-alive interval.
    pub keepalive: Duration,
}

impl MqttSettings {
    /// Derive publish settings for `artifact` from a merged channel record.
    ///
    /// Fields missing from the channel fall back to `defaults`. The client
    /// identity defaults to `ota-<artifact>-<pid>` so concurrent runs do not
    /// evict each other from the broker.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::UnsupportedScheme`] for a broker that is not
    /// `mqtt://` or `mqtts://`, and [`ManifestError::ChannelField`] for a
    /// missing or mistyped field.
    ///
    /// # Examples
    ///
    /// ```
    /// use otaship_release::config::MqttDefaults;
    /// use otaship_release::transport::MqttSettings;
    /// use serde_json::json;
    ///
    /// let channel = json!({"broker": "mqtts://broker.example", "topic": "fw/gw"});
    /// let channel = channel.as_object().expect("record");
    /// let settings = MqttSettings::from_channel("gw", channel, &MqttDefaults::default())
    ///     .expect("valid channel");
    /// assert_eq!(settings.port, 8883);
    /// assert!(settings.tls);
    /// ```
    pub fn from_channel(
        artifact: &str,
        channel: &ChannelConfig,
        defaults: &MqttDefaults,
    ) -> Result<Self, ManifestError> {
        let fields = Fields::new(PROTOCOL, channel);
        let broker = fields.required_string("broker")?;
        let topic = fields.required_string("topic")?;
        let (host, port, tls) = parse_broker(broker)?;
        check_topic(&fields, topic)?;

        let qos = match fields.unsigned("qos")? {
            Some(qos) => u8::try_from(qos)
                .ok()
                .filter(|qos| *qos <= 2)
                .ok_or_else(|| fields.error("qos", format!("must be 0, 1 or 2, got {qos}")))?,
            None => defaults.qos,
        };
        let keepalive = fields.unsigned("keepalive")?.unwrap_or(defaults.keepalive_secs);
        let keepalive = u16::try_from(keepalive).map_err(|_| {
            let limit = u16::MAX;
            fields.error("keepalive", format!("must be at most {limit} seconds, got {keepalive}"))
        })?;

        Ok(Self {
            broker: broker.to_owned(),
            host,
            port,
            tls,
            insecure: fields.boolean("insecure")?.unwrap_or(false),
            topic: topic.to_owned(),
            qos,
            retain: fields.boolean("retain")?.unwrap_or(false),
            client_id: fields.string("client_id")?.map_or_else(
                || format!("ota-{artifact}-{}", std::process::id()),
                str::to_owned,
            ),
            username: fields.string("username")?.map(str::to_owned),
            password: fields.string("password")?.map(str::to_owned),
            keepalive: Duration::from_secs(keepalive.into()),
        })
    }

    fn qos_level(&self) -> QoS {
        match self.qos {
            0 => QoS::AtMostOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtLeastOnce,
        }
    }
}

/// Publish topics are concrete names: no wildcards, no NUL.
fn check_topic(fields: &Fields<'_>, topic: &str) -> Result<(), ManifestError> {
    if topic.is_empty() {
        return Err(fields.error("topic", "must not be empty"));
    }
    if let Some(bad) = topic.chars().find(|c| matches!(c, '+' | '#' | '\0')) {
        return Err(fields.error("topic", format!("must not contain {bad:?}")));
    }
    Ok(())
}

fn parse_broker(broker: &str) -> Result<(String, u16, bool), ManifestError> {
    let uri: Uri = broker.parse().map_err(|err| {
        ManifestError::channel_field(PROTOCOL, "broker", format!("is not a valid address: {err}"))
    })?;
    let tls = match uri.scheme_str() {
        Some("mqtt") => false,
        Some("mqtts") => true,
        other => {
            return Err(ManifestError::UnsupportedScheme {
                protocol: PROTOCOL,
                scheme: other.unwrap_or_default().to_owned(),
                expected: "mqtt or mqtts",
            });
        }
    };
    let host = uri
        .host()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ManifestError::channel_field(PROTOCOL, "broker", "has no host"))?;
    let port = uri
        .port_u16()
        .unwrap_or(if tls { TLS_PORT } else { PLAIN_PORT });
    Ok((host.to_owned(), port, tls))
}

/// Publishes an artifact payload to a broker.
#[cfg_attr(any(test, feature = "test-support"), mockall::automock)]
pub trait MqttPublisher {
    /// Publish `payload` according to `settings` and wait for the broker's
    /// acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Mqtt`] when the connection, publish, or
    /// acknowledgement fails.
    fn publish(&self, settings: &MqttSettings, payload: &[u8]) -> Result<(), TransportError>;
}

/// [`MqttPublisher`] backed by the synchronous `rumqttc` client.
///
/// Each publish opens a fresh connection, blocks until the acknowledgement
/// matching the QoS arrives, then disconnects.
#[derive(Debug, Clone, Copy, Default)]
pub struct RumqttPublisher;

impl MqttPublisher for RumqttPublisher {
    fn publish(&self, settings: &MqttSettings, payload: &[u8]) -> Result<(), TransportError> {
        let fail = |reason: String| TransportError::Mqtt {
            broker: settings.broker.clone(),
            reason,
        };

        let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        options.set_keep_alive(settings.keepalive);
        let max_packet = payload.len().saturating_add(PACKET_OVERHEAD);
        options.set_max_packet_size(max_packet, max_packet);
        if let Some(username) = &settings.username {
            options.set_credentials(username, settings.password.as_deref().unwrap_or_default());
        }
        if settings.tls {
            options.set_transport(tls::mqtt_transport(settings.insecure));
        }

        let qos = settings.qos_level();
        let (client, mut connection) = Client::new(options, 10);
        client
            .publish(&settings.topic, qos, settings.retain, payload.to_vec())
            .map_err(|err| fail(err.to_string()))?;

        let mut acknowledged = false;
        for notification in connection.iter() {
            let event = notification.map_err(|err| fail(err.to_string()))?;
            log::debug!("mqtt event from {}: {event:?}", settings.broker);
            if is_acknowledgement(&event, qos) {
                acknowledged = true;
                break;
            }
        }
        if !acknowledged {
            return Err(fail("connection closed before acknowledgement".to_owned()));
        }

        client.disconnect().map_err(|err| fail(err.to_string()))?;
        for notification in connection.iter() {
            match notification {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
        Ok(())
    }
}

fn is_acknowledgement(event: &Event, qos: QoS) -> bool {
    match (qos, event) {
        (QoS::AtMostOnce, Event::Outgoing(Outgoing::Publish(_)))
        | (QoS::AtLeastOnce, Event::Incoming(Packet::PubAck(_)))
        | (QoS::ExactlyOnce, Event::Incoming(Packet::PubComp(_))) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::{Value, json};

    fn channel(value: &Value) -> ChannelConfig {
        value.as_object().cloned().expect("channel record")
    }

    #[fixture]
    fn defaults() -> MqttDefaults {
        MqttDefaults::default()
    }

    #[rstest]
    fn derives_settings_with_defaults(defaults: MqttDefaults) {
        let settings = MqttSettings::from_channel(
            "gateway",
            &channel(&json!({"broker": "mqtt://broker.local", "topic": "fw/gateway"})),
            &defaults,
        )
        .expect("settings");

        assert_eq!(settings.host, "broker.local");
        assert_eq!(settings.port, 1883);
        assert!(!settings.tls);
        assert_eq!(settings.qos, 1);
        assert!(!settings.retain);
        assert_eq!(settings.keepalive, Duration::from_secs(60));
        assert_eq!(
            settings.client_id,
            format!("ota-gateway-{}", std::process::id())
        );
        assert_eq!(settings.username, None);
    }

    #[rstest]
    fn channel_values_override_defaults(defaults: MqttDefaults) {
        let settings = MqttSettings::from_channel(
            "gateway",
            &channel(&json!({
                "broker": "mqtts://broker.local:9000",
                "topic": "fw",
                "qos": 2,
                "retain": true,
                "client_id": "fixed",
                "username": "ota",
                "password": "secret",
                "keepalive": 15,
                "insecure": true
            })),
            &defaults,
        )
        .expect("settings");

        assert_eq!(settings.port, 9000);
        assert!(settings.tls);
        assert!(settings.insecure);
        assert_eq!(settings.qos, 2);
        assert!(settings.retain);
        assert_eq!(settings.client_id, "fixed");
        assert_eq!(settings.username.as_deref(), Some("ota"));
        assert_eq!(settings.password.as_deref(), Some("secret"));
        assert_eq!(settings.keepalive, Duration::from_secs(15));
    }

    #[rstest]
    fn settings_file_supplies_fallbacks() {
        let defaults = MqttDefaults {
            keepalive_secs: 5,
            qos: 0,
        };
        let settings = MqttSettings::from_channel(
            "gateway",
            &channel(&json!({"broker": "mqtt://b", "topic": "t"})),
            &defaults,
        )
        .expect("settings");

        assert_eq!(settings.qos, 0);
        assert_eq!(settings.keepalive, Duration::from_secs(5));
    }

    #[rstest]
    #[case::http("http://broker.local", "http")]
    #[case::tcp("tcp://broker.local", "tcp")]
    fn rejects_unsupported_schemes(defaults: MqttDefaults, #[case] broker: &str, #[case] scheme: &str) {
        let err = MqttSettings::from_channel(
            "gateway",
            &channel(&json!({"broker": broker, "topic": "t"})),
            &defaults,
        )
        .expect_err("unsupported scheme");
        assert!(matches!(err, ManifestError::UnsupportedScheme { scheme: ref found, .. } if found == scheme));
    }

    #[rstest]
    #[case::no_broker(json!({"topic": "t"}), "'broker' is required")]
    #[case::no_topic(json!({"broker": "mqtt://b"}), "'topic' is required")]
    #[case::qos_range(json!({"broker": "mqtt://b", "topic": "t", "qos": 3}), "'qos' must be 0, 1 or 2")]
    #[case::retain_type(json!({"broker": "mqtt://b", "topic": "t", "retain": "yes"}), "'retain' must be a boolean")]
    #[case::empty_topic(json!({"broker": "mqtt://b", "topic": ""}), "'topic' must not be empty")]
    #[case::single_level_wildcard(json!({"broker": "mqtt://b", "topic": "fw/+/gw"}), "'topic' must not contain '+'")]
    #[case::multi_level_wildcard(json!({"broker": "mqtt://b", "topic": "fw/#"}), "'topic' must not contain '#'")]
    #[case::keepalive_range(json!({"broker": "mqtt://b", "topic": "t", "keepalive": 70000}), "'keepalive' must be at most 65535 seconds")]
    fn rejects_invalid_channels(defaults: MqttDefaults, #[case] record: Value, #[case] expected: &str) {
        let err = MqttSettings::from_channel("gateway", &channel(&record), &defaults)
            .expect_err("invalid channel");
        assert!(err.to_string().contains(expected), "unexpected error: {err}");
    }

    #[rstest]
    #[case(QoS::AtMostOnce, Event::Outgoing(Outgoing::Publish(1)), true)]
    #[case(QoS::AtLeastOnce, Event::Outgoing(Outgoing::Publish(1)), false)]
    #[case(QoS::AtLeastOnce, Event::Incoming(Packet::PubAck(rumqttc::PubAck::new(1))), true)]
    #[case(QoS::ExactlyOnce, Event::Incoming(Packet::PubAck(rumqttc::PubAck::new(1))), false)]
    #[case(QoS::ExactlyOnce, Event::Incoming(Packet::PubComp(rumqttc::PubComp::new(1))), true)]
    fn acknowledgement_matches_qos(#[case] qos: QoS, #[case] event: Event, #[case] expected: bool) {
        assert_eq!(is_acknowledgement(&event, qos), expected);
    }
}
