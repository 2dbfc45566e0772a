//! Pipeline configuration.

use crate::error::FeedError;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use tickwire_types::MAX_PACKET_SIZE;

/// Everything the engine needs to bring the pipeline up.
///
/// Loadable from TOML; `Default` gives the reference deployment values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Multicast group to join.
    pub multicast_group: Ipv4Addr,
    /// Interface to join the group on. 0.0.0.0 lets the kernel choose.
    pub interface_ip: Ipv4Addr,
    /// UDP port to bind. 0 binds an ephemeral port.
    pub port: u16,
    /// Socket receive buffer hint, bytes.
    pub receive_buffer_size: usize,
    /// Request kernel receive timestamps on the socket.
    pub enable_timestamping: bool,
    /// Core to pin the ingress thread to, -1 for unpinned.
    pub ingress_cpu: i32,
    /// Core to pin the decoder thread to, -1 for unpinned.
    pub decoder_cpu: i32,
    /// Core to pin the dispatcher thread to, -1 for unpinned.
    pub dispatcher_cpu: i32,
    /// Upper bound on records decoded from one packet.
    pub max_messages_per_packet: usize,
    /// Ingress-to-decoder ring slots. Power of two >= 2.
    pub packet_ring_capacity: usize,
    /// Decoder-to-dispatcher ring slots. Power of two >= 2.
    pub record_ring_capacity: usize,
    /// Per-subscriber ring slots. Power of two >= 2.
    pub subscriber_ring_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            multicast_group: Ipv4Addr::new(239, 1, 1, 1),
            interface_ip: Ipv4Addr::UNSPECIFIED,
            port: 10_000,
            receive_buffer_size: MAX_PACKET_SIZE * 1024,
            enable_timestamping: true,
            ingress_cpu: -1,
            decoder_cpu: -1,
            dispatcher_cpu: -1,
            max_messages_per_packet: 16,
            packet_ring_capacity: 16 * 1024,
            record_ring_capacity: 64 * 1024,
            subscriber_ring_capacity: 1024,
        }
    }
}

impl FeedConfig {
    /// Load from a TOML file; missing keys fall back to the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FeedError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FeedError::Config(format!("failed to read config file: {e}")))?;
        toml::from_str(&contents)
            .map_err(|e| FeedError::Config(format!("failed to parse config: {e}")))
    }

    /// Startup-time validation; any violation is fatal before threads or
    /// sockets exist.
    pub fn validate(&self) -> Result<(), FeedError> {
        if !self.multicast_group.is_multicast() {
            return Err(FeedError::Config(format!(
                "{} is not a multicast address",
                self.multicast_group
            )));
        }
        for (name, capacity) in [
            ("packet_ring_capacity", self.packet_ring_capacity),
            ("record_ring_capacity", self.record_ring_capacity),
            ("subscriber_ring_capacity", self.subscriber_ring_capacity),
        ] {
            if capacity < 2 || !capacity.is_power_of_two() {
                return Err(FeedError::Config(format!(
                    "{name} must be a power of two >= 2, got {capacity}"
                )));
            }
        }
        if self.max_messages_per_packet == 0 {
            return Err(FeedError::Config(
                "max_messages_per_packet must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        FeedConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_multicast_group() {
        let config = FeedConfig {
            multicast_group: Ipv4Addr::new(10, 0, 0, 1),
            ..FeedConfig::default()
        };
        assert!(matches!(config.validate(), Err(FeedError::Config(_))));
    }

    #[test]
    fn rejects_non_power_of_two_ring() {
        let config = FeedConfig {
            record_ring_capacity: 1000,
            ..FeedConfig::default()
        };
        assert!(matches!(config.validate(), Err(FeedError::Config(_))));
    }

    #[test]
    fn rejects_zero_message_budget() {
        let config = FeedConfig {
            max_messages_per_packet: 0,
            ..FeedConfig::default()
        };
        assert!(matches!(config.validate(), Err(FeedError::Config(_))));
    }

    #[test]
    fn parses_partial_toml() {
        let toml = r#"
            multicast_group = "239.9.9.9"
            port = 31337
            subscriber_ring_capacity = 2048
        "#;
        let config: FeedConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.multicast_group, Ipv4Addr::new(239, 9, 9, 9));
        assert_eq!(config.port, 31337);
        assert_eq!(config.subscriber_ring_capacity, 2048);
        // Unlisted keys keep their defaults.
        assert_eq!(config.max_messages_per_packet, 16);
        config.validate().unwrap();
    }
}
