//! Centralized configuration for the channel and wire format.

use std::time::Duration;

/// Channel transport configuration.
pub struct ChannelConfig;

impl ChannelConfig {
    /// Largest frame accepted on either side of a channel.
    pub const MAX_MESSAGE_SIZE: usize = 1 << 20; // 1 MiB
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    /// Socket read/write timeout for a blocking round trip.
    pub const IO_TIMEOUT: Duration = Duration::from_secs(30);
    pub const MAX_CONNECTIONS: usize = 16;
    /// Error messages in reply envelopes are cut to this many UTF-16 units.
    pub const MAX_ERROR_MESSAGE_UNITS: usize = 512;
}

/// Context registry limits.
pub struct RegistryConfig;

impl RegistryConfig {
    /// Torn-down owners remembered per registry. Older tombstones are
    /// forgotten first and their owners read as `Uninitialized` again.
    pub const MAX_TOMBSTONES: usize = 4096;
}

/// Host binary defaults.
pub struct HostConfig;

impl HostConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_NAME: &'static str = "comproxy host";
    /// Line printed on stdout once the channel server is accepting connections.
    pub const PORT_ANNOUNCEMENT_PREFIX: &'static str = "CHANNEL_PORT=";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_are_reasonable() {
        assert!(ChannelConfig::MAX_MESSAGE_SIZE >= 64 * 1024);
        assert!(ChannelConfig::CONNECT_TIMEOUT > Duration::ZERO);
        assert!(ChannelConfig::IO_TIMEOUT >= ChannelConfig::CONNECT_TIMEOUT);
        assert!(ChannelConfig::MAX_CONNECTIONS > 0);
        assert!(RegistryConfig::MAX_TOMBSTONES >= ChannelConfig::MAX_CONNECTIONS);
    }
}
