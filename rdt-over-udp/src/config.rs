//! Endpoint configuration.

use std::time::Duration;

use crate::protocol::ProtocolKind;
use crate::simulator::ChannelConfig;

/// Everything needed to open an [`crate::endpoint::Endpoint`].
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    pub protocol: ProtocolKind,
    pub local_host: String,
    pub local_port: u16,
    pub remote_host: String,
    pub remote_port: u16,
    /// Window capacity W for Go-Back-N and Selective-Repeat.
    pub window_size: usize,
    /// `None` uses [`ProtocolKind::default_retransmit_timeout`].
    pub retransmit_timeout: Option<Duration>,
    /// `None` uses [`ProtocolKind::default_poll_interval`].
    pub poll_interval: Option<Duration>,
    /// Fault model for inbound datagrams; `None` talks to the socket directly.
    pub channel: Option<ChannelConfig>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolKind::Rdt10,
            local_host: "127.0.0.1".to_string(),
            local_port: 7777,
            remote_host: "127.0.0.1".to_string(),
            remote_port: 8888,
            window_size: 10,
            retransmit_timeout: None,
            poll_interval: None,
            channel: Some(ChannelConfig::default()),
        }
    }
}

impl EndpointConfig {
    pub fn retransmit_timeout(&self) -> Duration {
        self.retransmit_timeout
            .unwrap_or_else(|| self.protocol.default_retransmit_timeout())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
            .unwrap_or_else(|| self.protocol.default_poll_interval())
    }

    /// The same endpoint seen from the other side (ports and hosts swapped).
    pub fn mirrored(&self) -> Self {
        Self {
            local_host: self.remote_host.clone(),
            local_port: self.remote_port,
            remote_host: self.local_host.clone(),
            remote_port: self.local_port,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let max_window = match self.protocol {
            ProtocolKind::GoBackN => Some(256),
            ProtocolKind::SelectiveRepeat => Some(128),
            _ => None,
        };
        if let Some(max) = max_window {
            if !(2..=max).contains(&self.window_size) {
                return Err(ConfigError::WindowSize {
                    protocol: self.protocol,
                    size: self.window_size,
                    max,
                });
            }
        }
        if self.retransmit_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroDuration("retransmit_timeout"));
        }
        if self.poll_interval == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroDuration("poll_interval"));
        }
        if let Some(channel) = &self.channel {
            channel.validate()?;
        }
        Ok(())
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{protocol} window size must be in 2..={max}, got {size}")]
    WindowSize {
        protocol: ProtocolKind,
        size: usize,
        max: usize,
    },
    #[error("{name} must be within [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}
