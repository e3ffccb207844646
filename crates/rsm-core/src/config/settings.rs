//! rsm configuration

use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use rsm_protocol::{ChannelPaths, SessionId, CHUNK_SIZE};

use crate::error::ConfigError;

/// Name of the private tmux socket inside the work directory
const TMUX_SOCKET_NAME: &str = "tmux.sock";

/// Configuration shared by every rsm subcommand
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RsmConfig {
    /// Directory holding channel sockets, metadata files and the tmux socket
    pub work_dir: PathBuf,

    /// tmux executable
    pub tmux_binary: String,

    /// Host address the acceptor binds
    pub bind_host: String,

    /// How long the acceptor waits for a terminal adapter to claim a channel
    #[serde(with = "secs_serde")]
    pub attach_timeout: Duration,

    /// Bytes moved per read when forwarding
    pub chunk_size: usize,
}

impl Default for RsmConfig {
    fn default() -> Self {
        Self {
            work_dir: super::default_work_dir(),
            tmux_binary: "tmux".to_string(),
            bind_host: "0.0.0.0".to_string(),
            attach_timeout: Duration::from_secs(30),
            chunk_size: CHUNK_SIZE,
        }
    }
}

impl RsmConfig {
    /// Path of the tmux server socket (`<work_dir>/tmux.sock`)
    pub fn tmux_socket(&self) -> PathBuf {
        self.work_dir.join(TMUX_SOCKET_NAME)
    }

    /// Channel and metadata paths for a session
    pub fn channel_paths(&self, id: SessionId) -> ChannelPaths {
        ChannelPaths::new(&self.work_dir, id)
    }

    /// Listener address for a port, e.g. `0.0.0.0:9001` or `[::]:9001`
    pub fn bind_address(&self, port: u16) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.bind_host.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "bind_host {:?} is not an IP address",
                self.bind_host
            ))
        })?;
        Ok(SocketAddr::new(ip, port))
    }

    /// Create the work directory if it does not exist
    pub fn ensure_work_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.work_dir).map_err(|source| ConfigError::WorkDir {
            path: self.work_dir.clone(),
            source,
        })
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".into()));
        }
        if self.tmux_binary.trim().is_empty() {
            return Err(ConfigError::Invalid("tmux_binary must not be empty".into()));
        }
        self.bind_address(0)?;
        Ok(())
    }
}

mod secs_serde {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let config = RsmConfig {
            work_dir: PathBuf::from("/srv/rsm"),
            ..RsmConfig::default()
        };
        assert_eq!(config.tmux_socket(), PathBuf::from("/srv/rsm/tmux.sock"));
        assert_eq!(
            config.channel_paths(SessionId::new(9001, 2)).socket,
            PathBuf::from("/srv/rsm/client_09001_000002.sock")
        );
        assert_eq!(config.bind_address(9001).unwrap().to_string(), "0.0.0.0:9001");
    }

    #[test]
    fn test_ipv6_bind_host() {
        let config = RsmConfig {
            bind_host: "::".to_string(),
            ..RsmConfig::default()
        };
        let addr = config.bind_address(9001).unwrap();
        assert!(addr.is_ipv6());
        assert_eq!(addr.port(), 9001);
        assert_eq!(addr.to_string(), "[::]:9001");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_host_must_be_an_address() {
        let config = RsmConfig {
            bind_host: "localhost".to_string(),
            ..RsmConfig::default()
        };
        assert!(matches!(
            config.bind_address(9001),
            Err(ConfigError::Invalid(_))
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = RsmConfig {
            chunk_size: 0,
            ..RsmConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
