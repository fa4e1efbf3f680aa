use std::net::Ipv4Addr;
use std::path::Path;
use serde::Deserialize;
use anyhow::{Context, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub lister: ListerConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_true")]
    pub ipv4: bool,
    #[serde(default = "default_true")]
    pub ipv6: bool,
    /// Address of the interface to join 224.0.0.251 on; unspecified lets the
    /// kernel pick
    #[serde(default = "default_interface_v4")]
    pub interface_v4: Ipv4Addr,
    /// Interface index to join ff02::fb on; 0 lets the kernel pick
    #[serde(default)]
    pub interface_v6: u32,
    /// Bind to the group address so only multicast datagrams are delivered
    #[serde(default)]
    pub multicast_only: bool,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_recv_buffer")]
    pub recv_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_true")]
    pub seed_local_host: bool,
    /// Upper bound on SRV/TXT records waiting for their PTR. Unbounded when
    /// absent.
    #[serde(default)]
    pub deferred_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lister_command")]
    pub command: String,
    #[serde(default = "default_lister_args")]
    pub args: Vec<String>,
    #[serde(default = "default_lister_interval")]
    pub interval_secs: u64,
    /// Arguments that dump the service type database
    #[serde(default = "default_lister_dump_args")]
    pub dump_args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_true() -> bool {
    true
}

fn default_interface_v4() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_channel_capacity() -> usize {
    1000
}

fn default_recv_buffer() -> usize {
    9000
}

fn default_lister_command() -> String {
    "avahi-browse".to_string()
}

fn default_lister_args() -> Vec<String> {
    vec!["-arpt".to_string()]
}

fn default_lister_dump_args() -> Vec<String> {
    vec!["--dump-db".to_string()]
}

fn default_lister_interval() -> u64 {
    1
}

fn default_listen() -> String {
    "[::]:8054".to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ipv4: true,
            ipv6: true,
            interface_v4: default_interface_v4(),
            interface_v6: 0,
            multicast_only: false,
            channel_capacity: default_channel_capacity(),
            recv_buffer: default_recv_buffer(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            seed_local_host: true,
            deferred_limit: None,
        }
    }
}

impl Default for ListerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_lister_command(),
            args: default_lister_args(),
            interval_secs: default_lister_interval(),
            dump_args: default_lister_dump_args(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.capture.ipv4 && config.capture.ipv6);
        assert_eq!(config.capture.channel_capacity, 1000);
        assert!(config.discovery.seed_local_host);
        assert_eq!(config.discovery.deferred_limit, None);
        assert_eq!(config.lister.command, "avahi-browse");
        assert_eq!(config.lister.args, vec!["-arpt".to_string()]);
        assert_eq!(config.lister.dump_args, vec!["--dump-db".to_string()]);
        assert_eq!(config.api.listen, "[::]:8054");
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [capture]
            ipv6 = false
            interface_v4 = "192.168.1.10"
            multicast_only = true

            [discovery]
            deferred_limit = 512

            [lister]
            enabled = false
            "#,
        )
        .unwrap();

        assert!(config.capture.ipv4);
        assert!(!config.capture.ipv6);
        assert_eq!(config.capture.interface_v4, Ipv4Addr::new(192, 168, 1, 10));
        assert!(config.capture.multicast_only);
        assert_eq!(config.discovery.deferred_limit, Some(512));
        assert!(!config.lister.enabled);
        assert_eq!(config.lister.interval_secs, 1);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load("/nonexistent/observerd.toml").is_err());
    }
}
