//! Discovery configuration: default access-point address, static IP override,
//! port and probe timeout.
//!
//! Values are resolved once, before discovery runs, and handed to
//! [`crate::Discovery`] explicitly.

use serde::Deserialize;
use std::fs;
use std::net::{Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::Result;

/// Address the scanner uses when it hosts its own Wi-Fi network
pub const DEFAULT_AP_HOST: &str = "192.168.1.100";

/// Default HTTP API port of the scanner
pub const DEFAULT_PORT: u16 = 8080;

/// SSDP multicast rendezvous address
pub const DEFAULT_MULTICAST_ADDR: &str = "239.255.255.250:1900";

/// SSDP search target advertised by Doxie scanners
pub const DEFAULT_SEARCH_TARGET: &str = "urn:schemas-getdoxie-com:device:Scanner:1";

/// Hard limit on a single request or probe
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const ENV_STATIC_IP: &str = "DOXIE_STATIC_IP";
const ENV_PORT: &str = "DOXIE_PORT";
const ENV_AP_HOST: &str = "DOXIE_AP_HOST";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    scanner: Option<ScannerConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct ScannerConfig {
    /// Access-point mode address (e.g., "192.168.1.100")
    ap_host: Option<String>,
    /// Fixed address of the scanner on a client network
    static_ip: Option<String>,
    port: Option<u16>,
    timeout_secs: Option<u64>,
}

/// Runtime discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub ap_host: String,
    /// When set, replaces the host found by either probe.
    pub static_ip: Option<String>,
    pub port: u16,
    pub multicast_addr: SocketAddr,
    pub search_target: String,
    pub request_timeout: Duration,
    /// Source of the configuration (for logging)
    pub source: ConfigSource,
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Using default hardcoded values
    Default,
    /// At least one value came from an environment variable
    Environment,
    /// At least one value came from the config file
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ap_host: DEFAULT_AP_HOST.to_string(),
            static_ip: None,
            port: DEFAULT_PORT,
            multicast_addr: DEFAULT_MULTICAST_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([239, 255, 255, 250], 1900))),
            search_target: DEFAULT_SEARCH_TARGET.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
            source: ConfigSource::Default,
        }
    }
}

impl DiscoveryConfig {
    /// Base URL of the scanner API for `host`, honouring the static IP override.
    ///
    /// Always ends with `/` so relative endpoint paths join underneath it.
    pub fn base_url_for(&self, host: &str) -> Result<Url> {
        let host = self.static_ip.as_deref().unwrap_or(host);
        let url = if host.parse::<Ipv6Addr>().is_ok() {
            format!("http://[{}]:{}/", host, self.port)
        } else {
            format!("http://{}:{}/", host, self.port)
        };
        Ok(Url::parse(&url)?)
    }

    /// The SSDP M-SEARCH datagram sent by the broadcast probe.
    pub fn search_request(&self) -> String {
        format!(
            "M-SEARCH * HTTP/1.1\r\nHOST: {}\r\nMAN: \"ssdp:discover\"\r\nMX: 1\r\nST: {}\r\n\r\n",
            self.multicast_addr, self.search_target
        )
    }
}

/// Get the path to the configuration file
fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("doxie").join("config.toml"))
}

/// Load configuration from the config file
fn load_config_file() -> Option<ConfigFile> {
    let path = get_config_file_path()?;

    if !path.exists() {
        return None;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

/// Load discovery configuration with priority:
/// 1. Environment variables (DOXIE_STATIC_IP, DOXIE_PORT, DOXIE_AP_HOST)
/// 2. Config file (~/.config/doxie/config.toml)
/// 3. Default values
pub fn load_discovery_config() -> DiscoveryConfig {
    resolve_config(load_config_file(), |key| std::env::var(key).ok())
}

/// Merge the config file and environment over the defaults.
pub fn resolve_config<F>(file: Option<ConfigFile>, env: F) -> DiscoveryConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = DiscoveryConfig::default();

    if let Some(scanner) = file.and_then(|f| f.scanner) {
        let mut used = false;
        if let Some(host) = non_empty(scanner.ap_host) {
            config.ap_host = host;
            used = true;
        }
        if let Some(ip) = non_empty(scanner.static_ip) {
            config.static_ip = Some(ip);
            used = true;
        }
        if let Some(port) = scanner.port {
            config.port = port;
            used = true;
        }
        if let Some(secs) = scanner.timeout_secs.filter(|s| *s > 0) {
            config.request_timeout = Duration::from_secs(secs);
            used = true;
        }
        if used {
            config.source = ConfigSource::ConfigFile;
        }
    }

    let mut env_used = false;
    if let Some(ip) = non_empty(env(ENV_STATIC_IP)) {
        tracing::info!("Using static scanner IP from environment variable: {}", ip);
        config.static_ip = Some(ip);
        env_used = true;
    }
    if let Some(host) = non_empty(env(ENV_AP_HOST)) {
        config.ap_host = host;
        env_used = true;
    }
    if let Some(port) = non_empty(env(ENV_PORT)) {
        match port.parse::<u16>() {
            Ok(port) => {
                config.port = port;
                env_used = true;
            }
            Err(e) => tracing::warn!("Ignoring {}={:?}: {}", ENV_PORT, port, e),
        }
    }
    if env_used {
        config.source = ConfigSource::Environment;
    }

    tracing::debug!(
        "Discovery config: ap_host={} static_ip={:?} port={} (from {})",
        config.ap_host,
        config.static_ip,
        config.port,
        config.source
    );
    config
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/doxie/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# Doxie Client Configuration
# Place this file at: ~/.config/doxie/config.toml

[scanner]
# Address of the scanner when it creates its own Wi-Fi network
# Default: 192.168.1.100
# ap_host = "192.168.1.100"

# Fixed address of the scanner after it joined your network (skips guessing)
# static_ip = "192.168.0.42"

# HTTP API port
# port = 8080

# Per-request timeout in seconds
# timeout_secs = 5
"#
    .to_string()
}
