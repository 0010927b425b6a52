//! Doxie Core Library
//!
//! Client for Doxie Wi-Fi document scanners:
//! - Discovery (access-point probe raced against SSDP on a joined network)
//! - Status and power/firmware queries
//! - Listing, downloading (JPEG-decoded) and deleting scans
//!
//! # Example
//!
//! ```no_run
//! use doxie_core::{Discovery, DiscoveryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), doxie_core::DoxieError> {
//!     let mut scanner = Discovery::new(DiscoveryConfig::default()).discover().await?;
//!     println!("Found {}", scanner.status().name);
//!
//!     if scanner.status().has_password {
//!         scanner.set_password(Some("secret".to_string()));
//!     }
//!
//!     for item in scanner.scans().await? {
//!         let image = scanner.scan(&item.name).await?;
//!         println!("{}: {}x{}", item.name, image.width(), image.height());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use config::{load_discovery_config, ConfigSource, DiscoveryConfig};
pub use discovery::Discovery;
pub use error::{DoxieError, Result};
pub use session::{DeviceSession, DeviceStatus, ExtendedStatus, NetworkMode, ScanRecord};

/// Library version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
