//! Scanner discovery.
//!
//! Two probes race:
//! - Direct: `hello.json` at the access-point address (scanner hosts its own
//!   Wi-Fi network)
//! - Broadcast: SSDP M-SEARCH to the multicast group, then `hello.json` at
//!   whichever host replies (scanner joined an existing network)
//!
//! The first probe to return a valid status wins. The other task is detached
//! and its result is never read.

use futures::future::select_ok;
use reqwest::StatusCode;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use url::Url;

use crate::config::DiscoveryConfig;
use crate::error::{DoxieError, Result};
use crate::session::{DeviceSession, DeviceStatus};
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct Discovery {
    config: DiscoveryConfig,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Locate the scanner and open a session on it.
    ///
    /// Returns [`DoxieError::DeviceNotFound`] when both probes fail or neither
    /// answers within the configured timeout.
    pub async fn discover(&self) -> Result<DeviceSession> {
        let transport = Transport::new(self.config.request_timeout)?;

        tracing::debug!(
            "Probing {} directly and {} via SSDP",
            self.config.ap_host,
            self.config.multicast_addr
        );

        let direct = tokio::spawn(probe_access_point(self.config.clone(), transport.clone()));
        let broadcast = tokio::spawn(probe_client_network(self.config.clone(), transport));

        let probes = [("direct", direct), ("broadcast", broadcast)]
            .into_iter()
            .map(|(name, handle)| {
                Box::pin(async move {
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(DoxieError::Io(std::io::Error::other(e))),
                    };
                    if let Err(ref e) = result {
                        tracing::debug!("{} probe failed: {}", name, e);
                    }
                    result
                })
            });

        match tokio::time::timeout(self.config.request_timeout, select_ok(probes)).await {
            Ok(Ok((session, _pending))) => {
                tracing::info!(
                    "Found {} ({}) at {}",
                    session.status().name,
                    session.status().model,
                    session.base_url()
                );
                Ok(session)
            }
            Ok(Err(_)) => {
                tracing::info!("Scanner not found: all probes failed");
                Err(DoxieError::DeviceNotFound)
            }
            Err(_) => {
                tracing::info!(
                    "Scanner not found within {:?}",
                    self.config.request_timeout
                );
                Err(DoxieError::DeviceNotFound)
            }
        }
    }
}

/// Assume the scanner is the access point and ask it directly.
async fn probe_access_point(config: DiscoveryConfig, transport: Transport) -> Result<DeviceSession> {
    let base_url = config.base_url_for(&config.ap_host)?;
    say_hello(base_url, transport).await
}

/// Ask the multicast group, then query whoever answers first.
async fn probe_client_network(config: DiscoveryConfig, transport: Transport) -> Result<DeviceSession> {
    let bind_addr: SocketAddr = if config.multicast_addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind_addr).await?;

    let request = config.search_request();
    socket
        .send_to(request.as_bytes(), config.multicast_addr)
        .await?;

    let mut buf = [0u8; 1024];
    let (len, from) = tokio::time::timeout(config.request_timeout, socket.recv_from(&mut buf))
        .await
        .map_err(|_| DoxieError::DeviceUnreachable("no SSDP reply".to_string()))??;
    tracing::debug!("SSDP reply from {} ({} bytes)", from, len);

    let base_url = config.base_url_for(&from.ip().to_string())?;
    say_hello(base_url, transport).await
}

/// Fetch `hello.json` and build a session rooted at `base_url`.
async fn say_hello(base_url: Url, transport: Transport) -> Result<DeviceSession> {
    let url = base_url.join("hello.json")?;
    let resp = transport.get(&url, None).await?;

    if resp.status != StatusCode::OK {
        return Err(DoxieError::UnexpectedStatus(resp.status.as_u16()));
    }

    let status: DeviceStatus = serde_json::from_slice(&resp.body)?;
    Ok(DeviceSession::new(status, base_url, transport))
}
