//! Live handle to a discovered scanner.
//!
//! A [`DeviceSession`] is produced by [`crate::Discovery::discover`]. Its base
//! URL never changes; the password may be replaced between calls.

use image::{DynamicImage, ImageFormat};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DoxieError, Result};
use crate::transport::{RawResponse, Transport};

/// Directory the scanner stores its JPEGs under. Its filesystem is
/// case-sensitive and upper-case only.
pub const INTERNAL_PATH: &str = "/DOXIE/JPEG/";

const INTERNAL_SEGMENTS: [&str; 2] = ["DOXIE", "JPEG"];

/// Status snapshot returned by `hello.json`.
///
/// `model` and `name` are required; a body without them is not a scanner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    /// Scanner model, e.g. "DX250"
    pub model: String,
    /// Defaults to the form "Doxie_XXXXXX"
    pub name: String,
    #[serde(default, rename = "firmwareWiFi")]
    pub firmware_wifi: String,
    /// Whether API access requires a password
    #[serde(default)]
    pub has_password: bool,
    #[serde(default, rename = "MAC")]
    pub mac: String,
    /// "AP" or "Client", see [`DeviceStatus::network_mode`]
    #[serde(default)]
    pub mode: String,
    /// Joined network name (client mode only)
    #[serde(default)]
    pub network: String,
    /// Address on the joined network (client mode only)
    #[serde(default)]
    pub ip: String,
}

/// How the scanner is attached to Wi-Fi.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMode {
    /// The scanner hosts its own network.
    AccessPoint,
    /// The scanner joined an existing network.
    Client,
    Unknown(String),
}

impl From<&str> for NetworkMode {
    fn from(mode: &str) -> Self {
        match mode {
            "AP" => NetworkMode::AccessPoint,
            "Client" => NetworkMode::Client,
            other => NetworkMode::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkMode::AccessPoint => write!(f, "AP"),
            NetworkMode::Client => write!(f, "Client"),
            NetworkMode::Unknown(mode) => write!(f, "{}", mode),
        }
    }
}

impl DeviceStatus {
    pub fn network_mode(&self) -> NetworkMode {
        NetworkMode::from(self.mode.as_str())
    }
}

/// Values from `hello_extra.json`; never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedStatus {
    pub firmware: String,
    /// True on AC power, false on battery
    pub connected_to_external_power: bool,
}

/// One scan in the scanner's memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Bare filename, e.g. "IMG_0001.JPG"
    pub name: String,
    #[serde(default)]
    pub size: u64,
    /// Device-formatted timestamp, e.g. "2010-05-01 00:10:06"
    #[serde(default)]
    pub modified: String,
}

impl ScanRecord {
    /// The modification time, if the device used its usual format.
    pub fn modified_at(&self) -> Option<chrono::NaiveDateTime> {
        chrono::NaiveDateTime::parse_from_str(&self.modified, "%Y-%m-%d %H:%M:%S").ok()
    }
}

#[derive(Debug, Deserialize)]
struct RecentScan {
    path: Option<String>,
}

/// Which image endpoint to fetch from.
#[derive(Debug, Clone, Copy)]
enum ImageKind {
    Scan,
    Thumbnail,
}

impl ImageKind {
    fn segment(self) -> &'static str {
        match self {
            ImageKind::Scan => "scans",
            ImageKind::Thumbnail => "thumbnails",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceSession {
    status: DeviceStatus,
    base_url: Url,
    password: Option<String>,
    transport: Transport,
}

impl DeviceSession {
    pub(crate) fn new(status: DeviceStatus, base_url: Url, transport: Transport) -> Self {
        Self {
            status,
            base_url,
            password: None,
            transport,
        }
    }

    /// Status captured at discovery time.
    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Replace the password sent with subsequent requests.
    pub fn set_password(&mut self, password: Option<String>) {
        self.password = password.filter(|p| !p.is_empty());
    }

    /// Firmware version and power source. The scanner answers this endpoint
    /// even without a password.
    pub async fn extended_status(&self) -> Result<ExtendedStatus> {
        let resp = self.get(&["hello_extra.json"]).await?;
        if resp.status != StatusCode::OK {
            return Err(DoxieError::UnexpectedStatus(resp.status.as_u16()));
        }
        Ok(serde_json::from_slice(&resp.body)?)
    }

    pub async fn firmware(&self) -> Result<String> {
        Ok(self.extended_status().await?.firmware)
    }

    /// Whether the scanner runs on its AC adapter rather than battery.
    pub async fn external_power(&self) -> Result<bool> {
        Ok(self.extended_status().await?.connected_to_external_power)
    }

    /// Restart the scanner's Wi-Fi system. The status light blinks blue while
    /// it restarts.
    pub async fn restart(&self) -> Result<()> {
        let resp = self.get(&["restart.json"]).await?;
        if resp.status != StatusCode::NO_CONTENT {
            return Err(DoxieError::UnexpectedStatus(resp.status.as_u16()));
        }
        tracing::info!("Scanner {} is restarting its Wi-Fi", self.status.name);
        Ok(())
    }

    /// List all scans in memory, in the scanner's order.
    ///
    /// Right after scanning the memory is busy and the scanner replies with an
    /// empty body; that surfaces as [`DoxieError::ScansUnavailable`].
    pub async fn scans(&self) -> Result<Vec<ScanRecord>> {
        let resp = self.get(&["scans.json"]).await?;
        if resp.status != StatusCode::OK {
            return Err(DoxieError::UnexpectedStatus(resp.status.as_u16()));
        }
        if resp.body.is_empty() {
            return Err(DoxieError::ScansUnavailable);
        }
        let items = parse_scan_list(&resp.body)?;
        tracing::debug!("Scanner reports {} scans", items.len());
        Ok(items)
    }

    /// Name of the most recent scan, `None` when there is none.
    pub async fn recent(&self) -> Result<Option<String>> {
        let resp = self.get(&["scans", "recent.json"]).await?;
        match resp.status {
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::OK => parse_recent(&resp.body),
            status => Err(DoxieError::UnexpectedStatus(status.as_u16())),
        }
    }

    /// Download and decode a full-size scan.
    pub async fn scan(&self, name: &str) -> Result<DynamicImage> {
        self.fetch_image(ImageKind::Scan, name).await
    }

    /// Download and decode a 240x240 thumbnail.
    ///
    /// The scanner renders thumbnails some seconds after a scan, until then
    /// this returns [`DoxieError::ThumbnailNotReady`].
    pub async fn thumbnail(&self, name: &str) -> Result<DynamicImage> {
        self.fetch_image(ImageKind::Thumbnail, name).await
    }

    /// Delete several scans with one request. The scanner reports success or
    /// failure for the batch as a whole.
    pub async fn delete<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let body = delete_body(names);
        let url = self.endpoint(&["scans", "delete.json"])?;
        let resp = self
            .transport
            .post_json(&url, self.password(), &body)
            .await?;
        if resp.status != StatusCode::NO_CONTENT {
            return Err(DoxieError::DeleteFailed(resp.status.as_u16()));
        }
        tracing::info!("Deleted {} scan(s)", body.len());
        Ok(())
    }

    async fn fetch_image(&self, kind: ImageKind, name: &str) -> Result<DynamicImage> {
        let file = base_name(name).to_uppercase();
        let mut segments = vec![kind.segment()];
        segments.extend(INTERNAL_SEGMENTS);
        segments.push(&file);

        let resp = self.get(&segments).await?;
        match (resp.status, kind) {
            (StatusCode::OK, _) => {}
            (StatusCode::NOT_FOUND, ImageKind::Scan) => {
                return Err(DoxieError::ScanNotFound(file));
            }
            (StatusCode::NOT_FOUND, ImageKind::Thumbnail) => {
                return Err(DoxieError::ThumbnailNotReady(file));
            }
            (status, _) => return Err(DoxieError::UnexpectedStatus(status.as_u16())),
        }
        if resp.body.is_empty() {
            return Err(DoxieError::DownloadFailed);
        }

        Ok(image::load_from_memory_with_format(
            &resp.body,
            ImageFormat::Jpeg,
        )?)
    }

    async fn get(&self, segments: &[&str]) -> Result<RawResponse> {
        let url = self.endpoint(segments)?;
        self.transport.get(&url, self.password()).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DoxieError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Strip any directory component from a device path.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Fully qualified upper-case path of a scan on the device.
pub fn internal_path(name: &str) -> String {
    format!("{}{}", INTERNAL_PATH, base_name(name).to_uppercase())
}

fn delete_body<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names.iter().map(|n| internal_path(n.as_ref())).collect()
}

fn parse_scan_list(body: &[u8]) -> Result<Vec<ScanRecord>> {
    let mut items: Vec<ScanRecord> = serde_json::from_slice(body)?;
    for item in &mut items {
        item.name = base_name(&item.name).to_string();
    }
    Ok(items)
}

fn parse_recent(body: &[u8]) -> Result<Option<String>> {
    if body.is_empty() {
        return Ok(None);
    }
    let recent: RecentScan = serde_json::from_slice(body)?;
    Ok(recent
        .path
        .map(|p| base_name(&p).to_string())
        .filter(|p| !p.is_empty()))
}
