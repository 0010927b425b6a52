//! In-process stand-in for a Doxie scanner.
//!
//! `StubScanner` is a minimal HTTP/1.1 server on 127.0.0.1 that answers the
//! scanner endpoints and records every request it sees. Each connection
//! serves one request and is closed.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use doxie_core::{DeviceSession, Discovery, DiscoveryConfig};
use image::{DynamicImage, ImageFormat, RgbImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

pub const HELLO_JSON: &str = r#"{ "model": "DX250",
    "name": "Doxie_042D6A",
    "firmwareWiFi": "1.29",
    "hasPassword": false,
    "MAC": "00:11:E5:04:2D:6A",
    "mode": "AP",
    "network": "",
    "ip": ""}"#;

pub const SCANS_JSON: &str = r#"[{
    "name":"/DOXIE/JPEG/IMG_0001.JPG",
    "size":241220,
    "modified":"2010-05-01 00:10:06"
    },
    {
    "name":"/DOXIE/JPEG/IMG_0002.JPG",
    "size":265085,
    "modified":"2010-05-01 00:09:26"
    },
    {
    "name":"/DOXIE/JPEG/IMG_0003.JPG",
    "size":273522,
    "modified":"2010-05-01 00:09:44"
    }]"#;

/// A request as seen by the stub.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self::new(status, Vec::new())
    }
}

/// Switches for the scanner's behaviour.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    /// `scans.json` answers `[]`
    pub empty_scans: bool,
    /// `scans.json` answers 200 with no body
    pub busy: bool,
    /// `scans/recent.json` answers 204
    pub no_recent: bool,
    /// `scans/delete.json` answers 403
    pub delete_forbidden: bool,
    /// Authorization header required on everything except `hello*.json`
    pub authorization: Option<&'static str>,
}

/// A small valid JPEG.
pub fn test_jpeg() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, image::Rgb([200, 10, 10])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .unwrap();
    buf
}

/// Route table of a scanner with one stored scan (IMG_0001.JPG) plus a few
/// pathological files.
pub fn doxie_routes(state: DeviceState) -> impl Fn(&Recorded) -> Reply + Send + Sync + 'static {
    let jpeg = test_jpeg();
    move |req: &Recorded| {
        let open = matches!(req.path.as_str(), "/hello.json" | "/hello_extra.json");
        if let (Some(expected), false) = (state.authorization, open) {
            if req.authorization.as_deref() != Some(expected) {
                return Reply::status(401);
            }
        }

        match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/hello.json") => Reply::new(200, HELLO_JSON),
            ("GET", "/hello_extra.json") => Reply::new(
                200,
                r#"{ "firmware": "0.26", "connectedToExternalPower": true}"#,
            ),
            ("GET", "/restart.json") => Reply::status(204),
            ("GET", "/scans.json") if state.busy => Reply::status(200),
            ("GET", "/scans.json") if state.empty_scans => Reply::new(200, "[]"),
            ("GET", "/scans.json") => Reply::new(200, SCANS_JSON),
            ("GET", "/scans/recent.json") if state.no_recent => Reply::status(204),
            ("GET", "/scans/recent.json") => {
                Reply::new(200, r#"{"path":"/DOXIE/JPEG/IMG_0003.JPG"}"#)
            }
            ("GET", "/scans/DOXIE/JPEG/IMG_0001.JPG")
            | ("GET", "/thumbnails/DOXIE/JPEG/IMG_0001.JPG") => Reply::new(200, jpeg.clone()),
            ("GET", "/scans/DOXIE/JPEG/EMPTY.JPG") => Reply::status(200),
            ("GET", "/scans/DOXIE/JPEG/BROKEN.JPG") => Reply::new(200, "not a jpeg"),
            ("GET", "/scans/DOXIE/JPEG/LOCKED.JPG") => Reply::status(500),
            ("POST", "/scans/delete.json") if state.delete_forbidden => Reply::status(403),
            ("POST", "/scans/delete.json") => Reply::status(204),
            _ => Reply::status(404),
        }
    }
}

pub struct StubScanner {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
    /// UDP socket that swallows SSDP searches without answering.
    silent_group: UdpSocket,
}

impl StubScanner {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Recorded) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);

        let seen = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let handler = handler.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    let _ = serve_one(stream, handler.as_ref(), &seen).await;
                });
            }
        });

        let silent_group = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        Self {
            addr,
            requests,
            silent_group,
        }
    }

    pub async fn doxie(state: DeviceState) -> Self {
        Self::start(doxie_routes(state)).await
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    /// Discovery settings that find this stub through the direct probe.
    pub fn config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            ap_host: "127.0.0.1".to_string(),
            port: self.addr.port(),
            multicast_addr: self.silent_group.local_addr().unwrap(),
            request_timeout: Duration::from_secs(2),
            ..DiscoveryConfig::default()
        }
    }

    pub async fn connect(&self) -> DeviceSession {
        Discovery::new(self.config()).discover().await.unwrap()
    }
}

async fn serve_one<F>(
    mut stream: TcpStream,
    handler: &F,
    seen: &Mutex<Vec<Recorded>>,
) -> Option<()>
where
    F: Fn(&Recorded) -> Reply,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let mut content_length = 0usize;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("authorization") {
                authorization = Some(value.to_string());
            }
        }
    }

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    let recorded = Recorded {
        method,
        path,
        authorization,
        body,
    };
    let reply = handler(&recorded);
    seen.lock().unwrap().push(recorded);

    let mut response = format!("HTTP/1.1 {} {}\r\n", reply.status, reason(reply.status));
    if reply.status != 204 {
        response.push_str(&format!("Content-Length: {}\r\n", reply.body.len()));
        response.push_str("Content-Type: application/octet-stream\r\n");
    }
    response.push_str("Connection: close\r\n\r\n");

    stream.write_all(response.as_bytes()).await.ok()?;
    if reply.status != 204 {
        stream.write_all(&reply.body).await.ok()?;
    }
    stream.shutdown().await.ok()?;
    Some(())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        _ => "Internal Server Error",
    }
}

/// Answers the first SSDP search it receives; returns its address and the
/// search payload once seen.
pub async fn ssdp_responder() -> (SocketAddr, tokio::sync::oneshot::Receiver<String>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        if let Ok((len, from)) = socket.recv_from(&mut buf).await {
            let payload = String::from_utf8_lossy(&buf[..len]).to_string();
            let reply = "HTTP/1.1 200 OK\r\nST: urn:schemas-getdoxie-com:device:Scanner:1\r\n\r\n";
            let _ = socket.send_to(reply.as_bytes(), from).await;
            let _ = tx.send(payload);
        }
    });

    (addr, rx)
}
