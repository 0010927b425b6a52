//! Single-shot HTTP requests to the scanner.
//!
//! Each call is bounded by one wall-clock timeout covering connect, send and
//! reading the full body. There are no retries.

use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::error::{DoxieError, Result};

/// Username the scanner expects in basic-auth userinfo
pub const AUTH_USERNAME: &str = "doxie";

/// A complete response: status plus the body read to the end.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    timeout: Duration,
}

impl Transport {
    pub fn new(timeout: Duration) -> Result<Self> {
        // The scanner is always on the local network.
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(DoxieError::Client)?;
        Ok(Self { client, timeout })
    }

    pub async fn get(&self, url: &Url, password: Option<&str>) -> Result<RawResponse> {
        tracing::debug!("GET {}", url);
        let url = with_credentials(url, password)?;
        self.execute(self.client.get(url)).await
    }

    pub async fn post_json<T>(&self, url: &Url, password: Option<&str>, body: &T) -> Result<RawResponse>
    where
        T: Serialize + ?Sized,
    {
        tracing::debug!("POST {}", url);
        let url = with_credentials(url, password)?;
        self.execute(self.client.post(url).json(body)).await
    }

    async fn execute(&self, request: RequestBuilder) -> Result<RawResponse> {
        let exchange = async {
            let resp = request.send().await?;
            let status = resp.status();
            let body = resp.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>(RawResponse { status, body })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(resp)) => {
                tracing::debug!("-> {} ({} bytes)", resp.status, resp.body.len());
                Ok(resp)
            }
            Ok(Err(e)) => {
                tracing::debug!("Request failed: {}", e);
                Err(DoxieError::DeviceUnreachable(e.to_string()))
            }
            Err(_) => {
                tracing::debug!("Request timed out after {:?}", self.timeout);
                Err(DoxieError::DeviceUnreachable(format!(
                    "no response within {:?}",
                    self.timeout
                )))
            }
        }
    }
}

/// Embed the password as `doxie:<password>@` userinfo in the URL authority.
///
/// An empty or missing password leaves the URL untouched.
pub fn with_credentials(url: &Url, password: Option<&str>) -> Result<Url> {
    let mut authed = url.clone();
    if let Some(password) = password.filter(|p| !p.is_empty()) {
        authed
            .set_username(AUTH_USERNAME)
            .and_then(|_| authed.set_password(Some(password)))
            .map_err(|_| DoxieError::InvalidUrl(url::ParseError::SetHostOnCannotBeABaseUrl))?;
    }
    Ok(authed)
}
