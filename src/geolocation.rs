use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::domain::Location;
use crate::domain::UNKNOWN;

#[derive(thiserror::Error, Debug)]
pub enum GeoError {
    #[error("not an IP address: {0:?}")]
    InvalidAddress(String),
    #[error("lookup failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("lookup service refused: {0}")]
    Refused(String),
}

/// ipapi.co-style payload; every field is optional
#[derive(Deserialize, Debug)]
struct LookupResponse {
    country_name: Option<String>,
    country_code: Option<String>,
    city: Option<String>,
    timezone: Option<String>,
    #[serde(default)]
    error: bool,
    reason: Option<String>,
}

// ipapi sometimes sends "" instead of omitting a field
fn present(field: Option<String>) -> Option<String> { field.filter(|f| !f.trim().is_empty()) }

impl From<LookupResponse> for Location {
    fn from(value: LookupResponse) -> Self {
        Self {
            country: present(value.country_name).unwrap_or_else(|| UNKNOWN.to_string()),
            country_code: present(value.country_code),
            city: present(value.city).unwrap_or_else(|| UNKNOWN.to_string()),
            timezone: present(value.timezone).unwrap_or_else(|| "UTC".to_string()),
        }
    }
}

/// Reverse geolocation of client addresses via `GET {base_url}/{ip}/json/`.
///
/// One `Client` is kept for the lifetime of the app, so connections to the
/// lookup service are pooled.
#[derive(Debug)]
pub struct GeoClient {
    http_client: Client,
    base_url: String,
    timeout: Duration,
}

impl GeoClient {
    pub fn new(
        base_url: String,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client: Client::new(),
            base_url,
            timeout,
        }
    }

    /// Any failure (bad address, transport, timeout, non-2xx, malformed body,
    /// an `"error": true` payload) is an `Err`; callers that only want
    /// best-effort data should fall back to `Location::unknown`.
    #[tracing::instrument(name = "Looking up client location", skip(self))]
    pub async fn lookup(
        &self,
        ip: &str,
    ) -> Result<Location, GeoError> {
        // the address comes straight from a request header; don't let it shape
        // the url
        let ip: IpAddr = ip
            .parse()
            .map_err(|_| GeoError::InvalidAddress(ip.to_string()))?;

        let resp: LookupResponse = self
            .http_client
            .get(format!("{}/{ip}/json/", self.base_url))
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.error {
            return Err(GeoError::Refused(
                resp.reason.unwrap_or_else(|| "no reason given".to_string()),
            ));
        }
        Ok(resp.into())
    }
}
