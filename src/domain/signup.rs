use std::net::IpAddr;
use std::net::SocketAddr;

use actix_web::http::header::HeaderMap;
use actix_web::http::header::USER_AGENT;
use serde::Deserialize;

/// Placeholder for anything the caller didn't tell us
pub const UNKNOWN: &str = "Unknown";

/// `POST /api/send-notify` body. The email is taken verbatim; there is no
/// format validation.
#[derive(Deserialize, Debug)]
pub struct SignupForm {
    pub email: String,
}

/// Everything known about a single signup, before any lookups
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    /// First hop of `x-forwarded-for`, or `UNKNOWN`
    pub client_addr: String,
    pub user_agent: String,
}

impl SignupRequest {
    pub fn new(
        email: String,
        headers: &HeaderMap,
    ) -> Self {
        Self {
            email,
            client_addr: client_addr(headers).unwrap_or_else(|| UNKNOWN.to_string()),
            user_agent: header_str(headers, USER_AGENT.as_str())
                .unwrap_or(UNKNOWN)
                .to_string(),
        }
    }

    pub fn has_client_addr(&self) -> bool { self.client_addr != UNKNOWN }
}

fn header_str<'a>(
    headers: &'a HeaderMap,
    name: &str,
) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

// `x-forwarded-for: client, proxy1, proxy2`; only the client is of interest
fn client_addr(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")?
        .split(',')
        .map(str::trim)
        .find(|hop| !hop.is_empty())
        .map(without_port)
}

// some proxies forward `203.0.113.7:41234` or `[2001:db8::1]:41234`. Anything
// that isn't an address is kept as-is, and never looked up.
fn without_port(hop: &str) -> String {
    if let Ok(addr) = hop.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }
    match hop
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
    {
        Ok(ip) => ip.to_string(),
        Err(_) => hop.to_string(),
    }
}
