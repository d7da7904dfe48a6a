use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};

use crate::{error::LocationError, model::Coordinates};

/// Platform service supplying the user's position, consumed once per
/// resolution attempt.
#[async_trait]
pub trait LocationResolver: Send + Sync + Debug {
    async fn resolve(&self) -> Result<Coordinates, LocationError>;
}

const IP_API_URL: &str = "http://ip-api.com/json";
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Best-effort geolocation from the machine's public IP address.
#[derive(Debug, Clone)]
pub struct IpLocationResolver {
    endpoint: String,
    http: Client,
}

impl IpLocationResolver {
    pub fn new() -> Self {
        Self::with_endpoint(IP_API_URL.to_string())
    }

    pub fn with_endpoint(endpoint: String) -> Self {
        Self {
            endpoint,
            http: Client::new(),
        }
    }
}

impl Default for IpLocationResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
    #[serde(default)]
    message: Option<String>,
}

#[async_trait]
impl LocationResolver for IpLocationResolver {
    async fn resolve(&self) -> Result<Coordinates, LocationError> {
        let res = self
            .http
            .get(&self.endpoint)
            .timeout(RESOLVE_TIMEOUT)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LocationError::Timeout
                } else {
                    LocationError::Unavailable
                }
            })?;

        if !res.status().is_success() {
            return Err(LocationError::Unavailable);
        }

        let parsed: IpApiResponse = res
            .json()
            .await
            .map_err(|err| LocationError::Other(err.to_string()))?;

        if parsed.status != "success" {
            let message = parsed
                .message
                .unwrap_or_else(|| "geolocation lookup failed".to_string());
            return Err(LocationError::Other(message));
        }

        Ok(Coordinates {
            latitude: parsed.lat,
            longitude: parsed.lon,
        })
    }
}
