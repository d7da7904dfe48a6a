use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    config::Config,
    error::{Error, Result},
    model::{Coordinates, ForecastEntry, ForecastSnapshot, Unit, WeatherBundle, WeatherSnapshot},
};

use super::WeatherGateway;

/// Gateway against the OpenWeather-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct OpenWeatherGateway {
    api_key: String,
    base_url: String,
    http: Client,
}

enum Target<'a> {
    City(&'a str),
    Coords(Coordinates),
}

impl Target<'_> {
    fn query(&self, api_key: &str, unit: Unit) -> Vec<(&'static str, String)> {
        let mut params = match self {
            Target::City(city) => vec![("q", (*city).to_string())],
            Target::Coords(coords) => vec![
                ("lat", coords.latitude.to_string()),
                ("lon", coords.longitude.to_string()),
            ],
        };
        params.push(("appid", api_key.to_string()));
        params.push(("units", unit.as_str().to_string()));
        params
    }

    /// What to blame in a `NotFound` error.
    fn describe(&self) -> String {
        match self {
            Target::City(city) => (*city).to_string(),
            Target::Coords(coords) => format!("{}, {}", coords.latitude, coords.longitude),
        }
    }
}

impl OpenWeatherGateway {
    /// Build a gateway from explicit configuration.
    ///
    /// Fails fast with [`Error::MissingApiKey`] so that no fetch is ever
    /// attempted without a credential.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.api_key().ok_or(Error::MissingApiKey)?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        })
    }

    async fn get_body(&self, endpoint: &str, target: &Target<'_>, unit: Unit) -> Result<String> {
        let url = format!("{}/{endpoint}", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&target.query(&self.api_key, unit))
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                city: target.describe(),
            });
        }
        if !status.is_success() {
            return Err(Error::RequestFailed {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }

    async fn fetch_current(&self, target: &Target<'_>, unit: Unit) -> Result<WeatherSnapshot> {
        let body = self.get_body("weather", target, unit).await?;
        let parsed: OwCurrentResponse = serde_json::from_str(&body)?;

        let observed_at = unix_to_utc(parsed.dt).unwrap_or_else(Utc::now);

        Ok(WeatherSnapshot {
            location_name: parsed.name,
            observed_at,
            temperature: parsed.main.temp,
            temperature_min: parsed.main.temp_min,
            temperature_max: parsed.main.temp_max,
            humidity_pct: parsed.main.humidity,
            cloud_cover_pct: parsed.clouds.all,
            wind_speed: parsed.wind.speed,
            condition: condition_of(&parsed.weather),
        })
    }

    async fn fetch_forecast(&self, target: &Target<'_>, unit: Unit) -> Result<ForecastSnapshot> {
        let body = self.get_body("forecast", target, unit).await?;
        let parsed: OwForecastResponse = serde_json::from_str(&body)?;

        let entries = parsed
            .list
            .into_iter()
            .map(|entry| ForecastEntry {
                time: unix_to_utc(entry.dt).unwrap_or_else(Utc::now),
                temperature: entry.main.temp,
                temperature_min: entry.main.temp_min,
                temperature_max: entry.main.temp_max,
                humidity_pct: entry.main.humidity,
                cloud_cover_pct: entry.clouds.all,
                wind_speed: entry.wind.speed,
                condition: condition_of(&entry.weather),
            })
            .collect();

        let location_name = format!("{}, {}", parsed.city.name, parsed.city.country);

        Ok(ForecastSnapshot {
            location_name,
            entries,
        })
    }

    async fn fetch(&self, target: Target<'_>, unit: Unit) -> Result<WeatherBundle> {
        // Current conditions first; its failure (unknown city, bad key)
        // aborts the whole fetch before the forecast call goes out.
        let weather = self.fetch_current(&target, unit).await?;
        let forecast = self.fetch_forecast(&target, unit).await?;

        Ok(WeatherBundle { weather, forecast })
    }
}

#[async_trait]
impl WeatherGateway for OpenWeatherGateway {
    async fn fetch_by_city(&self, city: &str, unit: Unit) -> Result<WeatherBundle> {
        self.fetch(Target::City(city), unit).await
    }

    async fn fetch_by_coords(&self, coords: Coordinates, unit: Unit) -> Result<WeatherBundle> {
        self.fetch(Target::Coords(coords), unit).await
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    temp_min: f64,
    #[serde(default)]
    temp_max: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize, Default)]
struct OwClouds {
    all: u8,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    clouds: OwClouds,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    name: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    clouds: OwClouds,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

fn condition_of(weather: &[OwWeather]) -> String {
    weather
        .first()
        .map(|w| w.description.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let cut: String = body.chars().take(MAX).collect();
        format!("{cut}...")
    } else {
        body.to_string()
    }
}
