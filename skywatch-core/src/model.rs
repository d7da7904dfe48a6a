use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Measurement unit system, sent verbatim as the API's `units` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Metric,
    Imperial,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Metric => "metric",
            Unit::Imperial => "imperial",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Unit::Metric => Unit::Imperial,
            Unit::Imperial => Unit::Metric,
        }
    }

    /// Display suffix for temperatures in this unit system.
    pub fn temperature_suffix(self) -> &'static str {
        match self {
            Unit::Metric => "°C",
            Unit::Imperial => "°F",
        }
    }

    /// Display suffix for wind speeds in this unit system.
    pub fn wind_suffix(self) -> &'static str {
        match self {
            Unit::Metric => "m/s",
            Unit::Imperial => "mph",
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Unit {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "metric" => Ok(Unit::Metric),
            "imperial" => Ok(Unit::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown unit system '{value}'. Supported: metric, imperial."
            )),
        }
    }
}

/// Geographic position from the location resolver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Current conditions for one location at one instant.
///
/// Immutable once fetched; the store replaces it wholesale on the next
/// successful fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location_name: String,
    pub observed_at: DateTime<Utc>,
    pub temperature: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub humidity_pct: u8,
    pub cloud_cover_pct: u8,
    pub wind_speed: f64,
    pub condition: String,
}

/// One future time slot of a forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub humidity_pct: u8,
    pub cloud_cover_pct: u8,
    pub wind_speed: f64,
    pub condition: String,
}

/// Time-ordered forecast entries, replaced wholesale alongside the
/// current-conditions snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSnapshot {
    pub location_name: String,
    pub entries: Vec<ForecastEntry>,
}

/// What one successful gateway fetch produces.
#[derive(Debug, Clone)]
pub struct WeatherBundle {
    pub weather: WeatherSnapshot,
    pub forecast: ForecastSnapshot,
}

/// The single authoritative view model published by the store.
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    pub weather: Option<WeatherSnapshot>,
    pub forecast: Option<ForecastSnapshot>,
    pub loading: bool,
    pub error: Option<String>,
    pub unit: Unit,
    /// Location name of the most recent successful fetch; what refresh and
    /// auto-refresh re-query.
    pub city: Option<String>,
}
