//! Plain-text rendering of weather state snapshots.

use std::fmt::Write;

use chrono::Local;
use skywatch_core::{ClientState, ForecastSnapshot, Unit, WeatherBundle, WeatherSnapshot};

/// How many forecast time slots to show.
const FORECAST_SLOTS: usize = 5;

pub fn format_state(state: &ClientState) -> String {
    let mut out = String::new();

    if state.loading {
        out.push_str("Fetching weather data...\n");
    }
    if let Some(error) = &state.error {
        let _ = writeln!(out, "! {error}");
    }
    if let Some(weather) = &state.weather {
        out.push_str(&format_weather(weather, state.unit));
    }
    if let Some(forecast) = &state.forecast {
        out.push_str(&format_forecast(forecast, state.unit));
    }

    out
}

pub fn format_bundle(bundle: &WeatherBundle, unit: Unit) -> String {
    let mut out = format_weather(&bundle.weather, unit);
    out.push_str(&format_forecast(&bundle.forecast, unit));
    out
}

fn format_weather(weather: &WeatherSnapshot, unit: Unit) -> String {
    let temp = unit.temperature_suffix();
    let local = weather.observed_at.with_timezone(&Local);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "\n{}  {}",
        weather.location_name,
        local.format("%a, %e %b %y %H:%M")
    );
    let _ = writeln!(
        out,
        "  {:.0}{temp}  {}",
        weather.temperature, weather.condition
    );
    let _ = writeln!(
        out,
        "  min {:.0}{temp} / max {:.0}{temp}",
        weather.temperature_min, weather.temperature_max
    );
    let _ = writeln!(
        out,
        "  humidity {}%  clouds {}%  wind {:.1} {}",
        weather.humidity_pct,
        weather.cloud_cover_pct,
        weather.wind_speed,
        unit.wind_suffix()
    );

    out
}

fn format_forecast(forecast: &ForecastSnapshot, unit: Unit) -> String {
    let temp = unit.temperature_suffix();
    let mut out = String::new();

    let _ = writeln!(out, "\nForecast for {}:", forecast.location_name);
    for entry in forecast.entries.iter().take(FORECAST_SLOTS) {
        let local = entry.time.with_timezone(&Local);
        let _ = writeln!(
            out,
            "  {}  {:>5.0}{temp}  {}",
            local.format("%a %H:%M"),
            entry.temperature,
            entry.condition
        );
    }

    out
}
