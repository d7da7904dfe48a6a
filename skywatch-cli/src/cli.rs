use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Select, Text};
use tracing::{debug, warn};

use skywatch_core::{
    Config, IpLocationResolver, LocationResolver, OpenWeatherGateway, Unit, WeatherBundle,
    WeatherGateway, WeatherStore,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skywatch", version, about = "Weather lookup client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the API credential and defaults interactively.
    Configure,

    /// Show current conditions and the forecast once.
    Show {
        /// City name; when omitted, your location is resolved instead.
        city: Option<String>,

        /// Unit system, "metric" or "imperial"; defaults to the configured one.
        #[arg(long)]
        units: Option<String>,
    },

    /// Keep watching the weather, re-fetching periodically.
    Watch {
        /// City name; when omitted, your location is resolved instead.
        city: Option<String>,

        /// Refresh period in seconds; defaults to the configured one.
        #[arg(long)]
        interval: Option<u64>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, units } => show(city, units).await,
            Command::Watch { city, interval } => watch(city, interval).await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load_file()?;

    let api_key = Text::new("OpenWeather API key:")
        .with_initial_value(config.api_key.as_deref().unwrap_or(""))
        .prompt()
        .context("Failed to read API key")?;

    let default_city = Text::new("Default city:")
        .with_initial_value(&config.default_city)
        .prompt()
        .context("Failed to read default city")?;

    let units = Select::new("Unit system:", vec!["metric", "imperial"])
        .prompt()
        .context("Failed to read unit system")?;

    config.api_key = Some(api_key);
    config.default_city = default_city;
    config.units = Unit::try_from(units)?;
    config.save()?;

    println!(
        "Saved configuration to {}",
        Config::config_file_path()?.display()
    );

    Ok(())
}

/// A blank or whitespace-only city argument counts as absent.
fn normalize_city(city: Option<String>) -> Option<String> {
    city.map(|city| city.trim().to_string())
        .filter(|city| !city.is_empty())
}

async fn show(city: Option<String>, units: Option<String>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let unit = match units {
        Some(units) => Unit::try_from(units.as_str())?,
        None => config.units,
    };
    let gateway = OpenWeatherGateway::new(&config)?;

    let bundle = match normalize_city(city) {
        Some(city) => gateway.fetch_by_city(&city, unit).await?,
        None => fetch_for_location(&gateway, &config, unit).await?,
    };

    print!("{}", render::format_bundle(&bundle, unit));

    Ok(())
}

/// Resolve the location and fetch for it, falling back to the configured
/// default city when resolution or the coordinate fetch fails.
async fn fetch_for_location(
    gateway: &OpenWeatherGateway,
    config: &Config,
    unit: Unit,
) -> anyhow::Result<WeatherBundle> {
    let resolver = IpLocationResolver::new();

    match resolver.resolve().await {
        Ok(coords) => match gateway.fetch_by_coords(coords, unit).await {
            Ok(bundle) => Ok(bundle),
            Err(err) => {
                warn!(error = %err, "location weather fetch failed, trying default city");
                gateway
                    .fetch_by_city(&config.default_city, unit)
                    .await
                    .context("Failed to fetch location weather")
            }
        },
        Err(err) => {
            debug!(error = %err, "geolocation unavailable, using default city");
            Ok(gateway.fetch_by_city(&config.default_city, unit).await?)
        }
    }
}

async fn watch(city: Option<String>, interval: Option<u64>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let gateway: Arc<dyn WeatherGateway> = Arc::new(OpenWeatherGateway::new(&config)?);
    let resolver: Arc<dyn LocationResolver> = Arc::new(IpLocationResolver::new());
    let store = Arc::new(WeatherStore::new(gateway, resolver, &config));

    let period = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.refresh_interval());

    let mut updates = store.subscribe();
    let _auto_refresh = store.spawn_auto_refresh(period);

    match normalize_city(city) {
        Some(city) => store.search_city(&city).await,
        None => store.locate().await,
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                print!("{}", render::format_state(&state));
            }
        }
    }

    Ok(())
}
