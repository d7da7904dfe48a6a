//! Core library for the `skywatch` weather client.
//!
//! This crate defines:
//! - Configuration handling (config file + environment overrides)
//! - The weather gateway abstraction and its OpenWeather implementation
//! - Location resolution with a typed failure mode
//! - The weather state store that reconciles overlapping fetches
//!
//! It is used by `skywatch-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod gateway;
pub mod location;
pub mod model;
pub mod store;

pub use config::Config;
pub use error::{Error, LocationError, Result};
pub use gateway::{WeatherGateway, openweather::OpenWeatherGateway};
pub use location::{IpLocationResolver, LocationResolver};
pub use model::{ClientState, Coordinates, ForecastSnapshot, Unit, WeatherBundle, WeatherSnapshot};
pub use store::{AutoRefreshHandle, WeatherStore};
