use crate::{
    error::Result,
    model::{Coordinates, Unit, WeatherBundle},
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Abstraction over the external weather API.
///
/// One fetch is two read-only HTTP calls (current conditions + forecast);
/// implementations perform no retries and no caching.
#[async_trait]
pub trait WeatherGateway: Send + Sync + Debug {
    async fn fetch_by_city(&self, city: &str, unit: Unit) -> Result<WeatherBundle>;

    async fn fetch_by_coords(&self, coords: Coordinates, unit: Unit) -> Result<WeatherBundle>;
}
