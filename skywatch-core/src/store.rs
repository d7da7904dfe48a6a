use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    config::Config,
    error::Error,
    gateway::WeatherGateway,
    location::LocationResolver,
    model::{ClientState, Unit, WeatherBundle},
};

const LOCATION_FETCH_ERROR: &str = "Failed to fetch location weather";

/// Shortest accepted auto-refresh period; `tokio::time::interval` rejects
/// a zero period.
const MIN_REFRESH_PERIOD: Duration = Duration::from_secs(1);

/// Single authoritative in-memory state machine for the weather view.
///
/// Each fetch cycle runs Idle → Loading → Success | Failed, and a new cycle
/// may begin while a previous result is still on display. Overlapping
/// fetches are resolved with a monotonic sequence number: only the result of
/// the most recently issued fetch is applied, so "last action wins" is
/// deterministic rather than a network-timing race. In-flight HTTP requests
/// are never cancelled.
#[derive(Debug)]
pub struct WeatherStore {
    gateway: Arc<dyn WeatherGateway>,
    resolver: Arc<dyn LocationResolver>,
    default_city: String,
    state: watch::Sender<ClientState>,
    seq: AtomicU64,
}

impl WeatherStore {
    pub fn new(
        gateway: Arc<dyn WeatherGateway>,
        resolver: Arc<dyn LocationResolver>,
        config: &Config,
    ) -> Self {
        let initial = ClientState {
            unit: config.units,
            ..ClientState::default()
        };
        let (state, _) = watch::channel(initial);

        Self {
            gateway,
            resolver,
            default_city: config.default_city.clone(),
            state,
            seq: AtomicU64::new(0),
        }
    }

    /// Clone of the current view model.
    pub fn snapshot(&self) -> ClientState {
        self.state.borrow().clone()
    }

    /// Receiver notified after every state change, for re-rendering.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Search for a city by name. Empty or whitespace-only input is a
    /// no-op: no state transition, no network call.
    pub async fn search_city(&self, name: &str) {
        let city = name.trim();
        if city.is_empty() {
            return;
        }

        let unit = self.state.borrow().unit;
        self.fetch_city(city, unit).await;
    }

    /// Re-fetch the last known city at the current unit; resolve location
    /// instead if no city is known yet.
    pub async fn refresh(&self) {
        let (city, unit) = {
            let state = self.state.borrow();
            (state.city.clone(), state.unit)
        };

        match city {
            Some(city) => self.fetch_city(&city, unit).await,
            None => self.locate().await,
        }
    }

    /// Flip metric/imperial and immediately re-fetch at the new unit.
    pub async fn toggle_unit(&self) {
        let mut unit = Unit::default();
        self.state.send_modify(|state| {
            state.unit = state.unit.toggled();
            unit = state.unit;
        });

        let city = self.state.borrow().city.clone();
        match city {
            Some(city) => self.fetch_city(&city, unit).await,
            None => self.locate().await,
        }
    }

    /// Resolve the user's location and fetch weather for it.
    ///
    /// One resolution attempt per call. On resolver failure, or on a
    /// gateway failure after a successful resolution, falls back to the
    /// configured default city; that fallback is itself best-effort.
    pub async fn locate(&self) {
        let unit = self.state.borrow().unit;

        match self.resolver.resolve().await {
            Ok(coords) => {
                let seq = self.begin();
                match self.gateway.fetch_by_coords(coords, unit).await {
                    Ok(bundle) => {
                        self.settle(seq, Ok(bundle));
                    }
                    Err(err) => {
                        warn!(error = %err, "location weather fetch failed, trying default city");
                        if self.is_latest(seq) {
                            self.state.send_modify(|state| {
                                state.loading = false;
                                state.error = Some(LOCATION_FETCH_ERROR.to_string());
                            });
                        }
                        self.fetch_city(&self.default_city, unit).await;
                    }
                }
            }
            Err(err) => {
                debug!(error = %err, "geolocation unavailable, using default city");
                self.fetch_city(&self.default_city, unit).await;
            }
        }
    }

    /// Spawn the auto-refresh timer. The returned handle aborts the task
    /// when dropped, so no timer outlives its widget.
    ///
    /// Periods shorter than one second are clamped to one second.
    pub fn spawn_auto_refresh(self: &Arc<Self>, period: Duration) -> AutoRefreshHandle {
        let period = period.max(MIN_REFRESH_PERIOD);
        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The interval fires once immediately; the initial fetch is
            // `locate`'s job, so skip that tick.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.refresh().await;
            }
        });

        AutoRefreshHandle { handle }
    }

    async fn fetch_city(&self, city: &str, unit: Unit) {
        let seq = self.begin();
        let outcome = self.gateway.fetch_by_city(city, unit).await;
        self.settle(seq, outcome);
    }

    /// Mark a new fetch cycle as issued and return its sequence number.
    fn begin(&self) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
        seq
    }

    fn is_latest(&self, seq: u64) -> bool {
        seq == self.seq.load(Ordering::SeqCst)
    }

    /// Apply a completed fetch, unless a newer one has been issued since.
    fn settle(&self, seq: u64, outcome: Result<WeatherBundle, Error>) {
        if !self.is_latest(seq) {
            debug!(seq, "discarding result of superseded fetch");
            return;
        }

        match outcome {
            Ok(bundle) => self.state.send_modify(|state| {
                state.city = Some(bundle.weather.location_name.clone());
                state.weather = Some(bundle.weather);
                state.forecast = Some(bundle.forecast);
                state.error = None;
                state.loading = false;
            }),
            Err(err) => {
                warn!(error = %err, "weather fetch failed");
                // Failed fetches keep the previous weather/forecast on
                // display next to the error message.
                self.state.send_modify(|state| {
                    state.error = Some(err.to_string());
                    state.loading = false;
                });
            }
        }
    }
}

/// Guard for the auto-refresh task; aborts it on drop.
#[derive(Debug)]
pub struct AutoRefreshHandle {
    handle: JoinHandle<()>,
}

impl Drop for AutoRefreshHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LocationError, Result};
    use crate::model::{Coordinates, ForecastEntry, ForecastSnapshot, WeatherSnapshot};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    fn bundle(name: &str, temp: f64) -> WeatherBundle {
        let now = Utc::now();
        WeatherBundle {
            weather: WeatherSnapshot {
                location_name: name.to_string(),
                observed_at: now,
                temperature: temp,
                temperature_min: temp - 2.0,
                temperature_max: temp + 2.0,
                humidity_pct: 55,
                cloud_cover_pct: 20,
                wind_speed: 3.0,
                condition: "clear sky".to_string(),
            },
            forecast: ForecastSnapshot {
                location_name: name.to_string(),
                entries: vec![ForecastEntry {
                    time: now + chrono::Duration::hours(3),
                    temperature: temp - 1.0,
                    temperature_min: temp - 3.0,
                    temperature_max: temp + 1.0,
                    humidity_pct: 60,
                    cloud_cover_pct: 30,
                    wind_speed: 2.5,
                    condition: "few clouds".to_string(),
                }],
            },
        }
    }

    #[derive(Debug, Default)]
    struct MockGateway {
        city_calls: Mutex<Vec<(String, Unit)>>,
        coord_calls: Mutex<Vec<(Coordinates, Unit)>>,
        fail_city: AtomicBool,
        fail_coords: AtomicBool,
        city_delays: Mutex<HashMap<String, Duration>>,
    }

    impl MockGateway {
        fn city_calls(&self) -> Vec<(String, Unit)> {
            self.city_calls.lock().unwrap().clone()
        }

        fn coord_call_count(&self) -> usize {
            self.coord_calls.lock().unwrap().len()
        }

        fn delay_city(&self, city: &str, delay: Duration) {
            self.city_delays
                .lock()
                .unwrap()
                .insert(city.to_string(), delay);
        }
    }

    #[async_trait]
    impl WeatherGateway for MockGateway {
        async fn fetch_by_city(&self, city: &str, unit: Unit) -> Result<WeatherBundle> {
            self.city_calls
                .lock()
                .unwrap()
                .push((city.to_string(), unit));

            let delay = self.city_delays.lock().unwrap().get(city).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if self.fail_city.load(Ordering::SeqCst) {
                return Err(Error::NotFound {
                    city: city.to_string(),
                });
            }
            Ok(bundle(city, 30.0))
        }

        async fn fetch_by_coords(&self, coords: Coordinates, unit: Unit) -> Result<WeatherBundle> {
            self.coord_calls.lock().unwrap().push((coords, unit));

            if self.fail_coords.load(Ordering::SeqCst) {
                return Err(Error::RequestFailed {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(bundle("Located City", 21.0))
        }
    }

    #[derive(Debug)]
    struct MockResolver {
        calls: AtomicUsize,
        outcome: Option<Coordinates>,
    }

    impl MockResolver {
        fn granting(coords: Coordinates) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome: Some(coords),
            }
        }

        fn denying() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome: None,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LocationResolver for MockResolver {
        async fn resolve(&self) -> Result<Coordinates, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.ok_or(LocationError::Denied)
        }
    }

    fn store_with(
        gateway: &Arc<MockGateway>,
        resolver: &Arc<MockResolver>,
    ) -> Arc<WeatherStore> {
        let config = Config::default();
        Arc::new(WeatherStore::new(
            Arc::clone(gateway) as Arc<dyn WeatherGateway>,
            Arc::clone(resolver) as Arc<dyn LocationResolver>,
            &config,
        ))
    }

    #[tokio::test]
    async fn search_success_replaces_weather_and_forecast() {
        let gateway = Arc::new(MockGateway::default());
        let resolver = Arc::new(MockResolver::denying());
        let store = store_with(&gateway, &resolver);

        store.search_city("Delhi").await;

        let state = store.snapshot();
        let weather = state.weather.expect("weather should be set");
        assert_eq!(weather.location_name, "Delhi");
        assert_eq!(weather.temperature, 30.0);
        assert!(state.forecast.is_some());
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert_eq!(state.city.as_deref(), Some("Delhi"));
    }

    #[tokio::test]
    async fn search_failure_sets_error_and_keeps_previous_data() {
        let gateway = Arc::new(MockGateway::default());
        let resolver = Arc::new(MockResolver::denying());
        let store = store_with(&gateway, &resolver);

        store.search_city("Delhi").await;
        gateway.fail_city.store(true, Ordering::SeqCst);
        store.search_city("Atlantis").await;

        let state = store.snapshot();
        assert!(!state.loading);
        let error = state.error.expect("error should be set");
        assert!(error.contains("Atlantis"));
        // Previous display survives the failed fetch.
        assert_eq!(
            state.weather.expect("previous weather kept").location_name,
            "Delhi"
        );
        assert!(state.forecast.is_some());
    }

    #[tokio::test]
    async fn blank_search_is_a_no_op() {
        let gateway = Arc::new(MockGateway::default());
        let resolver = Arc::new(MockResolver::denying());
        let store = store_with(&gateway, &resolver);

        store.search_city("").await;
        store.search_city("   \t ").await;

        let state = store.snapshot();
        assert!(state.weather.is_none());
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert!(gateway.city_calls().is_empty());
    }

    #[tokio::test]
    async fn toggle_unit_flips_and_refetches_exactly_once() {
        let gateway = Arc::new(MockGateway::default());
        let resolver = Arc::new(MockResolver::denying());
        let store = store_with(&gateway, &resolver);

        store.search_city("Delhi").await;
        store.toggle_unit().await;

        let state = store.snapshot();
        assert_eq!(state.unit, Unit::Imperial);

        let calls = gateway.city_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], ("Delhi".to_string(), Unit::Imperial));

        store.toggle_unit().await;
        assert_eq!(store.snapshot().unit, Unit::Metric);
        assert_eq!(gateway.city_calls().len(), 3);
    }

    #[tokio::test]
    async fn denied_geolocation_falls_back_to_default_city_once() {
        let gateway = Arc::new(MockGateway::default());
        let resolver = Arc::new(MockResolver::denying());
        let store = store_with(&gateway, &resolver);

        store.locate().await;

        assert_eq!(resolver.call_count(), 1);
        assert_eq!(gateway.coord_call_count(), 0);
        assert_eq!(
            gateway.city_calls(),
            vec![("Delhi".to_string(), Unit::Metric)]
        );
        assert_eq!(
            store.snapshot().weather.expect("fallback weather").location_name,
            "Delhi"
        );
    }

    #[tokio::test]
    async fn coords_fetch_failure_still_falls_back_to_default_city() {
        let gateway = Arc::new(MockGateway::default());
        gateway.fail_coords.store(true, Ordering::SeqCst);
        let resolver = Arc::new(MockResolver::granting(Coordinates {
            latitude: 28.61,
            longitude: 77.21,
        }));
        let store = store_with(&gateway, &resolver);

        store.locate().await;

        assert_eq!(resolver.call_count(), 1);
        assert_eq!(gateway.coord_call_count(), 1);
        assert_eq!(gateway.city_calls().len(), 1);

        // The fallback fetch succeeded, so the transient location error is gone.
        let state = store.snapshot();
        assert!(state.error.is_none());
        assert_eq!(state.weather.expect("fallback weather").location_name, "Delhi");
    }

    #[tokio::test]
    async fn granted_geolocation_fetches_by_coords() {
        let gateway = Arc::new(MockGateway::default());
        let resolver = Arc::new(MockResolver::granting(Coordinates {
            latitude: 50.45,
            longitude: 30.52,
        }));
        let store = store_with(&gateway, &resolver);

        store.locate().await;

        assert_eq!(gateway.coord_call_count(), 1);
        assert!(gateway.city_calls().is_empty());
        let state = store.snapshot();
        assert_eq!(
            state.weather.expect("weather").location_name,
            "Located City"
        );
        assert_eq!(state.city.as_deref(), Some("Located City"));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn stale_response_is_discarded_in_favor_of_latest_fetch() {
        let gateway = Arc::new(MockGateway::default());
        let resolver = Arc::new(MockResolver::denying());
        let store = store_with(&gateway, &resolver);

        gateway.delay_city("Slowtown", Duration::from_secs(5));

        let slow_store = Arc::clone(&store);
        let slow = tokio::spawn(async move { slow_store.search_city("Slowtown").await });
        tokio::task::yield_now().await;

        // The slow fetch is in flight.
        assert!(store.snapshot().loading);

        store.search_city("Fastville").await;
        assert_eq!(
            store.snapshot().weather.as_ref().map(|w| w.location_name.clone()),
            Some("Fastville".to_string())
        );

        tokio::time::advance(Duration::from_secs(6)).await;
        slow.await.expect("slow fetch task");

        // The older fetch finished last but lost the sequence race.
        let state = store.snapshot();
        assert_eq!(state.weather.expect("weather").location_name, "Fastville");
        assert_eq!(state.city.as_deref(), Some("Fastville"));
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn auto_refresh_refetches_current_city_until_dropped() {
        let gateway = Arc::new(MockGateway::default());
        let resolver = Arc::new(MockResolver::denying());
        let store = store_with(&gateway, &resolver);

        store.search_city("Delhi").await;
        store.toggle_unit().await;
        assert_eq!(gateway.city_calls().len(), 2);

        let guard = store.spawn_auto_refresh(Duration::from_millis(300_000));

        tokio::time::sleep(Duration::from_millis(300_010)).await;
        let calls = gateway.city_calls();
        assert_eq!(calls.len(), 3);
        // Re-fetch uses the current city at the currently selected unit.
        assert_eq!(calls[2], ("Delhi".to_string(), Unit::Imperial));

        tokio::time::sleep(Duration::from_millis(300_000)).await;
        assert_eq!(gateway.city_calls().len(), 4);

        drop(guard);
        tokio::time::sleep(Duration::from_millis(900_000)).await;
        assert_eq!(gateway.city_calls().len(), 4);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn zero_refresh_period_is_clamped_and_keeps_refreshing() {
        let gateway = Arc::new(MockGateway::default());
        let resolver = Arc::new(MockResolver::denying());
        let store = store_with(&gateway, &resolver);

        store.search_city("Delhi").await;
        let _guard = store.spawn_auto_refresh(Duration::ZERO);

        // Clamped to the one-second floor instead of killing the task.
        tokio::time::sleep(Duration::from_millis(1_010)).await;
        let calls = gateway.city_calls();
        assert!(calls.len() >= 2, "auto-refresh task should stay alive");
        assert_eq!(
            calls.last().expect("at least one call"),
            &("Delhi".to_string(), Unit::Metric)
        );
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn auto_refresh_locates_when_no_city_known_yet() {
        let gateway = Arc::new(MockGateway::default());
        let resolver = Arc::new(MockResolver::denying());
        let store = store_with(&gateway, &resolver);

        let _guard = store.spawn_auto_refresh(Duration::from_secs(300));
        tokio::time::sleep(Duration::from_secs(301)).await;

        assert_eq!(resolver.call_count(), 1);
        assert_eq!(
            gateway.city_calls(),
            vec![("Delhi".to_string(), Unit::Metric)]
        );
    }
}
