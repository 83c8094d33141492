//! Producer/consumer orchestration.
//!
//! The producer task polls, filters, merges, enriches and publishes a new
//! snapshot every poll interval. The consumer runs on the caller's task at a
//! fixed tick and drives the renderer from the latest snapshot. Both watch
//! one shutdown flag; the producer is joined with a bounded wait so a stuck
//! network call cannot hold up exit.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::{Instant, MissedTickBehavior};

use flight_core::config::DisplayConfig;
use flight_core::{
    carry_forward, AircraftInfo, BoundingBox, Config, FlightFilter, LatLon, Route, Snapshot,
    SnapshotStore,
};

use crate::adsbdb::AdsbdbRoutes;
use crate::display::{sign_off, Carousel, Renderer, STATUS_SHUTTING_DOWN};
use crate::enrichment::EnrichmentScheduler;
use crate::http::HttpClient;
use crate::lookup::{CachedLookup, LookupSource};
use crate::opensky::{OpenSkyMetadata, StateFetcher};

/// Granularity at which sleeping loops notice a shutdown request.
pub const SLEEP_SLICE: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Shutdown flag
// ---------------------------------------------------------------------------

/// Cooperative cancellation shared by every loop. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        ShutdownFlag::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep up to `total` in slices. Returns true if woken by shutdown.
    pub async fn sleep(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        loop {
            if self.is_requested() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(SLEEP_SLICE.min(deadline - now)).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

pub type LiveProducer = Producer<AdsbdbRoutes, OpenSkyMetadata>;

pub struct Producer<R, M>
where
    R: LookupSource<Value = Route>,
    M: LookupSource<Value = AircraftInfo>,
{
    fetcher: StateFetcher,
    filter: FlightFilter,
    scheduler: EnrichmentScheduler<R, M>,
    store: SnapshotStore,
    bbox: BoundingBox,
    home: LatLon,
    budget: usize,
    poll_interval: Duration,
    sweep_every: u32,
    cycle: u64,
}

impl LiveProducer {
    /// Wire the real upstream sources over `client`.
    pub fn from_config(config: &Config, client: Arc<dyn HttpClient>, store: SnapshotStore) -> Self {
        let fetcher = StateFetcher::new(client.clone(), &config.opensky.base_url);
        let routes = CachedLookup::new(
            AdsbdbRoutes::new(client.clone(), &config.adsbdb.base_url),
            config.cache.route_ttl(),
            config.cache.failed_ttl(),
        );
        let metadata = CachedLookup::new(
            OpenSkyMetadata::new(client, &config.opensky.base_url),
            config.cache.metadata_ttl(),
            config.cache.failed_ttl(),
        );
        Producer::new(
            fetcher,
            EnrichmentScheduler::new(routes, metadata),
            store,
            config,
        )
    }
}

impl<R, M> Producer<R, M>
where
    R: LookupSource<Value = Route>,
    M: LookupSource<Value = AircraftInfo>,
{
    pub fn new(
        fetcher: StateFetcher,
        scheduler: EnrichmentScheduler<R, M>,
        store: SnapshotStore,
        config: &Config,
    ) -> Self {
        Producer {
            fetcher,
            filter: FlightFilter::new(&config.filter),
            scheduler,
            store,
            bbox: config.bounding_box(),
            home: config.home(),
            budget: config.enrichment.budget_per_cycle,
            poll_interval: config.poll_interval(),
            sweep_every: config.cache.sweep_every_cycles,
            cycle: 0,
        }
    }

    pub fn store(&self) -> SnapshotStore {
        self.store.clone()
    }

    /// One full iteration: fetch → filter/sort → carry forward → enrich →
    /// publish. Returns the published snapshot.
    pub async fn run_cycle(&mut self) -> Snapshot {
        self.cycle += 1;

        let raw = self.fetcher.fetch(&self.bbox).await;
        let raw_count = raw.len();
        let filtered = self.filter.process(raw, self.home);

        let previous = self.store.read();
        let mut records = carry_forward(previous.records(), filtered);

        let report = self.scheduler.enrich(&mut records, self.budget).await;

        let snapshot = Snapshot::new(records, self.cycle);
        self.store.publish(snapshot.clone());

        tracing::info!(
            cycle = self.cycle,
            received = raw_count,
            "tracking {} flights",
            snapshot.len()
        );
        tracing::debug!(
            cache_hits = report.cache_hits,
            lookups = report.network_lookups,
            deferred = report.deferred,
            "enrichment pass"
        );

        if self.sweep_every > 0 && self.cycle % u64::from(self.sweep_every) == 0 {
            self.scheduler.sweep();
        }

        snapshot
    }

    /// Loop until shutdown. A panic inside one cycle is logged and the loop
    /// carries on with the next. Returns the number of cycles started.
    pub async fn run(mut self, shutdown: ShutdownFlag) -> u64 {
        tracing::info!(
            poll_secs = self.poll_interval.as_secs_f64(),
            budget = self.budget,
            "producer started"
        );
        while !shutdown.is_requested() {
            if AssertUnwindSafe(self.run_cycle())
                .catch_unwind()
                .await
                .is_err()
            {
                tracing::error!(cycle = self.cycle, "producer cycle panicked; continuing");
            }
            if shutdown.sleep(self.poll_interval).await {
                break;
            }
        }
        tracing::info!(cycles = self.cycle, "producer stopped");
        self.cycle
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Fixed-rate render loop over the shared snapshot.
pub struct Consumer {
    store: SnapshotStore,
    carousel: Carousel,
    tick: Duration,
}

impl Consumer {
    pub fn new(store: SnapshotStore, display: &DisplayConfig) -> Self {
        Consumer {
            store,
            carousel: Carousel::new(display.cycle_interval()),
            tick: display.tick(),
        }
    }

    pub async fn run<D: Renderer + ?Sized>(&mut self, renderer: &mut D, shutdown: &ShutdownFlag) {
        let mut ticker = tokio::time::interval(self.tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if shutdown.is_requested() {
                break;
            }
            // The lock is held only inside read().
            let snapshot = self.store.read();
            self.carousel.show(renderer, &snapshot);
        }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Run producer and consumer until `shutdown` is requested, then stop both
/// and release the renderer.
pub async fn run_tracker<R, M, D>(
    producer: Producer<R, M>,
    renderer: &mut D,
    shutdown: ShutdownFlag,
    display: &DisplayConfig,
) where
    R: LookupSource<Value = Route> + 'static,
    M: LookupSource<Value = AircraftInfo> + 'static,
    D: Renderer + ?Sized,
{
    let mut consumer = Consumer::new(producer.store(), display);
    let handle = tokio::spawn(producer.run(shutdown.clone()));
    let abort = handle.abort_handle();

    consumer.run(renderer, &shutdown).await;
    shutdown.request();
    // Stays up while the producer winds down.
    renderer.show_status(STATUS_SHUTTING_DOWN);

    let grace = display.shutdown_grace();
    tracing::info!("waiting for producer");
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(cycles)) => tracing::debug!(cycles, "producer joined"),
        Ok(Err(e)) => tracing::warn!(error = %e, "producer task failed"),
        Err(_) => {
            tracing::warn!(grace_secs = grace.as_secs_f64(), "producer still busy; abandoning");
            abort.abort();
        }
    }

    sign_off(renderer, display.goodbye_hold()).await;
    tracing::info!("shutdown complete");
}

/// Resolve once SIGINT (or SIGTERM on unix) arrives. If a handler cannot be
/// installed this never resolves for that signal.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c_or_pending() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                ctrl_c_or_pending().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c_or_pending().await;
    }
}

async fn ctrl_c_or_pending() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::display::recording::{Event, RecordingRenderer};
    use crate::display::STATUS_GOODBYE;
    use crate::http::mock::MockHttpClient;
    use crate::http::{FetchError, HttpResponse};
    use crate::lookup::tests::FakeSource;

    // Home at (10, 10): NEAR1 ≈ 5.6 km, MID22 ≈ 33 km, FAR33 ≈ 100 km.
    const STATES: &str = r#"{"time": 1, "states": [
        ["cccccc", "FAR33", "Spain", 0, 0, 10.0, 10.9, 3000.0, false, 200.0, 90.0, 0.0, null, 3000.0, null],
        ["bbbbbb", "MID22", "France", 0, 0, 10.0, 10.3, 3000.0, false, 200.0, 90.0, 0.0, null, 3000.0, null],
        ["aaaaaa", "NEAR1", "Italy", 0, 0, 10.0, 10.05, 3000.0, false, 200.0, 90.0, 0.0, null, 3000.0, null]
    ]}"#;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.location.lat = 10.0;
        config.location.lon = 10.0;
        config.enrichment.budget_per_cycle = 3;
        config.display.tick_ms = 10;
        config.display.shutdown_grace_secs = 1;
        config.display.goodbye_ms = 0;
        config
    }

    fn mock_upstream() -> Arc<MockHttpClient> {
        Arc::new(
            MockHttpClient::new()
                .respond("/states/all", 200, STATES)
                .respond("/callsign/", 200, r#"{"response": "unknown callsign"}"#)
                .respond(
                    "/metadata/aircraft/icao24/",
                    200,
                    r#"{"typecode": "A320", "registration": "F-TEST"}"#,
                ),
        )
    }

    fn count_calls(mock: &MockHttpClient, part: &str) -> usize {
        mock.calls().iter().filter(|u| u.contains(part)).count()
    }

    #[tokio::test]
    async fn test_cycle_publishes_sorted_snapshot() {
        let mock = mock_upstream();
        let store = SnapshotStore::new();
        let mut producer = LiveProducer::from_config(&test_config(), mock.clone(), store.clone());

        producer.run_cycle().await;
        let snap = store.read();
        assert_eq!(snap.cycle(), 1);
        let ids: Vec<&str> = snap.records().iter().map(|r| r.icao24.as_str()).collect();
        assert_eq!(ids, vec!["aaaaaa", "bbbbbb"]);
        assert!(snap.records().iter().all(|r| r.distance_km.is_some()));

        // Budget 3: NEAR1 route + metadata, MID22 route only.
        assert_eq!(snap.records()[0].aircraft_type.as_deref(), Some("A320"));
        assert!(snap.records()[1].aircraft_type.is_none());
        assert_eq!(count_calls(&mock, "/callsign/"), 2);
        assert_eq!(count_calls(&mock, "/metadata/"), 1);
    }

    #[tokio::test]
    async fn test_second_cycle_uses_cache_and_finishes_enrichment() {
        let mock = mock_upstream();
        let store = SnapshotStore::new();
        let mut producer = LiveProducer::from_config(&test_config(), mock.clone(), store.clone());

        producer.run_cycle().await;
        let snap = producer.run_cycle().await;
        assert_eq!(snap.cycle(), 2);
        assert!(snap.records().iter().all(|r| r.aircraft_type.is_some()));
        // Negative route results are served from cache.
        assert_eq!(count_calls(&mock, "/callsign/"), 2);
        assert_eq!(count_calls(&mock, "/metadata/"), 2);
    }

    #[tokio::test]
    async fn test_carry_forward_when_budget_exhausted() {
        let mut config = test_config();
        config.cache.metadata_ttl_secs = 0;
        let mock = mock_upstream();
        let store = SnapshotStore::new();
        let mut producer = LiveProducer::from_config(&config, mock.clone(), store.clone());

        producer.run_cycle().await;
        producer.budget = 0;
        let snap = producer.run_cycle().await;
        assert_eq!(snap.records()[0].aircraft_type.as_deref(), Some("A320"));
        assert_eq!(snap.records()[0].registration.as_deref(), Some("F-TEST"));
        assert_eq!(count_calls(&mock, "/metadata/"), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_publishes_empty() {
        let mock = Arc::new(MockHttpClient::new().respond("/states/all", 503, ""));
        let store = SnapshotStore::new();
        let mut producer = LiveProducer::from_config(&test_config(), mock, store.clone());

        producer.run_cycle().await;
        let snap = store.read();
        assert_eq!(snap.cycle(), 1);
        assert!(snap.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_sleep_is_responsive() {
        let flag = ShutdownFlag::new();
        let setter = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            setter.request();
        });

        let start = std::time::Instant::now();
        assert!(flag.sleep(Duration::from_secs(30)).await);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_sleep_runs_to_completion() {
        let flag = ShutdownFlag::new();
        assert!(!flag.sleep(Duration::from_millis(30)).await);
    }

    #[tokio::test]
    async fn test_producer_stops_on_shutdown() {
        let store = SnapshotStore::new();
        let producer = LiveProducer::from_config(&test_config(), mock_upstream(), store.clone());
        let shutdown = ShutdownFlag::new();
        let handle = tokio::spawn(producer.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.request();
        let cycles = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("producer exits within a sleep slice")
            .unwrap();
        assert_eq!(cycles, 1);
        assert_eq!(store.read().cycle(), 1);
    }

    struct PanickingRoutes;

    #[async_trait]
    impl LookupSource for PanickingRoutes {
        type Value = Route;

        fn kind(&self) -> &'static str {
            "panicking"
        }

        async fn fetch(&self, _key: &str) -> Result<Route, FetchError> {
            panic!("route source exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_cycle_does_not_stop_producer() {
        let config = test_config();
        let mock: Arc<dyn HttpClient> = mock_upstream();
        let hour = Duration::from_secs(3600);
        let scheduler = EnrichmentScheduler::new(
            CachedLookup::new(PanickingRoutes, hour, hour),
            CachedLookup::new(FakeSource::<AircraftInfo>::new(vec![]), hour, hour),
        );
        let mut producer = Producer::new(
            StateFetcher::new(mock, &config.opensky.base_url),
            scheduler,
            SnapshotStore::new(),
            &config,
        );
        producer.poll_interval = Duration::from_millis(20);

        let shutdown = ShutdownFlag::new();
        let handle = tokio::spawn(producer.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.request();

        let cycles = handle.await.expect("panic contained inside the loop");
        assert!(cycles >= 2, "loop kept going after a panic, got {cycles}");
    }

    #[tokio::test]
    async fn test_run_tracker_renders_and_shuts_down() {
        let config = test_config();
        let producer = LiveProducer::from_config(&config, mock_upstream(), SnapshotStore::new());
        let mut renderer = RecordingRenderer::default();
        let shutdown = ShutdownFlag::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.request();
        });

        let start = std::time::Instant::now();
        run_tracker(producer, &mut renderer, shutdown, &config.display).await;
        assert!(start.elapsed() < Duration::from_secs(3));

        let events = renderer.events();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Record { icao24, index: 0, total: 2 } if icao24 == "aaaaaa"
        )));
        let tail = &events[events.len() - 3..];
        assert_eq!(
            tail,
            &[
                Event::Status(STATUS_SHUTTING_DOWN.into()),
                Event::Status(STATUS_GOODBYE.into()),
                Event::Clear,
            ]
        );
    }

    /// Upstream that never answers within any sane grace period.
    struct StuckClient;

    #[async_trait]
    impl HttpClient for StuckClient {
        async fn get(&self, _url: &str) -> Result<HttpResponse, FetchError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(FetchError::Timeout)
        }
    }

    #[tokio::test]
    async fn test_shutdown_completes_with_stuck_producer() {
        let config = test_config();
        let grace = config.display.shutdown_grace();
        let producer =
            LiveProducer::from_config(&config, Arc::new(StuckClient), SnapshotStore::new());
        let mut renderer = RecordingRenderer::default();
        let shutdown = ShutdownFlag::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.request();
        });

        let start = std::time::Instant::now();
        run_tracker(producer, &mut renderer, shutdown, &config.display).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= grace, "waited out the grace period, took {elapsed:?}");
        assert!(
            elapsed < grace + Duration::from_millis(1500),
            "abandoned the producer, took {elapsed:?}"
        );

        let events = renderer.events();
        assert!(!events.iter().any(|e| matches!(e, Event::Record { .. })));
        let tail = &events[events.len() - 3..];
        assert_eq!(
            tail,
            &[
                Event::Status(STATUS_SHUTTING_DOWN.into()),
                Event::Status(STATUS_GOODBYE.into()),
                Event::Clear,
            ]
        );
    }

    #[tokio::test]
    async fn test_run_tracker_holds_goodbye() {
        let mut config = test_config();
        config.display.goodbye_ms = 300;
        let producer = LiveProducer::from_config(&config, mock_upstream(), SnapshotStore::new());
        let mut renderer = RecordingRenderer::default();
        let observer = renderer.clone();
        let shutdown = ShutdownFlag::new();
        shutdown.request();

        let start = std::time::Instant::now();
        let task = tokio::spawn(async move {
            run_tracker(producer, &mut renderer, shutdown, &config.display).await;
        });

        // Poll until the farewell is up, then check it is not cleared at once.
        while observer.last() != Some(Event::Status(STATUS_GOODBYE.into())) {
            assert!(start.elapsed() < Duration::from_secs(3));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(observer.last(), Some(Event::Status(STATUS_GOODBYE.into())));

        task.await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(observer.last(), Some(Event::Clear));
    }

    #[tokio::test]
    async fn test_consumer_shows_status_before_first_publish() {
        let config = test_config();
        let store = SnapshotStore::new();
        let mut consumer = Consumer::new(store, &config.display);
        let mut renderer = RecordingRenderer::default();
        let shutdown = ShutdownFlag::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.request();
        });
        consumer.run(&mut renderer, &shutdown).await;

        let events = renderer.events();
        assert!(!events.is_empty());
        assert!(events
            .iter()
            .all(|e| *e == Event::Status(crate::display::STATUS_SCANNING.into())));
    }
}
