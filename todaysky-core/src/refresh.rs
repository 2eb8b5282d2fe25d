//! Background loop that keeps the dashboard's clock, calendar, weather and
//! holidays current.
//!
//! # Architecture
//!
//! A single task owns all counters and flags. Every `policy.tick` it reads
//! the clock and:
//! 1. emits clock/date/calendar events when the minute/day/month moved,
//! 2. requests a weather refresh once `weather_interval` has passed,
//! 3. requests the month's holidays when the month changes.
//!
//! Requests go through a connectivity gate. Fetches and delayed retries run
//! in spawned tasks that report back over an internal channel, so state is
//! only ever touched by the loop itself.
//!
//! # Example
//!
//! ```ignore
//! let (refresher, mut events) = Refresher::new(forecast, holidays, monitor, location);
//! tokio::spawn(refresher.run(shutdown.clone()));
//! while let Some(event) = events.recv().await { /* render */ }
//! ```

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    calendar::{CalendarDay, month_grid},
    clock::{ClockChanges, ClockTracker, SystemClock, TimeSource},
    connectivity::ConnectivityMonitor,
    error::ApiError,
    grid::GeoCoordinate,
    model::{Holiday, WeatherSnapshot},
    provider::{ForecastSource, HolidaySource},
    retry::{RefreshPolicy, RetryCounter, RetryDecision, WeatherGate},
};

/// Capacity of the outgoing event channel.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Weather,
    Holidays,
}

impl Resource {
    pub fn label(&self) -> &'static str {
        match self {
            Resource::Weather => "Weather",
            Resource::Holidays => "Holiday",
        }
    }
}

/// Updates published to the display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DashboardEvent {
    /// The minute changed.
    Clock { now: NaiveDateTime },
    /// The day changed.
    Date { date: NaiveDate },
    /// The month grid, re-sent when the month changes or its holidays arrive.
    Calendar { year: i32, month: u32, days: Vec<CalendarDay> },
    Weather { snapshot: WeatherSnapshot },
    Holidays { year: i32, month: u32, holidays: Vec<Holiday> },
    /// A failure the user should hear about.
    Error { resource: Resource, message: String },
    /// Connectivity could not be established; reported once per outage.
    Offline,
}

enum Internal {
    Retry(Resource),
    Recheck,
    WeatherDone(Result<WeatherSnapshot, ApiError>),
    HolidaysDone {
        year: i32,
        month: u32,
        result: Result<Vec<Holiday>, ApiError>,
    },
}

/// Dashboard refresh loop. Build with [`Refresher::new`], then [`Refresher::run`].
pub struct Refresher {
    core: RefreshCore,
    inbox: mpsc::UnboundedReceiver<Internal>,
}

struct RefreshCore {
    forecast: Arc<dyn ForecastSource>,
    holidays: Arc<dyn HolidaySource>,
    monitor: ConnectivityMonitor,
    clock: Arc<dyn TimeSource>,
    location: GeoCoordinate,
    policy: RefreshPolicy,
    events: mpsc::Sender<DashboardEvent>,
    inbox_tx: mpsc::UnboundedSender<Internal>,

    tracker: ClockTracker,
    gate: WeatherGate,
    weather_retry: RetryCounter,
    holiday_retry: RetryCounter,
    network_retries: u32,
    recheck_scheduled: bool,
    offline_reported: bool,
    pending: HashSet<Resource>,
    in_flight: HashSet<Resource>,
    month: Option<(i32, u32)>,
    month_holidays: Vec<Holiday>,
}

impl Refresher {
    pub fn new(
        forecast: Arc<dyn ForecastSource>,
        holidays: Arc<dyn HolidaySource>,
        monitor: ConnectivityMonitor,
        location: GeoCoordinate,
    ) -> (Self, mpsc::Receiver<DashboardEvent>) {
        let policy = RefreshPolicy::default();
        let (events, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (inbox_tx, inbox) = mpsc::unbounded_channel();

        let core = RefreshCore {
            forecast,
            holidays,
            monitor,
            clock: Arc::new(SystemClock),
            location,
            gate: WeatherGate::new(policy.weather_interval),
            weather_retry: RetryCounter::from_policy(&policy),
            holiday_retry: RetryCounter::from_policy(&policy),
            policy,
            events,
            inbox_tx,
            tracker: ClockTracker::new(),
            network_retries: 0,
            recheck_scheduled: false,
            offline_reported: false,
            pending: HashSet::new(),
            in_flight: HashSet::new(),
            month: None,
            month_holidays: Vec::new(),
        };

        (Self { core, inbox }, events_rx)
    }

    /// Replace the timing policy.
    pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
        self.core.gate = WeatherGate::new(policy.weather_interval);
        self.core.weather_retry = RetryCounter::from_policy(&policy);
        self.core.holiday_retry = RetryCounter::from_policy(&policy);
        self.core.policy = policy;
        self
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.core.clock = clock;
        self
    }

    /// Runs until `shutdown` is cancelled or the event receiver is dropped.
    pub async fn run(self, shutdown: CancellationToken) {
        let Refresher { mut core, mut inbox } = self;
        let mut status = core.monitor.subscribe();

        info!(
            tick_secs = core.policy.tick.as_secs(),
            weather_interval_secs = core.policy.weather_interval.as_secs(),
            max_retries = core.policy.max_retries,
            "dashboard refresher starting"
        );

        let mut interval = tokio::time::interval(core.policy.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and doubles as the initial refresh.

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("dashboard refresher shutting down");
                    break;
                }

                Ok(()) = status.changed() => {
                    let connected = *status.borrow_and_update();
                    core.on_connectivity(connected).await;
                }

                Some(msg) = inbox.recv() => {
                    core.handle(msg).await;
                }

                _ = interval.tick() => {
                    core.tick().await;
                }
            }

            if core.events.is_closed() {
                debug!("event receiver dropped, stopping refresher");
                break;
            }
        }
    }
}

impl RefreshCore {
    async fn emit(&self, event: DashboardEvent) {
        if self.events.send(event).await.is_err() {
            debug!("dashboard event dropped, receiver closed");
        }
    }

    fn schedule(&self, after: Duration, msg: Internal) {
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(msg);
        });
    }

    async fn tick(&mut self) {
        let now = self.clock.now();
        let changes = self.tracker.observe(now);
        self.apply_clock_changes(now, changes).await;
        self.request_weather(now, false);
    }

    async fn apply_clock_changes(&mut self, now: NaiveDateTime, changes: ClockChanges) {
        if changes.minute {
            self.emit(DashboardEvent::Clock { now }).await;
        }
        if changes.day {
            self.emit(DashboardEvent::Date { date: now.date() }).await;
        }
        if changes.month {
            self.month = Some((now.year(), now.month()));
            self.month_holidays.clear();
            self.holiday_retry.reset();
            self.emit_calendar(now.date()).await;
            self.need(Resource::Holidays);
        }
    }

    async fn emit_calendar(&self, today: NaiveDate) {
        if let Some((year, month)) = self.month {
            let days = month_grid(year, month, today, &self.month_holidays);
            self.emit(DashboardEvent::Calendar { year, month, days }).await;
        }
    }

    fn request_weather(&mut self, now: NaiveDateTime, ignore_cooldown: bool) {
        if self.in_flight.contains(&Resource::Weather) {
            return;
        }
        if self.gate.should_request(now, ignore_cooldown) {
            self.need(Resource::Weather);
        }
    }

    /// Connectivity gate: dispatch now, or park the request and re-check.
    fn need(&mut self, resource: Resource) {
        if self.monitor.is_connected() {
            self.network_retries = 0;
            self.dispatch(resource);
            return;
        }

        self.pending.insert(resource);
        if !self.recheck_scheduled {
            self.recheck_scheduled = true;
            self.schedule(self.policy.connectivity_retry_delay, Internal::Recheck);
        }
    }

    fn dispatch(&mut self, resource: Resource) {
        if !self.in_flight.insert(resource) {
            return;
        }
        let tx = self.inbox_tx.clone();

        match resource {
            Resource::Weather => {
                let now = self.clock.now();
                self.gate.mark_requested(now);
                let source = Arc::clone(&self.forecast);
                let location = self.location;
                debug!(%now, "requesting weather");
                tokio::spawn(async move {
                    let result = source.fetch_snapshot(location, now).await;
                    let _ = tx.send(Internal::WeatherDone(result));
                });
            }
            Resource::Holidays => {
                let Some((year, month)) = self.month else {
                    self.in_flight.remove(&resource);
                    return;
                };
                let source = Arc::clone(&self.holidays);
                debug!(year, month, "requesting holidays");
                tokio::spawn(async move {
                    let result = source.holidays(year, month).await;
                    let _ = tx.send(Internal::HolidaysDone { year, month, result });
                });
            }
        }
    }

    async fn handle(&mut self, msg: Internal) {
        match msg {
            Internal::Retry(Resource::Weather) => {
                let now = self.clock.now();
                self.request_weather(now, true);
            }
            Internal::Retry(Resource::Holidays) => self.need(Resource::Holidays),
            Internal::Recheck => self.recheck().await,
            Internal::WeatherDone(result) => {
                self.in_flight.remove(&Resource::Weather);
                match result {
                    Ok(snapshot) => {
                        self.weather_retry.reset();
                        info!(cell = %snapshot.cell, window = %snapshot.window, "weather updated");
                        self.emit(DashboardEvent::Weather { snapshot }).await;
                    }
                    Err(err) => self.on_failure(Resource::Weather, err).await,
                }
            }
            Internal::HolidaysDone { year, month, result } => {
                self.in_flight.remove(&Resource::Holidays);
                if self.month != Some((year, month)) {
                    // The month's own request was skipped while this one was in flight.
                    debug!(year, month, "discarding holidays for a month no longer shown");
                    self.need(Resource::Holidays);
                    return;
                }
                match result {
                    Ok(holidays) => {
                        self.holiday_retry.reset();
                        self.month_holidays = holidays.clone();
                        self.emit(DashboardEvent::Holidays { year, month, holidays }).await;
                        let today = self.clock.now().date();
                        self.emit_calendar(today).await;
                    }
                    Err(err) => self.on_failure(Resource::Holidays, err).await,
                }
            }
        }
    }

    async fn recheck(&mut self) {
        self.recheck_scheduled = false;

        if self.monitor.is_connected() {
            self.network_retries = 0;
            self.flush_pending();
        } else if self.network_retries < self.policy.max_retries {
            self.network_retries += 1;
            self.recheck_scheduled = true;
            self.schedule(self.policy.connectivity_retry_delay, Internal::Recheck);
        } else {
            debug!(dropped = self.pending.len(), "still offline, dropping pending requests");
            self.network_retries = 0;
            self.pending.clear();
            self.report_offline().await;
        }
    }

    fn flush_pending(&mut self) {
        let pending: Vec<Resource> = self.pending.drain().collect();
        for resource in pending {
            self.dispatch(resource);
        }
    }

    async fn report_offline(&mut self) {
        if !self.offline_reported {
            self.offline_reported = true;
            warn!("network unavailable");
            self.emit(DashboardEvent::Offline).await;
        }
    }

    async fn on_connectivity(&mut self, connected: bool) {
        if !connected {
            self.report_offline().await;
            return;
        }

        info!("network restored, refreshing");
        self.network_retries = 0;
        self.weather_retry.reset();
        self.holiday_retry.reset();
        self.offline_reported = false;

        self.flush_pending();
        let now = self.clock.now();
        self.request_weather(now, true);
        if self.month.is_some() {
            self.need(Resource::Holidays);
        }
    }

    async fn on_failure(&mut self, resource: Resource, err: ApiError) {
        match &err {
            ApiError::Network(reason) => {
                // Recovery is driven by the connectivity monitor.
                debug!(?resource, %reason, "network failure");
            }
            ApiError::Parsing(_) => {
                let counter = match resource {
                    Resource::Weather => &mut self.weather_retry,
                    Resource::Holidays => &mut self.holiday_retry,
                };
                match counter.record_failure() {
                    RetryDecision::RetryAfter(delay) => {
                        debug!(?resource, attempt = counter.attempts(), error = %err, "retrying");
                        self.schedule(delay, Internal::Retry(resource));
                    }
                    RetryDecision::CooldownAfter(delay) => {
                        warn!(?resource, cooldown_secs = delay.as_secs(), error = %err, "retries exhausted");
                        self.emit(DashboardEvent::Error {
                            resource,
                            message: err.user_message(resource.label()),
                        })
                        .await;
                        self.schedule(delay, Internal::Retry(resource));
                    }
                }
            }
            ApiError::Unauthorized(_) | ApiError::Unknown(_) => {
                warn!(?resource, error = %err, "request failed");
                self.emit(DashboardEvent::Error {
                    resource,
                    message: err.user_message(resource.label()),
                })
                .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base_time::base_window,
        clock::FixedClock,
        grid::GridCell,
        model::{ForecastItem, ForecastReading},
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ─────────────────────────────────────────────────────────────────────
    // Fakes
    // ─────────────────────────────────────────────────────────────────────

    type Script<T> = Mutex<VecDeque<Result<T, ApiError>>>;

    /// Replays scripted results, then succeeds with an empty snapshot.
    #[derive(Debug, Default)]
    struct FakeForecast {
        script: Script<WeatherSnapshot>,
        fail_with_parsing: bool,
        calls: AtomicUsize,
    }

    impl FakeForecast {
        fn scripted(results: Vec<Result<WeatherSnapshot, ApiError>>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(results.into()), ..Default::default() })
        }

        fn always_unparseable() -> Arc<Self> {
            Arc::new(Self { fail_with_parsing: true, ..Default::default() })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ForecastSource for FakeForecast {
        async fn fetch_items(
            &self,
            _cell: GridCell,
            _window: crate::base_time::ForecastWindow,
        ) -> Result<Vec<ForecastItem>, ApiError> {
            unreachable!("fetch_snapshot is overridden")
        }

        async fn fetch_snapshot(
            &self,
            coord: GeoCoordinate,
            now: NaiveDateTime,
        ) -> Result<WeatherSnapshot, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_with_parsing {
                return Err(ApiError::Parsing("garbled".into()));
            }
            let next = self.script.lock().expect("lock").pop_front();
            next.unwrap_or_else(|| Ok(snapshot(coord, now)))
        }
    }

    /// Replays scripted results, then answers with `holidays`.
    #[derive(Debug, Default)]
    struct FakeHolidays {
        holidays: Vec<Holiday>,
        script: Script<Vec<Holiday>>,
        fail_with_parsing: bool,
        /// Answer for this month only after the given delay.
        slow_month: Option<(u32, Duration)>,
        calls: AtomicUsize,
        requested: Mutex<Vec<(i32, u32)>>,
    }

    impl FakeHolidays {
        fn scripted(results: Vec<Result<Vec<Holiday>, ApiError>>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(results.into()), ..Default::default() })
        }

        fn always_unparseable() -> Arc<Self> {
            Arc::new(Self { fail_with_parsing: true, ..Default::default() })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn requested(&self) -> Vec<(i32, u32)> {
            self.requested.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl HolidaySource for FakeHolidays {
        async fn holidays(&self, year: i32, month: u32) -> Result<Vec<Holiday>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().expect("lock").push((year, month));

            if let Some((_, delay)) = self.slow_month.filter(|&(slow, _)| slow == month) {
                tokio::time::sleep(delay).await;
            }
            if self.fail_with_parsing {
                return Err(ApiError::Parsing("garbled".into()));
            }
            let next = self.script.lock().expect("lock").pop_front();
            next.unwrap_or_else(|| Ok(self.holidays.clone()))
        }
    }

    fn snapshot(coord: GeoCoordinate, now: NaiveDateTime) -> WeatherSnapshot {
        WeatherSnapshot {
            cell: crate::grid::project(coord),
            window: base_window(now),
            current: ForecastReading::unknown(),
            later: ForecastReading::unknown(),
        }
    }

    fn at(d: u32, hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, d)
            .and_then(|date| date.and_hms_opt(hh, mm, 0))
            .expect("valid time")
    }

    const SEOUL: GeoCoordinate = GeoCoordinate::new(37.5665, 126.9780);

    struct Harness {
        events: mpsc::Receiver<DashboardEvent>,
        clock: FixedClock,
        monitor: ConnectivityMonitor,
        shutdown: CancellationToken,
    }

    fn start(forecast: Arc<FakeForecast>, holidays: Arc<FakeHolidays>, monitor: ConnectivityMonitor) -> Harness {
        let clock = FixedClock::new(at(15, 10, 50));
        let (refresher, events) = Refresher::new(forecast, holidays, monitor.clone(), SEOUL);
        let refresher = refresher.with_clock(Arc::new(clock.clone()));
        let shutdown = CancellationToken::new();
        tokio::spawn(refresher.run(shutdown.clone()));
        Harness { events, clock, monitor, shutdown }
    }

    /// Next event satisfying `pred`, skipping others; `None` on timeout.
    async fn next_where(
        rx: &mut mpsc::Receiver<DashboardEvent>,
        within: Duration,
        pred: impl Fn(&DashboardEvent) -> bool,
    ) -> Option<DashboardEvent> {
        tokio::time::timeout(within, async {
            while let Some(event) = rx.recv().await {
                if pred(&event) {
                    return Some(event);
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }

    /// Events received until `done` holds for everything seen so far.
    async fn collect_until(
        rx: &mut mpsc::Receiver<DashboardEvent>,
        within: Duration,
        done: impl Fn(&[DashboardEvent]) -> bool,
    ) -> Vec<DashboardEvent> {
        let mut seen = Vec::new();
        let _ = tokio::time::timeout(within, async {
            while let Some(event) = rx.recv().await {
                seen.push(event);
                if done(&seen) {
                    break;
                }
            }
        })
        .await;
        seen
    }

    fn is_holidays(e: &DashboardEvent) -> bool {
        matches!(e, DashboardEvent::Holidays { .. })
    }

    fn is_marked_calendar(e: &DashboardEvent) -> bool {
        matches!(e, DashboardEvent::Calendar { days, .. } if days.iter().any(CalendarDay::is_holiday))
    }

    fn is_weather(e: &DashboardEvent) -> bool {
        matches!(e, DashboardEvent::Weather { .. })
    }

    fn is_error(e: &DashboardEvent) -> bool {
        matches!(e, DashboardEvent::Error { .. })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tests
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn initial_refresh_emits_everything() {
        let forecast = FakeForecast::scripted(vec![]);
        let holidays = Arc::new(FakeHolidays {
            holidays: vec![Holiday { date_name: "광복절".into(), locdate: 20250815 }],
            ..Default::default()
        });
        let mut h = start(forecast.clone(), holidays.clone(), ConnectivityMonitor::new());

        assert_eq!(
            h.events.recv().await,
            Some(DashboardEvent::Clock { now: at(15, 10, 50) })
        );
        assert_eq!(
            h.events.recv().await,
            Some(DashboardEvent::Date { date: at(15, 0, 0).date() })
        );
        match h.events.recv().await {
            Some(DashboardEvent::Calendar { year: 2025, month: 8, days }) => {
                assert!(!days.iter().any(CalendarDay::is_holiday));
            }
            other => panic!("expected calendar, got {other:?}"),
        }

        let seen = collect_until(&mut h.events, Duration::from_secs(5), |seen| {
            seen.iter().any(is_weather) && seen.iter().any(is_marked_calendar)
        })
        .await;

        let snapshot = seen.iter().find_map(|e| match e {
            DashboardEvent::Weather { snapshot } => Some(snapshot),
            _ => None,
        });
        let snapshot = snapshot.expect("weather event");
        assert_eq!(snapshot.cell, GridCell { nx: 60, ny: 127 });
        assert_eq!(snapshot.window.base_time(), "0800");
        assert!(seen.iter().any(is_marked_calendar), "calendar with holidays marked");

        assert_eq!(forecast.calls(), 1);
        assert_eq!(holidays.calls(), 1);
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn weather_respects_thirty_minute_interval() {
        let forecast = FakeForecast::scripted(vec![]);
        let mut h = start(forecast.clone(), Arc::default(), ConnectivityMonitor::new());

        assert!(next_where(&mut h.events, Duration::from_secs(5), is_weather).await.is_some());

        h.clock.set(at(15, 11, 10));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(forecast.calls(), 1);

        h.clock.set(at(15, 11, 20));
        assert!(next_where(&mut h.events, Duration::from_secs(5), is_weather).await.is_some());
        assert_eq!(forecast.calls(), 2);
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn parsing_failure_retries_quickly() {
        let forecast = FakeForecast::scripted(vec![Err(ApiError::Parsing("truncated".into()))]);
        let mut h = start(forecast.clone(), Arc::default(), ConnectivityMonitor::new());

        assert!(next_where(&mut h.events, Duration::from_secs(10), is_weather).await.is_some());
        assert_eq!(forecast.calls(), 2);
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_report_and_cool_down() {
        let forecast = FakeForecast::always_unparseable();
        let mut h = start(forecast.clone(), Arc::default(), ConnectivityMonitor::new());

        let err = next_where(&mut h.events, Duration::from_secs(30), is_error).await;
        assert_eq!(
            err,
            Some(DashboardEvent::Error {
                resource: Resource::Weather,
                message: ApiError::Parsing(String::new()).user_message("Weather"),
            })
        );
        // initial attempt + 3 quick retries
        assert_eq!(forecast.calls(), 4);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(forecast.calls(), 4, "no requests during cooldown");

        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert!(forecast.calls() > 4, "retried after cooldown");
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_is_reported_without_retry() {
        let forecast = FakeForecast::scripted(vec![Err(ApiError::Unauthorized("401".into()))]);
        let mut h = start(forecast.clone(), Arc::default(), ConnectivityMonitor::new());

        let err = next_where(&mut h.events, Duration::from_secs(5), is_error).await;
        assert!(matches!(err, Some(DashboardEvent::Error { resource: Resource::Weather, .. })));

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        assert_eq!(forecast.calls(), 1);
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn offline_reported_once_then_recovers() {
        let forecast = FakeForecast::scripted(vec![]);
        let holidays: Arc<FakeHolidays> = Arc::default();
        let monitor = ConnectivityMonitor::new();
        monitor.set_connected(false);
        let mut h = start(forecast.clone(), holidays.clone(), monitor);

        let offline = next_where(&mut h.events, Duration::from_secs(10), |e| {
            matches!(e, DashboardEvent::Offline)
        })
        .await;
        assert_eq!(offline, Some(DashboardEvent::Offline));
        assert_eq!(forecast.calls(), 0);

        let again = next_where(&mut h.events, Duration::from_secs(20), |e| {
            matches!(e, DashboardEvent::Offline)
        })
        .await;
        assert_eq!(again, None, "offline is reported once per outage");

        h.monitor.set_connected(true);
        let seen = collect_until(&mut h.events, Duration::from_secs(5), |seen| {
            seen.iter().any(is_weather) && seen.iter().any(is_holidays)
        })
        .await;
        assert!(seen.iter().any(is_weather));
        assert!(seen.iter().any(is_holidays));
        assert_eq!(forecast.calls(), 1);
        assert!(holidays.calls() >= 1);
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn month_change_refetches_holidays() {
        let holidays: Arc<FakeHolidays> = Arc::default();
        let mut h = start(FakeForecast::scripted(vec![]), holidays.clone(), ConnectivityMonitor::new());

        assert!(next_where(&mut h.events, Duration::from_secs(5), |e| {
            matches!(e, DashboardEvent::Holidays { month: 8, .. })
        })
        .await
        .is_some());

        h.clock.set(
            NaiveDate::from_ymd_opt(2025, 9, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("valid time"),
        );
        assert!(next_where(&mut h.events, Duration::from_secs(5), |e| {
            matches!(e, DashboardEvent::Holidays { month: 9, .. })
        })
        .await
        .is_some());
        assert_eq!(holidays.calls(), 2);
        h.shutdown.cancel();
    }

    fn holidays_for(month: u32) -> impl Fn(&DashboardEvent) -> bool {
        move |e| matches!(e, DashboardEvent::Holidays { month: m, .. } if *m == month)
    }

    fn is_holiday_error(e: &DashboardEvent) -> bool {
        matches!(e, DashboardEvent::Error { resource: Resource::Holidays, .. })
    }

    fn first_of_september() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid time")
    }

    #[tokio::test(start_paused = true)]
    async fn holiday_parsing_failure_retries_until_success() {
        let holidays = FakeHolidays::scripted(vec![
            Err(ApiError::Parsing("truncated".into())),
            Err(ApiError::Parsing("truncated".into())),
            Ok(vec![Holiday { date_name: "광복절".into(), locdate: 20250815 }]),
        ]);
        let mut h = start(FakeForecast::scripted(vec![]), holidays.clone(), ConnectivityMonitor::new());

        let seen = collect_until(&mut h.events, Duration::from_secs(10), |seen| {
            seen.iter().any(holidays_for(8))
        })
        .await;

        match seen.iter().find(|e| holidays_for(8)(*e)) {
            Some(DashboardEvent::Holidays { holidays: list, .. }) => assert_eq!(list.len(), 1),
            other => panic!("expected holidays, got {other:?}"),
        }
        assert!(!seen.iter().any(is_holiday_error), "quick retries stay silent");
        assert_eq!(holidays.calls(), 3);
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn holiday_retries_exhausted_report_and_cool_down() {
        let holidays = FakeHolidays::always_unparseable();
        let mut h = start(FakeForecast::scripted(vec![]), holidays.clone(), ConnectivityMonitor::new());

        let err = next_where(&mut h.events, Duration::from_secs(30), is_holiday_error).await;
        assert_eq!(
            err,
            Some(DashboardEvent::Error {
                resource: Resource::Holidays,
                message: ApiError::Parsing(String::new()).user_message("Holiday"),
            })
        );
        assert_eq!(holidays.calls(), 4);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(holidays.calls(), 4, "no requests during cooldown");

        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert!(holidays.calls() > 4, "retried after cooldown");
        assert!(holidays.requested().iter().all(|&ym| ym == (2025, 8)));
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn holiday_unauthorized_is_reported_without_retry() {
        let holidays = FakeHolidays::scripted(vec![Err(ApiError::Unauthorized("403".into()))]);
        let mut h = start(FakeForecast::scripted(vec![]), holidays.clone(), ConnectivityMonitor::new());

        let err = next_where(&mut h.events, Duration::from_secs(5), is_holiday_error).await;
        assert_eq!(
            err,
            Some(DashboardEvent::Error {
                resource: Resource::Holidays,
                message: ApiError::Unauthorized(String::new()).user_message("Holiday"),
            })
        );

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        assert_eq!(holidays.calls(), 1);
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn late_holidays_for_previous_month_are_discarded() {
        let holidays = Arc::new(FakeHolidays {
            holidays: vec![Holiday { date_name: "광복절".into(), locdate: 20250815 }],
            slow_month: Some((8, Duration::from_secs(10))),
            ..Default::default()
        });
        let mut h = start(FakeForecast::scripted(vec![]), holidays.clone(), ConnectivityMonitor::new());

        tokio::time::sleep(Duration::from_secs(2)).await;
        h.clock.set(first_of_september());

        let seen = collect_until(&mut h.events, Duration::from_secs(30), |seen| {
            seen.iter().any(holidays_for(9))
        })
        .await;

        assert!(seen.iter().any(holidays_for(9)), "current month still loads");
        assert!(!seen.iter().any(holidays_for(8)), "stale month is not published");
        assert!(!seen.iter().any(is_marked_calendar));
        assert_eq!(holidays.requested(), vec![(2025, 8), (2025, 9)]);
        h.shutdown.cancel();
    }
}
