use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::business_logic::config::ScannerConfig;
use crate::business_logic::reversal;
use crate::errors::ScanError;
use crate::models::candle::Candle;
use crate::models::match_result::{result_key, MatchResult, ResultsSnapshot, SortColumn, SortSpec};
use crate::models::timeframe::Timeframe;
use crate::services::clock::Clock;
use crate::services::market_data::MarketDataSource;
use crate::services::presenter::Presenter;
use crate::services::result_store::ResultStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Stopped,
    Running,
}

#[derive(Debug)]
struct Lifecycle {
    state: ScanState,
    /// A worker task is alive and will check `state` before its next sweep
    worker_active: bool,
    worker: Option<JoinHandle<()>>,
}

/// Everything the scanner owns: lifecycle, toggles, store and collaborators.
pub struct ScannerContext {
    config: ScannerConfig,
    source: Arc<dyn MarketDataSource>,
    clock: Arc<dyn Clock>,
    presenter: Arc<dyn Presenter>,
    store: ResultStore,
    lifecycle: Mutex<Lifecycle>,
    notifications_enabled: AtomicBool,
    sort: RwLock<SortSpec>,
    symbol_count: AtomicUsize,
    sweeps_completed: AtomicU64,
}

/// Point-in-time view of the scanner for the control surface.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScanStatus {
    pub state: ScanState,
    pub notifications_enabled: bool,
    pub sort: SortSpec,
    /// Symbols fetched when the current worker started
    pub symbols: usize,
    pub sweeps_completed: u64,
    pub results: usize,
}

/// Sweeps every symbol x timeframe sequentially, recording the first match per pair.
///
/// Cancellation is cooperative: `stop` is only observed before a sweep begins, so a
/// sweep in progress always runs to completion.
#[derive(Clone)]
pub struct Scanner {
    ctx: Arc<ScannerContext>,
}

impl Scanner {
    pub fn new(
        config: ScannerConfig,
        source: Arc<dyn MarketDataSource>,
        clock: Arc<dyn Clock>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        let notifications_enabled = AtomicBool::new(config.notifications_enabled);
        Self {
            ctx: Arc::new(ScannerContext {
                config,
                source,
                clock,
                presenter,
                store: ResultStore::new(),
                lifecycle: Mutex::new(Lifecycle {
                    state: ScanState::Stopped,
                    worker_active: false,
                    worker: None,
                }),
                notifications_enabled,
                sort: RwLock::new(SortSpec::default()),
                symbol_count: AtomicUsize::new(0),
                sweeps_completed: AtomicU64::new(0),
            }),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        // A poisoned lock only means a panic elsewhere; the state itself is still valid
        self.ctx
            .lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stopped -> Running. Spawns a worker unless one is still finishing its sweep,
    /// in which case that worker simply carries on. Returns `false` if already running.
    pub fn start(&self) -> bool {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state == ScanState::Running {
            return false;
        }

        lifecycle.state = ScanState::Running;
        if !lifecycle.worker_active {
            lifecycle.worker_active = true;
            let scanner = self.clone();
            lifecycle.worker = Some(tokio::spawn(async move { scanner.run().await }));
        }

        tracing::info!("Scanner started");
        true
    }

    /// Running -> Stopped. Takes effect at the next sweep boundary. Returns `false` if
    /// already stopped.
    pub fn stop(&self) -> bool {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state == ScanState::Stopped {
            return false;
        }

        lifecycle.state = ScanState::Stopped;
        tracing::info!("Scanner stopping after the current sweep");
        true
    }

    /// Wait for the current worker, if any, to exit.
    pub async fn join(&self) {
        let handle = self.lifecycle().worker.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Scanner worker failed: {}", e);
            }
        }
    }

    pub fn state(&self) -> ScanState {
        self.lifecycle().state
    }

    pub fn set_notification_enabled(&self, enabled: bool) {
        self.ctx
            .notifications_enabled
            .store(enabled, Ordering::Relaxed);
        tracing::info!("Match notifications {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn notifications_enabled(&self) -> bool {
        self.ctx.notifications_enabled.load(Ordering::Relaxed)
    }

    /// Toggle or switch the sort column, then republish the snapshot.
    pub async fn set_sort_column(&self, column: SortColumn) -> SortSpec {
        let sort = {
            let mut sort = self.ctx.sort.write().await;
            *sort = sort.request(column);
            *sort
        };

        let snapshot = self.snapshot_with(sort).await;
        self.ctx.presenter.on_results_changed(&snapshot);
        sort
    }

    pub async fn snapshot(&self) -> ResultsSnapshot {
        let sort = *self.ctx.sort.read().await;
        self.snapshot_with(sort).await
    }

    async fn snapshot_with(&self, sort: SortSpec) -> ResultsSnapshot {
        ResultsSnapshot {
            as_of_ms: self.ctx.clock.now().timestamp_millis() as u64,
            sort,
            results: self.ctx.store.snapshot(sort).await,
        }
    }

    pub async fn result(&self, symbol: &str, timeframe: Timeframe) -> Option<MatchResult> {
        self.ctx.store.get(&result_key(symbol, timeframe)).await
    }

    pub async fn status(&self) -> ScanStatus {
        ScanStatus {
            state: self.state(),
            notifications_enabled: self.notifications_enabled(),
            sort: *self.ctx.sort.read().await,
            symbols: self.ctx.symbol_count.load(Ordering::Relaxed),
            sweeps_completed: self.ctx.sweeps_completed.load(Ordering::Relaxed),
            results: self.ctx.store.len().await,
        }
    }

    /// Checked once per sweep. On Stopped, marks the worker inactive under the same
    /// lock `start` uses, so a concurrent start either sees the worker exit or keeps it.
    fn continue_scanning(&self) -> bool {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state == ScanState::Running {
            return true;
        }
        lifecycle.worker_active = false;
        false
    }

    async fn run(&self) {
        // Listing fetched once per worker; new listings are picked up on the next start
        let symbols = self
            .fetch_or_empty("symbols", self.ctx.source.list_tradable_symbols())
            .await;
        self.ctx.symbol_count.store(symbols.len(), Ordering::Relaxed);
        tracing::info!(
            "Scanning {} symbols across {} timeframes",
            symbols.len(),
            Timeframe::ALL.len()
        );

        while self.continue_scanning() {
            let new_matches = self.sweep(&symbols).await;
            let sweeps = self.ctx.sweeps_completed.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!("Sweep {} complete ({} new matches)", sweeps, new_matches);

            self.ctx.clock.sleep(self.ctx.config.sweep_pause).await;
        }

        tracing::info!("Scanner stopped");
    }

    /// One pass over symbols (outer) x timeframes (inner). Returns the number of new matches.
    async fn sweep(&self, symbols: &[String]) -> usize {
        let mut new_matches = 0;
        for symbol in symbols {
            for timeframe in Timeframe::ALL {
                if self.scan_unit(symbol, timeframe).await {
                    new_matches += 1;
                }
            }
        }
        new_matches
    }

    async fn scan_unit(&self, symbol: &str, timeframe: Timeframe) -> bool {
        let candles: Vec<Candle> = self
            .fetch_or_empty(
                &format!("{} {} candles", symbol, timeframe),
                self.ctx.source.get_recent_candles(
                    symbol,
                    timeframe,
                    self.ctx.config.candle_limit,
                ),
            )
            .await;

        let Some(signal) = reversal::detect(&candles) else {
            return false;
        };

        let result = MatchResult::new(symbol, timeframe, signal, self.ctx.clock.now());
        if !self.ctx.store.insert_if_absent(result.key(), result.clone()).await {
            return false;
        }

        let snapshot = self.snapshot().await;
        self.ctx.presenter.on_results_changed(&snapshot);
        self.ctx
            .presenter
            .on_match(&result, self.notifications_enabled());
        true
    }

    /// Bounded fetch; failures and timeouts are logged and read as no data.
    async fn fetch_or_empty<T>(
        &self,
        what: &str,
        fetch: impl Future<Output = Result<Vec<T>, ScanError>>,
    ) -> Vec<T> {
        let timeout = self.ctx.config.fetch_timeout;
        let outcome = match tokio::time::timeout(timeout, fetch).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ScanError::Timeout(timeout)),
        };

        outcome.unwrap_or_else(|e| {
            tracing::warn!("Error fetching {}: {}", what, e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::match_result::SortDirection;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            open_time: 0,
            open,
            high,
            low,
            close,
            volume: 42.0,
        }
    }

    fn reversal_candles() -> Vec<Candle> {
        vec![
            candle(101.0, 101.5, 99.5, 100.0),
            candle(101.0, 101.5, 99.5, 100.0),
            candle(101.0, 101.5, 99.5, 100.0),
            candle(101.0, 101.5, 99.5, 100.0),
            candle(100.0, 100.05, 99.95, 100.005),
            candle(100.02, 100.12, 100.00, 100.10),
        ]
    }

    /// Serves a fixed symbol list; listed symbols return the reversal, others nothing.
    struct FakeSource {
        symbols: Vec<String>,
        matching: HashSet<String>,
        symbol_calls: AtomicUsize,
        candle_calls: AtomicUsize,
        /// `SYMBOL-timeframe` of every candle fetch, in call order
        visited: Mutex<Vec<String>>,
        fail_symbols: bool,
        delay: Option<Duration>,
        /// First candle call parks here until released
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl FakeSource {
        fn new(symbols: &[&str], matching: &[&str]) -> Self {
            Self {
                symbols: symbols.iter().map(|s| s.to_string()).collect(),
                matching: matching.iter().map(|s| s.to_string()).collect(),
                symbol_calls: AtomicUsize::new(0),
                candle_calls: AtomicUsize::new(0),
                visited: Mutex::new(Vec::new()),
                fail_symbols: false,
                delay: None,
                gate: None,
            }
        }

        fn calls(&self) -> usize {
            self.candle_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataSource for FakeSource {
        async fn list_tradable_symbols(&self) -> Result<Vec<String>, ScanError> {
            self.symbol_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_symbols {
                return Err(ScanError::Status(500));
            }
            Ok(self.symbols.clone())
        }

        async fn get_recent_candles(
            &self,
            symbol: &str,
            timeframe: Timeframe,
            _limit: usize,
        ) -> Result<Vec<Candle>, ScanError> {
            self.visited
                .lock()
                .unwrap()
                .push(result_key(symbol, timeframe));
            let call = self.candle_calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                if let Some((entered, release)) = &self.gate {
                    entered.notify_one();
                    release.notified().await;
                }
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.matching.contains(symbol) {
                Ok(reversal_candles())
            } else {
                Err(ScanError::MalformedCandle("no data".to_string()))
            }
        }
    }

    struct FixedClock {
        now: DateTime<Utc>,
        pauses: AtomicUsize,
        slept: Mutex<Vec<Duration>>,
    }

    impl FixedClock {
        fn new() -> Self {
            Self {
                now: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                pauses: AtomicUsize::new(0),
                slept: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.now
        }

        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
            self.pauses.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
        }
    }

    #[derive(Default)]
    struct RecordingPresenter {
        snapshots: Mutex<Vec<usize>>,
        matches: Mutex<Vec<(String, bool)>>,
    }

    impl Presenter for RecordingPresenter {
        fn on_results_changed(&self, snapshot: &ResultsSnapshot) {
            self.snapshots.lock().unwrap().push(snapshot.results.len());
        }

        fn on_match(&self, result: &MatchResult, audible: bool) {
            self.matches.lock().unwrap().push((result.key(), audible));
        }
    }

    fn scanner(
        source: Arc<FakeSource>,
        clock: Arc<FixedClock>,
        presenter: Arc<RecordingPresenter>,
    ) -> Scanner {
        let config = ScannerConfig {
            fetch_timeout: Duration::from_millis(200),
            ..ScannerConfig::default()
        };
        Scanner::new(config, source, clock, presenter)
    }

    #[tokio::test]
    async fn sweep_visits_every_symbol_and_timeframe() {
        let source = Arc::new(FakeSource::new(&["AAAUSDT", "BBBUSDT", "CCCUSDT"], &[]));
        let presenter = Arc::new(RecordingPresenter::default());
        let scanner = scanner(source.clone(), Arc::new(FixedClock::new()), presenter.clone());

        let symbols = source.symbols.clone();
        assert_eq!(scanner.sweep(&symbols).await, 0);
        assert_eq!(source.calls(), 3 * Timeframe::ALL.len());
        assert!(presenter.matches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_is_symbol_major_in_timeframe_order() {
        let source = Arc::new(FakeSource::new(&["AAAUSDT", "BBBUSDT"], &[]));
        let scanner = scanner(
            source.clone(),
            Arc::new(FixedClock::new()),
            Arc::new(RecordingPresenter::default()),
        );

        let symbols = source.symbols.clone();
        scanner.sweep(&symbols).await;

        let visited = source.visited.lock().unwrap().clone();
        let expected: Vec<String> = ["AAAUSDT", "BBBUSDT"]
            .iter()
            .flat_map(|symbol| Timeframe::ALL.map(|timeframe| result_key(symbol, timeframe)))
            .collect();
        assert_eq!(visited, expected);
        assert_eq!(visited[14], "AAAUSDT-1M");
        assert_eq!(visited[15], "BBBUSDT-1m");
    }

    #[tokio::test]
    async fn match_is_recorded_and_announced_once_across_sweeps() {
        let source = Arc::new(FakeSource::new(&["AAAUSDT", "BBBUSDT"], &["BBBUSDT"]));
        let presenter = Arc::new(RecordingPresenter::default());
        let scanner = scanner(source.clone(), Arc::new(FixedClock::new()), presenter.clone());
        let symbols = source.symbols.clone();

        assert_eq!(scanner.sweep(&symbols).await, Timeframe::ALL.len());
        assert_eq!(scanner.sweep(&symbols).await, 0);

        let matches = presenter.matches.lock().unwrap().clone();
        assert_eq!(matches.len(), Timeframe::ALL.len());
        assert_eq!(matches[0], ("BBBUSDT-1m".to_string(), false));
        assert_eq!(matches.last().unwrap().0, "BBBUSDT-1M");

        let snapshots = presenter.snapshots.lock().unwrap().clone();
        assert_eq!(snapshots, (1..=Timeframe::ALL.len()).collect::<Vec<_>>());

        let stored = scanner.result("BBBUSDT", Timeframe::H4).await.unwrap();
        assert_eq!(stored.price, 100.10);
        assert_eq!(stored.volume, 42.0);
        assert_eq!(stored.detected_at, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        assert!(scanner.result("AAAUSDT", Timeframe::H4).await.is_none());
    }

    #[tokio::test]
    async fn notification_flag_is_passed_to_presenter() {
        let source = Arc::new(FakeSource::new(&["AAAUSDT"], &["AAAUSDT"]));
        let presenter = Arc::new(RecordingPresenter::default());
        let scanner = scanner(source.clone(), Arc::new(FixedClock::new()), presenter.clone());

        scanner.set_notification_enabled(true);
        scanner.scan_unit("AAAUSDT", Timeframe::M1).await;
        scanner.set_notification_enabled(false);
        scanner.scan_unit("AAAUSDT", Timeframe::M3).await;

        let matches = presenter.matches.lock().unwrap().clone();
        assert_eq!(
            matches,
            vec![
                ("AAAUSDT-1m".to_string(), true),
                ("AAAUSDT-3m".to_string(), false)
            ]
        );
    }

    #[tokio::test]
    async fn slow_fetch_times_out_as_empty() {
        let mut source = FakeSource::new(&["AAAUSDT"], &["AAAUSDT"]);
        source.delay = Some(Duration::from_secs(30));
        let source = Arc::new(source);
        let presenter = Arc::new(RecordingPresenter::default());
        let scanner = scanner(source.clone(), Arc::new(FixedClock::new()), presenter.clone());

        assert!(!scanner.scan_unit("AAAUSDT", Timeframe::M1).await);
        assert_eq!(scanner.status().await.results, 0);
    }

    #[tokio::test]
    async fn sort_request_toggles_and_republishes() {
        let source = Arc::new(FakeSource::new(&[], &[]));
        let presenter = Arc::new(RecordingPresenter::default());
        let scanner = scanner(source, Arc::new(FixedClock::new()), presenter.clone());

        let sort = scanner.set_sort_column(SortColumn::Price).await;
        assert_eq!(sort.column, SortColumn::Price);
        assert_eq!(sort.direction, SortDirection::Asc);

        let sort = scanner.set_sort_column(SortColumn::Price).await;
        assert_eq!(sort.direction, SortDirection::Desc);
        assert_eq!(presenter.snapshots.lock().unwrap().len(), 2);
        assert_eq!(scanner.snapshot().await.sort, sort);
    }

    #[tokio::test]
    async fn start_and_stop_report_transitions() {
        let source = Arc::new(FakeSource::new(&[], &[]));
        let clock = Arc::new(FixedClock::new());
        let scanner = scanner(source, clock, Arc::new(RecordingPresenter::default()));

        assert_eq!(scanner.state(), ScanState::Stopped);
        assert!(!scanner.stop());
        assert!(scanner.start());
        assert!(!scanner.start());
        assert_eq!(scanner.state(), ScanState::Running);
        assert!(scanner.stop());
        scanner.join().await;
        assert_eq!(scanner.state(), ScanState::Stopped);
    }

    #[tokio::test]
    async fn symbol_listing_failure_runs_empty_sweeps() {
        let mut source = FakeSource::new(&["AAAUSDT"], &["AAAUSDT"]);
        source.fail_symbols = true;
        let source = Arc::new(source);
        let clock = Arc::new(FixedClock::new());
        let scanner = scanner(source.clone(), clock.clone(), Arc::new(RecordingPresenter::default()));

        scanner.start();
        while clock.pauses.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        scanner.stop();
        scanner.join().await;

        assert_eq!(source.calls(), 0);
        assert_eq!(scanner.status().await.symbols, 0);
    }

    #[tokio::test]
    async fn stop_mid_sweep_lets_the_sweep_finish() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let mut source = FakeSource::new(&["AAAUSDT", "BBBUSDT"], &["BBBUSDT"]);
        source.gate = Some((entered.clone(), release.clone()));
        let source = Arc::new(source);
        let clock = Arc::new(FixedClock::new());
        let scanner = scanner(source.clone(), clock.clone(), Arc::new(RecordingPresenter::default()));

        assert!(scanner.start());
        entered.notified().await;
        assert_eq!(source.calls(), 1);

        assert!(scanner.stop());
        release.notify_one();
        scanner.join().await;

        let status = scanner.status().await;
        assert_eq!(source.calls(), 2 * Timeframe::ALL.len());
        assert_eq!(status.sweeps_completed, 1);
        assert_eq!(status.results, Timeframe::ALL.len());
        assert_eq!(status.state, ScanState::Stopped);
        assert_eq!(clock.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(*clock.slept.lock().unwrap(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn restart_before_sweep_ends_reuses_the_worker() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let mut source = FakeSource::new(&["AAAUSDT"], &[]);
        source.gate = Some((entered.clone(), release.clone()));
        let source = Arc::new(source);
        let clock = Arc::new(FixedClock::new());
        let scanner = scanner(source.clone(), clock.clone(), Arc::new(RecordingPresenter::default()));

        scanner.start();
        entered.notified().await;
        scanner.stop();
        assert!(scanner.start());
        release.notify_one();

        while scanner.ctx.sweeps_completed.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        scanner.stop();
        scanner.join().await;

        assert_eq!(source.symbol_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.calls() % Timeframe::ALL.len(), 0);
        assert!(!scanner.lifecycle().worker_active);
    }
}
