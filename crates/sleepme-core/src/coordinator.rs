// ── Coordinator ──
//
// Owns the shared device cache for one account. Lists devices once at
// setup, refreshes every device on a fixed interval (or on demand), and
// routes mutations through the API before writing the server's answer
// back into the cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream;
use sleepme_api::{DeviceState, ErrorKind, SleepmeClient, ThermalMode};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CoordinatorConfig;
use crate::error::CoreError;
use crate::model::{self, CacheEntry, MAX_TEMPERATURE_F, MIN_TEMPERATURE_F};
use crate::store::{DeviceStore, Snapshot};
use crate::stream::StateStream;

// ── CoordinatorState ─────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CoordinatorState {
    /// Built but `setup()` has not completed.
    Uninitialized,
    /// Ready; no refresh in flight.
    Idle,
    /// A refresh cycle is running.
    Fetching,
    /// The credential was rejected. No further refreshes will run.
    Halted,
}

// ── Refresh reporting ────────────────────────────────────────────────

/// One device that could not be fetched during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFailure {
    pub device_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of a refresh cycle that was not halted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Device ids whose cache entry was replaced, in completion order.
    pub updated: Vec<String>,
    pub failed: Vec<DeviceFailure>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.updated.len() + self.failed.len()
    }
}

/// Stored result of the last finished cycle, shared with callers that
/// waited on it instead of starting their own.
#[derive(Debug, Clone)]
enum CycleOutcome {
    Complete(RefreshReport),
    Partial(RefreshReport),
    Halted(String),
}

impl CycleOutcome {
    fn to_result(&self) -> Result<RefreshReport, CoreError> {
        match self {
            Self::Complete(report) => Ok(report.clone()),
            Self::Partial(report) => Err(partial_failure(report)),
            Self::Halted(message) => Err(CoreError::ReauthRequired {
                message: message.clone(),
            }),
        }
    }
}

fn partial_failure(report: &RefreshReport) -> CoreError {
    let last = report.failed.last();
    CoreError::RefreshFailed {
        failed: report.failed.len(),
        total: report.total(),
        kind: last.map_or(ErrorKind::Api, |f| f.kind),
        message: last.map(|f| format!("{}: {}", f.device_id, f.message)).unwrap_or_default(),
    }
}

/// Raw results of fetching a set of devices.
struct FetchResults {
    states: Vec<(String, DeviceState)>,
    failed: Vec<DeviceFailure>,
    auth_error: Option<sleepme_api::Error>,
}

// ── Coordinator ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. All clones share one
/// cache, one rate limiter and one background loop.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    client: SleepmeClient,
    store: Arc<DeviceStore>,
    state: watch::Sender<CoordinatorState>,
    last_update_success: AtomicBool,
    /// Held for the duration of a refresh cycle.
    refresh_lock: Mutex<()>,
    /// Number of finished refresh cycles.
    cycles: AtomicU64,
    last_outcome: StdMutex<Option<CycleOutcome>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Build a coordinator and its API client. Does no I/O -- call
    /// [`setup()`](Self::setup) to discover devices.
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoreError> {
        let client = SleepmeClient::from_api_key(
            config.base_url.as_str(),
            &config.api_key,
            &config.transport(),
        )?;
        Self::with_client(config, client)
    }

    /// Build around an existing client. The configured rate limit
    /// replaces whatever limiter the client carried.
    pub fn with_client(config: CoordinatorConfig, client: SleepmeClient) -> Result<Self, CoreError> {
        config.validate()?;

        let limiter = Arc::new(config.rate_limit.build());
        let client = client.with_rate_limiter(limiter, config.rate_limit.policy);
        let (state, _) = watch::channel(CoordinatorState::Uninitialized);

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                config,
                client,
                store: Arc::new(DeviceStore::new()),
                state,
                last_update_success: AtomicBool::new(false),
                refresh_lock: Mutex::new(()),
                cycles: AtomicU64::new(0),
                last_outcome: StdMutex::new(None),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &SleepmeClient {
        &self.inner.client
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.inner.store
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Discover eligible devices and load their initial state.
    ///
    /// Every device must be fetched successfully; a partial first load
    /// fails the whole setup and leaves the cache empty. Calling this
    /// again after a successful setup is a no-op.
    pub async fn setup(&self) -> Result<(), CoreError> {
        let _guard = self.inner.refresh_lock.lock().await;
        if self.inner.store.is_ready() {
            debug!("coordinator already set up");
            return Ok(());
        }

        let devices = match self.inner.client.list_devices().await {
            Ok(devices) => devices,
            Err(e) if e.is_auth() => return Err(self.halt(&e)),
            Err(e) => return Err(e.into()),
        };
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        info!(count = devices.len(), ?names, "discovered devices");

        let ids: Vec<String> = devices.iter().map(|d| d.id.clone()).collect();
        let results = self.fetch_states(&ids).await;
        if let Some(e) = results.auth_error {
            return Err(self.halt(&e));
        }
        if !results.failed.is_empty() {
            let report = RefreshReport {
                updated: results.states.into_iter().map(|(id, _)| id).collect(),
                failed: results.failed,
            };
            return Err(partial_failure(&report));
        }

        let mut states: HashMap<String, DeviceState> = results.states.into_iter().collect();
        let entries: Vec<CacheEntry> = devices
            .into_iter()
            .filter_map(|device| {
                let state = states.remove(&device.id)?;
                Some(CacheEntry::merge(device, state))
            })
            .collect();

        self.inner.store.install(entries);
        self.inner.last_update_success.store(true, Ordering::Release);
        self.set_state(CoordinatorState::Idle);
        info!(devices = self.inner.store.len(), "coordinator ready");
        Ok(())
    }

    /// Spawn the periodic refresh loop. Requires a completed setup.
    ///
    /// Does nothing when the poll interval is zero, the loop is already
    /// running, or the coordinator has been shut down.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.ensure_ready()?;
        if self.inner.cancel.is_cancelled() {
            debug!("coordinator shut down, background refresh not restarted");
            return Ok(());
        }

        let interval = self.inner.config.poll_interval;
        if interval.is_zero() {
            debug!("poll interval is zero, background refresh disabled");
            return Ok(());
        }

        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return Ok(());
        }
        let coordinator = self.clone();
        let cancel = self.inner.cancel.clone();
        handles.push(tokio::spawn(refresh_task(coordinator, interval, cancel)));
        info!(interval_secs = interval.as_secs_f64(), "background refresh started");
        Ok(())
    }

    /// Stop the background loop and wait for it to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("coordinator shut down");
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Run one refresh cycle now.
    ///
    /// If a cycle is already in flight this waits for it and returns its
    /// outcome instead of starting another.
    pub async fn refresh(&self) -> Result<RefreshReport, CoreError> {
        if let Some(message) = self.halted_reason() {
            return Err(CoreError::ReauthRequired { message });
        }
        self.ensure_ready()?;

        let seen = self.inner.cycles.load(Ordering::Acquire);
        let _guard = match self.inner.refresh_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("refresh already in flight, waiting for it");
                let guard = self.inner.refresh_lock.lock().await;
                if self.inner.cycles.load(Ordering::Acquire) != seen {
                    if let Some(outcome) = self.last_outcome() {
                        return outcome.to_result();
                    }
                }
                guard
            }
        };

        let outcome = self.run_cycle().await;
        *self
            .inner
            .last_outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(outcome.clone());
        self.inner.cycles.fetch_add(1, Ordering::AcqRel);
        outcome.to_result()
    }

    async fn run_cycle(&self) -> CycleOutcome {
        if let Some(message) = self.halted_reason() {
            return CycleOutcome::Halted(message);
        }
        self.set_state(CoordinatorState::Fetching);
        let _fetching = FetchingGuard { coordinator: self };

        let ids = self.inner.store.device_ids();
        let results = self.fetch_states(&ids).await;

        if let Some(e) = results.auth_error {
            let message = self.halt(&e).to_string();
            return CycleOutcome::Halted(message);
        }

        let updated: Vec<String> = results.states.iter().map(|(id, _)| id.clone()).collect();
        self.inner.store.apply_states(results.states);

        let report = RefreshReport {
            updated,
            failed: results.failed,
        };
        let complete = report.is_complete();
        self.inner
            .last_update_success
            .store(complete, Ordering::Release);
        self.set_state(CoordinatorState::Idle);

        if complete {
            debug!(devices = report.updated.len(), "refresh complete");
            CycleOutcome::Complete(report)
        } else {
            warn!(
                updated = report.updated.len(),
                failed = report.failed.len(),
                "refresh incomplete"
            );
            CycleOutcome::Partial(report)
        }
    }

    /// Fetch every listed device with bounded concurrency inside the
    /// cycle timeout. Stops early on the first authentication failure.
    async fn fetch_states(&self, ids: &[String]) -> FetchResults {
        let client = &self.inner.client;
        let width = self.inner.config.max_concurrent_fetches.max(1);
        let mut results = FetchResults {
            states: Vec::with_capacity(ids.len()),
            failed: Vec::new(),
            auth_error: None,
        };

        let mut fetches = stream::iter(ids.iter().cloned())
            .map(|id| async move {
                let result = client.get_device_state(&id).await;
                (id, result)
            })
            .buffer_unordered(width);

        let collect = async {
            while let Some((id, result)) = fetches.next().await {
                match result {
                    Ok(state) => results.states.push((id, state)),
                    Err(e) if e.is_auth() => {
                        results.auth_error = Some(e);
                        break;
                    }
                    Err(e) => {
                        error!(device_id = %id, error = %e, kind = %e.kind(), "device fetch failed");
                        results.failed.push(DeviceFailure {
                            device_id: id,
                            kind: e.kind(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        };

        let budget = self.inner.config.cycle_timeout;
        if tokio::time::timeout(budget, collect).await.is_err() {
            let pending: Vec<String> = ids
                .iter()
                .filter(|id| {
                    !results.states.iter().any(|(done, _)| done == *id)
                        && !results.failed.iter().any(|f| &f.device_id == *id)
                })
                .cloned()
                .collect();
            error!(pending = pending.len(), "refresh cycle timed out");
            results
                .failed
                .extend(pending.into_iter().map(|device_id| DeviceFailure {
                    device_id,
                    kind: ErrorKind::Communication,
                    message: format!("cycle timed out after {}", format_duration(budget)),
                }));
        }

        results
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Set the target temperature in whole degrees Fahrenheit.
    ///
    /// On success the cache holds the control record the server returned
    /// and subscribers are notified once. On failure the cache is
    /// untouched. Allowed while halted; a rejected key surfaces as an
    /// authentication error without halting.
    pub async fn set_temperature(
        &self,
        device_id: &str,
        fahrenheit: i32,
    ) -> Result<Arc<CacheEntry>, CoreError> {
        self.ensure_known(device_id)?;
        if !model::is_valid_target_f(fahrenheit) {
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "target {fahrenheit}°F is outside {MIN_TEMPERATURE_F}..={MAX_TEMPERATURE_F}°F"
                ),
            });
        }

        let control = self
            .inner
            .client
            .set_temperature(device_id, fahrenheit)
            .await?;
        info!(device_id, fahrenheit, "target temperature set");
        self.write_control(device_id, control)
    }

    /// Switch the device between active and standby.
    pub async fn set_mode(
        &self,
        device_id: &str,
        mode: ThermalMode,
    ) -> Result<Arc<CacheEntry>, CoreError> {
        self.ensure_known(device_id)?;

        let control = self.inner.client.set_mode(device_id, mode).await?;
        info!(device_id, %mode, "thermal mode set");
        self.write_control(device_id, control)
    }

    fn write_control(
        &self,
        device_id: &str,
        control: sleepme_api::DeviceControl,
    ) -> Result<Arc<CacheEntry>, CoreError> {
        self.inner
            .store
            .apply_control(device_id, control)
            .ok_or_else(|| CoreError::DeviceNotFound {
                device_id: device_id.to_owned(),
            })
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to lifecycle state changes.
    pub fn state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    /// Whether the most recent cycle fetched every device.
    pub fn last_update_success(&self) -> bool {
        self.inner.last_update_success.load(Ordering::Acquire)
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.store.last_refresh()
    }

    /// Subscribe to cache changes. Dropping the stream unsubscribes.
    pub fn subscribe(&self) -> StateStream {
        self.inner.store.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.store.snapshot()
    }

    pub fn cached_state(&self, device_id: &str) -> Option<Arc<CacheEntry>> {
        self.inner.store.get(device_id)
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn ensure_ready(&self) -> Result<(), CoreError> {
        if self.inner.store.is_ready() {
            Ok(())
        } else {
            Err(CoreError::NotReady)
        }
    }

    fn ensure_known(&self, device_id: &str) -> Result<(), CoreError> {
        self.ensure_ready()?;
        if self.inner.store.contains(device_id) {
            Ok(())
        } else {
            Err(CoreError::DeviceNotFound {
                device_id: device_id.to_owned(),
            })
        }
    }

    fn set_state(&self, state: CoordinatorState) {
        self.inner.state.send_modify(|s| *s = state);
    }

    /// Enter the halted state and build the error callers receive.
    fn halt(&self, cause: &sleepme_api::Error) -> CoreError {
        error!(error = %cause, "credential rejected, halting refresh");
        let message = cause.to_string();
        self.inner
            .last_update_success
            .store(false, Ordering::Release);
        *self
            .inner
            .last_outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(CycleOutcome::Halted(message.clone()));
        self.set_state(CoordinatorState::Halted);
        CoreError::ReauthRequired { message }
    }

    fn halted_reason(&self) -> Option<String> {
        if self.current_state() != CoordinatorState::Halted {
            return None;
        }
        Some(
            self.last_outcome()
                .and_then(|o| match o {
                    CycleOutcome::Halted(message) => Some(message),
                    _ => None,
                })
                .unwrap_or_else(|| "credential rejected".into()),
        )
    }

    fn last_outcome(&self) -> Option<CycleOutcome> {
        self.inner
            .last_outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Returns the coordinator to `Idle` if a cycle is dropped mid-fetch.
///
/// Finished cycles have already left `Fetching` when this drops, so it
/// only acts on abandoned ones.
struct FetchingGuard<'a> {
    coordinator: &'a Coordinator,
}

impl Drop for FetchingGuard<'_> {
    fn drop(&mut self) {
        if self.coordinator.current_state() == CoordinatorState::Fetching {
            warn!("refresh cycle abandoned before completion");
            self.coordinator
                .inner
                .last_update_success
                .store(false, Ordering::Release);
            self.coordinator.set_state(CoordinatorState::Idle);
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Periodically refresh every device until cancelled or halted.
async fn refresh_task(coordinator: Coordinator, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match coordinator.refresh().await {
                    Ok(_) => {}
                    Err(CoreError::ReauthRequired { .. }) => {
                        warn!("background refresh stopped, re-authentication required");
                        break;
                    }
                    Err(e) => warn!(error = %e, "periodic refresh failed"),
                }
            }
        }
    }
}

fn format_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}
