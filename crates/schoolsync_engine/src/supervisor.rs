//! Agent supervisor: the polling loop around the sync stages.

use crate::assets::{reconcile_assets, AssetReport};
use crate::bootstrap::{maybe_bootstrap, push_full_snapshot, BootstrapOptions, BootstrapOutcome};
use crate::config::{RetryConfig, SyncAgentConfig};
use crate::error::{ErrorClass, SyncError, SyncResult};
use crate::lock::InstanceLock;
use crate::pull::{pull_and_apply, PullReport};
use crate::push::{push_pending, PushReport};
use crate::transport::SyncTransport;
use parking_lot::RwLock;
use schoolsync_store::LocalStore;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest single sleep between shutdown checks.
const SLEEP_SLICE: Duration = Duration::from_millis(500);

/// What the agent is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Between cycles.
    Idle,
    /// Downloading and applying a snapshot.
    Bootstrapping,
    /// Pulling remote events.
    Pulling,
    /// Pushing the outbox.
    Pushing,
    /// Reconciling asset files.
    SyncingAssets,
    /// Waiting longer than usual after failed cycles.
    Backoff,
    /// The run loop returned.
    Stopped,
}

impl AgentState {
    /// Returns true while a stage is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AgentState::Bootstrapping
                | AgentState::Pulling
                | AgentState::Pushing
                | AgentState::SyncingAssets
        )
    }
}

/// Cycle stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Snapshot bootstrap.
    Bootstrap,
    /// Pull and apply.
    Pull,
    /// Outbox push.
    Push,
    /// Asset reconciliation.
    Assets,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Bootstrap => "bootstrap",
            Stage::Pull => "pull",
            Stage::Push => "push",
            Stage::Assets => "assets",
        })
    }
}

/// Counters accumulated over the agent's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles run.
    pub cycles: u64,
    /// Cycles where bootstrap, pull or push failed.
    pub failed_cycles: u64,
    /// Failed cycles since the last clean one.
    pub consecutive_failures: u32,
    /// Events received from the server.
    pub events_pulled: u64,
    /// Events merged locally.
    pub events_applied: u64,
    /// Outbox entries acknowledged.
    pub changes_pushed: u64,
    /// Assets uploaded.
    pub assets_uploaded: u64,
    /// Assets downloaded.
    pub assets_downloaded: u64,
    /// End of the last clean cycle.
    pub last_success: Option<Instant>,
    /// Last stage error.
    pub last_error: Option<String>,
}

/// Result of one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Snapshot bootstrap, when one ran.
    pub bootstrap: Option<BootstrapOutcome>,
    /// Pull stage result.
    pub pull: Option<PullReport>,
    /// Push stage result.
    pub push: Option<PushReport>,
    /// Asset stage result, when due.
    pub assets: Option<AssetReport>,
    /// Stages skipped for missing configuration.
    pub skipped: Vec<(Stage, String)>,
    /// Stages that failed.
    pub failures: Vec<(Stage, String)>,
    /// Wall time of the cycle.
    pub duration: Duration,
}

impl CycleReport {
    /// Returns true if no stage failed. Skipped stages do not count.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns true if the data stages (bootstrap, pull, push) succeeded.
    ///
    /// Asset failures do not count; this drives the backoff.
    pub fn sync_succeeded(&self) -> bool {
        self.failures.iter().all(|(stage, _)| *stage == Stage::Assets)
    }
}

/// The station sync agent.
///
/// Owns the store, the transport and, when opened through
/// [`SyncAgent::open`], the instance lock. Each cycle runs bootstrap (until
/// it is no longer needed), pull, push and, when due, asset
/// reconciliation, in that order.
pub struct SyncAgent<T: SyncTransport> {
    config: SyncAgentConfig,
    transport: T,
    store: LocalStore,
    station_id: String,
    retry: RetryConfig,
    state: RwLock<AgentState>,
    stats: RwLock<SyncStats>,
    shutdown: Arc<AtomicBool>,
    bootstrap_pending: bool,
    last_assets: Option<Instant>,
    _lock: Option<InstanceLock>,
}

impl<T: SyncTransport> SyncAgent<T> {
    /// Creates an agent over an already opened store.
    ///
    /// Resolves the station id: the configured one, else the persisted
    /// one, else a fresh UUID that is persisted for next time.
    pub fn new(config: SyncAgentConfig, transport: T, store: LocalStore) -> SyncResult<Self> {
        let station_id = match &config.station_id {
            Some(id) => id.clone(),
            None => store.station_id_or_insert_with(|| uuid::Uuid::new_v4().to_string())?,
        };
        let retry = config.retry();
        Ok(Self {
            config,
            transport,
            store,
            station_id,
            retry,
            state: RwLock::new(AgentState::Idle),
            stats: RwLock::new(SyncStats::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
            bootstrap_pending: true,
            last_assets: None,
            _lock: None,
        })
    }

    /// Takes the instance lock, opens the station database and creates
    /// the agent.
    ///
    /// Fails with [`SyncError::Lock`] if another agent serves the same
    /// database.
    pub fn open(config: SyncAgentConfig, transport: T) -> SyncResult<Self> {
        let lock = InstanceLock::acquire(&config.db_path, config.lock_dir.as_deref())?;
        let store = LocalStore::open(&config.db_path)?;
        let mut agent = Self::new(config, transport, store)?;
        agent._lock = Some(lock);
        info!(
            station_id = %agent.station_id,
            db = %agent.config.db_path.display(),
            interval_secs = agent.config.poll_interval.as_secs(),
            "sync agent started"
        );
        Ok(agent)
    }

    /// Station identity sent with pushes.
    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    /// The local store.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// The configuration.
    pub fn config(&self) -> &SyncAgentConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> AgentState {
        *self.state.read()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Replaces the backoff policy.
    pub fn set_retry(&mut self, retry: RetryConfig) {
        self.retry = retry;
    }

    /// Flag that stops [`SyncAgent::run`] when set from another thread.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn set_state(&self, state: AgentState) {
        *self.state.write() = state;
    }

    fn bootstrap_options(&self, force: bool) -> BootstrapOptions {
        BootstrapOptions {
            force,
            compressed: self.config.snapshot_compressed,
            excluded_tables: self.config.excluded_tables.clone(),
        }
    }

    /// Bootstraps from a snapshot if the station needs one.
    ///
    /// `force` ignores an earlier completed bootstrap; non-empty anchor
    /// tables still prevent it.
    pub fn bootstrap(&mut self, force: bool) -> SyncResult<BootstrapOutcome> {
        self.set_state(AgentState::Bootstrapping);
        let options = self.bootstrap_options(force);
        let result = maybe_bootstrap(&mut self.store, &self.transport, &options);
        self.set_state(AgentState::Idle);
        if result.is_ok() {
            self.bootstrap_pending = false;
        }
        result
    }

    /// Uploads local teachers and students to seed the server.
    pub fn push_full_snapshot(&self) -> SyncResult<(usize, usize)> {
        let credentials = self.config.credentials()?;
        push_full_snapshot(
            &self.store,
            &self.transport,
            &credentials.tenant_id,
            &self.station_id,
        )
    }

    fn assets_due(&self) -> bool {
        self.config.assets.enabled
            && self
                .last_assets
                .map_or(true, |at| at.elapsed() >= self.config.assets.interval)
    }

    /// Runs one cycle. Stage failures are recorded in the report, never
    /// returned.
    pub fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        if self.bootstrap_pending {
            let force = self.config.force_bootstrap;
            match self.bootstrap(force) {
                Ok(outcome) => report.bootstrap = Some(outcome),
                Err(e) => {
                    if e.class() == ErrorClass::Config {
                        // No snapshot source until restart; let pull proceed.
                        self.bootstrap_pending = false;
                    }
                    note(&mut report, Stage::Bootstrap, &e);
                }
            }
        }

        if self.bootstrap_pending {
            // Pulling from scratch would fill the anchors and block the snapshot.
            report
                .skipped
                .push((Stage::Pull, "bootstrap pending".to_string()));
        } else {
            self.set_state(AgentState::Pulling);
            match pull_and_apply(
                &mut self.store,
                &self.transport,
                &self.station_id,
                self.config.pull_batch_size,
                self.config.max_pull_batches_per_cycle,
            ) {
                Ok(pull) => report.pull = Some(pull),
                Err(e) => note(&mut report, Stage::Pull, &e),
            }
        }

        self.set_state(AgentState::Pushing);
        let pushed = self.config.credentials().and_then(|credentials| {
            push_pending(
                &mut self.store,
                &self.transport,
                &credentials.tenant_id,
                &self.station_id,
                self.config.push_batch_size,
            )
        });
        match pushed {
            Ok(push) => report.push = Some(push),
            Err(e) => note(&mut report, Stage::Push, &e),
        }

        if self.assets_due() {
            self.set_state(AgentState::SyncingAssets);
            self.last_assets = Some(Instant::now());
            let root = self.config.asset_root();
            match reconcile_assets(&self.transport, &root, &self.config.assets.directories) {
                Ok(assets) => report.assets = Some(assets),
                Err(e) => note(&mut report, Stage::Assets, &e),
            }
        }

        report.duration = started.elapsed();
        self.record(&report);
        self.set_state(AgentState::Idle);
        report
    }

    fn record(&self, report: &CycleReport) {
        let mut stats = self.stats.write();
        stats.cycles += 1;
        if let Some(pull) = &report.pull {
            stats.events_pulled += pull.received as u64;
            stats.events_applied += pull.applied as u64;
        }
        if let Some(push) = &report.push {
            stats.changes_pushed += push.acknowledged as u64;
        }
        if let Some(assets) = &report.assets {
            stats.assets_uploaded += assets.uploaded as u64;
            stats.assets_downloaded += assets.downloaded as u64;
        }

        if report.sync_succeeded() {
            stats.consecutive_failures = 0;
            stats.last_success = Some(Instant::now());
            stats.last_error = report
                .failures
                .last()
                .map(|(stage, message)| format!("{stage}: {message}"));
        } else {
            stats.failed_cycles += 1;
            stats.consecutive_failures = stats.consecutive_failures.saturating_add(1);
            stats.last_error = report
                .failures
                .last()
                .map(|(stage, message)| format!("{stage}: {message}"));
        }
    }

    /// Delay before the next cycle given the failure streak.
    pub fn next_delay(&self) -> Duration {
        self.retry
            .delay_for_attempt(self.stats.read().consecutive_failures)
    }

    /// Runs cycles until `max_cycles` is reached or shutdown is requested.
    ///
    /// `None` runs until shutdown.
    pub fn run(&mut self, max_cycles: Option<u64>) -> SyncStats {
        let mut completed = 0u64;
        while !self.shutdown.load(Ordering::SeqCst) {
            let report = self.run_cycle();
            completed += 1;
            debug!(
                cycle = completed,
                success = report.is_success(),
                duration_ms = report.duration.as_millis() as u64,
                "cycle finished"
            );
            if max_cycles.is_some_and(|max| completed >= max) {
                break;
            }

            let delay = self.next_delay();
            if self.stats.read().consecutive_failures > 0 {
                self.set_state(AgentState::Backoff);
                info!(delay_secs = delay.as_secs_f64(), "backing off after failed cycle");
            }
            self.sleep(delay);
            self.set_state(AgentState::Idle);
        }
        self.set_state(AgentState::Stopped);
        self.stats()
    }

    fn sleep(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while !self.shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

fn note(report: &mut CycleReport, stage: Stage, error: &SyncError) {
    match error.class() {
        ErrorClass::Config => {
            debug!(%stage, reason = %error, "stage skipped");
            report.skipped.push((stage, error.to_string()));
        }
        ErrorClass::Transport | ErrorClass::Apply | ErrorClass::Lock => {
            warn!(%stage, error = %error, "stage failed");
            report.failures.push((stage, error.to_string()));
        }
    }
}
