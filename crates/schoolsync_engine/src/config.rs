//! Configuration for the sync agent.
//!
//! Built once at start-up (from the kiosk's `config.json` plus command-line
//! overrides) and passed by reference to every stage.

use crate::error::{SyncError, SyncResult};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default number of outbox entries per push.
pub const DEFAULT_PUSH_BATCH_SIZE: usize = 200;
/// Default number of events per pull request.
pub const DEFAULT_PULL_BATCH_SIZE: usize = 500;
/// Default number of pull requests per cycle.
pub const DEFAULT_MAX_PULL_BATCHES: usize = 20;
/// Default delay between cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Shortest accepted delay between cycles.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Upper bound of the failure backoff.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(300);
/// Default period of asset reconciliation.
pub const DEFAULT_ASSET_INTERVAL: Duration = Duration::from_secs(600);
/// Database file name inside a shared folder.
pub const DB_FILE_NAME: &str = "school_points.db";

const PUSH_SUFFIX: &str = "/sync/push";

/// Server endpoints derived from the configured URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    push: Option<String>,
    pull: Option<String>,
    snapshot: Option<String>,
    snapshot_compressed: Option<String>,
    files_base: Option<String>,
}

impl Endpoints {
    /// Derives all endpoints from a push URL and optional overrides.
    ///
    /// A push URL ending in `/sync/push` yields the sibling `/sync/pull`,
    /// `/sync/snapshot`, `/sync/snapshot2` and `/sync/files` endpoints.
    /// Any other push URL only yields a files base of `<push>/files`.
    /// Explicit overrides always win.
    pub fn derive(push: Option<&str>, pull: Option<&str>, snapshot: Option<&str>) -> Self {
        let push = non_empty(push);
        let root = push
            .as_deref()
            .and_then(|p| p.strip_suffix(PUSH_SUFFIX))
            .map(str::to_string);

        let pull = non_empty(pull).or_else(|| root.as_ref().map(|r| format!("{r}/sync/pull")));
        let snapshot = non_empty(snapshot)
            .or_else(|| root.as_ref().map(|r| format!("{r}/sync/snapshot")));
        let snapshot_compressed = match snapshot.as_deref() {
            Some(s) if s.ends_with("/snapshot") => Some(format!("{s}2")),
            _ => root.as_ref().map(|r| format!("{r}/sync/snapshot2")),
        };
        let files_base = match (&root, &push) {
            (Some(r), _) => Some(format!("{r}/sync/files")),
            (None, Some(p)) => Some(format!("{}/files", p.trim_end_matches('/'))),
            (None, None) => None,
        };

        Self {
            push,
            pull,
            snapshot,
            snapshot_compressed,
            files_base,
        }
    }

    /// Push endpoint.
    pub fn push(&self) -> SyncResult<&str> {
        self.push.as_deref().ok_or_else(|| SyncError::missing("push_url"))
    }

    /// Pull endpoint.
    pub fn pull(&self) -> SyncResult<&str> {
        self.pull.as_deref().ok_or_else(|| SyncError::missing("pull_url"))
    }

    /// Snapshot endpoint (JSON variant).
    pub fn snapshot(&self) -> SyncResult<&str> {
        self.snapshot
            .as_deref()
            .ok_or_else(|| SyncError::missing("snapshot_url"))
    }

    /// Snapshot endpoint (gzip variant).
    pub fn snapshot_compressed(&self) -> SyncResult<&str> {
        self.snapshot_compressed
            .as_deref()
            .ok_or_else(|| SyncError::missing("snapshot_url"))
    }

    /// Manifest diff endpoint.
    pub fn files_manifest(&self) -> SyncResult<String> {
        self.files("manifest")
    }

    /// Multipart upload endpoint.
    pub fn files_upload(&self) -> SyncResult<String> {
        self.files("upload")
    }

    /// Server manifest endpoint.
    pub fn files_list(&self) -> SyncResult<String> {
        self.files("list")
    }

    /// Download endpoint (takes a `path` query parameter).
    pub fn files_download(&self) -> SyncResult<String> {
        self.files("download")
    }

    fn files(&self, leaf: &str) -> SyncResult<String> {
        self.files_base
            .as_deref()
            .map(|base| format!("{base}/{leaf}"))
            .ok_or_else(|| SyncError::missing("push_url"))
    }
}

/// Tenant credentials sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Tenant identifier.
    pub tenant_id: String,
    /// API key.
    pub api_key: String,
}

/// Per-request timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Push and pull requests.
    pub metadata: Duration,
    /// Manual snapshot push.
    pub snapshot_push: Duration,
    /// Snapshot download during bootstrap.
    pub snapshot_pull: Duration,
    /// Asset manifest, upload and download requests.
    pub asset_transfer: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            metadata: Duration::from_secs(10),
            snapshot_push: Duration::from_secs(25),
            snapshot_pull: Duration::from_secs(120),
            asset_transfer: Duration::from_secs(60),
        }
    }
}

/// Asset reconciliation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetConfig {
    /// Whether the stage runs at all.
    pub enabled: bool,
    /// Root directory; defaults to the database file's directory.
    pub root: Option<PathBuf>,
    /// Subdirectories of the root that are reconciled.
    pub directories: Vec<String>,
    /// Minimum time between two reconciliation passes.
    pub interval: Duration,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: None,
            directories: vec!["images".to_string(), "sounds".to_string()],
            interval: DEFAULT_ASSET_INTERVAL,
        }
    }
}

/// Configuration of the sync agent.
#[derive(Debug, Clone)]
pub struct SyncAgentConfig {
    /// Station database file.
    pub db_path: PathBuf,
    /// Push URL; the other endpoints derive from it.
    pub push_url: Option<String>,
    /// Explicit pull URL.
    pub pull_url: Option<String>,
    /// Explicit snapshot URL.
    pub snapshot_url: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Tenant identifier.
    pub tenant_id: Option<String>,
    /// Station identifier; generated and persisted when absent.
    pub station_id: Option<String>,
    /// Delay between cycles.
    pub poll_interval: Duration,
    /// Bootstrap even if already marked done.
    pub force_bootstrap: bool,
    /// Fetch the gzip snapshot variant.
    pub snapshot_compressed: bool,
    /// Outbox entries per push.
    pub push_batch_size: usize,
    /// Events per pull request.
    pub pull_batch_size: usize,
    /// Pull requests per cycle.
    pub max_pull_batches_per_cycle: usize,
    /// Request timeouts.
    pub timeouts: Timeouts,
    /// Asset reconciliation.
    pub assets: AssetConfig,
    /// Upper bound of the failure backoff.
    pub backoff_cap: Duration,
    /// Directory holding the instance lock file; the system temp dir if unset.
    pub lock_dir: Option<PathBuf>,
    /// Extra tables a snapshot never overwrites.
    pub excluded_tables: Vec<String>,
}

impl SyncAgentConfig {
    /// Creates a configuration for the database at `db_path`.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            push_url: None,
            pull_url: None,
            snapshot_url: None,
            api_key: None,
            tenant_id: None,
            station_id: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            force_bootstrap: false,
            snapshot_compressed: false,
            push_batch_size: DEFAULT_PUSH_BATCH_SIZE,
            pull_batch_size: DEFAULT_PULL_BATCH_SIZE,
            max_pull_batches_per_cycle: DEFAULT_MAX_PULL_BATCHES,
            timeouts: Timeouts::default(),
            assets: AssetConfig::default(),
            backoff_cap: DEFAULT_BACKOFF_CAP,
            lock_dir: None,
            excluded_tables: vec!["card_validations".to_string()],
        }
    }

    /// Loads the configuration from a kiosk `config.json`.
    ///
    /// A missing or unreadable file yields defaults. The database defaults
    /// to `school_points.db` next to the config file.
    pub fn load(config_path: &Path) -> Self {
        let base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let map = match std::fs::read_to_string(config_path) {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!(path = %config_path.display(), "config is not a JSON object, using defaults");
                    Map::new()
                }
                Err(err) => {
                    warn!(path = %config_path.display(), error = %err, "config is not valid JSON, using defaults");
                    Map::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(err) => {
                warn!(path = %config_path.display(), error = %err, "config unreadable, using defaults");
                Map::new()
            }
        };
        Self::from_map(&map, &base_dir)
    }

    /// Builds a configuration from parsed `config.json` keys.
    pub fn from_map(map: &Map<String, Value>, base_dir: &Path) -> Self {
        let db_path = match str_value(map, &["db_path"]) {
            Some(path) => PathBuf::from(path),
            None => match str_value(map, &["shared_folder", "network_root"]) {
                Some(shared) => Path::new(&shared).join(DB_FILE_NAME),
                None => base_dir.join(DB_FILE_NAME),
            },
        };

        let mut config = Self::new(db_path);
        config.push_url = str_value(map, &["sync_push_url"]);
        config.pull_url = str_value(map, &["sync_pull_url"]);
        config.snapshot_url = str_value(map, &["sync_snapshot_url"]);
        config.api_key = str_value(map, &["sync_api_key", "api_key", "sync_key"]);
        config.tenant_id = str_value(map, &["sync_tenant_id"]);
        config.station_id = str_value(map, &["sync_station_id"]);
        config.force_bootstrap = bool_value(map, "sync_force_bootstrap").unwrap_or(false);
        config.snapshot_compressed = bool_value(map, "sync_snapshot_compressed").unwrap_or(false);
        if let Some(secs) = u64_value(map, "sync_interval_sec") {
            config = config.with_poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = u64_value(map, "sync_assets_interval_sec") {
            config.assets.interval = Duration::from_secs(secs);
        }
        config
    }

    /// Sets the database path.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Sets the push URL.
    pub fn with_push_url(mut self, url: impl Into<String>) -> Self {
        self.push_url = non_empty_owned(url.into());
        self
    }

    /// Sets an explicit pull URL.
    pub fn with_pull_url(mut self, url: impl Into<String>) -> Self {
        self.pull_url = non_empty_owned(url.into());
        self
    }

    /// Sets an explicit snapshot URL.
    pub fn with_snapshot_url(mut self, url: impl Into<String>) -> Self {
        self.snapshot_url = non_empty_owned(url.into());
        self
    }

    /// Sets tenant and API key.
    pub fn with_credentials(
        mut self,
        tenant_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.tenant_id = non_empty_owned(tenant_id.into());
        self.api_key = non_empty_owned(api_key.into());
        self
    }

    /// Sets the station id.
    pub fn with_station_id(mut self, station_id: impl Into<String>) -> Self {
        self.station_id = non_empty_owned(station_id.into());
        self
    }

    /// Sets the poll interval, clamped to [`MIN_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Sets the force-bootstrap flag.
    pub fn with_force_bootstrap(mut self, force: bool) -> Self {
        self.force_bootstrap = force;
        self
    }

    /// Sets the push batch size.
    pub fn with_push_batch_size(mut self, size: usize) -> Self {
        self.push_batch_size = size;
        self
    }

    /// Sets the pull batch size.
    pub fn with_pull_batch_size(mut self, size: usize) -> Self {
        self.pull_batch_size = size;
        self
    }

    /// Sets the number of pull requests per cycle.
    pub fn with_max_pull_batches(mut self, batches: usize) -> Self {
        self.max_pull_batches_per_cycle = batches.max(1);
        self
    }

    /// Sets the asset configuration.
    pub fn with_assets(mut self, assets: AssetConfig) -> Self {
        self.assets = assets;
        self
    }

    /// Sets the lock directory.
    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }

    /// Derives the server endpoints.
    pub fn endpoints(&self) -> Endpoints {
        Endpoints::derive(
            self.push_url.as_deref(),
            self.pull_url.as_deref(),
            self.snapshot_url.as_deref(),
        )
    }

    /// Returns tenant and API key, or a configuration error naming the gap.
    pub fn credentials(&self) -> SyncResult<Credentials> {
        let tenant_id = self
            .tenant_id
            .clone()
            .ok_or_else(|| SyncError::missing("tenant_id"))?;
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| SyncError::missing("api_key"))?;
        Ok(Credentials { tenant_id, api_key })
    }

    /// Root directory for asset reconciliation.
    pub fn asset_root(&self) -> PathBuf {
        match &self.assets.root {
            Some(root) => root.clone(),
            None => self
                .db_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    /// Backoff policy between cycles.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new(self.poll_interval).with_max_delay(self.backoff_cap)
    }
}

/// Configuration for the delay between cycles.
///
/// The delay grows exponentially with the number of consecutive failed
/// cycles and is capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay after a successful cycle.
    pub initial_delay: Duration,
    /// Maximum delay between cycles.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backed-off delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: DEFAULT_BACKOFF_CAP,
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Disables jitter.
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Calculates the delay after `failures` consecutive failed cycles.
    pub fn delay_for_attempt(&self, failures: u32) -> Duration {
        let max_secs = self.max_delay.as_secs_f64().max(self.initial_delay.as_secs_f64());
        if failures == 0 {
            return self.initial_delay;
        }

        let exponent = i32::try_from(failures).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay_secs = base_delay.min(max_secs);

        if self.add_jitter {
            // Add up to 25% jitter, never beyond the cap
            let jitter = delay_secs * 0.25 * rand_jitter();
            Duration::from_secs_f64((delay_secs + jitter).min(max_secs))
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

/// Time-derived jitter in `[0, 1)` (no external RNG dependency).
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn non_empty_owned(value: String) -> Option<String> {
    non_empty(Some(value.as_str()))
}

fn str_value(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(s)) => non_empty(Some(s.as_str())),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn bool_value(map: &Map<String, Value>, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => Some(matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )),
        _ => None,
    }
}

fn u64_value(map: &Map<String, Value>, key: &str) -> Option<u64> {
    match map.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn endpoints_derive_from_push_url() {
        let e = Endpoints::derive(Some("https://cloud.example/sync/push"), None, None);
        assert_eq!(e.push().unwrap(), "https://cloud.example/sync/push");
        assert_eq!(e.pull().unwrap(), "https://cloud.example/sync/pull");
        assert_eq!(e.snapshot().unwrap(), "https://cloud.example/sync/snapshot");
        assert_eq!(
            e.snapshot_compressed().unwrap(),
            "https://cloud.example/sync/snapshot2"
        );
        assert_eq!(
            e.files_download().unwrap(),
            "https://cloud.example/sync/files/download"
        );
    }

    #[test]
    fn endpoint_overrides_win() {
        let e = Endpoints::derive(
            Some("https://cloud.example/sync/push"),
            Some("https://pull.example/p"),
            Some("https://snap.example/sync/snapshot"),
        );
        assert_eq!(e.pull().unwrap(), "https://pull.example/p");
        assert_eq!(e.snapshot().unwrap(), "https://snap.example/sync/snapshot");
        assert_eq!(
            e.snapshot_compressed().unwrap(),
            "https://snap.example/sync/snapshot2"
        );
    }

    #[test]
    fn nonstandard_push_url_needs_overrides() {
        let e = Endpoints::derive(Some("https://relay.example/ingest/"), None, None);
        assert!(matches!(e.pull(), Err(SyncError::Config(_))));
        assert!(matches!(e.snapshot(), Err(SyncError::Config(_))));
        assert_eq!(
            e.files_manifest().unwrap(),
            "https://relay.example/ingest/files/manifest"
        );
    }

    #[test]
    fn no_push_url_means_no_endpoints() {
        let e = Endpoints::derive(None, None, None);
        assert!(e.push().unwrap_err().to_string().contains("push_url"));
        assert!(e.files_list().is_err());
    }

    #[test]
    fn from_map_reads_known_keys() {
        let config = SyncAgentConfig::from_map(
            &map(json!({
                "sync_push_url": "https://cloud.example/sync/push",
                "api_key": "k-1",
                "sync_tenant_id": "school-7",
                "sync_station_id": "front-desk",
                "sync_interval_sec": "30",
                "sync_force_bootstrap": 1,
                "sync_snapshot_compressed": true,
                "sync_assets_interval_sec": 900,
                "unknown": "ignored"
            })),
            Path::new("/opt/kiosk"),
        );
        assert_eq!(config.db_path, PathBuf::from("/opt/kiosk/school_points.db"));
        assert_eq!(config.api_key.as_deref(), Some("k-1"));
        assert_eq!(config.station_id.as_deref(), Some("front-desk"));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert!(config.force_bootstrap);
        assert!(config.snapshot_compressed);
        assert_eq!(config.assets.interval, Duration::from_secs(900));
        assert_eq!(
            config.credentials().unwrap(),
            Credentials {
                tenant_id: "school-7".into(),
                api_key: "k-1".into()
            }
        );
    }

    #[test]
    fn api_key_prefers_primary_key() {
        let config = SyncAgentConfig::from_map(
            &map(json!({"sync_api_key": "primary", "api_key": "alias", "sync_key": "other"})),
            Path::new("."),
        );
        assert_eq!(config.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn shared_folder_locates_database() {
        let config = SyncAgentConfig::from_map(
            &map(json!({"shared_folder": "/mnt/share"})),
            Path::new("/opt/kiosk"),
        );
        assert_eq!(config.db_path, PathBuf::from("/mnt/share/school_points.db"));

        let config = SyncAgentConfig::from_map(
            &map(json!({"db_path": "/data/x.db", "shared_folder": "/mnt/share"})),
            Path::new("/opt/kiosk"),
        );
        assert_eq!(config.db_path, PathBuf::from("/data/x.db"));
    }

    #[test]
    fn missing_or_broken_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncAgentConfig::load(&dir.path().join("config.json"));
        assert_eq!(config.db_path, dir.path().join(DB_FILE_NAME));
        assert_eq!(config.push_batch_size, DEFAULT_PUSH_BATCH_SIZE);

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = SyncAgentConfig::load(&path);
        assert!(config.push_url.is_none());
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn missing_credentials_name_the_gap() {
        let config = SyncAgentConfig::new("x.db").with_credentials("", "key");
        let err = config.credentials().unwrap_err();
        assert!(err.to_string().contains("tenant_id"));

        let config = SyncAgentConfig::new("x.db").with_credentials("t", " ");
        assert!(config.credentials().unwrap_err().to_string().contains("api_key"));
    }

    #[test]
    fn poll_interval_has_a_floor() {
        let config = SyncAgentConfig::new("x.db").with_poll_interval(Duration::from_secs(1));
        assert_eq!(config.poll_interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn asset_root_defaults_to_database_directory() {
        let config = SyncAgentConfig::new("/srv/kiosk/school_points.db");
        assert_eq!(config.asset_root(), PathBuf::from("/srv/kiosk"));
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(Duration::from_secs(60)).without_jitter();

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(60));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(120));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(240));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(300));
        assert_eq!(config.delay_for_attempt(50), Duration::from_secs(300));
    }

    #[test]
    fn retry_delay_with_jitter_stays_in_bounds() {
        let config = RetryConfig::new(Duration::from_secs(10));
        let delay = config.delay_for_attempt(1);
        assert!(delay >= Duration::from_secs(20));
        assert!(delay <= Duration::from_secs(25));

        let capped = config.delay_for_attempt(10);
        assert!(capped <= DEFAULT_BACKOFF_CAP);
    }
}
