//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use schoolsync_protocol::{
    FileDiffResponse, FileListResponse, FileManifestRequest, PullResponse, PushRequest,
    PushResponse, SnapshotPushRequest, SnapshotResponse,
};
use std::collections::{BTreeMap, VecDeque};

/// A sync transport handles network communication with the sync server.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, mock for testing, etc.). Every call blocks until
/// the server answers or the request times out.
pub trait SyncTransport: Send + Sync {
    /// Uploads a batch of outbox entries.
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;

    /// Fetches up to `limit` events after `since_id`.
    fn pull(&self, since_id: i64, limit: usize) -> SyncResult<PullResponse>;

    /// Downloads a full snapshot.
    fn fetch_snapshot(&self, compressed: bool) -> SyncResult<SnapshotResponse>;

    /// Uploads a seed snapshot.
    fn push_snapshot(&self, request: &SnapshotPushRequest) -> SyncResult<()>;

    /// Sends the local asset manifest, returns the paths the server lacks.
    fn files_diff(&self, request: &FileManifestRequest) -> SyncResult<FileDiffResponse>;

    /// Fetches the server's asset manifest.
    fn files_list(&self) -> SyncResult<FileListResponse>;

    /// Uploads one asset.
    fn upload_file(&self, rel_path: &str, contents: Vec<u8>) -> SyncResult<()>;

    /// Downloads one asset.
    fn download_file(&self, rel_path: &str) -> SyncResult<Vec<u8>>;
}

/// Request recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedRequest {
    /// Push batch.
    Push(PushRequest),
    /// Pull request.
    Pull {
        /// Cursor sent.
        since_id: i64,
        /// Batch limit sent.
        limit: usize,
    },
    /// Snapshot download.
    FetchSnapshot {
        /// Whether the gzip variant was requested.
        compressed: bool,
    },
    /// Seed snapshot upload.
    PushSnapshot(SnapshotPushRequest),
    /// Manifest diff.
    FilesDiff(FileManifestRequest),
    /// Server manifest.
    FilesList,
    /// Asset upload.
    Upload {
        /// Relative asset path.
        rel_path: String,
        /// Uploaded size.
        len: usize,
    },
    /// Asset download.
    Download {
        /// Relative asset path.
        rel_path: String,
    },
}

#[derive(Debug, Default)]
struct MockState {
    push: VecDeque<SyncResult<PushResponse>>,
    pull: VecDeque<SyncResult<PullResponse>>,
    snapshot: VecDeque<SyncResult<SnapshotResponse>>,
    push_snapshot: VecDeque<SyncResult<()>>,
    diff: VecDeque<SyncResult<FileDiffResponse>>,
    list: VecDeque<SyncResult<FileListResponse>>,
    downloads: BTreeMap<String, Vec<u8>>,
    failing_uploads: Vec<String>,
    requests: Vec<RecordedRequest>,
}

/// A mock transport for testing.
///
/// Responses are scripted per operation and consumed in order. When a
/// queue runs dry the operation falls back to an empty success (pull,
/// push, diff, list) or to a protocol error (snapshot). Every call is
/// recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a push result.
    pub fn queue_push(&self, result: SyncResult<PushResponse>) {
        self.state.lock().push.push_back(result);
    }

    /// Queues a pull result.
    pub fn queue_pull(&self, result: SyncResult<PullResponse>) {
        self.state.lock().pull.push_back(result);
    }

    /// Queues a snapshot result.
    pub fn queue_snapshot(&self, result: SyncResult<SnapshotResponse>) {
        self.state.lock().snapshot.push_back(result);
    }

    /// Queues a seed snapshot upload result.
    pub fn queue_push_snapshot(&self, result: SyncResult<()>) {
        self.state.lock().push_snapshot.push_back(result);
    }

    /// Queues a manifest diff result.
    pub fn queue_files_diff(&self, result: SyncResult<FileDiffResponse>) {
        self.state.lock().diff.push_back(result);
    }

    /// Queues a server manifest result.
    pub fn queue_files_list(&self, result: SyncResult<FileListResponse>) {
        self.state.lock().list.push_back(result);
    }

    /// Serves `contents` for downloads of `rel_path`.
    pub fn serve_file(&self, rel_path: impl Into<String>, contents: Vec<u8>) {
        self.state.lock().downloads.insert(rel_path.into(), contents);
    }

    /// Makes uploads of `rel_path` fail.
    pub fn fail_upload(&self, rel_path: impl Into<String>) {
        self.state.lock().failing_uploads.push(rel_path.into());
    }

    /// Returns all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Returns the recorded push batches.
    pub fn pushed(&self) -> Vec<PushRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter_map(|r| match r {
                RecordedRequest::Push(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    /// Counts recorded snapshot downloads.
    pub fn snapshot_requests(&self) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| matches!(r, RecordedRequest::FetchSnapshot { .. }))
            .count()
    }

    fn record(&self, request: RecordedRequest) {
        self.state.lock().requests.push(request);
    }
}

impl SyncTransport for MockTransport {
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.record(RecordedRequest::Push(request.clone()));
        self.state
            .lock()
            .push
            .pop_front()
            .unwrap_or_else(|| Ok(PushResponse::default()))
    }

    fn pull(&self, since_id: i64, limit: usize) -> SyncResult<PullResponse> {
        self.record(RecordedRequest::Pull { since_id, limit });
        self.state
            .lock()
            .pull
            .pop_front()
            .unwrap_or_else(|| Ok(PullResponse::new(Vec::new(), Some(since_id))))
    }

    fn fetch_snapshot(&self, compressed: bool) -> SyncResult<SnapshotResponse> {
        self.record(RecordedRequest::FetchSnapshot { compressed });
        self.state
            .lock()
            .snapshot
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Protocol("no mock snapshot response set".into())))
    }

    fn push_snapshot(&self, request: &SnapshotPushRequest) -> SyncResult<()> {
        self.record(RecordedRequest::PushSnapshot(request.clone()));
        self.state
            .lock()
            .push_snapshot
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn files_diff(&self, request: &FileManifestRequest) -> SyncResult<FileDiffResponse> {
        self.record(RecordedRequest::FilesDiff(request.clone()));
        self.state
            .lock()
            .diff
            .pop_front()
            .unwrap_or_else(|| Ok(FileDiffResponse::default()))
    }

    fn files_list(&self) -> SyncResult<FileListResponse> {
        self.record(RecordedRequest::FilesList);
        self.state
            .lock()
            .list
            .pop_front()
            .unwrap_or_else(|| Ok(FileListResponse::default()))
    }

    fn upload_file(&self, rel_path: &str, contents: Vec<u8>) -> SyncResult<()> {
        self.record(RecordedRequest::Upload {
            rel_path: rel_path.to_string(),
            len: contents.len(),
        });
        if self.state.lock().failing_uploads.iter().any(|p| p == rel_path) {
            return Err(SyncError::transport_retryable(format!(
                "upload of {rel_path} refused"
            )));
        }
        Ok(())
    }

    fn download_file(&self, rel_path: &str) -> SyncResult<Vec<u8>> {
        self.record(RecordedRequest::Download {
            rel_path: rel_path.to_string(),
        });
        self.state
            .lock()
            .downloads
            .get(rel_path)
            .cloned()
            .ok_or_else(|| SyncError::Server {
                status: 404,
                body: format!("{rel_path} not found"),
            })
    }
}
