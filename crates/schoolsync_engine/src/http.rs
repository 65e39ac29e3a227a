//! HTTP transport implementation.
//!
//! This module provides the HTTP-based transport for the sync agent.
//! The actual HTTP client is abstracted via a trait so tests can capture
//! requests without a network; [`ReqwestClient`] is the production client.

use crate::config::{Credentials, Endpoints, SyncAgentConfig, Timeouts};
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use flate2::read::GzDecoder;
use parking_lot::RwLock;
use schoolsync_protocol::{
    FileDiffResponse, FileListResponse, FileManifestRequest, PullResponse, PushRequest,
    PushResponse, SnapshotPushRequest, SnapshotResponse,
};
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// Longest response body excerpt kept in errors.
const ERROR_BODY_LIMIT: usize = 300;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
}

/// A file sent as `multipart/form-data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    /// File name reported in the `file` part.
    pub file_name: String,
    /// MIME type of the `file` part.
    pub mime: &'static str,
    /// File contents.
    pub contents: Vec<u8>,
    /// Additional text parts.
    pub fields: Vec<(String, String)>,
}

/// Request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpBody {
    /// No body.
    Empty,
    /// JSON document.
    Json(Vec<u8>),
    /// Multipart file upload.
    Multipart(MultipartFile),
}

/// A fully described HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL without query.
    pub url: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Body.
    pub body: HttpBody,
    /// Total request timeout.
    pub timeout: Duration,
}

/// Raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Errors are
/// connection-level failures (refused, timed out, TLS); any status code
/// is a successful exchange.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// HTTP-based sync transport.
///
/// Uses JSON request/response bodies. Every request carries the API key
/// (as both `api_key` and `api-key` headers) and the tenant id.
pub struct HttpTransport<C: HttpClient> {
    endpoints: Endpoints,
    tenant_id: Option<String>,
    api_key: Option<String>,
    timeouts: Timeouts,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport for the configured server.
    pub fn new(config: &SyncAgentConfig, client: C) -> Self {
        Self {
            endpoints: config.endpoints(),
            tenant_id: config.tenant_id.clone(),
            api_key: config.api_key.clone(),
            timeouts: config.timeouts,
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the endpoints in use.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    fn credentials(&self) -> SyncResult<Credentials> {
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

    fn request(
        &self,
        method: HttpMethod,
        url: &str,
        credentials: &Credentials,
        body: HttpBody,
        timeout: Duration,
    ) -> HttpRequest {
        HttpRequest {
            method,
            url: url.to_string(),
            query: Vec::new(),
            headers: vec![
                ("api_key".to_string(), credentials.api_key.clone()),
                ("api-key".to_string(), credentials.api_key.clone()),
                ("x-tenant-id".to_string(), credentials.tenant_id.clone()),
            ],
            body,
            timeout,
        }
    }

    fn execute(&self, request: HttpRequest) -> SyncResult<Vec<u8>> {
        debug!(url = %request.url, method = ?request.method, "http request");
        let response = self.client.send(request).map_err(|e| {
            self.set_error(&e);
            SyncError::transport_retryable(e)
        })?;

        if !response.is_success() {
            let body = excerpt(&response.body);
            self.set_error(&format!("status {}: {body}", response.status));
            return Err(SyncError::Server {
                status: response.status,
                body,
            });
        }

        self.clear_error();
        Ok(response.body)
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        let url = self.endpoints.push()?;
        let credentials = self.credentials()?;
        let body = request.encode()?;
        let req = self.request(
            HttpMethod::Post,
            url,
            &credentials,
            HttpBody::Json(body),
            self.timeouts.metadata,
        );
        let response = self.execute(req)?;
        Ok(PushResponse::decode_lenient(&response).unwrap_or_default())
    }

    fn pull(&self, since_id: i64, limit: usize) -> SyncResult<PullResponse> {
        let url = self.endpoints.pull()?;
        let credentials = self.credentials()?;
        let mut req = self.request(
            HttpMethod::Get,
            url,
            &credentials,
            HttpBody::Empty,
            self.timeouts.metadata,
        );
        req.query = vec![
            ("tenant_id".to_string(), credentials.tenant_id.clone()),
            ("since_id".to_string(), since_id.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        let response = self.execute(req)?;
        Ok(PullResponse::decode(&response)?)
    }

    fn fetch_snapshot(&self, compressed: bool) -> SyncResult<SnapshotResponse> {
        let url = if compressed {
            self.endpoints.snapshot_compressed()?
        } else {
            self.endpoints.snapshot()?
        };
        let credentials = self.credentials()?;
        let mut req = self.request(
            HttpMethod::Get,
            url,
            &credentials,
            HttpBody::Empty,
            self.timeouts.snapshot_pull,
        );
        req.query = vec![
            ("tenant_id".to_string(), credentials.tenant_id.clone()),
            ("api_key".to_string(), credentials.api_key.clone()),
        ];
        let response = self.execute(req)?;
        let body = if compressed {
            gunzip(&response)?
        } else {
            response
        };
        Ok(SnapshotResponse::decode(&body)?)
    }

    fn push_snapshot(&self, request: &SnapshotPushRequest) -> SyncResult<()> {
        let url = self.endpoints.snapshot()?;
        let credentials = self.credentials()?;
        let req = self.request(
            HttpMethod::Post,
            url,
            &credentials,
            HttpBody::Json(request.encode()?),
            self.timeouts.snapshot_push,
        );
        self.execute(req)?;
        Ok(())
    }

    fn files_diff(&self, request: &FileManifestRequest) -> SyncResult<FileDiffResponse> {
        let url = self.endpoints.files_manifest()?;
        let credentials = self.credentials()?;
        let req = self.request(
            HttpMethod::Post,
            &url,
            &credentials,
            HttpBody::Json(request.encode()?),
            self.timeouts.asset_transfer,
        );
        let response = self.execute(req)?;
        Ok(FileDiffResponse::decode(&response)?)
    }

    fn files_list(&self) -> SyncResult<FileListResponse> {
        let url = self.endpoints.files_list()?;
        let credentials = self.credentials()?;
        let req = self.request(
            HttpMethod::Get,
            &url,
            &credentials,
            HttpBody::Empty,
            self.timeouts.asset_transfer,
        );
        let response = self.execute(req)?;
        Ok(FileListResponse::decode(&response)?)
    }

    fn upload_file(&self, rel_path: &str, contents: Vec<u8>) -> SyncResult<()> {
        let url = self.endpoints.files_upload()?;
        let credentials = self.credentials()?;
        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path).to_string();
        let upload = MultipartFile {
            mime: mime_for(&file_name),
            file_name,
            contents,
            fields: vec![("rel_path".to_string(), rel_path.to_string())],
        };
        let req = self.request(
            HttpMethod::Post,
            &url,
            &credentials,
            HttpBody::Multipart(upload),
            self.timeouts.asset_transfer,
        );
        self.execute(req)?;
        Ok(())
    }

    fn download_file(&self, rel_path: &str) -> SyncResult<Vec<u8>> {
        let url = self.endpoints.files_download()?;
        let credentials = self.credentials()?;
        let mut req = self.request(
            HttpMethod::Get,
            &url,
            &credentials,
            HttpBody::Empty,
            self.timeouts.asset_transfer,
        );
        req.query = vec![("path".to_string(), rel_path.to_string())];
        self.execute(req)
    }
}

/// Production HTTP client backed by `reqwest`'s blocking API.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client.
    pub fn new() -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("schoolsync-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::transport_fatal(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        }
        .timeout(request.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            HttpBody::Empty => builder,
            HttpBody::Json(bytes) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(bytes),
            HttpBody::Multipart(upload) => {
                let part = reqwest::blocking::multipart::Part::bytes(upload.contents)
                    .file_name(upload.file_name)
                    .mime_str(upload.mime)
                    .map_err(|e| e.to_string())?;
                let mut form = reqwest::blocking::multipart::Form::new().part("file", part);
                for (name, value) in upload.fields {
                    form = form.text(name, value);
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

/// Decompresses a gzip body; bodies without the gzip magic pass through.
fn gunzip(bytes: &[u8]) -> SyncResult<Vec<u8>> {
    if !bytes.starts_with(&[0x1f, 0x8b]) {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| SyncError::Protocol(format!("invalid gzip snapshot: {e}")))?;
    Ok(out)
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut out: String = text.chars().take(ERROR_BODY_LIMIT).collect();
    if text.chars().count() > ERROR_BODY_LIMIT {
        out.push_str("...");
    }
    out
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}
