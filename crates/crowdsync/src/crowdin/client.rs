//! CrowdIn API v2 client.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::types::{
    Build, CrowdinFile, Directory, DirectoryIndex, DownloadLink, FileProgress, JobStatus,
    PreTranslation, PreTranslationMethod, ReferenceExport, ReferenceKind, Storage,
};
use crate::descriptor::is_within;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpRequest, HttpTransport};
use crate::metadata::{FileMetadata, MetadataSnapshot};
use crate::remote::{
    self, ApiRateLimiter, RateLimitInfo, RemoteClientState, RemoteError, Result,
};
use crate::retry::with_retry;
use crate::sync::{ProgressCallback, SyncProgress, emit};

/// Default CrowdIn API root.
pub const CROWDIN_API_URL: &str = "https://api.crowdin.com/api/v2";

/// Items requested per page; CrowdIn's maximum.
pub(crate) const PAGE_LIMIT: u32 = 500;

/// A pre-translation job request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreTranslationRequest {
    pub language_id: String,
    pub file_ids: Vec<u64>,
    pub method: PreTranslationMethod,
    /// MT engine id; `None` for translation memory.
    pub engine_id: Option<u64>,
}

/// Poll cadence and deadline for long-running jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: StdDuration,
    pub timeout: StdDuration,
}

/// CrowdIn API client.
///
/// Clones share the transport and the quota counter.
#[derive(Clone)]
pub struct CrowdinClient {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    token: String,
    state: RemoteClientState,
    limiter: Option<ApiRateLimiter>,
}

impl CrowdinClient {
    pub fn new(token: &str) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(120))?;
        Ok(Self::new_with_transport(
            CROWDIN_API_URL,
            token,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        api_url: &str,
        token: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            state: RemoteClientState::new(),
            limiter: None,
        }
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: ApiRateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn state(&self) -> &RemoteClientState {
        &self.state
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn authorized(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, self.url(path))
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", self.token))
    }

    /// Current quota, read from the headers of a request for the token's user.
    ///
    /// `None` when CrowdIn does not report one.
    pub async fn quota(&self) -> Result<Option<RateLimitInfo>> {
        remote::read_quota(
            self.transport.as_ref(),
            self.authorized(HttpMethod::Get, "/user"),
        )
        .await
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<Option<Value>> {
        self.state.acquire("CrowdIn", || self.quota()).await?;
        if let Some(limiter) = &self.limiter {
            limiter.wait().await;
        }
        let response = self.transport.send(request.clone()).await?;
        let quota = self.state.observe(&response.headers);

        match response.status {
            s if (200..300).contains(&s) => {
                if response.body.is_empty() {
                    return Ok(Some(Value::Null));
                }
                serde_json::from_slice(&response.body)
                    .map(Some)
                    .map_err(|source| RemoteError::Decode {
                        url: request.url.clone(),
                        source,
                    })
            }
            404 => Ok(None),
            _ => match remote::quota_rejection(&response, quota.as_ref()) {
                Some(reset_at) => Err(RemoteError::RateLimited { reset_at }),
                None => Err(remote::error_for_status(&response)),
            },
        }
    }

    /// Send with quota and transient retries; returns the whole JSON body.
    async fn execute(&self, request: HttpRequest) -> Result<Option<Value>> {
        let label = format!("{} {}", request.method.as_str(), request.url);
        let request = &request;
        remote::send_with_quota(&self.state, &label, || self.send_once(request)).await
    }

    /// JSON request returning the `data` member of the envelope.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        let request = self.authorized(method, path);
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };
        Ok(self
            .execute(request)
            .await?
            .map(|mut envelope| envelope.get_mut("data").map(Value::take).unwrap_or(envelope)))
    }

    fn decode<T: DeserializeOwned>(&self, path: &str, value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|source| RemoteError::Decode {
            url: self.url(path),
            source,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.request(HttpMethod::Get, path, None).await? {
            Some(value) => self.decode(path, value).map(Some),
            None => Ok(None),
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &Value,
    ) -> Result<T> {
        match self.request(method, path, Some(body)).await? {
            Some(value) => self.decode(path, value),
            None => Err(RemoteError::api(404, format!("{path} not found"))),
        }
    }

    /// Every item of an offset/limit listing, unwrapped from its envelope.
    pub async fn request_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut offset = 0;
        loop {
            let page_path = remote::pagination::with_query(
                &remote::pagination::with_query(path, "limit", PAGE_LIMIT),
                "offset",
                offset,
            );
            let Some(Value::Array(page)) =
                self.request(HttpMethod::Get, &page_path, None).await?
            else {
                break;
            };
            let received = page.len();
            for mut item in page {
                let item = item.get_mut("data").map(Value::take).unwrap_or(item);
                items.push(self.decode(&page_path, item)?);
            }
            match remote::pagination::next_offset(received, offset, PAGE_LIMIT) {
                Some(next) => offset = next,
                None => break,
            }
        }
        Ok(items)
    }

    pub async fn list_files(&self, project_id: u64) -> Result<Vec<CrowdinFile>> {
        self.request_all(&format!("/projects/{project_id}/files"))
            .await
    }

    pub async fn list_directories(&self, project_id: u64) -> Result<Vec<Directory>> {
        self.request_all(&format!("/projects/{project_id}/directories"))
            .await
    }

    pub async fn create_directory(
        &self,
        project_id: u64,
        name: &str,
        parent: Option<u64>,
    ) -> Result<Directory> {
        let mut payload = json!({ "name": name });
        if let Some(parent) = parent {
            payload["directoryId"] = json!(parent);
        }
        self.send_json(
            HttpMethod::Post,
            &format!("/projects/{project_id}/directories"),
            &payload,
        )
        .await
    }

    /// Resolve a remote directory path, creating missing segments in order.
    ///
    /// An empty path is the project root (`None`).
    pub async fn ensure_directory(
        &self,
        project_id: u64,
        index: &mut DirectoryIndex,
        path: &str,
    ) -> Result<Option<u64>> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Ok(None);
        }
        if let Some(id) = index.get(path) {
            return Ok(Some(id));
        }

        let mut parent = None;
        let mut prefix = String::new();
        for segment in path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            parent = match index.get(&prefix) {
                Some(id) => Some(id),
                None => {
                    tracing::info!(directory = %prefix, "Creating CrowdIn directory");
                    let created = self.create_directory(project_id, segment, parent).await?;
                    index.insert(&prefix, created.id);
                    Some(created.id)
                }
            };
        }
        Ok(parent)
    }

    /// Upload raw content to temporary storage.
    pub async fn add_storage(&self, file_name: &str, content: Vec<u8>) -> Result<Storage> {
        let encoded: String = url::form_urlencoded::byte_serialize(file_name.as_bytes()).collect();
        let request = self
            .authorized(HttpMethod::Post, "/storages")
            .header("Content-Type", "application/octet-stream")
            .header("Crowdin-API-FileName", encoded)
            .body(content);
        let value = self
            .execute(request)
            .await?
            .ok_or_else(|| RemoteError::api(404, "storage endpoint not found"))?;
        let data = value.get("data").cloned().unwrap_or(value);
        self.decode("/storages", data)
    }

    /// Replace a file's content, keeping its translations and approvals.
    pub async fn update_file(
        &self,
        project_id: u64,
        file_id: u64,
        storage_id: u64,
    ) -> Result<CrowdinFile> {
        self.send_json(
            HttpMethod::Put,
            &format!("/projects/{project_id}/files/{file_id}"),
            &json!({
                "storageId": storage_id,
                "updateOption": "keep_translations_and_approvals",
            }),
        )
        .await
    }

    pub async fn create_file(
        &self,
        project_id: u64,
        storage_id: u64,
        name: &str,
        directory_id: Option<u64>,
        export_pattern: &str,
    ) -> Result<CrowdinFile> {
        let mut payload = json!({
            "storageId": storage_id,
            "name": name,
            "exportOptions": { "exportPattern": export_pattern },
        });
        if let Some(directory_id) = directory_id {
            payload["directoryId"] = json!(directory_id);
        }
        self.send_json(
            HttpMethod::Post,
            &format!("/projects/{project_id}/files"),
            &payload,
        )
        .await
    }

    pub async fn delete_file(&self, project_id: u64, file_id: u64) -> Result<()> {
        self.request(
            HttpMethod::Delete,
            &format!("/projects/{project_id}/files/{file_id}"),
            None,
        )
        .await
        .map(drop)
    }

    pub async fn language_progress(
        &self,
        project_id: u64,
        language: &str,
    ) -> Result<Vec<FileProgress>> {
        self.request_all(&format!(
            "/projects/{project_id}/languages/{language}/progress"
        ))
        .await
    }

    /// Metadata for every remote file under `dest_folder`, keyed by path.
    pub async fn project_metadata(
        &self,
        project_id: u64,
        language: &str,
        dest_folder: &str,
    ) -> Result<MetadataSnapshot> {
        let files = self.list_files(project_id).await?;
        let progress = self.language_progress(project_id, language).await?;

        let mut snapshot = MetadataSnapshot::new();
        for file in &files {
            let path = file.relative_path();
            if !is_within(path, dest_folder) {
                continue;
            }
            let counts = progress.iter().find(|p| p.file_id == file.id);
            let metadata = match counts {
                Some(p) => FileMetadata::new(
                    p.phrases.total,
                    p.phrases.translated,
                    p.phrases.approved,
                    Some(file.id),
                ),
                None => FileMetadata::new(0, 0, 0, Some(file.id)),
            };
            snapshot.insert(path.to_string(), metadata);
        }
        tracing::debug!(
            matched = snapshot.len(),
            total = files.len(),
            dest_folder,
            "Fetched CrowdIn file metadata"
        );
        Ok(snapshot)
    }

    pub async fn pre_translate(
        &self,
        project_id: u64,
        request: &PreTranslationRequest,
    ) -> Result<PreTranslation> {
        let mut payload = json!({
            "languageIds": [request.language_id],
            "fileIds": request.file_ids,
            "method": request.method,
            "translateUntranslatedOnly": true,
        });
        if let Some(engine_id) = request.engine_id {
            payload["engineId"] = json!(engine_id);
        }
        self.send_json(
            HttpMethod::Post,
            &format!("/projects/{project_id}/pre-translations"),
            &payload,
        )
        .await
    }

    pub async fn pre_translation_status(
        &self,
        project_id: u64,
        identifier: &str,
    ) -> Result<Option<PreTranslation>> {
        self.get(&format!(
            "/projects/{project_id}/pre-translations/{identifier}"
        ))
        .await
    }

    /// Poll a pre-translation job until it finishes.
    pub async fn wait_for_pre_translation(
        &self,
        project_id: u64,
        identifier: &str,
        options: PollOptions,
        cancel: &CancellationToken,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<PreTranslation> {
        poll_until_terminal(identifier, options, cancel, || async move {
            let job = self
                .pre_translation_status(project_id, identifier)
                .await?
                .ok_or_else(|| {
                    RemoteError::api(404, format!("pre-translation {identifier} vanished"))
                })?;
            emit(
                on_progress,
                SyncProgress::PreTranslationProgress {
                    identifier: identifier.to_string(),
                    progress: job.progress,
                },
            );
            let status = job.status.clone();
            Ok((status, job))
        })
        .await
    }

    pub async fn build_translations(&self, project_id: u64, language: &str) -> Result<Build> {
        self.send_json(
            HttpMethod::Post,
            &format!("/projects/{project_id}/translations/builds"),
            &json!({ "targetLanguageIds": [language] }),
        )
        .await
    }

    pub async fn build_status(&self, project_id: u64, build_id: u64) -> Result<Option<Build>> {
        self.get(&format!(
            "/projects/{project_id}/translations/builds/{build_id}"
        ))
        .await
    }

    /// Poll a build until it finishes.
    pub async fn wait_for_build(
        &self,
        project_id: u64,
        build_id: u64,
        options: PollOptions,
        cancel: &CancellationToken,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Build> {
        let identifier = format!("build {build_id}");
        poll_until_terminal(&identifier, options, cancel, || async move {
            let build = self
                .build_status(project_id, build_id)
                .await?
                .ok_or_else(|| RemoteError::api(404, format!("build {build_id} vanished")))?;
            emit(
                on_progress,
                SyncProgress::BuildProgress {
                    build_id,
                    progress: build.progress,
                },
            );
            let status = build.status.clone();
            if matches!(status, JobStatus::Failed | JobStatus::Canceled) {
                return Err(RemoteError::BuildFailed {
                    build_id,
                    status: status.as_str().to_string(),
                });
            }
            Ok((status, build))
        })
        .await
    }

    /// Signed download URL of a finished build; `None` if no build exists.
    pub async fn build_download(
        &self,
        project_id: u64,
        build_id: u64,
    ) -> Result<Option<DownloadLink>> {
        self.get(&format!(
            "/projects/{project_id}/translations/builds/{build_id}/download"
        ))
        .await
    }

    /// Start exporting a translation memory or glossary.
    ///
    /// The language pair only applies to translation memories.
    pub async fn export_reference(
        &self,
        kind: ReferenceKind,
        id: u64,
        source_language: &str,
        target_language: &str,
    ) -> Result<ReferenceExport> {
        let body = match kind {
            ReferenceKind::TranslationMemory => json!({
                "format": kind.format(),
                "sourceLanguageId": source_language,
                "targetLanguageId": target_language,
            }),
            ReferenceKind::Glossary => json!({ "format": kind.format() }),
        };
        self.send_json(
            HttpMethod::Post,
            &format!("/{}/{id}/exports", kind.collection()),
            &body,
        )
        .await
    }

    /// Poll an export until it finishes; returns its download link.
    pub async fn wait_for_reference(
        &self,
        kind: ReferenceKind,
        id: u64,
        identifier: &str,
        options: PollOptions,
        cancel: &CancellationToken,
    ) -> Result<DownloadLink> {
        let path = format!("/{}/{id}/exports/{identifier}", kind.collection());
        let path = &path;
        poll_until_terminal(identifier, options, cancel, || async move {
            let export: ReferenceExport = self.get(path).await?.ok_or_else(|| {
                RemoteError::api(404, format!("{} export {identifier} vanished", kind.format()))
            })?;
            Ok((export.status, ()))
        })
        .await?;
        self.get(&format!("{path}/download"))
            .await?
            .ok_or_else(|| RemoteError::api(404, format!("{path}/download not found")))
    }

    /// Export a TM (TMX) or glossary (TBX) and return the file's bytes.
    pub async fn download_reference(
        &self,
        kind: ReferenceKind,
        id: u64,
        source_language: &str,
        target_language: &str,
        options: PollOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let export = self
            .export_reference(kind, id, source_language, target_language)
            .await?;
        tracing::debug!(
            kind = kind.format(),
            id,
            identifier = %export.identifier,
            "Requested export"
        );
        let link = self
            .wait_for_reference(kind, id, &export.identifier, options, cancel)
            .await?;
        self.download(&link.url).await
    }

    /// Fetch a signed URL. The URL carries its own credentials.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let request = HttpRequest::new(HttpMethod::Get, url);
        let label = format!("GET {url}");
        let request = &request;
        with_retry(
            || async move {
                let response = self.transport.send(request.clone()).await?;
                if response.is_success() {
                    Ok(response.body)
                } else {
                    Err(remote::error_for_status(&response))
                }
            },
            RemoteError::is_transient,
            &label,
            None,
        )
        .await
    }
}

/// Poll `check` until it reports a terminal status.
///
/// `failed` and `canceled` jobs are errors. Missing the deadline is
/// [`RemoteError::TranslationTimeout`]; the token aborts with
/// [`RemoteError::Cancelled`].
async fn poll_until_terminal<T, F, Fut>(
    identifier: &str,
    options: PollOptions,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(JobStatus, T)>>,
{
    let started = tokio::time::Instant::now();
    loop {
        if cancel.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }
        let (status, value) = check().await?;
        match status {
            JobStatus::Finished => return Ok(value),
            JobStatus::Failed | JobStatus::Canceled => {
                return Err(RemoteError::api(
                    200,
                    format!("{identifier} ended with status {}", status.as_str()),
                ));
            }
            _ => {}
        }

        let waited = started.elapsed();
        if waited >= options.timeout {
            return Err(RemoteError::TranslationTimeout {
                identifier: identifier.to_string(),
                waited,
            });
        }
        tokio::select! {
            () = cancel.cancelled() => return Err(RemoteError::Cancelled),
            () = tokio::time::sleep(options.interval) => {}
        }
    }
}

impl std::fmt::Debug for CrowdinClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrowdinClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockTransport};

    pub(crate) const API: &str = "https://api.crowdin.test/api/v2";

    pub(crate) fn client(transport: &MockTransport) -> CrowdinClient {
        CrowdinClient::new_with_transport(API, "token", Arc::new(transport.clone()))
    }

    /// Wrap items the way CrowdIn listings do.
    pub(crate) fn listing(items: Vec<Value>) -> Value {
        json!({
            "data": items.into_iter().map(|item| json!({ "data": item })).collect::<Vec<_>>(),
            "pagination": { "offset": 0, "limit": PAGE_LIMIT }
        })
    }

    pub(crate) fn file_json(id: u64, path: &str) -> Value {
        let name = path.rsplit('/').next().unwrap_or(path);
        json!({ "id": id, "name": name, "path": path, "directoryId": 1 })
    }

    pub(crate) fn progress_json(file_id: u64, total: u64, translated: u64, approved: u64) -> Value {
        json!({
            "fileId": file_id,
            "phrases": { "total": total, "translated": translated, "approved": approved }
        })
    }

    fn options() -> PollOptions {
        PollOptions {
            interval: StdDuration::from_secs(5),
            timeout: StdDuration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn listing_pages_until_short_page() {
        let transport = MockTransport::new();
        let full: Vec<Value> = (0..PAGE_LIMIT as u64)
            .map(|id| file_json(id, &format!("/docs-remote/{id}.md")))
            .collect();
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/projects/7/files?limit=500&offset=0"),
            listing(full),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/projects/7/files?limit=500&offset=500"),
            listing(vec![file_json(900, "/docs-remote/last.md")]),
        );

        let files = client(&transport).list_files(7).await.expect("files");
        assert_eq!(files.len(), PAGE_LIMIT as usize + 1);
        assert_eq!(files.last().map(|f| f.id), Some(900));
    }

    #[tokio::test]
    async fn metadata_joins_files_with_progress_and_filters_by_folder() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/projects/7/files?limit=500&offset=0"),
            listing(vec![
                file_json(1, "/docs-remote/a.md"),
                file_json(2, "/docs-remote/b.md"),
                file_json(3, "/elsewhere/c.md"),
            ]),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/projects/7/languages/ja/progress?limit=500&offset=0"),
            listing(vec![progress_json(1, 10, 4, 12), progress_json(3, 5, 5, 5)]),
        );

        let snapshot = client(&transport)
            .project_metadata(7, "ja", "docs-remote")
            .await
            .expect("metadata");
        assert_eq!(snapshot.len(), 2);
        let a = snapshot["docs-remote/a.md"];
        assert_eq!((a.phrases(), a.translated(), a.approved()), (10, 4, 4));
        assert_eq!(snapshot["docs-remote/b.md"].id(), Some(2));
    }

    #[tokio::test]
    async fn ensure_directory_creates_missing_segments_in_order() {
        let transport = MockTransport::new();
        let url = format!("{API}/projects/7/directories");
        transport.push_json(
            HttpMethod::Post,
            url.clone(),
            json!({ "data": { "id": 20, "name": "guide", "directoryId": 1 } }),
        );
        transport.push_json(
            HttpMethod::Post,
            url.clone(),
            json!({ "data": { "id": 21, "name": "intro", "directoryId": 20 } }),
        );

        let mut index = DirectoryIndex::new(&[Directory {
            id: 1,
            name: "docs-remote".into(),
            directory_id: None,
        }]);
        let client = client(&transport);
        let id = client
            .ensure_directory(7, &mut index, "docs-remote/guide/intro")
            .await
            .expect("created");
        assert_eq!(id, Some(21));
        assert_eq!(index.get("docs-remote/guide"), Some(20));

        let bodies: Vec<Value> = transport
            .requests()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).expect("json"))
            .collect();
        assert_eq!(bodies[0], json!({ "name": "guide", "directoryId": 1 }));
        assert_eq!(bodies[1], json!({ "name": "intro", "directoryId": 20 }));

        // Second lookup is served from the index.
        client
            .ensure_directory(7, &mut index, "docs-remote/guide/intro")
            .await
            .expect("cached");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn storage_upload_sends_raw_bytes_and_file_name() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{API}/storages"),
            json!({ "data": { "id": 55, "fileName": "a.md" } }),
        );
        let storage = client(&transport)
            .add_storage("a.md", b"# Title\n".to_vec())
            .await
            .expect("stored");
        assert_eq!(storage.id, 55);

        let request = &transport.requests()[0];
        assert_eq!(request.body, b"# Title\n");
        assert!(
            request
                .headers
                .iter()
                .any(|(k, v)| k == "Crowdin-API-FileName" && v == "a.md")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pre_translation_polls_until_finished() {
        let transport = MockTransport::new();
        let url = format!("{API}/projects/7/pre-translations/job-1");
        for (status, progress) in [("inProgress", 10), ("inProgress", 60), ("finished", 100)] {
            transport.push_json(
                HttpMethod::Get,
                url.clone(),
                json!({ "data": { "identifier": "job-1", "status": status, "progress": progress } }),
            );
        }

        let started = tokio::time::Instant::now();
        let job = client(&transport)
            .wait_for_pre_translation(7, "job-1", options(), &CancellationToken::new(), None)
            .await
            .expect("finished");
        assert_eq!(job.status, JobStatus::Finished);
        assert_eq!(transport.count(HttpMethod::Get, &url), 3);
        assert_eq!(started.elapsed(), StdDuration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn pre_translation_times_out() {
        let transport = MockTransport::new();
        let url = format!("{API}/projects/7/pre-translations/job-2");
        for _ in 0..20 {
            transport.push_json(
                HttpMethod::Get,
                url.clone(),
                json!({ "data": { "identifier": "job-2", "status": "inProgress", "progress": 1 } }),
            );
        }
        let options = PollOptions {
            interval: StdDuration::from_secs(5),
            timeout: StdDuration::from_secs(12),
        };
        let err = client(&transport)
            .wait_for_pre_translation(7, "job-2", options, &CancellationToken::new(), None)
            .await
            .expect_err("deadline");
        assert!(matches!(err, RemoteError::TranslationTimeout { ref identifier, .. } if identifier == "job-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_poll_stops_waiting() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/projects/7/translations/builds/3"),
            json!({ "data": { "id": 3, "status": "inProgress", "progress": 0 } }),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_secs(1)).await;
            trigger.cancel();
        });
        let err = client(&transport)
            .wait_for_build(7, 3, options(), &cancel, None)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, RemoteError::Cancelled));
    }

    #[tokio::test]
    async fn failed_build_is_an_error() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/projects/7/translations/builds/4"),
            json!({ "data": { "id": 4, "status": "failed", "progress": 0 } }),
        );
        let err = client(&transport)
            .wait_for_build(7, 4, options(), &CancellationToken::new(), None)
            .await
            .expect_err("failed");
        assert!(matches!(err, RemoteError::BuildFailed { build_id: 4, ref status } if status == "failed"));
    }

    #[tokio::test]
    async fn download_skips_authorization() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            "https://storage.test/build.zip",
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: vec![1, 2, 3],
            },
        );
        let bytes = client(&transport)
            .download("https://storage.test/build.zip")
            .await
            .expect("bytes");
        assert_eq!(bytes, vec![1, 2, 3]);
        assert!(transport.requests()[0].headers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_quota_waits_for_reset_then_refreshes_once() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, format!("{API}/user"), json!({ "data": { "id": 1 } }));
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/projects/7"),
            json!({ "data": { "id": 7 } }),
        );
        let client = client(&transport);
        client
            .state()
            .record(0, chrono::Utc::now() + chrono::Duration::seconds(120));

        let started = tokio::time::Instant::now();
        let project = client
            .request(HttpMethod::Get, "/projects/7", None)
            .await
            .expect("request")
            .expect("found");
        assert_eq!(project["id"], 7);
        assert!(started.elapsed() >= StdDuration::from_secs(120));

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec![format!("{API}/user"), format!("{API}/projects/7")]);
        let snapshot = client.state().snapshot();
        assert_eq!(snapshot.refreshes, 1);
        assert_eq!(snapshot.remaining, None);
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_request_honors_retry_after() {
        let transport = MockTransport::new();
        let url = format!("{API}/projects/7/files?limit=500&offset=0");
        transport.push_response(
            HttpMethod::Get,
            url.clone(),
            HttpResponse {
                status: 429,
                headers: vec![("Retry-After".to_string(), "30".to_string())],
                body: b"Too Many Requests".to_vec(),
            },
        );
        transport.push_json(HttpMethod::Get, format!("{API}/user"), json!({ "data": {} }));
        transport.push_json(HttpMethod::Get, url.clone(), listing(vec![]));

        let client = client(&transport);
        let started = tokio::time::Instant::now();
        let files: Vec<Value> = client
            .request_all("/projects/7/files")
            .await
            .expect("retried after the pause");
        assert!(files.is_empty());
        assert!(started.elapsed() >= StdDuration::from_secs(30));
        assert_eq!(transport.count(HttpMethod::Get, &url), 2);
        assert_eq!(client.state().snapshot().refreshes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn translation_memory_is_exported_then_fetched() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{API}/tms/11/exports"),
            json!({ "data": { "identifier": "tm-1", "status": "created" } }),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/tms/11/exports/tm-1"),
            json!({ "data": { "identifier": "tm-1", "status": "inProgress", "progress": 50 } }),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/tms/11/exports/tm-1"),
            json!({ "data": { "identifier": "tm-1", "status": "finished", "progress": 100 } }),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/tms/11/exports/tm-1/download"),
            json!({ "data": { "url": "https://downloads.crowdin.test/tm-1.tmx" } }),
        );
        transport.push_response(
            HttpMethod::Get,
            "https://downloads.crowdin.test/tm-1.tmx",
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: b"<tmx/>".to_vec(),
            },
        );

        let cancel = CancellationToken::new();
        let bytes = client(&transport)
            .download_reference(
                ReferenceKind::TranslationMemory,
                11,
                "en",
                "ja",
                options(),
                &cancel,
            )
            .await
            .expect("tmx");
        assert_eq!(bytes, b"<tmx/>");

        let requests = transport.requests();
        let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
        assert_eq!(body["format"], "tmx");
        assert_eq!(body["sourceLanguageId"], "en");
        assert_eq!(body["targetLanguageId"], "ja");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_glossary_export_is_an_error() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{API}/glossaries/3/exports"),
            json!({ "data": { "identifier": "g-1", "status": "created" } }),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/glossaries/3/exports/g-1"),
            json!({ "data": { "identifier": "g-1", "status": "failed" } }),
        );

        let cancel = CancellationToken::new();
        let err = client(&transport)
            .download_reference(ReferenceKind::Glossary, 3, "en", "ja", options(), &cancel)
            .await
            .expect_err("failed export");
        assert!(err.to_string().contains("g-1"));
        let body: Value =
            serde_json::from_slice(&transport.requests()[0].body).expect("json body");
        assert_eq!(body, json!({ "format": "tbx" }));
        assert_eq!(
            transport.count(HttpMethod::Get, &format!("{API}/glossaries/3/exports/g-1/download")),
            0
        );
    }
}
