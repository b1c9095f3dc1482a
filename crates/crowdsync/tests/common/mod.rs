//! In-memory stand-ins for the translation platform, GitHub and git.
//!
//! `FakePlatform` answers the CrowdIn and GitHub endpoints a reconciliation
//! cycle touches and keeps enough state to behave consistently across
//! cycles. Unknown routes answer 501 so a missing handler fails loudly.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use crowdsync::http::HttpError;
use crowdsync::{
    CrowdinClient, GitHubClient, HttpMethod, HttpRequest, HttpResponse, HttpTransport, Vcs,
    VcsError,
};
use serde_json::{Value, json};

pub const CROWDIN_API: &str = "https://api.crowdin.test/api/v2";
pub const GITHUB_API: &str = "https://api.github.test";
pub const DOWNLOADS: &str = "https://downloads.crowdin.test";

/// Phrase count every created file starts with.
pub const PHRASES: u64 = 10;

#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub directory_id: Option<u64>,
    pub content: Vec<u8>,
    pub translated: u64,
    pub approved: u64,
}

#[derive(Debug, Clone)]
pub struct FakeIssue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: String,
    pub milestone: Option<u64>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    files: BTreeMap<u64, RemoteFile>,
    directories: BTreeMap<u64, (String, Option<u64>)>,
    storages: BTreeMap<u64, Vec<u8>>,
    builds: u64,
    accessible: Vec<String>,
    milestones: BTreeMap<u64, String>,
    issues: BTreeMap<u64, FakeIssue>,
    requests: Vec<(HttpMethod, String)>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn directory_path(&self, mut id: Option<u64>) -> String {
        let mut segments = Vec::new();
        while let Some(current) = id {
            let Some((name, parent)) = self.directories.get(&current) else {
                break;
            };
            segments.push(name.clone());
            id = *parent;
        }
        segments.reverse();
        segments.join("/")
    }
}

#[derive(Clone, Default)]
pub struct FakePlatform {
    state: Arc<Mutex<State>>,
}

fn ok(body: Value) -> HttpResponse {
    HttpResponse {
        status: 200,
        headers: vec![],
        body: body.to_string().into_bytes(),
    }
}

fn status(code: u16) -> HttpResponse {
    HttpResponse {
        status: code,
        headers: vec![],
        body: vec![],
    }
}

fn data(value: Value) -> HttpResponse {
    ok(json!({ "data": value }))
}

fn listing(items: Vec<Value>) -> HttpResponse {
    ok(json!({
        "data": items.into_iter().map(|item| json!({ "data": item })).collect::<Vec<_>>(),
        "pagination": { "offset": 0, "limit": 500 }
    }))
}

fn file_json(file: &RemoteFile) -> Value {
    json!({
        "id": file.id,
        "name": file.name,
        "path": file.path,
        "directoryId": file.directory_id,
    })
}

fn issue_json(issue: &FakeIssue, milestones: &BTreeMap<u64, String>) -> Value {
    json!({
        "id": 1000 + issue.number,
        "node_id": format!("I_{}", issue.number),
        "number": issue.number,
        "title": issue.title,
        "body": issue.body,
        "state": issue.state,
        "milestone": issue.milestone.map(|n| json!({
            "number": n,
            "title": milestones.get(&n).cloned().unwrap_or_default(),
        })),
    })
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake platform lock")
    }

    pub fn crowdin(&self) -> CrowdinClient {
        CrowdinClient::new_with_transport(CROWDIN_API, "token", Arc::new(self.clone()))
    }

    pub fn github(&self) -> GitHubClient {
        GitHubClient::new_with_transport(GITHUB_API, "token", Arc::new(self.clone()))
    }

    pub fn allow(&self, origin: &str) {
        self.lock().accessible.push(origin.to_string());
    }

    /// Register a remote file directly, as if uploaded in an earlier run.
    pub fn seed_file(&self, path: &str, translated: u64, approved: u64) -> u64 {
        let mut state = self.lock();
        let (directory, name) = path.rsplit_once('/').unwrap_or(("", path));
        let mut parent = None;
        for segment in directory.split('/').filter(|s| !s.is_empty()) {
            let existing = state
                .directories
                .iter()
                .find(|(_, (n, p))| n == segment && *p == parent)
                .map(|(id, _)| *id);
            parent = Some(match existing {
                Some(id) => id,
                None => {
                    let id = state.next_id();
                    state.directories.insert(id, (segment.to_string(), parent));
                    id
                }
            });
        }
        let id = state.next_id();
        state.files.insert(
            id,
            RemoteFile {
                id,
                name: name.to_string(),
                path: format!("/{path}"),
                directory_id: parent,
                content: Vec::new(),
                translated,
                approved,
            },
        );
        id
    }

    pub fn set_progress(&self, path: &str, translated: u64, approved: u64) {
        let mut state = self.lock();
        let wanted = format!("/{path}");
        for file in state.files.values_mut().filter(|f| f.path == wanted) {
            file.translated = translated;
            file.approved = approved;
        }
    }

    pub fn files(&self) -> Vec<RemoteFile> {
        self.lock().files.values().cloned().collect()
    }

    pub fn issues(&self) -> Vec<FakeIssue> {
        self.lock().issues.values().cloned().collect()
    }

    pub fn close_issue(&self, number: u64) {
        if let Some(issue) = self.lock().issues.get_mut(&number) {
            issue.state = "closed".into();
        }
    }

    pub fn count(&self, method: HttpMethod, path_prefix: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|(m, url)| *m == method && url.starts_with(path_prefix))
            .count()
    }

    /// Zip of every translated file, laid out under `docs/ja/`.
    fn archive(state: &State) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for file in state.files.values().filter(|f| f.translated > 0) {
            let Some(rel) = file.path.strip_prefix("/docs-remote/") else {
                continue;
            };
            writer
                .start_file(format!("docs/ja/{rel}"), options)
                .expect("start entry");
            writer.write_all(b"ja: ").expect("write");
            writer.write_all(&file.content).expect("write");
        }
        writer.finish().expect("finish").into_inner()
    }

    fn crowdin_route(
        state: &mut State,
        method: HttpMethod,
        path: &str,
        body: &Value,
        raw: &[u8],
    ) -> HttpResponse {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match (method, segments.as_slice()) {
            (HttpMethod::Post, ["storages"]) => {
                let id = state.next_id();
                state.storages.insert(id, raw.to_vec());
                data(json!({ "id": id }))
            }
            (HttpMethod::Get, ["projects", _, "files"]) => {
                listing(state.files.values().map(file_json).collect())
            }
            (HttpMethod::Post, ["projects", _, "files"]) => {
                let id = state.next_id();
                let directory_id = body["directoryId"].as_u64();
                let name = body["name"].as_str().unwrap_or_default().to_string();
                let directory = state.directory_path(directory_id);
                let content = body["storageId"]
                    .as_u64()
                    .and_then(|s| state.storages.get(&s).cloned())
                    .unwrap_or_default();
                let file = RemoteFile {
                    id,
                    path: format!("/{directory}/{name}"),
                    name,
                    directory_id,
                    content,
                    translated: 0,
                    approved: 0,
                };
                let response = data(file_json(&file));
                state.files.insert(id, file);
                response
            }
            (HttpMethod::Put, ["projects", _, "files", id]) => {
                let storage = body["storageId"]
                    .as_u64()
                    .and_then(|s| state.storages.get(&s).cloned());
                match id.parse().ok().and_then(|id: u64| state.files.get_mut(&id)) {
                    Some(file) => {
                        if let Some(content) = storage {
                            file.content = content;
                        }
                        data(file_json(file))
                    }
                    None => status(404),
                }
            }
            (HttpMethod::Delete, ["projects", _, "files", id]) => {
                match id.parse().ok().and_then(|id: u64| state.files.remove(&id)) {
                    Some(_) => status(204),
                    None => status(404),
                }
            }
            (HttpMethod::Get, ["projects", _, "directories"]) => listing(
                state
                    .directories
                    .iter()
                    .map(|(id, (name, parent))| {
                        json!({ "id": id, "name": name, "directoryId": parent })
                    })
                    .collect(),
            ),
            (HttpMethod::Post, ["projects", _, "directories"]) => {
                let id = state.next_id();
                let name = body["name"].as_str().unwrap_or_default().to_string();
                let parent = body["directoryId"].as_u64();
                state.directories.insert(id, (name.clone(), parent));
                data(json!({ "id": id, "name": name, "directoryId": parent }))
            }
            (HttpMethod::Get, ["projects", _, "languages", _, "progress"]) => listing(
                state
                    .files
                    .values()
                    .map(|f| {
                        json!({
                            "fileId": f.id,
                            "phrases": {
                                "total": PHRASES,
                                "translated": f.translated,
                                "approved": f.approved,
                            }
                        })
                    })
                    .collect(),
            ),
            (HttpMethod::Post, ["projects", _, "pre-translations"]) => {
                let ids: Vec<u64> = body["fileIds"]
                    .as_array()
                    .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
                    .unwrap_or_default();
                for id in ids {
                    if let Some(file) = state.files.get_mut(&id) {
                        file.translated = PHRASES;
                    }
                }
                let identifier = format!("pt-{}", state.next_id());
                data(json!({ "identifier": identifier, "status": "finished", "progress": 100 }))
            }
            (HttpMethod::Get, ["projects", _, "pre-translations", identifier]) => {
                data(json!({ "identifier": identifier, "status": "finished", "progress": 100 }))
            }
            (HttpMethod::Post, ["projects", _, "translations", "builds"]) => {
                state.builds += 1;
                data(json!({ "id": state.builds, "status": "finished", "progress": 100 }))
            }
            (HttpMethod::Get, ["projects", _, "translations", "builds", id]) => {
                data(json!({ "id": id.parse::<u64>().unwrap_or_default(), "status": "finished", "progress": 100 }))
            }
            (HttpMethod::Get, ["projects", _, "translations", "builds", id, "download"]) => {
                data(json!({ "url": format!("{DOWNLOADS}/build-{id}.zip") }))
            }
            (HttpMethod::Post, [collection @ ("tms" | "glossaries"), id, "exports"]) => {
                data(json!({ "identifier": format!("{collection}-{id}"), "status": "finished" }))
            }
            (HttpMethod::Get, [_, _, "exports", identifier]) => {
                data(json!({ "identifier": identifier, "status": "finished", "progress": 100 }))
            }
            (HttpMethod::Get, [collection, _, "exports", identifier, "download"]) => {
                let format = if *collection == "tms" { "tmx" } else { "tbx" };
                data(json!({ "url": format!("{DOWNLOADS}/{identifier}.{format}") }))
            }
            _ => status(501),
        }
    }

    fn github_route(
        state: &mut State,
        method: HttpMethod,
        path: &str,
        query: &str,
        body: &Value,
    ) -> HttpResponse {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match (method, segments.as_slice()) {
            (HttpMethod::Get, ["repos", owner, name]) => {
                let origin = format!("{owner}/{name}");
                if state.accessible.contains(&origin) {
                    ok(json!({ "id": 1, "full_name": origin }))
                } else {
                    status(404)
                }
            }
            (HttpMethod::Get, ["repos", _, _, "milestones"]) => ok(Value::Array(
                state
                    .milestones
                    .iter()
                    .map(|(number, title)| json!({ "number": number, "title": title }))
                    .collect(),
            )),
            (HttpMethod::Post, ["repos", _, _, "milestones"]) => {
                let number = state.milestones.len() as u64 + 1;
                let title = body["title"].as_str().unwrap_or_default().to_string();
                state.milestones.insert(number, title.clone());
                ok(json!({ "number": number, "title": title }))
            }
            (HttpMethod::Get, ["repos", _, _, "issues"]) => {
                let milestone = query_param(query, "milestone").and_then(|m| m.parse().ok());
                ok(Value::Array(
                    state
                        .issues
                        .values()
                        .filter(|i| milestone.is_none() || i.milestone == milestone)
                        .map(|i| issue_json(i, &state.milestones))
                        .collect(),
                ))
            }
            (HttpMethod::Post, ["repos", _, _, "issues"]) => {
                let number = state.issues.len() as u64 + 1;
                let issue = FakeIssue {
                    number,
                    title: body["title"].as_str().unwrap_or_default().to_string(),
                    body: body["body"].as_str().unwrap_or_default().to_string(),
                    state: "open".into(),
                    milestone: body["milestone"].as_u64(),
                };
                let response = ok(issue_json(&issue, &state.milestones));
                state.issues.insert(number, issue);
                response
            }
            (HttpMethod::Get, ["repos", _, _, "issues", number]) => {
                match number.parse().ok().and_then(|n: u64| state.issues.get(&n)) {
                    Some(issue) => ok(issue_json(issue, &state.milestones)),
                    None => status(404),
                }
            }
            (HttpMethod::Patch, ["repos", _, _, "issues", number]) => {
                let Some(issue) = number.parse().ok().and_then(|n: u64| state.issues.get_mut(&n))
                else {
                    return status(404);
                };
                if let Some(s) = body["state"].as_str() {
                    issue.state = s.to_string();
                }
                if let Some(b) = body["body"].as_str() {
                    issue.body = b.to_string();
                }
                if let Some(m) = body["milestone"].as_u64() {
                    issue.milestone = Some(m);
                }
                let issue = issue.clone();
                ok(issue_json(&issue, &state.milestones))
            }
            _ => status(501),
        }
    }
}

#[async_trait]
impl HttpTransport for FakePlatform {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut state = self.lock();
        state.requests.push((request.method, request.url.clone()));
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let (location, query) = request
            .url
            .split_once('?')
            .unwrap_or((request.url.as_str(), ""));

        let response = if let Some(path) = location.strip_prefix(CROWDIN_API) {
            Self::crowdin_route(&mut state, request.method, path, &body, &request.body)
        } else if let Some(path) = location.strip_prefix(GITHUB_API) {
            Self::github_route(&mut state, request.method, path, query, &body)
        } else if location.starts_with(DOWNLOADS)
            && (location.ends_with(".tmx") || location.ends_with(".tbx"))
        {
            ok(json!({ "reference": location }))
        } else if location.starts_with(DOWNLOADS) {
            HttpResponse {
                status: 200,
                headers: vec![],
                body: Self::archive(&state),
            }
        } else {
            status(501)
        };
        Ok(response)
    }
}

/// Working tree stand-in: reports scripted status/tree and records commits.
pub struct FakeGit {
    root: PathBuf,
    changed: Mutex<Vec<String>>,
    tracked: Mutex<Vec<String>>,
    staged: Mutex<Vec<String>>,
    pub commits: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeGit {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            changed: Mutex::new(Vec::new()),
            tracked: Mutex::new(Vec::new()),
            staged: Mutex::new(Vec::new()),
            commits: Mutex::new(Vec::new()),
        }
    }

    /// Write `content` to `path` and report it as changed.
    pub fn write(&self, path: &str, content: &str) {
        let full = self.root.join(path);
        std::fs::create_dir_all(full.parent().expect("parent")).expect("mkdir");
        std::fs::write(full, content).expect("write");
        self.changed.lock().expect("lock").push(path.to_string());
    }

    pub fn remove(&self, path: &str) {
        std::fs::remove_file(self.root.join(path)).expect("remove");
        self.tracked.lock().expect("lock").retain(|p| p != path);
    }

    /// Simulate a commit of everything changed so far.
    pub fn settle(&self) {
        let changed: Vec<String> = self.changed.lock().expect("lock").drain(..).collect();
        let mut tracked = self.tracked.lock().expect("lock");
        for path in changed {
            if !tracked.contains(&path) {
                tracked.push(path);
            }
        }
    }

    pub fn commit_count(&self) -> usize {
        self.commits.lock().expect("lock").len()
    }
}

#[async_trait]
impl Vcs for FakeGit {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn checkout(&self, _reference: &str) -> Result<(), VcsError> {
        Ok(())
    }

    async fn diff_names(&self, _range: &str) -> Result<Vec<String>, VcsError> {
        Ok(Vec::new())
    }

    async fn status_short(&self) -> Result<Vec<String>, VcsError> {
        Ok(self.changed.lock().expect("lock").clone())
    }

    async fn ls_tree(&self, _reference: &str) -> Result<Vec<String>, VcsError> {
        Ok(self.tracked.lock().expect("lock").clone())
    }

    async fn add(&self, paths: &[String]) -> Result<(), VcsError> {
        self.staged.lock().expect("lock").extend_from_slice(paths);
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<bool, VcsError> {
        let staged: Vec<String> = self.staged.lock().expect("lock").drain(..).collect();
        if staged.is_empty() {
            return Ok(false);
        }
        self.commits
            .lock()
            .expect("lock")
            .push((message.to_string(), staged));
        Ok(true)
    }

    async fn rebase(&self, _reference: &str) -> Result<(), VcsError> {
        Ok(())
    }

    async fn fetch(&self, _remote: &str, _refspec: &str) -> Result<(), VcsError> {
        Ok(())
    }

    async fn config(&self, _key: &str) -> Result<Option<String>, VcsError> {
        Ok(None)
    }
}
