#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use axum::extract::{Form, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum_server::Server;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use ::common::schemas::{ImageTransformParam, ServerRecord};
use ::common::time_utils::utc_now_secs;
use router::core::directory::{DirectorySource, ServerRecords};

/// Initialize tracing for tests
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("router=debug,common=debug")
        .with_test_writer()
        .try_init();
}

/// Build a directory record with a fresh heartbeat timestamp
pub fn mk_record(cluster_id: &str, server_id: &str, local: &str, proxy: &str, free_mb: i64) -> ServerRecord {
    ServerRecord {
        cluster_id: cluster_id.to_string(),
        server_id: server_id.to_string(),
        local_address: local.to_string(),
        proxy_address: proxy.to_string(),
        update_timestamp: utc_now_secs(),
        rated_space_mb: 100_000,
        free_space_mb: free_mb,
        ..Default::default()
    }
}

// Directory sources

#[derive(Default)]
struct MemoryState {
    clusters: HashMap<String, ServerRecords>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    fetches: usize,
}

/// In-process directory whose content and failure modes tests can change
/// between refresh cycles.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, record: ServerRecord) {
        let mut state = self.state.lock().unwrap();
        state
            .clusters
            .entry(record.cluster_id.clone())
            .or_default()
            .insert(record.server_id.clone(), record);
    }

    pub fn remove_server(&self, cluster_id: &str, server_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(records) = state.clusters.get_mut(cluster_id) {
            records.remove(server_id);
        }
    }

    /// Advance a server's heartbeat marker
    pub fn bump(&self, cluster_id: &str, server_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state
            .clusters
            .get_mut(cluster_id)
            .and_then(|c| c.get_mut(server_id))
        {
            record.update_timestamp += 1;
        }
    }

    pub fn set_free_space(&self, cluster_id: &str, server_id: &str, free_mb: i64) {
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state
            .clusters
            .get_mut(cluster_id)
            .and_then(|c| c.get_mut(server_id))
        {
            record.free_space_mb = free_mb;
        }
    }

    pub fn set_failing(&self, cluster_id: &str, failing: bool) {
        let mut state = self.state.lock().unwrap();
        if failing {
            state.failing.insert(cluster_id.to_string());
        } else {
            state.failing.remove(cluster_id);
        }
    }

    pub fn set_delay(&self, cluster_id: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(cluster_id.to_string(), delay);
    }

    pub fn fetches(&self) -> usize {
        self.state.lock().unwrap().fetches
    }
}

#[async_trait]
impl DirectorySource for MemoryDirectory {
    async fn fetch_cluster(&self, cluster_id: &str) -> Result<ServerRecords> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.fetches += 1;
            if state.failing.contains(cluster_id) {
                anyhow::bail!("directory unreachable for {}", cluster_id);
            }
            state.delays.get(cluster_id).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        Ok(state.clusters.get(cluster_id).cloned().unwrap_or_default())
    }
}

// HTTP fakes

pub struct TestServer {
    pub handle: JoinHandle<Result<(), anyhow::Error>>,
    pub shutdown_tx: watch::Sender<bool>,
    pub addr: SocketAddr,
    pub url: String,
}

impl TestServer {
    pub async fn spawn(app: Router) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let url = format!("http://{}", addr);

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let server = Server::from_tcp(listener.into_std()?).serve(app.into_make_service());

            tokio::select! {
                res = server => res.map_err(anyhow::Error::from),
                _ = shutdown_rx.changed() => Ok(()),
            }
        });

        Ok(TestServer {
            handle,
            shutdown_tx,
            addr,
            url,
        })
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
        let _ = self.handle.await;
        Ok(())
    }
}

/// Directory service answering `GET /clusters/{id}`.
pub struct TestDirectory {
    pub server: TestServer,
    pub records: MemoryDirectory,
}

impl TestDirectory {
    pub async fn new() -> Result<Self> {
        let records = MemoryDirectory::new();
        let app = Router::new()
            .route("/v1/clusters/{cluster_id}", get(directory_cluster))
            .with_state(records.clone());

        Ok(TestDirectory {
            server: TestServer::spawn(app).await?,
            records,
        })
    }

    /// Base URL including the `/v1` prefix
    pub fn url(&self) -> String {
        format!("{}/v1", self.server.url)
    }

    pub async fn shutdown(self) -> Result<()> {
        self.server.shutdown().await
    }
}

async fn directory_cluster(
    State(records): State<MemoryDirectory>,
    Path(cluster_id): Path<String>,
) -> Response {
    let state = records.state.lock().unwrap();
    if state.failing.contains(&cluster_id) {
        return (StatusCode::SERVICE_UNAVAILABLE, "directory down").into_response();
    }
    match state.clusters.get(&cluster_id) {
        Some(servers) => Json(servers.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub module: String,
    pub method: String,
    pub args: Value,
    pub is_async: bool,
}

#[derive(Default)]
struct FileStore {
    files: HashMap<String, Vec<u8>>,
    calls: Vec<RecordedCall>,
}

/// File server speaking the `/fs` and `/call` protocol over an in-memory store.
pub struct TestFileServer {
    pub server: TestServer,
    store: Arc<Mutex<FileStore>>,
}

impl TestFileServer {
    pub async fn new() -> Result<Self> {
        let store = Arc::new(Mutex::new(FileStore::default()));
        let app = Router::new()
            .route("/fs/stat/{*path}", get(fs_stat))
            .route("/fs/ls/{*path}", get(fs_ls))
            .route("/fs/read/{*path}", get(fs_read))
            .route("/fs/write/{collection}", post(fs_write))
            .route("/call/{module}/{method}", post(call_sync))
            .route("/call/async/{module}/{method}", post(call_async))
            .with_state(store.clone());

        Ok(TestFileServer {
            server: TestServer::spawn(app).await?,
            store,
        })
    }

    pub fn url(&self) -> &str {
        &self.server.url
    }

    /// Seed a file; `path` starts with `/`
    pub fn put_file(&self, path: &str, bytes: &[u8]) {
        self.store
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), bytes.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.store.lock().unwrap().files.get(path).cloned()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.store.lock().unwrap().calls.clone()
    }

    pub async fn shutdown(self) -> Result<()> {
        self.server.shutdown().await
    }
}

fn ok(data: Value) -> Json<Value> {
    Json(json!({ "State": 0, "Data": data }))
}

fn rejected(err: &str) -> Json<Value> {
    Json(json!({ "State": 1, "Err": err }))
}

fn file_info(path: &str, size: usize, is_dir: bool) -> Value {
    let name = path.rsplit('/').next().unwrap_or(path);
    json!({
        "Name": name,
        "Size": size,
        "Mode": if is_dir { 0o755 } else { 0o644 },
        "ModeTime": "2024-03-01T12:00:00Z",
        "IsDir": is_dir,
    })
}

async fn fs_stat(State(store): State<Arc<Mutex<FileStore>>>, Path(path): Path<String>) -> Json<Value> {
    let path = format!("/{}", path);
    let store = store.lock().unwrap();
    match store.files.get(&path) {
        Some(bytes) => ok(file_info(&path, bytes.len(), false)),
        None => rejected("no such file"),
    }
}

async fn fs_ls(State(store): State<Arc<Mutex<FileStore>>>, Path(path): Path<String>) -> Json<Value> {
    let dir = format!("/{}/", path.trim_end_matches('/'));
    let store = store.lock().unwrap();
    let mut entries: Vec<(&String, usize)> = store
        .files
        .iter()
        .filter(|(p, _)| p.starts_with(&dir))
        .map(|(p, b)| (p, b.len()))
        .collect();
    entries.sort();
    ok(Value::Array(
        entries
            .into_iter()
            .map(|(p, len)| file_info(p, len, false))
            .collect(),
    ))
}

async fn fs_read(State(store): State<Arc<Mutex<FileStore>>>, Path(path): Path<String>) -> Response {
    let path = format!("/{}", path);
    let store = store.lock().unwrap();
    match store.files.get(&path) {
        Some(bytes) => bytes.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "no such file").into_response(),
    }
}

async fn fs_write(
    State(store): State<Arc<Mutex<FileStore>>>,
    Path(collection): Path<String>,
    mut multipart: Multipart,
) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("unnamed").to_string();
        let Ok(bytes) = field.bytes().await else {
            return (StatusCode::BAD_REQUEST, "truncated upload").into_response();
        };

        let path = format!("/{}/{}", collection, file_name);
        store.lock().unwrap().files.insert(path.clone(), bytes.to_vec());
        return ok(json!(path)).into_response();
    }
    rejected("missing file field").into_response()
}

fn record_call(
    store: &Mutex<FileStore>,
    module: String,
    method: String,
    form: &HashMap<String, String>,
    is_async: bool,
) -> Value {
    let args = form
        .get("args")
        .and_then(|a| serde_json::from_str(a).ok())
        .unwrap_or(Value::Null);
    store.lock().unwrap().calls.push(RecordedCall {
        module,
        method,
        args: args.clone(),
        is_async,
    });
    args
}

async fn call_sync(
    State(store): State<Arc<Mutex<FileStore>>>,
    Path((module, method)): Path<(String, String)>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    let is_crop = module == "image" && method == "cropresize";
    let args = record_call(&store, module, method, &form, false);

    if !is_crop {
        return ok(args);
    }
    let Ok(param) = serde_json::from_value::<ImageTransformParam>(args) else {
        return rejected("bad image params");
    };
    let stem = param.file_path.trim_end_matches(".jpg");
    let paths: Vec<String> = param
        .resize
        .iter()
        .map(|size| format!("{}_{}x{}.jpg", stem, size[0], size[1]))
        .collect();
    ok(json!(paths))
}

async fn call_async(
    State(store): State<Arc<Mutex<FileStore>>>,
    Path((module, method)): Path<(String, String)>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    record_call(&store, module, method, &form, true);
    ok(Value::Null)
}

// Utility functions
pub async fn wait_until<F, Fut>(timeout_ms: u64, mut check_fn: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let timeout_duration = Duration::from_millis(timeout_ms);

    loop {
        if check_fn().await? {
            return Ok(());
        }

        if start.elapsed() > timeout_duration {
            anyhow::bail!("wait_until timed out after {}ms", timeout_ms);
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
