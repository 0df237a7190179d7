//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dynamic_config::config::ServiceConfig;
use dynamic_config::http::HttpServer;
use dynamic_config::lifecycle::Shutdown;
use dynamic_config::reload::{Apply, ApplyOutcome, ProcessIdentity, Validate, ValidationOutcome};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Accepts files containing `worker_processes`, like the offline checker
/// used when no real server binary is available.
#[derive(Default)]
pub struct MarkerValidator {
    pub seen: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Validate for MarkerValidator {
    async fn validate(&self, path: &Path) -> ValidationOutcome {
        self.seen.lock().unwrap().push(path.to_path_buf());
        match tokio::fs::read_to_string(path).await {
            Ok(text) if text.contains("worker_processes") => ValidationOutcome::Accepted,
            Ok(_) => ValidationOutcome::Rejected {
                diagnostics: "worker_processes directive not found".into(),
            },
            Err(e) => ValidationOutcome::Unavailable {
                reason: format!("failed to open config file: {e}"),
            },
        }
    }
}

/// Counts calls; fails for non-positive ids.
#[derive(Default)]
pub struct RecordingApplier {
    pub calls: AtomicUsize,
    pub last: Mutex<Option<ProcessIdentity>>,
}

impl RecordingApplier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Apply for RecordingApplier {
    fn apply(&self, target: ProcessIdentity) -> ApplyOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(target);
        if target.raw() <= 0 {
            ApplyOutcome::Failed {
                diagnostic: format!("invalid pid {target}"),
            }
        } else {
            ApplyOutcome::Applied
        }
    }
}

/// A running server on an ephemeral port with its own staging directory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub staging: TempDir,
    shutdown: Shutdown,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.staging.path()).unwrap().count()
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.handle.await;
    }
}

/// Config pointing staging at a fresh temp dir and the target at `pid`.
pub fn test_config(pid: i32) -> (ServiceConfig, TempDir) {
    let staging = tempfile::tempdir().unwrap();
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.staging.dir = Some(staging.path().to_path_buf());
    config.target.pid = Some(pid);
    (config, staging)
}

pub async fn spawn(server: HttpServer, staging: TempDir) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, rx));

    TestServer {
        addr,
        staging,
        shutdown,
        handle,
    }
}

/// Start a server with injected doubles.
pub async fn start_with_doubles(
    config: ServiceConfig,
    staging: TempDir,
    validator: Arc<MarkerValidator>,
    applier: Arc<RecordingApplier>,
) -> TestServer {
    let server = HttpServer::with_pipeline(config, validator, applier).unwrap();
    spawn(server, staging).await
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Write `request` verbatim and return the response head.
pub async fn raw_request(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}
