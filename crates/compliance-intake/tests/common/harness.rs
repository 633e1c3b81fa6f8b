//! Test harness for session-level intake tests.
//!
//! Provides an isolated temp directory for input files, an in-memory queue
//! repository and a transport whose transfers can be held open.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use compliance_intake::auth::RoleAssignment;
use compliance_intake::config::IntakeConfig;
use compliance_intake::queue::MemoryQueueRepository;
use compliance_intake::staging::CategoryRulesValidator;
use compliance_intake::upload::{
    TransferError, TransferReceipt, TransferRequest, Transport, UploadSummary,
};
use compliance_intake::{IntakeSession, Result};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// A transport that counts concurrent transfers.
///
/// When gated, each transfer blocks after reporting 10% until the test
/// releases a permit. File names containing `reject` fail with a 503.
pub struct GatedTransport {
    gate: Option<Semaphore>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl GatedTransport {
    /// Transfers complete as soon as they are polled.
    pub fn open() -> Self {
        Self::with_gate(None)
    }

    /// Transfers wait for [`GatedTransport::release`].
    pub fn gated() -> Self {
        Self::with_gate(Some(Semaphore::new(0)))
    }

    fn with_gate(gate: Option<Semaphore>) -> Self {
        Self {
            gate,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Lets `n` held transfers finish.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn transfer(
        &self,
        request: TransferRequest<'_>,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> std::result::Result<TransferReceipt, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        progress(10);
        match &self.gate {
            Some(gate) => gate
                .acquire()
                .await
                .map_err(|_| TransferError::new("connection reset"))?
                .forget(),
            None => tokio::task::yield_now().await,
        }
        progress(60);
        progress(100);

        if request.file_name.contains("reject") {
            return Err(TransferError::new("503 Service Unavailable"));
        }
        Ok(TransferReceipt {
            storage_key: format!("uploads/{}/{}", request.content_hash, request.file_name),
        })
    }
}

/// Test harness with a temp input directory and a session over an
/// in-memory queue.
pub struct TestHarness {
    temp_dir: TempDir,
    pub transport: Arc<GatedTransport>,
    pub repo: Arc<MemoryQueueRepository>,
    pub session: Arc<IntakeSession>,
}

impl TestHarness {
    pub fn new(
        config: IntakeConfig,
        transport: GatedTransport,
        assignments: Vec<RoleAssignment>,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let transport = Arc::new(transport);
        let repo = Arc::new(MemoryQueueRepository::new());
        let session = IntakeSession::new(
            config,
            Arc::new(CategoryRulesValidator),
            transport.clone(),
            repo.clone(),
            assignments,
        );

        Self {
            temp_dir,
            transport,
            repo,
            session: Arc::new(session),
        }
    }

    pub fn input_path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Write a file to the input directory.
    pub fn write_input(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.input_path(name);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    /// Writes one small file per name and stages them in order.
    pub fn stage(&self, names: &[&str]) -> Vec<String> {
        let paths: Vec<PathBuf> = names
            .iter()
            .map(|name| self.write_input(name, format!("content of {}", name).as_bytes()))
            .collect();
        self.session.stage_paths(&paths).expect("Failed to stage files")
    }

    /// Runs `submit` on its own task so the test can observe it in flight.
    pub fn spawn_submit(&self, site: Option<&str>) -> JoinHandle<Result<UploadSummary>> {
        let session = Arc::clone(&self.session);
        let site = site.map(str::to_string);
        tokio::spawn(async move { session.submit(site.as_deref()).await })
    }
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "Timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
