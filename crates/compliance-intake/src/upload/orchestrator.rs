use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::join_all;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::auth::{Permission, PermissionResolver};
use crate::broadcast::{UploadEventBroadcaster, UploadTracker};
use crate::config::UploadLimits;
use crate::failure::ClassifiedError;
use crate::queue::{NewQueueEntry, PersistenceError, QueueEntry, QueueRepository};
use crate::staging::{StagedFile, StagingRegistry};
use crate::telemetry::redact_path;

use super::hash::compute_content_hash_unless;
use super::progress::{UploadProgress, UploadStatus};
use super::transport::{TransferRequest, Transport};
use super::UploadError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedUpload {
    pub file_id: String,
    pub queue_entry_id: String,
    pub storage_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    pub file_id: String,
    pub file_name: String,
    pub error: ClassifiedError,
}

/// Result of one `upload_ready` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub completed: Vec<CompletedUpload>,
    pub failed: Vec<FailedUpload>,
    pub cancelled: Vec<String>,
}

enum Outcome {
    Completed(CompletedUpload),
    Failed(FailedUpload),
    Cancelled(String),
}

struct InFlight {
    /// Admission sequence number; lower was admitted earlier.
    seq: u64,
    progress: UploadProgress,
    cancel: Arc<Notify>,
    tracker: UploadTracker,
}

#[derive(Default)]
struct GateState {
    entries: HashMap<String, InFlight>,
    hashing_in_flight: usize,
    next_seq: u64,
}

/// Admits ready files into hashing and transfer under the configured limits
/// and tracks each one until it completes, fails or is cancelled.
///
/// Both gates are fair semaphores, so files waiting for a slot are served
/// in admission order. The bookkeeping mutex is never held across an await.
pub struct UploadOrchestrator {
    limits: UploadLimits,
    transport: Arc<dyn Transport>,
    queue: Arc<dyn QueueRepository>,
    events: UploadEventBroadcaster,
    transfer_gate: Semaphore,
    hash_gate: Semaphore,
    state: Mutex<GateState>,
}

impl UploadOrchestrator {
    pub fn new(
        limits: UploadLimits,
        transport: Arc<dyn Transport>,
        queue: Arc<dyn QueueRepository>,
        events: UploadEventBroadcaster,
    ) -> Self {
        Self {
            limits,
            transport,
            queue,
            events,
            transfer_gate: Semaphore::new(limits.transfer_concurrency.max(1)),
            hash_gate: Semaphore::new(limits.hash_concurrency.max(1)),
            state: Mutex::new(GateState::default()),
        }
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    pub fn events(&self) -> &UploadEventBroadcaster {
        &self.events
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Upload state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Uploads every ready file in the registry.
    ///
    /// The caller must hold the `upload` permission for `site`; a denial is
    /// returned before any state changes. Files already in flight from an
    /// earlier call are skipped. Individual file failures are reported in
    /// the summary, not as an `Err`.
    pub async fn upload_ready(
        &self,
        staging: &StagingRegistry,
        resolver: &PermissionResolver,
        site: Option<&str>,
    ) -> Result<UploadSummary, UploadError> {
        let role = resolver.require(Permission::Upload, site)?;
        let files = staging.ready_files();

        let span = info_span!("upload_batch", role = %role, ready = files.len());
        async move {
            let admitted: Vec<(StagedFile, Arc<Notify>)> = files
                .into_iter()
                .filter_map(|file| self.admit(&file).map(|cancel| (file, cancel)))
                .collect();
            info!(admitted = admitted.len(), "Admitted files for upload");

            let outcomes = join_all(
                admitted
                    .into_iter()
                    .map(|(file, cancel)| self.run_one(staging, file, cancel)),
            )
            .await;

            let mut summary = UploadSummary::default();
            for outcome in outcomes {
                match outcome {
                    Outcome::Completed(done) => summary.completed.push(done),
                    Outcome::Failed(failed) => summary.failed.push(failed),
                    Outcome::Cancelled(id) => summary.cancelled.push(id),
                }
            }
            info!(
                completed = summary.completed.len(),
                failed = summary.failed.len(),
                cancelled = summary.cancelled.len(),
                "Upload batch finished"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Registers the file as `pending`. Returns `None` if it is already in
    /// flight. A previous error entry is replaced.
    fn admit(&self, file: &StagedFile) -> Option<Arc<Notify>> {
        let mut state = self.lock();
        if let Some(existing) = state.entries.get(&file.id) {
            if existing.progress.status != UploadStatus::Error {
                debug!(file_id = %file.id, "Already in flight, skipping");
                return None;
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let cancel = Arc::new(Notify::new());
        let tracker = self.events.track(&file.id, &file.file_name);
        state.entries.insert(
            file.id.clone(),
            InFlight {
                seq,
                progress: UploadProgress::pending(&file.id),
                cancel: Arc::clone(&cancel),
                tracker,
            },
        );
        debug!(file_id = %file.id, file = %redact_path(&file.path), seq, "Admitted");
        Some(cancel)
    }

    async fn run_one(
        &self,
        staging: &StagingRegistry,
        file: StagedFile,
        cancel: Arc<Notify>,
    ) -> Outcome {
        let span = info_span!("upload", file_id = %file.id, file = %redact_path(&file.path));
        async {
            match self.upload_one(staging, &file, &cancel).await {
                Ok(done) => {
                    info!(queue_entry_id = %done.queue_entry_id, "Upload complete");
                    Outcome::Completed(done)
                }
                Err(UploadError::Cancelled { file_id }) => {
                    info!("Upload cancelled");
                    Outcome::Cancelled(file_id)
                }
                Err(e) => {
                    let error = ClassifiedError::from_raw(&e.to_string());
                    if !self.fail(&file.id, &error) {
                        return Outcome::Cancelled(file.id.clone());
                    }
                    warn!(kind = ?error.kind, retryable = error.retryable, "Upload failed: {}", error.detail);
                    Outcome::Failed(FailedUpload {
                        file_id: file.id.clone(),
                        file_name: file.file_name.clone(),
                        error,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn upload_one(
        &self,
        staging: &StagingRegistry,
        file: &StagedFile,
        cancel: &Notify,
    ) -> Result<CompletedUpload, UploadError> {
        let cancelled = || UploadError::Cancelled {
            file_id: file.id.clone(),
        };

        let _transfer_permit = tokio::select! {
            permit = self.transfer_gate.acquire() => permit.map_err(|_| UploadError::GateClosed)?,
            _ = cancel.notified() => return Err(cancelled()),
        };

        // Hash just-in-time; a retry reuses the hash from the earlier attempt.
        let known_hash = staging
            .get(&file.id)
            .and_then(|f| f.content_hash)
            .or_else(|| file.content_hash.clone());
        let content_hash = match known_hash {
            Some(hash) => hash,
            None => {
                let _hash_permit = tokio::select! {
                    permit = self.hash_gate.acquire() => permit.map_err(|_| UploadError::GateClosed)?,
                    _ = cancel.notified() => return Err(cancelled()),
                };
                if !self.set_status(&file.id, UploadStatus::Hashing) {
                    return Err(cancelled());
                }
                let abort = Arc::new(AtomicBool::new(false));
                let hashing = compute_content_hash_unless(file.path.clone(), Arc::clone(&abort));
                tokio::pin!(hashing);
                let hash = tokio::select! {
                    hash = &mut hashing => hash?,
                    _ = cancel.notified() => {
                        // The hash permit is held until the blocking read loop stops.
                        abort.store(true, Ordering::Relaxed);
                        let _ = hashing.await;
                        return Err(cancelled());
                    }
                };
                staging.set_content_hash(&file.id, hash.clone());
                hash
            }
        };

        if !self.set_status(&file.id, UploadStatus::Uploading) {
            return Err(cancelled());
        }

        let request = TransferRequest {
            file_id: &file.id,
            path: &file.path,
            file_name: &file.file_name,
            file_size: file.file_size,
            mime_type: file.mime_type.as_deref(),
            content_hash: &content_hash,
        };
        let report = |percent: u8| self.report_percent(&file.id, percent);
        let receipt = tokio::select! {
            result = self.transport.transfer(request, &report) => result?,
            _ = cancel.notified() => return Err(cancelled()),
        };

        let entry = QueueEntry::uploaded(NewQueueEntry {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: file.file_name.clone(),
            storage_key: receipt.storage_key.clone(),
            content_hash: Some(content_hash),
            file_size: i64::try_from(file.file_size).unwrap_or(i64::MAX),
            mime_type: file.mime_type.clone(),
            category: file.effective_category().map(str::to_string),
            state_code: file.effective_state_code().map(str::to_string),
        });
        if !self.complete(&file.id, &entry)? {
            return Err(cancelled());
        }
        staging.remove(&file.id);

        Ok(CompletedUpload {
            file_id: file.id.clone(),
            queue_entry_id: entry.id,
            storage_key: receipt.storage_key,
        })
    }

    /// Moves a tracked file to `status` at 0%. Returns false if the file is
    /// no longer tracked.
    fn set_status(&self, file_id: &str, status: UploadStatus) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(entry) = state.entries.get_mut(file_id) else {
            return false;
        };
        let was_hashing = entry.progress.status == UploadStatus::Hashing;
        entry.progress = UploadProgress::new(file_id, status, 0);
        entry.tracker.status(status, 0);

        let is_hashing = status == UploadStatus::Hashing;
        if is_hashing && !was_hashing {
            state.hashing_in_flight += 1;
        } else if was_hashing && !is_hashing {
            state.hashing_in_flight = state.hashing_in_flight.saturating_sub(1);
        }
        debug!(file_id = %file_id, status = %status, hashing = state.hashing_in_flight, "Upload status changed");
        true
    }

    /// Percent only moves forward while uploading.
    fn report_percent(&self, file_id: &str, percent: u8) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.get_mut(file_id) {
            let percent = percent.min(100);
            if entry.progress.status == UploadStatus::Uploading && percent > entry.progress.percent {
                entry.progress.percent = percent;
                entry.tracker.status(UploadStatus::Uploading, percent);
            }
        }
    }

    /// Records the queue entry and drops the file from the in-flight map,
    /// unless it was cancelled first.
    fn complete(&self, file_id: &str, entry: &QueueEntry) -> Result<bool, PersistenceError> {
        let mut state = self.lock();
        if !state.entries.contains_key(file_id) {
            return Ok(false);
        }
        self.queue.insert(entry)?;
        if let Some(done) = state.entries.remove(file_id) {
            done.tracker.done(&entry.id);
        }
        Ok(true)
    }

    /// Replaces the file's progress with an error entry. Returns false if the
    /// file is no longer tracked.
    fn fail(&self, file_id: &str, error: &ClassifiedError) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(entry) = state.entries.get_mut(file_id) else {
            return false;
        };
        if entry.progress.status == UploadStatus::Hashing {
            state.hashing_in_flight = state.hashing_in_flight.saturating_sub(1);
        }
        entry.progress = UploadProgress::failed(file_id, &error.message);
        entry.tracker.failed(&error.message);
        true
    }

    /// Stops a pending, hashing or uploading file and frees its slot. The
    /// file stays staged. Returns false if nothing was in flight.
    pub fn cancel(&self, file_id: &str) -> bool {
        let mut state = self.lock();
        let cancellable = state
            .entries
            .get(file_id)
            .is_some_and(|e| !matches!(e.progress.status, UploadStatus::Done | UploadStatus::Error));
        if !cancellable {
            return false;
        }
        let Some(entry) = state.entries.remove(file_id) else {
            return false;
        };
        if entry.progress.status == UploadStatus::Hashing {
            state.hashing_in_flight = state.hashing_in_flight.saturating_sub(1);
        }
        // Stores a permit if the task is between await points.
        entry.cancel.notify_one();
        info!(file_id = %file_id, status = %entry.progress.status, "Cancelling upload");
        true
    }

    /// Removes a file's error entry once the user has seen it.
    pub fn dismiss(&self, file_id: &str) -> bool {
        let mut state = self.lock();
        let is_error = state
            .entries
            .get(file_id)
            .is_some_and(|e| e.progress.status == UploadStatus::Error);
        is_error && state.entries.remove(file_id).is_some()
    }

    /// Number of pending files admitted before this one, or `None` if the
    /// file is not pending.
    pub fn queue_position(&self, file_id: &str) -> Option<usize> {
        let state = self.lock();
        let entry = state.entries.get(file_id)?;
        if entry.progress.status != UploadStatus::Pending {
            return None;
        }
        Some(
            state
                .entries
                .values()
                .filter(|e| e.progress.status == UploadStatus::Pending && e.seq < entry.seq)
                .count(),
        )
    }

    pub fn progress(&self, file_id: &str) -> Option<UploadProgress> {
        self.lock().entries.get(file_id).map(|e| e.progress.clone())
    }

    /// All tracked files in admission order.
    pub fn snapshot(&self) -> Vec<UploadProgress> {
        let state = self.lock();
        let mut entries: Vec<&InFlight> = state.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.progress.clone()).collect()
    }

    /// Files currently hashing or uploading.
    pub fn active_transfers(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|e| e.progress.status.is_active())
            .count()
    }

    pub fn hashing_in_flight(&self) -> usize {
        self.lock().hashing_in_flight
    }
}
