//! Status polling for remote indexing jobs.
//!
//! [`Poller`] drives a video record from `Indexing` to `Ready` or `Failed`
//! by repeatedly asking a [`StatusLookup`] for the remote job status. Each
//! record has at most one polling chain; starting a new chain for a record
//! cancels the previous one.
//!
//! Every store write made by a chain happens under a per-record lock that
//! [`Poller::cancel`] and [`Poller::refresh`] also take, and the chain checks
//! its cancellation token after acquiring it. Once `cancel` returns, the
//! cancelled chain cannot touch the record again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;
use crate::domain::task::{Observation, TaskMetadata};
use crate::domain::video::{TransitionError, VideoRecord};
use crate::ports::indexing::{ApiError, StatusLookup};
use crate::ports::repository::{RecordStore, StoreError};

/// Summary stored on a record whose attempt budget ran out.
pub const TIMEOUT_SUMMARY: &str = "timeout";

/// Reads tried before a terminal update falls back to the chain's own copy.
const TERMINAL_READ_ATTEMPTS: u32 = 5;

/// Why a chain reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    Completed,
    RemoteFailure,
    Timeout,
}

/// Lifecycle of one polling chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Waiting `delay` before lookup number `attempt`
    Scheduled { attempt: u32, delay: Duration },
    /// Lookup number `attempt` is awaiting a response
    InFlight { attempt: u32 },
    Terminal(TerminalReason),
    Cancelled,
}

impl PollState {
    pub fn is_final(&self) -> bool {
        matches!(self, PollState::Terminal(_) | PollState::Cancelled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("remote job handle must not be empty")]
    EmptyJobId,

    #[error("video {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lookup(#[from] ApiError),
}

/// Observer for a started chain.
#[derive(Debug)]
pub struct PollHandle {
    local_id: String,
    state: watch::Receiver<PollState>,
}

impl PollHandle {
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Current state of the chain.
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Wait until the chain is terminal or cancelled.
    pub async fn finished(&mut self) -> PollState {
        let result = self
            .state
            .wait_for(PollState::is_final)
            .await
            .map(|state| state.clone());
        match result {
            Ok(state) => state,
            Err(_) => self.state.borrow().clone(),
        }
    }
}

/// Result of [`Poller::refresh`].
#[derive(Debug, Clone, PartialEq)]
pub struct Refreshed {
    pub record: VideoRecord,
    /// Whether this refresh moved the record to a terminal status
    pub finished: bool,
}

impl Refreshed {
    fn unchanged(record: VideoRecord) -> Self {
        Self {
            record,
            finished: false,
        }
    }
}

/// Registered chain for a record.
struct Chain {
    id: u64,
    cancel: CancellationToken,
}

/// Write lock shared by everyone currently working on a record.
struct LockEntry {
    lock: Arc<tokio::sync::Mutex<()>>,
    holders: usize,
}

#[derive(Default)]
struct Registry {
    chains: Mutex<HashMap<String, Chain>>,
    locks: Mutex<HashMap<String, LockEntry>>,
    next_id: AtomicU64,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle on a record's write lock. The registry entry goes away with the
/// last handle.
struct RecordLock {
    registry: Arc<Registry>,
    local_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl RecordLock {
    fn new(registry: &Arc<Registry>, local_id: &str) -> Self {
        let lock = {
            let mut locks = guard(&registry.locks);
            let entry = locks
                .entry(local_id.to_string())
                .or_insert_with(|| LockEntry {
                    lock: Arc::default(),
                    holders: 0,
                });
            entry.holders += 1;
            entry.lock.clone()
        };
        Self {
            registry: registry.clone(),
            local_id: local_id.to_string(),
            lock,
        }
    }

    async fn acquire(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        let mut locks = guard(&self.registry.locks);
        if let Some(entry) = locks.get_mut(&self.local_id) {
            entry.holders = entry.holders.saturating_sub(1);
            if entry.holders == 0 {
                locks.remove(&self.local_id);
            }
        }
    }
}

/// Runs and tracks polling chains. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Poller {
    store: Arc<dyn RecordStore>,
    config: PollConfig,
    registry: Arc<Registry>,
}

impl Poller {
    pub fn new(store: Arc<dyn RecordStore>, config: PollConfig) -> Self {
        Self {
            store,
            config,
            registry: Arc::new(Registry::default()),
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Start polling `remote_job_id` for the record `local_id`.
    ///
    /// A `Pending` record is moved to `Indexing` first. Any chain already
    /// active for the record is cancelled and replaced. `on_terminal` runs
    /// once, with the terminal record, unless the chain is cancelled.
    pub async fn begin_polling<F>(
        &self,
        local_id: &str,
        remote_job_id: &str,
        lookup: Arc<dyn StatusLookup>,
        on_terminal: F,
    ) -> Result<PollHandle, PollError>
    where
        F: FnOnce(VideoRecord) + Send + 'static,
    {
        if remote_job_id.is_empty() {
            return Err(PollError::EmptyJobId);
        }

        let lock = self.record_lock(local_id);
        let _write = lock.acquire().await;

        let mut record = self
            .store
            .get(local_id)
            .await?
            .ok_or_else(|| PollError::NotFound(local_id.to_string()))?;
        let needs_write = record.remote_job_id.is_none();
        record.mark_indexing(remote_job_id)?;
        if needs_write {
            self.store.put(&record).await?;
        }

        if self.cancel_locked(local_id) {
            tracing::info!(local_id, "Replacing active polling chain");
        }

        let cancel = CancellationToken::new();
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        guard(&self.registry.chains).insert(
            local_id.to_string(),
            Chain {
                id,
                cancel: cancel.clone(),
            },
        );

        let (state_tx, state_rx) = watch::channel(PollState::Scheduled {
            attempt: 1,
            delay: Duration::ZERO,
        });
        let run = ChainRun {
            poller: self.clone(),
            id,
            local_id: local_id.to_string(),
            remote_job_id: remote_job_id.to_string(),
            lookup,
            cancel,
            state: state_tx,
            last_seen: record,
        };
        tokio::spawn(run.run(on_terminal));

        tracing::info!(local_id, remote_job_id, "Polling started");
        Ok(PollHandle {
            local_id: local_id.to_string(),
            state: state_rx,
        })
    }

    /// Cancel the active chain for a record. Returns whether one was active.
    ///
    /// The record's status is left untouched.
    pub async fn cancel(&self, local_id: &str) -> bool {
        if !self.is_active(local_id) {
            return false;
        }
        let lock = self.record_lock(local_id);
        let _write = lock.acquire().await;
        let cancelled = self.cancel_locked(local_id);
        if cancelled {
            tracing::info!(local_id, "Polling cancelled");
        }
        cancelled
    }

    /// One-off status check outside the polling schedule.
    ///
    /// A terminal answer finishes the record and cancels any active chain;
    /// otherwise the record stays `Indexing` with the remote status in its
    /// summary. Terminal records are returned unchanged.
    pub async fn refresh(
        &self,
        local_id: &str,
        lookup: &dyn StatusLookup,
    ) -> Result<Refreshed, PollError> {
        let record = self
            .store
            .get(local_id)
            .await?
            .ok_or_else(|| PollError::NotFound(local_id.to_string()))?;
        if record.is_terminal() {
            return Ok(Refreshed::unchanged(record));
        }
        let remote_job_id = record
            .remote_job_id
            .clone()
            .ok_or_else(|| TransitionError::NotSubmitted {
                local_id: local_id.to_string(),
            })?;

        let status = lookup.lookup(&remote_job_id).await?;

        let lock = self.record_lock(local_id);
        let _write = lock.acquire().await;

        // Re-read: the record may have changed during the lookup
        let mut current = self
            .store
            .get(local_id)
            .await?
            .ok_or_else(|| PollError::NotFound(local_id.to_string()))?;
        if current.is_terminal() {
            return Ok(Refreshed::unchanged(current));
        }

        match status.observe() {
            Observation::Ready(metadata) => current.mark_ready(metadata)?,
            Observation::Failed { message } => current.mark_failed(message)?,
            Observation::Processing { status } => {
                current.summary = format!("Status: {} - Still processing...", status);
            }
        }
        self.store.put(&current).await?;

        let finished = current.is_terminal();
        if finished && self.cancel_locked(local_id) {
            tracing::info!(local_id, status = %current.status, "Refresh finished active chain");
        }
        Ok(Refreshed {
            record: current,
            finished,
        })
    }

    pub fn is_active(&self, local_id: &str) -> bool {
        guard(&self.registry.chains).contains_key(local_id)
    }

    pub fn active_count(&self) -> usize {
        guard(&self.registry.chains).len()
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        guard(&self.registry.locks).len()
    }

    fn record_lock(&self, local_id: &str) -> RecordLock {
        RecordLock::new(&self.registry, local_id)
    }

    /// Caller must hold the record lock.
    fn cancel_locked(&self, local_id: &str) -> bool {
        match guard(&self.registry.chains).remove(local_id) {
            Some(chain) => {
                chain.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Caller must hold the record lock.
    fn deregister_locked(&self, local_id: &str, id: u64) {
        let mut chains = guard(&self.registry.chains);
        if chains.get(local_id).map(|c| c.id) == Some(id) {
            chains.remove(local_id);
        }
    }
}

enum Outcome {
    Ready(TaskMetadata),
    Failed(String),
    Timeout,
}

impl Outcome {
    fn reason(&self) -> TerminalReason {
        match self {
            Outcome::Ready(_) => TerminalReason::Completed,
            Outcome::Failed(_) => TerminalReason::RemoteFailure,
            Outcome::Timeout => TerminalReason::Timeout,
        }
    }
}

enum Step {
    Progress,
    Retry,
    Finish(Outcome),
}

/// One polling chain, owned by its spawned task.
struct ChainRun {
    poller: Poller,
    id: u64,
    local_id: String,
    remote_job_id: String,
    lookup: Arc<dyn StatusLookup>,
    cancel: CancellationToken,
    state: watch::Sender<PollState>,
    /// Latest copy of the record this chain read or wrote
    last_seen: VideoRecord,
}

impl ChainRun {
    async fn run<F>(mut self, on_terminal: F)
    where
        F: FnOnce(VideoRecord) + Send + 'static,
    {
        let max_attempts = self.poller.config.max_attempts;
        let mut attempt: u32 = 0;
        let mut delay = Duration::ZERO;

        loop {
            self.state.send_replace(PollState::Scheduled {
                attempt: attempt + 1,
                delay,
            });
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
            self.state.send_replace(PollState::InFlight { attempt });
            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(),
                response = self.lookup.lookup(&self.remote_job_id) => response,
            };

            let exhausted = attempt >= max_attempts;
            let step = match response {
                Ok(status) => match status.observe() {
                    Observation::Ready(metadata) => Step::Finish(Outcome::Ready(metadata)),
                    Observation::Failed { message } => Step::Finish(Outcome::Failed(message)),
                    Observation::Processing { status } => {
                        tracing::debug!(
                            local_id = %self.local_id,
                            attempt,
                            max_attempts,
                            status = %status,
                            "Task still processing",
                        );
                        if exhausted {
                            Step::Finish(Outcome::Timeout)
                        } else {
                            Step::Progress
                        }
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        local_id = %self.local_id,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Status check failed",
                    );
                    if exhausted {
                        Step::Finish(Outcome::Timeout)
                    } else {
                        Step::Retry
                    }
                }
            };

            match step {
                Step::Progress => {
                    if !self.write_progress(attempt).await {
                        return;
                    }
                    delay = self.poller.config.progress_delay(attempt);
                }
                Step::Retry => {
                    delay = self.poller.config.retry_delay(attempt);
                    tracing::debug!(
                        local_id = %self.local_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying status check",
                    );
                }
                Step::Finish(outcome) => {
                    self.finish(outcome, on_terminal).await;
                    return;
                }
            }
        }
    }

    /// Persist advisory progress. Returns false if the chain must stop.
    async fn write_progress(&mut self, attempt: u32) -> bool {
        let lock = self.poller.record_lock(&self.local_id);
        let _write = lock.acquire().await;
        if self.cancel.is_cancelled() {
            self.cancelled();
            return false;
        }

        let mut record = match self.poller.store.get(&self.local_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::info!(local_id = %self.local_id, "Record deleted, stopping poll");
                self.poller.deregister_locked(&self.local_id, self.id);
                self.cancelled();
                return false;
            }
            Err(e) => {
                // Progress is advisory; keep polling
                tracing::warn!(local_id = %self.local_id, error = %e, "Failed to read record");
                return true;
            }
        };
        if record.is_terminal() {
            tracing::info!(local_id = %self.local_id, status = %record.status, "Record already terminal, stopping poll");
            self.poller.deregister_locked(&self.local_id, self.id);
            self.cancelled();
            return false;
        }

        record.record_progress(self.poller.config.progress_percent(attempt));
        if let Err(e) = self.poller.store.put(&record).await {
            tracing::warn!(local_id = %self.local_id, error = %e, "Failed to save progress");
        }
        self.last_seen = record;
        true
    }

    /// Write the terminal status and hand the record to `on_terminal`.
    ///
    /// Failed reads are retried on the retry schedule. Once they run out the
    /// outcome is applied to the last copy this chain saw.
    async fn finish<F>(&self, outcome: Outcome, on_terminal: F)
    where
        F: FnOnce(VideoRecord),
    {
        let reason = outcome.reason();
        let mut failed_reads: u32 = 0;
        let record = loop {
            let delay = {
                let lock = self.poller.record_lock(&self.local_id);
                let _write = lock.acquire().await;
                if self.cancel.is_cancelled() {
                    self.cancelled();
                    return;
                }

                let read = match self.poller.store.get(&self.local_id).await {
                    Ok(Some(record)) => Ok(record),
                    Ok(None) => {
                        tracing::info!(local_id = %self.local_id, "Record deleted before completion");
                        self.poller.deregister_locked(&self.local_id, self.id);
                        self.cancelled();
                        return;
                    }
                    Err(e) if failed_reads + 1 < TERMINAL_READ_ATTEMPTS => {
                        failed_reads += 1;
                        let delay = self.poller.config.retry_delay(failed_reads);
                        tracing::warn!(
                            local_id = %self.local_id,
                            failed_reads,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Failed to read record, retrying terminal update",
                        );
                        Err(delay)
                    }
                    Err(e) => {
                        tracing::error!(
                            local_id = %self.local_id,
                            error = %e,
                            "Failed to read record, finishing from last known copy",
                        );
                        Ok(self.last_seen.clone())
                    }
                };

                match read {
                    Ok(mut record) => {
                        self.poller.deregister_locked(&self.local_id, self.id);
                        let applied = match outcome {
                            Outcome::Ready(metadata) => record.mark_ready(metadata),
                            Outcome::Failed(message) => record.mark_failed(message),
                            Outcome::Timeout => record.mark_failed(TIMEOUT_SUMMARY),
                        };
                        if let Err(e) = applied {
                            // Finished elsewhere; never overwrite a terminal record
                            tracing::info!(local_id = %self.local_id, error = %e, "Skipping terminal update");
                            self.cancelled();
                            return;
                        }

                        if let Err(e) = self.poller.store.put(&record).await {
                            tracing::error!(local_id = %self.local_id, error = %e, "Failed to save terminal status");
                        }
                        break record;
                    }
                    Err(delay) => delay,
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(),
                _ = tokio::time::sleep(delay) => {}
            }
        };

        tracing::info!(
            local_id = %self.local_id,
            status = %record.status,
            reason = ?reason,
            "Polling finished",
        );
        self.state.send_replace(PollState::Terminal(reason));
        on_terminal(record);
    }

    fn cancelled(&self) {
        self.state.send_replace(PollState::Cancelled);
    }
}
