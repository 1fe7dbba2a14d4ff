//! Debounced, single-flight synchronization of the draft to the remote store.
//!
//! The engine performs no I/O and never sleeps. A driver feeds it edits and
//! the current time, asks [`DraftSyncEngine::poll`] whether a remote save is
//! due, performs that save however it likes, and reports the outcome through
//! [`DraftSyncEngine::complete`]. Phases:
//!
//! ```text
//! Idle -> Pending -> Saving -> Idle
//!                       |
//!                       +--> BackoffWait -> Saving
//!                       +--> Fallback (attempts exhausted)
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::config::SyncConfig;
use super::form_store::FormStateStore;
use super::notice::{Notice, NoticeQueue};
use crate::domain::{DraftRecord, ServiceResult};
use crate::infrastructure::{KeyValueStore, LocalFallbackStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Saving,
    Error,
}

/// Snapshot of sync progress for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub using_fallback: bool,
    pub error: Option<String>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            last_saved_at: None,
            using_fallback: false,
            error: None,
        }
    }
}

/// Identifies one remote save attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTicket {
    generation: u64,
    sequence: u64,
    attempt: u32,
}

impl SyncTicket {
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// A remote save the driver should perform now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub ticket: SyncTicket,
    pub record: DraftRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Flight {
    None,
    InFlight { ticket: SyncTicket, record: DraftRecord },
    Backoff { due_ms: u64, attempt: u32 },
}

#[derive(Debug)]
pub struct DraftSyncEngine {
    config: SyncConfig,
    user_id: String,
    generation: u64,
    sequence: u64,
    pending_due_ms: Option<u64>,
    flight: Flight,
    /// Edits not yet captured by a save attempt or a local write.
    dirty: bool,
    ready: bool,
    submitted: bool,
    offline_notified: bool,
    status: SyncStatus,
}

impl DraftSyncEngine {
    pub fn new(config: SyncConfig, user_id: impl Into<String>) -> Self {
        Self {
            config,
            user_id: user_id.into(),
            generation: 0,
            sequence: 0,
            pending_due_ms: None,
            flight: Flight::None,
            dirty: false,
            ready: false,
            submitted: false,
            offline_notified: false,
            status: SyncStatus::default(),
        }
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// True while a remote save is outstanding or waiting out a backoff.
    pub fn is_saving(&self) -> bool {
        !matches!(self.flight, Flight::None)
    }

    pub fn is_ready(&self) -> bool {
        self.ready && !self.submitted
    }

    /// True when some edit may be held neither remotely nor locally: an edit
    /// since the last attempt, a pending debounce, or a save not yet settled.
    pub fn has_unsaved_changes(&self) -> bool {
        !self.submitted && (self.dirty || self.pending_due_ms.is_some() || self.is_saving())
    }

    /// Called once bootstrap has established the user's existing state.
    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// Terminal: no further syncs will ever be issued for this session.
    pub fn mark_submitted(&mut self) {
        self.submitted = true;
        self.cancel_all();
        self.status.phase = SyncPhase::Idle;
        self.status.error = None;
    }

    /// Enters fallback mode without a failed save, e.g. when bootstrap could
    /// not reach the remote store.
    pub fn enter_fallback(&mut self, notices: &mut NoticeQueue) {
        self.status.using_fallback = true;
        self.notify_offline_once(notices);
    }

    /// Restarts the debounce window after an edit.
    pub fn on_mutation(&mut self, now_ms: u64) {
        if self.submitted {
            return;
        }
        self.dirty = true;
        self.pending_due_ms = Some(now_ms.saturating_add(self.config.debounce_ms));
    }

    /// Requests an immediate save. Ignored while a save is already underway.
    pub fn save_now(&mut self, now_ms: u64) {
        if self.submitted || self.is_saving() {
            return;
        }
        self.pending_due_ms = Some(now_ms);
    }

    /// Earliest moment at which [`poll`](Self::poll) may have work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        let backoff = match self.flight {
            Flight::Backoff { due_ms, .. } => Some(due_ms),
            _ => None,
        };
        match (self.pending_due_ms, backoff) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Returns the remote save that is due at `now_ms`, if any.
    pub fn poll(
        &mut self,
        now_ms: u64,
        form: &FormStateStore,
        wall: DateTime<Utc>,
    ) -> Option<SaveRequest> {
        let debounce_fired = self.pending_due_ms.is_some_and(|due| due <= now_ms);
        if debounce_fired {
            self.pending_due_ms = None;
        }

        if !self.is_ready() {
            if debounce_fired {
                debug!(user_id = %self.user_id, "sync skipped: session not ready or submitted");
            }
            return None;
        }

        match self.flight {
            Flight::InFlight { .. } => {
                if debounce_fired {
                    debug!(user_id = %self.user_id, "sync skipped: save already in flight");
                }
                None
            }
            Flight::Backoff { due_ms, attempt } => {
                if debounce_fired {
                    debug!(user_id = %self.user_id, "sync skipped: retry pending");
                }
                if due_ms <= now_ms {
                    Some(self.start_attempt(attempt, form, wall))
                } else {
                    None
                }
            }
            Flight::None if debounce_fired => Some(self.start_attempt(0, form, wall)),
            Flight::None => None,
        }
    }

    /// Records the outcome of the save identified by `ticket`.
    ///
    /// Outcomes for tickets that are no longer current (after a teardown or a
    /// user switch) are dropped. The local store is refreshed after every
    /// accepted outcome.
    #[allow(clippy::too_many_arguments)]
    pub fn complete<K: KeyValueStore>(
        &mut self,
        ticket: SyncTicket,
        result: ServiceResult<DateTime<Utc>>,
        now_ms: u64,
        form: &FormStateStore,
        wall: DateTime<Utc>,
        local: &LocalFallbackStore<K>,
        notices: &mut NoticeQueue,
    ) {
        let record = match &self.flight {
            Flight::InFlight { ticket: current, record } if *current == ticket => record.clone(),
            _ => {
                debug!(user_id = %self.user_id, ?ticket, "dropping stale sync outcome");
                return;
            }
        };
        self.flight = Flight::None;

        match result {
            Ok(saved_at) => {
                if self.status.using_fallback {
                    info!(user_id = %self.user_id, "remote draft store reachable again");
                    notices.push(Notice::BackOnline);
                }
                self.status = SyncStatus {
                    phase: SyncPhase::Idle,
                    last_saved_at: Some(saved_at),
                    using_fallback: false,
                    error: None,
                };
                let shadow = DraftRecord {
                    saved_at,
                    ..record
                };
                self.write_local(&shadow, local, notices);
                debug!(user_id = %self.user_id, attempt = ticket.attempt, "draft saved remotely");
            }
            Err(e) => {
                let latest = form.snapshot(wall);
                self.write_local(&latest, local, notices);
                self.dirty = false;

                let next_attempt = ticket.attempt + 1;
                if next_attempt < self.config.max_attempts {
                    let delay = self.config.backoff_delay_ms(ticket.attempt);
                    warn!(
                        user_id = %self.user_id,
                        attempt = ticket.attempt,
                        delay_ms = delay,
                        error = %e,
                        "draft save failed, retrying"
                    );
                    self.flight = Flight::Backoff {
                        due_ms: now_ms.saturating_add(delay),
                        attempt: next_attempt,
                    };
                } else {
                    warn!(
                        user_id = %self.user_id,
                        attempts = next_attempt,
                        error = %e,
                        "draft save gave up, using local fallback"
                    );
                    self.status.phase = SyncPhase::Error;
                    self.status.error = Some(e.to_string());
                    self.status.using_fallback = true;
                    self.notify_offline_once(notices);
                }
            }
        }
    }

    /// Writes the current form to the local store when
    /// [`has_unsaved_changes`](Self::has_unsaved_changes) says the latest
    /// edits would otherwise be lost. Returns whether a write happened.
    pub fn flush_local<K: KeyValueStore>(
        &mut self,
        form: &FormStateStore,
        wall: DateTime<Utc>,
        local: &LocalFallbackStore<K>,
        notices: &mut NoticeQueue,
    ) -> bool {
        if !self.ready || !self.has_unsaved_changes() {
            return false;
        }
        debug!(user_id = %self.user_id, "flushing unsaved draft to local storage");
        self.write_local(&form.snapshot(wall), local, notices);
        self.dirty = false;
        true
    }

    /// Invalidates the pending timer, any backoff and the in-flight ticket.
    pub fn teardown(&mut self) {
        self.cancel_all();
        self.ready = false;
        if self.status.phase == SyncPhase::Saving {
            self.status.phase = SyncPhase::Idle;
        }
    }

    fn cancel_all(&mut self) {
        self.generation += 1;
        self.pending_due_ms = None;
        self.flight = Flight::None;
    }

    fn start_attempt(&mut self, attempt: u32, form: &FormStateStore, wall: DateTime<Utc>) -> SaveRequest {
        self.sequence += 1;
        let ticket = SyncTicket {
            generation: self.generation,
            sequence: self.sequence,
            attempt,
        };
        let record = form.snapshot(wall);
        self.dirty = false;
        self.flight = Flight::InFlight {
            ticket,
            record: record.clone(),
        };
        self.status.phase = SyncPhase::Saving;
        SaveRequest { ticket, record }
    }

    fn write_local<K: KeyValueStore>(
        &self,
        record: &DraftRecord,
        local: &LocalFallbackStore<K>,
        notices: &mut NoticeQueue,
    ) {
        if let Err(e) = local.save_draft(&self.user_id, record) {
            notices.push(Notice::StorageWarning {
                message: e.to_string(),
            });
        }
    }

    fn notify_offline_once(&mut self, notices: &mut NoticeQueue) {
        if self.offline_notified {
            return;
        }
        self.offline_notified = true;
        info!(user_id = %self.user_id, "switching to local draft storage");
        notices.push(Notice::OfflineFallback);
    }
}
