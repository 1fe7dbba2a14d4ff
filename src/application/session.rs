//! One user's wizard session: form state, draft sync and submission wired
//! to a remote service and a device-local store.

use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::bootstrap::{BootstrapReport, BootstrapSequencer, BootstrapStart, RemoteSnapshot};
use super::clock::Clock;
use super::config::SyncConfig;
use super::form_store::{FormChange, FormStateStore};
use super::notice::{Notice, NoticeQueue};
use super::submission::{SubmissionState, SubmissionStateMachine, SubmitOutcome};
use super::sync::{DraftSyncEngine, SyncStatus};
use super::worker::{Job, JobOutput, JobResult, RemoteWorker};
use crate::domain::{AdmissionService, AttachedDocument, DocumentSlot, FieldValue, FormField, FormState, Step};
use crate::infrastructure::{KeyValueStore, LocalFallbackStore};

/// How often the event loop should look for finished remote calls.
const RESULT_POLL: Duration = Duration::from_millis(50);

/// Drives the wizard for a single user.
///
/// Remote calls run on background threads. [`tick`](Self::tick) collects
/// their results and starts any save that has come due; the caller decides
/// how often to tick, typically at [`next_wakeup`](Self::next_wakeup).
/// Editing is refused while the startup sequence is waiting on the server
/// and while a submission is underway.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use admitsync::application::{ManualClock, SyncConfig, WizardSession};
/// use admitsync::domain::{FieldValue, FormField};
/// use admitsync::infrastructure::{LoopbackAdmissionService, MemoryStore};
///
/// let clock = ManualClock::new();
/// let service = LoopbackAdmissionService::new();
/// let mut session = WizardSession::new(
///     service.clone(),
///     MemoryStore::new(),
///     Box::new(clock.clone()),
///     SyncConfig::default(),
/// );
/// session.start("student-1");
/// assert!(session.wait_for_tasks(Duration::from_secs(5)));
///
/// session.set_field(FormField::FirstName, FieldValue::Text("Meera".into()));
/// clock.advance(1_000);
/// session.tick();
/// assert!(session.wait_for_tasks(Duration::from_secs(5)));
///
/// assert_eq!(service.save_calls(), 1);
/// assert!(session.status().last_saved_at.is_some());
/// ```
pub struct WizardSession<S, K> {
    user_id: String,
    worker: RemoteWorker<S>,
    /// Bumped on every start and teardown; older results are dropped.
    epoch: u64,
    local: LocalFallbackStore<K>,
    clock: Box<dyn Clock>,
    sync_config: SyncConfig,
    form: FormStateStore,
    changes: Receiver<FormChange>,
    sync: DraftSyncEngine,
    submission: SubmissionStateMachine,
    notices: NoticeQueue,
    /// Set while the startup sequence waits on the server.
    loading: Option<BootstrapStart>,
    report: Option<BootstrapReport>,
    submit_outcome: Option<SubmitOutcome>,
}

impl<S, K> WizardSession<S, K>
where
    S: AdmissionService + 'static,
    K: KeyValueStore,
{
    pub fn new(service: S, storage: K, clock: Box<dyn Clock>, sync_config: SyncConfig) -> Self {
        let mut form = FormStateStore::new();
        let changes = form.subscribe();
        Self {
            user_id: String::new(),
            worker: RemoteWorker::new(service),
            epoch: 0,
            local: LocalFallbackStore::new(storage),
            clock,
            sync_config,
            form,
            changes,
            sync: DraftSyncEngine::new(sync_config, ""),
            submission: SubmissionStateMachine::new(""),
            notices: NoticeQueue::default(),
            loading: None,
            report: None,
            submit_outcome: None,
        }
    }

    /// Starts the session for `user_id`.
    ///
    /// Local cleanup and the cached submission marker are handled before
    /// this returns; the server is asked in the background, and the
    /// [`report`](Self::report) is available once it has answered.
    pub fn start(&mut self, user_id: &str) {
        self.reset_for(user_id);
        let start = BootstrapSequencer::begin(&self.user_id, &self.local);
        self.loading = Some(start);
        self.worker.spawn(self.epoch, Job::Bootstrap);
        info!(user_id = %self.user_id, "session starting");
    }

    /// Ends this user's session and starts another one on the same device.
    pub fn switch_user(&mut self, user_id: &str) {
        info!(from = %self.user_id, to = %user_id, "switching user");
        self.teardown();
        self.start(user_id);
    }

    /// Cancels pending and in-flight remote work. Edits not yet held
    /// remotely are written to the local store first.
    pub fn teardown(&mut self) {
        self.sync
            .flush_local(&self.form, self.clock.wall_time(), &self.local, &mut self.notices);
        self.sync.teardown();
        self.epoch += 1;
        self.loading = None;
    }

    /// Quits the session: starts a save for a pending debounce, waits up to
    /// `grace` for remote work to settle, then tears down.
    pub fn shutdown(&mut self, grace: Duration) {
        if self.sync.next_deadline().is_some() {
            self.save_now();
        }
        if !self.wait_for_tasks(grace) {
            info!(user_id = %self.user_id, "remote work still running at shutdown");
        }
        self.teardown();
    }

    pub fn set_field(&mut self, field: FormField, value: FieldValue) -> bool {
        self.edit(|form| form.set(field, value))
    }

    pub fn set_text(&mut self, field: FormField, text: impl Into<String>) -> bool {
        self.set_field(field, FieldValue::Text(text.into()))
    }

    pub fn toggle_flag(&mut self, field: FormField) -> bool {
        let current = self.form.get().flag(field);
        self.set_field(field, FieldValue::Flag(!current))
    }

    pub fn set_step(&mut self, step: i64) -> bool {
        self.edit(|form| form.set_step(step))
    }

    pub fn next_step(&mut self) -> bool {
        let next = self.form.step().next();
        next != self.form.step() && self.set_step(i64::from(next.get()))
    }

    pub fn prev_step(&mut self) -> bool {
        let prev = self.form.step().prev();
        prev != self.form.step() && self.set_step(i64::from(prev.get()))
    }

    pub fn attach_document(&mut self, slot: DocumentSlot, document: AttachedDocument) -> bool {
        self.edit(|form| form.attach(slot, document))
    }

    pub fn detach_document(&mut self, slot: DocumentSlot) -> bool {
        self.edit(|form| form.detach(slot))
    }

    /// Applies finished remote results, then starts the save that is due
    /// now, if any. Never blocks.
    pub fn tick(&mut self) {
        while let Some(result) = self.worker.try_next() {
            self.apply(result);
        }
        let now = self.clock.now_ms();
        if let Some(request) = self.sync.poll(now, &self.form, self.clock.wall_time()) {
            self.worker.spawn(self.epoch, Job::SaveDraft(request));
        }
    }

    /// Blocks until every started remote call has reported back, applying
    /// results as they arrive. Returns `false` if `timeout` ran out first.
    pub fn wait_for_tasks(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.worker.outstanding() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.worker.next_timeout(remaining) {
                Some(result) => self.apply(result),
                None => return false,
            }
        }
        true
    }

    /// Saves immediately, skipping the debounce window.
    pub fn save_now(&mut self) {
        self.sync.save_now(self.clock.now_ms());
        self.tick();
    }

    /// Retry offered by the offline notice.
    pub fn retry_sync(&mut self) {
        self.save_now();
    }

    /// Starts a submission in the background. Returns `false` when none was
    /// started; [`take_submit_outcome`](Self::take_submit_outcome) then says why.
    pub fn submit(&mut self) -> bool {
        if self.loading.is_some() {
            self.submit_outcome = Some(SubmitOutcome::NotAllowed);
            return false;
        }
        match self.submission.begin_submit(self.form.get()) {
            Ok(payload) => {
                info!(user_id = %self.user_id, "submitting application");
                self.worker.spawn(self.epoch, Job::Submit(payload));
                true
            }
            Err(outcome) => {
                self.submit_outcome = Some(outcome);
                false
            }
        }
    }

    /// Uploads the documents that failed during submission again. Returns
    /// `false` when there is nothing to retry or an upload is running.
    pub fn retry_documents(&mut self) -> bool {
        match self.submission.begin_document_retry(self.form.get()) {
            Some(retry) => {
                info!(user_id = %self.user_id, documents = retry.documents.len(), "retrying document upload");
                self.worker.spawn(self.epoch, Job::UploadDocuments(retry));
                true
            }
            None => false,
        }
    }

    /// The outcome of the latest submission, once known.
    pub fn take_submit_outcome(&mut self) -> Option<SubmitOutcome> {
        self.submit_outcome.take()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn form(&self) -> &FormState {
        self.form.get()
    }

    pub fn step(&self) -> Step {
        self.form.step()
    }

    /// Whether edits are currently refused.
    pub fn is_locked(&self) -> bool {
        self.form.is_locked() || !self.accepts_edits()
    }

    /// True until the server has answered the startup questions.
    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    /// Application id from this device's cached marker, shown while the
    /// server has not yet confirmed or denied it.
    pub fn provisional_submission(&self) -> Option<&str> {
        self.loading
            .as_ref()
            .and_then(|start| start.provisional_submission.as_deref())
    }

    pub fn status(&self) -> &SyncStatus {
        self.sync.status()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.sync.has_unsaved_changes()
    }

    pub fn submission_state(&self) -> &SubmissionState {
        self.submission.state()
    }

    pub fn is_submitted(&self) -> bool {
        self.submission.is_submitted()
    }

    pub fn application_id(&self) -> Option<&str> {
        self.submission.application_id()
    }

    pub fn pending_documents(&self) -> &[DocumentSlot] {
        self.submission.pending_documents()
    }

    pub fn is_uploading_documents(&self) -> bool {
        self.submission.is_uploading()
    }

    pub fn report(&self) -> Option<&BootstrapReport> {
        self.report.as_ref()
    }

    pub fn local(&self) -> &LocalFallbackStore<K> {
        &self.local
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    /// Time until the session next has work, for sizing the event-loop wait.
    pub fn next_wakeup(&self) -> Option<Duration> {
        let deadline = self
            .sync
            .next_deadline()
            .map(|due| Duration::from_millis(due.saturating_sub(self.clock.now_ms())));
        if self.worker.outstanding() > 0 {
            return Some(deadline.map_or(RESULT_POLL, |due| due.min(RESULT_POLL)));
        }
        deadline
    }

    fn accepts_edits(&self) -> bool {
        self.loading.is_none() && *self.submission.state() != SubmissionState::Submitting
    }

    fn edit(&mut self, write: impl FnOnce(&mut FormStateStore) -> bool) -> bool {
        if !self.accepts_edits() {
            debug!(user_id = %self.user_id, "edit refused while loading or submitting");
            return false;
        }
        let applied = write(&mut self.form);
        self.absorb_changes();
        applied
    }

    fn apply(&mut self, result: JobResult) {
        if result.epoch != self.epoch {
            debug!(epoch = result.epoch, current = self.epoch, "dropping result from an ended session");
            return;
        }
        match result.output {
            JobOutput::Bootstrap(remote) => self.finish_bootstrap(remote),
            JobOutput::DraftSaved { ticket, result } => {
                self.sync.complete(
                    ticket,
                    result,
                    self.clock.now_ms(),
                    &self.form,
                    self.clock.wall_time(),
                    &self.local,
                    &mut self.notices,
                );
            }
            JobOutput::Submission(resolution) => {
                let outcome = self
                    .submission
                    .finish_submit(resolution, &self.local, &mut self.notices);
                if outcome.application_id().is_some() {
                    self.form.lock();
                    self.sync.mark_submitted();
                }
                self.submit_outcome = Some(outcome);
            }
            JobOutput::DocumentsUploaded(result) => {
                self.submission.finish_document_retry(result, &mut self.notices);
            }
        }
    }

    fn finish_bootstrap(&mut self, remote: RemoteSnapshot) {
        let Some(start) = self.loading.take() else {
            return;
        };
        let report = BootstrapSequencer::finish(
            &self.user_id,
            start,
            remote,
            &self.local,
            &mut self.submission,
            &mut self.form,
            &mut self.notices,
        );
        // Restores are not edits; nothing to sync yet.
        self.changes.try_iter().for_each(drop);

        if self.submission.is_submitted() {
            self.sync.mark_submitted();
        } else {
            self.sync.mark_ready();
            if report.draft_fetch_failed {
                self.sync.enter_fallback(&mut self.notices);
            }
        }
        info!(user_id = %self.user_id, outcome = ?report.outcome, "session started");
        self.report = Some(report);
    }

    fn reset_for(&mut self, user_id: &str) {
        self.epoch += 1;
        self.user_id = user_id.to_string();
        self.form = FormStateStore::new();
        self.changes = self.form.subscribe();
        self.sync = DraftSyncEngine::new(self.sync_config, user_id);
        self.submission = SubmissionStateMachine::new(user_id);
        self.notices.clear();
        self.loading = None;
        self.report = None;
        self.submit_outcome = None;
    }

    fn absorb_changes(&mut self) {
        let now = self.clock.now_ms();
        let edited = self.changes.try_iter().filter(FormChange::is_edit).count();
        if edited > 0 {
            self.sync.on_mutation(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::application::{BootstrapOutcome, ManualClock, SyncPhase};
    use crate::domain::{DraftRecord, SubmissionRecord};
    use crate::infrastructure::{LoopbackAdmissionService, MemoryStore};

    type Session = WizardSession<LoopbackAdmissionService, MemoryStore>;

    const WAIT: Duration = Duration::from_secs(5);

    fn session(service: &LoopbackAdmissionService, kv: &MemoryStore) -> (ManualClock, Session) {
        let clock = ManualClock::new();
        let session = WizardSession::new(
            service.clone(),
            kv.clone(),
            Box::new(clock.clone()),
            SyncConfig::default(),
        );
        (clock, session)
    }

    fn started(service: &LoopbackAdmissionService, kv: &MemoryStore, user: &str) -> (ManualClock, Session) {
        let (clock, mut s) = session(service, kv);
        s.start(user);
        settle(&mut s);
        (clock, s)
    }

    fn settle(s: &mut Session) {
        assert!(s.wait_for_tasks(WAIT), "remote work did not finish");
    }

    /// Advances past the debounce window and lets the save finish.
    fn run_save(clock: &ManualClock, s: &mut Session, ms: u64) {
        clock.advance(ms);
        s.tick();
        settle(s);
    }

    #[test]
    fn test_typing_burst_produces_one_remote_save() {
        let service = LoopbackAdmissionService::new();
        let (clock, mut s) = started(&service, &MemoryStore::new(), "u1");

        for name in ["R", "Ra", "Rav", "Ravi"] {
            s.set_text(FormField::FirstName, name);
            clock.advance(200);
            s.tick();
        }
        settle(&mut s);
        assert_eq!(service.save_calls(), 0);
        assert_eq!(s.next_wakeup(), Some(Duration::from_millis(800)));

        run_save(&clock, &mut s, 800);
        assert_eq!(service.save_calls(), 1);
        assert_eq!(service.draft().unwrap().form_data.text(FormField::FirstName), "Ravi");
        assert_eq!(s.local().load_draft("u1").unwrap().form_data.text(FormField::FirstName), "Ravi");
    }

    #[test]
    fn test_tick_does_not_wait_for_a_slow_save() {
        let service = LoopbackAdmissionService::new();
        let (clock, mut s) = started(&service, &MemoryStore::new(), "u1");
        s.set_text(FormField::FirstName, "first");
        clock.advance(1_000);

        service.hold();
        let before = Instant::now();
        s.tick();
        assert!(before.elapsed() < Duration::from_millis(100));
        assert_eq!(s.status().phase, SyncPhase::Saving);
        assert_eq!(s.next_wakeup(), Some(RESULT_POLL));

        // Typing carries on while the save is outstanding.
        assert!(s.set_text(FormField::LastName, "typed meanwhile"));
        s.tick();
        assert_eq!(service.save_calls(), 0);

        service.release();
        settle(&mut s);
        s.tick();
        assert_eq!(s.status().phase, SyncPhase::Idle);
        let remote = service.draft().unwrap();
        assert_eq!(remote.form_data.text(FormField::FirstName), "first");
        assert_eq!(remote.form_data.text(FormField::LastName), "");
        assert!(s.has_unsaved_changes());

        run_save(&clock, &mut s, 1_000);
        assert_eq!(service.draft().unwrap().form_data.text(FormField::LastName), "typed meanwhile");
    }

    #[test]
    fn test_step_change_is_saved_with_step() {
        let service = LoopbackAdmissionService::new();
        let (clock, mut s) = started(&service, &MemoryStore::new(), "u1");

        assert!(s.next_step());
        assert!(s.next_step());
        assert!(s.prev_step());
        assert_eq!(s.step().get(), 2);
        run_save(&clock, &mut s, 1_000);
        assert_eq!(service.draft().unwrap().current_step, s.step());
    }

    #[test]
    fn test_offline_start_then_retry_recovers() {
        let service = LoopbackAdmissionService::new();
        service.set_offline(true);
        let kv = MemoryStore::new();
        let (clock, mut s) = started(&service, &kv, "u1");

        assert!(s.report().unwrap().remote_unreachable);
        assert!(s.status().using_fallback);
        let notices = s.drain_notices();
        assert!(matches!(
            notices.as_slice(),
            [Notice::AdmissionCheckFailed { .. }, Notice::OfflineFallback]
        ));

        s.set_text(FormField::PresentCity, "Pune");
        run_save(&clock, &mut s, 1_000);
        run_save(&clock, &mut s, 500);
        run_save(&clock, &mut s, 1_000);
        assert_eq!(service.save_calls(), 3);
        assert_eq!(s.status().phase, SyncPhase::Error);
        assert!(s.drain_notices().is_empty(), "offline notice is not repeated");
        assert_eq!(s.local().load_draft("u1").unwrap().form_data.text(FormField::PresentCity), "Pune");

        service.set_offline(false);
        s.retry_sync();
        settle(&mut s);
        assert!(!s.status().using_fallback);
        assert_eq!(s.status().phase, SyncPhase::Idle);
        assert_eq!(s.drain_notices(), vec![Notice::BackOnline]);
        assert_eq!(service.draft().unwrap().form_data.text(FormField::PresentCity), "Pune");
    }

    #[test]
    fn test_failed_check_with_reachable_draft_store_stays_online() {
        let service = LoopbackAdmissionService::new();
        service.set_check_fails(true);
        let (_, mut s) = started(&service, &MemoryStore::new(), "u1");

        assert!(s.report().unwrap().remote_unreachable);
        assert!(!s.status().using_fallback);
        assert!(matches!(
            s.drain_notices().as_slice(),
            [Notice::AdmissionCheckFailed { .. }]
        ));
    }

    #[test]
    fn test_failed_draft_fetch_enters_fallback() {
        let service = LoopbackAdmissionService::new();
        service.set_draft_fetch_fails(true);
        let (_, s) = started(&service, &MemoryStore::new(), "u1");

        assert!(s.report().unwrap().draft_fetch_failed);
        assert!(s.status().using_fallback);
    }

    #[test]
    fn test_submit_clears_remote_draft() {
        let service = LoopbackAdmissionService::new();
        let (clock, mut s) = started(&service, &MemoryStore::new(), "u1");
        s.set_text(FormField::FirstName, "Kabir");
        run_save(&clock, &mut s, 1_000);
        assert!(service.draft().is_some());

        assert!(s.submit());
        settle(&mut s);
        assert_eq!(service.clear_calls(), 1);
        assert!(service.draft().is_none());
        assert!(s.local().load_draft("u1").is_none());
    }

    #[test]
    fn test_submit_locks_form_and_stops_sync() {
        let service = LoopbackAdmissionService::new();
        let (clock, mut s) = started(&service, &MemoryStore::new(), "u1");
        s.set_text(FormField::FirstName, "Kabir");

        assert!(s.submit());
        assert!(s.is_locked(), "no edits while submitting");
        settle(&mut s);
        let id = s.take_submit_outcome().unwrap().application_id().unwrap().to_string();
        assert!(s.is_submitted());
        assert!(s.is_locked());
        assert!(!s.set_text(FormField::FirstName, "Changed"));
        assert_eq!(s.next_wakeup(), None);

        run_save(&clock, &mut s, 5_000);
        assert_eq!(service.save_calls(), 0);
        assert!(!s.submit());
        assert_eq!(
            s.take_submit_outcome(),
            Some(SubmitOutcome::Submitted {
                application_id: id,
                recovered: true
            })
        );
        assert_eq!(service.submit_calls(), 1);
    }

    #[test]
    fn test_partial_upload_retry_from_session() {
        let service = LoopbackAdmissionService::new();
        service.fail_document_uploads(1);
        let (_, mut s) = started(&service, &MemoryStore::new(), "u1");
        s.attach_document(DocumentSlot::Photo, AttachedDocument::from_path("photo.png"));
        s.attach_document(DocumentSlot::Signature, AttachedDocument::from_path("sign.png"));

        assert!(s.submit());
        settle(&mut s);
        assert!(matches!(
            s.take_submit_outcome(),
            Some(SubmitOutcome::PartiallySubmitted { .. })
        ));
        assert!(s.is_submitted());
        assert_eq!(s.pending_documents(), &[DocumentSlot::Photo]);
        assert!(s.drain_notices().iter().any(Notice::is_actionable));

        assert!(s.retry_documents());
        assert!(!s.retry_documents(), "one upload at a time");
        settle(&mut s);
        assert!(s.pending_documents().is_empty());
        assert_eq!(
            service.uploaded_documents(),
            vec![DocumentSlot::Photo, DocumentSlot::Signature]
        );
        assert!(matches!(
            s.drain_notices().as_slice(),
            [Notice::DocumentsUploaded { .. }]
        ));
    }

    #[test]
    fn test_cached_submission_shown_before_server_answers() {
        let service = LoopbackAdmissionService::new().with_admission("APP-3");
        let kv = MemoryStore::new();
        LocalFallbackStore::new(kv.clone())
            .save_submission("u1", &SubmissionRecord::submitted("APP-3"))
            .unwrap();
        let (_, mut s) = session(&service, &kv);

        service.hold();
        s.start("u1");
        s.tick();
        assert!(s.is_loading());
        assert_eq!(s.provisional_submission(), Some("APP-3"));
        assert!(s.is_locked());
        assert!(!s.is_submitted());
        assert!(!s.set_text(FormField::FirstName, "too early"));

        service.release();
        settle(&mut s);
        assert!(!s.is_loading());
        assert_eq!(s.provisional_submission(), None);
        assert_eq!(s.application_id(), Some("APP-3"));
    }

    #[test]
    fn test_restart_after_submission_shows_submitted_view() {
        let service = LoopbackAdmissionService::new();
        let kv = MemoryStore::new();
        let (_, mut first) = started(&service, &kv, "u1");
        first.set_text(FormField::Email, "a@b.in");
        first.submit();
        settle(&mut first);

        let (_, second) = started(&service, &kv, "u1");
        let report = second.report().unwrap();
        assert!(matches!(report.outcome, BootstrapOutcome::Submitted { .. }));
        assert_eq!(report.provisional_submission.as_deref(), first.application_id());
        assert!(second.is_locked());
        assert!(second.form().is_blank());
    }

    #[test]
    fn test_switch_user_discards_previous_session() {
        let service = LoopbackAdmissionService::new();
        let kv = MemoryStore::new();
        let (clock, mut s) = started(&service, &kv, "alice");
        s.set_text(FormField::FirstName, "Alice");
        run_save(&clock, &mut s, 1_000);
        assert!(s.local().load_draft("alice").is_some());

        s.switch_user("bob");
        settle(&mut s);
        assert_eq!(s.user_id(), "bob");
        assert_eq!(s.report().unwrap().collected_keys, 1);
        assert!(s.local().load_draft("alice").is_none());
        assert_eq!(s.status().last_saved_at, None);
    }

    #[test]
    fn test_save_finishing_after_switch_is_dropped() {
        let service = LoopbackAdmissionService::new();
        let kv = MemoryStore::new();
        let (clock, mut s) = started(&service, &kv, "alice");
        s.set_text(FormField::FirstName, "Alice");
        clock.advance(1_000);
        service.hold();
        s.tick();

        s.switch_user("bob");
        service.release();
        settle(&mut s);
        assert_eq!(s.user_id(), "bob");
        assert_eq!(s.status().last_saved_at, None);
    }

    #[test]
    fn test_teardown_cancels_pending_save_and_keeps_edit_locally() {
        let service = LoopbackAdmissionService::new()
            .with_draft(DraftRecord::new(FormState::default(), Step::FIRST, Utc::now()));
        let (clock, mut s) = started(&service, &MemoryStore::new(), "u1");
        s.set_text(FormField::Phone, "99");
        s.teardown();

        run_save(&clock, &mut s, 5_000);
        assert_eq!(service.save_calls(), 0);
        assert_eq!(s.next_wakeup(), None);
        assert_eq!(s.local().load_draft("u1").unwrap().form_data.text(FormField::Phone), "99");
    }

    #[test]
    fn test_quit_during_backoff_keeps_latest_edit_locally() {
        let service = LoopbackAdmissionService::new();
        let (clock, mut s) = started(&service, &MemoryStore::new(), "u1");
        service.fail_next_saves(1);
        s.set_text(FormField::FirstName, "v1");
        run_save(&clock, &mut s, 1_000);
        assert_eq!(s.local().load_draft("u1").unwrap().form_data.text(FormField::FirstName), "v1");

        // Still inside the 500 ms backoff.
        clock.advance(100);
        s.set_text(FormField::FirstName, "v2");
        s.shutdown(WAIT);

        assert_eq!(s.local().load_draft("u1").unwrap().form_data.text(FormField::FirstName), "v2");
        assert!(service.draft().is_none());
    }

    #[test]
    fn test_quit_with_pending_debounce_saves_remotely() {
        let service = LoopbackAdmissionService::new();
        let (_, mut s) = started(&service, &MemoryStore::new(), "u1");
        s.set_text(FormField::FirstName, "last words");
        s.shutdown(WAIT);

        assert_eq!(service.save_calls(), 1);
        assert_eq!(service.draft().unwrap().form_data.text(FormField::FirstName), "last words");
        assert!(!s.has_unsaved_changes());
    }
}
