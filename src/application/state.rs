//! Application state for the terminal admission wizard.
//!
//! This module contains the UI state wrapped around a [`WizardSession`]:
//! which row is selected, the edit buffer, and the messages shown to the user.

use std::collections::VecDeque;

use crate::domain::{AdmissionService, AttachedDocument, DocumentSlot, FormField, Step};
use crate::infrastructure::KeyValueStore;

use super::notice::Notice;
use super::session::WizardSession;
use super::submission::{SubmissionState, SubmitOutcome};
use super::sync::SyncPhase;

/// Number of recent notices kept for the notice panel.
const NOTICE_HISTORY: usize = 4;

/// Represents the current mode of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Navigation mode - arrow keys move between fields, shortcuts available
    Normal,
    /// The selected field's value is being typed
    Editing,
    /// Help screen is displayed
    Help,
}

/// One editable line of the current wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormRow {
    Field(FormField),
    Document(DocumentSlot),
}

/// Main application state containing the wizard session and UI state.
///
/// # Examples
///
/// ```
/// use admitsync::application::{App, AppMode, ManualClock, SyncConfig, WizardSession};
/// use admitsync::infrastructure::{LoopbackAdmissionService, MemoryStore};
///
/// let session = WizardSession::new(
///     LoopbackAdmissionService::new(),
///     MemoryStore::new(),
///     Box::new(ManualClock::new()),
///     SyncConfig::default(),
/// );
/// let app = App::new(session);
/// assert_eq!(app.selected, 0);
/// assert_eq!(app.mode, AppMode::Normal);
/// ```
pub struct App<S, K> {
    pub session: WizardSession<S, K>,
    /// Index of the selected row within the current step
    pub selected: usize,
    pub mode: AppMode,
    /// Edit buffer for the selected field
    pub input: String,
    /// Cursor position within the edit buffer, in characters
    pub cursor_position: usize,
    pub help_scroll: usize,
    /// Temporary status message to display
    pub status_message: Option<String>,
    /// Most recent notices, oldest first
    pub notices: VecDeque<Notice>,
    /// Set by an explicit save until its result is known
    awaiting_save: bool,
}

impl<S, K> App<S, K>
where
    S: AdmissionService + 'static,
    K: KeyValueStore,
{
    pub fn new(session: WizardSession<S, K>) -> Self {
        let mut app = Self {
            session,
            selected: 0,
            mode: AppMode::Normal,
            input: String::new(),
            cursor_position: 0,
            help_scroll: 0,
            status_message: None,
            notices: VecDeque::new(),
            awaiting_save: false,
        };
        app.pull_notices();
        app
    }

    /// Rows shown for the current step. The last step also lists document slots.
    pub fn rows(&self) -> Vec<FormRow> {
        let step = self.session.step();
        let mut rows: Vec<FormRow> = FormField::on_step(step).map(FormRow::Field).collect();
        if step == Step::LAST {
            rows.extend(DocumentSlot::ALL.into_iter().map(FormRow::Document));
        }
        rows
    }

    pub fn selected_row(&self) -> Option<FormRow> {
        self.rows().get(self.selected).copied()
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        let last = self.rows().len().saturating_sub(1);
        self.selected = (self.selected + 1).min(last);
    }

    pub fn next_step(&mut self) {
        if self.session.next_step() {
            self.selected = 0;
        }
    }

    pub fn previous_step(&mut self) {
        if self.session.prev_step() {
            self.selected = 0;
        }
    }

    /// Starts editing the selected row. Flags are toggled in place instead.
    pub fn start_editing(&mut self) {
        if self.session.is_locked() {
            self.status_message = Some(self.locked_reason().to_string());
            return;
        }
        let Some(row) = self.selected_row() else {
            return;
        };
        match row {
            FormRow::Field(field) if field.is_flag() => {
                self.session.toggle_flag(field);
                return;
            }
            FormRow::Field(field) => {
                self.input = self.session.form().text(field).to_string();
            }
            FormRow::Document(slot) => {
                self.input = self
                    .session
                    .form()
                    .document(slot)
                    .map(|doc| doc.path.display().to_string())
                    .unwrap_or_default();
            }
        }
        self.cursor_position = self.input.chars().count();
        self.mode = AppMode::Editing;
        self.status_message = None;
    }

    /// Writes the edit buffer into the selected row. An empty document path
    /// removes the attachment.
    pub fn finish_editing(&mut self) {
        if let Some(row) = self.selected_row() {
            match row {
                FormRow::Field(field) => {
                    self.session.set_text(field, self.input.clone());
                }
                FormRow::Document(slot) => {
                    let path = self.input.trim();
                    if path.is_empty() {
                        self.session.detach_document(slot);
                    } else {
                        self.session
                            .attach_document(slot, AttachedDocument::from_path(path));
                    }
                }
            }
        }
        self.cancel_editing();
    }

    pub fn cancel_editing(&mut self) {
        self.mode = AppMode::Normal;
        self.input.clear();
        self.cursor_position = 0;
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index();
        self.input.insert(at, c);
        self.cursor_position += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.cursor_position == 0 {
            return;
        }
        self.cursor_position -= 1;
        let at = self.byte_index();
        self.input.remove(at);
    }

    pub fn delete_at_cursor(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            let at = self.byte_index();
            self.input.remove(at);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        self.cursor_position = (self.cursor_position + 1).min(self.input.chars().count());
    }

    pub fn move_cursor_home(&mut self) {
        self.cursor_position = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.input.chars().count();
    }

    pub fn save_now(&mut self) {
        if self.session.is_submitted() || self.session.is_loading() {
            return;
        }
        self.awaiting_save = true;
        self.session.save_now();
        self.pull_notices();
    }

    /// Retry from the offline notice. Success shows up as a back-online notice.
    pub fn retry_sync(&mut self) {
        self.session.retry_sync();
        self.status_message = Some("Retrying...".to_string());
        self.pull_notices();
    }

    pub fn submit(&mut self) {
        if self.session.submit() {
            self.status_message = Some("Submitting...".to_string());
        } else if let Some(outcome) = self.session.take_submit_outcome() {
            self.show_outcome(&outcome);
        }
        self.pull_notices();
    }

    /// Uploads documents that failed during submission again.
    pub fn retry_documents(&mut self) {
        let message = if self.session.retry_documents() {
            "Uploading documents..."
        } else if self.session.is_uploading_documents() {
            "Document upload already running"
        } else {
            "No documents waiting for upload"
        };
        self.status_message = Some(message.to_string());
    }

    /// Collects finished remote work, drives the sync engine and picks up
    /// any new notices.
    pub fn tick(&mut self) {
        self.session.tick();
        if let Some(outcome) = self.session.take_submit_outcome() {
            self.show_outcome(&outcome);
        }
        self.pull_notices();

        if self.awaiting_save {
            let status = self.session.status();
            match status.phase {
                SyncPhase::Saving => {}
                SyncPhase::Idle if status.error.is_none() => {
                    self.awaiting_save = false;
                    self.status_message = Some("Draft saved".to_string());
                }
                _ => self.awaiting_save = false,
            }
        }
    }

    pub fn open_help(&mut self) {
        self.mode = AppMode::Help;
        self.help_scroll = 0;
    }

    pub fn close_help(&mut self) {
        self.mode = AppMode::Normal;
    }

    /// Short description of the draft's save state for the status bar.
    pub fn sync_label(&self) -> String {
        if let Some(id) = self.session.provisional_submission() {
            return format!("Submitted ({id}), verifying...");
        }
        if self.session.is_loading() {
            return "Loading...".to_string();
        }
        match self.session.submission_state() {
            SubmissionState::Submitted { application_id } => {
                let pending = self.session.pending_documents().len();
                if pending > 0 {
                    return format!("Submitted ({application_id}), {pending} document(s) pending");
                }
                return format!("Submitted ({application_id})");
            }
            SubmissionState::Submitting => return "Submitting...".to_string(),
            _ => {}
        }
        let status = self.session.status();
        if status.using_fallback {
            return "Offline, saved on this device".to_string();
        }
        match (status.phase, status.last_saved_at) {
            (SyncPhase::Saving, _) => "Saving...".to_string(),
            (SyncPhase::Error, _) => "Save failed".to_string(),
            (SyncPhase::Idle, Some(at)) => format!("Saved {}", at.format("%H:%M:%S")),
            (SyncPhase::Idle, None) => "Not saved yet".to_string(),
        }
    }

    fn locked_reason(&self) -> &'static str {
        if self.session.is_loading() {
            "Still checking your application, please wait"
        } else if *self.session.submission_state() == SubmissionState::Submitting {
            "Submitting, please wait"
        } else {
            "The application has been submitted and can no longer be edited"
        }
    }

    /// Notices already cover created and failed submissions.
    fn show_outcome(&mut self, outcome: &SubmitOutcome) {
        let message = match outcome {
            SubmitOutcome::NotAllowed => "Submission is not available right now".to_string(),
            SubmitOutcome::Submitted {
                application_id,
                recovered: true,
            } if self.session.is_submitted() => format!("Already submitted ({application_id})"),
            _ => return,
        };
        self.status_message = Some(message);
    }

    fn pull_notices(&mut self) {
        for notice in self.session.drain_notices() {
            self.status_message = Some(notice.to_string());
            self.notices.push_back(notice);
            if self.notices.len() > NOTICE_HISTORY {
                self.notices.pop_front();
            }
        }
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::application::{ManualClock, SyncConfig};
    use crate::domain::SubmissionRecord;
    use crate::infrastructure::{LocalFallbackStore, LoopbackAdmissionService, MemoryStore};

    type TestApp = App<LoopbackAdmissionService, MemoryStore>;

    fn unstarted(service: &LoopbackAdmissionService, kv: &MemoryStore) -> (ManualClock, TestApp) {
        let clock = ManualClock::new();
        let session = WizardSession::new(
            service.clone(),
            kv.clone(),
            Box::new(clock.clone()),
            SyncConfig::default(),
        );
        (clock, App::new(session))
    }

    fn app_with(service: &LoopbackAdmissionService) -> (ManualClock, TestApp) {
        let (clock, mut app) = unstarted(service, &MemoryStore::new());
        app.session.start("tester");
        settle(&mut app);
        (clock, app)
    }

    fn settle(app: &mut TestApp) {
        assert!(app.session.wait_for_tasks(Duration::from_secs(5)));
        app.tick();
    }

    fn type_text(app: &mut App<LoopbackAdmissionService, MemoryStore>, text: &str) {
        for c in text.chars() {
            app.insert_char(c);
        }
    }

    #[test]
    fn test_app_default_state() {
        let (_, app) = app_with(&LoopbackAdmissionService::new());
        assert_eq!(app.selected, 0);
        assert_eq!(app.mode, AppMode::Normal);
        assert!(app.input.is_empty());
        assert!(app.status_message.is_none());
        assert_eq!(app.selected_row(), Some(FormRow::Field(FormField::FirstName)));
        assert_eq!(app.sync_label(), "Not saved yet");
    }

    #[test]
    fn test_edit_field_and_autosave() {
        let service = LoopbackAdmissionService::new();
        let (clock, mut app) = app_with(&service);

        app.start_editing();
        assert_eq!(app.mode, AppMode::Editing);
        type_text(&mut app, "Tara");
        app.finish_editing();

        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.session.form().text(FormField::FirstName), "Tara");
        clock.advance(1_000);
        app.tick();
        settle(&mut app);
        assert_eq!(service.save_calls(), 1);
        assert!(app.sync_label().starts_with("Saved "));
    }

    #[test]
    fn test_save_now_reports_when_the_save_lands() {
        let service = LoopbackAdmissionService::new();
        let (_, mut app) = app_with(&service);
        app.session.set_text(FormField::FirstName, "Tara");

        app.status_message = None;
        service.hold();
        app.save_now();
        assert_eq!(app.sync_label(), "Saving...");
        assert_eq!(app.status_message, None);

        service.release();
        settle(&mut app);
        assert_eq!(app.status_message.as_deref(), Some("Draft saved"));
    }

    #[test]
    fn test_editing_loads_existing_value_and_handles_unicode() {
        let (_, mut app) = app_with(&LoopbackAdmissionService::new());
        app.session.set_text(FormField::FirstName, "Zoë");
        app.start_editing();
        assert_eq!(app.input, "Zoë");
        assert_eq!(app.cursor_position, 3);

        app.delete_before_cursor();
        assert_eq!(app.input, "Zo");
        app.move_cursor_home();
        app.insert_char('É');
        assert_eq!(app.input, "ÉZo");
        app.move_cursor_end();
        app.insert_char('é');
        assert_eq!(app.input, "ÉZoé");
    }

    #[test]
    fn test_cancel_editing_keeps_value() {
        let (_, mut app) = app_with(&LoopbackAdmissionService::new());
        app.start_editing();
        type_text(&mut app, "discard");
        app.cancel_editing();
        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.session.form().text(FormField::FirstName), "");
    }

    #[test]
    fn test_flag_rows_toggle_in_place() {
        let (_, mut app) = app_with(&LoopbackAdmissionService::new());
        app.session.set_step(3);
        let index = app
            .rows()
            .iter()
            .position(|row| *row == FormRow::Field(FormField::SameAsPresent))
            .unwrap();
        app.selected = index;

        app.start_editing();
        assert_eq!(app.mode, AppMode::Normal);
        assert!(app.session.form().flag(FormField::SameAsPresent));
        app.start_editing();
        assert!(!app.session.form().flag(FormField::SameAsPresent));
    }

    #[test]
    fn test_step_navigation_resets_selection() {
        let (_, mut app) = app_with(&LoopbackAdmissionService::new());
        app.select_next();
        app.select_next();
        assert_eq!(app.selected, 2);

        app.next_step();
        assert_eq!(app.session.step().get(), 2);
        assert_eq!(app.selected, 0);

        app.previous_step();
        app.previous_step();
        assert_eq!(app.session.step(), Step::FIRST);
    }

    #[test]
    fn test_selection_stays_in_bounds() {
        let (_, mut app) = app_with(&LoopbackAdmissionService::new());
        app.select_previous();
        assert_eq!(app.selected, 0);
        for _ in 0..100 {
            app.select_next();
        }
        assert_eq!(app.selected, app.rows().len() - 1);
    }

    #[test]
    fn test_last_step_lists_documents() {
        let (_, mut app) = app_with(&LoopbackAdmissionService::new());
        app.session.set_step(6);
        let rows = app.rows();
        assert!(rows.contains(&FormRow::Document(DocumentSlot::Photo)));

        app.selected = rows
            .iter()
            .position(|row| *row == FormRow::Document(DocumentSlot::Photo))
            .unwrap();
        app.start_editing();
        type_text(&mut app, "/tmp/me.png");
        app.finish_editing();
        assert_eq!(
            app.session.form().document(DocumentSlot::Photo).map(|d| d.file_name.as_str()),
            Some("me.png")
        );

        app.start_editing();
        assert_eq!(app.input, "/tmp/me.png");
        app.input.clear();
        app.cursor_position = 0;
        app.finish_editing();
        assert!(app.session.form().document(DocumentSlot::Photo).is_none());
    }

    #[test]
    fn test_submit_locks_editing() {
        let (_, mut app) = app_with(&LoopbackAdmissionService::new());
        app.session.set_text(FormField::FirstName, "Dev");
        app.submit();
        assert_eq!(app.sync_label(), "Submitting...");
        app.start_editing();
        assert_eq!(app.status_message.as_deref(), Some("Submitting, please wait"));
        settle(&mut app);

        assert!(app.sync_label().starts_with("Submitted"));
        assert!(matches!(app.notices.back(), Some(Notice::Submitted { .. })));
        app.start_editing();
        assert_eq!(app.mode, AppMode::Normal);
        assert!(app.status_message.unwrap().contains("can no longer be edited"));
    }

    #[test]
    fn test_offline_start_shows_notice_and_retry() {
        let service = LoopbackAdmissionService::new();
        service.set_offline(true);
        let (_, mut app) = app_with(&service);

        assert_eq!(app.sync_label(), "Offline, saved on this device");
        assert!(app.notices.contains(&Notice::OfflineFallback));

        service.set_offline(false);
        app.retry_sync();
        settle(&mut app);
        assert_eq!(app.status_message.as_deref(), Some("Back online, draft saved"));
        assert!(app.sync_label().starts_with("Saved "));
    }

    #[test]
    fn test_notice_history_is_bounded() {
        let service = LoopbackAdmissionService::new();
        let (_, mut app) = app_with(&service);
        service.set_offline(true);
        for _ in 0..6 {
            app.submit();
            settle(&mut app);
        }
        assert_eq!(app.notices.len(), NOTICE_HISTORY);
    }

    #[test]
    fn test_cached_submission_label_while_verifying() {
        let service = LoopbackAdmissionService::new().with_admission("APP-5");
        let kv = MemoryStore::new();
        LocalFallbackStore::new(kv.clone())
            .save_submission("tester", &SubmissionRecord::submitted("APP-5"))
            .unwrap();
        let (_, mut app) = unstarted(&service, &kv);

        service.hold();
        app.session.start("tester");
        app.tick();
        assert_eq!(app.sync_label(), "Submitted (APP-5), verifying...");
        app.start_editing();
        assert_eq!(app.mode, AppMode::Normal);

        service.release();
        settle(&mut app);
        assert_eq!(app.sync_label(), "Submitted (APP-5)");
    }

    #[test]
    fn test_retry_documents_messages() {
        let service = LoopbackAdmissionService::new();
        service.fail_document_uploads(1);
        let (_, mut app) = app_with(&service);
        app.retry_documents();
        assert_eq!(app.status_message.as_deref(), Some("No documents waiting for upload"));

        app.session
            .attach_document(DocumentSlot::Photo, AttachedDocument::from_path("photo.png"));
        app.submit();
        settle(&mut app);
        assert!(app.sync_label().ends_with("1 document(s) pending"));
        assert!(matches!(app.notices.back(), Some(Notice::DocumentUploadPending { .. })));

        app.retry_documents();
        assert_eq!(app.status_message.as_deref(), Some("Uploading documents..."));
        settle(&mut app);
        assert!(matches!(app.notices.back(), Some(Notice::DocumentsUploaded { .. })));
        assert!(!app.sync_label().contains("pending"));
    }
}
