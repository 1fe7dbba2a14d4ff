//! In-process admission service.
//!
//! Keeps one user's remote state in memory and lets callers inject the
//! failure modes the draft engine has to survive. Clones share state.
//! Calls can be held back to model a slow network.

use std::collections::BTreeSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::domain::{
    AdmissionService, AdmissionSummary, AttachedDocument, DocumentSlot, DraftRecord, FormState,
    ServiceError, ServiceResult, Step, SubmissionPayload,
};

#[derive(Debug, Default)]
struct LoopbackState {
    admission: Option<AdmissionSummary>,
    draft: Option<DraftRecord>,
    next_id: u32,
    offline: bool,
    check_fails: bool,
    draft_fetch_fails: bool,
    failing_saves: u32,
    failing_uploads: usize,
    drop_submit_response: bool,
    uploaded: BTreeSet<DocumentSlot>,
    save_calls: u32,
    submit_calls: u32,
    upload_calls: u32,
    clear_calls: u32,
    last_payload: Option<SubmissionPayload>,
}

/// Blocks calls while held.
#[derive(Debug, Default)]
struct Gate {
    held: Mutex<bool>,
    released: Condvar,
}

#[derive(Debug, Clone, Default)]
pub struct LoopbackAdmissionService {
    state: Arc<Mutex<LoopbackState>>,
    gate: Arc<Gate>,
}

impl LoopbackAdmissionService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remote calls made from now on wait until [`release`](Self::release).
    pub fn hold(&self) {
        *self.gate.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = true;
    }

    pub fn release(&self) {
        *self.gate.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = false;
        self.gate.released.notify_all();
    }

    /// Waits at the gate, then locks the state.
    fn enter(&self) -> MutexGuard<'_, LoopbackState> {
        let mut held = self.gate.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while *held {
            held = self
                .gate
                .released
                .wait(held)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        drop(held);
        self.lock()
    }

    pub fn with_admission(self, id: &str) -> Self {
        self.lock().admission = Some(AdmissionSummary {
            id: id.to_string(),
            status: Some("pending".to_string()),
        });
        self
    }

    pub fn with_draft(self, draft: DraftRecord) -> Self {
        self.lock().draft = Some(draft);
        self
    }

    /// Every call fails as if the network were down.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn set_check_fails(&self, fails: bool) {
        self.lock().check_fails = fails;
    }

    pub fn set_draft_fetch_fails(&self, fails: bool) {
        self.lock().draft_fetch_fails = fails;
    }

    pub fn fail_next_saves(&self, count: u32) {
        self.lock().failing_saves = count;
    }

    /// The next document upload stores the application but loses the first
    /// `count` files.
    pub fn fail_document_uploads(&self, count: usize) {
        self.lock().failing_uploads = count;
    }

    /// The next submission is stored server-side but the client sees a network error.
    pub fn drop_next_submit_response(&self) {
        self.lock().drop_submit_response = true;
    }

    pub fn admission(&self) -> Option<AdmissionSummary> {
        self.lock().admission.clone()
    }

    pub fn draft(&self) -> Option<DraftRecord> {
        self.lock().draft.clone()
    }

    pub fn save_calls(&self) -> u32 {
        self.lock().save_calls
    }

    pub fn submit_calls(&self) -> u32 {
        self.lock().submit_calls
    }

    pub fn upload_calls(&self) -> u32 {
        self.lock().upload_calls
    }

    /// Document slots the server holds files for.
    pub fn uploaded_documents(&self) -> Vec<DocumentSlot> {
        self.lock().uploaded.iter().copied().collect()
    }

    pub fn clear_calls(&self) -> u32 {
        self.lock().clear_calls
    }

    pub fn last_payload(&self) -> Option<SubmissionPayload> {
        self.lock().last_payload.clone()
    }

    fn create_admission(state: &mut LoopbackState) -> AdmissionSummary {
        state.next_id += 1;
        let admission = AdmissionSummary {
            id: format!("APP-{:04}", state.next_id),
            status: Some("pending".to_string()),
        };
        state.admission = Some(admission.clone());
        admission
    }

    /// Stores `documents`, losing the first ones if uploads are set to fail.
    fn store_documents(
        state: &mut LoopbackState,
        application_id: &str,
        documents: &[(DocumentSlot, AttachedDocument)],
    ) -> ServiceResult<()> {
        let failing = std::mem::take(&mut state.failing_uploads).min(documents.len());
        let (lost, stored) = documents.split_at(failing);
        state.uploaded.extend(stored.iter().map(|(slot, _)| *slot));
        if lost.is_empty() {
            return Ok(());
        }
        Err(ServiceError::DocumentUpload {
            application_id: Some(application_id.to_string()),
            failed: lost.iter().map(|(slot, _)| *slot).collect(),
        })
    }

    fn submit(
        &self,
        payload: &SubmissionPayload,
        documents: &[(DocumentSlot, AttachedDocument)],
    ) -> ServiceResult<AdmissionSummary> {
        let mut state = self.enter();
        state.submit_calls += 1;
        if state.offline {
            return Err(offline());
        }
        if state.admission.is_some() {
            return Err(ServiceError::duplicate("an application already exists for this user"));
        }
        state.last_payload = Some(payload.clone());
        let admission = Self::create_admission(&mut state);

        if std::mem::take(&mut state.drop_submit_response) {
            return Err(ServiceError::network("connection reset before response"));
        }
        match Self::store_documents(&mut state, &admission.id, documents) {
            Ok(()) => Ok(admission),
            // The portal does not echo the id on a partial upload.
            Err(ServiceError::DocumentUpload { failed, .. }) => Err(ServiceError::DocumentUpload {
                application_id: None,
                failed,
            }),
            Err(e) => Err(e),
        }
    }
}

fn offline() -> ServiceError {
    ServiceError::network("service unreachable")
}

impl AdmissionService for LoopbackAdmissionService {
    fn check_existing_admission(&self) -> ServiceResult<Option<AdmissionSummary>> {
        let state = self.enter();
        if state.offline || state.check_fails {
            return Err(offline());
        }
        Ok(state.admission.clone())
    }

    fn get_draft(&self) -> ServiceResult<Option<DraftRecord>> {
        let state = self.enter();
        if state.offline || state.draft_fetch_fails {
            return Err(offline());
        }
        Ok(state.draft.clone())
    }

    fn save_draft(&self, form: &FormState, step: Step) -> ServiceResult<DateTime<Utc>> {
        let mut state = self.enter();
        state.save_calls += 1;
        if state.offline {
            return Err(offline());
        }
        if state.failing_saves > 0 {
            state.failing_saves -= 1;
            return Err(ServiceError::server("draft store temporarily unavailable"));
        }
        let saved_at = Utc::now();
        state.draft = Some(DraftRecord::new(form.clone(), step, saved_at));
        Ok(saved_at)
    }

    fn clear_draft(&self) -> ServiceResult<()> {
        let mut state = self.enter();
        state.clear_calls += 1;
        if state.offline {
            return Err(offline());
        }
        state.draft = None;
        Ok(())
    }

    fn submit_application(&self, payload: &SubmissionPayload) -> ServiceResult<AdmissionSummary> {
        self.submit(payload, &[])
    }

    fn submit_application_with_documents(
        &self,
        payload: &SubmissionPayload,
        documents: &[(DocumentSlot, AttachedDocument)],
    ) -> ServiceResult<AdmissionSummary> {
        self.submit(payload, documents)
    }

    fn upload_documents(
        &self,
        application_id: &str,
        documents: &[(DocumentSlot, AttachedDocument)],
    ) -> ServiceResult<()> {
        let mut state = self.enter();
        state.upload_calls += 1;
        if state.offline {
            return Err(offline());
        }
        if state.admission.as_ref().map(|a| a.id.as_str()) != Some(application_id) {
            return Err(ServiceError::not_found(format!("no application {application_id}")));
        }
        Self::store_documents(&mut state, application_id, documents)
    }

    fn get_my_admission(&self) -> ServiceResult<AdmissionSummary> {
        let state = self.enter();
        if state.offline {
            return Err(offline());
        }
        state
            .admission
            .clone()
            .ok_or_else(|| ServiceError::not_found("no admission on file"))
    }
}
