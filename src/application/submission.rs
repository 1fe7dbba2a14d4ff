//! One-way transition from drafting to a submitted application.
//!
//! ```text
//! CheckingExisting -> { Submitted, Drafting }
//! Drafting -> Submitting -> { Submitted, SubmitError }
//! SubmitError -> Submitting
//! ```
//!
//! The server is the authority on whether an application exists. A duplicate
//! signal, a lost response, or a partially failed document upload all resolve
//! to `Submitted` once the canonical admission id can be fetched.
//!
//! Remote work is split from state changes: [`SubmissionStateMachine::resolve`]
//! and [`SubmissionStateMachine::upload`] only talk to the service and may run
//! on any thread; the `apply_*`/`finish_*` methods fold their results back in.

use tracing::{info, warn};

use super::notice::{Notice, NoticeQueue};
use crate::domain::{
    AdmissionService, AdmissionSummary, AttachedDocument, DocumentSlot, FormState, ServiceError,
    ServiceErrorKind, ServiceResult, SubmissionPayload, SubmissionRecord,
};
use crate::infrastructure::{KeyValueStore, LocalFallbackStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    CheckingExisting,
    Drafting,
    Submitting,
    Submitted { application_id: String },
    SubmitError { message: String },
}

/// Result of the startup check against the remote system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistingCheck {
    Submitted { application_id: String },
    NotSubmitted,
    /// The check itself failed; nothing is known about submission status.
    Unknown,
}

/// What the server made of a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResolution {
    Created { application_id: String },
    /// A duplicate or lost response; the existing admission was fetched.
    Recovered { application_id: String },
    Partial {
        application_id: String,
        failed: Vec<DocumentSlot>,
    },
    Failed { error: ServiceError },
}

impl SubmissionResolution {
    pub fn application_id(&self) -> Option<&str> {
        match self {
            SubmissionResolution::Created { application_id }
            | SubmissionResolution::Recovered { application_id }
            | SubmissionResolution::Partial { application_id, .. } => Some(application_id),
            SubmissionResolution::Failed { .. } => None,
        }
    }
}

/// Outcome of an explicit submit, as reported to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted {
        application_id: String,
        /// The id was recovered from the server after a duplicate or lost response.
        recovered: bool,
    },
    /// The application exists but the listed documents must be uploaded again.
    PartiallySubmitted {
        application_id: String,
        failed_documents: Vec<DocumentSlot>,
    },
    Failed { error: ServiceError },
    /// Submitting is not possible in the current state.
    NotAllowed,
}

impl SubmitOutcome {
    pub fn application_id(&self) -> Option<&str> {
        match self {
            SubmitOutcome::Submitted { application_id, .. }
            | SubmitOutcome::PartiallySubmitted { application_id, .. } => Some(application_id),
            SubmitOutcome::Failed { .. } | SubmitOutcome::NotAllowed => None,
        }
    }
}

/// Documents to send again for an application that already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRetry {
    pub application_id: String,
    pub documents: Vec<(DocumentSlot, AttachedDocument)>,
}

#[derive(Debug)]
pub struct SubmissionStateMachine {
    user_id: String,
    state: SubmissionState,
    pending_documents: Vec<DocumentSlot>,
    uploading: bool,
}

impl SubmissionStateMachine {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: SubmissionState::CheckingExisting,
            pending_documents: Vec::new(),
            uploading: false,
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.state, SubmissionState::Submitted { .. })
    }

    pub fn application_id(&self) -> Option<&str> {
        match &self.state {
            SubmissionState::Submitted { application_id } => Some(application_id),
            _ => None,
        }
    }

    /// Document slots whose upload failed and can be retried.
    pub fn pending_documents(&self) -> &[DocumentSlot] {
        &self.pending_documents
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    /// Folds in the answer to "does this user already have an application?".
    pub fn apply_existing<K: KeyValueStore>(
        &mut self,
        answer: ServiceResult<Option<AdmissionSummary>>,
        local: &LocalFallbackStore<K>,
        notices: &mut NoticeQueue,
    ) -> ExistingCheck {
        match answer {
            Ok(Some(admission)) => {
                info!(user_id = %self.user_id, application_id = %admission.id, "existing admission found");
                self.finalize(&admission.id, local, notices, false);
                ExistingCheck::Submitted {
                    application_id: admission.id,
                }
            }
            Ok(None) => {
                if local.load_submission(&self.user_id).is_some() {
                    info!(user_id = %self.user_id, "server has no admission, clearing stale local marker");
                }
                self.clear_local_marker(local, notices);
                self.state = SubmissionState::Drafting;
                ExistingCheck::NotSubmitted
            }
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "existing admission check failed");
                notices.push(Notice::AdmissionCheckFailed {
                    message: e.to_string(),
                });
                // An unverifiable marker must not lock the user out of the form.
                self.clear_local_marker(local, notices);
                self.state = SubmissionState::Drafting;
                ExistingCheck::Unknown
            }
        }
    }

    /// Moves to `Submitting` and returns the payload to send.
    ///
    /// Already submitted: `Err` with the same application id again. Still
    /// checking or already submitting: `Err(NotAllowed)`.
    pub fn begin_submit(&mut self, form: &FormState) -> Result<SubmissionPayload, SubmitOutcome> {
        match &self.state {
            SubmissionState::Submitted { application_id } => {
                return Err(SubmitOutcome::Submitted {
                    application_id: application_id.clone(),
                    recovered: true,
                });
            }
            SubmissionState::Drafting | SubmissionState::SubmitError { .. } => {}
            SubmissionState::CheckingExisting | SubmissionState::Submitting => {
                return Err(SubmitOutcome::NotAllowed);
            }
        }
        self.state = SubmissionState::Submitting;
        Ok(SubmissionPayload::from_form(form))
    }

    /// Sends `payload` and recovers the canonical admission where the server
    /// says one exists. Clears the remote draft once an application exists.
    pub fn resolve<S>(service: &S, payload: &SubmissionPayload) -> SubmissionResolution
    where
        S: AdmissionService + ?Sized,
    {
        let result = if payload.has_documents() {
            service.submit_application_with_documents(payload, payload.documents())
        } else {
            service.submit_application(payload)
        };

        let resolution = match result {
            Ok(admission) => SubmissionResolution::Created {
                application_id: admission.id,
            },
            Err(ServiceError::DocumentUpload {
                application_id,
                failed,
            }) => {
                let recovered = application_id
                    .map(Ok)
                    .unwrap_or_else(|| service.get_my_admission().map(|a| a.id));
                match recovered {
                    Ok(application_id) => SubmissionResolution::Partial {
                        application_id,
                        failed,
                    },
                    Err(error) => SubmissionResolution::Failed { error },
                }
            }
            Err(e) if e.is_duplicate() => {
                info!("server reports an existing application, recovering it");
                Self::recover(service, e)
            }
            // The request may have landed even though the response was lost.
            Err(e) if e.kind() == Some(ServiceErrorKind::Network) => Self::recover(service, e),
            Err(error) => SubmissionResolution::Failed { error },
        };

        if let Some(id) = resolution.application_id() {
            if let Err(e) = service.clear_draft() {
                warn!(application_id = %id, error = %e, "could not clear remote draft");
            }
        }
        resolution
    }

    /// Applies the result of [`resolve`](Self::resolve). Ignored unless a
    /// submission is underway.
    pub fn finish_submit<K: KeyValueStore>(
        &mut self,
        resolution: SubmissionResolution,
        local: &LocalFallbackStore<K>,
        notices: &mut NoticeQueue,
    ) -> SubmitOutcome {
        if self.state != SubmissionState::Submitting {
            warn!(user_id = %self.user_id, state = ?self.state, "submission result arrived out of turn");
            return SubmitOutcome::NotAllowed;
        }

        match resolution {
            SubmissionResolution::Created { application_id } => {
                self.finalize(&application_id, local, notices, true);
                SubmitOutcome::Submitted {
                    application_id,
                    recovered: false,
                }
            }
            SubmissionResolution::Recovered { application_id } => {
                self.finalize(&application_id, local, notices, true);
                SubmitOutcome::Submitted {
                    application_id,
                    recovered: true,
                }
            }
            SubmissionResolution::Partial {
                application_id,
                failed,
            } => {
                warn!(user_id = %self.user_id, %application_id, failed = failed.len(), "documents failed to upload");
                self.finalize(&application_id, local, notices, false);
                self.pending_documents = failed.clone();
                notices.push(Notice::DocumentUploadPending {
                    application_id: application_id.clone(),
                    failed: failed.len(),
                });
                SubmitOutcome::PartiallySubmitted {
                    application_id,
                    failed_documents: failed,
                }
            }
            SubmissionResolution::Failed { error } => self.fail(error, notices),
        }
    }

    /// Collects the failed documents from `form` for another upload.
    pub fn begin_document_retry(&mut self, form: &FormState) -> Option<DocumentRetry> {
        let application_id = self.application_id()?.to_string();
        if self.uploading || self.pending_documents.is_empty() {
            return None;
        }
        let documents: Vec<_> = self
            .pending_documents
            .iter()
            .filter_map(|slot| form.document(*slot).map(|doc| (*slot, doc.clone())))
            .collect();
        if documents.is_empty() {
            warn!(user_id = %self.user_id, "failed documents are no longer attached");
            return None;
        }
        self.uploading = true;
        Some(DocumentRetry {
            application_id,
            documents,
        })
    }

    pub fn upload<S>(service: &S, retry: &DocumentRetry) -> ServiceResult<()>
    where
        S: AdmissionService + ?Sized,
    {
        service.upload_documents(&retry.application_id, &retry.documents)
    }

    /// Applies the result of [`upload`](Self::upload).
    pub fn finish_document_retry(&mut self, result: ServiceResult<()>, notices: &mut NoticeQueue) {
        self.uploading = false;
        let Some(application_id) = self.application_id().map(str::to_string) else {
            return;
        };

        match result {
            Ok(()) => {
                info!(user_id = %self.user_id, %application_id, "documents uploaded");
                self.pending_documents.clear();
                notices.push(Notice::DocumentsUploaded { application_id });
            }
            Err(e) if e.is_duplicate() => {
                info!(user_id = %self.user_id, %application_id, "server already holds the documents");
                self.pending_documents.clear();
                notices.push(Notice::DocumentsUploaded { application_id });
            }
            Err(ServiceError::DocumentUpload { failed, .. }) => {
                warn!(user_id = %self.user_id, %application_id, failed = failed.len(), "document retry partially failed");
                self.pending_documents = failed;
                notices.push(Notice::DocumentUploadPending {
                    application_id,
                    failed: self.pending_documents.len(),
                });
            }
            Err(e) => {
                warn!(user_id = %self.user_id, %application_id, error = %e, "document retry failed");
                notices.push(Notice::DocumentUploadPending {
                    application_id,
                    failed: self.pending_documents.len(),
                });
            }
        }
    }

    fn recover<S>(service: &S, original: ServiceError) -> SubmissionResolution
    where
        S: AdmissionService + ?Sized,
    {
        match service.get_my_admission() {
            Ok(admission) => SubmissionResolution::Recovered {
                application_id: admission.id,
            },
            Err(e) if e.is_not_found() => SubmissionResolution::Failed { error: original },
            Err(e) => {
                warn!(error = %e, "could not recover existing admission");
                SubmissionResolution::Failed { error: original }
            }
        }
    }

    fn fail(&mut self, error: ServiceError, notices: &mut NoticeQueue) -> SubmitOutcome {
        warn!(user_id = %self.user_id, error = %error, "submission failed");
        let message = error.to_string();
        notices.push(Notice::SubmitFailed {
            message: message.clone(),
        });
        self.state = SubmissionState::SubmitError { message };
        SubmitOutcome::Failed { error }
    }

    /// Enters the terminal state: persist the marker and drop the local draft.
    fn finalize<K: KeyValueStore>(
        &mut self,
        application_id: &str,
        local: &LocalFallbackStore<K>,
        notices: &mut NoticeQueue,
        announce: bool,
    ) {
        self.state = SubmissionState::Submitted {
            application_id: application_id.to_string(),
        };

        let record = SubmissionRecord::submitted(application_id);
        if let Err(e) = local.save_submission(&self.user_id, &record) {
            notices.push(Notice::StorageWarning {
                message: e.to_string(),
            });
        }
        if let Err(e) = local.clear_draft(&self.user_id) {
            warn!(user_id = %self.user_id, error = %e, "could not clear local draft");
        }
        if announce {
            notices.push(Notice::Submitted {
                application_id: application_id.to_string(),
            });
        }
    }

    fn clear_local_marker<K: KeyValueStore>(&self, local: &LocalFallbackStore<K>, notices: &mut NoticeQueue) {
        if let Err(e) = local.clear_submission(&self.user_id) {
            notices.push(Notice::StorageWarning {
                message: e.to_string(),
            });
        }
    }
}
