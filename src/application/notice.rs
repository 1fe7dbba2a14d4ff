use std::collections::VecDeque;
use std::fmt;

use crate::domain::Step;

/// Where a restored draft came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSource {
    Remote,
    Local,
}

/// User-visible events raised by the draft and submission engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    DraftRestored { source: DraftSource, step: Step },
    /// Remote saving gave up; edits are kept on this device. Offers a retry.
    OfflineFallback,
    /// A save succeeded after fallback mode.
    BackOnline,
    AdmissionCheckFailed { message: String },
    Submitted { application_id: String },
    /// The application exists but some documents still need uploading.
    /// Offers a retry.
    DocumentUploadPending { application_id: String, failed: usize },
    DocumentsUploaded { application_id: String },
    SubmitFailed { message: String },
    StorageWarning { message: String },
}

impl Notice {
    /// Whether the notice carries a retry control.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            Notice::OfflineFallback
                | Notice::DocumentUploadPending { .. }
                | Notice::SubmitFailed { .. }
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::DraftRestored { source: DraftSource::Remote, step } => {
                write!(f, "Your saved progress was restored (step {step})")
            }
            Notice::DraftRestored { source: DraftSource::Local, step } => {
                write!(f, "Progress restored from this device (step {step})")
            }
            Notice::OfflineFallback => {
                write!(f, "Offline: changes are saved on this device. Press Ctrl+R to retry")
            }
            Notice::BackOnline => write!(f, "Back online, draft saved"),
            Notice::AdmissionCheckFailed { message } => {
                write!(f, "Could not check for an existing application: {message}")
            }
            Notice::Submitted { application_id } => {
                write!(f, "Application submitted (id {application_id})")
            }
            Notice::DocumentUploadPending { application_id, failed } => write!(
                f,
                "Application {application_id} submitted, but {failed} document(s) must be uploaded again. Press Ctrl+U to retry"
            ),
            Notice::DocumentsUploaded { application_id } => {
                write!(f, "All documents for application {application_id} uploaded")
            }
            Notice::SubmitFailed { message } => write!(f, "Submission failed: {message}"),
            Notice::StorageWarning { message } => {
                write!(f, "Could not save on this device: {message}")
            }
        }
    }
}

/// FIFO of notices waiting to be shown.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    pending: VecDeque<Notice>,
}

impl NoticeQueue {
    pub fn push(&mut self, notice: Notice) {
        self.pending.push_back(notice);
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        self.pending.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.pending.iter()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
