//! Remote admission service contract and submission payload shaping.
//!
//! The portal's REST client is an external collaborator. This module names
//! the operations the draft engine needs from it and the error semantics it
//! relies on, and converts wizard state into the shape the API expects.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ServiceResult;
use super::models::{AttachedDocument, DocumentSlot, DraftRecord, FieldValue, FormField, FormState, Step};

/// Minimal view of an admission record held by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionSummary {
    #[serde(alias = "_id", alias = "applicationId")]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Operations consumed from the portal API, all scoped to the signed-in user.
///
/// Implementations must keep "absent" and "request failed" apart: absence is
/// `Ok(None)`, a failed request is `Err` with [`ServiceErrorKind::Network`] or
/// [`ServiceErrorKind::Server`]. A duplicate submission is reported as
/// [`ServiceErrorKind::Duplicate`], and a submission whose record was created
/// while documents failed is [`ServiceError::DocumentUpload`].
///
/// [`ServiceErrorKind::Network`]: super::errors::ServiceErrorKind::Network
/// [`ServiceErrorKind::Server`]: super::errors::ServiceErrorKind::Server
/// [`ServiceErrorKind::Duplicate`]: super::errors::ServiceErrorKind::Duplicate
/// Calls are blocking; the session runs them on background threads, hence
/// the `Send + Sync` bound.
///
/// [`ServiceError::DocumentUpload`]: super::errors::ServiceError::DocumentUpload
pub trait AdmissionService: Send + Sync {
    fn check_existing_admission(&self) -> ServiceResult<Option<AdmissionSummary>>;

    fn get_draft(&self) -> ServiceResult<Option<DraftRecord>>;

    /// Persists the draft and returns the server's acknowledgement time.
    fn save_draft(&self, form: &FormState, step: Step) -> ServiceResult<DateTime<Utc>>;

    fn clear_draft(&self) -> ServiceResult<()>;

    fn submit_application(&self, payload: &SubmissionPayload) -> ServiceResult<AdmissionSummary>;

    fn submit_application_with_documents(
        &self,
        payload: &SubmissionPayload,
        documents: &[(DocumentSlot, AttachedDocument)],
    ) -> ServiceResult<AdmissionSummary>;

    /// Uploads documents for an existing application. A partial failure is
    /// [`ServiceError::DocumentUpload`] listing the slots still missing.
    ///
    /// [`ServiceError::DocumentUpload`]: super::errors::ServiceError::DocumentUpload
    fn upload_documents(
        &self,
        application_id: &str,
        documents: &[(DocumentSlot, AttachedDocument)],
    ) -> ServiceResult<()>;

    fn get_my_admission(&self) -> ServiceResult<AdmissionSummary>;
}

macro_rules! forward_admission_service {
    ($($wrapper:ty),+) => {$(
        impl<T: AdmissionService + ?Sized> AdmissionService for $wrapper {
            fn check_existing_admission(&self) -> ServiceResult<Option<AdmissionSummary>> {
                (**self).check_existing_admission()
            }

            fn get_draft(&self) -> ServiceResult<Option<DraftRecord>> {
                (**self).get_draft()
            }

            fn save_draft(&self, form: &FormState, step: Step) -> ServiceResult<DateTime<Utc>> {
                (**self).save_draft(form, step)
            }

            fn clear_draft(&self) -> ServiceResult<()> {
                (**self).clear_draft()
            }

            fn submit_application(&self, payload: &SubmissionPayload) -> ServiceResult<AdmissionSummary> {
                (**self).submit_application(payload)
            }

            fn submit_application_with_documents(
                &self,
                payload: &SubmissionPayload,
                documents: &[(DocumentSlot, AttachedDocument)],
            ) -> ServiceResult<AdmissionSummary> {
                (**self).submit_application_with_documents(payload, documents)
            }

            fn upload_documents(
                &self,
                application_id: &str,
                documents: &[(DocumentSlot, AttachedDocument)],
            ) -> ServiceResult<()> {
                (**self).upload_documents(application_id, documents)
            }

            fn get_my_admission(&self) -> ServiceResult<AdmissionSummary> {
                (**self).get_my_admission()
            }
        }
    )+};
}

forward_admission_service!(&T, Box<T>);

/// Form data converted into the admission API's request body.
///
/// # Examples
///
/// ```
/// use admitsync::domain::{FieldValue, FormField, FormState, SubmissionPayload};
///
/// let mut form = FormState::default();
/// form.set(FormField::Gender, FieldValue::Text("female".into()));
/// form.set(FormField::Shift, FieldValue::Text("EVENING".into()));
///
/// let payload = SubmissionPayload::from_form(&form);
/// assert_eq!(payload.field("gender"), Some(&"Female".into()));
/// assert_eq!(payload.field("shift"), Some(&"Evening".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionPayload {
    #[serde(flatten)]
    fields: BTreeMap<&'static str, serde_json::Value>,
    #[serde(skip)]
    documents: Vec<(DocumentSlot, AttachedDocument)>,
}

impl SubmissionPayload {
    pub fn from_form(form: &FormState) -> Self {
        let same_as_present = form.flag(FormField::SameAsPresent);
        let mut fields = BTreeMap::new();

        for field in FormField::ALL {
            let source = if same_as_present {
                FormField::ADDRESS_PAIRS
                    .iter()
                    .find(|(_, permanent)| *permanent == field)
                    .map(|(present, _)| *present)
                    .unwrap_or(field)
            } else {
                field
            };

            let Some(value) = form.get(source) else {
                continue;
            };
            let json = match value {
                FieldValue::Flag(flag) => serde_json::Value::Bool(*flag),
                FieldValue::Text(text) if text.trim().is_empty() => continue,
                FieldValue::Text(text) => match field {
                    FormField::Gender | FormField::Shift => capitalize(text.trim()).into(),
                    _ => text.trim().into(),
                },
            };
            fields.insert(field.key(), json);
        }

        let documents = form
            .documents()
            .map(|(slot, doc)| (slot, doc.clone()))
            .collect();

        Self { fields, documents }
    }

    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    pub fn documents(&self) -> &[(DocumentSlot, AttachedDocument)] {
        &self.documents
    }

    pub fn has_documents(&self) -> bool {
        !self.documents.is_empty()
    }
}

fn capitalize(value: &str) -> String {
    let lower = value.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
