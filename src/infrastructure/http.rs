//! Blocking REST client for the portal's admission endpoints.
//!
//! HTTP status codes are turned into [`ServiceErrorKind`]s here so nothing
//! above this layer has to look at response text.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response, multipart};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    AdmissionService, AdmissionSummary, AttachedDocument, DocumentSlot, DraftRecord, FormState,
    ServiceError, ServiceErrorKind, ServiceResult, Step, SubmissionPayload,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServiceConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub request_timeout: Duration,
}

pub struct HttpAdmissionService {
    config: HttpServiceConfig,
    client: Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveDraftBody<'a> {
    form_data: &'a FormState,
    current_step: Step,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveDraftAck {
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadReport {
    #[serde(flatten)]
    admission: Option<AdmissionSummary>,
    #[serde(default)]
    failed_documents: Vec<String>,
}

impl HttpAdmissionService {
    pub fn new(config: HttpServiceConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceError::network(format!("could not build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> ServiceResult<Response> {
        self.authorized(request)
            .send()
            .map_err(|e| ServiceError::network(e.to_string()))
    }

    /// Fetches `path`, mapping 404, an empty body and a `null` body to `None`.
    fn get_optional<T: DeserializeOwned>(&self, path: &str) -> ServiceResult<Option<T>> {
        let response = self.send(self.client.get(self.url(path)))?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let body = read_body(response)?;
                if body.is_empty() { Ok(None) } else { decode_text(&body) }
            }
            status => Err(status_error(status, response)),
        }
    }

    /// Posts a multipart upload and turns the portal's report into the
    /// admission it names, or [`ServiceError::DocumentUpload`] for the slots
    /// it could not store.
    fn post_documents(
        &self,
        path: &str,
        data: Option<String>,
        documents: &[(DocumentSlot, AttachedDocument)],
    ) -> ServiceResult<Option<AdmissionSummary>> {
        let mut form = multipart::Form::new();
        if let Some(data) = data {
            form = form.text("data", data);
        }
        for (slot, document) in documents {
            form = form.file(slot.key(), &document.path).map_err(|e| {
                ServiceError::new(
                    ServiceErrorKind::Server,
                    format!("could not read {}: {e}", document.path.display()),
                )
            })?;
        }

        let response = self.send(self.client.post(self.url(path)).multipart(form))?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response));
        }

        let body = read_body(response)?;
        let report: UploadReport = if body.is_empty() {
            UploadReport::default()
        } else {
            decode_text(&body)?
        };
        if status == StatusCode::MULTI_STATUS || !report.failed_documents.is_empty() {
            debug!(failed = ?report.failed_documents, "document upload partially failed");
            return Err(ServiceError::DocumentUpload {
                application_id: report.admission.map(|a| a.id),
                failed: failed_slots(&report.failed_documents, documents),
            });
        }
        Ok(report.admission)
    }
}

impl AdmissionService for HttpAdmissionService {
    fn check_existing_admission(&self) -> ServiceResult<Option<AdmissionSummary>> {
        self.get_optional("/admissions/me")
    }

    fn get_draft(&self) -> ServiceResult<Option<DraftRecord>> {
        self.get_optional("/admissions/draft")
    }

    fn save_draft(&self, form: &FormState, step: Step) -> ServiceResult<DateTime<Utc>> {
        let body = SaveDraftBody {
            form_data: form,
            current_step: step,
        };
        let response = self.send(self.client.put(self.url("/admissions/draft")).json(&body))?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), response));
        }
        let saved_at = parse_save_ack(&read_body(response)?)?;
        Ok(saved_at.unwrap_or_else(Utc::now))
    }

    fn clear_draft(&self) -> ServiceResult<()> {
        let response = self.send(self.client.delete(self.url("/admissions/draft")))?;
        match response.status() {
            status if status.is_success() || status == StatusCode::NOT_FOUND => Ok(()),
            status => Err(status_error(status, response)),
        }
    }

    fn submit_application(&self, payload: &SubmissionPayload) -> ServiceResult<AdmissionSummary> {
        let response = self.send(self.client.post(self.url("/admissions")).json(payload))?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), response));
        }
        decode_body(response)
    }

    fn submit_application_with_documents(
        &self,
        payload: &SubmissionPayload,
        documents: &[(DocumentSlot, AttachedDocument)],
    ) -> ServiceResult<AdmissionSummary> {
        let data = serde_json::to_string(payload)
            .map_err(|e| ServiceError::new(ServiceErrorKind::Decode, e.to_string()))?;
        self.post_documents("/admissions/with-documents", Some(data), documents)?
            .ok_or_else(|| ServiceError::new(ServiceErrorKind::Decode, "response carried no admission id"))
    }

    fn upload_documents(
        &self,
        application_id: &str,
        documents: &[(DocumentSlot, AttachedDocument)],
    ) -> ServiceResult<()> {
        let path = format!("/admissions/{application_id}/documents");
        self.post_documents(&path, None, documents).map(drop)
    }

    fn get_my_admission(&self) -> ServiceResult<AdmissionSummary> {
        self.get_optional("/admissions/me")?
            .ok_or_else(|| ServiceError::not_found("no admission on file"))
    }
}

fn read_body(response: Response) -> ServiceResult<String> {
    let body = response
        .text()
        .map_err(|e| ServiceError::network(format!("could not read response: {e}")))?;
    Ok(body.trim().to_string())
}

fn decode_body<T: DeserializeOwned>(response: Response) -> ServiceResult<T> {
    decode_text(&read_body(response)?)
}

/// A save acknowledged with 204 or an empty body carries no timestamp.
fn parse_save_ack(body: &str) -> ServiceResult<Option<DateTime<Utc>>> {
    if body.is_empty() {
        return Ok(None);
    }
    let ack: SaveDraftAck = decode_text(body)?;
    Ok(ack.saved_at)
}

/// Maps the portal's failed document keys back to slots. Unknown or missing
/// keys mean the whole batch is treated as failed.
fn failed_slots(keys: &[String], sent: &[(DocumentSlot, AttachedDocument)]) -> Vec<DocumentSlot> {
    let named: Vec<DocumentSlot> = keys.iter().filter_map(|key| DocumentSlot::from_key(key)).collect();
    if named.is_empty() {
        sent.iter().map(|(slot, _)| *slot).collect()
    } else {
        named
    }
}

fn decode_text<T: DeserializeOwned>(body: &str) -> ServiceResult<T> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ServiceError::new(ServiceErrorKind::Decode, e.to_string()))?;
    // The portal wraps some responses in `{ "data": ... }`.
    let value = match value {
        serde_json::Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    };
    serde_json::from_value(value).map_err(|e| ServiceError::new(ServiceErrorKind::Decode, e.to_string()))
}

fn status_error(status: StatusCode, response: Response) -> ServiceError {
    let message = response
        .text()
        .ok()
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| status.to_string());
    ServiceError::new(classify_status(status), message)
}

fn classify_status(status: StatusCode) -> ServiceErrorKind {
    match status {
        StatusCode::NOT_FOUND => ServiceErrorKind::NotFound,
        StatusCode::CONFLICT => ServiceErrorKind::Duplicate,
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => ServiceErrorKind::Network,
        _ => ServiceErrorKind::Server,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::NOT_FOUND), ServiceErrorKind::NotFound);
        assert_eq!(classify_status(StatusCode::CONFLICT), ServiceErrorKind::Duplicate);
        assert_eq!(classify_status(StatusCode::SERVICE_UNAVAILABLE), ServiceErrorKind::Network);
        assert_eq!(classify_status(StatusCode::INTERNAL_SERVER_ERROR), ServiceErrorKind::Server);
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), ServiceErrorKind::Server);
    }

    #[test]
    fn test_url_joining() {
        let service = HttpAdmissionService::new(HttpServiceConfig {
            base_url: "http://portal.local/api/".to_string(),
            bearer_token: None,
            request_timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(service.url("/admissions/me"), "http://portal.local/api/admissions/me");
    }

    #[test]
    fn test_unreachable_server_is_network_error() {
        let service = HttpAdmissionService::new(HttpServiceConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            bearer_token: Some("t".to_string()),
            request_timeout: Duration::from_millis(500),
        })
        .unwrap();
        let err = service.check_existing_admission().unwrap_err();
        assert_eq!(err.kind(), Some(ServiceErrorKind::Network));
    }

    #[test]
    fn test_empty_save_acknowledgement_is_success() {
        assert_eq!(parse_save_ack("").unwrap(), None);
        let at = parse_save_ack(r#"{"data":{"savedAt":"2026-03-01T10:00:00Z"}}"#).unwrap();
        assert_eq!(at.map(|t| t.to_rfc3339()), Some("2026-03-01T10:00:00+00:00".to_string()));
        assert_eq!(parse_save_ack("{}").unwrap(), None);
        assert!(parse_save_ack("not json").is_err());
    }

    #[test]
    fn test_failed_slots_fall_back_to_whole_batch() {
        let sent = vec![
            (DocumentSlot::Photo, AttachedDocument::from_path("p.png")),
            (DocumentSlot::IdProof, AttachedDocument::from_path("id.pdf")),
        ];
        assert_eq!(failed_slots(&["idProof".to_string()], &sent), vec![DocumentSlot::IdProof]);
        assert_eq!(
            failed_slots(&["mystery".to_string()], &sent),
            vec![DocumentSlot::Photo, DocumentSlot::IdProof]
        );
        assert_eq!(failed_slots(&[], &sent).len(), 2);
    }

    #[test]
    fn test_upload_report_parses_partial_failure() {
        let report: UploadReport =
            serde_json::from_str(r#"{"_id":"APP-3","failedDocuments":["photo"]}"#).unwrap();
        assert_eq!(report.admission.map(|a| a.id), Some("APP-3".to_string()));
        assert_eq!(report.failed_documents, vec!["photo"]);
    }
}
