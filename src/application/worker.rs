//! Runs remote calls on background threads so the UI thread never waits on
//! the network.
//!
//! Each [`Job`] runs on its own thread against a shared service handle and
//! sends a [`JobResult`] back over a channel. The owner drains results with
//! [`RemoteWorker::try_next`] from its event loop. Results carry the epoch
//! they were issued in, so the owner can drop answers meant for a session
//! that has since been torn down.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::bootstrap::{BootstrapSequencer, RemoteSnapshot};
use super::submission::{DocumentRetry, SubmissionResolution, SubmissionStateMachine};
use super::sync::{SaveRequest, SyncTicket};
use crate::domain::{AdmissionService, ServiceError, ServiceResult, SubmissionPayload};

/// Remote work to run off the UI thread.
#[derive(Debug)]
pub enum Job {
    Bootstrap,
    SaveDraft(SaveRequest),
    Submit(SubmissionPayload),
    UploadDocuments(DocumentRetry),
}

#[derive(Debug)]
pub enum JobOutput {
    Bootstrap(RemoteSnapshot),
    DraftSaved {
        ticket: SyncTicket,
        result: ServiceResult<DateTime<Utc>>,
    },
    Submission(SubmissionResolution),
    DocumentsUploaded(ServiceResult<()>),
}

#[derive(Debug)]
pub struct JobResult {
    pub epoch: u64,
    pub output: JobOutput,
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::Bootstrap => "bootstrap",
            Job::SaveDraft(_) => "save-draft",
            Job::Submit(_) => "submit",
            Job::UploadDocuments(_) => "upload-documents",
        }
    }

    fn run<S: AdmissionService + ?Sized>(self, service: &S) -> JobOutput {
        match self {
            Job::Bootstrap => JobOutput::Bootstrap(BootstrapSequencer::fetch_remote(service)),
            Job::SaveDraft(request) => JobOutput::DraftSaved {
                ticket: request.ticket,
                result: service.save_draft(&request.record.form_data, request.record.current_step),
            },
            Job::Submit(payload) => JobOutput::Submission(SubmissionStateMachine::resolve(service, &payload)),
            Job::UploadDocuments(retry) => {
                JobOutput::DocumentsUploaded(SubmissionStateMachine::upload(service, &retry))
            }
        }
    }

    /// The output this job produces when `error` stops it from running.
    fn failed(&self, error: ServiceError) -> JobOutput {
        match self {
            Job::Bootstrap => JobOutput::Bootstrap(RemoteSnapshot {
                admission: Err(error.clone()),
                draft: Some(Err(error)),
            }),
            Job::SaveDraft(request) => JobOutput::DraftSaved {
                ticket: request.ticket,
                result: Err(error),
            },
            Job::Submit(_) => JobOutput::Submission(SubmissionResolution::Failed { error }),
            Job::UploadDocuments(_) => JobOutput::DocumentsUploaded(Err(error)),
        }
    }
}

pub struct RemoteWorker<S> {
    service: Arc<S>,
    results_tx: Sender<JobResult>,
    results_rx: Receiver<JobResult>,
    outstanding: usize,
}

impl<S> RemoteWorker<S>
where
    S: AdmissionService + 'static,
{
    pub fn new(service: S) -> Self {
        let (results_tx, results_rx) = mpsc::channel();
        Self {
            service: Arc::new(service),
            results_tx,
            results_rx,
            outstanding: 0,
        }
    }

    /// Jobs started but not yet collected, including ones from old epochs.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Starts `job` on a new thread. If no thread can be spawned, the job's
    /// failure is queued as its result instead.
    pub fn spawn(&mut self, epoch: u64, job: Job) {
        let name = job.name();
        // Kept in case the spawn fails and the job is dropped with its closure.
        let fallback = job.failed(ServiceError::network("could not start a background task"));
        let service = Arc::clone(&self.service);
        let results = self.results_tx.clone();

        let spawned = thread::Builder::new()
            .name(format!("admitsync-{name}"))
            .spawn(move || {
                let output = job.run(service.as_ref());
                if results.send(JobResult { epoch, output }).is_err() {
                    debug!(job = name, "session gone before the result arrived");
                }
            });

        self.outstanding += 1;
        if let Err(e) = spawned {
            warn!(job = name, error = %e, "failed to spawn remote worker");
            // The receiver lives in `self`, so this send cannot fail.
            let _ = self.results_tx.send(JobResult {
                epoch,
                output: fallback,
            });
        } else {
            debug!(job = name, epoch, "remote job started");
        }
    }

    pub fn try_next(&mut self) -> Option<JobResult> {
        let result = self.results_rx.try_recv().ok()?;
        self.outstanding = self.outstanding.saturating_sub(1);
        Some(result)
    }

    /// Blocks up to `timeout` for the next result.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<JobResult> {
        match self.results_rx.recv_timeout(timeout) {
            Ok(result) => {
                self.outstanding = self.outstanding.saturating_sub(1);
                Some(result)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}
