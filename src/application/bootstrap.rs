//! Ordered startup for a wizard session.
//!
//! 1. drop local keys left behind by other users
//! 2. read the local submission marker (provisional only)
//! 3. ask the server whether an application exists; this overrides step 2
//! 4. restore the remote draft
//! 5. otherwise restore the local fallback draft
//! 6. otherwise start blank at step 1
//!
//! Steps 1-2 are local and run in [`BootstrapSequencer::begin`]. The remote
//! calls of steps 3-4 are gathered by [`BootstrapSequencer::fetch_remote`],
//! which may run off the UI thread, and [`BootstrapSequencer::finish`] applies
//! the answers.

use tracing::{info, warn};

use super::form_store::FormStateStore;
use super::notice::{DraftSource, Notice, NoticeQueue};
use super::submission::{ExistingCheck, SubmissionStateMachine};
use crate::domain::{AdmissionService, AdmissionSummary, DraftRecord, Namespace, ServiceResult, Step};
use crate::infrastructure::{KeyValueStore, LocalFallbackStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Submitted { application_id: String },
    Restored { source: DraftSource, step: Step },
    Blank,
}

/// State known before any remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapStart {
    /// Application id from the local marker, shown until the server answers.
    pub provisional_submission: Option<String>,
    /// Local keys of other users removed in step 1.
    pub collected_keys: usize,
}

/// Answers from the remote system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub admission: ServiceResult<Option<AdmissionSummary>>,
    /// Not fetched once an admission is known to exist.
    pub draft: Option<ServiceResult<Option<DraftRecord>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub outcome: BootstrapOutcome,
    pub provisional_submission: Option<String>,
    /// At least one remote call failed.
    pub remote_unreachable: bool,
    /// The remote draft could not be fetched; drafts go to the local store.
    pub draft_fetch_failed: bool,
    pub collected_keys: usize,
}

pub struct BootstrapSequencer;

impl BootstrapSequencer {
    pub fn begin<K: KeyValueStore>(user_id: &str, local: &LocalFallbackStore<K>) -> BootstrapStart {
        let collected_keys = local.garbage_collect(user_id, Namespace::Draft)
            + local.garbage_collect(user_id, Namespace::Submission);

        let provisional_submission = local
            .load_submission(user_id)
            .map(|record| record.application_id);
        if let Some(id) = &provisional_submission {
            info!(user_id, application_id = %id, "showing cached submission while verifying");
        }
        BootstrapStart {
            provisional_submission,
            collected_keys,
        }
    }

    /// Asks for an existing admission, then for the draft. An existing
    /// admission also clears the remote draft.
    pub fn fetch_remote<S>(service: &S) -> RemoteSnapshot
    where
        S: AdmissionService + ?Sized,
    {
        let admission = service.check_existing_admission();
        if let Ok(Some(found)) = &admission {
            if let Err(e) = service.clear_draft() {
                warn!(application_id = %found.id, error = %e, "could not clear remote draft");
            }
            return RemoteSnapshot { admission, draft: None };
        }
        RemoteSnapshot {
            admission,
            draft: Some(service.get_draft()),
        }
    }

    pub fn finish<K: KeyValueStore>(
        user_id: &str,
        start: BootstrapStart,
        remote: RemoteSnapshot,
        local: &LocalFallbackStore<K>,
        submission: &mut SubmissionStateMachine,
        form: &mut FormStateStore,
        notices: &mut NoticeQueue,
    ) -> BootstrapReport {
        let BootstrapStart {
            provisional_submission,
            collected_keys,
        } = start;
        let mut report = BootstrapReport {
            outcome: BootstrapOutcome::Blank,
            provisional_submission,
            remote_unreachable: false,
            draft_fetch_failed: false,
            collected_keys,
        };

        match submission.apply_existing(remote.admission, local, notices) {
            ExistingCheck::Submitted { application_id } => {
                form.lock();
                report.outcome = BootstrapOutcome::Submitted { application_id };
                return report;
            }
            ExistingCheck::NotSubmitted => {}
            ExistingCheck::Unknown => report.remote_unreachable = true,
        }

        match remote.draft {
            Some(Ok(Some(draft))) => {
                let step = draft.current_step;
                form.restore(draft);
                notices.push(Notice::DraftRestored {
                    source: DraftSource::Remote,
                    step,
                });
                info!(user_id, step = step.get(), "restored remote draft");
                report.outcome = BootstrapOutcome::Restored {
                    source: DraftSource::Remote,
                    step,
                };
                return report;
            }
            Some(Ok(None)) | None => {}
            Some(Err(e)) => {
                warn!(user_id, error = %e, "could not fetch remote draft");
                report.draft_fetch_failed = true;
                report.remote_unreachable = true;
            }
        }

        report.outcome = match local.load_draft(user_id) {
            Some(draft) => {
                let step = draft.current_step;
                form.restore(draft);
                // After a failed fetch the offline notice already tells the story.
                if !report.draft_fetch_failed {
                    notices.push(Notice::DraftRestored {
                        source: DraftSource::Local,
                        step,
                    });
                }
                info!(user_id, step = step.get(), "restored local draft");
                BootstrapOutcome::Restored {
                    source: DraftSource::Local,
                    step,
                }
            }
            None => {
                form.reset();
                BootstrapOutcome::Blank
            }
        };
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::domain::{FieldValue, FormField, FormState, SubmissionRecord};
    use crate::infrastructure::{LoopbackAdmissionService, MemoryStore};

    struct Run {
        report: BootstrapReport,
        form: FormStateStore,
        submission: SubmissionStateMachine,
        notices: Vec<Notice>,
    }

    fn run(user: &str, service: &LoopbackAdmissionService, local: &LocalFallbackStore<MemoryStore>) -> Run {
        let mut submission = SubmissionStateMachine::new(user);
        let mut form = FormStateStore::new();
        let mut notices = NoticeQueue::default();
        let start = BootstrapSequencer::begin(user, local);
        let remote = BootstrapSequencer::fetch_remote(service);
        let report = BootstrapSequencer::finish(user, start, remote, local, &mut submission, &mut form, &mut notices);
        Run {
            report,
            form,
            submission,
            notices: notices.drain(),
        }
    }

    fn draft(name: &str, step: i64) -> DraftRecord {
        let mut form = FormState::default();
        form.set(FormField::FirstName, FieldValue::Text(name.to_string()));
        DraftRecord::new(form, Step::normalized(step), Utc::now())
    }

    #[test]
    fn test_fresh_user_starts_blank() {
        let local = LocalFallbackStore::new(MemoryStore::new());
        let r = run("u1", &LoopbackAdmissionService::new(), &local);
        assert_eq!(r.report.outcome, BootstrapOutcome::Blank);
        assert_eq!(r.form.step(), Step::FIRST);
        assert!(r.form.get().is_blank());
        assert!(!r.report.remote_unreachable);
        assert!(r.notices.is_empty());
    }

    #[test]
    fn test_remote_draft_restored_with_single_notice() {
        let service = LoopbackAdmissionService::new().with_draft(draft("Remote", 3));
        let local = LocalFallbackStore::new(MemoryStore::new());
        local.save_draft("u1", &draft("Local", 5)).unwrap();

        let r = run("u1", &service, &local);
        let step = Step::normalized(3);
        assert_eq!(
            r.report.outcome,
            BootstrapOutcome::Restored {
                source: DraftSource::Remote,
                step
            }
        );
        assert_eq!(r.form.get().text(FormField::FirstName), "Remote");
        assert_eq!(r.form.step(), step);
        assert_eq!(
            r.notices,
            vec![Notice::DraftRestored {
                source: DraftSource::Remote,
                step
            }]
        );
    }

    #[test]
    fn test_remote_draft_with_corrupt_step_starts_at_one() {
        let mut bad = draft("X", 1);
        bad.current_step = serde_json::from_str("42").unwrap();
        let service = LoopbackAdmissionService::new().with_draft(bad);
        let local = LocalFallbackStore::new(MemoryStore::new());

        let r = run("u1", &service, &local);
        assert_eq!(r.form.step(), Step::FIRST);
    }

    #[test]
    fn test_offline_restores_local_draft_silently() {
        let service = LoopbackAdmissionService::new();
        service.set_offline(true);
        let local = LocalFallbackStore::new(MemoryStore::new());
        local.save_draft("u1", &draft("Offline", 4)).unwrap();

        let r = run("u1", &service, &local);
        assert_eq!(
            r.report.outcome,
            BootstrapOutcome::Restored {
                source: DraftSource::Local,
                step: Step::normalized(4)
            }
        );
        assert!(r.report.remote_unreachable);
        assert!(r.report.draft_fetch_failed);
        assert_eq!(r.form.get().text(FormField::FirstName), "Offline");
        assert!(matches!(r.notices.as_slice(), [Notice::AdmissionCheckFailed { .. }]));
    }

    #[test]
    fn test_failed_check_alone_does_not_mark_draft_store_down() {
        let service = LoopbackAdmissionService::new().with_draft(draft("Remote", 2));
        service.set_check_fails(true);
        let local = LocalFallbackStore::new(MemoryStore::new());

        let r = run("u1", &service, &local);
        assert!(r.report.remote_unreachable);
        assert!(!r.report.draft_fetch_failed);
        assert!(matches!(
            r.report.outcome,
            BootstrapOutcome::Restored {
                source: DraftSource::Remote,
                ..
            }
        ));
    }

    #[test]
    fn test_absent_remote_draft_falls_back_to_local_with_notice() {
        let local = LocalFallbackStore::new(MemoryStore::new());
        local.save_draft("u1", &draft("Kept", 2)).unwrap();

        let r = run("u1", &LoopbackAdmissionService::new(), &local);
        assert!(!r.report.remote_unreachable);
        assert_eq!(
            r.notices,
            vec![Notice::DraftRestored {
                source: DraftSource::Local,
                step: Step::normalized(2)
            }]
        );
    }

    #[test]
    fn test_existing_admission_blocks_local_restore() {
        let service = LoopbackAdmissionService::new()
            .with_admission("APP-5")
            .with_draft(draft("Server copy", 2));
        let local = LocalFallbackStore::new(MemoryStore::new());
        local.save_draft("u1", &draft("Stale", 4)).unwrap();

        let mut r = run("u1", &service, &local);
        assert_eq!(
            r.report.outcome,
            BootstrapOutcome::Submitted {
                application_id: "APP-5".to_string()
            }
        );
        assert!(r.submission.is_submitted());
        assert!(r.form.get().is_blank());
        assert!(local.load_draft("u1").is_none());
        assert!(service.draft().is_none());
        assert!(!r.form.set(FormField::FirstName, FieldValue::Text("edit".to_string())));
    }

    #[test]
    fn test_provisional_marker_overridden_by_server() {
        let local = LocalFallbackStore::new(MemoryStore::new());
        local
            .save_submission("u1", &SubmissionRecord::submitted("CACHED"))
            .unwrap();

        let start = BootstrapSequencer::begin("u1", &local);
        assert_eq!(start.provisional_submission.as_deref(), Some("CACHED"));

        let r = run("u1", &LoopbackAdmissionService::new(), &local);
        assert_eq!(r.report.provisional_submission.as_deref(), Some("CACHED"));
        assert_eq!(r.report.outcome, BootstrapOutcome::Blank);
        assert!(!r.submission.is_submitted());
        assert!(local.load_submission("u1").is_none());
    }

    #[test]
    fn test_other_users_keys_collected_before_reads() {
        let kv = MemoryStore::new();
        let local = LocalFallbackStore::new(kv.clone());
        local.save_draft("previous", &draft("Theirs", 3)).unwrap();
        local
            .save_submission("previous", &SubmissionRecord::submitted("APP-P"))
            .unwrap();

        let r = run("next", &LoopbackAdmissionService::new(), &local);
        assert_eq!(r.report.collected_keys, 2);
        assert_eq!(r.report.outcome, BootstrapOutcome::Blank);
        assert!(kv.is_empty());
    }
}
