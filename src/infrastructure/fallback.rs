use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::persistence::KeyValueStore;
use crate::domain::{DraftRecord, Namespace, StorageError, StorageKey, StorageResult, SubmissionRecord};

/// Per-user draft and submission records kept on this device.
///
/// Every operation is scoped by an explicit user id. Reads never fail: a
/// missing, unreadable or unparseable record is reported as absent. Writes
/// return the storage error so the caller can surface it as a warning.
#[derive(Debug, Clone)]
pub struct LocalFallbackStore<K> {
    kv: K,
}

impl<K: KeyValueStore> LocalFallbackStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn backend(&self) -> &K {
        &self.kv
    }

    pub fn save_draft(&self, user_id: &str, draft: &DraftRecord) -> StorageResult<()> {
        self.write(&StorageKey::new(Namespace::Draft, user_id), draft)
    }

    pub fn load_draft(&self, user_id: &str) -> Option<DraftRecord> {
        self.read(&StorageKey::new(Namespace::Draft, user_id))
    }

    pub fn clear_draft(&self, user_id: &str) -> StorageResult<()> {
        self.kv.delete(&StorageKey::new(Namespace::Draft, user_id).to_string())
    }

    pub fn save_submission(&self, user_id: &str, record: &SubmissionRecord) -> StorageResult<()> {
        self.write(&StorageKey::new(Namespace::Submission, user_id), record)
    }

    /// Only records that actually mark a submission count.
    pub fn load_submission(&self, user_id: &str) -> Option<SubmissionRecord> {
        self.read::<SubmissionRecord>(&StorageKey::new(Namespace::Submission, user_id))
            .filter(|record| record.is_submitted && !record.application_id.is_empty())
    }

    pub fn clear_submission(&self, user_id: &str) -> StorageResult<()> {
        self.kv
            .delete(&StorageKey::new(Namespace::Submission, user_id).to_string())
    }

    /// Removes every key in `namespace` that belongs to a user other than
    /// `user_id`. Returns how many keys were removed.
    pub fn garbage_collect(&self, user_id: &str, namespace: Namespace) -> usize {
        let keys = match self.kv.list_keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "could not list local keys for cleanup");
                return 0;
            }
        };

        let mut removed = 0;
        for raw in keys {
            let Some(key) = StorageKey::parse(namespace, &raw) else {
                continue;
            };
            if key.user_id == user_id {
                continue;
            }
            match self.kv.delete(&raw) {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %raw, error = %e, "could not remove stale local key"),
            }
        }
        if removed > 0 {
            debug!(user_id, removed, ?namespace, "removed local keys of other users");
        }
        removed
    }

    fn write<T: Serialize>(&self, key: &StorageKey, value: &T) -> StorageResult<()> {
        let key = key.to_string();
        let json = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.clone(),
            source,
        })?;
        self.kv.set(&key, &json).inspect_err(|e| {
            warn!(key = %key, error = %e, "local write failed");
        })
    }

    fn read<T: DeserializeOwned>(&self, key: &StorageKey) -> Option<T> {
        let key = key.to_string();
        let raw = match self.kv.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "local read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "discarding unparseable local record");
                None
            }
        }
    }
}
