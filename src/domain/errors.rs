use super::models::DocumentSlot;

/// Machine-readable classification of a remote failure, decided at the
/// service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// The requested record does not exist.
    NotFound,
    /// The server already holds an application for this user.
    Duplicate,
    /// The request never produced a response (offline, DNS, timeout, reset).
    Network,
    /// The server answered with a non-success status.
    Server,
    /// The response could not be decoded.
    Decode,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("{kind:?}: {message}")]
    Request {
        kind: ServiceErrorKind,
        message: String,
    },

    /// The application record exists but the listed documents were not
    /// stored. `application_id` is present when the server reported it.
    #[error("application created but {} document upload(s) failed", .failed.len())]
    DocumentUpload {
        application_id: Option<String>,
        failed: Vec<DocumentSlot>,
    },
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        ServiceError::Request {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::NotFound, message)
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Duplicate, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Network, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Server, message)
    }

    pub fn kind(&self) -> Option<ServiceErrorKind> {
        match self {
            ServiceError::Request { kind, .. } => Some(*kind),
            ServiceError::DocumentUpload { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ServiceErrorKind::NotFound)
    }

    pub fn is_duplicate(&self) -> bool {
        self.kind() == Some(ServiceErrorKind::Duplicate)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage quota exceeded writing {key} ({needed} bytes, {available} available)")]
    Quota {
        key: String,
        needed: usize,
        available: usize,
    },
}

pub type ServiceResult<T> = Result<T, ServiceError>;
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_helpers() {
        assert!(ServiceError::duplicate("already applied").is_duplicate());
        assert!(ServiceError::not_found("no draft").is_not_found());
        assert!(!ServiceError::network("offline").is_not_found());

        let partial = ServiceError::DocumentUpload {
            application_id: Some("APP-1".to_string()),
            failed: vec![DocumentSlot::Photo],
        };
        assert_eq!(partial.kind(), None);
        assert_eq!(
            partial.to_string(),
            "application created but 1 document upload(s) failed"
        );
    }
}
