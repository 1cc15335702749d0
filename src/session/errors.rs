use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} already exists")]
    DuplicateSession(String),

    #[error("session {0} not found")]
    NotFound(String),

    #[error("session {session_id} is at version {actual}, expected {expected}")]
    VersionConflict {
        session_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        StoreError::Unavailable(reason.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}
