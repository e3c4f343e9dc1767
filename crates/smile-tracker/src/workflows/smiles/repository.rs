use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

use super::analysis::FaceDetection;
use super::domain::{ImageRef, Rank, SmileLog, SmileLogId, User, UserId};
use super::progression::Progression;

/// Everything one accepted submission writes. The store applies it all or nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionCommit {
    pub log: SmileLog,
    pub progression: Progression,
}

/// Storage abstraction so the service can be exercised without a database.
///
/// `commit_submission` must be atomic and must reject a second log for the same
/// `(user_id, local_date)` with `RepositoryError::Conflict`. It must also reject the commit
/// when the stored total no longer equals `progression.previous_total`.
pub trait SmileRepository: Send + Sync {
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    fn users(&self) -> Result<Vec<User>, RepositoryError>;
    /// Users `id` follows. Edges are one-directional.
    fn following(&self, id: &UserId) -> Result<Vec<User>, RepositoryError>;
    fn ranks(&self) -> Result<Vec<Rank>, RepositoryError>;

    fn log(&self, id: &SmileLogId) -> Result<Option<SmileLog>, RepositoryError>;
    /// All logs for a user, oldest first.
    fn logs_for_user(&self, id: &UserId) -> Result<Vec<SmileLog>, RepositoryError>;
    /// Logs whose `local_date` lies in `[from, until)`.
    fn logs_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<SmileLog>, RepositoryError>;
    fn has_log_on(&self, user_id: &UserId, day: NaiveDate) -> Result<bool, RepositoryError>;

    fn commit_submission(&self, commit: SubmissionCommit) -> Result<(), RepositoryError>;
    fn update_journal(
        &self,
        id: &SmileLogId,
        journal_entry: Option<String>,
    ) -> Result<SmileLog, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Third-party face detection. `Ok(None)` means the image contained no face.
///
/// Implementations may block; they must give up after `timeout` and report it as
/// `VisionError::Timeout` rather than as an empty result. The service treats a detection
/// returned after `timeout` as a timeout and drops it, and the HTTP layer stops waiting
/// shortly after the same deadline.
pub trait VisionFacility: Send + Sync {
    fn detect(
        &self,
        image: &ImageRef,
        timeout: Duration,
    ) -> Result<Option<FaceDetection>, VisionError>;
}

/// Transient vision failures; a retry of the whole submission is safe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VisionError {
    #[error("vision analysis timed out after {0:?}")]
    Timeout(Duration),
    #[error("vision transport failure: {0}")]
    Transport(String),
}
