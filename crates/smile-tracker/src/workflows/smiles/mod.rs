//! Daily smile intake: face analysis, the once-per-day gate and the progression ledger.
//!
//! A submission flows gate -> vision facility -> analyzer -> atomic commit of the log and the
//! user's new total and rank. The vision call happens outside the per-user lock; everything
//! from the gate re-check to the commit happens inside it.

pub mod analysis;
pub mod calendar;
pub mod domain;
pub mod gate;
pub mod memory;
pub mod progression;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
pub(crate) mod tests;

pub use analysis::{
    AnalysisConfig, FaceDetection, FeedbackCategory, LandmarkKind, LandmarkPosition, Likelihood,
    SmileAnalysis, SmileAnalyzer,
};
pub use calendar::{CalendarPolicy, MonthWindow};
pub use domain::{
    CalendarEntry, Friendship, ImageRef, ProfileSummary, Rank, RankId, ScoreDetail, SmileLog,
    SmileLogId, SmileLogSummary, SmileSubmission, SubmissionReceipt, User, UserId, UserMatch,
};
pub use gate::{DailyGate, GateDecision};
pub use memory::InMemorySmileStore;
pub use progression::{advance, LadderError, Progression, RankLadder};
pub use repository::{
    RepositoryError, SmileRepository, SubmissionCommit, VisionError, VisionFacility,
};
pub use router::smile_router;
pub use service::{SmileService, SmileServiceError};
