use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier issued by the identity provider; trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for stored smile logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SmileLogId(pub String);

impl fmt::Display for SmileLogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankId(pub String);

/// Opaque reference to an uploaded photo. Only the vision facility looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// A registered user and their progression state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub nickname: String,
    pub total_score: u64,
    pub rank_id: RankId,
}

/// Named tier unlocked once `total_score` reaches `required_score`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
    pub id: RankId,
    pub name: String,
    pub required_score: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_url: Option<String>,
}

/// Follower to followed edge. Owned by the social graph; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friendship {
    pub follower: UserId,
    pub followed: UserId,
}

/// The five sub-scores behind a single smile log, each within 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDetail {
    pub happiness: u8,
    pub eye_brilliance: u8,
    pub confidence: u8,
    pub warmth: u8,
    pub energy_level: u8,
}

/// One accepted daily submission. The score detail is owned and lives and dies with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmileLog {
    pub id: SmileLogId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Calendar day of `created_at` under the configured calendar policy.
    pub local_date: NaiveDate,
    pub journal_entry: Option<String>,
    pub overall_score: u8,
    pub image: ImageRef,
    pub detail: ScoreDetail,
}

impl SmileLog {
    pub fn summary(&self) -> SmileLogSummary {
        SmileLogSummary {
            id: self.id.clone(),
            date: self.local_date,
            overall_score: self.overall_score,
            journal_entry: self.journal_entry.clone(),
            detail: self.detail,
        }
    }
}

/// Client-facing view of a stored smile log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmileLogSummary {
    pub id: SmileLogId,
    pub date: NaiveDate,
    pub overall_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_entry: Option<String>,
    pub detail: ScoreDetail,
}

/// Payload accepted by `submit`; the image is optional on the wire so a missing one can be
/// reported as its own error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmileSubmission {
    #[serde(default)]
    pub image: Option<ImageRef>,
    #[serde(default)]
    pub journal_entry: Option<String>,
}

/// Outcome of an accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub log: SmileLogSummary,
    pub overall_score: u8,
    pub feedback: String,
    pub total_score: u64,
    pub smile_rank: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted_to: Option<String>,
}

/// Day-level calendar marker for the profile view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEntry {
    pub id: SmileLogId,
    pub date: NaiveDate,
    pub score: u8,
}

/// Profile summary shown on the user's own page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSummary {
    pub nickname: String,
    pub total_score: u64,
    pub smile_rank: String,
    pub smile_logs: Vec<CalendarEntry>,
    pub has_completed_today: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMatch {
    pub id: UserId,
    pub nickname: String,
}

/// Normalises a journal entry: trims it, and treats blank text as no entry.
pub(crate) fn clean_journal(entry: Option<String>) -> Option<String> {
    entry
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
