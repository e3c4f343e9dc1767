use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use super::analysis::{SmileAnalysis, SmileAnalyzer};
use super::calendar::CalendarPolicy;
use super::domain::{
    clean_journal, CalendarEntry, ImageRef, ProfileSummary, SmileLog, SmileLogId,
    SmileLogSummary, SmileSubmission, SubmissionReceipt, User, UserId, UserMatch,
};
use super::gate::{DailyGate, GateDecision};
use super::progression::{advance, LadderError, RankLadder};
use super::repository::{
    RepositoryError, SmileRepository, SubmissionCommit, VisionError, VisionFacility,
};
use crate::config::ScoringConfig;
use crate::workflows::ranking::{
    self, InvalidRankingMode, RankingEntry, RankingMode, RankingQuery,
};

const SEARCH_MIN_QUERY_CHARS: usize = 2;
const SEARCH_LIMIT: usize = 10;
const UNRANKED_LABEL: &str = "Unranked";

static SMILE_LOG_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_smile_log_id() -> SmileLogId {
    let id = SMILE_LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SmileLogId(format!("smile-{id:06}"))
}

/// One mutex per user, held from the gate re-check through the store commit.
#[derive(Default)]
struct SubmissionLocks {
    slots: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl SubmissionLocks {
    fn slot(&self, user_id: &UserId) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(user_id.clone()).or_default().clone()
    }

    /// Drops the slot once nobody but the map and the caller hold it.
    fn release(&self, user_id: &UserId, slot: Arc<Mutex<()>>) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&slot) == 2 {
            slots.remove(user_id);
        }
    }
}

/// A scored photo waiting for the user's lock.
struct PendingSmile {
    image: ImageRef,
    journal_entry: Option<String>,
    analysis: SmileAnalysis,
}

/// Service composing the daily gate, the vision facility, the analyzer and the progression
/// ledger on top of a repository.
pub struct SmileService<R, V> {
    repository: Arc<R>,
    vision: Arc<V>,
    analyzer: SmileAnalyzer,
    calendar: CalendarPolicy,
    vision_timeout: Duration,
    ranking_limit: usize,
    locks: SubmissionLocks,
}

impl<R, V> SmileService<R, V>
where
    R: SmileRepository + 'static,
    V: VisionFacility + 'static,
{
    pub fn new(repository: Arc<R>, vision: Arc<V>, config: ScoringConfig) -> Self {
        Self {
            repository,
            vision,
            analyzer: SmileAnalyzer::new(config.analysis()),
            calendar: config.calendar(),
            vision_timeout: config.vision_timeout,
            ranking_limit: config.ranking_limit,
            locks: SubmissionLocks::default(),
        }
    }

    pub fn calendar(&self) -> CalendarPolicy {
        self.calendar
    }

    pub fn vision_timeout(&self) -> Duration {
        self.vision_timeout
    }

    /// Score today's photo and record it, or explain why it was refused.
    pub fn submit(
        &self,
        user_id: &UserId,
        submission: SmileSubmission,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, SmileServiceError> {
        let SmileSubmission {
            image,
            journal_entry,
        } = submission;
        let image = image
            .filter(|image| !image.is_blank())
            .ok_or(SmileServiceError::MissingImage)?;

        self.require_user(user_id)?;
        let gate = DailyGate::new(self.repository.as_ref(), self.calendar);
        if let GateDecision::AlreadySubmitted { day } = gate.check(user_id, now)? {
            info!(user = %user_id, %day, "daily smile already recorded");
            return Err(SmileServiceError::DailyLimitReached { date: day });
        }

        // The vision call touches no shared state, so it runs before taking the user lock.
        let analysis = self.analyze(user_id, &image)?;
        let ladder = RankLadder::new(self.repository.ranks()?)?;
        let pending = PendingSmile {
            image,
            journal_entry: clean_journal(journal_entry),
            analysis,
        };

        let slot = self.locks.slot(user_id);
        let outcome = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            self.record(user_id, pending, &ladder, &gate, now)
        };
        self.locks.release(user_id, slot);
        outcome
    }

    fn analyze(
        &self,
        user_id: &UserId,
        image: &ImageRef,
    ) -> Result<SmileAnalysis, SmileServiceError> {
        let started = Instant::now();
        let outcome = self.vision.detect(image, self.vision_timeout);
        let elapsed = started.elapsed();
        let outcome = if outcome.is_ok() && elapsed > self.vision_timeout {
            Err(VisionError::Timeout(self.vision_timeout))
        } else {
            outcome
        };

        match outcome {
            Ok(Some(detection)) => {
                let analysis = self.analyzer.analyze(&detection);
                debug!(
                    user = %user_id,
                    weighted = analysis.weighted_score,
                    overall = analysis.overall_score,
                    "smile analyzed"
                );
                Ok(analysis)
            }
            Ok(None) => {
                info!(user = %user_id, "no face detected in submitted image");
                Err(SmileServiceError::FaceNotDetected)
            }
            Err(err) => {
                warn!(user = %user_id, error = %err, "vision analysis failed");
                Err(SmileServiceError::TransientAnalysisFailure(err))
            }
        }
    }

    /// Gate re-check, ledger update and atomic commit. Caller holds the user's lock.
    fn record(
        &self,
        user_id: &UserId,
        pending: PendingSmile,
        ladder: &RankLadder,
        gate: &DailyGate<'_, R>,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, SmileServiceError> {
        let PendingSmile {
            image,
            journal_entry,
            analysis,
        } = pending;

        let day = match gate.check(user_id, now)? {
            GateDecision::Open { day } => day,
            GateDecision::AlreadySubmitted { day } => {
                info!(user = %user_id, %day, "concurrent submission lost the daily gate");
                return Err(SmileServiceError::DailyLimitReached { date: day });
            }
        };

        let user = self.require_user(user_id)?;
        let progression = advance(&user, analysis.overall_score, ladder);
        let log = SmileLog {
            id: next_smile_log_id(),
            user_id: user_id.clone(),
            created_at: now,
            local_date: day,
            journal_entry,
            overall_score: analysis.overall_score,
            image,
            detail: analysis.detail,
        };

        let commit = SubmissionCommit {
            log: log.clone(),
            progression: progression.clone(),
        };
        if let Err(err) = self.repository.commit_submission(commit) {
            if matches!(err, RepositoryError::Conflict)
                && self.repository.has_log_on(user_id, day)?
            {
                info!(user = %user_id, %day, "store rejected a duplicate daily smile");
                return Err(SmileServiceError::DailyLimitReached { date: day });
            }
            return Err(err.into());
        }

        let rank_name = ladder
            .get(&progression.rank_id)
            .map_or_else(|| UNRANKED_LABEL.to_string(), |rank| rank.name.clone());
        let promoted_to = progression.promoted().then(|| rank_name.clone());

        info!(
            user = %user_id,
            log = %log.id,
            score = analysis.overall_score,
            total = progression.total_score,
            "smile recorded"
        );
        if let Some(rank) = &promoted_to {
            info!(user = %user_id, %rank, "user promoted");
        }

        Ok(SubmissionReceipt {
            log: log.summary(),
            overall_score: analysis.overall_score,
            feedback: analysis.feedback,
            total_score: progression.total_score,
            smile_rank: rank_name,
            promoted_to,
        })
    }

    /// One of the caller's own logs with its score detail.
    pub fn smile_log(
        &self,
        user_id: &UserId,
        log_id: &SmileLogId,
    ) -> Result<SmileLogSummary, SmileServiceError> {
        Ok(self.owned_log(user_id, log_id)?.summary())
    }

    /// Replace the journal text on one of the caller's own logs.
    pub fn edit_journal_entry(
        &self,
        user_id: &UserId,
        log_id: &SmileLogId,
        journal_entry: Option<String>,
    ) -> Result<SmileLogSummary, SmileServiceError> {
        self.owned_log(user_id, log_id)?;

        let updated = match self
            .repository
            .update_journal(log_id, clean_journal(journal_entry))
        {
            Ok(updated) => updated,
            Err(RepositoryError::NotFound) => return Err(SmileServiceError::NotFound),
            Err(err) => return Err(err.into()),
        };
        Ok(updated.summary())
    }

    /// Leaderboard for `mode` as seen by `user_id`.
    pub fn ranking(
        &self,
        user_id: &UserId,
        mode: RankingMode,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankingEntry>, SmileServiceError> {
        self.require_user(user_id)?;
        let query = RankingQuery {
            requester: user_id.clone(),
            mode,
            month: self.calendar.month_of(now),
            limit: self.ranking_limit,
        };
        Ok(ranking::aggregate(self.repository.as_ref(), &query)?)
    }

    /// Like `ranking`, but parses the mode from a raw request parameter first.
    pub fn ranking_for(
        &self,
        user_id: &UserId,
        mode: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankingEntry>, SmileServiceError> {
        let mode = match mode {
            Some(raw) => raw.parse::<RankingMode>()?,
            None => RankingMode::default(),
        };
        self.ranking(user_id, mode, now)
    }

    /// Profile header plus a calendar of every recorded day.
    pub fn profile(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<ProfileSummary, SmileServiceError> {
        let user = self.require_user(user_id)?;
        let ranks = self.repository.ranks()?;
        let smile_rank = ranks
            .iter()
            .find(|rank| rank.id == user.rank_id)
            .map_or_else(|| UNRANKED_LABEL.to_string(), |rank| rank.name.clone());

        let today: NaiveDate = self.calendar.date_of(now);
        let logs = self.repository.logs_for_user(user_id)?;
        let has_completed_today = logs.iter().any(|log| log.local_date == today);
        let smile_logs = logs
            .into_iter()
            .map(|log| CalendarEntry {
                id: log.id,
                date: log.local_date,
                score: log.overall_score,
            })
            .collect();

        Ok(ProfileSummary {
            nickname: user.nickname,
            total_score: user.total_score,
            smile_rank,
            smile_logs,
            has_completed_today,
        })
    }

    /// Nickname search for people to follow, skipping the caller and anyone already followed.
    pub fn search_users(
        &self,
        user_id: &UserId,
        query: &str,
    ) -> Result<Vec<UserMatch>, SmileServiceError> {
        self.require_user(user_id)?;
        let needle = query.trim().to_lowercase();
        if needle.chars().count() < SEARCH_MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }

        let mut excluded: HashSet<UserId> = self
            .repository
            .following(user_id)?
            .into_iter()
            .map(|user| user.id)
            .collect();
        excluded.insert(user_id.clone());

        let mut candidates: Vec<User> = self
            .repository
            .users()?
            .into_iter()
            .filter(|user| !excluded.contains(&user.id))
            .filter(|user| user.nickname.to_lowercase().contains(&needle))
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(candidates
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(|user| UserMatch {
                id: user.id,
                nickname: user.nickname,
            })
            .collect())
    }

    fn owned_log(
        &self,
        user_id: &UserId,
        log_id: &SmileLogId,
    ) -> Result<SmileLog, SmileServiceError> {
        let log = self
            .repository
            .log(log_id)?
            .ok_or(SmileServiceError::NotFound)?;
        if &log.user_id != user_id {
            warn!(user = %user_id, log = %log_id, "access to another user's smile log");
            return Err(SmileServiceError::NotOwner);
        }
        Ok(log)
    }

    fn require_user(&self, user_id: &UserId) -> Result<User, SmileServiceError> {
        self.repository
            .user(user_id)?
            .ok_or_else(|| SmileServiceError::UnknownUser(user_id.clone()))
    }
}

/// Error raised by the smile service. Each refusal has its own variant so clients can tell
/// "retry", "come back tomorrow" and "retake the photo" apart.
#[derive(Debug, thiserror::Error)]
pub enum SmileServiceError {
    #[error("an image is required to submit a smile")]
    MissingImage,
    #[error("user {0} is not registered")]
    UnknownUser(UserId),
    #[error("daily limit reached: a smile was already recorded on {date}")]
    DailyLimitReached { date: NaiveDate },
    #[error("no face could be detected in the image")]
    FaceNotDetected,
    #[error("smile analysis failed, please try again: {0}")]
    TransientAnalysisFailure(#[source] VisionError),
    #[error("smile log not found")]
    NotFound,
    #[error("smile log belongs to another user")]
    NotOwner,
    #[error(transparent)]
    InvalidMode(#[from] InvalidRankingMode),
    #[error(transparent)]
    Ladder(#[from] LadderError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SmileServiceError {
    /// Stable machine-readable code for API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingImage => "missing_image",
            Self::UnknownUser(_) => "unknown_user",
            Self::DailyLimitReached { .. } => "daily_limit_reached",
            Self::FaceNotDetected => "face_not_detected",
            Self::TransientAnalysisFailure(_) => "analysis_unavailable",
            Self::NotFound => "not_found",
            Self::NotOwner => "not_owner",
            Self::InvalidMode(_) => "invalid_ranking_type",
            Self::Ladder(_) => "rank_ladder_invalid",
            Self::Repository(RepositoryError::NotFound) => "not_found",
            Self::Repository(RepositoryError::Conflict) => "conflict",
            Self::Repository(RepositoryError::Unavailable(_)) => "store_unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingImage | Self::InvalidMode(_) => StatusCode::BAD_REQUEST,
            Self::UnknownUser(_) => StatusCode::UNAUTHORIZED,
            Self::DailyLimitReached { .. } | Self::Repository(RepositoryError::Conflict) => {
                StatusCode::CONFLICT
            }
            Self::FaceNotDetected => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TransientAnalysisFailure(_)
            | Self::Repository(RepositoryError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound | Self::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::NotOwner => StatusCode::FORBIDDEN,
            Self::Ladder(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
