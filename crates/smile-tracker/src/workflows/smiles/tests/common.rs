use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::config::ScoringConfig;
use crate::workflows::smiles::analysis::{
    FaceDetection, LandmarkKind, LandmarkPosition, Likelihood,
};
use crate::workflows::smiles::domain::{
    ImageRef, Rank, RankId, ScoreDetail, SmileLog, SmileLogId, SmileSubmission, User, UserId,
};
use crate::workflows::smiles::memory::InMemorySmileStore;
use crate::workflows::smiles::progression::RankLadder;
use crate::workflows::smiles::repository::{
    RepositoryError, SmileRepository, SubmissionCommit, VisionError, VisionFacility,
};
use crate::workflows::smiles::service::SmileService;

pub(crate) fn rank(id: &str, required_score: u64) -> Rank {
    Rank {
        id: RankId(id.to_string()),
        name: id.to_string(),
        required_score,
        badge_url: Some(format!("https://cdn.example.test/ranks/{id}.png")),
    }
}

/// floor 0, silver 1000, gold 5000.
pub(crate) fn ladder() -> RankLadder {
    RankLadder::new(vec![rank("floor", 0), rank("silver", 1000), rank("gold", 5000)])
        .expect("valid ladder")
}

pub(crate) fn user_id(raw: &str) -> UserId {
    UserId(raw.to_string())
}

pub(crate) fn store() -> InMemorySmileStore {
    InMemorySmileStore::new(ladder())
}

/// Seeds a user with a fixed total and the matching rank.
pub(crate) fn seed_user(store: &InMemorySmileStore, id: &str, nickname: &str, total: u64) -> User {
    let user = User {
        id: user_id(id),
        nickname: nickname.to_string(),
        total_score: total,
        rank_id: ladder().qualifying(total).id.clone(),
    };
    store.put_user(user.clone()).expect("seed user");
    user
}

pub(crate) fn instant(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
        .single()
        .expect("valid instant")
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Reference "now" used across the service tests.
pub(crate) fn now() -> DateTime<Utc> {
    instant(2025, 10, 15, 9)
}

pub(crate) fn detail(score: u8) -> ScoreDetail {
    ScoreDetail {
        happiness: score,
        eye_brilliance: score,
        confidence: score,
        warmth: score,
        energy_level: score,
    }
}

pub(crate) fn seed_log(
    store: &InMemorySmileStore,
    id: &str,
    owner: &str,
    created_at: DateTime<Utc>,
    score: u8,
) -> SmileLog {
    let log = SmileLog {
        id: SmileLogId(id.to_string()),
        user_id: user_id(owner),
        created_at,
        local_date: created_at.date_naive(),
        journal_entry: None,
        overall_score: score,
        image: ImageRef(format!("uploads/{id}.jpg")),
        detail: detail(score),
    };
    store.put_log(log.clone()).expect("seed log");
    log
}

pub(crate) fn scoring_config() -> ScoringConfig {
    ScoringConfig {
        utc_offset_minutes: 0,
        vision_timeout: Duration::from_millis(250),
        squint_bonus: false,
        confidence_adjustment: false,
        ranking_limit: 100,
    }
}

pub(crate) fn submission(image: &str) -> SmileSubmission {
    SmileSubmission {
        image: Some(ImageRef(image.to_string())),
        journal_entry: Some("  Sunny walk to work  ".to_string()),
    }
}

/// A broad smile with every landmark the calculators read. Scores 97 with the basic formulas.
pub(crate) fn beaming_face() -> FaceDetection {
    FaceDetection::new(Likelihood::VeryLikely, Likelihood::VeryUnlikely, 0.0)
        .with_landmark(LandmarkKind::MouthLeft, LandmarkPosition::new(40.0, 120.0))
        .with_landmark(LandmarkKind::MouthRight, LandmarkPosition::new(80.0, 121.0))
        .with_landmark(LandmarkKind::UpperLip, LandmarkPosition::new(60.0, 110.0))
        .with_landmark(LandmarkKind::LowerLip, LandmarkPosition::new(60.0, 124.0))
        .with_landmark(
            LandmarkKind::LeftEyeTopBoundary,
            LandmarkPosition::new(45.0, 70.0),
        )
        .with_landmark(
            LandmarkKind::LeftEyeBottomBoundary,
            LandmarkPosition::new(45.0, 72.0),
        )
}

/// Vision double returning a scripted answer and counting calls. An optional barrier lets
/// concurrent callers line up inside the "network call".
pub(crate) struct ScriptedVision {
    answer: Mutex<Result<Option<FaceDetection>, VisionError>>,
    calls: AtomicUsize,
    barrier: Option<Arc<Barrier>>,
    delay: Option<Duration>,
}

impl ScriptedVision {
    pub(crate) fn detecting(detection: FaceDetection) -> Self {
        Self::answering(Ok(Some(detection)))
    }

    pub(crate) fn answering(answer: Result<Option<FaceDetection>, VisionError>) -> Self {
        Self {
            answer: Mutex::new(answer),
            calls: AtomicUsize::new(0),
            barrier: None,
            delay: None,
        }
    }

    pub(crate) fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    /// Answers only after `delay`, ignoring the timeout it was given.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn answer_with(&self, answer: Result<Option<FaceDetection>, VisionError>) {
        *self.answer.lock().expect("vision mutex poisoned") = answer;
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VisionFacility for ScriptedVision {
    fn detect(
        &self,
        _image: &ImageRef,
        _timeout: Duration,
    ) -> Result<Option<FaceDetection>, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.answer.lock().expect("vision mutex poisoned").clone()
    }
}

pub(crate) fn build_service(
    store: &InMemorySmileStore,
    vision: ScriptedVision,
) -> (SmileService<InMemorySmileStore, ScriptedVision>, Arc<ScriptedVision>) {
    let vision = Arc::new(vision);
    let service = SmileService::new(Arc::new(store.clone()), vision.clone(), scoring_config());
    (service, vision)
}

/// Store whose gate reads go stale for the first `stale_reads` calls, as if a concurrent
/// writer on another node had not been observed yet. Commits still hit the real store.
pub(crate) struct StaleGateStore {
    inner: InMemorySmileStore,
    stale_reads: AtomicUsize,
}

impl StaleGateStore {
    pub(crate) fn new(inner: InMemorySmileStore, stale_reads: usize) -> Self {
        Self {
            inner,
            stale_reads: AtomicUsize::new(stale_reads),
        }
    }
}

impl SmileRepository for StaleGateStore {
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.inner.user(id)
    }

    fn users(&self) -> Result<Vec<User>, RepositoryError> {
        self.inner.users()
    }

    fn following(&self, id: &UserId) -> Result<Vec<User>, RepositoryError> {
        self.inner.following(id)
    }

    fn ranks(&self) -> Result<Vec<Rank>, RepositoryError> {
        self.inner.ranks()
    }

    fn log(&self, id: &SmileLogId) -> Result<Option<SmileLog>, RepositoryError> {
        self.inner.log(id)
    }

    fn logs_for_user(&self, id: &UserId) -> Result<Vec<SmileLog>, RepositoryError> {
        self.inner.logs_for_user(id)
    }

    fn logs_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<SmileLog>, RepositoryError> {
        self.inner.logs_between(from, until)
    }

    fn has_log_on(&self, user_id: &UserId, day: NaiveDate) -> Result<bool, RepositoryError> {
        let stale = self
            .stale_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(false);
        }
        self.inner.has_log_on(user_id, day)
    }

    fn commit_submission(&self, commit: SubmissionCommit) -> Result<(), RepositoryError> {
        self.inner.commit_submission(commit)
    }

    fn update_journal(
        &self,
        id: &SmileLogId,
        journal_entry: Option<String>,
    ) -> Result<SmileLog, RepositoryError> {
        self.inner.update_journal(id, journal_entry)
    }
}

/// Store that is reachable for reads but refuses every commit.
pub(crate) struct ReadOnlyStore {
    pub(crate) inner: InMemorySmileStore,
}

impl SmileRepository for ReadOnlyStore {
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.inner.user(id)
    }

    fn users(&self) -> Result<Vec<User>, RepositoryError> {
        self.inner.users()
    }

    fn following(&self, id: &UserId) -> Result<Vec<User>, RepositoryError> {
        self.inner.following(id)
    }

    fn ranks(&self) -> Result<Vec<Rank>, RepositoryError> {
        self.inner.ranks()
    }

    fn log(&self, id: &SmileLogId) -> Result<Option<SmileLog>, RepositoryError> {
        self.inner.log(id)
    }

    fn logs_for_user(&self, id: &UserId) -> Result<Vec<SmileLog>, RepositoryError> {
        self.inner.logs_for_user(id)
    }

    fn logs_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<SmileLog>, RepositoryError> {
        self.inner.logs_between(from, until)
    }

    fn has_log_on(&self, user_id: &UserId, day: NaiveDate) -> Result<bool, RepositoryError> {
        self.inner.has_log_on(user_id, day)
    }

    fn commit_submission(&self, _commit: SubmissionCommit) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database read-only".to_string()))
    }

    fn update_journal(
        &self,
        _id: &SmileLogId,
        _journal_entry: Option<String>,
    ) -> Result<SmileLog, RepositoryError> {
        Err(RepositoryError::Unavailable("database read-only".to_string()))
    }
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
