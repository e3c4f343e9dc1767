use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use smile_tracker::error::AppError;
use smile_tracker::workflows::smiles::{
    FaceDetection, ImageRef, InMemorySmileStore, SmileServiceError, UserId, VisionError,
    VisionFacility,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SeedUser {
    pub(crate) id: UserId,
    pub(crate) nickname: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SeedFollow {
    pub(crate) follower: UserId,
    pub(crate) followed: UserId,
}

/// Seed data for a self-contained server: who exists, who follows whom, and what the vision
/// facility reports for each known image. A `null` detection means "no face".
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ServeFixtures {
    #[serde(default)]
    pub(crate) users: Vec<SeedUser>,
    #[serde(default)]
    pub(crate) follows: Vec<SeedFollow>,
    #[serde(default)]
    pub(crate) detections: HashMap<ImageRef, Option<FaceDetection>>,
}

impl ServeFixtures {
    pub(crate) fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Registers users and follows, then hands back the recorded detections.
    pub(crate) fn seed(&self, store: &InMemorySmileStore) -> Result<RecordedVision, AppError> {
        for user in &self.users {
            store
                .register(user.id.clone(), &user.nickname)
                .map_err(SmileServiceError::from)?;
        }
        for edge in &self.follows {
            store
                .follow(&edge.follower, &edge.followed)
                .map_err(SmileServiceError::from)?;
        }
        Ok(RecordedVision::new(self.detections.clone()))
    }
}

/// Vision facility answering from recorded detections. Unknown images fail as a transport
/// error so clients see the same "retry" path a real outage would produce.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordedVision {
    detections: HashMap<ImageRef, Option<FaceDetection>>,
}

impl RecordedVision {
    pub(crate) fn new(detections: HashMap<ImageRef, Option<FaceDetection>>) -> Self {
        Self { detections }
    }

    pub(crate) fn record(&mut self, image: &str, detection: Option<FaceDetection>) {
        self.detections.insert(ImageRef(image.to_string()), detection);
    }

    pub(crate) fn len(&self) -> usize {
        self.detections.len()
    }
}

impl VisionFacility for RecordedVision {
    fn detect(
        &self,
        image: &ImageRef,
        _timeout: Duration,
    ) -> Result<Option<FaceDetection>, VisionError> {
        self.detections
            .get(image)
            .cloned()
            .ok_or_else(|| VisionError::Transport(format!("no recorded detection for {}", image.0)))
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
