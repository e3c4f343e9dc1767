use crate::infra::{parse_date, RecordedVision};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use clap::Args;
use smile_tracker::config::ScoringConfig;
use smile_tracker::error::AppError;
use smile_tracker::workflows::ranking::{RankingEntry, RankingMode};
use smile_tracker::workflows::smiles::{
    AnalysisConfig, FaceDetection, ImageRef, InMemorySmileStore, LandmarkKind, LandmarkPosition,
    Likelihood, RankLadder, SmileAnalyzer, SmileService, SmileServiceError, SmileSubmission,
    UserId,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Face detection JSON document to score
    #[arg(long)]
    pub(crate) detection: PathBuf,
    /// Use the basic formulas without the squint signal or confidence adjustment
    #[arg(long)]
    pub(crate) basic: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// First demo day (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Number of consecutive days to simulate.
    #[arg(long, default_value_t = 5)]
    pub(crate) days: u64,
    /// Use the basic formulas without the squint signal or confidence adjustment
    #[arg(long)]
    pub(crate) basic: bool,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.detection)?;
    let detection: FaceDetection = serde_json::from_str(&raw)?;
    let config = if args.basic {
        AnalysisConfig::basic()
    } else {
        AnalysisConfig::extended()
    };

    let analysis = SmileAnalyzer::new(config).analyze(&detection);
    println!("Smile analysis for {}", args.detection.display());
    println!("- happiness      {:>3}", analysis.detail.happiness);
    println!("- eye brilliance {:>3}", analysis.detail.eye_brilliance);
    println!("- confidence     {:>3}", analysis.detail.confidence);
    println!("- warmth         {:>3}", analysis.detail.warmth);
    println!("- energy level   {:>3}", analysis.detail.energy_level);
    match analysis.confidence_factor {
        Some(factor) => println!(
            "Overall {} (weighted {:.2} x confidence {:.2})",
            analysis.overall_score, analysis.weighted_score, factor
        ),
        None => println!(
            "Overall {} (weighted {:.2})",
            analysis.overall_score, analysis.weighted_score
        ),
    }
    println!("Feedback: {}", analysis.feedback);
    Ok(())
}

struct DemoUser {
    id: &'static str,
    nickname: &'static str,
    joy: Likelihood,
    roll: f64,
}

const DEMO_USERS: [DemoUser; 4] = [
    DemoUser {
        id: "u-ana",
        nickname: "Ana",
        joy: Likelihood::VeryLikely,
        roll: 1.5,
    },
    DemoUser {
        id: "u-ben",
        nickname: "Ben",
        joy: Likelihood::Likely,
        roll: -4.0,
    },
    DemoUser {
        id: "u-cal",
        nickname: "Cal",
        joy: Likelihood::Possible,
        roll: 8.0,
    },
    DemoUser {
        id: "u-dee",
        nickname: "Dee",
        joy: Likelihood::VeryLikely,
        roll: 0.5,
    },
];

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { start, days, basic } = args;
    let start = start.unwrap_or_else(|| Utc::now().date_naive());
    let days = days.max(1);

    let store = InMemorySmileStore::new(RankLadder::standard());
    for user in &DEMO_USERS {
        store
            .register(UserId(user.id.to_string()), user.nickname)
            .map_err(SmileServiceError::from)?;
    }
    for followed in ["u-ben", "u-cal"] {
        store
            .follow(&UserId("u-ana".to_string()), &UserId(followed.to_string()))
            .map_err(SmileServiceError::from)?;
    }

    let mut vision = RecordedVision::default();
    for day in 0..days {
        for (index, user) in DEMO_USERS.iter().enumerate() {
            // Dee's camera misses on the second day.
            let detection = (user.id != "u-dee" || day != 1)
                .then(|| demo_detection(user, day + index as u64));
            vision.record(&demo_image(user.id, day), detection);
        }
    }

    let config = ScoringConfig {
        squint_bonus: !basic,
        confidence_adjustment: !basic,
        ..ScoringConfig::default()
    };
    let service = SmileService::new(Arc::new(store), Arc::new(vision), config);

    println!("Smile tracker demo ({days} days from {start})");
    let mut last_instant = midday(start);
    for day in 0..days {
        let date = start + Days::new(day);
        let now = midday(date);
        last_instant = now;
        println!("\n{date}");
        for user in &DEMO_USERS {
            let submission = SmileSubmission {
                image: Some(ImageRef(demo_image(user.id, day))),
                journal_entry: Some(format!("{} checking in", user.nickname)),
            };
            match service.submit(&UserId(user.id.to_string()), submission, now) {
                Ok(receipt) => {
                    println!(
                        "- {:<4} scored {:>3} | total {:>4} | {}",
                        user.nickname, receipt.overall_score, receipt.total_score, receipt.feedback
                    );
                    if let Some(rank) = receipt.promoted_to {
                        println!("  promoted to {rank}");
                    }
                }
                Err(err) => println!("- {:<4} refused: {}", user.nickname, err),
            }
        }
    }

    let ana = UserId("u-ana".to_string());
    let retry = SmileSubmission {
        image: Some(ImageRef(demo_image("u-ana", days - 1))),
        journal_entry: None,
    };
    if let Err(err) = service.submit(&ana, retry, last_instant) {
        println!("\nSecond submission on the same day: {err}");
    }

    for mode in [RankingMode::Friends, RankingMode::Monthly, RankingMode::AllTime] {
        let entries = service.ranking(&ana, mode, last_instant)?;
        render_ranking(mode, &entries);
    }

    let profile = service.profile(&ana, last_instant)?;
    match serde_json::to_string_pretty(&profile) {
        Ok(json) => println!("\nAna's page:\n{json}"),
        Err(err) => println!("\nAna's page unavailable: {err}"),
    }

    Ok(())
}

fn render_ranking(mode: RankingMode, entries: &[RankingEntry]) {
    println!("\n{mode} ranking");
    for entry in entries {
        let marker = if entry.is_current_user { " <- you" } else { "" };
        println!(
            "  {}. {:<4} {:>5} ({}){}",
            entry.rank,
            entry.nickname,
            entry.score,
            entry.smile_rank.name.as_deref().unwrap_or("Unranked"),
            marker
        );
    }
}

fn demo_image(user_id: &str, day: u64) -> String {
    format!("demo/{user_id}-day{day}.jpg")
}

fn midday(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc() + chrono::Duration::hours(12)
}

fn demo_detection(user: &DemoUser, seed: u64) -> FaceDetection {
    let mouth_open = 8.0 + (seed % 5) as f64 * 2.0;
    let eyelid = 2.0 + (seed % 3) as f64;
    FaceDetection::new(user.joy, Likelihood::VeryUnlikely, user.roll)
        .with_landmark(LandmarkKind::MouthLeft, LandmarkPosition::new(40.0, 120.0))
        .with_landmark(LandmarkKind::MouthRight, LandmarkPosition::new(80.0, 121.5))
        .with_landmark(LandmarkKind::UpperLip, LandmarkPosition::new(60.0, 112.0))
        .with_landmark(
            LandmarkKind::LowerLip,
            LandmarkPosition::new(60.0, 112.0 + mouth_open),
        )
        .with_landmark(
            LandmarkKind::LeftEyeTopBoundary,
            LandmarkPosition::new(45.0, 70.0),
        )
        .with_landmark(
            LandmarkKind::LeftEyeBottomBoundary,
            LandmarkPosition::new(45.0, 70.0 + eyelid),
        )
        .with_landmark(
            LandmarkKind::RightEyeTopBoundary,
            LandmarkPosition::new(75.0, 70.0),
        )
        .with_landmark(
            LandmarkKind::RightEyeBottomBoundary,
            LandmarkPosition::new(75.0, 70.0 + eyelid),
        )
        .with_confidences(0.97, 0.9)
}
