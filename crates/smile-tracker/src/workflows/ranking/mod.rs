//! Friends, monthly and all-time leaderboards.
//!
//! Rankings are read-only snapshots of the store and take no submission locks, so a result
//! may trail an in-flight submission.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::smiles::calendar::MonthWindow;
use super::smiles::domain::{Rank, RankId, User, UserId};
use super::smiles::repository::{RepositoryError, SmileRepository};

/// Leaderboard flavour. `Friends` is the default when a request names none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    #[default]
    Friends,
    Monthly,
    AllTime,
}

impl RankingMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Friends => "friends",
            Self::Monthly => "monthly",
            Self::AllTime => "all_time",
        }
    }
}

impl fmt::Display for RankingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingMode {
    type Err = InvalidRankingMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "friends" => Ok(Self::Friends),
            "monthly" => Ok(Self::Monthly),
            "all_time" => Ok(Self::AllTime),
            other => Err(InvalidRankingMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ranking type '{0}'")]
pub struct InvalidRankingMode(pub String);

/// Inputs for one leaderboard build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingQuery {
    pub requester: UserId,
    pub mode: RankingMode,
    /// Calendar month the monthly board sums over.
    pub month: MonthWindow,
    /// Cap for the global boards; the friends board is never truncated.
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankBadge {
    pub name: Option<String>,
    pub image_url: Option<String>,
}

/// One row of a leaderboard. `score` is what the board sorts by: the all-time total for
/// friends and all-time boards, this month's sum for the monthly board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingEntry {
    pub rank: usize,
    pub id: UserId,
    pub nickname: String,
    pub score: u64,
    pub total_score: u64,
    pub is_current_user: bool,
    pub smile_rank: RankBadge,
}

/// Builds the leaderboard for `query`. Rows are ordered by descending score; ties fall back
/// to ascending user id so results are deterministic.
pub fn aggregate<R>(
    repository: &R,
    query: &RankingQuery,
) -> Result<Vec<RankingEntry>, RepositoryError>
where
    R: SmileRepository + ?Sized,
{
    let (mut scored, limit) = match query.mode {
        RankingMode::Friends => (friends(repository, &query.requester)?, None),
        RankingMode::Monthly => (monthly(repository, query.month)?, Some(query.limit)),
        RankingMode::AllTime => (all_time(repository)?, Some(query.limit)),
    };

    scored.sort_by(|(a, a_score), (b, b_score)| {
        b_score.cmp(a_score).then_with(|| a.id.cmp(&b.id))
    });
    if let Some(limit) = limit {
        scored.truncate(limit);
    }

    let ranks: HashMap<RankId, Rank> = repository
        .ranks()?
        .into_iter()
        .map(|rank| (rank.id.clone(), rank))
        .collect();

    Ok(scored
        .into_iter()
        .enumerate()
        .map(|(index, (user, score))| {
            let rank = ranks.get(&user.rank_id);
            RankingEntry {
                rank: index + 1,
                is_current_user: user.id == query.requester,
                id: user.id,
                nickname: user.nickname,
                score,
                total_score: user.total_score,
                smile_rank: RankBadge {
                    name: rank.map(|rank| rank.name.clone()),
                    image_url: rank.and_then(|rank| rank.badge_url.clone()),
                },
            }
        })
        .collect())
}

/// The requester plus everyone they follow.
fn friends<R>(repository: &R, requester: &UserId) -> Result<Vec<(User, u64)>, RepositoryError>
where
    R: SmileRepository + ?Sized,
{
    let mut seen = HashSet::new();
    let candidates = repository
        .user(requester)?
        .into_iter()
        .chain(repository.following(requester)?)
        .filter(|user| seen.insert(user.id.clone()))
        .map(|user| {
            let score = user.total_score;
            (user, score)
        })
        .collect();
    Ok(candidates)
}

/// Users with at least one log this month, scored by that month's sum.
fn monthly<R>(repository: &R, month: MonthWindow) -> Result<Vec<(User, u64)>, RepositoryError>
where
    R: SmileRepository + ?Sized,
{
    let mut sums: HashMap<UserId, u64> = HashMap::new();
    for log in repository.logs_between(month.first(), month.next_first())? {
        *sums.entry(log.user_id).or_default() += u64::from(log.overall_score);
    }

    Ok(repository
        .users()?
        .into_iter()
        .filter_map(|user| sums.get(&user.id).copied().map(|sum| (user, sum)))
        .collect())
}

fn all_time<R>(repository: &R) -> Result<Vec<(User, u64)>, RepositoryError>
where
    R: SmileRepository + ?Sized,
{
    Ok(repository
        .users()?
        .into_iter()
        .map(|user| {
            let score = user.total_score;
            (user, score)
        })
        .collect())
}
