use serde::Serialize;

use super::domain::{Rank, RankId, User, UserId};

/// Validation failures for a rank ladder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LadderError {
    #[error("rank ladder is empty")]
    Empty,
    #[error("rank ladder has no zero-threshold floor rank")]
    MissingFloor,
    #[error("rank ladder repeats the threshold {0}")]
    DuplicateThreshold(u64),
}

/// Ranks ordered by ascending threshold, always starting with a zero-threshold floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankLadder {
    ranks: Vec<Rank>,
}

impl RankLadder {
    pub fn new(mut ranks: Vec<Rank>) -> Result<Self, LadderError> {
        if ranks.is_empty() {
            return Err(LadderError::Empty);
        }

        ranks.sort_by_key(|rank| rank.required_score);

        if ranks[0].required_score != 0 {
            return Err(LadderError::MissingFloor);
        }
        if let Some(pair) = ranks
            .windows(2)
            .find(|pair| pair[0].required_score == pair[1].required_score)
        {
            return Err(LadderError::DuplicateThreshold(pair[0].required_score));
        }

        Ok(Self { ranks })
    }

    /// Bronze 0, Silver 1000, Gold 5000, Platinum 15000, Diamond 50000.
    pub fn standard() -> Self {
        let tiers = [
            ("bronze", "Bronze", 0),
            ("silver", "Silver", 1_000),
            ("gold", "Gold", 5_000),
            ("platinum", "Platinum", 15_000),
            ("diamond", "Diamond", 50_000),
        ];

        Self {
            ranks: tiers
                .into_iter()
                .map(|(id, name, required_score)| Rank {
                    id: RankId(id.to_string()),
                    name: name.to_string(),
                    required_score,
                    badge_url: None,
                })
                .collect(),
        }
    }

    pub fn ranks(&self) -> &[Rank] {
        &self.ranks
    }

    pub fn into_ranks(self) -> Vec<Rank> {
        self.ranks
    }

    pub fn floor(&self) -> &Rank {
        &self.ranks[0]
    }

    pub fn get(&self, id: &RankId) -> Option<&Rank> {
        self.ranks.iter().find(|rank| &rank.id == id)
    }

    /// Highest rank with `required_score <= total`.
    pub fn qualifying(&self, total: u64) -> &Rank {
        let index = self
            .ranks
            .partition_point(|rank| rank.required_score <= total);
        // The floor qualifies for every total, so `index` is at least 1.
        &self.ranks[index.saturating_sub(1)]
    }
}

/// Ledger entry describing how one accepted score moves a user's progression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progression {
    pub user_id: UserId,
    pub awarded: u64,
    pub previous_total: u64,
    pub total_score: u64,
    pub previous_rank: RankId,
    pub rank_id: RankId,
}

impl Progression {
    pub fn promoted(&self) -> bool {
        self.previous_rank != self.rank_id
    }

    pub fn apply_to(&self, user: &mut User) {
        user.total_score = self.total_score;
        user.rank_id = self.rank_id.clone();
    }
}

/// Adds `score` to the user's total and picks the best qualifying rank. Totals only grow,
/// so there is no downgrade path.
pub fn advance(user: &User, score: u8, ladder: &RankLadder) -> Progression {
    let awarded = u64::from(score);
    let total_score = user.total_score.saturating_add(awarded);
    let rank_id = ladder.qualifying(total_score).id.clone();

    Progression {
        user_id: user.id.clone(),
        awarded,
        previous_total: user.total_score,
        total_score,
        previous_rank: user.rank_id.clone(),
        rank_id,
    }
}
