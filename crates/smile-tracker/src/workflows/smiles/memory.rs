use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use super::domain::{Friendship, Rank, RankId, SmileLog, SmileLogId, User, UserId};
use super::progression::RankLadder;
use super::repository::{RepositoryError, SmileRepository, SubmissionCommit};

#[derive(Debug, Default)]
struct StoreState {
    users: BTreeMap<UserId, User>,
    ranks: Vec<Rank>,
    friendships: Vec<Friendship>,
    logs: Vec<SmileLog>,
}

/// Process-local store. A single mutex over all tables makes `commit_submission` atomic and
/// enforces the `(user, local_date)` uniqueness rule.
#[derive(Debug, Default, Clone)]
pub struct InMemorySmileStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemorySmileStore {
    pub fn new(ladder: RankLadder) -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.state.lock() {
            state.ranks = ladder.into_ranks();
        }
        store
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    /// Registers a user on the floor rank with a zero total.
    pub fn register(&self, id: UserId, nickname: &str) -> Result<User, RepositoryError> {
        let mut state = self.state()?;
        if state.users.contains_key(&id) {
            return Err(RepositoryError::Conflict);
        }
        let floor = floor_rank(&state.ranks)?;
        let user = User {
            id: id.clone(),
            nickname: nickname.to_string(),
            total_score: 0,
            rank_id: floor,
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    /// Inserts or replaces a user as-is. Seeding helper; bypasses the ledger.
    pub fn put_user(&self, user: User) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        state.users.insert(user.id.clone(), user);
        Ok(())
    }

    pub fn follow(&self, follower: &UserId, followed: &UserId) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if follower == followed {
            return Ok(());
        }
        if !state.users.contains_key(follower) || !state.users.contains_key(followed) {
            return Err(RepositoryError::NotFound);
        }
        let edge = Friendship {
            follower: follower.clone(),
            followed: followed.clone(),
        };
        if !state.friendships.contains(&edge) {
            state.friendships.push(edge);
        }
        Ok(())
    }

    /// Inserts a historical log without touching the owner's totals. Seeding helper.
    pub fn put_log(&self, log: SmileLog) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        state.logs.push(log);
        Ok(())
    }

    pub fn log_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.state()?.logs.len())
    }
}

fn floor_rank(ranks: &[Rank]) -> Result<RankId, RepositoryError> {
    ranks
        .iter()
        .find(|rank| rank.required_score == 0)
        .map(|rank| rank.id.clone())
        .ok_or_else(|| RepositoryError::Unavailable("no floor rank seeded".to_string()))
}

impl SmileRepository for InMemorySmileStore {
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state()?.users.get(id).cloned())
    }

    fn users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.state()?.users.values().cloned().collect())
    }

    fn following(&self, id: &UserId) -> Result<Vec<User>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .friendships
            .iter()
            .filter(|edge| &edge.follower == id)
            .filter_map(|edge| state.users.get(&edge.followed).cloned())
            .collect())
    }

    fn ranks(&self) -> Result<Vec<Rank>, RepositoryError> {
        Ok(self.state()?.ranks.clone())
    }

    fn log(&self, id: &SmileLogId) -> Result<Option<SmileLog>, RepositoryError> {
        Ok(self.state()?.logs.iter().find(|log| &log.id == id).cloned())
    }

    fn logs_for_user(&self, id: &UserId) -> Result<Vec<SmileLog>, RepositoryError> {
        let mut logs: Vec<SmileLog> = self
            .state()?
            .logs
            .iter()
            .filter(|log| &log.user_id == id)
            .cloned()
            .collect();
        logs.sort_by_key(|log| log.created_at);
        Ok(logs)
    }

    fn logs_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<SmileLog>, RepositoryError> {
        Ok(self
            .state()?
            .logs
            .iter()
            .filter(|log| from <= log.local_date && log.local_date < until)
            .cloned()
            .collect())
    }

    fn has_log_on(&self, user_id: &UserId, day: NaiveDate) -> Result<bool, RepositoryError> {
        Ok(self
            .state()?
            .logs
            .iter()
            .any(|log| &log.user_id == user_id && log.local_date == day))
    }

    fn commit_submission(&self, commit: SubmissionCommit) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        let SubmissionCommit { log, progression } = commit;

        if state.logs.iter().any(|existing| {
            existing.user_id == log.user_id && existing.local_date == log.local_date
        }) {
            return Err(RepositoryError::Conflict);
        }

        let user = state
            .users
            .get_mut(&progression.user_id)
            .ok_or(RepositoryError::NotFound)?;
        if user.total_score != progression.previous_total {
            return Err(RepositoryError::Conflict);
        }

        progression.apply_to(user);
        state.logs.push(log);
        Ok(())
    }

    fn update_journal(
        &self,
        id: &SmileLogId,
        journal_entry: Option<String>,
    ) -> Result<SmileLog, RepositoryError> {
        let mut state = self.state()?;
        let log = state
            .logs
            .iter_mut()
            .find(|log| &log.id == id)
            .ok_or(RepositoryError::NotFound)?;
        log.journal_entry = journal_entry;
        Ok(log.clone())
    }
}
