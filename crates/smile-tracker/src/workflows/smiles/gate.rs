use chrono::{DateTime, NaiveDate, Utc};

use super::calendar::CalendarPolicy;
use super::domain::UserId;
use super::repository::{RepositoryError, SmileRepository};

/// Whether a user may still submit on the calendar day containing the reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Open { day: NaiveDate },
    AlreadySubmitted { day: NaiveDate },
}

impl GateDecision {
    pub fn day(&self) -> NaiveDate {
        match self {
            Self::Open { day } | Self::AlreadySubmitted { day } => *day,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// One scored submission per user per calendar day. Read-only; callers that go on to create
/// a log must hold the user's submission lock across check and commit.
pub struct DailyGate<'a, R: ?Sized> {
    repository: &'a R,
    calendar: CalendarPolicy,
}

impl<'a, R> DailyGate<'a, R>
where
    R: SmileRepository + ?Sized,
{
    pub fn new(repository: &'a R, calendar: CalendarPolicy) -> Self {
        Self {
            repository,
            calendar,
        }
    }

    pub fn check(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<GateDecision, RepositoryError> {
        let day = self.calendar.date_of(now);
        if self.repository.has_log_on(user_id, day)? {
            Ok(GateDecision::AlreadySubmitted { day })
        } else {
            Ok(GateDecision::Open { day })
        }
    }
}
