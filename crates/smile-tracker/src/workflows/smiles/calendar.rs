use chrono::{DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, Offset, Utc};

/// Defines where calendar days start. Shared by the daily gate, monthly rankings and the
/// profile calendar so all three agree on what "today" means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarPolicy {
    offset: FixedOffset,
}

impl CalendarPolicy {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Offset east of UTC in minutes; `None` outside of +/- 24h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn month_of(&self, instant: DateTime<Utc>) -> MonthWindow {
        MonthWindow::containing(self.date_of(instant))
    }
}

impl Default for CalendarPolicy {
    fn default() -> Self {
        Self::utc()
    }
}

/// Half-open `[first, next_first)` span of calendar days covering one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    first: NaiveDate,
    next_first: NaiveDate,
}

impl MonthWindow {
    pub fn containing(date: NaiveDate) -> Self {
        let first = date - Days::new(u64::from(date.day0()));
        Self {
            first,
            next_first: first + Months::new(1),
        }
    }

    pub fn first(&self) -> NaiveDate {
        self.first
    }

    pub fn next_first(&self) -> NaiveDate {
        self.next_first
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date < self.next_first
    }
}
