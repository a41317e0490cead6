//! Time source and study-day helpers.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Study day of `now()` for the given reset hour.
    fn study_day(&self, daily_reset_hour: u32) -> NaiveDate {
        study_day(self.now(), daily_reset_hour)
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Calendar day a moment belongs to from a study perspective.
///
/// Before `daily_reset_hour` the moment still counts towards the previous
/// day, so late evening practice is not split across two days.
pub fn study_day(now: DateTime<Utc>, daily_reset_hour: u32) -> NaiveDate {
    if now.hour() < daily_reset_hour {
        (now - Duration::days(1)).date_naive()
    } else {
        now.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn midnight_reset_uses_calendar_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap();
        assert_eq!(study_day(now, 0), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn early_hours_belong_to_previous_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap();
        assert_eq!(study_day(now, 4), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(study_day(now, 3), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn fixed_clock_advances_shared_instant() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        let shared = clock.clone();
        clock.advance(Duration::days(1));
        assert_eq!(shared.now(), start + Duration::days(1));
        assert_eq!(shared.study_day(0), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }
}
