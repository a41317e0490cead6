//! Item mastery state machine.
//!
//! Two correct answers graduate an item from learning into review. The first
//! review comes back after a short delay, the second after a few days, and a
//! third correct answer masters the item. Wrong answers never undo progress;
//! during review they only pull the next due date closer.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::types::{DeckEntry, ItemProgress, ReviewIntervals, ReviewStage};

/// Correct answers needed before an item enters review.
pub const LEARN_CORRECT_TARGET: u8 = 2;

/// Applies answers to item progress records.
#[derive(Debug, Clone, Default)]
pub struct ReviewScheduler {
    pub intervals: ReviewIntervals,
}

impl ReviewScheduler {
    pub fn new(intervals: ReviewIntervals) -> Self {
        Self { intervals }
    }

    /// Advance the item by exactly one step.
    pub fn record_correct(&self, progress: &ItemProgress, now: DateTime<Utc>) -> ItemProgress {
        let mut next = progress.clone();
        next.last_seen_at = Some(now);

        match progress.review_stage {
            ReviewStage::Learning => {
                let count = progress.learn_correct_count.saturating_add(1);
                next.learn_correct_count = count.min(LEARN_CORRECT_TARGET);
                if count >= LEARN_CORRECT_TARGET {
                    next.review_stage = ReviewStage::FirstReview;
                    next.next_due_at = Some(now + self.learning_delay());
                } else {
                    next.next_due_at = None;
                }
            }
            ReviewStage::FirstReview => {
                next.review_stage = ReviewStage::SecondReview;
                next.next_due_at = Some(now + Duration::days(self.intervals.review_days));
            }
            ReviewStage::SecondReview | ReviewStage::Mastered => {
                next.review_stage = ReviewStage::Mastered;
                next.next_due_at = None;
            }
        }

        next
    }

    /// Record a miss without losing progress.
    pub fn record_wrong(&self, progress: &ItemProgress, now: DateTime<Utc>) -> ItemProgress {
        let mut next = progress.clone();
        next.last_seen_at = Some(now);

        match progress.review_stage {
            ReviewStage::Learning => {}
            ReviewStage::FirstReview | ReviewStage::SecondReview => {
                next.next_due_at = Some(now + self.learning_delay());
            }
            ReviewStage::Mastered => next.next_due_at = None,
        }

        next
    }

    fn learning_delay(&self) -> Duration {
        Duration::minutes(self.intervals.learning_minutes)
    }
}

/// Whether the record marks a mastered item. Missing records are unfinished.
pub fn is_finished(progress: Option<&ItemProgress>) -> bool {
    matches!(progress, Some(p) if p.review_stage == ReviewStage::Mastered)
}

/// Records due at `now`, oldest due date first.
pub fn list_due<'a, I>(records: I, now: DateTime<Utc>) -> Vec<&'a ItemProgress>
where
    I: IntoIterator<Item = &'a ItemProgress>,
{
    let mut due: Vec<&ItemProgress> = records
        .into_iter()
        .filter(|p| matches!(p.next_due_at, Some(at) if at <= now))
        .collect();
    due.sort_by(|a, b| {
        a.next_due_at
            .cmp(&b.next_due_at)
            .then(a.level.cmp(&b.level))
            .then(a.content_id.cmp(&b.content_id))
    });
    due
}

/// All progress records of one user, keyed by deck entry.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    records: HashMap<DeckEntry, ItemProgress>,
}

impl ProgressSnapshot {
    pub fn new(records: impl IntoIterator<Item = ItemProgress>) -> Self {
        Self {
            records: records.into_iter().map(|p| (p.entry(), p)).collect(),
        }
    }

    pub fn get(&self, level: u32, content_id: &str) -> Option<&ItemProgress> {
        self.records.get(&DeckEntry::new(level, content_id))
    }

    pub fn is_finished(&self, level: u32, content_id: &str) -> bool {
        is_finished(self.get(level, content_id))
    }

    pub fn due(&self, now: DateTime<Utc>) -> Vec<&ItemProgress> {
        list_due(self.records.values(), now)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
