//! Item progress tracker backed by the store.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use reader_core::{
    Catalog, ItemProgress, ProgressSnapshot, ReviewIntervals, ReviewScheduler, ReviewStage,
};

use crate::db::Store;
use crate::error::Result;
use crate::models::{LevelProgressView, ProgressResponse, UserProfile};

/// Persists review transitions for one item at a time.
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn Store>,
    scheduler: ReviewScheduler,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn Store>, intervals: ReviewIntervals) -> Self {
        Self {
            store,
            scheduler: ReviewScheduler::new(intervals),
        }
    }

    async fn load(&self, user_id: i64, level: u32, content_id: &str) -> Result<ItemProgress> {
        Ok(self
            .store
            .get_progress(user_id, level, content_id)
            .await?
            .unwrap_or_else(|| ItemProgress::new(user_id, level, content_id)))
    }

    pub async fn record_correct(
        &self,
        user_id: i64,
        level: u32,
        content_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ItemProgress> {
        let current = self.load(user_id, level, content_id).await?;
        let next = self.scheduler.record_correct(&current, now);
        self.store.upsert_progress(&next).await?;
        if next.review_stage != current.review_stage {
            tracing::debug!(
                "Item {}/{} of user {} moved to {:?}",
                level,
                content_id,
                user_id,
                next.review_stage
            );
        }
        Ok(next)
    }

    pub async fn record_wrong(
        &self,
        user_id: i64,
        level: u32,
        content_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ItemProgress> {
        let current = self.load(user_id, level, content_id).await?;
        let next = self.scheduler.record_wrong(&current, now);
        self.store.upsert_progress(&next).await?;
        Ok(next)
    }

    pub async fn is_finished(&self, user_id: i64, level: u32, content_id: &str) -> Result<bool> {
        let progress = self.store.get_progress(user_id, level, content_id).await?;
        Ok(reader_core::is_finished(progress.as_ref()))
    }

    pub async fn list_due(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<ItemProgress>> {
        let records = self.store.list_progress(user_id).await?;
        Ok(reader_core::list_due(&records, now)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn snapshot(&self, user_id: i64) -> Result<ProgressSnapshot> {
        Ok(ProgressSnapshot::new(self.store.list_progress(user_id).await?))
    }

    /// Per-level mastery summary for the learner.
    pub async fn overview(
        &self,
        user_id: i64,
        catalog: &Catalog,
        now: DateTime<Utc>,
        day: NaiveDate,
    ) -> Result<ProgressResponse> {
        let profile = self
            .store
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| UserProfile::new(user_id));
        let snapshot = self.snapshot(user_id).await?;
        let best = self.store.list_level_progress(user_id).await?;

        let levels = catalog
            .list_levels()
            .into_iter()
            .map(|level| {
                let items = catalog.items_or_empty(level);
                let stage_count = |wanted: &[ReviewStage]| {
                    items
                        .iter()
                        .filter_map(|item| snapshot.get(level, &item.id))
                        .filter(|p| wanted.contains(&p.review_stage))
                        .count()
                };
                LevelProgressView {
                    level,
                    total_items: items.len(),
                    mastered: stage_count(&[ReviewStage::Mastered]),
                    in_review: stage_count(&[ReviewStage::FirstReview, ReviewStage::SecondReview]),
                    best_correct: best
                        .iter()
                        .find(|b| b.level == level)
                        .map(|b| b.best_correct)
                        .unwrap_or(0),
                }
            })
            .collect();

        Ok(ProgressResponse {
            current_level: profile.current_level,
            levels,
            due_now: snapshot.due(now).len(),
            today: self.store.get_daily_stats(user_id, day).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use reader_core::ContentItem;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(Arc::new(MemoryStore::new()), ReviewIntervals::default())
    }

    #[tokio::test]
    async fn test_missing_record_is_created_on_first_answer() {
        let tracker = tracker();
        let progress = tracker.record_correct(1, 1, "cat", now()).await.unwrap();
        assert_eq!(progress.learn_correct_count, 1);
        assert_eq!(progress.next_due_at, None);
        assert!(!tracker.is_finished(1, 1, "cat").await.unwrap());

        let wrong = tracker.record_wrong(1, 1, "dog", now()).await.unwrap();
        assert_eq!(wrong.review_stage, ReviewStage::Learning);
        assert_eq!(wrong.last_seen_at, Some(now()));
    }

    #[tokio::test]
    async fn test_item_masters_after_full_curve() {
        let tracker = tracker();
        let mut at = now();
        for _ in 0..4 {
            tracker.record_correct(1, 1, "cat", at).await.unwrap();
            at += Duration::days(3);
        }
        assert!(tracker.is_finished(1, 1, "cat").await.unwrap());
        assert!(tracker.list_due(1, at).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_due_items_are_listed_oldest_first() {
        let tracker = tracker();
        for id in ["b", "a"] {
            tracker.record_correct(1, 1, id, now()).await.unwrap();
        }
        tracker
            .record_correct(1, 1, "b", now() + Duration::minutes(1))
            .await
            .unwrap();
        tracker
            .record_correct(1, 1, "a", now() + Duration::minutes(2))
            .await
            .unwrap();

        assert!(tracker.list_due(1, now()).await.unwrap().is_empty());
        let due = tracker
            .list_due(1, now() + Duration::hours(1))
            .await
            .unwrap();
        let ids: Vec<&str> = due.iter().map(|p| p.content_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_overview_counts_stages_per_level() {
        let tracker = tracker();
        let catalog = Catalog::new()
            .with_level(1, vec![ContentItem::new("cat", "cat"), ContentItem::new("dog", "dog")])
            .with_level(2, vec![ContentItem::new("1", "good morning")]);

        tracker.record_correct(1, 1, "cat", now()).await.unwrap();
        tracker.record_correct(1, 1, "cat", now()).await.unwrap();

        let overview = tracker
            .overview(1, &catalog, now(), now().date_naive())
            .await
            .unwrap();
        assert_eq!(overview.current_level, 1);
        assert_eq!(overview.levels.len(), 2);
        assert_eq!(overview.levels[0].total_items, 2);
        assert_eq!(overview.levels[0].in_review, 1);
        assert_eq!(overview.levels[0].mastered, 0);
        assert_eq!(overview.due_now, 0);
        assert!(overview.today.is_none());
    }
}
