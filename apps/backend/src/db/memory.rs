//! In-memory store for local development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reader_core::{ItemProgress, PetStatus, SessionMode, SessionState};
use tokio::sync::Mutex;

use crate::db::store::{PetStore, ProgressStore, SessionStore, UserStore};
use crate::error::{ApiError, Result};
use crate::models::{Attempt, DailyStats, LevelProgress, SessionRecord, SessionStatus, UserProfile};

#[derive(Default)]
struct Inner {
    progress: HashMap<(i64, u32, String), ItemProgress>,
    level_progress: HashMap<(i64, u32), u32>,
    sessions: HashMap<i64, SessionState>,
    records: Vec<SessionRecord>,
    attempts: Vec<Attempt>,
    pets: HashMap<i64, PetStatus>,
    profiles: HashMap<i64, UserProfile>,
    daily_stats: HashMap<(i64, NaiveDate), DailyStats>,
}

/// Process-local store. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn get_progress(
        &self,
        user_id: i64,
        level: u32,
        content_id: &str,
    ) -> Result<Option<ItemProgress>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .progress
            .get(&(user_id, level, content_id.to_string()))
            .cloned())
    }

    async fn upsert_progress(&self, progress: &ItemProgress) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.progress.insert(
            (progress.user_id, progress.level, progress.content_id.clone()),
            progress.clone(),
        );
        Ok(())
    }

    async fn list_progress(&self, user_id: i64) -> Result<Vec<ItemProgress>> {
        let inner = self.inner.lock().await;
        let mut records: Vec<ItemProgress> = inner
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.level.cmp(&b.level).then(a.content_id.cmp(&b.content_id)));
        Ok(records)
    }

    async fn record_level_result(&self, user_id: i64, level: u32, correct: u32) -> Result<u32> {
        let mut inner = self.inner.lock().await;
        let best = inner.level_progress.entry((user_id, level)).or_insert(0);
        *best = (*best).max(correct);
        Ok(*best)
    }

    async fn list_level_progress(&self, user_id: i64) -> Result<Vec<LevelProgress>> {
        let inner = self.inner.lock().await;
        let mut levels: Vec<LevelProgress> = inner
            .level_progress
            .iter()
            .filter(|((uid, _), _)| *uid == user_id)
            .map(|((_, level), best)| LevelProgress {
                level: *level,
                best_correct: *best,
            })
            .collect();
        levels.sort_by_key(|l| l.level);
        Ok(levels)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_session(&self, user_id: i64) -> Result<Option<SessionState>> {
        let inner = self.inner.lock().await;
        Ok(inner.sessions.get(&user_id).cloned())
    }

    async fn save_session(&self, state: &SessionState) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.sessions.insert(state.user_id, state.clone());
        Ok(())
    }

    async fn delete_session(&self, user_id: i64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.sessions.remove(&user_id);
        Ok(())
    }

    async fn create_session_record(
        &self,
        user_id: i64,
        level: u32,
        mode: SessionMode,
        started_at: DateTime<Utc>,
    ) -> Result<i64> {
        let mut inner = self.inner.lock().await;
        let id = inner.records.len() as i64 + 1;
        inner.records.push(SessionRecord {
            id,
            user_id,
            level,
            mode,
            status: SessionStatus::Active,
            started_at,
            ended_at: None,
        });
        Ok(id)
    }

    async fn update_session_status(
        &self,
        session_id: i64,
        status: SessionStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.id == session_id)
            .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))?;
        record.status = status;
        record.ended_at = ended_at;
        Ok(())
    }

    async fn latest_session_record(&self, user_id: i64) -> Result<Option<SessionRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| r.user_id == user_id)
            .max_by_key(|r| (r.started_at, r.id))
            .cloned())
    }

    async fn count_sessions_started_between(
        &self,
        user_id: i64,
        mode: SessionMode,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32> {
        let inner = self.inner.lock().await;
        let count = inner
            .records
            .iter()
            .filter(|r| {
                r.user_id == user_id && r.mode == mode && r.started_at >= start && r.started_at < end
            })
            .count();
        Ok(count as u32)
    }

    async fn log_attempt(&self, attempt: &Attempt) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.attempts.push(attempt.clone());
        Ok(())
    }

    async fn attempts_for_session(&self, session_id: i64) -> Result<Vec<Attempt>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .attempts
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PetStore for MemoryStore {
    async fn get_pet(&self, user_id: i64) -> Result<Option<PetStatus>> {
        let inner = self.inner.lock().await;
        Ok(inner.pets.get(&user_id).cloned())
    }

    async fn save_pet(&self, pet: &PetStatus) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.pets.insert(pet.user_id, pet.clone());
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let inner = self.inner.lock().await;
        Ok(inner.profiles.get(&user_id).cloned())
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn get_daily_stats(&self, user_id: i64, day: NaiveDate) -> Result<Option<DailyStats>> {
        let inner = self.inner.lock().await;
        Ok(inner.daily_stats.get(&(user_id, day)).cloned())
    }

    async fn save_daily_stats(&self, stats: &DailyStats) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .daily_stats
            .insert((stats.user_id, stats.day), stats.clone());
        Ok(())
    }
}
