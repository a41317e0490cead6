//! Storage traits shared by the PostgreSQL and in-memory stores.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reader_core::{ItemProgress, PetStatus, SessionMode, SessionState};

use crate::error::Result;
use crate::models::{Attempt, DailyStats, LevelProgress, SessionRecord, SessionStatus, UserProfile};

/// Item mastery and per-level best results.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get_progress(&self, user_id: i64, level: u32, content_id: &str)
        -> Result<Option<ItemProgress>>;

    async fn upsert_progress(&self, progress: &ItemProgress) -> Result<()>;

    async fn list_progress(&self, user_id: i64) -> Result<Vec<ItemProgress>>;

    /// Store `max(existing, correct)` and return the stored value.
    async fn record_level_result(&self, user_id: i64, level: u32, correct: u32) -> Result<u32>;

    async fn list_level_progress(&self, user_id: i64) -> Result<Vec<LevelProgress>>;
}

/// Active session state, session history and the attempt log.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, user_id: i64) -> Result<Option<SessionState>>;

    async fn save_session(&self, state: &SessionState) -> Result<()>;

    async fn delete_session(&self, user_id: i64) -> Result<()>;

    /// Create a history row and return its id.
    async fn create_session_record(
        &self,
        user_id: i64,
        level: u32,
        mode: SessionMode,
        started_at: DateTime<Utc>,
    ) -> Result<i64>;

    async fn update_session_status(
        &self,
        session_id: i64,
        status: SessionStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn latest_session_record(&self, user_id: i64) -> Result<Option<SessionRecord>>;

    /// Sessions of `mode` started in `[start, end)`.
    async fn count_sessions_started_between(
        &self,
        user_id: i64,
        mode: SessionMode,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32>;

    async fn log_attempt(&self, attempt: &Attempt) -> Result<()>;

    async fn attempts_for_session(&self, session_id: i64) -> Result<Vec<Attempt>>;
}

/// Pet records. Pets are never deleted.
#[async_trait]
pub trait PetStore: Send + Sync {
    async fn get_pet(&self, user_id: i64) -> Result<Option<PetStatus>>;

    async fn save_pet(&self, pet: &PetStatus) -> Result<()>;
}

/// Learner profile and daily counters.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>>;

    async fn save_profile(&self, profile: &UserProfile) -> Result<()>;

    async fn get_daily_stats(&self, user_id: i64, day: NaiveDate) -> Result<Option<DailyStats>>;

    async fn save_daily_stats(&self, stats: &DailyStats) -> Result<()>;
}

/// Everything the services need from storage.
pub trait Store: ProgressStore + SessionStore + PetStore + UserStore {}

impl<T> Store for T where T: ProgressStore + SessionStore + PetStore + UserStore {}
