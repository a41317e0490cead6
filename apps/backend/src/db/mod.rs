//! PostgreSQL database operations

pub mod memory;
pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reader_core::{ItemProgress, PetStatus, SessionMode, SessionState};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::error::{ApiError, Result};
use crate::models::*;

pub use memory::MemoryStore;
pub use store::{PetStore, ProgressStore, SessionStore, Store, UserStore};

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and create connection pool
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// === Progress Repository ===

#[async_trait]
impl ProgressStore for Database {
    async fn get_progress(
        &self,
        user_id: i64,
        level: u32,
        content_id: &str,
    ) -> Result<Option<ItemProgress>> {
        let row = sqlx::query_as::<_, DbItemProgress>(
            r#"
            SELECT user_id, level, content_id, learn_correct_count, review_stage,
                   next_due_at, last_seen_at
            FROM item_progress
            WHERE user_id = $1 AND level = $2 AND content_id = $3
            "#,
        )
        .bind(user_id)
        .bind(level as i32)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.to_core()).transpose()
    }

    async fn upsert_progress(&self, progress: &ItemProgress) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO item_progress (user_id, level, content_id, learn_correct_count,
                                       review_stage, next_due_at, last_seen_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, level, content_id) DO UPDATE SET
                learn_correct_count = EXCLUDED.learn_correct_count,
                review_stage = EXCLUDED.review_stage,
                next_due_at = EXCLUDED.next_due_at,
                last_seen_at = EXCLUDED.last_seen_at
            "#,
        )
        .bind(progress.user_id)
        .bind(progress.level as i32)
        .bind(&progress.content_id)
        .bind(progress.learn_correct_count as i16)
        .bind(progress.review_stage.to_value() as i16)
        .bind(progress.next_due_at)
        .bind(progress.last_seen_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_progress(&self, user_id: i64) -> Result<Vec<ItemProgress>> {
        let rows = sqlx::query_as::<_, DbItemProgress>(
            r#"
            SELECT user_id, level, content_id, learn_correct_count, review_stage,
                   next_due_at, last_seen_at
            FROM item_progress
            WHERE user_id = $1
            ORDER BY level, content_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(DbItemProgress::to_core).collect()
    }

    async fn record_level_result(&self, user_id: i64, level: u32, correct: u32) -> Result<u32> {
        let best: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO level_progress (user_id, level, best_correct)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, level) DO UPDATE SET
                best_correct = GREATEST(level_progress.best_correct, EXCLUDED.best_correct),
                updated_at = NOW()
            RETURNING best_correct
            "#,
        )
        .bind(user_id)
        .bind(level as i32)
        .bind(correct as i32)
        .fetch_one(&self.pool)
        .await?;

        Ok(best.max(0) as u32)
    }

    async fn list_level_progress(&self, user_id: i64) -> Result<Vec<LevelProgress>> {
        let rows: Vec<(i32, i32)> = sqlx::query_as(
            r#"
            SELECT level, best_correct
            FROM level_progress
            WHERE user_id = $1
            ORDER BY level
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(level, best)| LevelProgress {
                level: level.max(0) as u32,
                best_correct: best.max(0) as u32,
            })
            .collect())
    }
}

// === Session Repository ===

#[async_trait]
impl SessionStore for Database {
    async fn get_session(&self, user_id: i64) -> Result<Option<SessionState>> {
        let row = sqlx::query_as::<_, DbSessionState>(
            r#"
            SELECT session_id, user_id, level, deck, item_index, total_items, correct_count,
                   wrong_total, current_attempts, reward_stage, care_stage, mode,
                   awaiting_care, care_json, blocked
            FROM session_state
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.to_core()).transpose()
    }

    async fn save_session(&self, state: &SessionState) -> Result<()> {
        let row = DbSessionState::from_core(state)?;
        sqlx::query(
            r#"
            INSERT INTO session_state (session_id, user_id, level, deck, item_index, total_items,
                                       correct_count, wrong_total, current_attempts, reward_stage,
                                       care_stage, mode, awaiting_care, care_json, blocked)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (user_id) DO UPDATE SET
                session_id = EXCLUDED.session_id,
                level = EXCLUDED.level,
                deck = EXCLUDED.deck,
                item_index = EXCLUDED.item_index,
                total_items = EXCLUDED.total_items,
                correct_count = EXCLUDED.correct_count,
                wrong_total = EXCLUDED.wrong_total,
                current_attempts = EXCLUDED.current_attempts,
                reward_stage = EXCLUDED.reward_stage,
                care_stage = EXCLUDED.care_stage,
                mode = EXCLUDED.mode,
                awaiting_care = EXCLUDED.awaiting_care,
                care_json = EXCLUDED.care_json,
                blocked = EXCLUDED.blocked,
                updated_at = NOW()
            "#,
        )
        .bind(row.session_id)
        .bind(row.user_id)
        .bind(row.level)
        .bind(&row.deck)
        .bind(row.item_index)
        .bind(row.total_items)
        .bind(row.correct_count)
        .bind(row.wrong_total)
        .bind(row.current_attempts)
        .bind(row.reward_stage)
        .bind(row.care_stage)
        .bind(&row.mode)
        .bind(row.awaiting_care)
        .bind(&row.care_json)
        .bind(row.blocked)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_session(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM session_state WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_session_record(
        &self,
        user_id: i64,
        level: u32,
        mode: SessionMode,
        started_at: DateTime<Utc>,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sessions (user_id, level, mode, status, started_at)
            VALUES ($1, $2, $3, 'active', $4)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(level as i32)
        .bind(mode.as_str())
        .bind(started_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update_session_status(
        &self,
        session_id: i64,
        status: SessionStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = $2, ended_at = $3
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .bind(status.as_str())
        .bind(ended_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("session {session_id}")));
        }
        Ok(())
    }

    async fn latest_session_record(&self, user_id: i64) -> Result<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, DbSessionRecord>(
            r#"
            SELECT id, user_id, level, mode, status, started_at, ended_at
            FROM sessions
            WHERE user_id = $1
            ORDER BY started_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.to_record()).transpose()
    }

    async fn count_sessions_started_between(
        &self,
        user_id: i64,
        mode: SessionMode,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM sessions
            WHERE user_id = $1 AND mode = $2 AND started_at >= $3 AND started_at < $4
            "#,
        )
        .bind(user_id)
        .bind(mode.as_str())
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u32)
    }

    async fn log_attempt(&self, attempt: &Attempt) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attempts (session_id, user_id, level, content_id, expected_text,
                                  transcript, score, is_first_try, is_correct, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(attempt.session_id)
        .bind(attempt.user_id)
        .bind(attempt.level as i32)
        .bind(&attempt.content_id)
        .bind(&attempt.expected_text)
        .bind(&attempt.transcript)
        .bind(attempt.score as i16)
        .bind(attempt.is_first_try)
        .bind(attempt.is_correct)
        .bind(attempt.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn attempts_for_session(&self, session_id: i64) -> Result<Vec<Attempt>> {
        let rows = sqlx::query_as::<_, DbAttempt>(
            r#"
            SELECT session_id, user_id, level, content_id, expected_text, transcript,
                   score, is_first_try, is_correct, created_at
            FROM attempts
            WHERE session_id = $1
            ORDER BY id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(DbAttempt::to_attempt).collect()
    }
}

// === Pet Repository ===

#[async_trait]
impl PetStore for Database {
    async fn get_pet(&self, user_id: i64) -> Result<Option<PetStatus>> {
        let row = sqlx::query_as::<_, DbPet>(
            r#"
            SELECT user_id, pet_type, hunger, thirst, hygiene, energy, mood, health,
                   is_dead, consecutive_zero_days, revival_streak, sessions_today,
                   last_rollover_day
            FROM pets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.to_core()).transpose()
    }

    async fn save_pet(&self, pet: &PetStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pets (user_id, pet_type, hunger, thirst, hygiene, energy, mood, health,
                              is_dead, consecutive_zero_days, revival_streak, sessions_today,
                              last_rollover_day)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (user_id) DO UPDATE SET
                pet_type = EXCLUDED.pet_type,
                hunger = EXCLUDED.hunger,
                thirst = EXCLUDED.thirst,
                hygiene = EXCLUDED.hygiene,
                energy = EXCLUDED.energy,
                mood = EXCLUDED.mood,
                health = EXCLUDED.health,
                is_dead = EXCLUDED.is_dead,
                consecutive_zero_days = EXCLUDED.consecutive_zero_days,
                revival_streak = EXCLUDED.revival_streak,
                sessions_today = EXCLUDED.sessions_today,
                last_rollover_day = EXCLUDED.last_rollover_day,
                updated_at = NOW()
            "#,
        )
        .bind(pet.user_id)
        .bind(&pet.pet_type)
        .bind(pet.hunger as i16)
        .bind(pet.thirst as i16)
        .bind(pet.hygiene as i16)
        .bind(pet.energy as i16)
        .bind(pet.mood as i16)
        .bind(pet.health as i16)
        .bind(pet.is_dead)
        .bind(pet.consecutive_zero_days as i32)
        .bind(pet.revival_streak as i32)
        .bind(pet.sessions_today as i32)
        .bind(pet.last_rollover_day)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// === User Repository ===

#[async_trait]
impl UserStore for Database {
    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let row = sqlx::query_as::<_, DbUserProfile>(
            r#"
            SELECT user_id, current_level, pet_type
            FROM user_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.to_profile()).transpose()
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, current_level, pet_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                current_level = EXCLUDED.current_level,
                pet_type = EXCLUDED.pet_type
            "#,
        )
        .bind(profile.user_id)
        .bind(profile.current_level as i32)
        .bind(&profile.pet_type)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_daily_stats(&self, user_id: i64, day: NaiveDate) -> Result<Option<DailyStats>> {
        let row = sqlx::query_as::<_, DbDailyStats>(
            r#"
            SELECT user_id, day, attempts, correct, streak
            FROM daily_stats
            WHERE user_id = $1 AND day = $2
            "#,
        )
        .bind(user_id)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.to_stats()).transpose()
    }

    async fn save_daily_stats(&self, stats: &DailyStats) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_stats (user_id, day, attempts, correct, streak)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, day) DO UPDATE SET
                attempts = EXCLUDED.attempts,
                correct = EXCLUDED.correct,
                streak = EXCLUDED.streak
            "#,
        )
        .bind(stats.user_id)
        .bind(stats.day)
        .bind(stats.attempts as i32)
        .bind(stats.correct as i32)
        .bind(stats.streak as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
