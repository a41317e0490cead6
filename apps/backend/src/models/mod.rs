//! Database models and API types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use reader_core::{
    AttemptStep, CarePrompt, DeckEntry, ItemProgress, Need, Phase, PetStatus, ReviewStage,
    SessionMode, SessionState,
};

use crate::error::{ApiError, Result};

// === Domain Records ===

/// Lifecycle status of a session history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Blocked,
    Passed,
    Done,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Blocked => "blocked",
            Self::Passed => "passed",
            Self::Done => "done",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "blocked" => Some(Self::Blocked),
            "passed" => Some(Self::Passed),
            "done" => Some(Self::Done),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

/// History row for every started session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub user_id: i64,
    pub level: u32,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// One logged answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub session_id: i64,
    pub user_id: i64,
    pub level: u32,
    pub content_id: String,
    pub expected_text: String,
    pub transcript: String,
    pub score: u8,
    pub is_first_try: bool,
    pub is_correct: bool,
    pub created_at: DateTime<Utc>,
}

/// Per study day answer counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub user_id: i64,
    pub day: NaiveDate,
    pub attempts: u32,
    pub correct: u32,
    /// Consecutive correct answers, reset by a wrong one.
    pub streak: u32,
}

impl DailyStats {
    pub fn new(user_id: i64, day: NaiveDate) -> Self {
        Self {
            user_id,
            day,
            attempts: 0,
            correct: 0,
            streak: 0,
        }
    }

    pub fn record(&mut self, is_correct: bool) {
        self.attempts += 1;
        if is_correct {
            self.correct += 1;
            self.streak += 1;
        } else {
            self.streak = 0;
        }
    }
}

/// Learner profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub current_level: u32,
    pub pet_type: Option<String>,
}

impl UserProfile {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            current_level: 1,
            pet_type: None,
        }
    }
}

/// Best correct count reached on a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    pub best_correct: u32,
}

// === Database Entity Types ===

/// Item progress stored in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbItemProgress {
    pub user_id: i64,
    pub level: i32,
    pub content_id: String,
    pub learn_correct_count: i16,
    pub review_stage: i16,
    pub next_due_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl DbItemProgress {
    pub fn to_core(&self) -> Result<ItemProgress> {
        let stage = u8::try_from(self.review_stage)
            .ok()
            .and_then(ReviewStage::from_value)
            .ok_or_else(|| {
                ApiError::Internal(format!("invalid review stage {}", self.review_stage))
            })?;
        Ok(ItemProgress {
            user_id: self.user_id,
            level: to_u32(self.level, "level")?,
            content_id: self.content_id.clone(),
            learn_correct_count: u8::try_from(self.learn_correct_count).unwrap_or(0),
            review_stage: stage,
            next_due_at: self.next_due_at,
            last_seen_at: self.last_seen_at,
        })
    }
}

/// Active session state stored in PostgreSQL. Deck and care prompt are JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct DbSessionState {
    pub session_id: i64,
    pub user_id: i64,
    pub level: i32,
    pub deck: String,
    pub item_index: i32,
    pub total_items: i32,
    pub correct_count: i32,
    pub wrong_total: i32,
    pub current_attempts: i32,
    pub reward_stage: i32,
    pub care_stage: i32,
    pub mode: String,
    pub awaiting_care: bool,
    pub care_json: Option<String>,
    pub blocked: bool,
}

impl DbSessionState {
    pub fn from_core(state: &SessionState) -> Result<Self> {
        let care_json = state
            .care_prompt
            .as_ref()
            .map(encode_care_prompt)
            .transpose()?;
        Ok(Self {
            session_id: state.session_id,
            user_id: state.user_id,
            level: to_i32(state.level as usize),
            deck: serde_json::to_string(&state.deck)
                .map_err(|e| ApiError::Internal(format!("encode deck: {e}")))?,
            item_index: to_i32(state.item_index),
            total_items: to_i32(state.total_items),
            correct_count: to_i32(state.correct_count as usize),
            wrong_total: to_i32(state.wrong_total as usize),
            current_attempts: to_i32(state.current_attempts as usize),
            reward_stage: to_i32(state.reward_stage as usize),
            care_stage: to_i32(state.care_stage as usize),
            mode: state.mode.as_str().to_string(),
            awaiting_care: state.awaiting_care,
            care_json,
            blocked: state.blocked,
        })
    }

    pub fn to_core(&self) -> Result<SessionState> {
        let deck: Vec<DeckEntry> = serde_json::from_str(&self.deck)
            .map_err(|e| ApiError::Internal(format!("decode deck: {e}")))?;
        let mode = SessionMode::parse(&self.mode)
            .ok_or_else(|| ApiError::Internal(format!("invalid session mode {}", self.mode)))?;
        let care_prompt = self
            .care_json
            .as_deref()
            .map(decode_care_prompt)
            .transpose()?;
        Ok(SessionState {
            session_id: self.session_id,
            user_id: self.user_id,
            level: to_u32(self.level, "level")?,
            deck,
            item_index: to_u32(self.item_index, "item_index")? as usize,
            total_items: to_u32(self.total_items, "total_items")? as usize,
            correct_count: to_u32(self.correct_count, "correct_count")?,
            wrong_total: to_u32(self.wrong_total, "wrong_total")?,
            current_attempts: to_u32(self.current_attempts, "current_attempts")?,
            reward_stage: to_u32(self.reward_stage, "reward_stage")?,
            care_stage: to_u32(self.care_stage, "care_stage")?,
            mode,
            awaiting_care: self.awaiting_care,
            care_prompt,
            blocked: self.blocked,
        })
    }
}

/// Session history row in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbSessionRecord {
    pub id: i64,
    pub user_id: i64,
    pub level: i32,
    pub mode: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl DbSessionRecord {
    pub fn to_record(&self) -> Result<SessionRecord> {
        Ok(SessionRecord {
            id: self.id,
            user_id: self.user_id,
            level: to_u32(self.level, "level")?,
            mode: SessionMode::parse(&self.mode)
                .ok_or_else(|| ApiError::Internal(format!("invalid session mode {}", self.mode)))?,
            status: SessionStatus::parse(&self.status).ok_or_else(|| {
                ApiError::Internal(format!("invalid session status {}", self.status))
            })?,
            started_at: self.started_at,
            ended_at: self.ended_at,
        })
    }
}

/// Attempt log row in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbAttempt {
    pub session_id: i64,
    pub user_id: i64,
    pub level: i32,
    pub content_id: String,
    pub expected_text: String,
    pub transcript: String,
    pub score: i16,
    pub is_first_try: bool,
    pub is_correct: bool,
    pub created_at: DateTime<Utc>,
}

impl DbAttempt {
    pub fn to_attempt(&self) -> Result<Attempt> {
        Ok(Attempt {
            session_id: self.session_id,
            user_id: self.user_id,
            level: to_u32(self.level, "level")?,
            content_id: self.content_id.clone(),
            expected_text: self.expected_text.clone(),
            transcript: self.transcript.clone(),
            score: u8::try_from(self.score).unwrap_or(0),
            is_first_try: self.is_first_try,
            is_correct: self.is_correct,
            created_at: self.created_at,
        })
    }
}

/// Pet row in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbPet {
    pub user_id: i64,
    pub pet_type: String,
    pub hunger: i16,
    pub thirst: i16,
    pub hygiene: i16,
    pub energy: i16,
    pub mood: i16,
    pub health: i16,
    pub is_dead: bool,
    pub consecutive_zero_days: i32,
    pub revival_streak: i32,
    pub sessions_today: i32,
    pub last_rollover_day: NaiveDate,
}

impl DbPet {
    pub fn to_core(&self) -> Result<PetStatus> {
        let need = |v: i16| u8::try_from(v).unwrap_or(1).max(1);
        Ok(PetStatus {
            user_id: self.user_id,
            pet_type: self.pet_type.clone(),
            hunger: need(self.hunger),
            thirst: need(self.thirst),
            hygiene: need(self.hygiene),
            energy: need(self.energy),
            mood: need(self.mood),
            health: need(self.health),
            is_dead: self.is_dead,
            consecutive_zero_days: to_u32(self.consecutive_zero_days, "consecutive_zero_days")?,
            revival_streak: to_u32(self.revival_streak, "revival_streak")?,
            sessions_today: to_u32(self.sessions_today, "sessions_today")?,
            last_rollover_day: self.last_rollover_day,
        })
    }
}

/// User profile row in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbUserProfile {
    pub user_id: i64,
    pub current_level: i32,
    pub pet_type: Option<String>,
}

impl DbUserProfile {
    pub fn to_profile(&self) -> Result<UserProfile> {
        Ok(UserProfile {
            user_id: self.user_id,
            current_level: to_u32(self.current_level, "current_level")?.max(1),
            pet_type: self.pet_type.clone(),
        })
    }
}

/// Daily stats row in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbDailyStats {
    pub user_id: i64,
    pub day: NaiveDate,
    pub attempts: i32,
    pub correct: i32,
    pub streak: i32,
}

impl DbDailyStats {
    pub fn to_stats(&self) -> Result<DailyStats> {
        Ok(DailyStats {
            user_id: self.user_id,
            day: self.day,
            attempts: to_u32(self.attempts, "attempts")?,
            correct: to_u32(self.correct, "correct")?,
            streak: to_u32(self.streak, "streak")?,
        })
    }
}

/// Serialize a care prompt for storage.
pub fn encode_care_prompt(prompt: &CarePrompt) -> Result<String> {
    serde_json::to_string(prompt).map_err(|e| ApiError::Internal(format!("encode care prompt: {e}")))
}

/// Parse a stored care prompt.
pub fn decode_care_prompt(raw: &str) -> Result<CarePrompt> {
    serde_json::from_str(raw).map_err(|e| ApiError::Internal(format!("decode care prompt: {e}")))
}

pub fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_u32(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| ApiError::Internal(format!("negative {field}: {value}")))
}

// === API Request/Response Types ===

/// Request to start or resume a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub level: Option<u32>,
}

/// A recognised answer. `score`/`is_correct` are taken as is when the
/// transport already evaluated the audio; otherwise the transcript is scored.
/// Scores above 100 are capped.
///
/// `item_index` is the index of the item shown to the learner. When it no
/// longer matches the session cursor the request is a retried delivery of an
/// answer that was already applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRequest {
    pub transcript: String,
    pub score: Option<u8>,
    pub is_correct: Option<bool>,
    pub item_index: Option<usize>,
}

/// Care choice at an open gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareRequest {
    pub action: String,
}

/// Pet type change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePetRequest {
    pub pet_type: String,
}

/// What the learner has to do next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    pub session_id: i64,
    pub mode: SessionMode,
    pub phase: Phase,
    pub level: u32,
    pub item_index: usize,
    pub total_items: usize,
    pub correct_count: u32,
    pub wrong_total: u32,
    pub item: Option<TaskItem>,
    pub care_prompt: Option<CarePrompt>,
}

/// Item being read right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub level: u32,
    pub content_id: String,
    pub text: String,
    pub image: Option<String>,
    /// Item sound asset, or synthesized speech; null when neither is available.
    pub audio_path: Option<String>,
}

/// Pet side effect reported at session end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinishOutcome {
    Rewarded { bonus: bool },
    Revived,
    FreecareDone,
    AlreadyFinished,
    InProgress,
}

/// Summary of a finalized session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: i64,
    pub mode: SessionMode,
    pub level: u32,
    pub correct: u32,
    pub total: u32,
    pub status: SessionStatus,
    pub outcome: FinishOutcome,
    /// Set when the next deck will come from a higher level.
    pub advanced_level: Option<u32>,
}

/// Result of one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Nothing to answer; the transport should offer a new session.
    NoActiveSession,
    /// Replayed answer; nothing was recorded again.
    AlreadyRecorded { task: TaskView },
    Recorded {
        is_correct: bool,
        score: u8,
        step: AttemptStep,
        task: Option<TaskView>,
        summary: Option<SessionSummary>,
    },
}

/// Result of a care choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareOutcome {
    pub chosen: Need,
    pub matched: bool,
    pub pet: PetView,
    pub task: Option<TaskView>,
    pub summary: Option<SessionSummary>,
}

/// Pet as shown to the learner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetView {
    pub pet: PetStatus,
    pub state: String,
    pub status_text: String,
}

/// Levels available in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelsResponse {
    pub levels: Vec<LevelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelInfo {
    pub level: u32,
    pub items: usize,
}

/// Learner progress overview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub current_level: u32,
    pub levels: Vec<LevelProgressView>,
    pub due_now: usize,
    pub today: Option<DailyStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelProgressView {
    pub level: u32,
    pub total_items: usize,
    pub mastered: usize,
    pub in_review: usize,
    pub best_correct: u32,
}

/// Stop/block acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionControlResponse {
    pub session_id: Option<i64>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reader_core::CareAction;

    #[test]
    fn test_session_state_round_trips_through_row() {
        let mut state = SessionState::new(
            11,
            3,
            1,
            vec![DeckEntry::new(1, "cat"), DeckEntry::new(2, "w4")],
            SessionMode::Normal,
        );
        state.open_care_gate(CarePrompt {
            active_need: Need::Thirst,
            need_state: "thirst_2".to_string(),
            options: vec![CareAction::Water, CareAction::Heal, CareAction::Feed],
        });

        let row = DbSessionState::from_core(&state).unwrap();
        assert_eq!(row.mode, "normal");
        assert!(row.care_json.as_deref().unwrap().contains("\"water\""));
        assert_eq!(row.to_core().unwrap(), state);
    }

    #[test]
    fn test_legacy_revival_mode_is_read() {
        let state = SessionState::new(1, 1, 1, vec![], SessionMode::Revival);
        let mut row = DbSessionState::from_core(&state).unwrap();
        row.mode = "resurrect".to_string();
        assert_eq!(row.to_core().unwrap().mode, SessionMode::Revival);
    }

    #[test]
    fn test_invalid_stage_is_rejected() {
        let row = DbItemProgress {
            user_id: 1,
            level: 1,
            content_id: "cat".to_string(),
            learn_correct_count: 2,
            review_stage: 7,
            next_due_at: None,
            last_seen_at: None,
        };
        assert!(row.to_core().is_err());
    }

    #[test]
    fn test_daily_stats_streak() {
        let mut stats = DailyStats::new(1, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        stats.record(true);
        stats.record(true);
        stats.record(false);
        stats.record(true);
        assert_eq!(stats.attempts, 4);
        assert_eq!(stats.correct, 3);
        assert_eq!(stats.streak, 1);
    }
}
