//! Core types for the reading practice domain.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Sublevel tag used to gate level 1 content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sublevel {
    /// Single-syllable words, offered first.
    Mono,
    /// Two-syllable words, unlocked once mono items run out.
    Di,
}

impl Sublevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mono => "mono",
            Self::Di => "di",
        }
    }

    /// Parse from string. `bi` is accepted as an alias of `di`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mono" => Some(Self::Mono),
            "di" | "bi" => Some(Self::Di),
            _ => None,
        }
    }
}

/// A single utterance the learner is asked to read aloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    /// Target utterance. Accepted variants are separated by `||`.
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sublevel: Option<Sublevel>,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sound: None,
            image: None,
            sublevel: None,
        }
    }

    pub fn with_sublevel(mut self, sublevel: Sublevel) -> Self {
        self.sublevel = Some(sublevel);
        self
    }

    /// The first accepted variant, used for display and speech synthesis.
    pub fn display_text(&self) -> &str {
        self.text.split("||").next().unwrap_or("").trim()
    }
}

/// Reference to a catalog item inside a deck.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeckEntry {
    pub level: u32,
    pub content_id: String,
}

impl DeckEntry {
    pub fn new(level: u32, content_id: impl Into<String>) -> Self {
        Self {
            level,
            content_id: content_id.into(),
        }
    }
}

/// Spaced repetition milestone of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStage {
    Learning,
    FirstReview,
    SecondReview,
    Mastered,
}

impl Default for ReviewStage {
    fn default() -> Self {
        Self::Learning
    }
}

impl ReviewStage {
    /// Convert to the stored numeric value (0-3).
    pub fn to_value(self) -> u8 {
        match self {
            Self::Learning => 0,
            Self::FirstReview => 1,
            Self::SecondReview => 2,
            Self::Mastered => 3,
        }
    }

    /// Create from the stored numeric value.
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Learning),
            1 => Some(Self::FirstReview),
            2 => Some(Self::SecondReview),
            3 => Some(Self::Mastered),
            _ => None,
        }
    }
}

/// Per-user mastery record for one content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemProgress {
    pub user_id: i64,
    pub level: u32,
    pub content_id: String,
    pub learn_correct_count: u8,
    pub review_stage: ReviewStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl ItemProgress {
    /// Fresh record for an item that has never been attempted.
    pub fn new(user_id: i64, level: u32, content_id: impl Into<String>) -> Self {
        Self {
            user_id,
            level,
            content_id: content_id.into(),
            learn_correct_count: 0,
            review_stage: ReviewStage::Learning,
            next_due_at: None,
            last_seen_at: None,
        }
    }

    pub fn entry(&self) -> DeckEntry {
        DeckEntry::new(self.level, self.content_id.clone())
    }
}

/// Practice session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Normal,
    Revival,
    Freecare,
}

impl Default for SessionMode {
    fn default() -> Self {
        Self::Normal
    }
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Revival => "revival",
            Self::Freecare => "freecare",
        }
    }

    /// Parse from string. Older rows used `resurrect` for revival.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "revival" | "resurrect" => Some(Self::Revival),
            "freecare" => Some(Self::Freecare),
            _ => None,
        }
    }
}

/// A pet need. Declaration order is the tie-break priority used by `pick_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Need {
    Hunger,
    Thirst,
    Hygiene,
    Energy,
    Mood,
    Health,
}

impl Need {
    pub const ALL: [Need; 6] = [
        Need::Hunger,
        Need::Thirst,
        Need::Hygiene,
        Need::Energy,
        Need::Mood,
        Need::Health,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hunger => "hunger",
            Self::Thirst => "thirst",
            Self::Hygiene => "hygiene",
            Self::Energy => "energy",
            Self::Mood => "mood",
            Self::Health => "health",
        }
    }

    /// The care action that satisfies this need.
    pub fn action(self) -> CareAction {
        match self {
            Self::Hunger => CareAction::Feed,
            Self::Thirst => CareAction::Water,
            Self::Hygiene => CareAction::Wash,
            Self::Energy => CareAction::Sleep,
            Self::Mood => CareAction::Play,
            Self::Health => CareAction::Heal,
        }
    }
}

/// Care action offered at a care gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareAction {
    Feed,
    Water,
    Wash,
    Sleep,
    Play,
    Heal,
}

impl CareAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Water => "water",
            Self::Wash => "wash",
            Self::Sleep => "sleep",
            Self::Play => "play",
            Self::Heal => "heal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "feed" => Some(Self::Feed),
            "water" => Some(Self::Water),
            "wash" => Some(Self::Wash),
            "sleep" => Some(Self::Sleep),
            "play" => Some(Self::Play),
            "heal" => Some(Self::Heal),
            _ => None,
        }
    }

    /// The need this action restores.
    pub fn need(self) -> Need {
        match self {
            Self::Feed => Need::Hunger,
            Self::Water => Need::Thirst,
            Self::Wash => Need::Hygiene,
            Self::Sleep => Need::Energy,
            Self::Play => Need::Mood,
            Self::Heal => Need::Health,
        }
    }
}

/// Pending care choice shown while a session waits at a care gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarePrompt {
    pub active_need: Need,
    /// Displayed pet state for the gate, e.g. `hunger_3`.
    pub need_state: String,
    pub options: Vec<CareAction>,
}

impl CarePrompt {
    pub fn offers(&self, action: CareAction) -> bool {
        self.options.contains(&action)
    }
}

/// Active practice session for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: i64,
    pub user_id: i64,
    pub level: u32,
    pub deck: Vec<DeckEntry>,
    pub item_index: usize,
    pub total_items: usize,
    pub correct_count: u32,
    pub wrong_total: u32,
    pub current_attempts: u32,
    /// Correct-answer checkpoints passed so far.
    pub reward_stage: u32,
    /// Care gates opened so far.
    pub care_stage: u32,
    pub mode: SessionMode,
    pub awaiting_care: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub care_prompt: Option<CarePrompt>,
    pub blocked: bool,
}

/// Persistent pet record (discrete need model).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetStatus {
    pub user_id: i64,
    pub pet_type: String,
    pub hunger: u8,
    pub thirst: u8,
    pub hygiene: u8,
    pub energy: u8,
    pub mood: u8,
    pub health: u8,
    pub is_dead: bool,
    pub consecutive_zero_days: u32,
    pub revival_streak: u32,
    pub sessions_today: u32,
    pub last_rollover_day: NaiveDate,
}

impl PetStatus {
    /// A healthy pet whose day accounting starts on `today`.
    pub fn new(user_id: i64, pet_type: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            user_id,
            pet_type: pet_type.into(),
            hunger: 1,
            thirst: 1,
            hygiene: 1,
            energy: 1,
            mood: 1,
            health: 1,
            is_dead: false,
            consecutive_zero_days: 0,
            revival_streak: 0,
            sessions_today: 0,
            last_rollover_day: today,
        }
    }

    pub fn level(&self, need: Need) -> u8 {
        match need {
            Need::Hunger => self.hunger,
            Need::Thirst => self.thirst,
            Need::Hygiene => self.hygiene,
            Need::Energy => self.energy,
            Need::Mood => self.mood,
            Need::Health => self.health,
        }
    }

    pub fn set_level(&mut self, need: Need, value: u8) {
        let slot = match need {
            Need::Hunger => &mut self.hunger,
            Need::Thirst => &mut self.thirst,
            Need::Hygiene => &mut self.hygiene,
            Need::Energy => &mut self.energy,
            Need::Mood => &mut self.mood,
            Need::Health => &mut self.health,
        };
        *slot = value;
    }
}

/// Review intervals of the two-stage spaced repetition curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewIntervals {
    /// Delay after graduating from learning, and after any wrong answer in review.
    pub learning_minutes: i64,
    /// Delay after passing the first review.
    pub review_days: i64,
}

impl Default for ReviewIntervals {
    fn default() -> Self {
        Self {
            learning_minutes: 10,
            review_days: 2,
        }
    }
}

/// Tunables for decks, sessions and the pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeSettings {
    pub session_size: usize,
    pub revival_size: usize,
    pub freecare_items: usize,
    pub freecare_recent_minutes: i64,
    /// Item positions at which a normal session pauses for a care choice.
    pub care_gates: Vec<usize>,
    /// Options shown at a care gate (the right one plus decoys).
    pub care_options: usize,
    pub max_attempts: u32,
    pub sessions_per_day: u32,
    /// A completed session with at most this many wrong answers earns a bonus.
    pub bonus_wrong_limit: u32,
    /// Level whose content is gated by sublevel.
    pub gated_level: Option<u32>,
    pub need_max: u8,
    /// Consecutive zero-session days that kill the pet.
    pub death_after_zero_days: u32,
    pub daily_reset_hour: u32,
    pub match_threshold: u8,
    pub intervals: ReviewIntervals,
}

impl Default for PracticeSettings {
    fn default() -> Self {
        Self {
            session_size: 10,
            revival_size: 20,
            freecare_items: 2,
            freecare_recent_minutes: 30,
            care_gates: vec![5, 10],
            care_options: 3,
            max_attempts: 5,
            sessions_per_day: 2,
            bonus_wrong_limit: 2,
            gated_level: Some(1),
            need_max: 3,
            death_after_zero_days: 2,
            daily_reset_hour: 0,
            match_threshold: 80,
            intervals: ReviewIntervals::default(),
        }
    }
}
