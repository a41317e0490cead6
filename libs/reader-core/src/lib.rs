//! Core reading-practice library used by the backend service.
//!
//! Provides:
//! - Content catalog and level file parser
//! - Item mastery tracking on a two-interval review curve
//! - Deck builder with sublevel gating and level advancement
//! - Session state machine with care gates and revival runs
//! - Virtual pet simulation
//! - Transcript matching for read-aloud answers

pub mod catalog;
pub mod clock;
pub mod deck;
pub mod error;
pub mod matching;
pub mod pet;
pub mod progress;
pub mod session;
pub mod types;

pub use catalog::{parse_level, parse_word_list, Catalog};
pub use clock::{study_day, Clock, FixedClock, SystemClock};
pub use deck::{DeckBuilder, DeckPlan};
pub use error::{CoreError, ParseError, Result};
pub use matching::{evaluate_transcript, normalize, MatchResult};
pub use pet::{PetSimulation, Rollover};
pub use progress::{is_finished, list_due, ProgressSnapshot, ReviewScheduler, LEARN_CORRECT_TARGET};
pub use session::{AttemptStep, Finalization, Phase};
pub use types::{
    CareAction, CarePrompt, ContentItem, DeckEntry, ItemProgress, Need, PetStatus,
    PracticeSettings, ReviewIntervals, ReviewStage, SessionMode, SessionState, Sublevel,
};
