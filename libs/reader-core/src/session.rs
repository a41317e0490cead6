//! Practice session state machine.
//!
//! A session walks its deck one item at a time. Normal sessions pause at
//! care gates, revival sessions demand an unbroken run of correct answers,
//! and freecare sessions open a single gate once their short deck is read.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{CareAction, CarePrompt, DeckEntry, SessionMode, SessionState};

/// Externally visible phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Active,
    AwaitingCare,
    Blocked,
    Complete,
}

/// What a single attempt did to the session cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptStep {
    /// Wrong answer, same item again.
    Retry { attempts: u32, remaining: u32 },
    /// Moved to the next item. `skipped` is set when the item was given up
    /// after too many wrong attempts.
    Advanced { skipped: bool },
    /// Revival streak broken, back to the first item.
    StreakReset,
}

/// Pet side effect owed once a session's deck is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finalization {
    Rewarded { bonus: bool },
    Revived,
    FreecareDone,
}

impl SessionState {
    pub fn new(
        session_id: i64,
        user_id: i64,
        level: u32,
        deck: Vec<DeckEntry>,
        mode: SessionMode,
    ) -> Self {
        Self {
            session_id,
            user_id,
            level,
            total_items: deck.len(),
            deck,
            item_index: 0,
            correct_count: 0,
            wrong_total: 0,
            current_attempts: 0,
            reward_stage: 0,
            care_stage: 0,
            mode,
            awaiting_care: false,
            care_prompt: None,
            blocked: false,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.blocked {
            Phase::Blocked
        } else if self.awaiting_care {
            Phase::AwaitingCare
        } else if self.is_complete() {
            Phase::Complete
        } else {
            Phase::Active
        }
    }

    pub fn is_complete(&self) -> bool {
        self.item_index >= self.total_items
    }

    pub fn current_entry(&self) -> Option<&DeckEntry> {
        if self.is_complete() {
            return None;
        }
        self.deck.get(self.item_index)
    }

    /// Fails unless the session can take an answer right now.
    pub fn ensure_accepting(&self) -> Result<()> {
        match self.phase() {
            Phase::Active => Ok(()),
            Phase::Blocked => Err(CoreError::SessionBlocked),
            Phase::AwaitingCare => Err(CoreError::AwaitingCare),
            Phase::Complete => Err(CoreError::NoActiveSession),
        }
    }

    /// An answer aimed at an item the cursor already left. The first
    /// delivery of that answer was applied, so this one must not be.
    pub fn is_replay(&self, expected_index: Option<usize>) -> bool {
        matches!(expected_index, Some(index) if index != self.item_index)
    }

    /// Move `reward_stage` up to the number of checkpoints the correct
    /// count has reached. Returns whether a new checkpoint was passed.
    pub fn pass_reward_checkpoints(&mut self, checkpoints: &[usize]) -> bool {
        let reached = checkpoints
            .iter()
            .filter(|&&at| at > 0 && at <= self.correct_count as usize)
            .count() as u32;
        if reached <= self.reward_stage {
            return false;
        }
        self.reward_stage = reached;
        true
    }

    /// Count an answer on the current item and move the cursor.
    pub fn record_attempt(&mut self, is_correct: bool, max_attempts: u32) -> Result<AttemptStep> {
        self.ensure_accepting()?;
        let expected = self.item_index;

        if is_correct {
            self.correct_count += 1;
            self.current_attempts = 0;
            self.advance_item(expected);
            return Ok(AttemptStep::Advanced { skipped: false });
        }

        self.wrong_total += 1;
        self.current_attempts += 1;

        if self.mode == SessionMode::Revival {
            self.item_index = 0;
            self.current_attempts = 0;
            return Ok(AttemptStep::StreakReset);
        }

        if self.current_attempts >= max_attempts {
            self.advance_item(expected);
            return Ok(AttemptStep::Advanced { skipped: true });
        }

        Ok(AttemptStep::Retry {
            attempts: self.current_attempts,
            remaining: max_attempts - self.current_attempts,
        })
    }

    /// Move to the next item, but only from `expected_index`.
    ///
    /// Returns false when the cursor already moved, so a replayed advance is
    /// harmless.
    pub fn advance_item(&mut self, expected_index: usize) -> bool {
        if self.item_index != expected_index || self.is_complete() {
            return false;
        }
        self.item_index += 1;
        self.current_attempts = 0;
        true
    }

    /// Whether a care gate should open at the current position.
    pub fn care_gate_due(&self, gates: &[usize]) -> bool {
        if self.awaiting_care {
            return false;
        }
        match self.mode {
            SessionMode::Normal => {
                let reached = gates
                    .iter()
                    .filter(|&&gate| gate > 0 && gate <= self.total_items && gate <= self.item_index)
                    .count();
                reached > self.care_stage as usize
            }
            SessionMode::Freecare => self.is_complete() && self.care_stage == 0,
            SessionMode::Revival => false,
        }
    }

    pub fn open_care_gate(&mut self, prompt: CarePrompt) {
        self.awaiting_care = true;
        self.care_stage += 1;
        self.care_prompt = Some(prompt);
    }

    /// Accept a care choice. The action must be one of the offered options;
    /// otherwise nothing changes.
    pub fn close_care_gate(&mut self, action: CareAction) -> Result<CarePrompt> {
        let offered = match (&self.care_prompt, self.awaiting_care) {
            (Some(prompt), true) => prompt.offers(action),
            _ => false,
        };
        if !offered {
            return Err(CoreError::InvalidCareChoice {
                action: action.as_str().to_string(),
            });
        }

        self.awaiting_care = false;
        self.care_prompt
            .take()
            .ok_or_else(|| CoreError::InvalidCareChoice {
                action: action.as_str().to_string(),
            })
    }

    pub fn block(&mut self) {
        self.blocked = true;
    }

    pub fn unblock(&mut self) {
        self.blocked = false;
    }

    /// Ready to finalize: deck done and no care choice pending.
    pub fn ready_to_finish(&self) -> bool {
        self.is_complete() && !self.awaiting_care
    }

    /// The pet side effect owed by this session.
    pub fn finalization(&self, bonus_wrong_limit: u32) -> Finalization {
        match self.mode {
            SessionMode::Normal => Finalization::Rewarded {
                bonus: self.wrong_total <= bonus_wrong_limit,
            },
            SessionMode::Revival => Finalization::Revived,
            SessionMode::Freecare => Finalization::FreecareDone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Need;
    use pretty_assertions::assert_eq;

    fn deck(n: usize) -> Vec<DeckEntry> {
        (0..n).map(|i| DeckEntry::new(1, format!("a{i}"))).collect()
    }

    fn prompt() -> CarePrompt {
        CarePrompt {
            active_need: Need::Hunger,
            need_state: "hunger_2".to_string(),
            options: vec![CareAction::Water, CareAction::Feed, CareAction::Play],
        }
    }

    #[test]
    fn new_session_starts_at_first_item() {
        let session = SessionState::new(1, 7, 1, deck(3), SessionMode::Normal);
        assert_eq!(session.total_items, 3);
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(session.current_entry(), Some(&DeckEntry::new(1, "a0")));
    }

    #[test]
    fn correct_answer_advances() {
        let mut session = SessionState::new(1, 7, 1, deck(3), SessionMode::Normal);
        let step = session.record_attempt(true, 5).unwrap();
        assert_eq!(step, AttemptStep::Advanced { skipped: false });
        assert_eq!(session.item_index, 1);
        assert_eq!(session.correct_count, 1);
    }

    #[test]
    fn wrong_answers_force_advance_after_limit() {
        let mut session = SessionState::new(1, 7, 1, deck(3), SessionMode::Normal);
        for n in 1..5 {
            let step = session.record_attempt(false, 5).unwrap();
            assert_eq!(
                step,
                AttemptStep::Retry {
                    attempts: n,
                    remaining: 5 - n
                }
            );
        }
        let step = session.record_attempt(false, 5).unwrap();
        assert_eq!(step, AttemptStep::Advanced { skipped: true });
        assert_eq!(session.item_index, 1);
        assert_eq!(session.current_attempts, 0);
        assert_eq!(session.wrong_total, 5);
        assert_eq!(session.correct_count, 0);
    }

    #[test]
    fn correct_answer_resets_attempts() {
        let mut session = SessionState::new(1, 7, 1, deck(3), SessionMode::Normal);
        session.record_attempt(false, 5).unwrap();
        session.record_attempt(true, 5).unwrap();
        assert_eq!(session.current_attempts, 0);
        assert_eq!(session.wrong_total, 1);
    }

    #[test]
    fn revival_wrong_answer_resets_streak() {
        let mut session = SessionState::new(1, 7, 1, deck(20), SessionMode::Revival);
        for _ in 0..7 {
            session.record_attempt(true, 5).unwrap();
        }
        assert_eq!(session.item_index, 7);
        let step = session.record_attempt(false, 5).unwrap();
        assert_eq!(step, AttemptStep::StreakReset);
        assert_eq!(session.item_index, 0);
        assert_eq!(session.current_attempts, 0);
    }

    #[test]
    fn revival_never_force_advances() {
        let mut session = SessionState::new(1, 7, 1, deck(20), SessionMode::Revival);
        for _ in 0..10 {
            session.record_attempt(false, 5).unwrap();
        }
        assert_eq!(session.item_index, 0);
    }

    #[test]
    fn advance_guard_is_idempotent() {
        let mut session = SessionState::new(1, 7, 1, deck(3), SessionMode::Normal);
        assert!(session.advance_item(0));
        assert!(!session.advance_item(0));
        assert_eq!(session.item_index, 1);
    }

    #[test]
    fn answer_for_a_left_item_is_a_replay() {
        let mut session = SessionState::new(1, 7, 1, deck(3), SessionMode::Normal);
        assert!(!session.is_replay(None));
        assert!(!session.is_replay(Some(0)));
        session.record_attempt(true, 5).unwrap();
        assert!(session.is_replay(Some(0)));
        assert!(!session.is_replay(Some(1)));
    }

    #[test]
    fn reward_checkpoints_follow_correct_answers() {
        let checkpoints = [2, 3];
        let mut session = SessionState::new(1, 7, 1, deck(5), SessionMode::Normal);
        session.record_attempt(true, 5).unwrap();
        session.record_attempt(false, 5).unwrap();
        assert!(!session.pass_reward_checkpoints(&checkpoints));
        assert_eq!(session.reward_stage, 0);

        session.record_attempt(true, 5).unwrap();
        assert!(session.pass_reward_checkpoints(&checkpoints));
        assert!(!session.pass_reward_checkpoints(&checkpoints));
        assert_eq!(session.reward_stage, 1);

        session.record_attempt(true, 5).unwrap();
        assert!(session.pass_reward_checkpoints(&checkpoints));
        assert_eq!(session.reward_stage, 2);
    }

    #[test]
    fn advance_stops_at_end() {
        let mut session = SessionState::new(1, 7, 1, deck(1), SessionMode::Normal);
        assert!(session.advance_item(0));
        assert!(!session.advance_item(1));
        assert_eq!(session.item_index, 1);
        assert_eq!(session.phase(), Phase::Complete);
        assert_eq!(session.current_entry(), None);
    }

    #[test]
    fn gates_open_once_per_position() {
        let gates = [5, 10];
        let mut session = SessionState::new(1, 7, 1, deck(10), SessionMode::Normal);
        for _ in 0..4 {
            session.record_attempt(true, 5).unwrap();
            assert!(!session.care_gate_due(&gates));
        }
        session.record_attempt(true, 5).unwrap();
        assert!(session.care_gate_due(&gates));

        session.open_care_gate(prompt());
        assert_eq!(session.phase(), Phase::AwaitingCare);
        assert_eq!(session.record_attempt(true, 5), Err(CoreError::AwaitingCare));
        assert!(!session.care_gate_due(&gates));

        session.close_care_gate(CareAction::Feed).unwrap();
        assert_eq!(session.care_stage, 1);
        assert!(!session.care_gate_due(&gates));

        for _ in 0..5 {
            session.record_attempt(true, 5).unwrap();
        }
        assert!(session.care_gate_due(&gates));
    }

    #[test]
    fn gates_past_the_deck_never_open() {
        let mut session = SessionState::new(1, 7, 1, deck(3), SessionMode::Normal);
        for _ in 0..3 {
            session.record_attempt(true, 5).unwrap();
        }
        assert!(!session.care_gate_due(&[5, 10]));
        assert!(session.ready_to_finish());
    }

    #[test]
    fn freecare_gate_opens_after_last_item() {
        let mut session = SessionState::new(1, 7, 1, deck(2), SessionMode::Freecare);
        session.record_attempt(true, 5).unwrap();
        assert!(!session.care_gate_due(&[1]));
        session.record_attempt(true, 5).unwrap();
        assert!(session.care_gate_due(&[1]));
        session.open_care_gate(prompt());
        assert!(!session.ready_to_finish());
        session.close_care_gate(CareAction::Play).unwrap();
        assert!(!session.care_gate_due(&[1]));
        assert!(session.ready_to_finish());
    }

    #[test]
    fn revival_has_no_gates() {
        let mut session = SessionState::new(1, 7, 1, deck(5), SessionMode::Revival);
        for _ in 0..5 {
            session.record_attempt(true, 5).unwrap();
        }
        assert!(!session.care_gate_due(&[5]));
    }

    #[test]
    fn invalid_care_choice_changes_nothing() {
        let mut session = SessionState::new(1, 7, 1, deck(10), SessionMode::Normal);
        session.item_index = 5;
        session.open_care_gate(prompt());
        let before = session.clone();

        let err = session.close_care_gate(CareAction::Heal).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidCareChoice {
                action: "heal".to_string()
            }
        );
        assert_eq!(session, before);
    }

    #[test]
    fn care_choice_without_gate_is_rejected() {
        let mut session = SessionState::new(1, 7, 1, deck(3), SessionMode::Normal);
        assert!(session.close_care_gate(CareAction::Feed).is_err());
    }

    #[test]
    fn blocked_session_refuses_attempts() {
        let mut session = SessionState::new(1, 7, 1, deck(3), SessionMode::Normal);
        session.block();
        assert_eq!(session.phase(), Phase::Blocked);
        assert_eq!(session.record_attempt(true, 5), Err(CoreError::SessionBlocked));
        session.unblock();
        assert!(session.record_attempt(true, 5).is_ok());
    }

    #[test]
    fn finalization_depends_on_mode() {
        let mut normal = SessionState::new(1, 7, 1, deck(3), SessionMode::Normal);
        normal.wrong_total = 2;
        assert_eq!(normal.finalization(2), Finalization::Rewarded { bonus: true });
        normal.wrong_total = 3;
        assert_eq!(normal.finalization(2), Finalization::Rewarded { bonus: false });

        let revival = SessionState::new(1, 7, 1, deck(3), SessionMode::Revival);
        assert_eq!(revival.finalization(2), Finalization::Revived);

        let freecare = SessionState::new(1, 7, 1, deck(1), SessionMode::Freecare);
        assert_eq!(freecare.finalization(2), Finalization::FreecareDone);
    }
}
