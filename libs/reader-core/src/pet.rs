//! Pet simulation.
//!
//! Needs live on a small discrete scale where 1 is fine and `need_max` is the
//! worst. Reading makes the pet hungry, thirsty and tired; care choices at
//! session gates and good sessions bring it back down. Two study days in a
//! row without a session kill the pet, and only a revival run brings it back.

use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::{CarePrompt, Need, PetStatus, PracticeSettings};

/// Need raised on every n-th correct answer of a session.
const CORRECT_ANSWER_NEEDS: [(u32, Need); 5] = [
    (2, Need::Hunger),
    (3, Need::Thirst),
    (4, Need::Energy),
    (5, Need::Hygiene),
    (6, Need::Mood),
];

/// Every n-th wrong answer of a session lowers the pet's mood.
const WRONG_ANSWER_MOOD_EVERY: u32 = 3;

/// Outcome of a day rollover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollover {
    pub days: u32,
    pub missed_days: u32,
    pub died: bool,
}

/// Applies learner activity and calendar days to a pet.
#[derive(Debug, Clone)]
pub struct PetSimulation {
    need_max: u8,
    death_after_zero_days: u32,
    bonus_wrong_limit: u32,
    care_options: usize,
}

impl Default for PetSimulation {
    fn default() -> Self {
        Self::new(&PracticeSettings::default())
    }
}

impl PetSimulation {
    pub fn new(settings: &PracticeSettings) -> Self {
        Self {
            need_max: settings.need_max.max(2),
            death_after_zero_days: settings.death_after_zero_days.max(1),
            bonus_wrong_limit: settings.bonus_wrong_limit,
            care_options: settings.care_options.clamp(1, Need::ALL.len()),
        }
    }

    pub fn apply_correct_answer(&self, pet: &mut PetStatus, correct_count: u32) {
        if pet.is_dead || correct_count == 0 {
            return;
        }
        for (every, need) in CORRECT_ANSWER_NEEDS {
            if correct_count % every == 0 {
                self.worsen(pet, need, 1);
            }
        }
    }

    pub fn apply_wrong_answer(&self, pet: &mut PetStatus, wrong_total: u32) {
        if pet.is_dead || wrong_total == 0 {
            return;
        }
        if wrong_total % WRONG_ANSWER_MOOD_EVERY == 0 {
            self.worsen(pet, Need::Mood, 1);
        }
    }

    /// Count a finished normal session. Returns whether the bonus applied.
    pub fn on_session_completed(&self, pet: &mut PetStatus, wrong_total: u32) -> bool {
        pet.sessions_today += 1;
        if pet.is_dead || wrong_total > self.bonus_wrong_limit {
            return false;
        }
        for need in Need::ALL {
            self.relieve(pet, need, 1);
        }
        true
    }

    /// Picking the need in crisis helps twice as much as a decoy.
    pub fn apply_care_choice(&self, pet: &mut PetStatus, chosen: Need, active: Need) {
        if pet.is_dead {
            return;
        }
        let steps = if chosen == active { 2 } else { 1 };
        self.relieve(pet, chosen, steps);
    }

    pub fn revive(&self, pet: &mut PetStatus) {
        for need in Need::ALL {
            pet.set_level(need, 1);
        }
        pet.is_dead = false;
        pet.consecutive_zero_days = 0;
        pet.revival_streak = 0;
    }

    /// Mirror the revival session streak onto the pet.
    pub fn record_revival_progress(&self, pet: &mut PetStatus, streak: u32) {
        if pet.is_dead {
            pet.revival_streak = streak;
        }
    }

    /// Settle every study day from `last_rollover_day` up to (not including)
    /// `today`.
    pub fn rollover(&self, pet: &mut PetStatus, today: NaiveDate) -> Rollover {
        let mut report = Rollover::default();
        if today <= pet.last_rollover_day {
            return report;
        }

        let mut day = pet.last_rollover_day;
        while day < today {
            let sessions = if day == pet.last_rollover_day {
                pet.sessions_today
            } else {
                0
            };
            report.days += 1;

            if sessions == 0 {
                report.missed_days += 1;
                if !pet.is_dead {
                    for need in Need::ALL {
                        self.worsen(pet, need, 1);
                    }
                    pet.consecutive_zero_days += 1;
                    if pet.consecutive_zero_days >= self.death_after_zero_days {
                        pet.is_dead = true;
                        pet.revival_streak = 0;
                        report.died = true;
                    }
                }
            } else {
                pet.consecutive_zero_days = 0;
            }

            day += Duration::days(1);
        }

        pet.sessions_today = 0;
        pet.last_rollover_day = today;
        report
    }

    /// Display state: `dead`, `happy`, or `{need}_{level}` of the worst need.
    /// Ties go to the first need in hunger, thirst, hygiene, energy, mood,
    /// health order.
    pub fn pick_state(&self, pet: &PetStatus) -> String {
        if pet.is_dead {
            return "dead".to_string();
        }
        let worst = worst_level(pet);
        if worst <= 1 {
            return "happy".to_string();
        }
        Need::ALL
            .iter()
            .find(|need| pet.level(**need) == worst)
            .map(|need| format!("{}_{}", need.as_str(), worst))
            .unwrap_or_else(|| "happy".to_string())
    }

    /// Care options for a gate. Dead pets get none.
    pub fn care_prompt<R: Rng + ?Sized>(&self, pet: &PetStatus, rng: &mut R) -> Option<CarePrompt> {
        if pet.is_dead {
            return None;
        }

        let worst = worst_level(pet);
        let in_crisis: Vec<Need> = Need::ALL
            .into_iter()
            .filter(|need| pet.level(*need) == worst)
            .collect();
        let active = *in_crisis.choose(rng)?;

        let (mut plausible, mut rest): (Vec<Need>, Vec<Need>) = Need::ALL
            .into_iter()
            .filter(|need| *need != active)
            .partition(|need| pet.level(*need) > 1);
        plausible.shuffle(rng);
        rest.shuffle(rng);

        let mut options: Vec<_> = std::iter::once(active)
            .chain(plausible)
            .chain(rest)
            .take(self.care_options)
            .map(Need::action)
            .collect();
        options.shuffle(rng);

        let need_state = if worst <= 1 {
            "happy".to_string()
        } else {
            format!("{}_{}", active.as_str(), worst)
        };

        Some(CarePrompt {
            active_need: active,
            need_state,
            options,
        })
    }

    /// One line per need plus the overall state, for chat replies.
    pub fn status_text(&self, pet: &PetStatus) -> String {
        let mut lines = vec![format!("{} is {}", pet.pet_type, self.pick_state(pet))];
        if pet.is_dead {
            lines.push(format!(
                "Revival progress: {} correct in a row",
                pet.revival_streak
            ));
            return lines.join("\n");
        }
        for need in Need::ALL {
            lines.push(format!("{}: {}/{}", need.as_str(), pet.level(need), self.need_max));
        }
        lines.push(format!("Sessions today: {}", pet.sessions_today));
        lines.join("\n")
    }

    fn worsen(&self, pet: &mut PetStatus, need: Need, steps: u8) {
        let level = pet.level(need).saturating_add(steps).min(self.need_max);
        pet.set_level(need, level);
    }

    fn relieve(&self, pet: &mut PetStatus, need: Need, steps: u8) {
        let level = pet.level(need).saturating_sub(steps).max(1);
        pet.set_level(need, level);
    }
}

fn worst_level(pet: &PetStatus) -> u8 {
    Need::ALL
        .iter()
        .map(|need| pet.level(*need))
        .max()
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CareAction;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn pet() -> PetStatus {
        PetStatus::new(1, "cat", day(1))
    }

    #[test]
    fn correct_answers_raise_needs_on_schedule() {
        let sim = PetSimulation::default();
        let mut p = pet();
        for count in 1..=6 {
            sim.apply_correct_answer(&mut p, count);
        }
        // hunger at 2, 4, 6; thirst at 3, 6; energy at 4; hygiene at 5; mood at 6
        assert_eq!(p.hunger, 3);
        assert_eq!(p.thirst, 3);
        assert_eq!(p.energy, 2);
        assert_eq!(p.hygiene, 2);
        assert_eq!(p.mood, 2);
        assert_eq!(p.health, 1);
    }

    #[test]
    fn needs_are_capped() {
        let sim = PetSimulation::default();
        let mut p = pet();
        for count in 1..=40 {
            sim.apply_correct_answer(&mut p, count);
        }
        assert!(Need::ALL.iter().all(|n| p.level(*n) <= 3));
    }

    #[test]
    fn every_third_wrong_answer_hurts_mood() {
        let sim = PetSimulation::default();
        let mut p = pet();
        sim.apply_wrong_answer(&mut p, 1);
        sim.apply_wrong_answer(&mut p, 2);
        assert_eq!(p.mood, 1);
        sim.apply_wrong_answer(&mut p, 3);
        assert_eq!(p.mood, 2);
    }

    #[test]
    fn good_session_relieves_all_needs() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.hunger = 3;
        p.mood = 2;
        assert!(sim.on_session_completed(&mut p, 2));
        assert_eq!(p.hunger, 2);
        assert_eq!(p.mood, 1);
        assert_eq!(p.thirst, 1);
        assert_eq!(p.sessions_today, 1);
    }

    #[test]
    fn sloppy_session_only_counts() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.hunger = 3;
        assert!(!sim.on_session_completed(&mut p, 3));
        assert_eq!(p.hunger, 3);
        assert_eq!(p.sessions_today, 1);
    }

    #[test]
    fn care_bonus_asymmetry() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.hunger = 3;
        p.thirst = 3;
        sim.apply_care_choice(&mut p, Need::Hunger, Need::Hunger);
        assert_eq!(p.hunger, 1);
        sim.apply_care_choice(&mut p, Need::Thirst, Need::Hunger);
        assert_eq!(p.thirst, 2);
        sim.apply_care_choice(&mut p, Need::Mood, Need::Mood);
        assert_eq!(p.mood, 1);
    }

    #[test]
    fn second_zero_day_kills() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.consecutive_zero_days = 1;
        let report = sim.rollover(&mut p, day(2));
        assert!(report.died);
        assert!(p.is_dead);
    }

    #[test]
    fn first_zero_day_does_not_kill() {
        let sim = PetSimulation::default();
        let mut p = pet();
        let report = sim.rollover(&mut p, day(2));
        assert_eq!(report.missed_days, 1);
        assert!(!p.is_dead);
        assert_eq!(p.consecutive_zero_days, 1);
        assert!(Need::ALL.iter().all(|n| p.level(*n) == 2));
    }

    #[test]
    fn day_with_sessions_resets_counter() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.consecutive_zero_days = 1;
        p.sessions_today = 2;
        let report = sim.rollover(&mut p, day(2));
        assert_eq!(report.missed_days, 0);
        assert_eq!(p.consecutive_zero_days, 0);
        assert_eq!(p.sessions_today, 0);
        assert_eq!(p.last_rollover_day, day(2));
        assert_eq!(p.hunger, 1);
    }

    #[test]
    fn several_missed_days_settle_at_once() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.sessions_today = 1;
        let report = sim.rollover(&mut p, day(4));
        // day 1 had a session, days 2 and 3 did not
        assert_eq!(report.days, 3);
        assert_eq!(report.missed_days, 2);
        assert!(p.is_dead);
    }

    #[test]
    fn rollover_same_day_is_noop() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.sessions_today = 1;
        assert_eq!(sim.rollover(&mut p, day(1)), Rollover::default());
        assert_eq!(p.sessions_today, 1);
    }

    #[test]
    fn revive_restores_baseline() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.is_dead = true;
        p.hunger = 3;
        p.consecutive_zero_days = 2;
        p.revival_streak = 19;
        sim.revive(&mut p);
        assert_eq!(p, PetStatus { sessions_today: p.sessions_today, ..pet() });
    }

    #[test]
    fn pick_state_prefers_priority_order() {
        let sim = PetSimulation::default();
        let mut p = pet();
        assert_eq!(sim.pick_state(&p), "happy");
        p.mood = 3;
        p.thirst = 3;
        p.hunger = 2;
        assert_eq!(sim.pick_state(&p), "thirst_3");
        p.is_dead = true;
        assert_eq!(sim.pick_state(&p), "dead");
    }

    #[test]
    fn care_prompt_targets_worst_need() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.energy = 3;
        p.hunger = 2;
        let prompt = sim.care_prompt(&p, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(prompt.active_need, Need::Energy);
        assert_eq!(prompt.need_state, "energy_3");
        assert_eq!(prompt.options.len(), 3);
        assert!(prompt.offers(CareAction::Sleep));
        // the only other degraded need is always a decoy
        assert!(prompt.offers(CareAction::Feed));
        let unique: HashSet<_> = prompt.options.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn care_prompt_breaks_ties_randomly() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.hunger = 3;
        p.thirst = 3;
        let actives: HashSet<Need> = (0..40)
            .filter_map(|seed| sim.care_prompt(&p, &mut StdRng::seed_from_u64(seed)))
            .map(|prompt| prompt.active_need)
            .collect();
        assert_eq!(actives, HashSet::from([Need::Hunger, Need::Thirst]));
    }

    #[test]
    fn dead_pet_gets_no_care_prompt() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.is_dead = true;
        assert!(sim.care_prompt(&p, &mut StdRng::seed_from_u64(1)).is_none());
    }

    #[test]
    fn dead_pet_ignores_activity() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.is_dead = true;
        sim.apply_correct_answer(&mut p, 2);
        sim.apply_care_choice(&mut p, Need::Hunger, Need::Hunger);
        assert_eq!(p.hunger, 1);
        sim.record_revival_progress(&mut p, 4);
        assert_eq!(p.revival_streak, 4);
    }

    #[test]
    fn status_text_lists_needs() {
        let sim = PetSimulation::default();
        let mut p = pet();
        p.hunger = 2;
        let text = sim.status_text(&p);
        assert!(text.starts_with("cat is hunger_2"));
        assert!(text.contains("hunger: 2/3"));
    }
}
