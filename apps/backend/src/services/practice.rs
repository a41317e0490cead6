//! Practice sessions: deck building, attempts, care gates and finalization.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::seq::SliceRandom;
use reader_core::{
    AttemptStep, CareAction, Catalog, Clock, CoreError, DeckBuilder, DeckEntry, Finalization,
    Phase, PetStatus, PracticeSettings, ProgressSnapshot, SessionMode, SessionState,
};

use crate::db::Store;
use crate::error::{ApiError, Result};
use crate::models::{
    Attempt, AttemptOutcome, AttemptRequest, CareOutcome, DailyStats, FinishOutcome,
    SessionControlResponse, SessionStatus, SessionSummary, TaskItem, TaskView, UserProfile,
};
use crate::services::pet::PetService;
use crate::services::progress::ProgressTracker;
use crate::services::speech::{AudioCache, SpeechEvaluator, SpeechVerdict};
use crate::services::SharedRng;

/// Runs the per-user practice state machine against the store.
pub struct PracticeService {
    store: Arc<dyn Store>,
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
    rng: SharedRng,
    settings: PracticeSettings,
    progress: ProgressTracker,
    pets: PetService,
    speech: Arc<dyn SpeechEvaluator>,
    audio: Arc<AudioCache>,
}

impl PracticeService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        catalog: Arc<Catalog>,
        clock: Arc<dyn Clock>,
        rng: SharedRng,
        settings: PracticeSettings,
        progress: ProgressTracker,
        pets: PetService,
        speech: Arc<dyn SpeechEvaluator>,
        audio: Arc<AudioCache>,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            rng,
            settings,
            progress,
            pets,
            speech,
            audio,
        }
    }

    /// Start a normal session, or resume the one in progress.
    ///
    /// A dead pet turns this into a revival session.
    pub async fn start(&self, user_id: i64, level: Option<u32>) -> Result<TaskView> {
        let pet = self.pets.load(user_id).await?;

        if let Some(state) = self.store.get_session(user_id).await? {
            if !pet.is_dead || state.mode == SessionMode::Revival {
                tracing::info!("Resuming session {} for user {}", state.session_id, user_id);
                return self.task_view(&state).await;
            }
            tracing::info!(
                "Pet of user {} is dead, abandoning session {}",
                user_id,
                state.session_id
            );
            self.abandon(&state).await?;
        }

        if pet.is_dead {
            return self.begin_revival(user_id, level).await;
        }

        let now = self.clock.now();
        let (day_start, day_end) = self.study_day_bounds(now);
        let started = self
            .store
            .count_sessions_started_between(user_id, SessionMode::Normal, day_start, day_end)
            .await?;
        if started >= self.settings.sessions_per_day {
            return Err(CoreError::DailyLimitReached {
                limit: self.settings.sessions_per_day,
            }
            .into());
        }

        let mut profile = self.profile(user_id).await?;
        let current_level = level.unwrap_or(profile.current_level);
        let snapshot = self.progress.snapshot(user_id).await?;
        let plan = {
            let mut rng = self.lock_rng()?;
            DeckBuilder::new(&self.catalog, &snapshot)
                .gated_level(self.settings.gated_level)
                .build(current_level, self.settings.session_size, now, &mut *rng)
        };
        if plan.is_empty() {
            return Err(CoreError::NoContentAvailable.into());
        }

        let session_level = plan.advanced_level.unwrap_or(current_level);
        if let Some(advanced) = plan.advanced_level {
            tracing::info!(
                "User {} finished level {}, moving to level {}",
                user_id,
                current_level,
                advanced
            );
        }
        if profile.current_level != session_level {
            profile.current_level = session_level;
            self.store.save_profile(&profile).await?;
        }

        let state = self
            .create_session(user_id, session_level, plan.entries, SessionMode::Normal, now)
            .await?;
        self.task_view(&state).await
    }

    /// Start (or resume) the revival run of a dead pet.
    pub async fn start_revival(&self, user_id: i64, level: Option<u32>) -> Result<TaskView> {
        if let Some(state) = self.store.get_session(user_id).await? {
            if state.mode == SessionMode::Revival {
                return self.task_view(&state).await;
            }
            return Err(CoreError::SessionAlreadyActive.into());
        }
        let pet = self.pets.load(user_id).await?;
        if !pet.is_dead {
            return Err(ApiError::Conflict("pet does not need reviving".to_string()));
        }
        self.begin_revival(user_id, level).await
    }

    async fn begin_revival(&self, user_id: i64, level: Option<u32>) -> Result<TaskView> {
        let now = self.clock.now();
        let profile = self.profile(user_id).await?;
        let current_level = level.unwrap_or(profile.current_level);
        let snapshot = self.progress.snapshot(user_id).await?;
        let plan = {
            let mut rng = self.lock_rng()?;
            DeckBuilder::new(&self.catalog, &snapshot)
                .gated_level(self.settings.gated_level)
                .build(current_level, self.settings.revival_size, now, &mut *rng)
        };
        if plan.is_empty() {
            return Err(CoreError::NoContentAvailable.into());
        }

        let mut pet = self.pets.load(user_id).await?;
        pet.revival_streak = 0;
        self.pets.save(&pet).await?;

        let state = self
            .create_session(user_id, current_level, plan.entries, SessionMode::Revival, now)
            .await?;
        tracing::info!(
            "Started revival session {} for user {} ({} items)",
            state.session_id,
            user_id,
            state.total_items
        );
        self.task_view(&state).await
    }

    /// Short care-only session on one or two fresh items. Never counts
    /// towards the daily session limit.
    pub async fn start_freecare(&self, user_id: i64) -> Result<TaskView> {
        if let Some(state) = self.store.get_session(user_id).await? {
            if state.mode == SessionMode::Freecare {
                return self.task_view(&state).await;
            }
            return Err(CoreError::SessionAlreadyActive.into());
        }

        let pet = self.pets.load(user_id).await?;
        if pet.is_dead {
            return Err(CoreError::PetDead.into());
        }

        let now = self.clock.now();
        let profile = self.profile(user_id).await?;
        let snapshot = self.progress.snapshot(user_id).await?;
        let deck = self.freecare_items(&snapshot, profile.current_level, now)?;
        if deck.is_empty() {
            return Err(CoreError::NoContentAvailable.into());
        }

        let level = deck[0].level;
        let state = self
            .create_session(user_id, level, deck, SessionMode::Freecare, now)
            .await?;
        self.task_view(&state).await
    }

    /// Unfinished items not seen recently (due items are always welcome),
    /// from the current level or the first higher level that has some.
    fn freecare_items(
        &self,
        snapshot: &ProgressSnapshot,
        current_level: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeckEntry>> {
        let recent = now - Duration::minutes(self.settings.freecare_recent_minutes);
        let levels = std::iter::once(current_level).chain(
            self.catalog
                .list_levels()
                .into_iter()
                .filter(|level| *level > current_level),
        );

        for level in levels {
            let mut candidates: Vec<DeckEntry> = self
                .catalog
                .items_or_empty(level)
                .iter()
                .filter(|item| match snapshot.get(level, &item.id) {
                    None => true,
                    Some(p) if reader_core::is_finished(Some(p)) => false,
                    Some(p) => {
                        let due = matches!(p.next_due_at, Some(at) if at <= now);
                        let seen_recently = matches!(p.last_seen_at, Some(at) if at > recent);
                        due || !seen_recently
                    }
                })
                .map(|item| DeckEntry::new(level, item.id.clone()))
                .collect();
            if candidates.is_empty() {
                continue;
            }
            let mut rng = self.lock_rng()?;
            candidates.shuffle(&mut *rng);
            candidates.truncate(self.settings.freecare_items.max(1));
            return Ok(candidates);
        }
        Ok(Vec::new())
    }

    /// Score an answer and move the session along.
    pub async fn submit_attempt(
        &self,
        user_id: i64,
        request: AttemptRequest,
    ) -> Result<AttemptOutcome> {
        let Some(mut state) = self.store.get_session(user_id).await? else {
            return Ok(AttemptOutcome::NoActiveSession);
        };
        if state.phase() == Phase::Complete {
            // Left over from an interrupted finalization.
            let mut pet = self.pets.load(user_id).await?;
            self.finalize(state, &mut pet).await?;
            return Ok(AttemptOutcome::NoActiveSession);
        }
        if state.is_replay(request.item_index) {
            tracing::info!(
                "Ignoring replayed answer of user {} for item {:?} (cursor at {})",
                user_id,
                request.item_index,
                state.item_index
            );
            return Ok(AttemptOutcome::AlreadyRecorded {
                task: self.task_view(&state).await?,
            });
        }
        state.ensure_accepting()?;

        let mut pet = self.pets.load(user_id).await?;
        if pet.is_dead && state.mode != SessionMode::Revival {
            return Err(CoreError::PetDead.into());
        }

        let entry = state
            .current_entry()
            .cloned()
            .ok_or(CoreError::NoActiveSession)?;
        let item = self.catalog.get_item(entry.level, &entry.content_id)?;
        let verdict = match request.is_correct {
            Some(is_correct) => SpeechVerdict {
                score: request
                    .score
                    .map(|score| score.min(100))
                    .unwrap_or(if is_correct { 100 } else { 0 }),
                transcript: request.transcript,
                is_correct,
            },
            None => {
                self.speech
                    .evaluate(request.transcript.as_bytes(), &item.text)
                    .await?
            }
        };
        let now = self.clock.now();

        self.store
            .log_attempt(&Attempt {
                session_id: state.session_id,
                user_id,
                level: entry.level,
                content_id: entry.content_id.clone(),
                expected_text: item.display_text().to_string(),
                transcript: verdict.transcript.clone(),
                score: verdict.score,
                is_first_try: state.current_attempts == 0,
                is_correct: verdict.is_correct,
                created_at: now,
            })
            .await?;

        if verdict.is_correct {
            self.progress
                .record_correct(user_id, entry.level, &entry.content_id, now)
                .await?;
        } else {
            self.progress
                .record_wrong(user_id, entry.level, &entry.content_id, now)
                .await?;
        }
        self.record_daily(user_id, verdict.is_correct).await?;

        let step = state.record_attempt(verdict.is_correct, self.settings.max_attempts)?;
        if state.mode == SessionMode::Normal
            && state.pass_reward_checkpoints(&self.settings.care_gates)
        {
            tracing::info!(
                "Session {} passed reward checkpoint {} ({} correct)",
                state.session_id,
                state.reward_stage,
                state.correct_count
            );
        }

        let simulation = self.pets.simulation();
        match state.mode {
            SessionMode::Revival => {
                simulation.record_revival_progress(&mut pet, state.item_index as u32)
            }
            _ if verdict.is_correct => simulation.apply_correct_answer(&mut pet, state.correct_count),
            _ => simulation.apply_wrong_answer(&mut pet, state.wrong_total),
        }

        if state.care_gate_due(&self.settings.care_gates) {
            let prompt = {
                let mut rng = self.lock_rng()?;
                simulation.care_prompt(&pet, &mut *rng)
            };
            if let Some(prompt) = prompt {
                tracing::info!(
                    "Session {} reached care gate {} ({})",
                    state.session_id,
                    state.care_stage + 1,
                    prompt.need_state
                );
                state.open_care_gate(prompt);
            }
        }

        tracing::debug!(
            "User {} answered {}: correct={} step={:?}",
            user_id,
            entry.content_id,
            verdict.is_correct,
            step
        );
        if matches!(step, AttemptStep::StreakReset) {
            tracing::info!("Revival streak of user {} broken", user_id);
        }

        self.store.save_session(&state).await?;
        let summary = if state.ready_to_finish() {
            Some(self.finalize(state.clone(), &mut pet).await?)
        } else {
            self.pets.save(&pet).await?;
            None
        };
        let task = match summary {
            Some(_) => None,
            None => Some(self.task_view(&state).await?),
        };

        Ok(AttemptOutcome::Recorded {
            is_correct: verdict.is_correct,
            score: verdict.score,
            step,
            task,
            summary,
        })
    }

    /// Apply the learner's care choice at an open gate.
    pub async fn choose_care(&self, user_id: i64, action: &str) -> Result<CareOutcome> {
        let action = CareAction::parse(action.trim()).ok_or_else(|| {
            CoreError::InvalidCareChoice {
                action: action.to_string(),
            }
        })?;
        let mut state = self
            .store
            .get_session(user_id)
            .await?
            .ok_or(CoreError::NoActiveSession)?;

        let prompt = state.close_care_gate(action)?;
        let chosen = action.need();

        let mut pet = self.pets.load(user_id).await?;
        self.pets
            .simulation()
            .apply_care_choice(&mut pet, chosen, prompt.active_need);
        tracing::info!(
            "User {} chose {} for {} (session {})",
            user_id,
            action.as_str(),
            prompt.active_need.as_str(),
            state.session_id
        );

        self.store.save_session(&state).await?;
        let (task, summary) = if state.ready_to_finish() {
            (None, Some(self.finalize(state, &mut pet).await?))
        } else {
            self.pets.save(&pet).await?;
            (Some(self.task_view(&state).await?), None)
        };

        Ok(CareOutcome {
            chosen,
            matched: chosen == prompt.active_need,
            pet: self.pets.view(pet),
            task,
            summary,
        })
    }

    /// Finalize the session if its deck is done.
    pub async fn finish_if_needed(&self, user_id: i64) -> Result<FinishOutcome> {
        let Some(state) = self.store.get_session(user_id).await? else {
            return Ok(FinishOutcome::AlreadyFinished);
        };
        if !state.ready_to_finish() {
            return Ok(FinishOutcome::InProgress);
        }
        let mut pet = self.pets.load(user_id).await?;
        Ok(self.finalize(state, &mut pet).await?.outcome)
    }

    /// Close a finished session: level result, history status, state removal
    /// and the mode-specific pet side effect. Saves the pet.
    async fn finalize(&self, state: SessionState, pet: &mut PetStatus) -> Result<SessionSummary> {
        let now = self.clock.now();
        let attempts = self.store.attempts_for_session(state.session_id).await?;
        let total = state.total_items as u32;
        let correct = (attempts.iter().filter(|a| a.is_correct).count() as u32).min(total);
        let all_correct = correct == total && attempts.iter().all(|a| a.is_correct);
        let status = if all_correct {
            SessionStatus::Passed
        } else {
            SessionStatus::Done
        };

        if state.mode == SessionMode::Normal {
            let best = self
                .store
                .record_level_result(state.user_id, state.level, correct)
                .await?;
            tracing::debug!("Best result on level {} is now {}", state.level, best);
        }
        self.store
            .update_session_status(state.session_id, status, Some(now))
            .await?;
        self.store.delete_session(state.user_id).await?;

        let simulation = self.pets.simulation();
        let outcome = match state.finalization(self.settings.bonus_wrong_limit) {
            Finalization::Rewarded { .. } => FinishOutcome::Rewarded {
                bonus: simulation.on_session_completed(pet, state.wrong_total),
            },
            Finalization::Revived => {
                simulation.revive(pet);
                tracing::info!("Pet of user {} revived", state.user_id);
                FinishOutcome::Revived
            }
            Finalization::FreecareDone => FinishOutcome::FreecareDone,
        };
        self.pets.save(pet).await?;

        let advanced_level = match state.mode {
            SessionMode::Normal => {
                let snapshot = self.progress.snapshot(state.user_id).await?;
                next_level(&self.catalog, &snapshot, state.level)
            }
            _ => None,
        };

        tracing::info!(
            "Session {} of user {} finished: {}/{} correct ({})",
            state.session_id,
            state.user_id,
            correct,
            total,
            status.as_str()
        );

        Ok(SessionSummary {
            session_id: state.session_id,
            mode: state.mode,
            level: state.level,
            correct,
            total,
            status,
            outcome,
            advanced_level,
        })
    }

    /// Abandon the active session without rewards.
    pub async fn stop(&self, user_id: i64) -> Result<SessionControlResponse> {
        let Some(state) = self.store.get_session(user_id).await? else {
            return Ok(SessionControlResponse {
                session_id: None,
                status: "no_active_session".to_string(),
            });
        };
        self.abandon(&state).await?;
        tracing::info!("User {} stopped session {}", user_id, state.session_id);
        Ok(SessionControlResponse {
            session_id: Some(state.session_id),
            status: SessionStatus::Abandoned.as_str().to_string(),
        })
    }

    /// Deadline reached: refuse further answers until unblocked.
    pub async fn block(&self, user_id: i64) -> Result<SessionControlResponse> {
        self.set_blocked(user_id, true).await
    }

    pub async fn unblock(&self, user_id: i64) -> Result<SessionControlResponse> {
        self.set_blocked(user_id, false).await
    }

    async fn set_blocked(&self, user_id: i64, blocked: bool) -> Result<SessionControlResponse> {
        let mut state = self
            .store
            .get_session(user_id)
            .await?
            .ok_or(CoreError::NoActiveSession)?;
        let status = if blocked {
            state.block();
            SessionStatus::Blocked
        } else {
            state.unblock();
            SessionStatus::Active
        };
        self.store.save_session(&state).await?;
        self.store
            .update_session_status(state.session_id, status, None)
            .await?;
        Ok(SessionControlResponse {
            session_id: Some(state.session_id),
            status: status.as_str().to_string(),
        })
    }

    /// The task in progress.
    pub async fn current(&self, user_id: i64) -> Result<TaskView> {
        let state = self
            .store
            .get_session(user_id)
            .await?
            .ok_or(CoreError::NoActiveSession)?;
        self.task_view(&state).await
    }

    async fn task_view(&self, state: &SessionState) -> Result<TaskView> {
        let item = match state.current_entry() {
            Some(entry) => {
                let content = self.catalog.get_item(entry.level, &entry.content_id)?;
                let audio_path = match &content.sound {
                    Some(sound) => Some(sound.clone()),
                    None => match self.audio.ensure_audio(content.display_text()).await {
                        Ok(path) => Some(path.display().to_string()),
                        Err(e) => {
                            tracing::debug!("No audio for {}: {}", entry.content_id, e);
                            None
                        }
                    },
                };
                Some(TaskItem {
                    level: entry.level,
                    content_id: entry.content_id.clone(),
                    text: content.display_text().to_string(),
                    image: content.image.clone(),
                    audio_path,
                })
            }
            None => None,
        };

        Ok(TaskView {
            session_id: state.session_id,
            mode: state.mode,
            phase: state.phase(),
            level: state.level,
            item_index: state.item_index,
            total_items: state.total_items,
            correct_count: state.correct_count,
            wrong_total: state.wrong_total,
            item,
            care_prompt: state.care_prompt.clone(),
        })
    }

    async fn create_session(
        &self,
        user_id: i64,
        level: u32,
        deck: Vec<DeckEntry>,
        mode: SessionMode,
        now: DateTime<Utc>,
    ) -> Result<SessionState> {
        let session_id = self
            .store
            .create_session_record(user_id, level, mode, now)
            .await?;
        let state = SessionState::new(session_id, user_id, level, deck, mode);
        self.store.save_session(&state).await?;
        tracing::info!(
            "Started {} session {} for user {} on level {} ({} items)",
            mode.as_str(),
            session_id,
            user_id,
            level,
            state.total_items
        );
        Ok(state)
    }

    async fn abandon(&self, state: &SessionState) -> Result<()> {
        self.store
            .update_session_status(state.session_id, SessionStatus::Abandoned, Some(self.clock.now()))
            .await?;
        self.store.delete_session(state.user_id).await
    }

    async fn profile(&self, user_id: i64) -> Result<UserProfile> {
        Ok(self
            .store
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| UserProfile::new(user_id)))
    }

    async fn record_daily(&self, user_id: i64, is_correct: bool) -> Result<()> {
        let day = self.pets.today();
        let mut stats = self
            .store
            .get_daily_stats(user_id, day)
            .await?
            .unwrap_or_else(|| DailyStats::new(user_id, day));
        stats.record(is_correct);
        self.store.save_daily_stats(&stats).await
    }

    fn study_day_bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let hour = self.settings.daily_reset_hour;
        let day = reader_core::study_day(now, hour);
        let start = day
            .and_hms_opt(hour, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(now);
        (start, start + Duration::days(1))
    }

    fn lock_rng(&self) -> Result<std::sync::MutexGuard<'_, rand::rngs::StdRng>> {
        self.rng
            .lock()
            .map_err(|_| ApiError::Internal("random source poisoned".to_string()))
    }
}

/// First higher level with unfinished items, once `level` has none left.
fn next_level(catalog: &Catalog, snapshot: &ProgressSnapshot, level: u32) -> Option<u32> {
    let unfinished = |l: u32| {
        catalog
            .items_or_empty(l)
            .iter()
            .any(|item| !snapshot.is_finished(l, &item.id))
    };
    if unfinished(level) {
        return None;
    }
    catalog
        .list_levels()
        .into_iter()
        .filter(|l| *l > level)
        .find(|l| unfinished(*l))
}
