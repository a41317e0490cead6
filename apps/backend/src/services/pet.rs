//! Pet persistence, day rollover and pet type selection.

use std::sync::Arc;

use chrono::NaiveDate;
use reader_core::{Clock, CoreError, PetSimulation, PetStatus, PracticeSettings};

use crate::db::Store;
use crate::error::Result;
use crate::models::{PetView, UserProfile};

#[derive(Clone)]
pub struct PetService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    simulation: PetSimulation,
    pet_types: Vec<String>,
    daily_reset_hour: u32,
}

impl PetService {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        settings: &PracticeSettings,
        pet_types: Vec<String>,
    ) -> Self {
        Self {
            store,
            clock,
            simulation: PetSimulation::new(settings),
            pet_types,
            daily_reset_hour: settings.daily_reset_hour,
        }
    }

    pub fn simulation(&self) -> &PetSimulation {
        &self.simulation
    }

    /// Current study day.
    pub fn today(&self) -> NaiveDate {
        self.clock.study_day(self.daily_reset_hour)
    }

    fn default_pet_type(&self) -> &str {
        self.pet_types.first().map(String::as_str).unwrap_or("panda")
    }

    /// Load the user's pet, creating it on first use and settling any study
    /// days that passed since it was last seen.
    pub async fn load(&self, user_id: i64) -> Result<PetStatus> {
        let today = self.today();

        let Some(mut pet) = self.store.get_pet(user_id).await? else {
            let profile = self.store.get_profile(user_id).await?;
            let pet_type = profile
                .and_then(|p| p.pet_type)
                .unwrap_or_else(|| self.default_pet_type().to_string());
            let pet = PetStatus::new(user_id, pet_type, today);
            self.store.save_pet(&pet).await?;
            tracing::info!("Created {} pet for user {}", pet.pet_type, user_id);
            return Ok(pet);
        };

        let report = self.simulation.rollover(&mut pet, today);
        if report.days > 0 {
            self.store.save_pet(&pet).await?;
            if report.died {
                tracing::warn!(
                    "Pet of user {} died after {} missed days",
                    user_id,
                    report.missed_days
                );
            }
        }
        Ok(pet)
    }

    pub async fn save(&self, pet: &PetStatus) -> Result<()> {
        self.store.save_pet(pet).await
    }

    pub fn view(&self, pet: PetStatus) -> PetView {
        PetView {
            state: self.simulation.pick_state(&pet),
            status_text: self.simulation.status_text(&pet),
            pet,
        }
    }

    /// Switch to another configured pet type. Needs carry over.
    pub async fn set_pet_type(&self, user_id: i64, pet_type: &str) -> Result<PetView> {
        let pet_type = pet_type.trim().to_lowercase();
        if !self.pet_types.contains(&pet_type) {
            return Err(CoreError::UnknownPetType(pet_type).into());
        }

        let mut profile = self
            .store
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| UserProfile::new(user_id));
        profile.pet_type = Some(pet_type.clone());
        self.store.save_profile(&profile).await?;

        let mut pet = self.load(user_id).await?;
        pet.pet_type = pet_type;
        self.store.save_pet(&pet).await?;
        tracing::info!("User {} switched pet to {}", user_id, pet.pet_type);

        Ok(self.view(pet))
    }
}
