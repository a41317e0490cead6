pub mod content;
pub mod pet;
pub mod practice;
pub mod progress;
pub mod speech;

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Random source shared by deck building and care prompts.
pub type SharedRng = Arc<Mutex<StdRng>>;

/// Seeded when `seed` is given, otherwise from OS entropy.
pub fn shared_rng(seed: Option<u64>) -> SharedRng {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Arc::new(Mutex::new(rng))
}
