//! Canned-response selection
//!
//! Every component that speaks from a pool of phrasings picks through a
//! [`Picker`], so a configured seed makes the whole assistant reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Mutex;

pub struct Picker {
    rng: Mutex<StdRng>,
}

impl Picker {
    /// Seeded when `seed` is set, entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Uniformly choose one entry. Empty pools yield an empty string.
    pub fn pick<'a>(&self, pool: &[&'a str]) -> &'a str {
        let mut rng = self.rng.lock().unwrap();
        pool.choose(&mut *rng).copied().unwrap_or_default()
    }

    /// Uniformly choose one owned entry.
    pub fn pick_owned(&self, pool: &[String]) -> String {
        let mut rng = self.rng.lock().unwrap();
        pool.choose(&mut *rng).cloned().unwrap_or_default()
    }
}

impl std::fmt::Debug for Picker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Picker").finish_non_exhaustive()
    }
}
