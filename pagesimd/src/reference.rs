//! Reference string generation
//!
//! Each workload gets a page count `mi` drawn from `[1, m]` and a reference
//! string of `2·mi` to `10·mi` entries. When `m > mi`, every entry has a fixed
//! chance of being an out-of-range page in `[mi, m)`; otherwise all entries
//! are legal pages in `[0, mi)`.

use crate::config::SimConfig;
use core_types::ReferenceString;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Draws reference strings for a configuration
pub struct ReferenceGenerator {
    rng: StdRng,
    address_space: u32,
    illegal_probability: f64,
}

impl ReferenceGenerator {
    /// Creates a generator, seeded from `config.seed` when present
    ///
    /// `config` must have passed [`SimConfig::validate`], which keeps
    /// `10 * m` well inside `u32`.
    pub fn new(config: &SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            address_space: config.address_space,
            illegal_probability: config.illegal_probability,
        }
    }

    /// Generates one workload's reference string
    pub fn generate(&mut self) -> ReferenceString {
        let m = self.address_space;
        let mi = self.rng.gen_range(1..=m);
        let len = self.rng.gen_range(2 * mi..=10 * mi);

        let pages = (0..len)
            .map(|_| {
                if m > mi && self.rng.gen_bool(self.illegal_probability) {
                    self.rng.gen_range(mi..m)
                } else {
                    self.rng.gen_range(0..mi)
                }
            })
            .collect();

        ReferenceString::new(mi, pages)
    }

    /// Generates `count` reference strings, one per workload
    pub fn generate_all(&mut self, count: u32) -> Vec<ReferenceString> {
        (0..count).map(|_| self.generate()).collect()
    }
}
