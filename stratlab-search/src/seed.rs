//! Deterministic seed derivation.
//!
//! A master seed is expanded into per-(label, index) sub-seeds via BLAKE3
//! hashing. Because derivation is hash-based rather than order-dependent,
//! the same master seed produces identical sub-seeds regardless of which
//! worker asks first or how many threads are running.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Hash-based sub-seed derivation from a single master seed.
#[derive(Debug, Clone)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a deterministic sub-seed for `(label, index)`.
    pub fn sub_seed(&self, label: &str, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(label.as_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap())
    }

    /// A seeded `StdRng` for `(label, index)`.
    pub fn rng_for(&self, label: &str, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(label, index))
    }
}
