//! The only source of randomness used by sampling and shuffling. Everything
//! takes the generator as a parameter so callers can seed it.
use rand::{Rng, seq::SliceRandom};

/// Uniform Fisher-Yates shuffle.
pub fn shuffle_in_place<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    items.shuffle(rng);
}

/// Picks `count` distinct indices in `0..len`, uniformly, without replacement.
/// Returns every index (in random order) when `count >= len`.
pub fn draw_indices<R: Rng + ?Sized>(len: usize, count: usize, rng: &mut R) -> Vec<usize> {
    let amount = count.min(len);
    if amount == 0 {
        return vec![];
    }
    rand::seq::index::sample(rng, len, amount).into_vec()
}

/// Version 4 UUID built from the supplied generator.
pub fn uuid<R: Rng + ?Sized>(rng: &mut R) -> uuid::Uuid {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}
