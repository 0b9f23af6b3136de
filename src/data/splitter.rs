// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Carves a validation set out of the training events when no
// separate validation files are configured.
//
// The events are shuffled first: files are usually concatenated
// by process or run, and an unshuffled tail would give a
// validation set from a single file.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Shuffle `samples` with `rng` and split them into (train, validation).
///
/// `train_fraction` is clamped to `[0, 1]`; the split point is rounded.
pub fn split_with_rng<T, R: Rng + ?Sized>(
    mut samples:    Vec<T>,
    train_fraction: f64,
    rng:            &mut R,
) -> (Vec<T>, Vec<T>) {
    samples.shuffle(rng);

    let total    = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = (((total as f64) * fraction).round() as usize).min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len()     * 100) / total.max(1),
    );

    (samples, val)
}

/// Randomly shuffle `samples` and split into (train, validation).
pub fn split_train_val<T>(samples: Vec<T>, train_fraction: f64) -> (Vec<T>, Vec<T>) {
    split_with_rng(samples, train_fraction, &mut rand::thread_rng())
}

/// Reproducible split: the same seed always gives the same partition.
pub fn split_train_val_seeded<T>(samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    split_with_rng(samples, train_fraction, &mut StdRng::seed_from_u64(seed))
}
