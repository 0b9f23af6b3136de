use std::collections::BTreeMap;

use anyhow::Result;
use burn::prelude::*;
use burn::tensor::TensorData;

use crate::data::batcher::DileptonBatch;

/// Named output tensors for one batch, batch size first.
pub type Prediction = BTreeMap<String, TensorData>;

/// Anything that turns a batch of events into named outputs.
///
/// Generative models draw `samples_per_event` candidates per event;
/// deterministic ones may ignore it.
pub trait Predictor<B: Backend> {
    fn predict(&self, batch: &DileptonBatch<B>, samples_per_event: usize) -> Result<Prediction>;
}

/// Returns the truth targets, reconstructed MET and jet multiplicity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruthPredictor;

impl<B: Backend> Predictor<B> for TruthPredictor {
    fn predict(&self, batch: &DileptonBatch<B>, _samples_per_event: usize) -> Result<Prediction> {
        let n = batch.batch_size();
        // misc is [njets, nbjets]; keep njets as a per-event scalar
        let njets = batch.misc.clone().slice([0..n, 0..1]).flatten::<1>(0, 1);

        Ok(BTreeMap::from([
            ("neutrino".to_string(),     batch.neutrino.clone().into_data()),
            ("antineutrino".to_string(), batch.antineutrino.clone().into_data()),
            ("met".to_string(),          batch.met.clone().into_data()),
            ("njets".to_string(),        njets.into_data()),
        ]))
    }
}
