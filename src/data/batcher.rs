// ============================================================
// Layer 4 — Dilepton Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<EventSample>
// into tensors with the batch size as first dimension.
//
// What is a Batcher?
//   The DataLoader hands the batcher a list of individual
//   samples; the batcher turns them into one tensor per input
//   so the model sees N events at once.
//
// Output shapes (N = events in the batch):
//   misc          [N, 2]
//   met           [N, met_dim]
//   leptons       [N, 2, lep_dim]
//   jets          [N, jet_slots, jet_dim]
//   jet_mask      [N, jet_slots]      (Bool, true = real jet)
//   neutrino      [N, nu_dim]
//   antineutrino  [N, nu_dim]
//
// How batching works here:
//   Every sample of a dataset has the same shape (jets are padded
//   to a fixed number of slots when the dataset is built), so each
//   field is flattened into one long Vec and reshaped:
//   [e1_l1..., e1_l2..., e2_l1..., ...] → [N, 2, lep_dim]
//
// Reference: Burn Book §4 (Batcher)
//            Rust Book §8 (Vectors)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::event::EventSample;

// ─── DileptonBatch ────────────────────────────────────────────────────────────
/// A batch of events ready for the model forward pass.
/// All tensors have batch_size as their first dimension.
///
/// B is the Burn Backend (e.g. NdArray), generic so the same
/// batcher works on any device.
#[derive(Debug, Clone)]
pub struct DileptonBatch<B: Backend> {
    /// Jet and b-jet multiplicities: shape [batch_size, 2]
    pub misc:         Tensor<B, 2>,

    /// Missing transverse momentum: shape [batch_size, met_dim]
    pub met:          Tensor<B, 2>,

    /// Both leptons, particle first: shape [batch_size, 2, lep_dim]
    pub leptons:      Tensor<B, 3>,

    /// Fixed jet slots: shape [batch_size, jet_slots, jet_dim]
    /// Padded slots are all zeros
    pub jets:         Tensor<B, 3>,

    /// Which jet slots hold a real jet: shape [batch_size, jet_slots]
    pub jet_mask:     Tensor<B, 2, Bool>,

    /// Regression target for the neutrino: shape [batch_size, nu_dim]
    pub neutrino:     Tensor<B, 2>,

    /// Regression target for the antineutrino: shape [batch_size, nu_dim]
    pub antineutrino: Tensor<B, 2>,
}

impl<B: Backend> DileptonBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.met.dims()[0]
    }
}

// ─── DileptonBatcher ──────────────────────────────────────────────────────────
/// Holds the target device so tensors are created on the correct GPU/CPU.
#[derive(Clone, Debug)]
pub struct DileptonBatcher<B: Backend> {
    /// The device to create tensors on
    pub device: B::Device,
}

impl<B: Backend> DileptonBatcher<B> {
    /// Create a new batcher for the given device
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Stack equal-length rows into [rows, width].
    fn matrix(&self, rows: Vec<&[f32]>) -> Tensor<B, 2> {
        let n     = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let flat: Vec<f32> = rows.into_iter().flatten().copied().collect();
        Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device).reshape([n, width])
    }

    /// Stack per-event object lists into [events, objects, width].
    fn cube(&self, items: Vec<&Vec<Vec<f32>>>) -> Tensor<B, 3> {
        let n     = items.len();
        let slots = items.first().map_or(0, |s| s.len());
        let width = items
            .first()
            .and_then(|s| s.first())
            .map_or(0, |r| r.len());
        let flat: Vec<f32> = items
            .into_iter()
            .flat_map(|s| s.iter().flatten().copied())
            .collect();
        Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device).reshape([n, slots, width])
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// The DataLoader calls .batch(items) with each mini-batch of samples.
impl<B: Backend> Batcher<EventSample, DileptonBatch<B>> for DileptonBatcher<B> {
    /// Convert a Vec of EventSamples into a single DileptonBatch.
    ///
    /// Steps:
    ///   1. Flatten each input across the batch and reshape it
    ///   2. Build the jet mask as Int 0/1, then compare to 1 for Bool
    ///   3. Stack both regression targets the same way
    fn batch(&self, items: Vec<EventSample>) -> DileptonBatch<B> {
        let batch_size = items.len();
        let slots      = items.first().map_or(0, |s| s.inputs.jet_mask.len());

        let misc  = self.matrix(items.iter().map(|s| s.inputs.misc.as_slice()).collect());
        let met   = self.matrix(items.iter().map(|s| s.inputs.met.as_slice()).collect());
        let leptons = self.cube(items.iter().map(|s| &s.inputs.leptons).collect());
        let jets    = self.cube(items.iter().map(|s| &s.inputs.jets).collect());

        let mask_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.inputs.jet_mask.iter().map(|&m| m as i32))
            .collect();
        let jet_mask = Tensor::<B, 1, Int>::from_ints(mask_flat.as_slice(), &self.device)
            .reshape([batch_size, slots])
            .equal_elem(1);

        let neutrino     = self.matrix(items.iter().map(|s| s.targets.neutrino.as_slice()).collect());
        let antineutrino = self.matrix(items.iter().map(|s| s.targets.antineutrino.as_slice()).collect());

        DileptonBatch { misc, met, leptons, jets, jet_mask, neutrino, antineutrino }
    }
}
