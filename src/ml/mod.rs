// ============================================================
// Layer 5 — ML Layer (Burn)
// ============================================================
// The network that regresses neutrino momenta lives outside this
// crate. This layer only defines the seam a model plugs into:
//
//   predictor.rs — the Predictor trait a model implements to turn
//                  a DileptonBatch into named output tensors, plus
//                  TruthPredictor, which echoes the targets so the
//                  export pipeline can run without a model

/// Prediction seam between batches and exported outputs
pub mod predictor;
