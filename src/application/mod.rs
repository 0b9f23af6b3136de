// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal.
//
// Rules for this layer:
//   - No physics or tensor code here
//   - No argument parsing or printing (that's Layer 1)
//   - Only workflow coordination

// Load one file through the data module and pull a first batch
pub mod inspect_use_case;

// Run a predictor over the test set and write its outputs
pub mod export_use_case;
