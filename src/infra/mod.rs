// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting file handling that doesn't belong to any one
// business layer:
//
//   config_store.rs  — Reads the JSON data module config and
//                      saves the resolved config next to the
//                      outputs of a run.
//
//   output_writer.rs — Writes combined per-event outputs to
//                      Parquet (default) or HDF5 (feature
//                      `hdf5`).

/// Data module config loading and saving
pub mod config_store;

/// Parquet / HDF5 output files
pub mod output_writer;
