// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from event files on disk to tensor batches.
//
//   .parquet / .h5 files
//       │
//       ▼
//   EventSource       → reads one file into a RawTable
//       │
//       ▼
//   H5Dataset         → concatenates files, masks padded jets,
//       │               orders leptons, converts coordinates
//       ▼
//   DileptonBatcher   → stacks samples into tensor batches
//       │
//       ▼
//   H5DataModule      → per-stage datasets and Burn DataLoaders

/// File format detection and reader dispatch
pub mod source;

/// Columnar Parquet event files
pub mod parquet;

/// Native HDF5 event files
#[cfg(feature = "hdf5")]
pub mod hdf5;

/// Implements Burn's Dataset trait for dilepton events
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;

/// Stage-aware datasets and loaders
pub mod datamodule;

#[cfg(test)]
pub(crate) mod fixtures;
