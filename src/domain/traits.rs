// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The dataset only needs "give me the event table of this file".
// Each on-disk format implements `EventSource`:
//   - ParquetSource → flat columnar files
//   - Hdf5Source    → h5 record tables (feature `hdf5`)
//
// The dataset layer only sees the trait.

use std::path::Path;

use anyhow::Result;

use crate::domain::event::ObjectBlock;

/// Everything read from one file's event table, before any reshaping.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub njets:     Vec<f32>,
    pub nbjets:    Vec<f32>,
    /// One object per event.
    pub met:       ObjectBlock,
    pub leptons:   ObjectBlock,
    /// Fixed number of slots per event, zero padded.
    pub jets:      ObjectBlock,
    pub neutrinos: ObjectBlock,
}

impl RawTable {
    pub fn n_events(&self) -> usize {
        self.met.n_events
    }
}

// ─── EventSource ──────────────────────────────────────────────────────────────
/// Any component that can read a dilepton event table from a file.
pub trait EventSource {
    /// Read `table` from `path`, keeping at most `n_per_file` events
    /// (all of them when `None`).
    fn read_table(&self, path: &Path, table: &str, n_per_file: Option<usize>) -> Result<RawTable>;
}
