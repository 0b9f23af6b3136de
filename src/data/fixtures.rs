//! Synthetic event files for tests.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use arrow::array::{ArrayRef, Float32Array, Float64Array, Int32Array};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

use crate::data::parquet::TABLE_METADATA_KEY;

pub const LEPTON_FIELDS:   [&str; 6] = ["pt", "eta", "phi", "energy", "charge", "type"];
pub const JET_FIELDS:      [&str; 5] = ["pt", "eta", "phi", "energy", "is_tagged"];
pub const NEUTRINO_FIELDS: [&str; 4] = ["PDGID", "pt", "eta", "phi"];

/// One event in (pt, eta, phi, E) coordinates.
#[derive(Debug, Clone)]
pub struct FixtureEvent {
    pub nbjets:    i32,
    /// (MET, phi)
    pub met:       [f32; 2],
    pub leptons:   [[f32; 6]; 2],
    /// Real jets only; slots past these are written as zeros.
    pub jets:      Vec<[f32; 5]>,
    pub neutrinos: [[f32; 4]; 2],
}

impl Default for FixtureEvent {
    /// Antilepton stored first so ordering by charge has work to do.
    fn default() -> Self {
        Self {
            nbjets:  1,
            met:     [50.0, 0.0],
            leptons: [
                [30.0, 0.5, 1.0, 40.0, 1.0, 11.0],
                [20.0, -0.5, -1.0, 25.0, -1.0, 13.0],
            ],
            jets: vec![
                [60.0, 1.0, 0.3, 95.0, 1.0],
                [45.0, -1.2, 2.0, 82.0, 0.0],
            ],
            neutrinos: [
                [12.0, 25.0, 0.1, 0.4],
                [-12.0, 35.0, -0.3, 2.5],
            ],
        }
    }
}

impl FixtureEvent {
    /// Distinct lepton momenta so events can be told apart.
    pub fn with_lepton_pt(mut self, pt: f32) -> Self {
        self.leptons[0][0] = pt;
        self
    }
}

fn f32_column(values: impl Iterator<Item = f32>) -> ArrayRef {
    Arc::new(Float32Array::from(values.collect::<Vec<_>>()))
}

/// Write `events` in the columnar layout with `n_jet_slots` padded jet slots.
pub fn write_events(path: &Path, events: &[FixtureEvent], n_jet_slots: usize) -> Result<()> {
    let mut columns: Vec<(String, ArrayRef)> = vec![
        (
            "njets".into(),
            Arc::new(Int32Array::from(events.iter().map(|e| e.jets.len() as i32).collect::<Vec<_>>())),
        ),
        (
            "nbjets".into(),
            Arc::new(Int32Array::from(events.iter().map(|e| e.nbjets).collect::<Vec<_>>())),
        ),
        ("MET.MET".into(), f32_column(events.iter().map(|e| e.met[0]))),
        ("MET.phi".into(), f32_column(events.iter().map(|e| e.met[1]))),
    ];

    for slot in 0..2 {
        for (f, name) in LEPTON_FIELDS.iter().enumerate() {
            columns.push((
                format!("leptons.{slot}.{name}"),
                f32_column(events.iter().map(|e| e.leptons[slot][f])),
            ));
        }
    }

    for slot in 0..n_jet_slots {
        for (f, name) in JET_FIELDS.iter().enumerate() {
            let values: Vec<f64> = events
                .iter()
                .map(|e| e.jets.get(slot).map(|j| j[f] as f64).unwrap_or(0.0))
                .collect();
            columns.push((format!("jets.{slot}.{name}"), Arc::new(Float64Array::from(values))));
        }
    }

    for slot in 0..2 {
        for (f, name) in NEUTRINO_FIELDS.iter().enumerate() {
            let col: ArrayRef = if f == 0 {
                Arc::new(Int32Array::from(
                    events.iter().map(|e| e.neutrinos[slot][f] as i32).collect::<Vec<_>>(),
                ))
            } else {
                f32_column(events.iter().map(|e| e.neutrinos[slot][f]))
            };
            columns.push((format!("neutrinos.{slot}.{name}"), col));
        }
    }

    let batch = RecordBatch::try_from_iter(columns)?;
    let props = WriterProperties::builder()
        .set_key_value_metadata(Some(vec![KeyValue::new(
            TABLE_METADATA_KEY.to_string(),
            "delphes".to_string(),
        )]))
        .build();

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
