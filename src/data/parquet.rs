// ============================================================
// Layer 4 — Parquet Event Reader
// ============================================================
// Columnar layout, one row per event:
//
//   njets, nbjets                 per-event counters
//   MET.<field>                   single-object block
//   leptons.<slot>.<field>        multi-object blocks
//   jets.<slot>.<field>           (jets are zero padded)
//   neutrinos.<slot>.<field>
//
// Field order inside a block follows the order the columns first
// appear in the schema, the same way record field names come out
// of an h5 compound type. Any integer or float column type is
// accepted and cast to f32. Unrelated columns are ignored.
//
// If the file carries a `table` key in its key-value metadata it
// must match the requested table name.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, Float32Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Schema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::domain::error::DataError;
use crate::domain::event::ObjectBlock;
use crate::domain::traits::{EventSource, RawTable};

pub const MET_BLOCK:      &str = "MET";
pub const LEPTON_BLOCK:   &str = "leptons";
pub const JET_BLOCK:      &str = "jets";
pub const NEUTRINO_BLOCK: &str = "neutrinos";
pub const TABLE_METADATA_KEY: &str = "table";

/// Reads event tables from `.parquet` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetSource;

/// Which schema columns make up one object block.
#[derive(Debug, Default)]
struct BlockLayout {
    fields:  Vec<String>,
    /// (slot, field index) → schema column index
    columns: BTreeMap<(usize, usize), usize>,
}

impl BlockLayout {
    fn insert(&mut self, slot: usize, field: &str, column: usize) {
        let f = match self.fields.iter().position(|x| x == field) {
            Some(f) => f,
            None => {
                self.fields.push(field.to_string());
                self.fields.len() - 1
            }
        };
        self.columns.insert((slot, f), column);
    }

    fn n_objects(&self) -> usize {
        self.columns.keys().map(|(slot, _)| slot + 1).max().unwrap_or(0)
    }

    /// Every (slot, field) pair must be present.
    fn check_complete(&self, block: &str) -> Result<(), DataError> {
        for slot in 0..self.n_objects() {
            for (f, field) in self.fields.iter().enumerate() {
                if !self.columns.contains_key(&(slot, f)) {
                    return Err(DataError::ShapeMismatch {
                        block:  block.to_string(),
                        detail: format!("column for slot {slot} field '{field}' is missing"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Split a column name into (block, slot, field).
fn parse_column(name: &str) -> Option<(&str, usize, &str)> {
    let parts: Vec<&str> = name.split('.').collect();
    match parts.as_slice() {
        [block, field] => Some((*block, 0, *field)),
        [block, slot, field] => slot.parse().ok().map(|s| (*block, s, *field)),
        _ => None,
    }
}

fn layouts_from_schema(schema: &Schema) -> BTreeMap<String, BlockLayout> {
    let mut layouts: BTreeMap<String, BlockLayout> = BTreeMap::new();
    for (idx, field) in schema.fields().iter().enumerate() {
        match parse_column(field.name()) {
            Some((block, slot, name)) => {
                layouts.entry(block.to_string()).or_default().insert(slot, name, idx);
            }
            None => {
                tracing::trace!("Ignoring column '{}'", field.name());
            }
        }
    }
    layouts
}

fn column_index(schema: &Schema, name: &str) -> Result<usize, DataError> {
    schema.index_of(name).map_err(|_| DataError::MissingField {
        block: "event".into(),
        field: name.to_string(),
    })
}

impl EventSource for ParquetSource {
    fn read_table(&self, path: &Path, table: &str, n_per_file: Option<usize>) -> Result<RawTable> {
        let file = File::open(path)
            .with_context(|| format!("Cannot open '{}'", path.display()))?;
        let mut builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("Cannot read parquet metadata of '{}'", path.display()))?;

        let stored_table = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .and_then(|kv| kv.iter().find(|k| k.key == TABLE_METADATA_KEY))
            .and_then(|k| k.value.clone());
        if let Some(stored) = stored_table {
            if stored != table {
                bail!("'{}' holds table '{stored}', not '{table}'", path.display());
            }
        }

        let schema  = builder.schema().clone();
        let layouts = layouts_from_schema(&schema);

        let mut wanted = vec![column_index(&schema, "njets")?, column_index(&schema, "nbjets")?];
        for block in [MET_BLOCK, LEPTON_BLOCK, JET_BLOCK, NEUTRINO_BLOCK] {
            let layout = layouts.get(block).ok_or_else(|| DataError::MissingField {
                block: block.to_string(),
                field: "*".into(),
            })?;
            layout.check_complete(block)?;
            wanted.extend(layout.columns.values().copied());
        }

        if let Some(n) = n_per_file {
            builder = builder.with_limit(n);
        }
        let reader = builder.build()?;

        // Decode only the columns a block or counter refers to.
        let mut columns: BTreeMap<usize, Vec<f32>> = wanted.iter().map(|&c| (c, Vec::new())).collect();
        for batch in reader {
            let batch = batch?;
            for (&idx, out) in columns.iter_mut() {
                let name = schema.field(idx).name();
                let cast_col = cast(batch.column(idx), &DataType::Float32)
                    .with_context(|| format!("Column '{name}' is not numeric"))?;
                let values = cast_col
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .with_context(|| format!("Column '{name}' did not cast to f32"))?;
                out.extend(values.iter().map(|v| v.unwrap_or(0.0)));
            }
        }

        let take = |idx: usize| columns.get(&idx).cloned().unwrap_or_default();
        let n_events = take(wanted[0]).len();

        let assemble = |block: &str| -> Result<ObjectBlock> {
            let layout    = &layouts[block];
            let n_objects = layout.n_objects();
            let n_fields  = layout.fields.len();
            let mut values = vec![0.0f32; n_events * n_objects * n_fields];
            for (&(slot, f), col) in &layout.columns {
                let data = &columns[col];
                for (e, v) in data.iter().enumerate() {
                    values[(e * n_objects + slot) * n_fields + f] = *v;
                }
            }
            Ok(ObjectBlock::new(block, layout.fields.clone(), n_objects, values)?)
        };

        let table = RawTable {
            njets:     take(wanted[0]),
            nbjets:    take(wanted[1]),
            met:       assemble(MET_BLOCK)?,
            leptons:   assemble(LEPTON_BLOCK)?,
            jets:      assemble(JET_BLOCK)?,
            neutrinos: assemble(NEUTRINO_BLOCK)?,
        };

        tracing::debug!(
            events = table.n_events(),
            path = %path.display(),
            "Read event table"
        );
        Ok(table)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{write_events, FixtureEvent};

    #[test]
    fn test_parse_column_names() {
        assert_eq!(parse_column("MET.phi"), Some(("MET", 0, "phi")));
        assert_eq!(parse_column("jets.3.pt"), Some(("jets", 3, "pt")));
        assert_eq!(parse_column("jets.x.pt"), None);
        assert_eq!(parse_column("njets"), None);
    }

    #[test]
    fn test_reads_blocks_in_schema_order() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.parquet");
        write_events(&path, &[FixtureEvent::default(), FixtureEvent::default()], 3).unwrap();

        let table = ParquetSource.read_table(&path, "delphes", None).unwrap();
        assert_eq!(table.n_events(), 2);
        assert_eq!(table.met.fields, vec!["MET", "phi"]);
        assert_eq!(table.leptons.fields, vec!["pt", "eta", "phi", "energy", "charge", "type"]);
        assert_eq!(table.leptons.n_objects, 2);
        assert_eq!(table.jets.n_objects, 3);
        assert_eq!(table.neutrinos.fields, vec!["PDGID", "pt", "eta", "phi"]);
        assert_eq!(table.njets, vec![2.0, 2.0]);
    }

    #[test]
    fn test_limit_caps_events() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.parquet");
        let events = vec![FixtureEvent::default(); 5];
        write_events(&path, &events, 2).unwrap();

        let table = ParquetSource.read_table(&path, "delphes", Some(3)).unwrap();
        assert_eq!(table.n_events(), 3);
        assert_eq!(table.jets.n_events, 3);
    }

    #[test]
    fn test_wrong_table_name_fails() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.parquet");
        write_events(&path, &[FixtureEvent::default()], 2).unwrap();

        assert!(ParquetSource.read_table(&path, "other", None).is_err());
    }
}
