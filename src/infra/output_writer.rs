// ============================================================
// Layer 6 — Output Writer
// ============================================================
// Writes combined per-event outputs (one array per key, events
// along the first axis) to disk.
//
//   .parquet → one row per event, columns `<key>.<j>` over the
//              flattened trailing dimensions; the full shape of
//              each key is stored as `shape.<key>` metadata
//   .h5      → one dataset per key with its full shape
//              (feature `hdf5`)

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float32Array};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

use crate::data::source::FileFormat;

/// A dense f32 array with events along the first axis.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputArray {
    pub shape:  Vec<usize>,
    pub values: Vec<f32>,
}

impl OutputArray {
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Number of values per event.
    pub fn row_width(&self) -> usize {
        self.shape.iter().skip(1).product()
    }
}

/// Write `outputs` to `path`, picking the format from the extension.
pub fn write_outputs(path: &Path, outputs: &BTreeMap<String, OutputArray>) -> Result<()> {
    match FileFormat::from_path(path)? {
        FileFormat::Parquet => write_parquet(path, outputs),
        FileFormat::Hdf5    => write_hdf5(path, outputs),
    }
}

fn write_parquet(path: &Path, outputs: &BTreeMap<String, OutputArray>) -> Result<()> {
    let rows = outputs.values().next().map_or(0, OutputArray::rows);

    let mut columns:  Vec<(String, ArrayRef)> = Vec::new();
    let mut metadata: Vec<KeyValue> = Vec::new();
    for (key, arr) in outputs {
        if arr.rows() != rows {
            bail!("'{key}' has {} rows, expected {rows}", arr.rows());
        }
        let width = arr.row_width();
        for j in 0..width {
            let col: Vec<f32> = (0..rows).map(|r| arr.values[r * width + j]).collect();
            columns.push((format!("{key}.{j}"), Arc::new(Float32Array::from(col)) as ArrayRef));
        }
        metadata.push(KeyValue::new(format!("shape.{key}"), serde_json::to_string(&arr.shape)?));
    }

    let batch = RecordBatch::try_from_iter(columns)?;
    let props = WriterProperties::builder()
        .set_key_value_metadata(Some(metadata))
        .build();

    let file = File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

#[cfg(feature = "hdf5")]
fn write_hdf5(path: &Path, outputs: &BTreeMap<String, OutputArray>) -> Result<()> {
    let file = ::hdf5::File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    for (key, arr) in outputs {
        file.new_dataset::<f32>()
            .shape(arr.shape.clone())
            .create(key.as_str())?
            .write_raw(arr.values.as_slice())?;
    }
    Ok(())
}

#[cfg(not(feature = "hdf5"))]
fn write_hdf5(path: &Path, _outputs: &BTreeMap<String, OutputArray>) -> Result<()> {
    bail!("cannot write '{}': built without the `hdf5` feature", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    #[test]
    fn test_row_width_flattens_trailing_dims() {
        let arr = OutputArray { shape: vec![4, 2, 3], values: vec![0.0; 24] };
        assert_eq!(arr.rows(), 4);
        assert_eq!(arr.row_width(), 6);
    }

    #[test]
    fn test_parquet_columns_and_shape_metadata() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-1.parquet");
        let outputs = BTreeMap::from([
            ("njets".to_string(), OutputArray { shape: vec![2, 1], values: vec![3.0, 4.0] }),
            (
                "neutrino".to_string(),
                OutputArray { shape: vec![2, 3], values: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0] },
            ),
        ]);
        write_outputs(&path, &outputs).unwrap();

        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap()).unwrap();
        let kv = builder.metadata().file_metadata().key_value_metadata().unwrap().clone();
        let shape = kv.iter().find(|k| k.key == "shape.neutrino").unwrap();
        assert_eq!(shape.value.as_deref(), Some("[2,3]"));

        let batch = builder.build().unwrap().next().unwrap().unwrap();
        assert_eq!(batch.num_rows(), 2);
        let col = batch
            .column_by_name("neutrino.2")
            .unwrap()
            .as_any()
            .downcast_ref::<Float32Array>()
            .unwrap()
            .values()
            .to_vec();
        assert_eq!(col, vec![3.0, 6.0]);
    }

    #[test]
    fn test_row_count_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = BTreeMap::from([
            ("a".to_string(), OutputArray { shape: vec![2, 1], values: vec![0.0; 2] }),
            ("b".to_string(), OutputArray { shape: vec![3, 1], values: vec![0.0; 3] }),
        ]);
        assert!(write_outputs(&dir.path().join("x.parquet"), &outputs).is_err());
    }
}

#[cfg(all(test, feature = "hdf5"))]
mod hdf5_tests {
    use super::*;

    #[test]
    fn test_h5_datasets_keep_full_shape() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-1.h5");
        let outputs = BTreeMap::from([
            ("njets".to_string(), OutputArray { shape: vec![2, 1], values: vec![3.0, 4.0] }),
            (
                "jets".to_string(),
                OutputArray { shape: vec![2, 2, 3], values: (0..12).map(|v| v as f32).collect() },
            ),
        ]);
        write_outputs(&path, &outputs).unwrap();

        let file = ::hdf5::File::open(&path).unwrap();
        for (key, arr) in &outputs {
            let ds = file.dataset(key).unwrap();
            assert_eq!(ds.shape(), arr.shape);
            assert_eq!(ds.read_raw::<f32>().unwrap(), arr.values);
        }
    }
}
