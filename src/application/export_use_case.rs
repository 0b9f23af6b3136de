// ============================================================
// Layer 2 — ExportUseCase
// ============================================================
// Runs a predictor over the test set and saves its outputs:
//
//   Step 1: Build the data module (optionally overriding batch size)
//   Step 2: Set up the predict stage
//   Step 3: Predict every batch of the predict loader
//   Step 4: Concatenate the per-batch outputs along the event axis
//   Step 5: Write <output_dir>/test-<samples_per_event>.<ext>
//   Step 6: Save the resolved config next to the outputs

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::data::datamodule::{DataModuleConfig, H5DataModule, Stage};
use crate::data::source::FileFormat;
use crate::infra::config_store::ConfigStore;
use crate::infra::output_writer::{write_outputs, OutputArray};
use crate::ml::predictor::{Prediction, Predictor};

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub datamodule:        DataModuleConfig,
    /// Replaces `loader_conf.batch_size` when set
    pub batch_size:        Option<usize>,
    pub samples_per_event: usize,
    pub output_dir:        PathBuf,
    pub format:            FileFormat,
}

impl ExportConfig {
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("test-{}.{}", self.samples_per_event, self.format.extension()))
    }
}

pub struct ExportUseCase {
    config: ExportConfig,
}

impl ExportUseCase {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Returns the path of the written output file.
    pub fn execute<B: Backend, P: Predictor<B>>(
        &self,
        predictor: &P,
        device:    &B::Device,
    ) -> Result<PathBuf> {
        let cfg = &self.config;

        // Step 1
        let mut datamodule = H5DataModule::new(cfg.datamodule.clone())?;
        if let Some(batch_size) = cfg.batch_size {
            datamodule.loader_config_mut().batch_size = batch_size;
        }

        // Step 2
        datamodule.setup(Stage::Predict)?;
        let loader = datamodule.predict_dataloader::<B>(device)?;

        // Step 3
        tracing::info!(
            "Predicting {} events with {} samples per event",
            datamodule.n_test_samples().unwrap_or(0),
            cfg.samples_per_event
        );
        let mut outputs = Vec::new();
        for batch in loader.iter() {
            outputs.push(predictor.predict(&batch, cfg.samples_per_event)?);
        }

        // Step 4
        let combined = combine_outputs(outputs)?;

        // Step 5
        let store = ConfigStore::new(&cfg.output_dir)?;
        let path  = cfg.output_path();
        write_outputs(&path, &combined)?;
        tracing::info!("Saved outputs to '{}'", path.display());

        // Step 6
        store.save(datamodule.config())?;
        Ok(path)
    }
}

/// Concatenate per-batch predictions along the first axis.
///
/// Scalars become `[1, 1]` and rank-1 outputs `[n, 1]`. Every batch must
/// produce the same keys with the same trailing shape.
pub fn combine_outputs(outputs: Vec<Prediction>) -> Result<BTreeMap<String, OutputArray>> {
    let Some(first) = outputs.first() else {
        bail!("No predictions to combine");
    };

    let mut combined: BTreeMap<String, OutputArray> = first
        .iter()
        .map(|(key, data)| {
            let (_, trailing) = split_rows(&data.shape);
            let mut shape = vec![0];
            shape.extend(trailing);
            (key.clone(), OutputArray { shape, values: Vec::new() })
        })
        .collect();

    for (i, prediction) in outputs.into_iter().enumerate() {
        if prediction.len() != combined.len() || prediction.keys().any(|k| !combined.contains_key(k)) {
            bail!("Batch {i} produced a different set of outputs");
        }
        for (key, data) in prediction {
            let Some(out) = combined.get_mut(&key) else {
                continue;
            };
            let (rows, trailing) = split_rows(&data.shape);
            if trailing[..] != out.shape[1..] {
                bail!(
                    "Output '{key}' of batch {i} has trailing shape {trailing:?}, expected {:?}",
                    &out.shape[1..]
                );
            }
            let values = data
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("Cannot read output '{key}': {e:?}"))?;
            out.values.extend(values);
            out.shape[0] += rows;
        }
    }
    Ok(combined)
}

/// (rows, trailing shape) of one batch output, stacked as at least 2-D.
fn split_rows(shape: &[usize]) -> (usize, Vec<usize>) {
    match shape {
        []                => (1, vec![1]),
        [rows]            => (*rows, vec![1]),
        [rows, rest @ ..] => (*rows, rest.to_vec()),
    }
}
