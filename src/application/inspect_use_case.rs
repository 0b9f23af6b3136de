// ============================================================
// Layer 2 — InspectUseCase
// ============================================================
// Smoke test for a single event file:
//
//   Step 1: Check the file exists and is a regular file
//   Step 2: Use it for every stage with the default kinematics
//   Step 3: Build the data module and set up the fit stage
//   Step 4: Pull the first training batch

use std::path::PathBuf;

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::data::batcher::DileptonBatch;
use crate::data::datamodule::{DataModuleConfig, H5DataModule, LoaderConfig, ModelKwargs, Stage};
use crate::data::dataset::DatasetConfig;
use crate::domain::error::DataError;

#[derive(Debug, Clone)]
pub struct InspectConfig {
    pub data_file:   PathBuf,
    pub batch_size:  usize,
    pub num_workers: usize,
}

/// What the inspection found.
#[derive(Debug)]
pub struct InspectReport<B: Backend> {
    pub n_train:     usize,
    pub n_valid:     usize,
    pub kwargs:      ModelKwargs,
    pub first_batch: Option<DileptonBatch<B>>,
}

pub struct InspectUseCase {
    config: InspectConfig,
}

impl InspectUseCase {
    pub fn new(config: InspectConfig) -> Self {
        Self { config }
    }

    /// Train, validation and test all read the one file.
    pub fn datamodule_config(&self) -> Result<DataModuleConfig> {
        let file = &self.config.data_file;
        if !file.exists() {
            return Err(DataError::MissingFile(file.clone()).into());
        }
        if !file.is_file() {
            bail!("Data file {} is not a file.", file.display());
        }

        let data_dir = file
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let loader = LoaderConfig {
            batch_size:  self.config.batch_size,
            num_workers: self.config.num_workers,
            ..LoaderConfig::default()
        };
        Ok(DataModuleConfig::single(DatasetConfig::new(data_dir, vec![file_name]), loader))
    }

    pub fn execute<B: Backend>(&self, device: &B::Device) -> Result<InspectReport<B>> {
        let mut datamodule = H5DataModule::new(self.datamodule_config()?)?;
        datamodule.setup(Stage::Fit)?;

        let loader      = datamodule.train_dataloader::<B>(device)?;
        let first_batch = loader.iter().next();

        Ok(InspectReport {
            n_train: datamodule.n_train_samples().unwrap_or(0),
            n_valid: datamodule.n_valid_samples().unwrap_or(0),
            kwargs:  datamodule.model_kwargs()?,
            first_batch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{write_events, FixtureEvent};

    type TestBackend = burn::backend::NdArray;

    fn config(data_file: PathBuf) -> InspectConfig {
        InspectConfig { data_file, batch_size: 4, num_workers: 0 }
    }

    #[test]
    fn test_inspect_reads_first_batch() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.parquet");
        write_events(&path, &vec![FixtureEvent::default(); 6], 3).unwrap();

        let report = InspectUseCase::new(config(path))
            .execute::<TestBackend>(&Default::default())
            .unwrap();

        assert_eq!(report.n_train, 6);
        assert_eq!(report.n_valid, 6);
        assert_eq!(report.kwargs.input_dimensions["leptons"], 4);
        let batch = report.first_batch.unwrap();
        assert_eq!(batch.jets.dims(), [4, 3, 4]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = InspectUseCase::new(config(dir.path().join("none.parquet")))
            .datamodule_config()
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<DataError>(), Some(DataError::MissingFile(_))));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = InspectUseCase::new(config(dir.path().to_path_buf()))
            .datamodule_config()
            .unwrap_err();
        assert!(err.to_string().contains("is not a file"));
    }
}
