// ============================================================
// Layer 4 — Dilepton Data Module
// ============================================================
// Owns the dataset configs for every stage and hands out Burn
// DataLoaders.
//
// What is a data module?
//   A model needs different data at different points of an
//   experiment: train + validation while fitting, the test set
//   when evaluating or exporting predictions. The data module
//   keeps one config per stage and only loads what a stage asks
//   for.
//
// Lifecycle:
//   new()    → builds a two-events-per-file "miniset" from the
//              test config so model dimensions are known before
//              any full dataset is loaded
//   setup()  → fit/validate: train + validation sets
//              test/predict: test set
//   *_dataloader() → batched iteration over a stage's set
//
// Validation split:
//   When no validation files are configured, `val_frac` of the
//   training events is held out with a split seeded by
//   `loader_conf.seed`, so repeated runs hold out the same events.
//
// Dropping the last batch:
//   Burn's DataLoaderBuilder has no drop_last flag, so the
//   training set is wrapped in a PartialDataset cut to a
//   multiple of the batch size.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §16 (Arc and shared ownership)

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::data::dataset::transform::PartialDataset;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::batcher::{DileptonBatch, DileptonBatcher};
use crate::data::dataset::{DatasetConfig, H5Dataset};
use crate::data::splitter::split_train_val_seeded;
use crate::domain::event::EventSample;

const MINISET_EVENTS_PER_FILE: usize = 2;

/// A shareable loader of batches on backend `B`.
pub type EventLoader<B> = Arc<dyn DataLoader<DileptonBatch<B>>>;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Batching options shared by every loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size:  usize,
    /// 0 loads batches on the calling thread
    #[serde(default)]
    pub num_workers: usize,
    /// Drop the last incomplete training batch
    #[serde(default)]
    pub drop_last:   bool,
    /// Shuffle seed for the training loader and the validation split
    #[serde(default = "default_seed")]
    pub seed:        u64,
}

fn default_batch_size() -> usize {
    64
}

fn default_seed() -> u64 {
    42
}

fn default_val_frac() -> f64 {
    0.1
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size:  default_batch_size(),
            num_workers: 0,
            drop_last:   false,
            seed:        default_seed(),
        }
    }
}

/// Everything the data module needs, as stored in the JSON config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataModuleConfig {
    pub train_conf:  DatasetConfig,
    /// Separate validation files; `None` splits the training set
    #[serde(default)]
    pub valid_conf:  Option<DatasetConfig>,
    pub test_conf:   DatasetConfig,
    #[serde(default)]
    pub loader_conf: LoaderConfig,
    /// Fraction of training events held out when `valid_conf` is absent
    #[serde(default = "default_val_frac")]
    pub val_frac:    f64,
}

impl DataModuleConfig {
    /// Use the same files for every stage.
    pub fn single(conf: DatasetConfig, loader_conf: LoaderConfig) -> Self {
        Self {
            train_conf:  conf.clone(),
            valid_conf:  Some(conf.clone()),
            test_conf:   conf,
            loader_conf,
            val_frac:    default_val_frac(),
        }
    }
}

/// Which part of the experiment the data is needed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Training with validation
    Fit,
    /// Validation only
    Validate,
    /// Evaluation on the test set
    Test,
    /// Predictions over the test set
    Predict,
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fit"      => Ok(Stage::Fit),
            "validate" => Ok(Stage::Validate),
            "test"     => Ok(Stage::Test),
            "predict"  => Ok(Stage::Predict),
            other      => bail!("unknown stage '{other}'"),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fit      => "fit",
            Stage::Validate => "validate",
            Stage::Test     => "test",
            Stage::Predict  => "predict",
        };
        f.write_str(name)
    }
}

/// Input and target sizes a model is constructed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelKwargs {
    /// Last-axis size of misc, met, leptons and jets
    pub input_dimensions:  BTreeMap<String, usize>,
    /// Last-axis size of neutrino and antineutrino
    pub target_dimensions: BTreeMap<String, usize>,
}

// ─── H5DataModule ─────────────────────────────────────────────────────────────

/// Per-stage datasets and their loaders.
///
/// Datasets are held in `Arc`s: a Burn DataLoader owns its dataset,
/// and several loaders may be built from the same set.
pub struct H5DataModule {
    config:    DataModuleConfig,
    /// Two events per test file, only used to infer dimensions
    miniset:   H5Dataset,
    /// Filled by setup(Fit | Validate)
    train_set: Option<Arc<H5Dataset>>,
    valid_set: Option<Arc<H5Dataset>>,
    /// Filled by setup(Test | Predict)
    test_set:  Option<Arc<H5Dataset>>,
}

impl H5DataModule {
    /// Build the module and its dimension-inference miniset.
    pub fn new(config: DataModuleConfig) -> Result<Self> {
        let mini_conf = config
            .test_conf
            .clone()
            .with_n_per_file(Some(MINISET_EVENTS_PER_FILE));
        let miniset = H5Dataset::new(&mini_conf).context("Cannot build the miniset")?;

        Ok(Self { config, miniset, train_set: None, valid_set: None, test_set: None })
    }

    pub fn config(&self) -> &DataModuleConfig {
        &self.config
    }

    pub fn loader_config_mut(&mut self) -> &mut LoaderConfig {
        &mut self.config.loader_conf
    }

    /// Load the datasets a stage needs.
    pub fn setup(&mut self, stage: Stage) -> Result<()> {
        tracing::info!("Setting up data for stage '{stage}'");
        match stage {
            Stage::Fit | Stage::Validate => {
                let (train, valid) = match &self.config.valid_conf {
                    Some(valid_conf) => (
                        H5Dataset::new(&self.config.train_conf)?,
                        H5Dataset::new(valid_conf)?,
                    ),
                    None => self.split_training()?,
                };
                tracing::info!("{} training / {} validation events", train.len(), valid.len());
                self.train_set = Some(Arc::new(train));
                self.valid_set = Some(Arc::new(valid));
            }
            Stage::Test | Stage::Predict => {
                let test = H5Dataset::new(&self.config.test_conf)?;
                tracing::info!("{} test events", test.len());
                self.test_set = Some(Arc::new(test));
            }
        }
        Ok(())
    }

    /// Hold out `val_frac` of the training events.
    fn split_training(&self) -> Result<(H5Dataset, H5Dataset)> {
        let full    = H5Dataset::new(&self.config.train_conf)?;
        let indices = (0..full.len()).collect::<Vec<_>>();
        let (mut train_idx, mut valid_idx) = split_train_val_seeded(
            indices,
            1.0 - self.config.val_frac,
            self.config.loader_conf.seed,
        );
        // Keep file order inside each partition.
        train_idx.sort_unstable();
        valid_idx.sort_unstable();
        Ok((full.subset(&train_idx)?, full.subset(&valid_idx)?))
    }

    pub fn n_train_samples(&self) -> Option<usize> {
        self.train_set.as_ref().map(|d| d.len())
    }

    pub fn n_valid_samples(&self) -> Option<usize> {
        self.valid_set.as_ref().map(|d| d.len())
    }

    pub fn n_test_samples(&self) -> Option<usize> {
        self.test_set.as_ref().map(|d| d.len())
    }

    pub fn input_dimensions(&self) -> Result<BTreeMap<String, usize>> {
        Ok(self.miniset.input_dims()?)
    }

    pub fn target_dimensions(&self) -> Result<BTreeMap<String, usize>> {
        Ok(self.miniset.target_dims()?)
    }

    pub fn model_kwargs(&self) -> Result<ModelKwargs> {
        Ok(ModelKwargs {
            input_dimensions:  self.input_dimensions()?,
            target_dimensions: self.target_dimensions()?,
        })
    }

    // ─── Loaders ──────────────────────────────────────────────────────────────

    /// Shuffled with `loader_conf.seed`; honours `drop_last`.
    pub fn train_dataloader<B: Backend>(&self, device: &B::Device) -> Result<EventLoader<B>> {
        let set = self.train_set.clone().context("setup(Stage::Fit) must run before train_dataloader")?;
        Ok(self.build_loader(set, device, true, self.config.loader_conf.drop_last))
    }

    /// Unshuffled.
    pub fn val_dataloader<B: Backend>(&self, device: &B::Device) -> Result<EventLoader<B>> {
        let set = self.valid_set.clone().context("setup(Stage::Fit) must run before val_dataloader")?;
        Ok(self.build_loader(set, device, false, self.config.loader_conf.drop_last))
    }

    /// Never drops the last batch: every test event gets a prediction.
    pub fn test_dataloader<B: Backend>(&self, device: &B::Device) -> Result<EventLoader<B>> {
        let set = self.test_set.clone().context("setup(Stage::Test) must run before test_dataloader")?;
        Ok(self.build_loader(set, device, false, false))
    }

    /// Same events and order as the test loader.
    pub fn predict_dataloader<B: Backend>(&self, device: &B::Device) -> Result<EventLoader<B>> {
        self.test_dataloader(device)
    }

    fn build_loader<B: Backend>(
        &self,
        set:       Arc<H5Dataset>,
        device:    &B::Device,
        shuffle:   bool,
        drop_last: bool,
    ) -> EventLoader<B> {
        let cfg     = &self.config.loader_conf;
        let batcher = DileptonBatcher::<B>::new(device.clone());

        let mut builder = DataLoaderBuilder::new(batcher).batch_size(cfg.batch_size);
        if shuffle {
            builder = builder.shuffle(cfg.seed);
        }
        if cfg.num_workers > 0 {
            builder = builder.num_workers(cfg.num_workers);
        }

        if drop_last {
            let keep = set.len() - set.len() % cfg.batch_size.max(1);
            builder.build(PartialDataset::<_, EventSample>::new(set, 0, keep))
        } else {
            builder.build(set)
        }
    }
}
