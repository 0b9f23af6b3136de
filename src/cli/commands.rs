// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `inspect`, `dims` and `export`
// and all their configurable flags.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::application::inspect_use_case::InspectConfig;
use crate::data::source::FileFormat;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load one event file and print its dimensions and first batch
    Inspect(InspectArgs),

    /// Print the model input/target dimensions for a data module config
    Dims(DimsArgs),

    /// Run the truth predictor over the test set and write its outputs
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Event file (.parquet, or .h5 with the `hdf5` feature)
    pub data_file: PathBuf,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Loader worker threads
    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,
}

impl From<InspectArgs> for InspectConfig {
    fn from(a: InspectArgs) -> Self {
        InspectConfig {
            data_file:   a.data_file,
            batch_size:  a.batch_size,
            num_workers: a.num_workers,
        }
    }
}

#[derive(Args, Debug)]
pub struct DimsArgs {
    /// JSON data module config
    #[arg(long)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// JSON data module config
    #[arg(long)]
    pub config: PathBuf,

    /// Overrides the loader batch size from the config
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Candidates drawn per event by generative predictors
    #[arg(long, default_value_t = 1)]
    pub samples_per_event: usize,

    #[arg(long, default_value = "outputs")]
    pub output_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Parquet)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Parquet,
    H5,
}

impl From<OutputFormat> for FileFormat {
    fn from(f: OutputFormat) -> Self {
        match f {
            OutputFormat::Parquet => FileFormat::Parquet,
            OutputFormat::H5      => FileFormat::Hdf5,
        }
    }
}
