// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to its
// use case in Layer 2:
//
//   1. `inspect` — smoke test a single event file
//   2. `dims`    — model dimensions for a config
//   3. `export`  — write predictor outputs for the test set

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, DimsArgs, ExportArgs, InspectArgs};

use crate::application::export_use_case::{ExportConfig, ExportUseCase};
use crate::application::inspect_use_case::InspectUseCase;
use crate::data::datamodule::H5DataModule;
use crate::infra::config_store::load_config;
use crate::ml::predictor::TruthPredictor;

/// Backend the command line runs batches on.
type CliBackend = burn::backend::NdArray;

#[derive(Parser, Debug)]
#[command(
    name = "dilepton-data",
    version = "0.1.0",
    about = "Load dilepton events into tensors for neutrino regression."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Inspect(args) => run_inspect(args),
            Commands::Dims(args)    => run_dims(args),
            Commands::Export(args)  => run_export(args),
        }
    }
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    tracing::info!("Inspecting '{}'", args.data_file.display());

    let report = InspectUseCase::new(args.into()).execute::<CliBackend>(&Default::default())?;

    println!("{} training / {} validation events", report.n_train, report.n_valid);
    println!("{}", serde_json::to_string_pretty(&report.kwargs)?);
    match report.first_batch {
        Some(batch) => println!("{batch:?}"),
        None        => println!("No batches."),
    }
    Ok(())
}

fn run_dims(args: DimsArgs) -> Result<()> {
    let datamodule = H5DataModule::new(load_config(&args.config)?)?;
    println!("{}", serde_json::to_string_pretty(&datamodule.model_kwargs()?)?);
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<()> {
    let config = ExportConfig {
        datamodule:        load_config(&args.config)?,
        batch_size:        args.batch_size,
        samples_per_event: args.samples_per_event,
        output_dir:        args.output_dir,
        format:            args.format.into(),
    };

    let path = ExportUseCase::new(config)
        .execute::<CliBackend, _>(&TruthPredictor, &Default::default())?;
    println!("Outputs written to {}", path.display());
    Ok(())
}
