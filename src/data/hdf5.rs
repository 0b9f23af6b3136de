// ============================================================
// Layer 4 — HDF5 Event Reader (feature `hdf5`)
// ============================================================
// Reads the record tables written by the event generation step:
//
//   <table>/njets       int   [N]
//   <table>/nbjets      int   [N]
//   <table>/MET         {MET, phi}                                  [N]
//   <table>/leptons     {pt, eta, phi, energy, charge, type}        [N, 2]
//   <table>/jets        {pt, eta, phi, energy, is_tagged}           [N, J]
//   <table>/neutrinos   {PDGID, pt, eta, phi}                       [N, 2]
//
// HDF5 converts compound members by name, so every member above
// must be present in the file; integer members (charge, type,
// is_tagged, PDGID) are converted to f32 on read. Field order in
// the resulting blocks is the order listed here.

use std::path::Path;

use anyhow::{Context, Result};
use ::hdf5::{Dataset, File, H5Type};

use crate::domain::event::ObjectBlock;
use crate::domain::traits::{EventSource, RawTable};

const MET_FIELDS:      [&str; 2] = ["MET", "phi"];
const LEPTON_FIELDS:   [&str; 6] = ["pt", "eta", "phi", "energy", "charge", "type"];
const JET_FIELDS:      [&str; 5] = ["pt", "eta", "phi", "energy", "is_tagged"];
const NEUTRINO_FIELDS: [&str; 4] = ["PDGID", "pt", "eta", "phi"];

#[derive(H5Type, Clone, Copy, Debug, Default)]
#[repr(C)]
struct MetRecord {
    #[hdf5(rename = "MET")]
    met: f32,
    phi: f32,
}

#[derive(H5Type, Clone, Copy, Debug, Default)]
#[repr(C)]
struct LeptonRecord {
    pt:     f32,
    eta:    f32,
    phi:    f32,
    energy: f32,
    charge: f32,
    #[hdf5(rename = "type")]
    kind:   f32,
}

#[derive(H5Type, Clone, Copy, Debug, Default)]
#[repr(C)]
struct JetRecord {
    pt:        f32,
    eta:       f32,
    phi:       f32,
    energy:    f32,
    is_tagged: f32,
}

#[derive(H5Type, Clone, Copy, Debug, Default)]
#[repr(C)]
struct NeutrinoRecord {
    #[hdf5(rename = "PDGID")]
    pdgid: f32,
    pt:    f32,
    eta:   f32,
    phi:   f32,
}

fn names(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|s| s.to_string()).collect()
}

/// Reads event tables from `.h5` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hdf5Source;

fn read_counter(ds: &Dataset, n: usize) -> Result<Vec<f32>> {
    let values = ds.read_1d::<i64>()?;
    Ok(values.iter().take(n).map(|&v| v as f32).collect())
}

fn read_objects<T, F>(
    ds:     &Dataset,
    name:   &str,
    fields: &[&str],
    n:      usize,
    flatten: F,
) -> Result<ObjectBlock>
where
    T: H5Type + Copy,
    F: Fn(&T) -> Vec<f32>,
{
    let shape = ds.shape();
    let (records, n_objects): (Vec<T>, usize) = match shape.len() {
        1 => (ds.read_1d::<T>()?.iter().take(n).copied().collect(), 1),
        2 => {
            let arr = ds.read_2d::<T>()?;
            let n_objects = arr.ncols();
            (arr.iter().take(n * n_objects).copied().collect(), n_objects)
        }
        d => anyhow::bail!("'{name}' has {d} dimensions, expected 1 or 2"),
    };

    let values = records.iter().flat_map(|r| flatten(r)).collect();
    Ok(ObjectBlock::new(name, names(fields), n_objects, values)?)
}

impl EventSource for Hdf5Source {
    fn read_table(&self, path: &Path, table: &str, n_per_file: Option<usize>) -> Result<RawTable> {
        let file = File::open(path)
            .with_context(|| format!("Cannot open '{}'", path.display()))?;
        let group = file
            .group(table)
            .with_context(|| format!("'{}' has no table '{table}'", path.display()))?;

        let dataset = |name: &str| {
            group
                .dataset(name)
                .with_context(|| format!("table '{table}' has no dataset '{name}'"))
        };

        let n_total = dataset("MET")?.shape().first().copied().unwrap_or(0);
        let n = n_per_file.map_or(n_total, |cap| cap.min(n_total));

        let met = read_objects::<MetRecord, _>(
            &dataset("MET")?, "MET", &MET_FIELDS, n,
            |r| vec![r.met, r.phi],
        )?;
        let leptons = read_objects::<LeptonRecord, _>(
            &dataset("leptons")?, "leptons", &LEPTON_FIELDS, n,
            |r| vec![r.pt, r.eta, r.phi, r.energy, r.charge, r.kind],
        )?;
        let jets = read_objects::<JetRecord, _>(
            &dataset("jets")?, "jets", &JET_FIELDS, n,
            |r| vec![r.pt, r.eta, r.phi, r.energy, r.is_tagged],
        )?;
        let neutrinos = read_objects::<NeutrinoRecord, _>(
            &dataset("neutrinos")?, "neutrinos", &NEUTRINO_FIELDS, n,
            |r| vec![r.pdgid, r.pt, r.eta, r.phi],
        )?;

        let table = RawTable {
            njets:  read_counter(&dataset("njets")?, n)?,
            nbjets: read_counter(&dataset("nbjets")?, n)?,
            met,
            leptons,
            jets,
            neutrinos,
        };

        tracing::debug!(
            events = table.n_events(),
            path = %path.display(),
            "Read event table"
        );
        Ok(table)
    }
}
