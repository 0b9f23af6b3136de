// ============================================================
// Layer 4 — H5Dataset
// ============================================================
// Loads dilepton event tables from one or more files and turns
// them into fixed-shape per-event samples:
//
//   files ──► RawTable per file ──► concatenated blocks
//       │
//       ▼
//   jet mask        (a jet slot is real if any field is non-zero)
//   neutrinos       (drop the pdg id, keep particle → antiparticle)
//   leptons         (reorder slots by charge: particle first)
//   coordinates     (pt, eta, phi, E) → requested kinematics
//   padding         (masked jet slots reset to zero)
//
// The result implements Burn's Dataset trait so a DataLoader can
// call .get(index) and .len() on it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::source::open_source;
use crate::domain::error::DataError;
use crate::domain::event::{EventInputs, EventSample, EventTargets, ObjectBlock};
use crate::domain::kinematics::{change_from_ptetaphie, KinematicList};
use crate::domain::traits::RawTable;

const PDG_ID_NAMES: &[&str] = &["PDGID", "pdgid", "pdg_id", "pdgId"];
const NEUTRINO_TARGET_FIELDS: usize = 3;

// ─── Dataset Configuration ────────────────────────────────────────────────────
/// Which files to load and which coordinates to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// File names, relative to `data_dir`
    pub file_list:  Vec<String>,
    pub data_dir:   String,
    /// Maximum number of events to load from each file
    #[serde(default)]
    pub n_per_file: Option<usize>,
    /// Name of the event table inside each file
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_met_kins")]
    pub met_kins:   KinematicList,
    #[serde(default = "default_momentum_kins")]
    pub lep_kins:   KinematicList,
    #[serde(default = "default_momentum_kins")]
    pub jet_kins:   KinematicList,
    /// Coordinates of the regression targets
    #[serde(default = "default_nu_kins")]
    pub nu_kins:    KinematicList,
}

fn default_table_name() -> String {
    "delphes".to_string()
}

fn default_met_kins() -> KinematicList {
    KinematicList::parse("px,py")
}

fn default_momentum_kins() -> KinematicList {
    KinematicList::parse("px,py,pz,log_energy")
}

fn default_nu_kins() -> KinematicList {
    KinematicList::parse("px,py,pz")
}

impl DatasetConfig {
    /// Config with the default table and kinematics.
    pub fn new(data_dir: impl Into<String>, file_list: Vec<String>) -> Self {
        Self {
            file_list,
            data_dir:   data_dir.into(),
            n_per_file: None,
            table_name: default_table_name(),
            met_kins:   default_met_kins(),
            lep_kins:   default_momentum_kins(),
            jet_kins:   default_momentum_kins(),
            nu_kins:    default_nu_kins(),
        }
    }

    pub fn with_n_per_file(mut self, n: Option<usize>) -> Self {
        self.n_per_file = n;
        self
    }

    /// Resolve every file against `data_dir`, failing on the first missing one.
    pub fn resolve_files(&self) -> Result<Vec<PathBuf>, DataError> {
        self.file_list
            .iter()
            .map(|f| {
                let file = Path::new(&self.data_dir).join(f);
                if file.exists() { Ok(file) } else { Err(DataError::MissingFile(file)) }
            })
            .collect()
    }
}

// ─── H5Dataset ────────────────────────────────────────────────────────────────
/// All events of a file list, reshaped and converted.
#[derive(Debug, Clone)]
pub struct H5Dataset {
    file_list: Vec<PathBuf>,
    /// `[N, 1, 2]` njets, nbjets
    misc:      ObjectBlock,
    met:       ObjectBlock,
    lep:       ObjectBlock,
    jet:       ObjectBlock,
    nu:        ObjectBlock,
    /// `[N * jet slots]`
    jet_mask:  Vec<bool>,
}

impl H5Dataset {
    /// Load and process every file in `cfg`.
    pub fn new(cfg: &DatasetConfig) -> Result<Self> {
        let file_list = cfg.resolve_files()?;

        match cfg.n_per_file {
            Some(n) => tracing::info!("loading {n} events from each file..."),
            None    => tracing::info!("loading all events from each file..."),
        }

        let mut tables = Vec::with_capacity(file_list.len());
        for file in &file_list {
            tracing::info!(
                "{}",
                file.file_name().and_then(|n| n.to_str()).unwrap_or("unknown")
            );
            let source = open_source(file)?;
            tables.push(source.read_table(file, &cfg.table_name, cfg.n_per_file)?);
        }

        let table = concat_tables(tables)?;
        tracing::info!("{} events loaded", table.n_events());

        let mut dataset = Self::from_table(table, cfg)?;
        dataset.file_list = file_list;
        Ok(dataset)
    }

    /// Process an already loaded table with the kinematics of `cfg`.
    pub fn from_table(table: RawTable, cfg: &DatasetConfig) -> Result<Self> {
        let RawTable { njets, nbjets, met, leptons, jets, neutrinos } = table;

        if njets.len() != met.n_events || nbjets.len() != met.n_events {
            return Err(DataError::ShapeMismatch {
                block:  "misc".into(),
                detail: format!(
                    "{} njets / {} nbjets for {} events",
                    njets.len(), nbjets.len(), met.n_events
                ),
            }
            .into());
        }
        for block in [&leptons, &jets, &neutrinos] {
            if block.n_events != met.n_events {
                return Err(DataError::ShapeMismatch {
                    block:  block.name.clone(),
                    detail: format!("{} events but MET has {}", block.n_events, met.n_events),
                }
                .into());
            }
        }

        let misc_values = njets.iter().zip(&nbjets).flat_map(|(&a, &b)| [a, b]).collect();
        let misc = ObjectBlock::new("misc", vec!["njets".into(), "nbjets".into()], 1, misc_values)?;

        // Padding has to be detected before coordinates are changed.
        let jet_mask = padding_mask(&jets);

        let nu  = neutrino_targets(&neutrinos)?;
        let lep = order_by_charge(leptons)?;

        tracing::info!("converting data to specified coordinates...");
        let met = change_from_ptetaphie(&met, &cfg.met_kins)?;
        let lep = change_from_ptetaphie(&lep, &cfg.lep_kins)?;
        let mut jet = change_from_ptetaphie(&jets, &cfg.jet_kins)?;
        let nu  = change_from_ptetaphie(&nu, &cfg.nu_kins)?;

        for e in 0..jet.n_events {
            for j in 0..jet.n_objects {
                if !jet_mask[e * jet.n_objects + j] {
                    jet.object_mut(e, j).fill(0.0);
                }
            }
        }

        Ok(Self { file_list: Vec::new(), misc, met, lep, jet, nu, jet_mask })
    }

    /// A new dataset holding only the listed events, in order.
    ///
    /// Fails if any index is past the end of the dataset.
    pub fn subset(&self, indices: &[usize]) -> Result<Self, DataError> {
        if let Some(&index) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(DataError::EventOutOfRange { index, n_events: self.len() });
        }

        let slots = self.jet.n_objects;
        let jet_mask = indices
            .iter()
            .flat_map(|&e| self.jet_mask[e * slots..(e + 1) * slots].iter().copied())
            .collect();

        Ok(Self {
            file_list: self.file_list.clone(),
            misc:      self.misc.gather(indices),
            met:       self.met.gather(indices),
            lep:       self.lep.gather(indices),
            jet:       self.jet.gather(indices),
            nu:        self.nu.gather(indices),
            jet_mask,
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.file_list
    }

    pub fn misc_vars(&self) -> &[String] {
        &self.misc.fields
    }

    pub fn met_vars(&self) -> &[String] {
        &self.met.fields
    }

    pub fn lep_vars(&self) -> &[String] {
        &self.lep.fields
    }

    pub fn jet_vars(&self) -> &[String] {
        &self.jet.fields
    }

    pub fn nu_vars(&self) -> &[String] {
        &self.nu.fields
    }

    pub fn n_jet_slots(&self) -> usize {
        self.jet.n_objects
    }

    /// Last-axis size of every input: misc, met, leptons, jets.
    pub fn input_dims(&self) -> Result<BTreeMap<String, usize>, DataError> {
        let sample = self.get(0).ok_or(DataError::EmptyDataset)?;
        let inputs = sample.inputs;
        let width = |rows: &[Vec<f32>], fallback: usize| rows.first().map_or(fallback, Vec::len);

        Ok(BTreeMap::from([
            ("misc".to_string(),    inputs.misc.len()),
            ("met".to_string(),     inputs.met.len()),
            ("leptons".to_string(), width(&inputs.leptons, self.lep.n_fields())),
            ("jets".to_string(),    width(&inputs.jets, self.jet.n_fields())),
        ]))
    }

    /// Last-axis size of every target: neutrino, antineutrino.
    pub fn target_dims(&self) -> Result<BTreeMap<String, usize>, DataError> {
        let targets = self.get(0).ok_or(DataError::EmptyDataset)?.targets;
        Ok(BTreeMap::from([
            ("neutrino".to_string(),     targets.neutrino.len()),
            ("antineutrino".to_string(), targets.antineutrino.len()),
        ]))
    }
}

impl Dataset<EventSample> for H5Dataset {
    fn get(&self, index: usize) -> Option<EventSample> {
        if index >= self.len() {
            return None;
        }

        let rows = |block: &ObjectBlock| -> Vec<Vec<f32>> {
            (0..block.n_objects).map(|o| block.object(index, o).to_vec()).collect()
        };
        let slots = self.jet.n_objects;

        let inputs = EventInputs {
            misc:     self.misc.event(index).to_vec(),
            met:      self.met.event(index).to_vec(),
            leptons:  rows(&self.lep),
            jets:     rows(&self.jet),
            jet_mask: self.jet_mask[index * slots..(index + 1) * slots].to_vec(),
        };
        let targets = EventTargets {
            neutrino:     self.nu.object(index, 0).to_vec(),
            antineutrino: self.nu.object(index, 1).to_vec(),
        };

        Some(EventSample { inputs, targets })
    }

    fn len(&self) -> usize {
        self.met.n_events
    }
}

// ─── Processing Steps ─────────────────────────────────────────────────────────

/// Stack the tables of several files into one.
fn concat_tables(tables: Vec<RawTable>) -> Result<RawTable, DataError> {
    let mut njets  = Vec::new();
    let mut nbjets = Vec::new();
    let mut met    = Vec::with_capacity(tables.len());
    let mut lep    = Vec::with_capacity(tables.len());
    let mut jet    = Vec::with_capacity(tables.len());
    let mut nu     = Vec::with_capacity(tables.len());

    for t in tables {
        njets.extend(t.njets);
        nbjets.extend(t.nbjets);
        met.push(t.met);
        lep.push(t.leptons);
        jet.push(t.jets);
        nu.push(t.neutrinos);
    }

    Ok(RawTable {
        njets,
        nbjets,
        met:       ObjectBlock::concat(met)?,
        leptons:   ObjectBlock::concat(lep)?,
        jets:      ObjectBlock::concat(jet)?,
        neutrinos: ObjectBlock::concat(nu)?,
    })
}

/// `true` where a jet slot holds a real jet (any non-zero field).
fn padding_mask(jets: &ObjectBlock) -> Vec<bool> {
    let width = jets.n_fields();
    if width == 0 {
        return vec![false; jets.n_events * jets.n_objects];
    }
    jets.values
        .chunks_exact(width)
        .map(|row| row.iter().any(|&v| v != 0.0))
        .collect()
}

/// Neutrinos are always stored particle → antiparticle, so the pdg id
/// carries no information: keep the three momentum fields after it.
fn neutrino_targets(nu: &ObjectBlock) -> Result<ObjectBlock, DataError> {
    if nu.n_objects != 2 {
        return Err(DataError::ShapeMismatch {
            block:  nu.name.clone(),
            detail: format!("expected 2 neutrinos per event, found {}", nu.n_objects),
        });
    }

    let keep: Vec<usize> = (0..nu.n_fields())
        .filter(|&i| !PDG_ID_NAMES.contains(&nu.fields[i].as_str()))
        .take(NEUTRINO_TARGET_FIELDS)
        .collect();
    if keep.len() < NEUTRINO_TARGET_FIELDS {
        return Err(DataError::ShapeMismatch {
            block:  nu.name.clone(),
            detail: format!("need {NEUTRINO_TARGET_FIELDS} momentum fields, found {:?}", nu.fields),
        });
    }

    nu.select_fields(&keep)
}

/// Reorder lepton slots by ascending charge so the particle comes first,
/// matching the neutrino ordering.
fn order_by_charge(mut lep: ObjectBlock) -> Result<ObjectBlock, DataError> {
    let charge = match lep.require_field("charge") {
        Ok(idx)      => idx,
        Err(missing) => lep.n_fields().checked_sub(2).ok_or(missing)?,
    };

    for e in 0..lep.n_events {
        let mut order: Vec<usize> = (0..lep.n_objects).collect();
        order.sort_by(|&a, &b| lep.get(e, a, charge).total_cmp(&lep.get(e, b, charge)));
        if order.iter().enumerate().any(|(slot, &src)| slot != src) {
            lep.reorder_objects(e, &order);
        }
    }
    Ok(lep)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{write_events, FixtureEvent};

    const EPS: f32 = 1e-4;

    fn write_file(dir: &Path, name: &str, events: &[FixtureEvent], slots: usize) -> String {
        write_events(&dir.join(name), events, slots).unwrap();
        name.to_string()
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DatasetConfig::new(dir.path().to_string_lossy(), vec!["nope.parquet".into()]);
        let err = H5Dataset::new(&cfg).unwrap_err();
        assert!(matches!(err.downcast_ref::<DataError>(), Some(DataError::MissingFile(_))));
    }

    #[test]
    fn test_loads_and_concatenates_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.parquet", &vec![FixtureEvent::default(); 3], 4);
        let b = write_file(dir.path(), "b.parquet", &vec![FixtureEvent::default(); 2], 4);

        let cfg = DatasetConfig::new(dir.path().to_string_lossy(), vec![a, b]);
        let ds  = H5Dataset::new(&cfg).unwrap();
        assert_eq!(ds.len(), 5);
        assert_eq!(ds.files().len(), 2);
        assert_eq!(ds.n_jet_slots(), 4);
    }

    #[test]
    fn test_n_per_file_caps_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.parquet", &vec![FixtureEvent::default(); 5], 2);
        let b = write_file(dir.path(), "b.parquet", &vec![FixtureEvent::default(); 5], 2);

        let cfg = DatasetConfig::new(dir.path().to_string_lossy(), vec![a, b]).with_n_per_file(Some(2));
        assert_eq!(H5Dataset::new(&cfg).unwrap().len(), 4);
    }

    #[test]
    fn test_mismatched_jet_slots_fail() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.parquet", &[FixtureEvent::default()], 2);
        let b = write_file(dir.path(), "b.parquet", &[FixtureEvent::default()], 3);

        let cfg = DatasetConfig::new(dir.path().to_string_lossy(), vec![a, b]);
        assert!(H5Dataset::new(&cfg).is_err());
    }

    #[test]
    fn test_leptons_ordered_particle_first() {
        let dir = tempfile::tempdir().unwrap();
        let f   = write_file(dir.path(), "a.parquet", &[FixtureEvent::default()], 3);

        let mut cfg = DatasetConfig::new(dir.path().to_string_lossy(), vec![f]);
        cfg.lep_kins = KinematicList::parse("pt,charge");
        let sample = H5Dataset::new(&cfg).unwrap().get(0).unwrap();

        // Stored order was (+1, -1)
        assert_eq!(sample.inputs.leptons[0], vec![20.0, -1.0]);
        assert_eq!(sample.inputs.leptons[1], vec![30.0, 1.0]);
    }

    #[test]
    fn test_jet_mask_and_zeroed_padding() {
        let dir = tempfile::tempdir().unwrap();
        let f   = write_file(dir.path(), "a.parquet", &[FixtureEvent::default()], 4);

        let cfg = DatasetConfig::new(dir.path().to_string_lossy(), vec![f]);
        let sample = H5Dataset::new(&cfg).unwrap().get(0).unwrap();

        assert_eq!(sample.inputs.jet_mask, vec![true, true, false, false]);
        assert_eq!(sample.inputs.jets.len(), 4);
        // log_energy of a zero jet would not be zero without the reset
        assert!(sample.inputs.jets[2].iter().all(|&v| v == 0.0));
        assert!((sample.inputs.jets[0][3] - 95.0f32.ln()).abs() < EPS);
    }

    #[test]
    fn test_targets_drop_pdgid() {
        let dir = tempfile::tempdir().unwrap();
        let f   = write_file(dir.path(), "a.parquet", &[FixtureEvent::default()], 2);

        let mut cfg = DatasetConfig::new(dir.path().to_string_lossy(), vec![f]);
        cfg.nu_kins = KinematicList::parse("pt,eta,phi");
        let ds = H5Dataset::new(&cfg).unwrap();
        let sample = ds.get(0).unwrap();

        assert_eq!(ds.nu_vars(), &["pt", "eta", "phi"]);
        assert_eq!(sample.targets.neutrino, vec![25.0, 0.1, 0.4]);
        assert_eq!(sample.targets.antineutrino, vec![35.0, -0.3, 2.5]);
    }

    #[test]
    fn test_default_coordinates_and_dims() {
        let dir = tempfile::tempdir().unwrap();
        let f   = write_file(dir.path(), "a.parquet", &[FixtureEvent::default()], 5);

        let cfg = DatasetConfig::new(dir.path().to_string_lossy(), vec![f]);
        let ds  = H5Dataset::new(&cfg).unwrap();
        let sample = ds.get(0).unwrap();

        // MET=50 at phi=0 → (50, 0)
        assert!((sample.inputs.met[0] - 50.0).abs() < EPS);
        assert!(sample.inputs.met[1].abs() < EPS);
        assert_eq!(sample.inputs.misc, vec![2.0, 1.0]);

        let inputs = ds.input_dims().unwrap();
        assert_eq!(inputs["misc"], 2);
        assert_eq!(inputs["met"], 2);
        assert_eq!(inputs["leptons"], 4);
        assert_eq!(inputs["jets"], 4);

        let targets = ds.target_dims().unwrap();
        assert_eq!(targets["neutrino"], 3);
        assert_eq!(targets["antineutrino"], 3);
    }

    #[test]
    fn test_out_of_range_get_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let f   = write_file(dir.path(), "a.parquet", &[FixtureEvent::default()], 2);
        let ds  = H5Dataset::new(&DatasetConfig::new(dir.path().to_string_lossy(), vec![f])).unwrap();
        assert!(ds.get(1).is_none());
    }

    #[test]
    fn test_subset_keeps_requested_events() {
        let dir = tempfile::tempdir().unwrap();
        let events: Vec<FixtureEvent> =
            (0..4).map(|i| FixtureEvent::default().with_lepton_pt(100.0 + i as f32)).collect();
        let f = write_file(dir.path(), "a.parquet", &events, 2);

        let mut cfg = DatasetConfig::new(dir.path().to_string_lossy(), vec![f]);
        cfg.lep_kins = KinematicList::parse("pt");
        let ds  = H5Dataset::new(&cfg).unwrap();
        let sub = ds.subset(&[3, 1]).unwrap();

        assert_eq!(sub.len(), 2);
        // slot 1 after ordering holds the positively charged lepton we tagged
        assert_eq!(sub.get(0).unwrap().inputs.leptons[1], vec![103.0]);
        assert_eq!(sub.get(1).unwrap().inputs.leptons[1], vec![101.0]);
    }

    #[test]
    fn test_empty_dataset_has_no_dims() {
        let dir = tempfile::tempdir().unwrap();
        let f   = write_file(dir.path(), "a.parquet", &[FixtureEvent::default()], 2);
        let ds  = H5Dataset::new(&DatasetConfig::new(dir.path().to_string_lossy(), vec![f])).unwrap();
        let empty = ds.subset(&[]).unwrap();
        assert!(matches!(empty.input_dims(), Err(DataError::EmptyDataset)));
    }

    #[test]
    fn test_subset_out_of_range_fails() {
        let dir = tempfile::tempdir().unwrap();
        let f   = write_file(dir.path(), "a.parquet", &vec![FixtureEvent::default(); 3], 2);
        let ds  = H5Dataset::new(&DatasetConfig::new(dir.path().to_string_lossy(), vec![f])).unwrap();

        let err = ds.subset(&[0, 3]).unwrap_err();
        assert!(matches!(err, DataError::EventOutOfRange { index: 3, n_events: 3 }));
    }

    #[test]
    fn test_charge_falls_back_to_second_last_field() {
        let fields = vec!["pt".to_string(), "q".to_string(), "type".to_string()];
        let lep = ObjectBlock::new("leptons", fields, 2, vec![
            10.0, 1.0, 11.0,
            20.0, -1.0, 13.0,
        ])
        .unwrap();

        let ordered = order_by_charge(lep).unwrap();
        assert_eq!(ordered.object(0, 0), &[20.0, -1.0, 13.0]);
        assert_eq!(ordered.object(0, 1), &[10.0, 1.0, 11.0]);
    }

    #[test]
    fn test_charge_missing_without_fallback() {
        let lep = ObjectBlock::new("leptons", vec!["pt".to_string()], 2, vec![10.0, 20.0]).unwrap();
        let err = order_by_charge(lep).unwrap_err();
        assert!(matches!(err, DataError::MissingField { ref field, .. } if field == "charge"));
    }
}
