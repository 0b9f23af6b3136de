// ============================================================
// Layer 3 — Kinematic Coordinates
// ============================================================
// Events are stored in (pt, eta, phi, E) coordinates. The model
// may want them in any mix of:
//
//   px = pt cos(phi)        pt, log_pt
//   py = pt sin(phi)        eta, phi
//   pz = pt sinh(eta)       energy, log_energy
//   p  = pt cosh(eta)       mass = sqrt(max(E^2 - p^2, 0))
//
// Any other requested name is copied straight from the stored
// record fields (e.g. "charge"), so the output of a conversion
// is exactly the requested list, in the requested order.
//
// Blocks without an energy column (neutrino targets are stored as
// pt, eta, phi) are treated as massless: E = |p|.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DataError;
use crate::domain::event::ObjectBlock;

const PT_NAMES:     &[&str] = &["pt", "MET", "met"];
const ETA_NAMES:    &[&str] = &["eta"];
const PHI_NAMES:    &[&str] = &["phi"];
const ENERGY_NAMES: &[&str] = &["energy", "E", "e"];

/// One output coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kinematic {
    Px,
    Py,
    Pz,
    Pt,
    LogPt,
    Eta,
    Phi,
    Energy,
    LogEnergy,
    Mass,
    P,
    /// A stored record field passed through unchanged.
    Field(String),
}

impl Kinematic {
    pub fn name(&self) -> &str {
        match self {
            Kinematic::Px        => "px",
            Kinematic::Py        => "py",
            Kinematic::Pz        => "pz",
            Kinematic::Pt        => "pt",
            Kinematic::LogPt     => "log_pt",
            Kinematic::Eta       => "eta",
            Kinematic::Phi       => "phi",
            Kinematic::Energy    => "energy",
            Kinematic::LogEnergy => "log_energy",
            Kinematic::Mass      => "mass",
            Kinematic::P         => "p",
            Kinematic::Field(f)  => f,
        }
    }
}

impl FromStr for Kinematic {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "px"         => Kinematic::Px,
            "py"         => Kinematic::Py,
            "pz"         => Kinematic::Pz,
            "pt"         => Kinematic::Pt,
            "log_pt"     => Kinematic::LogPt,
            "eta"        => Kinematic::Eta,
            "phi"        => Kinematic::Phi,
            "energy"     => Kinematic::Energy,
            "log_energy" => Kinematic::LogEnergy,
            "mass"       => Kinematic::Mass,
            "p"          => Kinematic::P,
            other        => Kinematic::Field(other.to_string()),
        })
    }
}

impl fmt::Display for Kinematic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── KinematicList ────────────────────────────────────────────────────────────

/// Ordered list of requested coordinates.
///
/// Deserialises from either `"px,py,pz"` or `["px", "py", "pz"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "KinematicInput", into = "Vec<String>")]
pub struct KinematicList(Vec<Kinematic>);

#[derive(Deserialize)]
#[serde(untagged)]
enum KinematicInput {
    Csv(String),
    List(Vec<String>),
}

impl From<KinematicInput> for KinematicList {
    fn from(input: KinematicInput) -> Self {
        match input {
            KinematicInput::Csv(s)   => KinematicList::parse(&s),
            KinematicInput::List(v)  => KinematicList::from_names(v.iter().map(String::as_str)),
        }
    }
}

impl From<KinematicList> for Vec<String> {
    fn from(list: KinematicList) -> Self {
        list.names()
    }
}

impl KinematicList {
    /// Parse a comma separated list, skipping empty entries.
    pub fn parse(csv: &str) -> Self {
        Self::from_names(csv.split(','))
    }

    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self(
            names
                .into_iter()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .filter_map(|n| n.parse().ok())
                .collect(),
        )
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|k| k.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Kinematic> {
        self.0.iter()
    }
}

// ─── Conversion ───────────────────────────────────────────────────────────────

/// Positions of the (pt, eta, phi, E) components within a block's fields.
#[derive(Debug, Clone, Copy, Default)]
struct Components {
    pt:     Option<usize>,
    eta:    Option<usize>,
    phi:    Option<usize>,
    energy: Option<usize>,
}

impl Components {
    fn locate(block: &ObjectBlock) -> Self {
        let find = |names: &[&str]| names.iter().find_map(|n| block.field_index(n));
        Self {
            pt:     find(PT_NAMES),
            eta:    find(ETA_NAMES),
            phi:    find(PHI_NAMES),
            energy: find(ENERGY_NAMES),
        }
    }
}

/// How one output column is produced.
#[derive(Debug, Clone)]
enum Column {
    Copy(usize),
    Derived(Kinematic),
}

fn missing(block: &ObjectBlock, component: &str) -> DataError {
    DataError::MissingField { block: block.name.clone(), field: component.to_string() }
}

fn resolve(block: &ObjectBlock, comps: &Components, kin: &Kinematic) -> Result<Column, DataError> {
    if let Some(idx) = block.field_index(kin.name()) {
        return Ok(Column::Copy(idx));
    }

    let needs: Vec<(&str, Option<usize>)> = match kin {
        Kinematic::Px | Kinematic::Py    => vec![("pt", comps.pt), ("phi", comps.phi)],
        Kinematic::Pz | Kinematic::P     => vec![("pt", comps.pt), ("eta", comps.eta)],
        Kinematic::Pt | Kinematic::LogPt => vec![("pt", comps.pt)],
        Kinematic::Eta => vec![("eta", comps.eta)],
        Kinematic::Phi => vec![("phi", comps.phi)],
        Kinematic::Energy | Kinematic::LogEnergy if comps.energy.is_some() => Vec::new(),
        Kinematic::Energy | Kinematic::LogEnergy | Kinematic::Mass => {
            vec![("pt", comps.pt), ("eta", comps.eta)]
        }
        Kinematic::Field(name) => return Err(DataError::UnknownKinematic(name.clone())),
    };

    if let Some((name, _)) = needs.iter().find(|(_, idx)| idx.is_none()) {
        return Err(missing(block, name));
    }
    Ok(Column::Derived(kin.clone()))
}

fn safe_ln(x: f32) -> f32 {
    if x > 0.0 { x.ln() } else { 0.0 }
}

fn derive(kin: &Kinematic, comps: &Components, row: &[f32]) -> f32 {
    let at   = |idx: Option<usize>| idx.map(|i| row[i]).unwrap_or(0.0);
    let pt   = at(comps.pt);
    let eta  = at(comps.eta);
    let phi  = at(comps.phi);
    let p    = pt * eta.cosh();
    let energy = match comps.energy {
        Some(i) => row[i],
        None    => p,
    };

    match kin {
        Kinematic::Px        => pt * phi.cos(),
        Kinematic::Py        => pt * phi.sin(),
        Kinematic::Pz        => pt * eta.sinh(),
        Kinematic::P         => p,
        Kinematic::Pt        => pt,
        Kinematic::LogPt     => safe_ln(pt),
        Kinematic::Eta       => eta,
        Kinematic::Phi       => phi,
        Kinematic::Energy    => energy,
        Kinematic::LogEnergy => safe_ln(energy),
        Kinematic::Mass      => (energy * energy - p * p).max(0.0).sqrt(),
        Kinematic::Field(_)  => 0.0,
    }
}

/// Convert a block stored in (pt, eta, phi, E) coordinates into `kins`.
///
/// The returned block's fields are the requested names, in order.
pub fn change_from_ptetaphie(
    block: &ObjectBlock,
    kins:  &KinematicList,
) -> Result<ObjectBlock, DataError> {
    let comps = Components::locate(block);
    let columns = kins
        .iter()
        .map(|k| resolve(block, &comps, k))
        .collect::<Result<Vec<_>, _>>()?;

    let mut values = Vec::with_capacity(block.n_events * block.n_objects * columns.len());
    for e in 0..block.n_events {
        for o in 0..block.n_objects {
            let row = block.object(e, o);
            values.extend(columns.iter().map(|c| match c {
                Column::Copy(i)      => row[*i],
                Column::Derived(kin) => derive(kin, &comps, row),
            }));
        }
    }

    Ok(ObjectBlock {
        name:      block.name.clone(),
        fields:    kins.names(),
        n_events:  block.n_events,
        n_objects: block.n_objects,
        values,
    })
}
