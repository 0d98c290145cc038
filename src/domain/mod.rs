// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Descriptions of the observation: measurement sets and the antennas, fields,
//! spectral windows, scans and states inside them.
//!
//! These are read-mostly. They're built once at import time from a metadata
//! file exported from the dataset's tables, and are only changed when a stage
//! assigns a reference antenna or flags antennas out of the data.

mod error;

pub use error::DomainError;

use std::{
    collections::BTreeSet,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    str::FromStr,
};

use itertools::Itertools;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    constants::{DEFAULT_DISH_DIAMETER, MAX_NON_SCIENCE_CHANNELS},
    selection::{select, Selectable},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Antenna {
    pub id: usize,
    pub name: String,

    #[serde(default)]
    pub station: String,

    /// ITRF position [metres].
    pub position: [f64; 3],

    /// Dish diameter [metres].
    #[serde(default = "default_diameter")]
    pub diameter: f64,
}

fn default_diameter() -> f64 {
    DEFAULT_DISH_DIAMETER
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: usize,
    pub name: String,

    #[serde(default)]
    pub source_name: String,

    #[serde(default)]
    pub intents: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralWindow {
    pub id: usize,

    #[serde(default)]
    pub name: String,

    pub num_channels: usize,

    #[serde(default)]
    pub ref_frequency_hz: f64,

    #[serde(default)]
    pub bandwidth_hz: f64,

    #[serde(default)]
    pub intents: BTreeSet<String>,

    /// Whether this is a science window. If not given, windows with more
    /// than [`MAX_NON_SCIENCE_CHANNELS`] channels are science windows.
    #[serde(default)]
    science: Option<bool>,
}

impl SpectralWindow {
    pub fn new(id: usize, num_channels: usize, intents: BTreeSet<String>) -> SpectralWindow {
        SpectralWindow {
            id,
            name: String::new(),
            num_channels,
            ref_frequency_hz: 0.0,
            bandwidth_hz: 0.0,
            intents,
            science: None,
        }
    }

    pub fn is_science(&self) -> bool {
        self.science
            .unwrap_or(self.num_channels > MAX_NON_SCIENCE_CHANNELS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub id: usize,

    #[serde(default)]
    pub obs_mode: String,

    #[serde(default)]
    pub intents: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scan {
    pub id: usize,

    #[serde(default)]
    pub intents: BTreeSet<String>,

    #[serde(default)]
    pub field_ids: BTreeSet<usize>,

    #[serde(default)]
    pub spw_ids: BTreeSet<usize>,
}

impl Selectable for Antenna {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Selectable for Field {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Selectable for SpectralWindow {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSet {
    /// The path to the measurement set, as the toolkit knows it.
    pub name: String,

    pub antennas: Vec<Antenna>,

    pub fields: Vec<Field>,

    pub spectral_windows: Vec<SpectralWindow>,

    #[serde(default)]
    pub scans: Vec<Scan>,

    #[serde(default)]
    pub states: Vec<State>,

    /// A comma-separated, ranked list of reference antennas.
    #[serde(default)]
    pub reference_antenna: Option<String>,

    /// Antennas that have been removed from the data.
    #[serde(default)]
    pub flagged_antennas: Vec<String>,
}

/// Supported metadata description formats.
#[derive(Debug, Display, EnumIter, EnumString)]
pub(crate) enum MetadataFileType {
    #[strum(serialize = "json")]
    Json,

    #[strum(to_string = "yaml", serialize = "yml")]
    Yaml,

    #[strum(serialize = "toml")]
    Toml,
}

lazy_static::lazy_static! {
    pub(crate) static ref METADATA_FILE_TYPES_COMMA_SEPARATED: String =
        MetadataFileType::iter().join(", ");
}

impl MeasurementSet {
    /// Read a measurement set description from a metadata file. The format is
    /// determined by the file extension.
    pub fn from_metadata_file<P: AsRef<Path>>(file: P) -> Result<MeasurementSet, DomainError> {
        let file = file.as_ref();
        debug!("Reading measurement-set metadata from {}", file.display());

        let file_type = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| MetadataFileType::from_str(&e).ok())
            .ok_or_else(|| DomainError::UnsupportedMetadataExt {
                file: file.to_path_buf(),
            })?;

        let mut contents = String::new();
        File::open(file)?.read_to_string(&mut contents)?;
        let bad_file = |err: String| DomainError::BadMetadataFile {
            file: file.to_path_buf(),
            err,
        };
        let ms: MeasurementSet = match file_type {
            MetadataFileType::Json => serde_json::from_str(&contents).map_err(|e| bad_file(e.to_string()))?,
            MetadataFileType::Yaml => serde_yaml::from_str(&contents).map_err(|e| bad_file(e.to_string()))?,
            MetadataFileType::Toml => toml::from_str(&contents).map_err(|e| bad_file(e.to_string()))?,
        };
        if ms.name.trim().is_empty() {
            return Err(bad_file("the measurement set has no name".to_string()));
        }
        if ms.antennas.is_empty() {
            return Err(bad_file(format!("{} has no antennas", ms.name)));
        }
        trace!("{ms:#?}");

        Ok(ms)
    }

    /// The file name of the measurement set without any leading directories.
    pub fn basename(&self) -> &str {
        Path::new(&self.name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.name)
    }

    pub fn get_antennas(&self, selection: &str) -> Result<Vec<&Antenna>, DomainError> {
        select(&self.antennas, selection).map_err(|err| DomainError::Selection {
            vis: self.name.clone(),
            err,
        })
    }

    pub fn get_fields(&self, selection: &str) -> Result<Vec<&Field>, DomainError> {
        select(&self.fields, selection).map_err(|err| DomainError::Selection {
            vis: self.name.clone(),
            err,
        })
    }

    /// Get spectral windows matching a selection. With `science_only`,
    /// non-science windows are dropped after selecting.
    pub fn get_spectral_windows(
        &self,
        selection: &str,
        science_only: bool,
    ) -> Result<Vec<&SpectralWindow>, DomainError> {
        let spws = select(&self.spectral_windows, selection).map_err(|err| DomainError::Selection {
            vis: self.name.clone(),
            err,
        })?;
        Ok(spws
            .into_iter()
            .filter(|spw| !science_only || spw.is_science())
            .collect())
    }

    /// Get the scans observed with any of the comma-separated intents. An
    /// empty string gets all scans.
    pub fn get_scans(&self, intent: &str) -> Vec<&Scan> {
        let wanted: BTreeSet<&str> = intent
            .split(',')
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
            .collect();
        self.scans
            .iter()
            .filter(|scan| wanted.is_empty() || scan.intents.iter().any(|i| wanted.contains(i.as_str())))
            .collect()
    }

    /// Whether no two fields share a name. If not, fields must be referred to
    /// by ID.
    pub fn field_names_are_unique(&self) -> bool {
        self.fields.iter().map(|f| &f.name).all_unique()
    }

    /// Every intent observed in this measurement set.
    pub fn intents(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .flat_map(|f| f.intents.iter().cloned())
            .collect()
    }

    /// The mean position of all antennas.
    pub fn array_centre(&self) -> Option<[f64; 3]> {
        if self.antennas.is_empty() {
            return None;
        }
        let n = self.antennas.len() as f64;
        let mut centre = [0.0; 3];
        for a in &self.antennas {
            for (c, p) in centre.iter_mut().zip(a.position) {
                *c += p;
            }
        }
        Some(centre.map(|c| c / n))
    }

    /// Remove antennas by name, recording them as flagged. They are also
    /// dropped from the reference antenna list.
    pub fn remove_antennas(&mut self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        debug!("Removing antennas {} from {}", names.join(","), self.name);
        self.antennas.retain(|a| !names.contains(&a.name));
        for name in names {
            if !self.flagged_antennas.contains(name) {
                self.flagged_antennas.push(name.clone());
            }
        }

        if let Some(refant) = self.reference_antenna.take() {
            let remaining = refant
                .split(',')
                .filter(|a| !names.iter().any(|n| n == a))
                .join(",");
            if !remaining.is_empty() {
                self.reference_antenna = Some(remaining);
            }
        }
    }

    /// The reference antennas in preference order.
    pub fn reference_antennas(&self) -> Vec<&str> {
        match self.reference_antenna.as_deref() {
            Some(r) => r.split(',').filter(|a| !a.is_empty()).collect(),
            None => vec![],
        }
    }
}

/// All of the measurement sets being processed, in import order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservingRun {
    pub measurement_sets: Vec<MeasurementSet>,
}

impl ObservingRun {
    pub fn add_ms(&mut self, ms: MeasurementSet) -> Result<(), DomainError> {
        if self
            .measurement_sets
            .iter()
            .any(|m| m.name == ms.name || m.basename() == ms.basename())
        {
            return Err(DomainError::DuplicateMs { name: ms.name });
        }
        debug!("Registering {}", ms.name);
        self.measurement_sets.push(ms);
        Ok(())
    }

    /// Get a measurement set by its full name or its basename.
    pub fn get_ms(&self, name: &str) -> Result<&MeasurementSet, DomainError> {
        let basename = basename_of(name);
        self.measurement_sets
            .iter()
            .find(|ms| ms.name == name)
            .or_else(|| self.measurement_sets.iter().find(|ms| ms.basename() == basename))
            .ok_or_else(|| DomainError::UnknownMs {
                name: name.to_string(),
            })
    }

    pub fn get_ms_mut(&mut self, name: &str) -> Result<&mut MeasurementSet, DomainError> {
        let basename = basename_of(name).to_string();
        let i = self
            .measurement_sets
            .iter()
            .position(|ms| ms.name == name)
            .or_else(|| {
                self.measurement_sets
                    .iter()
                    .position(|ms| ms.basename() == basename)
            })
            .ok_or_else(|| DomainError::UnknownMs {
                name: name.to_string(),
            })?;
        Ok(&mut self.measurement_sets[i])
    }

    pub fn ms_names(&self) -> Vec<String> {
        self.measurement_sets.iter().map(|ms| ms.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.measurement_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurement_sets.is_empty()
    }
}

fn basename_of(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
}

/// The path of the metadata file describing a measurement set, if one sits
/// next to it (e.g. `x.ms.json` for `x.ms`).
pub fn find_metadata_file(vis: &Path) -> Option<PathBuf> {
    MetadataFileType::iter()
        .flat_map(|t| match t {
            MetadataFileType::Yaml => vec!["yaml", "yml"],
            MetadataFileType::Json => vec!["json"],
            MetadataFileType::Toml => vec!["toml"],
        })
        .map(|ext| {
            let mut s = vis.as_os_str().to_owned();
            s.push(".");
            s.push(ext);
            PathBuf::from(s)
        })
        .find(|p| p.exists())
}
