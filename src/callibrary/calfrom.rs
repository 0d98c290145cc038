// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::CalLibraryError;
use crate::constants::DEFAULT_INTERP;

/// The kind of calibration a caltable holds.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CalType {
    #[default]
    Unknown,
    Gaincal,
    Bandpass,
    Tsys,
    Wvr,
    Polarization,
    Antpos,
    Gc,
    Opac,
    Rq,
    Swpow,
}

impl CalType {
    /// Identify a caltable from the `VisCal` keyword in its header.
    pub fn from_viscal(viscal: &str) -> CalType {
        match viscal.trim().to_uppercase().as_str() {
            "G JONES" | "GSPLINE" => CalType::Gaincal,
            "B JONES" | "BPOLY" => CalType::Bandpass,
            "B TSYS" => CalType::Tsys,
            "KANTPOS JONES" => CalType::Antpos,
            _ => CalType::Unknown,
        }
    }

    /// Guess the type of a caltable from its file name, e.g.
    /// `x.ms.hifa_bandpass.s6_1.spw1.channel.solintinf.bcal.tbl` is a
    /// bandpass table.
    pub fn from_caltable_name(gaintable: &str) -> CalType {
        let basename = gaintable
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(gaintable)
            .to_lowercase();
        for token in basename.rsplit('.') {
            let caltype = match token {
                "bcal" | "bpcal" | "bpoly" => CalType::Bandpass,
                "gcal" | "gpcal" | "gacal" | "gspline" => CalType::Gaincal,
                "tsyscal" | "tsys" => CalType::Tsys,
                "wvrcal" | "wvr" => CalType::Wvr,
                "ants" | "antpos" => CalType::Antpos,
                "pcal" | "xyf" | "df" | "kcrs" => CalType::Polarization,
                "gc" | "gaincurve" => CalType::Gc,
                "opac" => CalType::Opac,
                "rq" => CalType::Rq,
                "swpow" => CalType::Swpow,
                _ => continue,
            };
            return caltype;
        }
        CalType::Unknown
    }
}

/// The properties of a [`CalFrom`] that can be reset to their defaults when
/// fetching a calibration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CalFromProperty {
    Gainfield,
    Interp,
    Spwmap,
    Caltype,
    Calwt,
}

/// A caltable and how it should be applied.
///
/// Two `CalFrom`s are equal when they'd produce the same application, i.e.
/// the caltype is descriptive only and doesn't take part in comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalFrom {
    gaintable: String,

    #[serde(default)]
    gainfield: String,

    #[serde(default = "default_interp")]
    interp: String,

    #[serde(default)]
    spwmap: Vec<i32>,

    #[serde(default)]
    caltype: CalType,

    #[serde(default = "default_calwt")]
    calwt: bool,
}

fn default_interp() -> String {
    DEFAULT_INTERP.to_string()
}

fn default_calwt() -> bool {
    true
}

impl CalFrom {
    pub fn new<S: Into<String>>(gaintable: S) -> Result<CalFrom, CalLibraryError> {
        let gaintable = gaintable.into();
        if gaintable.trim().is_empty() {
            return Err(CalLibraryError::EmptyGaintable);
        }
        Ok(CalFrom {
            gaintable,
            gainfield: String::new(),
            interp: default_interp(),
            spwmap: vec![],
            caltype: CalType::Unknown,
            calwt: true,
        })
    }

    pub fn with_gainfield<S: Into<String>>(mut self, gainfield: S) -> CalFrom {
        self.gainfield = gainfield.into();
        self
    }

    pub fn with_interp<S: Into<String>>(mut self, interp: S) -> CalFrom {
        self.interp = interp.into();
        self
    }

    pub fn with_spwmap(mut self, spwmap: Vec<i32>) -> CalFrom {
        self.spwmap = spwmap;
        self
    }

    pub fn with_caltype(mut self, caltype: CalType) -> CalFrom {
        self.caltype = caltype;
        self
    }

    pub fn with_calwt(mut self, calwt: bool) -> CalFrom {
        self.calwt = calwt;
        self
    }

    pub fn gaintable(&self) -> &str {
        &self.gaintable
    }

    pub fn gainfield(&self) -> &str {
        &self.gainfield
    }

    pub fn interp(&self) -> &str {
        &self.interp
    }

    pub fn spwmap(&self) -> &[i32] {
        &self.spwmap
    }

    pub fn caltype(&self) -> CalType {
        self.caltype
    }

    pub fn calwt(&self) -> bool {
        self.calwt
    }

    /// A copy of this `CalFrom` with the given properties reset to their
    /// defaults.
    pub(crate) fn with_defaults_for(&self, ignore: &[CalFromProperty]) -> CalFrom {
        let mut copy = self.clone();
        for property in ignore {
            match property {
                CalFromProperty::Gainfield => copy.gainfield = String::new(),
                CalFromProperty::Interp => copy.interp = default_interp(),
                CalFromProperty::Spwmap => copy.spwmap = vec![],
                CalFromProperty::Caltype => copy.caltype = CalType::Unknown,
                CalFromProperty::Calwt => copy.calwt = true,
            }
        }
        copy
    }
}

impl PartialEq for CalFrom {
    fn eq(&self, other: &Self) -> bool {
        self.gaintable == other.gaintable
            && self.gainfield == other.gainfield
            && self.interp == other.interp
            && self.spwmap == other.spwmap
            && self.calwt == other.calwt
    }
}

impl Eq for CalFrom {}

impl Hash for CalFrom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.gaintable.hash(state);
        self.gainfield.hash(state);
        self.interp.hash(state);
        self.spwmap.hash(state);
        self.calwt.hash(state);
    }
}

impl fmt::Display for CalFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalFrom('{}', gainfield='{}', interp='{}', spwmap=[{}], caltype='{}', calwt={})",
            self.gaintable,
            self.gainfield,
            self.interp,
            self.spwmap.iter().join(", "),
            self.caltype,
            if self.calwt { "True" } else { "False" }
        )
    }
}
