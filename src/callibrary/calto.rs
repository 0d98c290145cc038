// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::selection::find_ranges;

/// A data selection that a calibration applies to. Empty strings select
/// everything. Spectral-window and antenna selections are stored compressed,
/// e.g. "0,1,2,3,5" is stored as "0~3,5".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalTo {
    vis: String,
    field: String,
    spw: String,
    antenna: String,
    intent: String,
}

impl CalTo {
    /// Select all of the data in a measurement set.
    pub fn new<S: Into<String>>(vis: S) -> CalTo {
        CalTo {
            vis: vis.into(),
            field: String::new(),
            spw: String::new(),
            antenna: String::new(),
            intent: String::new(),
        }
    }

    /// Make a selection from optional parts; `None` selects everything.
    pub fn from_parts(
        vis: &str,
        field: Option<&str>,
        spw: Option<&str>,
        antenna: Option<&str>,
        intent: Option<&str>,
    ) -> CalTo {
        CalTo::new(vis)
            .with_field(field.unwrap_or(""))
            .with_spw(spw.unwrap_or(""))
            .with_antenna(antenna.unwrap_or(""))
            .with_intent(intent.unwrap_or(""))
    }

    pub fn with_field<S: AsRef<str>>(mut self, field: S) -> CalTo {
        self.field = field.as_ref().trim().to_string();
        self
    }

    pub fn with_spw<S: AsRef<str>>(mut self, spw: S) -> CalTo {
        self.spw = find_ranges(spw.as_ref().trim());
        self
    }

    pub fn with_antenna<S: AsRef<str>>(mut self, antenna: S) -> CalTo {
        self.antenna = find_ranges(antenna.as_ref().trim());
        self
    }

    pub fn with_intent<S: AsRef<str>>(mut self, intent: S) -> CalTo {
        self.intent = intent.as_ref().trim().to_string();
        self
    }

    pub fn vis(&self) -> &str {
        &self.vis
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn spw(&self) -> &str {
        &self.spw
    }

    pub fn antenna(&self) -> &str {
        &self.antenna
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }
}

impl fmt::Display for CalTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalTo(vis='{}', field='{}', spw='{}', antenna='{}', intent='{}')",
            self.vis, self.field, self.spw, self.antenna, self.intent
        )
    }
}
