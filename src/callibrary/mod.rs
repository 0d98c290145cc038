// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The calibration library: a ledger of which caltables are to be (or have
//! been) applied to which data, and in what order.
//!
//! Selections ([`CalTo`]) are resolved against the measurement set metadata
//! into cells (spectral window, field, intent, antenna), and every cell keeps
//! an ordered list of caltable applications ([`CalFrom`]). Insertion order is
//! application order. Entries only leave the *active* state by being marked as
//! applied, which moves them to the *applied* state.

mod application;
mod calfrom;
mod calstate;
mod calto;
mod error;

pub use application::{CalAppOrigin, CalApplication};
pub use calfrom::{CalFrom, CalFromProperty, CalType};
pub use calstate::{CalState, CellKey};
pub use calto::CalTo;
pub use error::CalLibraryError;

use std::{
    collections::BTreeSet,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use itertools::Itertools;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::domain::ObservingRun;

/// Resolve a selection into the cells it covers, in spw, field, intent,
/// antenna order.
fn resolve(run: &ObservingRun, calto: &CalTo) -> Result<Vec<CellKey>, CalLibraryError> {
    let ms = run.get_ms(calto.vis())?;
    let spws = ms.get_spectral_windows(calto.spw(), false)?;
    let fields = ms.get_fields(calto.field())?;
    let antennas = ms.get_antennas(calto.antenna())?;
    let use_field_names = ms.field_names_are_unique();

    let user_intents: BTreeSet<&str> = calto
        .intent()
        .split(',')
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .collect();

    let mut cells = vec![];
    for spw in &spws {
        for field in &fields {
            let field_key = if use_field_names {
                field.name.clone()
            } else {
                field.id.to_string()
            };
            // With no intents given, every intent of the field is used.
            let intents = field
                .intents
                .iter()
                .filter(|i| user_intents.is_empty() || user_intents.contains(i.as_str()))
                .filter(|i| spw.intents.contains(*i));
            for intent in intents {
                for antenna in &antennas {
                    cells.push(CellKey {
                        ms: ms.name.clone(),
                        spw: spw.id,
                        field: field_key.clone(),
                        intent: intent.clone(),
                        antenna: antenna.id,
                    });
                }
            }
        }
    }
    trace!("{calto} covers {} cells", cells.len());
    Ok(cells)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalLibrary {
    active: CalState,
    applied: CalState,
}

impl CalLibrary {
    /// Calibrations to be (pre-)applied.
    pub fn active(&self) -> &CalState {
        &self.active
    }

    /// Calibrations that have been applied by `applycal`.
    pub fn applied(&self) -> &CalState {
        &self.applied
    }

    /// The number of entries in the ledger, active and applied.
    pub fn len(&self) -> usize {
        self.active.len() + self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.active = CalState::default();
        self.applied = CalState::default();
    }

    /// Append `calfroms` to every cell covered by `calto`. Whether the
    /// caltables exist is not checked.
    pub fn add(&mut self, run: &ObservingRun, calto: &CalTo, calfroms: &[CalFrom]) -> Result<(), CalLibraryError> {
        add_to(&mut self.active, run, calto, calfroms)?;
        trace!("Calibration state after add:\n{}", self.active);
        Ok(())
    }

    pub fn add_application(&mut self, run: &ObservingRun, app: &CalApplication) -> Result<(), CalLibraryError> {
        self.add(run, &app.calto, &app.calfrom)
    }

    /// A copy of the active state for every cell covered by `calto`. The
    /// `ignore`d properties are reset to their defaults in the copy.
    pub fn get_calstate(
        &self,
        run: &ObservingRun,
        calto: &CalTo,
        ignore: &[CalFromProperty],
    ) -> Result<CalState, CalLibraryError> {
        let mut result = CalState::default();
        for cell in resolve(run, calto)? {
            if let Some(calfroms) = self.active.get(&cell) {
                if calfroms.is_empty() {
                    continue;
                }
                let copied = calfroms
                    .iter()
                    .map(|cf| cf.with_defaults_for(ignore))
                    .collect();
                result.insert(cell, copied);
            }
        }
        Ok(result)
    }

    /// Move `calfroms` from the active to the applied state for every cell
    /// covered by `calto`.
    pub fn mark_as_applied(
        &mut self,
        run: &ObservingRun,
        calto: &CalTo,
        calfroms: &[CalFrom],
    ) -> Result<(), CalLibraryError> {
        for cell in resolve(run, calto)? {
            let current = self.active.cell_mut(cell);
            for cf in calfroms {
                match current.iter().position(|c| c == cf) {
                    Some(i) => {
                        current.remove(i);
                    }
                    None => debug!("{cf} not found in calibration state"),
                }
            }
        }
        add_to(&mut self.applied, run, calto, calfroms)?;

        debug!("New calibration state:\n{}", self.active);
        debug!("Applied calibration state:\n{}", self.applied);
        Ok(())
    }

    /// Forget the active calibrations of antennas that have been removed from
    /// a measurement set. The applied state is a record and keeps them.
    pub fn remove_antennas(&mut self, vis: &str, antennas: &[usize]) {
        if antennas.is_empty() {
            return;
        }
        let before = self.active.len();
        self.active.remove_antennas(vis, antennas);
        debug!(
            "Dropped {} active entries of antennas {} of {vis}",
            before - self.active.len(),
            antennas.iter().join(",")
        );
    }

    /// Write the active state to a file as `applycal(...)` calls.
    pub fn export(&self, file: &Path) -> Result<(), CalLibraryError> {
        info!("Exporting current calibration state to {}", file.display());
        write_state(&self.active, file)
    }

    /// Write the applied state to a file as `applycal(...)` calls.
    pub fn export_applied(&self, file: &Path) -> Result<(), CalLibraryError> {
        info!("Exporting applied calibration state to {}", file.display());
        write_state(&self.applied, file)
    }

    /// Read `applycal(...)` calls from a file into the active state. Unless
    /// `append`ing, the active state is replaced. Lines that aren't
    /// `applycal` calls are ignored.
    pub fn import_state(&mut self, run: &ObservingRun, file: &Path, append: bool) -> Result<(), CalLibraryError> {
        info!("Importing calibration state from {}", file.display());
        let read_err = |err| CalLibraryError::Read {
            file: file.to_path_buf(),
            err,
        };
        let reader = BufReader::new(File::open(file).map_err(read_err)?);
        let mut calapps = vec![];
        for line in reader.lines() {
            let line = line.map_err(read_err)?;
            if line.starts_with("applycal(") {
                calapps.push(CalApplication::from_export(&line)?);
            }
        }

        // Resolve everything before touching the state.
        let mut state = if append {
            self.active.clone()
        } else {
            CalState::default()
        };
        for calapp in &calapps {
            debug!("Adding {calapp}");
            add_to(&mut state, run, &calapp.calto, &calapp.calfrom)?;
        }
        self.active = state;

        info!("Calibration state after import:\n{}", self.active);
        Ok(())
    }
}

fn add_to(
    state: &mut CalState,
    run: &ObservingRun,
    calto: &CalTo,
    calfroms: &[CalFrom],
) -> Result<(), CalLibraryError> {
    for cell in resolve(run, calto)? {
        state.cell_mut(cell).extend(calfroms.iter().cloned());
    }
    Ok(())
}

fn write_state(state: &CalState, file: &Path) -> Result<(), CalLibraryError> {
    let write_err = |err| CalLibraryError::Write {
        file: file.to_path_buf(),
        err,
    };
    let mut f = BufWriter::new(File::create(file).map_err(write_err)?);
    for app in state.applications() {
        writeln!(f, "{}", app.as_applycal()).map_err(write_err)?;
    }
    f.flush().map_err(write_err)
}
