// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{cmp::Ordering, collections::BTreeSet, fmt};

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use vec1::Vec1;

use super::{CalApplication, CalFrom, CalTo, CalType};

/// A fully resolved piece of data: one antenna of one intent of one field of
/// one spectral window of one measurement set. Fields are identified by name
/// when names are unique within the measurement set, otherwise by ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub ms: String,
    pub spw: usize,
    pub field: String,
    pub intent: String,
    pub antenna: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CalStateEntry {
    cell: CellKey,
    calfroms: Vec<CalFrom>,
}

/// The caltables to apply to every cell of data, in application order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CalStateEntry>", into = "Vec<CalStateEntry>")]
pub struct CalState {
    cells: IndexMap<CellKey, Vec<CalFrom>>,
}

impl From<Vec<CalStateEntry>> for CalState {
    fn from(entries: Vec<CalStateEntry>) -> Self {
        CalState {
            cells: entries.into_iter().map(|e| (e.cell, e.calfroms)).collect(),
        }
    }
}

impl From<CalState> for Vec<CalStateEntry> {
    fn from(state: CalState) -> Self {
        state
            .cells
            .into_iter()
            .map(|(cell, calfroms)| CalStateEntry { cell, calfroms })
            .collect()
    }
}

impl CalState {
    pub fn get(&self, cell: &CellKey) -> Option<&[CalFrom]> {
        self.cells.get(cell).map(|v| v.as_slice())
    }

    pub(super) fn cell_mut(&mut self, cell: CellKey) -> &mut Vec<CalFrom> {
        self.cells.entry(cell).or_default()
    }

    pub(super) fn insert(&mut self, cell: CellKey, calfroms: Vec<CalFrom>) {
        self.cells.insert(cell, calfroms);
    }

    /// Iterate over cells that have something to apply.
    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &[CalFrom])> {
        self.cells
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k, v.as_slice()))
    }

    /// The number of ledger entries, i.e. the total number of `CalFrom`s over
    /// all cells.
    pub fn len(&self) -> usize {
        self.cells.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Group cells that share an identical list of `CalFrom`s into compact
    /// selections. Each component of a selection is a sorted, comma-joined
    /// list. The groups are in the order they were first seen.
    pub fn merged(&self) -> Vec<(CalTo, Vec1<CalFrom>)> {
        #[derive(Default)]
        struct Group {
            spw: BTreeSet<usize>,
            field: Vec<String>,
            intent: BTreeSet<String>,
            antenna: BTreeSet<usize>,
        }

        let mut groups: IndexMap<(&str, &[CalFrom]), Group> = IndexMap::new();
        for (cell, calfroms) in self.cells() {
            let group = groups.entry((cell.ms.as_str(), calfroms)).or_default();
            group.spw.insert(cell.spw);
            if !group.field.contains(&cell.field) {
                group.field.push(cell.field.clone());
            }
            group.intent.insert(cell.intent.clone());
            group.antenna.insert(cell.antenna);
        }

        groups
            .into_iter()
            .filter_map(|((ms, calfroms), mut group)| {
                group.field.sort_by(|a, b| compare_fields(a, b));
                let calto = CalTo::new(ms)
                    .with_spw(group.spw.iter().join(","))
                    .with_field(group.field.join(","))
                    .with_intent(group.intent.iter().join(","))
                    .with_antenna(group.antenna.iter().join(","));
                Vec1::try_from_vec(calfroms.to_vec())
                    .ok()
                    .map(|calfroms| (calto, calfroms))
            })
            .collect()
    }

    /// Drop every cell of the given antennas of one measurement set.
    pub(super) fn remove_antennas(&mut self, vis: &str, antennas: &[usize]) {
        self.cells
            .retain(|cell, _| cell.ms != vis || !antennas.contains(&cell.antenna));
    }

    /// Only the cells of one measurement set.
    pub fn trimmed(&self, vis: &str) -> CalState {
        CalState {
            cells: self
                .cells
                .iter()
                .filter(|(cell, _)| cell.ms == vis)
                .map(|(cell, calfroms)| (cell.clone(), calfroms.clone()))
                .collect(),
        }
    }

    /// The caltables of the given types (all types if `None`).
    pub fn get_caltable(&self, caltypes: Option<&[CalType]>) -> BTreeSet<String> {
        self.cells()
            .flat_map(|(_, calfroms)| calfroms.iter())
            .filter(|cf| caltypes.map(|t| t.contains(&cf.caltype())).unwrap_or(true))
            .map(|cf| cf.gaintable().to_string())
            .collect()
    }

    /// The merged state as applications.
    pub fn applications(&self) -> Vec<CalApplication> {
        self.merged()
            .into_iter()
            .map(|(calto, calfrom)| CalApplication::new(calto, calfrom))
            .collect()
    }

    /// The merged state as `applycal(...)` calls, one per line.
    pub fn as_applycal(&self) -> String {
        self.applications()
            .iter()
            .map(|a| a.as_applycal())
            .join("\n")
    }
}

/// Field IDs sort numerically, names lexically.
fn compare_fields(a: &str, b: &str) -> Ordering {
    match (a.parse::<usize>(), b.parse::<usize>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

impl fmt::Display for CalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_applycal())
    }
}
