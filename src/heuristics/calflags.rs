// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Flagged-solution statistics of a caltable.
//!
//! Each caltable row holds the solutions of one antenna and spectral window,
//! with a flag per polarisation and channel. A solution counts once per
//! polarisation, and its flagged amount is the fraction of its channels that
//! are flagged (so a completely flagged polarisation counts as 1).

use std::collections::BTreeMap;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use super::HeuristicsError;

/// One caltable row.
#[derive(Debug, Clone, PartialEq)]
pub struct CalTableRow {
    pub antenna: usize,
    pub spw: usize,

    /// Flags with dimensions `[pol][chan]`.
    pub flags: Array2<bool>,
}

#[derive(Deserialize)]
struct RawRow {
    antenna: usize,
    spw: usize,
    flag: Vec<Vec<bool>>,
}

impl CalTableRow {
    /// Read rows from the output of a `getcalflags` toolkit query: a list of
    /// `{"antenna": .., "spw": .., "flag": [[..], ..]}` objects.
    pub fn from_json(value: &serde_json::Value) -> Result<Vec<CalTableRow>, HeuristicsError> {
        let raw: Vec<RawRow> =
            serde_json::from_value(value.clone()).map_err(|e| HeuristicsError::BadToolkitOutput {
                what: "caltable flags",
                err: e.to_string(),
            })?;

        raw.into_iter()
            .enumerate()
            .map(|(i_row, row)| {
                let num_pols = row.flag.len();
                let num_chans = row.flag.first().map(|p| p.len()).unwrap_or(0);
                if row.flag.iter().any(|p| p.len() != num_chans) {
                    return Err(HeuristicsError::RaggedFlags { row: i_row });
                }
                let flat: Vec<bool> = row.flag.into_iter().flatten().collect();
                let flags = Array2::from_shape_vec((num_pols, num_chans), flat)
                    .map_err(|_| HeuristicsError::RaggedFlags { row: i_row })?;
                Ok(CalTableRow {
                    antenna: row.antenna,
                    spw: row.spw,
                    flags,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagCount {
    pub total: f64,
    pub flagged: f64,
    pub fraction: f64,
}

impl FlagCount {
    fn add(&mut self, flagged: f64) {
        self.total += 1.0;
        self.flagged += flagged;
    }

    fn finalise(&mut self) {
        self.fraction = if self.total > 0.0 {
            self.flagged / self.total
        } else {
            0.0
        };
    }
}

/// Medians over antennas of the per-antenna statistics (summed over spectral
/// windows and polarisations).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AntMedian {
    pub total: f64,
    pub flagged: f64,
    pub fraction: f64,

    /// The number of antennas that went into the medians.
    pub number: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalFlagSummary {
    /// All solutions.
    pub all: FlagCount,

    /// Indexed by antenna, then spectral window, then polarisation.
    pub antspw: BTreeMap<usize, BTreeMap<usize, Vec<FlagCount>>>,

    /// Indexed by antenna then polarisation, summed over spectral windows.
    pub ant: BTreeMap<usize, Vec<FlagCount>>,

    /// Indexed by spectral window then polarisation, summed over antennas.
    pub spw: BTreeMap<usize, Vec<FlagCount>>,

    pub antmedian: AntMedian,
}

fn pol_entry(pols: &mut Vec<FlagCount>, pol: usize) -> &mut FlagCount {
    if pols.len() <= pol {
        pols.resize(pol + 1, FlagCount::default());
    }
    &mut pols[pol]
}

/// Compute the flagged-solution statistics of caltable rows.
pub fn get_cal_flagged_soln(rows: &[CalTableRow]) -> CalFlagSummary {
    let mut summary = CalFlagSummary::default();

    for row in rows {
        let num_chans = row.flags.len_of(Axis(1));
        for (pol, chan_flags) in row.flags.outer_iter().enumerate() {
            let num_flagged = chan_flags.iter().filter(|f| **f).count();
            let flagged = if num_chans > 0 {
                num_flagged as f64 / num_chans as f64
            } else {
                0.0
            };

            summary.all.add(flagged);
            pol_entry(summary.ant.entry(row.antenna).or_default(), pol).add(flagged);
            pol_entry(summary.spw.entry(row.spw).or_default(), pol).add(flagged);
            pol_entry(
                summary
                    .antspw
                    .entry(row.antenna)
                    .or_default()
                    .entry(row.spw)
                    .or_default(),
                pol,
            )
            .add(flagged);
        }
    }

    summary.all.finalise();
    summary
        .ant
        .values_mut()
        .chain(summary.spw.values_mut())
        .chain(summary.antspw.values_mut().flat_map(|spws| spws.values_mut()))
        .flat_map(|pols| pols.iter_mut())
        .for_each(FlagCount::finalise);

    let mut totals = vec![];
    let mut flags = vec![];
    let mut fractions = vec![];
    for pols in summary.ant.values() {
        let total: f64 = pols.iter().map(|p| p.total).sum();
        let flagged: f64 = pols.iter().map(|p| p.flagged).sum();
        totals.push(total);
        flags.push(flagged);
        fractions.push(if total > 0.0 { flagged / total } else { 0.0 });
    }
    summary.antmedian = AntMedian {
        total: median(&mut totals),
        flagged: median(&mut flags),
        fraction: median(&mut fractions),
        number: fractions.len(),
    };

    summary
}

/// The median, averaging the middle two values of an even-length list. An
/// empty list has a median of 0.
fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
