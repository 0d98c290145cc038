// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reference antenna ranking.
//!
//! Each enabled heuristic gives every antenna a score between 0 and the
//! number of antennas; the scores are summed and the antennas sorted by
//! descending score.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use vec1::Vec1;

use super::HeuristicsError;
use crate::domain::Antenna;

/// Antennas close to the centre of the array score highest:
/// `(1 - d / d_max) * n_ants`.
pub fn geometry_scores(antennas: &[&Antenna]) -> Result<IndexMap<String, f64>, HeuristicsError> {
    if antennas.is_empty() {
        return Err(HeuristicsError::NoAntennas);
    }
    let n = antennas.len() as f64;
    let mut centre = [0.0; 3];
    for antenna in antennas {
        for (c, p) in centre.iter_mut().zip(antenna.position) {
            *c += p / n;
        }
    }

    let distances: Vec<f64> = antennas
        .iter()
        .map(|a| {
            a.position
                .iter()
                .zip(centre)
                .map(|(p, c)| (p - c).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .collect();
    let d_max = distances.iter().cloned().fold(0.0, f64::max);

    Ok(antennas
        .iter()
        .zip(distances)
        .map(|(a, d)| {
            let score = if d_max > 0.0 { (1.0 - d / d_max) * n } else { n };
            debug!("Geometry score of {}: {score:.3} (distance {d:.1} m)", a.name);
            (a.name.clone(), score)
        })
        .collect())
}

/// The counts of a `flagdata(mode='summary')` report for one antenna.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AntennaFlags {
    pub flagged: f64,
    pub total: f64,
}

/// The per-antenna part of a `flagdata(mode='summary')` report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagdataSummary {
    #[serde(default)]
    pub antenna: BTreeMap<String, AntennaFlags>,
}

impl FlagdataSummary {
    pub fn from_json(value: &serde_json::Value) -> Result<FlagdataSummary, HeuristicsError> {
        serde_json::from_value(value.clone()).map_err(|e| HeuristicsError::BadToolkitOutput {
            what: "flagging summary",
            err: e.to_string(),
        })
    }
}

/// Antennas with the most unflagged data score highest:
/// `good / good_max * n_ants`. Antennas missing from the summary score 0.
pub fn flagging_scores(antennas: &[&str], summary: &FlagdataSummary) -> IndexMap<String, f64> {
    let n = antennas.len() as f64;
    let good: Vec<f64> = antennas
        .iter()
        .map(|a| {
            summary
                .antenna
                .get(*a)
                .map(|f| (f.total - f.flagged).max(0.0))
                .unwrap_or(0.0)
        })
        .collect();
    let good_max = good.iter().cloned().fold(0.0, f64::max);

    antennas
        .iter()
        .zip(good)
        .map(|(a, g)| {
            let score = if good_max > 0.0 { g / good_max * n } else { 0.0 };
            debug!("Flagging score of {a}: {score:.3}");
            (a.to_string(), score)
        })
        .collect()
}

/// Sum the scores of each antenna and sort by descending score. Ties keep the
/// order of `antennas`. Antennas in `ignore` aren't ranked.
pub fn rank_antennas(
    antennas: &[&str],
    scores: &[IndexMap<String, f64>],
    ignore: &[String],
) -> Result<Vec1<String>, HeuristicsError> {
    let mut totals: Vec<(&str, f64)> = antennas
        .iter()
        .filter(|a| !ignore.iter().any(|i| i == *a))
        .map(|a| {
            let total: f64 = scores.iter().filter_map(|s| s.get(*a)).sum();
            (*a, total)
        })
        .collect();
    // A stable sort keeps ties in antenna order.
    totals.sort_by(|a, b| b.1.total_cmp(&a.1));

    let ranked: Vec<String> = totals.into_iter().map(|(a, _)| a.to_string()).collect();
    Vec1::try_from_vec(ranked).map_err(|_| HeuristicsError::NoAntennasLeft)
}
