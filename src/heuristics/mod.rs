// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Scoring heuristics. These are pure functions over metadata and toolkit
//! summaries; they never touch the context.

mod calflags;
mod error;
mod refant;
#[cfg(test)]
mod tests;

pub use calflags::{get_cal_flagged_soln, AntMedian, CalFlagSummary, CalTableRow, FlagCount};
pub use error::HeuristicsError;
pub use refant::{flagging_scores, geometry_scores, rank_antennas, AntennaFlags, FlagdataSummary};
