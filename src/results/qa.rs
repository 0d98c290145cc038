// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Quality assessment of stage results.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use super::{Outcome, StageResults};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QaStatus {
    Pass,
    Fail,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaScore {
    /// Between 0 (bad) and 1 (good), if a score makes sense.
    pub score: Option<f64>,
    pub status: QaStatus,
    pub message: String,
}

impl QaScore {
    fn pass<S: Into<String>>(score: f64, message: S) -> QaScore {
        QaScore {
            score: Some(score),
            status: QaStatus::Pass,
            message: message.into(),
        }
    }

    fn fail<S: Into<String>>(score: f64, message: S) -> QaScore {
        QaScore {
            score: Some(score),
            status: QaStatus::Fail,
            message: message.into(),
        }
    }

    fn unknown<S: Into<String>>(message: S) -> QaScore {
        QaScore {
            score: None,
            status: QaStatus::Unknown,
            message: message.into(),
        }
    }
}

pub fn score_outcome(outcome: &Outcome) -> QaScore {
    match outcome {
        Outcome::Import(import) if import.mses.is_empty() => QaScore::fail(0.0, "No measurement sets were imported"),
        Outcome::Import(import) => QaScore::pass(1.0, format!("{} measurement set(s) imported", import.mses.len())),

        Outcome::Calibration(cal) if cal.pool.is_empty() => {
            QaScore::unknown(format!("No calibrations were made for {}", cal.vis))
        }
        Outcome::Calibration(cal) if cal.error.is_empty() => QaScore::pass(
            1.0,
            format!("All {} calibration(s) for {} were made", cal.pool.len(), cal.vis),
        ),
        Outcome::Calibration(cal) => QaScore::fail(
            cal.final_.len() as f64 / cal.pool.len() as f64,
            format!(
                "{} of {} calibration(s) for {} are missing",
                cal.error.len(),
                cal.pool.len(),
                cal.vis
            ),
        ),

        Outcome::ApplyCal(applycal) if applycal.applied.is_empty() => {
            QaScore::unknown(format!("Nothing was applied to {}", applycal.vis))
        }
        Outcome::ApplyCal(applycal) => QaScore::pass(
            1.0,
            format!("{} application(s) made to {}", applycal.applied.len(), applycal.vis),
        ),

        Outcome::RefAnt(refant) => QaScore::pass(
            1.0,
            format!("Reference antennas for {}: {}", refant.vis, refant.refant.join(",")),
        ),

        Outcome::Flagging(flagging) if flagging.num_antennas == 0 => {
            QaScore::unknown(format!("No antennas were assessed for {}", flagging.vis))
        }
        Outcome::Flagging(flagging) => {
            let score = 1.0 - flagging.flagged_antennas.len() as f64 / flagging.num_antennas as f64;
            let message = format!(
                "{} of {} antenna(s) of {} flagged",
                flagging.flagged_antennas.len(),
                flagging.num_antennas,
                flagging.vis
            );
            if score >= 0.5 {
                QaScore::pass(score, message)
            } else {
                QaScore::fail(score, message)
            }
        }

        Outcome::Image(image) if image.images.is_empty() => QaScore::unknown("No images were made"),
        Outcome::Image(image) => QaScore::pass(1.0, format!("{} image(s) made", image.images.len())),

        Outcome::Export(export) => QaScore::pass(1.0, format!("{} product(s) exported", export.files.len())),
    }
}

/// Score a whole stage: the lowest score of its outcomes. Any failure fails
/// the stage; the stage passes if anything passed.
pub fn score_stage(results: &StageResults) -> QaScore {
    let scores: Vec<QaScore> = results.outcomes().iter().map(score_outcome).collect();
    if scores.is_empty() {
        return QaScore::unknown("The stage produced no results");
    }

    let status = if scores.iter().any(|s| s.status == QaStatus::Fail) {
        QaStatus::Fail
    } else if scores.iter().any(|s| s.status == QaStatus::Pass) {
        QaStatus::Pass
    } else {
        QaStatus::Unknown
    };
    let score = scores.iter().filter_map(|s| s.score).reduce(f64::min);
    let message = scores.into_iter().map(|s| s.message).collect::<Vec<_>>().join("; ");

    QaScore { score, status, message }
}
