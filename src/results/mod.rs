// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The results of pipeline stages.
//!
//! A task's `prepare` gives a [`Prepared`] outcome, which can only become
//! [`Analysed`] by being analysed. Only analysed outcomes can make up a
//! [`StageResults`], and only [`merge_with_context`] changes the context.

pub mod qa;

pub use qa::{QaScore, QaStatus};

use std::{
    fmt,
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::{
    callibrary::CalApplication,
    context::{Context, ContextError},
    domain::MeasurementSet,
    heuristics::CalFlagSummary,
    logging::LogRecord,
};

/// Uniquely identifies one [`StageResults`], so that the same results can't
/// be accepted into a context twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultId(String);

static NEXT_RESULT: AtomicU64 = AtomicU64::new(0);

impl ResultId {
    pub fn new() -> ResultId {
        let count = NEXT_RESULT.fetch_add(1, Ordering::Relaxed);
        ResultId(format!(
            "{}-{}-{count}",
            Utc::now().format("%Y%m%dT%H%M%S%.9f"),
            std::process::id()
        ))
    }
}

impl Default for ResultId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Calibrations made by a solver task. Every application starts in `pool`;
/// analysis sorts each one into `final_` (usable) or `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResults {
    pub vis: String,

    pub pool: Vec<CalApplication>,

    #[serde(rename = "final")]
    pub final_: Vec<CalApplication>,

    pub error: Vec<CalApplication>,
}

impl CalibrationResults {
    pub fn new<S: Into<String>>(vis: S) -> CalibrationResults {
        CalibrationResults {
            vis: vis.into(),
            ..Default::default()
        }
    }

    /// Applications whose caltables exist (or all of them in a dry run) are
    /// final, the rest are errors.
    fn analyse(&mut self, dry_run: bool) {
        let (final_, error): (Vec<_>, Vec<_>) = self
            .pool
            .iter()
            .cloned()
            .partition(|app| dry_run || app.exists());
        self.final_ = final_;
        self.error = error;
        for app in &self.error {
            warn!("Caltable(s) {} were not produced", app.gaintables().join(", "));
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyCalResults {
    pub vis: String,
    pub applied: Vec<CalApplication>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResults {
    pub mses: Vec<MeasurementSet>,

    /// Stop the recipe after this stage.
    #[serde(default)]
    pub import_only: bool,

    #[serde(default)]
    pub ous_id: Option<String>,

    #[serde(default)]
    pub session: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefAntResults {
    pub vis: String,

    /// Best first.
    pub refant: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlaggingResults {
    pub vis: String,
    pub caltable: Option<String>,
    pub num_antennas: usize,
    pub flagged_antennas: Vec<String>,
    pub statistics: Option<CalFlagSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Calibrator,
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageProduct {
    pub name: String,
    pub imtype: ImageType,
    pub field: String,
    pub spw: String,
    pub intent: String,
    pub vis: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageResults {
    pub images: Vec<ImageProduct>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportResults {
    pub products_dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// What a task did, for one measurement set (or all of them, for multi-vis
/// tasks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Import(ImportResults),
    Calibration(CalibrationResults),
    ApplyCal(ApplyCalResults),
    RefAnt(RefAntResults),
    Flagging(FlaggingResults),
    Image(ImageResults),
    Export(ExportResults),
}

/// An outcome that hasn't been analysed yet.
#[derive(Debug)]
pub struct Prepared {
    outcome: Outcome,
}

impl Prepared {
    pub fn new(outcome: Outcome) -> Prepared {
        Prepared { outcome }
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Check the products of the outcome. This never touches the context.
    pub fn analyse(mut self, dry_run: bool) -> Analysed {
        if let Outcome::Calibration(calibration) = &mut self.outcome {
            calibration.analyse(dry_run);
        }
        Analysed {
            outcome: self.outcome,
        }
    }
}

/// An analysed outcome, ready to be part of a stage's results.
#[derive(Debug)]
pub struct Analysed {
    outcome: Outcome,
}

impl Analysed {
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamps {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The results of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResults {
    pub id: ResultId,
    pub stage_number: usize,

    /// The name of the task, e.g. `hif_gaincal`.
    pub task: String,

    /// The call that reproduces this stage.
    pub pipeline_casa_task: String,

    pub inputs: serde_json::Value,
    pub timestamps: Timestamps,

    /// Warnings and errors logged while the stage ran.
    pub logrecords: Vec<LogRecord>,

    pub qa: Option<QaScore>,

    outcomes: Vec<Outcome>,
}

impl StageResults {
    pub(crate) fn new(
        stage_number: usize,
        task: &str,
        pipeline_casa_task: String,
        inputs: serde_json::Value,
        start: DateTime<Utc>,
        analysed: Vec<Analysed>,
    ) -> StageResults {
        StageResults {
            id: ResultId::new(),
            stage_number,
            task: task.to_string(),
            pipeline_casa_task,
            inputs,
            timestamps: Timestamps {
                start,
                end: Utc::now(),
            },
            logrecords: vec![],
            qa: None,
            outcomes: analysed.into_iter().map(|a| a.outcome).collect(),
        }
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Whether the recipe should stop after this stage.
    pub fn import_only(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, Outcome::Import(ImportResults { import_only: true, .. })))
    }
}

/// Apply the effects of a stage's results to the context. This is the only
/// place the context changes for a stage. It's not guarded; merging the same
/// results twice duplicates their effects (use [`Context::accept`] for that).
pub fn merge_with_context(results: &StageResults, context: &mut Context) -> Result<(), ContextError> {
    for outcome in &results.outcomes {
        match outcome {
            Outcome::Import(import) => {
                for ms in &import.mses {
                    info!("Registering {} with the context", ms.name);
                    context.observing_run.add_ms(ms.clone())?;
                }
                if let Some(ous_id) = &import.ous_id {
                    context.project.ous_id = Some(ous_id.clone());
                }
                if let Some(session) = &import.session {
                    context.project.session = Some(session.clone());
                }
            }

            Outcome::Calibration(calibration) => {
                for app in &calibration.final_ {
                    debug!("Adding {app} to the calibration library");
                    context.callibrary.add_application(&context.observing_run, app)?;
                }
            }

            Outcome::ApplyCal(applycal) => {
                for app in &applycal.applied {
                    context
                        .callibrary
                        .mark_as_applied(&context.observing_run, &app.calto, &app.calfrom)?;
                }
            }

            Outcome::RefAnt(refant) => {
                let ms = context.observing_run.get_ms_mut(&refant.vis)?;
                let refant = refant.refant.iter().join(",");
                info!("Setting the reference antennas of {} to {refant}", ms.name);
                ms.reference_antenna = Some(refant);
            }

            Outcome::Flagging(flagging) => {
                if !flagging.flagged_antennas.is_empty() {
                    let ms = context.observing_run.get_ms_mut(&flagging.vis)?;
                    info!(
                        "Removing antennas {} from {}",
                        flagging.flagged_antennas.join(", "),
                        ms.name
                    );
                    let ids: Vec<usize> = ms
                        .antennas
                        .iter()
                        .filter(|a| flagging.flagged_antennas.contains(&a.name))
                        .map(|a| a.id)
                        .collect();
                    let name = ms.name.clone();
                    ms.remove_antennas(&flagging.flagged_antennas);
                    // Their cells can't be selected any more.
                    context.callibrary.remove_antennas(&name, &ids);
                }
            }

            Outcome::Image(image) => {
                context.images.extend(image.images.iter().cloned());
            }

            Outcome::Export(_) => (),
        }
    }
    Ok(())
}
