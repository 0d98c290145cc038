// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pipeline tasks.
//!
//! Every task comes as a pair: `*Args`, where everything is optional and
//! which can be merged with arguments from a file, and `*Inputs`, which is
//! what `*Args` becomes once the defaults that depend on the [`Context`] have
//! been resolved. Values that depend on a measurement set are kept per
//! measurement set, in the same order as `vis`.
//!
//! Running a task is a stage: [`execute_stage`] prepares and analyses the
//! task once per measurement set (or once, for multi-vis tasks), and the
//! resulting [`StageResults`] are then accepted into the context.

mod applycal;
mod bandpass;
mod error;
mod exportdata;
mod gaincal;
mod gencal;
mod importdata;
mod lowgainflag;
mod makeimages;
mod refant;
#[cfg(test)]
mod tests;

pub use applycal::{ApplycalArgs, ApplycalInputs};
pub use bandpass::{BandpassArgs, BandpassInputs};
pub use error::TaskError;
pub use exportdata::{ExportdataArgs, ExportdataInputs};
pub use gaincal::{GaincalArgs, GaincalInputs};
pub use gencal::{GencalArgs, GencalInputs};
pub use importdata::{ImportdataArgs, ImportdataInputs};
pub use lowgainflag::{LowgainflagArgs, LowgainflagInputs};
pub use makeimages::{ImageTarget, MakeimagesArgs, MakeimagesInputs};
pub use refant::{RefantArgs, RefantInputs};

use std::path::Path;

use chrono::Utc;
use itertools::Itertools;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    callibrary::{CalFrom, CalTo},
    context::Context,
    domain::MeasurementSet,
    executor::{ArgValue, Executor, JobRequest, Toolkit},
    logging::LogCapture,
    results::{Analysed, Prepared, QaScore, StageResults},
};

pub trait Task: Serialize + Sync + Sized {
    /// The pipeline name of the task, e.g. `hif_gaincal`.
    fn name(&self) -> &'static str;

    fn vis(&self) -> &[String];

    /// Multi-vis tasks are prepared once for all of their measurement sets.
    fn is_multi_vis(&self) -> bool {
        false
    }

    /// These inputs, restricted to the `i`th measurement set.
    fn for_vis(&self, i: usize) -> Self;

    /// The call that reproduces this task.
    fn pipeline_casa_task(&self) -> &str;

    fn prepare(&self, context: &Context, executor: &Executor) -> Result<Prepared, TaskError>;

    fn analyse(&self, prepared: Prepared, dry_run: bool) -> Analysed {
        prepared.analyse(dry_run)
    }

    fn inputs_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Task arguments as given by a user.
pub trait TaskArgs: Sized {
    type Inputs: Task;

    /// Combine two sets of arguments, preferring those of `self`.
    fn merge(self, other: Self) -> Self;

    /// Resolve the defaults of the arguments against the context.
    fn into_inputs(self, context: &Context) -> Result<Self::Inputs, TaskError>;
}

/// What happened to a stage that was run with [`run_task`].
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage_number: usize,
    pub task: &'static str,

    /// The recipe should stop after this stage.
    pub import_only: bool,

    /// Not available for dry runs, as their results aren't accepted.
    pub qa: Option<QaScore>,
}

/// Run a task as a new stage. Nothing in the context changes if preparing the
/// task fails, other than the stage's header in the commands log.
pub fn execute_stage<T: Task>(
    task: &T,
    context: &mut Context,
    toolkit: &dyn Toolkit,
    dry_run: bool,
    hpc: bool,
) -> Result<StageResults, TaskError> {
    let start = Utc::now();
    let call = task.pipeline_casa_task().to_string();
    let stage = context.begin_stage(&call, dry_run)?;
    info!("Equivalent CASA call: {call}");
    let capture = LogCapture::start();

    let shared: &Context = context;
    let run_one = |t: &T| -> Result<Analysed, TaskError> {
        let executor = shared.executor(toolkit, dry_run);
        let prepared = t.prepare(shared, &executor)?;
        Ok(t.analyse(prepared, dry_run))
    };
    let analysed: Result<Vec<Analysed>, TaskError> = if task.is_multi_vis() {
        run_one(task).map(|a| vec![a])
    } else {
        let per_vis: Vec<T> = (0..task.vis().len()).map(|i| task.for_vis(i)).collect();
        if hpc && per_vis.len() > 1 {
            debug!("Preparing {} measurement sets in parallel", per_vis.len());
            per_vis.par_iter().map(run_one).collect()
        } else {
            per_vis.iter().map(run_one).collect()
        }
    };
    let analysed = analysed.map_err(|err| {
        error!("Stage {stage} ({}) failed: {err}", task.name());
        err
    })?;

    let num_subtasks = analysed.len();
    let mut results = StageResults::new(stage, task.name(), call, task.inputs_json(), start, analysed);
    results.logrecords = capture.finish();
    context.finish_stage(stage, num_subtasks);
    Ok(results)
}

/// Resolve a task's arguments, run it as a new stage and (unless this is a
/// dry run) accept its results into the context.
pub fn run_task<A: TaskArgs>(
    args: A,
    context: &mut Context,
    toolkit: &dyn Toolkit,
    dry_run: bool,
    hpc: bool,
) -> Result<StageReport, TaskError> {
    let inputs = args.into_inputs(context)?;
    let results = execute_stage(&inputs, context, toolkit, dry_run, hpc)?;
    let mut report = StageReport {
        stage_number: results.stage_number,
        task: inputs.name(),
        import_only: results.import_only(),
        qa: None,
    };
    if dry_run {
        info!("Dry run; not accepting the results of stage {}", report.stage_number);
    } else {
        report.qa = Some(context.accept(results)?);
    }
    Ok(report)
}

/// The call string of a task from the arguments a user gave; arguments that
/// weren't given (and flags that are off) are left out.
pub(crate) fn pipeline_call<A: Serialize>(task: &str, args: &A) -> String {
    let mut job = JobRequest::new(task);
    if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(args) {
        for (key, value) in map {
            if value == serde_json::Value::Bool(false) {
                continue;
            }
            if let Some(value) = ArgValue::from_json(&value) {
                job = job.arg(key, value);
            }
        }
    }
    job.to_string()
}

/// The measurement sets a task works on: the given ones, or all registered
/// measurement sets. All of them must be registered; they're returned by
/// their registered names, even when given by basename.
pub(crate) fn resolve_vis(
    task: &'static str,
    vis: Option<Vec<String>>,
    context: &Context,
) -> Result<Vec<String>, TaskError> {
    let vis = match vis {
        Some(vis) if !vis.is_empty() => vis,
        _ => context.observing_run.ms_names(),
    };
    if vis.is_empty() {
        return Err(TaskError::NoVis { task });
    }
    let mut names = Vec::with_capacity(vis.len());
    for v in &vis {
        names.push(context.observing_run.get_ms(v)?.name.clone());
    }
    Ok(names)
}

pub(crate) fn intent_list(intent: &str) -> Vec<&str> {
    intent
        .split(',')
        .map(|i| i.trim().trim_matches('*'))
        .filter(|i| !i.is_empty())
        .collect()
}

/// The names of the fields observed with any of the comma-separated intents.
pub(crate) fn fields_with_intent(ms: &MeasurementSet, intent: &str) -> String {
    let wanted = intent_list(intent);
    ms.fields
        .iter()
        .filter(|f| wanted.is_empty() || wanted.iter().any(|i| f.intents.contains(*i)))
        .map(|f| f.name.as_str())
        .unique()
        .join(",")
}

/// The science spectral windows observed with any of the comma-separated
/// intents, e.g. "1~3".
pub(crate) fn science_spws(ms: &MeasurementSet, intent: &str) -> String {
    let wanted = intent_list(intent);
    let ids = ms
        .spectral_windows
        .iter()
        .filter(|spw| spw.is_science())
        .filter(|spw| wanted.is_empty() || wanted.iter().any(|i| spw.intents.contains(*i)))
        .map(|spw| spw.id)
        .join(",");
    crate::selection::find_ranges(&ids)
}

/// The reference antenna(s) of a measurement set, or nothing (with a
/// warning) if none have been chosen.
pub(crate) fn default_refant(ms: &MeasurementSet) -> String {
    match &ms.reference_antenna {
        Some(refant) => refant.clone(),
        None => {
            warn!("No reference antenna has been chosen for {}", ms.name);
            String::new()
        }
    }
}

/// Replace anything that doesn't belong in a file name with an underscore.
pub(crate) fn sanitize(s: &str) -> String {
    lazy_static::lazy_static! {
        static ref ILLEGAL: regex::Regex = regex::Regex::new(r"[^A-Za-z0-9_.+\-]").expect("a valid regex");
    }
    ILLEGAL.replace_all(s, "_").into_owned()
}

/// The observing unit set ID, made fit for file names, e.g.
/// `uid___A001_X1_X2`.
pub(crate) fn ous_prefix(context: &Context) -> Option<String> {
    context
        .project
        .ous_id
        .as_deref()
        .filter(|id| !id.is_empty() && *id != crate::constants::UNKNOWN_OUS)
        .map(|id| id.replace([':', '/'], "_"))
}

/// The name of a caltable made by a stage, inside the output directory, e.g.
/// `<dir>/x.ms.hif_gaincal.s3.spw1_2.solintint.gpcal.tbl`.
pub(crate) fn caltable_name(context: &Context, vis: &str, task: &str, stage: usize, suffix: &str) -> String {
    let basename = Path::new(vis)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(vis);
    context
        .output_dir
        .join(format!("{basename}.{task}.s{stage}.{}.tbl", sanitize(suffix)))
        .display()
        .to_string()
}

/// Add the calibrations currently active for `calto` to a solver job, in the
/// order they'd be applied.
pub(crate) fn with_preapply(
    job: JobRequest,
    context: &Context,
    calto: &CalTo,
) -> Result<JobRequest, TaskError> {
    let calstate = context
        .callibrary
        .get_calstate(&context.observing_run, calto, &[])?;
    let mut calfroms: Vec<&CalFrom> = vec![];
    for (_, cell) in calstate.cells() {
        for cf in cell {
            if !calfroms.contains(&cf) {
                calfroms.push(cf);
            }
        }
    }
    if !calfroms.is_empty() {
        debug!(
            "Pre-applying {} for {}",
            calfroms.iter().map(|cf| cf.gaintable()).join(", "),
            calto.vis()
        );
    }

    Ok(job
        .arg(
            "gaintable",
            calfroms.iter().map(|cf| cf.gaintable().to_string()).collect::<Vec<_>>(),
        )
        .arg(
            "gainfield",
            calfroms.iter().map(|cf| cf.gainfield().to_string()).collect::<Vec<_>>(),
        )
        .arg(
            "interp",
            calfroms.iter().map(|cf| cf.interp().to_string()).collect::<Vec<_>>(),
        )
        .arg(
            "spwmap",
            calfroms.iter().map(|cf| cf.spwmap().to_vec()).collect::<Vec<_>>(),
        ))
}

/// The `i`th value as a one-element list.
pub(crate) fn pick<T: Clone>(values: &[T], i: usize) -> Vec<T> {
    values.get(i).cloned().into_iter().collect()
}
