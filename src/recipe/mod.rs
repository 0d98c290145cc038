// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Recipes: a list of stages run one after the other against the same
//! context.
//!
//! A recipe is a TOML (or JSON) file like
//!
//! ```toml
//! name = "hifa_cal"
//! mode = "halt"
//!
//! [[stage]]
//! task = "importdata"
//! vis = ["uid___A002_X1.ms"]
//!
//! [[stage]]
//! task = "gaincal"
//! calmode = "p"
//! ```
//!
//! where every stage takes the same arguments as the task's subcommand.


use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::{
    context::{Context, ContextError},
    executor::Toolkit,
    tasks::{
        run_task, ApplycalArgs, BandpassArgs, ExportdataArgs, GaincalArgs, GencalArgs, ImportdataArgs,
        LowgainflagArgs, MakeimagesArgs, RefantArgs, StageReport, TaskError,
    },
    PROGRESS_BARS,
};

/// What happens when a stage fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Stop the recipe.
    #[default]
    Halt,

    /// Log the failure and run the next stage.
    Continue,
}

/// A stage of a recipe: the task to run and its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "task", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecipeStage {
    Importdata(ImportdataArgs),
    Refant(RefantArgs),
    Gaincal(GaincalArgs),
    Bandpass(BandpassArgs),
    Gencal(GencalArgs),
    Applycal(ApplycalArgs),
    Lowgainflag(LowgainflagArgs),
    Makeimages(MakeimagesArgs),
    Exportdata(ExportdataArgs),
}

impl RecipeStage {
    /// The task as it's named in a recipe, e.g. "gaincal".
    pub fn task(&self) -> &'static str {
        self.into()
    }

    fn run(
        self,
        context: &mut Context,
        toolkit: &dyn Toolkit,
        dry_run: bool,
        hpc: bool,
    ) -> Result<StageReport, TaskError> {
        match self {
            RecipeStage::Importdata(args) => run_task(args, context, toolkit, dry_run, hpc),
            RecipeStage::Refant(args) => run_task(args, context, toolkit, dry_run, hpc),
            RecipeStage::Gaincal(args) => run_task(args, context, toolkit, dry_run, hpc),
            RecipeStage::Bandpass(args) => run_task(args, context, toolkit, dry_run, hpc),
            RecipeStage::Gencal(args) => run_task(args, context, toolkit, dry_run, hpc),
            RecipeStage::Applycal(args) => run_task(args, context, toolkit, dry_run, hpc),
            RecipeStage::Lowgainflag(args) => run_task(args, context, toolkit, dry_run, hpc),
            RecipeStage::Makeimages(args) => run_task(args, context, toolkit, dry_run, hpc),
            RecipeStage::Exportdata(args) => run_task(args, context, toolkit, dry_run, hpc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,

    #[serde(default)]
    pub mode: RunMode,

    #[serde(rename = "stage", default)]
    pub stages: Vec<RecipeStage>,
}

impl Recipe {
    /// Read a recipe. The format is determined by the file extension.
    pub fn read(file: &Path) -> Result<Recipe, RecipeError> {
        debug!("Reading recipe {}", file.display());
        let contents = std::fs::read_to_string(file).map_err(|err| RecipeError::Read {
            file: file.to_path_buf(),
            err,
        })?;
        let parse_err = |err: String| RecipeError::Parse {
            file: file.to_path_buf(),
            err,
        };
        let ext = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        let recipe: Recipe = match ext.as_deref() {
            Some("toml") => toml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
            Some("json") => serde_json::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
            _ => {
                return Err(RecipeError::UnsupportedExt {
                    file: file.to_path_buf(),
                })
            }
        };
        if recipe.stages.is_empty() {
            return Err(RecipeError::NoStages { name: recipe.name });
        }
        Ok(recipe)
    }
}

/// A stage that failed in a `continue` recipe.
#[derive(Debug)]
pub struct StageFailure {
    /// 1-indexed position in the recipe.
    pub index: usize,
    pub task: &'static str,
    pub err: TaskError,
}

/// How a recipe ended, when it didn't fail.
#[derive(Debug)]
pub enum RecipeOutcome {
    /// Every stage was attempted.
    Completed {
        reports: Vec<StageReport>,
        failures: Vec<StageFailure>,
    },

    /// An import stage asked for the recipe to end after it.
    ImportOnly { reports: Vec<StageReport> },
}

impl RecipeOutcome {
    pub fn reports(&self) -> &[StageReport] {
        match self {
            RecipeOutcome::Completed { reports, .. } => reports,
            RecipeOutcome::ImportOnly { reports } => reports,
        }
    }
}

/// Run every stage of a recipe. Unless this is a dry run, the context is saved
/// (to `context_file`, or its default file) after every accepted stage.
pub fn run_recipe(
    recipe: Recipe,
    context: &mut Context,
    toolkit: &dyn Toolkit,
    dry_run: bool,
    hpc: bool,
    context_file: Option<&Path>,
) -> Result<RecipeOutcome, RecipeError> {
    info!(
        "Running recipe '{}' ({} stages, mode {})",
        recipe.name,
        recipe.stages.len(),
        recipe.mode
    );
    context.project.recipe_name = Some(recipe.name.clone());

    let pb = ProgressBar::with_draw_target(
        Some(recipe.stages.len() as _),
        if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg:17}: [{wide_bar:.blue}] {pos:2}/{len:2} stages ({elapsed_precise}<{eta_precise})")
            .unwrap()
            .progress_chars("=> "),
    )
    .with_position(0);

    let mut reports = vec![];
    let mut failures = vec![];
    for (i, stage) in recipe.stages.into_iter().enumerate() {
        let index = i + 1;
        let task = stage.task();
        pb.set_message(task);

        match stage.run(context, toolkit, dry_run, hpc) {
            Ok(report) => {
                if !dry_run {
                    context.save(context_file)?;
                }
                let import_only = report.import_only;
                reports.push(report);
                if import_only {
                    pb.abandon_with_message("Import only");
                    info!("Stopping recipe '{}' after the import", recipe.name);
                    return Ok(RecipeOutcome::ImportOnly { reports });
                }
            }

            Err(err) => match recipe.mode {
                RunMode::Halt => {
                    pb.abandon_with_message("Failed");
                    error!("Recipe '{}' halted at stage {index} ({task})", recipe.name);
                    return Err(RecipeError::StageFailed { index, task, err });
                }
                RunMode::Continue => {
                    warn!("Stage {index} ({task}) failed; continuing: {err}");
                    failures.push(StageFailure { index, task, err });
                }
            },
        }
        pb.inc(1);
    }
    pb.finish_with_message("Done");

    info!(
        "Recipe '{}' complete: {} stage(s) run, {} failed",
        recipe.name,
        reports.len(),
        failures.len()
    );
    Ok(RecipeOutcome::Completed { reports, failures })
}

#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("Couldn't read recipe '{file}': {err}")]
    Read { file: PathBuf, err: std::io::Error },

    #[error("Couldn't parse recipe '{file}': {err}")]
    Parse { file: PathBuf, err: String },

    #[error("Recipe '{file}' doesn't have a recognised extension; valid extensions are: toml, json")]
    UnsupportedExt { file: PathBuf },

    #[error("Recipe '{name}' doesn't have any stages")]
    NoStages { name: String },

    #[error("Stage {index} ({task}) failed: {err}")]
    StageFailed {
        index: usize,
        task: &'static str,
        err: TaskError,
    },

    #[error(transparent)]
    Context(#[from] ContextError),
}
