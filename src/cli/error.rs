// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all calpipe-related errors. This should be the *only*
//! error enum that is publicly visible.

use thiserror::Error;

use crate::{
    callibrary::CalLibraryError,
    context::ContextError,
    domain::DomainError,
    executor::{ExecutorError, ToolkitError},
    heuristics::HeuristicsError,
    io::GlobError,
    manifest::ManifestError,
    recipe::RecipeError,
    tasks::TaskError,
};

const URL: &str = "https://calpipe.readthedocs.io/en/latest";

/// The *only* publicly visible error from calpipe. Each error message should
/// include the URL, unless it's "generic".
#[derive(Error, Debug)]
pub enum CalpipeError {
    /// An error related to the pipeline context.
    #[error("{0}\n\nSee for more info: {URL}/defs/context.html")]
    Context(String),

    /// An error related to the calibration library.
    #[error("{0}\n\nSee for more info: {URL}/defs/callibrary.html")]
    CalLibrary(String),

    /// An error related to the measurement sets of an observing run.
    #[error("{0}\n\nSee for more info: {URL}/defs/observing_run.html")]
    Domain(String),

    /// An error related to the inputs of a task.
    #[error("{0}\n\nSee for more info: {URL}/user/tasks.html")]
    Task(String),

    /// An error related to running toolkit jobs.
    #[error("{0}\n\nSee for more info: {URL}/defs/toolkit.html")]
    Toolkit(String),

    /// An error related to the heuristics.
    #[error("{0}\n\nSee for more info: {URL}/defs/heuristics.html")]
    Heuristics(String),

    /// An error related to exported products.
    #[error("{0}\n\nSee for more info: {URL}/user/exportdata.html")]
    Export(String),

    /// An error related to recipes.
    #[error("{0}\n\nSee for more info: {URL}/user/recipes.html")]
    Recipe(String),

    /// An error related to argument files.
    #[error("{0}\n\nSee for more info: {URL}/defs/arg_file.html")]
    ArgFile(String),

    /// A generic error that can't be clarified further with documentation, e.g.
    /// IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

impl From<TaskError> for CalpipeError {
    fn from(e: TaskError) -> Self {
        let s = e.to_string();
        match e {
            TaskError::NoVis { .. }
            | TaskError::InvalidInput { .. }
            | TaskError::NoMetadata { .. }
            | TaskError::MissingOutput { .. } => Self::Task(s),
            TaskError::Write { .. } => Self::Generic(s),
            TaskError::Executor(e) => Self::from(e),
            TaskError::CalLibrary(e) => Self::from(e),
            TaskError::Domain(e) => Self::from(e),
            TaskError::Heuristics(e) => Self::from(e),
            TaskError::Context(e) => Self::from(e),
            TaskError::Glob(e) => Self::from(e),
            TaskError::Manifest(e) => Self::from(e),
        }
    }
}

impl From<RecipeError> for CalpipeError {
    fn from(e: RecipeError) -> Self {
        let s = e.to_string();
        match e {
            RecipeError::Read { .. }
            | RecipeError::Parse { .. }
            | RecipeError::UnsupportedExt { .. }
            | RecipeError::NoStages { .. } => Self::Recipe(s),
            // Keep the stage in the message, but point to the docs of the
            // underlying problem.
            RecipeError::StageFailed { index, task, err } => match Self::from(err) {
                Self::Generic(e) => Self::Generic(format!("Stage {index} ({task}) failed: {e}")),
                e => Self::Recipe(format!("Stage {index} ({task}) failed: {e}")),
            },
            RecipeError::Context(e) => Self::from(e),
        }
    }
}

impl From<ContextError> for CalpipeError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::CalLibrary(e) => Self::from(e),
            ContextError::Domain(e) => Self::from(e),
            ContextError::Executor(e) => Self::from(e),
            _ => Self::Context(e.to_string()),
        }
    }
}

impl From<CalLibraryError> for CalpipeError {
    fn from(e: CalLibraryError) -> Self {
        match e {
            CalLibraryError::Domain(e) => Self::from(e),
            _ => Self::CalLibrary(e.to_string()),
        }
    }
}

impl From<DomainError> for CalpipeError {
    fn from(e: DomainError) -> Self {
        Self::Domain(e.to_string())
    }
}

impl From<ExecutorError> for CalpipeError {
    fn from(e: ExecutorError) -> Self {
        Self::Toolkit(e.to_string())
    }
}

impl From<ToolkitError> for CalpipeError {
    fn from(e: ToolkitError) -> Self {
        Self::Toolkit(e.to_string())
    }
}

impl From<HeuristicsError> for CalpipeError {
    fn from(e: HeuristicsError) -> Self {
        Self::Heuristics(e.to_string())
    }
}

impl From<ManifestError> for CalpipeError {
    fn from(e: ManifestError) -> Self {
        Self::Export(e.to_string())
    }
}

impl From<GlobError> for CalpipeError {
    fn from(e: GlobError) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<std::io::Error> for CalpipeError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
