// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Calibration-pipeline orchestration for radio-interferometric data reduction.

A [`Context`] carries everything known about a reduction: the registered
measurement sets, the calibration library and the results of every stage.
Tasks are run against it as stages, with the actual data processing handed to
a [`Toolkit`](executor::Toolkit).
 */

pub mod callibrary;
mod cli;
pub mod constants;
pub mod context;
pub mod domain;
pub mod executor;
pub mod heuristics;
pub mod io;
pub mod logging;
pub mod manifest;
pub mod recipe;
pub mod results;
pub mod selection;
pub mod tasks;

#[cfg(test)]
mod tests;

use crossbeam_utils::atomic::AtomicCell;

lazy_static::lazy_static! {
    /// Are progress bars being drawn? This should only ever be enabled by CLI
    /// code.
    static ref PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
}

// Re-exports.
pub use callibrary::{CalFrom, CalLibrary, CalState, CalTo};
pub use cli::{Calpipe, CalpipeError};
pub use context::Context;
pub use domain::{MeasurementSet, ObservingRun};
pub use recipe::{run_recipe, Recipe, RecipeOutcome};
pub use tasks::{execute_stage, run_task};
