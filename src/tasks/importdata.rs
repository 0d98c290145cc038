// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Register measurement sets with the context.

use std::path::{Path, PathBuf};

use clap::Parser;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{pipeline_call, Task, TaskArgs, TaskError};
use crate::{
    context::Context,
    domain::{find_metadata_file, MeasurementSet},
    executor::{Executor, JobRequest},
    io::expand_patterns,
    results::{ImportResults, Outcome, Prepared},
};

const NAME: &str = "h_importdata";

#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportdataArgs {
    /// Measurement sets to import. Each may be the measurement set itself
    /// (its metadata file must sit next to it, e.g. x.ms.json) or a metadata
    /// file. Glob patterns are expanded.
    #[clap(long, multiple_values(true), help_heading = "INPUT DATA")]
    pub vis: Option<Vec<String>>,

    /// The observing unit set ID of the data, used to name products.
    #[clap(long, help_heading = "PROJECT")]
    pub ous_id: Option<String>,

    /// The session the data belong to.
    #[clap(long, help_heading = "PROJECT")]
    pub session: Option<String>,

    /// Stop a recipe after the data are imported.
    #[clap(long)]
    #[serde(default)]
    pub import_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportdataInputs {
    /// Metadata files, after glob expansion.
    pub vis: Vec<String>,
    pub ous_id: Option<String>,
    pub session: Option<String>,
    pub import_only: bool,

    #[serde(skip)]
    call: String,
}

impl TaskArgs for ImportdataArgs {
    type Inputs = ImportdataInputs;

    fn merge(self, other: Self) -> Self {
        ImportdataArgs {
            vis: self.vis.or(other.vis),
            ous_id: self.ous_id.or(other.ous_id),
            session: self.session.or(other.session),
            import_only: self.import_only || other.import_only,
        }
    }

    fn into_inputs(self, _context: &Context) -> Result<ImportdataInputs, TaskError> {
        let call = pipeline_call(NAME, &self);
        let patterns = self.vis.unwrap_or_default();
        if patterns.is_empty() {
            return Err(TaskError::InvalidInput {
                task: NAME,
                msg: "no measurement sets were given".to_string(),
            });
        }

        let vis = expand_patterns(&patterns)?
            .into_iter()
            .map(|p| metadata_file_for(&p).map(|m| m.display().to_string()))
            .collect::<Result<_, _>>()?;

        Ok(ImportdataInputs {
            vis,
            ous_id: self.ous_id,
            session: self.session,
            import_only: self.import_only,
            call,
        })
    }
}

/// A path is either a metadata file itself or a measurement set with a
/// metadata file next to it.
fn metadata_file_for(path: &Path) -> Result<PathBuf, TaskError> {
    let is_metadata = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "json" | "yaml" | "yml" | "toml"))
        .unwrap_or(false);
    if is_metadata {
        return Ok(path.to_path_buf());
    }
    find_metadata_file(path).ok_or_else(|| TaskError::NoMetadata {
        vis: path.to_path_buf(),
    })
}

impl Task for ImportdataInputs {
    fn name(&self) -> &'static str {
        NAME
    }

    fn vis(&self) -> &[String] {
        &self.vis
    }

    fn is_multi_vis(&self) -> bool {
        true
    }

    fn for_vis(&self, _i: usize) -> Self {
        self.clone()
    }

    fn pipeline_casa_task(&self) -> &str {
        &self.call
    }

    fn prepare(&self, context: &Context, executor: &Executor) -> Result<Prepared, TaskError> {
        // Duplicates by name or basename, as on merge.
        let mut scratch = context.observing_run.clone();
        let mut mses: Vec<MeasurementSet> = vec![];
        for file in &self.vis {
            let ms = MeasurementSet::from_metadata_file(file)?;
            if scratch.add_ms(ms.clone()).is_err() {
                warn!("{} is already registered; not importing it again", ms.name);
                continue;
            }
            info!(
                "Importing {}: {} antennas, {} fields, {} spectral windows",
                ms.name,
                ms.antennas.len(),
                ms.fields.len(),
                ms.spectral_windows.len()
            );

            let listfile = context
                .output_dir
                .join(format!("{}.listobs.txt", ms.basename()))
                .display()
                .to_string();
            let job = JobRequest::new("listobs")
                .arg("vis", ms.name.as_str())
                .arg("listfile", listfile)
                .arg("overwrite", true);
            executor.execute(&job)?;

            mses.push(ms);
        }

        Ok(Prepared::new(Outcome::Import(ImportResults {
            mses,
            import_only: self.import_only,
            ous_id: self.ous_id.clone(),
            session: self.session.clone(),
        })))
    }
}
