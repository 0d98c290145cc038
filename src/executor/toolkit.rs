// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The seam to the external toolkit that does the numerical work.

use std::{path::PathBuf, process::Command};

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::{JobRequest, ToolkitError};

/// What a toolkit job hands back. Most jobs return nothing; queries (e.g.
/// flag summaries) return JSON.
pub type JobOutput = Option<serde_json::Value>;

/// Something that can run toolkit jobs. Implementors must be shareable across
/// threads, as measurement sets may be processed in parallel.
pub trait Toolkit: Send + Sync {
    fn run(&self, job: &JobRequest) -> Result<JobOutput, ToolkitError>;
}

/// A toolkit that only reports what it was asked to do.
#[derive(Debug, Default)]
pub struct LogOnlyToolkit;

impl Toolkit for LogOnlyToolkit {
    fn run(&self, job: &JobRequest) -> Result<JobOutput, ToolkitError> {
        info!("{job}");
        Ok(None)
    }
}

/// A toolkit reached by spawning a program. The call string of the job is
/// the last argument; anything the program prints to stdout is parsed as the
/// job's JSON return value.
#[derive(Debug, Clone)]
pub struct ExternalToolkit {
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalToolkit {
    pub fn new(program: PathBuf, args: Vec<String>) -> ExternalToolkit {
        ExternalToolkit { program, args }
    }
}

impl Toolkit for ExternalToolkit {
    fn run(&self, job: &JobRequest) -> Result<JobOutput, ToolkitError> {
        debug!("Running {} for {}", self.program.display(), job.fn_name);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(job.to_string())
            .output()
            .map_err(|err| ToolkitError::Spawn {
                program: self.program.clone(),
                err,
            })?;

        if !output.status.success() {
            return Err(ToolkitError::Failed {
                fn_name: job.fn_name.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        trace!("{} returned '{stdout}'", job.fn_name);
        if stdout.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(stdout)
            .map(Some)
            .map_err(|err| ToolkitError::BadOutput {
                fn_name: job.fn_name.clone(),
                err: err.to_string(),
            })
    }
}

/// How to reach the toolkit. This is stored in the context so that every
/// invocation uses the same toolkit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolkitConfig {
    #[default]
    LogOnly,

    External {
        program: PathBuf,

        #[serde(default)]
        args: Vec<String>,
    },
}

impl ToolkitConfig {
    pub fn build(&self) -> Box<dyn Toolkit> {
        match self {
            ToolkitConfig::LogOnly => Box::new(LogOnlyToolkit),
            ToolkitConfig::External { program, args } => {
                Box::new(ExternalToolkit::new(program.clone(), args.clone()))
            }
        }
    }
}
