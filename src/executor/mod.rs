// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Running toolkit jobs.
//!
//! An [`Executor`] runs one job at a time through a [`Toolkit`]. Every job
//! that is really executed is appended to the commands log, so that a reader
//! can see what the pipeline asked the toolkit to do. Nothing is run or
//! logged in a dry run.

mod error;
mod job;
mod toolkit;

pub use error::{ExecutorError, ToolkitError};
pub use job::{ArgValue, CallParseError, JobRequest};
pub use toolkit::{ExternalToolkit, JobOutput, LogOnlyToolkit, Toolkit, ToolkitConfig};

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::constants::{COMMANDS_LOG_WIDTH, PROLOGUE_WIDTH};

const COMMANDS_LOG_PROLOGUE: &str = "This file lists the toolkit commands run by the pipeline. \
    All commands needed to calibrate the data are here, but the file cannot be executed, and \
    it does not contain the heuristic and flagging calculations done by the pipeline itself. \
    It is useful for understanding which toolkit commands each pipeline stage ran. To re-run \
    the pipeline, use the pipeline script instead. Some stages may not list any commands.";

pub struct Executor<'a> {
    toolkit: &'a dyn Toolkit,
    dry_run: bool,
    output_dir: PathBuf,
    commands_log: PathBuf,
}

impl<'a> Executor<'a> {
    pub fn new(
        toolkit: &'a dyn Toolkit,
        dry_run: bool,
        output_dir: PathBuf,
        commands_log: PathBuf,
    ) -> Executor<'a> {
        Executor {
            toolkit,
            dry_run,
            output_dir,
            commands_log,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run a job, returning whatever the toolkit returned. In a dry run,
    /// nothing is run and nothing is returned.
    pub fn execute(&self, job: &JobRequest) -> Result<JobOutput, ExecutorError> {
        if self.dry_run {
            debug!("Dry run; not executing {job}");
            return Ok(None);
        }

        let output = self.toolkit.run(job)?;
        self.log_job(job)?;
        Ok(output)
    }

    fn log_job(&self, job: &JobRequest) -> Result<(), ExecutorError> {
        let job_str = strip_dir(&job.to_string(), &self.output_dir);
        // Continuation lines line up with the opening bracket.
        let indent = match job_str.find('(') {
            Some(i) => " ".repeat(i + 1),
            None => " ".repeat(10),
        };
        let wrapped = wrap(&job_str, COMMANDS_LOG_WIDTH, "", &indent);

        append(&self.commands_log, &format!("{}\n", wrapped.join("\n")))
    }
}

/// Write the header for a top-level stage to the commands log. A new log
/// gets a prologue explaining what the file is.
pub fn log_stage_header(commands_log: &Path, pipeline_casa_task: &str) -> Result<(), ExecutorError> {
    let mut comment = String::new();
    if !commands_log.exists() {
        info!("Starting commands log {}", commands_log.display());
        let prologue = wrap(COMMANDS_LOG_PROLOGUE, PROLOGUE_WIDTH, "# ", "# ");
        comment.push_str("raise Error('The casa commands log is not executable!')\n\n");
        comment.push_str(&prologue.join("\n"));
        comment.push('\n');
    }
    comment.push_str(&format!("\n# {pipeline_casa_task}\n#\n"));

    append(commands_log, &comment)
}

fn append(file: &Path, s: &str) -> Result<(), ExecutorError> {
    let err = |err| ExecutorError::CommandsLog {
        file: file.to_path_buf(),
        err,
    };
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent).map_err(err)?;
    }
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .map_err(err)?;
    f.write_all(s.as_bytes()).map_err(err)
}

/// Remove the working directory from paths in `s`.
pub(crate) fn strip_dir(s: &str, dir: &Path) -> String {
    let dir = dir.display().to_string();
    if dir.is_empty() {
        return s.to_string();
    }
    s.replace(&format!("{}/", dir.trim_end_matches('/')), "")
}

/// Greedily wrap words into lines no longer than `width`. Words are never
/// broken, so a single long word makes a long line.
pub(crate) fn wrap(text: &str, width: usize, initial_indent: &str, subsequent_indent: &str) -> Vec<String> {
    let mut lines = vec![];
    let mut line = initial_indent.to_string();
    let mut line_has_words = false;
    for word in text.split_whitespace() {
        if line_has_words && line.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::replace(&mut line, subsequent_indent.to_string()));
            line_has_words = false;
        }
        if line_has_words {
            line.push(' ');
        }
        line.push_str(word);
        line_has_words = true;
    }
    if line_has_words {
        lines.push(line);
    }
    lines
}
