// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The pipeline context: everything known about a reduction, carried from stage
to stage and saved to disk between invocations.
 */

mod error;

pub use error::ContextError;

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::{
    callibrary::CalLibrary,
    constants::{
        CALSTATE_EXTENSION, CASA_COMMANDS_LOG, CONTEXT_EXTENSION, DEFAULT_CONTEXT_NAME, PIPELINE_SCRIPT,
    },
    domain::ObservingRun,
    executor::{log_stage_header, strip_dir, ArgValue, Executor, Toolkit, ToolkitConfig},
    results::{merge_with_context, qa::score_stage, ImageProduct, QaScore, ResultId, StageResults},
};

/// The file names of the logs written into the report directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogNames {
    pub casa_commands: String,
    pub pipeline_script: String,
}

impl Default for LogNames {
    fn default() -> Self {
        LogNames {
            casa_commands: CASA_COMMANDS_LOG.to_string(),
            pipeline_script: PIPELINE_SCRIPT.to_string(),
        }
    }
}

/// Project details used when packaging products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// The observing unit set ID.
    pub ous_id: Option<String>,
    pub session: Option<String>,
    pub recipe_name: Option<String>,
    pub procedure_title: Option<String>,
}

impl ProjectInfo {
    /// `(name, value)` pairs of everything that's set.
    fn set_values(&self) -> Vec<(&'static str, &str)> {
        [
            ("ous_id", &self.ous_id),
            ("session", &self.session),
            ("recipe_name", &self.recipe_name),
            ("procedure_title", &self.procedure_title),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }
}

/// What the context keeps of accepted results; the results themselves are
/// saved to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsProxy {
    pub id: ResultId,
    pub stage_number: usize,
    pub task: String,
    pub pipeline_casa_task: String,

    /// Relative to the saved-state directory, so that the context can be
    /// moved.
    pub file: String,
}

impl ResultsProxy {
    pub fn read(&self, context: &Context) -> Result<StageResults, ContextError> {
        read_json(&context.saved_state_dir().join(&self.file))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub name: String,
    pub output_dir: PathBuf,
    pub report_dir: PathBuf,
    pub products_dir: PathBuf,

    pub observing_run: ObservingRun,
    pub callibrary: CalLibrary,

    /// The number of the last stage run.
    pub task_counter: usize,
    pub subtask_counter: usize,

    pub results: Vec<ResultsProxy>,

    /// Images made by imaging stages.
    #[serde(default)]
    pub images: Vec<ImageProduct>,

    #[serde(default)]
    pub logs: LogNames,

    #[serde(default)]
    pub toolkit: ToolkitConfig,

    #[serde(default)]
    pub project: ProjectInfo,
}

impl Context {
    /// A fresh context. Its reports go into `<output_dir>/<name>/html` and its
    /// products into `<output_dir>/products`.
    pub fn new<S: Into<String>, P: AsRef<Path>>(name: S, output_dir: P) -> Context {
        let mut name = name.into();
        if name.trim().is_empty() {
            name = DEFAULT_CONTEXT_NAME.to_string();
        }
        let output_dir = output_dir.as_ref().to_path_buf();
        Context {
            report_dir: output_dir.join(&name).join("html"),
            products_dir: output_dir.join("products"),
            name,
            output_dir,
            observing_run: ObservingRun::default(),
            callibrary: CalLibrary::default(),
            task_counter: 0,
            subtask_counter: 0,
            results: vec![],
            images: vec![],
            logs: LogNames::default(),
            toolkit: ToolkitConfig::default(),
            project: ProjectInfo::default(),
        }
    }

    /// Where the context is saved unless told otherwise.
    pub fn default_file(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{CONTEXT_EXTENSION}", self.name))
    }

    /// Where the calibration state is exported unless told otherwise.
    pub fn calstate_file(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{CALSTATE_EXTENSION}", self.name))
    }

    pub fn saved_state_dir(&self) -> PathBuf {
        self.output_dir.join(&self.name).join("saved_state")
    }

    pub fn commands_log(&self) -> PathBuf {
        self.report_dir.join(&self.logs.casa_commands)
    }

    pub fn pipeline_script(&self) -> PathBuf {
        self.report_dir.join(&self.logs.pipeline_script)
    }

    /// An executor that logs into this context's commands log.
    pub fn executor<'a>(&self, toolkit: &'a dyn Toolkit, dry_run: bool) -> Executor<'a> {
        Executor::new(toolkit, dry_run, self.output_dir.clone(), self.commands_log())
    }

    /// Write the commands-log header of the next stage and return its number.
    /// The stage counter itself is only bumped by [`Context::finish_stage`].
    pub(crate) fn begin_stage(&self, pipeline_casa_task: &str, dry_run: bool) -> Result<usize, ContextError> {
        let stage = self.task_counter + 1;
        info!("Starting execution for stage {stage}");
        if !dry_run {
            log_stage_header(&self.commands_log(), &strip_dir(pipeline_casa_task, &self.output_dir))?;
        }
        Ok(stage)
    }

    pub(crate) fn finish_stage(&mut self, stage: usize, num_subtasks: usize) {
        self.task_counter = stage;
        self.subtask_counter = num_subtasks;
    }

    /// Save to `file`, or the default file.
    pub fn save(&self, file: Option<&Path>) -> Result<PathBuf, ContextError> {
        let file = file.map(|f| f.to_path_buf()).unwrap_or_else(|| self.default_file());
        info!("Saving context to {}", file.display());
        write_json(&file, self)?;
        Ok(file)
    }

    pub fn resume(file: &Path) -> Result<Context, ContextError> {
        info!("Resuming context from {}", file.display());
        read_json(file)
    }

    /// Accept a stage's results: merge them, score them, save them and
    /// update the pipeline script. Results can only be accepted once.
    pub fn accept(&mut self, mut results: StageResults) -> Result<QaScore, ContextError> {
        if self.results.iter().any(|p| p.id == results.id) {
            let msg = "This result has already been added to the context";
            error!("{msg}");
            return Err(ContextError::AlreadyAccepted {
                id: results.id.to_string(),
            });
        }

        merge_with_context(&results, self)?;

        let qa = score_stage(&results);
        info!("Stage {} QA: {} ({})", results.stage_number, qa.status, qa.message);
        results.qa = Some(qa.clone());

        let file = format!("result-stage{}.json", results.stage_number);
        write_json(&self.saved_state_dir().join(&file), &results)?;
        self.results.push(ResultsProxy {
            id: results.id,
            stage_number: results.stage_number,
            task: results.task,
            pipeline_casa_task: results.pipeline_casa_task,
            file,
        });

        self.write_pipeline_script()?;
        Ok(qa)
    }

    /// Read back the results of every accepted stage.
    pub fn read_results(&self) -> Result<Vec<StageResults>, ContextError> {
        self.results.iter().map(|p| p.read(self)).collect()
    }

    /// Write a script that reruns every accepted stage.
    pub fn write_pipeline_script(&self) -> Result<(), ContextError> {
        let state_commands: Vec<String> = self
            .project
            .set_values()
            .into_iter()
            .map(|(name, value)| format!("context.set_state('ProjectInfo', '{name}', {})", ArgValue::from(value)))
            .collect();
        let tasks: Vec<String> = self
            .results
            .iter()
            .map(|p| format!("    {}", p.pipeline_casa_task))
            .collect();

        let script = format!(
            "__rethrow_casa_exceptions = True\ncontext = h_init()\n{}\ntry:\n{}\nfinally:\n    h_save()\n",
            state_commands.join("\n"),
            tasks.join("\n")
        );
        let script = strip_dir(&script, &self.output_dir);

        let file = self.pipeline_script();
        debug!("Writing pipeline script {}", file.display());
        write_text(&file, &script)
    }
}

fn create_parent(file: &Path) -> Result<(), ContextError> {
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent).map_err(|err| ContextError::Write {
            file: file.to_path_buf(),
            err,
        })?;
    }
    Ok(())
}

fn write_text(file: &Path, s: &str) -> Result<(), ContextError> {
    create_parent(file)?;
    fs::write(file, s).map_err(|err| ContextError::Write {
        file: file.to_path_buf(),
        err,
    })
}

fn write_json<T: Serialize>(file: &Path, value: &T) -> Result<(), ContextError> {
    create_parent(file)?;
    let write_err = |err| ContextError::Write {
        file: file.to_path_buf(),
        err,
    };
    let mut f = BufWriter::new(File::create(file).map_err(write_err)?);
    serde_json::to_writer_pretty(&mut f, value).map_err(|err| ContextError::Json {
        file: file.to_path_buf(),
        err,
    })?;
    f.flush().map_err(write_err)
}

fn read_json<T: for<'de> Deserialize<'de>>(file: &Path) -> Result<T, ContextError> {
    let f = File::open(file).map_err(|err| ContextError::Read {
        file: file.to_path_buf(),
        err,
    })?;
    serde_json::from_reader(BufReader::new(f)).map_err(|err| ContextError::Json {
        file: file.to_path_buf(),
        err,
    })
}
