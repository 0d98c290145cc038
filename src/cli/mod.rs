// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. Every pipeline task is a subcommand that
//! loads the context, runs the task as a new stage and saves the context
//! again.
//!
//! All booleans of task arguments must have `#[serde(default)]` annotated,
//! and anything that isn't a boolean must be optional. This allows all
//! arguments to be optional *and* usable in an arguments file.
//!
//! Only 3 things should be public in this module: `Calpipe`, `Calpipe::run`,
//! and `CalpipeError`.

#[macro_use]
mod common;
mod calstate;
mod error;

pub use error::CalpipeError;

use std::path::{Path, PathBuf};

use clap::{AppSettings, Args, Parser, Subcommand};
use log::{info, warn};
use serde::{de::DeserializeOwned, Serialize};

use common::{merge_args, write_toml, InfoPrinter, Warn, ARG_FILE_HELP};
use crate::{
    constants::{CONTEXT_EXTENSION, DEFAULT_CONTEXT_NAME},
    context::Context,
    executor::ToolkitConfig,
    recipe::{run_recipe, Recipe, RecipeOutcome},
    tasks::{
        run_task, ApplycalArgs, BandpassArgs, ExportdataArgs, GaincalArgs, GencalArgs, ImportdataArgs,
        LowgainflagArgs, MakeimagesArgs, RefantArgs, StageReport, TaskArgs,
    },
    PROGRESS_BARS,
};

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = r#"Calibration-pipeline orchestration for radio-interferometric data
Every subcommand works on a saved pipeline context (default: ./pipeline.context)"#
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct Calpipe {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// The saved pipeline context to work on.
    #[clap(short, long, parse(from_os_str))]
    #[clap(global = true)]
    context: Option<PathBuf>,

    /// Don't draw progress bars.
    #[clap(long)]
    #[clap(global = true)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    /// Only log the toolkit jobs that would be run. Nothing is written and
    /// the context isn't saved.
    #[clap(long)]
    #[clap(global = true)]
    dry_run: bool,

    /// Prepare the measurement sets of a stage in parallel.
    #[clap(long)]
    #[clap(global = true)]
    hpc: bool,

    /// Save the task arguments into a new TOML file that can be used to
    /// reproduce this run.
    #[clap(long)]
    #[clap(global = true)]
    save_toml: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    /// Create a new pipeline context.
    Init {
        /// The name of the context, used for its files.
        #[clap(long)]
        name: Option<String>,

        /// Where products and reports are written. Default: the current
        /// directory.
        #[clap(long, parse(from_os_str))]
        output_dir: Option<PathBuf>,

        /// A program that runs toolkit jobs. It is given the call of a job as
        /// its last argument and may print the job's output as JSON. Default:
        /// only log the jobs.
        #[clap(long, parse(from_os_str))]
        toolkit: Option<PathBuf>,

        /// Arguments to the toolkit program.
        #[clap(long, multiple_values(true), allow_hyphen_values(true), requires = "toolkit")]
        toolkit_args: Vec<String>,
    },

    #[clap(about = "Register measurement sets with the context.")]
    Importdata {
        #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
        args_file: Option<PathBuf>,

        #[clap(flatten)]
        args: ImportdataArgs,
    },

    #[clap(about = "Rank the antennas of each measurement set as reference antennas.")]
    Refant {
        #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
        args_file: Option<PathBuf>,

        #[clap(flatten)]
        args: RefantArgs,
    },

    #[clap(about = "Solve for time-dependent complex gains.")]
    Gaincal {
        #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
        args_file: Option<PathBuf>,

        #[clap(flatten)]
        args: GaincalArgs,
    },

    #[clap(about = "Solve for the bandpass.")]
    Bandpass {
        #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
        args_file: Option<PathBuf>,

        #[clap(flatten)]
        args: BandpassArgs,
    },

    #[clap(about = "Generate a calibration table from metadata, e.g. Tsys.")]
    Gencal {
        #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
        args_file: Option<PathBuf>,

        #[clap(flatten)]
        args: GencalArgs,
    },

    #[clap(about = "Apply the calibrations that are waiting to be applied.")]
    Applycal {
        #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
        args_file: Option<PathBuf>,

        #[clap(flatten)]
        args: ApplycalArgs,
    },

    #[clap(about = "Flag antennas with outlying gain amplitudes.")]
    Lowgainflag {
        #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
        args_file: Option<PathBuf>,

        #[clap(flatten)]
        args: LowgainflagArgs,
    },

    #[clap(about = "Image calibrators and targets.")]
    Makeimages {
        #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
        args_file: Option<PathBuf>,

        #[clap(flatten)]
        args: MakeimagesArgs,
    },

    #[clap(about = "Package calibration tables, logs and images with a manifest.")]
    Exportdata {
        #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
        args_file: Option<PathBuf>,

        #[clap(flatten)]
        args: ExportdataArgs,
    },

    /// Inspect, export or import the calibration state.
    Calstate(calstate::CalstateArgs),

    /// Run the stages of a recipe file.
    Recipe {
        #[clap(name = "RECIPE", parse(from_os_str))]
        recipe: PathBuf,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Init { .. } => "init",
            Command::Importdata { .. } => "importdata",
            Command::Refant { .. } => "refant",
            Command::Gaincal { .. } => "gaincal",
            Command::Bandpass { .. } => "bandpass",
            Command::Gencal { .. } => "gencal",
            Command::Applycal { .. } => "applycal",
            Command::Lowgainflag { .. } => "lowgainflag",
            Command::Makeimages { .. } => "makeimages",
            Command::Exportdata { .. } => "exportdata",
            Command::Calstate(_) => "calstate",
            Command::Recipe { .. } => "recipe",
        }
    }
}

impl Calpipe {
    pub fn run(self) -> Result<(), CalpipeError> {
        // Set up logging.
        let GlobalArgs {
            context,
            no_progress_bars,
            verbosity,
            dry_run,
            hpc,
            save_toml,
        } = self.global_opts;
        crate::logging::setup_logging(verbosity).expect("Failed to initialise logging.");
        // Enable progress bars if the user didn't say "no progress bars".
        if !no_progress_bars {
            PROGRESS_BARS.store(true);
        }

        // Print the version of calpipe and its build-time information.
        let sub_command = self.command.name();
        info!("calpipe {} {}", sub_command, env!("CARGO_PKG_VERSION"));
        display_build_info();

        let context_file = context
            .unwrap_or_else(|| PathBuf::from(format!("{DEFAULT_CONTEXT_NAME}.{CONTEXT_EXTENSION}")));
        let opts = StageOpts {
            context_file: &context_file,
            dry_run,
            hpc,
            save_toml: save_toml.as_deref(),
        };

        macro_rules! merge_save_run {
            ($args:expr, $args_file:expr) => {{
                run_stage($args, $args_file, &opts)?;
            }};
        }

        match self.command {
            Command::Init {
                name,
                output_dir,
                toolkit,
                toolkit_args,
            } => init(name, output_dir, toolkit, toolkit_args, &context_file, dry_run)?,

            Command::Importdata { args_file, args } => merge_save_run!(args, args_file),
            Command::Refant { args_file, args } => merge_save_run!(args, args_file),
            Command::Gaincal { args_file, args } => merge_save_run!(args, args_file),
            Command::Bandpass { args_file, args } => merge_save_run!(args, args_file),
            Command::Gencal { args_file, args } => merge_save_run!(args, args_file),
            Command::Applycal { args_file, args } => merge_save_run!(args, args_file),
            Command::Lowgainflag { args_file, args } => merge_save_run!(args, args_file),
            Command::Makeimages { args_file, args } => merge_save_run!(args, args_file),
            Command::Exportdata { args_file, args } => merge_save_run!(args, args_file),

            Command::Calstate(args) => {
                let mut context = Context::resume(&context_file)?;
                let changed = args.run(&mut context, dry_run)?;
                if changed && !dry_run {
                    context.save(Some(context_file.as_path()))?;
                }
            }

            Command::Recipe { recipe } => {
                let recipe = Recipe::read(&recipe)?;
                if let Some(toml) = &save_toml {
                    write_toml(&recipe, toml)?;
                }
                let mut context = Context::resume(&context_file)?;
                let toolkit = context.toolkit.build();
                let outcome = run_recipe(
                    recipe,
                    &mut context,
                    toolkit.as_ref(),
                    dry_run,
                    hpc,
                    Some(context_file.as_path()),
                )?;
                for report in outcome.reports() {
                    print_report(report);
                }
                match outcome {
                    RecipeOutcome::Completed { failures, .. } => {
                        for failure in failures {
                            format!("Stage {} ({}) failed: {}", failure.index, failure.task, failure.err)
                                .warn();
                        }
                    }
                    RecipeOutcome::ImportOnly { .. } => {
                        "The recipe stopped after importing data".warn();
                    }
                }
            }
        }

        common::display_warnings();
        info!("calpipe {} complete.", sub_command);
        Ok(())
    }
}

/// How a single stage is run.
struct StageOpts<'a> {
    context_file: &'a Path,
    dry_run: bool,
    hpc: bool,
    save_toml: Option<&'a Path>,
}

fn init(
    name: Option<String>,
    output_dir: Option<PathBuf>,
    toolkit: Option<PathBuf>,
    toolkit_args: Vec<String>,
    context_file: &Path,
    dry_run: bool,
) -> Result<(), CalpipeError> {
    if context_file.exists() {
        return Err(CalpipeError::Context(format!(
            "'{}' already exists; not overwriting it",
            context_file.display()
        )));
    }
    let name = name.unwrap_or_else(|| DEFAULT_CONTEXT_NAME.to_string());
    let output_dir = output_dir.unwrap_or_else(|| PathBuf::from("."));
    let mut context = Context::new(name, output_dir);
    if let Some(program) = toolkit {
        context.toolkit = ToolkitConfig::External {
            program,
            args: toolkit_args,
        };
    }

    let mut printer = InfoPrinter::new("New pipeline context".into());
    printer.push_block(vec![
        format!("Name: {}", context.name).into(),
        format!("Output directory: {}", context.output_dir.display()).into(),
    ]);
    printer.push_line(format!("Toolkit: {:?}", context.toolkit).into());
    printer.display();

    if dry_run {
        info!("Dry run; not saving the context");
    } else {
        context.save(Some(context_file))?;
    }
    Ok(())
}

/// Merge the arguments of a task with its arguments file, optionally save
/// them, then run the task against the saved context.
fn run_stage<A>(args: A, args_file: Option<PathBuf>, opts: &StageOpts) -> Result<(), CalpipeError>
where
    A: TaskArgs + Serialize + DeserializeOwned,
{
    let args = merge_args(args, args_file)?;
    if let Some(toml) = opts.save_toml {
        write_toml(&args, toml)?;
    }

    let mut context = Context::resume(opts.context_file)?;
    let toolkit = context.toolkit.build();
    let report = run_task(args, &mut context, toolkit.as_ref(), opts.dry_run, opts.hpc)?;
    print_report(&report);
    if opts.dry_run {
        info!("Dry run; not saving the context");
    } else {
        context.save(Some(opts.context_file))?;
    }
    Ok(())
}

fn print_report(report: &StageReport) {
    let mut printer = InfoPrinter::new(format!("Stage {} ({})", report.stage_number, report.task).into());
    match &report.qa {
        Some(qa) => {
            let score = match qa.score {
                Some(score) => format!("{score:.2}"),
                None => "n/a".to_string(),
            };
            printer.push_block(vec![format!("QA: {} (score {score})", qa.status).into(), qa.message.clone().into()]);
            if qa.status == crate::results::QaStatus::Fail {
                warn!("Stage {} failed QA: {}", report.stage_number, qa.message);
            }
        }
        None => printer.push_line("QA: not scored (dry run)".into()),
    }
    printer.display();
}

/// Write many info-level log lines of how this executable was compiled.
fn display_build_info() {
    let dirty = match GIT_DIRTY {
        Some(true) => " (dirty)",
        _ => "",
    };
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => {
            info!("Compiled on git commit hash: {hash}{dirty}");
        }
        None => info!("Compiled on git commit hash: <no git info>"),
    }
    if let Some(hr) = GIT_HEAD_REF {
        info!("            git head ref: {}", hr);
    }
    info!("            {}", BUILT_TIME_UTC);
    info!("         with compiler {}", RUSTC_VERSION);
    info!("");
}
