// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Inspect, export and import the calibration state of a context.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use super::{common::InfoPrinter, CalpipeError};
use crate::context::Context;

#[derive(Parser, Debug)]
pub(super) struct CalstateArgs {
    #[clap(subcommand)]
    command: CalstateCommand,
}

#[derive(Subcommand, Debug)]
#[clap(arg_required_else_help = true)]
enum CalstateCommand {
    /// Print the calibrations that are waiting to be applied.
    Show {
        /// Print the calibrations that have already been applied instead.
        #[clap(long)]
        applied: bool,
    },

    /// Write the calibration state as applycal calls.
    Export {
        /// Default: <context name>.calstate in the output directory.
        #[clap(name = "FILE", parse(from_os_str))]
        file: Option<PathBuf>,

        /// Export the calibrations that have already been applied instead.
        #[clap(long)]
        applied: bool,
    },

    /// Read applycal calls into the calibration state.
    Import {
        #[clap(name = "FILE", parse(from_os_str))]
        file: PathBuf,

        /// Add to the current state rather than replacing it.
        #[clap(long)]
        append: bool,
    },
}

impl CalstateArgs {
    /// Run the subcommand. Returns whether the context changed.
    pub(super) fn run(self, context: &mut Context, dry_run: bool) -> Result<bool, CalpipeError> {
        match self.command {
            CalstateCommand::Show { applied } => {
                let (title, state) = if applied {
                    ("Applied calibrations", context.callibrary.applied())
                } else {
                    ("Active calibrations", context.callibrary.active())
                };
                let mut printer = InfoPrinter::new(title.into());
                if state.is_empty() {
                    printer.push_line("<none>".into());
                }
                for calapp in state.applications() {
                    printer.push_line(calapp.as_applycal().into());
                }
                printer.display();
                Ok(false)
            }

            CalstateCommand::Export { file, applied } => {
                let file = file.unwrap_or_else(|| context.calstate_file());
                if dry_run {
                    info!("Dry run; not writing {}", file.display());
                } else if applied {
                    context.callibrary.export_applied(&file)?;
                } else {
                    context.callibrary.export(&file)?;
                }
                Ok(false)
            }

            CalstateCommand::Import { file, append } => {
                let run = &context.observing_run;
                context.callibrary.import_state(run, &file, append)?;
                Ok(true)
            }
        }
    }
}
