// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Apply the active calibration state to the data.

use clap::Parser;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{pick, pipeline_call, resolve_vis, Task, TaskArgs, TaskError};
use crate::{
    callibrary::{CalApplication, CalTo},
    context::Context,
    executor::Executor,
    results::{ApplyCalResults, Outcome, Prepared},
};

const NAME: &str = "h_applycal";
const DEFAULT_APPLYMODE: &str = "calflagstrict";

#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplycalArgs {
    /// Default: all registered measurement sets.
    #[clap(long, multiple_values(true), help_heading = "DATA SELECTION")]
    pub vis: Option<Vec<String>>,

    /// Default: all fields.
    #[clap(long, help_heading = "DATA SELECTION")]
    pub field: Option<String>,

    /// Default: all intents.
    #[clap(long, help_heading = "DATA SELECTION")]
    pub intent: Option<String>,

    /// Default: all spectral windows.
    #[clap(long, help_heading = "DATA SELECTION")]
    pub spw: Option<String>,

    /// Default: all antennas.
    #[clap(long, help_heading = "DATA SELECTION")]
    pub antenna: Option<String>,

    /// How flags of the solutions are applied. Default: calflagstrict
    #[clap(long)]
    pub applymode: Option<String>,

    /// Back up the flags of the data before applying.
    #[clap(long)]
    #[serde(default)]
    pub flagbackup: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplycalInputs {
    pub vis: Vec<String>,
    pub field: String,
    pub intent: String,
    pub spw: String,
    pub antenna: String,
    pub applymode: String,
    pub flagbackup: bool,

    #[serde(skip)]
    call: String,
}

impl TaskArgs for ApplycalArgs {
    type Inputs = ApplycalInputs;

    fn merge(self, other: Self) -> Self {
        ApplycalArgs {
            vis: self.vis.or(other.vis),
            field: self.field.or(other.field),
            intent: self.intent.or(other.intent),
            spw: self.spw.or(other.spw),
            antenna: self.antenna.or(other.antenna),
            applymode: self.applymode.or(other.applymode),
            flagbackup: self.flagbackup || other.flagbackup,
        }
    }

    fn into_inputs(self, context: &Context) -> Result<ApplycalInputs, TaskError> {
        Ok(ApplycalInputs {
            call: pipeline_call(NAME, &self),
            vis: resolve_vis(NAME, self.vis, context)?,
            field: self.field.unwrap_or_default(),
            intent: self.intent.unwrap_or_default(),
            spw: self.spw.unwrap_or_default(),
            antenna: self.antenna.unwrap_or_default(),
            applymode: self.applymode.unwrap_or_else(|| DEFAULT_APPLYMODE.to_string()),
            flagbackup: self.flagbackup,
        })
    }
}

impl Task for ApplycalInputs {
    fn name(&self) -> &'static str {
        NAME
    }

    fn vis(&self) -> &[String] {
        &self.vis
    }

    fn for_vis(&self, i: usize) -> Self {
        ApplycalInputs {
            vis: pick(&self.vis, i),
            ..self.clone()
        }
    }

    fn pipeline_casa_task(&self) -> &str {
        &self.call
    }

    fn prepare(&self, context: &Context, executor: &Executor) -> Result<Prepared, TaskError> {
        let vis = &self.vis[0];
        let calto = CalTo::new(vis.as_str())
            .with_field(&self.field)
            .with_intent(&self.intent)
            .with_spw(&self.spw)
            .with_antenna(&self.antenna);
        let calstate = context
            .callibrary
            .get_calstate(&context.observing_run, &calto, &[])?;
        if calstate.is_empty() {
            warn!("There is no calibration to apply to {vis}");
        }

        // One job for each group of data sharing the same caltables.
        let mut applied = vec![];
        for (calto, calfrom) in calstate.merged() {
            let app = CalApplication::new(calto, calfrom);
            info!("Applying {} to {vis}", app.gaintables().join(", "));
            let job = app
                .as_job()
                .arg("applymode", self.applymode.as_str())
                .arg("flagbackup", self.flagbackup);
            executor.execute(&job)?;
            applied.push(app);
        }

        Ok(Prepared::new(Outcome::ApplyCal(ApplyCalResults {
            vis: vis.clone(),
            applied,
        })))
    }
}
