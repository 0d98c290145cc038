// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Flag antennas whose gain solutions are mostly flagged.

use clap::Parser;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{pick, pipeline_call, resolve_vis, Task, TaskArgs, TaskError};
use crate::{
    callibrary::{CalTo, CalType},
    constants::DEFAULT_LOWGAIN_FRACTION,
    context::Context,
    executor::{Executor, JobRequest},
    heuristics::{get_cal_flagged_soln, CalTableRow},
    results::{FlaggingResults, Outcome, Prepared},
};

const NAME: &str = "hif_lowgainflag";

#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LowgainflagArgs {
    /// Default: all registered measurement sets.
    #[clap(long, multiple_values(true), help_heading = "DATA SELECTION")]
    pub vis: Option<Vec<String>>,

    /// The gain caltable to assess. Default: the most recent gain caltable
    /// in the calibration state of the measurement set.
    #[clap(long)]
    pub caltable: Option<String>,

    /// Antennas with a larger fraction of flagged solutions (in any
    /// polarisation) are flagged. Default: 0.5
    #[clap(long)]
    pub max_flagged_fraction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowgainflagInputs {
    pub vis: Vec<String>,
    pub caltable: Vec<String>,
    pub max_flagged_fraction: f64,

    #[serde(skip)]
    call: String,
}

impl TaskArgs for LowgainflagArgs {
    type Inputs = LowgainflagInputs;

    fn merge(self, other: Self) -> Self {
        LowgainflagArgs {
            vis: self.vis.or(other.vis),
            caltable: self.caltable.or(other.caltable),
            max_flagged_fraction: self.max_flagged_fraction.or(other.max_flagged_fraction),
        }
    }

    fn into_inputs(self, context: &Context) -> Result<LowgainflagInputs, TaskError> {
        let call = pipeline_call(NAME, &self);
        let max_flagged_fraction = self.max_flagged_fraction.unwrap_or(DEFAULT_LOWGAIN_FRACTION);
        if !(0.0..=1.0).contains(&max_flagged_fraction) {
            return Err(TaskError::InvalidInput {
                task: NAME,
                msg: format!("max_flagged_fraction must be between 0 and 1, not {max_flagged_fraction}"),
            });
        }

        let vis = resolve_vis(NAME, self.vis, context)?;
        let caltable = vis
            .iter()
            .map(|v| match &self.caltable {
                Some(c) => Ok(c.clone()),
                None => latest_gain_caltable(context, v),
            })
            .collect::<Result<_, _>>()?;

        Ok(LowgainflagInputs {
            vis,
            caltable,
            max_flagged_fraction,
            call,
        })
    }
}

/// The gain caltable added last to the active calibration state of a
/// measurement set.
fn latest_gain_caltable(context: &Context, vis: &str) -> Result<String, TaskError> {
    let calstate = context
        .callibrary
        .get_calstate(&context.observing_run, &CalTo::new(vis), &[])?;
    calstate
        .cells()
        .filter_map(|(_, calfroms)| calfroms.iter().rev().find(|cf| cf.caltype() == CalType::Gaincal))
        .last()
        .map(|cf| cf.gaintable().to_string())
        .ok_or_else(|| TaskError::InvalidInput {
            task: NAME,
            msg: format!("there's no gain caltable for {vis} to assess; run gaincal first"),
        })
}

impl Task for LowgainflagInputs {
    fn name(&self) -> &'static str {
        NAME
    }

    fn vis(&self) -> &[String] {
        &self.vis
    }

    fn for_vis(&self, i: usize) -> Self {
        LowgainflagInputs {
            vis: pick(&self.vis, i),
            caltable: pick(&self.caltable, i),
            ..self.clone()
        }
    }

    fn pipeline_casa_task(&self) -> &str {
        &self.call
    }

    fn prepare(&self, context: &Context, executor: &Executor) -> Result<Prepared, TaskError> {
        let vis = &self.vis[0];
        let caltable = &self.caltable[0];
        let ms = context.observing_run.get_ms(vis)?;
        let mut results = FlaggingResults {
            vis: vis.clone(),
            caltable: Some(caltable.clone()),
            num_antennas: ms.antennas.len(),
            ..Default::default()
        };

        let job = JobRequest::new("getcalflags").arg("caltable", caltable.as_str());
        let output = match executor.execute(&job)? {
            Some(output) => output,
            None if executor.is_dry_run() => {
                debug!("Dry run; not assessing {caltable}");
                return Ok(Prepared::new(Outcome::Flagging(results)));
            }
            None => {
                return Err(TaskError::MissingOutput {
                    fn_name: job.fn_name,
                    what: "caltable flags",
                })
            }
        };
        let rows = CalTableRow::from_json(&output)?;
        let summary = get_cal_flagged_soln(&rows);
        debug!(
            "{caltable}: {} of {} solutions flagged",
            summary.all.flagged, summary.all.total
        );

        for antenna in &ms.antennas {
            let worst = summary
                .ant
                .get(&antenna.id)
                .into_iter()
                .flatten()
                .map(|count| count.fraction)
                .fold(0.0, f64::max);
            if worst > self.max_flagged_fraction {
                info!(
                    "{} of {vis} has {:.0}% of its solutions flagged",
                    antenna.name,
                    worst * 100.0
                );
                results.flagged_antennas.push(antenna.name.clone());
            }
        }

        if !results.flagged_antennas.is_empty() {
            let job = JobRequest::new("flagdata")
                .arg("vis", vis.as_str())
                .arg("mode", "manual")
                .arg("antenna", results.flagged_antennas.join(","))
                .arg("reason", "lowgain")
                .arg("flagbackup", false);
            executor.execute(&job)?;
        }
        results.statistics = Some(summary);

        Ok(Prepared::new(Outcome::Flagging(results)))
    }
}
