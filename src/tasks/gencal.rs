// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Generate caltables that aren't solved from visibilities, e.g. system
//! temperatures or antenna position corrections.

use std::str::FromStr;

use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};
use vec1::vec1;

use super::{caltable_name, pick, pipeline_call, resolve_vis, Task, TaskArgs, TaskError};
use crate::{
    callibrary::{CalAppOrigin, CalApplication, CalFrom, CalTo, CalType},
    context::Context,
    executor::{Executor, JobRequest},
    results::{CalibrationResults, Outcome, Prepared},
};

const NAME: &str = "h_gencal";

/// The calibration types that can be generated.
const GENCAL_TYPES: [CalType; 6] = [
    CalType::Tsys,
    CalType::Antpos,
    CalType::Opac,
    CalType::Gc,
    CalType::Rq,
    CalType::Swpow,
];

#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GencalArgs {
    /// Default: all registered measurement sets.
    #[clap(long, multiple_values(true), help_heading = "DATA SELECTION")]
    pub vis: Option<Vec<String>>,

    /// The type of caltable to generate: tsys, antpos, opac, gc, rq or swpow.
    #[clap(long)]
    pub caltype: Option<String>,

    /// Default: all spectral windows.
    #[clap(long, help_heading = "DATA SELECTION")]
    pub spw: Option<String>,

    #[clap(long, help_heading = "DATA SELECTION")]
    pub antenna: Option<String>,

    /// Parameters of the caltype, e.g. antenna position offsets.
    #[clap(long, multiple_values(true))]
    pub parameter: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GencalInputs {
    pub vis: Vec<String>,
    pub caltype: CalType,
    pub spw: String,
    pub antenna: String,
    pub parameter: Vec<f64>,

    #[serde(skip)]
    call: String,
}

impl TaskArgs for GencalArgs {
    type Inputs = GencalInputs;

    fn merge(self, other: Self) -> Self {
        GencalArgs {
            vis: self.vis.or(other.vis),
            caltype: self.caltype.or(other.caltype),
            spw: self.spw.or(other.spw),
            antenna: self.antenna.or(other.antenna),
            parameter: self.parameter.or(other.parameter),
        }
    }

    fn into_inputs(self, context: &Context) -> Result<GencalInputs, TaskError> {
        let call = pipeline_call(NAME, &self);
        let invalid = |msg: String| TaskError::InvalidInput { task: NAME, msg };
        let caltype = self
            .caltype
            .ok_or_else(|| invalid("a caltype is required".to_string()))?;
        let caltype = CalType::from_str(&caltype.to_lowercase())
            .ok()
            .filter(|c| GENCAL_TYPES.contains(c))
            .ok_or_else(|| invalid(format!("'{caltype}' is not a caltype that can be generated")))?;

        Ok(GencalInputs {
            vis: resolve_vis(NAME, self.vis, context)?,
            caltype,
            spw: self.spw.unwrap_or_default(),
            antenna: self.antenna.unwrap_or_default(),
            parameter: self.parameter.unwrap_or_default(),
            call,
        })
    }
}

impl Task for GencalInputs {
    fn name(&self) -> &'static str {
        NAME
    }

    fn vis(&self) -> &[String] {
        &self.vis
    }

    fn for_vis(&self, i: usize) -> Self {
        GencalInputs {
            vis: pick(&self.vis, i),
            ..self.clone()
        }
    }

    fn pipeline_casa_task(&self) -> &str {
        &self.call
    }

    fn prepare(&self, context: &Context, executor: &Executor) -> Result<Prepared, TaskError> {
        let vis = &self.vis[0];
        let stage = context.task_counter + 1;
        let suffix = match self.caltype {
            CalType::Tsys => "tsyscal".to_string(),
            c => c.to_string(),
        };
        let caltable = caltable_name(context, vis, NAME, stage, &suffix);
        info!("Generating a {} caltable for {vis}: {caltable}", self.caltype);

        let job = JobRequest::new("gencal")
            .arg("vis", vis.as_str())
            .arg("caltable", caltable.as_str())
            .arg("caltype", self.caltype.to_string())
            .arg("spw", self.spw.as_str())
            .arg("antenna", self.antenna.as_str())
            .arg("parameter", self.parameter.clone());
        executor.execute(&job)?;

        let calfrom = CalFrom::new(caltable)?.with_caltype(self.caltype);
        let app = CalApplication::new(CalTo::new(vis.as_str()).with_spw(&self.spw), vec1![calfrom])
            .with_origin(CalAppOrigin {
                task: NAME.to_string(),
                inputs: self.inputs_json(),
            });

        let mut results = CalibrationResults::new(vis.as_str());
        results.pool.push(app);
        Ok(Prepared::new(Outcome::Calibration(results)))
    }
}
