// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Solve for the frequency response of each antenna.

use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};
use vec1::vec1;

use super::{
    caltable_name, default_refant, fields_with_intent, pick, pipeline_call, resolve_vis,
    science_spws, with_preapply, Task, TaskArgs, TaskError,
};
use crate::{
    callibrary::{CalAppOrigin, CalApplication, CalFrom, CalTo, CalType},
    context::Context,
    executor::{Executor, JobRequest},
    results::{CalibrationResults, Outcome, Prepared},
};

const NAME: &str = "hif_bandpass";
const DEFAULT_INTENT: &str = "BANDPASS";
const DEFAULT_SOLINT: &str = "inf";
const DEFAULT_COMBINE: &str = "scan";
const DEFAULT_MINSNR: f64 = 3.0;
const DEFAULT_MINBLPERANT: usize = 4;

#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BandpassArgs {
    /// Default: all registered measurement sets.
    #[clap(long, multiple_values(true), help_heading = "DATA SELECTION")]
    pub vis: Option<Vec<String>>,

    /// Default: the fields observed with the intent.
    #[clap(long, help_heading = "DATA SELECTION")]
    pub field: Option<String>,

    /// Default: BANDPASS
    #[clap(long, help_heading = "DATA SELECTION")]
    pub intent: Option<String>,

    /// Default: the science windows observed with the intent.
    #[clap(long, help_heading = "DATA SELECTION")]
    pub spw: Option<String>,

    #[clap(long, help_heading = "DATA SELECTION")]
    pub antenna: Option<String>,

    #[clap(long, help_heading = "DATA SELECTION")]
    pub uvrange: Option<String>,

    /// Default: the reference antennas of the measurement set.
    #[clap(long, help_heading = "SOLVING")]
    pub refant: Option<String>,

    /// Default: inf
    #[clap(long, help_heading = "SOLVING")]
    pub solint: Option<String>,

    /// Data axes to combine when solving. Default: scan
    #[clap(long, help_heading = "SOLVING")]
    pub combine: Option<String>,

    #[clap(long, help_heading = "SOLVING")]
    pub minsnr: Option<f64>,

    #[clap(long, help_heading = "SOLVING")]
    pub minblperant: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandpassInputs {
    pub vis: Vec<String>,
    pub field: Vec<String>,
    pub intent: String,
    pub spw: Vec<String>,
    pub antenna: String,
    pub uvrange: String,
    pub selectdata: bool,
    pub refant: Vec<String>,
    pub solint: String,
    pub combine: String,
    pub minsnr: f64,
    pub minblperant: usize,

    #[serde(skip)]
    call: String,
}

impl TaskArgs for BandpassArgs {
    type Inputs = BandpassInputs;

    fn merge(self, other: Self) -> Self {
        BandpassArgs {
            vis: self.vis.or(other.vis),
            field: self.field.or(other.field),
            intent: self.intent.or(other.intent),
            spw: self.spw.or(other.spw),
            antenna: self.antenna.or(other.antenna),
            uvrange: self.uvrange.or(other.uvrange),
            refant: self.refant.or(other.refant),
            solint: self.solint.or(other.solint),
            combine: self.combine.or(other.combine),
            minsnr: self.minsnr.or(other.minsnr),
            minblperant: self.minblperant.or(other.minblperant),
        }
    }

    fn into_inputs(self, context: &Context) -> Result<BandpassInputs, TaskError> {
        let call = pipeline_call(NAME, &self);
        let vis = resolve_vis(NAME, self.vis, context)?;
        let intent = self.intent.unwrap_or_else(|| DEFAULT_INTENT.to_string());
        let mut field = vec![];
        let mut spw = vec![];
        let mut refant = vec![];
        for v in &vis {
            let ms = context.observing_run.get_ms(v)?;
            field.push(self.field.clone().unwrap_or_else(|| fields_with_intent(ms, &intent)));
            spw.push(self.spw.clone().unwrap_or_else(|| science_spws(ms, &intent)));
            refant.push(self.refant.clone().unwrap_or_else(|| default_refant(ms)));
        }

        let antenna = self.antenna.unwrap_or_default();
        let uvrange = self.uvrange.unwrap_or_default();
        Ok(BandpassInputs {
            vis,
            field,
            intent,
            spw,
            selectdata: !antenna.is_empty() || !uvrange.is_empty(),
            antenna,
            uvrange,
            refant,
            solint: self.solint.unwrap_or_else(|| DEFAULT_SOLINT.to_string()),
            combine: self.combine.unwrap_or_else(|| DEFAULT_COMBINE.to_string()),
            minsnr: self.minsnr.unwrap_or(DEFAULT_MINSNR),
            minblperant: self.minblperant.unwrap_or(DEFAULT_MINBLPERANT),
            call,
        })
    }
}

impl Task for BandpassInputs {
    fn name(&self) -> &'static str {
        NAME
    }

    fn vis(&self) -> &[String] {
        &self.vis
    }

    fn for_vis(&self, i: usize) -> Self {
        BandpassInputs {
            vis: pick(&self.vis, i),
            field: pick(&self.field, i),
            spw: pick(&self.spw, i),
            refant: pick(&self.refant, i),
            ..self.clone()
        }
    }

    fn pipeline_casa_task(&self) -> &str {
        &self.call
    }

    fn prepare(&self, context: &Context, executor: &Executor) -> Result<Prepared, TaskError> {
        let vis = &self.vis[0];
        let stage = context.task_counter + 1;
        let suffix = format!(
            "spw{}.channel.solint{}.bcal",
            self.spw[0].replace(['~', ','], "_"),
            self.solint
        );
        let caltable = caltable_name(context, vis, NAME, stage, &suffix);
        info!("Solving for the bandpass of {vis} into {caltable}");

        let job = JobRequest::new("bandpass")
            .arg("vis", vis.as_str())
            .arg("caltable", caltable.as_str())
            .arg("field", self.field[0].as_str())
            .arg("intent", self.intent.as_str())
            .arg("spw", self.spw[0].as_str())
            .arg("selectdata", self.selectdata)
            .arg("antenna", self.antenna.as_str())
            .arg("uvrange", self.uvrange.as_str())
            .arg("solint", self.solint.as_str())
            .arg("combine", self.combine.as_str())
            .arg("refant", self.refant[0].as_str())
            .arg("minblperant", self.minblperant)
            .arg("minsnr", self.minsnr)
            .arg("bandtype", "B")
            .arg("solnorm", true);
        let preapply_to = CalTo::new(vis.as_str())
            .with_field(&self.field[0])
            .with_spw(&self.spw[0])
            .with_intent(&self.intent)
            .with_antenna(&self.antenna);
        let job = with_preapply(job, context, &preapply_to)?;
        executor.execute(&job)?;

        let calfrom = CalFrom::new(caltable)?.with_caltype(CalType::Bandpass);
        let app = CalApplication::new(CalTo::new(vis.as_str()).with_spw(&self.spw[0]), vec1![calfrom])
            .with_origin(CalAppOrigin {
                task: NAME.to_string(),
                inputs: self.inputs_json(),
            });

        let mut results = CalibrationResults::new(vis.as_str());
        results.pool.push(app);
        Ok(Prepared::new(Outcome::Calibration(results)))
    }
}
