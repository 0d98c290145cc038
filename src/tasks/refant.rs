// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Rank the antennas of each measurement set by their suitability as the
//! reference antenna.

use clap::Parser;
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{
    fields_with_intent, pick, pipeline_call, resolve_vis, science_spws, Task, TaskArgs, TaskError,
};
use crate::{
    context::Context,
    executor::{Executor, JobRequest},
    heuristics::{flagging_scores, geometry_scores, rank_antennas, FlagdataSummary},
    results::{Outcome, Prepared, RefAntResults},
};

const NAME: &str = "hif_refant";
const DEFAULT_INTENT: &str = "AMPLITUDE,BANDPASS,PHASE";

#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefantArgs {
    /// Default: all registered measurement sets.
    #[clap(long, multiple_values(true), help_heading = "DATA SELECTION")]
    pub vis: Option<Vec<String>>,

    /// Fields used by the flagging heuristic. Default: the fields observed
    /// with the intents.
    #[clap(long, help_heading = "DATA SELECTION")]
    pub field: Option<String>,

    /// Spectral windows used by the flagging heuristic. Default: all science
    /// windows.
    #[clap(long, help_heading = "DATA SELECTION")]
    pub spw: Option<String>,

    /// Default: AMPLITUDE,BANDPASS,PHASE
    #[clap(long, help_heading = "DATA SELECTION")]
    pub intent: Option<String>,

    /// Don't score antennas by their distance from the array centre.
    #[clap(long, help_heading = "HEURISTICS")]
    #[serde(default)]
    pub no_geometry: bool,

    /// Don't score antennas by how much of their data is unflagged.
    #[clap(long, help_heading = "HEURISTICS")]
    #[serde(default)]
    pub no_flagging: bool,

    /// Antennas that must not be reference antennas, comma separated.
    #[clap(long, help_heading = "HEURISTICS")]
    pub refantignore: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefantInputs {
    pub vis: Vec<String>,
    pub field: Vec<String>,
    pub spw: Vec<String>,
    pub intent: String,
    pub geometry: bool,
    pub flagging: bool,
    pub refantignore: Vec<String>,

    #[serde(skip)]
    call: String,
}

impl TaskArgs for RefantArgs {
    type Inputs = RefantInputs;

    fn merge(self, other: Self) -> Self {
        RefantArgs {
            vis: self.vis.or(other.vis),
            field: self.field.or(other.field),
            spw: self.spw.or(other.spw),
            intent: self.intent.or(other.intent),
            no_geometry: self.no_geometry || other.no_geometry,
            no_flagging: self.no_flagging || other.no_flagging,
            refantignore: self.refantignore.or(other.refantignore),
        }
    }

    fn into_inputs(self, context: &Context) -> Result<RefantInputs, TaskError> {
        let call = pipeline_call(NAME, &self);
        let vis = resolve_vis(NAME, self.vis, context)?;
        let intent = self.intent.unwrap_or_else(|| DEFAULT_INTENT.to_string());

        let mut field = vec![];
        let mut spw = vec![];
        for v in &vis {
            let ms = context.observing_run.get_ms(v)?;
            field.push(self.field.clone().unwrap_or_else(|| fields_with_intent(ms, &intent)));
            spw.push(self.spw.clone().unwrap_or_else(|| science_spws(ms, "")));
        }

        let refantignore = self
            .refantignore
            .unwrap_or_default()
            .split(',')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        Ok(RefantInputs {
            vis,
            field,
            spw,
            intent,
            geometry: !self.no_geometry,
            flagging: !self.no_flagging,
            refantignore,
            call,
        })
    }
}

impl Task for RefantInputs {
    fn name(&self) -> &'static str {
        NAME
    }

    fn vis(&self) -> &[String] {
        &self.vis
    }

    fn for_vis(&self, i: usize) -> Self {
        RefantInputs {
            vis: pick(&self.vis, i),
            field: pick(&self.field, i),
            spw: pick(&self.spw, i),
            ..self.clone()
        }
    }

    fn pipeline_casa_task(&self) -> &str {
        &self.call
    }

    fn prepare(&self, context: &Context, executor: &Executor) -> Result<Prepared, TaskError> {
        let vis = &self.vis[0];
        let ms = context.observing_run.get_ms(vis)?;
        let antennas: Vec<_> = ms.antennas.iter().collect();
        let names: Vec<&str> = antennas.iter().map(|a| a.name.as_str()).collect();

        let mut scores: Vec<IndexMap<String, f64>> = vec![];
        if self.geometry {
            scores.push(geometry_scores(&antennas)?);
        }
        if self.flagging {
            let job = JobRequest::new("flagdata")
                .arg("vis", vis.as_str())
                .arg("mode", "summary")
                .arg("field", self.field[0].as_str())
                .arg("spw", self.spw[0].as_str())
                .arg("intent", self.intent.as_str());
            match executor.execute(&job)? {
                Some(output) => {
                    let summary = FlagdataSummary::from_json(&output)?;
                    scores.push(flagging_scores(&names, &summary));
                }
                None if executor.is_dry_run() => debug!("Dry run; no flagging scores for {vis}"),
                None => {
                    return Err(TaskError::MissingOutput {
                        fn_name: job.fn_name,
                        what: "a flag summary",
                    })
                }
            }
        }

        let ranked = rank_antennas(&names, &scores, &self.refantignore)?;
        info!("Reference antennas for {vis}: {}", ranked.join(","));

        Ok(Prepared::new(Outcome::RefAnt(RefAntResults {
            vis: vis.clone(),
            refant: ranked.into_vec(),
        })))
    }
}
