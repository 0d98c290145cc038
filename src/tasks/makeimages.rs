// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image calibrators and targets.

use clap::Parser;
use indexmap::IndexMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{intent_list, ous_prefix, pipeline_call, resolve_vis, sanitize, science_spws, Task, TaskArgs, TaskError};
use crate::{
    context::Context,
    executor::{Executor, JobRequest},
    results::{ImageProduct, ImageResults, ImageType, Outcome, Prepared},
};

const NAME: &str = "hif_makeimages";
const DEFAULT_INTENT: &str = "BANDPASS,PHASE,TARGET";
const DEFAULT_SPECMODE: &str = "mfs";
const DEFAULT_IMSIZE: [usize; 2] = [256, 256];
const DEFAULT_CELL: &str = "0.5arcsec";
const DEFAULT_NITER: usize = 1000;

#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MakeimagesArgs {
    /// Default: all registered measurement sets.
    #[clap(long, multiple_values(true), help_heading = "DATA SELECTION")]
    pub vis: Option<Vec<String>>,

    /// Fields to image, comma separated. Default: every field observed with
    /// the intents.
    #[clap(long, help_heading = "DATA SELECTION")]
    pub field: Option<String>,

    /// Default: BANDPASS,PHASE,TARGET
    #[clap(long, help_heading = "DATA SELECTION")]
    pub intent: Option<String>,

    /// Default: the science windows observed with each intent.
    #[clap(long, help_heading = "DATA SELECTION")]
    pub spw: Option<String>,

    /// mfs or cube. Default: mfs
    #[clap(long, help_heading = "IMAGING")]
    pub specmode: Option<String>,

    /// Image size [pixels]. Default: 256 256
    #[clap(long, multiple_values(true), help_heading = "IMAGING")]
    pub imsize: Option<Vec<usize>>,

    /// Default: 0.5arcsec
    #[clap(long, help_heading = "IMAGING")]
    pub cell: Option<String>,

    /// Default: 1000
    #[clap(long, help_heading = "IMAGING")]
    pub niter: Option<usize>,
}

/// One image to make.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageTarget {
    pub field: String,
    pub intent: String,
    pub spw: String,

    /// The measurement sets containing the field.
    pub vis: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MakeimagesInputs {
    pub vis: Vec<String>,
    pub targets: Vec<ImageTarget>,
    pub specmode: String,
    pub imsize: Vec<usize>,
    pub cell: String,
    pub niter: usize,

    #[serde(skip)]
    call: String,
}

impl TaskArgs for MakeimagesArgs {
    type Inputs = MakeimagesInputs;

    fn merge(self, other: Self) -> Self {
        MakeimagesArgs {
            vis: self.vis.or(other.vis),
            field: self.field.or(other.field),
            intent: self.intent.or(other.intent),
            spw: self.spw.or(other.spw),
            specmode: self.specmode.or(other.specmode),
            imsize: self.imsize.or(other.imsize),
            cell: self.cell.or(other.cell),
            niter: self.niter.or(other.niter),
        }
    }

    fn into_inputs(self, context: &Context) -> Result<MakeimagesInputs, TaskError> {
        let call = pipeline_call(NAME, &self);
        let invalid = |msg: String| TaskError::InvalidInput { task: NAME, msg };
        let specmode = self.specmode.unwrap_or_else(|| DEFAULT_SPECMODE.to_string());
        if !matches!(specmode.as_str(), "mfs" | "cube") {
            return Err(invalid(format!("specmode must be mfs or cube, not '{specmode}'")));
        }
        let imsize = match self.imsize {
            None => DEFAULT_IMSIZE.to_vec(),
            Some(s) if s.len() == 1 => vec![s[0], s[0]],
            Some(s) if s.len() == 2 => s,
            Some(s) => return Err(invalid(format!("imsize needs one or two values, not {}", s.len()))),
        };

        let vis = resolve_vis(NAME, self.vis, context)?;
        let intent = self.intent.unwrap_or_else(|| DEFAULT_INTENT.to_string());
        let wanted_fields: Vec<&str> = self
            .field
            .as_deref()
            .map(|f| f.split(',').map(|f| f.trim()).filter(|f| !f.is_empty()).collect())
            .unwrap_or_default();

        // Fields are imaged once per intent, with every measurement set that
        // observed them.
        let mut targets: IndexMap<(String, String), ImageTarget> = IndexMap::new();
        for i in intent_list(&intent) {
            for v in &vis {
                let ms = context.observing_run.get_ms(v)?;
                for field in ms.fields.iter().filter(|f| f.intents.contains(i)) {
                    if !wanted_fields.is_empty() && !wanted_fields.contains(&field.name.as_str()) {
                        continue;
                    }
                    let target = targets
                        .entry((field.name.clone(), i.to_string()))
                        .or_insert_with(|| ImageTarget {
                            field: field.name.clone(),
                            intent: i.to_string(),
                            spw: self.spw.clone().unwrap_or_else(|| science_spws(ms, i)),
                            vis: vec![],
                        });
                    if !target.vis.contains(v) {
                        target.vis.push(v.clone());
                    }
                }
            }
        }

        Ok(MakeimagesInputs {
            vis,
            targets: targets.into_values().collect(),
            specmode,
            imsize,
            cell: self.cell.unwrap_or_else(|| DEFAULT_CELL.to_string()),
            niter: self.niter.unwrap_or(DEFAULT_NITER),
            call,
        })
    }
}

impl Task for MakeimagesInputs {
    fn name(&self) -> &'static str {
        NAME
    }

    fn vis(&self) -> &[String] {
        &self.vis
    }

    fn is_multi_vis(&self) -> bool {
        true
    }

    fn for_vis(&self, _i: usize) -> Self {
        self.clone()
    }

    fn pipeline_casa_task(&self) -> &str {
        &self.call
    }

    fn prepare(&self, context: &Context, executor: &Executor) -> Result<Prepared, TaskError> {
        if self.targets.is_empty() {
            warn!("There is nothing to image");
        }
        let stage = context.task_counter + 1;
        let prefix = ous_prefix(context).unwrap_or_else(|| "oussid".to_string());

        let mut images = vec![];
        for target in &self.targets {
            let imagename = format!(
                "{prefix}.s{stage}.{}.{}.spw{}.{}",
                sanitize(&target.field),
                target.intent.to_lowercase(),
                target.spw.replace(['~', ','], "_"),
                self.specmode
            );
            info!("Imaging {} ({}) into {imagename}", target.field, target.intent);

            let job = JobRequest::new("tclean")
                .arg("vis", target.vis.clone())
                .arg("imagename", context.output_dir.join(&imagename).display().to_string())
                .arg("field", target.field.as_str())
                .arg("intent", target.intent.as_str())
                .arg("spw", target.spw.as_str())
                .arg("specmode", self.specmode.as_str())
                .arg("imsize", self.imsize.clone())
                .arg("cell", self.cell.as_str())
                .arg("niter", self.niter)
                .arg("deconvolver", "hogbom")
                .arg("weighting", "briggs")
                .arg("robust", 0.5);
            executor.execute(&job)?;

            images.push(ImageProduct {
                name: format!("{imagename}.image"),
                imtype: if target.intent == "TARGET" {
                    ImageType::Target
                } else {
                    ImageType::Calibrator
                },
                field: target.field.clone(),
                spw: target.spw.clone(),
                intent: target.intent.clone(),
                vis: target.vis.clone(),
            });
        }

        Ok(Prepared::new(Outcome::Image(ImageResults { images })))
    }
}
