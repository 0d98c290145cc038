// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Package the products of a reduction.
//!
//! For every measurement set, the calibrations that were applied to it are
//! written as `applycal` calls (`<vis>.calapply.txt`). The applied caltables
//! of a session are archived into `<ous>.<session>.caltables.tgz`, the
//! commands log and pipeline script are copied and everything is listed in
//! `<ous>.pipeline_manifest.xml`.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use clap::Parser;
use flate2::{write::GzEncoder, Compression};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{ous_prefix, pipeline_call, resolve_vis, Task, TaskArgs, TaskError};
use crate::{
    constants::{MANIFEST_NAME, UNKNOWN_OUS},
    context::Context,
    executor::Executor,
    manifest::{MsProducts, PipelineManifest, SessionProducts},
    results::{ExportResults, Outcome, Prepared},
};

const NAME: &str = "h_exportdata";
const DEFAULT_SESSION: &str = "session_1";

#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportdataArgs {
    /// Default: all registered measurement sets.
    #[clap(long, multiple_values(true), help_heading = "DATA SELECTION")]
    pub vis: Option<Vec<String>>,

    /// Where the products go. Default: the products directory of the context.
    #[clap(long, parse(from_os_str))]
    pub products_dir: Option<PathBuf>,

    /// Default: the session given at import, or session_1
    #[clap(long)]
    pub session: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportdataInputs {
    pub vis: Vec<String>,
    pub products_dir: PathBuf,
    pub session: String,

    #[serde(skip)]
    call: String,
}

impl TaskArgs for ExportdataArgs {
    type Inputs = ExportdataInputs;

    fn merge(self, other: Self) -> Self {
        ExportdataArgs {
            vis: self.vis.or(other.vis),
            products_dir: self.products_dir.or(other.products_dir),
            session: self.session.or(other.session),
        }
    }

    fn into_inputs(self, context: &Context) -> Result<ExportdataInputs, TaskError> {
        Ok(ExportdataInputs {
            call: pipeline_call(NAME, &self),
            vis: resolve_vis(NAME, self.vis, context)?,
            products_dir: self
                .products_dir
                .unwrap_or_else(|| context.products_dir.clone()),
            session: self
                .session
                .or_else(|| context.project.session.clone())
                .unwrap_or_else(|| DEFAULT_SESSION.to_string()),
        })
    }
}

impl Task for ExportdataInputs {
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
        let dry_run = executor.is_dry_run();
        let ous = ous_prefix(context);
        let oussid = ous.clone().unwrap_or_else(|| UNKNOWN_OUS.to_string());
        let dir = &self.products_dir;
        if !dry_run {
            fs::create_dir_all(dir).map_err(|err| write_err(dir, err))?;
        }
        info!("Exporting products into {}", dir.display());

        let mut files = vec![];
        let mut manifest = PipelineManifest::new(oussid.as_str());
        if let Some(procedure) = context
            .project
            .procedure_title
            .as_ref()
            .or(context.project.recipe_name.as_ref())
        {
            manifest.set_procedure_name(procedure.as_str());
        }

        // Applied calibrations, per measurement set.
        let applied = context.callibrary.applied();
        let mut session = SessionProducts {
            name: self.session.clone(),
            caltables: None,
            mses: vec![],
        };
        let mut caltables: Vec<String> = vec![];
        for vis in &self.vis {
            let basename = basename(vis);
            let calstate = applied.trimmed(vis);
            let calapply = if calstate.is_empty() {
                debug!("No calibrations have been applied to {vis}");
                None
            } else {
                let file = dir.join(format!("{basename}.calapply.txt"));
                if !dry_run {
                    let text = format!("# Apply file for {basename}\n{}\n", calstate.as_applycal());
                    fs::write(&file, text).map_err(|err| write_err(&file, err))?;
                }
                files.push(file);
                for caltable in calstate.get_caltable(None) {
                    if !caltables.contains(&caltable) {
                        caltables.push(caltable);
                    }
                }
                Some(format!("{basename}.calapply.txt"))
            };
            session.mses.push(MsProducts {
                name: basename.to_string(),
                calapply,
            });
        }

        if !caltables.is_empty() {
            let name = format!("{oussid}.{}.caltables.tgz", self.session);
            let file = dir.join(&name);
            if !dry_run {
                archive_caltables(&file, &caltables)?;
            }
            files.push(file);
            session.caltables = Some(name);
        }
        manifest.add_session(session);

        // The logs are named after the recipe too, if there was one.
        let prefix = ous.map(|ous| match &context.project.recipe_name {
            Some(recipe) => format!("{ous}.{recipe}"),
            None => ous,
        });
        let prefixed = |name: &str| match &prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.to_string(),
        };
        if let Some(name) = copy_product(&context.commands_log(), dir, &prefixed(&context.logs.casa_commands), dry_run)? {
            manifest.set_casa_cmdlog(name.as_str());
            files.push(dir.join(name));
        }
        if let Some(name) = copy_product(
            &context.pipeline_script(),
            dir,
            &prefixed(&context.logs.pipeline_script),
            dry_run,
        )? {
            manifest.set_pipescript(name.as_str());
            files.push(dir.join(name));
        }

        for image in &context.images {
            manifest.add_image(image.name.as_str(), image.imtype);
        }
        let file = dir.join(format!("{oussid}.{MANIFEST_NAME}"));
        if !dry_run {
            manifest.write(&file)?;
        }
        files.push(file);

        Ok(Prepared::new(Outcome::Export(ExportResults {
            products_dir: dir.clone(),
            files,
        })))
    }
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

fn write_err(file: &Path, err: std::io::Error) -> TaskError {
    TaskError::Write {
        file: file.to_path_buf(),
        err,
    }
}

/// Copy `src` into `dir` as `name`. Missing files are skipped with a warning.
fn copy_product(src: &Path, dir: &Path, name: &str, dry_run: bool) -> Result<Option<String>, TaskError> {
    if !src.exists() {
        if !dry_run {
            warn!("{} doesn't exist; not exporting it", src.display());
        }
        return Ok(None);
    }
    let dest = dir.join(name);
    if !dry_run {
        debug!("Copying {} to {}", src.display(), dest.display());
        fs::copy(src, &dest).map_err(|err| write_err(&dest, err))?;
    }
    Ok(Some(name.to_string()))
}

/// Write a gzipped tar of caltables. Caltables are directories, but plain
/// files are archived too; missing ones are skipped with a warning.
fn archive_caltables(file: &Path, caltables: &[String]) -> Result<(), TaskError> {
    info!("Archiving {} caltable(s) into {}", caltables.len(), file.display());
    let f = File::create(file).map_err(|err| write_err(file, err))?;
    let mut tar = tar::Builder::new(GzEncoder::new(f, Compression::default()));
    for caltable in caltables {
        let path = Path::new(caltable);
        let name = basename(caltable);
        let result = if path.is_dir() {
            tar.append_dir_all(name, path)
        } else if path.is_file() {
            tar.append_path_with_name(path, name)
        } else {
            warn!("Caltable {caltable} doesn't exist; not archiving it");
            continue;
        };
        result.map_err(|err| write_err(file, err))?;
    }
    tar.into_inner()
        .and_then(|gz| gz.finish())
        .map_err(|err| write_err(file, err))?;
    Ok(())
}
