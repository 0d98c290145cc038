// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The XML manifest listing the products exported for an observing unit set.

use std::{fmt::Write as _, fs, path::Path};

use log::info;
use thiserror::Error;

use crate::results::ImageType;

const INDENT: &str = "    ";

/// The products of one measurement set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsProducts {
    pub name: String,

    /// The file listing the calibrations applied to the measurement set.
    pub calapply: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProducts {
    pub name: String,

    /// The archive of caltables applied to the session's measurement sets.
    pub caltables: Option<String>,

    pub mses: Vec<MsProducts>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineManifest {
    ous_id: String,
    pipeline_version: String,
    procedure_name: Option<String>,
    sessions: Vec<SessionProducts>,
    casa_cmdlog: Option<String>,
    pipescript: Option<String>,
    images: Vec<(String, ImageType)>,
}

impl PipelineManifest {
    pub fn new<S: Into<String>>(ous_id: S) -> PipelineManifest {
        PipelineManifest {
            ous_id: ous_id.into(),
            pipeline_version: env!("CARGO_PKG_VERSION").to_string(),
            procedure_name: None,
            sessions: vec![],
            casa_cmdlog: None,
            pipescript: None,
            images: vec![],
        }
    }

    pub fn set_procedure_name<S: Into<String>>(&mut self, name: S) {
        self.procedure_name = Some(name.into());
    }

    pub fn add_session(&mut self, session: SessionProducts) {
        self.sessions.push(session);
    }

    pub fn set_casa_cmdlog<S: Into<String>>(&mut self, name: S) {
        self.casa_cmdlog = Some(name.into());
    }

    pub fn set_pipescript<S: Into<String>>(&mut self, name: S) {
        self.pipescript = Some(name.into());
    }

    pub fn add_image<S: Into<String>>(&mut self, name: S, imtype: ImageType) {
        self.images.push((name.into(), imtype));
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" ?>\n");
        let ous = escape(&self.ous_id);
        // Writing to a String can't fail.
        let _ = writeln!(xml, "<piperesults name=\"{ous}\">");
        let _ = writeln!(xml, "{INDENT}<ous name=\"{ous}\">");

        element(&mut xml, 2, "pipeline_version", &[("version", self.pipeline_version.as_str())]);
        if let Some(name) = &self.procedure_name {
            element(&mut xml, 2, "procedure_name", &[("name", name.as_str())]);
        }
        for session in &self.sessions {
            let _ = writeln!(xml, "{}<session name=\"{}\">", INDENT.repeat(2), escape(&session.name));
            if let Some(caltables) = &session.caltables {
                element(&mut xml, 3, "caltables", &[("name", caltables.as_str())]);
            }
            for ms in &session.mses {
                match &ms.calapply {
                    Some(calapply) => {
                        let _ = writeln!(xml, "{}<ms name=\"{}\">", INDENT.repeat(3), escape(&ms.name));
                        element(&mut xml, 4, "calapply", &[("name", calapply.as_str())]);
                        let _ = writeln!(xml, "{}</ms>", INDENT.repeat(3));
                    }
                    None => element(&mut xml, 3, "ms", &[("name", ms.name.as_str())]),
                }
            }
            let _ = writeln!(xml, "{}</session>", INDENT.repeat(2));
        }
        if let Some(cmdlog) = &self.casa_cmdlog {
            element(&mut xml, 2, "casa_cmdlog", &[("name", cmdlog.as_str())]);
        }
        if let Some(pipescript) = &self.pipescript {
            element(&mut xml, 2, "pipescript", &[("name", pipescript.as_str())]);
        }
        for (name, imtype) in &self.images {
            element(&mut xml, 2, "image", &[("name", name.as_str()), ("imtype", imtype.to_string().as_str())]);
        }

        let _ = writeln!(xml, "{INDENT}</ous>");
        xml.push_str("</piperesults>\n");
        xml
    }

    pub fn write(&self, file: &Path) -> Result<(), ManifestError> {
        info!("Writing manifest {}", file.display());
        fs::write(file, self.to_xml()).map_err(|err| ManifestError::Write {
            file: file.display().to_string(),
            err,
        })
    }
}

/// Write an empty element, e.g. `<ms name="x.ms"/>`.
fn element(xml: &mut String, depth: usize, tag: &str, attrs: &[(&str, &str)]) {
    let attrs: String = attrs
        .iter()
        .map(|(k, v)| format!(" {k}=\"{}\"", escape(v)))
        .collect();
    let _ = writeln!(xml, "{}<{tag}{attrs}/>", INDENT.repeat(depth));
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Couldn't write the manifest '{file}': {err}")]
    Write { file: String, err: std::io::Error },
}
