// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use crate::{
    callibrary::CalLibraryError, context::ContextError, domain::DomainError,
    executor::ExecutorError, heuristics::HeuristicsError, io::GlobError, manifest::ManifestError,
};

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("{task}: there are no measurement sets to work on; import some data first")]
    NoVis { task: &'static str },

    #[error("{task}: {msg}")]
    InvalidInput { task: &'static str, msg: String },

    #[error("No metadata file was found for '{}'", vis.display())]
    NoMetadata { vis: PathBuf },

    #[error("The toolkit job '{fn_name}' didn't return {what}")]
    MissingOutput { fn_name: String, what: &'static str },

    #[error("Couldn't write '{}': {err}", file.display())]
    Write { file: PathBuf, err: std::io::Error },

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    CalLibrary(#[from] CalLibraryError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Heuristics(#[from] HeuristicsError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}
