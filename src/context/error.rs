// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use crate::{callibrary::CalLibraryError, domain::DomainError, executor::ExecutorError};

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("The results with ID {id} have already been added to the context")]
    AlreadyAccepted { id: String },

    #[error("Couldn't write '{}': {err}", file.display())]
    Write { file: PathBuf, err: std::io::Error },

    #[error("Couldn't read '{}': {err}", file.display())]
    Read { file: PathBuf, err: std::io::Error },

    #[error("Couldn't (de)serialise '{}': {err}", file.display())]
    Json { file: PathBuf, err: serde_json::Error },

    #[error(transparent)]
    CalLibrary(#[from] CalLibraryError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}
