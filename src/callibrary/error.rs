// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::DomainError;

#[derive(Error, Debug)]
pub enum CalLibraryError {
    #[error("A CalFrom needs a gaintable")]
    EmptyGaintable,

    #[error("Couldn't read calibration application from '{line}': {err}")]
    BadExport { line: String, err: String },

    #[error("Couldn't write calibration state to '{}': {err}", file.display())]
    Write { file: PathBuf, err: std::io::Error },

    #[error("Couldn't read calibration state from '{}': {err}", file.display())]
    Read { file: PathBuf, err: std::io::Error },

    #[error(transparent)]
    Domain(#[from] DomainError),
}
