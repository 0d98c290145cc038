// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use super::METADATA_FILE_TYPES_COMMA_SEPARATED;
use crate::selection::SelectionError;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Measurement set '{name}' is not registered with the observing run")]
    UnknownMs { name: String },

    #[error("Measurement set '{name}' is already registered with the observing run")]
    DuplicateMs { name: String },

    #[error("Bad selection for '{vis}': {err}")]
    Selection { vis: String, err: SelectionError },

    #[error("Metadata file '{}' doesn't have a recognised extension! Valid extensions are: {}", file.display(), *METADATA_FILE_TYPES_COMMA_SEPARATED)]
    UnsupportedMetadataExt { file: PathBuf },

    #[error("Couldn't read measurement-set metadata from '{}': {err}", file.display())]
    BadMetadataFile { file: PathBuf, err: String },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
