// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeuristicsError {
    #[error("There are no antennas to rank")]
    NoAntennas,

    #[error("Every antenna was excluded from the reference antenna ranking")]
    NoAntennasLeft,

    #[error("Couldn't read the {what} returned by the toolkit: {err}")]
    BadToolkitOutput { what: &'static str, err: String },

    #[error("Row {row} of the caltable flags is ragged; each polarisation must have the same number of channels")]
    RaggedFlags { row: usize },
}
