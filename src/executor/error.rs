// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("Couldn't run toolkit program '{}': {err}", program.display())]
    Spawn {
        program: PathBuf,
        err: std::io::Error,
    },

    #[error("Toolkit job '{fn_name}' failed (exit code {}): {stderr}", code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    Failed {
        fn_name: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Toolkit job '{fn_name}' returned something that isn't JSON: {err}")]
    BadOutput { fn_name: String, err: String },
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error(transparent)]
    Toolkit(#[from] ToolkitError),

    #[error("Couldn't write to the commands log '{}': {err}", file.display())]
    CommandsLog {
        file: PathBuf,
        err: std::io::Error,
    },
}
