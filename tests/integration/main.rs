// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod calstate;
mod recipe;
mod stages;

use std::{
    path::{Path, PathBuf},
    process::Output,
    str::from_utf8,
};

use assert_cmd::{output::OutputError, Command};
use indoc::indoc;
use tempfile::TempDir;

fn calpipe() -> Command {
    Command::cargo_bin("calpipe").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// Metadata of a small measurement set: three antennas, a bandpass
/// calibrator and a target, one science window.
const METADATA: &str = indoc! {r#"
    name: x.ms
    antennas:
      - {id: 0, name: DA41, position: [100.0, 0.0, 0.0]}
      - {id: 1, name: DA42, position: [0.0, 0.0, 0.0]}
      - {id: 2, name: DV03, position: [-300.0, 0.0, 0.0]}
    fields:
      - {id: 0, name: J1331+3030, intents: [BANDPASS, PHASE]}
      - {id: 1, name: NGC253, intents: [TARGET]}
    spectral_windows:
      - {id: 0, num_channels: 4, intents: [BANDPASS, PHASE, TARGET]}
      - {id: 1, num_channels: 128, intents: [BANDPASS, PHASE, TARGET]}
"#};

/// A temporary directory with a freshly initialised context and the metadata
/// of `x.ms`.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Workspace {
        let dir = TempDir::new().expect("couldn't make tmp dir");
        std::fs::write(dir.path().join("x.ms.yaml"), METADATA).unwrap();
        let ws = Workspace { dir };

        #[rustfmt::skip]
        let cmd = calpipe()
            .args([
                "init",
                "--output-dir", &ws.path().display().to_string(),
                "--context", &ws.context_file().display().to_string(),
                "--no-progress-bars",
            ])
            .ok();
        assert!(cmd.is_ok(), "init failed: {}", cmd.err().unwrap());
        ws
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn context_file(&self) -> PathBuf {
        self.path().join("pipeline.context")
    }

    fn metadata(&self) -> String {
        self.path().join("x.ms.yaml").display().to_string()
    }

    /// Run a subcommand against the context.
    fn run(&self, args: &[&str]) -> Result<Output, OutputError> {
        calpipe()
            .args(args)
            .args([
                "--context",
                &self.context_file().display().to_string(),
                "--no-progress-bars",
            ])
            .ok()
    }

    fn context(&self) -> calpipe::Context {
        calpipe::Context::resume(&self.context_file()).unwrap()
    }
}

#[test]
fn test_help() {
    let cmd = calpipe().arg("--help").ok();
    assert!(cmd.is_ok());
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
    for sub_command in ["init", "importdata", "gaincal", "calstate", "recipe"] {
        assert!(stdout.contains(sub_command), "help doesn't mention {sub_command}");
    }
}

#[test]
fn test_missing_context_is_an_error() {
    let dir = TempDir::new().unwrap();
    let context = dir.path().join("missing.context");
    let cmd = calpipe()
        .args(["refant", "--context", &context.display().to_string()])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.starts_with("Error:"), "{stderr}");
}

#[test]
fn test_init_doesnt_overwrite() {
    let ws = Workspace::new();
    let cmd = ws.run(&["init"]);
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("already exists"), "{stderr}");
}
