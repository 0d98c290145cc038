// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpful functions for tests.

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
    sync::Mutex,
};

use tempfile::TempDir;

use crate::{
    context::Context,
    domain::{Antenna, Field, MeasurementSet, Scan, SpectralWindow},
    executor::{JobOutput, JobRequest, Toolkit, ToolkitError},
};

/// A toolkit that remembers every job it ran. Like the real toolkit, jobs
/// with a `caltable` argument produce that caltable on disk. Canned outputs
/// can be set per function name.
#[derive(Default)]
pub(crate) struct RecordingToolkit {
    jobs: Mutex<Vec<JobRequest>>,
    outputs: HashMap<String, serde_json::Value>,
}

impl RecordingToolkit {
    pub(crate) fn with_output(mut self, fn_name: &str, output: serde_json::Value) -> Self {
        self.outputs.insert(fn_name.to_string(), output);
        self
    }

    pub(crate) fn jobs(&self) -> Vec<JobRequest> {
        self.jobs.lock().unwrap().clone()
    }

    pub(crate) fn fn_names(&self) -> Vec<String> {
        self.jobs().into_iter().map(|j| j.fn_name).collect()
    }
}

impl Toolkit for RecordingToolkit {
    fn run(&self, job: &JobRequest) -> Result<JobOutput, ToolkitError> {
        if let Some(caltable) = job.get("caltable").and_then(|c| c.as_str()) {
            std::fs::write(caltable, b"").unwrap();
        }
        self.jobs.lock().unwrap().push(job.clone());
        Ok(self.outputs.get(&job.fn_name).cloned())
    }
}

pub(crate) fn intents(s: &[&str]) -> BTreeSet<String> {
    s.iter().map(|i| i.to_string()).collect()
}

/// A small ALMA-like measurement set: four antennas, a bandpass/amplitude
/// calibrator, a phase calibrator and a target, one WVR window and three
/// science windows.
pub(crate) fn get_test_ms(name: &str) -> MeasurementSet {
    let antenna = |id, name: &str, position| Antenna {
        id,
        name: name.to_string(),
        station: format!("A{:03}", id + 1),
        position,
        diameter: 12.0,
    };
    let field = |id, name: &str, i: &[&str]| Field {
        id,
        name: name.to_string(),
        source_name: name.to_string(),
        intents: intents(i),
    };
    let all_intents = ["AMPLITUDE", "BANDPASS", "PHASE", "TARGET"];

    MeasurementSet {
        name: name.to_string(),
        antennas: vec![
            antenna(0, "DA41", [100.0, 0.0, 0.0]),
            antenna(1, "DA42", [0.0, 0.0, 0.0]),
            antenna(2, "DV03", [-100.0, 0.0, 0.0]),
            antenna(3, "DV10", [400.0, 0.0, 0.0]),
        ],
        fields: vec![
            field(0, "J1331+3030", &["AMPLITUDE", "BANDPASS"]),
            field(1, "J1256-0547", &["PHASE"]),
            field(2, "NGC253", &["TARGET"]),
        ],
        spectral_windows: vec![
            SpectralWindow::new(0, 4, intents(&all_intents)),
            SpectralWindow::new(1, 128, intents(&all_intents)),
            SpectralWindow::new(2, 128, intents(&all_intents)),
            SpectralWindow::new(3, 128, intents(&["PHASE", "TARGET"])),
        ],
        scans: vec![
            Scan {
                id: 1,
                intents: intents(&["AMPLITUDE", "BANDPASS"]),
                field_ids: [0].into_iter().collect(),
                spw_ids: [0, 1, 2].into_iter().collect(),
            },
            Scan {
                id: 2,
                intents: intents(&["PHASE"]),
                field_ids: [1].into_iter().collect(),
                spw_ids: [0, 1, 2, 3].into_iter().collect(),
            },
            Scan {
                id: 3,
                intents: intents(&["TARGET"]),
                field_ids: [2].into_iter().collect(),
                spw_ids: [0, 1, 2, 3].into_iter().collect(),
            },
        ],
        states: vec![],
        reference_antenna: None,
        flagged_antennas: vec![],
    }
}

/// A context living in a temporary directory with one registered
/// measurement set.
pub(crate) fn get_test_context(dir: &TempDir, vis: &str) -> Context {
    let mut context = Context::new("test", dir.path());
    context
        .observing_run
        .add_ms(get_test_ms(vis))
        .expect("fresh observing run");
    context
}

/// Write an empty file, standing in for a caltable the toolkit produced.
pub(crate) fn touch<P: AsRef<Path>>(path: P) -> PathBuf {
    std::fs::write(path.as_ref(), b"").unwrap();
    path.as_ref().to_path_buf()
}
