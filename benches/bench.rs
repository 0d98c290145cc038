// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeSet;

use criterion::*;

use calpipe::{
    domain::{Antenna, Field, SpectralWindow},
    CalFrom, CalLibrary, CalTo, MeasurementSet, ObservingRun,
};

/// A measurement set about the size of a full ALMA observation.
fn get_big_run() -> ObservingRun {
    let intents: BTreeSet<String> = ["BANDPASS", "PHASE", "TARGET"]
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    let ms = MeasurementSet {
        name: "uid___A002_X1.ms".to_string(),
        antennas: (0..48)
            .map(|id| Antenna {
                id,
                name: format!("DA{id:02}"),
                station: String::new(),
                position: [id as f64 * 50.0, 0.0, 0.0],
                diameter: 12.0,
            })
            .collect(),
        fields: (0..10)
            .map(|id| Field {
                id,
                name: format!("F{id}"),
                source_name: String::new(),
                intents: intents.clone(),
            })
            .collect(),
        spectral_windows: (0..16)
            .map(|id| SpectralWindow::new(id, 128, intents.clone()))
            .collect(),
        scans: vec![],
        states: vec![],
        reference_antenna: None,
        flagged_antennas: vec![],
    };
    let mut run = ObservingRun::default();
    run.add_ms(ms).unwrap();
    run
}

fn callibrary(c: &mut Criterion) {
    let run = get_big_run();
    let calto = CalTo::new("uid___A002_X1.ms");
    let calfroms = [
        CalFrom::new("uid___A002_X1.ms.bcal.tbl").unwrap(),
        CalFrom::new("uid___A002_X1.ms.gpcal.tbl").unwrap(),
    ];

    c.bench_function("add to every cell", |b| {
        b.iter(|| {
            let mut callib = CalLibrary::default();
            callib.add(&run, &calto, &calfroms).unwrap();
            callib
        })
    });

    let mut callib = CalLibrary::default();
    callib.add(&run, &calto, &calfroms).unwrap();
    c.bench_function("get calstate of every cell", |b| {
        b.iter(|| callib.get_calstate(&run, &calto, &[]).unwrap())
    });
    c.bench_function("merge calstate", |b| b.iter(|| callib.active().merged()));
}

criterion_group!(benches, callibrary);
criterion_main!(benches);
