// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use ndarray::prelude::*;
use serde_json::json;

use super::*;
use crate::tests::get_test_ms;

#[test]
fn test_geometry_scores() {
    let ms = get_test_ms("x.ms");
    let antennas = ms.get_antennas("").unwrap();
    let scores = geometry_scores(&antennas).unwrap();

    // The centre is at x = 100 m; DV10 is furthest away at 300 m.
    assert_abs_diff_eq!(scores["DA41"], 4.0);
    assert_abs_diff_eq!(scores["DA42"], 4.0 * 2.0 / 3.0, epsilon = 1e-10);
    assert_abs_diff_eq!(scores["DV03"], 4.0 / 3.0, epsilon = 1e-10);
    assert_abs_diff_eq!(scores["DV10"], 0.0);

    assert!(matches!(geometry_scores(&[]), Err(HeuristicsError::NoAntennas)));
}

#[test]
fn test_flagging_scores() {
    let summary = FlagdataSummary::from_json(&json!({
        "antenna": {
            "DA41": {"flagged": 50.0, "total": 100.0},
            "DA42": {"flagged": 0.0, "total": 100.0},
            "DV03": {"flagged": 100.0, "total": 100.0},
        }
    }))
    .unwrap();
    let scores = flagging_scores(&["DA41", "DA42", "DV03", "DV10"], &summary);
    assert_abs_diff_eq!(scores["DA41"], 2.0);
    assert_abs_diff_eq!(scores["DA42"], 4.0);
    assert_abs_diff_eq!(scores["DV03"], 0.0);
    assert_abs_diff_eq!(scores["DV10"], 0.0);
}

#[test]
fn test_rank_antennas() {
    let ms = get_test_ms("x.ms");
    let antennas = ms.get_antennas("").unwrap();
    let names: Vec<&str> = antennas.iter().map(|a| a.name.as_str()).collect();
    let geometry = geometry_scores(&antennas).unwrap();

    let ranked = rank_antennas(&names, &[geometry.clone()], &[]).unwrap();
    assert_eq!(ranked.as_slice(), &["DA41", "DA42", "DV03", "DV10"]);

    let summary = FlagdataSummary::from_json(&json!({
        "antenna": {
            "DA41": {"flagged": 100.0, "total": 100.0},
            "DA42": {"flagged": 0.0, "total": 100.0},
            "DV03": {"flagged": 0.0, "total": 100.0},
            "DV10": {"flagged": 0.0, "total": 100.0},
        }
    }))
    .unwrap();
    let flagging = flagging_scores(&names, &summary);
    let ranked = rank_antennas(&names, &[geometry, flagging], &["DA42".to_string()]).unwrap();
    assert_eq!(ranked.as_slice(), &["DV03", "DA41", "DV10"]);
}

#[test]
fn test_rank_antennas_ties_keep_order() {
    let ranked = rank_antennas(&["b", "a", "c"], &[], &[]).unwrap();
    assert_eq!(ranked.as_slice(), &["b", "a", "c"]);

    let result = rank_antennas(&["a"], &[], &["a".to_string()]);
    assert!(matches!(result, Err(HeuristicsError::NoAntennasLeft)));
}

fn row(antenna: usize, spw: usize, flags: Array2<bool>) -> CalTableRow {
    CalTableRow { antenna, spw, flags }
}

#[test]
fn test_get_cal_flagged_soln() {
    let rows = [
        // Antenna 0: nothing flagged in spw 0; half of pol 1 flagged in spw 1.
        row(0, 0, array![[false, false], [false, false]]),
        row(0, 1, array![[false, false], [true, false]]),
        // Antenna 1: everything flagged in spw 0.
        row(1, 0, array![[true, true], [true, true]]),
        row(1, 1, array![[false, false], [false, false]]),
        // Antenna 2: one polarisation flagged in spw 0.
        row(2, 0, array![[true, true], [false, false]]),
    ];
    let summary = get_cal_flagged_soln(&rows);

    assert_abs_diff_eq!(summary.all.total, 10.0);
    assert_abs_diff_eq!(summary.all.flagged, 3.5);
    assert_abs_diff_eq!(summary.all.fraction, 0.35);

    assert_abs_diff_eq!(summary.antspw[&0][&1][1].flagged, 0.5);
    assert_abs_diff_eq!(summary.antspw[&0][&1][1].fraction, 0.5);
    assert_abs_diff_eq!(summary.antspw[&1][&0][0].fraction, 1.0);

    assert_abs_diff_eq!(summary.ant[&1][0].total, 2.0);
    assert_abs_diff_eq!(summary.ant[&1][0].fraction, 0.5);

    assert_abs_diff_eq!(summary.spw[&0][0].total, 3.0);
    assert_abs_diff_eq!(summary.spw[&0][0].flagged, 2.0);
    assert_abs_diff_eq!(summary.spw[&1][1].fraction, 0.25);

    // Per antenna: (total, flagged) = (4, 0.5), (4, 2), (2, 1).
    assert_eq!(summary.antmedian.number, 3);
    assert_abs_diff_eq!(summary.antmedian.total, 4.0);
    assert_abs_diff_eq!(summary.antmedian.flagged, 1.0);
    assert_abs_diff_eq!(summary.antmedian.fraction, 0.5);
}

#[test]
fn test_get_cal_flagged_soln_even_median() {
    let rows = [
        row(0, 0, array![[true, false]]),
        row(1, 0, array![[true, true]]),
    ];
    let summary = get_cal_flagged_soln(&rows);
    assert_eq!(summary.antmedian.number, 2);
    assert_abs_diff_eq!(summary.antmedian.fraction, 0.75);

    let empty = get_cal_flagged_soln(&[]);
    assert_abs_diff_eq!(empty.all.fraction, 0.0);
    assert_eq!(empty.antmedian.number, 0);
}

#[test]
fn test_rows_from_json() {
    let rows = CalTableRow::from_json(&json!([
        {"antenna": 3, "spw": 1, "flag": [[true, false, false], [false, false, false]]},
    ]))
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].antenna, 3);
    assert_eq!(rows[0].flags.dim(), (2, 3));
    assert!(rows[0].flags[(0, 0)]);

    let result = CalTableRow::from_json(&json!([{"antenna": 0, "spw": 0, "flag": [[true], []]}]));
    assert!(matches!(result, Err(HeuristicsError::RaggedFlags { row: 0 })));

    let result = CalTableRow::from_json(&json!({"antenna": 0}));
    assert!(matches!(result, Err(HeuristicsError::BadToolkitOutput { .. })));
}
