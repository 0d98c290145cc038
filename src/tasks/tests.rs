// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fs::File;

use flate2::read::GzDecoder;
use serde_json::json;
use tar::Archive;
use tempfile::{tempdir, TempDir};

use super::*;
use crate::{
    domain::DomainError,
    executor::LogOnlyToolkit,
    results::{ImageType, Outcome, QaStatus},
    tests::{get_test_context, get_test_ms, touch, RecordingToolkit},
};

fn arg_str<'a>(job: &'a JobRequest, name: &str) -> &'a str {
    job.get(name).and_then(|v| v.as_str()).unwrap()
}

fn context_with_refant(dir: &TempDir) -> Context {
    let mut context = get_test_context(dir, "x.ms");
    context.observing_run.get_ms_mut("x.ms").unwrap().reference_antenna = Some("DA42,DA41".to_string());
    context
}

fn gaincal_p() -> GaincalArgs {
    GaincalArgs {
        calmode: Some("p".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_pipeline_call() {
    let args = GaincalArgs {
        vis: Some(vec!["x.ms".to_string()]),
        calmode: Some("p".to_string()),
        minsnr: Some(2.5),
        ..Default::default()
    };
    assert_eq!(
        pipeline_call("hif_gaincal", &args),
        "hif_gaincal(vis=['x.ms'], calmode='p', minsnr=2.5)"
    );

    // Flags only appear when set.
    let args = RefantArgs {
        no_geometry: true,
        ..Default::default()
    };
    assert_eq!(pipeline_call("hif_refant", &args), "hif_refant(no_geometry=True)");
    assert_eq!(pipeline_call("hif_refant", &RefantArgs::default()), "hif_refant()");
}

#[test]
fn test_resolve_vis() {
    let dir = tempdir().unwrap();
    let empty = Context::new("test", dir.path());
    assert!(matches!(
        resolve_vis("hif_gaincal", None, &empty),
        Err(TaskError::NoVis { task: "hif_gaincal" })
    ));

    let mut context = get_test_context(&dir, "x.ms");
    context.observing_run.add_ms(get_test_ms("y.ms")).unwrap();
    assert_eq!(resolve_vis("t", None, &context).unwrap(), ["x.ms", "y.ms"]);
    assert_eq!(resolve_vis("t", Some(vec![]), &context).unwrap(), ["x.ms", "y.ms"]);
    assert_eq!(
        resolve_vis("t", Some(vec!["y.ms".to_string()]), &context).unwrap(),
        ["y.ms"]
    );
    assert!(matches!(
        resolve_vis("t", Some(vec!["z.ms".to_string()]), &context),
        Err(TaskError::Domain(DomainError::UnknownMs { .. }))
    ));

    // Basenames resolve to the registered name.
    let mut context = get_test_context(&dir, "raw/x.ms");
    context.observing_run.add_ms(get_test_ms("y.ms")).unwrap();
    assert_eq!(
        resolve_vis("t", Some(vec!["x.ms".to_string(), "y.ms".to_string()]), &context).unwrap(),
        ["raw/x.ms", "y.ms"]
    );
}

#[test]
fn test_default_selections() {
    let ms = get_test_ms("x.ms");
    assert_eq!(science_spws(&ms, ""), "1~3");
    assert_eq!(science_spws(&ms, "BANDPASS"), "1~2");
    assert_eq!(science_spws(&ms, "PHASE,TARGET"), "1~3");
    assert_eq!(science_spws(&ms, "POINTING"), "");

    assert_eq!(fields_with_intent(&ms, "PHASE"), "J1256-0547");
    assert_eq!(fields_with_intent(&ms, "*BANDPASS*,PHASE"), "J1331+3030,J1256-0547");
    assert_eq!(fields_with_intent(&ms, ""), "J1331+3030,J1256-0547,NGC253");

    assert_eq!(sanitize("J1331+3030 (bp)"), "J1331+3030__bp_");
}

#[test]
fn test_gaincal_job() {
    let dir = tempdir().unwrap();
    let mut context = context_with_refant(&dir);
    let toolkit = RecordingToolkit::default();

    let report = run_task(gaincal_p(), &mut context, &toolkit, false, false).unwrap();
    assert_eq!(report.stage_number, 1);
    assert_eq!(report.task, "hif_gaincal");
    assert_eq!(report.qa.unwrap().status, QaStatus::Pass);
    assert_eq!(context.task_counter, 1);

    let jobs = toolkit.jobs();
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.fn_name, "gaincal");
    let caltable = dir
        .path()
        .join("x.ms.hif_gaincal.s1.spw1_3.solintint.gpcal.tbl")
        .display()
        .to_string();
    assert_eq!(arg_str(job, "caltable"), caltable);
    assert_eq!(arg_str(job, "field"), "J1256-0547");
    assert_eq!(arg_str(job, "intent"), "PHASE");
    assert_eq!(arg_str(job, "spw"), "1~3");
    assert_eq!(arg_str(job, "refant"), "DA42,DA41");
    assert_eq!(arg_str(job, "calmode"), "p");
    assert_eq!(job.get("selectdata").and_then(|v| v.as_bool()), Some(false));
    // Nothing to pre-apply yet.
    assert_eq!(job.get("gaintable").and_then(|v| v.as_list()).map(|l| l.len()), Some(0));

    // The gain table is now active for every cell of its spectral windows.
    let calstate = context
        .callibrary
        .get_calstate(&context.observing_run, &CalTo::new("x.ms").with_spw("1"), &[])
        .unwrap();
    assert!(!calstate.is_empty());
    for (_, calfroms) in calstate.cells() {
        assert_eq!(calfroms.len(), 1);
        assert_eq!(calfroms[0].gaintable(), caltable);
        assert_eq!(calfroms[0].gainfield(), "J1256-0547");
    }
    let calstate = context
        .callibrary
        .get_calstate(&context.observing_run, &CalTo::new("x.ms").with_spw("0"), &[])
        .unwrap();
    assert!(calstate.is_empty());
}

#[test]
fn test_bandpass_preapplies_gains() {
    let dir = tempdir().unwrap();
    let mut context = context_with_refant(&dir);
    let toolkit = RecordingToolkit::default();

    run_task(gaincal_p(), &mut context, &toolkit, false, false).unwrap();
    let report = run_task(BandpassArgs::default(), &mut context, &toolkit, false, false).unwrap();
    assert_eq!(report.stage_number, 2);

    let jobs = toolkit.jobs();
    assert_eq!(jobs.len(), 2);
    let gaintable = arg_str(&jobs[0], "caltable").to_string();
    let bandpass = &jobs[1];
    assert_eq!(bandpass.fn_name, "bandpass");
    assert_eq!(arg_str(bandpass, "field"), "J1331+3030");
    assert_eq!(arg_str(bandpass, "spw"), "1~2");
    assert_eq!(arg_str(bandpass, "bandtype"), "B");
    assert!(arg_str(bandpass, "caltable").ends_with("x.ms.hif_bandpass.s2.spw1_2.channel.solintinf.bcal.tbl"));
    let preapplied: Vec<&str> = bandpass
        .get("gaintable")
        .and_then(|v| v.as_list())
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(preapplied, [gaintable.as_str()]);

    // Both tables are active for the bandpass calibrator, in order.
    let calstate = context
        .callibrary
        .get_calstate(
            &context.observing_run,
            &CalTo::new("x.ms").with_field("J1331+3030").with_spw("1"),
            &[],
        )
        .unwrap();
    for (_, calfroms) in calstate.cells() {
        assert_eq!(calfroms.len(), 2);
        assert_eq!(calfroms[0].gaintable(), gaintable);
        assert_eq!(calfroms[1].caltype(), crate::callibrary::CalType::Bandpass);
    }
}

#[test]
fn test_invalid_inputs() {
    let dir = tempdir().unwrap();
    let context = context_with_refant(&dir);

    let args = GaincalArgs {
        calmode: Some("k".to_string()),
        ..Default::default()
    };
    assert!(matches!(args.into_inputs(&context), Err(TaskError::InvalidInput { .. })));
    let args = GaincalArgs {
        minsnr: Some(-1.0),
        ..Default::default()
    };
    assert!(matches!(args.into_inputs(&context), Err(TaskError::InvalidInput { .. })));

    assert!(matches!(
        GencalArgs::default().into_inputs(&context),
        Err(TaskError::InvalidInput { .. })
    ));
    let args = GencalArgs {
        caltype: Some("bandpass".to_string()),
        ..Default::default()
    };
    assert!(matches!(args.into_inputs(&context), Err(TaskError::InvalidInput { .. })));

    let args = MakeimagesArgs {
        specmode: Some("cont".to_string()),
        ..Default::default()
    };
    assert!(matches!(args.into_inputs(&context), Err(TaskError::InvalidInput { .. })));
    let args = MakeimagesArgs {
        imsize: Some(vec![1, 2, 3]),
        ..Default::default()
    };
    assert!(matches!(args.into_inputs(&context), Err(TaskError::InvalidInput { .. })));

    let args = LowgainflagArgs {
        max_flagged_fraction: Some(1.5),
        ..Default::default()
    };
    assert!(matches!(args.into_inputs(&context), Err(TaskError::InvalidInput { .. })));
    // No gain caltable to assess.
    assert!(matches!(
        LowgainflagArgs::default().into_inputs(&context),
        Err(TaskError::InvalidInput { .. })
    ));
}

#[test]
fn test_gencal_tsys() {
    let dir = tempdir().unwrap();
    let mut context = context_with_refant(&dir);
    let toolkit = RecordingToolkit::default();

    let args = GencalArgs {
        caltype: Some("TSYS".to_string()),
        spw: Some("1,2".to_string()),
        ..Default::default()
    };
    run_task(args, &mut context, &toolkit, false, false).unwrap();
    let job = &toolkit.jobs()[0];
    assert_eq!(job.fn_name, "gencal");
    assert_eq!(arg_str(job, "caltype"), "tsys");
    assert!(arg_str(job, "caltable").ends_with("x.ms.h_gencal.s1.tsyscal.tbl"));

    let calstate = context
        .callibrary
        .get_calstate(&context.observing_run, &CalTo::new("x.ms"), &[])
        .unwrap();
    let spws: Vec<usize> = calstate.cells().map(|(cell, _)| cell.spw).unique().collect();
    assert_eq!(spws, [1, 2]);
}

#[test]
fn test_failed_stage_changes_nothing() {
    let dir = tempdir().unwrap();
    let mut context = context_with_refant(&dir);
    let caltable = touch(dir.path().join("x.ms.g.tbl"));
    // The toolkit doesn't know getcalflags.
    let toolkit = RecordingToolkit::default();

    let args = LowgainflagArgs {
        caltable: Some(caltable.display().to_string()),
        ..Default::default()
    };
    let result = run_task(args, &mut context, &toolkit, false, false);
    assert!(matches!(result, Err(TaskError::MissingOutput { .. })));
    assert_eq!(context.task_counter, 0);
    assert!(context.results.is_empty());
    assert_eq!(context.observing_run.get_ms("x.ms").unwrap().antennas.len(), 4);

    // The next stage gets the number the failed one had.
    let report = run_task(gaincal_p(), &mut context, &toolkit, false, false).unwrap();
    assert_eq!(report.stage_number, 1);
}

#[test]
fn test_dry_run() {
    let dir = tempdir().unwrap();
    let mut context = context_with_refant(&dir);
    let toolkit = RecordingToolkit::default();

    let report = run_task(gaincal_p(), &mut context, &toolkit, true, false).unwrap();
    assert!(report.qa.is_none());
    assert!(toolkit.jobs().is_empty());
    assert!(context.results.is_empty());
    assert!(context.callibrary.is_empty());
    assert!(!context.commands_log().exists());

    // Dry runs don't need toolkit output either.
    let report = run_task(RefantArgs::default(), &mut context, &toolkit, true, false).unwrap();
    assert!(report.qa.is_none());
    assert_eq!(
        context.observing_run.get_ms("x.ms").unwrap().reference_antenna.as_deref(),
        Some("DA42,DA41")
    );
}

#[test]
fn test_parallel_stage_matches_serial() {
    let mut outcomes = vec![];
    for hpc in [false, true] {
        let dir = tempdir().unwrap();
        let mut context = context_with_refant(&dir);
        let mut ms = get_test_ms("y.ms");
        ms.reference_antenna = Some("DV03".to_string());
        context.observing_run.add_ms(ms).unwrap();

        let inputs = gaincal_p().into_inputs(&context).unwrap();
        let results = execute_stage(&inputs, &mut context, &LogOnlyToolkit, false, hpc).unwrap();
        assert_eq!(context.task_counter, 1);
        assert_eq!(context.subtask_counter, 2);
        let vis: Vec<String> = results
            .outcomes()
            .iter()
            .map(|o| match o {
                Outcome::Calibration(cal) => cal.vis.clone(),
                _ => unreachable!(),
            })
            .collect();
        outcomes.push(vis);
    }
    assert_eq!(outcomes[0], ["x.ms", "y.ms"]);
    assert_eq!(outcomes[0], outcomes[1]);
}

#[test]
fn test_refant_task() {
    let dir = tempdir().unwrap();
    let mut context = get_test_context(&dir, "x.ms");
    let toolkit = RecordingToolkit::default().with_output(
        "flagdata",
        json!({
            "antenna": {
                "DA41": {"flagged": 100.0, "total": 100.0},
                "DA42": {"flagged": 0.0, "total": 100.0},
                "DV03": {"flagged": 0.0, "total": 100.0},
                "DV10": {"flagged": 0.0, "total": 100.0},
            }
        }),
    );

    run_task(RefantArgs::default(), &mut context, &toolkit, false, false).unwrap();
    let job = &toolkit.jobs()[0];
    assert_eq!(arg_str(job, "mode"), "summary");
    assert_eq!(arg_str(job, "field"), "J1331+3030,J1256-0547");
    assert_eq!(arg_str(job, "spw"), "1~3");
    assert_eq!(
        context.observing_run.get_ms("x.ms").unwrap().reference_antenna.as_deref(),
        Some("DA42,DV03,DA41,DV10")
    );

    // Geometry only, ignoring the best antenna.
    let args = RefantArgs {
        no_flagging: true,
        refantignore: Some("DA41".to_string()),
        ..Default::default()
    };
    run_task(args, &mut context, &toolkit, false, false).unwrap();
    assert_eq!(toolkit.jobs().len(), 1);
    assert_eq!(
        context.observing_run.get_ms("x.ms").unwrap().reference_antenna.as_deref(),
        Some("DA42,DV03,DV10")
    );
}

#[test]
fn test_lowgainflag_task() {
    let dir = tempdir().unwrap();
    let mut context = context_with_refant(&dir);
    let caltable = touch(dir.path().join("x.ms.g.tbl")).display().to_string();
    let toolkit = RecordingToolkit::default().with_output(
        "getcalflags",
        json!([
            {"antenna": 0, "spw": 1, "flag": [[true, true], [true, true]]},
            {"antenna": 1, "spw": 1, "flag": [[false, false], [false, false]]},
            {"antenna": 2, "spw": 1, "flag": [[true, false], [false, false]]},
        ]),
    );

    let args = LowgainflagArgs {
        caltable: Some(caltable.clone()),
        ..Default::default()
    };
    run_task(args, &mut context, &toolkit, false, false).unwrap();

    let jobs = toolkit.jobs();
    assert_eq!(toolkit.fn_names(), ["getcalflags", "flagdata"]);
    assert_eq!(arg_str(&jobs[0], "caltable"), caltable);
    assert_eq!(arg_str(&jobs[1], "mode"), "manual");
    assert_eq!(arg_str(&jobs[1], "antenna"), "DA41");
    assert_eq!(arg_str(&jobs[1], "reason"), "lowgain");

    let ms = context.observing_run.get_ms("x.ms").unwrap();
    assert_eq!(ms.antennas.len(), 3);
    assert_eq!(ms.flagged_antennas, ["DA41"]);
    assert_eq!(ms.reference_antenna.as_deref(), Some("DA42"));
}

#[test]
fn test_lowgainflag_uses_latest_gain_table() {
    let dir = tempdir().unwrap();
    let mut context = context_with_refant(&dir);
    let toolkit = RecordingToolkit::default().with_output("getcalflags", json!([]));

    run_task(gaincal_p(), &mut context, &toolkit, false, false).unwrap();
    run_task(LowgainflagArgs::default(), &mut context, &toolkit, false, false).unwrap();
    let jobs = toolkit.jobs();
    assert_eq!(toolkit.fn_names(), ["gaincal", "getcalflags"]);
    assert_eq!(arg_str(&jobs[1], "caltable"), arg_str(&jobs[0], "caltable"));
    assert_eq!(context.observing_run.get_ms("x.ms").unwrap().antennas.len(), 4);
}

#[test]
fn test_flagged_antennas_leave_the_calstate() {
    let dir = tempdir().unwrap();
    let mut context = context_with_refant(&dir);
    let toolkit = RecordingToolkit::default().with_output(
        "getcalflags",
        json!([
            {"antenna": 0, "spw": 1, "flag": [[true, true], [true, true]]},
            {"antenna": 1, "spw": 1, "flag": [[false, false], [false, false]]},
        ]),
    );

    run_task(gaincal_p(), &mut context, &toolkit, false, false).unwrap();
    run_task(LowgainflagArgs::default(), &mut context, &toolkit, false, false).unwrap();
    assert_eq!(context.observing_run.get_ms("x.ms").unwrap().flagged_antennas, ["DA41"]);
    assert!(context.callibrary.active().cells().all(|(cell, _)| cell.antenna != 0));
    assert!(!context.callibrary.active().is_empty());

    // The exported state can be read back.
    let file = dir.path().join("x.calstate");
    context.callibrary.export(&file).unwrap();
    context
        .callibrary
        .import_state(&context.observing_run, &file, false)
        .unwrap();
    assert!(!context.callibrary.active().is_empty());
    assert!(context.callibrary.active().cells().all(|(cell, _)| cell.antenna != 0));

    run_task(ApplycalArgs::default(), &mut context, &toolkit, false, false).unwrap();
    assert!(context.callibrary.active().is_empty());
    assert!(!context.callibrary.applied().is_empty());
}

#[test]
fn test_applycal_marks_applied() {
    let dir = tempdir().unwrap();
    let mut context = context_with_refant(&dir);
    let toolkit = RecordingToolkit::default();

    run_task(gaincal_p(), &mut context, &toolkit, false, false).unwrap();
    let report = run_task(ApplycalArgs::default(), &mut context, &toolkit, false, false).unwrap();
    assert_eq!(report.qa.unwrap().status, QaStatus::Pass);

    let jobs = toolkit.jobs();
    assert_eq!(toolkit.fn_names(), ["gaincal", "applycal"]);
    assert_eq!(arg_str(&jobs[1], "applymode"), "calflagstrict");
    assert_eq!(jobs[1].get("flagbackup").and_then(|v| v.as_bool()), Some(false));

    let calstate = context
        .callibrary
        .get_calstate(&context.observing_run, &CalTo::new("x.ms"), &[])
        .unwrap();
    assert!(calstate.is_empty());
    assert!(!context.callibrary.applied().is_empty());

    // Nothing left to apply.
    run_task(ApplycalArgs::default(), &mut context, &toolkit, false, false).unwrap();
    assert_eq!(toolkit.jobs().len(), 2);
}

#[test]
fn test_importdata_task() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("x.ms.json");
    std::fs::write(&file, serde_json::to_string(&get_test_ms("x.ms")).unwrap()).unwrap();
    let mut context = Context::new("test", dir.path());
    let toolkit = RecordingToolkit::default();

    let args = ImportdataArgs {
        vis: Some(vec![dir.path().join("*.json").display().to_string()]),
        ous_id: Some("uid://A001/X1/X2".to_string()),
        import_only: true,
        ..Default::default()
    };
    let report = run_task(args, &mut context, &toolkit, false, false).unwrap();
    assert!(report.import_only);
    assert_eq!(context.observing_run.ms_names(), ["x.ms"]);
    assert_eq!(context.project.ous_id.as_deref(), Some("uid://A001/X1/X2"));
    let job = &toolkit.jobs()[0];
    assert_eq!(job.fn_name, "listobs");
    assert_eq!(
        arg_str(job, "listfile"),
        dir.path().join("x.ms.listobs.txt").display().to_string()
    );

    // Importing again changes nothing.
    let args = ImportdataArgs {
        vis: Some(vec![file.display().to_string()]),
        ..Default::default()
    };
    let report = run_task(args, &mut context, &toolkit, false, false).unwrap();
    assert!(!report.import_only);
    assert_eq!(context.observing_run.len(), 1);
    assert_eq!(toolkit.jobs().len(), 1);

    let args = ImportdataArgs {
        vis: Some(vec![dir.path().join("y.ms").display().to_string()]),
        ..Default::default()
    };
    assert!(matches!(
        args.into_inputs(&context),
        Err(TaskError::NoMetadata { .. })
    ));
    assert!(matches!(
        ImportdataArgs::default().into_inputs(&context),
        Err(TaskError::InvalidInput { .. })
    ));
}

#[test]
fn test_importdata_skips_duplicate_basenames() {
    let dir = tempdir().unwrap();
    let mut files = vec![];
    for sub in ["a", "b"] {
        std::fs::create_dir(dir.path().join(sub)).unwrap();
        let file = dir.path().join(sub).join("x.ms.json");
        let ms = get_test_ms(&format!("{sub}/x.ms"));
        std::fs::write(&file, serde_json::to_string(&ms).unwrap()).unwrap();
        files.push(file.display().to_string());
    }
    let mut context = Context::new("test", dir.path());
    let toolkit = RecordingToolkit::default();

    let args = ImportdataArgs {
        vis: Some(files),
        ..Default::default()
    };
    run_task(args, &mut context, &toolkit, false, false).unwrap();
    assert_eq!(context.observing_run.ms_names(), ["a/x.ms"]);
    assert_eq!(toolkit.fn_names(), ["listobs"]);
    assert_eq!(context.task_counter, 1);
}

#[test]
fn test_makeimages_task() {
    let dir = tempdir().unwrap();
    let mut context = context_with_refant(&dir);
    context.project.ous_id = Some("uid://A001/X1/X2".to_string());
    let toolkit = RecordingToolkit::default();

    run_task(MakeimagesArgs::default(), &mut context, &toolkit, false, false).unwrap();
    assert_eq!(toolkit.fn_names(), ["tclean", "tclean", "tclean"]);
    let names: Vec<&str> = context.images.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "uid___A001_X1_X2.s1.J1331+3030.bandpass.spw1_2.mfs.image",
            "uid___A001_X1_X2.s1.J1256-0547.phase.spw1_3.mfs.image",
            "uid___A001_X1_X2.s1.NGC253.target.spw1_3.mfs.image",
        ]
    );
    assert_eq!(context.images[0].imtype, ImageType::Calibrator);
    assert_eq!(context.images[2].imtype, ImageType::Target);
    let job = &toolkit.jobs()[2];
    assert_eq!(
        arg_str(job, "imagename"),
        dir.path()
            .join("uid___A001_X1_X2.s1.NGC253.target.spw1_3.mfs")
            .display()
            .to_string()
    );
    assert_eq!(job.get("imsize").and_then(|v| v.as_list()).map(|l| l.len()), Some(2));

    let args = MakeimagesArgs {
        field: Some("NGC253".to_string()),
        imsize: Some(vec![128]),
        ..Default::default()
    };
    let inputs = args.into_inputs(&context).unwrap();
    assert_eq!(inputs.imsize, [128, 128]);
    assert_eq!(
        inputs.targets,
        [ImageTarget {
            field: "NGC253".to_string(),
            intent: "TARGET".to_string(),
            spw: "1~3".to_string(),
            vis: vec!["x.ms".to_string()],
        }]
    );
}

#[test]
fn test_exportdata_task() {
    let dir = tempdir().unwrap();
    let mut context = context_with_refant(&dir);
    context.project.ous_id = Some("uid://A001/X1/X2".to_string());
    let toolkit = RecordingToolkit::default();

    run_task(gaincal_p(), &mut context, &toolkit, false, false).unwrap();
    let caltable = arg_str(&toolkit.jobs()[0], "caltable").to_string();

    // Nothing is written in a dry run.
    run_task(ExportdataArgs::default(), &mut context, &toolkit, true, false).unwrap();
    assert!(!context.products_dir.exists());

    run_task(ApplycalArgs::default(), &mut context, &toolkit, false, false).unwrap();
    run_task(ExportdataArgs::default(), &mut context, &toolkit, false, false).unwrap();

    let products = &context.products_dir;
    let calapply = std::fs::read_to_string(products.join("x.ms.calapply.txt")).unwrap();
    assert!(calapply.starts_with("# Apply file for x.ms\napplycal(vis='x.ms'"));
    assert!(calapply.contains(&caltable));
    assert!(products.join("uid___A001_X1_X2.casa_commands.log").exists());
    assert!(products.join("uid___A001_X1_X2.casa_pipescript.py").exists());

    let mut archive = Archive::new(GzDecoder::new(
        File::open(products.join("uid___A001_X1_X2.session_1.caltables.tgz")).unwrap(),
    ));
    let names: Vec<String> = archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().display().to_string())
        .collect();
    assert_eq!(names, ["x.ms.hif_gaincal.s1.spw1_3.solintint.gpcal.tbl"]);

    let manifest = std::fs::read_to_string(products.join("uid___A001_X1_X2.pipeline_manifest.xml")).unwrap();
    assert!(manifest.contains("<ous name=\"uid___A001_X1_X2\">"));
    assert!(manifest.contains("<caltables name=\"uid___A001_X1_X2.session_1.caltables.tgz\"/>"));
    assert!(manifest.contains("<calapply name=\"x.ms.calapply.txt\"/>"));
    assert!(manifest.contains("<casa_cmdlog name=\"uid___A001_X1_X2.casa_commands.log\"/>"));
}

#[test]
fn test_exportdata_by_basename() {
    let dir = tempdir().unwrap();
    let mut context = get_test_context(&dir, "raw/x.ms");
    context.observing_run.get_ms_mut("x.ms").unwrap().reference_antenna = Some("DA42".to_string());
    let toolkit = RecordingToolkit::default();

    run_task(gaincal_p(), &mut context, &toolkit, false, false).unwrap();
    run_task(ApplycalArgs::default(), &mut context, &toolkit, false, false).unwrap();
    let args = ExportdataArgs {
        vis: Some(vec!["x.ms".to_string()]),
        ..Default::default()
    };
    run_task(args, &mut context, &toolkit, false, false).unwrap();

    let products = &context.products_dir;
    let calapply = std::fs::read_to_string(products.join("x.ms.calapply.txt")).unwrap();
    assert!(calapply.contains("applycal(vis='raw/x.ms'"), "{calapply}");
    assert!(products.join("unknown.session_1.caltables.tgz").exists());
}

#[test]
fn test_exportdata_without_ous() {
    let dir = tempdir().unwrap();
    let mut context = context_with_refant(&dir);
    let toolkit = RecordingToolkit::default();

    let products = dir.path().join("elsewhere");
    let args = ExportdataArgs {
        products_dir: Some(products.clone()),
        session: Some("session_2".to_string()),
        ..Default::default()
    };
    run_task(args, &mut context, &toolkit, false, false).unwrap();

    // Nothing was applied, so there's no calapply file or caltable archive.
    assert!(!products.join("x.ms.calapply.txt").exists());
    assert!(!products.join("unknown.session_2.caltables.tgz").exists());
    assert!(products.join("casa_commands.log").exists());
    let manifest = std::fs::read_to_string(products.join("unknown.pipeline_manifest.xml")).unwrap();
    assert!(manifest.contains("<session name=\"session_2\">"));
    assert!(manifest.contains("<ms name=\"x.ms\"/>"));
}
