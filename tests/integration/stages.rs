// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Running single stages from the command line.

use crate::{get_cmd_output, Workspace};

#[test]
fn test_stages_update_the_context() {
    let ws = Workspace::new();

    let cmd = ws.run(&["importdata", "--vis", &ws.metadata(), "--ous-id", "uid://A001/X1/X2"]);
    assert!(cmd.is_ok(), "importdata failed: {}", cmd.err().unwrap());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");

    let cmd = ws.run(&["refant", "--no-flagging"]);
    assert!(cmd.is_ok(), "refant failed: {}", cmd.err().unwrap());

    let cmd = ws.run(&["gaincal", "--calmode", "p"]);
    assert!(cmd.is_ok(), "gaincal failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Stage 3"), "{stdout}");

    let context = ws.context();
    assert_eq!(context.task_counter, 3);
    assert_eq!(context.results.len(), 3);
    assert_eq!(context.observing_run.ms_names(), ["x.ms"]);
    let ms = context.observing_run.get_ms("x.ms").unwrap();
    assert_eq!(ms.reference_antennas().len(), 3);
    assert_eq!(context.project.ous_id.as_deref(), Some("uid://A001/X1/X2"));

    // The toolkit only logged the jobs, so they're in the commands log.
    let log = std::fs::read_to_string(context.commands_log()).unwrap();
    assert!(log.contains("# hif_gaincal(calmode='p')"), "{log}");
    assert!(log.contains("gaincal(vis='x.ms'"), "{log}");
}

#[test]
fn test_dry_run_saves_nothing() {
    let ws = Workspace::new();
    let before = std::fs::read_to_string(ws.context_file()).unwrap();

    let cmd = ws.run(&["importdata", "--vis", &ws.metadata(), "--dry-run"]);
    assert!(cmd.is_ok(), "importdata failed: {}", cmd.err().unwrap());
    assert_eq!(std::fs::read_to_string(ws.context_file()).unwrap(), before);
    assert!(ws.context().observing_run.is_empty());
}

#[test]
fn test_arguments_file() {
    let ws = Workspace::new();
    let args_file = ws.path().join("importdata.toml");
    std::fs::write(&args_file, format!("vis = [\"{}\"]\nsession = \"session_3\"\n", ws.metadata())).unwrap();
    let saved = ws.path().join("saved.toml");

    let cmd = ws.run(&[
        "importdata",
        &args_file.display().to_string(),
        "--save-toml",
        &saved.display().to_string(),
    ]);
    assert!(cmd.is_ok(), "importdata failed: {}", cmd.err().unwrap());
    assert_eq!(ws.context().project.session.as_deref(), Some("session_3"));
    let saved = std::fs::read_to_string(saved).unwrap();
    assert!(saved.contains("session = \"session_3\""), "{saved}");

    // Arguments files need a known extension.
    let bad = ws.path().join("importdata.txt");
    std::fs::write(&bad, "").unwrap();
    let cmd = ws.run(&["importdata", &bad.display().to_string()]);
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("recognised file extension"), "{stderr}");
}

#[test]
fn test_invalid_task_inputs() {
    let ws = Workspace::new();

    // Nothing has been imported yet.
    let cmd = ws.run(&["gaincal"]);
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("import some data first"), "{stderr}");

    let cmd = ws.run(&["importdata", "--vis", &ws.metadata()]);
    assert!(cmd.is_ok());
    let cmd = ws.run(&["gaincal", "--calmode", "k"]);
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("calmode must be one of"), "{stderr}");
    assert_eq!(ws.context().task_counter, 1);
}
