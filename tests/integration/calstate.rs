// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The `calstate` subcommand.

use crate::{get_cmd_output, Workspace};

#[test]
fn test_calstate_import_show_export() {
    let ws = Workspace::new();
    let cmd = ws.run(&["importdata", "--vis", &ws.metadata()]);
    assert!(cmd.is_ok(), "importdata failed: {}", cmd.err().unwrap());

    let state = ws.path().join("in.calstate");
    std::fs::write(
        &state,
        "# A comment\napplycal(vis='x.ms', field='', intent='', spw='', antenna='', gaintable=['x.ms.g.tbl'], gainfield=[''], spwmap=[[]], interp=['linear,linear'], calwt=[False])\n",
    )
    .unwrap();
    let cmd = ws.run(&["calstate", "import", &state.display().to_string()]);
    assert!(cmd.is_ok(), "calstate import failed: {}", cmd.err().unwrap());
    assert!(!ws.context().callibrary.active().is_empty());

    let cmd = ws.run(&["calstate", "show"]);
    assert!(cmd.is_ok());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("x.ms.g.tbl"), "{stdout}");

    let cmd = ws.run(&["calstate", "show", "--applied"]);
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("<none>"), "{stdout}");

    let out = ws.path().join("out.calstate");
    let cmd = ws.run(&["calstate", "export", &out.display().to_string()]);
    assert!(cmd.is_ok(), "calstate export failed: {}", cmd.err().unwrap());
    let exported = std::fs::read_to_string(&out).unwrap();
    assert!(exported.contains("gaintable='x.ms.g.tbl'"), "{exported}");
}

#[test]
fn test_calstate_import_unknown_ms() {
    let ws = Workspace::new();
    let state = ws.path().join("in.calstate");
    std::fs::write(
        &state,
        "applycal(vis='y.ms', field='', intent='', spw='', antenna='', gaintable=['y.ms.g.tbl'], gainfield=[''], spwmap=[[]], interp=['linear,linear'], calwt=[False])\n",
    )
    .unwrap();
    let cmd = ws.run(&["calstate", "import", &state.display().to_string()]);
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("y.ms"), "{stderr}");
    assert!(ws.context().callibrary.active().is_empty());
}
