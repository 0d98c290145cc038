// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The `recipe` subcommand.

use indoc::formatdoc;

use crate::{get_cmd_output, Workspace};

#[test]
fn test_recipe_runs_every_stage() {
    let ws = Workspace::new();
    let recipe = ws.path().join("cal.toml");
    std::fs::write(
        &recipe,
        formatdoc! {r#"
            name = "hifa_cal"

            [[stage]]
            task = "importdata"
            vis = ["{metadata}"]
            ous_id = "uid://A001/X1/X2"

            [[stage]]
            task = "refant"
            no_flagging = true

            [[stage]]
            task = "gaincal"

            [[stage]]
            task = "exportdata"
        "#, metadata = ws.metadata()},
    )
    .unwrap();

    let cmd = ws.run(&["recipe", &recipe.display().to_string()]);
    assert!(cmd.is_ok(), "recipe failed: {}", cmd.err().unwrap());
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
    assert!(stdout.contains("Stage 4"), "{stdout}");

    let context = ws.context();
    assert_eq!(context.task_counter, 4);
    assert_eq!(context.project.recipe_name.as_deref(), Some("hifa_cal"));
    assert!(context
        .products_dir
        .join("uid___A001_X1_X2.pipeline_manifest.xml")
        .exists());
}

#[test]
fn test_recipe_halts_on_failure() {
    let ws = Workspace::new();
    let recipe = ws.path().join("cal.json");
    std::fs::write(
        &recipe,
        format!(
            r#"{{"name": "bad", "stage": [{{"task": "importdata", "vis": ["{}"]}}, {{"task": "gaincal", "calmode": "k"}}, {{"task": "refant"}}]}}"#,
            ws.metadata()
        ),
    )
    .unwrap();

    let cmd = ws.run(&["recipe", &recipe.display().to_string()]);
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Stage 2 (gaincal) failed"), "{stderr}");

    // The import was saved before the failure.
    let context = ws.context();
    assert_eq!(context.task_counter, 1);
    assert_eq!(context.observing_run.ms_names(), ["x.ms"]);
}
