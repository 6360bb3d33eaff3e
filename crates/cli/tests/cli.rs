use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use tempfile::tempdir;

#[allow(deprecated)]
fn mapreport() -> Command {
    Command::cargo_bin("mapreport").expect("binary")
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn dangling_report() -> Value {
    json!({
        "__typename": "MapReport",
        "id": "r1",
        "name": "Canvassing",
        "slug": "canvassing",
        "organisation": { "id": "o1" },
        "layers": [{ "id": "L2", "name": "Events", "sourceId": "S2", "isSharedSource": true }],
        "displayOptions": {
            "views": {
                "v1": {
                    "id": "v1",
                    "type": "Map",
                    "mapOptions": {
                        "choropleth": { "layerId": "L1", "field": "members" },
                        "layers": { "ld1": { "id": "ld1", "layerId": "L2" } }
                    }
                }
            },
            "areaExplorer": { "displays": {} }
        }
    })
}

#[test]
fn migrate_reads_stdin() {
    let output = mapreport()
        .arg("migrate")
        .write_stdin("{}")
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        json!({ "views": {}, "areaExplorer": { "displays": {} } })
    );
}

#[test]
fn new_prints_a_report_for_the_source() {
    let output = mapreport()
        .args(["new", "--source-name", "Members", "--source-id", "SRC1"])
        .output()
        .expect("run");
    assert!(output.status.success());

    let report = stdout_json(&output);
    assert_eq!(report["layers"][0]["sourceId"], "SRC1");
    assert_eq!(report["name"], "Members");
    let layer_id = report["layers"][0]["id"].clone();
    let displays = report["displayOptions"]["areaExplorer"]["displays"]
        .as_object()
        .expect("displays");
    assert_eq!(displays.len(), 1);
    assert!(displays.values().all(|display| display["layerId"] == layer_id));
}

#[test]
fn check_fails_on_dangling_references() {
    let output = mapreport()
        .arg("check")
        .write_stdin(dangling_report().to_string())
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));

    let body = stdout_json(&output);
    assert_eq!(body["report_id"], "r1");
    assert_eq!(
        body["dangling"],
        json!([{ "site": "choropleth", "view_id": "v1", "layer_id": "L1" }])
    );
}

#[test]
fn clean_repairs_a_report_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("report.json");
    fs::write(&path, dangling_report().to_string()).unwrap();

    let output = mapreport().arg("clean").arg(&path).output().expect("run");
    assert!(output.status.success());

    let cleaned = stdout_json(&output);
    assert_eq!(
        cleaned["displayOptions"]["views"]["v1"]["mapOptions"]["choropleth"],
        json!({})
    );

    mapreport()
        .arg("check")
        .write_stdin(cleaned.to_string())
        .assert()
        .success();
}

#[test]
fn sanitize_strips_server_owned_fields() {
    let output = mapreport()
        .arg("sanitize")
        .arg("-")
        .write_stdin(dangling_report().to_string())
        .output()
        .expect("run");
    assert!(output.status.success());

    let input = stdout_json(&output);
    assert!(input.get("organisation").is_none());
    assert!(input.get("__typename").is_none());
    assert!(input["layers"][0].get("isSharedSource").is_none());
}

#[test]
fn config_file_changes_factory_defaults() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("mapreport.toml");
    fs::write(
        &config,
        "[factory]\nview_name = \"Overview\"\narea_query_mode = \"PointsWithin\"\n",
    )
    .unwrap();

    let output = mapreport()
        .arg("--config")
        .arg(&config)
        .args(["new", "--source-name", "Members", "--source-id", "SRC1"])
        .output()
        .expect("run");
    assert!(output.status.success());

    let report = stdout_json(&output);
    let views = report["displayOptions"]["views"].as_object().unwrap();
    assert!(views.values().all(|view| view["name"] == "Overview"));
    let displays = report["displayOptions"]["areaExplorer"]["displays"]
        .as_object()
        .unwrap();
    assert!(displays
        .values()
        .all(|display| display["areaQueryMode"] == "PointsWithin"));
}

#[test]
fn schema_describes_the_report() {
    mapreport()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("displayOptions"));
}

#[test]
fn invalid_json_is_reported() {
    mapreport()
        .arg("migrate")
        .write_stdin("{not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input is not valid JSON"));
}
