// CLI integration tests for the inspect/strip flows.
use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_halite");
    Command::new(exe)
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

const ORDER_DOC: &str = r#"{
  "name": "Foo",
  "total": 12.5,
  "_links": {"self": {"href": "/orders/7"}},
  "_embedded": {"items": [{"name": "A"}, {"name": "B"}]}
}"#;

fn write_doc(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("order.json");
    std::fs::write(&path, ORDER_DOC).expect("write doc");
    path
}

#[test]
fn inspect_reports_structure_as_json() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = write_doc(&temp);

    let output = cmd()
        .args(["inspect", path.to_str().unwrap(), "--json"])
        .output()
        .expect("inspect");
    assert!(output.status.success());

    let summary = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    let properties = summary["properties"].as_array().expect("properties");
    assert!(properties.iter().any(|p| p == "name"));
    assert!(properties.iter().any(|p| p == "total"));
    assert_eq!(summary["links"][0], "self");
    assert_eq!(summary["embedded"]["items"]["kind"], "resources");
    assert_eq!(summary["embedded"]["items"]["count"], 2);
}

#[test]
fn inspect_reads_stdin_when_no_file_is_given() {
    let mut child = cmd()
        .args(["inspect", "--json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .as_mut()
        .expect("stdin")
        .write_all(ORDER_DOC.as_bytes())
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success());

    let summary = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert_eq!(summary["embedded"]["items"]["count"], 2);
}

#[test]
fn strip_removes_links_and_keeps_everything_else() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = write_doc(&temp);

    let output = cmd()
        .args(["strip", path.to_str().unwrap()])
        .output()
        .expect("strip");
    assert!(output.status.success());

    let document = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert_eq!(document["name"], "Foo");
    assert!(document.get("_links").is_none());
    assert_eq!(document["_embedded"]["items"][1]["name"], "B");
}

#[test]
fn strip_can_drop_embedded_blocks_too() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = write_doc(&temp);

    let output = cmd()
        .args(["strip", path.to_str().unwrap(), "--embedded"])
        .output()
        .expect("strip");
    assert!(output.status.success());

    let document = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert!(document.get("_links").is_none());
    assert!(document.get("_embedded").is_none());
    assert_eq!(document["total"], 12.5);
}

#[test]
fn missing_input_file_maps_to_io_exit_code() {
    let output = cmd()
        .args(["inspect", "/nonexistent/halite-test.json"])
        .output()
        .expect("inspect");
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(11));

    let stderr = parse_json(std::str::from_utf8(&output.stderr).expect("utf8"));
    assert_eq!(stderr["error"]["kind"], "Io");
}

#[test]
fn invalid_json_maps_to_decode_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("broken.json");
    std::fs::write(&path, "{\"name\":").expect("write doc");

    let output = cmd()
        .args(["inspect", path.to_str().unwrap()])
        .output()
        .expect("inspect");
    assert_eq!(output.status.code(), Some(4));

    let stderr = parse_json(std::str::from_utf8(&output.stderr).expect("utf8"));
    assert_eq!(stderr["error"]["kind"], "Decode");
}

#[test]
fn non_object_document_maps_to_malformed_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("array.json");
    std::fs::write(&path, "[1,2,3]").expect("write doc");

    let output = cmd()
        .args(["inspect", path.to_str().unwrap()])
        .output()
        .expect("inspect");
    assert_eq!(output.status.code(), Some(3));
}
