// CLI integration tests for convert/detect/key flows.
use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::Value;

const DICTIONARY: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/hl7-dictionary.json");
const ADT_A01: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/adt-a01.hl7");

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_mediconv");
    let mut command = Command::new(exe);
    command.env_remove("MEDICONV_DICTIONARY").env("RUST_LOG", "off");
    command
}

fn parse_json(value: &[u8]) -> Value {
    serde_json::from_str(std::str::from_utf8(value).expect("utf8")).expect("valid json")
}

fn run_with_stdin(command: &mut Command, input: &str) -> std::process::Output {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("output")
}

#[test]
fn convert_hl7_file_with_dictionary() {
    let output = cmd()
        .args(["--dictionary", DICTIONARY, "convert", ADT_A01])
        .output()
        .expect("convert");
    assert!(output.status.success());
    let json = parse_json(&output.stdout);
    assert_eq!(json["MSH"]["SegmentDescription"], "Message Header");
    assert_eq!(json["MSH"]["EncodingCharacters"], "^~\\&");
    assert_eq!(json["PID"]["PatientName"]["GivenName"], "ADAM");
    assert_eq!(json["PID"]["DateTimeOfBirth"]["Time"], "1961-06-15");
}

#[test]
fn convert_reads_dictionary_from_env() {
    let output = cmd()
        .env("MEDICONV_DICTIONARY", DICTIONARY)
        .args(["convert", ADT_A01])
        .output()
        .expect("convert");
    assert!(output.status.success());
    let json = parse_json(&output.stdout);
    assert_eq!(json["EVN"]["EventTypeCode"], "A01");
}

#[test]
fn convert_without_dictionary_uses_positional_names() {
    let output = run_with_stdin(cmd().args(["convert"]), "MSH|^~\\&|1|2|3|4\r");
    assert!(output.status.success());
    let json = parse_json(&output.stdout);
    assert_eq!(json["MSH"]["MSH2"], "^~\\&");
    assert_eq!(json["MSH"]["MSH3"], "1");
}

#[test]
fn convert_envelope_reports_detection() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("patients.csv");
    std::fs::write(&path, "name,age\nJohn,30\n").expect("write csv");

    let output = cmd()
        .args(["convert", "--envelope", path.to_str().unwrap()])
        .output()
        .expect("convert");
    assert!(output.status.success());
    let json = parse_json(&output.stdout);
    assert_eq!(json["content_type"], "text/csv");
    assert_eq!(json["detected"], true);
    assert!(json["converted_at"].as_str().is_some_and(|ts| ts.contains('T')));
    assert_eq!(json["data"][0]["name"], "John");
}

#[test]
fn convert_explicit_xml() {
    let output = run_with_stdin(
        cmd().args(["convert", "--content-type", "application/xml"]),
        "<Patient><id value=\"p1\"/></Patient>",
    );
    assert!(output.status.success());
    let json = parse_json(&output.stdout);
    assert_eq!(json["id"], "p1");
    assert_eq!(json["_xmlTagName"], "Patient");
}

#[test]
fn unsupported_content_type_exit_code() {
    let output = run_with_stdin(
        cmd().args(["convert", "--content-type", "text/plain"]),
        "hello",
    );
    assert_eq!(output.status.code().unwrap(), 5);
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "Unsupported");
    assert_eq!(err["error"]["message"], "unsupported content type: text/plain");
}

#[test]
fn invalid_hl7_exit_code_and_line() {
    let output = run_with_stdin(
        cmd().args(["convert", "--content-type", "x-application/hl7-v2+er7"]),
        "MSH|^~\\&|A\r|bad segment\r",
    );
    assert_eq!(output.status.code().unwrap(), 4);
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "Parse");
    assert_eq!(err["error"]["line"], 2);
}

#[test]
fn invalid_hl7_line_counts_blank_lines() {
    let output = run_with_stdin(
        cmd().args(["convert", "--content-type", "x-application/hl7-v2+er7"]),
        "MSH|^~\\&|A\r\n\r\n|bad segment\r\n",
    );
    assert_eq!(output.status.code().unwrap(), 4);
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["line"], 3);
}

#[test]
fn missing_input_file_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let missing = temp.path().join("missing.hl7");
    let output = cmd()
        .args(["convert", missing.to_str().unwrap()])
        .output()
        .expect("convert");
    assert_eq!(output.status.code().unwrap(), 3);
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "NotFound");
    assert!(err["error"]["path"].as_str().is_some());
}

#[test]
fn missing_dictionary_exit_code() {
    let output = cmd()
        .args(["--dictionary", "/nonexistent/dictionary.json", "convert", ADT_A01])
        .output()
        .expect("convert");
    assert_eq!(output.status.code().unwrap(), 3);
}

#[test]
fn usage_exit_code() {
    let output = cmd()
        .args(["convert", "--max-depth", "nope"])
        .output()
        .expect("convert");
    assert_eq!(output.status.code().unwrap(), 2);
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "Usage");
    assert!(err["error"]["hint"].as_str().is_some_and(|hint| hint.contains("mediconv convert")));
}

#[test]
fn detect_reports_format() {
    let output = cmd().args(["detect", ADT_A01]).output().expect("detect");
    assert!(output.status.success());
    let json = parse_json(&output.stdout);
    assert_eq!(json["format"], "hl7");
    assert_eq!(json["content_type"], "x-application/hl7-v2+er7");
    assert_eq!(json["editor_language"], "plaintext");

    let output = run_with_stdin(cmd().args(["detect"]), "just words");
    let json = parse_json(&output.stdout);
    assert_eq!(json["format"], "unknown");
    assert!(json["content_type"].is_null());
}

#[test]
fn key_normalizes_label() {
    let output = cmd()
        .args(["key", "Date/Time Of Message"])
        .output()
        .expect("key");
    assert!(output.status.success());
    let json = parse_json(&output.stdout);
    assert_eq!(json["key"], "DateTimeOfMessage");

    let output = cmd().args(["key", "Mother's Maiden Name"]).output().expect("key");
    assert_eq!(parse_json(&output.stdout)["key"], "MothersMaidenName");
}

#[test]
fn version_outputs_json_when_piped() {
    let output = cmd().arg("version").output().expect("version");
    assert!(output.status.success());
    let json = parse_json(&output.stdout);
    assert_eq!(json["name"], "mediconv");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
