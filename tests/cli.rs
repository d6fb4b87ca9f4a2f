//! End-to-end tests for the `md2` binary.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn md2_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_md2"))
}

fn run_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(md2_bin())
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run md2")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn render_html_strips_front_matter() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), "---\ntitle : Doc\n---\n**hi**").unwrap();

    let output = run_in(dir.path(), &["render", "doc.md"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "<p><span class='font-weight-bold'>hi</span></p>\n");
}

#[test]
fn render_latex() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), "## Title_1").unwrap();

    let output = run_in(dir.path(), &["render", "doc.md", "--format", "latex"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "\n\\subsection*{Title\\_1}\n\n");
}

#[test]
fn render_reads_config_from_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), "![cap](a.png)").unwrap();
    fs::write(dir.path().join("md2.json"), r#"{ "latex": { "no_image": true } }"#).unwrap();

    let output = run_in(dir.path(), &["render", "doc.md", "--format", "latex"]);
    assert!(output.status.success());
    assert!(!stdout(&output).contains("includegraphics"));
}

#[test]
fn render_links_registered_references() {
    let dir = tempfile::tempdir().unwrap();
    let refs = dir.path().join("refs");
    fs::create_dir(&refs).unwrap();
    fs::write(refs.join("dump_123.md"), "---\npath : /cpp/vector\nref_name : vector\n---\n").unwrap();
    fs::write(dir.path().join("doc.md"), "`vector`").unwrap();

    let output = run_in(dir.path(), &["render", "doc.md", "--metadata", "refs"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "<p><a href='123' class='link-code'>vector</a></p>\n");
}

#[test]
fn render_hwp() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), "plain").unwrap();

    let output = run_in(dir.path(), &["render", "doc.md", "--format", "hwp"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.starts_with("<P"));
    assert!(out.contains("plain"));
}

#[test]
fn missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["render", "nope.md"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read 'nope.md'"));
}

#[test]
fn metadata_prints_front_matter_json() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), "---\ntitle : Vectors\nref_name : vector, list\n---\nbody").unwrap();

    let output = run_in(dir.path(), &["metadata", "doc.md"]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["title"], "Vectors");
    assert_eq!(json["ref_names"], serde_json::json!(["vector", "list"]));
}

#[test]
fn serve_once_answers_stdin_request() {
    let mut child = Command::new(md2_bin())
        .arg("serve-once")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to run md2");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(br#"{"request_name": "ConvertMarkdownToHtml", "markdown": "*a*"}"#)
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["result"], true);
    assert_eq!(json["payload"], "<p><span class='font-italic'>a</span></p>");
}
