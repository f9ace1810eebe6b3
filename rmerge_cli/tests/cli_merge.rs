use assert_cmd::Command as AssertCommand;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Helper struct to manage input files and isolated config directories
struct TestFixture {
    temp_dir: TempDir,
    config_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        TestFixture {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            config_dir: TempDir::new().expect("Failed to create config directory"),
        }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn create_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    fn command(&self) -> Command {
        let exe = env!("CARGO_BIN_EXE_rmerge_cli");
        let mut command = Command::new(exe);
        command
            .current_dir(self.path())
            .env("XDG_CONFIG_HOME", self.config_dir.path())
            .env("APPDATA", self.config_dir.path())
            .env("HOME", self.config_dir.path())
            .env("RUST_LOG", "warn");
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command()
            .args(args)
            .output()
            .expect("failed to run rmerge_cli")
    }

    fn run_json(&self, args: &[&str]) -> Value {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "command failed: {}\n{}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
        let stdout = String::from_utf8(output.stdout).expect("stdout not utf-8");
        serde_json::from_str(&stdout).expect("invalid json output")
    }
}

#[test]
fn test_merge_line_files() {
    let fixture = TestFixture::new();
    fixture.create_file("one.txt", b"b\na\na\n");
    fixture.create_file("two.txt", b"c\nb\n");

    let report = fixture.run_json(&["merge", "one.txt", "two.txt", "-o", "out.txt", "--json"]);

    assert_eq!(report["mode"], "lines");
    assert_eq!(report["stats"]["original"], 5);
    assert_eq!(report["stats"]["deduped"], 3);
    assert_eq!(report["stats"]["reduction"], 2);
    assert_eq!(report["files"].as_array().map(Vec::len), Some(2));
    assert_eq!(report["diagnostics"][0]["outcome"]["status"], "loaded");
    assert_eq!(report["diagnostics"][0]["outcome"]["encoding"], "utf-8");

    let merged = fs::read_to_string(fixture.path().join("out.txt")).unwrap();
    assert_eq!(merged, "a\nb\nc");
}

#[test]
fn test_merge_csv_default_output() {
    let fixture = TestFixture::new();
    fixture.create_file("a.csv", b"id,name\n1,x\n2,y\n");
    fixture.create_file("b.csv", b"id,name\n2,y\n3,z\n");

    let report = fixture.run_json(&["merge", "a.csv", "b.csv", "--json"]);

    assert_eq!(report["mode"], "tabular");
    assert_eq!(report["stats"]["original"], 4);
    assert_eq!(report["stats"]["deduped"], 3);

    let merged = fs::read(fixture.path().join("merged_result.csv")).unwrap();
    assert!(merged.starts_with(b"\xEF\xBB\xBF"));
    assert_eq!(&merged[3..], b"id,name\n1,x\n2,y\n3,z\n");
}

#[test]
fn test_merge_csv_without_bom() {
    let fixture = TestFixture::new();
    fixture.create_file("a.csv", b"id\n1\n1\n");

    fixture.run_json(&["merge", "a.csv", "--no-bom", "-o", "plain.csv", "--json"]);

    let merged = fs::read(fixture.path().join("plain.csv")).unwrap();
    assert_eq!(merged, b"id\n1\n");
}

#[test]
fn test_merge_gbk_csv() {
    let fixture = TestFixture::new();
    // "名称\n苹果\n苹果\n" encoded as GBK
    fixture.create_file("fruit.csv", b"\xc3\xfb\xb3\xc6\n\xc6\xbb\xb9\xfb\n\xc6\xbb\xb9\xfb\n");

    let report = fixture.run_json(&["merge", "fruit.csv", "--no-bom", "--json"]);

    assert_eq!(report["diagnostics"][0]["outcome"]["encoding"], "gbk");
    assert_eq!(report["stats"]["deduped"], 1);

    let merged = fs::read_to_string(fixture.path().join("merged_result.csv")).unwrap();
    assert_eq!(merged, "名称\n苹果\n");
}

#[test]
fn test_unreadable_file_is_reported() {
    let fixture = TestFixture::new();
    fixture.create_file("good.csv", b"id,name\n1,x\n");
    fixture.create_file("empty.csv", b"");

    let report = fixture.run_json(&["merge", "good.csv", "empty.csv", "--json"]);

    assert_eq!(report["diagnostics"][1]["outcome"]["status"], "skipped");
    assert_eq!(report["files"][1]["records"], Value::Null);
    assert_eq!(report["stats"]["deduped"], 1);
}

#[test]
fn test_no_data_exits_with_failure() {
    let fixture = TestFixture::new();
    fixture.create_file("empty.csv", b"");

    let output = fixture.run(&["merge", "empty.csv", "--json"]);
    assert_eq!(output.status.code(), Some(1));

    let report: Value = serde_json::from_slice(&output.stdout).expect("invalid json output");
    assert_eq!(report["stats"], Value::Null);
    assert_eq!(report["diagnostics"][0]["outcome"]["status"], "skipped");
    assert!(!fixture.path().join("merged_result.csv").exists());
}

#[test]
fn test_mixed_batch_is_rejected() {
    let fixture = TestFixture::new();
    fixture.create_file("a.csv", b"id\n1\n");
    fixture.create_file("b.txt", b"x\n");

    let output = fixture.run(&["merge", "a.csv", "b.txt"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Mixed batch"));
}

#[test]
fn test_forced_mode_accepts_mixed_names() {
    let fixture = TestFixture::new();
    fixture.create_file("a.csv", b"id\n1\n");
    fixture.create_file("b.txt", b"x\n");

    let report = fixture.run_json(&["merge", "a.csv", "b.txt", "--mode", "lines", "--json"]);

    assert_eq!(report["mode"], "lines");
    assert_eq!(report["stats"]["deduped"], 3);
}

#[test]
fn test_missing_input_file() {
    let fixture = TestFixture::new();

    let output = fixture.run(&["merge", "nope.txt"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn test_human_output() {
    let fixture = TestFixture::new();
    fixture.create_file("one.txt", b"b\na\na\n\n");
    fixture.create_file("two.txt", b"c\nb\n");

    let assert = AssertCommand::from_std(fixture.command())
        .args(["merge", "one.txt", "two.txt"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();

    assert!(stdout.contains("Detected file type: TXT"));
    assert!(stdout.contains("Rows before merge:  6"));
    assert!(stdout.contains("Rows after dedupe:  3"));
    assert!(stdout.contains("Removed 3 duplicates"));
    assert!(stdout.contains("merged_result.txt"));
}

#[test]
fn test_detect_command() {
    let fixture = TestFixture::new();
    fixture.create_file("export", b"id,name\n1,x\n");
    fixture.create_file("notes", b"just words\n");

    let report = fixture.run_json(&["detect", "export", "--json"]);
    assert_eq!(report["kind"], "tabular");

    let report = fixture.run_json(&["detect", "notes", "--json"]);
    assert_eq!(report["kind"], "lines");
}

#[test]
fn test_config_init() {
    let fixture = TestFixture::new();

    let report = fixture.run_json(&["config", "--init", "--json"]);
    let path = PathBuf::from(report["path"].as_str().expect("path string"));

    assert_eq!(report["created"], true);
    assert!(path.exists());
    assert_eq!(report["config"]["write_bom"], true);

    let report = fixture.run_json(&["config", "--json"]);
    assert_eq!(report["created"], false);
    assert_eq!(report["exists"], true);
}

#[test]
fn test_configured_delimiter() {
    let fixture = TestFixture::new();
    let report = fixture.run_json(&["config", "--init", "--json"]);
    let config_path = PathBuf::from(report["path"].as_str().expect("path string"));
    fs::write(
        &config_path,
        "tabular_extensions = [\"csv\", \"psv\"]\n\n[delimiters]\npsv = \"|\"\n",
    )
    .unwrap();

    fixture.create_file("a.psv", b"id|name\n1|x, y\n2|z\n");
    fixture.create_file("b.psv", b"id|name\n2|z\n");

    let report = fixture.run_json(&["merge", "a.psv", "b.psv", "--no-bom", "--json"]);

    assert_eq!(report["mode"], "tabular");
    assert_eq!(report["stats"]["deduped"], 2);

    let merged = fs::read_to_string(fixture.path().join("merged_result.csv")).unwrap();
    assert_eq!(merged, "id,name\n1,\"x, y\"\n2,z\n");
}
