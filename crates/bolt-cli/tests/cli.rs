use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

const TRANSCRIPT: &str = r#"Here is your app.

<boltArtifact id="hello" title="Hello">
<boltAction type="file" filePath="src/index.js">
console.log('hello');
</boltAction>
<boltAction type="shell">
touch ran.txt
</boltAction>
</boltArtifact>

Done."#;

fn bolt() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("bolt"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn json_data(output: &[u8]) -> Value {
    let root: Value = serde_json::from_slice(output).expect("json output");
    root["data"].clone()
}

#[test]
fn help_lists_subcommands() {
    bolt()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("parse"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("patch"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn parse_reports_the_same_artifact_whole_or_chunked() {
    let tmp = tempdir().expect("tmpdir");
    let input = tmp.path().join("reply.txt");
    fs::write(&input, TRANSCRIPT).expect("write transcript");

    let whole = bolt().arg("parse").arg(&input).arg("--json").assert().success();
    let whole = json_data(&whole.get_output().stdout);

    let chunked = bolt()
        .args(["parse", "--json", "--chunk-size", "7"])
        .arg(&input)
        .assert()
        .success();
    let chunked = json_data(&chunked.get_output().stdout);

    assert_eq!(whole["artifacts"], chunked["artifacts"]);
    let actions = &whole["artifacts"][0]["actions"];
    assert_eq!(actions[0]["file_path"], "src/index.js");
    assert_eq!(actions[0]["content"], "console.log('hello');\n");
    assert_eq!(actions[1]["content"], "touch ran.txt");
    assert!(whole["prose"].as_str().expect("prose").contains("Done."));
}

#[test]
fn parse_human_output_from_stdin() {
    bolt()
        .arg("parse")
        .write_stdin(TRANSCRIPT)
        .assert()
        .success()
        .stdout(predicate::str::contains("artifact hello \"Hello\""))
        .stdout(predicate::str::contains("shell touch ran.txt"));
}

#[test]
fn classify_finds_files_and_commands_in_markdown() {
    let markdown = "`src/main.py`\n```python\nprint('hi')\n```\n\n```bash\npip install requests\n```\n";
    let output = bolt()
        .args(["classify", "--json"])
        .write_stdin(markdown)
        .assert()
        .success();
    let blocks = json_data(&output.get_output().stdout);
    assert_eq!(blocks[0]["kind"], "file");
    assert_eq!(blocks[0]["file_path"], "src/main.py");
    assert_eq!(blocks[1]["kind"], "command");
    assert_eq!(blocks[1]["payload"], "pip install requests");
}

#[test]
fn patch_write_updates_the_file() {
    let tmp = tempdir().expect("tmpdir");
    let file = tmp.path().join("app.js");
    fs::write(&file, "const a = 1;\nconst b = 2;\n").expect("write file");

    bolt()
        .arg("patch")
        .arg(&file)
        .arg("--write")
        .write_stdin("<<<<<<< SEARCH\nconst b = 2;\n=======\nconst b = 20;\n>>>>>>> REPLACE\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("lines 2-2"));
    assert_eq!(
        fs::read_to_string(&file).expect("read back"),
        "const a = 1;\nconst b = 20;\n"
    );
}

#[test]
fn patch_that_matches_nothing_leaves_file_alone() {
    let tmp = tempdir().expect("tmpdir");
    let file = tmp.path().join("app.js");
    fs::write(&file, "const a = 1;\n").expect("write file");

    bolt()
        .arg("patch")
        .arg(&file)
        .arg("--write")
        .write_stdin("<<<<<<< SEARCH\nconst z = 0;\n=======\nconst z = 1;\n>>>>>>> REPLACE\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("file unchanged"));
    assert_eq!(fs::read_to_string(&file).expect("read back"), "const a = 1;\n");
}

#[test]
fn run_is_a_dry_run_by_default() {
    let tmp = tempdir().expect("tmpdir");
    let output = bolt()
        .args(["run", "--json", "--workdir"])
        .arg(tmp.path())
        .write_stdin(TRANSCRIPT)
        .assert()
        .success();
    let data = json_data(&output.get_output().stdout);

    assert_eq!(data["commands"][0]["text"], "touch ran.txt");
    assert_eq!(data["commands"][0]["status"], "completed");
    let queued: Vec<&str> = data["notices"]
        .as_array()
        .expect("notices")
        .iter()
        .filter_map(|notice| notice["notice"].as_str())
        .collect();
    assert!(queued.contains(&"file_queued"));
    assert!(!tmp.path().join("src/index.js").exists());
    assert!(!tmp.path().join("ran.txt").exists());
}

#[test]
fn run_execute_writes_files_then_runs_commands() {
    let tmp = tempdir().expect("tmpdir");
    bolt()
        .args(["run", "--execute", "--chunk-size", "32", "--workdir"])
        .arg(tmp.path())
        .write_stdin(TRANSCRIPT)
        .assert()
        .success()
        .stdout(predicate::str::contains("[completed] touch ran.txt"));

    assert_eq!(
        fs::read_to_string(tmp.path().join("src/index.js")).expect("written file"),
        "console.log('hello');\n"
    );
    assert!(tmp.path().join("ran.txt").exists());
}

#[test]
fn run_refuses_writes_to_locked_files() {
    let tmp = tempdir().expect("tmpdir");
    fs::create_dir_all(tmp.path().join("src")).expect("mkdir");
    fs::write(tmp.path().join("src/index.js"), "// keep\n").expect("write file");

    bolt()
        .args(["run", "--execute", "--seed", "src/index.js", "--lock", "src/index.js"])
        .arg("--workdir")
        .arg(tmp.path())
        .write_stdin(TRANSCRIPT)
        .assert()
        .success()
        .stdout(predicate::str::contains("reject  /src/index.js"));

    assert_eq!(
        fs::read_to_string(tmp.path().join("src/index.js")).expect("read back"),
        "// keep\n"
    );
}

#[test]
fn failing_commands_fail_the_run() {
    let tmp = tempdir().expect("tmpdir");
    let reply = "<boltArtifact id=\"x\" title=\"x\"><boltAction type=\"shell\">exit 3</boltAction></boltArtifact>";
    bolt()
        .args(["run", "--execute", "--workdir"])
        .arg(tmp.path())
        .write_stdin(reply)
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 command(s) failed"));
}

#[test]
fn classify_reports_a_prose_file_that_runs_to_the_end() {
    let output = bolt()
        .args(["classify", "--json", "--chunk-size", "5"])
        .write_stdin("Create a file at notes.txt with the following content:\nbuy milk")
        .assert()
        .success();
    let blocks = json_data(&output.get_output().stdout);
    assert_eq!(blocks.as_array().map(Vec::len), Some(1));
    assert_eq!(blocks[0]["file_path"], "notes.txt");
    assert_eq!(blocks[0]["payload"], "buy milk\n");
}
