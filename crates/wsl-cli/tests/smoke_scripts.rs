use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn demos_root() -> PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("demos")
}

fn run_wsl(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_wsl"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("wsl should start");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(stdin.as_bytes())
        .expect("stdin should be written");
    child.wait_with_output().expect("wsl should finish")
}

fn demo(name: &str) -> String {
    demos_root()
        .join(name)
        .to_str()
        .expect("path should be utf-8")
        .to_string()
}

#[test]
fn check_reports_every_demo() {
    let root = demos_root();
    let output = run_wsl(&["check", root.to_str().expect("path should be utf-8")], "");
    assert!(output.status.success(), "check failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("RESULT:OK"));
    for name in ["greet.wsl", "hello.wsl", "hunt.wsl"] {
        assert!(stdout.contains(name), "missing {} in {}", name, stdout);
    }
    assert!(!stdout.contains("WARNING:"));
}

#[test]
fn hello_runs_without_game_input() {
    let output = run_wsl(&["run", demo("hello.wsl").as_str()], "");
    assert!(output.status.success(), "hello failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        vec!["| Hello, world!", "| tally one", "| tally two", "| counted 2"]
    );
}

#[test]
fn hello_binds_positional_arguments() {
    let output = run_wsl(&["run", demo("hello.wsl").as_str(), "traveller"], "");
    assert!(output.status.success(), "hello failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("| Hello, traveller!"));
}

#[test]
fn greet_reacts_to_piped_game_text() {
    let output = run_wsl(&["run", demo("greet").as_str()], "Someone waves.\nhello\n");
    assert!(output.status.success(), "greet failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("| greeted"));
    assert!(stdout.contains("> wave"));
}

#[test]
fn greet_stops_when_input_ends_unmatched() {
    let output = run_wsl(&["run", demo("greet.wsl").as_str()], "nobody here\n");
    assert!(output.status.success(), "greet should end cleanly");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("greeted"));
}

#[test]
fn timed_matchwait_outlives_closed_input() {
    let path = std::env::temp_dir().join(format!("wsl-smoke-timeout-{}.wsl", std::process::id()));
    std::fs::write(&path, "match a never\nmatchwait 0.6\necho timed out\nexit\na:\necho matched\n")
        .expect("script should be written");
    let output = run_wsl(&["run", path.to_str().expect("path should be utf-8")], "");
    std::fs::remove_file(&path).expect("script should be removed");
    assert!(output.status.success(), "timed wait failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["| timed out"]);
}

#[test]
fn missing_script_reports_error_code() {
    let output = run_wsl(&["run", demo("no-such-script").as_str()], "");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("RESULT:ERROR"));
    assert!(stderr.contains("ERROR_CODE:CLI_SOURCE_NOT_FOUND"));
}
