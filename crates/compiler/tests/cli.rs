//! CLI tests: argument handling, exit codes and the TAC dump on disk.

use std::fs;
use std::path::Path;
use std::process::Command;

fn rrvm() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rrvm"))
}

fn write_program(dir: &Path, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).unwrap();
    path
}

#[test]
fn runs_a_program_and_prints_its_output() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_program(dir.path(), "sum.rr", "push i64 3\npush i64 4\nadd\nprint\nhalt\n");

    let output = rrvm().arg(&src).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "7\n");
}

#[test]
fn reads_from_stdin_with_a_dash() {
    use std::io::Write as _;
    use std::process::Stdio;

    let mut child = rrvm()
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"push i64 9\nprint\nhalt\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "9\n");
}

#[test]
fn tac_dump_lands_in_the_raw_directory() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_program(dir.path(), "prog.rr", "push i64 3\nprint\nhalt\n");

    let output = rrvm()
        .current_dir(dir.path())
        .args(["--tac"])
        .arg(&src)
        .output()
        .unwrap();
    assert!(output.status.success());

    let dumped = fs::read_to_string(dir.path().join("opt/tmp/raw/prog.pl")).unwrap();
    assert_eq!(dumped, "l0 :-\n  const(t0, i64, 3),\n  print(t0).\n");
}

#[test]
fn tac_out_overrides_the_dump_path() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_program(dir.path(), "prog.rr", "push i64 1\nprint\nhalt\n");
    let out = dir.path().join("custom.pl");

    let output = rrvm()
        .args(["--tac", "--out"])
        .arg(&out)
        .arg(&src)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(fs::read_to_string(&out).unwrap().starts_with("l0 :-"));
}

#[test]
fn parse_errors_exit_one_with_the_line() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_program(dir.path(), "bad.rr", "add\nfrobnicate\n");

    let output = rrvm().arg(&src).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 2"));
    assert!(stderr.contains("frobnicate"));
}

#[test]
fn missing_input_exits_two() {
    let output = rrvm().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn unknown_flags_exit_two() {
    let output = rrvm().arg("--bogus").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn dump_bytecode_disassembles_instead_of_running() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_program(dir.path(), "prog.rr", "push i64 3\nprint\nhalt\n");

    let output = rrvm().arg("--dump-bytecode").arg(&src).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("push i64 3"));
    assert!(stdout.contains("halt"));
    assert!(!stdout.contains('\u{0}'));
}

#[test]
fn config_file_overrides_state_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_program(dir.path(), "prog.rr", "push i64 1\nprint\nhalt\n");
    let config = dir.path().join("rr.toml");
    fs::write(&config, "stack_size = 8\ntape_size = 8\n").unwrap();

    let output = rrvm().arg("--config").arg(&config).arg(&src).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "1\n");
}

#[test]
fn bad_config_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_program(dir.path(), "prog.rr", "halt\n");
    let config = dir.path().join("rr.toml");
    fs::write(&config, "stak_size = 8\n").unwrap();

    let output = rrvm().arg("--config").arg(&config).arg(&src).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}
