#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/plcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("socket {} never appeared", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn pairlink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pairlink"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn palette_lists_every_color_as_json() {
    let output = pairlink()
        .args(["--format", "json", "palette"])
        .output()
        .expect("palette should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 8);
    assert!(stdout.contains("\"name\":\"紅色\""));
    assert!(stdout.contains("\"key\":\"teal\""));
}

#[test]
fn version_prints_package_version() {
    let output = pairlink().arg("version").output().expect("version should run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("pairlink "));
}

#[test]
fn unknown_color_is_a_usage_error() {
    let output = pairlink()
        .args(["pick", "/tmp/plcli-unused.sock", "--color", "magenta"])
        .output()
        .expect("pick should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn pick_without_display_times_out() {
    let dir = unique_temp_dir("absent");
    let output = pairlink()
        .arg("pick")
        .arg(dir.join("missing.sock"))
        .args(["--color", "red", "--timeout", "300ms"])
        .output()
        .expect("pick should run");

    assert_eq!(output.status.code(), Some(124));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn picked_color_reaches_display() {
    let dir = unique_temp_dir("roundtrip");
    let sock_path = dir.join("display.sock");

    let display = pairlink()
        .args(["--format", "json", "display"])
        .arg(&sock_path)
        .args(["--count", "1"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("display should start");
    wait_for_socket(&sock_path, Duration::from_secs(3));

    let pick = pairlink()
        .args(["--format", "json", "pick"])
        .arg(&sock_path)
        .args(["--color", "red", "--timeout", "3s"])
        .output()
        .expect("pick should run");
    assert!(pick.status.success(), "pick failed: {pick:?}");
    let stdout = String::from_utf8_lossy(&pick.stdout);
    assert!(stdout.contains("\"event\":\"color_sent\""));
    assert!(stdout.contains("\"status\":\"success\""));

    let display = display.wait_with_output().expect("display should exit");
    assert!(display.status.success());
    let stdout = String::from_utf8_lossy(&display.stdout);
    assert!(stdout.contains("\"colorName\":\"紅色\""));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn custom_rgba_is_delivered_unclamped() {
    let dir = unique_temp_dir("rgba");
    let sock_path = dir.join("display.sock");

    let display = pairlink()
        .args(["--format", "json", "display"])
        .arg(&sock_path)
        .args(["--count", "1"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("display should start");
    wait_for_socket(&sock_path, Duration::from_secs(3));

    let pick = pairlink()
        .env("PAIRLINK_SOCKET", &sock_path)
        .args(["pick", "--rgba", "1.5,0,0,1", "--name", "too-red"])
        .output()
        .expect("pick should run");
    assert!(pick.status.success(), "pick failed: {pick:?}");

    let display = display.wait_with_output().expect("display should exit");
    let stdout = String::from_utf8_lossy(&display.stdout);
    assert!(stdout.contains("\"colorName\":\"too-red\""));
    assert!(stdout.contains("\"red\":1.5"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn display_counts_a_repeated_color() {
    let dir = unique_temp_dir("repeat");
    let sock_path = dir.join("display.sock");

    let display = pairlink()
        .args(["--format", "json", "display"])
        .arg(&sock_path)
        .args(["--count", "2"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("display should start");
    wait_for_socket(&sock_path, Duration::from_secs(3));

    for _ in 0..2 {
        let pick = pairlink()
            .args(["--format", "json", "pick"])
            .arg(&sock_path)
            .args(["--color", "red", "--timeout", "3s"])
            .output()
            .expect("pick should run");
        assert!(pick.status.success(), "pick failed: {pick:?}");
    }

    let display = display.wait_with_output().expect("display should exit");
    assert!(display.status.success());
    let stdout = String::from_utf8_lossy(&display.stdout);
    assert!(stdout.contains("\"colors_received\":2"));
    let _ = std::fs::remove_dir_all(&dir);
}
