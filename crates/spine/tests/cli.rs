#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::{Command, Output};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "spinecli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn spine(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_spine"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("spine should run")
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect()
}

#[test]
fn catalog_lists_both_directions() {
    let output = spine(&["--format", "json", "catalog"]);
    assert!(output.status.success());

    let rows: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("catalog should emit json");
    let rows = rows.as_array().expect("catalog should be an array");
    assert_eq!(rows.len(), 16);
    assert!(rows.iter().any(|row| {
        row["direction"] == "H2B" && row["message_type"] == "updateFirmware" && row["payload_size"] == 1028
    }));
}

#[test]
fn send_then_decode_text_frame() {
    let dir = unique_temp_dir("text");
    let capture = dir.join("h2b.bin");
    let link = format!("file:{}", capture.display());

    let sent = spine(&["--format", "json", "send", &link, "-d", "h2b", "--text", "Hello H2B!"]);
    assert!(sent.status.success(), "{}", String::from_utf8_lossy(&sent.stderr));
    assert_eq!(json_lines(&sent)[0]["crc"], "0x5C3FFACD");

    let bytes = std::fs::read(&capture).expect("capture should exist");
    assert_eq!(bytes.len(), 8 + 32 + 4);
    assert_eq!(&bytes[..4], b"\xAAH2B");

    let decoded = spine(&["--format", "json", "decode", &link, "-d", "h2b"]);
    assert!(decoded.status.success());
    let frames = json_lines(&decoded);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["status"], "ok");
    assert_eq!(frames[0]["message_type"], "dataCharacter");
    assert_eq!(frames[0]["code"], "0x6364");
    assert_eq!(frames[0]["payload_size"], 32);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_reports_corrupted_trailer() {
    let dir = unique_temp_dir("crc");
    let capture = dir.join("bad.bin");
    let link = format!("file:{}", capture.display());

    let sent = spine(&["send", &link, "--text", "Hello H2B!"]);
    assert!(sent.status.success());
    let mut bytes = std::fs::read(&capture).expect("capture should exist");
    let len = bytes.len();
    bytes[len - 4..].copy_from_slice(&[1, 2, 3, 4]);
    std::fs::write(&capture, &bytes).expect("capture should be writable");

    let decoded = spine(&["--format", "json", "decode", &link, "-d", "h2b"]);
    assert!(decoded.status.success());
    let frames = json_lines(&decoded);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["status"], "invalid");
    assert_eq!(frames[0]["payload_size"], 0);
    assert!(frames[0]["error"]
        .as_str()
        .is_some_and(|err| err.contains("crc mismatch")));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn relay_copies_capture_byte_for_byte() {
    let dir = unique_temp_dir("relay");
    let input = dir.join("in.bin");
    let output = dir.join("out.bin");
    let in_link = format!("file:{}", input.display());
    let out_link = format!("file:{}", output.display());

    let sent = spine(&["send", &in_link, "-d", "b2h", "--type", "bootFrame"]);
    assert!(sent.status.success(), "{}", String::from_utf8_lossy(&sent.stderr));

    let relayed = spine(&[
        "--format", "json", "relay", "--from", &in_link, "--to", &out_link, "-d", "b2h",
    ]);
    assert!(relayed.status.success(), "{}", String::from_utf8_lossy(&relayed.stderr));

    let stats: serde_json::Value =
        serde_json::from_slice(&relayed.stdout).expect("relay should emit json stats");
    assert_eq!(stats[0]["direction"], "B2H");
    assert_eq!(stats[0]["relayed"], 1);
    assert_eq!(stats[0]["invalid"], 0);

    assert_eq!(
        std::fs::read(&output).expect("output should exist"),
        std::fs::read(&input).expect("input should exist")
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn relay_suppresses_garbage_by_default() {
    let dir = unique_temp_dir("garbage");
    let input = dir.join("in.bin");
    let output = dir.join("out.bin");
    std::fs::write(&input, b"\x00\x01\xAAH2Bxx").expect("input should be writable");

    let relayed = spine(&[
        "--format",
        "json",
        "relay",
        "--from",
        &format!("file:{}", input.display()),
        "--to",
        &format!("file:{}", output.display()),
    ]);
    assert!(relayed.status.success());
    let stats: serde_json::Value =
        serde_json::from_slice(&relayed.stdout).expect("relay should emit json stats");
    assert_eq!(stats[0]["relayed"], 0);
    assert!(stats[0]["suppressed"].as_u64().is_some_and(|n| n >= 2));
    assert!(std::fs::read(&output).expect("output should exist").is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_sized_type_without_payload_is_usage_error() {
    let dir = unique_temp_dir("usage");
    let link = format!("file:{}", dir.join("x.bin").display());
    let output = spine(&["send", &link, "--type", "lights"]);
    assert_eq!(output.status.code(), Some(64));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_missing_capture_is_transport_error() {
    let output = spine(&["decode", "file:/nonexistent/spine/capture.bin"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn version_prints_package_version() {
    let output = spine(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("spine {}", env!("CARGO_PKG_VERSION")));
}
