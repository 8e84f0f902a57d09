use std::process::Command;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_p2bin").to_string()
}

fn object_file() -> Vec<u8> {
    let mut out = vec![0x89, 0x14];
    // 68000 code at $0
    out.push(0x01);
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(b"BOOT");
    // Z80 driver, compressed
    let driver: Vec<u8> = (0..600u32).map(|i| (i % 24) as u8).collect();
    out.push(0x51);
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&(driver.len() as u16).to_le_bytes());
    out.extend_from_slice(&driver);
    // 68000 code after the reserved driver space
    out.push(0x01);
    out.extend_from_slice(&0x400i32.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(b"MAIN");
    out.push(0x00);
    out
}

#[test]
fn cli_builds_rom_and_share_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("code.p");
    let output = dir.path().join("rom.bin");
    let share = dir.path().join("share.h");
    std::fs::write(&input, object_file()).unwrap();

    let st = Command::new(bin())
        .arg(&input)
        .arg(&output)
        .arg(&share)
        .status()
        .unwrap();
    assert!(st.success());

    let rom = std::fs::read(&output).unwrap();
    assert_eq!(rom.len(), 0x404);
    assert_eq!(&rom[..4], b"BOOT");
    assert_eq!(&rom[0x400..], b"MAIN");

    let text = std::fs::read_to_string(&share).unwrap();
    assert!(text.starts_with("#define comp_z80_size 0x"), "{text}");
    assert_eq!(text.lines().count(), 1);
}

#[test]
fn cli_deletes_output_on_failure() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("bad.p");
    let output = dir.path().join("rom.bin");
    // extended header with granularity 2
    std::fs::write(&input, [0x89, 0x14, 0x81, 0x01, 0x00, 0x02, 0, 0, 0, 0, 1, 0, 0xAA]).unwrap();

    let out = Command::new(bin()).arg(&input).arg(&output).output().unwrap();
    assert!(!out.status.success());
    assert!(!output.exists());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("granularity"), "{stderr}");
}

#[test]
fn cli_requires_two_positionals() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("code.p");
    std::fs::write(&input, object_file()).unwrap();

    let out = Command::new(bin()).arg(&input).output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage"));
}

#[test]
fn cli_json_stats() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("code.p");
    let output = dir.path().join("rom.bin");
    std::fs::write(&input, object_file()).unwrap();

    let out = Command::new(bin())
        .arg("--json")
        .arg(&input)
        .arg(&output)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("\"image_size\":1028"), "{stdout}");
    assert!(stdout.contains("\"codec\":\"kosinski\""), "{stdout}");
}

#[test]
fn cli_missing_input_fails_without_creating_output() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("rom.bin");
    let st = Command::new(bin())
        .arg(dir.path().join("missing.p"))
        .arg(&output)
        .status()
        .unwrap();
    assert!(!st.success());
    assert!(!output.exists());
}

#[cfg(feature = "zlib-codec")]
#[test]
fn cli_warns_when_driver_codec_is_not_bootable() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("code.p");
    let output = dir.path().join("rom.bin");
    std::fs::write(&input, object_file()).unwrap();

    let out = Command::new(bin())
        .args(["--codec", "zlib"])
        .arg(&input)
        .arg(&output)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("only unpacks kosinski"), "{stderr}");
}

#[test]
fn cli_kosinski_build_has_no_codec_warning() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("code.p");
    let output = dir.path().join("rom.bin");
    std::fs::write(&input, object_file()).unwrap();

    let out = Command::new(bin()).arg(&input).arg(&output).output().unwrap();
    assert!(out.status.success());
    assert!(!String::from_utf8_lossy(&out.stderr).contains("only unpacks kosinski"));
}
