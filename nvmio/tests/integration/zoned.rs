// vim: tw=80
use std::fs;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use tempfile::Builder;

use super::util::nvmio;

const URI: &str = "emu:?nzones=2&zone_size=16";

#[test]
fn help() {
    nvmio()
        .args(["emu:", "zoned", "-h"])
        .assert()
        .success();
}

#[rstest]
#[case(&["write"][..])]
#[case(&["write", "--batch", "5", "--data-input", "0xa5"][..])]
#[case(&["write", "--slba", "16"][..])]
#[case(&["append", "--batch", "16"][..])]
#[case(&["read", "--batch", "3"][..])]
fn success(#[case] args: &[&str]) {
    nvmio()
        .arg(URI)
        .arg("zoned")
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains("Using the following zone:"))
        .stdout(predicate::str::ends_with("LGTM\n"));
}

/// Each block gets its own command by default, so the last one lands on the
/// zone's final block.
#[rstest]
#[case(&[][..], "Last assigned LBA: 0x1f")]
#[case(&["--batch", "4"][..], "Last assigned LBA: 0x1c")]
fn append(#[case] args: &[&str], #[case] expected: &str) {
    nvmio()
        .arg(URI)
        .args(["zoned", "append", "--slba", "16"])
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
}

/// A fresh emulator reads back zeros
#[test]
fn read_data_output() {
    let tempdir = Builder::new()
        .prefix(concat!(module_path!(), "."))
        .tempdir()
        .unwrap();
    let path = tempdir.path().join("zone.bin");
    nvmio()
        .arg(URI)
        .args(["zoned", "read", "--data-output"])
        .arg(&path)
        .assert()
        .success();
    let data = fs::read(&path).unwrap();
    assert_eq!(data.len(), 16 * 512);
    assert!(data.iter().all(|b| *b == 0));
}

#[test]
fn emu_config() {
    let tempdir = Builder::new()
        .prefix(concat!(module_path!(), "."))
        .tempdir()
        .unwrap();
    let path = tempdir.path().join("emu.yaml");
    fs::write(&path, "lba_nbytes: 4096\nzoned:\n  nzones: 2\n  zone_size: 8\n")
        .unwrap();
    nvmio()
        .arg("--emu-config")
        .arg(&path)
        .args(["emu:", "zoned", "append"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Last assigned LBA: 0x7"));
}

#[test]
fn emu_config_unknown_field() {
    let tempdir = Builder::new()
        .prefix(concat!(module_path!(), "."))
        .tempdir()
        .unwrap();
    let path = tempdir.path().join("emu.yaml");
    fs::write(&path, "frobnicate: 1\n").unwrap();
    nvmio()
        .arg("--emu-config")
        .arg(&path)
        .args(["emu:", "scc", "idfy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot load emulator config"));
}

#[test]
fn not_zoned() {
    nvmio()
        .args(["emu:", "zoned", "write"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("The namespace is not zoned"));
}

#[test]
fn bad_uri() {
    nvmio()
        .args(["floppy:", "zoned", "read"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown URI scheme"));
}
