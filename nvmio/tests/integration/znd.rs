// vim: tw=80
use assert_cmd::prelude::*;
use predicates::prelude::*;

use super::util::nvmio;

#[test]
fn open_zdext() {
    nvmio()
        .args(["emu:?zoned=1", "znd", "open-zdext"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sending explicit open with 64 bytes"))
        .stdout(predicate::str::contains("ExplicitlyOpened"))
        .stdout(predicate::str::ends_with("LGTM\n"));
}

#[test]
fn open_zdext_slba() {
    nvmio()
        .args(["emu:?zoned=1&zdes=128", "znd", "open-zdext", "--slba", "64"])
        .assert()
        .success()
        .stdout(predicate::str::contains("zslba: 0x40"));
}

#[test]
fn no_extensions() {
    nvmio()
        .args(["emu:?zoned=1&zdes=0", "znd", "open-zdext"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("zone descriptor extensions"));
}

#[test]
fn not_a_zone_start() {
    nvmio()
        .args(["emu:?zoned=1", "znd", "open-zdext", "--slba", "65"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No zone matches"));
}
