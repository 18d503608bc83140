// vim: tw=80
use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;

use super::util::nvmio;

#[test]
fn idfy() {
    nvmio()
        .args(["emu:?mcl=64", "scc", "idfy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mcl: 64"))
        .stdout(predicate::str::contains("msrc: 127"));
}

#[test]
fn support() {
    nvmio()
        .args(["emu:", "scc", "support"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Missing").not())
        .stdout(predicate::str::ends_with("LGTM\n"));
}

#[test]
fn unsupported() {
    nvmio()
        .args(["emu:?copy=0", "scc", "support"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Missing: ONCS.copy"))
        .stderr(predicate::str::contains("OCFS.fmt0"));
}

#[rstest]
#[case("scopy", false)]
#[case("scopy", true)]
#[case("scopy-msrc", false)]
#[case("scopy-msrc", true)]
fn scopy(#[case] sub: &str, #[case] sync: bool) {
    let mut cmd = nvmio();
    cmd.args(["emu:?poll_latency=1", "scc", sub]);
    if sync {
        cmd.arg("--sync");
    }
    let mode = if sync { "synchronous" } else { "asynchronous" };
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(format!("Using {mode} mode")))
        .stdout(predicate::str::ends_with("LGTM\n"));
}

/// scopy-msrc copies MSRC + 1 blocks, placed just past the last source
#[test]
fn scopy_msrc_dest() {
    nvmio()
        .args(["emu:?msrc=7", "scc", "scopy-msrc", "--sync"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nr: 7"))
        .stdout(predicate::str::contains("sdlba: 0x0000000000000008"));
}

/// More ranges than MCL allows is refused before anything is written
#[test]
fn scopy_msrc_exceeds_mcl() {
    nvmio()
        .args(["emu:?msrc=200", "scc", "scopy-msrc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot copy 201 blocks"));
}

#[test]
fn scopy_no_copy_command() {
    nvmio()
        .args(["emu:?copy=0", "scc", "scopy", "--sync"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Command failed"));
}
