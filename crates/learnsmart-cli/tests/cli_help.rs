use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("learnsmart")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_ask_help_shows_options() {
    cargo_bin_cmd!("learnsmart")
        .args(["ask", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--prompt"))
        .stdout(predicate::str::contains("--raw"))
        .stdout(predicate::str::contains("--policy"))
        .stdout(predicate::str::contains("--base-url"));
}

#[test]
fn test_render_rejects_zero_chunk_size() {
    cargo_bin_cmd!("learnsmart")
        .args(["render", "--chunk-size", "0"])
        .assert()
        .failure();
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("learnsmart")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
