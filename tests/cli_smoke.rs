//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

#[test]
fn help_lists_the_volume_verbs() {
    let mut cmd = cargo_bin_cmd!("ec2-volumes");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("create-volume"))
        .stdout(contains("describe-volumes"))
        .stdout(contains("update-delete-on-termination"));
}

#[test]
fn missing_configuration_is_reported_with_an_ec2_code() {
    let sandbox = TempDir::new().unwrap_or_else(|err| panic!("create sandbox: {err}"));
    let mut cmd = cargo_bin_cmd!("ec2-volumes");
    cmd.current_dir(sandbox.path())
        .env("HOME", sandbox.path())
        .env("XDG_CONFIG_HOME", sandbox.path())
        .env_remove("EC2_VOLUMES_CONFIG_PATH")
        .env_remove("EC2_VOLUMES_AUTH_TOKEN")
        .env_remove("EC2_VOLUMES_VOLUME_ENDPOINT")
        .env_remove("EC2_VOLUMES_COMPUTE_ENDPOINT")
        .args(["delete-volume", "--volume-id", "bv-1"])
        .assert()
        .code(1)
        .stdout("")
        .stderr(contains("ConfigurationError"));
}

#[test]
fn invalid_endpoint_is_rejected_before_any_request() {
    let sandbox = TempDir::new().unwrap_or_else(|err| panic!("create sandbox: {err}"));
    let mut cmd = cargo_bin_cmd!("ec2-volumes");
    cmd.current_dir(sandbox.path())
        .env("HOME", sandbox.path())
        .env("XDG_CONFIG_HOME", sandbox.path())
        .env_remove("EC2_VOLUMES_CONFIG_PATH")
        .env("EC2_VOLUMES_AUTH_TOKEN", "token")
        .env("EC2_VOLUMES_VOLUME_ENDPOINT", "ftp://volumes.invalid")
        .env("EC2_VOLUMES_COMPUTE_ENDPOINT", "https://compute.invalid/v2.1")
        .args(["describe-volumes"])
        .assert()
        .code(1)
        .stderr(contains("ConfigurationError"))
        .stderr(contains("volume_endpoint"));
}
