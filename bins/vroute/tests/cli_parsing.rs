//! CLI tests for the vroute command.
//!
//! Only the subcommands that never open a route socket are exercised, so
//! these run without network access or root privileges. Route text is
//! passed on stdin.

use assert_cmd::Command;
use predicates::prelude::*;

fn vroute_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vroute"));
    cmd.env_remove("RUST_LOG");
    cmd.args(["--iproute2-dir", "/nonexistent"]);
    cmd
}

mod global_flags {
    use super::*;

    #[test]
    fn test_help() {
        vroute_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Virtual route synchronization tool"));
    }

    #[test]
    fn test_version() {
        vroute_cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("vroute"));
    }

    #[test]
    fn test_invalid_subcommand() {
        vroute_cmd()
            .arg("invalid_command")
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn test_reload_requires_two_files() {
        vroute_cmd()
            .args(["reload", "old.routes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("<NEW>"));
    }
}

mod logging {
    use super::*;

    #[test]
    fn test_quiet_by_default() {
        vroute_cmd()
            .args(["check", "-"])
            .write_stdin("10.0.0.0/24 dev eth0\n")
            .assert()
            .stderr(predicate::str::contains("parsed route").not());
    }

    #[test]
    fn test_verbose_flag() {
        vroute_cmd()
            .args(["-v", "check", "-"])
            .write_stdin("10.0.0.0/24 via 192.0.2.1\n")
            .assert()
            .success()
            .stderr(predicate::str::contains("parsed route"));
    }

    #[test]
    fn test_rust_log_takes_precedence() {
        vroute_cmd()
            .env("RUST_LOG", "debug")
            .args(["check", "-"])
            .write_stdin("10.0.0.0/24 via 192.0.2.1\n")
            .assert()
            .success()
            .stderr(predicate::str::contains("parsed route"));

        vroute_cmd()
            .env("RUST_LOG", "error")
            .args(["-v", "check", "-"])
            .write_stdin("10.0.0.0/24 via 192.0.2.1\n")
            .assert()
            .success()
            .stderr(predicate::str::contains("parsed route").not());
    }
}

mod check_command {
    use super::*;

    #[test]
    fn test_check_prints_routes() {
        vroute_cmd()
            .args(["check", "-"])
            .write_stdin("# comment\n10.0.0.0/24 gw 192.0.2.1 proto 18 metric 5\n")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "10.0.0.0/24 via inet 192.0.2.1 protocol keepalived metric 5",
            ));
    }

    #[test]
    fn test_check_reports_rejected_lines() {
        vroute_cmd()
            .args(["check", "-"])
            .write_stdin("10.0.0.0/24 via 192.0.2.1\n10.1.0.0/24 expires 30\n")
            .assert()
            .failure()
            .stdout(predicate::str::contains("10.0.0.0/24 via inet 192.0.2.1"))
            .stderr(predicate::str::contains("-:2: expires is only valid for IPv6 routes"));
    }

    #[test]
    fn test_check_json() {
        vroute_cmd()
            .args(["check", "--json", "-"])
            .write_stdin("2001:db8::/48 via fe80::1 pref high\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("\"routes\""))
            .stdout(predicate::str::contains("\"dst\": \"2001:db8::/48\""))
            .stdout(predicate::str::contains("\"family\": \"inet6\""));
    }

    #[test]
    fn test_check_disabled_feature() {
        vroute_cmd()
            .args(["--disable", "encap", "check", "-"])
            .write_stdin("10.0.0.0/24 encap mpls 100\n")
            .assert()
            .failure()
            .stderr(predicate::str::contains("encap is not supported"));
    }

    #[test]
    fn test_check_missing_file() {
        vroute_cmd()
            .args(["check", "/nonexistent/routes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("failed to read /nonexistent/routes"));
    }
}

mod encode_command {
    use super::*;

    #[test]
    fn test_encode_add() {
        vroute_cmd()
            .args(["encode", "-"])
            .write_stdin("10.0.0.0/24 via 192.0.2.1 table 1000\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("RTM_NEWROUTE"))
            .stdout(predicate::str::contains("RTA_TABLE len 8 e8030000"))
            .stdout(predicate::str::contains("RTA_GATEWAY len 8 c0000201"));
    }

    #[test]
    fn test_encode_delete() {
        vroute_cmd()
            .args(["encode", "--op", "delete", "-"])
            .write_stdin("10.0.0.0/24 via 192.0.2.1\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("# delete 10.0.0.0/24"))
            .stdout(predicate::str::contains("RTM_DELROUTE"));
    }

    #[test]
    fn test_encode_multipath() {
        vroute_cmd()
            .args(["encode", "-"])
            .write_stdin("10.0.0.0/8 nexthop via 192.0.2.1 weight 2 nexthop via 192.0.2.2\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("RTA_MULTIPATH"))
            .stdout(predicate::str::contains("nexthop len 16 flags 0x0 hops 1"));
    }

    #[test]
    fn test_encode_invalid_op() {
        vroute_cmd()
            .args(["encode", "--op", "flush", "-"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid value"));
    }
}
