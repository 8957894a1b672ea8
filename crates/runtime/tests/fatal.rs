// Process-death tests: every invalid input must terminate the process
// through the fatal-error path with its documented message prefix. Each case
// runs the `rt_check` helper binary and asserts on its diagnostics.

use assert_cmd::Command;
use predicates::prelude::*;

fn rt_check(mode: &str) -> Command {
    let mut cmd = Command::cargo_bin("rt_check").unwrap();
    cmd.arg(mode);
    cmd
}

#[test]
fn checked_cast_mismatch_is_fatal() {
    rt_check("cast-mismatch")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "fatal error: checked cast failed: cannot convert Int to Bool",
        ))
        .stderr(predicate::str::contains("Current stack trace:"));
}

#[test]
fn update_rejects_same_name_distinct_descriptors() {
    rt_check("update-mismatch")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "checked cast failed: cannot convert Int to Int",
        ));
}

#[test]
fn field_index_out_of_bounds_is_fatal() {
    rt_check("field-oob")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "fatal error: field index 0 out of bounds for type Int with 0 fields",
        ));
}

#[test]
fn release_underflow_is_fatal() {
    rt_check("release-underflow")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "attempting to release object with retain count 0",
        ));
}

#[test]
fn retain_overflow_is_fatal() {
    rt_check("retain-overflow")
        .assert()
        .failure()
        .stderr(predicate::str::contains("retain count overflowed for"));
}

#[test]
fn fatal_error_prints_banner_and_trace() {
    rt_check("fatal")
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("fatal error: boom"))
        .stderr(predicate::str::contains("Current stack trace:"));
}

#[test]
fn crash_signals_are_forwarded_by_name() {
    rt_check("signal")
        .assert()
        .failure()
        .stderr(predicate::str::contains("fatal error: Segmentation fault"));
}

#[test]
fn stack_traces_can_be_printed_without_crashing() {
    rt_check("trace")
        .assert()
        .success()
        .stderr(predicate::str::starts_with("Current stack trace:"));
}

#[test]
fn protocols_dump_as_brace_blocks() {
    rt_check("dump-protocol")
        .assert()
        .success()
        .stdout(predicate::str::contains("Printable {\n  describe\n  compare\n}"));
}

#[test]
fn unknown_modes_report_usage() {
    rt_check("bogus")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("usage: rt_check"));
}
