use pretty_assertions::assert_eq;

use super::RecordingRunner;
use crate::runner::{Cmd, CmdOutput, Runner};

#[test]
fn batch_returns_last_nonempty_output() {
    let runner = RecordingRunner::scripted(vec![
        CmdOutput::ok("first"),
        CmdOutput::ok("second"),
        CmdOutput::ok("   \n"),
    ]);

    let out = runner
        .run(&[Cmd::new("a"), Cmd::new("b"), Cmd::new("c")])
        .unwrap();

    // whitespace-only output does not clobber the last real one
    assert_eq!(out, "second");
    assert_eq!(runner.lines(), vec!["a", "b", "c"]);
}

#[test]
fn failing_command_aborts_the_rest_of_the_batch() {
    let runner = RecordingRunner::scripted(vec![
        CmdOutput::ok("fine"),
        CmdOutput::err(1, "something broke"),
        CmdOutput::ok("never reached"),
    ]);

    let result = runner.run(&[Cmd::new("a"), Cmd::new("b"), Cmd::new("c")]);

    assert!(result.is_err());
    // the third command must never have been dispatched
    assert_eq!(runner.lines(), vec!["a", "b"]);
}

#[test]
fn tolerated_failure_continues_the_batch() {
    let runner = RecordingRunner::scripted(vec![
        CmdOutput::ok("fine"),
        CmdOutput::err(1, "something broke"),
        CmdOutput::ok("reached"),
    ]);

    let out = runner
        .run(&[
            Cmd::new("a"),
            Cmd::new("b").tolerate_errors(),
            Cmd::new("c"),
        ])
        .unwrap();

    assert_eq!(out, "reached");
    assert_eq!(runner.lines().len(), 3);
}

#[test]
fn failure_is_judged_on_exit_status_only() {
    // output containing the word "error" is not a failure by itself
    let chatty = CmdOutput {
        stdout: "0 errors, 0 warnings".to_string(),
        stderr: "error logs follow:".to_string(),
        status: 0,
    };
    assert!(!chatty.failed());

    // and a silent non-zero exit is
    let silent = CmdOutput::err(2, "");
    assert!(silent.failed());
}

#[test]
fn echoed_lines_truncate_after_password() {
    let cmd = Cmd::new("bw unlock --password hunter2 --raw");
    assert_eq!(cmd.echo_line(), "bw unlock --password [...]");

    let harmless = Cmd::new("kubectl get pods -A");
    assert_eq!(harmless.echo_line(), "kubectl get pods -A");
}

#[test]
fn echoed_lines_redact_regardless_of_case_and_preceding_unicode() {
    let shouty = Cmd::new("bw unlock --PASSWORD hunter2 --raw");
    assert_eq!(shouty.echo_line(), "bw unlock --password [...]");

    // 'İ' lowercases to two chars, shifting byte offsets in a lowered copy
    let unicode = Cmd::new("bw login İstanbul-admin --password hunter2");
    let echoed = unicode.echo_line();
    assert_eq!(echoed, "bw login İstanbul-admin --password [...]");
    assert!(!echoed.contains("hunter2"));
}

#[test]
fn env_overrides_are_carried_on_the_command() {
    let cmd = Cmd::new("bw lock").env("BW_SESSION", "abc123");
    assert_eq!(cmd.env.get("BW_SESSION").unwrap(), "abc123");
}
