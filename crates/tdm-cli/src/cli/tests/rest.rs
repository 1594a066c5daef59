//! Tests for status, pause, resume, cancel, remove.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_status() {
    match parse(&["tdm", "status"]) {
        CliCommand::Status => {}
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_pause() {
    match parse(&["tdm", "pause", "42"]) {
        CliCommand::Pause { id } => assert_eq!(id, 42),
        _ => panic!("expected Pause"),
    }
}

#[test]
fn cli_parse_resume() {
    match parse(&["tdm", "resume", "1"]) {
        CliCommand::Resume { id } => assert_eq!(id, 1),
        _ => panic!("expected Resume"),
    }
}

#[test]
fn cli_parse_cancel() {
    match parse(&["tdm", "cancel", "7"]) {
        CliCommand::Cancel { id } => assert_eq!(id, 7),
        _ => panic!("expected Cancel"),
    }
}

#[test]
fn cli_parse_remove() {
    match parse(&["tdm", "remove", "99"]) {
        CliCommand::Remove { id } => assert_eq!(id, 99),
        _ => panic!("expected Remove"),
    }
}

#[test]
fn cli_rejects_non_numeric_id() {
    assert!(Cli::try_parse_from(["tdm", "pause", "abc"]).is_err());
}
