//! Tests for add and run.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn cli_parse_add_magnet() {
    match parse(&[
        "tdm", "add", "--user", "alice", "--target", "game-1", "--magnet", "magnet:?xt=urn:btih:aa",
    ]) {
        CliCommand::Add {
            user,
            target,
            source,
        } => {
            assert_eq!(user, "alice");
            assert_eq!(target, "game-1");
            assert_eq!(source.magnet.as_deref(), Some("magnet:?xt=urn:btih:aa"));
            assert!(source.url.is_none());
            assert!(source.file.is_none());
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_file() {
    match parse(&[
        "tdm", "add", "--user", "u", "--target", "t", "--file", "/tmp/x.torrent",
    ]) {
        CliCommand::Add { source, .. } => {
            assert_eq!(source.file, Some(PathBuf::from("/tmp/x.torrent")))
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_add_requires_exactly_one_source() {
    assert!(Cli::try_parse_from(["tdm", "add", "--user", "u", "--target", "t"]).is_err());
    assert!(Cli::try_parse_from([
        "tdm",
        "add",
        "--user",
        "u",
        "--target",
        "t",
        "--magnet",
        "magnet:?xt=urn:btih:aa",
        "--url",
        "https://example.com/x.torrent",
    ])
    .is_err());
}

#[test]
fn cli_add_requires_owner_and_target() {
    assert!(Cli::try_parse_from(["tdm", "add", "--magnet", "magnet:?xt=urn:btih:aa"]).is_err());
}

#[test]
fn cli_parse_run() {
    match parse(&["tdm", "run"]) {
        CliCommand::Run { json } => assert!(!json),
        _ => panic!("expected Run"),
    }
    match parse(&["tdm", "run", "--json"]) {
        CliCommand::Run { json } => assert!(json),
        _ => panic!("expected Run"),
    }
}
