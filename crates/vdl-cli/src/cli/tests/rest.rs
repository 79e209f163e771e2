//! Tests for list, stop, log, edit, remove, checksum, completions.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use vdl_core::planner::VariantPreference;

#[test]
fn cli_parse_list_defaults() {
    match parse(&["vdl", "list"]) {
        CliCommand::List {
            page,
            page_size,
            done,
            unfinished,
        } => {
            assert_eq!(page, 1);
            assert_eq!(page_size, 20);
            assert!(!done);
            assert!(!unfinished);
        }
        _ => panic!("expected List"),
    }
}

#[test]
fn cli_parse_list_filters() {
    match parse(&["vdl", "list", "--page", "2", "--page-size", "5", "--unfinished"]) {
        CliCommand::List {
            page,
            page_size,
            unfinished,
            ..
        } => {
            assert_eq!(page, 2);
            assert_eq!(page_size, 5);
            assert!(unfinished);
        }
        _ => panic!("expected List with filters"),
    }
    assert!(Cli::try_parse_from(["vdl", "list", "--done", "--unfinished"]).is_err());
}

#[test]
fn cli_parse_stop_and_log() {
    match parse(&["vdl", "stop", "42"]) {
        CliCommand::Stop { id } => assert_eq!(id, 42),
        _ => panic!("expected Stop"),
    }
    match parse(&["vdl", "log", "9"]) {
        CliCommand::Log { id } => assert_eq!(id, 9),
        _ => panic!("expected Log"),
    }
}

#[test]
fn cli_parse_edit_now() {
    match parse(&[
        "vdl",
        "edit",
        "5",
        "--url",
        "https://example.com/new.m3u8",
        "-H",
        "Referer: https://example.com/",
        "--variant",
        "1500000",
        "--now",
    ]) {
        CliCommand::Edit {
            id,
            url,
            name,
            headers,
            variant,
            now,
            ..
        } => {
            assert_eq!(variant, Some(VariantPreference::ClosestTo(1_500_000)));
            assert_eq!(id, 5);
            assert_eq!(url.as_deref(), Some("https://example.com/new.m3u8"));
            assert!(name.is_none());
            assert_eq!(headers.len(), 1);
            assert!(now);
        }
        _ => panic!("expected Edit"),
    }
}

#[test]
fn cli_parse_remove() {
    match parse(&["vdl", "remove", "99"]) {
        CliCommand::Remove { id, delete_files } => {
            assert_eq!(id, 99);
            assert!(!delete_files);
        }
        _ => panic!("expected Remove"),
    }
    match parse(&["vdl", "remove", "1", "--delete-files"]) {
        CliCommand::Remove { delete_files, .. } => assert!(delete_files),
        _ => panic!("expected Remove with --delete-files"),
    }
}

#[test]
fn cli_parse_checksum() {
    match parse(&["vdl", "checksum", "/tmp/ep1.ts"]) {
        CliCommand::Checksum { path } => assert_eq!(path, std::path::PathBuf::from("/tmp/ep1.ts")),
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_completions() {
    match parse(&["vdl", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, clap_complete::Shell::Bash),
        _ => panic!("expected Completions"),
    }
}
