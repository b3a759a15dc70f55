//! Line Source Tests
//!
//! Tests verify:
//! - Feeding from in-memory readers and files
//! - Line numbering and counts
//! - Invalid UTF-8 never stops a feed
//! - Missing files surface as IO errors

use std::io::{Cursor, Write};

use tempfile::{NamedTempFile, TempDir};

use wordshard::engine::Engine;
use wordshard::source::{feed, feed_file};
use wordshard::WordShardError;

#[test]
fn test_feed_from_reader() {
    let engine = Engine::with_counts(2, 2, 2).unwrap();

    let fed = feed(&engine, Cursor::new("a b a\nb c\n")).unwrap();

    assert_eq!(fed, 2);
    assert_eq!(engine.query("a").unwrap(), 2);
    assert_eq!(engine.query("c").unwrap(), 1);

    engine.shutdown().unwrap();
}

#[test]
fn test_feed_handles_crlf_and_missing_trailing_newline() {
    let engine = Engine::with_counts(1, 1, 2).unwrap();

    let fed = feed(&engine, Cursor::new("x y\r\n\r\nx")).unwrap();

    assert_eq!(fed, 3);
    assert_eq!(engine.query("x").unwrap(), 2);
    assert_eq!(engine.query("y").unwrap(), 1);
    assert_eq!(engine.query_all().unwrap().len(), 2);

    engine.shutdown().unwrap();
}

#[test]
fn test_feed_keeps_going_past_invalid_utf8() {
    let engine = Engine::with_counts(2, 1, 2).unwrap();

    let fed = feed(&engine, Cursor::new(&b"a b\n\xff\xfe c\na\n"[..])).unwrap();

    assert_eq!(fed, 3);
    assert_eq!(engine.query("a").unwrap(), 2);
    assert_eq!(engine.query("c").unwrap(), 1);
    assert_eq!(engine.query("\u{fffd}\u{fffd}").unwrap(), 1);

    engine.shutdown().unwrap();
}

#[test]
fn test_feed_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "TCP is a protocol").unwrap();
    writeln!(file, "TCP and UDP").unwrap();
    file.flush().unwrap();

    let engine = Engine::with_counts(3, 2, 4).unwrap();
    let fed = feed_file(&engine, file.path()).unwrap();

    assert_eq!(fed, 2);
    assert_eq!(engine.query("TCP").unwrap(), 2);
    assert_eq!(engine.query_all().unwrap().values().sum::<u64>(), 7);

    let report = engine.shutdown().unwrap();
    assert_eq!(report.lines, 2);
}

#[test]
fn test_feed_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_counts(1, 1, 1).unwrap();

    let result = feed_file(&engine, &dir.path().join("missing.txt"));

    assert!(matches!(result, Err(WordShardError::Io(_))));
    engine.shutdown().unwrap();
}

#[test]
fn test_feed_after_shutdown_fails() {
    let engine = Engine::with_counts(1, 1, 1).unwrap();
    engine.shutdown().unwrap();

    let result = feed(&engine, Cursor::new("a\n"));

    assert!(matches!(result, Err(WordShardError::ShutDown)));
}
