//! Tests for the engine lifecycle
//!
//! These tests verify:
//! - Configuration validation before any worker starts
//! - Staged shutdown completes for every pool shape
//! - Shutdown is one-shot and later calls are rejected
//! - Cancellation aborts without hanging
//! - Drop performs a shutdown

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use wordshard::config::Config;
use wordshard::engine::Engine;
use wordshard::WordShardError;

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_zero_pools_are_rejected() {
    for (m, p, s) in [(0, 1, 1), (1, 0, 1), (1, 1, 0), (0, 0, 0)] {
        let result = Engine::with_counts(m, p, s);
        assert!(
            matches!(result, Err(WordShardError::Config(_))),
            "({}, {}, {}) should be rejected",
            m,
            p,
            s
        );
    }
}

#[test]
fn test_config_validate_names_the_pool() {
    let err = Config::with_counts(2, 2, 0).validate().unwrap_err();
    assert!(err.to_string().contains("shard_count"));
}

#[test]
fn test_default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.channel_capacity, 0);
    assert!(config.read_your_writes);
    assert_eq!(config.query_timeout, None);
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_shutdown_completes_for_every_shape() {
    for m in 1..=3 {
        for p in 1..=3 {
            for s in 1..=3 {
                let engine = Engine::with_counts(m, p, s).unwrap();
                engine.map_line(0, "a b c").unwrap();
                engine.map_line(1, "c d").unwrap();
                let report = engine.shutdown().unwrap();
                assert_eq!(report.words, 5);
                assert_eq!(report.increments, 5);
            }
        }
    }
}

#[test]
fn test_shutdown_drains_unqueried_words() {
    let config = Config::builder()
        .mapper_count(3)
        .partitioner_count(2)
        .shard_count(4)
        .read_your_writes(false)
        .build();
    let engine = Engine::new(config).unwrap();

    for i in 0..100u64 {
        engine.map_line(i, "one two three").unwrap();
    }

    let report = engine.shutdown().unwrap();
    assert_eq!(report.lines, 100);
    assert_eq!(report.words, 300);
    assert_eq!(report.routed, 300);
    assert_eq!(report.increments, 300);
    assert_eq!(report.distinct_words, 3);
}

#[test]
fn test_shutdown_report_counts_queries() {
    let engine = Engine::with_counts(1, 1, 3).unwrap();
    engine.map_line(0, "a b a").unwrap();

    engine.query("a").unwrap();
    engine.query_all().unwrap();

    let report = engine.shutdown().unwrap();
    assert_eq!(report.broadcasts, 1);
    // one point query plus one global query per shard
    assert_eq!(report.queries, 1 + 3);
}

#[test]
fn test_second_shutdown_is_rejected() {
    let engine = Engine::with_counts(1, 1, 1).unwrap();

    engine.shutdown().unwrap();

    assert!(matches!(engine.shutdown(), Err(WordShardError::AlreadyShutDown)));
    assert!(engine.is_shut_down());
}

#[test]
fn test_calls_after_shutdown_are_rejected() {
    let engine = Engine::with_counts(2, 1, 2).unwrap();
    engine.shutdown().unwrap();

    assert!(matches!(engine.map_line(0, "a"), Err(WordShardError::ShutDown)));
    assert!(matches!(engine.query("a"), Err(WordShardError::ShutDown)));
    assert!(matches!(engine.query_all(), Err(WordShardError::ShutDown)));
    assert!(matches!(engine.flush(), Err(WordShardError::ShutDown)));
}

#[test]
fn test_concurrent_shutdown_runs_once() {
    let engine = Arc::new(Engine::with_counts(2, 2, 2).unwrap());
    engine.map_line(0, "a b").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.shutdown().is_ok())
        })
        .collect();

    let succeeded = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(succeeded, 1);
}

// =============================================================================
// Cancellation Tests
// =============================================================================

#[test]
fn test_cancel_rejects_calls_and_still_shuts_down() {
    let engine = Engine::with_counts(2, 2, 2).unwrap();
    engine.map_line(0, "a b").unwrap();

    engine.cancel();

    assert!(engine.is_cancelled());
    assert!(matches!(engine.map_line(1, "c"), Err(WordShardError::Cancelled)));
    assert!(matches!(engine.query("a"), Err(WordShardError::Cancelled)));
    assert!(matches!(engine.query_all(), Err(WordShardError::Cancelled)));

    engine.shutdown().unwrap();
}

#[test]
fn test_cancel_unblocks_a_stuck_feeder() {
    // One shard, rendezvous channels: a feeder can only get ahead of the
    // pipeline by a few lines, so the feeder below is blocked most of the time.
    let engine = Arc::new(Engine::with_counts(1, 1, 1).unwrap());

    let feeder = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let mut i = 0;
            loop {
                if let Err(e) = engine.map_line(i, "spin spin spin") {
                    return e;
                }
                i += 1;
            }
        })
    };

    thread::sleep(Duration::from_millis(50));
    engine.cancel();

    let err = feeder.join().unwrap();
    assert!(matches!(err, WordShardError::Cancelled));

    engine.shutdown().unwrap();
}

#[test]
fn test_cancel_during_buffered_flush_still_shuts_down() {
    // Buffered queue: flush markers can sit unclaimed while some
    // partitioners are already parked on theirs.
    for iteration in 0..100 {
        let config = Config::builder()
            .mapper_count(1)
            .partitioner_count(8)
            .shard_count(1)
            .channel_capacity(16)
            .read_your_writes(false)
            .build();
        let engine = Arc::new(Engine::new(config).unwrap());

        let flusher = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || while engine.flush().is_ok() {})
        };

        thread::sleep(Duration::from_millis(2));
        engine.cancel();
        flusher.join().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        {
            let engine = Arc::clone(&engine);
            thread::spawn(move || done_tx.send(engine.shutdown().is_ok()).unwrap());
        }

        let clean = done_rx
            .recv_timeout(Duration::from_secs(5))
            .unwrap_or_else(|_| panic!("shutdown hung after cancel on iteration {}", iteration));
        assert!(clean);
    }
}

// =============================================================================
// Drop Tests
// =============================================================================

#[test]
fn test_drop_without_shutdown_terminates() {
    let (done_tx, done_rx) = mpsc::channel();

    thread::spawn(move || {
        let engine = Engine::with_counts(2, 2, 2).unwrap();
        engine.map_line(0, "left running").unwrap();
        drop(engine);
        done_tx.send(()).unwrap();
    });

    done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("dropping an engine must join its workers");
}
