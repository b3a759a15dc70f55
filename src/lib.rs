//! # wordshard
//!
//! An in-process, sharded word-frequency engine with:
//! - A mapper pool that tokenizes lines into words
//! - A partitioner pool that routes words by hash to their owning shard
//! - A reducer pool where each shard owns its dictionary outright (no locks)
//! - Point and global queries answered through the same pipeline
//! - Staged, drain-first shutdown and cancellation
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              map_line(index, line)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  index % mapper_count
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                Mapper Pool (tokenize)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  Map { word }         ◄── query / query_all
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │        Partitioner Pool (fnv1a(word) % shard_count)         │
//! └──────────┬──────────────────┬──────────────────┬────────────┘
//!            ▼                  ▼                  ▼
//!     ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//!     │   Shard 0   │    │   Shard 1   │    │   Shard N   │
//!     │ word->count │    │ word->count │    │ word->count │
//!     └─────────────┘    └─────────────┘    └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use wordshard::Engine;
//!
//! let engine = Engine::with_counts(2, 2, 4)?;
//! engine.map_line(0, "a b a")?;
//! engine.map_line(1, "b c")?;
//!
//! assert_eq!(engine.query("a")?, 2);
//! assert_eq!(engine.query_all()?.len(), 3);
//!
//! engine.shutdown()?;
//! # Ok::<(), wordshard::WordShardError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod pipeline;
pub mod engine;
pub mod source;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{WordShardError, Result};
pub use config::Config;
pub use engine::{Engine, ShutdownReport};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of wordshard
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
