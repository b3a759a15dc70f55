//! Query result definitions
//!
//! Represents the replies shards send back to callers.

/// One `(word, count)` reply from a shard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryResult {
    /// The word looked up (empty for the end-of-stream marker)
    pub word: String,

    /// Occurrences counted by the replying shard
    pub count: u64,
}

impl QueryResult {
    /// Create a result entry
    pub fn new(word: impl Into<String>, count: u64) -> Self {
        Self {
            word: word.into(),
            count,
        }
    }

    /// The marker a shard sends after its last entry of a global reply
    pub fn end_of_stream() -> Self {
        Self {
            word: String::new(),
            count: 0,
        }
    }

    /// True if this is the end-of-stream marker
    pub fn is_end_of_stream(&self) -> bool {
        self.word.is_empty() && self.count == 0
    }
}
