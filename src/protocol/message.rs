//! Message definitions
//!
//! Represents the requests that flow from mappers and callers through the
//! partitioners into the reducer shards.

use crossbeam::channel::{Receiver, Sender};

use super::QueryResult;

/// Query key meaning "every word in the dictionary".
///
/// Whitespace tokenization never yields an empty word, so the empty string
/// is free to act as the broadcast sentinel.
pub const ALL_WORDS: &str = "";

/// Message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Map,
    Query,
    Barrier,
}

/// A message routed through the pipeline
#[derive(Debug, Clone)]
pub enum Message {
    /// One occurrence of `word`
    Map { word: String },

    /// Look up `word`, or every word when `word` is [`ALL_WORDS`]
    Query {
        word: String,
        reply: Sender<QueryResult>,
    },

    /// Flush marker consumed by a partitioner, never forwarded to a shard.
    ///
    /// The partitioner taking it drops `arrived`, then stays parked until
    /// `release` disconnects or the pipeline is cancelled.
    Barrier {
        arrived: Sender<()>,
        release: Receiver<()>,
    },
}

impl Message {
    /// Create an occurrence message
    pub fn map(word: impl Into<String>) -> Self {
        Message::Map { word: word.into() }
    }

    /// Create a point query answered on `reply`
    pub fn query(word: impl Into<String>, reply: Sender<QueryResult>) -> Self {
        Message::Query {
            word: word.into(),
            reply,
        }
    }

    /// Create a global query; every shard streams its dictionary to `reply`
    pub fn query_all(reply: Sender<QueryResult>) -> Self {
        Message::Query {
            word: ALL_WORDS.to_string(),
            reply,
        }
    }

    /// Get the message kind
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Map { .. } => MessageKind::Map,
            Message::Query { .. } => MessageKind::Query,
            Message::Barrier { .. } => MessageKind::Barrier,
        }
    }

    /// The word carried by the message (empty for a barrier)
    pub fn word(&self) -> &str {
        match self {
            Message::Map { word } | Message::Query { word, .. } => word,
            Message::Barrier { .. } => "",
        }
    }

    /// True for a query that must reach every shard
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Message::Query { word, .. } if word == ALL_WORDS)
    }
}
