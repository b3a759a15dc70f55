//! Reducer shard
//!
//! Owns one partition of the word -> count dictionary. The dictionary lives
//! inside the `Shard` value, which is moved into exactly one worker thread;
//! serial processing of that thread's input is the only synchronization.

use ahash::AHashMap;
use crossbeam::channel::{Receiver, Sender};

use crate::protocol::{Message, QueryResult};

use super::{recv, send, CancelToken, Interrupt};

/// What a shard did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardStats {
    /// Shard index
    pub shard: usize,

    /// `Map` messages applied
    pub increments: u64,

    /// Queries answered (point and global)
    pub queries: u64,

    /// Distinct words held at shutdown
    pub distinct_words: u64,
}

/// One partition of the dictionary
pub struct Shard {
    id: usize,
    counts: AHashMap<String, u64>,
    stats: ShardStats,
}

impl Shard {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            counts: AHashMap::new(),
            stats: ShardStats {
                shard: id,
                ..ShardStats::default()
            },
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Current count for `word` (0 if unseen)
    pub fn count(&self, word: &str) -> u64 {
        self.counts.get(word).copied().unwrap_or(0)
    }

    /// Number of distinct words held
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Apply one message.
    ///
    /// Returns `Err(Interrupt::Cancelled)` only when a reply was cut short by
    /// cancellation; a caller that stopped listening is not an error.
    ///
    /// # Panics
    /// On a `Map` with an empty word, which would be indistinguishable from
    /// the end-of-stream marker in a global reply, and on a `Barrier`, which
    /// partitioners never forward.
    pub fn apply(&mut self, message: Message, cancel: &CancelToken) -> std::result::Result<(), Interrupt> {
        match message {
            Message::Map { word } => {
                assert!(!word.is_empty(), "shard {}: empty word in Map message", self.id);
                *self.counts.entry(word).or_insert(0) += 1;
                self.stats.increments += 1;
                Ok(())
            }
            Message::Query { word, reply } => {
                self.stats.queries += 1;
                let outcome = if word.is_empty() {
                    self.reply_all(&reply, cancel)
                } else {
                    let count = self.count(&word);
                    send(&reply, QueryResult::new(word, count), cancel, None)
                };
                self.settle_reply(outcome)
            }
            Message::Barrier { .. } => {
                panic!("shard {}: barrier messages must stop at the partitioners", self.id);
            }
        }
    }

    /// Stream every entry, then the end-of-stream marker
    fn reply_all(&self, reply: &Sender<QueryResult>, cancel: &CancelToken) -> std::result::Result<(), Interrupt> {
        for (word, &count) in self.counts.iter() {
            send(reply, QueryResult::new(word.as_str(), count), cancel, None)?;
        }
        send(reply, QueryResult::end_of_stream(), cancel, None)
    }

    fn settle_reply(&self, outcome: std::result::Result<(), Interrupt>) -> std::result::Result<(), Interrupt> {
        match outcome {
            Err(Interrupt::Disconnected) => {
                tracing::debug!("Shard {}: caller left before the reply was sent", self.id);
                Ok(())
            }
            other => other,
        }
    }

    /// Run until the input closes or the pipeline is cancelled
    pub fn run(mut self, input: Receiver<Message>, cancel: CancelToken) -> ShardStats {
        tracing::debug!("Shard {} started", self.id);

        loop {
            let message = match recv(&input, &cancel, None) {
                Ok(message) => message,
                Err(Interrupt::Disconnected) => break,
                Err(interrupt) => {
                    tracing::debug!("Shard {} interrupted: {:?}", self.id, interrupt);
                    break;
                }
            };

            tracing::trace!("Shard {} <- {:?} {:?}", self.id, message.kind(), message.word());

            if let Err(interrupt) = self.apply(message, &cancel) {
                tracing::debug!("Shard {} interrupted while replying: {:?}", self.id, interrupt);
                break;
            }
        }

        self.stats.distinct_words = self.counts.len() as u64;
        tracing::debug!(
            "Shard {} stopped: {} increments, {} queries, {} distinct words",
            self.id,
            self.stats.increments,
            self.stats.queries,
            self.stats.distinct_words
        );
        self.stats
    }
}
