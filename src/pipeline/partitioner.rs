//! Partitioner worker
//!
//! Stateless router: forwards each message to the shard that owns its word,
//! or to every shard for a global query. Any number of partitioners may
//! share one input queue since routing depends on nothing but the word.

use crossbeam::channel::{Receiver, Sender};

use crate::protocol::Message;

use super::{recv, send, CancelToken, Interrupt};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Maps words to shard indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRouter {
    shard_count: usize,
}

impl ShardRouter {
    /// `shard_count` must be at least 1
    pub fn new(shard_count: usize) -> Self {
        assert!(shard_count > 0, "shard router needs at least one shard");
        Self { shard_count }
    }

    /// Index of the shard owning `word`
    pub fn shard_for(&self, word: &str) -> usize {
        fnv1a_32(word.as_bytes()) as usize % self.shard_count
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }
}

/// What a partitioner did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionerStats {
    /// Messages forwarded to a single shard
    pub routed: u64,

    /// Global queries fanned out to every shard
    pub broadcasts: u64,
}

/// A single partitioner worker
pub struct Partitioner {
    id: usize,
    input: Receiver<Message>,
    shards: Vec<Sender<Message>>,
    router: ShardRouter,
    cancel: CancelToken,
}

impl Partitioner {
    pub fn new(
        id: usize,
        input: Receiver<Message>,
        shards: Vec<Sender<Message>>,
        cancel: CancelToken,
    ) -> Self {
        let router = ShardRouter::new(shards.len());
        Self {
            id,
            input,
            shards,
            router,
            cancel,
        }
    }

    /// Run until the input closes or the pipeline is cancelled
    pub fn run(self) -> PartitionerStats {
        let mut stats = PartitionerStats::default();
        tracing::debug!("Partitioner {} started", self.id);

        loop {
            let message = match recv(&self.input, &self.cancel, None) {
                Ok(message) => message,
                Err(Interrupt::Disconnected) => break,
                Err(interrupt) => {
                    tracing::debug!("Partitioner {} interrupted: {:?}", self.id, interrupt);
                    break;
                }
            };

            let delivered = match message {
                Message::Barrier { arrived, release } => {
                    // Everything this worker took earlier is already with a shard.
                    drop(arrived);
                    self.park(&release)
                }
                message if message.is_broadcast() => {
                    stats.broadcasts += 1;
                    self.broadcast(message)
                }
                message => {
                    stats.routed += 1;
                    let shard = self.router.shard_for(message.word());
                    self.forward(shard, message)
                }
            };

            if delivered.is_err() {
                break;
            }
        }

        tracing::debug!(
            "Partitioner {} stopped: {} routed, {} broadcasts",
            self.id,
            stats.routed,
            stats.broadcasts
        );
        stats
    }

    /// Hold at a flush barrier until the engine disconnects `release`
    fn park(&self, release: &Receiver<()>) -> std::result::Result<(), Interrupt> {
        match recv(release, &self.cancel, None) {
            Ok(()) | Err(Interrupt::Disconnected) => Ok(()),
            Err(interrupt) => {
                tracing::debug!("Partitioner {} left a barrier: {:?}", self.id, interrupt);
                Err(interrupt)
            }
        }
    }

    /// Send a copy of `message` to every shard
    fn broadcast(&self, message: Message) -> std::result::Result<(), Interrupt> {
        for shard in 0..self.shards.len() {
            self.forward(shard, message.clone())?;
        }
        Ok(())
    }

    /// Send to one shard. Only cancellation stops the worker; a dead shard is
    /// logged and skipped so the remaining shards keep being served.
    fn forward(&self, shard: usize, message: Message) -> std::result::Result<(), Interrupt> {
        tracing::trace!("Partitioner {} -> shard {}: {:?}", self.id, shard, message.kind());

        match send(&self.shards[shard], message, &self.cancel, None) {
            Err(Interrupt::Disconnected) => {
                tracing::error!("Partitioner {}: shard {} input is gone", self.id, shard);
                Ok(())
            }
            other => other,
        }
    }
}
