//! Pipeline Module
//!
//! The three worker pools and the channel plumbing between them.
//!
//! ## Topology
//! ```text
//!   map_line ──► mapper-0 ─┐                     ┌──► shard-0
//!   map_line ──► mapper-1 ─┼──► partitioner-* ───┼──► shard-1
//!   map_line ──► mapper-N ─┘     (shared queue)  └──► shard-M
//!                               ▲                      │
//!   query / query_all ──────────┘        reply ◄───────┘
//! ```
//!
//! ## Rules
//! - Every channel is rendezvous by default (capacity 0), so a slow shard
//!   throttles partitioners, which throttle mappers, which throttle callers
//! - Each shard dictionary is owned by exactly one thread; no locks
//! - Every blocking operation also watches a [`CancelToken`]

mod cancel;
mod mapper;
mod partitioner;
mod shard;

pub use cancel::{CancelHandle, CancelToken};
pub use mapper::{tokenize, Mapper, MapperInput, MapperStats};
pub use partitioner::{fnv1a_32, Partitioner, PartitionerStats, ShardRouter};
pub use shard::{Shard, ShardStats};

use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{at, never, select, Receiver, Sender};

use crate::error::Result;

/// Pipeline stage, used for thread names and fault reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Mapper,
    Partitioner,
    Shard,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Mapper => "mapper",
            Stage::Partitioner => "partitioner",
            Stage::Shard => "shard",
        };
        f.write_str(name)
    }
}

/// Why a blocking channel operation gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The other side of the channel is gone
    Disconnected,

    /// The cancel token fired
    Cancelled,

    /// The deadline passed
    TimedOut,
}

/// Blocking send that also gives up on cancellation or deadline
pub fn send<T>(
    tx: &Sender<T>,
    msg: T,
    cancel: &CancelToken,
    deadline: Option<Instant>,
) -> std::result::Result<(), Interrupt> {
    let timer = deadline.map(at).unwrap_or_else(never);

    select! {
        send(tx, msg) -> res => res.map_err(|_| Interrupt::Disconnected),
        recv(cancel.receiver()) -> _ => Err(Interrupt::Cancelled),
        recv(timer) -> _ => Err(Interrupt::TimedOut),
    }
}

/// Blocking receive that also gives up on cancellation or deadline
///
/// `Disconnected` here means every sender is gone and the channel is drained.
pub fn recv<T>(
    rx: &Receiver<T>,
    cancel: &CancelToken,
    deadline: Option<Instant>,
) -> std::result::Result<T, Interrupt> {
    let timer = deadline.map(at).unwrap_or_else(never);

    select! {
        recv(rx) -> msg => msg.map_err(|_| Interrupt::Disconnected),
        recv(cancel.receiver()) -> _ => Err(Interrupt::Cancelled),
        recv(timer) -> _ => Err(Interrupt::TimedOut),
    }
}

/// Spawn a named worker thread (`mapper-0`, `shard-3`, ...)
pub(crate) fn spawn_worker<T, F>(stage: Stage, index: usize, work: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = thread::Builder::new()
        .name(format!("{}-{}", stage, index))
        .spawn(work)?;
    Ok(handle)
}
