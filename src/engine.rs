//! Engine Module
//!
//! The handle that builds the worker pools and exposes the public API.
//!
//! ## Responsibilities
//! - Spawn mapper, partitioner and shard workers and wire their channels
//! - Assign lines to mappers (`map_line`)
//! - Answer point and global queries through the pipeline
//! - Flush in-flight words so queries see every accepted line
//! - Drain and terminate the pools in dependency order (`shutdown`)

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::config::Config;
use crate::error::{Result, WordShardError};
use crate::pipeline::{
    self, spawn_worker, CancelHandle, CancelToken, Interrupt, Mapper, MapperInput, MapperStats,
    Partitioner, PartitionerStats, Shard, ShardStats, Stage,
};
use crate::protocol::{Message, QueryResult};

/// Senders into the pipeline. Dropping them is how stages are closed.
struct Inputs {
    mappers: Vec<Sender<MapperInput>>,
    partitioner: Sender<Message>,
    shards: Vec<Sender<Message>>,
}

/// Join handles; joining a worker is its shutdown acknowledgement
struct Workers {
    mappers: Vec<JoinHandle<MapperStats>>,
    partitioners: Vec<JoinHandle<PartitionerStats>>,
    shards: Vec<JoinHandle<ShardStats>>,
}

/// Totals reported by the workers as they drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Lines consumed by mappers
    pub lines: u64,

    /// Words emitted by mappers
    pub words: u64,

    /// Messages routed to a single shard
    pub routed: u64,

    /// Global queries fanned out
    pub broadcasts: u64,

    /// Increments applied by shards
    pub increments: u64,

    /// Queries answered by shards
    pub queries: u64,

    /// Distinct words across all shards
    pub distinct_words: u64,
}

/// The word-count engine
///
/// ## Concurrency Model
///
/// - **Shard dictionaries**: each owned by one thread, never locked
/// - **`inputs`**: `RwLock` so any number of callers can feed and query
///   concurrently while `shutdown` takes the write side to close stages
/// - **`flush_lock`**: one flush at a time, otherwise two flushes could each
///   park some partitioners at their own barrier and wait on each other
/// - **`shutdown_started`**: one-shot flag; later calls are rejected
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Pipeline entry points (`None` once shutdown began)
    inputs: RwLock<Option<Inputs>>,

    /// Worker handles (`None` once shutdown began)
    workers: Mutex<Option<Workers>>,

    /// Aborts every worker without draining
    cancel: CancelHandle,

    /// Serializes flushes
    flush_lock: Mutex<()>,

    shutdown_started: AtomicBool,
}

impl Engine {
    /// Validate the config and start every worker
    ///
    /// Shards start first, then partitioners, then mappers, so each stage's
    /// downstream exists before anything can send to it.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let cancel = CancelHandle::new();
        let capacity = config.channel_capacity;

        let mut shard_inputs = Vec::with_capacity(config.shard_count);
        let mut shards = Vec::with_capacity(config.shard_count);
        for id in 0..config.shard_count {
            let (tx, rx) = bounded::<Message>(capacity);
            let token = cancel.token();
            shards.push(spawn_worker(Stage::Shard, id, move || Shard::new(id).run(rx, token))?);
            shard_inputs.push(tx);
        }

        let (partitioner_input, partitioner_rx) = bounded::<Message>(capacity);
        let mut partitioners = Vec::with_capacity(config.partitioner_count);
        for id in 0..config.partitioner_count {
            let worker = Partitioner::new(id, partitioner_rx.clone(), shard_inputs.clone(), cancel.token());
            partitioners.push(spawn_worker(Stage::Partitioner, id, move || worker.run())?);
        }
        drop(partitioner_rx);

        let mut mapper_inputs = Vec::with_capacity(config.mapper_count);
        let mut mappers = Vec::with_capacity(config.mapper_count);
        for id in 0..config.mapper_count {
            let (tx, rx) = bounded::<MapperInput>(capacity);
            let worker = Mapper::new(id, rx, partitioner_input.clone(), cancel.token());
            mappers.push(spawn_worker(Stage::Mapper, id, move || worker.run())?);
            mapper_inputs.push(tx);
        }

        tracing::info!(
            "Engine started: {} mappers, {} partitioners, {} shards (channel capacity {})",
            config.mapper_count,
            config.partitioner_count,
            config.shard_count,
            capacity
        );

        Ok(Self {
            config,
            inputs: RwLock::new(Some(Inputs {
                mappers: mapper_inputs,
                partitioner: partitioner_input,
                shards: shard_inputs,
            })),
            workers: Mutex::new(Some(Workers {
                mappers,
                partitioners,
                shards,
            })),
            cancel,
            flush_lock: Mutex::new(()),
            shutdown_started: AtomicBool::new(false),
        })
    }

    /// Start an engine with the given pool sizes (convenience method)
    pub fn with_counts(mapper_count: usize, partitioner_count: usize, shard_count: usize) -> Result<Self> {
        Self::new(Config::with_counts(mapper_count, partitioner_count, shard_count))
    }

    // =========================================================================
    // Feeding
    // =========================================================================

    /// Hand a line to mapper `line_index % mapper_count`
    ///
    /// Blocks until that mapper accepts it.
    pub fn map_line(&self, line_index: u64, line: impl Into<String>) -> Result<()> {
        let guard = self.running_inputs()?;
        let inputs = Self::inputs_of(&guard)?;

        let mapper = (line_index % inputs.mappers.len() as u64) as usize;
        pipeline::send(&inputs.mappers[mapper], MapperInput::Line(line.into()), &self.token(), None)
            .map_err(|interrupt| self.interrupted(interrupt, None, "mapper input"))
    }

    /// Wait until every word of every line accepted so far has reached its
    /// shard, so that later queries count it
    pub fn flush(&self) -> Result<()> {
        let guard = self.running_inputs()?;
        let inputs = Self::inputs_of(&guard)?;

        let timeout = self.config.query_timeout;
        let deadline = timeout.map(|t| Instant::now() + t);
        self.flush_inputs(inputs, &self.token(), deadline)
            .map_err(|interrupt| self.interrupted(interrupt, timeout, "flush"))
    }

    /// Two barriers, one per upstream stage:
    ///
    /// 1. A marker down every mapper; each mapper drops its ack after sending
    ///    all words of earlier lines.
    /// 2. One marker per partitioner on the shared queue. A partitioner taking
    ///    a marker reports its arrival and parks until `release` closes, so no
    ///    worker can take two, and by the time it took one it had delivered
    ///    everything it took before.
    ///
    /// `release` closes when this returns, on success or not, so parked
    /// partitioners never outlive a failed flush.
    fn flush_inputs(
        &self,
        inputs: &Inputs,
        token: &CancelToken,
        deadline: Option<Instant>,
    ) -> std::result::Result<(), Interrupt> {
        let _serial = match deadline {
            Some(deadline) => self.flush_lock.try_lock_until(deadline).ok_or(Interrupt::TimedOut)?,
            None => self.flush_lock.lock(),
        };

        let (ack_tx, ack_rx) = bounded::<()>(0);
        for mapper in &inputs.mappers {
            pipeline::send(mapper, MapperInput::Flush(ack_tx.clone()), token, deadline)?;
        }
        drop(ack_tx);
        wait_for_acks(&ack_rx, token, deadline)?;

        let (_release, release_rx) = bounded::<()>(0);
        let (arrived_tx, arrived_rx) = bounded::<()>(0);
        for _ in 0..self.config.partitioner_count {
            let barrier = Message::Barrier {
                arrived: arrived_tx.clone(),
                release: release_rx.clone(),
            };
            pipeline::send(&inputs.partitioner, barrier, token, deadline)?;
        }
        drop(arrived_tx);
        wait_for_acks(&arrived_rx, token, deadline)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Count of `word` using the configured query timeout
    pub fn query(&self, word: &str) -> Result<u64> {
        self.query_within(word, self.config.query_timeout)
    }

    /// Count of `word`, giving up after `timeout`
    pub fn query_timeout(&self, word: &str, timeout: Duration) -> Result<u64> {
        self.query_within(word, Some(timeout))
    }

    /// Whole dictionary merged across shards, using the configured timeout
    pub fn query_all(&self) -> Result<HashMap<String, u64>> {
        self.query_all_within(self.config.query_timeout)
    }

    /// Whole dictionary merged across shards, giving up after `timeout`
    pub fn query_all_timeout(&self, timeout: Duration) -> Result<HashMap<String, u64>> {
        self.query_all_within(Some(timeout))
    }

    fn query_within(&self, word: &str, timeout: Option<Duration>) -> Result<u64> {
        let guard = self.running_inputs()?;
        let inputs = Self::inputs_of(&guard)?;

        // The empty string is the broadcast key and never a token.
        if word.is_empty() {
            return Ok(0);
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let token = self.token();
        if self.config.read_your_writes {
            self.flush_inputs(inputs, &token, deadline)
                .map_err(|interrupt| self.interrupted(interrupt, timeout, "flush"))?;
        }

        let (reply_tx, reply_rx) = bounded::<QueryResult>(0);
        pipeline::send(&inputs.partitioner, Message::query(word, reply_tx), &token, deadline)
            .map_err(|interrupt| self.interrupted(interrupt, timeout, "partitioner input"))?;

        let result = pipeline::recv(&reply_rx, &token, deadline)
            .map_err(|interrupt| self.interrupted(interrupt, timeout, "shard reply"))?;

        Ok(result.count)
    }

    fn query_all_within(&self, timeout: Option<Duration>) -> Result<HashMap<String, u64>> {
        let guard = self.running_inputs()?;
        let inputs = Self::inputs_of(&guard)?;

        let deadline = timeout.map(|t| Instant::now() + t);
        let token = self.token();
        if self.config.read_your_writes {
            self.flush_inputs(inputs, &token, deadline)
                .map_err(|interrupt| self.interrupted(interrupt, timeout, "flush"))?;
        }

        let (reply_tx, reply_rx) = bounded::<QueryResult>(0);
        pipeline::send(&inputs.partitioner, Message::query_all(reply_tx), &token, deadline)
            .map_err(|interrupt| self.interrupted(interrupt, timeout, "partitioner input"))?;

        self.gather(&reply_rx, &token, deadline)
            .map_err(|interrupt| self.interrupted(interrupt, timeout, "shard reply"))
    }

    /// Fan-in: merge entries from every shard until each has sent its marker
    fn gather(
        &self,
        replies: &Receiver<QueryResult>,
        token: &CancelToken,
        deadline: Option<Instant>,
    ) -> std::result::Result<HashMap<String, u64>, Interrupt> {
        let mut dictionary = HashMap::new();
        let mut finished = 0;

        while finished < self.config.shard_count {
            let result = pipeline::recv(replies, token, deadline)?;
            if result.is_end_of_stream() {
                finished += 1;
            } else {
                // Summed so a word claimed by two shards still adds up.
                *dictionary.entry(result.word).or_insert(0) += result.count;
            }
        }

        Ok(dictionary)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Drain and stop every worker, stage by stage
    ///
    /// 1. Close mapper inputs, join mappers
    /// 2. Close the partitioner input, join partitioners
    /// 3. Close shard inputs, join shards
    ///
    /// May only be called once; later calls return `AlreadyShutDown`.
    pub fn shutdown(&self) -> Result<ShutdownReport> {
        if self
            .shutdown_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WordShardError::AlreadyShutDown);
        }

        tracing::info!("Engine shutdown started");

        // Waits for in-flight feeds and queries to finish.
        let inputs = self.inputs.write().take();
        let workers = self.workers.lock().take();
        let (Some(inputs), Some(workers)) = (inputs, workers) else {
            return Err(WordShardError::AlreadyShutDown);
        };

        let Inputs {
            mappers: mapper_inputs,
            partitioner: partitioner_input,
            shards: shard_inputs,
        } = inputs;

        let mut report = ShutdownReport::default();
        let mut failure = None;

        drop(mapper_inputs);
        for stats in join_stage(Stage::Mapper, workers.mappers, &mut failure) {
            report.lines += stats.lines;
            report.words += stats.words;
        }
        tracing::debug!("Mappers drained");

        drop(partitioner_input);
        for stats in join_stage(Stage::Partitioner, workers.partitioners, &mut failure) {
            report.routed += stats.routed;
            report.broadcasts += stats.broadcasts;
        }
        tracing::debug!("Partitioners drained");

        drop(shard_inputs);
        for stats in join_stage(Stage::Shard, workers.shards, &mut failure) {
            report.increments += stats.increments;
            report.queries += stats.queries;
            report.distinct_words += stats.distinct_words;
        }
        tracing::debug!("Shards drained");

        match failure {
            Some(err) => Err(err),
            None => {
                tracing::info!(
                    "Engine shutdown complete: {} lines, {} words, {} distinct",
                    report.lines,
                    report.words,
                    report.distinct_words
                );
                Ok(report)
            }
        }
    }

    /// Abort every worker without draining.
    ///
    /// `shutdown` must still be called (or the engine dropped) to join them.
    pub fn cancel(&self) {
        tracing::info!("Engine cancelled");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown_started.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shard_count(&self) -> usize {
        self.config.shard_count
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn token(&self) -> CancelToken {
        self.cancel.token()
    }

    /// Read-lock the inputs, rejecting calls after shutdown or cancel
    fn running_inputs(&self) -> Result<RwLockReadGuard<'_, Option<Inputs>>> {
        if self.is_shut_down() {
            return Err(WordShardError::ShutDown);
        }
        if self.is_cancelled() {
            return Err(WordShardError::Cancelled);
        }
        Ok(self.inputs.read())
    }

    fn inputs_of<'a>(guard: &'a RwLockReadGuard<'_, Option<Inputs>>) -> Result<&'a Inputs> {
        guard.as_ref().ok_or(WordShardError::ShutDown)
    }

    fn interrupted(&self, interrupt: Interrupt, timeout: Option<Duration>, what: &str) -> WordShardError {
        match interrupt {
            // Cancelled workers drop their channels, so a cancel can surface as a disconnect.
            Interrupt::Cancelled => WordShardError::Cancelled,
            Interrupt::Disconnected if self.is_cancelled() => WordShardError::Cancelled,
            Interrupt::TimedOut => WordShardError::Timeout(timeout.unwrap_or_default()),
            Interrupt::Disconnected => {
                tracing::error!("Pipeline disconnected at {}", what);
                WordShardError::Disconnected(what.to_string())
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.is_shut_down() {
            return;
        }
        if let Err(e) = self.shutdown() {
            tracing::warn!("Shutdown on drop failed: {}", e);
        }
    }
}

/// Wait until every holder of an ack sender has dropped it
fn wait_for_acks(
    acks: &Receiver<()>,
    token: &CancelToken,
    deadline: Option<Instant>,
) -> std::result::Result<(), Interrupt> {
    match pipeline::recv(acks, token, deadline) {
        Ok(()) | Err(Interrupt::Disconnected) => Ok(()),
        Err(interrupt) => Err(interrupt),
    }
}

/// Join one stage's workers, recording the first panic in `failure`
fn join_stage<T>(stage: Stage, handles: Vec<JoinHandle<T>>, failure: &mut Option<WordShardError>) -> Vec<T> {
    let mut reports = Vec::with_capacity(handles.len());

    for (index, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(stats) => reports.push(stats),
            Err(_) => {
                tracing::error!("{} worker {} panicked", stage, index);
                failure.get_or_insert(WordShardError::WorkerPanicked { stage, index });
            }
        }
    }

    reports
}
