//! Mapper worker
//!
//! Splits lines into words and emits one `Map` message per word.

use crossbeam::channel::{Receiver, Sender};

use crate::protocol::Message;

use super::{recv, send, CancelToken, Interrupt};

/// Split a line into words on Unicode whitespace.
///
/// Never yields an empty word.
pub fn tokenize(line: &str) -> impl Iterator<Item = &str> {
    line.split_whitespace()
}

/// Input to a mapper
#[derive(Debug)]
pub enum MapperInput {
    /// A line of text to tokenize
    Line(String),

    /// Flush marker: dropped once every earlier line's words were handed on
    Flush(Sender<()>),
}

/// What a mapper did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapperStats {
    /// Lines consumed
    pub lines: u64,

    /// Words emitted
    pub words: u64,
}

/// A single mapper worker
pub struct Mapper {
    id: usize,
    input: Receiver<MapperInput>,
    output: Sender<Message>,
    cancel: CancelToken,
}

impl Mapper {
    pub fn new(id: usize, input: Receiver<MapperInput>, output: Sender<Message>, cancel: CancelToken) -> Self {
        Self {
            id,
            input,
            output,
            cancel,
        }
    }

    /// Run until the input closes or the pipeline is cancelled
    pub fn run(self) -> MapperStats {
        let mut stats = MapperStats::default();
        tracing::debug!("Mapper {} started", self.id);

        'lines: loop {
            let line = match recv(&self.input, &self.cancel, None) {
                Ok(MapperInput::Line(line)) => line,
                Ok(MapperInput::Flush(ack)) => {
                    tracing::trace!("Mapper {} passed a flush marker", self.id);
                    drop(ack);
                    continue;
                }
                Err(Interrupt::Disconnected) => break,
                Err(interrupt) => {
                    tracing::debug!("Mapper {} interrupted: {:?}", self.id, interrupt);
                    break;
                }
            };
            stats.lines += 1;

            for word in tokenize(&line) {
                match send(&self.output, Message::map(word), &self.cancel, None) {
                    Ok(()) => stats.words += 1,
                    Err(Interrupt::Disconnected) => {
                        tracing::error!("Mapper {}: partitioner input is gone, stopping", self.id);
                        break 'lines;
                    }
                    Err(interrupt) => {
                        tracing::debug!("Mapper {} interrupted: {:?}", self.id, interrupt);
                        break 'lines;
                    }
                }
            }
        }

        tracing::debug!(
            "Mapper {} stopped: {} lines, {} words",
            self.id,
            stats.lines,
            stats.words
        );
        stats
    }
}
