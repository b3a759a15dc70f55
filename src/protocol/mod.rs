//! Protocol Module
//!
//! Defines the in-process messages exchanged between pipeline stages.
//!
//! ### Requests
//! - `Map { word }`: one occurrence, routed to the owning shard
//! - `Query { word, reply }`: point lookup, routed to the owning shard
//! - `Query { "", reply }`: global lookup, broadcast to every shard
//! - `Barrier { arrived, release }`: flush marker, consumed by a partitioner
//!
//! ### Replies
//! ```text
//! point query:   { word, count }
//! global query:  { word, count } ... { "", 0 }   (once per shard)
//! ```

mod message;
mod result;

pub use message::{Message, MessageKind, ALL_WORDS};
pub use result::QueryResult;
