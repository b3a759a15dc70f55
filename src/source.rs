//! Line Source
//!
//! Feeds text into an engine one line at a time, numbering lines from 0.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::engine::Engine;
use crate::error::Result;

/// Feed every line of `reader` into `engine`
///
/// Lines end at `\n` with an optional `\r` before it. Bytes that are not
/// valid UTF-8 become U+FFFD; no line is rejected.
///
/// Returns the number of lines fed.
pub fn feed<R: BufRead>(engine: &Engine, reader: R) -> Result<u64> {
    let mut fed = 0;

    for line in reader.split(b'\n') {
        engine.map_line(fed, decode_line(line?))?;
        fed += 1;
    }

    tracing::debug!("Fed {} lines", fed);
    Ok(fed)
}

/// Open `path` and feed it into `engine`
pub fn feed_file(engine: &Engine, path: &Path) -> Result<u64> {
    let file = File::open(path)?;
    tracing::debug!("Feeding {}", path.display());
    feed(engine, BufReader::new(file))
}

fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}
