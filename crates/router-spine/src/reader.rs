//! Tail-follows an append-only JSON-lines spine file, handling rotation
//! (inode change or size shrink). Ports `router/spine_reader.py` (spec §4.9).

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use router_core::state::Event;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;

#[cfg(unix)]
fn inode_of(metadata: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode_of(_metadata: &fs::Metadata) -> u64 {
    // No portable inode on this platform; rotation falls back to the
    // size-shrink check alone.
    0
}

/// Splits `buf` on `\n`, returning the parsed events from every complete
/// line and the number of bytes consumed (i.e. up to and including the
/// last `\n`; a trailing partial line is left unconsumed).
fn parse_complete_lines(buf: &[u8]) -> (Vec<Event>, u64) {
    let mut events = Vec::new();
    let mut consumed: usize = 0;
    let mut start = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if byte == b'\n' {
            let line = &buf[start..i];
            start = i + 1;
            consumed = start;
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            match serde_json::from_slice::<Value>(line) {
                Ok(Value::Object(_)) => match serde_json::from_slice::<Event>(line) {
                    Ok(event) => events.push(event),
                    Err(e) => warn!(error = %e, "malformed spine record, skipping"),
                },
                Ok(_) => warn!("spine line did not parse to an object, skipping"),
                Err(e) => warn!(error = %e, "malformed spine line, skipping"),
            }
        }
    }
    (events, consumed as u64)
}

/// Tails an append-only JSON-lines file. One poll (`poll_tick`) returns
/// whatever complete new lines are available since the last poll; the
/// caller (the runtime loop) owns the poll-sleep cadence.
pub struct SpineReader {
    path: PathBuf,
    offset: u64,
    inode: Option<u64>,
}

impl SpineReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SpineReader {
            path: path.into(),
            offset: 0,
            inode: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// One non-blocking poll. Returns an empty vector if the file is
    /// missing or has no new complete lines yet; the caller sleeps and
    /// retries (spec §4.9 "if file missing, sleep and retry").
    pub fn poll_tick(&mut self) -> Result<Vec<Event>> {
        let metadata = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(_) => return Ok(Vec::new()),
        };

        let current_inode = inode_of(&metadata);
        let current_size = metadata.len();
        let rotated = self.inode.map(|i| i != current_inode).unwrap_or(false);
        if rotated || current_size < self.offset {
            self.offset = 0;
        }
        self.inode = Some(current_inode);

        if current_size <= self.offset {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let (events, consumed) = parse_complete_lines(&buf);
        self.offset += consumed;
        Ok(events)
    }

    /// One-shot: reads the entire file from the start to EOF, without
    /// tailing. Used by `replay` (spec §4.9, §9 "Replay vs tail").
    pub fn replay(path: impl AsRef<Path>) -> Result<Vec<Event>> {
        let bytes = fs::read(path.as_ref())?;
        let (events, _) = parse_complete_lines(&bytes);
        Ok(events)
    }
}
