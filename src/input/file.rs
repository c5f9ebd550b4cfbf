//! Capture file input.
//!
//! Reads frames back from a file written by the file output, one frame per
//! `read` call. Replay is paced by the inter-frame header timestamps
//! scaled by a speed factor; a percent limiter adjusts the factor instead
//! of sampling. With looping enabled the file restarts at EOF.

use std::fs::File;
use std::io::{BufReader, Read as _};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::PipeError;
use crate::frame;
use crate::plugins::Reader;

const READ_CHUNK_BYTES: usize = 64 * 1024;

pub struct FileInput {
    path: PathBuf,
    reader: BufReader<File>,
    /// Bytes read from the file but not yet split into frames.
    carry: Vec<u8>,
    exhausted: bool,
    loop_input: bool,
    speed_factor: f64,
    last_ts_nanos: Option<u64>,
}

impl FileInput {
    pub fn new(path: &str, loop_input: bool) -> Result<FileInput> {
        let path = PathBuf::from(path);
        let file =
            File::open(&path).with_context(|| format!("can't open input file {}", path.display()))?;
        Ok(FileInput {
            path,
            reader: BufReader::new(file),
            carry: Vec::new(),
            exhausted: false,
            loop_input,
            speed_factor: 1.0,
            last_ts_nanos: None,
        })
    }

    /// Replay speed relative to capture speed: 1.0 replays with the
    /// original timing, 2.0 twice as fast, 0 disables pacing.
    pub fn set_speed_factor(&mut self, factor: f64) {
        self.speed_factor = factor;
    }

    fn reopen(&mut self) -> Result<(), PipeError> {
        let file = File::open(&self.path)?;
        self.reader = BufReader::new(file);
        self.carry.clear();
        self.exhausted = false;
        self.last_ts_nanos = None;
        Ok(())
    }

    /// Returns the next frame, or `None` at end of file.
    fn next_frame(&mut self) -> Result<Option<Vec<u8>>, PipeError> {
        let separator = frame::PAYLOAD_SEPARATOR.as_bytes();
        loop {
            if let Some(pos) = find_separator(&self.carry, separator) {
                let frame: Vec<u8> = self.carry[..pos].to_vec();
                self.carry.drain(..pos + separator.len());
                return Ok(Some(frame));
            }

            if self.exhausted {
                if self.carry.is_empty() {
                    return Ok(None);
                }
                // Trailing frame without a separator.
                return Ok(Some(std::mem::take(&mut self.carry)));
            }

            let mut chunk = [0u8; READ_CHUNK_BYTES];
            let n = self.reader.read(&mut chunk)?;
            if n == 0 {
                self.exhausted = true;
            } else {
                self.carry.extend_from_slice(&chunk[..n]);
            }
        }
    }

    /// Sleeps out the capture-time gap to the previous frame, scaled by the
    /// speed factor.
    fn pace(&mut self, frame_bytes: &[u8]) {
        if self.speed_factor <= 0.0 {
            return;
        }
        let meta = frame::payload_meta(frame_bytes);
        let Some(ts_nanos) = meta.get(2).and_then(|t| ascii_u64(t)) else {
            return;
        };
        if let Some(last) = self.last_ts_nanos {
            let gap = ts_nanos.saturating_sub(last);
            let scaled = (gap as f64 / self.speed_factor) as u64;
            if scaled > 0 {
                std::thread::sleep(Duration::from_nanos(scaled));
            }
        }
        self.last_ts_nanos = Some(ts_nanos);
    }
}

impl Reader for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, PipeError> {
        loop {
            match self.next_frame()? {
                Some(frame_bytes) => {
                    self.pace(&frame_bytes);
                    let n = frame_bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&frame_bytes[..n]);
                    return Ok(n);
                }
                None if self.loop_input => self.reopen()?,
                None => return Err(PipeError::Eof),
            }
        }
    }
}

fn find_separator(haystack: &[u8], separator: &[u8]) -> Option<usize> {
    if haystack.len() < separator.len() {
        return None;
    }
    haystack
        .windows(separator.len())
        .position(|window| window == separator)
}

fn ascii_u64(digits: &[u8]) -> Option<u64> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}
