//! Capture file output.
//!
//! Writes each frame followed by the payload separator through a buffered
//! writer. A background flusher forces the buffer out on an interval;
//! chunks rotate once the current file exceeds the size limit or the
//! per-chunk frame quota. Append mode continues an existing file and never
//! rotates.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::error::PipeError;
use crate::frame;
use crate::plugins::Writer;

#[derive(Debug, Clone)]
pub struct FileOutputConfig {
    pub flush_interval: Duration,
    /// Rotate once the current chunk grows past this many bytes.
    pub size_limit: u64,
    /// Rotate once the current chunk holds this many frames.
    pub queue_limit: usize,
    pub append: bool,
}

struct FileState {
    writer: BufWriter<File>,
    written_bytes: u64,
    frames_in_chunk: usize,
    chunk_index: u64,
}

pub struct FileOutput {
    path: PathBuf,
    config: FileOutputConfig,
    state: Arc<Mutex<FileState>>,
    quit: Arc<AtomicBool>,
}

impl FileOutput {
    pub fn new(path: &str, config: FileOutputConfig) -> Result<FileOutput> {
        let path = PathBuf::from(path);
        let file = open_chunk(&path, config.append)
            .with_context(|| format!("can't open output file {}", path.display()))?;

        let state = Arc::new(Mutex::new(FileState {
            writer: BufWriter::new(file),
            written_bytes: 0,
            frames_in_chunk: 0,
            chunk_index: 0,
        }));
        let quit = Arc::new(AtomicBool::new(false));

        // Interval flusher so a quiet stream still reaches disk.
        {
            let state = Arc::clone(&state);
            let quit = Arc::clone(&quit);
            let interval = config.flush_interval;
            std::thread::Builder::new()
                .name("file-output-flusher".into())
                .spawn(move || {
                    while !quit.load(Ordering::Relaxed) {
                        std::thread::sleep(interval);
                        if let Err(e) = state.lock().unwrap().writer.flush() {
                            warn!("file output flush error: {e}");
                        }
                    }
                })
                .context("failed to spawn file output flusher")?;
        }

        Ok(FileOutput {
            path,
            config,
            state,
            quit,
        })
    }

    fn rotate(&self, state: &mut FileState) -> std::io::Result<()> {
        state.writer.flush()?;
        state.chunk_index += 1;
        let next = chunk_path(&self.path, state.chunk_index);
        state.writer = BufWriter::new(open_chunk(&next, false)?);
        state.written_bytes = 0;
        state.frames_in_chunk = 0;
        Ok(())
    }
}

impl Writer for FileOutput {
    fn write(&mut self, data: &[u8]) -> Result<usize, PipeError> {
        let state = Arc::clone(&self.state);
        let mut state = state.lock().unwrap();

        // Rotate a full chunk before the next frame so empty chunks are
        // never left behind.
        if !self.config.append
            && state.written_bytes > 0
            && (state.written_bytes >= self.config.size_limit
                || state.frames_in_chunk >= self.config.queue_limit)
        {
            self.rotate(&mut state)?;
        }

        state.writer.write_all(data)?;
        state.writer.write_all(frame::PAYLOAD_SEPARATOR.as_bytes())?;
        state.written_bytes += (data.len() + frame::PAYLOAD_SEPARATOR.len()) as u64;
        state.frames_in_chunk += 1;

        Ok(data.len())
    }

    fn close(&mut self) {
        self.quit.store(true, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap();
        if let Err(e) = state.writer.flush() {
            warn!("file output flush error on close: {e}");
        }
        if let Err(e) = state.writer.get_ref().sync_all() {
            warn!("file output sync error on close: {e}");
        }
    }
}

fn open_chunk(path: &Path, append: bool) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(append)
        .write(true)
        .truncate(!append)
        .open(path)
}

/// `capture.gor` rotates to `capture_1.gor`, `capture_2.gor`, ...
fn chunk_path(path: &Path, index: u64) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("capture");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{index}.{ext}"),
        None => format!("{stem}_{index}"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("udpmirror-file-output-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn config() -> FileOutputConfig {
        FileOutputConfig {
            flush_interval: Duration::from_millis(50),
            size_limit: 32 * 1024 * 1024,
            queue_limit: 25_600,
            append: false,
        }
    }

    #[test]
    fn test_frames_separated_on_disk() {
        let path = temp_path("separated.gor");
        let mut output = FileOutput::new(path.to_str().unwrap(), config()).unwrap();
        output.write(b"1 aaa 1\nfirst").unwrap();
        output.write(b"2 bbb 2\nsecond").unwrap();
        output.close();

        let contents = std::fs::read(&path).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(b"1 aaa 1\nfirst");
        expected.extend_from_slice(frame::PAYLOAD_SEPARATOR.as_bytes());
        expected.extend_from_slice(b"2 bbb 2\nsecond");
        expected.extend_from_slice(frame::PAYLOAD_SEPARATOR.as_bytes());
        assert_eq!(contents, expected);
    }

    #[test]
    fn test_interval_flusher_reaches_disk_without_close() {
        let path = temp_path("flushed.gor");
        let mut output = FileOutput::new(path.to_str().unwrap(), config()).unwrap();
        output.write(b"1 aaa 1\ndata").unwrap();

        std::thread::sleep(Duration::from_millis(300));
        let contents = std::fs::read(&path).unwrap();
        assert!(!contents.is_empty(), "flusher should have written the frame");
    }

    #[test]
    fn test_size_limit_rotates_chunks() {
        let path = temp_path("rotated.gor");
        let mut cfg = config();
        cfg.size_limit = 16; // every frame overflows the chunk
        let mut output = FileOutput::new(path.to_str().unwrap(), cfg).unwrap();
        output.write(b"1 aaa 1\nfirst").unwrap();
        output.write(b"1 bbb 2\nsecond").unwrap();
        output.close();

        assert!(path.exists());
        assert!(chunk_path(&path, 1).exists());
        let first = std::fs::read(&path).unwrap();
        assert!(first.starts_with(b"1 aaa 1\nfirst"));
        let second = std::fs::read(chunk_path(&path, 1)).unwrap();
        assert!(second.starts_with(b"1 bbb 2\nsecond"));
    }

    #[test]
    fn test_queue_limit_rotates_chunks() {
        let path = temp_path("queue-rotated.gor");
        let mut cfg = config();
        cfg.queue_limit = 2;
        let mut output = FileOutput::new(path.to_str().unwrap(), cfg).unwrap();
        for i in 0..4 {
            output.write(format!("1 aaa {i}\np").as_bytes()).unwrap();
        }
        output.close();

        assert!(chunk_path(&path, 1).exists());
        assert!(!chunk_path(&path, 2).exists());
    }

    #[test]
    fn test_append_mode_continues_existing_file() {
        let path = temp_path("appended.gor");
        std::fs::write(&path, b"existing").unwrap();

        let mut cfg = config();
        cfg.append = true;
        let mut output = FileOutput::new(path.to_str().unwrap(), cfg).unwrap();
        output.write(b"1 aaa 1\nmore").unwrap();
        output.close();

        let contents = std::fs::read(&path).unwrap();
        assert!(contents.starts_with(b"existing"));
        assert!(contents.len() > b"existing".len());
    }

    #[test]
    fn test_chunk_path_naming() {
        assert_eq!(
            chunk_path(Path::new("/tmp/capture.gor"), 3),
            Path::new("/tmp/capture_3.gor")
        );
        assert_eq!(
            chunk_path(Path::new("capture"), 1),
            Path::new("capture_1")
        );
    }
}
