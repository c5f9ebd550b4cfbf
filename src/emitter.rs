//! Fan-out from inputs to outputs.
//!
//! Each input gets one dispatcher thread that reads a frame at a time into
//! a scratch buffer and writes it to every output in registration order.
//! The main loop idles on a ticker until the close signal arrives, then
//! closes every output; on an interrupt the process exits with status 1.

use std::time::Duration;

use crossbeam_channel::{select, tick, Receiver};
use tracing::{debug, info, warn};

use crate::config;
use crate::error::PipeError;
use crate::plugins::{Plugins, Reader, SharedWriter};

/// Why the emitter is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// OS interrupt or terminate signal; exit code 1.
    Interrupted,
    /// `--exit-after` elapsed; exit code 0.
    Expired,
}

/// Runs the pipeline until a close signal arrives. Dispatchers for
/// exhausted inputs end on their own; the emitter itself only returns on
/// `Expired`.
pub fn start(plugins: Plugins, close_rx: Receiver<CloseReason>) {
    let outputs = plugins.outputs;

    for (index, input) in plugins.inputs.into_iter().enumerate() {
        let outputs = outputs.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("dispatcher-{index}"))
            .spawn(move || {
                if let Err(e) = copy_multi(input, &outputs) {
                    warn!("dispatcher {index} ended with error: {e}");
                }
            });
        if let Err(e) = spawned {
            warn!("failed to spawn dispatcher {index}: {e}");
        }
    }

    let ticker = tick(Duration::from_millis(config::EMITTER_TICK_MS));
    loop {
        select! {
            recv(close_rx) -> reason => {
                finalize(&outputs);
                if let Ok(CloseReason::Interrupted) = reason {
                    info!("interrupted, shutting down");
                    std::process::exit(1);
                }
                return;
            }
            recv(ticker) -> _ => {}
        }
    }
}

/// Copies frames from one input to every output until EOF. Reads that
/// return zero bytes (rate-limited away) are skipped, not terminal.
pub fn copy_multi(mut src: Box<dyn Reader>, outputs: &[SharedWriter]) -> Result<(), PipeError> {
    let mut buf = vec![0u8; config::EMITTER_BUFFER_BYTES];
    loop {
        match src.read(&mut buf) {
            Ok(n) if n > 0 && n < buf.len() => {
                let payload = &buf[..n];
                for output in outputs {
                    if let Err(e) = output.lock().unwrap().write(payload) {
                        debug!("output write error: {e}");
                    }
                }
            }
            Ok(_) => {}
            Err(e) if e.is_eof() => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

fn finalize(outputs: &[SharedWriter]) {
    for output in outputs {
        output.lock().unwrap().close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::plugins::Writer;

    struct ScriptedReader {
        script: VecDeque<Result<Vec<u8>, PipeError>>,
    }

    impl ScriptedReader {
        fn new(script: Vec<Result<Vec<u8>, PipeError>>) -> Box<ScriptedReader> {
            Box::new(ScriptedReader {
                script: script.into(),
            })
        }
    }

    impl Reader for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, PipeError> {
            match self.script.pop_front() {
                Some(Ok(frame)) => {
                    buf[..frame.len()].copy_from_slice(&frame);
                    Ok(frame.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(PipeError::Eof),
            }
        }
    }

    struct CollectingWriter {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
        closed: Arc<AtomicBool>,
    }

    fn collecting() -> (SharedWriter, Arc<Mutex<Vec<Vec<u8>>>>, Arc<AtomicBool>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let writer: SharedWriter = Arc::new(Mutex::new(CollectingWriter {
            frames: Arc::clone(&frames),
            closed: Arc::clone(&closed),
        }));
        (writer, frames, closed)
    }

    impl Writer for CollectingWriter {
        fn write(&mut self, data: &[u8]) -> Result<usize, PipeError> {
            self.frames.lock().unwrap().push(data.to_vec());
            Ok(data.len())
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_fan_out_to_every_output_in_order() {
        let reader = ScriptedReader::new(vec![
            Ok(b"1 aaa 1\nfirst".to_vec()),
            Ok(b"2 bbb 2\nsecond".to_vec()),
        ]);
        let (out_a, frames_a, _) = collecting();
        let (out_b, frames_b, _) = collecting();

        copy_multi(reader, &[out_a, out_b]).unwrap();

        let expected = vec![b"1 aaa 1\nfirst".to_vec(), b"2 bbb 2\nsecond".to_vec()];
        assert_eq!(*frames_a.lock().unwrap(), expected);
        assert_eq!(*frames_b.lock().unwrap(), expected);
    }

    #[test]
    fn test_zero_byte_reads_are_skipped() {
        let reader = ScriptedReader::new(vec![
            Ok(Vec::new()), // a rate-limited read
            Ok(b"1 aaa 1\nkept".to_vec()),
        ]);
        let (out, frames, _) = collecting();

        copy_multi(reader, &[out]).unwrap();
        assert_eq!(*frames.lock().unwrap(), vec![b"1 aaa 1\nkept".to_vec()]);
    }

    #[test]
    fn test_read_error_ends_dispatcher_with_error() {
        let reader = ScriptedReader::new(vec![
            Ok(b"1 aaa 1\nok".to_vec()),
            Err(PipeError::Disconnected),
        ]);
        let (out, frames, _) = collecting();

        assert!(copy_multi(reader, &[out]).is_err());
        assert_eq!(frames.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_expired_close_finalizes_outputs() {
        let (out, _, closed) = collecting();
        let plugins = Plugins {
            inputs: vec![ScriptedReader::new(vec![])],
            outputs: vec![out],
        };

        let (close_tx, close_rx) = crossbeam_channel::bounded(1);
        close_tx.send(CloseReason::Expired).unwrap();
        start(plugins, close_rx);

        assert!(closed.load(Ordering::Relaxed));
    }
}
