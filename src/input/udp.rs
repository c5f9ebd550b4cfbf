//! Live capture input.
//!
//! Adapts the UDP listener's message channel to the [`Reader`] contract:
//! each `read` yields exactly one framed message. The reader is single
//! consumer; concurrent callers would race on the channel and interleave.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use tracing::info;

use crate::capture::udp::UdpListener;
use crate::config;
use crate::error::PipeError;
use crate::frame;
use crate::message::UdpMessage;
use crate::plugins::Reader;

pub struct UdpInput {
    data: Receiver<UdpMessage>,
    quit: Arc<AtomicBool>,
}

impl UdpInput {
    /// Starts capturing on `address` (`host:port`; an empty host means all
    /// interfaces) and bridges messages through a rendezvous channel.
    pub fn new(address: &str, track_response: bool) -> Result<UdpInput> {
        info!("listening for traffic on {address}");

        let (host, port) = split_host_port(address)
            .with_context(|| format!("error while parsing address {address}"))?;
        let listener = UdpListener::new(&host, port, track_response)?;

        let quit = Arc::new(AtomicBool::new(false));
        let (data_tx, data_rx) = bounded(0);
        let messages = listener.receiver();
        let quit_flag = Arc::clone(&quit);
        std::thread::Builder::new()
            .name("udp-input".into())
            .spawn(move || loop {
                if quit_flag.load(Ordering::Relaxed) {
                    return;
                }
                match messages.recv_timeout(Duration::from_millis(config::BRIDGE_POLL_INTERVAL_MS))
                {
                    Ok(message) => {
                        if data_tx.send(message).is_err() {
                            return;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            })
            .context("failed to spawn udp input thread")?;

        Ok(UdpInput {
            data: data_rx,
            quit,
        })
    }
}

impl Reader for UdpInput {
    /// Blocks for the next captured message and writes one frame into
    /// `buf`: a request header for incoming datagrams, a response header
    /// otherwise, followed by the payload. Returns the bytes written; a
    /// too-small buffer truncates and the tail is not re-queued.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, PipeError> {
        let message = self.data.recv().map_err(|_| PipeError::Eof)?;

        let payload_type = if message.is_incoming {
            frame::REQUEST_PAYLOAD
        } else {
            frame::RESPONSE_PAYLOAD
        };
        let header = frame::payload_header(payload_type, message.uuid().as_bytes(), message.ts_nanos);

        let header_n = header.len().min(buf.len());
        buf[..header_n].copy_from_slice(&header[..header_n]);
        let body_n = message.payload().len().min(buf.len() - header_n);
        buf[header_n..header_n + body_n].copy_from_slice(&message.payload()[..body_n]);

        Ok(header_n + body_n)
    }
}

impl Drop for UdpInput {
    fn drop(&mut self) {
        self.quit.store(true, Ordering::Relaxed);
    }
}

/// Splits `host:port`, accepting an empty host (`:9000`) and a bracketed
/// IPv6 host (`[::1]:9000`).
fn split_host_port(address: &str) -> Result<(String, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .context("expected host:port")?;
    let port: u16 = port.parse().context("invalid port")?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok((host.to_string(), port))
}
