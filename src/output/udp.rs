//! UDP replay output.
//!
//! Request frames are copied into a bounded queue drained by a pool of
//! workers, each owning one connected socket. With a fixed worker count
//! the pool is spawned once; with auto-scaling the pool starts at ten,
//! grows to the observed queue depth on bursts, and decays to a single
//! worker after roughly two seconds of idleness, never to zero.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::error;

use crate::config;
use crate::error::PipeError;
use crate::frame;
use crate::output::client::UdpClient;
use crate::plugins::Writer;
use crate::stats::QueueStats;

#[derive(Debug, Clone)]
pub struct UdpOutputConfig {
    /// 0 enables auto-scaling; anything else is a fixed pool size.
    pub workers: usize,
    pub timeout: Duration,
    pub stats: bool,
    pub ignore_response: bool,
}

pub struct UdpOutput {
    address: String,
    queue_tx: Sender<Vec<u8>>,
    queue_rx: Receiver<Vec<u8>>,
    need_workers_tx: Sender<usize>,
    active_workers: Arc<AtomicI64>,
    config: UdpOutputConfig,
    queue_stats: Option<QueueStats>,
}

impl UdpOutput {
    pub fn new(address: &str, config: UdpOutputConfig) -> Result<UdpOutput> {
        // Fail fast on an unresolvable destination instead of inside the
        // first worker.
        use std::net::ToSocketAddrs;
        address
            .to_socket_addrs()
            .with_context(|| format!("error resolving UDP output address {address}"))?;

        let (queue_tx, queue_rx) = bounded(config::OUTPUT_QUEUE_CAPACITY);
        let (need_workers_tx, need_workers_rx) = bounded(1);

        let output = UdpOutput {
            address: address.to_string(),
            queue_tx,
            queue_rx,
            need_workers_tx,
            active_workers: Arc::new(AtomicI64::new(0)),
            queue_stats: config.stats.then(|| QueueStats::new("output-udp")),
            config,
        };

        let initial = if output.config.workers == 0 {
            config::INITIAL_DYNAMIC_WORKERS
        } else {
            output.config.workers
        };
        output
            .need_workers_tx
            .send(initial)
            .expect("fresh need-workers channel");

        output.spawn_supervisor(need_workers_rx)?;
        Ok(output)
    }

    fn spawn_supervisor(&self, need_workers_rx: Receiver<usize>) -> Result<()> {
        let address = self.address.clone();
        let queue_rx = self.queue_rx.clone();
        let active = Arc::clone(&self.active_workers);
        let config = self.config.clone();

        std::thread::Builder::new()
            .name("udp-output-supervisor".into())
            .spawn(move || {
                while let Ok(count) = need_workers_rx.recv() {
                    for _ in 0..count {
                        let address = address.clone();
                        let queue_rx = queue_rx.clone();
                        let active = Arc::clone(&active);
                        let config = config.clone();
                        let spawned = std::thread::Builder::new()
                            .name("udp-output-worker".into())
                            .spawn(move || worker_loop(&address, queue_rx, &active, &config));
                        if let Err(e) = spawned {
                            error!("failed to spawn UDP output worker: {e}");
                        }
                    }

                    // A fixed-size pool is spawned exactly once.
                    if config.workers != 0 {
                        return;
                    }
                }
            })
            .context("failed to spawn UDP output supervisor")?;
        Ok(())
    }

    #[cfg(test)]
    fn live_workers(&self) -> i64 {
        self.active_workers.load(Ordering::SeqCst)
    }
}

fn worker_loop(
    address: &str,
    queue_rx: Receiver<Vec<u8>>,
    active: &AtomicI64,
    config: &UdpOutputConfig,
) {
    let client = match UdpClient::new(address, config.timeout, config.ignore_response) {
        Ok(client) => client,
        Err(e) => {
            error!("error initializing UDP client for {address}: {e:#}");
            return;
        }
    };

    active.fetch_add(1, Ordering::SeqCst);
    let mut death_count: u32 = 0;
    loop {
        match queue_rx.recv_timeout(Duration::from_millis(config::WORKER_IDLE_TICK_MS)) {
            Ok(data) => {
                client.send(frame::payload_body(&data));
                death_count = 0;
            }
            Err(RecvTimeoutError::Timeout) => {
                if config.workers != 0 {
                    continue;
                }
                death_count += 1;
                if death_count > config::WORKER_MAX_IDLE_TICKS {
                    // Exit only while at least one sibling stays alive.
                    let exited = active
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                            (n > 1).then_some(n - 1)
                        })
                        .is_ok();
                    if exited {
                        return;
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                active.fetch_sub(1, Ordering::SeqCst);
                return;
            }
        }
    }
}

impl Writer for UdpOutput {
    /// Only request frames are replayed; everything else is acknowledged
    /// and dropped. The frame is copied since callers reuse their buffer.
    fn write(&mut self, data: &[u8]) -> Result<usize, PipeError> {
        if !frame::is_request(data) {
            return Ok(data.len());
        }

        self.queue_tx
            .send(data.to_vec())
            .map_err(|_| PipeError::Disconnected)?;

        if let Some(stats) = &self.queue_stats {
            stats.record(self.queue_rx.len());
        }

        if self.config.workers == 0 {
            let workers = self.active_workers.load(Ordering::SeqCst);
            let depth = self.queue_rx.len();
            if depth > workers as usize {
                let _ = self.need_workers_tx.send(depth);
            }
        }

        Ok(data.len())
    }
}
