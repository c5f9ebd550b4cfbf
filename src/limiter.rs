//! Rate limiting wrapper for inputs and outputs.
//!
//! A limit string is either `N` (absolute requests per second, enforced
//! over a one-second window) or `N%` (uniform sampling). Drops return
//! `Ok(0)` so callers treat them as applied rather than failed. On the
//! read path the wrapped plugin is read first and the verdict applied
//! after, so a sampled-out read still consumes one upstream message.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::PipeError;
use crate::plugins::{Reader, Writer};

/// Parsed limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPolicy {
    /// Absolute requests per second.
    Rps(u64),
    /// Percentage passed through, 0..=100.
    Percent(u64),
}

/// Parses `"50"` or `"10%"`. Malformed numbers limit to zero.
pub fn parse_limit_options(options: &str) -> LimitPolicy {
    match options.strip_suffix('%') {
        Some(percent) => LimitPolicy::Percent(percent.trim().parse().unwrap_or(0)),
        None => LimitPolicy::Rps(options.trim().parse().unwrap_or(0)),
    }
}

/// Wraps a reader or writer plugin with a limit policy.
pub struct Limiter<P> {
    plugin: P,
    policy: LimitPolicy,
    window_start: Instant,
    current_rps: u64,
}

impl<P> Limiter<P> {
    pub fn new(plugin: P, options: &str) -> Limiter<P> {
        Limiter {
            plugin,
            policy: parse_limit_options(options),
            window_start: Instant::now(),
            current_rps: 0,
        }
    }

    fn is_limited(&mut self) -> bool {
        match self.policy {
            LimitPolicy::Percent(limit) => limit <= rand::thread_rng().gen_range(0..100),
            LimitPolicy::Rps(limit) => {
                if self.window_start.elapsed() > Duration::from_secs(1) {
                    self.window_start = Instant::now();
                    self.current_rps = 0;
                }
                if self.current_rps >= limit {
                    return true;
                }
                self.current_rps += 1;
                false
            }
        }
    }
}

impl<R: Reader> Reader for Limiter<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, PipeError> {
        let n = self.plugin.read(buf)?;
        if self.is_limited() {
            return Ok(0);
        }
        Ok(n)
    }
}

impl<W: Writer> Writer for Limiter<W> {
    fn write(&mut self, data: &[u8]) -> Result<usize, PipeError> {
        if self.is_limited() {
            return Ok(0);
        }
        self.plugin.write(data)
    }

    fn close(&mut self) {
        self.plugin.close();
    }
}
