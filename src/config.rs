//! Centralized runtime constants for udpmirror.
//!
//! All tunable capacities, intervals, and buffer sizes are collected here so
//! they can be found and adjusted in a single place rather than scattered
//! across modules.

/// Capacity of the raw IP packet channel between the capture loops and the
/// UDP listener. Producers block when full, which pushes backpressure into
/// the kernel capture ring.
pub const PACKET_CHANNEL_CAPACITY: usize = 10_000;

/// Capacity of the parsed UDP message channel between the UDP listener and
/// the input adapter.
pub const MESSAGE_CHANNEL_CAPACITY: usize = 10_000;

/// Capacity of the prepared request queue inside a UDP output.
pub const OUTPUT_QUEUE_CAPACITY: usize = 10_000;

/// Workers spawned at startup when the UDP output pool is auto-scaling.
pub const INITIAL_DYNAMIC_WORKERS: usize = 10;

/// Idle tick for pool workers waiting on the queue (milliseconds).
pub const WORKER_IDLE_TICK_MS: u64 = 100;

/// Consecutive idle ticks after which an auto-scaled worker exits.
/// At 100 ms per tick this is roughly 2 seconds of inactivity.
pub const WORKER_MAX_IDLE_TICKS: u32 = 20;

/// How long `is_ready` waits for every capture interface to arm (seconds).
pub const LISTENER_READY_TIMEOUT_SECS: u64 = 5;

/// Scratch buffer each emitter dispatcher reads frames into.
pub const EMITTER_BUFFER_BYTES: usize = 5 * 1024 * 1024;

/// Tick of the emitter main loop while waiting for the close signal
/// (milliseconds).
pub const EMITTER_TICK_MS: u64 = 100;

/// Receive buffer for UDP replay responses. Longer responses are truncated
/// and a warning is logged.
pub const RESPONSE_BUFFER_BYTES: usize = 4096;

/// Snap length used when the interface MTU cannot be determined.
pub const SNAPLEN_FALLBACK: i32 = 65_536;

/// Headroom added to the interface MTU when sizing the snap length.
pub const SNAPLEN_MTU_HEADROOM: i32 = 136;

/// Interval at which queue-depth stats are reported (seconds).
pub const STATS_REPORT_INTERVAL_SECS: u64 = 5;

/// Poll interval of input bridge threads checking their quit flag
/// (milliseconds).
pub const BRIDGE_POLL_INTERVAL_MS: u64 = 100;
