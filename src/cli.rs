//! Command-line settings.
//!
//! Addresses for `--input-udp`, `--output-udp`, `--input-file`, and
//! `--output-file` may carry a rate limit after a pipe, e.g.
//! `--input-udp ":9000|50"` (50 requests/second) or `":9000|10%"`
//! (10% sampled). Size literals accept `k`/`m`/`g` suffixes with an
//! optional trailing `b`, base 1024.

use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "udpmirror", version, about)]
pub struct Settings {
    /// Exit after the given duration, e.g. "30s" or "5m".
    #[arg(long, value_parser = humantime::parse_duration)]
    pub exit_after: Option<Duration>,

    /// Print frames coming from inputs to the console. Used for testing inputs.
    #[arg(long)]
    pub output_stdout: bool,

    /// Discard all frames. Used for testing inputs.
    #[arg(long)]
    pub output_null: bool,

    /// Capture traffic from the given address (host:port). Requires raw
    /// socket access, typically root. Repeatable.
    #[arg(long)]
    pub input_udp: Vec<String>,

    /// Track responses in addition to requests.
    #[arg(long)]
    pub input_udp_track_response: bool,

    /// Forward captured requests to the given UDP address. Repeatable.
    #[arg(long)]
    pub output_udp: Vec<String>,

    /// Worker pool size for UDP outputs; 0 scales dynamically.
    #[arg(long, default_value_t = 0)]
    pub output_udp_workers: usize,

    /// UDP request/response timeout.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    pub output_udp_timeout: Duration,

    /// Do not wait for responses to replayed datagrams.
    #[arg(long)]
    pub output_udp_ignore_response: bool,

    /// Report UDP output queue stats to the log periodically.
    #[arg(long)]
    pub output_udp_stats: bool,

    /// Read frames from a capture file. Repeatable.
    #[arg(long)]
    pub input_file: Vec<String>,

    /// Restart capture files at EOF, useful for performance testing.
    #[arg(long)]
    pub input_file_loop: bool,

    /// Write frames to a capture file. Repeatable.
    #[arg(long)]
    pub output_file: Vec<String>,

    /// Interval for forcing buffer flushes to the file.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "1s")]
    pub output_file_flush_interval: Duration,

    /// Size of each output file chunk.
    #[arg(long, value_parser = parse_data_unit, default_value = "32mb")]
    pub output_file_size_limit: u64,

    /// Continue an existing output file instead of rotating chunks.
    #[arg(long)]
    pub output_file_append: bool,

    /// Frames per output file chunk before rotation.
    #[arg(long, default_value_t = 25_600)]
    pub output_file_queue_limit: usize,
}

/// Parses a size literal: `512`, `100kb`, `32m`, `1g`. Base 1024.
pub fn parse_data_unit(s: &str) -> Result<u64, String> {
    let s = s.trim().to_ascii_lowercase();
    let s = s.strip_suffix('b').unwrap_or(&s);
    if s.is_empty() {
        return Err("empty size literal".to_string());
    }

    let (digits, unit) = match s.as_bytes()[s.len() - 1] {
        b'k' => (&s[..s.len() - 1], 1024),
        b'm' => (&s[..s.len() - 1], 1024 * 1024),
        b'g' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (&s[..], 1),
    };

    digits
        .parse::<u64>()
        .map(|n| n * unit)
        .map_err(|e| format!("invalid size literal {s:?}: {e}"))
}
