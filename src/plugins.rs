//! Plugin capability model and registry.
//!
//! A plugin declares what it can do by implementing [`Reader`] (produces
//! framed payloads), [`Writer`] (consumes them), or both. The registry is
//! populated once from the settings and read-only afterwards; each entry
//! may be wrapped in a [`Limiter`](crate::limiter::Limiter) when its
//! address string carried a `|limit` suffix.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::cli::Settings;
use crate::error::PipeError;
use crate::input::file::FileInput;
use crate::input::udp::UdpInput;
use crate::limiter::{parse_limit_options, LimitPolicy, Limiter};
use crate::output::file::{FileOutput, FileOutputConfig};
use crate::output::null::NullOutput;
use crate::output::stdout::StdOutput;
use crate::output::udp::{UdpOutput, UdpOutputConfig};

/// Input capability: fills the caller's buffer with exactly one frame per
/// call and returns the bytes written. `Eof` terminates the dispatcher
/// cleanly; `Ok(0)` means "nothing this round" and the dispatcher
/// continues.
pub trait Reader: Send {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, PipeError>;
}

/// Output capability: consumes one frame per call. `close` flushes any
/// buffered state; the default is a no-op.
pub trait Writer: Send {
    fn write(&mut self, data: &[u8]) -> Result<usize, PipeError>;
    fn close(&mut self) {}
}

/// A writer shared by every dispatcher thread.
pub type SharedWriter = Arc<Mutex<dyn Writer>>;

/// All registered plugins. Inputs are each owned by one dispatcher; outputs
/// are shared across dispatchers.
pub struct Plugins {
    pub inputs: Vec<Box<dyn Reader>>,
    pub outputs: Vec<SharedWriter>,
}

/// Splits a plugin specification on the first `|` into the address and the
/// optional limit string.
pub fn extract_limit_options(options: &str) -> (&str, Option<&str>) {
    match options.split_once('|') {
        Some((addr, limit)) => (addr, Some(limit)),
        None => (options, None),
    }
}

/// Builds the registry from the parsed settings, wiring limiters where
/// requested.
pub fn init_plugins(settings: &Settings) -> Result<Plugins> {
    let mut plugins = Plugins {
        inputs: Vec::new(),
        outputs: Vec::new(),
    };

    if settings.output_stdout {
        plugins.outputs.push(Arc::new(Mutex::new(StdOutput)));
    }

    if settings.output_null {
        plugins.outputs.push(Arc::new(Mutex::new(NullOutput)));
    }

    for options in &settings.input_udp {
        let (addr, limit) = extract_limit_options(options);
        let input = UdpInput::new(addr, settings.input_udp_track_response)?;
        plugins.inputs.push(match limit {
            Some(limit) => Box::new(Limiter::new(input, limit)),
            None => Box::new(input),
        });
    }

    for options in &settings.input_file {
        let (path, limit) = extract_limit_options(options);
        let mut input = FileInput::new(path, settings.input_file_loop)?;
        match limit {
            // A percent limit on a file input adjusts its replay speed
            // instead of sampling: the input has its own pacing.
            Some(limit) if matches!(parse_limit_options(limit), LimitPolicy::Percent(_)) => {
                if let LimitPolicy::Percent(percent) = parse_limit_options(limit) {
                    input.set_speed_factor(percent as f64 / 100.0);
                }
                plugins.inputs.push(Box::new(input));
            }
            Some(limit) => plugins.inputs.push(Box::new(Limiter::new(input, limit))),
            None => plugins.inputs.push(Box::new(input)),
        }
    }

    for options in &settings.output_file {
        let (path, limit) = extract_limit_options(options);
        let config = FileOutputConfig {
            flush_interval: settings.output_file_flush_interval,
            size_limit: settings.output_file_size_limit,
            queue_limit: settings.output_file_queue_limit,
            append: settings.output_file_append,
        };
        let output = FileOutput::new(path, config)?;
        plugins.outputs.push(match limit {
            Some(limit) => Arc::new(Mutex::new(Limiter::new(output, limit))),
            None => Arc::new(Mutex::new(output)),
        });
    }

    for options in &settings.output_udp {
        let (addr, limit) = extract_limit_options(options);
        let config = UdpOutputConfig {
            workers: settings.output_udp_workers,
            timeout: settings.output_udp_timeout,
            stats: settings.output_udp_stats,
            ignore_response: settings.output_udp_ignore_response,
        };
        let output = UdpOutput::new(addr, config)?;
        plugins.outputs.push(match limit {
            Some(limit) => Arc::new(Mutex::new(Limiter::new(output, limit))),
            None => Arc::new(Mutex::new(output)),
        });
    }

    Ok(plugins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_extract_limit_options() {
        assert_eq!(extract_limit_options(":9000"), (":9000", None));
        assert_eq!(extract_limit_options(":9000|50"), (":9000", Some("50")));
        assert_eq!(extract_limit_options(":9000|10%"), (":9000", Some("10%")));
        // Only the first pipe separates the address.
        assert_eq!(extract_limit_options("a|b|c"), ("a", Some("b|c")));
    }

    #[test]
    fn test_init_classifies_debug_outputs() {
        let settings = Settings::parse_from(["udpmirror", "--output-stdout", "--output-null"]);
        let plugins = init_plugins(&settings).unwrap();
        assert_eq!(plugins.inputs.len(), 0);
        assert_eq!(plugins.outputs.len(), 2);
    }

    #[test]
    fn test_init_wires_file_plugins() {
        let dir = std::env::temp_dir().join("udpmirror-plugins-test");
        std::fs::create_dir_all(&dir).unwrap();
        let in_path = dir.join("in.gor");
        let out_path = dir.join("out.gor");
        std::fs::write(&in_path, b"").unwrap();

        let settings = Settings::parse_from([
            "udpmirror",
            "--input-file",
            in_path.to_str().unwrap(),
            "--output-file",
            out_path.to_str().unwrap(),
        ]);
        let plugins = init_plugins(&settings).unwrap();
        assert_eq!(plugins.inputs.len(), 1);
        assert_eq!(plugins.outputs.len(), 1);
    }

    #[test]
    fn test_init_missing_input_file_fails() {
        let settings = Settings::parse_from([
            "udpmirror",
            "--input-file",
            "/nonexistent/path/to/capture.gor",
        ]);
        assert!(init_plugins(&settings).is_err());
    }
}
