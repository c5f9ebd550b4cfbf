//! udpmirror captures live UDP traffic and replays it to one or more UDP
//! destinations, optionally persisting framed captures to disk.
//!
//! The pipeline is thread-per-task over bounded channels: capture threads
//! produce IP packets, the UDP listener turns them into messages, inputs
//! frame them, and the emitter fans every frame out to all outputs.

pub mod capture;
pub mod cli;
pub mod config;
pub mod emitter;
pub mod error;
pub mod frame;
pub mod input;
pub mod limiter;
pub mod message;
pub mod output;
pub mod plugins;
pub mod stats;

use anyhow::{ensure, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use tracing::info;

use emitter::CloseReason;

/// Parses the command line, wires the plugins, and runs the emitter until
/// a close signal arrives.
pub fn run() -> Result<()> {
    // Panic hook for safety logging: a dying thread should leave a trace.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in udpmirror: {info}");
        default_hook(info);
    }));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "udpmirror=info".into()),
        )
        .init();

    let settings = cli::Settings::parse();
    let plugins = plugins::init_plugins(&settings)?;
    ensure!(
        !plugins.inputs.is_empty() && !plugins.outputs.is_empty(),
        "required at least 1 input and 1 output"
    );

    let (close_tx, close_rx) = bounded(1);

    {
        let close_tx = close_tx.clone();
        ctrlc::set_handler(move || {
            let _ = close_tx.send(CloseReason::Interrupted);
        })?;
    }

    if let Some(duration) = settings.exit_after {
        info!("running for a duration of {}", humantime::format_duration(duration));
        std::thread::Builder::new()
            .name("exit-after".into())
            .spawn(move || {
                std::thread::sleep(duration);
                info!(
                    "stopping after {}",
                    humantime::format_duration(duration)
                );
                let _ = close_tx.send(CloseReason::Expired);
            })?;
    }

    emitter::start(plugins, close_rx);
    Ok(())
}
