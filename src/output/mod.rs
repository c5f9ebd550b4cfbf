//! Output plugins: sinks for framed payloads.

pub mod client;
pub mod file;
pub mod null;
pub mod stdout;
pub mod udp;
