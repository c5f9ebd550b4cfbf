//! Input plugins: sources of framed payloads.

pub mod file;
pub mod udp;
