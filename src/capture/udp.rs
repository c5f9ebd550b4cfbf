//! UDP layer of the capture pipeline.
//!
//! Consumes raw IP packets from the [`IpListener`](super::IpListener),
//! parses the UDP header, annotates the direction, and forwards
//! [`UdpMessage`]s on a bounded channel.

use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Receiver};
use tracing::warn;

use crate::capture::{IpListener, IpPacket};
use crate::config;
use crate::message::UdpMessage;

pub struct UdpListener {
    messages: Receiver<UdpMessage>,
}

impl UdpListener {
    /// Starts the underlying IP listener and waits up to the readiness
    /// timeout for every interface to arm before bridging packets.
    pub fn new(addr: &str, port: u16, track_response: bool) -> Result<UdpListener> {
        let underlying = IpListener::new(addr, port, track_response)?;
        if !underlying.is_ready() {
            bail!(
                "IP listener is not ready after {} seconds",
                config::LISTENER_READY_TIMEOUT_SECS
            );
        }

        let (messages_tx, messages_rx) = bounded(config::MESSAGE_CHANNEL_CAPACITY);
        let packets = underlying.receiver();
        std::thread::Builder::new()
            .name("udp-listener".into())
            .spawn(move || {
                // Keep the listener alive for as long as we bridge from it.
                let _underlying = underlying;
                while let Ok(packet) = packets.recv() {
                    match parse_packet(&packet, port) {
                        Some(message) => {
                            if messages_tx.send(message).is_err() {
                                return;
                            }
                        }
                        None => warn!("error decoding udp message, dropping datagram"),
                    }
                }
            })
            .context("failed to spawn udp listener thread")?;

        Ok(UdpListener { messages: messages_rx })
    }

    pub fn receiver(&self) -> Receiver<UdpMessage> {
        self.messages.clone()
    }
}

/// Parses the transport payload of one IP packet into a message. Incoming
/// means the datagram was addressed to the listened port.
fn parse_packet(packet: &IpPacket, port: u16) -> Option<UdpMessage> {
    let mut message = UdpMessage::parse(&packet.payload, packet.ts_nanos)?;
    message.is_incoming = message.dst_port == port;
    Some(message)
}
