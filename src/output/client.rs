//! Connected UDP socket used by replay workers.
//!
//! One client per worker; the client is the unit of parallelism for the
//! output pool. Send and receive failures are logged and swallowed so a
//! worker never dies on a bad datagram.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::config;

pub struct UdpClient {
    socket: UdpSocket,
    ignore_response: bool,
}

impl UdpClient {
    /// Resolves and connects to `address`. The timeout applies to both the
    /// send and the optional response read.
    pub fn new(address: &str, timeout: Duration, ignore_response: bool) -> Result<UdpClient> {
        let addr: SocketAddr = address
            .to_socket_addrs()
            .with_context(|| format!("error resolving UDP address {address}"))?
            .next()
            .with_context(|| format!("no usable address for {address}"))?;

        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).context("error binding UDP client socket")?;
        socket
            .connect(addr)
            .with_context(|| format!("error dialing {address}"))?;
        socket.set_write_timeout(Some(timeout))?;
        socket.set_read_timeout(Some(timeout))?;

        Ok(UdpClient {
            socket,
            ignore_response,
        })
    }

    /// Sends one datagram. Returns the response when tracking is enabled
    /// and one arrived within the deadline; responses longer than the
    /// receive buffer are truncated with a warning.
    pub fn send(&self, data: &[u8]) -> Option<Vec<u8>> {
        if let Err(e) = self.socket.send(data) {
            warn!("UDP write error: {e}");
        }

        if self.ignore_response {
            return None;
        }

        let mut buf = vec![0u8; config::RESPONSE_BUFFER_BYTES];
        match self.socket.recv(&mut buf) {
            Ok(n) => {
                if n == buf.len() {
                    warn!("UDP response may be truncated, length of response is {n}");
                }
                buf.truncate(n);
                Some(buf)
            }
            Err(e) => {
                warn!("UDP read error: {e}");
                None
            }
        }
    }
}
