//! Kernel packet capture across one or more network interfaces.
//!
//! `IpListener` opens a pcap handle per selected interface, installs a
//! kernel BPF filter scoped to the listened UDP port, and delivers raw
//! IPv4/IPv6 transport payloads on a bounded channel. A slow consumer
//! blocks the capture threads, which in turn slows the kernel ring and may
//! cause kernel drops; that is the intended overload behavior.

pub mod decode;
pub mod udp;

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use pcap::{Capture, Device};
use tracing::{debug, error, info, warn};

use crate::config;

/// One captured frame, stripped down to the network layer.
#[derive(Debug, Clone)]
pub struct IpPacket {
    /// Source address bytes: 4 for IPv4, 16 for IPv6.
    pub src_ip: Vec<u8>,
    pub dst_ip: Vec<u8>,
    /// Transport bytes (UDP header + data), link and network headers
    /// already stripped.
    pub payload: Vec<u8>,
    /// Capture timestamp in nanoseconds since the epoch.
    pub ts_nanos: u64,
}

/// Captures IP packets on every interface matching the listen address.
pub struct IpListener {
    packets: Receiver<IpPacket>,
    ready: Receiver<()>,
}

impl IpListener {
    /// Selects interfaces for `addr`, then spawns one capture thread per
    /// interface. Interface enumeration happens synchronously so an
    /// unmatched address fails before any thread starts; activation and
    /// filter errors inside the capture threads abort the process.
    pub fn new(addr: &str, port: u16, track_response: bool) -> Result<IpListener> {
        let devices = find_devices(addr)?;

        let (packets_tx, packets_rx) = bounded(config::PACKET_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = bounded(1);
        let armed = Arc::new(AtomicUsize::new(0));
        let total = devices.len();

        let all_addresses: Vec<IpAddr> = devices
            .iter()
            .flat_map(|d| d.addresses.iter().map(|a| a.addr))
            .collect();

        for device in devices {
            let packets_tx = packets_tx.clone();
            let ready_tx = ready_tx.clone();
            let armed = Arc::clone(&armed);
            let all_addresses = all_addresses.clone();
            std::thread::Builder::new()
                .name(format!("capture-{}", device.name))
                .spawn(move || {
                    capture_loop(
                        device,
                        port,
                        track_response,
                        &all_addresses,
                        packets_tx,
                        move || {
                            // Last interface to arm signals overall readiness.
                            if armed.fetch_add(1, Ordering::SeqCst) + 1 == total {
                                let _ = ready_tx.send(());
                            }
                        },
                    );
                })
                .context("failed to spawn capture thread")?;
        }

        Ok(IpListener {
            packets: packets_rx,
            ready: ready_rx,
        })
    }

    /// True once every selected interface has armed its handle; false after
    /// five seconds.
    pub fn is_ready(&self) -> bool {
        self.ready
            .recv_timeout(Duration::from_secs(config::LISTENER_READY_TIMEOUT_SECS))
            .is_ok()
    }

    pub fn receiver(&self) -> Receiver<IpPacket> {
        self.packets.clone()
    }
}

/// Per-interface capture loop. Runs until process exit; setup failures are
/// fatal to the whole process since a silently dead interface would drop
/// traffic the operator asked for.
fn capture_loop(
    device: Device,
    port: u16,
    track_response: bool,
    all_addresses: &[IpAddr],
    packets_tx: Sender<IpPacket>,
    on_armed: impl FnOnce(),
) {
    let name = device.name.clone();
    let addresses: Vec<IpAddr> = device.addresses.iter().map(|a| a.addr).collect();
    let loopback = is_loopback_addrs(&addresses);

    let snaplen = match interface_mtu(&name) {
        Some(mtu) => mtu + config::SNAPLEN_MTU_HEADROOM,
        None => config::SNAPLEN_FALLBACK,
    };

    let inactive = match Capture::from_device(device) {
        Ok(c) => c.snaplen(snaplen).promisc(true),
        Err(e) => {
            error!("pcap error while opening device {name}: {e}");
            std::process::exit(1);
        }
    };

    let mut cap = match inactive.open() {
        Ok(c) => c,
        Err(e) => {
            error!("pcap activate error on {name}: {e}");
            std::process::exit(1);
        }
    };

    // Kernel BPF is unavailable on Darwin; accept the higher capture volume
    // there and filter nothing.
    if !cfg!(target_os = "macos") {
        let (dst_hosts, src_hosts) = if loopback {
            let expr = loopback_host_expression(all_addresses);
            (expr.clone(), expr)
        } else {
            host_expressions(&addresses)
        };
        let bpf = build_bpf(port, track_response, &dst_hosts, &src_hosts);
        if let Err(e) = cap.filter(&bpf, true) {
            error!("BPF filter error on {name}: {e} (filter: {bpf})");
            std::process::exit(1);
        }
    }

    let linktype = cap.get_datalink();
    let Some(link_len) = decode::link_header_len(linktype) else {
        warn!("unsupported link type {linktype:?} on {name}, not capturing");
        on_armed();
        return;
    };

    info!("capturing on {name} (link type {linktype:?}, snaplen {snaplen})");
    on_armed();

    loop {
        let packet = match cap.next_packet() {
            Ok(p) => p,
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(pcap::Error::NoMorePackets) => break,
            Err(e) => {
                warn!("capture read error on {name}: {e}");
                continue;
            }
        };

        let ts_nanos = packet.header.ts.tv_sec as u64 * 1_000_000_000
            + packet.header.ts.tv_usec as u64 * 1_000;

        if packet.data.len() < link_len {
            continue;
        }

        match decode::parse_ip_payload(&packet.data[link_len..]) {
            Some(parsed) => {
                let out = IpPacket {
                    src_ip: parsed.src_ip.to_vec(),
                    dst_ip: parsed.dst_ip.to_vec(),
                    payload: parsed.payload.to_vec(),
                    ts_nanos,
                };
                // Blocks when the consumer lags; backpressure by design.
                if packets_tx.send(out).is_err() {
                    return;
                }
            }
            None => debug!("dropping unparseable packet on {name}"),
        }
    }
}

/// True for the listen addresses that mean "every interface".
pub fn listen_all_interfaces(addr: &str) -> bool {
    matches!(addr, "" | "0.0.0.0" | "[::]" | "::")
}

/// An interface counts as loopback when its first address is the v4 or v6
/// loopback literal.
pub fn is_loopback_addrs(addresses: &[IpAddr]) -> bool {
    matches!(
        addresses.first(),
        Some(addr) if addr.to_string() == "127.0.0.1" || addr.to_string() == "::1"
    )
}

fn device_is_loopback(device: &Device) -> bool {
    let addresses: Vec<IpAddr> = device.addresses.iter().map(|a| a.addr).collect();
    is_loopback_addrs(&addresses)
}

/// `dst host`/`src host` unions over one interface's addresses.
pub fn host_expressions(addresses: &[IpAddr]) -> (String, String) {
    let dst: Vec<String> = addresses.iter().map(|a| format!("dst host {a}")).collect();
    let src: Vec<String> = addresses.iter().map(|a| format!("src host {a}")).collect();
    (dst.join(" or "), src.join(" or "))
}

/// Loopback filter: frames there carry identical endpoints, so the same
/// `(dst host X and src host X)` union over every interface's addresses is
/// used on both sides.
pub fn loopback_host_expression(all_addresses: &[IpAddr]) -> String {
    all_addresses
        .iter()
        .map(|a| format!("(dst host {a} and src host {a})"))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Assembles the kernel filter for one interface.
pub fn build_bpf(port: u16, track_response: bool, dst_hosts: &str, src_hosts: &str) -> String {
    if track_response {
        format!(
            "(udp dst port {port} and ({dst_hosts})) or (udp src port {port} and ({src_hosts}))"
        )
    } else {
        format!("udp dst port {port} and ({dst_hosts})")
    }
}

/// Selects the interfaces matching `addr`: all addressed interfaces plus
/// loopbacks for the wildcard addresses, otherwise the first interface
/// matched by name or by one of its addresses.
fn find_devices(addr: &str) -> Result<Vec<Device>> {
    let devices = Device::list()
        .context("can't get list of network interfaces, ensure that you are running as root user or sudo")?;

    let mut selected = Vec::new();
    for device in &devices {
        if (listen_all_interfaces(addr) && !device.addresses.is_empty())
            || device_is_loopback(device)
        {
            selected.push(device.clone());
            continue;
        }

        for address in &device.addresses {
            if device.name == addr || address.addr.to_string() == addr {
                selected.push(device.clone());
                return Ok(selected);
            }
        }
    }

    if selected.is_empty() {
        bail!(device_not_found_message(addr, &devices));
    }
    Ok(selected)
}

fn device_not_found_message(addr: &str, devices: &[Device]) -> String {
    if devices.is_empty() {
        return "can't get list of network interfaces, ensure that you are running as root user or sudo"
            .to_string();
    }

    let mut msg = format!(
        "can't find interfaces with addr: {addr}. Provide an available IP for intercepting traffic:\n"
    );
    for device in devices {
        msg.push_str(&format!("Name: {}\n", device.name));
        if let Some(desc) = &device.desc {
            msg.push_str(&format!("Description: {desc}\n"));
        }
        for address in &device.addresses {
            msg.push_str(&format!("- IP address: {}\n", address.addr));
        }
    }
    msg
}

#[cfg(target_os = "linux")]
fn interface_mtu(name: &str) -> Option<i32> {
    std::fs::read_to_string(format!("/sys/class/net/{name}/mtu"))
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(not(target_os = "linux"))]
fn interface_mtu(_name: &str) -> Option<i32> {
    None
}
