//! UDP multicast ingress: socket setup and the receive loop.
//!
//! The ingress thread is the only owner of the socket. It receives each
//! datagram directly into the next free ring slot, stamps it, and
//! publishes it to the decoder. Downstream slowness never reaches the
//! kernel reader: a full ring means the datagram is read into a scratch
//! buffer, dropped and counted.

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::ring::SpscRing;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tickwire_types::{monotonic_ns, Statistics, MAX_PACKET_SIZE};
use tracing::{debug, info, warn};

/// Receive timeout. Bounds how long a `stop` waits for the ingress
/// thread to notice the running flag.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Consecutive hard socket errors before the pipeline degrades.
const MAX_CONSECUTIVE_ERRORS: u32 = 64;

/// One ingress ring slot: a jumbo-frame buffer plus receipt metadata.
/// Slots are allocated once at startup and reused for the process
/// lifetime; a slot's contents are valid from publish until the decoder
/// finishes its iteration over it.
#[derive(Clone, Copy)]
#[repr(C, align(64))]
pub struct Packet {
    pub data: [u8; MAX_PACKET_SIZE],
    pub length: u32,
    pub local_timestamp: u64,
}

impl Default for Packet {
    fn default() -> Self {
        Self {
            data: [0; MAX_PACKET_SIZE],
            length: 0,
            local_timestamp: 0,
        }
    }
}

impl Packet {
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.length as usize]
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("length", &self.length)
            .field("local_timestamp", &self.local_timestamp)
            .finish()
    }
}

/// Creates, configures, binds and joins the feed socket.
///
/// Order matters: reuse-address and the receive buffer must be set
/// before `bind`. Any failure releases the socket and is fatal for
/// startup.
pub fn setup_socket(config: &FeedConfig) -> Result<UdpSocket, FeedError> {
    let socket =
        Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(FeedError::Socket)?;

    socket.set_reuse_address(true).map_err(FeedError::Socket)?;
    socket
        .set_recv_buffer_size(config.receive_buffer_size)
        .map_err(FeedError::Socket)?;

    if config.enable_timestamping {
        // Best effort; not every kernel grants the option.
        if let Err(error) = enable_kernel_timestamps(&socket) {
            warn!(%error, "kernel receive timestamps unavailable");
        }
    }

    socket
        .set_read_timeout(Some(RECV_TIMEOUT))
        .map_err(FeedError::Socket)?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
    socket.bind(&bind_addr.into()).map_err(FeedError::Socket)?;
    socket
        .join_multicast_v4(&config.multicast_group, &config.interface_ip)
        .map_err(FeedError::Socket)?;

    let socket: UdpSocket = socket.into();
    info!(
        group = %config.multicast_group,
        interface = %config.interface_ip,
        port = socket.local_addr().map(|a| a.port()).unwrap_or(config.port),
        "joined multicast feed"
    );
    Ok(socket)
}

#[cfg(target_os = "linux")]
fn enable_kernel_timestamps(socket: &Socket) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    let enable: libc::c_int = 1;
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_TIMESTAMP,
            &enable as *const _ as *const libc::c_void,
            std::mem::size_of_val(&enable) as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn enable_kernel_timestamps(_socket: &Socket) -> std::io::Result<()> {
    Err(std::io::Error::new(
        ErrorKind::Unsupported,
        "SO_TIMESTAMP requires linux",
    ))
}

/// Ingress thread body. Runs until `running` goes false or the socket
/// fails hard enough to degrade the pipeline.
pub(crate) fn run(
    socket: UdpSocket,
    ring: Arc<SpscRing<Packet>>,
    stats: Arc<Statistics>,
    running: Arc<AtomicBool>,
    healthy: Arc<AtomicBool>,
) {
    debug!("ingress thread running");
    // Drop target for datagrams that arrive while the ring is full.
    let mut scratch = Box::new([0u8; MAX_PACKET_SIZE]);
    let mut consecutive_errors = 0u32;

    while running.load(Ordering::Relaxed) {
        let mut io_error: Option<std::io::Error> = None;

        let outcome = ring.try_produce_with(|slot| match socket.recv(&mut slot.data) {
            Ok(received) => {
                slot.length = received as u32;
                slot.local_timestamp = monotonic_ns();
                true
            }
            Err(error) => {
                io_error = Some(error);
                false
            }
        });

        match outcome {
            Some(true) => {
                consecutive_errors = 0;
                stats.packets_received.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            Some(false) => {}
            None => {
                // Ring full: keep the kernel buffer draining, count the drop.
                match socket.recv(&mut scratch[..]) {
                    Ok(_) => {
                        stats.packets_dropped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    Err(error) => io_error = Some(error),
                }
            }
        }

        if let Some(error) = io_error {
            match error.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
                    consecutive_errors = 0;
                }
                _ => {
                    consecutive_errors += 1;
                    warn!(%error, consecutive_errors, "socket receive failed");
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        healthy.store(false, Ordering::Release);
                        warn!("ingress degraded, receive loop stopping");
                        break;
                    }
                }
            }
        }
    }
    debug!("ingress thread exiting");
}
