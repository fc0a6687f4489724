// src/listener.rs
//! UDP multicast receive thread for one feed.
//!
//! The socket is bound and joined to the group before the thread starts, so
//! setup failures surface from [`FeedListener::spawn`] itself. The receive
//! loop writes each datagram straight into a free SPSC ring slot; when the
//! ring is full the datagram is read into scratch and dropped, trusting the
//! partner feed and the arbiter's gap handling to cover the loss.
//!
//! A short receive timeout keeps the loop responsive to `stop`, which flips
//! the run flag and joins the thread.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::packet::{Packet, PacketSource, SLOT_BYTES};
use crate::spsc::{self, Consumer, Producer};

const RECV_TIMEOUT: Duration = Duration::from_millis(50);

/// Consumer half of a listener's packet ring.
pub struct PacketRx(Consumer<Packet>);

impl PacketSource for PacketRx {
    #[inline]
    fn with_next(&mut self, f: &mut dyn FnMut(&[u8])) -> bool {
        self.0.pop_with(|pkt| f(pkt.payload()))
    }
}

/// Handle to a running receive thread.
pub struct FeedListener {
    label: &'static str,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FeedListener {
    /// Joins `group` on `port`, starts the receive thread, and returns the
    /// consumer handle for the packet ring.
    pub fn spawn(
        label: &'static str,
        group: Ipv4Addr,
        port: u16,
        queue_capacity: usize,
    ) -> Result<(FeedListener, PacketRx)> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .with_context(|| format!("feed {label}: bind port {port}"))?;
        socket
            .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
            .with_context(|| format!("feed {label}: join multicast {group}"))?;
        socket
            .set_read_timeout(Some(RECV_TIMEOUT))
            .with_context(|| format!("feed {label}: set receive timeout"))?;

        let (tx, rx) = spsc::ring::<Packet>(queue_capacity);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(format!("feed-{label}"))
            .spawn(move || recv_loop(label, socket, tx, flag))
            .with_context(|| format!("feed {label}: spawn receive thread"))?;

        info!(feed = label, %group, port, "listener started");
        Ok((
            FeedListener {
                label,
                running,
                handle: Some(handle),
            },
            PacketRx(rx),
        ))
    }

    /// Signals the receive loop and joins it. The loop exits within one
    /// receive timeout.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            info!(feed = self.label, "listener stopped");
        }
    }
}

impl Drop for FeedListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn recv_loop(label: &'static str, socket: UdpSocket, mut tx: Producer<Packet>, running: Arc<AtomicBool>) {
    let mut scratch = [0u8; SLOT_BYTES];
    while running.load(Ordering::Relaxed) {
        if tx.is_full() {
            // Keep draining the socket; the dropped packet is recoverable
            // from the partner feed.
            match socket.recv(&mut scratch) {
                Ok(_) => {}
                Err(e) if is_timeout(&e) => {}
                Err(e) => warn!(feed = label, error = %e, "udp receive failed"),
            }
            continue;
        }
        tx.push_with(|slot| match socket.recv(&mut slot.bytes) {
            Ok(n) => {
                slot.len = n as u32;
                true
            }
            Err(e) if is_timeout(&e) => false,
            Err(e) => {
                warn!(feed = label, error = %e, "udp receive failed");
                false
            }
        });
    }
}

#[inline]
fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
