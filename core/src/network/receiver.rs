//! Ethernet frame capture with a dedicated receive thread.

use log::{error, info, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::interface::{first_up_interface, RawSocket};
use super::{FrameCallback, FrameReceiver};

/// Largest frame the capture loop accepts: standard Ethernet MTU plus
/// header and 802.1Q tag.
const CAPTURE_BUFFER_SIZE: usize = 1522;

/// How often the capture loop wakes to check its stop flag when the wire
/// is silent.
const RECEIVE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captures raw frames in promiscuous mode on one interface. A dedicated
/// background thread owns the blocking receive; `stop` flips an atomic
/// flag checked every iteration and joins the thread.
pub struct EthernetReceiver {
    interface: String,
    socket: Arc<RawSocket>,
    running: Arc<AtomicBool>,
    capture_thread: Option<JoinHandle<()>>,
}

impl EthernetReceiver {
    /// Opens a promiscuous socket on `interface`, or on the first
    /// non-loopback interface that is up when the name is empty.
    pub fn new(interface: &str) -> io::Result<Self> {
        let interface = if interface.is_empty() {
            first_up_interface().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    "no suitable Ethernet interface found",
                )
            })?
        } else {
            interface.to_string()
        };

        let socket = RawSocket::open(&interface)?;
        socket.enable_promiscuous()?;
        socket.set_read_timeout(RECEIVE_POLL_INTERVAL)?;

        info!("receiver bound to {} (promiscuous)", interface);
        Ok(EthernetReceiver {
            interface,
            socket: Arc::new(socket),
            running: Arc::new(AtomicBool::new(false)),
            capture_thread: None,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl FrameReceiver for EthernetReceiver {
    fn start(&mut self, callback: FrameCallback) -> io::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("receiver on {} already running", self.interface);
            return Ok(());
        }

        let socket = Arc::clone(&self.socket);
        let running = Arc::clone(&self.running);
        let interface = self.interface.clone();

        self.capture_thread = Some(thread::spawn(move || {
            let mut buffer = vec![0u8; CAPTURE_BUFFER_SIZE];

            while running.load(Ordering::SeqCst) {
                match socket.recv(&mut buffer) {
                    Ok(length) => {
                        if length < 14 {
                            warn!("frame too short on {}: {} bytes", interface, length);
                            continue;
                        }
                        callback(&buffer[..length]);
                    }
                    Err(e)
                        if e.kind() == io::ErrorKind::WouldBlock
                            || e.kind() == io::ErrorKind::TimedOut =>
                    {
                        // Idle wire; loop to re-check the stop flag.
                    }
                    Err(e) => {
                        error!("receive error on {}: {}", interface, e);
                    }
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.capture_thread.take() {
            if handle.join().is_err() {
                error!("capture thread on {} panicked", self.interface);
            }
        }
    }
}

impl Drop for EthernetReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}
