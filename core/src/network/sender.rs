//! Ethernet frame sender.

use log::{info, warn};
use std::io;

use super::interface::{first_up_interface, hardware_address, RawSocket};
use super::FrameSender;
use crate::iec61850_9_2::mac::MacAddress;

/// Owns a raw socket bound to one egress interface. Construction fails
/// fast when the interface cannot be resolved; the socket is released on
/// every exit path once the sender drops.
pub struct EthernetSender {
    interface: String,
    socket: RawSocket,
    source_mac: MacAddress,
}

impl EthernetSender {
    /// Binds to `interface`, or to the first non-loopback interface that
    /// is up when the name is empty.
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
        let source_mac = hardware_address(&interface)?;

        info!("sender bound to {} ({})", interface, source_mac);
        Ok(EthernetSender {
            interface,
            socket,
            source_mac,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl FrameSender for EthernetSender {
    fn send(&self, frame: &[u8], destination: MacAddress) -> io::Result<()> {
        let sent = self.socket.send_to(frame, destination)?;
        if sent != frame.len() {
            warn!(
                "partial send on {}: {} of {} bytes",
                self.interface,
                sent,
                frame.len()
            );
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("partial send: {} of {} bytes", sent, frame.len()),
            ));
        }
        Ok(())
    }

    fn source_mac(&self) -> MacAddress {
        self.source_mac
    }
}
