//! Link-layer plumbing: raw socket ownership, frame send and capture.

pub mod interface;
pub mod receiver;
pub mod sender;

use std::io;

use crate::iec61850_9_2::mac::MacAddress;

/// Byte-out side of the link contract. One sender instance must not be
/// used from two threads at once; the publisher serialises its calls.
pub trait FrameSender: Send + Sync {
    /// Pushes one complete Ethernet frame to the wire.
    fn send(&self, frame: &[u8], destination: MacAddress) -> io::Result<()>;

    /// Hardware address of the egress interface, used as the frame source.
    fn source_mac(&self) -> MacAddress;
}

/// Raw frame handler invoked from the capture thread.
pub type FrameCallback = Box<dyn Fn(&[u8]) + Send>;

/// Byte-in side of the link contract. The implementation owns its capture
/// thread; `stop` is idempotent and joins the thread before returning.
/// The callback must not call `stop` on the same receiver.
pub trait FrameReceiver: Send {
    fn start(&mut self, callback: FrameCallback) -> io::Result<()>;
    fn stop(&mut self);
}
