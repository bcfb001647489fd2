//! SV subscriber dispatcher: filter, decode, deliver.

use log::warn;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::iec61850_9_2::asdu::Asdu;
use crate::iec61850_9_2::common::{FrameError, SvDataType};
use crate::iec61850_9_2::decoder::decode_frame;
use crate::network::receiver::EthernetReceiver;
use crate::network::FrameReceiver;

/// Counters kept by the dispatch loop, readable while capture runs.
#[derive(Debug, Default)]
pub struct SubscriberStats {
    /// Frames that decoded into at least one ASDU.
    pub sv_frames: AtomicU64,
    /// Frames with a foreign EtherType.
    pub non_sv_frames: AtomicU64,
    /// SV frames dropped by the decoder.
    pub decode_errors: AtomicU64,
    /// ASDUs handed to the callback.
    pub asdus_delivered: AtomicU64,
}

/// Wraps a frame receiver and turns raw captures into decoded ASDUs.
///
/// Non-SV traffic and malformed frames are counted and dropped; nothing a
/// peer puts on the wire can take the capture thread down. ASDUs reach
/// the callback in wire-arrival order, from the capture thread.
pub struct SvSubscriber {
    receiver: Box<dyn FrameReceiver>,
    data_type: SvDataType,
    stats: Arc<SubscriberStats>,
    collected: Arc<Mutex<Vec<Asdu>>>,
}

impl SvSubscriber {
    /// Opens a promiscuous capture on the named interface (empty for
    /// auto-detect). `data_type` must match the publisher's configured
    /// encoding; when unknown, INT32 is the conventional default.
    pub fn new(interface: &str, data_type: SvDataType) -> io::Result<Self> {
        Ok(Self::with_receiver(
            Box::new(EthernetReceiver::new(interface)?),
            data_type,
        ))
    }

    /// Wires the subscriber onto an existing link receiver.
    pub fn with_receiver(receiver: Box<dyn FrameReceiver>, data_type: SvDataType) -> Self {
        SvSubscriber {
            receiver,
            data_type,
            stats: Arc::new(SubscriberStats::default()),
            collected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Starts capture with the default collector: decoded ASDUs are
    /// stored in arrival order until [`drain`](Self::drain) is called.
    pub fn start(&mut self) -> io::Result<()> {
        let collected = Arc::clone(&self.collected);
        self.start_with(move |asdu| {
            if let Ok(mut queue) = collected.lock() {
                queue.push(asdu.clone());
            }
        })
    }

    /// Starts capture with a user callback. The callback runs on the
    /// capture thread and must not call [`stop`](Self::stop) on this
    /// subscriber.
    pub fn start_with<F>(&mut self, callback: F) -> io::Result<()>
    where
        F: Fn(&Asdu) + Send + 'static,
    {
        let stats = Arc::clone(&self.stats);
        let data_type = self.data_type;

        self.receiver.start(Box::new(move |frame: &[u8]| {
            match decode_frame(frame, data_type) {
                Ok(message) => {
                    stats.sv_frames.fetch_add(1, Ordering::Relaxed);
                    for asdu in &message.asdus {
                        stats.asdus_delivered.fetch_add(1, Ordering::Relaxed);
                        callback(asdu);
                    }
                }
                Err(FrameError::NotSampledValues) => {
                    stats.non_sv_frames.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("dropping SV frame: {}", e);
                }
            }
        }))
    }

    /// Stops the capture thread. Idempotent; blocks until the thread has
    /// joined.
    pub fn stop(&mut self) {
        self.receiver.stop();
    }

    /// Transfers and clears the default collector atomically.
    pub fn drain(&self) -> Vec<Asdu> {
        match self.collected.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(_) => Vec::new(),
        }
    }

    pub fn stats(&self) -> Arc<SubscriberStats> {
        Arc::clone(&self.stats)
    }
}
