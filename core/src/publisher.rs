//! SV publisher pipeline: builds, encodes and emits one ASDU per call.

use log::{error, info};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use crate::iec61850_9_2::asdu::{AnalogValue, Asdu};
use crate::iec61850_9_2::common::{SmpSynch, VALUES_PER_ASDU};
use crate::iec61850_9_2::encoder::encode_frame;
use crate::iec61850_9_2::ptp::PtpTimestamp;
use crate::iec61850_9_2::svcb::SampledValueControlBlock;
use crate::network::sender::EthernetSender;
use crate::network::FrameSender;

/// Emits sampled values for one stream. The outer cadence (wall-clock
/// spacing between samples) belongs to the caller; `update_sampled_value`
/// is the atomic emit operation.
///
/// The sample counter increases by one per emitted frame and wraps at
/// 2^16, which is what lets receivers detect loss.
pub struct SvPublisher {
    sender: Box<dyn FrameSender>,
    sample_count: AtomicU16,
    downgrade_logged: AtomicBool,
}

impl SvPublisher {
    /// Binds a publisher to the named interface (empty for auto-detect).
    /// Fails fast when no usable interface exists.
    pub fn new(interface: &str) -> io::Result<Self> {
        Ok(Self::with_sender(Box::new(EthernetSender::new(interface)?)))
    }

    /// Wires the publisher onto an existing link sender.
    pub fn with_sender(sender: Box<dyn FrameSender>) -> Self {
        SvPublisher {
            sender,
            sample_count: AtomicU16::new(0),
            downgrade_logged: AtomicBool::new(false),
        }
    }

    /// Presets the sample counter; the next emitted frame carries this
    /// value.
    pub fn set_sample_count(&self, count: u16) {
        self.sample_count.store(count, Ordering::SeqCst);
    }

    pub fn sample_count(&self) -> u16 {
        self.sample_count.load(Ordering::SeqCst)
    }

    /// Builds one ASDU from the control block and the given dataset and
    /// emits it as a single frame.
    ///
    /// A dataset that is not exactly eight values is logged and dropped
    /// (no frame leaves, the call still returns `Ok`); send failures are
    /// propagated to the caller as recoverable errors.
    pub fn update_sampled_value(
        &self,
        svcb: &SampledValueControlBlock,
        values: &[AnalogValue],
    ) -> io::Result<()> {
        if values.len() != VALUES_PER_ASDU {
            error!(
                "svID {}: dropping emit, dataset has {} values, expected {}",
                svcb.name,
                values.len(),
                VALUES_PER_ASDU
            );
            return Ok(());
        }

        let mut smp_synch = svcb.smp_synch;
        if smp_synch == SmpSynch::Global && svcb.gm_identity.is_none() {
            if !self.downgrade_logged.swap(true, Ordering::Relaxed) {
                info!(
                    "svID {}: no PTP source wired in, downgrading global sync to local",
                    svcb.name
                );
            }
            smp_synch = SmpSynch::Local;
        }
        let gm_identity = if smp_synch == SmpSynch::Global {
            svcb.gm_identity
        } else {
            None
        };

        let asdu = Asdu {
            sv_id: svcb.name.clone(),
            smp_cnt: self.sample_count.fetch_add(1, Ordering::SeqCst),
            conf_rev: svcb.conf_rev,
            smp_synch,
            gm_identity,
            data_set: values.to_vec(),
            timestamp: PtpTimestamp::now(),
        };

        let frame = match encode_frame(svcb, &asdu, self.sender.source_mac()) {
            Ok(frame) => frame,
            Err(e) => {
                error!("svID {}: dropping emit, {}", svcb.name, e);
                return Ok(());
            }
        };

        self.sender.send(&frame, svcb.destination).map_err(|e| {
            error!("svID {}: send failed: {}", svcb.name, e);
            e
        })
    }
}
