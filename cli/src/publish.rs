// Demo merging unit: synthesises a three-phase 50 Hz waveform and
// publishes it at the configured sample cadence. The publisher itself is
// cadence-free; this loop owns the wall clock.

use log::{error, info};
use rand::Rng;
use std::f64::consts::PI;
use std::io;
use std::time::{Duration, Instant};

use sv_core::iec61850_9_2::asdu::AnalogValue;
use sv_core::iec61850_9_2::svcb::SampledValueControlBlock;
use sv_core::publisher::SvPublisher;

pub struct PublishArgs {
    pub interface: String,
    pub svid: String,
    pub appid: u16,
    pub vlan: u16,
    pub rate: u16,
    pub duration: f64,
    pub current: f64,
    pub voltage: f64,
    pub fault_current: Option<f64>,
}

pub fn run(args: PublishArgs) -> io::Result<()> {
    let mut svcb = SampledValueControlBlock::new(args.svid.clone());
    svcb.app_id = args.appid;
    svcb.vlan_id = args.vlan;
    svcb.smp_rate = args.rate;

    if let Err(e) = svcb.validate() {
        error!("invalid control block: {}", e);
        return Err(io::Error::new(io::ErrorKind::InvalidInput, e.to_string()));
    }

    let publisher = SvPublisher::new(&args.interface)?;
    info!(
        "publishing {} at {} Hz for {:.1}s (APPID {:#06X})",
        svcb.name, svcb.smp_rate, args.duration, svcb.app_id
    );

    let frequency = svcb.signal_frequency.hertz();
    let sample_interval = Duration::from_secs_f64(1.0 / svcb.smp_rate as f64);
    let fault_after = args.duration / 2.0;
    let mut rng = rand::thread_rng();

    let started = Instant::now();
    let mut emitted: u64 = 0;
    let mut fault_logged = false;

    while started.elapsed().as_secs_f64() < args.duration {
        let t = started.elapsed().as_secs_f64();

        let mut current_rms = args.current;
        if let Some(fault) = args.fault_current {
            if t >= fault_after {
                if !fault_logged {
                    info!("injecting fault current of {:.0} A at t={:.2}s", fault, t);
                    fault_logged = true;
                }
                current_rms = fault;
            }
        }

        let values = sample_set(&svcb, t, frequency, current_rms, args.voltage, &mut rng);
        publisher.update_sampled_value(&svcb, &values)?;
        emitted += 1;

        // Pace against the ideal schedule, not the previous iteration.
        let next_due = sample_interval * emitted as u32;
        if let Some(wait) = next_due.checked_sub(started.elapsed()) {
            std::thread::sleep(wait);
        }
    }

    info!("done: {} frames emitted", emitted);
    Ok(())
}

/// Builds one dataset: phase currents A, B, C plus a small residual,
/// then the four matching voltages, all scaled to integer counts.
fn sample_set(
    svcb: &SampledValueControlBlock,
    t: f64,
    frequency: f64,
    current_rms: f64,
    voltage_rms: f64,
    rng: &mut impl Rng,
) -> Vec<AnalogValue> {
    let omega = 2.0 * PI * frequency;
    let phase_shift = 2.0 * PI / 3.0;
    let current_peak = current_rms * 2f64.sqrt();
    let voltage_peak = voltage_rms * 2f64.sqrt();

    let mut values = Vec::with_capacity(8);
    for phase in 0..3 {
        let angle = omega * t - phase as f64 * phase_shift;
        let noise = rng.gen_range(-0.002..0.002);
        let amperes = current_peak * angle.sin() * (1.0 + noise);
        values.push(AnalogValue::int32(
            (amperes * svcb.current_scaling as f64) as i32,
        ));
    }
    // Residual current: what the three phases leave unbalanced.
    let residual: f64 = -values.iter().map(AnalogValue::as_float).sum::<f64>();
    values.push(AnalogValue::int32(residual as i32));

    for phase in 0..3 {
        let angle = omega * t - phase as f64 * phase_shift;
        let noise = rng.gen_range(-0.002..0.002);
        let volts = voltage_peak * angle.sin() * (1.0 + noise);
        values.push(AnalogValue::int32(
            (volts * svcb.voltage_scaling as f64) as i32,
        ));
    }
    values.push(AnalogValue::int32(0));

    values
}
