// Capture tool: decodes SV frames, feeds phase-A current into the
// differential engine and mirrors the measured current onto a simulated
// breaker, reporting stats at a fixed interval.

use log::{info, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sv_core::iec61850_9_2::common::SvDataType;
use sv_core::iec61850_9_2::svcb::CURRENT_SCALING_DEFAULT;
use sv_core::protection::differential::{DifferentialProtection, DifferentialProtectionSettings};
use sv_core::protection::phasor::Phasor;
use sv_core::sim::breaker::{Breaker, BreakerDefinition};
use sv_core::subscriber::SvSubscriber;

pub struct SubscribeArgs {
    pub interface: String,
    pub duration: f64,
    pub stats_interval: f64,
    pub inst_threshold: f64,
    pub max_current: f64,
}

pub fn run(args: SubscribeArgs) -> io::Result<()> {
    let mut settings = DifferentialProtectionSettings::default();
    settings.instantaneous_threshold_a = args.inst_threshold;
    let protection = Arc::new(
        DifferentialProtection::new(settings)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?,
    );

    protection.on_trip(|result| {
        warn!(
            "differential trip: Iop={:.2}A Irest={:.2}A instantaneous={}",
            result.operating_current_a, result.restraint_current_a, result.instantaneous
        );
    });

    let mut definition = BreakerDefinition::default();
    definition.max_current_a = args.max_current;
    let breaker = Arc::new(
        Breaker::new(definition)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?,
    );
    breaker.on_state_change(|old, new| info!("breaker {} -> {}", old, new));
    breaker.close();

    let mut subscriber = SvSubscriber::new(&args.interface, SvDataType::Int32)?;
    let stats = subscriber.stats();

    let engine = Arc::clone(&protection);
    let actuator = Arc::clone(&breaker);
    subscriber.start_with(move |asdu| {
        let ia = asdu.data_set[0].as_float() / CURRENT_SCALING_DEFAULT as f64;

        // A second measurement point would come from the far end of the
        // protected object; the demo derives one with a small CT error.
        let local = Phasor::new(ia, 0.0);
        let remote = Phasor::new(ia * 0.98, 0.0);
        engine.update(local, remote);

        actuator.set_current(ia.abs());
    })?;

    // Periodic stats, mirroring a long-running capture tool.
    let stop = Arc::new(AtomicBool::new(false));
    let stats_stop = Arc::clone(&stop);
    let stats_handle = {
        let stats = Arc::clone(&stats);
        let interval = args.stats_interval;
        thread::spawn(move || {
            while !stats_stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_secs_f64(interval));
                let delivered = stats.asdus_delivered.swap(0, Ordering::Relaxed);
                info!(
                    "stats ~ ASDUs: {}/s, non-SV frames: {}, decode errors: {}",
                    delivered as f64 / interval,
                    stats.non_sv_frames.load(Ordering::Relaxed),
                    stats.decode_errors.load(Ordering::Relaxed),
                );
            }
        })
    };

    info!("listening for {:.1}s...", args.duration);
    thread::sleep(Duration::from_secs_f64(args.duration));

    subscriber.stop();
    stop.store(true, Ordering::Relaxed);
    let _ = stats_handle.join();

    info!(
        "capture finished: {} SV frames, {} non-SV, {} decode errors, breaker {}",
        stats.sv_frames.load(Ordering::Relaxed),
        stats.non_sv_frames.load(Ordering::Relaxed),
        stats.decode_errors.load(Ordering::Relaxed),
        breaker.state(),
    );
    Ok(())
}
