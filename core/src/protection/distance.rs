//! Distance protection: three time-delayed impedance zones.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::phasor::Phasor;
use super::SettingsError;

/// One impedance zone: a symmetric sector around the positive real axis
/// of the impedance plane, reduced from a full mho circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceZone {
    pub reach_ohm: f64,
    pub angle_rad: f64,
    pub delay: Duration,
    pub enabled: bool,
}

impl DistanceZone {
    pub fn is_valid(&self) -> bool {
        self.reach_ohm > 0.0 && (0.0..=std::f64::consts::PI).contains(&self.angle_rad)
    }
}

impl Default for DistanceZone {
    fn default() -> Self {
        DistanceZone {
            reach_ohm: 10.0,
            angle_rad: 1.047,
            delay: Duration::ZERO,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceProtectionSettings {
    pub zones: [DistanceZone; 3],
    pub voltage_threshold_v: f64,
    pub current_threshold_a: f64,
    /// Forward looks into the positive-resistance half plane.
    pub direction_forward: bool,
}

impl Default for DistanceProtectionSettings {
    fn default() -> Self {
        DistanceProtectionSettings {
            zones: [
                DistanceZone {
                    reach_ohm: 10.0,
                    delay: Duration::ZERO,
                    ..DistanceZone::default()
                },
                DistanceZone {
                    reach_ohm: 20.0,
                    delay: Duration::from_millis(300),
                    ..DistanceZone::default()
                },
                DistanceZone {
                    reach_ohm: 30.0,
                    delay: Duration::from_millis(600),
                    ..DistanceZone::default()
                },
            ],
            voltage_threshold_v: 20.0,
            current_threshold_a: 0.5,
            direction_forward: true,
        }
    }
}

impl DistanceProtectionSettings {
    pub fn is_valid(&self) -> bool {
        self.zones.iter().all(DistanceZone::is_valid)
            && self.voltage_threshold_v > 0.0
            && self.current_threshold_a > 0.0
    }
}

/// Outcome of one measurement update.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceResult {
    pub zone_trips: [bool; 3],
    pub impedance_ohm: f64,
    pub angle_rad: f64,
    pub trip_time: Option<Instant>,
}

impl DistanceResult {
    pub fn tripped(&self) -> bool {
        self.zone_trips.iter().any(|&t| t)
    }
}

pub type DistanceTripCallback = Box<dyn Fn(&DistanceResult) + Send>;

/// Three-zone distance engine. Settings live behind a mutex; per-zone
/// pickup flags are atomic so readers never block an update. The trip
/// callback is held under its own lock and replaced only between
/// invocations.
pub struct DistanceProtection {
    settings: Mutex<DistanceProtectionSettings>,
    enabled: AtomicBool,
    zone_pickup: [AtomicBool; 3],
    zone_tripped: [AtomicBool; 3],
    pickup_since: Mutex<[Option<Instant>; 3]>,
    callback: Mutex<Option<DistanceTripCallback>>,
}

impl DistanceProtection {
    pub fn new(settings: DistanceProtectionSettings) -> Result<Self, SettingsError> {
        if !settings.is_valid() {
            return Err(SettingsError::InvalidDistanceSettings);
        }
        Ok(DistanceProtection {
            settings: Mutex::new(settings),
            enabled: AtomicBool::new(true),
            zone_pickup: [AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false)],
            zone_tripped: [AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false)],
            pickup_since: Mutex::new([None; 3]),
            callback: Mutex::new(None),
        })
    }

    /// Feeds one voltage/current phasor pair through the characteristic.
    pub fn update(&self, voltage: Phasor, current: Phasor) -> DistanceResult {
        let mut result = DistanceResult::default();

        if !self.enabled.load(Ordering::Acquire) {
            return result;
        }

        let settings = match self.settings.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return result,
        };

        if voltage.magnitude() < settings.voltage_threshold_v
            || current.magnitude() < settings.current_threshold_a
        {
            self.reset();
            return result;
        }

        let impedance = voltage / current;
        result.impedance_ohm = impedance.magnitude();
        result.angle_rad = impedance.angle();

        if !direction_matches(&settings, impedance) {
            self.reset();
            return result;
        }

        let now = Instant::now();
        for (index, zone) in settings.zones.iter().enumerate() {
            if zone.enabled && zone_picks_up(zone, result.impedance_ohm, result.angle_rad) {
                let started = self.latch_pickup(index, now);
                if now.duration_since(started) >= zone.delay {
                    result.zone_trips[index] = true;
                    result.trip_time = Some(now);
                    if !self.zone_tripped[index].swap(true, Ordering::AcqRel) {
                        self.invoke_callback(&result);
                    }
                }
            } else {
                self.clear_zone(index);
            }
        }

        result
    }

    /// Clears every pickup timer and trip latch.
    pub fn reset(&self) {
        for index in 0..3 {
            self.clear_zone(index);
        }
    }

    pub fn set_settings(&self, settings: DistanceProtectionSettings) -> Result<(), SettingsError> {
        if !settings.is_valid() {
            return Err(SettingsError::InvalidDistanceSettings);
        }
        if let Ok(mut guard) = self.settings.lock() {
            *guard = settings;
        }
        Ok(())
    }

    pub fn settings(&self) -> DistanceProtectionSettings {
        match self.settings.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.reset();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn zone_picked_up(&self, index: usize) -> bool {
        self.zone_pickup[index].load(Ordering::Acquire)
    }

    pub fn on_trip<F>(&self, callback: F)
    where
        F: Fn(&DistanceResult) + Send + 'static,
    {
        if let Ok(mut guard) = self.callback.lock() {
            *guard = Some(Box::new(callback));
        }
    }

    /// Marks the zone picked up and returns when the pickup began.
    fn latch_pickup(&self, index: usize, now: Instant) -> Instant {
        let mut since = match self.pickup_since.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !self.zone_pickup[index].swap(true, Ordering::AcqRel) {
            since[index] = Some(now);
        }
        since[index].unwrap_or(now)
    }

    fn clear_zone(&self, index: usize) {
        self.zone_pickup[index].store(false, Ordering::Release);
        self.zone_tripped[index].store(false, Ordering::Release);
        if let Ok(mut since) = self.pickup_since.lock() {
            since[index] = None;
        }
    }

    fn invoke_callback(&self, result: &DistanceResult) {
        if let Ok(guard) = self.callback.lock() {
            if let Some(callback) = guard.as_ref() {
                callback(result);
            }
        }
    }
}

fn direction_matches(settings: &DistanceProtectionSettings, impedance: Phasor) -> bool {
    if settings.direction_forward {
        impedance.re > 0.0
    } else {
        impedance.re < 0.0
    }
}

/// The sector check: inside the reach circle and within the symmetric
/// angular window around the positive real axis.
fn zone_picks_up(zone: &DistanceZone, impedance_ohm: f64, angle_rad: f64) -> bool {
    if impedance_ohm > zone.reach_ohm {
        return false;
    }
    let tau = 2.0 * std::f64::consts::PI;
    let normalized = angle_rad.abs() % tau;
    normalized <= zone.angle_rad || normalized >= tau - zone.angle_rad
}
