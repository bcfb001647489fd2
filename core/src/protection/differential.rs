//! Differential protection: biased slope plus instantaneous element.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use super::phasor::Phasor;
use super::SettingsError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifferentialProtectionSettings {
    pub slope_percent: f64,
    pub min_operating_current_a: f64,
    pub min_restraint_current_a: f64,
    pub instantaneous_threshold_a: f64,
}

impl Default for DifferentialProtectionSettings {
    fn default() -> Self {
        DifferentialProtectionSettings {
            slope_percent: 25.0,
            min_operating_current_a: 0.3,
            min_restraint_current_a: 1.0,
            instantaneous_threshold_a: 10.0,
        }
    }
}

impl DifferentialProtectionSettings {
    pub fn is_valid(&self) -> bool {
        self.slope_percent > 0.0
            && self.slope_percent <= 100.0
            && self.min_operating_current_a > 0.0
            && self.min_restraint_current_a > 0.0
            && self.instantaneous_threshold_a > 0.0
    }
}

/// Outcome of one current-pair update.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferentialResult {
    pub trip: bool,
    pub operating_current_a: f64,
    pub restraint_current_a: f64,
    pub instantaneous: bool,
    pub trip_time: Option<Instant>,
}

pub type DifferentialTripCallback = Box<dyn Fn(&DifferentialResult) + Send>;

/// Biased differential engine comparing the currents entering and leaving
/// the protected object.
pub struct DifferentialProtection {
    settings: Mutex<DifferentialProtectionSettings>,
    enabled: AtomicBool,
    callback: Mutex<Option<DifferentialTripCallback>>,
}

impl DifferentialProtection {
    pub fn new(settings: DifferentialProtectionSettings) -> Result<Self, SettingsError> {
        if !settings.is_valid() {
            return Err(SettingsError::InvalidDifferentialSettings);
        }
        Ok(DifferentialProtection {
            settings: Mutex::new(settings),
            enabled: AtomicBool::new(true),
            callback: Mutex::new(None),
        })
    }

    /// Feeds one pair of side currents through the characteristic. The
    /// instantaneous element is evaluated before the bias characteristic.
    pub fn update(&self, current1: Phasor, current2: Phasor) -> DifferentialResult {
        let mut result = DifferentialResult::default();

        if !self.enabled.load(Ordering::Acquire) {
            return result;
        }

        let settings = match self.settings.lock() {
            Ok(guard) => *guard,
            Err(_) => return result,
        };

        result.operating_current_a = (current1 - current2).magnitude();
        result.restraint_current_a = ((current1 + current2) * 0.5).magnitude();

        if result.operating_current_a >= settings.instantaneous_threshold_a {
            result.trip = true;
            result.instantaneous = true;
            result.trip_time = Some(Instant::now());
            self.invoke_callback(&result);
            return result;
        }

        if characteristic_operates(
            &settings,
            result.operating_current_a,
            result.restraint_current_a,
        ) {
            result.trip = true;
            result.trip_time = Some(Instant::now());
            self.invoke_callback(&result);
        }

        result
    }

    pub fn set_settings(
        &self,
        settings: DifferentialProtectionSettings,
    ) -> Result<(), SettingsError> {
        if !settings.is_valid() {
            return Err(SettingsError::InvalidDifferentialSettings);
        }
        if let Ok(mut guard) = self.settings.lock() {
            *guard = settings;
        }
        Ok(())
    }

    pub fn settings(&self) -> DifferentialProtectionSettings {
        match self.settings.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn on_trip<F>(&self, callback: F)
    where
        F: Fn(&DifferentialResult) + Send + 'static,
    {
        if let Ok(mut guard) = self.callback.lock() {
            *guard = Some(Box::new(callback));
        }
    }

    fn invoke_callback(&self, result: &DifferentialResult) {
        if let Ok(guard) = self.callback.lock() {
            if let Some(callback) = guard.as_ref() {
                callback(result);
            }
        }
    }
}

/// Bias characteristic: operating current must clear the minimum floor,
/// and above the restraint floor it must climb the slope line.
fn characteristic_operates(
    settings: &DifferentialProtectionSettings,
    operating: f64,
    restraint: f64,
) -> bool {
    if operating < settings.min_operating_current_a {
        return false;
    }
    if restraint < settings.min_restraint_current_a {
        return true;
    }
    operating >= restraint * (settings.slope_percent / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn default_engine() -> DifferentialProtection {
        DifferentialProtection::new(DifferentialProtectionSettings::default()).unwrap()
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mutations: [fn(&mut DifferentialProtectionSettings); 5] = [
            |s| s.slope_percent = 0.0,
            |s| s.slope_percent = 101.0,
            |s| s.min_operating_current_a = 0.0,
            |s| s.min_restraint_current_a = -1.0,
            |s| s.instantaneous_threshold_a = 0.0,
        ];
        for mutate in mutations {
            let mut settings = DifferentialProtectionSettings::default();
            mutate(&mut settings);
            assert!(DifferentialProtection::new(settings).is_err());
        }
    }

    #[test]
    fn test_instantaneous_element() {
        let engine = default_engine();
        let result = engine.update(Phasor::new(15.0, 0.0), Phasor::new(0.0, 0.0));

        assert!(result.trip);
        assert!(result.instantaneous);
        assert_eq!(result.operating_current_a, 15.0);
        assert_eq!(result.restraint_current_a, 7.5);
        assert!(result.trip_time.is_some());
    }

    #[test]
    fn test_balanced_through_current_restrains() {
        let engine = default_engine();
        // Same current in and out: nothing operates.
        let result = engine.update(Phasor::new(100.0, 0.0), Phasor::new(100.0, 0.0));
        assert!(!result.trip);
        assert_eq!(result.operating_current_a, 0.0);
        assert_eq!(result.restraint_current_a, 100.0);
    }

    #[test]
    fn test_below_minimum_operating_floor() {
        let engine = default_engine();
        let result = engine.update(Phasor::new(5.1, 0.0), Phasor::new(5.0, 0.0));
        assert!(!result.trip);
        assert!((result.operating_current_a - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_low_restraint_trips_on_operating_floor() {
        let engine = default_engine();
        // Iop = 0.5 above the 0.3 A floor; Irest = 0.25 below the 1 A floor.
        let result = engine.update(Phasor::new(0.5, 0.0), Phasor::new(0.0, 0.0));
        assert!(result.trip);
        assert!(!result.instantaneous);
    }

    #[test]
    fn test_slope_characteristic() {
        let engine = default_engine();
        // Irest = 10, slope 25% => needs Iop >= 2.5. Iop = 2 restrains.
        let result = engine.update(Phasor::new(11.0, 0.0), Phasor::new(9.0, 0.0));
        assert!(!result.trip);

        // Iop = 4 >= 2.45 operates.
        let result = engine.update(Phasor::new(11.8, 0.0), Phasor::new(7.8, 0.0));
        assert!(result.trip);
        assert!(!result.instantaneous);
    }

    #[test]
    fn test_instantaneous_checked_before_bias() {
        // Slope of 100% would restrain this fault; the instantaneous
        // element must win first.
        let mut settings = DifferentialProtectionSettings::default();
        settings.slope_percent = 100.0;
        settings.instantaneous_threshold_a = 10.0;
        let engine = DifferentialProtection::new(settings).unwrap();

        let result = engine.update(Phasor::new(30.0, 0.0), Phasor::new(18.0, 0.0));
        assert!(result.trip);
        assert!(result.instantaneous);
    }

    #[test]
    fn test_phase_opposition_counts_as_operating() {
        let engine = default_engine();
        // Equal magnitude, opposite phase: all of it is operating current.
        let result = engine.update(Phasor::new(6.0, 0.0), Phasor::new(-6.0, 0.0));
        assert!(result.trip);
        assert!(result.instantaneous);
        assert_eq!(result.operating_current_a, 12.0);
        assert_eq!(result.restraint_current_a, 0.0);
    }

    #[test]
    fn test_callback_invoked_on_trip() {
        let engine = default_engine();
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        engine.on_trip(move |result| {
            assert!(result.trip);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        engine.update(Phasor::new(15.0, 0.0), Phasor::new(0.0, 0.0));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        engine.update(Phasor::new(1.0, 0.0), Phasor::new(1.0, 0.0));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disabled_engine_is_inert() {
        let engine = default_engine();
        engine.set_enabled(false);
        let result = engine.update(Phasor::new(50.0, 0.0), Phasor::new(0.0, 0.0));
        assert!(!result.trip);
        assert_eq!(result.operating_current_a, 0.0);
    }

    #[test]
    fn test_invalid_update_keeps_previous_settings() {
        let engine = default_engine();
        let mut bad = DifferentialProtectionSettings::default();
        bad.slope_percent = 200.0;
        assert!(engine.set_settings(bad).is_err());
        assert_eq!(engine.settings(), DifferentialProtectionSettings::default());
    }
}
