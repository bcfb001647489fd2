//! Circuit breaker model with timed transitions and overcurrent trip.

use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Wake interval of the simulation thread; transitions complete within
/// one tick of their configured duration.
const SIMULATION_TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    Open,
    Closed,
    Opening,
    Closing,
    LockedOpen,
    LockedClosed,
}

impl BreakerState {
    const fn as_u8(self) -> u8 {
        match self {
            BreakerState::Open => 0,
            BreakerState::Closed => 1,
            BreakerState::Opening => 2,
            BreakerState::Closing => 3,
            BreakerState::LockedOpen => 4,
            BreakerState::LockedClosed => 5,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => BreakerState::Closed,
            2 => BreakerState::Opening,
            3 => BreakerState::Closing,
            4 => BreakerState::LockedOpen,
            5 => BreakerState::LockedClosed,
            _ => BreakerState::Open,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerState::Open => write!(f, "OPEN"),
            BreakerState::Closed => write!(f, "CLOSED"),
            BreakerState::Opening => write!(f, "OPENING"),
            BreakerState::Closing => write!(f, "CLOSING"),
            BreakerState::LockedOpen => write!(f, "LOCKED_OPEN"),
            BreakerState::LockedClosed => write!(f, "LOCKED_CLOSED"),
        }
    }
}

/// Physical characteristics and ratings of the modelled breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerDefinition {
    pub open_time: Duration,
    pub close_time: Duration,
    /// Contact resistance when fully closed.
    pub contact_resistance_ohm: f64,
    /// Arc column resistance reached while the contacts separate.
    pub arc_resistance_ohm: f64,
    pub max_current_a: f64,
    pub voltage_rating_v: f64,
    pub power_rating_w: f64,
    /// How long an interrupted arc carries current while decaying.
    pub arc_duration: Duration,
    pub contact_gap_mm: f64,
    pub dielectric_strength_kv_per_mm: f64,
}

impl Default for BreakerDefinition {
    fn default() -> Self {
        BreakerDefinition {
            open_time: Duration::from_millis(50),
            close_time: Duration::from_millis(100),
            contact_resistance_ohm: 0.001,
            arc_resistance_ohm: 50.0,
            max_current_a: 1000.0,
            voltage_rating_v: 400.0,
            power_rating_w: 400_000.0,
            arc_duration: Duration::from_millis(20),
            contact_gap_mm: 10.0,
            dielectric_strength_kv_per_mm: 3.0,
        }
    }
}

impl BreakerDefinition {
    pub fn is_valid(&self) -> bool {
        !self.open_time.is_zero()
            && !self.close_time.is_zero()
            && self.contact_resistance_ohm >= 0.0
            && self.arc_resistance_ohm >= 0.0
            && self.max_current_a > 0.0
            && self.voltage_rating_v > 0.0
            && self.power_rating_w > 0.0
            && self.contact_gap_mm > 0.0
            && self.dielectric_strength_kv_per_mm > 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BreakerError {
    InvalidDefinition,
    InvalidSimulationParameters,
}

impl fmt::Display for BreakerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::InvalidDefinition => write!(f, "invalid breaker definition"),
            BreakerError::InvalidSimulationParameters => {
                write!(f, "invalid simulation parameters")
            }
        }
    }
}

impl std::error::Error for BreakerError {}

/// Time series produced by [`Breaker::run_simulation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationResult {
    pub time_points: Vec<f64>,
    pub current_values: Vec<f64>,
    pub state_history: Vec<BreakerState>,
    pub trip_occurred: bool,
    pub trip_time: f64,
    pub summary: String,
}

pub type StateChangeCallback = Box<dyn Fn(BreakerState, BreakerState) + Send>;

#[derive(Debug, Clone, Copy)]
struct Transition {
    started: Instant,
    duration: Duration,
    target: BreakerState,
}

struct BreakerShared {
    state: AtomicU8,
    locked: AtomicBool,
    /// Amperes as f64 bits so readers never see a torn value.
    current_bits: AtomicU64,
    transition: Mutex<Option<Transition>>,
    definition: Mutex<BreakerDefinition>,
    callback: Mutex<Option<StateChangeCallback>>,
    running: AtomicBool,
}

impl BreakerShared {
    fn state(&self) -> BreakerState {
        BreakerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn current(&self) -> f64 {
        f64::from_bits(self.current_bits.load(Ordering::Acquire))
    }

    fn store_current(&self, amperes: f64) {
        self.current_bits.store(amperes.to_bits(), Ordering::Release);
    }

    fn definition(&self) -> BreakerDefinition {
        match self.definition.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Swaps the state and notifies under the callback lock only. The
    /// settings lock is never held here.
    fn transition_to(&self, new_state: BreakerState) {
        let old_state = BreakerState::from_u8(
            self.state.swap(new_state.as_u8(), Ordering::AcqRel),
        );
        if old_state == new_state {
            return;
        }
        if let Ok(guard) = self.callback.lock() {
            if let Some(callback) = guard.as_ref() {
                callback(old_state, new_state);
            }
        }
    }

    fn trip(&self) {
        self.locked.store(false, Ordering::Release);
        if let Ok(mut transition) = self.transition.lock() {
            *transition = None;
        }
        self.transition_to(BreakerState::Open);
        self.store_current(0.0);
    }

    /// One simulation tick: finish due transitions, decay arc current.
    fn advance(&self) {
        let state = self.state();
        let definition = self.definition();

        if state == BreakerState::Opening || state == BreakerState::Closing {
            let due = match self.transition.lock() {
                Ok(mut transition) => match *transition {
                    Some(t) if t.started.elapsed() >= t.duration => {
                        *transition = None;
                        Some(t.target)
                    }
                    _ => None,
                },
                Err(_) => None,
            };

            if let Some(target) = due {
                self.transition_to(target);
                if target == BreakerState::Open {
                    self.store_current(0.0);
                }
            }
        }

        // While the contacts separate the arc keeps conducting; the
        // current decays over the configured arc duration.
        if self.state() == BreakerState::Opening {
            let current = self.current();
            if current > 0.0 {
                let decay_per_sec = current / definition.arc_duration.as_secs_f64();
                let next = (current - decay_per_sec * SIMULATION_TICK.as_secs_f64()).max(0.0);
                self.store_current(next);
            }
        }
    }
}

/// The breaker model. A background thread started at construction wakes
/// every 10 ms to advance pending transitions; `stop_simulation` (also
/// run on drop) terminates and joins it.
pub struct Breaker {
    shared: Arc<BreakerShared>,
    simulation_thread: Option<JoinHandle<()>>,
}

impl Breaker {
    pub fn new(definition: BreakerDefinition) -> Result<Self, BreakerError> {
        if !definition.is_valid() {
            return Err(BreakerError::InvalidDefinition);
        }

        let shared = Arc::new(BreakerShared {
            state: AtomicU8::new(BreakerState::Open.as_u8()),
            locked: AtomicBool::new(false),
            current_bits: AtomicU64::new(0f64.to_bits()),
            transition: Mutex::new(None),
            definition: Mutex::new(definition),
            callback: Mutex::new(None),
            running: AtomicBool::new(true),
        });

        let worker = Arc::clone(&shared);
        let simulation_thread = thread::spawn(move || {
            while worker.running.load(Ordering::Acquire) {
                worker.advance();
                thread::sleep(SIMULATION_TICK);
            }
        });

        Ok(Breaker {
            shared,
            simulation_thread: Some(simulation_thread),
        })
    }

    pub fn state(&self) -> BreakerState {
        self.shared.state()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state(), BreakerState::Open | BreakerState::LockedOpen)
    }

    pub fn is_closed(&self) -> bool {
        matches!(
            self.state(),
            BreakerState::Closed | BreakerState::LockedClosed
        )
    }

    pub fn is_opening(&self) -> bool {
        self.state() == BreakerState::Opening
    }

    pub fn is_closing(&self) -> bool {
        self.state() == BreakerState::Closing
    }

    pub fn is_in_transition(&self) -> bool {
        matches!(self.state(), BreakerState::Opening | BreakerState::Closing)
    }

    pub fn is_locked(&self) -> bool {
        self.shared.locked.load(Ordering::Acquire)
    }

    /// Starts opening. Rejected while locked, already open, or already
    /// opening.
    pub fn open(&self) -> bool {
        if self.is_locked() {
            return false;
        }
        let state = self.state();
        if state == BreakerState::Open || state == BreakerState::Opening {
            return false;
        }

        self.begin_transition(BreakerState::Opening, BreakerState::Open, |d| d.open_time)
    }

    /// Starts closing. Rejected while locked, already closed, or already
    /// closing.
    pub fn close(&self) -> bool {
        if self.is_locked() {
            return false;
        }
        let state = self.state();
        if state == BreakerState::Closed || state == BreakerState::Closing {
            return false;
        }

        self.begin_transition(BreakerState::Closing, BreakerState::Closed, |d| d.close_time)
    }

    fn begin_transition(
        &self,
        via: BreakerState,
        target: BreakerState,
        duration_of: fn(&BreakerDefinition) -> Duration,
    ) -> bool {
        let duration = duration_of(&self.shared.definition());
        if let Ok(mut transition) = self.shared.transition.lock() {
            *transition = Some(Transition {
                started: Instant::now(),
                duration,
                target,
            });
        }
        self.shared.transition_to(via);
        true
    }

    /// Locks the breaker in its present position.
    pub fn lock(&self) {
        self.shared.locked.store(true, Ordering::Release);
        match self.state() {
            BreakerState::Open => self.shared.transition_to(BreakerState::LockedOpen),
            BreakerState::Closed => self.shared.transition_to(BreakerState::LockedClosed),
            _ => {}
        }
    }

    pub fn unlock(&self) {
        self.shared.locked.store(false, Ordering::Release);
        match self.state() {
            BreakerState::LockedOpen => self.shared.transition_to(BreakerState::Open),
            BreakerState::LockedClosed => self.shared.transition_to(BreakerState::Closed),
            _ => {}
        }
    }

    /// Unconditional, immediate move to OPEN: clears any lock and pending
    /// transition and zeroes the measured current.
    pub fn trip(&self) {
        self.shared.trip();
    }

    pub fn current(&self) -> f64 {
        self.shared.current()
    }

    /// Stores the measured current; a value beyond the rated maximum
    /// trips the breaker on the spot.
    pub fn set_current(&self, amperes: f64) {
        self.shared.store_current(amperes);
        if amperes.abs() > self.shared.definition().max_current_a {
            self.shared.trip();
        }
    }

    pub fn is_overloaded(&self) -> bool {
        self.current().abs() > self.shared.definition().max_current_a
    }

    /// Contact resistance: nominal when closed, infinite when open, and
    /// during a transition interpolated between contact and arc
    /// resistance by the transition progress.
    pub fn resistance(&self) -> f64 {
        let definition = self.shared.definition();
        match self.state() {
            BreakerState::Closed | BreakerState::LockedClosed => definition.contact_resistance_ohm,
            BreakerState::Opening | BreakerState::Closing => {
                let progress = match self.shared.transition.lock() {
                    Ok(transition) => transition
                        .map(|t| {
                            (t.started.elapsed().as_secs_f64() / t.duration.as_secs_f64())
                                .clamp(0.0, 1.0)
                        })
                        .unwrap_or(1.0),
                    Err(_) => 1.0,
                };
                let (from, to) = if self.state() == BreakerState::Opening {
                    (definition.contact_resistance_ohm, definition.arc_resistance_ohm)
                } else {
                    (definition.arc_resistance_ohm, definition.contact_resistance_ohm)
                };
                from + (to - from) * progress
            }
            BreakerState::Open | BreakerState::LockedOpen => f64::INFINITY,
        }
    }

    pub fn definition(&self) -> BreakerDefinition {
        self.shared.definition()
    }

    pub fn set_definition(&self, definition: BreakerDefinition) -> Result<(), BreakerError> {
        if !definition.is_valid() {
            return Err(BreakerError::InvalidDefinition);
        }
        if let Ok(mut guard) = self.shared.definition.lock() {
            *guard = definition;
        }
        Ok(())
    }

    /// Registers the state-change callback. Invoked under its own lock,
    /// never while the definition lock is held.
    pub fn on_state_change<F>(&self, callback: F)
    where
        F: Fn(BreakerState, BreakerState) + Send + 'static,
    {
        if let Ok(mut guard) = self.shared.callback.lock() {
            *guard = Some(Box::new(callback));
        }
    }

    /// Stops and joins the simulation thread. Idempotent; also run on
    /// drop.
    pub fn stop_simulation(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.simulation_thread.take() {
            let _ = handle.join();
        }
    }

    /// Drives a closed breaker through a fault scenario in real time,
    /// sampling current and state at each step.
    pub fn run_simulation(
        &self,
        voltage_v: f64,
        nominal_current_a: f64,
        fault_current_a: f64,
        fault_time_s: f64,
        duration_s: f64,
        time_step_s: f64,
    ) -> Result<SimulationResult, BreakerError> {
        if voltage_v <= 0.0 || nominal_current_a < 0.0 || duration_s <= 0.0 || time_step_s <= 0.0 {
            return Err(BreakerError::InvalidSimulationParameters);
        }

        let mut result = SimulationResult::default();

        self.close();
        thread::sleep(self.shared.definition().close_time + SIMULATION_TICK * 5);

        let mut elapsed = 0.0;
        let mut fault_injected = false;

        while elapsed < duration_s {
            let mut current = nominal_current_a;
            if elapsed >= fault_time_s {
                if !fault_injected {
                    fault_injected = true;
                    info!("fault injected at t={:.3}s, current={}A", elapsed, fault_current_a);
                }
                current = fault_current_a;
            }

            if self.is_closed() {
                self.set_current(current);
            } else {
                self.set_current(0.0);
            }

            result.time_points.push(elapsed);
            result.current_values.push(self.current());
            result.state_history.push(self.state());

            if !result.trip_occurred && self.is_open() && elapsed > 0.0 {
                result.trip_occurred = true;
                result.trip_time = elapsed;
                info!("breaker tripped at t={:.3}s", elapsed);
            }

            thread::sleep(Duration::from_secs_f64(time_step_s));
            elapsed += time_step_s;
        }

        result.summary = if result.trip_occurred {
            format!("breaker tripped at t={:.3}s", result.trip_time)
        } else {
            "breaker did not trip".to_string()
        };
        Ok(result)
    }
}

impl Drop for Breaker {
    fn drop(&mut self) {
        self.stop_simulation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_open() {
        let breaker = Breaker::new(BreakerDefinition::default()).unwrap();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.is_open());
        assert!(!breaker.is_closed());
        assert_eq!(breaker.current(), 0.0);
    }

    #[test]
    fn test_invalid_definition_rejected() {
        let mut definition = BreakerDefinition::default();
        definition.max_current_a = -100.0;
        assert_eq!(
            Breaker::new(definition).err(),
            Some(BreakerError::InvalidDefinition)
        );

        let mut definition = BreakerDefinition::default();
        definition.open_time = Duration::ZERO;
        assert!(Breaker::new(definition).is_err());

        let mut definition = BreakerDefinition::default();
        definition.contact_gap_mm = 0.0;
        assert!(Breaker::new(definition).is_err());

        let mut definition = BreakerDefinition::default();
        definition.dielectric_strength_kv_per_mm = 0.0;
        assert!(Breaker::new(definition).is_err());
    }

    #[test]
    fn test_open_rejected_when_already_open() {
        let breaker = Breaker::new(BreakerDefinition::default()).unwrap();
        assert!(!breaker.open());
    }

    #[test]
    fn test_resistance_interpolates_during_opening() {
        let mut definition = BreakerDefinition::default();
        definition.open_time = Duration::from_millis(200);
        definition.close_time = Duration::from_millis(20);
        let breaker = Breaker::new(definition.clone()).unwrap();

        breaker.close();
        thread::sleep(Duration::from_millis(80));
        assert_eq!(breaker.resistance(), definition.contact_resistance_ohm);

        assert!(breaker.open());
        thread::sleep(Duration::from_millis(50));
        let mid = breaker.resistance();
        assert!(mid > definition.contact_resistance_ohm);
        assert!(mid < definition.arc_resistance_ohm);

        thread::sleep(Duration::from_millis(250));
        assert!(breaker.resistance().is_infinite());
    }
}
