//! Integer PID controller for targets where float math is unavailable or
//! non-deterministic.
//!
//! - Gains are fixed point (`I48F16`), everything else is `i64`
//! - Caller supplies the elapsed [`Duration`] to `update_duration`, or uses a
//!   [`Clock`] to have it measured
//! - Output clamped to configured limits (default: full `i64` range)
//! - Integral anti-windup via integral clamping
//! - Derivative on measurement
//!
//! Example
//! ```
//! use core::time::Duration;
//! use fixedpoint_pid::IntegerPidController;
//!
//! let mut pid = IntegerPidController::new(1.0, 0.0, 0.0)
//!     .with_output_limits(-50, 50)
//!     .unwrap();
//!
//! pid.set_setpoint(100);
//! assert_eq!(pid.update_duration(90, Duration::from_secs(1)), 10);
//! assert_eq!(pid.update_duration(0, Duration::from_secs(1)), 50);
//! ```

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::PidConfig;
use crate::error::MinMaxError;
use crate::log::{debug, trace, warn};
use crate::scale::{duration_to_dt, gain_from_f64, gain_to_f64, scale_limit, Gain, SCALE};

/// How the derivative term treats the very first update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DerivativeStart {
    /// The previous measurement starts at 0, so a first measurement far from
    /// zero produces a derivative kick.
    #[default]
    ZeroBaseline,
    /// The first measurement seeds the previous measurement; the first
    /// derivative term is zero.
    FirstMeasurement,
}

/// Integer overflow behaviour of the update arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Overflow {
    /// Two's-complement wrap-around.
    #[default]
    Wrapping,
    /// Clamp every intermediate result to the `i64` range.
    Saturating,
}

impl Overflow {
    #[inline]
    fn add(self, a: i64, b: i64) -> i64 {
        match self {
            Overflow::Wrapping => a.wrapping_add(b),
            Overflow::Saturating => a.saturating_add(b),
        }
    }

    #[inline]
    fn sub(self, a: i64, b: i64) -> i64 {
        match self {
            Overflow::Wrapping => a.wrapping_sub(b),
            Overflow::Saturating => a.saturating_sub(b),
        }
    }

    #[inline]
    fn mul(self, a: i64, b: i64) -> i64 {
        match self {
            Overflow::Wrapping => a.wrapping_mul(b),
            Overflow::Saturating => a.saturating_mul(b),
        }
    }

    // Divisor is always SCALE or a positive dt.
    #[inline]
    fn div(self, a: i64, b: i64) -> i64 {
        match self {
            Overflow::Wrapping => a.wrapping_div(b),
            Overflow::Saturating => a.saturating_div(b),
        }
    }

    #[inline]
    fn neg(self, a: i64) -> i64 {
        match self {
            Overflow::Wrapping => a.wrapping_neg(),
            Overflow::Saturating => a.saturating_neg(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntegerPidController {
    // Gains
    p: Gain,
    i: Gain,
    d: Gain,

    // Setpoint
    setpoint: i64,

    // Output limits, scaled
    out_min: i64,
    out_max: i64,

    // State
    prev_value: i64,
    integral: i64,
    last_update: Option<Duration>,
    primed: bool,

    derivative_start: DerivativeStart,
    overflow: Overflow,
}

impl IntegerPidController {
    /// Create a new controller with the given gains.
    /// Defaults: setpoint=0, output limits spanning the full `i64` range.
    pub fn new(p: f64, i: f64, d: f64) -> Self {
        Self::new_fixed(gain_from_f64(p), gain_from_f64(i), gain_from_f64(d))
    }

    /// Same as [`new`](Self::new) with gains already in fixed point.
    pub fn new_fixed(p: Gain, i: Gain, d: Gain) -> Self {
        Self {
            p,
            i,
            d,
            setpoint: 0,
            out_min: i64::MIN,
            out_max: i64::MAX,
            prev_value: 0,
            integral: 0,
            last_update: None,
            primed: false,
            derivative_start: DerivativeStart::ZeroBaseline,
            overflow: Overflow::Wrapping,
        }
    }

    /// Builder: set output limits.
    pub fn with_output_limits(mut self, min: i64, max: i64) -> Result<Self, MinMaxError> {
        self.set_output_limits(min, max)?;
        Ok(self)
    }

    /// Change the P, I and D gains. Values are truncated toward zero to the
    /// nearest multiple of 1/65536; negative gains invert the control sense.
    pub fn set_pid(&mut self, p: f64, i: f64, d: f64) -> &mut Self {
        self.set_pid_fixed(gain_from_f64(p), gain_from_f64(i), gain_from_f64(d))
    }

    pub fn set_pid_fixed(&mut self, p: Gain, i: Gain, d: Gain) -> &mut Self {
        self.p = p;
        self.i = i;
        self.d = d;
        debug!(
            "pid gains set: p={} i={} d={} (raw)",
            p.to_bits(),
            i.to_bits(),
            d.to_bits()
        );
        self
    }

    /// Current gains as reals.
    pub fn pid(&self) -> (f64, f64, f64) {
        (gain_to_f64(self.p), gain_to_f64(self.i), gain_to_f64(self.d))
    }

    /// Current gains in fixed point.
    pub fn gains(&self) -> (Gain, Gain, Gain) {
        (self.p, self.i, self.d)
    }

    pub fn set_setpoint(&mut self, setpoint: i64) -> &mut Self {
        self.setpoint = setpoint;
        self
    }

    pub fn setpoint(&self) -> i64 {
        self.setpoint
    }

    /// Set output limits and clamp the integral term into them.
    ///
    /// Fails without touching the controller when `min > max`.
    pub fn set_output_limits(&mut self, min: i64, max: i64) -> Result<&mut Self, MinMaxError> {
        if min > max {
            warn!("rejected output limits: min {} > max {}", min, max);
            return Err(MinMaxError { min, max });
        }
        self.out_min = scale_limit(min);
        self.out_max = scale_limit(max);
        self.integral = clamp(self.integral, self.out_min, self.out_max);
        debug!("pid output limits set: [{}, {}]", min, max);
        Ok(self)
    }

    /// Output limits in caller units.
    pub fn output_limits(&self) -> (i64, i64) {
        (self.out_min / SCALE, self.out_max / SCALE)
    }

    pub fn set_derivative_start(&mut self, mode: DerivativeStart) -> &mut Self {
        self.derivative_start = mode;
        self
    }

    pub fn derivative_start(&self) -> DerivativeStart {
        self.derivative_start
    }

    pub fn set_overflow(&mut self, overflow: Overflow) -> &mut Self {
        self.overflow = overflow;
        self
    }

    pub fn overflow(&self) -> Overflow {
        self.overflow
    }

    /// Integral term in caller units.
    pub fn integral(&self) -> i64 {
        self.integral / SCALE
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> PidConfig {
        let (kp, ki, kd) = self.pid();
        PidConfig {
            kp,
            ki,
            kd,
            setpoint: self.setpoint,
            output_min: (self.out_min != i64::MIN).then(|| self.out_min / SCALE),
            output_max: (self.out_max != i64::MAX).then(|| self.out_max / SCALE),
            derivative_start: self.derivative_start,
            overflow: self.overflow,
        }
    }

    /// Reset internal state (integral, previous measurement, last update).
    pub fn reset(&mut self) {
        self.integral = 0;
        self.prev_value = 0;
        self.last_update = None;
        self.primed = false;
    }

    /// Same as [`update_with_clock`](Self::update_with_clock) using the host
    /// monotonic clock.
    #[cfg(feature = "std")]
    #[must_use = "A PID controller does nothing if the output is not applied"]
    pub fn update(&mut self, value: i64) -> i64 {
        self.update_with_clock(value, &crate::clock::StdClock)
    }

    /// Update using the time elapsed on `clock` since the previous call.
    /// The first call sees a zero duration.
    #[must_use = "A PID controller does nothing if the output is not applied"]
    pub fn update_with_clock<C: Clock>(&mut self, value: i64, clock: &C) -> i64 {
        let now = clock.now();
        let elapsed = match self.last_update {
            Some(last) => clock.elapsed_since(last, now),
            None => Duration::ZERO,
        };
        self.last_update = Some(now);
        self.update_duration(value, elapsed)
    }

    /// Run one PID step.
    /// - `value`: current process value.
    /// - `duration`: time since the previous step.
    /// Returns the clamped control output.
    #[must_use = "A PID controller does nothing if the output is not applied"]
    pub fn update_duration(&mut self, value: i64, duration: Duration) -> i64 {
        let ov = self.overflow;
        let dt = duration_to_dt(duration);
        let err = ov.sub(self.setpoint, value);

        // Multiply before divide; small dt may truncate the step to zero
        let step = ov.mul(ov.div(ov.mul(err, dt), SCALE), self.i.to_bits());
        self.accumulate(step);

        let prev = self.baseline(value);
        let d = if dt > 0 {
            ov.neg(ov.div(ov.mul(ov.sub(value, prev), SCALE), dt))
        } else {
            0
        };
        self.prev_value = value;

        let output = self.output(err, d);
        trace!(
            "pid update: value={} dt={} err={} integral={} d={} output={}",
            value,
            dt,
            err,
            self.integral,
            d,
            output
        );
        output
    }

    /// Run one PID step assuming exactly one second elapsed since the last.
    ///
    /// Gives the same output sequence as `update_duration` with a one second
    /// duration, without the `dt` multiply and divide.
    #[must_use = "A PID controller does nothing if the output is not applied"]
    pub fn update_const_interval(&mut self, value: i64) -> i64 {
        let ov = self.overflow;
        let err = ov.sub(self.setpoint, value);

        self.accumulate(ov.mul(err, self.i.to_bits()));

        let prev = self.baseline(value);
        let d = ov.neg(ov.sub(value, prev));
        self.prev_value = value;

        let output = self.output(err, d);
        trace!(
            "pid update (const): value={} err={} integral={} d={} output={}",
            value,
            err,
            self.integral,
            d,
            output
        );
        output
    }

    fn accumulate(&mut self, step: i64) {
        let integral = self.overflow.add(self.integral, step);
        self.integral = clamp(integral, self.out_min, self.out_max);
    }

    /// Previous measurement for the derivative term.
    fn baseline(&mut self, value: i64) -> i64 {
        if !self.primed {
            self.primed = true;
            if self.derivative_start == DerivativeStart::FirstMeasurement {
                self.prev_value = value;
            }
        }
        self.prev_value
    }

    /// Sum the terms, clamp, and descale.
    fn output(&self, err: i64, d: i64) -> i64 {
        let ov = self.overflow;
        let output = ov.add(
            ov.add(ov.mul(self.p.to_bits(), err), self.integral),
            ov.mul(self.d.to_bits(), d),
        );
        clamp(output, self.out_min, self.out_max) / SCALE
    }
}

#[inline]
fn clamp(x: i64, min: i64, max: i64) -> i64 {
    if x > max {
        max
    } else if x < min {
        min
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use fixed_macro::fixed;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_proportional_only() {
        let mut pid = IntegerPidController::new(1.0, 0.0, 0.0);
        pid.set_setpoint(100);
        assert_eq!(pid.update_duration(90, SECOND), 10);
    }

    #[test]
    fn test_output_limiting() {
        let mut pid = IntegerPidController::new(2.0, 0.0, 0.0)
            .with_output_limits(-10, 10)
            .unwrap();
        pid.set_setpoint(100);
        assert_eq!(pid.update_duration(0, SECOND), 10);
        assert_eq!(pid.update_duration(200, SECOND), -10);
    }

    #[test]
    fn test_integral_accumulation() {
        let mut pid = IntegerPidController::new(0.0, 1.0, 0.0);
        pid.set_setpoint(10);
        // err = 10, dt = 0.5 s -> integral grows by 5 per step
        let half = Duration::from_millis(500);
        assert_eq!(pid.update_duration(0, half), 5);
        assert_eq!(pid.integral(), 5);
        assert_eq!(pid.update_duration(0, half), 10);
        assert_eq!(pid.integral(), 10);
    }

    #[test]
    fn test_integral_truncates_small_steps() {
        let mut pid = IntegerPidController::new(0.0, 1.0, 0.0);
        pid.set_setpoint(1);
        // err * dt = 1 * 655 < SCALE, so the step is lost
        for _ in 0..100 {
            let _ = pid.update_duration(0, Duration::from_millis(10));
        }
        assert_eq!(pid.integral(), 0);
    }

    #[test]
    fn test_derivative_on_measurement() {
        let mut pid = IntegerPidController::new(0.0, 0.0, 1.0);
        let _ = pid.update_duration(0, SECOND);
        // measurement rose by 20 over 2 s -> d = -10
        assert_eq!(pid.update_duration(20, Duration::from_secs(2)), -10);
    }

    #[test]
    fn test_zero_duration_suppresses_derivative_but_tracks_value() {
        let mut pid = IntegerPidController::new(0.0, 0.0, 1.0);
        assert_eq!(pid.update_duration(50, Duration::ZERO), 0);
        // previous measurement is now 50
        assert_eq!(pid.update_duration(60, SECOND), -10);
    }

    #[test]
    fn test_first_derivative_uses_zero_baseline() {
        let mut pid = IntegerPidController::new(0.0, 0.0, 1.0);
        assert_eq!(pid.update_duration(30, SECOND), -30);
    }

    #[test]
    fn test_first_measurement_mode_suppresses_kick() {
        let mut pid = IntegerPidController::new(0.0, 0.0, 1.0);
        pid.set_derivative_start(DerivativeStart::FirstMeasurement);
        assert_eq!(pid.update_duration(30, SECOND), 0);
        assert_eq!(pid.update_duration(35, SECOND), -5);

        pid.reset();
        assert_eq!(pid.update_duration(-400, SECOND), 0);
    }

    #[test]
    fn test_set_output_limits_clamps_integral() {
        let mut pid = IntegerPidController::new(0.0, 1.0, 0.0);
        pid.set_setpoint(100);
        let _ = pid.update_duration(0, SECOND);
        assert_eq!(pid.integral(), 100);

        pid.set_output_limits(0, 40).unwrap();
        assert_eq!(pid.integral(), 40);
        pid.set_output_limits(60, 80).unwrap();
        assert_eq!(pid.integral(), 60);
    }

    #[test]
    fn test_rejected_limits_leave_controller_untouched() {
        let mut pid = IntegerPidController::new(1.0, 0.0, 0.0)
            .with_output_limits(-5, 5)
            .unwrap();
        assert_eq!(
            pid.set_output_limits(10, 5).err(),
            Some(MinMaxError { min: 10, max: 5 })
        );
        assert_eq!(pid.output_limits(), (-5, 5));
    }

    #[test]
    fn test_default_limits_span_i64() {
        let pid = IntegerPidController::new(0.0, 0.0, 0.0);
        assert_eq!(pid.output_limits(), (i64::MIN / SCALE, i64::MAX / SCALE));
    }

    #[test]
    fn test_fixed_gains() {
        let mut pid =
            IntegerPidController::new_fixed(fixed!(0.5: I48F16), fixed!(0: I48F16), fixed!(0: I48F16));
        pid.set_setpoint(40);
        assert_eq!(pid.update_duration(0, SECOND), 20);
        assert_eq!(pid.pid(), (0.5, 0.0, 0.0));
    }

    #[test]
    fn test_fluent_configuration() {
        let mut pid = IntegerPidController::new(0.0, 0.0, 0.0);
        pid.set_pid(1.5, 0.25, -2.0)
            .set_setpoint(7)
            .set_output_limits(-3, 3)
            .unwrap()
            .set_overflow(Overflow::Saturating);
        assert_eq!(pid.pid(), (1.5, 0.25, -2.0));
        assert_eq!(pid.setpoint(), 7);
        assert_eq!(pid.output_limits(), (-3, 3));
        assert_eq!(pid.overflow(), Overflow::Saturating);
    }

    #[test]
    fn test_clock_update_first_call_is_zero_duration() {
        let clock = ManualClock::new();
        clock.set(Duration::from_secs(100));
        let mut pid = IntegerPidController::new(0.0, 1.0, 0.0);
        pid.set_setpoint(10);

        assert_eq!(pid.update_with_clock(0, &clock), 0);
        clock.advance(Duration::from_secs(2));
        assert_eq!(pid.update_with_clock(0, &clock), 20);
    }

    #[test]
    fn test_reset_forgets_last_update() {
        let clock = ManualClock::new();
        let mut pid = IntegerPidController::new(0.0, 1.0, 0.0);
        pid.set_setpoint(10);
        let _ = pid.update_with_clock(0, &clock);
        clock.advance(SECOND);
        let _ = pid.update_with_clock(0, &clock);
        assert_eq!(pid.integral(), 10);

        pid.reset();
        assert_eq!(pid.integral(), 0);
        clock.advance(SECOND);
        assert_eq!(pid.update_with_clock(0, &clock), 0);
    }

    #[test]
    fn test_saturating_mode_pins_to_limits() {
        let mut pid = IntegerPidController::new(30000.0, 30000.0, 30000.0);
        pid.set_overflow(Overflow::Saturating);
        pid.set_setpoint(i64::MAX);
        assert_eq!(pid.update_duration(i64::MIN, Duration::MAX), i64::MAX / SCALE);
    }

    #[test]
    fn test_wrapping_mode_does_not_panic() {
        let mut pid = IntegerPidController::new(30000.0, 30000.0, 30000.0);
        pid.set_setpoint(i64::MAX);
        let _ = pid.update_duration(i64::MIN, Duration::MAX);
        let _ = pid.update_const_interval(i64::MAX);
    }
}
