//! One-pole exponential parameter smoothing

/// Residual below which the smoother snaps onto its target.
///
/// Keeps the tail of the decay from drifting through denormals.
pub const SETTLE_EPSILON: f32 = 1.0e-6;

/// Exponential one-pole smoother turning stepped values into a per-sample ramp.
///
/// Every call to [`next`](Self::next) moves the current value a fixed fraction of the way
/// toward the target: `current = target + (current - target) * k` with
/// `k = exp(-1 / (time_constant * sample_rate))`. After one time constant ~63% of a step
/// has been covered. The ramp never overshoots.
///
/// ```
/// use schall::ValueSmoother;
///
/// let mut gain = ValueSmoother::new(48_000.0, 0.020);
/// gain.set_target_value(1.0);
///
/// let first = gain.next();
/// assert!(first > 0.0 && first < 1.0);
/// ```
#[derive(Clone, Debug)]
pub struct ValueSmoother {
    sample_rate: f32,
    time_constant: f32,
    coeff: f32,
    current: f32,
    target: f32,
}

impl ValueSmoother {
    /// Create a smoother resting at zero
    pub fn new(sample_rate: f32, time_constant: f32) -> Self {
        let mut smoother = Self {
            sample_rate,
            time_constant,
            coeff: 0.0,
            current: 0.0,
            target: 0.0,
        };
        smoother.update_coeff();
        smoother
    }

    /// Change the sample rate.
    ///
    /// Only the decay coefficient is re-derived, the current value is kept so the
    /// output stays continuous.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coeff();
    }

    /// Change the time constant in seconds
    pub fn set_time_constant(&mut self, seconds: f32) {
        self.time_constant = seconds;
        self.update_coeff();
    }

    #[inline]
    pub fn set_target_value(&mut self, target: f32) {
        self.target = target;
    }

    /// Jump straight to the target, no ramp
    #[inline]
    pub fn clear_to_target_value(&mut self) {
        self.current = self.target;
    }

    /// Advance by one sample and return the new value
    #[inline]
    pub fn next(&mut self) -> f32 {
        let delta = (self.current - self.target) * self.coeff;
        let next = self.target + delta;
        // Near the target the step can round away to nothing; snap instead of stalling
        self.current = if delta.abs() < SETTLE_EPSILON || next == self.current {
            self.target
        } else {
            next
        };
        self.current
    }

    #[inline]
    pub fn current_value(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target_value(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    #[inline]
    pub fn coefficient(&self) -> f32 {
        self.coeff
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn time_constant(&self) -> f32 {
        self.time_constant
    }

    fn update_coeff(&mut self) {
        let samples = self.time_constant * self.sample_rate;
        // A zero or nonsensical time span means "no smoothing"
        self.coeff = if samples.is_finite() && samples > 0.0 {
            (-1.0 / samples).exp()
        } else {
            0.0
        };
    }
}

impl Default for ValueSmoother {
    /// 20ms at 48kHz
    fn default() -> Self {
        Self::new(48_000.0, 0.020)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_on_clear() {
        let mut s = ValueSmoother::new(44_100.0, 0.010);
        s.set_target_value(1.0);
        s.clear_to_target_value();
        assert_eq!(s.next(), 1.0);
    }

    #[test]
    fn coefficient_follows_time_constant() {
        let s = ValueSmoother::new(48_000.0, 0.020);
        let expected = (-1.0f32 / 960.0).exp();
        assert!((s.coefficient() - expected).abs() < 1e-7);
    }

    #[test]
    fn zero_time_constant_is_instant() {
        let mut s = ValueSmoother::new(48_000.0, 0.0);
        s.set_target_value(0.5);
        assert_eq!(s.next(), 0.5);

        let mut s = ValueSmoother::new(0.0, 0.020);
        s.set_target_value(0.25);
        assert_eq!(s.next(), 0.25);
    }

    #[test]
    fn reaches_63_percent_at_one_tau() {
        let mut s = ValueSmoother::new(48_000.0, 0.020);
        s.set_target_value(1.0);
        let mut value = 0.0;
        for _ in 0..960 {
            value = s.next();
        }
        let expected = 1.0 - (-1.0f32).exp();
        assert!((value - expected).abs() < 1e-3, "value={value}");
    }

    #[test]
    fn settles_exactly_on_target() {
        let mut s = ValueSmoother::new(48_000.0, 0.001);
        s.set_target_value(0.75);
        for _ in 0..10_000 {
            s.next();
        }
        assert!(s.is_settled());
        assert_eq!(s.current_value(), 0.75);
    }

    #[test]
    fn slow_ramps_settle_in_finite_time() {
        // long time constants reach the point where a step rounds to nothing
        for (sample_rate, time_constant, target) in [
            (48_000.0, 0.020, 1.0),
            (192_000.0, 0.200, 10.0),
            (44_100.0, 0.050, -3.5),
        ] {
            let mut s = ValueSmoother::new(sample_rate, time_constant);
            s.set_target_value(target);

            let settled_after = (0..1_000_000).position(|_| {
                s.next();
                s.is_settled()
            });
            assert!(settled_after.is_some(), "stuck at {} for {}", s.current_value(), target);
            assert_eq!(s.current_value(), target);
        }
    }

    #[test]
    fn falling_ramp_does_not_undershoot() {
        let mut s = ValueSmoother::new(48_000.0, 0.005);
        s.set_target_value(1.0);
        s.clear_to_target_value();
        s.set_target_value(0.0);

        let mut last = 1.0;
        for _ in 0..5_000 {
            let v = s.next();
            assert!(v <= last);
            assert!(v >= 0.0);
            last = v;
        }
    }

    #[test]
    fn sample_rate_change_keeps_current_value() {
        let mut s = ValueSmoother::new(48_000.0, 0.020);
        s.set_target_value(1.0);
        for _ in 0..100 {
            s.next();
        }
        let before = s.current_value();
        let old_coeff = s.coefficient();

        s.set_sample_rate(96_000.0);
        assert_eq!(s.current_value(), before);
        assert!(s.coefficient() > old_coeff);
    }
}
