//! Parameter declarations and the real-time parameter store

use core::fmt;

use crate::smoother::ValueSmoother;

/// Stable index of a declared parameter
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ParamId(pub u32);

impl ParamId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for ParamId {
    fn from(index: u32) -> Self {
        ParamId(index)
    }
}

/// How a parameter value turns into a per-sample DSP coefficient
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Smoothing {
    /// Control-rate only, no smoother target
    None,
    /// The smoother follows the value as-is
    Linear,
    /// The value is in decibels, the smoother follows the linear gain
    Decibels,
}

/// Host-facing description of a parameter
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterInfo {
    pub name: &'static str,
    pub short_name: &'static str,
    /// Symbolic key, stable across versions
    pub symbol: &'static str,
    pub unit: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub automatable: bool,
    /// Values are always whole numbers
    pub integer: bool,
    pub smoothing: Smoothing,
}

impl ParameterInfo {
    /// Clamp to the declared range and quantize integer parameters.
    ///
    /// Returns `None` for NaN, which has no meaningful place in the range.
    pub fn normalize(&self, value: f32) -> Option<f32> {
        if value.is_nan() {
            return None;
        }
        let clamped = value.clamp(self.min, self.max);
        if self.integer {
            let rounded = clamped.round();
            // rounding can step past a fractional bound
            Some(if rounded > self.max {
                self.max.floor()
            } else if rounded < self.min {
                self.min.ceil()
            } else {
                rounded
            })
        } else {
            Some(clamped)
        }
    }

    /// Map a (normalized) value onto the smoother target
    #[inline]
    pub fn coefficient(&self, value: f32) -> f32 {
        match self.smoothing {
            Smoothing::Decibels => db_to_gain(value),
            Smoothing::Linear | Smoothing::None => value,
        }
    }
}

/// Gains at or below this level are treated as silence
pub const MIN_DB: f32 = -90.0;

/// Convert decibels to a linear gain factor, flooring at [`MIN_DB`]
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    if db > MIN_DB {
        10.0f32.powf(db * 0.05)
    } else {
        0.0
    }
}

struct Parameter {
    info: ParameterInfo,
    value: f32,
    smoother: ValueSmoother,
}

/// Current values of every declared parameter plus their smoothers.
///
/// The table is built once; afterwards [`set`](Self::set), [`get`](Self::get) and
/// [`next_smoothed`](Self::next_smoothed) are allocation-free and safe to call from the
/// audio thread.
///
/// Indices are fixed at construction, so an out-of-range [`ParamId`] is a bug in the
/// caller and panics.
pub struct ParameterStore {
    params: Vec<Parameter>,
    sample_rate: f32,
    time_constant: f32,
}

impl ParameterStore {
    /// Create an empty store whose smoothers run at `sample_rate` with the given time
    /// constant in seconds
    pub fn new(sample_rate: f32, time_constant: f32) -> Self {
        Self {
            params: Vec::new(),
            sample_rate,
            time_constant,
        }
    }

    /// Create a store and declare every entry of `table`, in order
    pub fn with_table(table: &[ParameterInfo], sample_rate: f32, time_constant: f32) -> Self {
        let mut store = Self::new(sample_rate, time_constant);
        store.params.reserve_exact(table.len());
        for info in table {
            store.declare(*info);
        }
        store
    }

    /// Declare a parameter and return its index.
    ///
    /// The parameter starts at its default and its smoother rests on the matching
    /// coefficient, so nothing ramps in.
    pub fn declare(&mut self, info: ParameterInfo) -> ParamId {
        debug_assert!(info.min <= info.max, "inverted range for {}", info.symbol);
        let id = ParamId(self.params.len() as u32);
        let value = info.normalize(info.default).unwrap_or(info.min);

        let mut smoother = ValueSmoother::new(self.sample_rate, self.time_constant);
        smoother.set_target_value(info.coefficient(value));
        smoother.clear_to_target_value();

        self.params.push(Parameter { info, value, smoother });
        id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn contains(&self, id: ParamId) -> bool {
        id.index() < self.params.len()
    }

    pub fn info(&self, id: ParamId) -> &ParameterInfo {
        &self.params[id.index()].info
    }

    pub fn infos(&self) -> impl Iterator<Item = &ParameterInfo> {
        self.params.iter().map(|p| &p.info)
    }

    /// Current (unsmoothed) value
    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        self.params[id.index()].value
    }

    /// Write a new value and return the value actually stored.
    ///
    /// The value is clamped to the declared range and rounded for integer parameters.
    /// Smoothed parameters only get a new smoother target; the ramp takes it from there.
    /// NaN is ignored.
    #[inline]
    pub fn set(&mut self, id: ParamId, value: f32) -> f32 {
        let param = &mut self.params[id.index()];
        let Some(value) = param.info.normalize(value) else {
            return param.value;
        };

        param.value = value;
        if param.info.smoothing != Smoothing::None {
            param.smoother.set_target_value(param.info.coefficient(value));
        }
        value
    }

    /// Advance the parameter's smoother by one sample
    #[inline]
    pub fn next_smoothed(&mut self, id: ParamId) -> f32 {
        self.params[id.index()].smoother.next()
    }

    pub fn smoother(&self, id: ParamId) -> &ValueSmoother {
        &self.params[id.index()].smoother
    }

    /// Snap every smoother onto its target
    pub fn snap_smoothers(&mut self) {
        for param in self.params.iter_mut() {
            param.smoother.clear_to_target_value();
        }
    }

    /// Re-derive every smoother's coefficient for a new sample rate
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for param in self.params.iter_mut() {
            param.smoother.set_sample_rate(sample_rate);
        }
    }

    pub fn set_time_constant(&mut self, seconds: f32) {
        self.time_constant = seconds;
        for param in self.params.iter_mut() {
            param.smoother.set_time_constant(seconds);
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}
