//! The parameter and state table of this plugin

use crate::params::{ParamId, ParameterInfo, Smoothing};
use crate::state::{StateHint, StateId, StateInfo};

/// Output gain in dB
pub const GAIN: ParamId = ParamId(0);
/// Selected voice, a whole number
pub const VOICE: ParamId = ParamId(1);

/// Path of the auxiliary file the user picked
pub const FILE: StateId = StateId(0);

pub const PARAMETERS: [ParameterInfo; 2] = [
    ParameterInfo {
        name: "Gain",
        short_name: "Gain",
        symbol: "gain",
        unit: "dB",
        min: -90.0,
        max: 30.0,
        default: 0.0,
        automatable: true,
        integer: false,
        smoothing: Smoothing::Decibels,
    },
    ParameterInfo {
        name: "Voice",
        short_name: "Voice",
        symbol: "voice",
        unit: "",
        min: 0.0,
        max: 128.0,
        default: 0.0,
        automatable: true,
        integer: true,
        smoothing: Smoothing::None,
    },
];

pub const STATES: [StateInfo; 1] = [StateInfo {
    key: "file",
    default: "",
    hint: StateHint::FilePath,
}];
