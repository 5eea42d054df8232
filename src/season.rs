use crate::types::TimeParam;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Season of the calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Season {
    Growing = 0,
    Winter = 1,
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Season::Growing => write!(f, "growing"),
            Season::Winter => write!(f, "winter"),
        }
    }
}

/// Classify a calendar time: growing if `t mod T < tau`, winter otherwise.
pub fn season_at(t: f64, tp: &TimeParam) -> Season {
    if t.rem_euclid(tp.year_length) < tp.growing_length {
        Season::Growing
    } else {
        Season::Winter
    }
}

/// Label each time with `0` (growing) or `1` (winter).
pub fn is_winter(times: &[f64], tp: &TimeParam) -> Vec<u8> {
    times.iter().map(|&t| season_at(t, tp) as u8).collect()
}
