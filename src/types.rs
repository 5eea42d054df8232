//! Simulation data types.

use crate::error::SimError;
use serde::{Deserialize, Serialize};

/// Compartment sizes of the host-pathogen system at one instant.
///
/// Compact models track susceptible and infected hosts; elaborate models also
/// track the external inoculum load `p`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum State {
    Elaborate { p: f64, s: f64, i: f64 },
    Compact { s: f64, i: f64 },
}

const COMPACT_LABELS: &[&str] = &["S", "I"];
const ELABORATE_LABELS: &[&str] = &["P", "S", "I"];

impl State {
    /// Number of compartments.
    pub fn dim(&self) -> usize {
        match self {
            State::Compact { .. } => 2,
            State::Elaborate { .. } => 3,
        }
    }

    /// Compartment names in the order of [`State::values`].
    pub fn labels(&self) -> &'static [&'static str] {
        labels_for(self.dim())
    }

    pub fn values(&self) -> Vec<f64> {
        match *self {
            State::Compact { s, i } => vec![s, i],
            State::Elaborate { p, s, i } => vec![p, s, i],
        }
    }

    /// Build a state from its compartment values.
    ///
    /// # Errors
    /// Returns a contract violation unless there are 2 or 3 values.
    pub fn from_values(values: &[f64]) -> Result<Self, SimError> {
        match *values {
            [s, i] => Ok(State::Compact { s, i }),
            [p, s, i] => Ok(State::Elaborate { p, s, i }),
            _ => Err(SimError::contract(format!(
                "state must have 2 or 3 compartments, but has {}",
                values.len()
            ))),
        }
    }

    pub fn s(&self) -> f64 {
        match *self {
            State::Compact { s, .. } | State::Elaborate { s, .. } => s,
        }
    }

    pub fn i(&self) -> f64 {
        match *self {
            State::Compact { i, .. } | State::Elaborate { i, .. } => i,
        }
    }
}

fn labels_for(dim: usize) -> &'static [&'static str] {
    if dim == 3 {
        ELABORATE_LABELS
    } else {
        COMPACT_LABELS
    }
}

/// Calendar configuration of one simulated year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeParam {
    /// Length of a full year (`T`).
    pub year_length: f64,
    /// Length of the growing season at the start of each year (`tau`).
    pub growing_length: f64,
    /// Output sampling step.
    pub step: f64,
}

impl TimeParam {
    pub const DEFAULT: TimeParam = TimeParam {
        year_length: 365.0,
        growing_length: 180.0,
        step: 1.0,
    };

    pub fn growing_span(&self) -> (f64, f64) {
        (0.0, self.growing_length)
    }

    pub fn winter_span(&self) -> (f64, f64) {
        (self.growing_length, self.year_length)
    }

    pub fn winter_length(&self) -> f64 {
        self.year_length - self.growing_length
    }

    /// Check `0 < tau < T` and `0 < step <= tau`.
    pub fn validate(&self) -> Result<(), SimError> {
        let Self {
            year_length,
            growing_length,
            step,
        } = *self;
        if !(growing_length > 0.0 && growing_length < year_length && year_length.is_finite()) {
            return Err(SimError::contract(format!(
                "growing season length must be in (0, {year_length}), but is {growing_length}"
            )));
        }
        if !(step > 0.0 && step <= growing_length) {
            return Err(SimError::contract(format!(
                "sampling step must be in (0, {growing_length}], but is {step}"
            )));
        }
        Ok(())
    }
}

impl Default for TimeParam {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Sampled solution of one or more consecutive seasons.
///
/// `values[c][k]` is compartment `c` at `times[k]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub values: Vec<Vec<f64>>,
}

impl Trajectory {
    pub fn with_capacity(dim: usize, n_samples: usize) -> Self {
        Self {
            times: Vec::with_capacity(n_samples),
            values: (0..dim).map(|_| Vec::with_capacity(n_samples)).collect(),
        }
    }

    pub fn push(&mut self, t: f64, y: &[f64]) {
        self.times.push(t);
        for (col, &val) in self.values.iter_mut().zip(y) {
            col.push(val);
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Values of every compartment at the last sample.
    pub fn last_values(&self) -> Option<Vec<f64>> {
        self.values.iter().map(|col| col.last().copied()).collect()
    }

    /// Append a later trajectory with the same compartments.
    pub fn concat(mut self, later: Trajectory) -> Trajectory {
        self.times.extend(later.times);
        for (col, later_col) in self.values.iter_mut().zip(later.values) {
            col.extend(later_col);
        }
        self
    }

    /// Shift every time point by `offset`.
    pub fn offset(mut self, offset: f64) -> Trajectory {
        self.times.iter_mut().for_each(|t| *t += offset);
        self
    }
}

/// Per-year time series of a multi-year run.
///
/// Row `y` holds year `y + 1` with its time column on the global calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    /// Column names; `"t"` first, then the compartments.
    pub columns: Vec<String>,
    /// Calendar the table was simulated with.
    pub time: TimeParam,
    pub years: Vec<Trajectory>,
}

impl ResultsTable {
    pub const TIME_COLUMN: &'static str = "t";

    pub fn new(state_labels: &[&str], n_years: usize, time: TimeParam) -> Self {
        let columns = std::iter::once(Self::TIME_COLUMN)
            .chain(state_labels.iter().copied())
            .map(String::from)
            .collect();
        Self {
            columns,
            time,
            years: Vec::with_capacity(n_years),
        }
    }

    pub fn n_years(&self) -> usize {
        self.years.len()
    }

    /// Series of `column` in the 1-indexed `year`.
    pub fn get(&self, year: usize, column: &str) -> Option<&[f64]> {
        let row = self.years.get(year.checked_sub(1)?)?;
        let i_col = self.columns.iter().position(|c| c == column)?;
        if i_col == 0 {
            Some(&row.times)
        } else {
            row.values.get(i_col - 1).map(Vec::as_slice)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_values_follow_labels() {
        let state = State::Elaborate {
            p: 1.0,
            s: 2.0,
            i: 3.0,
        };
        assert_eq!(state.labels(), &["P", "S", "I"]);
        assert_eq!(state.values(), vec![1.0, 2.0, 3.0]);
        assert_eq!(State::from_values(&state.values()), Ok(state));
    }

    #[test]
    fn state_rejects_wrong_dimension() {
        let err = State::from_values(&[1.0]).unwrap_err();
        assert!(matches!(err, SimError::ContractViolation { .. }));
    }

    #[test]
    fn state_parses_from_toml() {
        let compact: State = toml::from_str("s = 999.0\ni = 1.0").unwrap();
        assert_eq!(compact, State::Compact { s: 999.0, i: 1.0 });
        let elaborate: State = toml::from_str("p = 5.0\ns = 999.0\ni = 1.0").unwrap();
        assert_eq!(elaborate.dim(), 3);
    }

    #[test]
    fn time_param_rejects_bad_calendar() {
        assert!(TimeParam::DEFAULT.validate().is_ok());
        let tp = TimeParam {
            growing_length: 365.0,
            ..TimeParam::DEFAULT
        };
        assert!(tp.validate().is_err());
        let tp = TimeParam {
            step: 0.0,
            ..TimeParam::DEFAULT
        };
        assert!(tp.validate().is_err());
    }

    #[test]
    fn trajectory_concat_and_offset() {
        let mut a = Trajectory::with_capacity(2, 2);
        a.push(0.0, &[1.0, 2.0]);
        let mut b = Trajectory::with_capacity(2, 1);
        b.push(1.0, &[3.0, 4.0]);
        let c = a.concat(b).offset(10.0);
        assert_eq!(c.times, vec![10.0, 11.0]);
        assert_eq!(c.values, vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
        assert_eq!(c.last_values(), Some(vec![3.0, 4.0]));
    }

    #[test]
    fn table_indexes_by_year_and_column() {
        let mut table = ResultsTable::new(&["S", "I"], 1, TimeParam::DEFAULT);
        let mut row = Trajectory::with_capacity(2, 1);
        row.push(0.0, &[9.0, 1.0]);
        table.years.push(row);
        assert_eq!(table.columns, vec!["t", "S", "I"]);
        assert_eq!(table.get(1, "t"), Some(&[0.0][..]));
        assert_eq!(table.get(1, "I"), Some(&[1.0][..]));
        assert_eq!(table.get(0, "I"), None);
        assert_eq!(table.get(2, "I"), None);
        assert_eq!(table.get(1, "P"), None);
    }
}
