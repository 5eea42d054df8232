use crate::model::Model;
use crate::ode::Rk4;
use crate::types::{State, TimeParam};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model variant and its rate constants.
    pub model: Model,
    /// Initial state of the first year.
    pub init: State,
    /// Calendar of each simulated year.
    #[serde(default)]
    pub time: TimeParam,
    /// Integrator settings.
    #[serde(default)]
    pub solver: Rk4,
    pub output: OutputConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of years simulated per run.
    pub n_years: usize,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be a TOML document with `[model]`, `[init]` and
    /// `[output]` tables; `[time]` and `[solver]` are optional.
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, rate) in self.model.rates() {
            check_num(rate, 0.0..f64::INFINITY).with_context(|| format!("invalid rate {name}"))?;
        }

        self.model
            .check_state(&self.init)
            .context("invalid initial state")?;
        for (label, val) in self.init.labels().iter().zip(self.init.values()) {
            check_num(val, 0.0..f64::INFINITY)
                .with_context(|| format!("invalid initial compartment {label}"))?;
        }

        check_num(self.time.year_length, 0.0..f64::INFINITY).context("invalid year length")?;
        self.time.validate().context("invalid calendar")?;
        check_num(self.time.year_length / self.time.step, 1.0..=1e6)
            .context("invalid number of samples per year")?;

        check_num(self.solver.substeps, 1..10_000).context("invalid number of substeps")?;
        check_num(self.output.n_years, 1..100_000).context("invalid number of years")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variant;

    const ELABORATE: &str = r#"
[model]
kind = "elaborate_airborne"
alpha = 0.1
beta = 0.0005
n = 1000.0
lambda = 0.02
theta = 0.0001
mu = 0.005
pi = 0.5

[init]
p = 50.0
s = 1000.0
i = 0.0

[time]
year_length = 365.0
growing_length = 200.0

[output]
n_years = 4
"#;

    #[test]
    fn parses_full_config() {
        let cfg = Config::from_toml(ELABORATE).unwrap();
        assert_eq!(cfg.model.variant(), Variant::ElaborateAirborne);
        assert_eq!(cfg.init.dim(), 3);
        assert_eq!(cfg.time.growing_length, 200.0);
        assert_eq!(cfg.time.step, TimeParam::DEFAULT.step);
        assert_eq!(cfg.solver, Rk4::default());
        assert_eq!(cfg.output.n_years, 4);
    }

    #[test]
    fn rejects_negative_rate() {
        let contents = ELABORATE.replace("mu = 0.005", "mu = -0.005");
        let err = Config::from_toml(&contents).unwrap_err();
        assert!(format!("{err:#}").contains("invalid rate mu"));
    }

    #[test]
    fn rejects_state_of_wrong_dimension() {
        let contents = ELABORATE.replace("p = 50.0\n", "");
        let err = Config::from_toml(&contents).unwrap_err();
        assert!(format!("{err:#}").contains("invalid initial state"));
    }

    #[test]
    fn rejects_bad_calendar() {
        let contents = ELABORATE.replace("growing_length = 200.0", "growing_length = 365.0");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn rejects_tiny_step() {
        let contents = ELABORATE.replace(
            "growing_length = 200.0",
            "growing_length = 200.0\nstep = 1e-9",
        );
        let err = Config::from_toml(&contents).unwrap_err();
        assert!(format!("{err:#}").contains("invalid number of samples per year"));
    }

    #[test]
    fn rejects_zero_years() {
        let contents = ELABORATE.replace("n_years = 4", "n_years = 0");
        let err = Config::from_toml(&contents).unwrap_err();
        assert!(format!("{err:#}").contains("invalid number of years"));
    }

    #[test]
    fn accepts_zero_lambda() {
        let contents = r#"
[model]
kind = "compact_soilborne"
alpha = 0.1
beta = 0.0005
n = 1000.0
theta = 0.001
lambda = 0.0
mu = 0.005
pi = 0.5

[init]
s = 999.0
i = 1.0

[output]
n_years = 2
"#;
        let cfg = Config::from_toml(contents).unwrap();
        assert_eq!(cfg.time, TimeParam::DEFAULT);
    }
}
