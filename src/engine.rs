use crate::error::{IntegrationError, SimError};
use crate::model::Model;
use crate::ode::{Integrator, Rk4};
use crate::season::Season;
use crate::types::{ResultsTable, State, TimeParam, Trajectory};

/// Simulation engine.
///
/// Holds the model, calendar and integrator, and chains growing and winter
/// seasons into years and years into multi-year runs.
pub struct Engine<I: Integrator = Rk4> {
    model: Model,
    time: TimeParam,
    integrator: I,
}

impl<I: Integrator> Engine<I> {
    /// Create a new `Engine`.
    ///
    /// # Errors
    /// Returns a contract violation if the calendar is invalid.
    pub fn new(model: Model, time: TimeParam, integrator: I) -> Result<Self, SimError> {
        time.validate()?;
        Ok(Self {
            model,
            time,
            integrator,
        })
    }

    #[cfg(test)]
    pub fn time(&self) -> &TimeParam {
        &self.time
    }

    /// Integrate one season from `state0` over `span`.
    ///
    /// Returns the sampled trajectory and its last sampled state.
    pub fn simulate_season(
        &self,
        season: Season,
        state0: &State,
        span: (f64, f64),
    ) -> Result<(Trajectory, State), SimError> {
        self.model.check_state(state0)?;
        let variant = self.model.variant();
        let dynamics = self.model.dynamics();
        let y0 = state0.values();

        let result = match season {
            Season::Growing => self.integrator.integrate(
                &|t, y, dy| dynamics.growing_rhs(t, y, dy),
                &y0,
                span,
                self.time.step,
            ),
            Season::Winter => {
                let winter = dynamics.winter().ok_or_else(|| {
                    SimError::contract(format!("{variant} model has no winter season"))
                })?;
                self.integrator.integrate(
                    &|t, y, dy| winter.winter_rhs(t, y, dy),
                    &y0,
                    span,
                    self.time.step,
                )
            }
        };
        let trajectory = result.map_err(|source| SimError::IntegrationFailure {
            season,
            variant,
            source,
        })?;

        let final_values = trajectory.last_values().ok_or(SimError::IntegrationFailure {
            season,
            variant,
            source: IntegrationError::EmptyTrajectory,
        })?;
        let final_state = State::from_values(&final_values)?;
        log::debug!(
            "{season} season over {span:?}: {} samples, final state {final_state:?}",
            trajectory.len()
        );

        Ok((trajectory, final_state))
    }

    /// Simulate one calendar year starting at `t = 0`.
    ///
    /// Returns the year's trajectory and the initial state of the next year.
    pub fn simulate_year(&self, state0: &State) -> Result<(Trajectory, State), SimError> {
        self.model.check_state(state0)?;
        let dynamics = self.model.dynamics();

        let (growing, growing_end) =
            self.simulate_season(Season::Growing, state0, self.time.growing_span())?;

        let (trajectory, season_end) = match dynamics.winter() {
            Some(winter) => {
                let winter_start = winter.winter_handoff(&growing_end)?;
                let (winter_traj, winter_end) =
                    self.simulate_season(Season::Winter, &winter_start, self.time.winter_span())?;
                (growing.concat(winter_traj), winter_end)
            }
            None => (growing, growing_end),
        };

        let next_state = dynamics.year_transition(&season_end, &self.time)?;

        Ok((trajectory, next_state))
    }

    /// Simulate `n_years` consecutive years, each seeded by the previous one.
    ///
    /// # Errors
    /// Fails before any work if `n_years` is zero or `state0` does not fit the
    /// model; a failing year aborts the whole run.
    pub fn simulate_years(&self, n_years: usize, state0: &State) -> Result<ResultsTable, SimError> {
        if n_years < 1 {
            return Err(SimError::contract("number of years must be at least 1"));
        }
        self.model.check_state(state0)?;

        let mut table = ResultsTable::new(state0.labels(), n_years, self.time);
        let mut state = *state0;
        for year in 1..=n_years {
            let (trajectory, next_state) =
                self.simulate_year(&state).map_err(|source| SimError::Year {
                    year,
                    source: Box::new(source),
                })?;

            let offset = (year - 1) as f64 * self.time.year_length;
            table.years.push(trajectory.offset(offset));
            log::debug!(
                "year {} starts with S = {:.3}, I = {:.3}",
                year + 1,
                next_state.s(),
                next_state.i()
            );
            state = next_state;

            let progress = 100.0 * year as f64 / n_years as f64;
            log::info!("completed {progress:06.2}%");
        }

        Ok(table)
    }
}
