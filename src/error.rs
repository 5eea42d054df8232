use crate::model::Variant;
use crate::season::Season;

/// Error type for all fallible operations of the simulation core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// Returned when inputs break a precondition; raised before any work is done.
    #[error("contract violation: {reason}")]
    ContractViolation {
        /// Description of the broken precondition.
        reason: String,
    },

    /// Returned when a year-transition formula is evaluated outside its domain.
    #[error("domain error in {variant} year transition: {reason}")]
    Domain {
        /// Model variant whose transition failed.
        variant: Variant,
        /// Description of the problem.
        reason: String,
    },

    /// Returned when the integrator cannot produce a trajectory.
    #[error("integration failed during {season} season of {variant} model")]
    IntegrationFailure {
        /// Season being integrated.
        season: Season,
        /// Model variant being integrated.
        variant: Variant,
        /// Underlying integrator error.
        #[source]
        source: IntegrationError,
    },

    /// Returned by the multi-year loop when a single year fails.
    #[error("year {year} failed")]
    Year {
        /// 1-indexed year.
        year: usize,
        /// Error that aborted the year.
        #[source]
        source: Box<SimError>,
    },
}

impl SimError {
    pub(crate) fn contract(reason: impl Into<String>) -> Self {
        Self::ContractViolation {
            reason: reason.into(),
        }
    }

    /// Innermost error, skipping any year wrappers.
    #[cfg(test)]
    pub fn root(&self) -> &SimError {
        match self {
            Self::Year { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Error type reported by an [`Integrator`](crate::ode::Integrator).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntegrationError {
    /// Returned when the time span is empty or not finite.
    #[error("invalid time span: ({t0}, {t1})")]
    InvalidSpan {
        /// Start of the span.
        t0: f64,
        /// End of the span.
        t1: f64,
    },

    /// Returned when the sampling step is not positive and finite.
    #[error("invalid sampling step: {step}")]
    InvalidStep {
        /// The invalid step.
        step: f64,
    },

    /// Returned when the solution leaves the finite reals.
    #[error("state became non-finite at t = {time}")]
    NonFinite {
        /// Time at which the state diverged.
        time: f64,
    },

    /// Returned when the time span would need more samples than allowed.
    #[error("too many samples: {n_samples} (maximum {max})")]
    TooManySamples {
        /// Samples the span would need.
        n_samples: f64,
        /// Maximum number of samples.
        max: usize,
    },

    /// Returned when an integrator produces no samples.
    #[error("integrator returned an empty trajectory")]
    EmptyTrajectory,
}
