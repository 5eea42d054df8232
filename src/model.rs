use crate::error::SimError;
use crate::types::{State, TimeParam};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of epidemic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    CompactAirborne,
    ElaborateAirborne,
    CompactSoilborne,
    ElaborateSoilborne,
}

impl Variant {
    /// Number of state compartments.
    pub fn state_len(self) -> usize {
        if self.is_elaborate() { 3 } else { 2 }
    }

    /// Elaborate variants track inoculum and integrate a winter season.
    pub fn is_elaborate(self) -> bool {
        matches!(self, Variant::ElaborateAirborne | Variant::ElaborateSoilborne)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::CompactAirborne => "compact airborne",
            Variant::ElaborateAirborne => "elaborate airborne",
            Variant::CompactSoilborne => "compact soilborne",
            Variant::ElaborateSoilborne => "elaborate soilborne",
        };
        f.write_str(name)
    }
}

/// Rates of the compact airborne model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactParams {
    /// Removal rate of infected hosts.
    pub alpha: f64,
    /// Host-to-host transmission rate.
    pub beta: f64,
    /// Host population size.
    pub n: f64,
}

/// Rates of the elaborate models.
///
/// The airborne and soilborne variants share the same equations; for the
/// soilborne one `lambda` and `theta` describe the soil inoculum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElaborateParams {
    pub alpha: f64,
    pub beta: f64,
    pub n: f64,
    /// Inoculum decay rate during the growing season.
    pub lambda: f64,
    /// Infection rate from inoculum.
    pub theta: f64,
    /// Inoculum decay rate during winter.
    pub mu: f64,
    /// Inoculum produced per infected host at the end of the growing season.
    pub pi: f64,
}

/// Rates of the compact soilborne model.
///
/// The inoculum is not tracked; its effect is folded into the year transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilborneParams {
    pub alpha: f64,
    pub beta: f64,
    pub n: f64,
    pub theta: f64,
    pub lambda: f64,
    pub mu: f64,
    pub pi: f64,
}

/// A model variant with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    CompactAirborne(CompactParams),
    ElaborateAirborne(ElaborateParams),
    CompactSoilborne(SoilborneParams),
    ElaborateSoilborne(ElaborateParams),
}

impl Model {
    pub fn variant(&self) -> Variant {
        match self {
            Model::CompactAirborne(_) => Variant::CompactAirborne,
            Model::ElaborateAirborne(_) => Variant::ElaborateAirborne,
            Model::CompactSoilborne(_) => Variant::CompactSoilborne,
            Model::ElaborateSoilborne(_) => Variant::ElaborateSoilborne,
        }
    }

    /// Season equations and transition rules of this variant.
    pub fn dynamics(&self) -> &dyn Dynamics {
        match self {
            Model::CompactAirborne(par) => par,
            Model::ElaborateAirborne(par) | Model::ElaborateSoilborne(par) => par,
            Model::CompactSoilborne(par) => par,
        }
    }

    /// Named rate constants, all of which must be non-negative.
    pub fn rates(&self) -> Vec<(&'static str, f64)> {
        match self {
            Model::CompactAirborne(par) => {
                vec![("alpha", par.alpha), ("beta", par.beta), ("n", par.n)]
            }
            Model::ElaborateAirborne(par) | Model::ElaborateSoilborne(par) => vec![
                ("alpha", par.alpha),
                ("beta", par.beta),
                ("n", par.n),
                ("lambda", par.lambda),
                ("theta", par.theta),
                ("mu", par.mu),
                ("pi", par.pi),
            ],
            Model::CompactSoilborne(par) => vec![
                ("alpha", par.alpha),
                ("beta", par.beta),
                ("n", par.n),
                ("theta", par.theta),
                ("lambda", par.lambda),
                ("mu", par.mu),
                ("pi", par.pi),
            ],
        }
    }

    /// Ensure `state` has as many compartments as this variant.
    pub fn check_state(&self, state: &State) -> Result<(), SimError> {
        let exp_len = self.variant().state_len();
        let len = state.dim();
        if len != exp_len {
            return Err(SimError::contract(format!(
                "{} model needs {exp_len} compartments, but state has {len}",
                self.variant()
            )));
        }
        Ok(())
    }
}

/// Capabilities a model variant provides to the season and year simulators.
pub trait Dynamics {
    /// Growing-season derivative of `y` at time `t`.
    fn growing_rhs(&self, t: f64, y: &[f64], dy: &mut [f64]);

    /// Winter phase; `None` for variants without one.
    fn winter(&self) -> Option<&dyn WinterDynamics> {
        None
    }

    /// Next growing season's initial state from the state ending this year.
    ///
    /// For variants with a winter phase `end` is the end of winter, otherwise
    /// the end of the growing season.
    fn year_transition(&self, end: &State, tp: &TimeParam) -> Result<State, SimError>;
}

/// Winter phase of the elaborate variants.
pub trait WinterDynamics {
    /// Winter derivative of `y` at time `t`.
    fn winter_rhs(&self, t: f64, y: &[f64], dy: &mut [f64]);

    /// Winter initial state from the end of the growing season.
    fn winter_handoff(&self, growing_end: &State) -> Result<State, SimError>;
}

impl Dynamics for CompactParams {
    fn growing_rhs(&self, _t: f64, y: &[f64], dy: &mut [f64]) {
        compact_growing_rhs(self.alpha, self.beta, y, dy);
    }

    // Hosts carry over unchanged between years.
    fn year_transition(&self, end: &State, _tp: &TimeParam) -> Result<State, SimError> {
        match *end {
            State::Compact { .. } => Ok(*end),
            State::Elaborate { .. } => Err(SimError::contract(
                "compact airborne transition needs a compact state",
            )),
        }
    }
}

impl Dynamics for SoilborneParams {
    fn growing_rhs(&self, _t: f64, y: &[f64], dy: &mut [f64]) {
        compact_growing_rhs(self.alpha, self.beta, y, dy);
    }

    fn year_transition(&self, end: &State, tp: &TimeParam) -> Result<State, SimError> {
        let State::Compact { i: i_end, .. } = *end else {
            return Err(SimError::contract(
                "compact soilborne transition needs a compact state",
            ));
        };
        let domain_err = |reason: String| SimError::Domain {
            variant: Variant::CompactSoilborne,
            reason,
        };

        if !(self.lambda > 0.0) {
            return Err(domain_err(format!(
                "lambda must be positive, but is {}",
                self.lambda
            )));
        }

        // Inoculum left after winter decay, then fully consumed over the
        // growing season at rate lambda.
        let inoculum = self.pi * (-self.mu * tp.winter_length()).exp() * i_end;
        let s = self.n * (-self.theta * inoculum / self.lambda).exp();
        if !s.is_finite() {
            return Err(domain_err(format!(
                "susceptible hosts are not finite (inoculum {inoculum})"
            )));
        }

        Ok(State::Compact { s, i: self.n - s })
    }
}

impl Dynamics for ElaborateParams {
    fn growing_rhs(&self, _t: f64, y: &[f64], dy: &mut [f64]) {
        let (p, s, i) = (y[0], y[1], y[2]);
        let primary = self.theta * p * s;
        let secondary = self.beta * s * i;
        dy[0] = -self.lambda * p;
        dy[1] = -primary - secondary;
        dy[2] = primary + secondary - self.alpha * i;
    }

    fn winter(&self) -> Option<&dyn WinterDynamics> {
        Some(self)
    }

    // Inoculum survives winter; the host population is replanted.
    fn year_transition(&self, end: &State, _tp: &TimeParam) -> Result<State, SimError> {
        let State::Elaborate { p, .. } = *end else {
            return Err(SimError::contract(
                "elaborate transition needs an elaborate state",
            ));
        };
        Ok(State::Elaborate {
            p,
            s: self.n,
            i: 0.0,
        })
    }
}

impl WinterDynamics for ElaborateParams {
    fn winter_rhs(&self, _t: f64, y: &[f64], dy: &mut [f64]) {
        dy[0] = -self.mu * y[0];
        dy[1] = 0.0;
        dy[2] = 0.0;
    }

    fn winter_handoff(&self, growing_end: &State) -> Result<State, SimError> {
        let State::Elaborate { p, i, .. } = *growing_end else {
            return Err(SimError::contract(
                "winter handoff needs an elaborate state",
            ));
        };
        Ok(State::Elaborate {
            p: p + self.pi * i,
            s: 0.0,
            i: 0.0,
        })
    }
}

fn compact_growing_rhs(alpha: f64, beta: f64, y: &[f64], dy: &mut [f64]) {
    let (s, i) = (y[0], y[1]);
    let infection = beta * s * i;
    dy[0] = -infection;
    dy[1] = infection - alpha * i;
}
