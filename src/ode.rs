use crate::error::IntegrationError;
use crate::types::Trajectory;
use serde::{Deserialize, Serialize};

/// Largest number of samples a single integration may produce.
pub const MAX_SAMPLES: usize = 10_000_000;

/// Right-hand side `f(t, y, dy)` of an ODE system `dy/dt = f(t, y)`.
pub type Rhs<'a> = dyn Fn(f64, &[f64], &mut [f64]) + 'a;

/// Numerical ODE integrator.
pub trait Integrator {
    /// Integrate `rhs` from `y0` over `span = (t0, t1)`.
    ///
    /// The solution is sampled at `t0, t0 + step, ...` strictly before `t1`.
    ///
    /// # Errors
    /// Returns an error if the span or step are invalid or the solution diverges.
    fn integrate(
        &self,
        rhs: &Rhs<'_>,
        y0: &[f64],
        span: (f64, f64),
        step: f64,
    ) -> Result<Trajectory, IntegrationError>;
}

/// Classical fixed-step fourth-order Runge-Kutta integrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rk4 {
    /// Number of RK4 steps taken between consecutive samples.
    pub substeps: usize,
}

impl Default for Rk4 {
    fn default() -> Self {
        Self { substeps: 10 }
    }
}

impl Integrator for Rk4 {
    fn integrate(
        &self,
        rhs: &Rhs<'_>,
        y0: &[f64],
        span: (f64, f64),
        step: f64,
    ) -> Result<Trajectory, IntegrationError> {
        let (t0, t1) = span;
        if !(t0.is_finite() && t1.is_finite() && t1 > t0) {
            return Err(IntegrationError::InvalidSpan { t0, t1 });
        }
        if !(step.is_finite() && step > 0.0) {
            return Err(IntegrationError::InvalidStep { step });
        }

        // Number of grid points in [t0, t1), robust to rounding of (t1 - t0) / step.
        let n_samples = ((t1 - t0) / step - 1e-9).ceil().max(1.0);
        if n_samples > MAX_SAMPLES as f64 {
            return Err(IntegrationError::TooManySamples {
                n_samples,
                max: MAX_SAMPLES,
            });
        }
        let n_samples = n_samples as usize;
        let substeps = self.substeps.max(1);
        let h = step / substeps as f64;

        let dim = y0.len();
        let mut trajectory = Trajectory::with_capacity(dim, n_samples);
        let mut scratch = Scratch::new(dim);
        let mut y = y0.to_vec();

        trajectory.push(t0, &y);
        for i_sample in 1..n_samples {
            let t_start = t0 + (i_sample - 1) as f64 * step;
            for i_sub in 0..substeps {
                rk4_step(rhs, t_start + i_sub as f64 * h, h, &mut y, &mut scratch);
            }

            let t = t0 + i_sample as f64 * step;
            if y.iter().any(|val| !val.is_finite()) {
                return Err(IntegrationError::NonFinite { time: t });
            }
            trajectory.push(t, &y);
        }

        Ok(trajectory)
    }
}

struct Scratch {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    tmp: Vec<f64>,
}

impl Scratch {
    fn new(dim: usize) -> Self {
        Self {
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }
}

fn rk4_step(rhs: &Rhs<'_>, t: f64, h: f64, y: &mut [f64], sc: &mut Scratch) {
    let Scratch {
        k1,
        k2,
        k3,
        k4,
        tmp,
    } = sc;

    rhs(t, y, k1);
    for (j, val) in tmp.iter_mut().enumerate() {
        *val = y[j] + 0.5 * h * k1[j];
    }
    rhs(t + 0.5 * h, tmp, k2);
    for (j, val) in tmp.iter_mut().enumerate() {
        *val = y[j] + 0.5 * h * k2[j];
    }
    rhs(t + 0.5 * h, tmp, k3);
    for (j, val) in tmp.iter_mut().enumerate() {
        *val = y[j] + h * k3[j];
    }
    rhs(t + h, tmp, k4);

    for j in 0..y.len() {
        y[j] += h / 6.0 * (k1[j] + 2.0 * k2[j] + 2.0 * k3[j] + k4[j]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_half_open_grid() {
        let rhs = |_t: f64, _y: &[f64], dy: &mut [f64]| dy[0] = 1.0;
        let traj = Rk4::default()
            .integrate(&rhs, &[0.0], (180.0, 365.0), 1.0)
            .unwrap();
        assert_eq!(traj.len(), 185);
        assert_eq!(traj.times[0], 180.0);
        assert_eq!(traj.times[184], 364.0);
        assert!((traj.values[0][184] - 184.0).abs() < 1e-9);
    }

    #[test]
    fn exponential_decay_is_accurate() {
        let rhs = |_t: f64, y: &[f64], dy: &mut [f64]| dy[0] = -0.05 * y[0];
        let traj = Rk4::default()
            .integrate(&rhs, &[100.0], (0.0, 50.0), 0.5)
            .unwrap();
        for (&t, &val) in traj.times.iter().zip(&traj.values[0]) {
            let exact = 100.0 * (-0.05 * t).exp();
            assert!((val - exact).abs() < 1e-8, "t = {t}: {val} vs {exact}");
        }
    }

    #[test]
    fn divergence_is_reported() {
        let rhs = |_t: f64, y: &[f64], dy: &mut [f64]| dy[0] = y[0] * y[0];
        let err = Rk4 { substeps: 1 }
            .integrate(&rhs, &[1.0], (0.0, 100.0), 1.0)
            .unwrap_err();
        assert!(matches!(err, IntegrationError::NonFinite { .. }));
    }

    #[test]
    fn tiny_step_is_rejected_before_allocating() {
        let rhs = |_t: f64, _y: &[f64], dy: &mut [f64]| dy[0] = 0.0;
        let err = Rk4::default()
            .integrate(&rhs, &[0.0], (0.0, 180.0), 1e-9)
            .unwrap_err();
        assert!(matches!(
            err,
            IntegrationError::TooManySamples {
                max: MAX_SAMPLES,
                ..
            }
        ));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let rhs = |_t: f64, _y: &[f64], dy: &mut [f64]| dy[0] = 0.0;
        let rk4 = Rk4::default();
        assert!(matches!(
            rk4.integrate(&rhs, &[0.0], (1.0, 1.0), 1.0),
            Err(IntegrationError::InvalidSpan { .. })
        ));
        assert!(matches!(
            rk4.integrate(&rhs, &[0.0], (0.0, 1.0), -1.0),
            Err(IntegrationError::InvalidStep { .. })
        ));
    }
}
