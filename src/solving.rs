//! Fixed-point iteration of the coupled lineshape and thermal filter, with residual diagnostics.

use log::{debug, info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::lineshape;
use crate::options::{SolverPolicy, UpdateRule};
use crate::thermal::{boxcar, ThermalFilter};

/// RMS residual samples, one per sampling window of the iteration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResidualTrace {
    interval: usize,
    samples: Vec<f64>,
}

impl ResidualTrace {
    /// Iterations accumulated into each sample (zero when tracking is disabled).
    pub fn interval(&self) -> usize {
        self.interval
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.samples.last().copied()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.samples
    }
}

/// Diagnostics returned alongside the converged fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveSummary {
    /// Number of iterations performed; always the configured count.
    pub iterations: usize,
    /// Last residual sample, if the policy tracks residuals.
    pub final_residual: Option<f64>,
    /// Count of NaN or infinite entries across both output fields.
    pub non_finite_points: usize,
}

impl SolveSummary {
    /// Whether the iteration diverged into non-finite values somewhere.
    pub fn diverged(&self) -> bool {
        self.non_finite_points > 0
    }
}

/// Final state of one solve.
#[derive(Clone, Debug)]
pub struct ScanSolution {
    pub temperature: DVector<f64>,
    pub power: DVector<f64>,
    pub residuals: ResidualTrace,
    pub summary: SolveSummary,
}

/// Drives the lineshape and thermal filter to their joint fixed point.
///
/// The iteration count is fixed; there is no early exit on convergence, so
/// outputs for a given parameter set are reproducible.
#[derive(Clone, Debug)]
pub struct FixedPointSolver {
    config: ScanConfig,
    policy: SolverPolicy,
    filter: ThermalFilter,
}

impl FixedPointSolver {
    /// Rejects configurations that bypassed the builder, e.g. deserialized ones.
    pub fn new(config: ScanConfig, policy: SolverPolicy) -> Result<Self> {
        config.validate()?;
        policy.validate()?;
        let filter = ThermalFilter::new(
            config.relaxation_constant(),
            config.half_width(),
            policy.normalization,
            policy.time_base,
        );
        Ok(Self {
            config,
            policy,
            filter,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn policy(&self) -> &SolverPolicy {
        &self.policy
    }

    /// Solves from a zero temperature field.
    ///
    /// For negative coupling the fields are reversed at the end so that both
    /// scan directions read in increasing frequency order.
    pub fn solve(&self) -> ScanSolution {
        self.iterate(DVector::zeros(self.config.n_points()), true)
    }

    /// Solves from a caller-supplied initial temperature field.
    pub fn solve_from(&self, temperature: DVector<f64>) -> Result<ScanSolution> {
        self.check_len(&temperature)?;
        Ok(self.iterate(temperature, true))
    }

    /// Like [`solve`](Self::solve) but never reverses the output, whatever the coupling sign.
    pub fn solve_unoriented(&self) -> ScanSolution {
        self.iterate(DVector::zeros(self.config.n_points()), false)
    }

    fn check_len(&self, temperature: &DVector<f64>) -> Result<()> {
        if temperature.len() != self.config.n_points() {
            return Err(ScanError::dimension_mismatch(
                "initial temperature",
                self.config.n_points(),
                temperature.len(),
            ));
        }
        Ok(())
    }

    fn iterate(&self, mut temperature: DVector<f64>, orient: bool) -> ScanSolution {
        let n = temperature.len();
        let beta = self.config.coupling();
        let half_width = self.config.half_width() as f64;
        let iterations = self.config.iteration_count();
        let sample_interval = self.policy.sample_interval;

        debug!(
            "solving {} points: beta = {}, x0 = {}, damping = {:.6}, update = {:?}",
            n,
            beta,
            self.config.relaxation_constant(),
            self.filter.damping(),
            self.policy.update
        );

        let mut power = DVector::zeros(n);
        let mut proposal = DVector::zeros(n);
        lineshape::fill(temperature.as_slice(), power.as_mut_slice(), beta, half_width);

        let mut samples = Vec::with_capacity(self.policy.trace_len(iterations));
        let mut mse_accumulator = 0.0_f64;

        for step in 0..iterations {
            self.filter.run(power.as_slice(), proposal.as_mut_slice());
            if let Some(window) = self.policy.smoothing {
                proposal = boxcar(&proposal, window);
            }

            let mean_square = match self.policy.update {
                UpdateRule::Substitution => {
                    let mean_square = if sample_interval.is_some() {
                        mean_square_difference(&proposal, &temperature)
                    } else {
                        0.0
                    };
                    std::mem::swap(&mut temperature, &mut proposal);
                    mean_square
                }
                UpdateRule::UnderRelaxed { learning_rate } => {
                    let mut sum = 0.0_f64;
                    for (t, &target) in temperature.iter_mut().zip(proposal.iter()) {
                        let delta = target - *t;
                        *t = learning_rate * delta + *t;
                        sum += delta * delta;
                    }
                    sum / n as f64
                }
            };

            lineshape::fill(temperature.as_slice(), power.as_mut_slice(), beta, half_width);

            if let Some(interval) = sample_interval {
                mse_accumulator += mean_square;
                if (step + 1) % interval == 0 {
                    samples.push(mse_accumulator.sqrt());
                    mse_accumulator = 0.0;
                }
            }

            if let Some(every) = self.policy.report_every {
                if (step + 1) % every == 0 {
                    info!(
                        "beta {}: iteration {}/{} ({:.1}%)",
                        beta,
                        step + 1,
                        iterations,
                        100.0 * (step + 1) as f64 / iterations as f64
                    );
                }
            }
        }

        if orient && beta < 0.0 {
            temperature.as_mut_slice().reverse();
            power.as_mut_slice().reverse();
        }

        let non_finite_points = temperature
            .iter()
            .chain(power.iter())
            .filter(|value| !value.is_finite())
            .count();
        if non_finite_points > 0 {
            warn!(
                "beta {}: iteration diverged, {} non-finite values in the output fields",
                beta, non_finite_points
            );
        }

        let residuals = ResidualTrace {
            interval: sample_interval.unwrap_or(0),
            samples,
        };
        let summary = SolveSummary {
            iterations,
            final_residual: residuals.last(),
            non_finite_points,
        };
        debug!("beta {}: finished, final residual {:?}", beta, summary.final_residual);

        ScanSolution {
            temperature,
            power,
            residuals,
            summary,
        }
    }
}

fn mean_square_difference(a: &DVector<f64>, b: &DVector<f64>) -> f64 {
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    sum / a.len() as f64
}
