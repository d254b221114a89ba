//! Up and down scans of one parameter set, plus the naming of their result archive.

use log::info;

use crate::config::ScanConfig;
use crate::error::Result;
use crate::options::SolverPolicy;
use crate::solving::{FixedPointSolver, ScanSolution};

/// Runs the positive and negative coupling solves of a single configuration.
#[derive(Clone, Debug)]
pub struct ScanRunner {
    up: FixedPointSolver,
    down: FixedPointSolver,
}

impl ScanRunner {
    /// `config` carries the up-scan coupling; the down scan uses its negation.
    pub fn new(config: ScanConfig, policy: SolverPolicy) -> Result<Self> {
        let down = FixedPointSolver::new(config.reversed(), policy.clone())?;
        let up = FixedPointSolver::new(config, policy)?;
        Ok(Self { up, down })
    }

    pub fn config(&self) -> &ScanConfig {
        self.up.config()
    }

    pub fn policy(&self) -> &SolverPolicy {
        self.up.policy()
    }

    /// Solves both directions; they share no state and run concurrently.
    pub fn run(&self) -> ScanResult {
        let config = self.config();
        info!(
            "scanning {} points in both directions: beta = {}, x0 = {}, {} iterations",
            config.n_points(),
            config.coupling(),
            config.relaxation_constant(),
            config.iteration_count()
        );
        let (up, down) = rayon::join(|| self.up.solve(), || self.down.solve());
        ScanResult { up, down }
    }
}

/// Converged fields for both scan directions.
#[derive(Clone, Debug)]
pub struct ScanResult {
    pub up: ScanSolution,
    pub down: ScanSolution,
}

impl ScanResult {
    /// Named arrays in archive order; residual traces are included only when tracked.
    pub fn records(&self) -> Vec<(&'static str, &[f64])> {
        let mut records = vec![
            ("temperature_up", self.up.temperature.as_slice()),
            ("power_up", self.up.power.as_slice()),
        ];
        if self.up.residuals.interval() > 0 {
            records.push(("delta_abs_up", self.up.residuals.samples()));
        }
        records.push(("temperature_down", self.down.temperature.as_slice()));
        records.push(("power_down", self.down.power.as_slice()));
        if self.down.residuals.interval() > 0 {
            records.push(("delta_abs_down", self.down.residuals.samples()));
        }
        records
    }

    /// Whether either direction produced non-finite values.
    pub fn diverged(&self) -> bool {
        self.up.summary.diverged() || self.down.summary.diverged()
    }
}

/// Archive name embedding the run parameters as they were written by the caller.
pub fn output_file_name(coupling: &str, relaxation: &str, iterations: &str) -> String {
    format!("beta_{coupling}_x0_{relaxation}_simulation_iterations_{iterations}.npz")
}

/// Archive name for a configuration, formatting each parameter with `Display`.
pub fn default_file_name(config: &ScanConfig) -> String {
    output_file_name(
        &config.coupling().to_string(),
        &config.relaxation_constant().to_string(),
        &config.iteration_count().to_string(),
    )
}
