//! Scan geometry and physical parameters, validated once before any simulation work.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// Immutable parameters of one fixed-point solve.
///
/// `half_width` and `n_widths` describe the sampled frequency axis: the field
/// spans `n_widths` resonance half-widths on each side of the center, each
/// half-width covering `half_width` points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    coupling: f64,
    relaxation_constant: f64,
    iteration_count: usize,
    half_width: usize,
    n_widths: usize,
}

impl ScanConfig {
    /// Start building a configuration from the two physical parameters.
    pub fn builder(coupling: f64, relaxation_constant: f64) -> ScanConfigBuilder {
        ScanConfigBuilder::new(coupling, relaxation_constant)
    }

    /// Signed coupling (`beta`) between temperature and detuning.
    pub fn coupling(&self) -> f64 {
        self.coupling
    }

    /// Thermal relaxation constant (`x0`).
    pub fn relaxation_constant(&self) -> f64 {
        self.relaxation_constant
    }

    /// Number of fixed-point iterations performed by one solve.
    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    /// Resonance half-width, in scan points.
    pub fn half_width(&self) -> usize {
        self.half_width
    }

    /// Number of half-widths spanned on either side of the center.
    pub fn n_widths(&self) -> usize {
        self.n_widths
    }

    /// Length of every scan field: `2 * half_width * n_widths`.
    pub fn n_points(&self) -> usize {
        2 * self.half_width * self.n_widths
    }

    /// Index of the static resonance center (truncating division).
    pub fn center(&self) -> usize {
        self.n_points() / 2
    }

    /// Same configuration with a different coupling.
    pub fn with_coupling(&self, coupling: f64) -> Self {
        Self {
            coupling,
            ..self.clone()
        }
    }

    /// Sibling configuration used for the opposite scan direction.
    pub fn reversed(&self) -> Self {
        self.with_coupling(-self.coupling)
    }

    /// Re-runs the builder checks, e.g. after deserializing from a run file.
    pub fn validate(&self) -> Result<()> {
        ScanConfigBuilder {
            coupling: self.coupling,
            relaxation_constant: self.relaxation_constant,
            iteration_count: self.iteration_count,
            half_width: self.half_width,
            n_widths: self.n_widths,
        }
        .build()
        .map(|_| ())
    }
}

/// Builder that validates parameter domains before constructing [`ScanConfig`].
#[derive(Clone, Debug)]
pub struct ScanConfigBuilder {
    coupling: f64,
    relaxation_constant: f64,
    iteration_count: usize,
    half_width: usize,
    n_widths: usize,
}

impl ScanConfigBuilder {
    /// Defaults to the cavity scan geometry (455 points per half-width, 30 widths).
    pub fn new(coupling: f64, relaxation_constant: f64) -> Self {
        Self {
            coupling,
            relaxation_constant,
            iteration_count: 100_000,
            half_width: 455,
            n_widths: 30,
        }
    }

    pub fn iteration_count(mut self, iterations: usize) -> Self {
        self.iteration_count = iterations;
        self
    }

    pub fn half_width(mut self, points: usize) -> Self {
        self.half_width = points;
        self
    }

    pub fn n_widths(mut self, widths: usize) -> Self {
        self.n_widths = widths;
        self
    }

    /// Finalizes construction after validating every parameter domain.
    pub fn build(self) -> Result<ScanConfig> {
        if !self.coupling.is_finite() {
            return Err(ScanError::invalid("coupling", self.coupling, "finite"));
        }
        if !(self.relaxation_constant.is_finite() && self.relaxation_constant > 0.0) {
            return Err(ScanError::invalid(
                "relaxation constant",
                self.relaxation_constant,
                "finite and strictly positive",
            ));
        }
        if self.iteration_count == 0 {
            return Err(ScanError::invalid("iteration count", 0.0, "at least 1"));
        }
        if self.half_width == 0 {
            return Err(ScanError::invalid("half width", 0.0, "at least 1 point"));
        }
        if self.n_widths == 0 {
            return Err(ScanError::invalid("width count", 0.0, "at least 1"));
        }

        Ok(ScanConfig {
            coupling: self.coupling,
            relaxation_constant: self.relaxation_constant,
            iteration_count: self.iteration_count,
            half_width: self.half_width,
            n_widths: self.n_widths,
        })
    }
}
