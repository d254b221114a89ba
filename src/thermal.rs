//! Causal first-order thermal relaxation of the absorbed power.

use nalgebra::DVector;

use crate::error::{Result, ScanError};
use crate::options::{Normalization, TimeBase};

/// Exponentially weighted low-pass that turns a power field into a temperature field.
///
/// The recurrence runs left to right over the scan axis, so unlike the
/// lineshape it cannot be evaluated point by point in parallel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThermalFilter {
    damping: f64,
    relaxation_constant: f64,
    normalization: Normalization,
}

impl ThermalFilter {
    /// Builds a filter for relaxation constant `x0`, which must be strictly positive.
    pub fn new(
        relaxation_constant: f64,
        half_width: usize,
        normalization: Normalization,
        time_base: TimeBase,
    ) -> Self {
        Self {
            damping: damping_factor(relaxation_constant, half_width, time_base),
            relaxation_constant,
            normalization,
        }
    }

    /// Per-point decay of the running sum.
    pub fn damping(&self) -> f64 {
        self.damping
    }

    pub fn apply(&self, power: &DVector<f64>) -> DVector<f64> {
        let mut temperature = DVector::zeros(power.len());
        self.run(power.as_slice(), temperature.as_mut_slice());
        temperature
    }

    /// Writes the filtered field into an existing buffer of the same length.
    pub fn apply_into(&self, power: &DVector<f64>, temperature: &mut DVector<f64>) -> Result<()> {
        if temperature.len() != power.len() {
            return Err(ScanError::dimension_mismatch(
                "temperature length",
                power.len(),
                temperature.len(),
            ));
        }
        self.run(power.as_slice(), temperature.as_mut_slice());
        Ok(())
    }

    pub(crate) fn run(&self, power: &[f64], out: &mut [f64]) {
        let damp = self.damping;
        let mut running = 0.0_f64;
        match self.normalization {
            Normalization::Weighted => {
                let mut weight = 0.0_f64;
                for (target, &p) in out.iter_mut().zip(power) {
                    running = p + damp * running;
                    weight = 1.0 + damp * weight;
                    *target = running / weight;
                }
            }
            Normalization::RelaxationDivisor => {
                for (target, &p) in out.iter_mut().zip(power) {
                    running = p + damp * running;
                    *target = running / self.relaxation_constant;
                }
            }
            Normalization::Scale(factor) => {
                for (target, &p) in out.iter_mut().zip(power) {
                    running = p + damp * running;
                    *target = factor * running;
                }
            }
        }
    }
}

/// `exp(-1 / x0)`, or `exp(-1 / (x0 * half_width))` when `x0` counts half-widths.
pub fn damping_factor(relaxation_constant: f64, half_width: usize, time_base: TimeBase) -> f64 {
    let scale = match time_base {
        TimeBase::Points => relaxation_constant,
        TimeBase::HalfWidths => relaxation_constant * half_width as f64,
    };
    (-1.0 / scale).exp()
}

/// One-shot convenience wrapper around [`ThermalFilter`].
pub fn relax(
    power: &DVector<f64>,
    relaxation_constant: f64,
    half_width: usize,
    normalization: Normalization,
    time_base: TimeBase,
) -> DVector<f64> {
    ThermalFilter::new(relaxation_constant, half_width, normalization, time_base).apply(power)
}

/// Causal running mean over the trailing `window` points.
///
/// The sum is always divided by the full window, so the first `window - 1`
/// outputs are biased low while the window fills.
pub fn boxcar(field: &DVector<f64>, window: usize) -> DVector<f64> {
    let window = window.max(1);
    let mut smoothed = DVector::zeros(field.len());
    let mut sum = 0.0_f64;
    for i in 0..field.len() {
        sum += field[i];
        if i >= window {
            sum -= field[i - window];
        }
        smoothed[i] = sum / window as f64;
    }
    smoothed
}
