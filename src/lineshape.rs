//! Lorentzian absorption of a temperature-shifted resonance.

use nalgebra::DVector;
use rayon::prelude::*;

use crate::error::{Result, ScanError};

/// Absorbed power at every scan point for the given temperature field.
///
/// Point `i` sees the static detuning `(i - center) / half_width`, shifted by
/// `-beta * temperature[i]`; the power is the unit-height Lorentzian of the
/// residual detuning. `center` is `n / 2` with integer truncation.
pub fn lineshape(temperature: &DVector<f64>, beta: f64, half_width: f64) -> DVector<f64> {
    let mut power = DVector::zeros(temperature.len());
    fill(temperature.as_slice(), power.as_mut_slice(), beta, half_width);
    power
}

/// In-place variant of [`lineshape`] that reuses the caller's power buffer.
pub fn lineshape_into(
    temperature: &DVector<f64>,
    power: &mut DVector<f64>,
    beta: f64,
    half_width: f64,
) -> Result<()> {
    if power.len() != temperature.len() {
        return Err(ScanError::dimension_mismatch(
            "power length",
            temperature.len(),
            power.len(),
        ));
    }
    fill(temperature.as_slice(), power.as_mut_slice(), beta, half_width);
    Ok(())
}

pub(crate) fn fill(temperature: &[f64], power: &mut [f64], beta: f64, half_width: f64) {
    let center = (temperature.len() / 2) as f64;
    power
        .par_iter_mut()
        .zip(temperature.par_iter())
        .enumerate()
        .for_each(|(index, (out, &t))| {
            let offset = -beta * t + (index as f64 - center) / half_width;
            *out = 1.0 / (1.0 + offset * offset);
        });
}
