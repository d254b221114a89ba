//! Solver policies: the per-variant knobs of the fixed-point iteration, kept as data.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// How the exponentially weighted thermal sum is normalized.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Normalization {
    /// Divide by the accumulated weight, so `relax(p)[0] == p[0]` and the DC gain is one.
    Weighted,
    /// Divide by the relaxation constant, without warm-up correction.
    RelaxationDivisor,
    /// Multiply the running sum by a fixed scalar.
    Scale(f64),
}

/// Unit in which the relaxation constant is expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeBase {
    /// `damp = exp(-1 / x0)`.
    Points,
    /// `damp = exp(-1 / (x0 * half_width))`, tying the thermal time to the resonance width.
    HalfWidths,
}

/// Temperature update applied on every iteration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum UpdateRule {
    /// `temperature := relax(power)`.
    Substitution,
    /// `temperature += learning_rate * (relax(power) - temperature)`.
    UnderRelaxed { learning_rate: f64 },
}

/// Configuration of the fixed-point iteration that is independent of the scan geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverPolicy {
    pub normalization: Normalization,
    pub time_base: TimeBase,
    pub update: UpdateRule,
    /// Iterations per residual sample; `None` disables the trace.
    pub sample_interval: Option<usize>,
    /// Optional causal boxcar window applied to the filtered temperature.
    pub smoothing: Option<usize>,
    /// Emit a progress line every this many iterations.
    pub report_every: Option<usize>,
}

impl Default for SolverPolicy {
    fn default() -> Self {
        Self::cavity()
    }
}

impl SolverPolicy {
    /// Damped iteration with a warm-up corrected filter and a residual sample every ten steps.
    pub fn cavity() -> Self {
        Self {
            normalization: Normalization::Weighted,
            time_base: TimeBase::HalfWidths,
            update: UpdateRule::UnderRelaxed {
                learning_rate: 0.01,
            },
            sample_interval: Some(10),
            smoothing: None,
            report_every: None,
        }
    }

    /// Plain substitution with the divisor-normalized filter and no residual trace.
    pub fn legacy() -> Self {
        Self {
            normalization: Normalization::RelaxationDivisor,
            time_base: TimeBase::Points,
            update: UpdateRule::Substitution,
            sample_interval: None,
            smoothing: None,
            report_every: None,
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_time_base(mut self, time_base: TimeBase) -> Self {
        self.time_base = time_base;
        self
    }

    /// Switch to under-relaxed updates with the given learning rate.
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.update = UpdateRule::UnderRelaxed { learning_rate };
        self
    }

    /// Switch to plain substitution.
    pub fn with_substitution(mut self) -> Self {
        self.update = UpdateRule::Substitution;
        self
    }

    /// Sample the residual every `interval` iterations; zero disables the trace.
    pub fn with_sample_interval(mut self, interval: usize) -> Self {
        self.sample_interval = (interval > 0).then_some(interval);
        self
    }

    /// Smooth the filtered temperature with a boxcar of `window` points; zero or one disables it.
    pub fn with_smoothing(mut self, window: usize) -> Self {
        self.smoothing = (window > 1).then_some(window);
        self
    }

    pub fn with_progress(mut self, every: usize) -> Self {
        self.report_every = (every > 0).then_some(every);
        self
    }

    /// Checks the scalar knobs; the iteration itself never fails.
    pub fn validate(&self) -> Result<()> {
        if let UpdateRule::UnderRelaxed { learning_rate } = self.update {
            if !(learning_rate.is_finite() && learning_rate > 0.0) {
                return Err(ScanError::invalid(
                    "learning rate",
                    learning_rate,
                    "finite and strictly positive",
                ));
            }
        }
        if let Normalization::Scale(factor) = self.normalization {
            if !factor.is_finite() {
                return Err(ScanError::invalid("filter scale", factor, "finite"));
            }
        }
        Ok(())
    }

    /// Number of residual samples a solve of `iterations` steps produces.
    ///
    /// A trailing window shorter than the interval is dropped, not flushed.
    pub fn trace_len(&self, iterations: usize) -> usize {
        self.sample_interval.map_or(0, |interval| iterations / interval)
    }
}

/// Named bundles of geometry, policy and argument conventions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPreset {
    /// 455-point half-width over 30 widths, damped iteration, non-negative coupling only.
    Cavity,
    /// 450-point half-width over 10 widths, plain substitution, signed coupling.
    Legacy,
}

impl ScanPreset {
    pub fn policy(self) -> SolverPolicy {
        match self {
            Self::Cavity => SolverPolicy::cavity(),
            Self::Legacy => SolverPolicy::legacy(),
        }
    }

    pub fn half_width(self) -> usize {
        match self {
            Self::Cavity => 455,
            Self::Legacy => 450,
        }
    }

    pub fn n_widths(self) -> usize {
        match self {
            Self::Cavity => 30,
            Self::Legacy => 10,
        }
    }

    pub fn default_coupling(self) -> f64 {
        1.0
    }

    pub fn default_relaxation(self) -> f64 {
        match self {
            Self::Cavity => 0.05,
            Self::Legacy => 20.0,
        }
    }

    pub fn default_iterations(self) -> usize {
        100_000
    }

    /// Whether the coupling must be non-negative because the runner derives the down scan.
    pub fn requires_non_negative_coupling(self) -> bool {
        matches!(self, Self::Cavity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_len_drops_partial_window() {
        let policy = SolverPolicy::cavity();
        assert_eq!(policy.trace_len(100), 10);
        assert_eq!(policy.trace_len(109), 10);
        assert_eq!(policy.trace_len(9), 0);
        assert_eq!(policy.clone().with_sample_interval(1).trace_len(109), 109);
        assert_eq!(SolverPolicy::legacy().trace_len(109), 0);
    }

    #[test]
    fn zero_arguments_disable_optional_stages() {
        let policy = SolverPolicy::cavity()
            .with_sample_interval(0)
            .with_smoothing(1)
            .with_progress(0);
        assert_eq!(policy.sample_interval, None);
        assert_eq!(policy.smoothing, None);
        assert_eq!(policy.report_every, None);
    }

    #[test]
    fn validate_rejects_degenerate_learning_rate() {
        assert!(SolverPolicy::cavity().with_learning_rate(0.0).validate().is_err());
        assert!(SolverPolicy::cavity().with_learning_rate(f64::NAN).validate().is_err());
        assert!(SolverPolicy::cavity().with_learning_rate(0.1).validate().is_ok());
    }

    #[test]
    fn presets_parse_from_lowercase_names() {
        let preset: ScanPreset = serde_json::from_str("\"legacy\"").unwrap();
        assert_eq!(preset, ScanPreset::Legacy);
        assert_eq!(preset.policy(), SolverPolicy::legacy());
    }
}
