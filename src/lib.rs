//! Self-consistent thermo-optic response of a swept optical cavity.
//!
//! Absorbed optical power heats the medium, and the temperature shifts the
//! resonance, which in turn changes the power absorbed at each point of a
//! frequency sweep. This crate computes the steady `(temperature, power)`
//! pair of a one-dimensional sweep by fixed-point iteration. It offers tools to
//!
//! - describe the scan geometry and physical parameters (`config` module),
//! - evaluate the Lorentzian absorption of a shifted resonance (`lineshape` module),
//! - apply the causal thermal relaxation filter (`thermal` module),
//! - iterate both to their joint fixed point with residual tracking (`solving` module),
//! - run the up and down sweeps of one parameter set (`runner` module), and
//! - store the resulting arrays in an atomically published archive (`persist` module).
//!
//! # Quick start
//!
//! ```no_run
//! use cavity_scan::{ScanConfig, ScanRunner, SolverPolicy};
//! use cavity_scan::persist::write_atomic;
//! use cavity_scan::runner::default_file_name;
//! use std::path::Path;
//!
//! let config = ScanConfig::builder(1.0, 0.05)
//!     .iteration_count(10_000)
//!     .build()
//!     .expect("valid parameters");
//!
//! let runner = ScanRunner::new(config.clone(), SolverPolicy::cavity()).expect("valid policy");
//! let result = runner.run();
//! println!("final residual (up): {:?}", result.up.summary.final_residual);
//!
//! write_atomic(Path::new("data"), &default_file_name(&config), &result.records())
//!     .expect("archive written");
//! ```
//!
//! The iteration count is fixed and divergence is only reported, never
//! corrected: a solve that blows up hands its non-finite fields back to the
//! caller together with a warning in the log.

pub mod config;
pub mod error;
pub mod lineshape;
pub mod options;
pub mod persist;
pub mod runner;
pub mod solving;
pub mod thermal;

pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::{Result, ScanError};
pub use options::{Normalization, ScanPreset, SolverPolicy, TimeBase, UpdateRule};
pub use runner::{ScanResult, ScanRunner};
pub use solving::{FixedPointSolver, ResidualTrace, ScanSolution, SolveSummary};
