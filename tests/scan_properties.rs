use approx::assert_relative_eq;
use cavity_scan::lineshape::{lineshape, lineshape_into};
use cavity_scan::persist::{read_records, write_atomic};
use cavity_scan::runner::default_file_name;
use cavity_scan::thermal::ThermalFilter;
use cavity_scan::{FixedPointSolver, Normalization, ScanConfig, ScanRunner, SolverPolicy, TimeBase};
use nalgebra::DVector;
use tempfile::TempDir;

fn config(beta: f64, x0: f64, iterations: usize, half_width: usize, n_widths: usize) -> ScanConfig {
    ScanConfig::builder(beta, x0)
        .iteration_count(iterations)
        .half_width(half_width)
        .n_widths(n_widths)
        .build()
        .unwrap()
}

/// With no coupling the profile is the bare Lorentzian, whatever the temperature.
#[test]
fn uncoupled_power_is_static_lorentzian() {
    let config = config(0.0, 1.0, 1, 455, 30);
    let temperature = DVector::from_fn(config.n_points(), |i, _| (i % 17) as f64);
    let power = lineshape(&temperature, 0.0, config.half_width() as f64);

    assert_eq!(power[config.center()], 1.0);
    for i in (0..config.n_points()).step_by(97) {
        let detuning = (i as f64 - config.center() as f64) / 455.0;
        assert_relative_eq!(power[i], 1.0 / (1.0 + detuning * detuning), epsilon = 1e-15);
    }
}

/// Without coupling the power never changes, so one substitution reaches the fixed point.
#[test]
fn zero_coupling_substitution_is_immediately_stationary() {
    let policy = SolverPolicy::cavity().with_substitution().with_sample_interval(1);
    let once = FixedPointSolver::new(config(0.0, 0.05, 1, 40, 5), policy.clone())
        .unwrap()
        .solve();
    let twice = FixedPointSolver::new(config(0.0, 0.05, 2, 40, 5), policy)
        .unwrap()
        .solve();

    assert_relative_eq!(once.temperature, twice.temperature, epsilon = 1e-15);
    assert_relative_eq!(once.power, twice.power, epsilon = 1e-15);
    assert_eq!(twice.residuals.samples()[1], 0.0);
}

/// Alternating the in-place kernels by hand reproduces the solver bit for bit.
#[test]
fn in_place_kernels_reproduce_substitution_solve() {
    let config = config(0.7, 3.0, 25, 30, 4);
    let policy = SolverPolicy::legacy();
    let solution = FixedPointSolver::new(config.clone(), policy).unwrap().solve();

    let half_width = config.half_width() as f64;
    let filter = ThermalFilter::new(3.0, 30, Normalization::RelaxationDivisor, TimeBase::Points);
    let mut temperature = DVector::zeros(config.n_points());
    let mut power = DVector::zeros(config.n_points());
    lineshape_into(&temperature, &mut power, 0.7, half_width).unwrap();
    for _ in 0..config.iteration_count() {
        filter.apply_into(&power, &mut temperature).unwrap();
        lineshape_into(&temperature, &mut power, 0.7, half_width).unwrap();
    }

    assert_eq!(solution.temperature, temperature);
    assert_eq!(solution.power, power);
}

#[test]
fn trace_length_is_iterations_over_interval() {
    for (iterations, interval, expected) in [(37, 1, 37), (37, 10, 3), (40, 10, 4), (9, 10, 0)] {
        let policy = SolverPolicy::cavity().with_sample_interval(interval);
        let solution = FixedPointSolver::new(config(1.0, 0.05, iterations, 10, 3), policy)
            .unwrap()
            .solve();
        assert_eq!(solution.residuals.len(), expected, "{iterations} / {interval}");
    }
}

/// Full-size geometry with a reduced iteration count.
#[test]
fn end_to_end_scan_fields_are_bounded_and_oriented() {
    let config = config(1.0, 0.05, 1_000, 455, 30);
    let runner = ScanRunner::new(config.clone(), SolverPolicy::cavity()).unwrap();
    let result = runner.run();

    assert_eq!(result.up.temperature.len(), 27_300);
    assert_eq!(result.up.power.len(), 27_300);
    assert!(result.up.power.iter().all(|&p| p > 0.0 && p <= 1.0));
    assert_eq!(result.up.residuals.len(), 100);

    let direct = FixedPointSolver::new(config.reversed(), SolverPolicy::cavity())
        .unwrap()
        .solve_unoriented();
    let n = direct.temperature.len();
    for i in 0..n {
        assert_eq!(result.down.temperature[i], direct.temperature[n - 1 - i]);
        assert_eq!(result.down.power[i], direct.power[n - 1 - i]);
    }
}

/// The thermal filter lags behind the sweep, so the down scan is not the mirror
/// image of the up scan even after reorientation.
#[test]
fn causal_lag_breaks_up_down_mirror_symmetry() {
    let result = ScanRunner::new(config(1.0, 1.0, 2_000, 50, 5), SolverPolicy::cavity())
        .unwrap()
        .run();

    let max_gap = result
        .up
        .temperature
        .iter()
        .zip(result.down.temperature.iter())
        .map(|(up, down)| (up - down).abs())
        .fold(0.0, f64::max);
    assert!(max_gap > 1e-3, "up and down temperatures agree to {max_gap}");
}

#[test]
fn damped_iteration_residual_decays() {
    let policy = SolverPolicy::cavity().with_sample_interval(10);
    let solution = FixedPointSolver::new(config(1.0, 0.05, 5_000, 20, 5), policy)
        .unwrap()
        .solve();
    let samples = solution.residuals.samples();

    let first = samples[0];
    let last = solution.summary.final_residual.unwrap();
    assert!(last < 1e-4 * first, "residual {last} did not decay from {first}");

    let quarter = samples.len() / 4;
    let early_min = samples[..quarter].iter().cloned().fold(f64::INFINITY, f64::min);
    let late_max = samples[3 * quarter..].iter().cloned().fold(0.0, f64::max);
    assert!(late_max < early_min);
}

#[test]
fn scan_archive_round_trips_through_disk() {
    let config = config(1.0, 0.05, 30, 10, 3);
    let result = ScanRunner::new(config.clone(), SolverPolicy::cavity())
        .unwrap()
        .run();
    let dir = TempDir::new().unwrap();

    let path = write_atomic(dir.path(), &default_file_name(&config), &result.records()).unwrap();
    let stored = read_records(&path).unwrap();

    assert_eq!(stored.len(), 6);
    for (name, values) in result.records() {
        let (_, read) = stored.iter().find(|(stored_name, _)| stored_name == name).unwrap();
        assert_eq!(read.as_slice(), values);
    }
}

/// Known-good convergence on the production geometry. Slow: run with `--ignored`.
#[test]
#[ignore]
fn production_parameters_converge_below_one_ppm() {
    let solution = FixedPointSolver::new(config(1.0, 0.05, 100_000, 455, 30), SolverPolicy::cavity())
        .unwrap()
        .solve();
    assert_eq!(solution.residuals.len(), 10_000);
    assert!(solution.summary.final_residual.unwrap() < 1e-6);
}
