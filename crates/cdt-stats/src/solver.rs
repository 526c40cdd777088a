//! Damped Gauss-Newton (Levenberg-Marquardt) least squares shared by the fits.

use cdt_core::errors::{CdtError, ErrorInfo};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::fit::FitOpts;

const LAMBDA_START: f64 = 1e-3;
const LAMBDA_FLOOR: f64 = 1e-12;
const LAMBDA_CEILING: f64 = 1e16;
const MIN_DIAGONAL: f64 = 1e-12;

/// Parametric model `y = f(x; p)` with an analytic gradient.
pub(crate) trait Model {
    /// Parameter names in the order of the parameter vector.
    fn names(&self) -> &'static [&'static str];

    /// Model value at `x`.
    fn eval(&self, x: f64, params: &[f64]) -> f64;

    /// Partial derivatives with respect to each parameter at `x`.
    fn gradient(&self, x: f64, params: &[f64], out: &mut [f64]);

    /// Whether `params` lies inside the model's domain for every abscissa.
    fn admissible(&self, _params: &[f64], _xs: &[f64]) -> bool {
        true
    }
}

/// Observations entering a fit, with per-point weights `1 / sigma`.
pub(crate) struct Problem<'a> {
    pub xs: &'a [f64],
    pub ys: &'a [f64],
    pub weights: Vec<f64>,
}

impl<'a> Problem<'a> {
    pub fn new(xs: &'a [f64], ys: &'a [f64], sigma: Option<&[f64]>) -> Result<Self, CdtError> {
        if xs.len() != ys.len() {
            return Err(CdtError::Shape(
                ErrorInfo::new("length-mismatch", "abscissa and ordinate lengths differ")
                    .with_context("x_len", xs.len())
                    .with_context("y_len", ys.len()),
            ));
        }
        if let Some(bad) = xs.iter().chain(ys).find(|value| !value.is_finite()) {
            return Err(CdtError::Shape(
                ErrorInfo::new("non-finite-input", "fit input contains a non-finite value")
                    .with_context("value", bad),
            ));
        }
        let weights = match sigma {
            None => vec![1.0; xs.len()],
            Some(sigma) => {
                if sigma.len() != xs.len() {
                    return Err(CdtError::Shape(
                        ErrorInfo::new("length-mismatch", "sigma length differs from the data")
                            .with_context("sigma_len", sigma.len())
                            .with_context("y_len", ys.len()),
                    ));
                }
                if let Some(idx) = sigma.iter().position(|&s| !(s > 0.0 && s.is_finite())) {
                    return Err(CdtError::Range(
                        ErrorInfo::new("sigma", "uncertainties must be positive and finite")
                            .with_context("index", idx),
                    ));
                }
                sigma.iter().map(|s| 1.0 / s).collect()
            }
        };
        Ok(Self { xs, ys, weights })
    }
}

/// Converged least-squares solution.
#[derive(Debug, Clone)]
pub(crate) struct Solution {
    pub params: Vec<f64>,
    pub covariance: DMatrix<f64>,
    pub residuals: Vec<f64>,
    pub sse: f64,
    pub iterations: usize,
}

impl Solution {
    pub fn stderr(&self, idx: usize) -> f64 {
        self.covariance[(idx, idx)].max(0.0).sqrt()
    }
}

fn linearise(
    model: &dyn Model,
    problem: &Problem<'_>,
    params: &[f64],
) -> (DMatrix<f64>, DVector<f64>) {
    let rows = problem.xs.len();
    let cols = params.len();
    let mut jacobian = DMatrix::<f64>::zeros(rows, cols);
    let mut residuals = DVector::<f64>::zeros(rows);
    let mut grad = vec![0.0; cols];
    for (row, ((&x, &y), &w)) in problem
        .xs
        .iter()
        .zip(problem.ys)
        .zip(&problem.weights)
        .enumerate()
    {
        residuals[row] = w * (y - model.eval(x, params));
        model.gradient(x, params, &mut grad);
        for (col, g) in grad.iter().enumerate() {
            jacobian[(row, col)] = w * g;
        }
    }
    (jacobian, residuals)
}

fn not_converged(code: &str, message: &str, iterations: usize, sse: f64) -> CdtError {
    CdtError::FitConvergence(
        ErrorInfo::new(code, message)
            .with_context("iterations", iterations)
            .with_context("sse", sse),
    )
}

/// Minimises the weighted squared residuals of `model` starting from `initial`.
pub(crate) fn levenberg_marquardt(
    model: &dyn Model,
    problem: &Problem<'_>,
    initial: Vec<f64>,
    opts: &FitOpts,
) -> Result<Solution, CdtError> {
    let n = problem.xs.len();
    let p = initial.len();
    if n <= p {
        return Err(CdtError::Shape(
            ErrorInfo::new("insufficient-samples", "fit needs more samples than parameters")
                .with_context("samples", n)
                .with_context("parameters", p),
        ));
    }
    if !model.admissible(&initial, problem.xs) {
        return Err(CdtError::FitConvergence(
            ErrorInfo::new("initial-guess", "initial parameters lie outside the model domain")
                .with_context("initial", format!("{initial:?}")),
        ));
    }

    let mut params = DVector::from_vec(initial);
    let (mut jacobian, mut residuals) = linearise(model, problem, params.as_slice());
    let mut sse = residuals.norm_squared();
    if !sse.is_finite() {
        return Err(not_converged("non-finite", "initial residuals are not finite", 0, sse));
    }

    let mut lambda = LAMBDA_START;
    let mut iterations = 0;
    let mut converged = sse == 0.0;
    while !converged {
        if iterations >= opts.max_iters {
            return Err(not_converged(
                "max-iterations",
                "least squares did not converge within the iteration budget",
                iterations,
                sse,
            ));
        }
        iterations += 1;
        let jtj = jacobian.transpose() * &jacobian;
        let jtr = jacobian.transpose() * &residuals;
        if jtr.amax() == 0.0 {
            break;
        }

        loop {
            let mut damped = jtj.clone();
            for k in 0..p {
                damped[(k, k)] += lambda * jtj[(k, k)].max(MIN_DIAGONAL);
            }
            let step = damped.cholesky().map(|factor| factor.solve(&jtr));
            if let Some(step) = step {
                let rel_step = step.norm() / (params.norm() + opts.xtol);
                let candidate = &params + &step;
                if model.admissible(candidate.as_slice(), problem.xs) {
                    let (trial_jacobian, trial_residuals) =
                        linearise(model, problem, candidate.as_slice());
                    let trial_sse = trial_residuals.norm_squared();
                    if trial_sse.is_finite() && trial_sse < sse {
                        let reduction = (sse - trial_sse) / sse;
                        params = candidate;
                        jacobian = trial_jacobian;
                        residuals = trial_residuals;
                        sse = trial_sse;
                        lambda = (lambda / 10.0).max(LAMBDA_FLOOR);
                        converged = sse == 0.0 || rel_step <= opts.xtol || reduction <= opts.ftol;
                        break;
                    }
                }
                if rel_step <= opts.xtol {
                    converged = true;
                    break;
                }
            }
            lambda *= 10.0;
            if lambda > LAMBDA_CEILING {
                return Err(not_converged(
                    "damping-exhausted",
                    "no step reduces the residuals",
                    iterations,
                    sse,
                ));
            }
        }
        debug!(iterations, sse, lambda, "levenberg-marquardt step");
    }

    let jtj = jacobian.transpose() * &jacobian;
    let inverse = jtj.try_inverse().ok_or_else(|| {
        not_converged(
            "singular-covariance",
            "normal matrix is singular at the solution",
            iterations,
            sse,
        )
    })?;
    let covariance = if opts.absolute_sigma {
        inverse
    } else {
        inverse * (sse / (n - p) as f64)
    };
    let residuals = problem
        .xs
        .iter()
        .zip(problem.ys)
        .map(|(&x, &y)| y - model.eval(x, params.as_slice()))
        .collect();
    debug!(
        model = ?model.names(),
        iterations,
        sse,
        "least squares converged"
    );
    Ok(Solution {
        params: params.as_slice().to_vec(),
        covariance,
        residuals,
        sse,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Line;

    impl Model for Line {
        fn names(&self) -> &'static [&'static str] {
            &["slope", "intercept"]
        }

        fn eval(&self, x: f64, params: &[f64]) -> f64 {
            params[0] * x + params[1]
        }

        fn gradient(&self, x: f64, _params: &[f64], out: &mut [f64]) {
            out[0] = x;
            out[1] = 1.0;
        }
    }

    #[test]
    fn recovers_linear_model() {
        let xs: Vec<f64> = (0..10).map(f64::from).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x - 1.0).collect();
        let problem = Problem::new(&xs, &ys, None).unwrap();
        let solution = levenberg_marquardt(&Line, &problem, vec![0.0, 0.0], &FitOpts::default())
            .expect("converges");
        assert!((solution.params[0] - 2.0).abs() < 1e-8);
        assert!((solution.params[1] + 1.0).abs() < 1e-8);
        assert!(solution.stderr(0) < 1e-6);
    }

    #[test]
    fn absolute_sigma_keeps_unscaled_covariance() {
        let xs: Vec<f64> = (0..6).map(f64::from).collect();
        let ys = vec![0.1, 0.9, 2.1, 2.9, 4.2, 4.8];
        let sigma = vec![0.5; 6];
        let problem = Problem::new(&xs, &ys, Some(&sigma)).unwrap();
        let opts = FitOpts {
            absolute_sigma: true,
            ..FitOpts::default()
        };
        let solution = levenberg_marquardt(&Line, &problem, vec![1.0, 0.0], &opts).unwrap();
        // (J^T W J)^-1 for the slope: sigma^2 / sum (x - mean)^2 = 0.25 / 17.5
        assert!((solution.covariance[(0, 0)] - 0.25 / 17.5).abs() < 1e-9);
    }

    #[test]
    fn too_few_samples_rejected() {
        let xs = [1.0, 2.0];
        let ys = [1.0, 2.0];
        let problem = Problem::new(&xs, &ys, None).unwrap();
        let err = levenberg_marquardt(&Line, &problem, vec![0.0, 0.0], &FitOpts::default())
            .unwrap_err();
        assert!(matches!(err, CdtError::Shape(_)));
    }

    #[test]
    fn bad_sigma_rejected() {
        let xs = [1.0, 2.0, 3.0];
        let ys = [1.0, 2.0, 3.0];
        assert!(matches!(
            Problem::new(&xs, &ys, Some(&[1.0, 0.0, 1.0])),
            Err(CdtError::Range(_))
        ));
        assert!(matches!(
            Problem::new(&xs, &ys[..2], None),
            Err(CdtError::Shape(_))
        ));
    }
}
