//! Dense Levenberg-Marquardt with a forward-difference Jacobian.

use nalgebra::{DMatrix, DVector};

#[derive(Clone, Copy, Debug)]
pub(crate) struct LmOptions {
    pub max_iterations: usize,
    pub initial_lambda: f64,
    /// Stop when the relative cost decrease falls below this.
    pub cost_tolerance: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            initial_lambda: 1e-3,
            cost_tolerance: 1e-12,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct LmReport {
    /// Sum of squared residuals at the returned parameters.
    pub cost: f64,
    pub iterations: usize,
}

/// Minimize `||r(p)||^2` in place. `residuals` writes into a buffer of
/// length `n_residuals`.
pub(crate) fn levenberg_marquardt<F>(
    params: &mut DVector<f64>,
    n_residuals: usize,
    residuals: F,
    opts: LmOptions,
) -> LmReport
where
    F: Fn(&DVector<f64>, &mut DVector<f64>),
{
    let n = params.len();
    let mut r = DVector::zeros(n_residuals);
    let mut r_step = DVector::zeros(n_residuals);
    let mut jac = DMatrix::zeros(n_residuals, n);

    residuals(params, &mut r);
    let mut cost = r.norm_squared();
    let mut lambda = opts.initial_lambda;
    let mut iterations = 0;

    while iterations < opts.max_iterations && cost.is_finite() && cost > 1e-24 {
        iterations += 1;

        for k in 0..n {
            let h = 1e-6 * params[k].abs().max(1.0);
            let mut trial = params.clone();
            trial[k] += h;
            residuals(&trial, &mut r_step);
            let mut col = jac.column_mut(k);
            col.copy_from(&((&r_step - &r) / h));
        }

        let jtj = jac.transpose() * &jac;
        let neg_jtr = -(jac.transpose() * &r);

        let mut improved = false;
        for _ in 0..10 {
            let mut a = jtj.clone();
            for d in 0..n {
                a[(d, d)] += lambda * jtj[(d, d)].max(1e-12);
            }
            let Some(chol) = a.cholesky() else {
                lambda *= 10.0;
                continue;
            };
            let delta = chol.solve(&neg_jtr);
            let candidate = &*params + &delta;
            residuals(&candidate, &mut r_step);
            let new_cost = r_step.norm_squared();

            if new_cost.is_finite() && new_cost < cost {
                let rel = (cost - new_cost) / cost.max(1e-300);
                *params = candidate;
                std::mem::swap(&mut r, &mut r_step);
                cost = new_cost;
                lambda = (lambda / 10.0).max(1e-12);
                improved = true;
                if rel < opts.cost_tolerance {
                    return LmReport { cost, iterations };
                }
                break;
            }
            lambda *= 10.0;
        }
        if !improved {
            break;
        }
    }

    LmReport { cost, iterations }
}
