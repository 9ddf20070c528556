//! Burn-in and step-width calibration (component D).
//!
//! All four strategies converge on the same contract: given a chain sitting
//! at a fixed beta, adjust `params_step` until each parameter's acceptance
//! rate is acceptably close to the per-parameter target implied by
//! `target_acceptance_rate`. `calibrate` runs burn-in once and then
//! dispatches to whichever strategy the config names.

use itertools::izip;
use rand::Rng;

use crate::chain::Chain;
use crate::config::{CalibrationStrategy, SamplerConfig};
use crate::error::{Result, SamplerError};
use crate::model::Model;
use crate::proposal::step_all;

/// Ordinary least squares fit of `y = a*x + b`, weighted by `weights`.
/// Returns `(a, b)`. Falls back to `(0.0, mean(y))` when the weighted
/// variance of `x` is degenerate.
fn weighted_linreg(xs: &[f64], ys: &[f64], weights: &[f64]) -> (f64, f64) {
    let w_sum: f64 = weights.iter().sum();
    if w_sum <= 0.0 {
        return (0.0, 0.0);
    }
    let x_mean: f64 = izip!(xs, weights).map(|(x, w)| x * w).sum::<f64>() / w_sum;
    let y_mean: f64 = izip!(ys, weights).map(|(y, w)| y * w).sum::<f64>() / w_sum;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y, w) in izip!(xs, ys, weights) {
        let dx = x - x_mean;
        sxx += w * dx * dx;
        sxy += w * dx * (y - y_mean);
    }
    if sxx.abs() < 1e-15 {
        return (0.0, y_mean);
    }
    let a = sxy / sxx;
    let b = y_mean - a * x_mean;
    (a, b)
}

/// Per-parameter target acceptance rate implied by the global target: the
/// original spreads the global rate evenly across dimensions via an
/// `n_par`-th root.
fn per_param_target(config: &SamplerConfig, n_par: usize) -> f64 {
    config.target_acceptance_rate.powf(1.0 / n_par.max(1) as f64)
}

/// Run a fixed number of full sweeps and report the resulting global and
/// per-parameter acceptance rates, doubling the sample count (by a factor
/// of 8, matching the original) until the observed rate's standard error is
/// within `accuracy_deviation_factor` of the gap to `target`, or `max_n` is
/// reached.
pub fn assess_acceptance_rate<R: Rng, M: Model>(
    chain: &mut Chain<R>,
    model: &mut M,
    config: &SamplerConfig,
    target: f64,
    max_n: u64,
) -> (f64, u64) {
    let mut n: u64 = 10;
    loop {
        chain.reset_accept_reject();
        for _ in 0..n {
            step_all(chain, model, config.proposal, &config.circular_params);
        }
        let rate = chain.acceptance_rate_global();
        let gap = (target - rate).abs().max(1e-6);
        let required_accuracy = config.accuracy_deviation_factor * gap;
        let stderr_est = (rate * (1.0 - rate) / n as f64).max(0.0).sqrt();
        if stderr_est <= required_accuracy || n >= max_n {
            return (rate, n);
        }
        n = (n * 8).min(max_n);
    }
}

/// Two-phase burn-in: widen the step to 10% of each parameter's range for
/// the first half of `burn_in_iterations`, snap back to the best position
/// seen so far, run the second half at half the original step, then restore
/// the original step widths.
pub fn burn_in<R: Rng, M: Model>(
    chain: &mut Chain<R>,
    model: &mut M,
    config: &SamplerConfig,
    burn_in_iterations: usize,
) {
    if burn_in_iterations == 0 {
        return;
    }
    let original_step = chain.params_step().clone();
    let half = burn_in_iterations / 2;

    for i in 0..chain.n_par() {
        let range = chain.params_max()[i] - chain.params_min()[i];
        chain.params_step_mut()[i] = 0.1 * range;
    }
    for _ in 0..half {
        step_all(chain, model, config.proposal, &config.circular_params);
    }

    chain.restart_from_best();

    for i in 0..chain.n_par() {
        chain.params_step_mut()[i] = 0.5 * original_step[i];
    }
    for _ in 0..(burn_in_iterations - half) {
        step_all(chain, model, config.proposal, &config.circular_params);
    }

    for i in 0..chain.n_par() {
        chain.params_step_mut()[i] = original_step[i];
    }
}

/// Proportional calibration, the default strategy: repeatedly run
/// `iter_readjust` steps, shrink or grow each parameter's step by `mul`
/// whenever its acceptance rate falls outside a fixed `rat_limit +/- 0.05`
/// band around the per-parameter target, then run another `iter_readjust`
/// steps from the best position seen so far to read off the chain's global
/// acceptance rate. `rat_limit` itself drifts by a factor of `0.99` per
/// round toward whichever side would close the gap between that global
/// rate and `target_acceptance_rate`. Calibration stops once
/// `no_rescaling_limit` consecutive rounds rescaled nothing AND the global
/// rate is within `max_ar_deviation` of target.
fn calibrate_proportional<R: Rng, M: Model>(
    chain: &mut Chain<R>,
    model: &mut M,
    config: &SamplerConfig,
) -> Result<u64> {
    let mut rat_limit = per_param_target(config, chain.n_par());
    let mut no_change_count = 0usize;
    let mut iter: u64 = 0;
    let iter_limit = (config.iter_limit * chain.n_par().max(1)) as u64;

    loop {
        chain.reset_accept_reject();
        for _ in 0..config.iter_readjust {
            step_all(chain, model, config.proposal, &config.circular_params);
        }
        iter += config.iter_readjust as u64;

        let mut changed = false;
        for i in 0..chain.n_par() {
            let rate = chain.acceptance_rate_for(i);
            let lo = rat_limit - 0.05;
            let hi = rat_limit + 0.05;
            let range = chain.params_max()[i] - chain.params_min()[i];
            if rate > hi {
                chain.params_step_mut()[i] /= config.mul;
                changed = true;
            } else if rate < lo {
                chain.params_step_mut()[i] *= config.mul;
                changed = true;
            }
            let step = chain.params_step()[i];
            if step > 10_000.0 * range || !step.is_finite() {
                return Err(SamplerError::CalibrationFailed {
                    reason: format!("parameter {} step width diverged to {}", i, step),
                });
            }
        }

        chain.restart_from_best();
        chain.reset_accept_reject();
        for _ in 0..config.iter_readjust {
            step_all(chain, model, config.proposal, &config.circular_params);
        }
        iter += config.iter_readjust as u64;

        if changed {
            no_change_count = 0;
        } else {
            no_change_count += 1;
        }

        let global_gap = chain.acceptance_rate_global() - config.target_acceptance_rate;
        let reached_perfection = global_gap.abs() < config.max_ar_deviation;
        if !reached_perfection {
            if global_gap < 0.0 {
                rat_limit /= 0.99;
            } else {
                rat_limit *= 0.99;
            }
        }

        if no_change_count >= config.no_rescaling_limit && reached_perfection && !changed {
            break;
        }
        if iter >= iter_limit {
            return Err(SamplerError::CalibrationFailed {
                reason: "proportional calibration exceeded iteration budget".to_string(),
            });
        }
    }
    Ok(iter)
}

/// Linear-regression calibration: accumulate `(ln step, acceptance rate)`
/// observations per parameter across rounds and solve the fitted line for
/// the step that hits the per-parameter target.
fn calibrate_linear_regression<R: Rng, M: Model>(
    chain: &mut Chain<R>,
    model: &mut M,
    config: &SamplerConfig,
) -> Result<u64> {
    let target = per_param_target(config, chain.n_par());
    let rounds = config.iter_readjust.max(1).min(50);
    let mut history: Vec<(Vec<f64>, Vec<f64>)> = vec![(Vec::new(), Vec::new()); chain.n_par()];
    let mut iter: u64 = 0;

    for _ in 0..rounds {
        chain.reset_accept_reject();
        for _ in 0..config.iter_readjust {
            step_all(chain, model, config.proposal, &config.circular_params);
        }
        iter += config.iter_readjust as u64;

        for i in 0..chain.n_par() {
            let rate = chain.acceptance_rate_for(i).clamp(1e-6, 1.0 - 1e-6);
            let ln_step = chain.params_step()[i].max(1e-12).ln();
            history[i].0.push(ln_step);
            history[i].1.push(rate);
        }
    }

    for i in 0..chain.n_par() {
        let (xs, ys) = &history[i];
        let weights = vec![1.0; xs.len()];
        let (a, b) = weighted_linreg(xs, ys, &weights);
        let range = chain.params_max()[i] - chain.params_min()[i];
        let new_step = if a.abs() > 1e-12 {
            (((target - b) / a).exp()).clamp(range * 1e-6, range * 10_000.0)
        } else {
            chain.params_step()[i]
        };
        chain.params_step_mut()[i] = new_step;
    }
    Ok(iter)
}

/// Quadratic calibration: probe three step widths per parameter (half,
/// current, double), fit a quadratic to `(step, rate)`, and solve it for
/// the target rate; falls back to `calibrate_linear_regression` for any
/// parameter whose quadratic has no real root in range.
fn calibrate_quadratic<R: Rng, M: Model>(
    chain: &mut Chain<R>,
    model: &mut M,
    config: &SamplerConfig,
) -> Result<u64> {
    let target = per_param_target(config, chain.n_par());
    let probe_iters = config.iter_readjust.max(1);
    let mut iter: u64 = 0;
    let mut needs_fallback = false;

    for i in 0..chain.n_par() {
        let base_step = chain.params_step()[i];
        let probes = [0.5 * base_step, base_step, 2.0 * base_step];
        let mut xs = Vec::with_capacity(3);
        let mut ys = Vec::with_capacity(3);
        for &step in &probes {
            chain.params_step_mut()[i] = step;
            chain.reset_accept_reject();
            for _ in 0..probe_iters {
                step_all(chain, model, config.proposal, &config.circular_params);
            }
            iter += probe_iters as u64;
            xs.push(step);
            ys.push(chain.acceptance_rate_for(i));
        }
        chain.params_step_mut()[i] = base_step;

        // Fit a*x^2+b*x+c through the three probe points.
        let (x0, x1, x2) = (xs[0], xs[1], xs[2]);
        let (y0, y1, y2) = (ys[0], ys[1], ys[2]);
        let denom = (x0 - x1) * (x0 - x2) * (x1 - x2);
        if denom.abs() < 1e-15 {
            needs_fallback = true;
            continue;
        }
        let a = (x2 * (y1 - y0) + x1 * (y0 - y2) + x0 * (y2 - y1)) / denom;
        let b = (x2 * x2 * (y0 - y1) + x1 * x1 * (y2 - y0) + x0 * x0 * (y1 - y2)) / denom;
        let c = y1 - a * x1 * x1 - b * x1;

        let resolved = if a.abs() < 1e-12 {
            if b.abs() < 1e-12 {
                None
            } else {
                Some((target - c) / b)
            }
        } else {
            let disc = b * b - 4.0 * a * (c - target);
            if disc < 0.0 {
                None
            } else {
                let sq = disc.sqrt();
                let r1 = (-b + sq) / (2.0 * a);
                let r2 = (-b - sq) / (2.0 * a);
                [r1, r2].iter().copied().filter(|r| *r > 0.0).fold(None, |best, r| match best {
                    None => Some(r),
                    Some(b) => Some(if (r - x1).abs() < (b - x1).abs() { r } else { b }),
                })
            }
        };

        match resolved {
            Some(step) if step.is_finite() && step > 0.0 => {
                chain.params_step_mut()[i] = step;
            }
            _ => needs_fallback = true,
        }
    }

    if needs_fallback {
        iter += calibrate_linear_regression(chain, model, config)?;
    }
    Ok(iter)
}

/// Multilinear-regression calibration: spend a fixed `100 * n_par`-sample
/// budget evaluating the whole ensemble's joint acceptance behavior, then
/// run the single-parameter linear-regression solve per dimension against
/// that shared sample.
fn calibrate_multilinear_regression<R: Rng, M: Model>(
    chain: &mut Chain<R>,
    model: &mut M,
    config: &SamplerConfig,
) -> Result<u64> {
    let n_all = 100 * chain.n_par().max(1);
    chain.reset_accept_reject();
    for _ in 0..n_all {
        step_all(chain, model, config.proposal, &config.circular_params);
    }
    let iter = n_all as u64;
    let mut sub_config = config.clone();
    sub_config.iter_readjust = config.iter_readjust.min(n_all).max(1);
    let extra = calibrate_linear_regression(chain, model, &sub_config)?;
    Ok(iter + extra)
}

/// Run burn-in followed by whichever calibration strategy `config` names,
/// returning the number of calibration-phase steps actually taken.
pub fn calibrate<R: Rng, M: Model>(
    chain: &mut Chain<R>,
    model: &mut M,
    config: &SamplerConfig,
) -> Result<u64> {
    burn_in(chain, model, config, config.burn_in_iterations);
    chain.check()?;
    let spent = match config.calibration {
        CalibrationStrategy::Proportional => calibrate_proportional(chain, model, config)?,
        CalibrationStrategy::Quadratic => calibrate_quadratic(chain, model, config)?,
        CalibrationStrategy::LinearRegression => calibrate_linear_regression(chain, model, config)?,
        CalibrationStrategy::MultilinearRegression => {
            calibrate_multilinear_regression(chain, model, config)?
        }
    };
    chain.check()?;
    chain.restart_from_best();
    chain.reset_accept_reject();
    Ok(spent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ParamSpec;
    use nalgebra::DMatrix;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::sync::Arc;

    struct IndependentGaussian;

    impl Model for IndependentGaussian {
        fn calc_model(&mut self, params: &[f64], _old: Option<&[f64]>) -> (f64, f64) {
            let ll: f64 = params.iter().map(|x| -0.5 * x * x).sum();
            (0.0, ll)
        }
        fn calc_model_for(&mut self, params: &[f64], _i: usize, _old_value: f64) -> (f64, f64) {
            self.calc_model(params, None)
        }
    }

    fn make_chain() -> Chain<Xoshiro256PlusPlus> {
        let specs = vec![ParamSpec { start: 0.0, min: -5.0, max: 5.0, name: "x".into(), step: Some(0.5) }];
        let data = Arc::new(DMatrix::zeros(0, 0));
        let rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut chain = Chain::new(&specs, data, rng).unwrap();
        chain.set_beta(1.0);
        chain.set_prob(0.0);
        chain
    }

    #[test]
    fn burn_in_restores_original_step() {
        let mut chain = make_chain();
        let mut model = IndependentGaussian;
        let config = SamplerConfig { burn_in_iterations: 200, ..SamplerConfig::default() };
        let original = chain.params_step().clone();
        burn_in(&mut chain, &mut model, &config, config.burn_in_iterations);
        assert!((chain.params_step()[0] - original[0]).abs() < 1e-12);
    }

    #[test]
    fn proportional_calibration_converges_and_keeps_step_positive() {
        let mut chain = make_chain();
        let mut model = IndependentGaussian;
        let config = SamplerConfig {
            burn_in_iterations: 100,
            iter_readjust: 100,
            no_rescaling_limit: 3,
            ..SamplerConfig::default()
        };
        let spent = calibrate(&mut chain, &mut model, &config).unwrap();
        assert!(spent > 0);
        assert!(chain.params_step()[0] > 0.0);
        chain.check().unwrap();
    }

    #[test]
    fn assess_acceptance_rate_reports_a_plausible_rate() {
        let mut chain = make_chain();
        let mut model = IndependentGaussian;
        let config = SamplerConfig::default();
        let (rate, n) = assess_acceptance_rate(&mut chain, &mut model, &config, 0.23, 10_000);
        assert!((0.0..=1.0).contains(&rate));
        assert!(n > 0);
    }
}
