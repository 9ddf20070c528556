//! Temperature-ladder construction (component E).
//!
//! Chain 0 is always the posterior chain (`beta = 1.0`); chain `n_beta - 1`
//! is the hottest (`beta = beta_0`). All six laws below produce a
//! monotonically decreasing sequence between those two endpoints; they
//! differ only in which space (beta, temperature, or step width) is spaced
//! evenly or at Chebyshev nodes.

use crate::config::BetaLadder;
use crate::error::{Result, SamplerError};

/// Automatic `beta_0`: the inverse square root of the largest per-parameter
/// normalized range, `max_i((max_i - min_i) / step_i / factor_i)`. A wider
/// range needs a hotter (smaller-beta) chain to explore it freely.
pub fn calc_beta_0(ranges: &[f64]) -> f64 {
    let max_range = ranges.iter().cloned().fold(0.0_f64, f64::max);
    if max_range <= 0.0 {
        1.0
    } else {
        max_range.powf(-0.5)
    }
}

/// Linear fraction in `[0, 1]`: `1.0` at `i == 0`, `0.0` at `i == n - 1`.
fn linear_fraction(i: usize, n: usize) -> f64 {
    if n <= 1 {
        0.0
    } else {
        1.0 - i as f64 / (n as f64 - 1.0)
    }
}

/// Chebyshev node mapped to `[0, 1]` with the same endpoints as
/// `linear_fraction`, clustering points near both ends.
fn chebyshev_fraction(i: usize, n: usize) -> f64 {
    if n <= 1 {
        0.0
    } else {
        let theta = std::f64::consts::PI * i as f64 / (n as f64 - 1.0);
        0.5 * (1.0 + theta.cos())
    }
}

fn beta_from_fraction(frac: f64, beta_0: f64) -> f64 {
    beta_0 + frac * (1.0 - beta_0)
}

fn beta_from_temperature_fraction(frac: f64, beta_0: f64) -> f64 {
    let t_max = 1.0 / beta_0;
    let t = 1.0 + (1.0 - frac) * (t_max - 1.0);
    1.0 / t
}

fn beta_from_stepwidth_fraction(frac: f64, beta_0: f64) -> f64 {
    beta_0 + frac * frac * (1.0 - beta_0)
}

/// Build the full ladder of betas, `ladder[0] == 1.0`, `ladder[n_beta - 1]
/// == beta_0`, strictly decreasing in between.
pub fn beta_ladder(law: BetaLadder, n_beta: usize, beta_0: f64) -> Vec<f64> {
    if n_beta == 0 {
        return Vec::new();
    }
    if n_beta == 1 {
        return vec![1.0];
    }
    (0..n_beta)
        .map(|i| match law {
            BetaLadder::EquidistantBeta => beta_from_fraction(linear_fraction(i, n_beta), beta_0),
            BetaLadder::ChebyshevBeta => beta_from_fraction(chebyshev_fraction(i, n_beta), beta_0),
            BetaLadder::EquidistantTemperature => {
                beta_from_temperature_fraction(linear_fraction(i, n_beta), beta_0)
            }
            BetaLadder::ChebyshevTemperature => {
                beta_from_temperature_fraction(chebyshev_fraction(i, n_beta), beta_0)
            }
            BetaLadder::EquidistantStepwidth => {
                beta_from_stepwidth_fraction(linear_fraction(i, n_beta), beta_0)
            }
            BetaLadder::ChebyshevStepwidth => {
                beta_from_stepwidth_fraction(chebyshev_fraction(i, n_beta), beta_0)
            }
        })
        .collect()
}

/// Confirm a ladder is strictly decreasing, as required by the swap
/// protocol (component F).
pub fn validate_monotone(betas: &[f64]) -> Result<()> {
    for i in 1..betas.len() {
        if betas[i] >= betas[i - 1] {
            return Err(SamplerError::BetaNotMonotone {
                chain: i,
                beta: betas[i],
                previous: betas[i - 1],
            });
        }
    }
    Ok(())
}
