//! RNG and numeric helpers (component A).
//!
//! Every chain owns an independent RNG (see `chain::Chain::new`); nothing in
//! this module holds state of its own. `jump` is the single point where the
//! configured proposal shape (`ProposalKind`) is realized as an actual draw.

use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal};

use crate::config::ProposalKind;

/// Draw a uniform value in `[0, 1)`.
#[inline]
pub fn uniform01<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen::<f64>()
}

/// Draw a uniform value in `[-1, 1)`.
#[inline]
pub fn uniform_pm1<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    2.0 * uniform01(rng) - 1.0
}

/// Draw `ln U` for `U` uniform on `(0, 1]`, used throughout as the
/// comparison value for Metropolis-style accept/reject tests.
#[inline]
pub fn log_uniform<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // 1.0 - uniform01 keeps the argument to ln() in (0, 1], avoiding -inf.
    (1.0 - uniform01(rng)).ln()
}

/// Draw a jump `delta` from the configured proposal shape, scaled by `step`.
///
/// This is the only place the three proposal shapes (Gaussian, logistic,
/// flat) are realized; the shape is a configuration-time choice, not a
/// per-step one.
pub fn jump<R: Rng + ?Sized>(rng: &mut R, kind: ProposalKind, step: f64) -> f64 {
    match kind {
        ProposalKind::Gaussian => {
            let z: f64 = StandardNormal.sample(rng);
            z * step
        }
        ProposalKind::Logistic => {
            // Inverse-CDF sampling: if U ~ Uniform(0,1), ln(U/(1-U)) is
            // standard logistic; scale has the same role as Gaussian sigma.
            let u = uniform01(rng).clamp(1e-12, 1.0 - 1e-12);
            step * (u / (1.0 - u)).ln()
        }
        ProposalKind::Flat => step * uniform_pm1(rng),
    }
}

/// Construct a `Normal` distribution, used by callers that want to draw many
/// Gaussian values without re-deriving `sigma` each time.
pub fn gaussian(sigma: f64) -> Normal<f64> {
    Normal::new(0.0, sigma).expect("sigma must be finite and positive")
}

/// Weighted sum `sum(weights[i] * values[i])`.
pub fn weighted_sum(values: &[f64], weights: &[f64]) -> f64 {
    values.iter().zip(weights.iter()).map(|(v, w)| v * w).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn uniform01_in_range() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        for _ in 0..10_000 {
            let u = uniform01(&mut rng);
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn uniform_pm1_in_range() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        for _ in 0..10_000 {
            let u = uniform_pm1(&mut rng);
            assert!((-1.0..1.0).contains(&u));
        }
    }

    #[test]
    fn log_uniform_is_nonpositive() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        for _ in 0..10_000 {
            assert!(log_uniform(&mut rng) <= 0.0);
        }
    }

    #[test]
    fn gaussian_jump_scales_with_step() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let n = 50_000;
        let small: f64 = (0..n).map(|_| jump(&mut rng, ProposalKind::Gaussian, 1.0).powi(2)).sum::<f64>() / n as f64;
        let large: f64 = (0..n).map(|_| jump(&mut rng, ProposalKind::Gaussian, 3.0).powi(2)).sum::<f64>() / n as f64;
        assert!((small - 1.0).abs() < 0.1);
        assert!((large - 9.0).abs() < 1.0);
    }

    #[test]
    fn weighted_sum_basic() {
        let v = vec![1.0, 2.0, 3.0];
        let w = vec![0.5, 0.5, 1.0];
        assert!((weighted_sum(&v, &w) - 4.5).abs() < 1e-12);
    }
}
