//! Ensemble container and swap protocol (component F).
//!
//! An `Ensemble` owns the whole temperature ladder of chains, indexed 0
//! (posterior, beta = 1.0) through `n_beta - 1` (hottest). Swaps only ever
//! happen between adjacent indices, so accepting one never needs to touch a
//! third chain.

use rand::Rng;

use crate::chain::Chain;
use crate::config::SwapPolicy;
use crate::error::Result;
use crate::ladder::validate_monotone;
use crate::rng::log_uniform;

/// Log-acceptance ratio for exchanging the positions of two adjacent
/// chains. `prob_a`/`prob_b` are each chain's own tempered log-posterior;
/// accept the swap when the returned value exceeds a draw from
/// `log_uniform`.
pub fn swap_log_acceptance(beta_a: f64, prob_a: f64, beta_b: f64, prob_b: f64) -> f64 {
    beta_a * prob_b / beta_b + beta_b * prob_a / beta_a - (prob_a + prob_b)
}

/// Exchange two chains' parameter vectors, bump both swap counters, and
/// propagate the better of the two best-ever watermarks to both sides.
///
/// `prob`/`prior` are left untouched: each chain's tempered posterior is
/// only valid at its own beta, and the position it describes becomes stale
/// the moment the params are exchanged. The next step recomputes it, same
/// as the original never refreshes it inline here either.
pub fn do_swap<R: Rng>(a: &mut Chain<R>, b: &mut Chain<R>) {
    let params_a = a.params().clone();
    let params_b = b.params().clone();

    a.set_params(params_b);
    b.set_params(params_a);

    a.inc_swapcount();
    b.inc_swapcount();

    let (best_prob, best_params) = if a.prob_best() >= b.prob_best() {
        (a.prob_best(), a.params_best().clone())
    } else {
        (b.prob_best(), b.params_best().clone())
    };
    a.adopt_best(best_prob, best_params.clone());
    b.adopt_best(best_prob, best_params);
}

/// Pick the adjacent pair `(i, i+1)` a swap round should attempt, per the
/// configured policy. Returns `None` when there are fewer than two chains.
pub fn select_swap_pair<R: Rng + ?Sized>(
    policy: SwapPolicy,
    round: u64,
    n_beta: usize,
    rng: &mut R,
) -> Option<(usize, usize)> {
    if n_beta < 2 {
        return None;
    }
    match policy {
        // Checkerboard sweep: even rounds try (0,1),(2,3),...; odd rounds
        // try (1,2),(3,4),... One pair is attempted per call.
        SwapPolicy::Always => {
            let parity = (round % 2) as usize;
            if parity >= n_beta - 1 {
                None
            } else {
                Some((parity, parity + 1))
            }
        }
        SwapPolicy::Periodic => {
            let k = (round as usize) % (n_beta - 1);
            Some((k, k + 1))
        }
        SwapPolicy::Random => {
            let k = rng.gen_range(0..n_beta - 1);
            Some((k, k + 1))
        }
    }
}

/// A full temperature ladder of chains, ordered coldest (posterior) to
/// hottest.
pub struct Ensemble<R: Rng> {
    chains: Vec<Chain<R>>,
}

impl<R: Rng> Ensemble<R> {
    /// Build an ensemble, validating that betas are strictly decreasing
    /// with index.
    pub fn new(chains: Vec<Chain<R>>) -> Result<Self> {
        let betas: Vec<f64> = chains.iter().map(Chain::beta).collect();
        validate_monotone(&betas)?;
        Ok(Ensemble { chains })
    }

    #[inline]
    pub fn n_beta(&self) -> usize {
        self.chains.len()
    }

    #[inline]
    pub fn chains(&self) -> &[Chain<R>] {
        &self.chains
    }

    #[inline]
    pub fn chains_mut(&mut self) -> &mut [Chain<R>] {
        &mut self.chains
    }

    #[inline]
    pub fn posterior(&self) -> &Chain<R> {
        &self.chains[0]
    }

    /// Attempt a swap between chains `i` and `i + 1`, drawing the accept
    /// decision from chain `i`'s own RNG stream. Returns whether the swap
    /// was accepted.
    pub fn try_swap(&mut self, i: usize) -> bool {
        let j = i + 1;
        let beta_a = self.chains[i].beta();
        let beta_b = self.chains[j].beta();
        let prob_a = self.chains[i].prob();
        let prob_b = self.chains[j].prob();
        let r = swap_log_acceptance(beta_a, prob_a, beta_b, prob_b);
        let u = log_uniform(self.chains[i].rng_mut());
        if r > u {
            let (left, right) = self.chains.split_at_mut(j);
            do_swap(&mut left[i], &mut right[0]);
            true
        } else {
            false
        }
    }

    /// Run one round of the swap protocol: pick a candidate pair per
    /// `policy` and `round`, and attempt it. Returns `(i, j, accepted)`, or
    /// `None` if the policy proposed no pair this round.
    pub fn attempt_swap_round(&mut self, policy: SwapPolicy, round: u64) -> Option<(usize, usize, bool)> {
        let n_beta = self.n_beta();
        let pair = {
            let rng = self.chains[0].rng_mut();
            select_swap_pair(policy, round, n_beta, rng)
        };
        pair.map(|(i, j)| {
            let accepted = self.try_swap(i);
            (i, j, accepted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ParamSpec;
    use crate::ladder::beta_ladder;
    use crate::config::BetaLadder;
    use nalgebra::DMatrix;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::sync::Arc;

    fn make_ensemble(n_beta: usize) -> Ensemble<Xoshiro256PlusPlus> {
        let betas = beta_ladder(BetaLadder::ChebyshevBeta, n_beta, 0.1);
        let data = Arc::new(DMatrix::<f64>::zeros(0, 0));
        let chains = betas
            .iter()
            .enumerate()
            .map(|(idx, &beta)| {
                let specs = vec![ParamSpec { start: 0.0, min: -1.0, max: 1.0, name: "x".into(), step: Some(0.1) }];
                let rng = Xoshiro256PlusPlus::seed_from_u64(idx as u64);
                let mut chain = Chain::new(&specs, data.clone(), rng).unwrap();
                chain.set_beta(beta);
                chain.set_prob(-(idx as f64));
                chain
            })
            .collect();
        Ensemble::new(chains).unwrap()
    }

    #[test]
    fn rejects_non_monotone_construction() {
        let data = Arc::new(DMatrix::<f64>::zeros(0, 0));
        let specs = vec![ParamSpec { start: 0.0, min: -1.0, max: 1.0, name: "x".into(), step: Some(0.1) }];
        let mut c0 = Chain::new(&specs, data.clone(), Xoshiro256PlusPlus::seed_from_u64(0)).unwrap();
        c0.set_beta(0.5);
        let mut c1 = Chain::new(&specs, data, Xoshiro256PlusPlus::seed_from_u64(1)).unwrap();
        c1.set_beta(0.8);
        assert!(Ensemble::new(vec![c0, c1]).is_err());
    }

    #[test]
    fn swap_preserves_total_parameter_mass() {
        let mut ensemble = make_ensemble(4);
        ensemble.chains_mut()[0].params_mut()[0] = 0.3;
        ensemble.chains_mut()[1].params_mut()[0] = -0.2;
        let before: f64 = ensemble.chains().iter().map(|c| c.params()[0]).sum();
        for round in 0..10 {
            ensemble.attempt_swap_round(SwapPolicy::Always, round);
        }
        let after: f64 = ensemble.chains().iter().map(|c| c.params()[0]).sum();
        assert!((before - after).abs() < 1e-9);
    }

    #[test]
    fn swap_always_picks_adjacent_pairs_only() {
        let mut ensemble = make_ensemble(5);
        for round in 0..20 {
            if let Some((i, j, _)) = ensemble.attempt_swap_round(SwapPolicy::Periodic, round) {
                assert_eq!(j, i + 1);
                assert!(j < ensemble.n_beta());
            }
        }
    }

    #[test]
    fn swap_propagates_better_watermark_to_both_sides() {
        let mut ensemble = make_ensemble(2);
        ensemble.chains_mut()[0].set_prob(5.0);
        ensemble.chains_mut()[0].check_best();
        ensemble.chains_mut()[1].set_prob(-5.0);
        ensemble.chains_mut()[1].check_best();
        ensemble.try_swap(0);
        assert_eq!(ensemble.chains()[0].prob_best(), 5.0);
        assert_eq!(ensemble.chains()[1].prob_best(), 5.0);
    }
}
