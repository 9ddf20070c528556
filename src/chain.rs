//! Chain state container (component B).
//!
//! A `Chain` owns everything needed to advance one Markov chain at a fixed
//! beta: its position, bounds, step widths, counters, best-seen watermark,
//! RNG stream, and a read-only handle on the shared observation matrix. No
//! suspension and no I/O happen on the hot path; output sinks are plain
//! `Write` trait objects the caller supplies, appended to only from
//! `sampler::Sampler::run`.

use std::io::Write;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::error::{Result, SamplerError};

/// One parameter's static description: its starting value, inclusive
/// bounds, human-readable name, and initial step-width hint.
#[derive(Clone, Debug)]
pub struct ParamSpec {
    /// Starting value; must satisfy `min <= start <= max`.
    pub start: f64,
    /// Inclusive lower bound.
    pub min: f64,
    /// Inclusive upper bound.
    pub max: f64,
    /// Human-readable, non-empty name.
    pub name: String,
    /// Initial step width. `None` requests the documented
    /// `0.1 * (max - min)` auto default.
    pub step: Option<f64>,
}

impl ParamSpec {
    /// Resolve the configured step width, applying the auto default when
    /// unset or non-positive.
    pub fn resolved_step(&self) -> f64 {
        match self.step {
            Some(s) if s > 0.0 => s,
            _ => 0.1 * (self.max - self.min),
        }
    }
}

/// One Markov chain at a fixed inverse temperature `beta`.
pub struct Chain<R: Rng> {
    n_par: usize,
    params: DVector<f64>,
    params_min: DVector<f64>,
    params_max: DVector<f64>,
    params_step: DVector<f64>,
    params_descr: Vec<String>,
    params_best: DVector<f64>,
    prob_best: f64,
    prob: f64,
    prior: f64,
    accept: u64,
    reject: u64,
    params_accepts: Vec<u64>,
    params_rejects: Vec<u64>,
    beta: f64,
    swapcount: u64,
    rng: R,
    data: Arc<DMatrix<f64>>,
    n_iter: u64,
    value_sinks: Vec<Option<Box<dyn Write + Send>>>,
    likelihood_sink: Option<Box<dyn Write + Send>>,
}

impl<R: Rng> Chain<R> {
    /// Construct a chain from its parameter specifications, a shared (and
    /// possibly empty) observation matrix, and an RNG stream. Validates
    /// bounds per §3/§6 but performs no I/O.
    pub fn new(specs: &[ParamSpec], data: Arc<DMatrix<f64>>, rng: R) -> Result<Self> {
        let n_par = specs.len();
        let mut params = DVector::zeros(n_par);
        let mut params_min = DVector::zeros(n_par);
        let mut params_max = DVector::zeros(n_par);
        let mut params_step = DVector::zeros(n_par);
        let mut params_descr = Vec::with_capacity(n_par);

        for (i, spec) in specs.iter().enumerate() {
            if spec.min > spec.max {
                return Err(SamplerError::Bounds {
                    param: i,
                    value: spec.start,
                    min: spec.min,
                    max: spec.max,
                });
            }
            if spec.start < spec.min || spec.start > spec.max {
                return Err(SamplerError::Bounds {
                    param: i,
                    value: spec.start,
                    min: spec.min,
                    max: spec.max,
                });
            }
            if spec.name.is_empty() || spec.name.len() >= 256 {
                return Err(SamplerError::ParseRecord {
                    line: i,
                    detail: format!("parameter name '{}' is empty or too long", spec.name),
                });
            }
            let step = spec.resolved_step();
            if step <= 0.0 {
                return Err(SamplerError::InvalidStep { param: i, step });
            }
            params[i] = spec.start;
            params_min[i] = spec.min;
            params_max[i] = spec.max;
            params_step[i] = step;
            params_descr.push(spec.name.clone());
        }

        Ok(Chain {
            n_par,
            params_best: params.clone(),
            params,
            params_min,
            params_max,
            params_step,
            params_descr,
            prob_best: f64::NEG_INFINITY,
            prob: f64::NEG_INFINITY,
            prior: 0.0,
            accept: 0,
            reject: 0,
            params_accepts: vec![0; n_par],
            params_rejects: vec![0; n_par],
            beta: 1.0,
            swapcount: 0,
            rng,
            data,
            n_iter: 0,
            value_sinks: (0..n_par).map(|_| None).collect(),
            likelihood_sink: None,
        })
    }

    /// Assert all invariants in §3 hold. Returns `Err` rather than aborting;
    /// callers at trust boundaries (construction, after a swap, after a
    /// calibration round) should call this.
    pub fn check(&self) -> Result<()> {
        for i in 0..self.n_par {
            let (p, lo, hi) = (self.params[i], self.params_min[i], self.params_max[i]);
            if p < lo || p > hi {
                return Err(SamplerError::Bounds { param: i, value: p, min: lo, max: hi });
            }
            if self.params_step[i] <= 0.0 {
                return Err(SamplerError::InvalidStep { param: i, step: self.params_step[i] });
            }
        }
        Ok(())
    }

    /// Number of parameters.
    #[inline]
    pub fn n_par(&self) -> usize {
        self.n_par
    }

    #[inline]
    pub fn params(&self) -> &DVector<f64> {
        &self.params
    }

    #[inline]
    pub fn params_mut(&mut self) -> &mut DVector<f64> {
        &mut self.params
    }

    #[inline]
    pub fn set_params(&mut self, params: DVector<f64>) {
        self.params = params;
    }

    #[inline]
    pub fn params_min(&self) -> &DVector<f64> {
        &self.params_min
    }

    #[inline]
    pub fn params_max(&self) -> &DVector<f64> {
        &self.params_max
    }

    #[inline]
    pub fn params_step(&self) -> &DVector<f64> {
        &self.params_step
    }

    #[inline]
    pub fn params_step_mut(&mut self) -> &mut DVector<f64> {
        &mut self.params_step
    }

    #[inline]
    pub fn params_descr(&self) -> &[String] {
        &self.params_descr
    }

    #[inline]
    pub fn params_best(&self) -> &DVector<f64> {
        &self.params_best
    }

    #[inline]
    pub fn prob_best(&self) -> f64 {
        self.prob_best
    }

    #[inline]
    pub fn prob(&self) -> f64 {
        self.prob
    }

    #[inline]
    pub fn set_prob(&mut self, prob: f64) {
        self.prob = prob;
    }

    #[inline]
    pub fn prior(&self) -> f64 {
        self.prior
    }

    #[inline]
    pub fn set_prior(&mut self, prior: f64) {
        self.prior = prior;
    }

    #[inline]
    pub fn accept(&self) -> u64 {
        self.accept
    }

    #[inline]
    pub fn reject(&self) -> u64 {
        self.reject
    }

    #[inline]
    pub fn params_accepts(&self) -> &[u64] {
        &self.params_accepts
    }

    #[inline]
    pub fn params_rejects(&self) -> &[u64] {
        &self.params_rejects
    }

    /// Reset the global and per-parameter accept/reject counters, as done at
    /// the start of each calibration round.
    pub fn reset_accept_reject(&mut self) {
        self.accept = 0;
        self.reject = 0;
        self.params_accepts.iter_mut().for_each(|c| *c = 0);
        self.params_rejects.iter_mut().for_each(|c| *c = 0);
    }

    pub(crate) fn inc_accept(&mut self, i: Option<usize>) {
        self.accept += 1;
        if let Some(i) = i {
            self.params_accepts[i] += 1;
        } else {
            self.params_accepts.iter_mut().for_each(|c| *c += 1);
        }
    }

    pub(crate) fn inc_reject(&mut self, i: Option<usize>) {
        self.reject += 1;
        if let Some(i) = i {
            self.params_rejects[i] += 1;
        } else {
            self.params_rejects.iter_mut().for_each(|c| *c += 1);
        }
    }

    /// Global acceptance rate accumulated since the last reset.
    pub fn acceptance_rate_global(&self) -> f64 {
        let total = self.accept + self.reject;
        if total == 0 {
            0.0
        } else {
            self.accept as f64 / total as f64
        }
    }

    /// Per-parameter acceptance rate accumulated since the last reset.
    pub fn acceptance_rate_for(&self, i: usize) -> f64 {
        let total = self.params_accepts[i] + self.params_rejects[i];
        if total == 0 {
            0.0
        } else {
            self.params_accepts[i] as f64 / total as f64
        }
    }

    #[inline]
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Set beta and reset the swap counter, mirroring the original's
    /// `set_beta`.
    pub fn set_beta(&mut self, beta: f64) {
        self.beta = beta;
        self.swapcount = 0;
    }

    #[inline]
    pub fn swapcount(&self) -> u64 {
        self.swapcount
    }

    pub(crate) fn inc_swapcount(&mut self) {
        self.swapcount += 1;
    }

    #[inline]
    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    #[inline]
    pub fn data(&self) -> &Arc<DMatrix<f64>> {
        &self.data
    }

    /// Replace the shared observation matrix reference (used when a fresh
    /// chain is spliced in to share chain 0's data).
    pub fn share_data(&mut self, data: Arc<DMatrix<f64>>) {
        self.data = data;
    }

    #[inline]
    pub fn n_iter(&self) -> u64 {
        self.n_iter
    }

    /// Update the best-ever watermark if `prob` improves on it, mirroring
    /// the original's `mcmc_check_best`.
    pub fn check_best(&mut self) {
        if self.prob > self.prob_best {
            self.prob_best = self.prob;
            self.params_best = self.params.clone();
        }
    }

    /// Reset the current position and log-posterior to the best-ever
    /// watermark (used at the burn-in midpoint and after calibration
    /// rounds).
    pub fn restart_from_best(&mut self) {
        self.params = self.params_best.clone();
        self.prob = self.prob_best;
    }

    /// Adopt `(prob, params)` as this chain's best-ever watermark if it is
    /// at least as good as the current one, regardless of whether it was
    /// this chain that found it (used when propagating the better of a
    /// swapped pair's watermarks to both chains).
    pub fn adopt_best(&mut self, prob: f64, params: DVector<f64>) {
        if prob >= self.prob_best {
            self.prob_best = prob;
            self.params_best = params;
        }
    }

    /// Install the output sink for parameter `i`'s visited-value stream.
    pub fn set_value_sink(&mut self, i: usize, sink: Box<dyn Write + Send>) {
        self.value_sinks[i] = Some(sink);
    }

    /// Install the output sink for this chain's (posterior, likelihood)
    /// stream.
    pub fn set_likelihood_sink(&mut self, sink: Box<dyn Write + Send>) {
        self.likelihood_sink = Some(sink);
    }

    /// Append the current position to each configured value sink and the
    /// current `(prob, prob - prior)` pair to the likelihood sink, then bump
    /// `n_iter`. A no-op for any sink left unset.
    pub fn record_sample(&mut self) -> Result<()> {
        for (i, sink) in self.value_sinks.iter_mut().enumerate() {
            if let Some(sink) = sink {
                writeln!(sink, "{:e}", self.params[i])?;
            }
        }
        if let Some(sink) = &mut self.likelihood_sink {
            writeln!(sink, "{:e}\t{:e}", self.prob, self.prob - self.prior)?;
        }
        self.n_iter += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn spec(start: f64, min: f64, max: f64) -> ParamSpec {
        ParamSpec { start, min, max, name: "p".to_string(), step: None }
    }

    #[test]
    fn construction_rejects_out_of_bounds_start() {
        let specs = vec![spec(5.0, 0.0, 1.0)];
        let data = Arc::new(DMatrix::zeros(0, 0));
        let rng = Xoshiro256PlusPlus::seed_from_u64(0);
        assert!(Chain::new(&specs, data, rng).is_err());
    }

    #[test]
    fn construction_resolves_auto_step() {
        let specs = vec![ParamSpec { start: 0.0, min: -1.0, max: 1.0, name: "p".into(), step: None }];
        let data = Arc::new(DMatrix::zeros(0, 0));
        let rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let chain = Chain::new(&specs, data, rng).unwrap();
        assert!((chain.params_step()[0] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn check_best_updates_watermark() {
        let specs = vec![spec(0.0, -1.0, 1.0)];
        let data = Arc::new(DMatrix::zeros(0, 0));
        let rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let mut chain = Chain::new(&specs, data, rng).unwrap();
        chain.set_prob(1.0);
        chain.check_best();
        assert_eq!(chain.prob_best(), 1.0);
        chain.set_prob(0.5);
        chain.check_best();
        assert_eq!(chain.prob_best(), 1.0);
    }

    #[test]
    fn restart_from_best_restores_position() {
        let specs = vec![spec(0.0, -1.0, 1.0)];
        let data = Arc::new(DMatrix::zeros(0, 0));
        let rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let mut chain = Chain::new(&specs, data, rng).unwrap();
        chain.set_prob(1.0);
        chain.check_best();
        chain.params_mut()[0] = 0.9;
        chain.set_prob(-5.0);
        chain.restart_from_best();
        assert_eq!(chain.params()[0], 0.0);
        assert_eq!(chain.prob(), 1.0);
    }
}
