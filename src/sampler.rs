//! Sampler driver (component G).
//!
//! Each outer iteration runs `n_swap` Metropolis sweeps per chain in
//! parallel via a `rayon::scope` scatter/gather, then serially attempts one
//! swap and one adaptation pass. Progress is reported through `log`, not
//! stdout, at `print_prob_interval` granularity.
//!
//! `run` also polls two shared flags at each outer-iteration boundary: a
//! stop flag (finish the current block, emit a final report, and return
//! `Ok` with the partial result) and a dump flag (emit a report at the next
//! boundary without stopping). Setting either from a signal handler is the
//! caller's responsibility; the handler itself is out of scope here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand_xoshiro::Xoshiro256PlusPlus;

use crate::config::{AdaptMode, SamplerConfig};
use crate::ensemble::Ensemble;
use crate::error::{Result, SamplerError};
use crate::model::Model;
use crate::{calibration, proposal};

const RWM_MIN_STEP: f64 = 1e-7;
const RWM_MAX_STEP: f64 = 1e6;
const FIXED_RATE_GATE: u64 = 20_000;
const FIXED_RATE_DEVIATION: f64 = 0.05;
const FIXED_RATE_GROW: f64 = 1.01;
const FIXED_RATE_SHRINK: f64 = 0.99;

/// Drives a full temperature ladder through calibration and sampling.
pub struct Sampler<M: Model + Send> {
    ensemble: Ensemble<Xoshiro256PlusPlus>,
    models: Vec<M>,
    config: SamplerConfig,
    round: u64,
    stop_flag: Arc<AtomicBool>,
    dump_flag: Arc<AtomicBool>,
}

impl<M: Model + Send> Sampler<M> {
    /// Pair an ensemble with one model instance per chain. Each chain gets
    /// its own model so state a model caches (e.g. partial sums) never
    /// crosses chains.
    pub fn new(ensemble: Ensemble<Xoshiro256PlusPlus>, models: Vec<M>, config: SamplerConfig) -> Result<Self> {
        if models.len() != ensemble.n_beta() {
            return Err(SamplerError::ConfigMismatch {
                detail: format!("{} models for {} chains", models.len(), ensemble.n_beta()),
            });
        }
        Ok(Sampler {
            ensemble,
            models,
            config,
            round: 0,
            stop_flag: Arc::new(AtomicBool::new(false)),
            dump_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// A clone of the shared stop flag. Set it from the driving caller
    /// (e.g. a signal handler) to have `run` finish its current inner
    /// block, emit a final report, and return `Ok` with the partial result.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// A clone of the shared dump flag. Set it to have `run` emit a report
    /// at the next inner-block boundary without stopping; the flag is
    /// cleared once handled.
    pub fn dump_flag(&self) -> Arc<AtomicBool> {
        self.dump_flag.clone()
    }

    #[inline]
    pub fn ensemble(&self) -> &Ensemble<Xoshiro256PlusPlus> {
        &self.ensemble
    }

    #[inline]
    pub fn ensemble_mut(&mut self) -> &mut Ensemble<Xoshiro256PlusPlus> {
        &mut self.ensemble
    }

    #[inline]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Calibrate every chain's step widths. When
    /// `config.skip_calibrate_allchains` is set and there are more than two
    /// chains, only chains 0 and 1 run the full calibration strategy; the
    /// rest infer a step width scaled by `sqrt(beta_1 / beta_i)` from chain
    /// 1, since step width scales with `1/sqrt(beta)` along the ladder.
    pub fn calibrate(&mut self) -> Result<()> {
        let n_beta = self.ensemble.n_beta();
        if self.config.skip_calibrate_allchains && n_beta > 2 {
            calibration::calibrate(&mut self.ensemble.chains_mut()[0], &mut self.models[0], &self.config)?;
            calibration::calibrate(&mut self.ensemble.chains_mut()[1], &mut self.models[1], &self.config)?;
            let reference_step = self.ensemble.chains()[1].params_step().clone();
            let reference_beta = self.ensemble.chains()[1].beta();
            for i in 2..n_beta {
                let beta_i = self.ensemble.chains()[i].beta();
                let factor = (reference_beta / beta_i).sqrt();
                let scaled = reference_step.map(|s| s * factor);
                *self.ensemble.chains_mut()[i].params_step_mut() = scaled;
            }
        } else {
            use rayon::prelude::*;
            let config = &self.config;
            self.ensemble
                .chains_mut()
                .par_iter_mut()
                .zip(self.models.par_iter_mut())
                .try_for_each(|(chain, model)| calibration::calibrate(chain, model, config).map(|_| ()))?;
        }
        Ok(())
    }

    /// Run `n_outer` outer iterations: a parallel sweep phase, an
    /// adaptation pass, and a swap attempt, each iteration.
    pub fn run(&mut self, n_outer: u64) -> Result<()> {
        let n_swap = self.config.resolved_n_swap();
        let proposal = self.config.proposal;
        let circular = self.config.circular_params.clone();

        for outer in 0..n_outer {
            {
                let chains = self.ensemble.chains_mut();
                let models = &mut self.models;
                rayon::scope(|scope| {
                    for (chain, model) in chains.iter_mut().zip(models.iter_mut()) {
                        let circular = &circular;
                        scope.spawn(move |_| {
                            for _ in 0..n_swap {
                                proposal::step_all(chain, model, proposal, circular);
                                if let Err(e) = chain.record_sample() {
                                    log::warn!("failed to record sample: {}", e);
                                }
                            }
                        });
                    }
                });
            }

            self.adapt();

            if let Some((i, j, accepted)) = self.ensemble.attempt_swap_round(self.config.swap_policy, self.round) {
                log::debug!("swap round {}: chains {}/{} accepted={}", self.round, i, j, accepted);
            }
            self.round += 1;

            if self.config.print_prob_interval > 0 && outer % self.config.print_prob_interval == 0 {
                self.report(outer);
            }

            if self.dump_flag.swap(false, Ordering::SeqCst) {
                log::info!("dump requested at outer={}", outer);
                self.report(outer);
            }

            if self.stop_flag.load(Ordering::SeqCst) {
                log::info!("stop requested at outer={}, finishing cleanly", outer);
                self.report(outer);
                return Ok(());
            }

            if let Some(limit) = self.config.max_iterations {
                if self.round >= limit {
                    break;
                }
            }
        }
        Ok(())
    }

    fn report(&self, outer: u64) {
        log::info!(
            "outer={} posterior_prob={:e} accept_rate={:.3}",
            outer,
            self.ensemble.posterior().prob(),
            self.ensemble.posterior().acceptance_rate_global()
        );
    }

    fn adapt(&mut self) {
        let target = self.config.target_acceptance_rate;
        match self.config.adapt {
            AdaptMode::None => {}
            AdaptMode::RandomWalkMetropolis => {
                for chain in self.ensemble.chains_mut() {
                    let n = chain.n_iter().max(1) as f64;
                    let alpha = chain.acceptance_rate_global();
                    let delta = (alpha - target) / n.sqrt();
                    for i in 0..chain.n_par() {
                        let step = (chain.params_step()[i] + delta).clamp(RWM_MIN_STEP, RWM_MAX_STEP);
                        chain.params_step_mut()[i] = step;
                    }
                }
            }
            AdaptMode::FixedRate => {
                for chain in self.ensemble.chains_mut() {
                    if chain.accept() + chain.reject() < FIXED_RATE_GATE {
                        continue;
                    }
                    let rate = chain.acceptance_rate_global();
                    let deviation = (rate - target).abs() / target;
                    if deviation > FIXED_RATE_DEVIATION {
                        let factor = if rate > target { FIXED_RATE_GROW } else { FIXED_RATE_SHRINK };
                        for i in 0..chain.n_par() {
                            chain.params_step_mut()[i] *= factor;
                        }
                        chain.reset_accept_reject();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Chain, ParamSpec};
    use crate::config::BetaLadder;
    use crate::ladder::beta_ladder;
    use nalgebra::DMatrix;
    use rand::SeedableRng;
    use std::sync::Arc;

    #[derive(Clone)]
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

    fn build_sampler(n_beta: usize, config: SamplerConfig) -> Sampler<IndependentGaussian> {
        let betas = beta_ladder(config.beta_alignment, n_beta, config.beta_0.unwrap_or(0.1));
        let data = Arc::new(DMatrix::<f64>::zeros(0, 0));
        let chains: Vec<_> = betas
            .iter()
            .enumerate()
            .map(|(idx, &beta)| {
                let specs = vec![ParamSpec { start: 0.0, min: -5.0, max: 5.0, name: "x".into(), step: Some(0.3) }];
                let rng = Xoshiro256PlusPlus::seed_from_u64(idx as u64 + 1);
                let mut chain = Chain::new(&specs, data.clone(), rng).unwrap();
                chain.set_beta(beta);
                chain.set_prob(0.0);
                chain
            })
            .collect();
        let ensemble = Ensemble::new(chains).unwrap();
        let models = (0..n_beta).map(|_| IndependentGaussian).collect();
        Sampler::new(ensemble, models, config).unwrap()
    }

    #[test]
    fn rejects_model_count_mismatch() {
        let betas = beta_ladder(BetaLadder::ChebyshevBeta, 3, 0.1);
        let data = Arc::new(DMatrix::<f64>::zeros(0, 0));
        let chains: Vec<_> = betas
            .iter()
            .map(|&beta| {
                let specs = vec![ParamSpec { start: 0.0, min: -1.0, max: 1.0, name: "x".into(), step: Some(0.1) }];
                let mut chain = Chain::new(&specs, data.clone(), Xoshiro256PlusPlus::seed_from_u64(0)).unwrap();
                chain.set_beta(beta);
                chain
            })
            .collect();
        let ensemble = Ensemble::new(chains).unwrap();
        let models = vec![IndependentGaussian, IndependentGaussian];
        assert!(Sampler::new(ensemble, models, SamplerConfig::default()).is_err());
    }

    #[test]
    fn run_advances_iteration_count() {
        let _ = env_logger::try_init();
        let config = SamplerConfig { n_swap: Some(5), print_prob_interval: 1, ..SamplerConfig::default() };
        let mut sampler = build_sampler(4, config);
        sampler.run(10).unwrap();
        assert_eq!(sampler.ensemble().posterior().n_iter(), 50);
    }

    #[test]
    fn stop_flag_ends_run_early_with_ok() {
        let config = SamplerConfig { n_swap: Some(5), ..SamplerConfig::default() };
        let mut sampler = build_sampler(2, config);
        let stop = sampler.stop_flag();
        stop.store(true, std::sync::atomic::Ordering::SeqCst);
        sampler.run(1_000).unwrap();
        assert_eq!(sampler.ensemble().posterior().n_iter(), 5);
    }

    #[test]
    fn dump_flag_is_cleared_after_one_boundary() {
        let _ = env_logger::try_init();
        let config = SamplerConfig { n_swap: Some(1), ..SamplerConfig::default() };
        let mut sampler = build_sampler(2, config);
        let dump = sampler.dump_flag();
        dump.store(true, std::sync::atomic::Ordering::SeqCst);
        sampler.run(3).unwrap();
        assert!(!dump.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn calibration_leaves_all_chains_within_bounds() {
        let config = SamplerConfig {
            burn_in_iterations: 50,
            iter_readjust: 50,
            no_rescaling_limit: 2,
            ..SamplerConfig::default()
        };
        let mut sampler = build_sampler(3, config);
        sampler.calibrate().unwrap();
        for chain in sampler.ensemble().chains() {
            chain.check().unwrap();
        }
    }
}
