//! Sampler configuration.
//!
//! Every knob named in the external interface is collected here with
//! defaults matching the documented ones, independent of any on-disk format
//! -- reading those values out of a config file is the caller's job.

#[cfg(feature = "serde_support")]
use serde_derive::{Deserialize, Serialize};

/// Shape of the proposal jump distribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum ProposalKind {
    /// Gaussian jumps, the default.
    Gaussian,
    /// Logistic jumps (heavier tails than Gaussian).
    Logistic,
    /// Flat (uniform) jumps on `[-step, step]`.
    Flat,
}

impl Default for ProposalKind {
    fn default() -> Self {
        ProposalKind::Gaussian
    }
}

/// Temperature-ladder spacing law, mapping chain index to beta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum BetaLadder {
    /// Equidistant spacing in beta.
    EquidistantBeta,
    /// Equidistant spacing in temperature (1/beta).
    EquidistantTemperature,
    /// Chebyshev nodes in beta. The default.
    ChebyshevBeta,
    /// Chebyshev nodes in temperature.
    ChebyshevTemperature,
    /// Equidistant spacing in stepwidth space (beta scaled quadratically).
    EquidistantStepwidth,
    /// Chebyshev nodes in stepwidth space.
    ChebyshevStepwidth,
}

impl Default for BetaLadder {
    fn default() -> Self {
        BetaLadder::ChebyshevBeta
    }
}

/// Policy selecting which adjacent chain pair to attempt a swap on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum SwapPolicy {
    /// Attempt a swap every `n_swap` outer iterations, round-robin over `a`.
    Periodic,
    /// Attempt a swap with probability `1/n_swap` each outer iteration.
    Random,
    /// Attempt a swap every outer iteration.
    Always,
}

impl Default for SwapPolicy {
    fn default() -> Self {
        SwapPolicy::Always
    }
}

/// Step-width calibration strategy (component D).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum CalibrationStrategy {
    /// Proportional step-width adjustment. The default.
    Proportional,
    /// Quadratic fit per parameter, falling back to linear regression.
    Quadratic,
    /// Weighted linear regression per parameter.
    LinearRegression,
    /// Joint linear regression across all parameters.
    MultilinearRegression,
}

impl Default for CalibrationStrategy {
    fn default() -> Self {
        CalibrationStrategy::Proportional
    }
}

/// Online step-width adaptation applied during sampling. At most one variant
/// is active in a given run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub enum AdaptMode {
    /// No online adaptation; rely on the calibration phase alone.
    None,
    /// Random-Walk-Metropolis adaptation: nudge step widths by the
    /// Metropolis acceptance ratio every outer iteration.
    RandomWalkMetropolis,
    /// Fixed-rate 1% multiplicative rescale once acceptance drifts more than
    /// 5% off target, checked past 20,000 proposals.
    FixedRate,
}

impl Default for AdaptMode {
    fn default() -> Self {
        AdaptMode::None
    }
}

/// Aggregate configuration for a parallel-tempering run.
///
/// `Default` reproduces the documented defaults: 20 chains, automatic
/// beta_0, a 10,000-iteration burn-in, a 100,000-iteration calibration
/// budget, MUL=0.85, automatic `n_swap`, a 0.23 target acceptance rate,
/// 200-bin histograms, Gaussian proposals, a Chebyshev-in-beta ladder, no
/// circular parameters, unbounded iteration count, reporting every 1000
/// iterations, dumping only the posterior chain, calibrating every chain,
/// an always-swap policy, and no online adaptation.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct SamplerConfig {
    /// Number of chains spanning the temperature ladder (N_BETA).
    pub n_beta: usize,
    /// Hottest chain's beta. `None` requests automatic selection.
    pub beta_0: Option<f64>,
    /// Burn-in iterations run once before calibration (BURN_IN_ITERATIONS).
    pub burn_in_iterations: usize,
    /// Iteration budget for calibration (ITER_LIMIT), multiplied by n_par.
    pub iter_limit: usize,
    /// Step-width scaling factor used by the proportional strategy (MUL).
    pub mul: f64,
    /// Iterations between acceptance-rate reassessment during proportional
    /// calibration (ITER_READJUST).
    pub iter_readjust: usize,
    /// Consecutive no-op checks required to stop proportional calibration
    /// (NO_RESCALING_LIMIT).
    pub no_rescaling_limit: usize,
    /// Iterations between swap attempts. `None` requests `2000 / n_beta`.
    pub n_swap: Option<usize>,
    /// Global target acceptance rate (TARGET_ACCEPTANCE_RATE).
    pub target_acceptance_rate: f64,
    /// Maximum acceptable deviation from the target rate at convergence
    /// (MAX_AR_DEVIATION).
    pub max_ar_deviation: f64,
    /// Scaling factor between observed/target deviation and required
    /// assessment accuracy (ACCURACY_DEVIATION_FACTOR).
    pub accuracy_deviation_factor: f64,
    /// Number of histogram bins (NBINS).
    pub nbins: usize,
    /// Jump distribution shape.
    pub proposal: ProposalKind,
    /// Temperature-ladder spacing law.
    pub beta_alignment: BetaLadder,
    /// Indices of circular (wrap-around) parameters.
    pub circular_params: Vec<usize>,
    /// Maximum number of outer iterations. `None` means unbounded (subject
    /// to cancellation).
    pub max_iterations: Option<u64>,
    /// Iterations between progress reports (PRINT_PROB_INTERVAL).
    pub print_prob_interval: u64,
    /// Whether to dump every chain's samples, not just the posterior chain.
    pub dump_all_chains: bool,
    /// Whether to skip full calibration for chains 2..n_beta, inferring
    /// their step widths from chain 0 and 1 instead.
    pub skip_calibrate_allchains: bool,
    /// Swap-candidate selection policy.
    pub swap_policy: SwapPolicy,
    /// Online step-width adaptation mode.
    pub adapt: AdaptMode,
    /// Step-width calibration strategy.
    pub calibration: CalibrationStrategy,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            n_beta: 20,
            beta_0: None,
            burn_in_iterations: 10_000,
            iter_limit: 100_000,
            mul: 0.85,
            iter_readjust: 200,
            no_rescaling_limit: 15,
            n_swap: None,
            target_acceptance_rate: 0.23,
            max_ar_deviation: 0.5,
            accuracy_deviation_factor: 0.25,
            nbins: 200,
            proposal: ProposalKind::Gaussian,
            beta_alignment: BetaLadder::ChebyshevBeta,
            circular_params: Vec::new(),
            max_iterations: None,
            print_prob_interval: 1000,
            dump_all_chains: false,
            skip_calibrate_allchains: false,
            swap_policy: SwapPolicy::Always,
            adapt: AdaptMode::None,
            calibration: CalibrationStrategy::Proportional,
        }
    }
}

impl SamplerConfig {
    /// Resolve the configured `n_swap`, applying the `2000 / n_beta`
    /// auto-selection rule when unset.
    pub fn resolved_n_swap(&self) -> usize {
        match self.n_swap {
            Some(n) => n,
            None => (2000 / self.n_beta.max(1)).max(1),
        }
    }
}
