//! Proposal generation and Metropolis accept/reject (component C).
//!
//! A rejected step is not an error: `step_one` always returns a definite
//! `StepOutcome`, and an out-of-bounds non-circular redraw is retried
//! silently until it lands in range, exactly as the original's
//! `do_step_for` does. Nothing in this module allocates or performs I/O.

use rand::Rng;

use crate::chain::Chain;
use crate::config::ProposalKind;
use crate::model::Model;
use crate::rng::{jump, log_uniform};

/// Result of a single-parameter Metropolis step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted,
    Rejected,
}

/// Wrap `x` into `[0, period)`, handling negative `x` correctly (unlike the
/// raw `%` operator).
fn wrap_positive(x: f64, period: f64) -> f64 {
    let r = x % period;
    if r < 0.0 {
        r + period
    } else {
        r
    }
}

/// Propose a new value for one parameter, honoring circularity.
///
/// Non-circular parameters redraw until the candidate lands in
/// `[min, max]`; circular parameters wrap the raw jump back into range, so
/// every draw is used.
pub fn propose_one<R: Rng + ?Sized>(
    rng: &mut R,
    value: f64,
    min: f64,
    max: f64,
    step: f64,
    kind: ProposalKind,
    circular: bool,
) -> f64 {
    if circular {
        let range = max - min;
        if range <= 0.0 {
            return value;
        }
        let raw = value + jump(rng, kind, step);
        min + wrap_positive(raw - min, range)
    } else {
        loop {
            let candidate = value + jump(rng, kind, step);
            if candidate >= min && candidate <= max {
                return candidate;
            }
        }
    }
}

/// Metropolis accept/reject on tempered log-posteriors: accept outright if
/// the posterior improves, otherwise accept with probability
/// `exp(new - old)`.
pub fn accept_reject<R: Rng + ?Sized>(rng: &mut R, log_post_new: f64, log_post_old: f64) -> StepOutcome {
    let delta = log_post_new - log_post_old;
    if delta >= 0.0 || log_uniform(rng) < delta {
        StepOutcome::Accepted
    } else {
        StepOutcome::Rejected
    }
}

/// Propose and accept/reject a move in parameter `i` alone, updating the
/// chain's position, tempered posterior, counters, and best-ever watermark
/// in place.
pub fn step_one<R: Rng, M: Model>(
    chain: &mut Chain<R>,
    model: &mut M,
    i: usize,
    proposal: ProposalKind,
    circular: bool,
) -> StepOutcome {
    let min = chain.params_min()[i];
    let max = chain.params_max()[i];
    let step = chain.params_step()[i];
    let old_value = chain.params()[i];
    let beta = chain.beta();

    let new_value = propose_one(chain.rng_mut(), old_value, min, max, step, proposal, circular);
    chain.params_mut()[i] = new_value;

    let (log_prior, log_lik) = model.calc_model_for(chain.params().as_slice(), i, old_value);
    let new_prob = beta * log_lik + log_prior;
    let old_prob = chain.prob();

    let outcome = accept_reject(chain.rng_mut(), new_prob, old_prob);
    match outcome {
        StepOutcome::Accepted => {
            chain.set_prob(new_prob);
            chain.set_prior(log_prior);
            chain.inc_accept(Some(i));
            chain.check_best();
        }
        StepOutcome::Rejected => {
            chain.params_mut()[i] = old_value;
            chain.inc_reject(Some(i));
        }
    }
    outcome
}

/// Run `step_one` over every parameter in turn, in index order.
pub fn step_all<R: Rng, M: Model>(
    chain: &mut Chain<R>,
    model: &mut M,
    proposal: ProposalKind,
    circular_params: &[usize],
) {
    for i in 0..chain.n_par() {
        let circular = circular_params.contains(&i);
        step_one(chain, model, i, proposal, circular);
    }
}
