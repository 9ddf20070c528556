//! The user-supplied likelihood/prior contract.
//!
//! Implementations own whatever state they need (observation data, cached
//! sufficient statistics, ...); the sampler never inspects it. Both methods
//! return `(log_prior, log_likelihood)` pairs rather than a single combined
//! value so the ensemble can reweight by `beta` without re-deriving the
//! prior term, and so the unmodified prior can be written out alongside the
//! tempered posterior (see `chain::Chain::record_sample`).

/// A model a chain can evaluate a proposal against.
///
/// `calc_model_for` exists as a cheaper, single-parameter alternative to
/// `calc_model` for models whose likelihood factors across parameters (the
/// common case); a model that cannot support it should fall back to
/// `calc_model` internally rather than implement an incorrect shortcut.
pub trait Model {
    /// Full log-prior and log-likelihood at the current parameter vector.
    /// `old_values`, when given, are the previous position's values, which
    /// an incremental model may use to avoid recomputing from scratch.
    fn calc_model(&mut self, params: &[f64], old_values: Option<&[f64]>) -> (f64, f64);

    /// Log-prior and log-likelihood after changing only parameter `i` from
    /// `old_value` to its current value in `params`. The default
    /// implementation simply calls `calc_model`; override when the
    /// likelihood factors across parameters.
    fn calc_model_for(&mut self, params: &[f64], i: usize, old_value: f64) -> (f64, f64) {
        let _ = (i, old_value);
        self.calc_model(params, None)
    }
}
