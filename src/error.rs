//! Error taxonomy for the sampler.
//!
//! Config/IO and numerical failures are returned as `Err`; step rejection and
//! out-of-bounds redraws are not errors at all and never appear here (see the
//! module docs on `proposal`).

use thiserror::Error;

/// Errors that can surface from constructing, calibrating, or running a chain
/// ensemble.
#[derive(Error, Debug)]
pub enum SamplerError {
    /// A parameter value fell outside its declared bounds.
    #[error("parameter {param} value {value} outside bounds [{min}, {max}]")]
    Bounds {
        /// Index of the offending parameter.
        param: usize,
        /// The out-of-bounds value.
        value: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// A step width was non-positive.
    #[error("parameter {param} has non-positive step width {step}")]
    InvalidStep {
        /// Index of the offending parameter.
        param: usize,
        /// The invalid step width.
        step: f64,
    },

    /// Calibration could not reach the target acceptance rate.
    #[error("calibration failed: {reason}")]
    CalibrationFailed {
        /// Human-readable reason.
        reason: String,
    },

    /// Ensemble construction produced a beta ladder that is not strictly
    /// monotone decreasing with chain index.
    #[error("beta ladder is not strictly monotone decreasing (chain {chain}: {beta} >= {previous})")]
    BetaNotMonotone {
        /// Index of the offending chain.
        chain: usize,
        /// The offending beta value.
        beta: f64,
        /// The previous chain's beta value.
        previous: f64,
    },

    /// Calibration-record I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A calibration-record line could not be parsed.
    #[error("malformed calibration record at line {line}: {detail}")]
    ParseRecord {
        /// 1-indexed line number.
        line: usize,
        /// Human-readable detail.
        detail: String,
    },

    /// A caller-supplied collection (models, specs, ...) did not match the
    /// ensemble shape it was paired with.
    #[error("configuration mismatch: {detail}")]
    ConfigMismatch {
        /// Human-readable detail.
        detail: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SamplerError>;
