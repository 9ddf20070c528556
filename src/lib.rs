//! A parallel-tempering Markov-chain Monte Carlo toolkit for Bayesian
//! parameter estimation and model comparison.
//!
//! An ensemble of chains ([`ensemble::Ensemble`]) spans a temperature
//! ladder from the true posterior (`beta = 1`) down to a hot, broadly
//! exploring chain (`beta = beta_0`). Each chain advances by Metropolis
//! proposals ([`proposal`]) against a user-supplied [`model::Model`], is
//! calibrated to a target acceptance rate ([`calibration`]), and
//! periodically exchanges state with its neighbor ([`ensemble`]). A
//! [`sampler::Sampler`] drives the whole ensemble; [`evidence`] turns the
//! resulting chains into a model-comparison evidence estimate, and
//! [`histogram`] turns one chain's value stream into a marginal
//! distribution summary.

extern crate nalgebra;
extern crate rand;
extern crate rayon;

#[cfg(feature = "serde_support")]
#[macro_use]
extern crate serde_derive;

pub mod calibration;
pub mod calibration_io;
pub mod chain;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod evidence;
pub mod histogram;
pub mod ladder;
pub mod model;
pub mod proposal;
pub mod rng;
pub mod sampler;

pub use chain::{Chain, ParamSpec};
pub use config::SamplerConfig;
pub use ensemble::Ensemble;
pub use error::{Result, SamplerError};
pub use model::Model;
pub use sampler::Sampler;
