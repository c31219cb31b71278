//! Random-walk Metropolis-Hastings for scalar hyperparameters.
//!
//! A parameter is exposed through [`MhTarget`]; proposals and uniform
//! draws come from a [`ProposalSource`] so the accept/reject rule can be
//! driven by a real generator or by scripted draws.

/// Collected values and scores of a Metropolis-Hastings run
pub mod chain;

/// Gaussian random-walk sampler
pub mod metropolis;

/// Target and proposal traits
pub mod traits;

pub use chain::MhChain;
pub use metropolis::{metropolis_step, MhDecision, RandomWalk, RngSource};
pub use traits::{MhTarget, ProposalSource};
