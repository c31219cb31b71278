//! Hierarchical author-topic model.
//!
//! Authors follow paths in a tree of topics grown by a nested Chinese
//! restaurant process; each word token of an author is explained by one
//! topic along that path, chosen through a GEM stick-breaking prior over
//! levels. Inference is collapsed Gibbs sampling with Metropolis-Hastings
//! updates of the GEM and Dirichlet hyperparameters.

/// Log-domain numerical helpers
pub mod math;

/// Word tokens
pub mod words;

/// Topic tree arena with sufficient statistics
pub mod topic_tree;

/// Authors and their level counts
pub mod authors;

/// Documents and corpus-level parameters
pub mod corpus;

/// Joint model score
pub mod score;

/// Path resampling
pub mod path_sampler;

/// Level resampling
pub mod level_sampler;

/// Hyperparameter Metropolis-Hastings
pub mod hyperparam;

/// Settings file
pub mod settings;

/// Corpus and authors files
pub mod input;

/// Gibbs driver
pub mod gibbs;

#[cfg(test)]
mod test;

pub use gibbs::{GibbsInput, GibbsOptions, GibbsState};
pub use score::JointScore;
