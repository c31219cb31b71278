/// A scalar parameter explored by random-walk Metropolis-Hastings.
///
/// `set_value` must leave the target in exactly the state it would have
/// had if the value had been set from the start, so that restoring an old
/// value after a rejection leaves no partial state behind.
pub trait MhTarget {
    /// Current value of the parameter
    fn value(&self) -> f64;

    /// Overwrite the parameter, refreshing anything derived from it
    fn set_value(&mut self, value: f64);

    /// Whether `value` lies inside the parameter's support
    fn in_support(&self, value: f64) -> bool;

    /// Log score of the whole state at the current value
    fn log_score(&mut self) -> f64;
}

/// Source of random-walk proposals and acceptance draws.
pub trait ProposalSource {
    /// Draw a proposal centred at `current`
    fn propose(&mut self, current: f64, stdev: f64) -> f64;

    /// Draw `u ~ Uniform(0,1)`
    fn uniform(&mut self) -> f64;
}
