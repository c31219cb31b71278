use crate::chain::MhChain;
use crate::traits::{MhTarget, ProposalSource};
use log::debug;
use rand::Rng;
use rand_distr::StandardNormal;

/// Outcome of a single Metropolis-Hastings transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MhDecision {
    /// The proposal was kept; carries the new log score
    Accepted(f64),
    /// The proposal was scored and the old value restored
    Rejected,
    /// The proposal fell outside the support and was never scored
    OutOfSupport,
}

/// One random-walk transition. Returns the decision; the target holds
/// the accepted value, or its old value otherwise.
///
/// The acceptance test is done in the log domain, `ln(u) < new - old`,
/// so `u = 0` accepts every in-support proposal and `u = 1` only accepts
/// strictly better scores.
///
/// * `target` - parameter under update
/// * `proposal` - proposed value
/// * `current_score` - log score at the current value
/// * `uniform` - acceptance draw, only consumed for in-support proposals
pub fn metropolis_step<T: MhTarget>(
    target: &mut T,
    proposal: f64,
    current_score: f64,
    uniform: impl FnOnce() -> f64,
) -> MhDecision {
    if !target.in_support(proposal) {
        return MhDecision::OutOfSupport;
    }

    let old_value = target.value();
    target.set_value(proposal);
    let new_score = target.log_score();

    let u = uniform();
    if u.ln() < new_score - current_score {
        MhDecision::Accepted(new_score)
    } else {
        target.set_value(old_value);
        MhDecision::Rejected
    }
}

/// Gaussian random-walk Metropolis-Hastings with a fixed number of steps.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    steps: usize,
    stdev: f64,
}

impl RandomWalk {
    /// * `steps` - number of proposals per call to [`RandomWalk::run`]
    /// * `stdev` - standard deviation of the Gaussian proposal
    pub fn new(steps: usize, stdev: f64) -> anyhow::Result<Self> {
        anyhow::ensure!(
            stdev.is_finite() && stdev > 0.0,
            "proposal standard deviation must be positive, got {}",
            stdev
        );
        Ok(Self { steps, stdev })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn stdev(&self) -> f64 {
        self.stdev
    }

    /// Run the walk on `target`, leaving it at the last accepted value.
    pub fn run<T, S>(&self, target: &mut T, source: &mut S) -> MhChain
    where
        T: MhTarget,
        S: ProposalSource,
    {
        let mut chain = MhChain::with_capacity(self.steps);
        let mut current_score = target.log_score();

        for _ in 0..self.steps {
            let proposal = source.propose(target.value(), self.stdev);

            match metropolis_step(target, proposal, current_score, || source.uniform()) {
                MhDecision::Accepted(score) => {
                    current_score = score;
                    chain.accepted += 1;
                }
                MhDecision::Rejected => chain.rejected += 1,
                MhDecision::OutOfSupport => chain.out_of_support += 1,
            }
            chain.push(target.value(), current_score);
        }

        debug!(
            "random walk: {} accepted, {} rejected, {} out of support",
            chain.accepted, chain.rejected, chain.out_of_support
        );
        chain
    }
}

/// Proposal source backed by a random number generator.
pub struct RngSource<'a, R: Rng>(pub &'a mut R);

impl<R: Rng> ProposalSource for RngSource<'_, R> {
    fn propose(&mut self, current: f64, stdev: f64) -> f64 {
        let z: f64 = self.0.sample(StandardNormal);
        current + stdev * z
    }

    fn uniform(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}
