//! Joint model score: GEM level term, Dirichlet word term (Eta) and CRP
//! branching term (Gamma).

use crate::authors::AuthorStore;
use crate::corpus::Corpus;
use crate::math::{ln_gamma, log_sum};
use crate::topic_tree::TopicTree;

/// Components of the joint log score.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointScore {
    pub gem: f64,
    pub eta: f64,
    pub gamma: f64,
    pub total: f64,
}

impl JointScore {
    /// Score the current state; also refreshes each author's GEM score.
    pub fn compute(corpus: &Corpus, authors: &mut AuthorStore, tree: &TopicTree) -> Self {
        let gem = gem_score(corpus, authors, tree.depth());
        let eta = tree.eta_score();
        let gamma = tree.gamma_score();
        JointScore {
            gem,
            eta,
            gamma,
            total: gem + eta + gamma,
        }
    }
}

/// Corpus-wide GEM score of the authors' level allocations.
///
/// For each author and level `j < depth - 1`, with `a = n_j + (1 - m) s`
/// and `b = n_{>j} + m s`, adds the Beta-function ratio
///
/// ```text
/// lgamma(a) + lgamma(b) - lgamma(a + b) - lgamma(m s) - lgamma((1 - m) s) + lgamma(s)
/// ```
///
/// and, for the deepest level, `n_{depth-1}` times the log of the stick
/// mass remaining after the expected stick lengths. Each author's score is
/// stored on the author; the total is shrunk by `s`.
pub fn gem_score(corpus: &Corpus, authors: &mut AuthorStore, depth: usize) -> f64 {
    let gem_mean = corpus.gem_mean();
    let gem_scale = corpus.gem_scale();
    let prior_a = (1.0 - gem_mean) * gem_scale;
    let prior_b = gem_mean * gem_scale;
    let prior_norm = ln_gamma(prior_a + prior_b) - ln_gamma(prior_a) - ln_gamma(prior_b);

    let mut score = 0.0;

    for author in authors.iter_mut() {
        let counts: Vec<f64> = author.level_counts().iter().map(|&c| c as f64).collect();
        debug_assert_eq!(counts.len(), depth);

        // counts strictly below each level
        let mut deeper = vec![0.0; depth];
        for j in (0..depth.saturating_sub(1)).rev() {
            deeper[j] = deeper[j + 1] + counts[j + 1];
        }

        let mut author_score = 0.0;
        let mut remaining: f64 = counts.iter().sum();
        let mut sum_log_prob = 0.0;
        let mut last_log_prob = 0.0;

        for j in 0..depth - 1 {
            let a = counts[j] + prior_a;
            let b = deeper[j] + prior_b;
            author_score += ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b) + prior_norm;

            remaining -= counts[j];
            let expected_stick_len = (prior_a + counts[j]) / (gem_scale + counts[j] + remaining);
            let log_prob = expected_stick_len.ln() + sum_log_prob;

            last_log_prob = if j == 0 {
                log_prob
            } else {
                log_sum(log_prob, last_log_prob)
            };
            sum_log_prob += (1.0 - expected_stick_len).ln();
        }

        let bottom = counts[depth - 1];
        if depth > 1 && bottom > 0.0 {
            author_score += bottom * (-last_log_prob.min(0.0).exp()).ln_1p();
        }

        author.set_score(author_score);
        score += author_score;
    }

    score - gem_scale
}
