//! Metropolis-Hastings updates of the GEM mean, GEM scale and the
//! per-level Dirichlet concentrations.

use crate::authors::AuthorStore;
use crate::corpus::Corpus;
use crate::score::gem_score;
use crate::topic_tree::TopicTree;
use log::info;
use mcmc_util::{MhChain, MhTarget, ProposalSource, RandomWalk};

/// GEM scale, scored by the corpus-wide GEM score
pub struct GemScaleTarget<'a> {
    pub corpus: &'a mut Corpus,
    pub authors: &'a mut AuthorStore,
    pub depth: usize,
}

impl MhTarget for GemScaleTarget<'_> {
    fn value(&self) -> f64 {
        self.corpus.gem_scale()
    }

    fn set_value(&mut self, value: f64) {
        self.corpus.set_gem_scale(value);
    }

    fn in_support(&self, value: f64) -> bool {
        value > 0.0
    }

    fn log_score(&mut self) -> f64 {
        gem_score(self.corpus, self.authors, self.depth)
    }
}

/// GEM mean, scored by the corpus-wide GEM score
pub struct GemMeanTarget<'a> {
    pub corpus: &'a mut Corpus,
    pub authors: &'a mut AuthorStore,
    pub depth: usize,
}

impl MhTarget for GemMeanTarget<'_> {
    fn value(&self) -> f64 {
        self.corpus.gem_mean()
    }

    fn set_value(&mut self, value: f64) {
        self.corpus.set_gem_mean(value);
    }

    fn in_support(&self, value: f64) -> bool {
        value > 0.0 && value < 1.0
    }

    fn log_score(&mut self) -> f64 {
        gem_score(self.corpus, self.authors, self.depth)
    }
}

/// Dirichlet concentration of one level, scored by the tree's Eta score.
/// Setting a value refreshes the word caches of the whole level.
pub struct EtaTarget<'a> {
    pub tree: &'a mut TopicTree,
    pub level: usize,
}

impl MhTarget for EtaTarget<'_> {
    fn value(&self) -> f64 {
        self.tree.eta(self.level)
    }

    fn set_value(&mut self, value: f64) {
        self.tree.set_eta(self.level, value);
    }

    fn in_support(&self, value: f64) -> bool {
        value > 0.0
    }

    fn log_score(&mut self) -> f64 {
        self.tree.eta_score()
    }
}

/// Random walks for each hyperparameter.
#[derive(Debug, Clone)]
pub struct HyperparameterSampler {
    gem_scale: RandomWalk,
    gem_mean: RandomWalk,
    eta: RandomWalk,
}

impl HyperparameterSampler {
    /// * `steps` - proposals per parameter and call
    /// * `gem_scale_stdev`, `gem_mean_stdev`, `eta_stdev` - proposal step sizes
    pub fn new(
        steps: usize,
        gem_scale_stdev: f64,
        gem_mean_stdev: f64,
        eta_stdev: f64,
    ) -> anyhow::Result<Self> {
        Ok(HyperparameterSampler {
            gem_scale: RandomWalk::new(steps, gem_scale_stdev)?,
            gem_mean: RandomWalk::new(steps, gem_mean_stdev)?,
            eta: RandomWalk::new(steps, eta_stdev)?,
        })
    }

    /// Resample the GEM scale, then the GEM mean. Each author's GEM
    /// score is left at the value of the final state.
    pub fn sample_gem<S: ProposalSource>(
        &self,
        corpus: &mut Corpus,
        authors: &mut AuthorStore,
        depth: usize,
        source: &mut S,
    ) -> (MhChain, MhChain) {
        let scale_chain = self.gem_scale.run(
            &mut GemScaleTarget {
                corpus: &mut *corpus,
                authors: &mut *authors,
                depth,
            },
            source,
        );
        log_chain("GEM scale", &scale_chain, corpus.gem_scale());

        let mean_chain = self.gem_mean.run(
            &mut GemMeanTarget {
                corpus: &mut *corpus,
                authors: &mut *authors,
                depth,
            },
            source,
        );
        log_chain("GEM mean", &mean_chain, corpus.gem_mean());

        gem_score(corpus, authors, depth);
        (scale_chain, mean_chain)
    }

    /// Resample the Dirichlet concentration of every level in turn.
    pub fn sample_eta<S: ProposalSource>(&self, tree: &mut TopicTree, source: &mut S) -> Vec<MhChain> {
        (0..tree.depth())
            .map(|level| {
                let chain = self.eta.run(&mut EtaTarget { tree: &mut *tree, level }, source);
                log_chain(&format!("eta[{}]", level), &chain, tree.eta(level));
                chain
            })
            .collect()
    }
}

fn log_chain(name: &str, chain: &MhChain, value: f64) {
    info!(
        "{}: {:.6} ({} accepted, {} rejected, {} out of support)",
        name, value, chain.accepted, chain.rejected, chain.out_of_support
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    struct Scripted {
        proposals: Vec<f64>,
        u: f64,
        next: usize,
    }

    impl Scripted {
        fn new(proposals: &[f64], u: f64) -> Self {
            Scripted {
                proposals: proposals.to_vec(),
                u,
                next: 0,
            }
        }
    }

    impl ProposalSource for Scripted {
        fn propose(&mut self, _current: f64, _stdev: f64) -> f64 {
            let p = self.proposals[self.next % self.proposals.len()];
            self.next += 1;
            p
        }
        fn uniform(&mut self) -> f64 {
            self.u
        }
    }

    fn authors() -> AuthorStore {
        let counts: [[usize; 3]; 3] = [[5, 2, 1], [0, 3, 4], [7, 0, 0]];
        let mut store = AuthorStore::new(counts.len(), 3);
        for (a, c) in counts.iter().enumerate() {
            for (l, &n) in c.iter().enumerate() {
                store.author_mut(a).update_level_count(l, n as i64);
            }
        }
        store
    }

    /// Expected final value under the strict-improvement rule.
    fn strict_walk(
        start: f64,
        proposals: &[f64],
        in_support: impl Fn(f64) -> bool,
        score: impl Fn(f64) -> f64,
    ) -> f64 {
        let mut current = start;
        for &p in proposals {
            if in_support(p) && score(p) > score(current) {
                current = p;
            }
        }
        current
    }

    #[test]
    fn test_zero_draw_keeps_last_valid_proposal() {
        let mut corpus = Corpus::new(0.5, 1.0);
        let mut store = authors();
        let scale_props = [-1.0, 2.5, 0.0, 7.0, -0.2];
        let mean_props = [1.5, 0.2, -0.3, 0.9, 1.0];

        let sampler = HyperparameterSampler::new(5, 1.0, 0.05, 0.005).unwrap();
        let mut source = Scripted::new(&scale_props, 0.0);
        let scale_chain = sampler.gem_scale.run(
            &mut GemScaleTarget {
                corpus: &mut corpus,
                authors: &mut store,
                depth: 3,
            },
            &mut source,
        );
        assert_eq!(corpus.gem_scale(), 7.0);
        assert_eq!(scale_chain.accepted, 2);
        assert_eq!(scale_chain.out_of_support, 3);

        let mut source = Scripted::new(&mean_props, 0.0);
        let mean_chain = sampler.gem_mean.run(
            &mut GemMeanTarget {
                corpus: &mut corpus,
                authors: &mut store,
                depth: 3,
            },
            &mut source,
        );
        assert_eq!(corpus.gem_mean(), 0.9);
        assert_eq!(mean_chain.accepted, 2);
        assert_eq!(mean_chain.out_of_support, 3);
    }

    #[test]
    fn test_unit_draw_requires_strict_improvement() {
        let proposals = [0.2, 4.0, 0.7, -2.0, 1.3, 12.0, 0.05];
        let mut corpus = Corpus::new(0.4, 1.0);
        let mut store = authors();

        let score_at = |scale: f64| {
            let c = Corpus::new(0.4, scale);
            gem_score(&c, &mut authors(), 3)
        };
        let expected = strict_walk(1.0, &proposals, |v| v > 0.0, score_at);

        let walk = RandomWalk::new(proposals.len(), 1.0).unwrap();
        let mut source = Scripted::new(&proposals, 1.0);
        let chain = walk.run(
            &mut GemScaleTarget {
                corpus: &mut corpus,
                authors: &mut store,
                depth: 3,
            },
            &mut source,
        );

        assert_eq!(corpus.gem_scale(), expected);
        assert_eq!(chain.out_of_support, 1);
        assert_eq!(chain.accepted + chain.rejected, proposals.len() - 1);
    }

    #[test]
    fn test_gem_mean_support() {
        let mut corpus = Corpus::new(0.5, 2.0);
        let mut store = authors();
        let mut target = GemMeanTarget {
            corpus: &mut corpus,
            authors: &mut store,
            depth: 3,
        };
        assert!(!target.in_support(0.0));
        assert!(!target.in_support(1.0));
        assert!(target.in_support(0.999));
        target.set_value(0.25);
        assert_eq!(target.value(), 0.25);
    }

    #[test]
    fn test_eta_rejection_restores_caches() {
        let mut tree = TopicTree::new(2, 4, vec![0.5, 0.5], 1.0, 1.0);
        let root = tree.root();
        let leaf = tree.grow_path(root);
        for (topic, w) in [(root, 0), (root, 0), (root, 1), (leaf, 2), (leaf, 3), (leaf, 3)] {
            tree.update_word_count(topic, w, 1);
        }
        let before: Vec<f64> = (0..4).map(|w| tree.topic(leaf).log_pr_word(w)).collect();
        let score_before = tree.eta_score();

        // every proposal is either invalid or rejected at u = 1 when worse
        let score_at = |eta: f64| {
            let mut t = tree.clone();
            t.set_eta(1, eta);
            t.eta_score()
        };
        let proposals = [-0.1, 1e-6, 0.0];
        let expected = strict_walk(0.5, &proposals, |v| v > 0.0, score_at);

        let walk = RandomWalk::new(proposals.len(), 0.005).unwrap();
        let mut source = Scripted::new(&proposals, 1.0);
        walk.run(&mut EtaTarget { tree: &mut tree, level: 1 }, &mut source);

        assert_eq!(tree.eta(1), expected);
        if expected == 0.5 {
            let after: Vec<f64> = (0..4).map(|w| tree.topic(leaf).log_pr_word(w)).collect();
            assert_eq!(before, after);
            assert_abs_diff_eq!(tree.eta_score(), score_before, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_eta_caches_follow_accepted_value() {
        let mut tree = TopicTree::new(2, 3, vec![1.0, 1.0], 1.0, 1.0);
        let root = tree.root();
        let leaf = tree.grow_path(root);
        tree.update_word_count(leaf, 1, 1);
        tree.update_word_count(leaf, 1, 1);

        let sampler = HyperparameterSampler::new(3, 1.0, 0.05, 0.005).unwrap();
        let mut source = Scripted::new(&[0.25, -1.0, 0.75], 0.0);
        let chains = sampler.sample_eta(&mut tree, &mut source);
        assert_eq!(chains.len(), 2);

        let eta = tree.eta(1);
        let t = tree.topic(leaf);
        for w in 0..3 {
            let n_w = t.word_count(w) as f64;
            assert_abs_diff_eq!(
                t.log_pr_word(w),
                (n_w + eta).ln() - (2.0 + 3.0 * eta).ln(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_sample_gem_refreshes_author_scores() {
        let mut corpus = Corpus::new(0.5, 1.0);
        let mut store = authors();
        let sampler = HyperparameterSampler::new(4, 1.0, 0.05, 0.005).unwrap();
        let mut source = Scripted::new(&[0.3, 2.0], 0.0);
        sampler.sample_gem(&mut corpus, &mut store, 3, &mut source);

        let mut check = authors();
        let total = gem_score(&corpus, &mut check, 3);
        let stored: f64 = store.iter().map(|a| a.score()).sum();
        assert_abs_diff_eq!(stored - corpus.gem_scale(), total, epsilon = 1e-12);
    }
}
