//! Collapsed Gibbs sampler driving the whole model.
//!
//! One iteration resamples, in order: the author of every token, the
//! path of every author, the level of every token, and, on schedule, the
//! hyperparameters. The joint score is recomputed at the end.

use crate::authors::AuthorStore;
use crate::corpus::Corpus;
use crate::hyperparam::HyperparameterSampler;
use crate::input::read_corpus;
use crate::level_sampler::sample_levels;
use crate::path_sampler::sample_author_path;
use crate::score::JointScore;
use crate::settings::{read_settings, Settings};
use crate::topic_tree::TopicTree;
use crate::words::WordStore;
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::{debug, info};
use mcmc_util::RngSource;
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Sampler schedule and Metropolis-Hastings settings.
#[derive(Debug, Clone)]
pub struct GibbsOptions {
    /// Shuffle documents and tokens every this many iterations (0 = never). Default: 100
    pub shuffle_lag: usize,
    /// Resample hyperparameters every this many iterations (0 = never). Default: 0
    pub hyper_lag: usize,
    /// Cycle the path sampling start level every this many iterations;
    /// `None` always samples from the root. Default: None
    pub level_lag: Option<usize>,
    /// Number of initializations to choose the best from. Default: 100
    pub num_restarts: usize,
    /// Random seed; restart `r` uses `seed + r`. Default: 42
    pub seed: u64,
    /// Metropolis-Hastings proposals per hyperparameter update. Default: 100
    pub mh_steps: usize,
    /// Proposal step of the GEM scale. Default: 1.0
    pub gem_scale_stdev: f64,
    /// Proposal step of the GEM mean. Default: 0.05
    pub gem_mean_stdev: f64,
    /// Proposal step of each eta. Default: 0.005
    pub eta_stdev: f64,
    /// Show progress bars. Default: true
    pub show_progress: bool,
}

impl Default for GibbsOptions {
    fn default() -> Self {
        GibbsOptions {
            shuffle_lag: 100,
            hyper_lag: 0,
            level_lag: None,
            num_restarts: 100,
            seed: 42,
            mh_steps: 100,
            gem_scale_stdev: 1.0,
            gem_mean_stdev: 0.05,
            eta_stdev: 0.005,
            show_progress: true,
        }
    }
}

/// The model as read from disk, before any sampling.
#[derive(Debug, Clone)]
pub struct GibbsInput {
    pub corpus: Corpus,
    pub words: WordStore,
    /// Empty tree holding only the root
    pub tree: TopicTree,
    pub settings: Settings,
}

impl GibbsInput {
    /// Validate `settings` and build the empty topic tree for `corpus`.
    pub fn new(mut corpus: Corpus, words: WordStore, settings: Settings) -> anyhow::Result<Self> {
        let eta = settings.validate()?;
        anyhow::ensure!(corpus.num_documents() > 0, "no document has authors");
        anyhow::ensure!(!words.is_empty(), "the corpus has no words");

        corpus.set_gem_mean(settings.gem_mean);
        corpus.set_gem_scale(settings.gem_scale);

        let tree = TopicTree::new(
            settings.depth,
            corpus.word_no(),
            eta,
            settings.scaling_shape,
            settings.scaling_scale,
        );
        Ok(GibbsInput {
            corpus,
            words,
            tree,
            settings,
        })
    }

    /// Read the corpus, authors and settings files.
    pub fn read(corpus_file: &str, authors_file: &str, settings_file: &str) -> anyhow::Result<Self> {
        let settings = read_settings(settings_file)?;
        let mut words = WordStore::new();
        let corpus = read_corpus(
            corpus_file,
            authors_file,
            settings.gem_mean,
            settings.gem_scale,
            &mut words,
        )?;
        Self::new(corpus, words, settings)
    }
}

/// Full sampler state.
pub struct GibbsState {
    corpus: Corpus,
    words: WordStore,
    authors: AuthorStore,
    tree: TopicTree,
    rng: SmallRng,
    hyper: HyperparameterSampler,
    options: GibbsOptions,
    sample_eta: bool,
    sample_gem: bool,
    iteration: usize,
    score: JointScore,
    max_score: f64,
    trace: Vec<JointScore>,
}

impl GibbsState {
    /// Initialize a state from `input` with the given seed.
    ///
    /// Each author in turn gets a brand new branch from the root, a first
    /// level allocation, and (all but the first author) a conditional path
    /// draw followed by a second level pass.
    pub fn new(input: GibbsInput, options: &GibbsOptions, seed: u64) -> anyhow::Result<Self> {
        let GibbsInput {
            corpus,
            words,
            tree,
            settings,
        } = input;

        let hyper = HyperparameterSampler::new(
            options.mh_steps,
            options.gem_scale_stdev,
            options.gem_mean_stdev,
            options.eta_stdev,
        )?;

        let mut state = GibbsState {
            authors: AuthorStore::new(corpus.author_no(), tree.depth()),
            corpus,
            words,
            tree,
            rng: SmallRng::seed_from_u64(seed),
            hyper,
            options: options.clone(),
            sample_eta: settings.sample_eta,
            sample_gem: settings.sample_gem,
            iteration: 0,
            score: JointScore::default(),
            max_score: 0.0,
            trace: vec![],
        };
        state.initialize();
        Ok(state)
    }

    fn initialize(&mut self) {
        let depth = self.tree.depth();

        self.corpus.permute_documents(&mut self.rng);
        self.sample_authors();

        let (gem_mean, gem_scale) = (self.corpus.gem_mean(), self.corpus.gem_scale());

        for a in 0..self.authors.len() {
            let author = self.authors.author_mut(a);
            author.init_level_counts(depth);
            author.permute_words(&mut self.rng);

            let root = self.tree.root();
            let leaf = self.tree.grow_path(root);
            author.set_path_from_leaf(&self.tree, leaf, 0);
            for level in 0..depth {
                self.tree.update_author_no(author.path_topic(level), 1);
            }

            sample_levels(
                &mut self.tree,
                author,
                &mut self.words,
                false,
                false,
                gem_mean,
                gem_scale,
                &mut self.rng,
            );

            if a > 0 {
                sample_author_path(&mut self.tree, author, &self.words, true, 0, &mut self.rng);
            }

            sample_levels(
                &mut self.tree,
                author,
                &mut self.words,
                false,
                true,
                gem_mean,
                gem_scale,
                &mut self.rng,
            );
        }

        self.update_score();
        info!("initial score {:.4}", self.score.total);
    }

    /// Initialize `options.num_restarts` states with seeds
    /// `options.seed + r` and keep the one with the highest score.
    pub fn best_of_restarts(input: &GibbsInput, options: &GibbsOptions) -> anyhow::Result<Self> {
        anyhow::ensure!(options.num_restarts > 0, "need at least one restart");

        let pb = ProgressBar::new(options.num_restarts as u64);
        if !options.show_progress || log::log_enabled!(log::Level::Info) {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        let mut best: Option<GibbsState> = None;
        for r in 0..options.num_restarts {
            let seed = options.seed.wrapping_add(r as u64);
            let state = GibbsState::new(input.clone(), options, seed)?;

            let better = best
                .as_ref()
                .map(|b| state.score.total > b.score.total)
                .unwrap_or(true);
            if better {
                info!("best initial state at restart {}: {:.4}", r, state.score.total);
                best = Some(state);
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        best.ok_or_else(|| anyhow::anyhow!("no initial state"))
    }

    /// Start level of this iteration's path draws
    fn sampling_level(&self) -> usize {
        match self.options.level_lag {
            Some(lag) if lag > 0 && self.iteration % lag == 0 => {
                (self.iteration / lag) % (self.tree.depth() - 1)
            }
            _ => 0,
        }
    }

    fn permute_this_iteration(&self) -> bool {
        self.options.shuffle_lag > 0 && self.iteration % self.options.shuffle_lag == 0
    }

    /// One Gibbs sweep over authorship, paths, levels and (on schedule)
    /// hyperparameters.
    pub fn iterate(&mut self) {
        self.iteration += 1;

        let start_level = self.sampling_level();
        let permute = self.permute_this_iteration();

        if permute {
            self.corpus.permute_documents(&mut self.rng);
        }
        self.sample_authors();

        for a in 0..self.authors.len() {
            sample_author_path(
                &mut self.tree,
                self.authors.author_mut(a),
                &self.words,
                true,
                start_level,
                &mut self.rng,
            );
        }

        let (gem_mean, gem_scale) = (self.corpus.gem_mean(), self.corpus.gem_scale());
        for a in 0..self.authors.len() {
            sample_levels(
                &mut self.tree,
                self.authors.author_mut(a),
                &mut self.words,
                permute,
                true,
                gem_mean,
                gem_scale,
                &mut self.rng,
            );
        }

        let hyper_lag = self.options.hyper_lag;
        if hyper_lag > 0 && self.iteration % hyper_lag == 0 {
            let mut source = RngSource(&mut self.rng);
            if self.sample_eta {
                self.hyper.sample_eta(&mut self.tree, &mut source);
            }
            if self.sample_gem {
                let depth = self.tree.depth();
                self.hyper
                    .sample_gem(&mut self.corpus, &mut self.authors, depth, &mut source);
            }
        }

        self.update_score();
    }

    /// Reassign the author of every token; placed tokens keep their level.
    pub(crate) fn sample_authors(&mut self) {
        self.corpus
            .sample_author_ids(&mut self.words, &mut self.authors, &mut self.tree, &mut self.rng);
    }

    fn update_score(&mut self) {
        self.score = JointScore::compute(&self.corpus, &mut self.authors, &self.tree);
        if self.score.total > self.max_score || self.iteration == 0 {
            self.max_score = self.score.total;
        }
        self.trace.push(self.score);

        debug!(
            "[{}] gem {:.4} eta {:.4} gamma {:.4} score {:.4} best {:.4}",
            self.iteration,
            self.score.gem,
            self.score.eta,
            self.score.gamma,
            self.score.total,
            self.max_score
        );
    }

    /// Run `iterations` sweeps, calling `on_iteration` after each.
    pub fn run<F>(&mut self, iterations: usize, mut on_iteration: F) -> anyhow::Result<()>
    where
        F: FnMut(&GibbsState) -> anyhow::Result<()>,
    {
        let pb = ProgressBar::new(iterations as u64);
        if !self.options.show_progress || log::log_enabled!(log::Level::Info) {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        for _ in 0..iterations {
            self.iterate();
            on_iteration(self)?;
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            "{} topics, per level {:?}, best score {:.4}",
            self.tree.num_topics(),
            self.tree.topics_per_level(),
            self.max_score
        );
        Ok(())
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn words(&self) -> &WordStore {
        &self.words
    }

    pub fn authors(&self) -> &AuthorStore {
        &self.authors
    }

    pub fn tree(&self) -> &TopicTree {
        &self.tree
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Score of the current state
    pub fn score(&self) -> JointScore {
        self.score
    }

    /// Best total score seen so far
    pub fn max_score(&self) -> f64 {
        self.max_score
    }

    /// Scores after initialization and after every iteration
    pub fn trace(&self) -> &[JointScore] {
        &self.trace
    }

    /// Recompute the joint score without touching the stored one.
    pub fn rescore(&mut self) -> JointScore {
        JointScore::compute(&self.corpus, &mut self.authors, &self.tree)
    }
}
