//! Resampling of an author's path through the topic tree.
//!
//! Given the author's level allocation, the path below `start_level` is
//! drawn conditioned on all other paths and the observed words. Every
//! existing topic under the start topic is a candidate; a topic above
//! the leaf level stands for a new branch grown from it.

use crate::authors::Author;
use crate::math::{ln_gamma, log_sum};
use crate::topic_tree::{TopicId, TopicTree};
use crate::words::WordStore;
use fnv::FnvHashMap;
use rand::Rng;

/// Per-level word counts of one author's assigned tokens.
#[derive(Debug, Clone)]
pub struct LevelWordCounts {
    /// `levels[l]` holds `(word_id, count)` sorted by word id
    levels: Vec<Vec<(usize, usize)>>,
}

impl LevelWordCounts {
    pub fn from_author(author: &Author, words: &WordStore, depth: usize) -> Self {
        let mut maps: Vec<FnvHashMap<usize, usize>> = vec![FnvHashMap::default(); depth];
        for &token in author.words() {
            let t = words.token(token);
            if let Some(level) = t.level {
                *maps[level].entry(t.word_id).or_insert(0) += 1;
            }
        }

        let levels = maps
            .into_iter()
            .map(|m| {
                let mut pairs: Vec<(usize, usize)> = m.into_iter().collect();
                pairs.sort_unstable();
                pairs
            })
            .collect();
        LevelWordCounts { levels }
    }

    pub fn level(&self, level: usize) -> &[(usize, usize)] {
        &self.levels[level]
    }

    /// Collapsed Dirichlet-multinomial predictive ratio of the author's
    /// level-`level` tokens under `topic` (`None` = a topic not yet created):
    ///
    /// ```text
    /// lgamma(n + V eta) - lgamma(n + n_a + V eta)
    ///   + sum_w [lgamma(n_w + c_w + eta) - lgamma(n_w + eta)]
    /// ```
    ///
    /// * `level_count` - the author's token count `n_a` at `level`
    pub fn log_gamma_ratio(
        &self,
        tree: &TopicTree,
        topic: Option<TopicId>,
        level: usize,
        level_count: usize,
    ) -> f64 {
        let eta = tree.eta(level);
        let v_eta = tree.vocab_size() as f64 * eta;
        let topic = topic.map(|t| tree.topic(t));

        let word_no = topic.map(|t| t.topic_word_no()).unwrap_or(0) as f64;
        let mut result = ln_gamma(word_no + v_eta) - ln_gamma(word_no + level_count as f64 + v_eta);

        for &(word_id, count) in self.levels[level].iter() {
            let n_w = topic.map(|t| t.word_count(word_id)).unwrap_or(0) as f64;
            result += ln_gamma(n_w + count as f64 + eta) - ln_gamma(n_w + eta);
        }
        result
    }
}

/// `LogGammaRatio` for a single topic, counting the author's tokens at
/// `level` on the fly.
pub fn log_gamma_ratio(
    author: &Author,
    words: &WordStore,
    tree: &TopicTree,
    topic: Option<TopicId>,
    level: usize,
) -> f64 {
    LevelWordCounts::from_author(author, words, tree.depth()).log_gamma_ratio(
        tree,
        topic,
        level,
        author.level_count(level),
    )
}

/// Add (`delta = 1`) or remove (`delta = -1`) the author's contribution
/// below `start_level`: word counts of tokens deeper than `start_level`
/// and author counts of path topics deeper than `start_level`.
pub fn update_tree_from_author(
    tree: &mut TopicTree,
    author: &Author,
    words: &WordStore,
    delta: i64,
    start_level: usize,
) {
    for &token in author.words() {
        let t = words.token(token);
        if let Some(level) = t.level.filter(|&l| l > start_level) {
            tree.update_word_count(author.path_topic(level), t.word_id, delta);
        }
    }

    for level in start_level + 1..tree.depth() {
        tree.update_author_no(author.path_topic(level), delta);
    }
}

/// Withdraw the author from its path below `start_level` and prune the
/// topics nobody uses anymore, from the leaf upward.
pub fn remove_author_from_path(
    tree: &mut TopicTree,
    author: &Author,
    words: &WordStore,
    start_level: usize,
) {
    update_tree_from_author(tree, author, words, -1, start_level);
    let leaf = author.path_topic(tree.depth() - 1);
    tree.prune(leaf);
}

/// Point the author's path at `leaf` (levels `start_level..depth`) and
/// add its contribution to the new path.
pub fn add_path_to_author(
    tree: &mut TopicTree,
    leaf: TopicId,
    author: &mut Author,
    words: &WordStore,
    start_level: usize,
) {
    author.set_path_from_leaf(tree, leaf, start_level);
    update_tree_from_author(tree, author, words, 1, start_level);
}

struct PathContext {
    counts: LevelWordCounts,
    level_counts: Vec<usize>,
    /// log-gamma ratio of each level under a new, empty topic
    fresh: Vec<f64>,
    start_level: usize,
}

/// Resample the author's path below `start_level`.
///
/// * `remove` - withdraw the author from its current path first
pub fn sample_author_path<R: Rng>(
    tree: &mut TopicTree,
    author: &mut Author,
    words: &WordStore,
    remove: bool,
    start_level: usize,
    rng: &mut R,
) {
    let depth = tree.depth();
    assert!(start_level < depth, "start level {} beyond depth", start_level);

    if remove {
        remove_author_from_path(tree, author, words, start_level);
    }

    let start = author.path_topic(start_level);
    let counts = LevelWordCounts::from_author(author, words, depth);
    let fresh = (0..depth)
        .map(|l| counts.log_gamma_ratio(tree, None, l, author.level_count(l)))
        .collect();

    let ctx = PathContext {
        counts,
        level_counts: author.level_counts().to_vec(),
        fresh,
        start_level,
    };

    let mut path_pr = vec![0.0; depth];
    let mut log_normalizer = f64::NEG_INFINITY;
    probabilities_dfs(tree, start, &ctx, &mut log_normalizer, &mut path_pr);

    let u: f64 = rng.random();
    let selected = tree.sample_topic(start, log_normalizer, u);
    let leaf = tree.grow_path(selected);

    add_path_to_author(tree, leaf, author, words, start_level);
}

/// Depth-first pass setting each topic's path log-probability and
/// accumulating the log normalizer over all visited topics.
///
/// `path_pr[l]` for levels above the visited topic is left as written by
/// its ancestors, so the sum over `start_level..depth` scores the whole
/// candidate path.
fn probabilities_dfs(
    tree: &mut TopicTree,
    topic: TopicId,
    ctx: &PathContext,
    log_normalizer: &mut f64,
    path_pr: &mut [f64],
) {
    let depth = tree.depth();
    let t = tree.topic(topic);
    let level = t.level();
    let author_no = t.author_no() as f64;
    let scaling = t.scaling();
    let parent = t.parent();

    path_pr[level] = ctx
        .counts
        .log_gamma_ratio(tree, Some(topic), level, ctx.level_counts[level]);

    if level > ctx.start_level {
        let p = tree.topic(parent.unwrap_or_else(|| panic!("topic at level {} has no parent", level)));
        path_pr[level] += author_no.ln() - (p.author_no() as f64 + p.scaling()).ln();
    }

    if level < depth - 1 {
        path_pr[level + 1..].copy_from_slice(&ctx.fresh[level + 1..]);
        path_pr[level + 1] += scaling.ln() - (author_no + scaling).ln();
    }

    let probability: f64 = path_pr[ctx.start_level..].iter().sum();
    tree.set_probability(topic, probability);
    *log_normalizer = log_sum(*log_normalizer, probability);

    let n_children = tree.topic(topic).children().len();
    for i in 0..n_children {
        let child = tree.topic(topic).children()[i];
        probabilities_dfs(tree, child, ctx, log_normalizer, path_pr);
    }
}
