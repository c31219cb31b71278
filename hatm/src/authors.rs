//! Authors: their topic path, owned tokens and per-level token counts.

use crate::math::log_sum;
use crate::topic_tree::{TopicId, TopicTree};
use crate::words::WordStore;
use rand::seq::SliceRandom;
use rand::Rng;

/// One author of the corpus.
///
/// `path[l]` is the topic at level `l` (0 = root). Every owned token
/// with level `l` is counted in `level_counts[l]` and in the word
/// counts of `path[l]`.
#[derive(Debug, Clone)]
pub struct Author {
    id: usize,
    path: Vec<TopicId>,
    words: Vec<usize>,
    level_counts: Vec<usize>,
    log_pr_level: Vec<f64>,
    score: f64,
}

impl Author {
    pub fn new(id: usize, depth: usize) -> Self {
        Author {
            id,
            path: vec![],
            words: vec![],
            level_counts: vec![0; depth],
            log_pr_level: vec![0.0; depth],
            score: 0.0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn depth(&self) -> usize {
        self.level_counts.len()
    }

    /// Reset level counts and level log-probabilities to zero.
    pub fn init_level_counts(&mut self, depth: usize) {
        self.level_counts = vec![0; depth];
        self.log_pr_level = vec![0.0; depth];
    }

    pub fn level_count(&self, level: usize) -> usize {
        self.level_counts[level]
    }

    pub fn level_counts(&self) -> &[usize] {
        &self.level_counts
    }

    pub fn sum_level_counts(&self) -> usize {
        self.level_counts.iter().sum()
    }

    pub fn update_level_count(&mut self, level: usize, delta: i64) {
        let count = self.level_counts[level] as i64 + delta;
        assert!(
            count >= 0,
            "negative level count at level {} for author {}",
            level,
            self.id
        );
        self.level_counts[level] = count as usize;
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }

    pub fn path(&self) -> &[TopicId] {
        &self.path
    }

    #[inline]
    pub fn path_topic(&self, level: usize) -> TopicId {
        match self.path.get(level) {
            Some(&topic) => topic,
            None => panic!("author {} has no topic at level {}", self.id, level),
        }
    }

    /// Write the path from `leaf` upward, overwriting levels
    /// `start_level..depth`. An author without a path must start at 0.
    pub fn set_path_from_leaf(&mut self, tree: &TopicTree, leaf: TopicId, start_level: usize) {
        let depth = tree.depth();
        assert_eq!(tree.topic(leaf).level(), depth - 1, "path must end at a leaf");
        if self.path.is_empty() {
            assert_eq!(start_level, 0, "author {} has no path yet", self.id);
            self.path = vec![leaf; depth];
        }

        let mut topic = leaf;
        for level in (start_level..depth).rev() {
            self.path[level] = topic;
            if level > start_level {
                topic = tree
                    .topic(topic)
                    .parent()
                    .unwrap_or_else(|| panic!("topic at level {} has no parent", level));
            }
        }
    }

    #[inline]
    pub fn log_pr_level(&self, level: usize) -> f64 {
        self.log_pr_level[level]
    }

    pub fn log_pr_levels(&self) -> &[f64] {
        &self.log_pr_level
    }

    /// Unnormalized log-probability of stopping at each level under the
    /// GEM stick-breaking prior, given the current level counts.
    ///
    /// ```text
    /// e_i = ((1 - m) s + n_i) / (s + n_i + n_{>i})
    /// log_pr[i] = ln e_i + sum_{j<i} ln(1 - e_j)        for i < depth - 1
    /// log_pr[depth - 1] = ln(1 - sum_{i<depth-1} exp(log_pr[i]))
    /// ```
    pub fn compute_log_pr_level(&mut self, gem_mean: f64, gem_scale: f64) {
        let depth = self.depth();
        if depth == 1 {
            self.log_pr_level[0] = 0.0;
            return;
        }

        let mut remaining = self.sum_level_counts() as f64;
        let mut sum_log_pr = 0.0;
        let mut last_section = 0.0;

        for i in 0..depth - 1 {
            let count = self.level_counts[i] as f64;
            remaining -= count;

            let expected_stick_len =
                ((1.0 - gem_mean) * gem_scale + count) / (gem_scale + count + remaining);

            self.log_pr_level[i] = expected_stick_len.ln() + sum_log_pr;

            last_section = if i == 0 {
                self.log_pr_level[i]
            } else {
                log_sum(self.log_pr_level[i], last_section)
            };
            sum_log_pr += (1.0 - expected_stick_len).ln();
        }

        // round-off can push the mass of the upper levels past 1
        self.log_pr_level[depth - 1] = (-last_section.min(0.0).exp()).ln_1p();
    }

    /// Token indices owned by this author, in processing order
    pub fn words(&self) -> &[usize] {
        &self.words
    }

    pub fn n_words(&self) -> usize {
        self.words.len()
    }

    pub fn add_word(&mut self, token: usize) {
        self.words.push(token);
    }

    /// Forget every owned token. Level counts are untouched.
    pub fn clear_words(&mut self) {
        self.words.clear();
    }

    /// Shuffle the processing order of the owned tokens.
    pub fn permute_words<R: Rng>(&mut self, rng: &mut R) {
        self.words.shuffle(rng);
    }

    /// Take `token` out of its level: its level count and the word count
    /// of the topic at that level. Unassigned tokens are left alone.
    pub fn withdraw_token(&mut self, tree: &mut TopicTree, words: &mut WordStore, token: usize) {
        let t = words.token_mut(token);
        if let Some(level) = t.level.take() {
            self.update_level_count(level, -1);
            tree.update_word_count(self.path_topic(level), t.word_id, -1);
        }
    }

    /// Put an unassigned `token` at `level` of this author's path.
    pub fn place_token(
        &mut self,
        tree: &mut TopicTree,
        words: &mut WordStore,
        token: usize,
        level: usize,
    ) {
        let t = words.token_mut(token);
        assert!(t.level.is_none(), "token {} is already placed", token);
        t.level = Some(level);
        self.update_level_count(level, 1);
        tree.update_word_count(self.path_topic(level), t.word_id, 1);
    }
}

/// All authors, indexed by author id.
#[derive(Debug, Clone, Default)]
pub struct AuthorStore {
    authors: Vec<Author>,
}

impl AuthorStore {
    /// Create `n_authors` authors with ids `0..n_authors`.
    pub fn new(n_authors: usize, depth: usize) -> Self {
        AuthorStore {
            authors: (0..n_authors).map(|id| Author::new(id, depth)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    #[inline]
    pub fn author(&self, id: usize) -> &Author {
        &self.authors[id]
    }

    #[inline]
    pub fn author_mut(&mut self, id: usize) -> &mut Author {
        &mut self.authors[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Author> {
        self.authors.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Author> {
        self.authors.iter_mut()
    }
}
