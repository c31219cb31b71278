//! Nested-CRP tree of topics.
//!
//! Topics live in an arena of slots addressed by [`TopicId`] handles.
//! A handle carries the generation of its slot, so a handle to a pruned
//! topic is detected instead of silently aliasing a newer topic that
//! reuses the slot.
//!
//! Every topic keeps word-count sufficient statistics together with the
//! cached quantities the samplers read per word:
//!
//! ```text
//! log_pr_word(w)   = ln(n_w + eta) - ln(n + V * eta)
//! lgam_count_eta(w) = lgamma(n_w + eta)
//! ```
//!
//! `ln(n_w + eta)` and `lgamma(n_w + eta)` are refreshed for the touched
//! word on every count update, and the shared normalizer `ln(n + V * eta)`
//! on every update, so all caches always agree with the counts.

use crate::math::ln_gamma;

/// Stable handle of a topic in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TopicId {
    slot: usize,
    generation: usize,
}

/// A topic node with its word statistics.
#[derive(Debug, Clone)]
pub struct Topic {
    id: usize,
    level: usize,
    parent: Option<TopicId>,
    children: Vec<TopicId>,
    word_counts: Vec<usize>,
    log_count_eta: Vec<f64>,
    lgam_count_eta: Vec<f64>,
    log_norm: f64,
    topic_word_no: usize,
    author_no: usize,
    scaling: f64,
    probability: f64,
}

impl Topic {
    /// Monotonic id assigned by the tree
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn parent(&self) -> Option<TopicId> {
        self.parent
    }

    pub fn children(&self) -> &[TopicId] {
        &self.children
    }

    pub fn word_count(&self, word_id: usize) -> usize {
        self.word_counts[word_id]
    }

    pub fn word_counts(&self) -> &[usize] {
        &self.word_counts
    }

    /// Total number of tokens explained by this topic
    pub fn topic_word_no(&self) -> usize {
        self.topic_word_no
    }

    /// Number of authors whose path passes through this topic
    pub fn author_no(&self) -> usize {
        self.author_no
    }

    pub fn scaling(&self) -> f64 {
        self.scaling
    }

    /// Path log-probability from the last path-sampling sweep
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// `ln(n_w + eta) - ln(n + V * eta)`
    #[inline]
    pub fn log_pr_word(&self, word_id: usize) -> f64 {
        self.log_count_eta[word_id] - self.log_norm
    }

    /// `lgamma(n_w + eta)`
    #[inline]
    pub fn lgam_count_eta(&self, word_id: usize) -> f64 {
        self.lgam_count_eta[word_id]
    }

    fn refresh_word(&mut self, word_id: usize, eta: f64) {
        let c = self.word_counts[word_id] as f64;
        self.log_count_eta[word_id] = (c + eta).ln();
        self.lgam_count_eta[word_id] = ln_gamma(c + eta);
    }

    fn refresh_norm(&mut self, eta: f64) {
        let vocab_size = self.word_counts.len() as f64;
        self.log_norm = (self.topic_word_no as f64 + vocab_size * eta).ln();
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: usize,
    topic: Option<Topic>,
}

/// Fixed-depth tree of topics with per-level Dirichlet parameters.
#[derive(Debug, Clone)]
pub struct TopicTree {
    depth: usize,
    vocab_size: usize,
    eta: Vec<f64>,
    scaling_shape: f64,
    scaling_scale: f64,
    slots: Vec<Slot>,
    vacant: Vec<usize>,
    root: TopicId,
    next_id: usize,
    num_topics: usize,
}

impl TopicTree {
    /// Create a tree holding only its root topic.
    ///
    /// * `depth` - number of levels, fixed for the lifetime of the tree
    /// * `vocab_size` - number of distinct word ids
    /// * `eta` - Dirichlet concentration, one value per level
    /// * `scaling_shape`, `scaling_scale` - prior of the per-topic CRP scaling
    pub fn new(
        depth: usize,
        vocab_size: usize,
        eta: Vec<f64>,
        scaling_shape: f64,
        scaling_scale: f64,
    ) -> Self {
        assert!(depth >= 1, "tree depth must be at least 1");
        assert_eq!(eta.len(), depth, "need one eta per level");

        let mut tree = TopicTree {
            depth,
            vocab_size,
            eta,
            scaling_shape,
            scaling_scale,
            slots: vec![],
            vacant: vec![],
            root: TopicId {
                slot: 0,
                generation: 0,
            },
            next_id: 0,
            num_topics: 0,
        };
        tree.root = tree.new_topic(0, None);
        tree
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn root(&self) -> TopicId {
        self.root
    }

    pub fn eta(&self, level: usize) -> f64 {
        self.eta[level]
    }

    pub fn etas(&self) -> &[f64] {
        &self.eta
    }

    pub fn scaling_shape(&self) -> f64 {
        self.scaling_shape
    }

    pub fn scaling_scale(&self) -> f64 {
        self.scaling_scale
    }

    /// Number of live topics
    pub fn num_topics(&self) -> usize {
        self.num_topics
    }

    /// Whether `id` still refers to a live topic
    pub fn is_live(&self, id: TopicId) -> bool {
        self.slots
            .get(id.slot)
            .map(|s| s.generation == id.generation && s.topic.is_some())
            .unwrap_or(false)
    }

    /// Access a live topic; a pruned handle is an invariant violation.
    #[inline]
    pub fn topic(&self, id: TopicId) -> &Topic {
        let slot = &self.slots[id.slot];
        match (&slot.topic, slot.generation == id.generation) {
            (Some(topic), true) => topic,
            _ => panic!("topic handle {:?} refers to a pruned topic", id),
        }
    }

    #[inline]
    fn topic_mut(&mut self, id: TopicId) -> &mut Topic {
        let slot = &mut self.slots[id.slot];
        match (&mut slot.topic, slot.generation == id.generation) {
            (Some(topic), true) => topic,
            _ => panic!("topic handle {:?} refers to a pruned topic", id),
        }
    }

    /// Iterate over all live topics in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (TopicId, &Topic)> {
        self.slots.iter().enumerate().filter_map(|(slot, s)| {
            s.topic.as_ref().map(|t| {
                (
                    TopicId {
                        slot,
                        generation: s.generation,
                    },
                    t,
                )
            })
        })
    }

    /// Number of live topics at each level.
    pub fn topics_per_level(&self) -> Vec<usize> {
        let mut counts = vec![0; self.depth];
        for (_, t) in self.iter() {
            counts[t.level] += 1;
        }
        counts
    }

    fn new_topic(&mut self, level: usize, parent: Option<TopicId>) -> TopicId {
        let eta = self.eta[level];
        let v = self.vocab_size;

        let mut topic = Topic {
            id: self.next_id,
            level,
            parent,
            children: vec![],
            word_counts: vec![0; v],
            log_count_eta: vec![eta.ln(); v],
            lgam_count_eta: vec![ln_gamma(eta); v],
            log_norm: 0.0,
            topic_word_no: 0,
            author_no: 0,
            scaling: self.scaling_shape * self.scaling_scale,
            probability: 0.0,
        };
        topic.refresh_norm(eta);
        self.next_id += 1;
        self.num_topics += 1;

        if let Some(slot) = self.vacant.pop() {
            let s = &mut self.slots[slot];
            s.generation += 1;
            s.topic = Some(topic);
            TopicId {
                slot,
                generation: s.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                topic: Some(topic),
            });
            TopicId {
                slot: self.slots.len() - 1,
                generation: 0,
            }
        }
    }

    /// Add one more count (`delta = 1`) or remove one (`delta = -1`) of
    /// `word_id` to `topic`, refreshing the cached probabilities.
    pub fn update_word_count(&mut self, topic: TopicId, word_id: usize, delta: i64) {
        let eta = self.eta[self.topic(topic).level];
        let t = self.topic_mut(topic);

        let count = t.word_counts[word_id] as i64 + delta;
        let total = t.topic_word_no as i64 + delta;
        assert!(
            count >= 0 && total >= 0,
            "negative word count for word {} in topic {}",
            word_id,
            t.id
        );
        t.word_counts[word_id] = count as usize;
        t.topic_word_no = total as usize;

        t.refresh_word(word_id, eta);
        t.refresh_norm(eta);
    }

    /// Change the number of authors passing through `topic`.
    pub fn update_author_no(&mut self, topic: TopicId, delta: i64) {
        let t = self.topic_mut(topic);
        let count = t.author_no as i64 + delta;
        assert!(count >= 0, "negative author count in topic {}", t.id);
        t.author_no = count as usize;
    }

    pub fn set_probability(&mut self, topic: TopicId, probability: f64) {
        self.topic_mut(topic).probability = probability;
    }

    /// Set the Dirichlet parameter of a level and refresh the caches of
    /// every topic at that level.
    pub fn set_eta(&mut self, level: usize, eta: f64) {
        self.eta[level] = eta;
        for slot in self.slots.iter_mut() {
            if let Some(t) = slot.topic.as_mut().filter(|t| t.level == level) {
                for w in 0..t.word_counts.len() {
                    t.refresh_word(w, eta);
                }
                t.refresh_norm(eta);
            }
        }
    }

    /// Create a new child under `parent`.
    pub fn add_child(&mut self, parent: TopicId) -> TopicId {
        let level = self.topic(parent).level + 1;
        assert!(level < self.depth, "cannot grow below the leaf level");
        let child = self.new_topic(level, Some(parent));
        self.topic_mut(parent).children.push(child);
        child
    }

    /// Extend a branch from `from` down to the leaf level, one new topic
    /// per missing level. Returns the leaf (`from` itself if it is a leaf).
    pub fn grow_path(&mut self, from: TopicId) -> TopicId {
        let mut topic = from;
        while self.topic(topic).level < self.depth - 1 {
            topic = self.add_child(topic);
        }
        topic
    }

    /// Remove `topic` if no author passes through it, then do the same
    /// for its parent, and so on upward. The root is never removed.
    /// Pruning a handle that is already gone does nothing.
    pub fn prune(&mut self, topic: TopicId) {
        let mut current = topic;
        while self.is_live(current) {
            let t = self.topic(current);
            if t.author_no > 0 {
                return;
            }
            let Some(parent) = t.parent else {
                return;
            };

            self.remove_subtree(current);

            let siblings = &mut self.topic_mut(parent).children;
            if let Some(pos) = siblings.iter().position(|&c| c == current) {
                siblings.swap_remove(pos);
            }
            current = parent;
        }
    }

    fn remove_subtree(&mut self, topic: TopicId) {
        let children = std::mem::take(&mut self.topic_mut(topic).children);
        for child in children {
            self.remove_subtree(child);
        }
        self.slots[topic.slot].topic = None;
        self.vacant.push(topic.slot);
        self.num_topics -= 1;
    }

    /// Collapsed Dirichlet-multinomial log-likelihood of the whole tree.
    pub fn eta_score(&self) -> f64 {
        self.eta_score_at(self.root)
    }

    /// ```text
    /// lgamma(V eta) - V lgamma(eta) + sum_w lgamma(n_w + eta) - lgamma(n + V eta)
    /// ```
    /// for `topic`, plus the same for each descendant holding words.
    pub fn eta_score_at(&self, topic: TopicId) -> f64 {
        let t = self.topic(topic);
        let eta = self.eta[t.level];
        let v = self.vocab_size as f64;

        let mut score = ln_gamma(v * eta) - v * ln_gamma(eta);
        score += t.lgam_count_eta.iter().sum::<f64>();
        score -= ln_gamma(t.topic_word_no as f64 + v * eta);

        for &child in t.children.iter() {
            score += self.descendant_eta_score(child);
        }
        score
    }

    /// An empty topic adds nothing itself, but its subtree is still scored.
    fn descendant_eta_score(&self, topic: TopicId) -> f64 {
        let t = self.topic(topic);
        if t.topic_word_no > 0 {
            self.eta_score_at(topic)
        } else {
            t.children
                .iter()
                .map(|&c| self.descendant_eta_score(c))
                .sum()
        }
    }

    /// CRP branching log-likelihood of the whole tree.
    pub fn gamma_score(&self) -> f64 {
        self.gamma_score_at(self.root)
    }

    /// ```text
    /// -lgamma(s + m) + sum_c [lgamma(s + m_c) + gamma_score(c)]
    /// ```
    /// where `s` is the scaling and `m` the author count; leaves score 0.
    pub fn gamma_score_at(&self, topic: TopicId) -> f64 {
        let t = self.topic(topic);
        if t.children.is_empty() {
            return 0.0;
        }

        let mut score = -ln_gamma(t.scaling + t.author_no as f64);
        for &child in t.children.iter() {
            score += ln_gamma(t.scaling + self.topic(child).author_no as f64);
            score += self.gamma_score_at(child);
        }
        score
    }

    /// Pre-order walk from `start` accumulating
    /// `exp(probability - log_normalizer)`; returns the first topic whose
    /// running sum reaches `u`. If round-off keeps the sum below `u`, the
    /// last visited topic is returned.
    pub fn sample_topic(&self, start: TopicId, log_normalizer: f64, u: f64) -> TopicId {
        let mut sum = 0.0;
        let mut last = start;
        self.sample_dfs(start, &mut sum, &mut last, log_normalizer, u)
            .unwrap_or(last)
    }

    fn sample_dfs(
        &self,
        topic: TopicId,
        sum: &mut f64,
        last: &mut TopicId,
        log_normalizer: f64,
        u: f64,
    ) -> Option<TopicId> {
        *last = topic;
        let t = self.topic(topic);
        *sum += (t.probability - log_normalizer).exp();
        if *sum >= u {
            return Some(topic);
        }
        for &child in t.children.iter() {
            if let Some(found) = self.sample_dfs(child, sum, last, log_normalizer, u) {
                return Some(found);
            }
        }
        None
    }
}
