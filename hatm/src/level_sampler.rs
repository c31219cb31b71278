//! Resampling of token levels along an author's path.

use crate::authors::Author;
use crate::math::sample_from_log_pr;
use crate::topic_tree::TopicTree;
use crate::words::WordStore;
use rand::Rng;

/// Draw a level for each token of `author` given its path.
///
/// The GEM level probabilities are recomputed from the current level
/// counts before every draw and combined with each path topic's word
/// probability.
///
/// * `permute` - shuffle the author's token order first
/// * `remove` - withdraw each token from its level before redrawing; if
///   false, tokens that already have a level are left where they are
#[allow(clippy::too_many_arguments)]
pub fn sample_levels<R: Rng>(
    tree: &mut TopicTree,
    author: &mut Author,
    words: &mut WordStore,
    permute: bool,
    remove: bool,
    gem_mean: f64,
    gem_scale: f64,
    rng: &mut R,
) {
    if permute {
        author.permute_words(rng);
    }

    let depth = tree.depth();
    let tokens = author.words().to_vec();
    let mut log_pr = vec![0.0; depth];

    for token in tokens {
        if remove {
            author.withdraw_token(tree, words, token);
        } else if words.token(token).level.is_some() {
            continue;
        }

        author.compute_log_pr_level(gem_mean, gem_scale);
        let word_id = words.token(token).word_id;
        for (level, lp) in log_pr.iter_mut().enumerate() {
            *lp = author.log_pr_level(level) + tree.topic(author.path_topic(level)).log_pr_word(word_id);
        }

        let level = sample_from_log_pr(&log_pr, rng.random());
        author.place_token(tree, words, token, level);
    }
}
