//! End-to-end tests of the sampler on a small synthetic corpus.

use crate::gibbs::{GibbsInput, GibbsOptions, GibbsState};
use crate::input::parse_corpus;
use crate::path_sampler::{log_gamma_ratio, LevelWordCounts};
use crate::settings::Settings;
use crate::words::WordStore;
use fnv::FnvHashMap;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Three groups of authors, each writing mostly from its own block of
/// the vocabulary plus a few shared words.
fn synthetic_input(n_docs: usize, seed: u64) -> GibbsInput {
    let n_groups = 3;
    let authors_per_group = 2;
    let block = 6;
    let shared = 4;
    let mut rng = SmallRng::seed_from_u64(seed);

    let mut doc_lines = vec![];
    let mut author_lines = vec![];

    for d in 0..n_docs {
        let g = d % n_groups;
        let mut counts: FnvHashMap<usize, usize> = FnvHashMap::default();
        for _ in 0..12 {
            let w = if rng.random::<f64>() < 0.8 {
                shared + g * block + rng.random_range(0..block)
            } else {
                rng.random_range(0..shared)
            };
            *counts.entry(w).or_insert(0) += 1;
        }
        let mut pairs: Vec<(usize, usize)> = counts.into_iter().collect();
        pairs.sort_unstable();

        let body: Vec<String> = pairs.iter().map(|(w, c)| format!("{}:{}", w, c)).collect();
        doc_lines.push(format!("{} {}", pairs.len(), body.join(" ")));

        let first = g * authors_per_group;
        let candidates: Vec<String> = (first..first + authors_per_group)
            .take(1 + d % authors_per_group)
            .map(|a| a.to_string())
            .collect();
        author_lines.push(candidates.join(" "));
    }

    let settings = Settings {
        depth: 3,
        eta: vec![1.0, 0.5, 0.25],
        gem_mean: 0.5,
        gem_scale: 10.0,
        scaling_shape: 1.0,
        scaling_scale: 0.5,
        sample_eta: true,
        sample_gem: true,
    };

    let mut words = WordStore::new();
    let corpus = parse_corpus(
        &doc_lines,
        &author_lines,
        settings.gem_mean,
        settings.gem_scale,
        &mut words,
    );
    GibbsInput::new(corpus, words, settings).unwrap()
}

fn quiet_options(num_restarts: usize) -> GibbsOptions {
    GibbsOptions {
        num_restarts,
        shuffle_lag: 4,
        hyper_lag: 5,
        level_lag: Some(3),
        mh_steps: 10,
        seed: 7,
        show_progress: false,
        ..Default::default()
    }
}

/// Check every count in the state against a recount from the tokens.
fn check_invariants(state: &GibbsState) {
    let tree = state.tree();
    let authors = state.authors();
    let words = state.words();
    let depth = tree.depth();

    // tokens belong to candidate authors and are registered with them
    for doc in state.corpus().documents() {
        for &token in doc.words() {
            let owner = words.token(token).author.expect("token without author");
            assert!(doc.author_ids().contains(&owner));
            assert!(authors.author(owner).words().contains(&token));
        }
    }

    for author in authors.iter() {
        assert_eq!(author.path().len(), depth);
        assert_eq!(author.sum_level_counts(), author.n_words());
        for level in 0..depth {
            let n = author
                .words()
                .iter()
                .filter(|&&t| words.token(t).level == Some(level))
                .count();
            assert_eq!(author.level_count(level), n);
        }
        assert_eq!(tree.topic(author.path_topic(0)).parent(), None);
        for level in 1..depth {
            let parent = tree.topic(author.path_topic(level)).parent();
            assert_eq!(parent, Some(author.path_topic(level - 1)));
        }
    }

    for (id, topic) in tree.iter() {
        let users = authors.iter().filter(|a| a.path().contains(&id)).count();
        assert_eq!(topic.author_no(), users);
        assert_eq!(topic.word_counts().iter().sum::<usize>(), topic.topic_word_no());

        let mut recount = vec![0; tree.vocab_size()];
        for author in authors.iter() {
            for &t in author.words() {
                let token = words.token(t);
                if let Some(level) = token.level {
                    if author.path_topic(level) == id {
                        recount[token.word_id] += 1;
                    }
                }
            }
        }
        assert_eq!(topic.word_counts(), recount.as_slice());
    }
}

#[test]
fn test_initial_state_is_consistent() {
    let input = synthetic_input(30, 1);
    let state = GibbsState::new(input, &quiet_options(1), 3).unwrap();

    check_invariants(&state);
    assert_eq!(state.iteration(), 0);
    assert_eq!(state.trace().len(), 1);
    assert_eq!(state.max_score(), state.score().total);
    assert!(state.score().total.is_finite());
    assert!(state.words().iter().all(|t| t.level.is_some()));
}

#[test]
fn test_iterations_keep_invariants() {
    let input = synthetic_input(30, 2);
    let mut state = GibbsState::new(input, &quiet_options(1), 5).unwrap();

    state
        .run(20, |s| {
            check_invariants(s);
            Ok(())
        })
        .unwrap();

    assert_eq!(state.iteration(), 20);
    assert_eq!(state.trace().len(), 21);
    let best = state
        .trace()
        .iter()
        .map(|s| s.total)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(state.max_score(), best);

    // hyperparameters stay inside their support
    assert!(state.corpus().gem_mean() > 0.0 && state.corpus().gem_mean() < 1.0);
    assert!(state.corpus().gem_scale() > 0.0);
    assert!(state.tree().etas().iter().all(|&e| e > 0.0));
}

#[test]
fn test_author_pass_keeps_token_levels() {
    let input = synthetic_input(30, 8);
    let mut state = GibbsState::new(input, &quiet_options(1), 17).unwrap();
    state.run(3, |_| Ok(())).unwrap();

    for _ in 0..3 {
        state.sample_authors();

        assert!(state.words().iter().all(|t| t.level.is_some()));
        for author in state.authors().iter() {
            assert_eq!(author.sum_level_counts(), author.n_words());
        }
        check_invariants(&state);
    }
}

#[test]
fn test_path_sampling_sees_the_words() {
    let input = synthetic_input(30, 9);
    let mut state = GibbsState::new(input, &quiet_options(1), 19).unwrap();
    state.run(2, |_| Ok(())).unwrap();

    // the author pass runs right before the path draws of an iteration
    state.sample_authors();

    let depth = state.tree().depth();
    let mut informative = 0;
    for author in state.authors().iter().filter(|a| a.n_words() > 0) {
        let counts = LevelWordCounts::from_author(author, state.words(), depth);
        let held: usize = (0..depth)
            .map(|l| counts.level(l).iter().map(|&(_, c)| c).sum::<usize>())
            .sum();
        assert_eq!(held, author.n_words());

        for level in 0..depth {
            if author.level_count(level) > 0 {
                // a new topic would have to explain these words
                let ratio = log_gamma_ratio(author, state.words(), state.tree(), None, level);
                assert!(ratio < 0.0);
                informative += 1;
            }
        }
    }
    assert!(informative > 0);
}

#[test]
fn test_score_is_pure() {
    let input = synthetic_input(20, 3);
    let mut state = GibbsState::new(input, &quiet_options(1), 11).unwrap();
    state.run(5, |_| Ok(())).unwrap();

    let first = state.rescore();
    let second = state.rescore();
    assert_eq!(first, second);
    assert_eq!(first, state.score());
    assert_eq!(first.total, first.gem + first.eta + first.gamma);
}

#[test]
fn test_same_seed_same_chain() {
    let input = synthetic_input(20, 4);
    let mut a = GibbsState::new(input.clone(), &quiet_options(1), 99).unwrap();
    let mut b = GibbsState::new(input, &quiet_options(1), 99).unwrap();
    a.run(8, |_| Ok(())).unwrap();
    b.run(8, |_| Ok(())).unwrap();
    assert_eq!(a.trace(), b.trace());
}

#[test]
fn test_best_of_restarts_keeps_highest_score() {
    let input = synthetic_input(20, 5);
    let options = quiet_options(4);
    let best = GibbsState::best_of_restarts(&input, &options).unwrap();

    let scores: Vec<f64> = (0..options.num_restarts)
        .map(|r| {
            GibbsState::new(input.clone(), &options, options.seed + r as u64)
                .unwrap()
                .score()
                .total
        })
        .collect();
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(best.score().total, max);
    check_invariants(&best);
}

#[test]
fn test_grow_and_prune_on_sampled_tree() {
    let input = synthetic_input(20, 6);
    let mut state = GibbsState::new(input, &quiet_options(1), 13).unwrap();
    state.run(3, |_| Ok(())).unwrap();

    let mut tree = state.tree().clone();
    let before = tree.num_topics();
    let per_level = tree.topics_per_level();

    let root = tree.root();
    let leaf = tree.grow_path(root);
    assert_eq!(tree.num_topics(), before + tree.depth() - 1);
    tree.prune(leaf);

    assert_eq!(tree.num_topics(), before);
    assert_eq!(tree.topics_per_level(), per_level);
    assert_eq!(per_level[0], 1);
    assert_eq!(per_level.iter().sum::<usize>(), before);
}

#[test]
fn test_invalid_settings_are_rejected() {
    let input = synthetic_input(5, 7);
    let mut settings = input.settings.clone();
    settings.gem_mean = 1.5;
    assert!(GibbsInput::new(input.corpus.clone(), input.words.clone(), settings).is_err());

    let empty = parse_corpus(&["1 0:1"], &[""], 0.5, 1.0, &mut WordStore::new());
    assert!(GibbsInput::new(empty, WordStore::new(), input.settings).is_err());
}
