//! Documents and the corpus-level GEM hyperparameters.

use crate::authors::AuthorStore;
use crate::topic_tree::TopicTree;
use crate::words::WordStore;
use rand::seq::SliceRandom;
use rand::Rng;

/// A bag of tokens with the authors allowed to own them.
#[derive(Debug, Clone)]
pub struct Document {
    id: usize,
    words: Vec<usize>,
    author_ids: Vec<usize>,
}

impl Document {
    pub fn new(id: usize, author_ids: Vec<usize>) -> Self {
        Document {
            id,
            words: vec![],
            author_ids,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Token indices into the word store
    pub fn words(&self) -> &[usize] {
        &self.words
    }

    pub fn add_word(&mut self, token: usize) {
        self.words.push(token);
    }

    /// Candidate authors of this document
    pub fn author_ids(&self) -> &[usize] {
        &self.author_ids
    }

    /// Reassign every token to an author drawn uniformly from the
    /// candidates. A placed token moving to another author keeps its
    /// level: its level count and topic word count move from the old
    /// owner's path to the new owner's path at that level. It is left
    /// unassigned only when the new owner has no path yet.
    ///
    /// Owned-token lists must have been cleared beforehand; each token is
    /// appended to its new owner's list.
    fn sample_author_ids<R: Rng>(
        &self,
        words: &mut WordStore,
        authors: &mut AuthorStore,
        tree: &mut TopicTree,
        rng: &mut R,
    ) {
        assert!(
            !self.author_ids.is_empty(),
            "document {} has no candidate authors",
            self.id
        );

        for &token in self.words.iter() {
            let new = self.author_ids[rng.random_range(0..self.author_ids.len())];
            let (previous, level) = {
                let t = words.token(token);
                (t.author, t.level)
            };

            if let (Some(old), Some(level)) = (previous, level) {
                if old != new {
                    authors.author_mut(old).withdraw_token(tree, words, token);
                    let author = authors.author_mut(new);
                    if author.has_path() {
                        author.place_token(tree, words, token, level);
                    }
                }
            }

            words.token_mut(token).author = Some(new);
            authors.author_mut(new).add_word(token);
        }
    }
}

/// The documents together with the GEM mean and scale.
#[derive(Debug, Clone)]
pub struct Corpus {
    gem_mean: f64,
    gem_scale: f64,
    word_no: usize,
    author_no: usize,
    documents: Vec<Document>,
}

impl Corpus {
    pub fn new(gem_mean: f64, gem_scale: f64) -> Self {
        Corpus {
            gem_mean,
            gem_scale,
            word_no: 0,
            author_no: 0,
            documents: vec![],
        }
    }

    pub fn gem_mean(&self) -> f64 {
        self.gem_mean
    }

    pub fn set_gem_mean(&mut self, gem_mean: f64) {
        self.gem_mean = gem_mean;
    }

    pub fn gem_scale(&self) -> f64 {
        self.gem_scale
    }

    pub fn set_gem_scale(&mut self, gem_scale: f64) {
        self.gem_scale = gem_scale;
    }

    /// Vocabulary size
    pub fn word_no(&self) -> usize {
        self.word_no
    }

    pub fn set_word_no(&mut self, word_no: usize) {
        self.word_no = word_no;
    }

    pub fn author_no(&self) -> usize {
        self.author_no
    }

    pub fn set_author_no(&mut self, author_no: usize) {
        self.author_no = author_no;
    }

    pub fn add_document(&mut self, document: Document) {
        self.documents.push(document);
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn num_documents(&self) -> usize {
        self.documents.len()
    }

    pub fn permute_documents<R: Rng>(&mut self, rng: &mut R) {
        self.documents.shuffle(rng);
    }

    /// Resample the author of every token, document by document. The
    /// owned-token lists are rebuilt from scratch in document order.
    pub fn sample_author_ids<R: Rng>(
        &self,
        words: &mut WordStore,
        authors: &mut AuthorStore,
        tree: &mut TopicTree,
        rng: &mut R,
    ) {
        for author in authors.iter_mut() {
            author.clear_words();
        }
        for document in self.documents.iter() {
            document.sample_author_ids(words, authors, tree, rng);
        }
    }
}
