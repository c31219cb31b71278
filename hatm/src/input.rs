//! Reading the corpus and authors files.
//!
//! The two files are line-aligned. A corpus line is
//!
//! ```text
//! <number of distinct words> word_id:count word_id:count ...
//! ```
//!
//! and the matching authors line lists the candidate author ids of that
//! document. Documents with an empty authors line are dropped.

use crate::corpus::{Corpus, Document};
use crate::words::WordStore;
use anyhow::Context;
use flate2::read::GzDecoder;
use log::info;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Open a file for reading, decompressing `.gz` files on the fly.
pub fn open_buf_reader(input_file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let file = File::open(input_file).with_context(|| format!("cannot open {}", input_file))?;
    match Path::new(input_file).extension().and_then(|x| x.to_str()) {
        Some("gz") => Ok(Box::new(BufReader::new(GzDecoder::new(file)))),
        _ => Ok(Box::new(BufReader::new(file))),
    }
}

/// Read the line-aligned corpus and authors files into a [`Corpus`],
/// adding one token per word occurrence to `words`.
pub fn read_corpus(
    docs_file: &str,
    authors_file: &str,
    gem_mean: f64,
    gem_scale: f64,
    words: &mut WordStore,
) -> anyhow::Result<Corpus> {
    let docs = open_buf_reader(docs_file)?
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("reading {}", docs_file))?;
    let authors = open_buf_reader(authors_file)?
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("reading {}", authors_file))?;

    let corpus = parse_corpus(&docs, &authors, gem_mean, gem_scale, words);

    info!(
        "{} documents, {} authors, {} distinct words, {} tokens",
        corpus.num_documents(),
        corpus.author_no(),
        corpus.word_no(),
        words.len()
    );
    Ok(corpus)
}

/// Build a corpus from already split lines. Reading stops at the end of
/// the shorter of the two inputs. Malformed numbers count as zero.
pub fn parse_corpus<S: AsRef<str>>(
    doc_lines: &[S],
    author_lines: &[S],
    gem_mean: f64,
    gem_scale: f64,
    words: &mut WordStore,
) -> Corpus {
    let mut corpus = Corpus::new(gem_mean, gem_scale);
    let mut word_no = 0;
    let mut author_no = 0;

    for (doc_line, author_line) in doc_lines.iter().zip(author_lines.iter()) {
        let author_ids: Vec<usize> = author_line
            .as_ref()
            .split_whitespace()
            .map(|x| x.parse().unwrap_or_default())
            .collect();

        if author_ids.is_empty() {
            continue;
        }
        author_no = author_ids.iter().fold(author_no, |n, &a| n.max(a + 1));

        let mut document = Document::new(corpus.num_documents(), author_ids);

        // the leading distinct-word count is not needed
        for pair in doc_line.as_ref().split_whitespace().skip(1) {
            let mut parts = pair.split(':');
            let word_id: usize = parts.next().and_then(|x| x.parse().ok()).unwrap_or_default();
            let count: usize = parts.next().and_then(|x| x.parse().ok()).unwrap_or_default();

            for _ in 0..count {
                document.add_word(words.add_token(word_id));
            }
            word_no = word_no.max(word_id + 1);
        }
        corpus.add_document(document);
    }

    corpus.set_word_no(word_no);
    corpus.set_author_no(author_no);
    corpus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_corpus() {
        let docs = ["2 0:2 3:1", "1 1:4", "3 2:1 5:0 4:1"];
        let authors = ["0 2", "", "1"];
        let mut words = WordStore::new();
        let corpus = parse_corpus(&docs, &authors, 0.5, 1.0, &mut words);

        // the second document has no authors
        assert_eq!(corpus.num_documents(), 2);
        assert_eq!(corpus.author_no(), 3);
        assert_eq!(corpus.word_no(), 6);
        assert_eq!(words.len(), 5);

        let first = &corpus.documents()[0];
        assert_eq!(first.author_ids(), &[0, 2]);
        let ids: Vec<usize> = first.words().iter().map(|&t| words.token(t).word_id).collect();
        assert_eq!(ids, vec![0, 0, 3]);

        let second = &corpus.documents()[1];
        assert_eq!(second.id(), 1);
        assert_eq!(second.author_ids(), &[1]);
        assert_eq!(second.words().len(), 2);
    }

    #[test]
    fn test_malformed_pairs_and_short_authors() {
        let docs = ["2 x:3 1:y 2:2", "1 0:1"];
        let authors = ["4"];
        let mut words = WordStore::new();
        let corpus = parse_corpus(&docs, &authors, 0.5, 1.0, &mut words);

        assert_eq!(corpus.num_documents(), 1);
        assert_eq!(corpus.author_no(), 5);
        // "x:3" reads as word 0, "1:y" as a zero count
        let ids: Vec<usize> = words.iter().map(|t| t.word_id).collect();
        assert_eq!(ids, vec![0, 0, 0, 2, 2]);
        assert_eq!(corpus.word_no(), 3);
        assert!(words.iter().all(|t| t.author.is_none() && t.level.is_none()));
    }
}
