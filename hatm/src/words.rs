//! Registry of word tokens.
//!
//! Every occurrence of a vocabulary word in the corpus becomes one
//! token. Tokens are created once while reading the corpus and are only
//! reassigned afterwards.

/// One word occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Vocabulary id
    pub word_id: usize,
    /// Author currently owning the token
    pub author: Option<usize>,
    /// Level along the owner's path that explains the token
    pub level: Option<usize>,
}

impl Token {
    pub fn new(word_id: usize) -> Self {
        Token {
            word_id,
            author: None,
            level: None,
        }
    }
}

/// All tokens of the corpus, addressed by their index.
#[derive(Debug, Clone, Default)]
pub struct WordStore {
    tokens: Vec<Token>,
}

impl WordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new unassigned token and return its index.
    pub fn add_token(&mut self, word_id: usize) -> usize {
        self.tokens.push(Token::new(word_id));
        self.tokens.len() - 1
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[inline]
    pub fn token(&self, index: usize) -> &Token {
        &self.tokens[index]
    }

    #[inline]
    pub fn token_mut(&mut self, index: usize) -> &mut Token {
        &mut self.tokens[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }
}
