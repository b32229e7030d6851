//! Tokenizers for extracting lexicon terms from indexed values and queries.
//!
//! The same tokenizer runs on both sides: when a value is added to or
//! retracted from an index ([`TokenizeMode::Add`]) and when a text query is
//! split into terms ([`TokenizeMode::Get`]). Positions are assigned the same
//! way in both modes so that phrase matching can compare them directly.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};

/// Terms longer than this (in bytes) are not indexed.
pub const MAX_TERM_LENGTH: usize = 4095;

/// Tokenizer attached to a lexicon table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenizerKind {
    /// The whole value is one term.
    #[default]
    None,
    /// Terms are separated by whitespace.
    Delimit,
    /// Overlapping pairs of grapheme clusters.
    Bigram,
}

impl FromStr for TokenizerKind {
    type Err = Error;

    /// Accepts both short names and the `Token*` spellings (case-insensitive).
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(TokenizerKind::None),
            "delimit" | "tokendelimit" => Ok(TokenizerKind::Delimit),
            "bigram" | "tokenbigram" => Ok(TokenizerKind::Bigram),
            other => Err(Error::argument("tokenizer", format!("unknown tokenizer: {other}"))),
        }
    }
}

/// Which side of the index is tokenizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizeMode {
    /// Indexing a value. Bigram emits the trailing single grapheme of each run.
    Add,
    /// Tokenizing a query. Trailing single graphemes are skipped unless the
    /// whole run is shorter than a bigram.
    Get,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub position: u32,
    /// Set for query tokens shorter than the tokenizer's unit; they must be
    /// looked up by prefix in the lexicon.
    pub prefix: bool,
}

impl TokenizerKind {
    pub fn tokenize<'a>(self, input: &'a str, mode: TokenizeMode) -> Vec<Token<'a>> {
        let tokens = match self {
            TokenizerKind::None => {
                if input.is_empty() {
                    Vec::new()
                } else {
                    vec![Token { text: input, position: 0, prefix: false }]
                }
            }
            TokenizerKind::Delimit => input
                .split_whitespace()
                .enumerate()
                .map(|(i, text)| Token { text, position: i as u32, prefix: false })
                .collect(),
            TokenizerKind::Bigram => bigrams(input, mode),
        };
        tokens
            .into_iter()
            .filter(|t| {
                if t.text.len() > MAX_TERM_LENGTH {
                    log::warn!("skipping term of {} bytes (limit {})", t.text.len(), MAX_TERM_LENGTH);
                    false
                } else {
                    true
                }
            })
            .collect()
    }
}

/// Bigrams over whitespace-separated runs. Positions are grapheme offsets in
/// the whole input, so gaps between runs are preserved.
fn bigrams(input: &str, mode: TokenizeMode) -> Vec<Token<'_>> {
    let graphemes: Vec<(usize, &str)> = input.grapheme_indices(true).collect();
    let mut tokens = Vec::new();
    let mut run_start: Option<usize> = None;

    for i in 0..=graphemes.len() {
        let is_space = graphemes
            .get(i)
            .map_or(true, |(_, g)| g.chars().all(char::is_whitespace));
        match (run_start, is_space) {
            (None, false) => run_start = Some(i),
            (Some(start), true) => {
                emit_run(input, &graphemes, start, i, mode, &mut tokens);
                run_start = None;
            }
            _ => {}
        }
    }
    tokens
}

fn emit_run<'a>(
    input: &'a str,
    graphemes: &[(usize, &'a str)],
    start: usize,
    end: usize,
    mode: TokenizeMode,
    out: &mut Vec<Token<'a>>,
) {
    let byte_end = |i: usize| graphemes.get(i).map_or(input.len(), |(offset, _)| *offset);
    let run_len = end - start;

    if run_len == 1 {
        let (offset, g) = graphemes[start];
        out.push(Token {
            text: &input[offset..offset + g.len()],
            position: start as u32,
            prefix: mode == TokenizeMode::Get,
        });
        return;
    }

    for i in start..end {
        let last = i + 1 == end;
        if last && mode == TokenizeMode::Get {
            break;
        }
        let from = graphemes[i].0;
        let to = if last { byte_end(end) } else { byte_end(i + 2) };
        out.push(Token {
            text: &input[from..to],
            position: i as u32,
            prefix: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts<'a>(tokens: &[Token<'a>]) -> Vec<&'a str> {
        tokens.iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_bigram_add_mode() {
        let tokens = TokenizerKind::Bigram.tokenize("hello", TokenizeMode::Add);
        assert_eq!(texts(&tokens), vec!["he", "el", "ll", "lo", "o"]);
        assert_eq!(tokens[4].position, 4);
        assert!(tokens.iter().all(|t| !t.prefix));
    }

    #[test]
    fn test_bigram_get_mode_skips_trailing_single() {
        let tokens = TokenizerKind::Bigram.tokenize("hello", TokenizeMode::Get);
        assert_eq!(texts(&tokens), vec!["he", "el", "ll", "lo"]);
    }

    #[test]
    fn test_bigram_short_query_is_prefix() {
        let tokens = TokenizerKind::Bigram.tokenize("l", TokenizeMode::Get);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "l");
        assert!(tokens[0].prefix);

        let tokens = TokenizerKind::Bigram.tokenize("l", TokenizeMode::Add);
        assert!(!tokens[0].prefix);
    }

    #[test]
    fn test_bigram_positions_span_whitespace() {
        let tokens = TokenizerKind::Bigram.tokenize("ab cd", TokenizeMode::Add);
        let pairs: Vec<(&str, u32)> = tokens.iter().map(|t| (t.text, t.position)).collect();
        assert_eq!(pairs, vec![("ab", 0), ("b", 1), ("cd", 3), ("d", 4)]);
    }

    #[test]
    fn test_bigram_multibyte() {
        let tokens = TokenizerKind::Bigram.tokenize("エンジン", TokenizeMode::Get);
        assert_eq!(texts(&tokens), vec!["エン", "ンジ", "ジン"]);
    }

    #[test]
    fn test_delimit() {
        let tokens = TokenizerKind::Delimit.tokenize("  ruby  python rust ", TokenizeMode::Add);
        assert_eq!(texts(&tokens), vec!["ruby", "python", "rust"]);
        assert_eq!(tokens[2].position, 2);
    }

    #[test]
    fn test_none_keeps_whole_value() {
        let tokens = TokenizerKind::None.tokenize("New York", TokenizeMode::Add);
        assert_eq!(texts(&tokens), vec!["New York"]);
        assert!(TokenizerKind::None.tokenize("", TokenizeMode::Add).is_empty());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("TokenBigram".parse::<TokenizerKind>().unwrap(), TokenizerKind::Bigram);
        assert_eq!("delimit".parse::<TokenizerKind>().unwrap(), TokenizerKind::Delimit);
        assert!("TokenMecab".parse::<TokenizerKind>().is_err());
    }
}
