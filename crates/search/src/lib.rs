//! Literal pattern matching used by the LetterPad find & replace surface.
//!
//! Queries are always treated as literal text: regex metacharacters are
//! escaped before compilation. Matching runs independently over each text
//! leaf handed in by the caller and yields non-overlapping, left-to-right
//! spans ranked in document order. A single-string [`SearchEngine`] is kept
//! for plain buffers (previews, CLI output, test oracles).

use std::ops::Range;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Error conditions raised by the matcher.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Options supplied to the matcher.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub pattern: String,
    pub case_sensitive: bool,
    pub whole_word: bool,
}

impl SearchOptions {
    /// Creates a case-insensitive, substring option set for the pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            case_sensitive: false,
            whole_word: false,
        }
    }

    pub fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    pub fn whole_word(mut self, value: bool) -> Self {
        self.whole_word = value;
        self
    }

    /// An empty pattern matches nothing; it is not an error.
    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }
}

/// A located occurrence anchored to one leaf.
///
/// `start..end` is a byte range on character boundaries of the leaf text at
/// the time of matching. `rank` is the 0-based position across the whole
/// document, not per leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatchSpan<K> {
    pub leaf: K,
    pub start: usize,
    pub end: usize,
    pub rank: usize,
}

impl<K> MatchSpan<K> {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A compiled query.
#[derive(Clone, Debug)]
pub struct Matcher {
    regex: Option<Regex>,
    whole_word: bool,
}

impl Matcher {
    pub fn new(options: &SearchOptions) -> Result<Self, SearchError> {
        if options.is_empty() {
            return Ok(Self {
                regex: None,
                whole_word: options.whole_word,
            });
        }
        Ok(Self {
            regex: Some(build_regex(options)?),
            whole_word: options.whole_word,
        })
    }

    /// Whether this matcher can never produce a match.
    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
    }

    /// All non-overlapping occurrences inside `text`, left to right.
    ///
    /// A whole-word candidate rejected because of a neighbouring word
    /// character resumes the scan one character after its start, so a later
    /// occurrence overlapping the rejected one is still found.
    pub fn find_in(&self, text: &str) -> Vec<Range<usize>> {
        let Some(regex) = &self.regex else {
            return Vec::new();
        };

        let mut found = Vec::new();
        let mut cursor = 0usize;
        while cursor <= text.len() {
            let Some(m) = regex.find_at(text, cursor) else {
                break;
            };
            if m.start() == m.end() {
                break;
            }
            if self.whole_word && !is_whole_word(text, m.start(), m.end()) {
                cursor = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
                continue;
            }
            found.push(m.range());
            cursor = m.end();
        }
        found
    }

    /// Matches every leaf in order and ranks the spans across the whole sequence.
    pub fn find_spans<'a, K, I>(&self, leaves: I) -> Vec<MatchSpan<K>>
    where
        K: Copy,
        I: IntoIterator<Item = (K, &'a str)>,
    {
        let mut spans = Vec::new();
        if self.is_empty() {
            return spans;
        }
        for (leaf, text) in leaves {
            for range in self.find_in(text) {
                let rank = spans.len();
                spans.push(MatchSpan {
                    leaf,
                    start: range.start,
                    end: range.end,
                    rank,
                });
            }
        }
        spans
    }
}

/// Compiles `options` and matches the ordered leaf sequence.
pub fn find_spans<'a, K, I>(leaves: I, options: &SearchOptions) -> Result<Vec<MatchSpan<K>>, SearchError>
where
    K: Copy,
    I: IntoIterator<Item = (K, &'a str)>,
{
    Ok(Matcher::new(options)?.find_spans(leaves))
}

/// Represents a single match inside a plain string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchMatch {
    pub start: usize,
    pub end: usize,
    pub matched: String,
}

/// Captures the outcome of a plain-text `replace_all` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaceAllOutcome {
    pub replaced_text: String,
    pub replacements: usize,
}

/// Search engine bound to a single text buffer.
pub struct SearchEngine<'a> {
    text: &'a str,
}

impl<'a> SearchEngine<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    /// Returns all matches for the options.
    pub fn find_all(&self, options: &SearchOptions) -> Result<Vec<SearchMatch>, SearchError> {
        let matcher = Matcher::new(options)?;
        Ok(matcher
            .find_in(self.text)
            .into_iter()
            .map(|range| SearchMatch {
                matched: self.text[range.clone()].to_string(),
                start: range.start,
                end: range.end,
            })
            .collect())
    }

    /// Replaces every match with the literal `replacement`.
    pub fn replace_all(
        &self,
        replacement: &str,
        options: &SearchOptions,
    ) -> Result<ReplaceAllOutcome, SearchError> {
        let matcher = Matcher::new(options)?;
        let ranges = matcher.find_in(self.text);
        let mut replaced_text = String::with_capacity(self.text.len());
        let mut last = 0usize;
        for range in &ranges {
            replaced_text.push_str(&self.text[last..range.start]);
            replaced_text.push_str(replacement);
            last = range.end;
        }
        replaced_text.push_str(&self.text[last..]);
        Ok(ReplaceAllOutcome {
            replaced_text,
            replacements: ranges.len(),
        })
    }
}

fn build_regex(options: &SearchOptions) -> Result<Regex, SearchError> {
    RegexBuilder::new(&regex::escape(&options.pattern))
        .case_insensitive(!options.case_sensitive)
        .build()
        .map_err(|err| SearchError::InvalidPattern(err.to_string()))
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let left = text[..start].chars().next_back().map_or(false, is_word_char);
    let right = text[end..].chars().next().map_or(false, is_word_char);
    !(left || right)
}
