// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Class index → label mapping.
//!
//! Two text formats are accepted:
//!
//! ```text
//! {0: 'tench, Tinca tinca',
//!  1: 'goldfish, Carassius auratus',
//!  ...}
//! ```
//!
//! a Python dict literal with single- or double-quoted values, or one label
//! per line (line `i` is class `i`).

use crate::PipelineError;
use std::path::Path;

/// Read-only mapping from class index to label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let map = Self::parse(&std::fs::read_to_string(path)?)?;
        tracing::info!("loaded {} labels from {}", map.len(), path.display());
        Ok(map)
    }

    /// Parses either supported format.
    ///
    /// Dict keys must be exactly `0..n` in order.
    pub fn parse(text: &str) -> Result<Self, PipelineError> {
        let trimmed = text.trim();
        let labels = match trimmed.strip_prefix('{') {
            Some(body) => parse_dict(body)?,
            None => trimmed
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        };
        if labels.is_empty() {
            return Err(PipelineError::Labels("no labels found".into()));
        }
        Ok(Self { labels })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<String> for LabelMap {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

/// Parses `key: 'value', ...}` (opening brace already consumed).
fn parse_dict(body: &str) -> Result<Vec<String>, PipelineError> {
    let err = |msg: String| PipelineError::Labels(msg);
    let mut labels = Vec::new();
    let mut rest = body;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if let Some(after) = rest.strip_prefix('}') {
            if !after.trim().is_empty() {
                return Err(err("trailing text after closing brace".into()));
            }
            return Ok(labels);
        }
        if rest.is_empty() {
            return Err(err("missing closing brace".into()));
        }

        let (key, after_key) = rest
            .split_once(':')
            .ok_or_else(|| err(format!("expected 'index: label' near '{}'", preview(rest))))?;
        let key: usize = key
            .trim()
            .parse()
            .map_err(|_| err(format!("invalid class index '{}'", key.trim())))?;
        if key != labels.len() {
            return Err(err(format!(
                "class index {key} out of order (expected {})",
                labels.len()
            )));
        }

        let value = after_key.trim_start();
        let quote = value
            .chars()
            .next()
            .filter(|c| *c == '\'' || *c == '"')
            .ok_or_else(|| err(format!("label for class {key} is not quoted")))?;
        let (label, remainder) = read_quoted(&value[1..], quote)
            .ok_or_else(|| err(format!("unterminated label for class {key}")))?;
        labels.push(label);
        rest = remainder;
    }
}

/// Reads up to the closing `quote`, resolving backslash escapes. Returns the
/// label and the text after the closing quote.
fn read_quoted(s: &str, quote: char) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?.1),
            c if c == quote => return Some((out, &s[i + c.len_utf8()..])),
            c => out.push(c),
        }
    }
    None
}

fn preview(s: &str) -> &str {
    s.char_indices().nth(24).map_or(s, |(i, _)| &s[..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_dict() {
        let text = "{0: 'tench, Tinca tinca',\n 1: 'goldfish, Carassius auratus',\n \
                    2: \"carpenter's kit, tool kit\",\n 3: 'it\\'s escaped'}\n";
        let map = LabelMap::parse(text).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map.get(0), Some("tench, Tinca tinca"));
        assert_eq!(map.get(2), Some("carpenter's kit, tool kit"));
        assert_eq!(map.get(3), Some("it's escaped"));
        assert_eq!(map.get(4), None);
    }

    #[test]
    fn test_trailing_comma() {
        let map = LabelMap::parse("{0: 'a', 1: 'b',}").unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_line_format() {
        let map = LabelMap::parse("tench\n\ngoldfish\n  great white shark \n").unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(2), Some("great white shark"));
    }

    #[test]
    fn test_malformed_dicts() {
        for bad in [
            "{0: 'a', 2: 'b'}",
            "{0: a}",
            "{0: 'a'",
            "{0: 'a}",
            "{x: 'a'}",
            "{0: 'a'} extra",
            "",
        ] {
            assert!(LabelMap::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synset.txt");
        std::fs::write(&path, "{0: 'cat'}").unwrap();
        assert_eq!(LabelMap::load(&path).unwrap().get(0), Some("cat"));
    }
}
