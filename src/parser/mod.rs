//! Structured workload output parsing
//!
//! stress-ng writes its results as an indentation-structured document:
//!
//! ```text
//! ---
//! system-info:
//!       stress-ng-version: 0.15.06
//! metrics:
//!     - stressor: cpu
//!       bogo-ops: 1234
//!       bogo-ops-per-second-real-time: 61.70
//! ...
//! ```
//!
//! Parsing happens in two passes. [`parse_document`] builds a typed [`Node`] tree
//! with a small recursive descent over indented lines, and [`flatten::flatten`]
//! turns that tree into ordered `prefix_key = value` pairs.
//!
//! Only the subset stress-ng emits is accepted: block mappings, block sequences of
//! mappings, and plain or quoted scalars. Flow collections and multi-line scalars
//! are rejected with a [`ParseError`].

pub mod flatten;

use thiserror::Error;

pub use flatten::flatten;

/// Parsed document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(String),
    /// Entries in document order
    Map(Vec<(String, Node)>),
    List(Vec<Node>),
}

impl Node {
    /// Look up a direct child of a map node
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Node::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

/// Errors that can occur while parsing a document
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: expected `key: value`")]
    MissingSeparator { line: usize },

    #[error("line {line}: unexpected indentation")]
    UnexpectedIndent { line: usize },

    #[error("line {line}: empty sequence item")]
    EmptyItem { line: usize },
}

/// One significant input line
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    /// 1-based line number for diagnostics
    number: usize,
    /// Column of the `-` for sequence items
    dash: Option<usize>,
    /// Column where the key starts
    indent: usize,
    key: &'a str,
    value: Option<&'a str>,
}

/// Parse a structured document into a tree
///
/// An empty document (or one holding only markers and comments) yields an empty map.
pub fn parse_document(text: &str) -> Result<Node, ParseError> {
    let lines = lex(text)?;
    let mut parser = Parser { lines, pos: 0 };

    let root = match parser.peek() {
        Some(first) => parser.parse_block(first.indent)?,
        None => return Ok(Node::Map(Vec::new())),
    };

    if let Some(line) = parser.peek() {
        return Err(ParseError::UnexpectedIndent { line: line.number });
    }

    Ok(root)
}

fn lex(text: &str) -> Result<Vec<Line<'_>>, ParseError> {
    let mut lines = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let number = idx + 1;
        let trimmed = raw.trim_end();
        let content = trimmed.trim_start();

        // Document markers, comments and blank lines carry nothing
        if content.is_empty() || content.starts_with('#') || content == "---" || content == "..." {
            continue;
        }

        let lead = trimmed.len() - content.len();
        let (dash, indent, body) = if content == "-" {
            return Err(ParseError::EmptyItem { line: number });
        } else if let Some(rest) = content.strip_prefix("- ") {
            let body = rest.trim_start();
            if body.is_empty() {
                return Err(ParseError::EmptyItem { line: number });
            }
            (Some(lead), trimmed.len() - body.len(), body)
        } else {
            (None, lead, content)
        };

        let (key, value) = split_entry(body).ok_or(ParseError::MissingSeparator { line: number })?;

        lines.push(Line {
            number,
            dash,
            indent,
            key,
            value,
        });
    }

    Ok(lines)
}

/// Split `key: value` at the first colon that ends the key
fn split_entry(body: &str) -> Option<(&str, Option<&str>)> {
    let bytes = body.as_bytes();
    let mut idx = 0;

    while idx < bytes.len() {
        if bytes[idx] == b':' && (idx + 1 == bytes.len() || bytes[idx + 1] == b' ') {
            let key = body[..idx].trim();
            if key.is_empty() {
                return None;
            }
            let value = body[idx + 1..].trim();
            let value = if value.is_empty() { None } else { Some(unquote(value)) };
            return Some((key, value));
        }
        idx += 1;
    }

    None
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

struct Parser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Line<'a>> {
        self.lines.get(self.pos).copied()
    }

    /// Parse the block whose first line is next
    fn parse_block(&mut self, indent: usize) -> Result<Node, ParseError> {
        match self.peek() {
            Some(Line { dash: Some(col), .. }) => self.parse_list(col),
            _ => self.parse_map(indent, Vec::new()),
        }
    }

    /// Collect `key: value` lines sitting exactly at `indent`
    fn parse_map(
        &mut self,
        indent: usize,
        mut entries: Vec<(String, Node)>,
    ) -> Result<Node, ParseError> {
        while let Some(line) = self.peek() {
            if line.dash.is_some() || line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(ParseError::UnexpectedIndent { line: line.number });
            }

            self.pos += 1;
            let value = self.parse_value(line)?;
            entries.push((line.key.to_string(), value));
        }

        Ok(Node::Map(entries))
    }

    /// Sequence items whose dash sits at `dash_col`
    fn parse_list(&mut self, dash_col: usize) -> Result<Node, ParseError> {
        let mut items = Vec::new();

        while let Some(line) = self.peek() {
            if line.dash != Some(dash_col) {
                break;
            }

            self.pos += 1;
            let first = (line.key.to_string(), self.parse_value(line)?);
            items.push(self.parse_map(line.indent, vec![first])?);
        }

        Ok(Node::List(items))
    }

    /// Value of an entry: inline scalar, nested block, or empty map
    fn parse_value(&mut self, line: Line<'a>) -> Result<Node, ParseError> {
        if let Some(value) = line.value {
            return Ok(Node::Scalar(value.to_string()));
        }

        match self.peek() {
            // Sequences may sit at the parent key's own column
            Some(Line { dash: Some(col), .. }) if col >= line.indent => self.parse_list(col),
            Some(next) if next.dash.is_none() && next.indent > line.indent => {
                self.parse_map(next.indent, Vec::new())
            }
            _ => Ok(Node::Map(Vec::new())),
        }
    }
}
