use crate::error::Result;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Whole-line pattern for `#include "path"`. ASCII whitespace only; the
/// reference may hold any bytes but `"`.
const QUOTED_PATTERN: &str = r#"(?-u)^\s*#\s*include\s*"([^"]*)"\s*$"#;
/// Whole-line pattern for `#include <path>`
const ANGLE_PATTERN: &str = r"(?-u)^\s*#\s*include\s*<([^>]*)>\s*$";

/// The two include forms, which differ only in where the target is searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeKind {
    /// `#include "path"`: the including file's directory first, then the search roots
    Quoted,
    /// `#include <path>`: the search roots only
    Angle,
}

impl fmt::Display for IncludeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quoted => f.write_str("quoted"),
            Self::Angle => f.write_str("angle"),
        }
    }
}

/// Classification of a single input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    /// A `#include "..."` line with the text between the quotes
    Quoted(Cow<'a, str>),
    /// A `#include <...>` line with the text between the angle brackets
    Angle(Cow<'a, str>),
    /// Anything else, copied to the output unchanged
    Text,
}

impl<'a> Directive<'a> {
    /// The include form and reference text, or `None` for plain text
    #[must_use]
    pub fn include(self) -> Option<(IncludeKind, Cow<'a, str>)> {
        match self {
            Self::Quoted(reference) => Some((IncludeKind::Quoted, reference)),
            Self::Angle(reference) => Some((IncludeKind::Angle, reference)),
            Self::Text => None,
        }
    }
}

/// An include directive found in a text, with its 1-based line number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeDirective {
    pub kind: IncludeKind,
    /// Path text exactly as written between the delimiters
    pub reference: String,
    pub line: u64,
}

/// Line classifier holding the two compiled directive patterns
#[derive(Debug, Clone)]
pub struct DirectiveMatcher {
    quoted: Regex,
    angle: Regex,
}

impl DirectiveMatcher {
    /// Compiles the directive patterns
    ///
    /// # Errors
    ///
    /// Returns `PreprocessError::Regex` if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            quoted: Regex::new(QUOTED_PATTERN)?,
            angle: Regex::new(ANGLE_PATTERN)?,
        })
    }

    /// Classifies one line (without its trailing newline).
    ///
    /// Lines are raw bytes and need not be UTF-8. Only a whole-line match
    /// counts; a line that merely contains directive-like text, or has
    /// anything after the closing delimiter other than whitespace, is plain
    /// text. A reference that is not UTF-8 is decoded lossily.
    #[must_use]
    pub fn classify<'a>(&self, line: &'a [u8]) -> Directive<'a> {
        if let Some(reference) = self.quoted.captures(line).and_then(|c| c.get(1)) {
            return Directive::Quoted(String::from_utf8_lossy(reference.as_bytes()));
        }
        if let Some(reference) = self.angle.captures(line).and_then(|c| c.get(1)) {
            return Directive::Angle(String::from_utf8_lossy(reference.as_bytes()));
        }
        Directive::Text
    }
}

/// Finds all include directives in the given text, in line order
///
/// # Errors
///
/// Returns `PreprocessError::Regex` if there's an error compiling the patterns.
pub fn find_directives(text: &[u8]) -> Result<Vec<IncludeDirective>> {
    let matcher = DirectiveMatcher::new()?;
    let mut directives = Vec::new();

    for (line_number, line) in (1u64..).zip(text.split(|&b| b == b'\n')) {
        if let Some((kind, reference)) = matcher.classify(line).include() {
            directives.push(IncludeDirective {
                kind,
                reference: reference.into_owned(),
                line: line_number,
            });
        }
    }

    Ok(directives)
}
