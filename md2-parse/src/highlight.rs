//! Pluggable code-block collaborators.
//!
//! Backends do not tokenize code themselves. They ask a [`SyntaxHighlighter`]
//! for classified spans and a [`CodeFormatter`] for an optional reformatted
//! body.

use std::ops::Range;

/// A classified range of a code snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedSpan {
    /// Short class name, emitted as a CSS class by the HTML backend.
    pub class: String,
    pub range: Range<usize>,
}

impl ClassifiedSpan {
    pub fn new(class: impl Into<String>, range: Range<usize>) -> Self {
        ClassifiedSpan {
            class: class.into(),
            range,
        }
    }
}

pub trait SyntaxHighlighter: Send + Sync {
    /// Classify `code`. Ranges must be ordered, non-overlapping and on char
    /// boundaries; text outside every range is emitted unclassified.
    fn highlight(&self, language: &str, code: &str) -> Vec<ClassifiedSpan>;
}

/// Class given to code no tokenizer has looked at.
pub const UNCLASSIFIED: &str = "i";

/// Treats the whole snippet as one unclassified span.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainHighlighter;

impl SyntaxHighlighter for PlainHighlighter {
    fn highlight(&self, _language: &str, code: &str) -> Vec<ClassifiedSpan> {
        if code.is_empty() {
            return Vec::new();
        }
        vec![ClassifiedSpan::new(UNCLASSIFIED, 0..code.len())]
    }
}

pub trait CodeFormatter: Send + Sync {
    /// A reformatted body, or `None` to keep the source as written.
    fn format(&self, language: &str, code: &str) -> Option<String>;
}

/// Leaves every code block untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityFormatter;

impl CodeFormatter for IdentityFormatter {
    fn format(&self, _language: &str, _code: &str) -> Option<String> {
        None
    }
}

pub(crate) static PLAIN: PlainHighlighter = PlainHighlighter;
pub(crate) static IDENTITY: IdentityFormatter = IdentityFormatter;
