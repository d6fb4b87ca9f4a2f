//! `md2-parse`: parser and generators for the md2 markup dialect.
//!
//! md2 is a markdown dialect with fenced boxes, `\command{...}` macros,
//! image arguments and embedded math. This crate turns source text into an
//! arena [`ParseTree`] and renders it as HTML, LaTeX or HWPML.
//!
//! # Quick start
//!
//! ```
//! let html = md2_parse::to_html("**hello**, *world!*");
//! assert_eq!(
//!     html,
//!     "<p><span class='font-weight-bold'>hello</span>, <span class='font-italic'>world!</span></p>"
//! );
//! ```

pub mod attrs;
pub mod blocks;
pub mod error;
pub mod highlight;
pub mod inline;
pub mod logging;
pub mod metadata;
pub mod parse;
pub mod render;
pub mod render_html;
pub mod render_hwp;
pub mod render_latex;
pub mod service;
pub mod types;

pub use error::*;
pub use metadata::{Metadata, MetadataRepo, parse_front_matter, split_front_matter};
pub use parse::{Parser, parse};
pub use render::{Generator, GeneratorContext};
pub use render_html::{HtmlOptions, generate_html};
pub use render_hwp::{HwpEntryStyle, HwpIds, HwpOptions, generate_hwp};
pub use render_latex::{LatexOptions, generate_latex};
pub use types::*;

/// Parse and render `markdown` as an HTML fragment with default options.
pub fn to_html(markdown: &str) -> String {
    generate_html(&parse(markdown), &HtmlOptions::default(), &GeneratorContext::new())
}

/// Parse and render `markdown` as a LaTeX body.
pub fn to_latex(markdown: &str, options: &LatexOptions) -> String {
    generate_latex(&parse(markdown), options, &GeneratorContext::new())
}

/// Parse and render `markdown` as HWPML paragraphs, advancing `ids`.
pub fn to_hwp(markdown: &str, options: &HwpOptions, ids: &mut HwpIds) -> String {
    generate_hwp(&parse(markdown), options, ids, &GeneratorContext::new())
}
