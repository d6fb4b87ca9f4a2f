//! Recursive scanner that turns markup into a [`ParseTree`].
//!
//! One left-to-right pass with an explicit insertion point. Nested regions
//! (link parts, arguments, table cells, box bodies) re-enter
//! [`ParseState::parse_scope`] with their own bound and optional terminator.

use crate::logging::{Level, LogSink, NOOP};
use crate::types::{NodeId, NodeKind, ParseTree, TreeBuilder};

/// Parse `text` with the default (silent) log sink.
///
/// This function never panics and never fails. Constructs that are not
/// closed properly come out as literal text.
pub fn parse(text: &str) -> ParseTree {
    Parser::new().parse(text)
}

/// Parser entry point carrying an injected log sink.
#[derive(Clone, Copy)]
pub struct Parser<'l> {
    sink: &'l dyn LogSink,
}

impl Parser<'static> {
    pub fn new() -> Self {
        Parser { sink: &NOOP }
    }
}

impl Default for Parser<'static> {
    fn default() -> Self {
        Parser::new()
    }
}

impl<'l> Parser<'l> {
    pub fn with_sink(sink: &'l dyn LogSink) -> Self {
        Parser { sink }
    }

    pub fn parse(&self, text: &str) -> ParseTree {
        let mut state = ParseState {
            src: text,
            bytes: text.as_bytes(),
            b: TreeBuilder::new(text.len()),
            sink: self.sink,
            link_search: None,
        };
        let root = state.b.root();
        state.parse_scope(0, Scope::block(root, text.len()));
        state.b.finish(text)
    }
}

// ------------------------------------------------------------------
// Scopes
// ------------------------------------------------------------------

/// Whether loose text collects into paragraphs or plain text runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Block,
    Inline,
}

/// Token sequence that ends a scope early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminator {
    /// A bare "```" line closing a box.
    Fence,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope {
    pub container: NodeId,
    pub mode: Mode,
    /// Exclusive end of the region to scan.
    pub bound: usize,
    pub terminator: Option<Terminator>,
    /// Table cells also treat `\|` as an escape.
    pub in_table: bool,
}

impl Scope {
    pub fn block(container: NodeId, bound: usize) -> Self {
        Scope {
            container,
            mode: Mode::Block,
            bound,
            terminator: None,
            in_table: false,
        }
    }

    pub fn inline(container: NodeId, bound: usize) -> Self {
        Scope {
            mode: Mode::Inline,
            ..Scope::block(container, bound)
        }
    }

    /// A child scope that keeps this scope's table context.
    pub fn nested_inline(&self, container: NodeId, bound: usize) -> Self {
        Scope {
            in_table: self.in_table,
            ..Scope::inline(container, bound)
        }
    }
}

/// Where a scope stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Closed {
    /// End of the scope's content (start of the terminator, if any).
    pub content_end: usize,
    /// First offset after the terminator.
    pub next: usize,
}

/// Insertion state within one scope.
#[derive(Debug)]
pub(crate) struct Cursor {
    /// The implicit paragraph or text run currently open.
    pub wrapper: Option<NodeId>,
    pub current: NodeId,
}

pub(crate) struct ParseState<'s, 'l> {
    pub src: &'s str,
    pub bytes: &'s [u8],
    pub b: TreeBuilder,
    sink: &'l dyn LogSink,
    /// Last `](` search, reused by every `[` it already covers.
    pub link_search: Option<LinkSearch>,
}

/// Result of scanning `[from, stop)` for the `](` that closes a link.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkSearch {
    pub from: usize,
    pub bound: usize,
    /// Where the scan ended: the `](`, a blank line or the bound.
    pub stop: usize,
    pub close: Option<usize>,
    /// Last `[` in `[from, close)`.
    pub last_open: Option<usize>,
}

impl<'s, 'l> ParseState<'s, 'l> {
    /// Scan `[start, scope.bound)` into `scope.container`.
    ///
    /// Without a terminator the scope always closes at its bound. With one,
    /// `None` means the terminator never appeared and the caller must roll
    /// back whatever it started.
    pub(crate) fn parse_scope(&mut self, start: usize, scope: Scope) -> Option<Closed> {
        let mut cursor = Cursor {
            wrapper: None,
            current: scope.container,
        };
        let mut i = start;

        while i < scope.bound {
            if let Some(terminator) = scope.terminator {
                if let Some(len) = self.match_terminator(terminator, i, scope.bound) {
                    self.close_wrapper(&mut cursor, scope.container, i);
                    return Some(Closed {
                        content_end: i,
                        next: i + len,
                    });
                }
            }

            if self.bytes[i..scope.bound].starts_with(b"\n\n") {
                self.close_wrapper(&mut cursor, scope.container, i);
                i += 2;
                continue;
            }

            if self.at_line_start(i) {
                if let Some(next) = self.try_block(i, &scope) {
                    self.close_wrapper(&mut cursor, scope.container, i);
                    i = next;
                    continue;
                }
            }

            i = self.inline_step(i, &scope, &mut cursor);
        }

        self.close_wrapper(&mut cursor, scope.container, scope.bound);
        match scope.terminator {
            Some(_) => None,
            None => Some(Closed {
                content_end: scope.bound,
                next: scope.bound,
            }),
        }
    }

    fn match_terminator(&self, terminator: Terminator, i: usize, bound: usize) -> Option<usize> {
        match terminator {
            Terminator::Fence => {
                if self.bytes[i] == b'\n' && self.closing_fence_at(i + 1, bound) {
                    Some(4)
                } else if self.at_line_start(i) && self.closing_fence_at(i, bound) {
                    Some(3)
                } else {
                    None
                }
            }
        }
    }

    /// "```" followed by a newline or the end of the scope.
    pub(crate) fn closing_fence_at(&self, j: usize, bound: usize) -> bool {
        j + 3 <= bound
            && self.bytes[j..].starts_with(b"```")
            && (j + 3 == bound || self.bytes[j + 3] == b'\n')
    }

    fn inline_step(&mut self, i: usize, scope: &Scope, cursor: &mut Cursor) -> usize {
        self.ensure_wrapper(cursor, scope, i);
        let rest = &self.bytes[i..scope.bound];
        let consumed = match rest[0] {
            b'\\' => self.backslash(i, scope, cursor),
            b'*' => Some(self.star(i, scope, cursor)),
            b'~' if rest.starts_with(b"~~") => Some(self.tilde(i, cursor)),
            b'[' => self.link(i, scope, cursor, false),
            b'!' if rest.starts_with(b"![") => self.link(i, scope, cursor, true),
            b'`' => self.inline_code(i, scope, cursor),
            b'$' if rest.starts_with(b"$$") => self.inline_math(i, scope, cursor),
            _ => None,
        };
        consumed.unwrap_or_else(|| self.next_char(i))
    }

    // ------------------------------------------------------------------
    // Wrappers
    // ------------------------------------------------------------------

    fn ensure_wrapper(&mut self, cursor: &mut Cursor, scope: &Scope, at: usize) {
        if cursor.wrapper.is_some() {
            return;
        }
        let kind = match scope.mode {
            Mode::Block => NodeKind::Paragraph,
            Mode::Inline => NodeKind::Text,
        };
        let wrapper = self.b.add(scope.container, kind, at);
        cursor.wrapper = Some(wrapper);
        cursor.current = wrapper;
    }

    /// End the open wrapper at `end`, demoting any emphasis left open.
    fn close_wrapper(&mut self, cursor: &mut Cursor, container: NodeId, end: usize) {
        let Some(wrapper) = cursor.wrapper.take() else {
            return;
        };
        let mut node = cursor.current;
        while node != wrapper {
            let parent = self.b.parent(node).unwrap_or(wrapper);
            self.debug(format!(
                "unclosed {} marker demoted to text",
                self.b.kind(node).tag()
            ));
            self.b.unwrap_node(node);
            node = parent;
        }
        self.b.set_end(wrapper, end);
        cursor.current = container;
    }

    // ------------------------------------------------------------------
    // Emphasis
    // ------------------------------------------------------------------

    fn star(&mut self, i: usize, scope: &Scope, cursor: &mut Cursor) -> usize {
        let double = i + 1 < scope.bound && self.bytes[i + 1] == b'*';
        let current = cursor.current;
        let in_bold = *self.b.kind(current) == NodeKind::Bold;
        let in_italic = *self.b.kind(current) == NodeKind::Italic;

        if double && in_bold {
            self.close_marker(cursor, i + 2)
        } else if in_italic && (!double || self.has_bold_ancestor(current)) {
            // `**` right after an italic nested in bold closes the italic only.
            self.close_marker(cursor, i + 1)
        } else if double {
            self.open_marker(cursor, NodeKind::Bold, i, 2)
        } else {
            self.open_marker(cursor, NodeKind::Italic, i, 1)
        }
    }

    fn tilde(&mut self, i: usize, cursor: &mut Cursor) -> usize {
        if *self.b.kind(cursor.current) == NodeKind::StrikeThrough {
            self.close_marker(cursor, i + 2)
        } else {
            self.open_marker(cursor, NodeKind::StrikeThrough, i, 2)
        }
    }

    /// A BOLD between `node` and its nearest non-emphasis ancestor.
    fn has_bold_ancestor(&self, node: NodeId) -> bool {
        let mut parent = self.b.parent(node);
        while let Some(id) = parent {
            match self.b.kind(id) {
                NodeKind::Bold => return true,
                kind if kind.is_emphasis() => parent = self.b.parent(id),
                _ => return false,
            }
        }
        false
    }

    fn open_marker(&mut self, cursor: &mut Cursor, kind: NodeKind, at: usize, len: usize) -> usize {
        cursor.current = self.b.add(cursor.current, kind, at);
        at + len
    }

    fn close_marker(&mut self, cursor: &mut Cursor, end: usize) -> usize {
        let current = cursor.current;
        self.b.set_end(current, end);
        if let Some(parent) = self.b.parent(current) {
            cursor.current = parent;
        }
        end
    }

    // ------------------------------------------------------------------
    // Scanning helpers
    // ------------------------------------------------------------------

    pub(crate) fn at_line_start(&self, i: usize) -> bool {
        i == 0 || self.bytes[i - 1] == b'\n'
    }

    pub(crate) fn next_char(&self, i: usize) -> usize {
        i + self.src[i..].chars().next().map_or(1, char::len_utf8)
    }

    /// Offset of the next `\n` at or after `from`, or `bound`.
    pub(crate) fn line_end(&self, from: usize, bound: usize) -> usize {
        self.bytes[from..bound]
            .iter()
            .position(|&c| c == b'\n')
            .map_or(bound, |p| from + p)
    }

    /// The `](` closing a link description that opens at `open`, provided no
    /// other `[` sits in between.
    ///
    /// Consecutive openers on one line share a single forward scan.
    pub(crate) fn link_close(&mut self, open: usize, bound: usize) -> Option<usize> {
        let search = match self.link_search {
            Some(s) if s.bound == bound && s.from <= open && open <= s.stop => s,
            _ => {
                let close = self.find(open, bound, b"](", true);
                let stop = match close {
                    Some(close) => close,
                    None => self.find(open, bound, b"\n\n", false).unwrap_or(bound),
                };
                let last_open = close.and_then(|close| {
                    self.bytes[open..close]
                        .iter()
                        .rposition(|&c| c == b'[')
                        .map(|p| open + p)
                });
                let search = LinkSearch {
                    from: open,
                    bound,
                    stop,
                    close,
                    last_open,
                };
                self.link_search = Some(search);
                search
            }
        };

        let close = search.close?;
        if search.last_open.is_some_and(|at| at >= open) {
            return None;
        }
        Some(close)
    }

    /// First occurrence of `pattern` in `[from, bound)`.
    ///
    /// With `stop_at_blank`, the search gives up at the first blank line.
    pub(crate) fn find(&self, from: usize, bound: usize, pattern: &[u8], stop_at_blank: bool) -> Option<usize> {
        let mut j = from;
        while j + pattern.len() <= bound {
            let rest = &self.bytes[j..bound];
            if rest.starts_with(pattern) {
                return Some(j);
            }
            if stop_at_blank && rest.starts_with(b"\n\n") {
                return None;
            }
            j += 1;
        }
        None
    }

    pub(crate) fn debug(&self, message: String) {
        self.sink.log(Level::DEBUG, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::testing::MemorySink;
    use pretty_assertions::assert_eq;

    /// Compact s-expression of the tree for structural assertions.
    fn shape(tree: &ParseTree) -> String {
        fn walk(tree: &ParseTree, node: &crate::types::Node, out: &mut String) {
            out.push('(');
            out.push_str(node.kind().tag());
            for child in tree.children(node) {
                out.push(' ');
                walk(tree, child, out);
            }
            out.push(')');
        }
        let mut out = String::new();
        walk(tree, tree.root(), &mut out);
        out
    }

    #[test]
    fn plain_text_is_one_paragraph() {
        let tree = parse("hello world");
        assert_eq!(shape(&tree), "(ROOT (PARAGRAPH))");
        assert_eq!(tree.root().end(), 11);
    }

    #[test]
    fn blank_line_splits_paragraphs() {
        let tree = parse("a\n\nb");
        let spans: Vec<_> = tree.children(tree.root()).map(|n| (n.start(), n.end())).collect();
        assert_eq!(spans, vec![(0, 1), (3, 4)]);
    }

    #[test]
    fn triple_star_is_bold_around_italic() {
        let tree = parse("***a***");
        assert_eq!(shape(&tree), "(ROOT (PARAGRAPH (BOLD (ITALIC))))");
        let bold = tree.child(tree.child(tree.root(), 0).unwrap(), 0).unwrap();
        assert_eq!((bold.start(), bold.end()), (0, 7));
    }

    #[test]
    fn italic_can_contain_bold() {
        let tree = parse("*a**b***");
        assert_eq!(shape(&tree), "(ROOT (PARAGRAPH (ITALIC (BOLD))))");
    }

    #[test]
    fn bold_closing_through_italic() {
        let tree = parse("a**b*c**d***");
        assert_eq!(shape(&tree), "(ROOT (PARAGRAPH (BOLD (ITALIC) (ITALIC))))");
    }

    #[test]
    fn unclosed_marker_is_demoted() {
        let sink = MemorySink::default();
        let tree = Parser::with_sink(&sink).parse("**a *b* c");
        assert_eq!(shape(&tree), "(ROOT (PARAGRAPH (ITALIC)))");
        let italic = tree.child(tree.child(tree.root(), 0).unwrap(), 0).unwrap();
        assert_eq!(italic.parent(), Some(tree.child(tree.root(), 0).unwrap().id()));
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].1.contains("BOLD"));
    }

    #[test]
    fn strike_through_toggles() {
        let tree = parse("a~~a*b*~~c");
        assert_eq!(shape(&tree), "(ROOT (PARAGRAPH (STRIKE_THROUGH (ITALIC))))");
    }

    #[test]
    fn multibyte_text_keeps_char_boundaries() {
        let tree = parse("**한글도 되나요**");
        let bold = tree.child(tree.child(tree.root(), 0).unwrap(), 0).unwrap();
        assert_eq!(tree.text(bold), "**한글도 되나요**");
    }
}
