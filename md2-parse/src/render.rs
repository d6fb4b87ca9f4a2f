//! Tree-walking machinery shared by every output backend.
//!
//! A backend implements [`Generator`], overriding the handlers for the node
//! kinds it renders. Dispatch, gap walking between children and scratch
//! buffers for composite constructs live here.

use std::collections::{BTreeMap, HashMap};

use crate::highlight::{CodeFormatter, IDENTITY, PLAIN, SyntaxHighlighter};
use crate::logging::{Level, LogSink, NOOP};
use crate::metadata::{MetadataRepo, ResolvedRef};
use crate::types::{HeaderVariant, ImageKeyword, Node, NodeKind, ParseTree};

// ------------------------------------------------------------------
// Output targets
// ------------------------------------------------------------------

/// Stack of output buffers. The bottom buffer is the document itself.
#[derive(Debug)]
pub struct Targets {
    stack: Vec<String>,
}

impl Default for Targets {
    fn default() -> Self {
        Targets {
            stack: vec![String::new()],
        }
    }
}

impl Targets {
    pub fn current(&mut self) -> &mut String {
        let top = self.stack.len() - 1;
        &mut self.stack[top]
    }

    pub fn push(&mut self) {
        self.stack.push(String::new());
    }

    /// Pop a scratch buffer and return its contents.
    ///
    /// # Panics
    ///
    /// Panics when only the document buffer is left.
    pub fn pop(&mut self) -> String {
        assert!(self.stack.len() > 1, "popped the document buffer");
        self.stack.pop().unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Take the finished document.
    ///
    /// # Panics
    ///
    /// Panics when a scratch buffer is still pushed.
    pub fn take_document(&mut self) -> String {
        assert_eq!(self.stack.len(), 1, "scratch buffer leaked past generation");
        std::mem::take(&mut self.stack[0])
    }
}

/// Stack of "escape reserved characters" switches.
#[derive(Debug, Clone)]
pub struct EscapeStack {
    stack: Vec<bool>,
}

impl Default for EscapeStack {
    fn default() -> Self {
        EscapeStack { stack: vec![true] }
    }
}

impl EscapeStack {
    pub fn enabled(&self) -> bool {
        self.stack.last().copied().unwrap_or(true)
    }

    pub fn push(&mut self, enabled: bool) {
        self.stack.push(enabled);
    }

    pub fn pop(&mut self) {
        assert!(self.stack.len() > 1, "popped the base escape state");
        self.stack.pop();
    }
}

/// Mutable bookkeeping every generator carries.
#[derive(Debug, Default)]
pub struct RenderState {
    pub targets: Targets,
    /// References currently being expanded, innermost last.
    active_refs: Vec<String>,
    ref_cache: HashMap<String, String>,
}

// ------------------------------------------------------------------
// Context
// ------------------------------------------------------------------

/// Read-only collaborators handed to a generator.
#[derive(Clone, Copy)]
pub struct GeneratorContext<'c> {
    pub metadata: Option<&'c MetadataRepo>,
    pub highlighter: &'c dyn SyntaxHighlighter,
    pub formatter: &'c dyn CodeFormatter,
    pub sink: &'c dyn LogSink,
}

impl GeneratorContext<'static> {
    pub fn new() -> Self {
        GeneratorContext {
            metadata: None,
            highlighter: &PLAIN,
            formatter: &IDENTITY,
            sink: &NOOP,
        }
    }
}

impl Default for GeneratorContext<'static> {
    fn default() -> Self {
        GeneratorContext::new()
    }
}

impl<'c> GeneratorContext<'c> {
    pub fn with_metadata<'a>(self, metadata: &'a MetadataRepo) -> GeneratorContext<'a>
    where
        'c: 'a,
    {
        GeneratorContext {
            metadata: Some(metadata),
            ..self
        }
    }

    pub fn with_highlighter<'a>(self, highlighter: &'a dyn SyntaxHighlighter) -> GeneratorContext<'a>
    where
        'c: 'a,
    {
        GeneratorContext { highlighter, ..self }
    }

    pub fn with_formatter<'a>(self, formatter: &'a dyn CodeFormatter) -> GeneratorContext<'a>
    where
        'c: 'a,
    {
        GeneratorContext { formatter, ..self }
    }

    pub fn with_sink<'a>(self, sink: &'a dyn LogSink) -> GeneratorContext<'a>
    where
        'c: 'a,
    {
        GeneratorContext { sink, ..self }
    }

    /// Resolve a cross reference against the metadata repo, if any.
    pub fn find_reference<'a>(&self, text: &'a str) -> Option<ResolvedRef<'a>> {
        self.metadata?.find_reference(text)
    }
}

// ------------------------------------------------------------------
// Invariants
// ------------------------------------------------------------------

/// Abort when `node` does not have exactly `expected` children.
///
/// A mismatch means the tree was not produced by the parser contract the
/// backends rely on. It is never a property of the input text.
pub fn expect_children(node: &Node, expected: usize) {
    assert_eq!(
        node.child_count(),
        expected,
        "{} node at {}..{} must have {expected} children",
        node.kind().tag(),
        node.start(),
        node.end(),
    );
}

/// The children of a fixed-arity node, checked.
pub fn fixed_children<'t, const N: usize>(tree: &'t ParseTree, node: &'t Node) -> [&'t Node; N] {
    expect_children(node, N);
    std::array::from_fn(|i| tree.node(node.child_ids()[i]))
}

// ------------------------------------------------------------------
// Generator
// ------------------------------------------------------------------

/// A backend. Every handler defaults to generating the node's children.
pub trait Generator<'t>: Sized {
    fn tree(&self) -> &'t ParseTree;

    fn state(&mut self) -> &mut RenderState;

    fn sink(&self) -> &dyn LogSink;

    /// Emit one source character, escaped the way the target needs.
    fn emit_char(&mut self, c: char);

    /// Whether a reference body is generated once and reused at every
    /// `\ref`. Backends whose output numbers objects regenerate it instead.
    fn caches_references(&self) -> bool {
        true
    }

    fn emit(&mut self, s: &str) {
        self.state().targets.current().push_str(s);
    }

    fn emit_str_escaped(&mut self, s: &str) {
        for c in s.chars() {
            self.emit_char(c);
        }
    }

    /// Walk the whole tree and return the document.
    fn generate(&mut self) -> String {
        let root = self.tree().root();
        self.generate_node(root);
        self.state().targets.take_document()
    }

    fn generate_node(&mut self, node: &'t Node) {
        match node.kind() {
            NodeKind::Root => self.root(node),
            NodeKind::Group => self.group(node),
            NodeKind::Paragraph => self.paragraph(node),
            NodeKind::Text => self.text(node),
            NodeKind::Bold => self.bold(node),
            NodeKind::Italic => self.italic(node),
            NodeKind::StrikeThrough => self.strike_through(node),
            NodeKind::Link => self.link(node),
            NodeKind::Image { keywords } => self.image(node, keywords),
            NodeKind::Table { row_size } => self.table(node, *row_size),
            NodeKind::List { ordered } => self.list(node, *ordered),
            NodeKind::ListItem { ordered, depth } => self.list_item(node, *ordered, *depth),
            NodeKind::Header { level, variant, .. } => self.header(node, *level, *variant),
            NodeKind::Verbatim => self.verbatim(node),
            NodeKind::Escape => self.escape(node),
            NodeKind::Command { name } => self.command(node, name),
            NodeKind::Math {
                display,
                layout,
                expr_start,
                expr_end,
            } => {
                let expr = self.tree().slice(*expr_start, *expr_end);
                self.math(node, *display, *layout, expr)
            }
            NodeKind::Box { name } => self.boxed(node, name),
            NodeKind::Quote => self.quote(node),
        }
    }

    fn generate_children(&mut self, node: &'t Node) {
        let tree = self.tree();
        for child in tree.children(node) {
            self.generate_node(child);
        }
    }

    /// Walk `[start, end)` of `node`: gap characters go through `emit`,
    /// children inside the range are generated in place.
    fn generate_span<F>(&mut self, node: &'t Node, start: usize, end: usize, mut emit: F)
    where
        F: FnMut(&mut Self, char),
    {
        let tree = self.tree();
        let mut current = start;
        for child in tree.children(node) {
            if child.start() < current {
                continue;
            }
            if child.start() >= end {
                break;
            }
            for c in tree.slice(current, child.start()).chars() {
                emit(self, c);
            }
            self.generate_node(child);
            current = child.end();
        }
        if current < end {
            for c in tree.slice(current, end).chars() {
                emit(self, c);
            }
        }
    }

    /// [`generate_span`](Self::generate_span) over the whole node with
    /// `prefix` and `suffix` bytes of markers left out.
    fn generate_inner(&mut self, node: &'t Node, prefix: usize, suffix: usize) {
        let start = node.start() + prefix;
        let end = node.end().saturating_sub(suffix).max(start);
        self.generate_span(node, start, end, |g, c| g.emit_char(c));
    }

    /// Generate into a scratch buffer and return what was produced.
    fn scratch<F>(&mut self, f: F) -> String
    where
        F: FnOnce(&mut Self),
    {
        self.state().targets.push();
        f(self);
        self.state().targets.pop()
    }

    /// Output of the `ref-NAME` box body. Generated once per document unless
    /// [`caches_references`](Self::caches_references) says otherwise.
    ///
    /// Unknown names and references that expand into themselves produce
    /// nothing.
    fn generate_reference(&mut self, name: &str) -> String {
        let cached = self.caches_references();
        if cached {
            if let Some(done) = self.state().ref_cache.get(name) {
                return done.clone();
            }
        }
        let tree = self.tree();
        let Some(boxed) = tree.find_reference(name) else {
            self.sink().log(Level::WARN, &format!("reference '{name}' is not defined"));
            return String::new();
        };
        if self.state().active_refs.iter().any(|r| r == name) {
            self.sink()
                .log(Level::WARN, &format!("reference '{name}' expands into itself; skipped"));
            return String::new();
        }

        let [_, body] = fixed_children::<2>(tree, boxed);
        self.state().active_refs.push(name.to_string());
        let output = self.scratch(|g| g.generate_node(body));
        self.state().active_refs.pop();
        if cached {
            self.state().ref_cache.insert(name.to_string(), output.clone());
        }
        output
    }

    fn root(&mut self, node: &'t Node) {
        self.generate_children(node);
    }

    fn group(&mut self, node: &'t Node) {
        self.generate_children(node);
    }

    fn paragraph(&mut self, node: &'t Node) {
        self.generate_children(node);
    }

    fn text(&mut self, node: &'t Node) {
        self.generate_children(node);
    }

    fn bold(&mut self, node: &'t Node) {
        self.generate_children(node);
    }

    fn italic(&mut self, node: &'t Node) {
        self.generate_children(node);
    }

    fn strike_through(&mut self, node: &'t Node) {
        self.generate_children(node);
    }

    fn link(&mut self, node: &'t Node) {
        self.generate_children(node);
    }

    fn image(&mut self, node: &'t Node, _keywords: &'t BTreeMap<ImageKeyword, usize>) {
        self.generate_children(node);
    }

    fn table(&mut self, node: &'t Node, _row_size: usize) {
        self.generate_children(node);
    }

    fn list(&mut self, node: &'t Node, _ordered: bool) {
        self.generate_children(node);
    }

    fn list_item(&mut self, node: &'t Node, _ordered: bool, _depth: usize) {
        self.generate_children(node);
    }

    fn header(&mut self, node: &'t Node, _level: usize, _variant: HeaderVariant) {
        self.generate_children(node);
    }

    fn verbatim(&mut self, node: &'t Node) {
        self.generate_children(node);
    }

    fn escape(&mut self, node: &'t Node) {
        self.generate_children(node);
    }

    fn command(&mut self, node: &'t Node, _name: &'t str) {
        self.generate_children(node);
    }

    fn math(&mut self, node: &'t Node, _display: bool, _layout: Option<(u32, u32)>, _expr: &'t str) {
        self.generate_children(node);
    }

    fn boxed(&mut self, node: &'t Node, _name: &'t str) {
        self.generate_children(node);
    }

    fn quote(&mut self, node: &'t Node) {
        self.generate_children(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::testing::MemorySink;
    use crate::parse::parse;
    use crate::types::TreeBuilder;
    use pretty_assertions::assert_eq;

    /// Echoes gap text and brackets bold runs.
    struct Echo<'t, 'c> {
        tree: &'t ParseTree,
        state: RenderState,
        sink: &'c dyn LogSink,
    }

    impl<'t> Echo<'t, 'static> {
        fn new(tree: &'t ParseTree) -> Self {
            Echo {
                tree,
                state: RenderState::default(),
                sink: &NOOP,
            }
        }
    }

    impl<'t> Generator<'t> for Echo<'t, '_> {
        fn tree(&self) -> &'t ParseTree {
            self.tree
        }

        fn state(&mut self) -> &mut RenderState {
            &mut self.state
        }

        fn sink(&self) -> &dyn LogSink {
            self.sink
        }

        fn emit_char(&mut self, c: char) {
            self.state.targets.current().push(c);
        }

        fn paragraph(&mut self, node: &'t Node) {
            self.generate_inner(node, 0, 0);
        }

        fn text(&mut self, node: &'t Node) {
            self.generate_inner(node, 0, 0);
        }

        fn bold(&mut self, node: &'t Node) {
            self.emit("[");
            self.generate_inner(node, 2, 2);
            self.emit("]");
        }

        fn command(&mut self, node: &'t Node, name: &'t str) {
            if name == "ref" {
                let tree = self.tree;
                let arg = tree.text(tree.child(node, 0).unwrap());
                let body = self.generate_reference(arg);
                self.emit(&body);
            }
        }

        fn boxed(&mut self, _node: &'t Node, _name: &'t str) {}
    }

    #[test]
    fn span_walk_emits_gaps_and_children() {
        let tree = parse("가**나**다");
        assert_eq!(Echo::new(&tree).generate(), "가[나]다");
    }

    #[test]
    fn scratch_is_strictly_nested() {
        let tree = parse("a");
        let mut echo = Echo::new(&tree);
        echo.emit("doc");
        let inner = echo.scratch(|g| {
            g.emit("outer");
            let nested = g.scratch(|g| g.emit("inner"));
            assert_eq!(nested, "inner");
        });
        assert_eq!(inner, "outer");
        assert_eq!(echo.state.targets.depth(), 1);
        assert_eq!(echo.state.targets.take_document(), "doc");
    }

    #[test]
    #[should_panic(expected = "document buffer")]
    fn popping_the_document_is_fatal() {
        Targets::default().pop();
    }

    #[test]
    fn escape_stack_restores() {
        let mut escape = EscapeStack::default();
        assert!(escape.enabled());
        escape.push(false);
        escape.push(true);
        escape.pop();
        assert!(!escape.enabled());
        escape.pop();
        assert!(escape.enabled());
    }

    #[test]
    #[should_panic(expected = "LINK node at 0..3 must have 2 children")]
    fn fixed_arity_mismatch_aborts() {
        let mut b = TreeBuilder::new(3);
        let link = b.add_span(b.root(), NodeKind::Link, 0, 3);
        b.add_span(link, NodeKind::Group, 1, 2);
        let tree = b.finish("[a]");
        let link = tree.child(tree.root(), 0).unwrap();
        let _ = fixed_children::<2>(&tree, link);
    }

    #[test]
    fn reference_expands_once_and_never_recursively() {
        let sink = MemorySink::default();
        let tree = parse("```ref-a\nx\\ref{a}\n```\n\\ref{a}\\ref{b}");
        let mut echo = Echo {
            sink: &sink,
            ..Echo::new(&tree)
        };
        assert_eq!(echo.generate(), "\nx");
        let entries = sink.entries.lock().unwrap();
        let messages: Vec<_> = entries.iter().map(|(_, m)| m.as_str()).collect();
        assert_eq!(
            messages,
            vec!["reference 'a' expands into itself; skipped", "reference 'b' is not defined"]
        );
    }
}
