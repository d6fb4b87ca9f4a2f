use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

/// Index of a node inside its [`ParseTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// Named image arguments recognised inside an image description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKeyword {
    Alt,
    Caption,
    Size,
}

impl ImageKeyword {
    pub const ALL: [ImageKeyword; 3] = [ImageKeyword::Alt, ImageKeyword::Caption, ImageKeyword::Size];

    /// The `name=` prefix that introduces the keyword in source text.
    pub fn prefix(self) -> &'static str {
        match self {
            ImageKeyword::Alt => "alt=",
            ImageKeyword::Caption => "caption=",
            ImageKeyword::Size => "size=",
        }
    }
}

/// Header flavours. Only `Plain` is rendered by the bundled backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderVariant {
    /// `#` .. `######`
    Plain,
    /// `#@`
    RefHeader,
    /// `##@`
    TemplateHeader,
    /// `###@`
    LectureHeader,
}

/// The tag and construct-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// The document itself. Always node 0.
    Root,
    /// An anonymous sub-document: link parts, arguments, table cells, box bodies.
    Group,
    Paragraph,
    /// A run of text that is not part of a paragraph.
    Text,
    Bold,
    Italic,
    StrikeThrough,
    /// Children: description, url.
    Link,
    /// Children: description (holding the keyword values), url.
    Image {
        keywords: BTreeMap<ImageKeyword, usize>,
    },
    /// One child per cell, row after row. The second row holds alignment markers.
    Table { row_size: usize },
    List { ordered: bool },
    ListItem { ordered: bool, depth: usize },
    /// Children: marker run, title.
    Header {
        marker: String,
        level: usize,
        variant: HeaderVariant,
    },
    /// Inline code when childless; otherwise children are language, body.
    Verbatim,
    /// A backslash followed by one escapable character.
    Escape,
    /// `\name{arg}...`, one child per argument.
    Command { name: String },
    Math {
        display: bool,
        /// `height,width;` layout prefix.
        layout: Option<(u32, u32)>,
        expr_start: usize,
        expr_end: usize,
    },
    /// Children: name, body.
    Box { name: String },
    Quote,
}

impl NodeKind {
    /// Short tag name used in diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Root => "ROOT",
            NodeKind::Group => "GROUP",
            NodeKind::Paragraph => "PARAGRAPH",
            NodeKind::Text => "TEXT",
            NodeKind::Bold => "BOLD",
            NodeKind::Italic => "ITALIC",
            NodeKind::StrikeThrough => "STRIKE_THROUGH",
            NodeKind::Link => "LINK",
            NodeKind::Image { .. } => "IMAGE",
            NodeKind::Table { .. } => "TABLE",
            NodeKind::List { .. } => "LIST",
            NodeKind::ListItem { .. } => "LIST_ITEM",
            NodeKind::Header { .. } => "HEADER",
            NodeKind::Verbatim => "VERBATIM",
            NodeKind::Escape => "ESCAPE",
            NodeKind::Command { .. } => "COMMAND",
            NodeKind::Math { .. } => "MATH",
            NodeKind::Box { .. } => "BOX",
            NodeKind::Quote => "QUOTE",
        }
    }

    /// Bold, italic and strike-through are the emphasis kinds.
    pub fn is_emphasis(&self) -> bool {
        matches!(self, NodeKind::Bold | NodeKind::Italic | NodeKind::StrikeThrough)
    }
}

/// A node of the parse tree. Spans are half-open byte offsets into the source.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) start: usize,
    pub(crate) end: usize,
    #[serde(skip)]
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child_ids(&self) -> &[NodeId] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// The immutable result of parsing.
///
/// Nodes live in an arena owned by the tree; children are referenced by index
/// from their parent and parents are plain back-indices.
#[derive(Debug, Clone, Serialize)]
pub struct ParseTree {
    #[serde(skip)]
    source: String,
    nodes: Vec<Node>,
    #[serde(skip)]
    refs: HashMap<String, NodeId>,
}

impl ParseTree {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Length of the parsed source; equal to the root's `end`.
    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn children<'t>(&'t self, node: &'t Node) -> impl Iterator<Item = &'t Node> + 't {
        node.children.iter().map(move |id| &self.nodes[id.0])
    }

    /// The `index`-th child of `node`.
    pub fn child(&self, node: &Node, index: usize) -> Option<&Node> {
        node.children.get(index).map(|id| &self.nodes[id.0])
    }

    pub fn parent(&self, node: &Node) -> Option<&Node> {
        node.parent.map(|id| &self.nodes[id.0])
    }

    /// Ancestors from the direct parent up to the root.
    pub fn ancestors<'t>(&'t self, node: &'t Node) -> impl Iterator<Item = &'t Node> + 't {
        std::iter::successors(self.parent(node), move |n| self.parent(n))
    }

    /// Source text covered by `node`.
    pub fn text(&self, node: &Node) -> &str {
        self.slice(node.start, node.end)
    }

    pub fn slice(&self, start: usize, end: usize) -> &str {
        self.source.get(start..end).unwrap_or("")
    }

    /// The `ref-NAME` box registered under `name`.
    pub fn find_reference(&self, name: &str) -> Option<&Node> {
        self.refs.get(name).map(|id| &self.nodes[id.0])
    }
}

/// Incremental constructor for a [`ParseTree`].
///
/// The parser drives it while scanning. It is public so that trees of any
/// shape, including ones a parser would never produce, can be assembled by
/// hand.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
    refs: HashMap<String, NodeId>,
}

/// Restore point for backing out of a construct that failed to close.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    len: usize,
    parent: NodeId,
    siblings: usize,
}

impl TreeBuilder {
    /// A builder whose root spans `[0, len)`.
    pub fn new(len: usize) -> Self {
        let root = Node {
            id: NodeId(0),
            kind: NodeKind::Root,
            start: 0,
            end: len,
            parent: None,
            children: Vec::new(),
        };
        TreeBuilder {
            nodes: vec![root],
            refs: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a child to `parent`. The node starts empty at `start`.
    pub fn add(&mut self, parent: NodeId, kind: NodeKind, start: usize) -> NodeId {
        self.add_span(parent, kind, start, start)
    }

    pub fn add_span(&mut self, parent: NodeId, kind: NodeKind, start: usize, end: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            kind,
            start,
            end,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn set_end(&mut self, id: NodeId, end: usize) {
        self.nodes[id.0].end = end;
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.nodes[id.0].children.len()
    }

    /// Register a `ref-` box under `name`. The first registration wins.
    pub fn register_reference(&mut self, name: &str, id: NodeId) {
        self.refs.entry(name.to_string()).or_insert(id);
    }

    pub(crate) fn checkpoint(&self, parent: NodeId) -> Checkpoint {
        Checkpoint {
            len: self.nodes.len(),
            parent,
            siblings: self.nodes[parent.0].children.len(),
        }
    }

    /// Drop every node created since `cp` and detach them from the checkpoint parent.
    pub(crate) fn rollback(&mut self, cp: Checkpoint) {
        self.nodes.truncate(cp.len);
        self.nodes[cp.parent.0].children.truncate(cp.siblings);
        self.refs.retain(|_, id| id.0 < cp.len);
    }

    /// Remove `id` from its parent and splice its children into its place.
    ///
    /// The removed node stays in the arena, unreachable, until [`finish`](Self::finish).
    pub(crate) fn unwrap_node(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent else {
            return;
        };
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in &children {
            self.nodes[child.0].parent = Some(parent);
        }
        let siblings = &mut self.nodes[parent.0].children;
        if let Some(pos) = siblings.iter().position(|c| *c == id) {
            siblings.splice(pos..=pos, children);
        }
        self.nodes[id.0].parent = None;
    }

    /// Freeze the tree, renumbering reachable nodes in pre-order.
    pub fn finish(self, source: impl Into<String>) -> ParseTree {
        let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![NodeId(0)];
        while let Some(id) = stack.pop() {
            remap.insert(id, NodeId(order.len()));
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }

        let nodes = order
            .iter()
            .map(|old| {
                let n = &self.nodes[old.0];
                Node {
                    id: remap[old],
                    kind: n.kind.clone(),
                    start: n.start,
                    end: n.end,
                    parent: n.parent.and_then(|p| remap.get(&p).copied()),
                    children: n.children.iter().map(|c| remap[c]).collect(),
                }
            })
            .collect();

        let refs = self
            .refs
            .into_iter()
            .filter_map(|(name, id)| remap.get(&id).map(|new| (name, *new)))
            .collect();

        ParseTree {
            source: source.into(),
            nodes,
            refs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unwrap_splices_children_in_place() {
        let mut b = TreeBuilder::new(10);
        let para = b.add_span(b.root(), NodeKind::Paragraph, 0, 10);
        let bold = b.add_span(para, NodeKind::Bold, 0, 10);
        b.add_span(bold, NodeKind::Italic, 2, 4);
        b.add_span(bold, NodeKind::Escape, 5, 7);
        b.add_span(para, NodeKind::Escape, 8, 10);
        b.unwrap_node(bold);

        let tree = b.finish("0123456789");
        let para = tree.child(tree.root(), 0).unwrap();
        let kinds: Vec<_> = tree.children(para).map(|n| n.kind().tag()).collect();
        assert_eq!(kinds, vec!["ITALIC", "ESCAPE", "ESCAPE"]);
        assert!(tree.children(para).all(|n| n.parent() == Some(para.id())));
        assert_eq!(tree.nodes().len(), 5);
    }

    #[test]
    fn rollback_forgets_nodes_and_references() {
        let mut b = TreeBuilder::new(4);
        let root = b.root();
        b.add_span(root, NodeKind::Paragraph, 0, 1);
        let cp = b.checkpoint(root);
        let boxed = b.add(root, NodeKind::Box { name: "ref-a".into() }, 1);
        b.register_reference("a", boxed);
        b.rollback(cp);

        let tree = b.finish("abcd");
        assert_eq!(tree.root().child_count(), 1);
        assert!(tree.find_reference("a").is_none());
    }

    #[test]
    fn ancestors_walk_to_root() {
        let mut b = TreeBuilder::new(3);
        let para = b.add_span(b.root(), NodeKind::Paragraph, 0, 3);
        let bold = b.add_span(para, NodeKind::Bold, 0, 3);
        b.add_span(bold, NodeKind::Italic, 1, 2);
        let tree = b.finish("abc");

        let italic = tree.nodes().iter().find(|n| *n.kind() == NodeKind::Italic).unwrap();
        let tags: Vec<_> = tree.ancestors(italic).map(|n| n.kind().tag()).collect();
        assert_eq!(tags, vec!["BOLD", "PARAGRAPH", "ROOT"]);
        assert_eq!(tree.text(italic), "b");
    }
}
