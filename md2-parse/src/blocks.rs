//! Line-start constructs: headers, fenced boxes and code, tables, quotes and lists.

use crate::parse::{Mode, ParseState, Scope, Terminator};
use crate::types::{HeaderVariant, NodeId, NodeKind};

/// Fence names that open a box environment rather than a code block.
const BOX_NAMES: &[&str] = &[
    "note",
    "sidenote",
    "info-text",
    "warning",
    "lec-warning",
    "lec-info",
    "lec-summary",
    "html-only",
    "latex-only",
];

/// Boxes named `ref-NAME` are only rendered where `\ref{NAME}` points at them.
pub const REF_BOX_PREFIX: &str = "ref-";

pub fn is_box_name(name: &str) -> bool {
    BOX_NAMES.contains(&name) || name.starts_with(REF_BOX_PREFIX)
}

/// A list marker found at the start of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ListMarker {
    indent: usize,
    ordered: bool,
    content_start: usize,
}

impl ParseState<'_, '_> {
    /// Try every construct that may begin at the line start `i`.
    pub(crate) fn try_block(&mut self, i: usize, scope: &Scope) -> Option<usize> {
        match self.bytes[i] {
            b'`' => self.fence(i, scope),
            _ if scope.mode == Mode::Inline => None,
            b'#' => self.header(i, scope),
            b'|' => self.table(i, scope),
            b'>' => self.quote(i, scope),
            b'*' | b'0'..=b'9' => self.list(i, scope),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Headers
    // ------------------------------------------------------------------

    fn header(&mut self, i: usize, scope: &Scope) -> Option<usize> {
        let bound = scope.bound;
        let hashes = self.bytes[i..bound].iter().take_while(|&&c| c == b'#').count();
        let mut marker_end = i + hashes;

        let variant = if marker_end < bound && self.bytes[marker_end] == b'@' && hashes <= 3 {
            marker_end += 1;
            match hashes {
                1 => HeaderVariant::RefHeader,
                2 => HeaderVariant::TemplateHeader,
                _ => HeaderVariant::LectureHeader,
            }
        } else if hashes <= 6 {
            HeaderVariant::Plain
        } else {
            return None;
        };

        if marker_end >= bound || self.bytes[marker_end] != b' ' {
            return None;
        }

        let line_end = self.line_end(marker_end, bound);
        let node = self.b.add_span(
            scope.container,
            NodeKind::Header {
                marker: self.src[i..marker_end].to_string(),
                level: hashes,
                variant,
            },
            i,
            line_end,
        );
        self.b.add_span(node, NodeKind::Group, i, marker_end);
        let title = self.b.add_span(node, NodeKind::Group, marker_end, line_end);
        self.parse_scope(marker_end, Scope::inline(title, line_end));
        Some(line_end)
    }

    // ------------------------------------------------------------------
    // Fences
    // ------------------------------------------------------------------

    fn fence(&mut self, i: usize, scope: &Scope) -> Option<usize> {
        let bound = scope.bound;
        if !self.bytes[i..bound].starts_with(b"```") {
            return None;
        }
        let name_start = i + 3;
        let name_end = name_start
            + self.bytes[name_start..bound]
                .iter()
                .take_while(|&&c| c.is_ascii_alphanumeric() || matches!(c, b'-' | b'_' | b'+'))
                .count();
        if name_end == name_start || name_end >= bound || self.bytes[name_end] != b'\n' {
            return None;
        }

        let name = &self.src[name_start..name_end];
        if is_box_name(name) {
            self.fenced_box(i, name_start, name_end, scope)
        } else {
            self.fenced_code(i, name_start, name_end, scope)
        }
    }

    fn fenced_box(&mut self, i: usize, name_start: usize, name_end: usize, scope: &Scope) -> Option<usize> {
        let src = self.src;
        let name = &src[name_start..name_end];
        let body_start = name_end + 1;
        let checkpoint = self.b.checkpoint(scope.container);

        let node = self.b.add(scope.container, NodeKind::Box { name: name.to_string() }, i);
        self.b.add_span(node, NodeKind::Group, name_start, name_end);
        let body = self.b.add(node, NodeKind::Group, body_start);

        // Referenced boxes are spliced into running text, so no paragraphs.
        let reference = name.strip_prefix(REF_BOX_PREFIX);
        let body_scope = Scope {
            container: body,
            mode: if reference.is_some() { Mode::Inline } else { Mode::Block },
            bound: scope.bound,
            terminator: Some(Terminator::Fence),
            in_table: false,
        };

        match self.parse_scope(body_start, body_scope) {
            Some(closed) => {
                self.b.set_end(body, closed.content_end);
                self.b.set_end(node, closed.next);
                if let Some(reference) = reference {
                    self.b.register_reference(reference, node);
                }
                Some(closed.next)
            }
            None => {
                self.debug(format!("box '{name}' at offset {i} is never closed; left as text"));
                self.b.rollback(checkpoint);
                None
            }
        }
    }

    fn fenced_code(&mut self, i: usize, name_start: usize, name_end: usize, scope: &Scope) -> Option<usize> {
        let body_start = name_end + 1;
        let mut from = body_start;
        let close = loop {
            let Some(at) = self.find(from, scope.bound, b"```", false) else {
                self.debug(format!(
                    "code block '{}' at offset {i} is never closed; left as text",
                    &self.src[name_start..name_end]
                ));
                return None;
            };
            if self.at_line_start(at) {
                break at;
            }
            from = at + 1;
        };

        let node = self.b.add_span(scope.container, NodeKind::Verbatim, i, close + 3);
        self.b.add_span(node, NodeKind::Group, name_start, name_end);
        self.b.add_span(node, NodeKind::Text, body_start, close);
        Some(close + 3)
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    fn table(&mut self, i: usize, scope: &Scope) -> Option<usize> {
        let bound = scope.bound;
        let checkpoint = self.b.checkpoint(scope.container);
        let node = self.b.add(scope.container, NodeKind::Table { row_size: 0 }, i);

        let mut row_size = None;
        let mut pos = i;
        while pos < bound && self.bytes[pos] == b'|' {
            let line_end = self.line_end(pos, bound);
            let cells = self.split_cells(pos, line_end);
            if row_size.is_none() {
                if cells.is_empty() {
                    self.b.rollback(checkpoint);
                    return None;
                }
                row_size = Some(cells.len());
            }

            for (start, end) in cells {
                let cell = self.b.add_span(node, NodeKind::Group, start, end);
                let cell_scope = Scope {
                    in_table: true,
                    ..Scope::block(cell, end)
                };
                self.parse_scope(start, cell_scope);
            }
            pos = if line_end < bound { line_end + 1 } else { line_end };
        }

        if let NodeKind::Table { row_size: size } = self.b.kind_mut(node) {
            *size = row_size.unwrap_or(0);
        }
        self.b.set_end(node, pos);
        Some(pos)
    }

    /// Cell ranges between unescaped pipes on one row.
    fn split_cells(&self, start: usize, end: usize) -> Vec<(usize, usize)> {
        let mut pipes = Vec::new();
        let mut j = start;
        while j < end {
            match self.bytes[j] {
                b'\\' => j += 1,
                b'|' => pipes.push(j),
                _ => {}
            }
            j += 1;
        }

        let mut cells: Vec<(usize, usize)> = pipes.windows(2).map(|w| (w[0] + 1, w[1])).collect();
        if let Some(&last) = pipes.last() {
            if !self.src[last + 1..end].trim().is_empty() {
                cells.push((last + 1, end));
            }
        }
        cells
    }

    // ------------------------------------------------------------------
    // Quotes
    // ------------------------------------------------------------------

    fn quote(&mut self, i: usize, scope: &Scope) -> Option<usize> {
        let bound = scope.bound;
        if !self.bytes[i..bound].starts_with(b"> ") {
            return None;
        }
        let node = self.b.add(scope.container, NodeKind::Quote, i);
        let mut pos = i;
        while pos < bound && self.bytes[pos..bound].starts_with(b"> ") {
            let line_end = self.line_end(pos, bound);
            self.parse_scope(pos + 2, Scope::inline(node, line_end));
            pos = if line_end < bound { line_end + 1 } else { line_end };
        }
        self.b.set_end(node, pos);
        Some(pos)
    }

    // ------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------

    fn list_marker(&self, line_start: usize, line_end: usize) -> Option<ListMarker> {
        let line = &self.bytes[line_start..line_end];
        let indent = line.iter().take_while(|&&c| c == b' ').count();
        let rest = &line[indent..];

        if rest.starts_with(b"* ") {
            return Some(ListMarker {
                indent,
                ordered: false,
                content_start: line_start + indent + 2,
            });
        }

        let digits = rest.iter().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 && rest[digits..].starts_with(b". ") {
            return Some(ListMarker {
                indent,
                ordered: true,
                content_start: line_start + indent + digits + 2,
            });
        }
        None
    }

    /// A list and every deeper list nested in it.
    ///
    /// A nested list is placed in its parent list right after the item it
    /// follows. The newline after the last line is left for the caller.
    fn list(&mut self, i: usize, scope: &Scope) -> Option<usize> {
        let bound = scope.bound;
        let first = self.list_marker(i, self.line_end(i, bound))?;
        if first.indent != 0 {
            return None;
        }

        let root_list = self.b.add(scope.container, NodeKind::List { ordered: first.ordered }, i);
        let mut lists: Vec<(NodeId, usize)> = vec![(root_list, 0)];
        let mut last_item: Option<(NodeId, usize)> = None;
        let mut end = i;
        let mut pos = i;

        while pos < bound {
            let line_end = self.line_end(pos, bound);

            if let Some(marker) = self.list_marker(pos, line_end) {
                while lists.len() > 1 && lists.last().is_some_and(|&(_, depth)| depth > marker.indent) {
                    if let Some((list, _)) = lists.pop() {
                        self.b.set_end(list, end);
                    }
                }
                let (top, depth) = lists[lists.len() - 1];
                let parent = if marker.indent > depth {
                    let nested = self.b.add(top, NodeKind::List { ordered: marker.ordered }, pos);
                    lists.push((nested, marker.indent));
                    nested
                } else {
                    top
                };

                let item = self.b.add(
                    parent,
                    NodeKind::ListItem {
                        ordered: marker.ordered,
                        depth: marker.indent,
                    },
                    pos,
                );
                self.parse_scope(marker.content_start, Scope::block(item, line_end));
                self.b.set_end(item, line_end);
                last_item = Some((item, marker.indent));
            } else {
                let src = self.src;
                let line = &src[pos..line_end];
                let indent = line.len() - line.trim_start_matches(' ').len();
                match last_item {
                    Some((item, depth)) if !line.trim().is_empty() && indent > depth => {
                        self.parse_scope(pos, Scope::block(item, line_end));
                        self.b.set_end(item, line_end);
                    }
                    _ => break,
                }
            }

            end = line_end;
            if line_end >= bound {
                break;
            }
            pos = line_end + 1;
        }

        for (list, _) in lists {
            self.b.set_end(list, end);
        }
        Some(end)
    }
}
