//! Inline constructs: escapes, commands, links, images, code spans and math.
//!
//! Each recogniser returns the offset just past the construct, or `None`
//! when the opening token turns out to be literal text.

use std::collections::BTreeMap;

use crate::attrs::split_keywords;
use crate::parse::{Cursor, ParseState, Scope};
use crate::types::{NodeId, NodeKind};

/// Known `\name{...}` macros and how many arguments each takes.
const COMMANDS: &[(&str, usize)] = &[
    ("sidenote", 1),
    ("sc", 1),
    ("serif", 1),
    ("footnote", 1),
    ("htmlonly", 1),
    ("latexonly", 1),
    ("escape", 1),
    ("ref", 1),
    ("tooltip", 2),
    ("newline", 0),
];

pub fn command_arity(name: &str) -> Option<usize> {
    COMMANDS.iter().find(|(n, _)| *n == name).map(|(_, arity)| *arity)
}

impl ParseState<'_, '_> {
    pub(crate) fn backslash(&mut self, i: usize, scope: &Scope, cursor: &mut Cursor) -> Option<usize> {
        if i + 1 >= scope.bound {
            return None;
        }
        match self.bytes[i + 1] {
            b'*' | b'`' | b'\\' => Some(self.escape(i, cursor)),
            b'|' if scope.in_table => Some(self.escape(i, cursor)),
            b'[' => self.display_math(i, scope, cursor),
            c if c.is_ascii_alphabetic() => self.command(i, scope, cursor),
            _ => None,
        }
    }

    fn escape(&mut self, i: usize, cursor: &mut Cursor) -> usize {
        self.b.add_span(cursor.current, NodeKind::Escape, i, i + 2);
        i + 2
    }

    fn command(&mut self, i: usize, scope: &Scope, cursor: &mut Cursor) -> Option<usize> {
        let name_end = i + 1 + self.bytes[i + 1..scope.bound]
            .iter()
            .take_while(|c| c.is_ascii_alphabetic())
            .count();
        let src = self.src;
        let name = &src[i + 1..name_end];
        let arity = command_arity(name)?;

        let mut args = Vec::with_capacity(arity);
        let mut pos = name_end;
        for _ in 0..arity {
            if pos >= scope.bound || self.bytes[pos] != b'{' {
                self.debug(format!("\\{name} expects {arity} argument(s); left as text"));
                return None;
            }
            let close = self.matching_brace(pos, scope.bound)?;
            args.push((pos + 1, close));
            pos = close + 1;
        }

        let node = self.b.add_span(
            cursor.current,
            NodeKind::Command {
                name: name.to_string(),
            },
            i,
            pos,
        );
        for (start, end) in args {
            let arg = self.b.add_span(node, NodeKind::Group, start, end);
            self.parse_scope(start, scope.nested_inline(arg, end));
        }
        Some(pos)
    }

    /// Offset of the `}` balancing the `{` at `open`.
    fn matching_brace(&self, open: usize, bound: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut j = open;
        while j < bound {
            match self.bytes[j] {
                b'\\' => j += 1,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(j);
                    }
                }
                b'\n' if self.bytes[j..bound].starts_with(b"\n\n") => return None,
                _ => {}
            }
            j += 1;
        }
        None
    }

    /// `[desc](url)` or, with `image`, `![desc](url)`.
    pub(crate) fn link(&mut self, i: usize, scope: &Scope, cursor: &mut Cursor, image: bool) -> Option<usize> {
        let open = i + if image { 2 } else { 1 };
        // Only the last `[` before the `](` starts the link.
        let close = self.link_close(open, scope.bound)?;

        let url_start = close + 2;
        let url_end = self.matching_paren(url_start, scope.bound)?;
        let end = url_end + 1;

        let kind = if image {
            NodeKind::Image {
                keywords: BTreeMap::new(),
            }
        } else {
            NodeKind::Link
        };
        let node = self.b.add_span(cursor.current, kind, i, end);

        let desc = self.b.add_span(node, NodeKind::Group, open, close);
        if image {
            self.image_keywords(node, desc, open, close, scope);
        } else {
            self.parse_scope(open, scope.nested_inline(desc, close));
        }

        let url = self.b.add_span(node, NodeKind::Group, url_start, url_end);
        self.parse_scope(url_start, scope.nested_inline(url, url_end));
        Some(end)
    }

    /// The `)` closing a url, which must sit on the same line.
    fn matching_paren(&self, from: usize, bound: usize) -> Option<usize> {
        let mut depth = 1usize;
        for j in from..bound {
            match self.bytes[j] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(j);
                    }
                }
                b'\n' => return None,
                _ => {}
            }
        }
        None
    }

    fn image_keywords(
        &mut self,
        image: NodeId,
        desc: NodeId,
        open: usize,
        close: usize,
        scope: &Scope,
    ) {
        let mut table = BTreeMap::new();
        let src = self.src;
        for span in split_keywords(&src[open..close]) {
            let (start, end) = (open + span.start, open + span.end);
            table.insert(span.keyword, self.b.child_count(desc));
            let value = self.b.add_span(desc, NodeKind::Group, start, end);
            self.parse_scope(start, scope.nested_inline(value, end));
        }
        if let NodeKind::Image { keywords } = self.b.kind_mut(image) {
            *keywords = table;
        }
    }

    /// `` `code` `` with single backticks. Longer runs stay literal.
    pub(crate) fn inline_code(&mut self, i: usize, scope: &Scope, cursor: &mut Cursor) -> Option<usize> {
        let run = self.bytes[i..scope.bound].iter().take_while(|&&c| c == b'`').count();
        if run > 1 {
            return Some(i + run);
        }
        let close = self.find(i + 1, scope.bound, b"`", true)?;
        self.b.add_span(cursor.current, NodeKind::Verbatim, i, close + 1);
        Some(close + 1)
    }

    pub(crate) fn inline_math(&mut self, i: usize, scope: &Scope, cursor: &mut Cursor) -> Option<usize> {
        let close = self.find(i + 2, scope.bound, b"$$", true)?;
        Some(self.math(i, i + 2, close, close + 2, false, cursor))
    }

    fn display_math(&mut self, i: usize, scope: &Scope, cursor: &mut Cursor) -> Option<usize> {
        let close = self.find(i + 2, scope.bound, b"\\]", false)?;
        Some(self.math(i, i + 2, close, close + 2, true, cursor))
    }

    fn math(
        &mut self,
        start: usize,
        body_start: usize,
        body_end: usize,
        end: usize,
        display: bool,
        cursor: &mut Cursor,
    ) -> usize {
        let (layout, expr_start) = match self.layout_prefix(body_start, body_end) {
            Some((layout, after)) => (Some(layout), after),
            None => (None, body_start),
        };
        self.b.add_span(
            cursor.current,
            NodeKind::Math {
                display,
                layout,
                expr_start,
                expr_end: body_end,
            },
            start,
            end,
        );
        end
    }

    /// `H,W;` at the start of a math body.
    fn layout_prefix(&self, from: usize, to: usize) -> Option<((u32, u32), usize)> {
        let body = &self.src[from..to];
        let semi = body.find(';')?;
        let (height, width) = body[..semi].split_once(',')?;
        let is_number = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
        if !is_number(height) || !is_number(width) {
            return None;
        }
        let layout = (height.parse().ok()?, width.parse().ok()?);
        Some((layout, from + semi + 1))
    }
}
