//! LaTeX backend.
//!
//! Output is a body fragment meant to be `\input` into a book template that
//! loads `hyperref`, `ulem`, `float`, `listings` and `adjustbox`.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::blocks::REF_BOX_PREFIX;
use crate::logging::LogSink;
use crate::render::{
    EscapeStack, Generator, GeneratorContext, RenderState, fixed_children,
};
use crate::types::{HeaderVariant, ImageKeyword, Node, ParseTree};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LatexOptions {
    /// Directory prepended to every image url.
    pub image_dir_path: String,
    /// Drop images entirely.
    pub no_image: bool,
}

pub fn generate_latex(tree: &ParseTree, options: &LatexOptions, context: &GeneratorContext<'_>) -> String {
    LatexGenerator::new(tree, options, *context).generate()
}

/// Replacement for a reserved character, if it has one.
fn escape_latex_char(c: char) -> Option<&'static str> {
    Some(match c {
        '&' => "\\&",
        '%' => "\\%",
        '$' => "\\$",
        '#' => "\\#",
        '_' => "\\_",
        '{' => "\\{",
        '}' => "\\}",
        '~' => "\\textasciitilde{}",
        '^' => "\\textasciicircum{}",
        '\\' => "\\textbackslash{}",
        _ => return None,
    })
}

fn section_command(level: usize) -> &'static str {
    match level {
        1 => "section*",
        2 => "subsection*",
        3 => "subsubsection*",
        _ => "paragraph*",
    }
}

pub struct LatexGenerator<'t, 'c> {
    tree: &'t ParseTree,
    options: &'c LatexOptions,
    context: GeneratorContext<'c>,
    state: RenderState,
    escape: EscapeStack,
}

impl<'t, 'c> LatexGenerator<'t, 'c> {
    pub fn new(tree: &'t ParseTree, options: &'c LatexOptions, context: GeneratorContext<'c>) -> Self {
        LatexGenerator {
            tree,
            options,
            context,
            state: RenderState::default(),
            escape: EscapeStack::default(),
        }
    }

    fn wrap(&mut self, open: &str, node: &'t Node, close: &str) {
        self.emit(open);
        self.generate_children(node);
        self.emit(close);
    }

    fn unescaped<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.escape.push(false);
        f(self);
        self.escape.pop();
    }

    fn table_row(&mut self, cells: &[&'t Node]) {
        for (i, &cell) in cells.iter().enumerate() {
            if i > 0 {
                self.emit(" & ");
            }
            self.generate_node(cell);
        }
        self.emit(" \\\\ \\hline\n");
    }
}

impl<'t> Generator<'t> for LatexGenerator<'t, '_> {
    fn tree(&self) -> &'t ParseTree {
        self.tree
    }

    fn state(&mut self) -> &mut RenderState {
        &mut self.state
    }

    fn sink(&self) -> &dyn LogSink {
        self.context.sink
    }

    fn emit_char(&mut self, c: char) {
        let replacement = if self.escape.enabled() { escape_latex_char(c) } else { None };
        let target = self.state.targets.current();
        match replacement {
            Some(escaped) => target.push_str(escaped),
            None => target.push(c),
        }
    }

    fn paragraph(&mut self, node: &'t Node) {
        if node.start() >= node.end() {
            return;
        }
        self.emit("\n");
        self.generate_inner(node, 0, 0);
        self.emit("\n");
    }

    fn text(&mut self, node: &'t Node) {
        self.generate_inner(node, 0, 0);
    }

    fn bold(&mut self, node: &'t Node) {
        self.emit("\\textbf{");
        self.generate_inner(node, 2, 2);
        self.emit("}");
    }

    fn italic(&mut self, node: &'t Node) {
        self.emit("\\emph{");
        self.generate_inner(node, 1, 1);
        self.emit("}");
    }

    fn strike_through(&mut self, node: &'t Node) {
        self.emit("\\sout{");
        self.generate_inner(node, 2, 2);
        self.emit("}");
    }

    fn link(&mut self, node: &'t Node) {
        let [desc, url] = fixed_children::<2>(self.tree, node);
        let url = self.scratch(|g| g.unescaped(|g| g.generate_node(url)));
        let desc = self.scratch(|g| g.generate_node(desc));
        self.emit(&format!("\\href{{{url}}}{{{desc}}}"));
    }

    fn image(&mut self, node: &'t Node, keywords: &'t BTreeMap<ImageKeyword, usize>) {
        if self.options.no_image {
            return;
        }
        let tree = self.tree;
        let [desc, url] = fixed_children::<2>(tree, node);
        let url = self.scratch(|g| g.unescaped(|g| g.generate_node(url)));
        let caption = match keywords
            .get(&ImageKeyword::Caption)
            .and_then(|&index| tree.child(desc, index))
        {
            Some(caption) => self.scratch(|g| g.generate_node(caption)),
            None => String::new(),
        };

        self.emit("\n\\begin{figure}[H]\n\\centering\n");
        self.emit(&format!(
            "\\includegraphics[max width=0.7\\linewidth]{{{}{url}}}\n",
            self.options.image_dir_path
        ));
        if !caption.trim().is_empty() {
            self.emit(&format!("\\caption{{{}}}\n", caption.trim()));
        }
        self.emit("\\end{figure}\n");
    }

    fn table(&mut self, node: &'t Node, row_size: usize) {
        if row_size == 0 {
            return;
        }
        let cells: Vec<&'t Node> = self.tree.children(node).collect();
        let columns = "|c".repeat(row_size);

        self.emit(&format!("\n\\begin{{tabular}}{{{columns}|}}\n\\hline\n"));
        self.table_row(&cells[..row_size.min(cells.len())]);
        for row in cells.get(2 * row_size..).unwrap_or_default().chunks(row_size) {
            self.table_row(row);
        }
        self.emit("\\end{tabular}\n");
    }

    fn list(&mut self, node: &'t Node, ordered: bool) {
        let environment = if ordered { "enumerate" } else { "itemize" };
        self.emit(&format!("\n\\begin{{{environment}}}\n"));
        self.generate_children(node);
        self.emit(&format!("\\end{{{environment}}}\n"));
    }

    fn list_item(&mut self, node: &'t Node, _ordered: bool, _depth: usize) {
        self.wrap("\\item ", node, "\n");
    }

    fn header(&mut self, node: &'t Node, level: usize, variant: HeaderVariant) {
        let [_, title] = fixed_children::<2>(self.tree, node);
        if variant != HeaderVariant::Plain {
            return;
        }
        let title = self.scratch(|g| g.generate_node(title));
        self.emit(&format!("\n\\{}{{{}}}\n", section_command(level), title.trim()));
    }

    fn verbatim(&mut self, node: &'t Node) {
        let tree = self.tree;
        if node.child_count() == 0 {
            let code = tree.slice(node.start() + 1, node.end().saturating_sub(1));
            self.emit("\\texttt{");
            self.emit_str_escaped(code);
            self.emit("}");
            return;
        }

        let [language, body] = fixed_children::<2>(tree, node);
        self.emit(&format!(
            "\n\\begin{{lstlisting}}[language={}]\n",
            tree.text(language)
        ));
        self.emit(tree.text(body));
        self.emit("\\end{lstlisting}\n");
    }

    fn escape(&mut self, node: &'t Node) {
        let tree = self.tree;
        self.emit_str_escaped(tree.slice(node.start() + 1, node.end()));
    }

    fn command(&mut self, node: &'t Node, name: &'t str) {
        match name {
            "sidenote" => self.wrap("\\sidenote{", node, "}"),
            "footnote" => self.wrap("\\footnote{", node, "}"),
            "sc" => self.wrap("\\textsc{", node, "}"),
            "serif" => self.wrap("\\textit{", node, "}"),
            "tooltip" => {
                let [shown, _] = fixed_children::<2>(self.tree, node);
                self.generate_node(shown);
            }
            "htmlonly" => {}
            "latexonly" => self.generate_children(node),
            "escape" => self.unescaped(|g| g.generate_children(node)),
            "newline" => self.emit("\\\\"),
            "ref" => {
                let tree = self.tree;
                let [arg] = fixed_children::<1>(tree, node);
                let body = self.generate_reference(tree.text(arg).trim());
                self.emit(&body);
            }
            _ => self.generate_children(node),
        }
    }

    fn math(&mut self, _node: &'t Node, display: bool, _layout: Option<(u32, u32)>, expr: &'t str) {
        if display {
            self.emit(&format!("\\[{expr}\\]"));
        } else {
            self.emit(&format!("${expr}$"));
        }
    }

    fn boxed(&mut self, node: &'t Node, name: &'t str) {
        let [_, body] = fixed_children::<2>(self.tree, node);
        match name {
            "sidenote" => self.wrap("\\sidenote{", body, "}"),
            "latex-only" => self.generate_node(body),
            "html-only" => {}
            name if name.starts_with(REF_BOX_PREFIX) => {}
            name => {
                let open = format!("\n\\begin{{{name}}}");
                let close = format!("\\end{{{name}}}\n");
                self.wrap(&open, body, &close);
            }
        }
    }

    fn quote(&mut self, node: &'t Node) {
        self.wrap("\n\\begin{quote}\n", node, "\n\\end{quote}\n");
    }
}
