//! HTML fragment backend.
//!
//! Produces the markup the site stylesheet expects. Text is escaped for
//! `<`, `>` and `&`; attribute values use single quotes.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::attrs::ImageSize;
use crate::blocks::REF_BOX_PREFIX;
use crate::highlight::ClassifiedSpan;
use crate::logging::LogSink;
use crate::render::{
    EscapeStack, Generator, GeneratorContext, RenderState, fixed_children,
};
use crate::types::{HeaderVariant, ImageKeyword, Node, ParseTree};

/// Knobs for HTML generation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HtmlOptions {
    /// Largest inline image height in pixels. `0` disables clamping.
    pub inline_image_max_height: u32,
    /// Give plain headers `id='page-heading-N'` anchors.
    pub heading_ids: bool,
    /// Prefix relative image urls with `/`.
    pub absolute_image_path: bool,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        HtmlOptions {
            inline_image_max_height: 0,
            heading_ids: true,
            absolute_image_path: false,
        }
    }
}

/// Code languages shown as preformatted text without highlighting.
const PLAIN_CODE_CLASSES: &[&str] = &["info", "info-term", "info-verb", "info-format"];

/// Render a parsed document as an HTML fragment.
pub fn generate_html(tree: &ParseTree, options: &HtmlOptions, context: &GeneratorContext<'_>) -> String {
    HtmlGenerator::new(tree, options, *context).generate()
}

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub struct HtmlGenerator<'t, 'c> {
    tree: &'t ParseTree,
    options: &'c HtmlOptions,
    context: GeneratorContext<'c>,
    state: RenderState,
    escape: EscapeStack,
    heading_index: usize,
}

impl<'t, 'c> HtmlGenerator<'t, 'c> {
    pub fn new(tree: &'t ParseTree, options: &'c HtmlOptions, context: GeneratorContext<'c>) -> Self {
        HtmlGenerator {
            tree,
            options,
            context,
            state: RenderState::default(),
            escape: EscapeStack::default(),
            heading_index: 0,
        }
    }

    fn wrap(&mut self, open: &str, node: &'t Node, close: &str) {
        self.emit(open);
        self.generate_children(node);
        self.emit(close);
    }

    fn emit_raw(&mut self, s: &str) {
        self.escape.push(false);
        self.emit_str_escaped(s);
        self.escape.pop();
    }

    fn image_src(&self, url: String) -> String {
        if self.options.absolute_image_path && !url.starts_with('/') && !url.contains("://") {
            format!("/{url}")
        } else {
            url
        }
    }

    fn highlighted_code(&mut self, language: &str, code: &str) {
        let formatted = self.context.formatter.format(language, code);
        let code = formatted.as_deref().unwrap_or(code);
        let spans = self.context.highlighter.highlight(language, code);

        self.emit(&format!("<pre class='chroma lang-{}'>", escape_html(language)));
        let mut pos = 0;
        for ClassifiedSpan { class, range } in spans {
            let Some(text) = code.get(range.clone()) else {
                continue;
            };
            if range.start < pos {
                continue;
            }
            self.emit(&escape_html(&code[pos..range.start]));
            self.emit(&format!("<span class='{class}'>{}</span>", escape_html(text)));
            pos = range.end;
        }
        self.emit(&escape_html(&code[pos..]));
        self.emit("</pre>");
    }
}

impl<'t> Generator<'t> for HtmlGenerator<'t, '_> {
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
        let target = self.state.targets.current();
        match c {
            '<' if self.escape.enabled() => target.push_str("&lt;"),
            '>' if self.escape.enabled() => target.push_str("&gt;"),
            '&' if self.escape.enabled() => target.push_str("&amp;"),
            _ => target.push(c),
        }
    }

    fn paragraph(&mut self, node: &'t Node) {
        if node.start() >= node.end() {
            return;
        }
        self.emit("<p>");
        self.generate_inner(node, 0, 0);
        self.emit("</p>");
    }

    fn text(&mut self, node: &'t Node) {
        self.generate_inner(node, 0, 0);
    }

    fn bold(&mut self, node: &'t Node) {
        self.emit("<span class='font-weight-bold'>");
        self.generate_inner(node, 2, 2);
        self.emit("</span>");
    }

    fn italic(&mut self, node: &'t Node) {
        self.emit("<span class='font-italic'>");
        self.generate_inner(node, 1, 1);
        self.emit("</span>");
    }

    fn strike_through(&mut self, node: &'t Node) {
        self.emit("<span class='font-strike'>");
        self.generate_inner(node, 2, 2);
        self.emit("</span>");
    }

    fn link(&mut self, node: &'t Node) {
        let tree = self.tree;
        let [desc, url] = fixed_children::<2>(tree, node);
        let desc_html = self.scratch(|g| g.generate_node(desc));
        let url_html = self.scratch(|g| g.generate_node(url));

        if self.context.find_reference(tree.text(desc)).is_some() {
            self.emit(&format!("<a href='{url_html}' class='link-code'>{desc_html}</a>"));
        } else {
            self.emit(&format!("<a href='{url_html}'>{desc_html}</a>"));
        }
    }

    fn image(&mut self, node: &'t Node, keywords: &'t BTreeMap<ImageKeyword, usize>) {
        let tree = self.tree;
        let [desc, url] = fixed_children::<2>(tree, node);
        let value = |keyword| keywords.get(&keyword).and_then(|&index| tree.child(desc, index));

        let alt = match value(ImageKeyword::Alt) {
            Some(alt) => self.scratch(|g| g.generate_node(alt)),
            None => String::new(),
        };
        let caption = match value(ImageKeyword::Caption) {
            Some(caption) => self.scratch(|g| g.generate_node(caption)),
            None => String::new(),
        };
        let size = value(ImageKeyword::Size).and_then(|size| ImageSize::parse(tree.text(size).trim()));
        let src = self.scratch(|g| g.generate_node(url));
        let src = self.image_src(src);

        let style = match size {
            Some(size) => {
                let (height, width) = size.clamped(self.options.inline_image_max_height);
                format!(" style='height:{height}px;width:{width}px'")
            }
            None => String::new(),
        };
        self.emit(&format!(
            "<figure><picture><img class='content-img' src='{src}' alt='{alt}'{style}></picture>\
             <figcaption>{caption}</figcaption></figure>"
        ));
    }

    fn table(&mut self, node: &'t Node, row_size: usize) {
        let tree = self.tree;
        let cells: Vec<&'t Node> = tree.children(node).collect();
        if row_size == 0 {
            return;
        }

        self.emit("<table><thead><tr>");
        for &cell in cells.iter().take(row_size) {
            self.wrap("<th>", cell, "</th>");
        }
        self.emit("</tr></thead><tbody>");

        // The second row only holds alignment markers.
        let body = cells.iter().copied().enumerate().skip(2 * row_size);
        let mut open_row = false;
        for (i, cell) in body {
            if i % row_size == 0 {
                self.emit("<tr>");
                open_row = true;
            }
            self.wrap("<td>", cell, "</td>");
            if i % row_size == row_size - 1 {
                self.emit("</tr>");
                open_row = false;
            }
        }
        if open_row {
            self.emit("</tr>");
        }
        self.emit("</tbody></table>");
    }

    fn list(&mut self, node: &'t Node, ordered: bool) {
        if ordered {
            self.wrap("<ol>", node, "</ol>");
        } else {
            self.wrap("<ul>", node, "</ul>");
        }
    }

    fn list_item(&mut self, node: &'t Node, _ordered: bool, _depth: usize) {
        self.wrap("<li>", node, "</li>");
    }

    fn header(&mut self, node: &'t Node, level: usize, variant: HeaderVariant) {
        let [_, title] = fixed_children::<2>(self.tree, node);
        if variant != HeaderVariant::Plain {
            return;
        }

        let id = if self.options.heading_ids {
            let id = format!(" id='page-heading-{}'", self.heading_index);
            self.heading_index += 1;
            id
        } else {
            String::new()
        };
        self.emit(&format!("<h{level}{id} class='header-general'>"));
        self.generate_node(title);
        self.emit(&format!("</h{level}>"));
    }

    fn verbatim(&mut self, node: &'t Node) {
        let tree = self.tree;
        if node.child_count() == 0 {
            let code = tree.slice(node.start() + 1, node.end().saturating_sub(1));
            match self.context.find_reference(code) {
                Some(found) => self.emit(&format!(
                    "<a href='{}' class='link-code'>{}</a>",
                    found.link,
                    escape_html(found.name)
                )),
                None => self.emit(&format!("<code class='inline-code'>{}</code>", escape_html(code))),
            }
            return;
        }

        let [language, body] = fixed_children::<2>(tree, node);
        let language = tree.text(language);
        let code = tree.text(body);
        match language {
            "embed" => self.emit_raw(code),
            "exec" => self.emit(&format!(
                "<p class='exec-preview-title'>실행 결과</p><pre class='exec-preview'>{}</pre>",
                escape_html(code)
            )),
            "compiler-warning" => self.emit(&format!(
                "<p class='compiler-warning-title'><i class='xi-warning'></i>컴파일 오류</p>\
                 <pre class='compiler-warning'>{}</pre>",
                escape_html(code)
            )),
            name if PLAIN_CODE_CLASSES.contains(&name) => {
                self.emit(&format!("<pre class='{name}'>{}</pre>", escape_html(code)));
            }
            _ => self.highlighted_code(language, code),
        }
    }

    fn escape(&mut self, node: &'t Node) {
        let tree = self.tree;
        let escaped = tree.slice(node.start() + 1, node.end());
        self.emit_str_escaped(escaped);
    }

    fn command(&mut self, node: &'t Node, name: &'t str) {
        match name {
            "sidenote" => self.wrap("<aside class='sidenote'>", node, "</aside>"),
            "sc" => self.wrap("<span class='font-smallcaps'>", node, "</span>"),
            "serif" => self.wrap("<span class='font-serif-italic'>", node, "</span>"),
            "footnote" => self.wrap("<sup>", node, "</sup>"),
            "htmlonly" | "escape" => self.generate_children(node),
            "latexonly" => {}
            "tooltip" => {
                let [shown, tip] = fixed_children::<2>(self.tree, node);
                self.emit("<span class='page-tooltip' data-tooltip='");
                self.generate_node(tip);
                self.emit("' data-tooltip-position='bottom'>");
                self.generate_node(shown);
                self.emit("</span>");
            }
            "newline" => self.emit("<br>"),
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
        let (open, close) = if display { ("\\[", "\\]") } else { ("$", "$") };
        self.emit("<span class='math-latex'>");
        self.emit(open);
        self.emit_str_escaped(expr);
        self.emit(close);
        self.emit("</span>");
    }

    fn boxed(&mut self, node: &'t Node, name: &'t str) {
        let [_, body] = fixed_children::<2>(self.tree, node);
        match name {
            "note" => self.wrap("<div class='inline-note'>", body, "</div>"),
            "sidenote" => self.wrap("<aside class='sidenote'>", body, "</aside>"),
            "info-text" => self.wrap("<div class='info'>", body, "</div>"),
            "warning" => self.wrap("<div class='warning warning-text'>", body, "</div>"),
            "html-only" => self.generate_node(body),
            "latex-only" => {}
            name if name.starts_with(REF_BOX_PREFIX) => {}
            name if name.starts_with("lec-") => {
                let open = format!("<div class='{name}'>");
                self.wrap(&open, body, "</div>");
            }
            _ => self.generate_node(body),
        }
    }

    fn quote(&mut self, node: &'t Node) {
        self.wrap("<blockquote class='quote'>", node, "</blockquote>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::{ClassifiedSpan, CodeFormatter, SyntaxHighlighter};
    use crate::metadata::{Metadata, MetadataRepo};
    use crate::parse::parse;
    use pretty_assertions::assert_eq;

    fn html(md: &str) -> String {
        generate_html(&parse(md), &HtmlOptions::default(), &GeneratorContext::new())
    }

    fn html_with(md: &str, options: &HtmlOptions) -> String {
        generate_html(&parse(md), options, &GeneratorContext::new())
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(html("a<b>&c"), "<p>a&lt;b&gt;&amp;c</p>");
    }

    #[test]
    fn image_with_caption_and_clamped_size() {
        let options = HtmlOptions {
            inline_image_max_height: 100,
            ..HtmlOptions::default()
        };
        assert_eq!(
            html_with("![alt caption=*cap* size=200,400,200,400](a.png)", &options),
            "<p><figure><picture><img class='content-img' src='a.png' alt='alt ' \
             style='height:100px;width:200px'></picture><figcaption><span class='font-italic'>cap</span> \
             </figcaption></figure></p>"
        );
    }

    #[test]
    fn image_without_valid_size_has_no_style() {
        let options = HtmlOptions {
            absolute_image_path: true,
            ..HtmlOptions::default()
        };
        assert_eq!(
            html_with("![size=12x12](img/a.png)", &options),
            "<p><figure><picture><img class='content-img' src='/img/a.png' alt=''></picture>\
             <figcaption></figcaption></figure></p>"
        );
    }

    #[test]
    fn heading_ids_count_plain_headers_only() {
        assert_eq!(
            html("# a\n#@ skipped\n## b"),
            "<h1 id='page-heading-0' class='header-general'> a</h1><p>\n</p>\
             <p>\n</p><h2 id='page-heading-1' class='header-general'> b</h2>"
        );
    }

    #[test]
    fn heading_ids_can_be_turned_off() {
        let options = HtmlOptions {
            heading_ids: false,
            ..HtmlOptions::default()
        };
        assert_eq!(html_with("### header", &options), "<h3 class='header-general'> header</h3>");
    }

    #[test]
    fn plain_code_classes_are_not_highlighted() {
        assert_eq!(html("```info-term\n1 < 2\n```"), "<pre class='info-term'>1 &lt; 2\n</pre>");
        assert_eq!(
            html("```exec\n1 < 2\n```"),
            "<p class='exec-preview-title'>실행 결과</p><pre class='exec-preview'>1 &lt; 2\n</pre>"
        );
        assert_eq!(
            html("```compiler-warning\nerror\n```"),
            "<p class='compiler-warning-title'><i class='xi-warning'></i>컴파일 오류</p>\
             <pre class='compiler-warning'>error\n</pre>"
        );
        assert_eq!(html("```embed\n<b>x</b>\n```"), "<b>x</b>\n");
    }

    struct Keywords;

    impl SyntaxHighlighter for Keywords {
        fn highlight(&self, _language: &str, code: &str) -> Vec<ClassifiedSpan> {
            code.match_indices("int")
                .map(|(at, word)| ClassifiedSpan::new("k", at..at + word.len()))
                .collect()
        }
    }

    struct RenameX;

    impl CodeFormatter for RenameX {
        fn format(&self, language: &str, code: &str) -> Option<String> {
            (language == "cpp").then(|| code.replace("x", "y"))
        }
    }

    #[test]
    fn code_goes_through_formatter_and_highlighter() {
        let highlighter = Keywords;
        let formatter = RenameX;
        let context = GeneratorContext::new()
            .with_highlighter(&highlighter)
            .with_formatter(&formatter);
        let tree = parse("```cpp\nint x<1;\n```");
        assert_eq!(
            generate_html(&tree, &HtmlOptions::default(), &context),
            "<pre class='chroma lang-cpp'><span class='k'>int</span> y&lt;1;\n</pre>"
        );
    }

    #[test]
    fn boxes_by_name() {
        assert_eq!(html("```info-text\na\n```"), "<div class='info'><p>a</p></div>");
        assert_eq!(html("```lec-summary\na\n```"), "<div class='lec-summary'><p>a</p></div>");
        assert_eq!(html("```html-only\na\n```"), "<p>a</p>");
        assert_eq!(html("```latex-only\na\n```"), "");
    }

    #[test]
    fn referenced_box_renders_at_ref_site() {
        assert_eq!(
            html("```ref-x\n*hi*\n```\n\nsee \\ref{x}."),
            "<p>see <span class='font-italic'>hi</span>.</p>"
        );
    }

    #[test]
    fn commands() {
        assert_eq!(
            html("\\tooltip{word}{tip} \\sc{a}\\serif{b}\\footnote{c}\\newline\\latexonly{d}\\htmlonly{e}"),
            "<p><span class='page-tooltip' data-tooltip='tip' data-tooltip-position='bottom'>word</span> \
             <span class='font-smallcaps'>a</span><span class='font-serif-italic'>b</span><sup>c</sup>\
             <br>e</p>"
        );
    }

    #[test]
    fn math_strips_layout_prefix() {
        assert_eq!(
            html("$$1,2;a<b$$ \\[c\\]"),
            "<p><span class='math-latex'>$a&lt;b$</span> <span class='math-latex'>\\[c\\]</span></p>"
        );
    }

    #[test]
    fn quote_drops_markers() {
        assert_eq!(
            html("> a\n> *b*\n\nc"),
            "<blockquote class='quote'>a<span class='font-italic'>b</span></blockquote><p>\nc</p>"
        );
    }

    #[test]
    fn nested_list_follows_its_item() {
        assert_eq!(
            html("* a\n  * b\n* c"),
            "<ul><li><p>a</p></li><ul><li><p>b</p></li></ul><li><p>c</p></li></ul>"
        );
        assert_eq!(html("1. a\n2. b"), "<ol><li><p>a</p></li><li><p>b</p></li></ol>");
    }

    #[test]
    fn cross_references_from_metadata() {
        let mut repo = MetadataRepo::new();
        let vector = Metadata {
            path: "/cpp-reference/vector".into(),
            ref_names: vec!["std::vector".into()],
            ..Metadata::default()
        };
        repo.register("dump_1.md", vector).unwrap();
        let context = GeneratorContext::new().with_metadata(&repo);

        let tree = parse("`std::vector$vector` `int` [std::vector](/x)");
        assert_eq!(
            generate_html(&tree, &HtmlOptions::default(), &context),
            "<p><a href='1' class='link-code'>std::vector</a> <code class='inline-code'>int</code> \
             <a href='/x' class='link-code'>std::vector</a></p>"
        );
    }
}
