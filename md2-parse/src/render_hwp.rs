//! HWP (HWPML) body backend.
//!
//! Emits `<P>` paragraphs for the body section of an HWPML document. The
//! caller owns the surrounding document and the binary item table, so object
//! ids are threaded in and handed back through [`HwpIds`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attrs::ImageSize;
use crate::blocks::REF_BOX_PREFIX;
use crate::logging::{Level, LogSink};
use crate::render::{Generator, GeneratorContext, RenderState, fixed_children};
use crate::types::{HeaderVariant, ImageKeyword, Node, NodeKind, ParseTree};

/// Paragraph and character styles for one kind of paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwpEntryStyle {
    pub entry_name: String,
    pub para_shape: u32,
    pub para_style: u32,
    pub char_shape: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HwpOptions {
    /// Looked up by name: `problem_start` for the first paragraph, `default` after.
    pub entries: Vec<HwpEntryStyle>,
}

impl HwpOptions {
    fn entry(&self, name: &str) -> Option<&HwpEntryStyle> {
        self.entries.iter().find(|e| e.entry_name == name)
    }
}

/// Next free object ids of the target document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwpIds {
    pub inst_id: u32,
    pub z_order: u32,
    pub bin_item: u32,
}

impl Default for HwpIds {
    fn default() -> Self {
        HwpIds {
            inst_id: 1,
            z_order: 1,
            bin_item: 1,
        }
    }
}

/// Open structural elements, innermost last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwpContext {
    /// Carries the regular char shape of the paragraph.
    Paragraph(u32),
    /// An open `<TEXT><CHAR>` run with this char shape.
    Text(u32),
    /// A `<TEXT CharShape="0">` holding an embedded object.
    Object,
    Table,
    Row,
    Cell,
}

impl HwpContext {
    fn closing_tag(self) -> &'static str {
        match self {
            HwpContext::Paragraph(_) => "</P>",
            HwpContext::Text(_) => "</CHAR></TEXT>",
            HwpContext::Object => "</TEXT>",
            HwpContext::Table => "</TABLE>",
            HwpContext::Row => "</ROW>",
            HwpContext::Cell => "</PARALIST></CELL>",
        }
    }
}

const FALLBACK_STYLE: (u32, u32, u32) = (0, 0, 1);
const BOLD_SHAPE: u32 = 7;
const ITALIC_SHAPE: u32 = 8;
const BOLD_ITALIC_SHAPE: u32 = 9;

const INLINE_POSITION: &str = r#"<POSITION AffectLSpacing="false" AllowOverlap="false" FlowWithText="true" HoldAnchorAndSO="false" HorzAlign="Left" HorzOffset="0" HorzRelTo="Para" TreatAsChar="true" VertAlign="Top" VertOffset="0" VertRelTo="Para"/>"#;

const RENDERING_INFO: &str = r#"<RENDERINGINFO><TRANSMATRIX E1="1.00000" E2="0.00000" E3="0.00000" E4="0.00000" E5="1.00000" E6="0.00000"/><SCAMATRIX E1="0.80000" E2="0.00000" E3="0.00000" E4="0.00000" E5="0.80000" E6="0.00000"/><ROTMATRIX E1="1.00000" E2="0.00000" E3="0.00000" E4="0.00000" E5="1.00000" E6="0.00000"/></RENDERINGINFO>"#;

/// Render a parsed document as HWPML paragraphs, advancing `ids` past every
/// object it creates.
pub fn generate_hwp(
    tree: &ParseTree,
    options: &HwpOptions,
    ids: &mut HwpIds,
    context: &GeneratorContext<'_>,
) -> String {
    let mut generator = HwpGenerator::new(tree, options, *ids, *context);
    let output = generator.generate();
    *ids = generator.ids;
    output
}

fn escape_hwp_char(c: char, out: &mut String) {
    match c {
        '\t' => out.push_str("<TAB/>"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&apos;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '&' => out.push_str("&amp;"),
        _ => out.push(c),
    }
}

fn escape_hwp(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        escape_hwp_char(c, &mut out);
    }
    out
}

/// `H,W` with both fields numeric.
fn parse_dimensions(s: &str) -> Option<(u32, u32)> {
    let (height, width) = s.split_once(',')?;
    Some((height.trim().parse().ok()?, width.trim().parse().ok()?))
}

pub struct HwpGenerator<'t, 'c> {
    tree: &'t ParseTree,
    options: &'c HwpOptions,
    context: GeneratorContext<'c>,
    state: RenderState,
    ids: HwpIds,
    contexts: Vec<HwpContext>,
    paragraphs: usize,
    bold: usize,
    italic: usize,
}

impl<'t, 'c> HwpGenerator<'t, 'c> {
    pub fn new(tree: &'t ParseTree, options: &'c HwpOptions, ids: HwpIds, context: GeneratorContext<'c>) -> Self {
        HwpGenerator {
            tree,
            options,
            context,
            state: RenderState::default(),
            ids,
            contexts: Vec::new(),
            paragraphs: 0,
            bold: 0,
            italic: 0,
        }
    }

    fn push_context(&mut self, context: HwpContext, open: &str) {
        self.emit(open);
        self.contexts.push(context);
    }

    /// Close every element opened above `depth`.
    fn close_to(&mut self, depth: usize) {
        while self.contexts.len() > depth {
            if let Some(context) = self.contexts.pop() {
                self.emit(context.closing_tag());
            }
        }
    }

    fn close_run(&mut self) {
        if matches!(self.contexts.last(), Some(HwpContext::Text(_))) {
            self.close_to(self.contexts.len() - 1);
        }
    }

    fn open_paragraph(&mut self) {
        let name = if self.paragraphs == 0 { "problem_start" } else { "default" };
        let (para_shape, para_style, char_shape) = self
            .options
            .entry(name)
            .or_else(|| self.options.entry("default"))
            .map_or(FALLBACK_STYLE, |e| (e.para_shape, e.para_style, e.char_shape));
        self.paragraphs += 1;
        self.push_context(
            HwpContext::Paragraph(char_shape),
            &format!(r#"<P ParaShape="{para_shape}" Style="{para_style}">"#),
        );
    }

    fn ensure_paragraph(&mut self) {
        if !matches!(
            self.contexts.last(),
            Some(HwpContext::Paragraph(_) | HwpContext::Text(_))
        ) {
            self.open_paragraph();
        }
    }

    /// Run `f` inside a paragraph, opening one if none is open.
    fn in_paragraph<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let depth = self.contexts.len();
        self.ensure_paragraph();
        f(self);
        self.close_to(depth);
    }

    fn char_shape(&self) -> u32 {
        match (self.bold > 0, self.italic > 0) {
            (true, true) => BOLD_ITALIC_SHAPE,
            (true, false) => BOLD_SHAPE,
            (false, true) => ITALIC_SHAPE,
            (false, false) => self
                .contexts
                .iter()
                .rev()
                .find_map(|c| match c {
                    HwpContext::Paragraph(shape) => Some(*shape),
                    _ => None,
                })
                .unwrap_or(FALLBACK_STYLE.2),
        }
    }

    /// Make sure a run with the current char shape is open.
    fn ensure_run(&mut self) {
        self.ensure_paragraph();
        let shape = self.char_shape();
        match self.contexts.last().copied() {
            Some(HwpContext::Text(open)) if open == shape => return,
            Some(HwpContext::Text(_)) => self.close_run(),
            _ => {}
        }
        self.push_context(
            HwpContext::Text(shape),
            &format!(r#"<TEXT CharShape="{shape}"><CHAR>"#),
        );
    }

    /// Emit `xml` as an embedded object of the current paragraph.
    fn object(&mut self, xml: &str) {
        self.close_run();
        let depth = self.contexts.len();
        self.ensure_paragraph();
        self.push_context(HwpContext::Object, r#"<TEXT CharShape="0">"#);
        self.emit(xml);
        self.close_to(depth);
    }

    fn equation(&mut self, layout: Option<(u32, u32)>, expr: &str) {
        let (height, width) = layout.unwrap_or((0, 0));
        let (inst_id, z_order) = (self.ids.inst_id, self.ids.z_order);
        self.ids.inst_id += 1;
        self.ids.z_order += 1;

        let xml = format!(
            r#"<EQUATION BaseLine="86" BaseUnit="1000" LineMode="false" TextColor="0" Version="Equation Version 60"><SHAPEOBJECT InstId="{inst_id}" Lock="false" NumberingType="Equation" TextFlow="BothSides" ZOrder="{z_order}"><SIZE Height="{height}" HeightRelTo="Absolute" Protect="false" Width="{width}" WidthRelTo="Absolute"/>{INLINE_POSITION}<OUTSIDEMARGIN Bottom="0" Left="56" Right="56" Top="0"/><SHAPECOMMENT>수식입니다.</SHAPECOMMENT></SHAPEOBJECT><SCRIPT>{}</SCRIPT></EQUATION>"#,
            escape_hwp(expr)
        );
        self.object(&xml);
    }

    fn picture(&mut self, size: ImageSize) {
        let ImageSize {
            height: h,
            width: w,
            original_height: oh,
            original_width: ow,
            crop,
        } = size;
        let (x, y, clip) = match crop {
            Some(c) => (c.x, c.y, (c.bottom, c.left, c.right, c.top)),
            None => (0, 0, (h, 0, w, 0)),
        };
        let (clip_bottom, clip_left, clip_right, clip_top) = clip;

        let inst_id = self.ids.inst_id;
        let component_id = inst_id + 1;
        let z_order = self.ids.z_order;
        let bin_item = self.ids.bin_item;
        self.ids.inst_id += 2;
        self.ids.z_order += 1;
        self.ids.bin_item += 1;

        let center_x = w / 2;
        let center_y = h / 2;
        let xml = format!(
            r#"<PICTURE Reverse="false"><SHAPEOBJECT InstId="{inst_id}" Lock="false" NumberingType="Figure" ZOrder="{z_order}"><SIZE Height="{h}" HeightRelTo="Absolute" Protect="false" Width="{w}" WidthRelTo="Absolute"/>{INLINE_POSITION}<OUTSIDEMARGIN Bottom="0" Left="0" Right="0" Top="0"/><SHAPECOMMENT></SHAPECOMMENT></SHAPEOBJECT><SHAPECOMPONENT CurHeight="{h}" CurWidth="{w}" GroupLevel="0" HorzFlip="false" InstID="{component_id}" OriHeight="{oh}" OriWidth="{ow}" VertFlip="false" XPos="{x}" YPos="{y}"><ROTATIONINFO Angle="0" CenterX="{center_x}" CenterY="{center_y}" Rotate="1"/>{RENDERING_INFO}</SHAPECOMPONENT><IMAGERECT X0="0" X1="{w}" X2="{w}" X3="0" Y0="0" Y1="0" Y2="{h}" Y3="{h}"/><IMAGECLIP Bottom="{clip_bottom}" Left="{clip_left}" Right="{clip_right}" Top="{clip_top}"/><INSIDEMARGIN Bottom="0" Left="0" Right="0" Top="0"/><IMAGEDIM Height="{oh}" Width="{ow}"/><IMAGE Alpha="0" BinItem="{bin_item}" Bright="0" Contrast="0" Effect="RealPic"/><EFFECTS/></PICTURE>"#
        );
        self.object(&xml);
    }

    fn table_row(&mut self, row: usize, cells: &[&'t Node]) {
        let depth = self.contexts.len();
        self.push_context(HwpContext::Row, "<ROW>");
        for (column, &cell) in cells.iter().enumerate() {
            let cell_depth = self.contexts.len();
            self.push_context(
                HwpContext::Cell,
                &format!(
                    r#"<CELL BorderFill="2" ColAddr="{column}" ColSpan="1" RowAddr="{row}" RowSpan="1"><PARALIST LineWrap="Break" TextDirection="0" VertAlign="Center">"#
                ),
            );
            if cell.child_count() == 0 {
                self.open_paragraph();
            } else {
                self.generate_node(cell);
            }
            self.close_to(cell_depth);
        }
        self.close_to(depth);
    }
}

impl<'t> Generator<'t> for HwpGenerator<'t, '_> {
    fn tree(&self) -> &'t ParseTree {
        self.tree
    }

    fn state(&mut self) -> &mut RenderState {
        &mut self.state
    }

    fn sink(&self) -> &dyn LogSink {
        self.context.sink
    }

    /// Every expansion draws fresh object ids.
    fn caches_references(&self) -> bool {
        false
    }

    fn emit_char(&mut self, c: char) {
        self.ensure_run();
        escape_hwp_char(c, self.state.targets.current());
    }

    fn root(&mut self, node: &'t Node) {
        self.generate_children(node);
        self.close_to(0);
    }

    fn group(&mut self, node: &'t Node) {
        // A reference body is pasted as finished XML, so it must come out balanced.
        let is_reference_body = self
            .tree
            .parent(node)
            .is_some_and(|p| matches!(p.kind(), NodeKind::Box { name } if name.starts_with(REF_BOX_PREFIX)));
        let depth = self.contexts.len();
        self.generate_children(node);
        if is_reference_body {
            self.close_to(depth);
        }
    }

    fn paragraph(&mut self, node: &'t Node) {
        if node.start() >= node.end() {
            return;
        }
        self.in_paragraph(|g| g.generate_inner(node, 0, 0));
    }

    fn text(&mut self, node: &'t Node) {
        self.generate_inner(node, 0, 0);
    }

    fn bold(&mut self, node: &'t Node) {
        self.bold += 1;
        self.generate_inner(node, 0, 0);
        self.bold -= 1;
    }

    fn italic(&mut self, node: &'t Node) {
        self.italic += 1;
        self.generate_inner(node, 0, 0);
        self.italic -= 1;
    }

    fn strike_through(&mut self, node: &'t Node) {
        self.generate_inner(node, 2, 2);
    }

    fn link(&mut self, node: &'t Node) {
        let [desc, _] = fixed_children::<2>(self.tree, node);
        self.generate_node(desc);
    }

    fn image(&mut self, node: &'t Node, keywords: &'t BTreeMap<ImageKeyword, usize>) {
        let tree = self.tree;
        let [desc, url] = fixed_children::<2>(tree, node);
        let hint = keywords
            .get(&ImageKeyword::Size)
            .and_then(|&index| tree.child(desc, index))
            .and_then(|size| ImageSize::parse(tree.text(size).trim()));
        let url = tree.text(url).trim();
        let size = hint.or_else(|| {
            parse_dimensions(url).map(|(height, width)| ImageSize {
                height,
                width,
                original_height: height,
                original_width: width,
                crop: None,
            })
        });

        match size {
            Some(size) => self.picture(size),
            None => self
                .context
                .sink
                .log(Level::WARN, &format!("image '{url}' has no size hint; skipped")),
        }
    }

    fn table(&mut self, node: &'t Node, row_size: usize) {
        if row_size == 0 {
            return;
        }
        let cells: Vec<&'t Node> = self.tree.children(node).collect();
        let body = cells.get(2 * row_size..).unwrap_or_default();
        let rows = 1 + body.len().div_ceil(row_size);

        let inst_id = self.ids.inst_id;
        let z_order = self.ids.z_order;
        self.ids.inst_id += 1;
        self.ids.z_order += 1;

        self.close_run();
        let depth = self.contexts.len();
        self.ensure_paragraph();
        self.push_context(HwpContext::Object, r#"<TEXT CharShape="0">"#);
        self.push_context(
            HwpContext::Table,
            &format!(
                r#"<TABLE BorderFill="2" CellSpacing="0" ColCount="{row_size}" PageBreak="Cell" RepeatHeader="true" RowCount="{rows}"><SHAPEOBJECT InstId="{inst_id}" Lock="false" NumberingType="Table" TextWrap="TopAndBottom" ZOrder="{z_order}"><SIZE Height="0" HeightRelTo="Absolute" Protect="false" Width="0" WidthRelTo="Absolute"/>{INLINE_POSITION}<OUTSIDEMARGIN Bottom="0" Left="0" Right="0" Top="0"/></SHAPEOBJECT><INSIDEMARGIN Bottom="141" Left="510" Right="510" Top="141"/>"#
            ),
        );
        self.table_row(0, &cells[..row_size.min(cells.len())]);
        for (row, chunk) in body.chunks(row_size).enumerate() {
            self.table_row(row + 1, chunk);
        }
        self.close_to(depth);
    }

    fn list_item(&mut self, node: &'t Node, _ordered: bool, _depth: usize) {
        self.in_paragraph(|g| g.generate_children(node));
    }

    fn header(&mut self, node: &'t Node, _level: usize, variant: HeaderVariant) {
        let [_, title] = fixed_children::<2>(self.tree, node);
        if variant != HeaderVariant::Plain {
            return;
        }
        self.in_paragraph(|g| {
            g.bold += 1;
            g.generate_node(title);
            g.bold -= 1;
        });
    }

    fn verbatim(&mut self, node: &'t Node) {
        let tree = self.tree;
        if node.child_count() == 0 {
            let code = tree.slice(node.start() + 1, node.end().saturating_sub(1));
            self.emit_str_escaped(code);
            return;
        }

        let [_, body] = fixed_children::<2>(tree, node);
        for line in tree.text(body).lines() {
            self.in_paragraph(|g| g.emit_str_escaped(line));
        }
    }

    fn escape(&mut self, node: &'t Node) {
        let tree = self.tree;
        self.emit_str_escaped(tree.slice(node.start() + 1, node.end()));
    }

    fn command(&mut self, node: &'t Node, name: &'t str) {
        match name {
            "htmlonly" | "latexonly" => {}
            "tooltip" => {
                let [shown, _] = fixed_children::<2>(self.tree, node);
                self.generate_node(shown);
            }
            "newline" => {
                self.ensure_run();
                self.emit("<LINEBREAK/>");
            }
            "ref" => {
                let tree = self.tree;
                let [arg] = fixed_children::<1>(tree, node);
                self.close_run();
                let body = self.generate_reference(tree.text(arg).trim());
                self.emit(&body);
            }
            _ => self.generate_children(node),
        }
    }

    fn math(&mut self, _node: &'t Node, _display: bool, layout: Option<(u32, u32)>, expr: &'t str) {
        self.equation(layout, expr);
    }

    fn boxed(&mut self, node: &'t Node, name: &'t str) {
        let [_, body] = fixed_children::<2>(self.tree, node);
        match name {
            "html-only" | "latex-only" => {}
            name if name.starts_with(REF_BOX_PREFIX) => {}
            _ => self.generate_node(body),
        }
    }

    fn quote(&mut self, node: &'t Node) {
        let tree = self.tree;
        for line in tree.children(node) {
            self.in_paragraph(|g| g.generate_node(line));
        }
    }
}
