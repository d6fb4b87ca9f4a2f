//! WASM bindings for `md2-parse`.
//!
//! Exposes the md2 parser and generators to JavaScript via wasm-bindgen.
//! Options objects are plain JS objects shaped like the Rust option structs;
//! omitted fields take their defaults.

use md2_parse::{HtmlOptions, HwpIds, HwpOptions, LatexOptions, split_front_matter};
use serde::Serialize;
use wasm_bindgen::prelude::*;

fn decode_options<T>(value: JsValue) -> Result<T, JsError>
where
    T: Default + serde::de::DeserializeOwned,
{
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(|e| JsError::new(&e.to_string()))
}

/// Parse an md2 string and return the parse tree as JSON.
///
/// Returns `{ metadata, tree }`. Node spans are byte offsets into the body
/// that follows the front matter.
#[wasm_bindgen]
pub fn parse(input: &str) -> String {
    let (metadata, body) = split_front_matter(input);
    let tree = md2_parse::parse(body);
    serde_json::json!({
        "metadata": metadata,
        "tree": tree,
    })
    .to_string()
}

/// Render an md2 string as an HTML fragment.
#[wasm_bindgen]
pub fn markdown_to_html(input: &str, options: JsValue) -> Result<String, JsError> {
    let options: HtmlOptions = decode_options(options)?;
    let (_, body) = split_front_matter(input);
    let tree = md2_parse::parse(body);
    Ok(md2_parse::generate_html(&tree, &options, &Default::default()))
}

/// Render an md2 string as a LaTeX body.
#[wasm_bindgen]
pub fn markdown_to_latex(input: &str, options: JsValue) -> Result<String, JsError> {
    let options: LatexOptions = decode_options(options)?;
    let (_, body) = split_front_matter(input);
    Ok(md2_parse::to_latex(body, &options))
}

#[derive(Serialize)]
struct HwpConversion {
    output: String,
    ids: HwpIds,
}

/// Render an md2 string as HWPML paragraphs.
///
/// `ids` holds the next free object ids; the result carries the output and
/// the ids to use for the next document.
#[wasm_bindgen]
pub fn markdown_to_hwp(input: &str, options: JsValue, ids: JsValue) -> Result<JsValue, JsError> {
    let options: HwpOptions = decode_options(options)?;
    let mut ids: HwpIds = decode_options(ids)?;
    let (_, body) = split_front_matter(input);
    let output = md2_parse::to_hwp(body, &options, &mut ids);
    serde_wasm_bindgen::to_value(&HwpConversion { output, ids }).map_err(|e| JsError::new(&e.to_string()))
}

/// Answer one conversion service request body.
#[wasm_bindgen]
pub fn handle_request(body: &str) -> String {
    md2_parse::service::handle_raw(body)
}
