//! Front matter and the cross-reference repository built from it.
//!
//! A document may open with a `---` line, a run of `key : value` lines and a
//! closing `---` line. The repo maps file names to their metadata and every
//! declared reference name to the documents declaring it.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::MetadataError;

/// Parsed front matter of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub title: String,
    pub cat_title: String,
    pub path: String,
    pub publish_date: String,
    pub is_published: bool,
    pub chapter: String,
    pub next_page: String,
    /// Reference names this document answers to.
    pub ref_names: Vec<String>,
    /// Every `key : value` pair, recognised or not.
    pub fields: BTreeMap<String, String>,
}

/// Parse front matter at the start of `text`.
///
/// Returns the metadata and the offset right after the closing delimiter
/// line. Leading whitespace is skipped. Without a closing delimiter there is
/// no metadata at all.
pub fn parse_front_matter(text: &str) -> Option<(Metadata, usize)> {
    let start = text.len() - text.trim_start().len();
    if !text[start..].starts_with("---") {
        return None;
    }

    let mut current = start + text[start..].find('\n')? + 1;
    let mut metadata = Metadata::default();

    loop {
        let line_end = current + text.get(current..)?.find('\n')?;
        let line = &text[current..line_end];
        if line.starts_with("---") {
            return Some((metadata, line_end + 1));
        }

        if let Some((key, value)) = line.split_once(':') {
            let (key, value) = (key.trim(), value.trim());
            match key {
                "title" => metadata.title = value.to_string(),
                "cat_title" => metadata.cat_title = value.to_string(),
                "path" => metadata.path = value.to_string(),
                "chapter" => metadata.chapter = value.to_string(),
                "next_page" => metadata.next_page = value.to_string(),
                "publish_date" => metadata.publish_date = value.to_string(),
                "is_published" => metadata.is_published = value == "true",
                "ref_name" | "ref_title" => metadata.ref_names = split_ref_names(value),
                _ => {}
            }
            metadata.fields.insert(key.to_string(), value.to_string());
        }
        current = line_end + 1;
    }
}

/// Split off the front matter, returning it with the body that follows.
///
/// When there is no complete front matter the whole text is the body.
pub fn split_front_matter(text: &str) -> (Option<Metadata>, &str) {
    match parse_front_matter(text) {
        Some((metadata, end)) => (Some(metadata), &text[end..]),
        None => (None, text),
    }
}

/// Comma separated names. `\,` does not split and is kept as written.
fn split_ref_names(value: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = String::new();
    let mut prev = '\0';
    for c in value.chars() {
        if c == ',' && prev != '\\' {
            names.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
        prev = c;
    }
    names.push(current.trim().to_string());
    names
}

/// Read-only lookup table shared by every generation of a document set.
#[derive(Debug, Clone, Default)]
pub struct MetadataRepo {
    by_file: HashMap<String, Metadata>,
    /// Reference name to file names, in registration order.
    by_ref: HashMap<String, Vec<String>>,
}

/// A resolved cross reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef<'a> {
    /// Link target derived from the declaring file name.
    pub link: String,
    /// The reference name without any `$path` hint.
    pub name: &'a str,
}

impl MetadataRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the metadata of `filename`. A file can only be registered once.
    pub fn register(&mut self, filename: &str, metadata: Metadata) -> Result<(), MetadataError> {
        if self.by_file.contains_key(filename) {
            return Err(MetadataError::DuplicateFile(filename.to_string()));
        }
        for name in &metadata.ref_names {
            self.by_ref
                .entry(name.clone())
                .or_default()
                .push(filename.to_string());
        }
        self.by_file.insert(filename.to_string(), metadata);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }

    pub fn find_by_filename(&self, filename: &str) -> Option<&Metadata> {
        self.by_file.get(filename)
    }

    /// The first registered document declaring `reference`.
    pub fn find(&self, reference: &str) -> Option<(&str, &Metadata)> {
        let file = self.by_ref.get(reference)?.first()?;
        self.by_file.get(file).map(|m| (file.as_str(), m))
    }

    /// The first document declaring `reference` whose path contains `hint`.
    pub fn find_with_path_hint(&self, reference: &str, hint: &str) -> Option<(&str, &Metadata)> {
        self.by_ref
            .get(reference)?
            .iter()
            .filter_map(|file| self.by_file.get(file).map(|m| (file.as_str(), m)))
            .find(|(_, m)| m.path.contains(hint))
    }

    /// Resolve `name` or `name$hint` to a link.
    ///
    /// A leading `$` is not a hint separator, so `$(VAR)` stays one name.
    pub fn find_reference<'a>(&self, text: &'a str) -> Option<ResolvedRef<'a>> {
        let (name, hint) = match text.find('$') {
            Some(delim) if delim > 0 => (&text[..delim], Some(&text[delim + 1..])),
            _ => (text, None),
        };

        let (file, _) = match hint {
            Some(hint) if !hint.is_empty() => self.find_with_path_hint(name, hint)?,
            _ => self.find(name)?,
        };

        let file = file.strip_prefix("dump_").unwrap_or(file);
        let file = match file.strip_suffix(".md") {
            Some(stem) if !stem.is_empty() => stem,
            _ => file,
        };
        Some(ResolvedRef {
            link: file.to_string(),
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FRONT: &str = "\n\n---\ntitle : some title\ncat_title: cat\npath : /a/b\npublish_date : 2020-01-01\nis_published : true\nref_name : vector, push\\,back ,list\nfoo : bar: baz\n---\nbody";

    #[test]
    fn parses_known_fields() {
        let (metadata, end) = parse_front_matter(FRONT).unwrap();
        assert_eq!(metadata.title, "some title");
        assert_eq!(metadata.cat_title, "cat");
        assert_eq!(metadata.path, "/a/b");
        assert_eq!(metadata.publish_date, "2020-01-01");
        assert!(metadata.is_published);
        assert_eq!(metadata.ref_names, vec!["vector", "push\\,back", "list"]);
        assert_eq!(metadata.fields["foo"], "bar: baz");
        assert_eq!(&FRONT[end..], "body");
    }

    #[test]
    fn long_delimiters_and_padded_values() {
        let text = "\n----------------\ntitle : some title abc  \ncat_title :   cat title\n----------------\n";
        let (metadata, end) = parse_front_matter(text).unwrap();
        assert_eq!(metadata.title, "some title abc");
        assert_eq!(metadata.cat_title, "cat title");
        assert_eq!(metadata.fields["title"], "some title abc");
        assert_eq!(end, text.len());
    }

    #[test]
    fn ref_names_are_trimmed() {
        let text = "----------------\nref_name : string, std::string, std::string_view,  string_view\n----------------\n";
        let (metadata, _) = parse_front_matter(text).unwrap();
        assert_eq!(
            metadata.ref_names,
            vec!["string", "std::string", "std::string_view", "string_view"]
        );
    }

    #[test]
    fn closing_delimiter_needs_its_newline() {
        assert_eq!(parse_front_matter("---\ntitle : a\n---"), None);
        let (metadata, end) = parse_front_matter("---\ntitle : a\n---\n").unwrap();
        assert_eq!((metadata.title.as_str(), end), ("a", 18));
    }

    #[test]
    fn two_dashes_are_not_a_delimiter() {
        assert_eq!(parse_front_matter("--\ntitle : a\n--\n"), None);
    }

    #[test]
    fn published_flag_is_strict() {
        let (metadata, _) = parse_front_matter("---\nis_published : yes\n---\n").unwrap();
        assert!(!metadata.is_published);
    }

    #[test]
    fn missing_close_means_no_metadata() {
        let text = "---\ntitle : a\nbody without close";
        assert_eq!(parse_front_matter(text), None);
        let (metadata, body) = split_front_matter(text);
        assert!(metadata.is_none());
        assert_eq!(body, text);
    }

    #[test]
    fn text_without_front_matter() {
        assert_eq!(parse_front_matter("# title\n---\n"), None);
    }

    fn repo() -> MetadataRepo {
        let mut repo = MetadataRepo::new();
        let vector = Metadata {
            path: "/cpp-reference/vector".into(),
            ref_names: vec!["find".into(), "vector".into()],
            ..Metadata::default()
        };
        let algorithm = Metadata {
            path: "/cpp-reference/algorithm".into(),
            ref_names: vec!["find".into()],
            ..Metadata::default()
        };
        repo.register("dump_123.md", vector).unwrap();
        repo.register("456.md", algorithm).unwrap();
        repo
    }

    #[test]
    fn duplicate_file_is_rejected() {
        let mut repo = repo();
        assert_eq!(
            repo.register("456.md", Metadata::default()),
            Err(MetadataError::DuplicateFile("456.md".into()))
        );
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn one_reference_many_documents() {
        let repo = repo();
        assert_eq!(repo.find("find").map(|(f, _)| f), Some("dump_123.md"));
        assert_eq!(
            repo.find_with_path_hint("find", "algorithm").map(|(f, _)| f),
            Some("456.md")
        );
        assert!(repo.find_with_path_hint("find", "string").is_none());
        assert!(repo.find_by_filename("456.md").is_some());
    }

    #[test]
    fn reference_link_strips_file_decorations() {
        let repo = repo();
        let found = repo.find_reference("vector").unwrap();
        assert_eq!((found.link.as_str(), found.name), ("123", "vector"));

        let hinted = repo.find_reference("find$algorithm").unwrap();
        assert_eq!((hinted.link.as_str(), hinted.name), ("456", "find"));

        assert!(repo.find_reference("$(VAR)").is_none());
        assert!(repo.find_reference("nothing").is_none());
    }
}
