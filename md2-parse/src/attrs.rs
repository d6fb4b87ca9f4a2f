//! Image description arguments.
//!
//! An image description is free text with optional `alt=`, `caption=` and
//! `size=` arguments. Text before the first argument is the implicit alt text.

use serde::Serialize;

use crate::types::ImageKeyword;

/// One keyword value, as a byte range relative to the description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordSpan {
    pub keyword: ImageKeyword,
    pub start: usize,
    pub end: usize,
}

/// Split an image description into keyword value ranges, in source order.
///
/// A keyword is only recognised at the start of the description or right
/// after whitespace. Each value runs to the next keyword. Later duplicates
/// of a keyword are dropped.
pub fn split_keywords(desc: &str) -> Vec<KeywordSpan> {
    let bytes = desc.as_bytes();
    let mut markers: Vec<(ImageKeyword, usize, usize)> = Vec::new();

    let mut pos = 0;
    while pos < bytes.len() {
        let boundary = pos == 0 || bytes[pos - 1].is_ascii_whitespace();
        if boundary {
            if let Some(keyword) = ImageKeyword::ALL
                .into_iter()
                .find(|k| desc[pos..].starts_with(k.prefix()))
            {
                let value_start = pos + keyword.prefix().len();
                markers.push((keyword, pos, value_start));
                pos = value_start;
                continue;
            }
        }
        pos += 1;
    }

    let mut spans = Vec::new();
    let leading_end = markers.first().map_or(desc.len(), |m| m.1);
    let explicit_alt = markers.iter().any(|m| m.0 == ImageKeyword::Alt);
    if leading_end > 0 && !explicit_alt && !desc[..leading_end].trim().is_empty() {
        spans.push(KeywordSpan {
            keyword: ImageKeyword::Alt,
            start: 0,
            end: leading_end,
        });
    }

    for (index, &(keyword, _, value_start)) in markers.iter().enumerate() {
        if spans.iter().any(|s| s.keyword == keyword) {
            continue;
        }
        let end = markers.get(index + 1).map_or(desc.len(), |next| next.1);
        spans.push(KeywordSpan {
            keyword,
            start: value_start,
            end,
        });
    }
    spans
}

/// Crop and offset fields of the long size form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageCrop {
    pub x: u32,
    pub y: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
    pub top: u32,
}

/// Parsed `size=` hint.
///
/// `H,W,OriH,OriW` or `H,W,OriH,OriW,X,Y,Bottom,Left,Right,Top`. Any other
/// field count, or a field that is not a number, means no hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    pub height: u32,
    pub width: u32,
    pub original_height: u32,
    pub original_width: u32,
    pub crop: Option<ImageCrop>,
}

impl ImageSize {
    pub fn parse(hint: &str) -> Option<ImageSize> {
        let fields = hint
            .split(',')
            .map(|f| f.trim().parse::<u32>().ok())
            .collect::<Option<Vec<u32>>>()?;

        let crop = match fields.len() {
            4 => None,
            10 => Some(ImageCrop {
                x: fields[4],
                y: fields[5],
                bottom: fields[6],
                left: fields[7],
                right: fields[8],
                top: fields[9],
            }),
            _ => return None,
        };

        Some(ImageSize {
            height: fields[0],
            width: fields[1],
            original_height: fields[2],
            original_width: fields[3],
            crop,
        })
    }

    /// Display size after clamping the height to `max_height`.
    ///
    /// A `max_height` of zero disables clamping. The width is scaled by the
    /// same factor so the aspect ratio is kept.
    pub fn clamped(&self, max_height: u32) -> (u32, u32) {
        if max_height == 0 || self.height <= max_height {
            return (self.height, self.width);
        }
        let width = (u64::from(self.width) * u64::from(max_height) / u64::from(self.height)) as u32;
        (max_height, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn named<'a>(desc: &'a str, spans: &[KeywordSpan]) -> Vec<(ImageKeyword, &'a str)> {
        spans.iter().map(|s| (s.keyword, &desc[s.start..s.end])).collect()
    }

    #[test]
    fn leading_text_becomes_alt() {
        let desc = "alttext caption=cap size=123x123";
        assert_eq!(
            named(desc, &split_keywords(desc)),
            vec![
                (ImageKeyword::Alt, "alttext "),
                (ImageKeyword::Caption, "cap "),
                (ImageKeyword::Size, "123x123"),
            ]
        );
    }

    #[test]
    fn keyword_needs_word_boundary() {
        let desc = "xcaption=a caption=b";
        assert_eq!(
            named(desc, &split_keywords(desc)),
            vec![(ImageKeyword::Alt, "xcaption=a "), (ImageKeyword::Caption, "b")]
        );
    }

    #[test]
    fn explicit_alt_wins_over_leading_text() {
        let desc = "ignored alt=real";
        assert_eq!(named(desc, &split_keywords(desc)), vec![(ImageKeyword::Alt, "real")]);
    }

    #[test]
    fn size_arity() {
        assert_eq!(ImageSize::parse("123x123"), None);
        assert_eq!(ImageSize::parse("1,2"), None);
        assert_eq!(ImageSize::parse("1,2,3,4,5"), None);
        let short = ImageSize::parse("100, 50, 200, 100").unwrap();
        assert_eq!((short.height, short.width, short.crop), (100, 50, None));
        let long = ImageSize::parse("1,2,3,4,5,6,7,8,9,10").unwrap();
        assert_eq!(long.crop.unwrap().top, 10);
    }

    #[test]
    fn clamp_keeps_aspect_ratio() {
        let size = ImageSize::parse("400,300,400,300").unwrap();
        assert_eq!(size.clamped(0), (400, 300));
        assert_eq!(size.clamped(500), (400, 300));
        assert_eq!(size.clamped(200), (200, 150));
    }
}
