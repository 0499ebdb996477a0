//! Content Scanner
//!
//! Finds image references in post HTML without building a DOM, so markup that
//! isn't touched comes back byte-for-byte. Each reference shape has its own
//! pass (img `src`, img `srcset`, anchor `href`, CSS `url()`); every pass reads
//! the original text and yields span edits, which are spliced in once at the
//! end. Replacement text is never scanned again.

use regex::{Captures, Match, Regex};
use std::ops::Range;
use std::sync::LazyLock;

use crate::host_rewriter::{HostRewriter, RewriteMode};

pub(crate) static IMG_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\s[^>]*>").expect("valid img tag pattern"));

static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\s[^>]*>.*?</a>").expect("valid anchor pattern"));

/// One attribute: name, then an optional double-quoted, single-quoted or bare value.
/// Matches are consumed left to right, so text inside a quoted value is never read as a name.
static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("valid attribute pattern")
});

static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^"'()\s]*))\s*\)"#).expect("valid css url pattern")
});

/// An attribute found in a tag; offsets are relative to the tag text
pub(crate) struct Attribute<'t> {
    /// End of the whole attribute, past any closing quote
    pub end: usize,
    pub value: Option<Match<'t>>,
}

/// The first attribute called `name` (case-insensitive) in `tag`
pub(crate) fn find_attribute<'t>(tag: &'t str, name: &str) -> Option<Attribute<'t>> {
    ATTRIBUTE_RE
        .captures_iter(tag)
        .find(|caps| caps.get(1).is_some_and(|n| n.as_str().eq_ignore_ascii_case(name)))
        .map(|caps| Attribute {
            end: caps.get(0).map_or(0, |m| m.end()),
            value: quoted_value(&caps, 2),
        })
}

/// Whichever of the double-quoted, single-quoted or bare groups starting at `first` matched
fn quoted_value<'t>(caps: &Captures<'t>, first: usize) -> Option<Match<'t>> {
    caps.get(first)
        .or_else(|| caps.get(first + 1))
        .or_else(|| caps.get(first + 2))
}

/// Replace `range` of the original text with `replacement`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

/// Apply edits from the highest offset down so earlier offsets stay valid.
/// An edit that overlaps one already applied is dropped.
pub(crate) fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    if edits.is_empty() {
        return text.to_string();
    }

    edits.sort_by(|a, b| b.range.start.cmp(&a.range.start).then(b.range.end.cmp(&a.range.end)));

    let mut result = text.to_string();
    let mut applied_from = text.len();
    for edit in edits {
        if edit.range.end > applied_from {
            tracing::debug!("Content rewrite: dropping overlapping edit at {:?}", edit.range);
            continue;
        }
        result.replace_range(edit.range.clone(), &edit.replacement);
        applied_from = edit.range.start;
    }

    result
}

/// Rewrite every local image reference in `html` to the CDN.
pub fn rewrite_content(html: &str, rewriter: &HostRewriter<'_>) -> String {
    let mut edits = Vec::new();
    edits.extend(src_edits(html, rewriter));
    edits.extend(srcset_edits(html, rewriter));
    edits.extend(href_edits(html, rewriter));
    edits.extend(css_url_edits(html, rewriter));

    if edits.is_empty() {
        tracing::debug!("Content rewrite: no images to rewrite");
        return html.to_string();
    }

    tracing::info!("Content rewrite: {} references rewritten to {}", edits.len(), rewriter.cdn().host);
    apply_edits(html, edits)
}

/// An edit for the URL at `range`, if rewriting changes it
fn rewrite_span(url: &str, range: Range<usize>, rewriter: &HostRewriter<'_>) -> Option<Edit> {
    if url.is_empty() || url.starts_with("data:") {
        return None;
    }
    match rewriter.rewrite(url, RewriteMode::Content) {
        Ok(rewritten) if rewritten != url => Some(Edit {
            range,
            replacement: rewritten,
        }),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!("Content rewrite: leaving {} unchanged ({})", url, err);
            None
        }
    }
}

fn tag_attribute<'t>(tag: &'t str, name: &str) -> Option<Match<'t>> {
    find_attribute(tag, name).and_then(|attr| attr.value)
}

fn src_edits(html: &str, rewriter: &HostRewriter<'_>) -> Vec<Edit> {
    IMG_TAG_RE
        .find_iter(html)
        .filter_map(|tag| {
            let value = tag_attribute(tag.as_str(), "src")?;
            let start = tag.start() + value.start();
            rewrite_span(value.as_str(), start..start + value.len(), rewriter)
        })
        .collect()
}

fn srcset_edits(html: &str, rewriter: &HostRewriter<'_>) -> Vec<Edit> {
    let mut edits = Vec::new();

    for tag in IMG_TAG_RE.find_iter(html) {
        let Some(value) = tag_attribute(tag.as_str(), "srcset") else {
            continue;
        };
        let offset = tag.start() + value.start();

        for candidate in srcset_candidates(value.as_str()) {
            let url = &value.as_str()[candidate.clone()];
            let range = offset + candidate.start..offset + candidate.end;
            edits.extend(rewrite_span(url, range, rewriter));
        }
    }

    edits
}

/// Byte ranges of the candidate URLs in a srcset value.
///
/// Descriptors (`300w`, `2x`) are outside the ranges and stay as written. A
/// comma only separates candidates when it ends a URL token or follows a
/// descriptor, so `?auto=format,enhance` survives.
pub(crate) fn srcset_candidates(srcset: &str) -> Vec<Range<usize>> {
    let bytes = srcset.as_bytes();
    let mut ranges = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut end = i;
        while end > start && bytes[end - 1] == b',' {
            end -= 1;
        }
        ranges.push(start..end);

        if end < i {
            continue;
        }
        while i < bytes.len() && bytes[i] != b',' {
            i += 1;
        }
    }

    ranges
}

fn href_edits(html: &str, rewriter: &HostRewriter<'_>) -> Vec<Edit> {
    ANCHOR_RE
        .find_iter(html)
        .filter_map(|anchor| {
            let text = anchor.as_str();
            let open_tag = &text[..text.find('>').map_or(text.len(), |p| p + 1)];
            let value = tag_attribute(open_tag, "href")?;
            let start = anchor.start() + value.start();
            rewrite_span(value.as_str(), start..start + value.len(), rewriter)
        })
        .collect()
}

fn css_url_edits(html: &str, rewriter: &HostRewriter<'_>) -> Vec<Edit> {
    CSS_URL_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let value = quoted_value(&caps, 1)?;
            rewrite_span(value.as_str(), value.range(), rewriter)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    const SITE: &str = "http://example.org/";

    fn settings() -> Settings {
        Settings {
            cdn_link: Some("https://my-source.imgix.com".to_string()),
            ..Default::default()
        }
    }

    fn rewrite(html: &str, settings: &Settings) -> String {
        let rewriter = HostRewriter::new(settings, SITE).unwrap();
        rewrite_content(html, &rewriter)
    }

    #[test]
    fn test_rewrite_img_src() {
        let html = r#"<p>Hi</p><img class="a" src="http://example.org/wp-content/uploads/example.gif" alt="x">"#;
        assert_eq!(
            rewrite(html, &settings()),
            r#"<p>Hi</p><img class="a" src="https://my-source.imgix.com/wp-content/uploads/example.gif" alt="x">"#
        );
    }

    #[test]
    fn test_single_quotes_and_bare_values() {
        let html = "<img src='http://example.org/a.png' /><IMG SRC=http://example.org/b.jpg>";
        assert_eq!(
            rewrite(html, &settings()),
            "<img src='https://my-source.imgix.com/a.png' /><IMG SRC=https://my-source.imgix.com/b.jpg>"
        );
    }

    #[test]
    fn test_no_match_is_untouched() {
        let html = "<html><head></head><body></body></html>";
        assert_eq!(rewrite(html, &settings()), html);
    }

    #[test]
    fn test_third_party_images_untouched() {
        let html = r#"<img src="https://www.google.com/example.gif" srcset="https://www.google.com/example.gif 2x">"#;
        assert_eq!(rewrite(html, &settings()), html);
    }

    #[test]
    fn test_data_src_is_not_src() {
        let html = r#"<img data-src="http://example.org/lazy.jpg" src="http://example.org/a.jpg">"#;
        assert_eq!(
            rewrite(html, &settings()),
            r#"<img data-src="http://example.org/lazy.jpg" src="https://my-source.imgix.com/a.jpg">"#
        );
    }

    #[test]
    fn test_srcset_candidates_rewritten_descriptors_kept() {
        let html = concat!(
            r#"<img src="http://example.org/a-300x200.jpg" "#,
            r#"srcset="http://example.org/a-300x200.jpg 300w,  http://example.org/a.jpg 1024w, https://other.net/b.jpg 2x">"#
        );
        assert_eq!(
            rewrite(html, &settings()),
            concat!(
                r#"<img src="https://my-source.imgix.com/a-300x200.jpg" "#,
                r#"srcset="https://my-source.imgix.com/a-300x200.jpg 300w,  https://my-source.imgix.com/a.jpg 1024w, https://other.net/b.jpg 2x">"#
            )
        );
    }

    #[test]
    fn test_srcset_candidates_ranges() {
        let srcset = "a.jpg 1x,b.jpg?auto=format,enhance 2x, c.jpg, d.jpg";
        let urls: Vec<&str> = srcset_candidates(srcset).into_iter().map(|r| &srcset[r]).collect();
        assert_eq!(urls, vec!["a.jpg", "b.jpg?auto=format,enhance", "c.jpg", "d.jpg"]);
    }

    #[test]
    fn test_anchor_href_to_image() {
        let html = r#"<a href="http://example.org/full.jpg" rel="x"><img src="http://example.org/thumb.jpg"></a> <a href="http://example.org/page/">page</a>"#;
        assert_eq!(
            rewrite(html, &settings()),
            r#"<a href="https://my-source.imgix.com/full.jpg" rel="x"><img src="https://my-source.imgix.com/thumb.jpg"></a> <a href="http://example.org/page/">page</a>"#
        );
    }

    #[test]
    fn test_css_urls() {
        let html = r#"<div style="background: url('http://example.org/bg.png')"></div><style>.x{background:url( http://example.org/y.jpg )} .z{background:url("/wp-content/z.gif")}</style>"#;
        assert_eq!(
            rewrite(html, &settings()),
            r#"<div style="background: url('https://my-source.imgix.com/bg.png')"></div><style>.x{background:url( https://my-source.imgix.com/y.jpg )} .z{background:url("https://my-source.imgix.com/wp-content/z.gif")}</style>"#
        );
    }

    #[test]
    fn test_global_params_and_existing_query() {
        let settings = Settings {
            auto_format: true,
            auto_enhance: true,
            ..settings()
        };
        let html = r#"<img src="http://example.org/cats.gif?party=1&bad-vibes=0">"#;
        assert_eq!(
            rewrite(html, &settings),
            r#"<img src="https://my-source.imgix.com/cats.gif?auto=format,enhance&party=1&bad-vibes=0">"#
        );
    }

    #[test]
    fn test_filename_sizes_in_content() {
        let settings = Settings {
            filename_sizes_in_content: true,
            ..settings()
        };
        let html = r#"<img src='http://example.org/cats-400x300.gif?party=1' />"#;
        assert_eq!(
            rewrite(html, &settings),
            r#"<img src='https://my-source.imgix.com/cats.gif?h=300&w=400&party=1' />"#
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let settings = Settings {
            auto_format: true,
            ..settings()
        };
        let html = r#"<img src="http://example.org/a.jpg" srcset="//example.org/a.jpg 2x">"#;
        let once = rewrite(html, &settings);
        assert_eq!(rewrite(&once, &settings), once);
    }

    #[test]
    fn test_attribute_names_inside_values_are_ignored() {
        let html = r#"<img alt="see src=http://example.org/fake.jpg" src="http://example.org/real.jpg">"#;
        assert_eq!(
            rewrite(html, &settings()),
            r#"<img alt="see src=http://example.org/fake.jpg" src="https://my-source.imgix.com/real.jpg">"#
        );

        let tag = r#"<img title='a srcset="x" b' data-src=/lazy.jpg SRC = "/a.jpg" />"#;
        let attr = find_attribute(tag, "src").unwrap();
        assert_eq!(attr.value.unwrap().as_str(), "/a.jpg");
        assert_eq!(&tag[attr.end..], " />");
        assert!(find_attribute(tag, "srcset").is_none());
    }

    #[test]
    fn test_non_image_links_untouched() {
        let html = r#"<a href="http://example.org/files/report.pdf">report</a>"#;
        assert_eq!(rewrite(html, &settings()), html);
    }

    #[test]
    fn test_apply_edits_reverse_order_and_overlap() {
        let edits = vec![
            Edit { range: 0..1, replacement: "AA".into() },
            Edit { range: 4..6, replacement: "E".into() },
            Edit { range: 5..7, replacement: "!".into() },
        ];
        assert_eq!(apply_edits("abcdefgh", edits), "AAbcde!h");
    }
}
