//! Retina srcset augmentation
//! Adds 2x/3x `dpr` variants to CDN images that were given an explicit width.

use crate::content_scanner::{apply_edits, find_attribute, Edit, IMG_TAG_RE};
use crate::url_parts::{ParsedUrl, QueryParams};

/// Inject `srcset` after `src` on every `<img>` whose src is on `cdn_host`,
/// carries a `w` param, and has no `srcset` yet. Running it twice changes nothing.
pub fn add_retina_variants(html: &str, cdn_host: &str) -> String {
    let mut edits = Vec::new();

    for tag in IMG_TAG_RE.find_iter(html) {
        let tag_text = tag.as_str();
        if find_attribute(tag_text, "srcset").is_some() {
            continue;
        }
        let Some(attr) = find_attribute(tag_text, "src") else {
            continue;
        };
        let Some(src) = attr.value else {
            continue;
        };
        if !wants_retina(src.as_str(), cdn_host) {
            continue;
        }

        let insert_at = tag.start() + attr.end;
        let src = src.as_str();
        edits.push(Edit {
            range: insert_at..insert_at,
            replacement: format!(
                " srcset=\"{src}, {src}&dpr=2 2x, {src}&dpr=3 3x\"",
                src = src
            ),
        });
    }

    if !edits.is_empty() {
        tracing::debug!("Retina: {} images given 2x/3x variants", edits.len());
    }
    apply_edits(html, edits)
}

fn wants_retina(src: &str, cdn_host: &str) -> bool {
    // rendered markup escapes the query separator
    let src = src.replace("&#038;", "&").replace("&amp;", "&");
    let Ok(url) = ParsedUrl::parse(&src) else {
        return false;
    };
    let on_cdn = url
        .host
        .as_deref()
        .is_some_and(|host| !cdn_host.is_empty() && host.to_ascii_lowercase().contains(&cdn_host.to_ascii_lowercase()));

    on_cdn
        && url
            .query
            .as_deref()
            .is_some_and(|query| QueryParams::parse(query).keys().any(|key| key == "w"))
}
