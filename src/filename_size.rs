//! Filename size extraction
//! WordPress names resized copies `photo-400x300.png`; the CDN wants `photo.png?w=400&h=300`.

use regex::Regex;
use std::sync::LazyLock;

/// `-{width}x{height}.{ext}` at the end of a name, optionally followed by a glued-on query
static SIZE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-(\d+)x(\d+)(\.\w{3,4})(\?[^#]*)?$").expect("valid size suffix pattern")
});

/// A filename split into its original name and encoded dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameSize {
    /// Name with the size suffix removed and any trailing query reattached
    pub base: String,
    pub width: Option<String>,
    pub height: Option<String>,
}

impl FilenameSize {
    /// `(width, height)` as numbers, when both were present and fit a `u32`
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let width = self.width.as_deref()?.parse().ok()?;
        let height = self.height.as_deref()?.parse().ok()?;
        Some((width, height))
    }
}

/// Split `photo-400x300.png` into `photo.png`, `400` and `300`.
///
/// Names without a size suffix come back unchanged with no dimensions.
pub fn extract_size(filename: &str) -> FilenameSize {
    let Some(caps) = SIZE_SUFFIX_RE.captures(filename) else {
        return FilenameSize {
            base: filename.to_string(),
            width: None,
            height: None,
        };
    };

    let whole = caps.get(0).map_or(0..0, |m| m.range());
    let extension = caps.get(3).map_or("", |m| m.as_str());
    let trailing = caps.get(4).map_or("", |m| m.as_str());

    let mut base = String::with_capacity(filename.len());
    base.push_str(&filename[..whole.start]);
    base.push_str(extension);
    base.push_str(trailing);

    FilenameSize {
        base,
        width: caps.get(1).map(|m| m.as_str().to_string()),
        height: caps.get(2).map(|m| m.as_str().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_size_sanity() {
        let size = extract_size("photo-400x300.png");
        assert_eq!(size.base, "photo.png");
        assert_eq!(size.width.as_deref(), Some("400"));
        assert_eq!(size.height.as_deref(), Some("300"));
        assert_eq!(size.dimensions(), Some((400, 300)));
    }

    #[test]
    fn test_extract_size_no_match() {
        for name in ["youshallnotmatch.png", "photo-400x.png", "photo-400x300", "400x300.png"] {
            let size = extract_size(name);
            assert_eq!(size.base, name);
            assert_eq!(size.width, None);
            assert_eq!(size.height, None);
        }
    }

    #[test]
    fn test_extract_size_uses_last_suffix() {
        let size = extract_size("banner-10x20-1024x768.jpeg");
        assert_eq!(size.base, "banner-10x20.jpeg");
        assert_eq!(size.dimensions(), Some((1024, 768)));
    }

    #[test]
    fn test_extract_size_keeps_trailing_query() {
        let size = extract_size("cats-400x300.gif?party=1&bad-vibes=0");
        assert_eq!(size.base, "cats.gif?party=1&bad-vibes=0");
        assert_eq!(size.dimensions(), Some((400, 300)));
    }

    #[test]
    fn test_oversized_dimensions_are_not_numeric() {
        let size = extract_size("x-99999999999x1.png");
        assert_eq!(size.base, "x.png");
        assert_eq!(size.dimensions(), None);
    }
}
