//! imgix parameter composition

use crate::settings::Settings;
use crate::sizes::SizeSpec;
use crate::url_parts::QueryParams;

/// The `auto` value for the enabled flags, always in format, enhance, compress order
pub fn auto_value(settings: &Settings) -> Option<String> {
    let auto: Vec<&str> = [
        (settings.auto_format, "format"),
        (settings.auto_enhance, "enhance"),
        (settings.auto_compress, "compress"),
    ]
    .into_iter()
    .filter_map(|(enabled, name)| enabled.then_some(name))
    .collect();

    if auto.is_empty() {
        None
    } else {
        Some(auto.join(","))
    }
}

/// Global params first, then `fit`, `w`, `h` for the given size
pub fn compose_params(settings: &Settings, size: Option<&SizeSpec>) -> QueryParams {
    let mut params = QueryParams::new();

    if let Some(auto) = auto_value(settings) {
        params.push("auto", auto);
    }

    if let Some(size) = size {
        if size.crop {
            params.push("fit", "crop");
        }
        if let Some(width) = size.width {
            params.push("w", width.to_string());
        }
        if let Some(height) = size.height {
            params.push("h", height.to_string());
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(format: bool, enhance: bool, compress: bool) -> Settings {
        Settings {
            cdn_link: Some("https://my-source.imgix.com".to_string()),
            auto_format: format,
            auto_enhance: enhance,
            auto_compress: compress,
            ..Default::default()
        }
    }

    #[test]
    fn test_auto_format_and_enhance() {
        let params = compose_params(&settings(true, true, false), None);
        assert_eq!(params.to_string(), "auto=format,enhance");
    }

    #[test]
    fn test_auto_order_is_stable() {
        assert_eq!(
            auto_value(&settings(true, true, true)).as_deref(),
            Some("format,enhance,compress")
        );
        assert_eq!(auto_value(&settings(false, true, true)).as_deref(), Some("enhance,compress"));
        assert_eq!(auto_value(&settings(true, false, true)).as_deref(), Some("format,compress"));
    }

    #[test]
    fn test_no_flags_no_auto_key() {
        let params = compose_params(&settings(false, false, false), None);
        assert!(params.is_empty());
        assert!(!params.contains_key("auto"));
    }

    #[test]
    fn test_crop_then_width_then_height() {
        let size = SizeSpec { width: Some(150), height: Some(100), crop: true };
        let params = compose_params(&settings(false, false, true), Some(&size));
        assert_eq!(params.to_string(), "auto=compress&fit=crop&w=150&h=100");
    }

    #[test]
    fn test_empty_dimensions_skipped() {
        let size = SizeSpec { width: None, height: Some(90), crop: false };
        let params = compose_params(&settings(false, false, false), Some(&size));
        assert_eq!(params.to_string(), "h=90");
    }
}
