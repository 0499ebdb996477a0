//! Plugin settings record
//!
//! Mirrors the `imgix_settings` option as WordPress stores it: flags are
//! usually the string `"1"`, unchecked boxes are simply absent.

use serde::{Deserialize, Deserializer, Serialize};

use crate::url_parts::ParsedUrl;

/// Settings supplied by the host for one rewrite operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// imgix source, e.g. `https://my-source.imgix.net`. Empty disables everything.
    #[serde(deserialize_with = "non_empty_string")]
    pub cdn_link: Option<String>,
    /// Another origin (such as an offload bucket) whose images are also served via the CDN
    #[serde(deserialize_with = "non_empty_string")]
    pub external_cdn_link: Option<String>,
    #[serde(deserialize_with = "flag")]
    pub auto_format: bool,
    #[serde(deserialize_with = "flag")]
    pub auto_enhance: bool,
    #[serde(deserialize_with = "flag")]
    pub auto_compress: bool,
    #[serde(deserialize_with = "flag")]
    pub add_dpi2_srcset: bool,
    #[serde(deserialize_with = "flag")]
    pub crop_thumbnails: bool,
    /// Turn `-400x300.jpg` suffixes into `h`/`w` params when rewriting content
    #[serde(deserialize_with = "flag")]
    pub filename_sizes_in_content: bool,
}

impl Settings {
    pub fn is_enabled(&self) -> bool {
        self.cdn_link.is_some()
    }

    /// The CDN's scheme/host/port triple, if a usable link is configured.
    pub fn cdn(&self) -> Option<CdnOrigin> {
        let link = self.cdn_link.as_deref()?;
        match CdnOrigin::parse(link) {
            Some(origin) => Some(origin),
            None => {
                tracing::warn!("Ignoring unusable cdn_link: {}", link);
                None
            }
        }
    }
}

/// Where rewritten images are served from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnOrigin {
    pub scheme: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

impl CdnOrigin {
    /// Parse a CDN link. A bare host (`my-source.imgix.net`) is taken as
    /// protocol-relative, so rewritten URLs carry no scheme.
    pub fn parse(link: &str) -> Option<Self> {
        let link = link.trim();
        let link = if link.contains("://") || link.starts_with("//") {
            link.to_string()
        } else {
            format!("//{}", link)
        };

        let parsed = ParsedUrl::parse(&link).ok()?;
        Some(Self {
            scheme: parsed.scheme,
            host: parsed.host?,
            port: parsed.port,
        })
    }

    /// Overwrite the scheme/host/port of `url`; fields the CDN lacks are unset
    pub fn apply(&self, url: &mut ParsedUrl) {
        url.scheme = self.scheme.clone();
        url.host = Some(self.host.clone());
        url.port = self.port;
    }
}

/// WordPress-style truthiness: `false`, `0`, `"0"`, `""` and `null` are off
#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Flag>::deserialize(deserializer)?;
    Ok(match value {
        None => false,
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n != 0,
        Some(Flag::Float(n)) => n != 0.0,
        Some(Flag::Str(s)) => !(s.is_empty() || s == "0"),
    })
}

/// A link field. Blank strings, `"0"` and any non-string value (`false`, `0`) mean unset.
fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Flag>::deserialize(deserializer)?;
    Ok(match value {
        Some(Flag::Str(s)) if !(s.trim().is_empty() || s.trim() == "0") => Some(s),
        _ => None,
    })
}
