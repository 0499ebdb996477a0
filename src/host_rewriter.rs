//! Host Rewriter
//! Moves local image URLs onto the CDN host and attaches imgix parameters.

use crate::error::RewriteError;
use crate::filename_size::extract_size;
use crate::params::{auto_value, compose_params};
use crate::settings::{CdnOrigin, Settings};
use crate::sizes::SizeSpec;
use crate::url_parts::{ParsedUrl, QueryParams};

/// How parameters are attached once the host has been swapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    /// A single attachment URL: size comes from the filename, keys are deduplicated
    Attachment,
    /// A reference found while scanning content: params go in front of the
    /// existing query, which is kept verbatim
    Content,
    /// An attachment displayed at an explicit size
    Resize(SizeSpec),
}

pub struct HostRewriter<'a> {
    settings: &'a Settings,
    cdn: CdnOrigin,
    site_host: Option<String>,
    external_path: Option<String>,
}

impl<'a> HostRewriter<'a> {
    /// Fails with `ConfigDisabled` when no usable CDN link is set.
    pub fn new(settings: &'a Settings, site_url: &str) -> Result<Self, RewriteError> {
        let cdn = settings.cdn().ok_or(RewriteError::ConfigDisabled)?;
        let site_host = ParsedUrl::parse(site_url).ok().and_then(|url| url.host);
        let external_path = settings
            .external_cdn_link
            .as_deref()
            .and_then(|link| ParsedUrl::parse(link).ok())
            .map(|url| url.path.trim_end_matches('/').to_string())
            .filter(|path| !path.is_empty());

        Ok(Self {
            settings,
            cdn,
            site_host,
            external_path,
        })
    }

    pub fn cdn(&self) -> &CdnOrigin {
        &self.cdn
    }

    /// Does `url` point at this site (or its external origin)?
    ///
    /// URLs already on the CDN host are never local.
    pub fn is_local(&self, url: &ParsedUrl) -> bool {
        match url.host.as_deref() {
            Some(host) if host == self.cdn.host => false,
            Some(host) => {
                self.site_host.as_deref() == Some(host)
                    || url.is_protocol_relative()
                    || self.is_external_origin(host)
            }
            None => url.scheme.is_none() && url.path.starts_with('/'),
        }
    }

    fn is_external_origin(&self, host: &str) -> bool {
        self.settings
            .external_cdn_link
            .as_deref()
            .is_some_and(|link| link.contains(host))
    }

    /// Rewrite one URL. Foreign URLs come back unchanged as `Ok`.
    pub fn rewrite(&self, url: &str, mode: RewriteMode) -> Result<String, RewriteError> {
        let mut parsed = ParsedUrl::parse(url)?;

        if !self.is_local(&parsed) {
            tracing::debug!("Host rewrite: {} is not local, skipping", url);
            return Ok(url.to_string());
        }
        if !has_image_extension(&parsed.path) {
            return Err(RewriteError::UnrecognizedExtension(url.to_string()));
        }

        let from_external = parsed
            .host
            .as_deref()
            .is_some_and(|host| self.site_host.as_deref() != Some(host) && self.is_external_origin(host));

        self.cdn.apply(&mut parsed);
        if from_external {
            self.strip_external_path(&mut parsed);
        }

        let existing = parsed.query.take();
        let existing_params = existing.as_deref().map(QueryParams::parse).unwrap_or_default();

        parsed.query = match mode {
            RewriteMode::Attachment => {
                let size = take_filename_size(&mut parsed);
                non_empty(compose_params(self.settings, size.as_ref()).merged_before(&existing_params))
            }
            RewriteMode::Resize(size) => {
                non_empty(compose_params(self.settings, Some(&size)).merged_before(&existing_params))
            }
            RewriteMode::Content => {
                let mut params = QueryParams::new();
                if !existing_params.contains_key("auto") {
                    if let Some(auto) = auto_value(self.settings) {
                        params.push("auto", auto);
                    }
                }
                if self.settings.filename_sizes_in_content {
                    if let Some(size) = take_filename_size(&mut parsed) {
                        params.push("h", size.height.unwrap_or_default().to_string());
                        params.push("w", size.width.unwrap_or_default().to_string());
                    }
                }
                params.prepend_to(existing.as_deref())
            }
        };

        let rewritten = parsed.build();
        tracing::debug!("Host rewrite: {} -> {}", url, rewritten);
        Ok(rewritten)
    }

    fn strip_external_path(&self, url: &mut ParsedUrl) {
        let Some(prefix) = self.external_path.as_deref() else {
            return;
        };
        if let Some(rest) = url.path.strip_prefix(prefix) {
            if rest.starts_with('/') {
                url.path = rest.to_string();
            }
        }
    }
}

/// Only these are proxied; documents, video and everything else stay local
pub fn has_image_extension(path: &str) -> bool {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    matches!(extension.as_deref(), Some("jpg" | "jpeg" | "gif" | "png"))
}

/// Rewrite a single attachment URL, or return it unchanged when it can't be.
pub fn rewrite_host(url: &str, settings: &Settings, site_url: &str) -> String {
    HostRewriter::new(settings, site_url)
        .and_then(|rewriter| rewriter.rewrite(url, RewriteMode::Attachment))
        .unwrap_or_else(|err| {
            tracing::debug!("Host rewrite: leaving {} unchanged ({})", url, err);
            url.to_string()
        })
}

/// Strip a `-WxH` suffix from the path's file name and return it as a size
fn take_filename_size(url: &mut ParsedUrl) -> Option<SizeSpec> {
    let size = extract_size(url.file_name());
    let (width, height) = size.dimensions()?;

    let dir_len = url.path.len() - url.file_name().len();
    url.path.truncate(dir_len);
    url.path.push_str(&size.base);

    Some(SizeSpec {
        width: Some(width),
        height: Some(height),
        crop: false,
    })
}

fn non_empty(params: QueryParams) -> Option<String> {
    if params.is_empty() {
        None
    } else {
        Some(params.to_string())
    }
}
