//! imgix rewriter
//!
//! One `ImgixRewriter` is built per request from the site's settings and home
//! URL. Every entry point degrades to returning its input unchanged, so a
//! missing or broken configuration can only fail to optimize a page, never
//! break it.

use serde::{Deserialize, Serialize};

use crate::attachment::AttachmentResolver;
use crate::content_scanner;
use crate::error::RewriteError;
use crate::host_rewriter::{rewrite_host, HostRewriter, RewriteMode};
use crate::retina::add_retina_variants;
use crate::settings::Settings;
use crate::sizes::{resolve_size, RequestedSize, SizePresets, SizeSpec};
use crate::url_parts::{ParsedUrl, QueryParams};

/// URL and display size for an attachment shown at a requested size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownsizedImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Descriptor {
    W,
    X,
}

/// One candidate of a srcset the host calculated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcsetSource {
    pub url: String,
    pub descriptor: Descriptor,
    pub value: u32,
}

/// The image a srcset belongs to
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SrcsetContext {
    #[serde(default)]
    pub image_src: String,
    #[serde(default)]
    pub attachment_id: Option<u64>,
}

pub struct ImgixRewriter {
    settings: Settings,
    site_url: String,
}

impl ImgixRewriter {
    pub fn new(settings: Settings, site_url: impl Into<String>) -> Self {
        Self {
            settings,
            site_url: site_url.into(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn host_rewriter(&self) -> Result<HostRewriter<'_>, RewriteError> {
        HostRewriter::new(&self.settings, &self.site_url)
    }

    /// Serve one attachment URL from the CDN, sizing it from its filename.
    pub fn rewrite_attachment_url(&self, url: &str) -> String {
        rewrite_host(url, &self.settings, &self.site_url)
    }

    /// Attachment URL and dimensions for display at `requested`.
    ///
    /// `None` means the host should fall back to its own behaviour (CDN off or
    /// attachment unknown).
    pub fn rewrite_downsized_image<A, P>(
        &self,
        attachments: &A,
        attachment_id: u64,
        requested: &RequestedSize,
        presets: &P,
    ) -> Option<DownsizedImage>
    where
        A: AttachmentResolver + ?Sized,
        P: SizePresets + ?Sized,
    {
        match self.downsize(attachments, attachment_id, requested, presets) {
            Ok(image) => Some(image),
            Err(err) => {
                tracing::debug!("Downsize: attachment {} left to the host ({})", attachment_id, err);
                None
            }
        }
    }

    fn downsize<A, P>(
        &self,
        attachments: &A,
        attachment_id: u64,
        requested: &RequestedSize,
        presets: &P,
    ) -> Result<DownsizedImage, RewriteError>
    where
        A: AttachmentResolver + ?Sized,
        P: SizePresets + ?Sized,
    {
        let rewriter = self.host_rewriter()?;
        let attachment = attachments
            .attachment(attachment_id)
            .ok_or(RewriteError::UnknownAttachment(attachment_id))?;
        let meta_width = attachment.width.unwrap_or(0);
        let meta_height = attachment.height.unwrap_or(0);

        let size = match resolve_size(requested, presets) {
            Ok(size) => size,
            Err(err @ RewriteError::UnknownSizePreset(_)) => {
                tracing::warn!("Downsize: {}, keeping {}", err, attachment.url);
                return Ok(DownsizedImage {
                    url: attachment.url,
                    width: meta_width,
                    height: meta_height,
                });
            }
            Err(err) => return Err(err),
        };
        let size = SizeSpec {
            crop: size.crop && self.settings.crop_thumbnails,
            ..size
        };

        let url = rewriter
            .rewrite(&attachment.url, RewriteMode::Resize(size))
            .unwrap_or_else(|err| {
                tracing::debug!("Downsize: leaving {} unchanged ({})", attachment.url, err);
                attachment.url.clone()
            });

        Ok(DownsizedImage {
            url,
            width: size.width.unwrap_or(meta_width),
            height: size.height.unwrap_or(meta_height),
        })
    }

    /// Point srcset candidates at the CDN.
    ///
    /// Width candidates are rebuilt from the attachment's own URL (or
    /// `image_src`) with `w` set to the candidate width and `h` dropped, so the
    /// CDN keeps the aspect ratio. Density candidates only change host.
    pub fn rewrite_srcset_sources<A>(
        &self,
        sources: Vec<SrcsetSource>,
        context: &SrcsetContext,
        attachments: &A,
    ) -> Vec<SrcsetSource>
    where
        A: AttachmentResolver + ?Sized,
    {
        let Ok(rewriter) = self.host_rewriter() else {
            return sources;
        };

        let base = context
            .attachment_id
            .and_then(|id| attachments.attachment(id))
            .map(|attachment| attachment.url)
            .unwrap_or_else(|| context.image_src.clone());

        sources
            .into_iter()
            .map(|mut source| {
                let rewritten = match source.descriptor {
                    Descriptor::W => width_variant(&rewriter, &base, source.value),
                    Descriptor::X => rewriter.rewrite(&source.url, RewriteMode::Attachment).ok(),
                };
                if let Some(url) = rewritten {
                    source.url = url;
                }
                source
            })
            .collect()
    }

    /// Rewrite local image references in post content.
    pub fn rewrite_content(&self, html: &str) -> String {
        match self.host_rewriter() {
            Ok(rewriter) => content_scanner::rewrite_content(html, &rewriter),
            Err(_) => html.to_string(),
        }
    }

    /// Filter for the whole rendered page: adds retina variants when enabled.
    pub fn filter_response(&self, html: &str) -> String {
        if self.settings.add_dpi2_srcset {
            self.add_retina(html)
        } else {
            html.to_string()
        }
    }

    /// Retina variants for images already on the configured CDN host.
    pub fn add_retina(&self, html: &str) -> String {
        match self.settings.cdn() {
            Some(cdn) => add_retina_variants(html, &cdn.host),
            None => html.to_string(),
        }
    }

    /// `<link rel="dns-prefetch">` for the CDN host, or nothing when disabled
    pub fn dns_prefetch_tag(&self) -> String {
        match self.settings.cdn() {
            Some(cdn) => format!(
                r#"<link rel="dns-prefetch" href="{}"/>"#,
                escape_attr(&format!("//{}", cdn.host))
            ),
            None => String::new(),
        }
    }
}

fn width_variant(rewriter: &HostRewriter<'_>, base: &str, width: u32) -> Option<String> {
    let rewritten = rewriter.rewrite(base, RewriteMode::Attachment).ok()?;
    let mut url = ParsedUrl::parse(&rewritten).ok()?;
    if url.host.as_deref() != Some(rewriter.cdn().host.as_str()) {
        return None;
    }

    let mut query = QueryParams::parse(url.query.as_deref().unwrap_or_default());
    query.remove("h");
    query.set("w", width.to_string());
    url.query = Some(query.to_string());
    Some(url.build())
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
