//! API Handlers

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::attachment::Attachment;
use crate::config::AppState;
use crate::error::AppError;
use crate::rewriter::{DownsizedImage, ImgixRewriter, SrcsetContext, SrcsetSource};
use crate::settings::Settings;
use crate::sizes::{RequestedSize, SizeSpec};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    auth_enabled: bool,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        auth_enabled: state.api_key.is_some(),
    })
}

/// Every rewrite endpoint requires `Authorization: Bearer <API_KEY>`
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(ref key) = state.api_key else {
        tracing::error!("Security Error: No API Key configured on server");
        return Err(AppError::Internal(
            "Server misconfiguration: API_KEY must be set".to_string(),
        ));
    };

    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if auth_header != format!("Bearer {}", key) {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

/// Single attachment URL rewrite request
#[derive(Deserialize)]
pub struct RewriteUrlRequest {
    pub site_url: String,
    #[serde(default)]
    pub settings: Settings,
    pub url: String,
}

#[derive(Serialize)]
pub struct RewriteUrlResponse {
    pub url: String,
    pub rewritten: bool,
}

pub async fn rewrite_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RewriteUrlRequest>, JsonRejection>,
) -> Result<Json<RewriteUrlResponse>, AppError> {
    authorize(&state, &headers)?;
    let Json(req) = payload?;

    let rewriter = ImgixRewriter::new(req.settings, req.site_url);
    let url = rewriter.rewrite_attachment_url(&req.url);
    tracing::debug!("Attachment URL: {} -> {}", req.url, url);

    Ok(Json(RewriteUrlResponse {
        rewritten: url != req.url,
        url,
    }))
}

/// Content rewrite request
#[derive(Deserialize)]
pub struct RewriteContentRequest {
    pub site_url: String,
    #[serde(default)]
    pub settings: Settings,
    pub html: String,
    /// Also run the full-response filter (retina srcset) over the result
    #[serde(default)]
    pub full_response: bool,
}

/// Content rewrite response
#[derive(Serialize)]
pub struct RewriteContentResponse {
    pub html: String,
    pub original_size: usize,
    pub rewritten_size: usize,
    pub changed: bool,
}

impl RewriteContentResponse {
    fn new(original: &str, html: String) -> Self {
        Self {
            original_size: original.len(),
            rewritten_size: html.len(),
            changed: html != original,
            html,
        }
    }
}

pub async fn rewrite_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RewriteContentRequest>, JsonRejection>,
) -> Result<Json<RewriteContentResponse>, AppError> {
    authorize(&state, &headers)?;
    let Json(req) = payload?;
    let request_id = Uuid::new_v4();

    tracing::info!(
        "[{}] Rewriting content for {} ({} bytes, cdn enabled: {})",
        request_id,
        req.site_url,
        req.html.len(),
        req.settings.is_enabled()
    );

    let rewriter = ImgixRewriter::new(req.settings, req.site_url);
    let mut html = rewriter.rewrite_content(&req.html);
    if req.full_response {
        html = rewriter.filter_response(&html);
    }

    let response = RewriteContentResponse::new(&req.html, html);
    tracing::info!(
        "[{}] Rewritten: {} -> {} bytes",
        request_id,
        response.original_size,
        response.rewritten_size
    );

    Ok(Json(response))
}

/// One page of a bulk request
#[derive(Deserialize)]
pub struct BulkPage {
    pub url: String,
    pub html: String,
}

/// Bulk content rewrite request, all pages of one site
#[derive(Deserialize)]
pub struct BulkRewriteRequest {
    pub site_url: String,
    #[serde(default)]
    pub settings: Settings,
    pub pages: Vec<BulkPage>,
}

#[derive(Serialize)]
pub struct BulkRewriteResponse {
    pub results: Vec<RewriteContentResponse>,
    pub pages_changed: usize,
}

/// Bulk content rewrite endpoint
pub async fn rewrite_content_bulk(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<BulkRewriteRequest>, JsonRejection>,
) -> Result<Json<BulkRewriteResponse>, AppError> {
    authorize(&state, &headers)?;
    let Json(req) = payload?;
    let request_id = Uuid::new_v4();

    let rewriter = ImgixRewriter::new(req.settings, req.site_url);
    let results: Vec<RewriteContentResponse> = req
        .pages
        .iter()
        .map(|page| {
            tracing::debug!("[{}] Rewriting page {}", request_id, page.url);
            RewriteContentResponse::new(&page.html, rewriter.rewrite_content(&page.html))
        })
        .collect();

    let pages_changed = results.iter().filter(|r| r.changed).count();
    tracing::info!(
        "[{}] Bulk rewrite: {} of {} pages changed",
        request_id,
        pages_changed,
        results.len()
    );

    Ok(Json(BulkRewriteResponse {
        results,
        pages_changed,
    }))
}

/// Full-response filter request
#[derive(Deserialize)]
pub struct FilterResponseRequest {
    #[serde(default)]
    pub site_url: String,
    #[serde(default)]
    pub settings: Settings,
    pub html: String,
}

pub async fn filter_response(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<FilterResponseRequest>, JsonRejection>,
) -> Result<Json<RewriteContentResponse>, AppError> {
    authorize(&state, &headers)?;
    let Json(req) = payload?;

    let rewriter = ImgixRewriter::new(req.settings, req.site_url);
    let html = rewriter.filter_response(&req.html);

    Ok(Json(RewriteContentResponse::new(&req.html, html)))
}

/// Attachment displayed at a requested size
#[derive(Deserialize)]
pub struct DownsizeRequest {
    pub site_url: String,
    #[serde(default)]
    pub settings: Settings,
    pub attachment: Attachment,
    pub size: RequestedSize,
    /// Registered size presets by name
    #[serde(default)]
    pub presets: HashMap<String, SizeSpec>,
}

#[derive(Serialize)]
pub struct DownsizeResponse {
    /// `null` when the host should keep its default behaviour
    pub image: Option<DownsizedImage>,
}

pub async fn rewrite_downsize(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<DownsizeRequest>, JsonRejection>,
) -> Result<Json<DownsizeResponse>, AppError> {
    authorize(&state, &headers)?;
    let Json(req) = payload?;

    let attachment_id = req.attachment.id;
    let attachments = Some(req.attachment);
    let rewriter = ImgixRewriter::new(req.settings, req.site_url);
    let image = rewriter.rewrite_downsized_image(&attachments, attachment_id, &req.size, &req.presets);

    Ok(Json(DownsizeResponse { image }))
}

/// Srcset candidates calculated by the host
#[derive(Deserialize)]
pub struct SrcsetRequest {
    pub site_url: String,
    #[serde(default)]
    pub settings: Settings,
    pub sources: Vec<SrcsetSource>,
    #[serde(default)]
    pub image_src: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

#[derive(Serialize)]
pub struct SrcsetResponse {
    pub sources: Vec<SrcsetSource>,
}

pub async fn rewrite_srcset(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SrcsetRequest>, JsonRejection>,
) -> Result<Json<SrcsetResponse>, AppError> {
    authorize(&state, &headers)?;
    let Json(req) = payload?;

    let context = SrcsetContext {
        image_src: req.image_src,
        attachment_id: req.attachment.as_ref().map(|a| a.id),
    };
    let rewriter = ImgixRewriter::new(req.settings, req.site_url);
    let sources = rewriter.rewrite_srcset_sources(req.sources, &context, &req.attachment);

    Ok(Json(SrcsetResponse { sources }))
}

#[derive(Deserialize)]
pub struct DnsPrefetchRequest {
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Serialize)]
pub struct DnsPrefetchResponse {
    pub tag: String,
}

pub async fn dns_prefetch(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<DnsPrefetchRequest>, JsonRejection>,
) -> Result<Json<DnsPrefetchResponse>, AppError> {
    authorize(&state, &headers)?;
    let Json(req) = payload?;

    let rewriter = ImgixRewriter::new(req.settings, String::new());
    if !rewriter.settings().is_enabled() {
        tracing::debug!("DNS prefetch: CDN disabled, no tag");
    }

    Ok(Json(DnsPrefetchResponse {
        tag: rewriter.dns_prefetch_tag(),
    }))
}
