//! HTTP front controller.
//!
//! Every GET request that does not hit one of the `/_langlink` endpoints is run
//! through the language resolver. The response is either a redirect to the
//! canonical localized URL or a JSON description of what was resolved.

use crate::cache::CacheReport;
use crate::db::ObjectId;
use crate::error::{ErrorKind, LangError};
use crate::i18n::Language;
use crate::links::{DetectionSource, LocalizedUrl, ResolveRequest};
use crate::site::{AlternateLink, Site};
use crate::translations::{Fallback, ObjectType};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Body of a resolved, non-redirected request
#[derive(Debug, Serialize)]
pub struct ResolvedPage {
    pub language: Language,
    pub source: DetectionSource,
    /// Request URL without its language marker
    pub url: String,
    /// Translation of the requested post in the resolved language
    pub object: Option<ObjectId>,
}

pub fn router(site: Arc<Site>) -> Router {
    Router::new()
        .route("/_langlink/health", get(health))
        .route("/_langlink/cache", get(cache_report))
        .route("/_langlink/alternates/:object_type/:object_id", get(alternates))
        .fallback(resolve_request)
        .layer(TraceLayer::new_for_http())
        .with_state(site)
}

impl IntoResponse for LangError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::UnsupportedOperation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if self.is_expected() {
            warn!("Request failed: {}", self);
        } else {
            error!("Request failed: {}", self);
        }

        let body = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

async fn health(State(site): State<Arc<Site>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "languages": site.registry.list_active().len(),
    }))
}

async fn cache_report(State(site): State<Arc<Site>>) -> Json<CacheReport> {
    Json(site.cache_report())
}

async fn alternates(
    State(site): State<Arc<Site>>,
    Path((object_type, object_id)): Path<(String, ObjectId)>,
) -> Result<Json<Vec<AlternateLink>>, LangError> {
    let object_type = ObjectType::from(object_type.as_str());
    let home = site.engine.home();
    let links = site.alternate_links(&object_type, object_id, |id| {
        let mut url = home.clone();
        url.set_arg(permalink_arg(&object_type), &id.to_string());
        url.build()
    })?;
    Ok(Json(links))
}

async fn resolve_request(
    State(site): State<Arc<Site>>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, LangError> {
    if method != Method::GET && method != Method::HEAD {
        return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response());
    }

    let url = request_url(&site, &headers, &uri);
    let accept_language = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok());
    let post = LocalizedUrl::parse(&url)?
        .arg(permalink_arg(&ObjectType::Post))
        .and_then(|value| value.parse::<ObjectId>().ok());

    let resolution = site.resolver.resolve(&ResolveRequest {
        url: &url,
        accept_language,
        object: post.map(|id| (ObjectType::Post, id)),
    })?;

    if let Some(redirect) = resolution.redirect {
        info!(
            "Redirecting {} to {} ({})",
            url, redirect.location, redirect.status
        );
        let status = StatusCode::from_u16(redirect.status).unwrap_or(StatusCode::FOUND);
        return Ok((status, [(header::LOCATION, redirect.location)]).into_response());
    }

    let object = post.and_then(|id| {
        site.store
            .get_translation(&ObjectType::Post, id, resolution.language.id, Fallback::NotFound)
    });

    Ok(Json(ResolvedPage {
        language: resolution.language,
        source: resolution.source,
        url: resolution.url.build(),
        object,
    })
    .into_response())
}

/// Absolute URL of the request, using the scheme of the home URL.
fn request_url(site: &Site, headers: &HeaderMap, uri: &Uri) -> String {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    match headers.get(header::HOST).and_then(|value| value.to_str().ok()) {
        Some(host) => {
            let scheme = site.engine.home().scheme.unwrap_or_else(|| "http".to_string());
            format!("{}://{}{}", scheme, host, path_and_query)
        }
        None => path_and_query.to_string(),
    }
}

fn permalink_arg(object_type: &ObjectType) -> &'static str {
    match object_type {
        ObjectType::Page => "page_id",
        ObjectType::Term => "cat",
        ObjectType::Post | ObjectType::Other(_) => "p",
    }
}
