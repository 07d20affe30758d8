//! Picking the language of a request and deciding whether to redirect.
//!
//! Resolution order:
//!
//! 1. the language query argument
//! 2. the scheme marker (path prefix or subdomain)
//! 3. the language of the queried object
//! 4. the Accept-Language header, when the site honors browser preferences
//! 5. the default language
//!
//! An explicit language that is inactive does not stick: resolution falls through
//! to the next steps and the visitor is redirected to the canonical URL.

use crate::db::ObjectId;
use crate::error::LangResult;
use crate::i18n::{match_tag_among, parse_accept_language, Language, LanguageRegistry};
use crate::links::engine::LinkEngine;
use crate::links::url::{DetectionSource, LocalizedUrl};
use crate::translations::{ObjectType, TranslationStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// What the resolver knows about an incoming request.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest<'a> {
    pub url: &'a str,
    pub accept_language: Option<&'a str>,
    /// The object the request is about, if routing already found one
    pub object: Option<(ObjectType, ObjectId)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub location: String,
    pub status: u16,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub language: Language,
    pub source: DetectionSource,
    /// The request URL without any language marker
    pub url: LocalizedUrl,
    pub redirect: Option<Redirect>,
}

pub struct LanguageResolver {
    registry: Arc<LanguageRegistry>,
    store: Arc<TranslationStore>,
    engine: Arc<LinkEngine>,
}

impl LanguageResolver {
    pub fn new(registry: Arc<LanguageRegistry>, store: Arc<TranslationStore>, engine: Arc<LinkEngine>) -> Self {
        Self {
            registry,
            store,
            engine,
        }
    }

    /// The language a URL asks for, taken literally.
    ///
    /// Unlike [`resolve`](Self::resolve) this honors inactive languages; callers
    /// presenting the result to visitors should treat an inactive language as not
    /// found.
    pub fn requested_language(&self, url: &str) -> LangResult<Option<Language>> {
        Ok(self.engine.detect_str(url)?.language)
    }

    /// Resolve the language of a request. Only fails on a malformed URL.
    pub fn resolve(&self, request: &ResolveRequest<'_>) -> LangResult<Resolution> {
        let requested = LocalizedUrl::parse(request.url)?;
        let detection = self.engine.detect(&requested);
        let explicit = detection.language.clone();

        let (language, source) = match &explicit {
            Some(language) if language.active => (language.clone(), detection.source),
            Some(language) => {
                info!(
                    "Requested language '{}' is inactive, resolving from other signals",
                    language.slug
                );
                self.fall_through(request)
            }
            None => self.fall_through(request),
        };

        let redirect = self.redirect_for(&requested, &detection.url, &language, source, explicit.as_ref());

        debug!(
            "Resolved {} to '{}' via {:?}",
            request.url, language.slug, source
        );
        Ok(Resolution {
            language,
            source,
            url: detection.url,
            redirect,
        })
    }

    /// Steps 3 to 5, for requests without a usable explicit language.
    fn fall_through(&self, request: &ResolveRequest<'_>) -> (Language, DetectionSource) {
        if let Some((object_type, object_id)) = &request.object {
            if let Some(language) = self.store.get_language(object_type, *object_id) {
                if language.active {
                    return (language, DetectionSource::Object);
                }
            }
        }

        let settings = self.registry.settings();
        if settings.browser_preference {
            if let Some(header) = request.accept_language {
                let active = self.registry.list_active();
                let preferred = parse_accept_language(header)
                    .iter()
                    .find_map(|tag| match_tag_among(tag, &active));
                if let Some(language) = preferred {
                    return (language, DetectionSource::AcceptLanguage);
                }
            }
        }

        (self.registry.default_language(), DetectionSource::Default)
    }

    fn redirect_for(
        &self,
        requested: &LocalizedUrl,
        delocalized: &LocalizedUrl,
        language: &Language,
        source: DetectionSource,
        explicit: Option<&Language>,
    ) -> Option<Redirect> {
        let canonical = self.engine.localize(delocalized, language, source.is_marker());

        let mut current = requested.clone();
        if current.host.is_none() {
            let home = self.engine.home();
            current.scheme = home.scheme;
            current.host = home.host;
            current.port = home.port;
        }

        if canonical.same_location(&current) {
            if explicit.is_some_and(|lang| lang.id != language.id) {
                // redirecting to the same place would loop
                debug!("Canonical URL equals the request, not redirecting");
            }
            return None;
        }

        let status = self.registry.settings().redirect.status_code();
        Some(Redirect {
            location: canonical.build(),
            status,
        })
    }
}
