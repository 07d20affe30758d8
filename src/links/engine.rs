//! Language markers in URLs.
//!
//! The engine reads, strips and inserts the language marker for whichever
//! addressing scheme the site uses:
//!
//! - query parameter: `/about/?lang=fr`
//! - path prefix: `/fr/about/`, relative to the base path of the home URL
//! - subdomain: `fr.example.com/about/`
//!
//! Localization is idempotent: the marker of another language is removed before the
//! requested one is inserted.

use crate::cache::{get_typed, set_typed, ObjectCache};
use crate::error::LangResult;
use crate::i18n::{AddressingScheme, Language, LanguageRegistry, Settings};
use crate::links::url::{DetectionSource, LocalizedUrl};
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use tracing::{debug, warn};

pub(crate) const LINKS_CACHE_GROUP: &str = "localized_links";

static SUBDOMAIN_REGEX: OnceLock<Regex> = OnceLock::new();
static PATH_PREFIX_REGEX: OnceLock<Regex> = OnceLock::new();

/// Language detected in a URL, together with the URL stripped of its marker.
#[derive(Debug, Clone)]
pub struct Detection {
    pub url: LocalizedUrl,
    pub language: Option<Language>,
    pub source: DetectionSource,
    /// Raw value of the language query argument, whether it named a language or not
    pub requested: Option<String>,
}

/// Runs after detection and may override its outcome.
pub trait DetectionHook: Send + Sync {
    fn filter_detection(&self, detection: &mut Detection);
}

/// Runs on every localized URL after the marker has been inserted.
pub trait LinkFilter: Send + Sync {
    fn filter_link(&self, url: &mut LocalizedUrl, language: &Language);
}

pub struct LinkEngine {
    registry: Arc<LanguageRegistry>,
    cache: Arc<dyn ObjectCache>,
    suspended: AtomicUsize,
    detection_hooks: RwLock<Vec<Arc<dyn DetectionHook>>>,
    link_filters: RwLock<Vec<Arc<dyn LinkFilter>>>,
}

/// Keeps localization suspended until dropped.
#[must_use = "localization resumes as soon as the guard is dropped"]
pub struct SuspendGuard<'a> {
    engine: &'a LinkEngine,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.engine.suspended.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LinkEngine {
    pub fn new(registry: Arc<LanguageRegistry>, cache: Arc<dyn ObjectCache>) -> Self {
        Self {
            registry,
            cache,
            suspended: AtomicUsize::new(0),
            detection_hooks: RwLock::new(Vec::new()),
            link_filters: RwLock::new(Vec::new()),
        }
    }

    pub fn add_detection_hook(&self, hook: Arc<dyn DetectionHook>) {
        self.detection_hooks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(hook);
    }

    pub fn add_link_filter(&self, filter: Arc<dyn LinkFilter>) {
        self.link_filters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(filter);
        self.clear_cache();
    }

    /// Forget every cached localization.
    pub fn clear_cache(&self) {
        self.cache.flush_group(LINKS_CACHE_GROUP);
    }

    /// Suspend localization until the returned guard is dropped. Nests.
    pub fn suspend(&self) -> SuspendGuard<'_> {
        self.suspended.fetch_add(1, Ordering::SeqCst);
        SuspendGuard { engine: self }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst) > 0
    }

    /// The unlocalized home URL.
    pub fn home(&self) -> LocalizedUrl {
        home_url(&self.registry.settings())
    }

    // ==================== Detection ====================

    /// Find the language of `url` and strip its marker.
    ///
    /// A language query argument wins over any scheme marker. Unknown values are
    /// left in place and detection falls through to the scheme marker.
    pub fn detect(&self, url: &LocalizedUrl) -> Detection {
        let settings = self.registry.settings();
        let home = home_url(&settings);
        let mut url = url.clone();

        let requested = url.arg(&settings.query_var).map(str::to_string);
        let mut found = requested
            .as_deref()
            .and_then(|value| self.language_for_slug(value))
            .map(|language| (language, DetectionSource::RequestParameter));

        if found.is_some() {
            url.remove_arg(&settings.query_var);
        } else {
            found = self.take_marker(&mut url, &settings, &home);
        }

        let (language, source) = match found {
            Some((language, source)) => (Some(language), source),
            None => (None, DetectionSource::None),
        };
        url.language = language.as_ref().map(|lang| lang.id);
        url.source = source;

        let mut detection = Detection {
            url,
            language,
            source,
            requested,
        };

        let hooks = self
            .detection_hooks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for hook in hooks {
            hook.filter_detection(&mut detection);
        }

        debug!(
            "Detected language {:?} from {:?}",
            detection.language.as_ref().map(|lang| &lang.slug),
            detection.source
        );
        detection
    }

    pub fn detect_str(&self, url: &str) -> LangResult<Detection> {
        Ok(self.detect(&LocalizedUrl::parse(url)?))
    }

    // ==================== Localization ====================

    /// Remove every language marker from `url`.
    pub fn delocalize(&self, url: &LocalizedUrl) -> LocalizedUrl {
        let settings = self.registry.settings();
        let home = home_url(&settings);
        let mut url = url.clone();
        self.strip_markers(&mut url, &settings, &home);
        url.language = None;
        url.source = DetectionSource::None;
        url
    }

    pub fn delocalize_str(&self, url: &str) -> LangResult<String> {
        Ok(self.delocalize(&LocalizedUrl::parse(url)?).build())
    }

    /// Rewrite `url` so that it points to `language`.
    ///
    /// The marker is omitted for the default language when the site hides it,
    /// unless `force` is set. Excluded paths and URLs of other hosts come back
    /// delocalized but otherwise untouched. Relative URLs are made absolute against
    /// the home URL.
    pub fn localize(&self, url: &LocalizedUrl, language: &Language, force: bool) -> LocalizedUrl {
        if self.is_suspended() {
            return url.clone();
        }

        // Read before the settings so an entry is never filed under a newer revision
        let revision = self.registry.revision();
        let settings = self.registry.settings();
        let home = home_url(&settings);
        let mut url = url.clone();
        if url.host.is_none() {
            url.scheme = home.scheme.clone();
            url.host = home.host.clone();
            url.port = home.port;
        }

        let key = format!(
            "{}|{}|{}|{}|{}",
            revision,
            language.id,
            language.slug,
            force,
            url.build()
        );
        if let Some(cached) = get_typed::<String>(self.cache.as_ref(), LINKS_CACHE_GROUP, &key) {
            if let Ok(mut hit) = LocalizedUrl::parse(&cached) {
                hit.language = Some(language.id);
                return hit;
            }
        }

        self.strip_markers(&mut url, &settings, &home);

        let hidden = settings.hide_default && !force && self.registry.is_default(language);
        if !hidden && self.is_localizable(&url, &settings, &home) {
            insert_marker(&mut url, language, &settings, &home);
        }
        url.language = Some(language.id);
        url.source = DetectionSource::None;

        let filters = self
            .link_filters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for filter in filters {
            filter.filter_link(&mut url, language);
        }

        set_typed(self.cache.as_ref(), LINKS_CACHE_GROUP, &key, &url.build());
        url
    }

    pub fn localize_str(&self, url: &str, language: &Language, force: bool) -> LangResult<String> {
        Ok(self.localize(&LocalizedUrl::parse(url)?, language, force).build())
    }

    // ==================== Markers ====================

    fn language_for_slug(&self, value: &str) -> Option<Language> {
        self.registry.by_slug(&value.trim().to_lowercase())
    }

    fn strip_markers(&self, url: &mut LocalizedUrl, settings: &Settings, home: &LocalizedUrl) {
        let named = url
            .arg(&settings.query_var)
            .is_some_and(|value| self.language_for_slug(value).is_some());
        if named {
            url.remove_arg(&settings.query_var);
        }
        self.take_marker(url, settings, home);
    }

    /// Strip the scheme marker from `url`, returning the language it named.
    fn take_marker(
        &self,
        url: &mut LocalizedUrl,
        settings: &Settings,
        home: &LocalizedUrl,
    ) -> Option<(Language, DetectionSource)> {
        match settings.scheme {
            AddressingScheme::QueryParameter => None,
            AddressingScheme::Subdomain => self
                .take_subdomain(url, home)
                .map(|language| (language, DetectionSource::Domain)),
            AddressingScheme::PathPrefix => self
                .take_path_prefix(url, home)
                .map(|language| (language, DetectionSource::Path)),
        }
    }

    fn take_subdomain(&self, url: &mut LocalizedUrl, home: &LocalizedUrl) -> Option<Language> {
        let regex = SUBDOMAIN_REGEX.get_or_init(|| Regex::new(r"^([a-z-]+)\.(.+)$").unwrap());
        let host = url.host.as_deref()?;
        let captures = regex.captures(host)?;
        let rest = captures[2].to_string();

        // "www.example.com" must not read as a language when the home host is itself
        if home.host.as_deref().is_some_and(|home_host| home_host != rest) {
            return None;
        }

        let language = self.registry.by_slug(&captures[1])?;
        url.host = Some(rest);
        Some(language)
    }

    fn take_path_prefix(&self, url: &mut LocalizedUrl, home: &LocalizedUrl) -> Option<Language> {
        let regex = PATH_PREFIX_REGEX.get_or_init(|| Regex::new(r"^([a-z-]+)(/.*)?$").unwrap());
        let base = base_path(home);
        let path = url.effective_path();
        let relative = relative_to_base(&path, &base)?;

        let captures = regex.captures(relative)?;
        let language = self.registry.by_slug(&captures[1])?;
        let remainder = captures.get(2).map_or("", |m| m.as_str());
        url.path = format!("{}{}", base, remainder.trim_start_matches('/'));
        Some(language)
    }

    fn is_localizable(&self, url: &LocalizedUrl, settings: &Settings, home: &LocalizedUrl) -> bool {
        if url.host != home.host {
            return false;
        }
        let path = url.effective_path();
        let Some(relative) = relative_to_base(&path, &base_path(home)) else {
            return false;
        };
        let excluded = settings
            .excluded_paths
            .iter()
            .map(|prefix| prefix.trim_matches('/'))
            .filter(|prefix| !prefix.is_empty())
            .any(|prefix| relative.starts_with(prefix));
        if excluded {
            debug!("Not localizing excluded path {}", path);
        }
        !excluded
    }
}

fn insert_marker(url: &mut LocalizedUrl, language: &Language, settings: &Settings, home: &LocalizedUrl) {
    match settings.scheme {
        AddressingScheme::QueryParameter => url.set_arg(&settings.query_var, &language.slug),
        AddressingScheme::PathPrefix => {
            let base = base_path(home);
            let path = url.effective_path();
            let relative = relative_to_base(&path, &base).unwrap_or("");
            url.path = format!("{}{}/{}", base, language.slug, relative.trim_start_matches('/'));
        }
        AddressingScheme::Subdomain => {
            if let Some(host) = &url.host {
                url.host = Some(format!("{}.{}", language.slug, host));
            }
        }
    }
}

fn home_url(settings: &Settings) -> LocalizedUrl {
    LocalizedUrl::parse(&settings.home_url).unwrap_or_else(|e| {
        warn!("Invalid home URL '{}': {}", settings.home_url, e);
        LocalizedUrl {
            scheme: Some("http".to_string()),
            host: Some("localhost".to_string()),
            path: "/".to_string(),
            ..LocalizedUrl::default()
        }
    })
}

/// Path of the home URL, always with a trailing slash
fn base_path(home: &LocalizedUrl) -> String {
    let mut base = home.effective_path();
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

fn relative_to_base<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    match path.strip_prefix(base) {
        Some(relative) => Some(relative),
        None if path == base.trim_end_matches('/') => Some(""),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::Database;
    use crate::i18n::LanguageDraft;

    // ==================== Helper Functions ====================

    fn create_engine(scheme: AddressingScheme, home_url: &str) -> (LinkEngine, Arc<LanguageRegistry>) {
        create_engine_with_cache(scheme, home_url, Arc::new(MemoryCache::new()))
    }

    fn create_engine_with_cache(
        scheme: AddressingScheme,
        home_url: &str,
        cache: Arc<MemoryCache>,
    ) -> (LinkEngine, Arc<LanguageRegistry>) {
        let registry = Arc::new(LanguageRegistry::new(Database::open_in_memory().unwrap()));
        registry.add_language(LanguageDraft::new("en", "en_US", "English")).unwrap();
        registry.add_language(LanguageDraft::new("fr", "fr_FR", "Français")).unwrap();
        registry.add_language(LanguageDraft::new("de", "de_DE", "Deutsch")).unwrap();
        registry
            .save_settings(Settings {
                home_url: home_url.to_string(),
                scheme,
                default_language: Some(1),
                ..Settings::default()
            })
            .unwrap();
        (LinkEngine::new(registry.clone(), cache), registry)
    }

    fn lang(registry: &LanguageRegistry, slug: &str) -> Language {
        registry.by_slug(slug).unwrap()
    }

    // ==================== Path Prefix Tests ====================

    #[test]
    fn test_detect_path_prefix() {
        let (engine, _) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        let detection = engine.detect_str("https://example.com/fr/about/").unwrap();
        assert_eq!(detection.language.unwrap().slug, "fr");
        assert_eq!(detection.source, DetectionSource::Path);
        assert_eq!(detection.url.build(), "https://example.com/about/");
        assert_eq!(detection.url.language, Some(2));
    }

    #[test]
    fn test_detect_bare_prefix_strips_to_base() {
        let (engine, _) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        let detection = engine.detect_str("https://example.com/de").unwrap();
        assert_eq!(detection.language.unwrap().slug, "de");
        assert_eq!(detection.url.build(), "https://example.com/");
    }

    #[test]
    fn test_detect_ignores_lookalike_segments() {
        let (engine, _) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        let detection = engine.detect_str("https://example.com/french-fries/").unwrap();
        assert!(detection.language.is_none());
        assert_eq!(detection.source, DetectionSource::None);
        assert_eq!(detection.url.path, "/french-fries/");

        let detection = engine.detect_str("https://example.com/fr2/").unwrap();
        assert!(detection.language.is_none());
    }

    #[test]
    fn test_localize_path_prefix() {
        let (engine, registry) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        let fr = lang(&registry, "fr");
        let en = lang(&registry, "en");

        assert_eq!(
            engine.localize_str("https://example.com/about/", &fr, false).unwrap(),
            "https://example.com/fr/about/"
        );
        assert_eq!(
            engine.localize_str("https://example.com/about/", &en, false).unwrap(),
            "https://example.com/about/"
        );
        assert_eq!(
            engine.localize_str("https://example.com/about/", &en, true).unwrap(),
            "https://example.com/en/about/"
        );
        assert_eq!(engine.localize_str("/", &fr, false).unwrap(), "https://example.com/fr/");
    }

    #[test]
    fn test_localize_replaces_existing_marker() {
        let (engine, registry) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        let fr = lang(&registry, "fr");
        assert_eq!(
            engine.localize_str("https://example.com/de/about/", &fr, false).unwrap(),
            "https://example.com/fr/about/"
        );
        assert_eq!(
            engine.localize_str("https://example.com/fr/about/", &fr, false).unwrap(),
            "https://example.com/fr/about/"
        );
    }

    #[test]
    fn test_base_path_is_respected() {
        let (engine, registry) = create_engine(AddressingScheme::PathPrefix, "https://example.com/blog/");
        let fr = lang(&registry, "fr");

        assert_eq!(
            engine.localize_str("https://example.com/blog/about/", &fr, false).unwrap(),
            "https://example.com/blog/fr/about/"
        );
        let detection = engine.detect_str("https://example.com/blog/fr/about/").unwrap();
        assert_eq!(detection.language.unwrap().slug, "fr");
        assert_eq!(detection.url.path, "/blog/about/");

        // outside the base path nothing is a marker
        let detection = engine.detect_str("https://example.com/fr/about/").unwrap();
        assert!(detection.language.is_none());
    }

    #[test]
    fn test_localize_keeps_pagination() {
        let (engine, registry) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        let fr = lang(&registry, "fr");
        let mut url = LocalizedUrl::parse("https://example.com/news/").unwrap();
        url.page = Some(2);
        assert_eq!(
            engine.localize(&url, &fr, false).build(),
            "https://example.com/fr/news/page/2/"
        );
    }

    // ==================== Subdomain Tests ====================

    #[test]
    fn test_detect_subdomain() {
        let (engine, _) = create_engine(AddressingScheme::Subdomain, "https://example.com/");
        let detection = engine.detect_str("https://de.example.com/kontakt/").unwrap();
        assert_eq!(detection.language.unwrap().slug, "de");
        assert_eq!(detection.source, DetectionSource::Domain);
        assert_eq!(detection.url.build(), "https://example.com/kontakt/");
    }

    #[test]
    fn test_subdomain_requires_home_host() {
        let (engine, _) = create_engine(AddressingScheme::Subdomain, "https://example.com/");
        let detection = engine.detect_str("https://fr.other.org/").unwrap();
        assert!(detection.language.is_none());
        assert_eq!(detection.url.host.as_deref(), Some("fr.other.org"));
    }

    #[test]
    fn test_localize_subdomain() {
        let (engine, registry) = create_engine(AddressingScheme::Subdomain, "https://example.com/");
        let fr = lang(&registry, "fr");
        let en = lang(&registry, "en");
        assert_eq!(
            engine.localize_str("https://de.example.com/about/", &fr, false).unwrap(),
            "https://fr.example.com/about/"
        );
        assert_eq!(
            engine.localize_str("https://de.example.com/about/", &en, false).unwrap(),
            "https://example.com/about/"
        );
    }

    // ==================== Query Parameter Tests ====================

    #[test]
    fn test_detect_query_parameter() {
        let (engine, _) = create_engine(AddressingScheme::QueryParameter, "https://example.com/");
        let detection = engine.detect_str("https://example.com/?p=4&lang=fr").unwrap();
        assert_eq!(detection.language.unwrap().slug, "fr");
        assert_eq!(detection.source, DetectionSource::RequestParameter);
        assert_eq!(detection.requested.as_deref(), Some("fr"));
        assert_eq!(detection.url.build(), "https://example.com/?p=4");
    }

    #[test]
    fn test_unknown_query_value_is_left_alone() {
        let (engine, _) = create_engine(AddressingScheme::QueryParameter, "https://example.com/");
        let detection = engine.detect_str("https://example.com/?lang=xx").unwrap();
        assert!(detection.language.is_none());
        assert_eq!(detection.requested.as_deref(), Some("xx"));
        assert_eq!(detection.url.arg("lang"), Some("xx"));
    }

    #[test]
    fn test_query_parameter_wins_over_path() {
        let (engine, _) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        let detection = engine.detect_str("https://example.com/de/about/?lang=fr").unwrap();
        assert_eq!(detection.language.unwrap().slug, "fr");
        assert_eq!(detection.source, DetectionSource::RequestParameter);
    }

    #[test]
    fn test_localize_query_parameter() {
        let (engine, registry) = create_engine(AddressingScheme::QueryParameter, "https://example.com/");
        let fr = lang(&registry, "fr");
        let en = lang(&registry, "en");
        assert_eq!(
            engine.localize_str("https://example.com/?p=4", &fr, false).unwrap(),
            "https://example.com/?p=4&lang=fr"
        );
        assert_eq!(
            engine.localize_str("https://example.com/?p=4&lang=de", &en, false).unwrap(),
            "https://example.com/?p=4"
        );
    }

    // ==================== Delocalize Tests ====================

    #[test]
    fn test_delocalize_inverts_localize() {
        for scheme in [
            AddressingScheme::QueryParameter,
            AddressingScheme::PathPrefix,
            AddressingScheme::Subdomain,
        ] {
            let (engine, registry) = create_engine(scheme, "https://example.com/");
            let base = LocalizedUrl::parse("https://example.com/shop/item/?color=red").unwrap();
            for language in registry.list() {
                let localized = engine.localize(&base, &language, true);
                assert_eq!(engine.delocalize(&localized).build(), base.build());
                assert_eq!(engine.localize(&localized, &language, true).build(), localized.build());
            }
        }
    }

    // ==================== Exclusion Tests ====================

    #[test]
    fn test_excluded_paths_are_not_localized() {
        let (engine, registry) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        let fr = lang(&registry, "fr");
        assert_eq!(
            engine.localize_str("https://example.com/wp-admin/options.php", &fr, false).unwrap(),
            "https://example.com/wp-admin/options.php"
        );
    }

    #[test]
    fn test_foreign_hosts_are_not_localized() {
        let (engine, registry) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        let fr = lang(&registry, "fr");
        assert_eq!(
            engine.localize_str("https://other.org/about/", &fr, false).unwrap(),
            "https://other.org/about/"
        );
    }

    // ==================== Suspension Tests ====================

    #[test]
    fn test_suspension_nests() {
        let (engine, registry) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        let fr = lang(&registry, "fr");
        {
            let _outer = engine.suspend();
            {
                let _inner = engine.suspend();
                assert!(engine.is_suspended());
            }
            assert!(engine.is_suspended());
            assert_eq!(engine.localize_str("/about/", &fr, false).unwrap(), "/about/");
        }
        assert!(!engine.is_suspended());
        assert_eq!(
            engine.localize_str("/about/", &fr, false).unwrap(),
            "https://example.com/fr/about/"
        );
    }

    // ==================== Hook Tests ====================

    struct TrackingFilter;

    impl LinkFilter for TrackingFilter {
        fn filter_link(&self, url: &mut LocalizedUrl, language: &Language) {
            url.set_arg("hl", &language.slug);
        }
    }

    struct ForceGerman(Language);

    impl DetectionHook for ForceGerman {
        fn filter_detection(&self, detection: &mut Detection) {
            if detection.language.is_none() {
                detection.language = Some(self.0.clone());
                detection.source = DetectionSource::Default;
            }
        }
    }

    #[test]
    fn test_link_filter_runs_after_marker() {
        let (engine, registry) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        let fr = lang(&registry, "fr");
        engine.add_link_filter(Arc::new(TrackingFilter));
        assert_eq!(
            engine.localize_str("/about/", &fr, false).unwrap(),
            "https://example.com/fr/about/?hl=fr"
        );
    }

    #[test]
    fn test_detection_hook_overrides() {
        let (engine, registry) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        engine.add_detection_hook(Arc::new(ForceGerman(lang(&registry, "de"))));

        let detection = engine.detect_str("https://example.com/about/").unwrap();
        assert_eq!(detection.language.unwrap().slug, "de");

        let detection = engine.detect_str("https://example.com/fr/about/").unwrap();
        assert_eq!(detection.language.unwrap().slug, "fr");
    }

    // ==================== Cache Tests ====================

    #[test]
    fn test_repeated_localization_hits_cache() {
        let cache = Arc::new(MemoryCache::new());
        let (engine, registry) =
            create_engine_with_cache(AddressingScheme::PathPrefix, "https://example.com/", cache.clone());
        let fr = lang(&registry, "fr");

        let first = engine.localize_str("/about/", &fr, false).unwrap();
        let hits_before = cache.metrics().hits();
        let second = engine.localize_str("/about/", &fr, false).unwrap();
        assert_eq!(first, second);
        assert!(cache.metrics().hits() > hits_before);

        engine.clear_cache();
        assert_eq!(engine.localize_str("/about/", &fr, false).unwrap(), first);
    }

    #[test]
    fn test_cached_links_follow_settings_changes() {
        let (engine, registry) = create_engine(AddressingScheme::PathPrefix, "https://example.com/");
        let en = lang(&registry, "en");
        let fr = lang(&registry, "fr");
        assert_eq!(
            engine.localize_str("/about/", &en, false).unwrap(),
            "https://example.com/about/"
        );
        assert_eq!(
            engine.localize_str("/about/", &fr, false).unwrap(),
            "https://example.com/fr/about/"
        );

        let mut settings = registry.settings();
        settings.hide_default = false;
        registry.save_settings(settings).unwrap();
        assert_eq!(
            engine.localize_str("/about/", &en, false).unwrap(),
            "https://example.com/en/about/"
        );

        let mut settings = registry.settings();
        settings.hide_default = true;
        registry.save_settings(settings).unwrap();
        registry.set_default_language(fr.id).unwrap();
        assert_eq!(
            engine.localize_str("/about/", &fr, false).unwrap(),
            "https://example.com/about/"
        );
        assert_eq!(
            engine.localize_str("/about/", &en, false).unwrap(),
            "https://example.com/en/about/"
        );

        let mut settings = registry.settings();
        settings.excluded_paths.push("about".to_string());
        registry.save_settings(settings).unwrap();
        assert_eq!(
            engine.localize_str("/about/", &en, false).unwrap(),
            "https://example.com/about/"
        );
    }

    #[test]
    fn test_link_cache_stays_bounded() {
        let cache = Arc::new(MemoryCache::bounded(100, None));
        let (engine, registry) =
            create_engine_with_cache(AddressingScheme::PathPrefix, "https://example.com/", cache.clone());
        let fr = lang(&registry, "fr");

        for i in 0..1_000 {
            let localized = engine
                .localize_str(&format!("/search/?q={}", i), &fr, false)
                .unwrap();
            assert_eq!(localized, format!("https://example.com/fr/search/?q={}", i));
        }
        assert!(cache.len() <= 100);
    }
}
