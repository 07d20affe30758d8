//! Wiring of the services that make up a multilingual site.

use crate::cache::{CacheReport, MemoryCache};
use crate::config::Config;
use crate::db::{Database, ObjectId};
use crate::error::{LangError, LangResult};
use crate::i18n::{Language, LanguageId, LanguageRegistry, Settings};
use crate::links::{LanguageResolver, LinkEngine, LocalizedUrl};
use crate::translations::{ObjectType, TranslationStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The configuration blob as exchanged in files: languages plus settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfiguration {
    pub languages: Vec<Language>,
    pub settings: Settings,
}

/// A translation of an object, for `<link rel="alternate" hreflang="...">`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlternateLink {
    pub language: String,
    pub hreflang: String,
    pub object_id: ObjectId,
    pub url: String,
}

pub struct Site {
    pub db: Database,
    pub registry: Arc<LanguageRegistry>,
    pub store: Arc<TranslationStore>,
    pub engine: Arc<LinkEngine>,
    pub resolver: LanguageResolver,
    cache: Arc<MemoryCache>,
}

impl Site {
    pub fn new(db: Database, cache: Arc<MemoryCache>) -> Self {
        let registry = Arc::new(LanguageRegistry::new(db.clone()));
        let store = Arc::new(TranslationStore::new(db.clone(), registry.clone(), cache.clone()));
        let engine = Arc::new(LinkEngine::new(registry.clone(), cache.clone()));
        let resolver = LanguageResolver::new(registry.clone(), store.clone(), engine.clone());

        Self {
            db,
            registry,
            store,
            engine,
            resolver,
            cache,
        }
    }

    /// Open the site described by the process configuration.
    pub fn open(config: &Config) -> Result<Self> {
        let db = Database::open(&config.database_path)
            .with_context(|| format!("Failed to open database at {}", config.database_path))?;
        let ttl = match config.cache_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let cache = MemoryCache::bounded(config.cache_max_entries, ttl);
        let site = Self::new(db, Arc::new(cache));

        if let Some(path) = &config.settings_file {
            site.import_configuration(path)?;
        }
        site.registry
            .load()
            .context("Failed to load language configuration")?;

        if let Some(url) = &config.site_url {
            let mut settings = site.registry.settings();
            if &settings.home_url != url {
                LocalizedUrl::parse(url).with_context(|| format!("SITE_URL is not a valid URL: {}", url))?;
                info!("Using home URL {} from the environment", url);
                settings.home_url = url.clone();
                site.registry.save_settings(settings)?;
            }
        }

        if !site.registry.has_languages() {
            warn!("No languages are configured; serving the placeholder language");
        }
        Ok(site)
    }

    /// Replace the stored configuration with the JSON file at `path`.
    pub fn import_configuration(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let configuration: SiteConfiguration = serde_json::from_str(&json)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        self.apply_configuration(configuration)?;
        Ok(())
    }

    pub fn apply_configuration(&self, configuration: SiteConfiguration) -> LangResult<()> {
        self.registry
            .import(configuration.languages, configuration.settings)?;
        self.engine.clear_cache();
        Ok(())
    }

    pub fn export_configuration(&self) -> SiteConfiguration {
        SiteConfiguration {
            languages: if self.registry.has_languages() {
                self.registry.list()
            } else {
                Vec::new()
            },
            settings: self.registry.settings(),
        }
    }

    /// Remove a language together with everything recorded in it.
    ///
    /// Rows are deleted before the language leaves the configuration, so a failed
    /// call can be retried and never leaves rows for an unknown id.
    pub fn delete_language(&self, language_id: LanguageId) -> LangResult<Language> {
        if self.registry.get(language_id).is_none() {
            return Err(LangError::LanguageNotFound(language_id.to_string()));
        }
        let memberships = self.store.delete_language(language_id)?;
        let values = self.db.delete_localized_values_for_language(language_id)?;
        let removed = self.registry.remove_language(language_id)?;
        self.engine.clear_cache();

        info!(
            "Deleted language '{}': {} memberships, {} localized values",
            removed.slug, memberships, values
        );
        Ok(removed)
    }

    // ==================== Localized values ====================

    pub fn localized_value(&self, language_id: LanguageId, object_id: ObjectId, field_key: &str) -> Option<String> {
        match self.db.get_localized_value(language_id, object_id, field_key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read localized value {}/{}: {}", object_id, field_key, e);
                None
            }
        }
    }

    pub fn set_localized_value(
        &self,
        language_id: LanguageId,
        object_id: ObjectId,
        field_key: &str,
        value: &str,
    ) -> LangResult<()> {
        if self.registry.get(language_id).is_none() {
            return Err(LangError::LanguageNotFound(language_id.to_string()));
        }
        self.db.set_localized_value(language_id, object_id, field_key, value)
    }

    pub fn delete_localized_value(&self, language_id: LanguageId, object_id: ObjectId, field_key: &str) -> LangResult<bool> {
        self.db.delete_localized_value(language_id, object_id, field_key)
    }

    // ==================== Links ====================

    /// Alternate URLs of every translation of an object, the object itself included.
    ///
    /// `permalink` maps an object id to its unlocalized URL.
    pub fn alternate_links(
        &self,
        object_type: &ObjectType,
        object_id: ObjectId,
        permalink: impl Fn(ObjectId) -> String,
    ) -> LangResult<Vec<AlternateLink>> {
        if self.store.get_language(object_type, object_id).is_none() {
            return Err(LangError::ObjectWithoutLanguage {
                object_type: object_type.to_string(),
                object_id,
            });
        }

        let translations = self.store.get_all_translations(object_type, object_id, true);
        let mut links = Vec::with_capacity(translations.len());
        for language in self.registry.list_active() {
            let Some(&translation) = translations.get(&language.id) else {
                continue;
            };
            let url = self.engine.localize_str(&permalink(translation), &language, false)?;
            links.push(AlternateLink {
                language: language.slug.clone(),
                hreflang: language.w3c_tag(),
                object_id: translation,
                url,
            });
        }
        Ok(links)
    }

    pub fn cache_report(&self) -> CacheReport {
        self.cache.metrics().report()
    }
}
