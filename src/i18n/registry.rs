//! Language registry: the configured languages and site options.
//!
//! The registry is an explicitly constructed service. It loads the configuration
//! blob from the `options` table on first use and keeps it in memory until asked to
//! reload. Read operations never fail: if the blob cannot be read the registry
//! serves a single placeholder language so callers can always dereference a
//! default language.

use crate::db::Database;
use crate::error::{LangError, LangResult};
use crate::i18n::{Language, LanguageDraft, LanguageField, LanguageId, Settings};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, error, info, warn};

const LANGUAGES_OPTION: &str = "languages";
const SETTINGS_OPTION: &str = "settings";

#[derive(Debug, Clone, Default)]
struct RegistryState {
    /// Sorted by list order, then id
    languages: Vec<Language>,
    settings: Settings,
}

impl RegistryState {
    fn sort(&mut self) {
        self.languages.sort_by_key(|lang| (lang.order, lang.id));
    }
}

pub struct LanguageRegistry {
    db: Database,
    state: RwLock<Option<RegistryState>>,
    /// Bumped every time a new state is published
    revision: AtomicU64,
}

impl LanguageRegistry {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            state: RwLock::new(None),
            revision: AtomicU64::new(0),
        }
    }

    /// Changes whenever languages or settings change. Derived data keyed on it
    /// goes stale with the configuration it was computed from.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn publish(&self, guard: &mut Option<RegistryState>, state: RegistryState) {
        *guard = Some(state);
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    // ==================== Loading ====================

    /// Populate the registry from the database. Does nothing if already loaded.
    pub fn load(&self) -> LangResult<()> {
        if self.read_state().is_some() {
            return Ok(());
        }
        self.reload()
    }

    /// Re-read the configuration blob, discarding what is in memory.
    pub fn reload(&self) -> LangResult<()> {
        let state = self.read_from_db()?;
        debug!("Loaded {} languages", state.languages.len());
        let mut guard = self.write_state();
        self.publish(&mut guard, state);
        Ok(())
    }

    fn read_from_db(&self) -> LangResult<RegistryState> {
        let languages = match self.db.get_option(LANGUAGES_OPTION)? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        let settings = match self.db.get_option(SETTINGS_OPTION)? {
            Some(json) => serde_json::from_str(&json)?,
            None => Settings::default(),
        };

        let mut state = RegistryState {
            languages,
            settings,
        };
        state.sort();
        Ok(state)
    }

    fn persist(&self, state: &RegistryState) -> LangResult<()> {
        self.db
            .set_option(LANGUAGES_OPTION, &serde_json::to_string(&state.languages)?)?;
        self.db
            .set_option(SETTINGS_OPTION, &serde_json::to_string(&state.settings)?)?;
        Ok(())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Option<RegistryState>> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, Option<RegistryState>> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` against the loaded state, loading it first if needed.
    fn with_state<T>(&self, f: impl FnOnce(&RegistryState) -> T) -> T {
        if let Err(e) = self.load() {
            error!("Failed to load language configuration: {}", e);
            return f(&RegistryState::default());
        }
        match self.read_state().as_ref() {
            Some(state) => f(state),
            None => f(&RegistryState::default()),
        }
    }

    /// Apply a change to a fresh copy of the state, persist it, then publish it.
    fn mutate<T>(&self, f: impl FnOnce(&mut RegistryState) -> LangResult<T>) -> LangResult<T> {
        self.load()?;
        let mut guard = self.write_state();
        let mut state = guard.clone().unwrap_or_default();
        let value = f(&mut state)?;
        state.sort();
        self.persist(&state)?;
        self.publish(&mut guard, state);
        Ok(value)
    }

    // ==================== Lookups ====================

    /// All configured languages in list order. Never empty.
    pub fn list(&self) -> Vec<Language> {
        self.with_state(|state| {
            if state.languages.is_empty() {
                vec![Language::placeholder()]
            } else {
                state.languages.clone()
            }
        })
    }

    /// Active languages in list order
    pub fn list_active(&self) -> Vec<Language> {
        self.list().into_iter().filter(|lang| lang.active).collect()
    }

    /// Whether at least one language has been configured
    pub fn has_languages(&self) -> bool {
        self.with_state(|state| !state.languages.is_empty())
    }

    pub fn get(&self, id: LanguageId) -> Option<Language> {
        self.list().into_iter().find(|lang| lang.id == id)
    }

    /// Exact, case-sensitive slug lookup, as used for URL markers.
    pub fn by_slug(&self, slug: &str) -> Option<Language> {
        self.list().into_iter().find(|lang| lang.slug == slug)
    }

    /// Case-insensitive lookup.
    ///
    /// Without an explicit field the value is compared with the id and the slug.
    pub fn find(&self, value: &str, field: Option<LanguageField>) -> Option<Language> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        self.list().into_iter().find(|lang| match field {
            Some(field) => lang.field(field).eq_ignore_ascii_case(value),
            None => {
                lang.id.to_string() == value || lang.slug.eq_ignore_ascii_case(value)
            }
        })
    }

    /// Match an HTTP language tag (e.g. `en-US`) against the configured languages.
    pub fn match_tag(&self, tag: &str) -> Option<Language> {
        match_tag_among(tag, &self.list())
    }

    /// The default language.
    ///
    /// Falls back to the first language in list order when the configured default no
    /// longer exists; that correction is written back.
    pub fn default_language(&self) -> Language {
        let (configured, languages) =
            self.with_state(|state| (state.settings.default_language, state.languages.clone()));

        let Some(first) = languages.first().cloned() else {
            return Language::placeholder();
        };

        if let Some(found) = configured.and_then(|id| languages.iter().find(|lang| lang.id == id)) {
            return found.clone();
        }

        info!(
            "Default language {:?} is not configured, using '{}' instead",
            configured, first.slug
        );
        let fallback_id = first.id;
        if let Err(e) = self.mutate(|state| {
            state.settings.default_language = Some(fallback_id);
            Ok(())
        }) {
            warn!("Failed to persist default language correction: {}", e);
        }
        first
    }

    pub fn is_default(&self, language: &Language) -> bool {
        self.default_language().id == language.id
    }

    pub fn settings(&self) -> Settings {
        self.with_state(|state| state.settings.clone())
    }

    // ==================== Administration ====================

    pub fn save_settings(&self, settings: Settings) -> LangResult<()> {
        self.mutate(|state| {
            state.settings = settings;
            Ok(())
        })
    }

    /// Replace the whole configuration blob.
    ///
    /// Every language must pass the same checks as [`LanguageDraft::validate`].
    pub fn import(&self, languages: Vec<Language>, settings: Settings) -> LangResult<()> {
        for (i, lang) in languages.iter().enumerate() {
            lang.validate()?;
            if languages[..i].iter().any(|other| other.slug == lang.slug) {
                return Err(LangError::InvalidInput(format!(
                    "Duplicate language slug '{}'",
                    lang.slug
                )));
            }
            if languages[..i].iter().any(|other| other.id == lang.id) {
                return Err(LangError::InvalidInput(format!(
                    "Duplicate language id {}",
                    lang.id
                )));
            }
        }

        let mut guard = self.write_state();
        let mut state = RegistryState {
            languages,
            settings,
        };
        state.sort();
        self.persist(&state)?;
        info!("Imported {} languages", state.languages.len());
        self.publish(&mut guard, state);
        Ok(())
    }

    pub fn add_language(&self, draft: LanguageDraft) -> LangResult<Language> {
        draft.validate()?;
        self.mutate(|state| {
            if state.languages.iter().any(|lang| lang.slug == draft.slug) {
                return Err(LangError::InvalidInput(format!(
                    "Language slug '{}' is already used",
                    draft.slug
                )));
            }

            let id = state.languages.iter().map(|lang| lang.id).max().unwrap_or(0) + 1;
            let language = draft.into_language(id);
            state.languages.push(language.clone());

            if state.settings.default_language.is_none() {
                state.settings.default_language = Some(id);
            }
            info!("Added language '{}' (id {})", language.slug, id);
            Ok(language)
        })
    }

    pub fn update_language(&self, id: LanguageId, draft: LanguageDraft) -> LangResult<Language> {
        draft.validate()?;
        self.mutate(|state| {
            if state
                .languages
                .iter()
                .any(|lang| lang.id != id && lang.slug == draft.slug)
            {
                return Err(LangError::InvalidInput(format!(
                    "Language slug '{}' is already used",
                    draft.slug
                )));
            }

            let slot = state
                .languages
                .iter_mut()
                .find(|lang| lang.id == id)
                .ok_or_else(|| LangError::LanguageNotFound(id.to_string()))?;
            *slot = draft.into_language(id);
            Ok(slot.clone())
        })
    }

    /// Remove a language from the configuration. Memberships of the language are
    /// cleaned up by [`Site::delete_language`](crate::site::Site::delete_language).
    pub fn remove_language(&self, id: LanguageId) -> LangResult<Language> {
        self.mutate(|state| {
            let position = state
                .languages
                .iter()
                .position(|lang| lang.id == id)
                .ok_or_else(|| LangError::LanguageNotFound(id.to_string()))?;
            let removed = state.languages.remove(position);
            info!("Removed language '{}' (id {})", removed.slug, id);
            Ok(removed)
        })
    }

    pub fn set_default_language(&self, id: LanguageId) -> LangResult<()> {
        self.mutate(|state| {
            if !state.languages.iter().any(|lang| lang.id == id) {
                return Err(LangError::LanguageNotFound(id.to_string()));
            }
            state.settings.default_language = Some(id);
            Ok(())
        })
    }

    pub fn set_active(&self, id: LanguageId, active: bool) -> LangResult<()> {
        self.mutate(|state| {
            let language = state
                .languages
                .iter_mut()
                .find(|lang| lang.id == id)
                .ok_or_else(|| LangError::LanguageNotFound(id.to_string()))?;
            language.active = active;
            Ok(())
        })
    }
}

/// Match a language tag against `languages`, first exactly on the locale tag, then
/// on the 2-letter ISO prefix. Each pass returns the first hit in list order.
pub fn match_tag_among(tag: &str, languages: &[Language]) -> Option<Language> {
    let tag = tag.trim().to_lowercase().replace('_', "-");
    if tag.is_empty() {
        return None;
    }

    if let Some(exact) = languages
        .iter()
        .find(|lang| lang.w3c_tag().to_lowercase() == tag)
    {
        return Some(exact.clone());
    }

    let prefix = tag.get(..2)?;
    languages
        .iter()
        .find(|lang| lang.iso_code().eq_ignore_ascii_case(prefix))
        .cloned()
}
