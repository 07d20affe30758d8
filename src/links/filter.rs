//! Language filters on listings, as given in a `lang` query argument.
//!
//! A filter value is a comma-separated list of language slugs or ids. The reserved
//! value `none` selects objects without a language.

use crate::error::{LangError, LangResult};
use crate::i18n::{LanguageId, LanguageRegistry, RESERVED_SLUG};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageSelector {
    Language(LanguageId),
    NoLanguage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageFilter {
    selectors: Vec<LanguageSelector>,
}

impl LanguageFilter {
    pub fn parse(value: &str, registry: &LanguageRegistry) -> LangResult<Self> {
        let mut selectors = Vec::new();

        for item in value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            let selector = if item.eq_ignore_ascii_case(RESERVED_SLUG) {
                LanguageSelector::NoLanguage
            } else {
                let language = match item.parse::<LanguageId>() {
                    Ok(id) => registry.get(id),
                    Err(_) => registry.by_slug(&item.to_lowercase()),
                };
                let language = language.ok_or_else(|| {
                    LangError::InvalidInput(format!("Unknown language '{}' in filter", item))
                })?;
                LanguageSelector::Language(language.id)
            };

            if !selectors.contains(&selector) {
                selectors.push(selector);
            }
        }

        if selectors.is_empty() {
            return Err(LangError::InvalidInput("Empty language filter".to_string()));
        }
        Ok(Self { selectors })
    }

    pub fn selectors(&self) -> &[LanguageSelector] {
        &self.selectors
    }

    pub fn languages(&self) -> Vec<LanguageId> {
        self.selectors
            .iter()
            .filter_map(|selector| match selector {
                LanguageSelector::Language(id) => Some(*id),
                LanguageSelector::NoLanguage => None,
            })
            .collect()
    }

    pub fn includes_untranslated(&self) -> bool {
        self.selectors.contains(&LanguageSelector::NoLanguage)
    }

    /// Whether an object in `language` (or in none) passes the filter.
    pub fn matches(&self, language: Option<LanguageId>) -> bool {
        match language {
            Some(id) => self.selectors.contains(&LanguageSelector::Language(id)),
            None => self.includes_untranslated(),
        }
    }

    /// Render the filter back into a query argument value using slugs.
    pub fn to_query_value(&self, registry: &LanguageRegistry) -> String {
        self.selectors
            .iter()
            .filter_map(|selector| match selector {
                LanguageSelector::Language(id) => registry.get(*id).map(|lang| lang.slug),
                LanguageSelector::NoLanguage => Some(RESERVED_SLUG.to_string()),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::i18n::LanguageDraft;

    fn create_registry() -> LanguageRegistry {
        let registry = LanguageRegistry::new(Database::open_in_memory().unwrap());
        registry.add_language(LanguageDraft::new("en", "en_US", "English")).unwrap();
        registry.add_language(LanguageDraft::new("fr", "fr_FR", "Français")).unwrap();
        registry
    }

    #[test]
    fn test_parse_slugs_and_ids() {
        let registry = create_registry();
        let filter = LanguageFilter::parse("fr, 1,FR", &registry).unwrap();
        assert_eq!(filter.languages(), vec![2, 1]);
        assert!(!filter.includes_untranslated());
        assert_eq!(filter.to_query_value(&registry), "fr,en");
    }

    #[test]
    fn test_none_selects_untranslated() {
        let registry = create_registry();
        let filter = LanguageFilter::parse("none,en", &registry).unwrap();
        assert!(filter.matches(None));
        assert!(filter.matches(Some(1)));
        assert!(!filter.matches(Some(2)));
        assert_eq!(filter.to_query_value(&registry), "none,en");
    }

    #[test]
    fn test_unknown_language_is_invalid_input() {
        let registry = create_registry();
        let err = LanguageFilter::parse("en,xx", &registry).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
        assert!(LanguageFilter::parse("7", &registry).is_err());
        assert!(LanguageFilter::parse(" , ", &registry).is_err());
    }
}
