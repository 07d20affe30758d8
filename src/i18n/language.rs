//! Language records as stored in the configuration blob.

use crate::error::{LangError, LangResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Stable identifier of a configured language. Never reassigned.
pub type LanguageId = i64;

/// Slug reserved for the "no language" sentinel of listing filters.
pub const RESERVED_SLUG: &str = "none";

static SLUG_REGEX: OnceLock<Regex> = OnceLock::new();
static LOCALE_REGEX: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

/// Field used by [`LanguageRegistry::find`](crate::i18n::LanguageRegistry::find).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageField {
    Id,
    Slug,
    Locale,
    Name,
    SystemName,
    ShortName,
}

/// A configured language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: LanguageId,

    /// URL-safe token used as the marker in localized URLs (e.g. "fr")
    pub slug: String,

    /// Locale tag (e.g. "fr_FR")
    pub locale: String,

    /// Name in the language itself (e.g. "Français")
    pub name: String,

    /// Name in the system language (e.g. "French")
    #[serde(default)]
    pub system_name: String,

    /// Short label for compact switchers (e.g. "FR")
    #[serde(default)]
    pub short_name: String,

    #[serde(default)]
    pub direction: TextDirection,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Position in the language list; lower comes first
    #[serde(default)]
    pub order: i32,
}

fn default_active() -> bool {
    true
}

impl Language {
    /// Stand-in used when no language is configured at all.
    pub fn placeholder() -> Self {
        Self {
            id: 0,
            slug: "en".to_string(),
            locale: "en_US".to_string(),
            name: "English".to_string(),
            system_name: "English".to_string(),
            short_name: "EN".to_string(),
            direction: TextDirection::Ltr,
            active: true,
            order: 0,
        }
    }

    /// ISO 639 part of the locale tag ("pt" for "pt_BR")
    pub fn iso_code(&self) -> &str {
        self.locale
            .split(&['_', '-'][..])
            .next()
            .unwrap_or(self.locale.as_str())
    }

    /// Locale tag in W3C form ("pt-BR" for "pt_BR"), as used by `hreflang`
    pub fn w3c_tag(&self) -> String {
        self.locale.replace('_', "-")
    }

    pub fn is_rtl(&self) -> bool {
        self.direction == TextDirection::Rtl
    }

    /// Same checks as [`LanguageDraft::validate`], for languages that arrive whole
    /// (configuration imports).
    pub fn validate(&self) -> LangResult<()> {
        validate_fields(&self.slug, &self.locale, &self.name)
    }

    /// Value of a field rendered as text, for lookups
    pub fn field(&self, field: LanguageField) -> String {
        match field {
            LanguageField::Id => self.id.to_string(),
            LanguageField::Slug => self.slug.clone(),
            LanguageField::Locale => self.locale.clone(),
            LanguageField::Name => self.name.clone(),
            LanguageField::SystemName => self.system_name.clone(),
            LanguageField::ShortName => self.short_name.clone(),
        }
    }
}

fn validate_fields(slug: &str, locale: &str, name: &str) -> LangResult<()> {
    let slug_regex = SLUG_REGEX.get_or_init(|| Regex::new(r"^[a-z-]+$").unwrap());
    let locale_regex = LOCALE_REGEX
        .get_or_init(|| Regex::new(r"^[a-z]{2,3}(?:[_-][A-Za-z0-9]{2,8})*$").unwrap());

    if !slug_regex.is_match(slug) {
        return Err(LangError::InvalidInput(format!(
            "Language slug '{}' must only contain lowercase letters and dashes",
            slug
        )));
    }
    if slug == RESERVED_SLUG {
        return Err(LangError::InvalidInput(format!(
            "Language slug '{}' is reserved",
            slug
        )));
    }
    if !locale_regex.is_match(locale) {
        return Err(LangError::InvalidInput(format!(
            "Invalid locale tag: '{}'",
            locale
        )));
    }
    if name.trim().is_empty() {
        return Err(LangError::InvalidInput(
            "Language name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Editable part of a language, submitted by administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDraft {
    pub slug: String,
    pub locale: String,
    pub name: String,
    #[serde(default)]
    pub system_name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub direction: TextDirection,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub order: i32,
}

impl LanguageDraft {
    pub fn new(slug: &str, locale: &str, name: &str) -> Self {
        Self {
            slug: slug.to_string(),
            locale: locale.to_string(),
            name: name.to_string(),
            system_name: None,
            short_name: None,
            direction: TextDirection::Ltr,
            active: true,
            order: 0,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_direction(mut self, direction: TextDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Check the fields that do not depend on the other configured languages.
    pub fn validate(&self) -> LangResult<()> {
        validate_fields(&self.slug, &self.locale, &self.name)
    }

    /// Turn the draft into a language carrying `id`.
    pub fn into_language(self, id: LanguageId) -> Language {
        let short_name = self
            .short_name
            .unwrap_or_else(|| self.slug.to_uppercase());
        let system_name = self.system_name.unwrap_or_else(|| self.name.clone());
        Language {
            id,
            slug: self.slug,
            locale: self.locale,
            name: self.name,
            system_name,
            short_name,
            direction: self.direction,
            active: self.active,
            order: self.order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Language Tests ====================

    #[test]
    fn test_placeholder() {
        let language = Language::placeholder();
        assert_eq!(language.id, 0);
        assert_eq!(language.slug, "en");
        assert!(language.active);
    }

    #[test]
    fn test_iso_code_and_w3c_tag() {
        let language = LanguageDraft::new("pt", "pt_BR", "Português").into_language(3);
        assert_eq!(language.iso_code(), "pt");
        assert_eq!(language.w3c_tag(), "pt-BR");

        let bare = LanguageDraft::new("de", "de", "Deutsch").into_language(4);
        assert_eq!(bare.iso_code(), "de");
    }

    #[test]
    fn test_field_access() {
        let language = LanguageDraft::new("fr", "fr_FR", "Français").into_language(2);
        assert_eq!(language.field(LanguageField::Id), "2");
        assert_eq!(language.field(LanguageField::ShortName), "FR");
        assert_eq!(language.field(LanguageField::SystemName), "Français");
    }

    #[test]
    fn test_language_validate_matches_draft_rules() {
        let valid = LanguageDraft::new("pt-br", "pt_BR", "Português").into_language(1);
        assert!(valid.validate().is_ok());

        let mut digits = valid.clone();
        digits.slug = "fr2".to_string();
        assert!(digits.validate().is_err());
        assert!(LanguageDraft::new("fr2", "fr_FR", "Français").validate().is_err());

        let mut reserved = valid.clone();
        reserved.slug = RESERVED_SLUG.to_string();
        assert_eq!(reserved.validate().unwrap_err().code(), "invalid_input");

        let mut locale = valid;
        locale.locale = "not a locale".to_string();
        assert!(locale.validate().is_err());
    }

    #[test]
    fn test_rtl() {
        let arabic = LanguageDraft::new("ar", "ar", "العربية")
            .with_direction(TextDirection::Rtl)
            .into_language(5);
        assert!(arabic.is_rtl());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let language: Language = serde_json::from_str(
            r#"{"id": 1, "slug": "en", "locale": "en_US", "name": "English"}"#,
        )
        .unwrap();
        assert!(language.active);
        assert_eq!(language.direction, TextDirection::Ltr);
        assert_eq!(language.order, 0);
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_accepts_regular_language() {
        assert!(LanguageDraft::new("pt-br", "pt_BR", "Português").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_slug() {
        for slug in ["FR", "f r", "", "fr1"] {
            let result = LanguageDraft::new(slug, "fr_FR", "Français").validate();
            assert!(result.is_err(), "slug {:?} should be rejected", slug);
        }
    }

    #[test]
    fn test_validate_rejects_reserved_slug() {
        let err = LanguageDraft::new("none", "fr_FR", "Français")
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn test_validate_rejects_bad_locale_and_name() {
        assert!(LanguageDraft::new("fr", "French", "Français").validate().is_err());
        assert!(LanguageDraft::new("fr", "fr_FR", "  ").validate().is_err());
    }
}
