//! Scalar options of the site configuration blob.

use crate::i18n::LanguageId;
use serde::{Deserialize, Serialize};

/// How the language marker is carried by a URL. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressingScheme {
    /// `?lang=fr`
    #[default]
    QueryParameter,
    /// `/fr/about/`
    PathPrefix,
    /// `fr.example.com`
    Subdomain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectKind {
    #[default]
    Temporary,
    Permanent,
}

impl RedirectKind {
    pub fn status_code(self) -> u16 {
        match self {
            RedirectKind::Temporary => 302,
            RedirectKind::Permanent => 301,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Unlocalized home URL; its path is the site's base path
    pub home_url: String,

    pub scheme: AddressingScheme,

    /// Query argument carrying the language slug
    pub query_var: String,

    pub default_language: Option<LanguageId>,

    /// Omit the marker from URLs in the default language
    pub hide_default: bool,

    /// Objects without a language read as the default language
    pub language_required: bool,

    pub redirect: RedirectKind,

    /// Fall back to the Accept-Language header before the default language
    pub browser_preference: bool,

    /// Object types that may carry a language
    pub translatable_types: Vec<String>,

    /// Path prefixes, relative to the base path, that are never localized
    pub excluded_paths: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home_url: "http://localhost/".to_string(),
            scheme: AddressingScheme::QueryParameter,
            query_var: "lang".to_string(),
            default_language: None,
            hide_default: true,
            language_required: false,
            redirect: RedirectKind::Temporary,
            browser_preference: true,
            translatable_types: vec!["post".to_string(), "page".to_string(), "term".to_string()],
            excluded_paths: vec![
                "wp-admin".to_string(),
                "wp-login.php".to_string(),
                "wp-json".to_string(),
            ],
        }
    }
}

impl Settings {
    pub fn is_translatable(&self, object_type: &str) -> bool {
        self.translatable_types.iter().any(|t| t == object_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_serialization() {
        let json = serde_json::to_string(&AddressingScheme::PathPrefix).unwrap();
        assert_eq!(json, "\"path-prefix\"");
        let scheme: AddressingScheme = serde_json::from_str("\"subdomain\"").unwrap();
        assert_eq!(scheme, AddressingScheme::Subdomain);
    }

    #[test]
    fn test_partial_blob_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"scheme": "path-prefix", "hide_default": false}"#).unwrap();
        assert_eq!(settings.scheme, AddressingScheme::PathPrefix);
        assert!(!settings.hide_default);
        assert_eq!(settings.query_var, "lang");
        assert!(settings.is_translatable("post"));
        assert!(!settings.is_translatable("attachment"));
    }

    #[test]
    fn test_redirect_status_codes() {
        assert_eq!(RedirectKind::Temporary.status_code(), 302);
        assert_eq!(RedirectKind::Permanent.status_code(), 301);
    }
}
