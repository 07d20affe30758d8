//! Structured, round-trippable URL.
//!
//! A [`LocalizedUrl`] is parsed once, mutated field by field and rebuilt. Query
//! arguments are decoded into an ordered map; the query string is always derived
//! from that map, never stored next to it.
//!
//! Parsing goes through `url::Url`. Canonical form: the path always starts with
//! `/` and the query is `application/x-www-form-urlencoded` (space as `+`).
//! `build(parse(s)) == s` holds for every canonical `s`.

use crate::error::{LangError, LangResult};
use crate::i18n::LanguageId;
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use url::{form_urlencoded, ParseError, Url};

/// Stand-in origin for joining relative input; never appears in a result
const RELATIVE_BASE: &str = "http://relative.invalid/";

static PAGE_SUFFIX_REGEX: OnceLock<Regex> = OnceLock::new();

/// How the language of a request was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionSource {
    #[default]
    None,
    RequestParameter,
    Path,
    Domain,
    AcceptLanguage,
    Object,
    Default,
}

impl DetectionSource {
    /// Whether the language was typed into the URL itself by the visitor.
    pub fn is_marker(self) -> bool {
        matches!(self, DetectionSource::Path | DetectionSource::Domain)
    }
}

/// Loose URL components, as handed over by callers that already split a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedUrl {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: String,
    pub args: IndexMap<String, String>,
    pub fragment: Option<String>,
    /// Forces a paginated path (`.../page/N/`) when greater than 1
    pub page: Option<u32>,

    /// Language found in the URL, if any
    pub language: Option<LanguageId>,
    pub source: DetectionSource,
}

impl LocalizedUrl {
    /// Parse an absolute URL, a protocol-relative URL or a bare path.
    pub fn parse(input: &str) -> LangResult<Self> {
        Self::parse_with_defaults(input, &UrlParts::default())
    }

    /// Parse `input`, taking missing components from `defaults`.
    ///
    /// Relative input is joined onto the URL the defaults describe, so `about/`
    /// under a default path of `/blog/` becomes `/blog/about/`.
    pub fn parse_with_defaults(input: &str, defaults: &UrlParts) -> LangResult<Self> {
        if input.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(LangError::InvalidUrl(input.to_string()));
        }
        let invalid = |e: ParseError| LangError::InvalidUrl(format!("{}: {}", input, e));

        let (parsed, absolute) = match Url::parse(input) {
            Ok(parsed) => (parsed, true),
            Err(ParseError::RelativeUrlWithoutBase) => {
                (base_for(defaults).map_err(invalid)?.join(input).map_err(invalid)?, false)
            }
            Err(e) => return Err(invalid(e)),
        };
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(LangError::InvalidUrl(format!(
                "credentials in URLs are not supported: {}",
                input
            )));
        }

        let authority = absolute || input.starts_with("//");
        let (before_fragment, fragment) = match input.split_once('#') {
            Some((before, _)) => (before, parsed.fragment()),
            None => (input, None),
        };
        let query = before_fragment.contains('?').then(|| parsed.query().unwrap_or_default());
        let has_path = absolute || !(before_fragment.is_empty() || before_fragment.starts_with('?'));

        Ok(Self::from_parts(
            UrlParts {
                scheme: absolute.then(|| parsed.scheme().to_string()),
                host: parsed.host_str().filter(|_| authority).map(str::to_string),
                port: parsed.port().filter(|_| authority),
                path: has_path.then(|| parsed.path().to_string()),
                query: query.map(str::to_string),
                fragment: fragment.map(str::to_string),
            },
            defaults,
        ))
    }

    /// Assemble a URL from components, taking missing ones from `defaults`.
    pub fn from_parts(parts: UrlParts, defaults: &UrlParts) -> Self {
        let args = parts
            .query
            .or_else(|| defaults.query.clone())
            .map(|query| parse_query(&query))
            .unwrap_or_default();

        Self {
            scheme: parts.scheme.or_else(|| defaults.scheme.clone()),
            host: parts.host.or_else(|| defaults.host.clone()),
            port: parts.port.or(defaults.port),
            path: parts
                .path
                .or_else(|| defaults.path.clone())
                .unwrap_or_default(),
            args,
            fragment: parts.fragment.or_else(|| defaults.fragment.clone()),
            page: None,
            language: None,
            source: DetectionSource::None,
        }
    }

    /// Scheme, host and port, for joining relative input onto this URL
    pub fn origin(&self) -> UrlParts {
        UrlParts {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port: self.port,
            ..UrlParts::default()
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.host.is_some()
    }

    /// Host with the port appended when there is one
    pub fn authority(&self) -> Option<String> {
        self.host.as_ref().map(|host| match self.port {
            Some(port) => format!("{}:{}", host, port),
            None => host.clone(),
        })
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }

    pub fn set_arg(&mut self, key: &str, value: &str) {
        self.args.insert(key.to_string(), value.to_string());
    }

    pub fn remove_arg(&mut self, key: &str) -> Option<String> {
        self.args.shift_remove(key)
    }

    /// Query string derived from the arguments (without `?`)
    pub fn query(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.args.iter())
            .finish()
    }

    /// Path as it will be emitted, with the pagination override applied
    pub fn effective_path(&self) -> String {
        let mut path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        if let Some(page) = self.page {
            let suffix = PAGE_SUFFIX_REGEX.get_or_init(|| Regex::new(r"page/\d+/?$").unwrap());
            path = suffix.replace(&path, "").into_owned();
            if !path.ends_with('/') {
                path.push('/');
            }
            if page > 1 {
                path.push_str(&format!("page/{}/", page));
            }
        }
        path
    }

    /// Rebuild the URL string from the current fields.
    pub fn build(&self) -> String {
        let mut out = String::new();

        if let Some(authority) = self.authority() {
            if let Some(scheme) = &self.scheme {
                out.push_str(scheme);
                out.push(':');
            }
            out.push_str("//");
            out.push_str(&authority);
        }

        out.push_str(&self.effective_path());

        if !self.args.is_empty() {
            out.push('?');
            out.push_str(&self.query());
        }

        if let Some(fragment) = &self.fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }

    /// Compare two URLs as locations, ignoring a trailing slash on the path.
    pub fn same_location(&self, other: &LocalizedUrl) -> bool {
        fn normalized(url: &LocalizedUrl) -> String {
            let mut trimmed = url.clone();
            let path = url.effective_path();
            trimmed.path = path.trim_end_matches('/').to_string();
            trimmed.page = None;
            trimmed.build()
        }
        normalized(self) == normalized(other)
    }
}

impl fmt::Display for LocalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

/// Base that relative input is joined onto. Only the path of the base can end up
/// in the result; the other components come from the defaults themselves.
fn base_for(defaults: &UrlParts) -> Result<Url, ParseError> {
    let path = defaults.path.as_deref().unwrap_or("/");
    let base = Url::parse(RELATIVE_BASE)?;
    if path.starts_with('/') {
        base.join(path)
    } else {
        base.join(&format!("/{}", path))
    }
}

fn parse_query(query: &str) -> IndexMap<String, String> {
    form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}
