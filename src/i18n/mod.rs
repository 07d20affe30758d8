//! Languages and site-wide language options.
//!
//! # Architecture
//!
//! - `language`: the `Language` record and the draft type administrators submit
//! - `settings`: scalar options of the configuration blob (addressing scheme, ...)
//! - `registry`: `LanguageRegistry`, the lazily loaded directory of languages
//! - `accept`: Accept-Language header parsing
//!
//! # Example
//!
//! ```rust,ignore
//! use langlink::db::Database;
//! use langlink::i18n::LanguageRegistry;
//!
//! let registry = LanguageRegistry::new(Database::open("site.db")?);
//! let default = registry.default_language();
//! let french = registry.find("fr", None);
//! ```

mod accept;
mod language;
mod registry;
mod settings;

pub use accept::parse_accept_language;
pub use language::{Language, LanguageDraft, LanguageField, LanguageId, TextDirection, RESERVED_SLUG};
pub use registry::{match_tag_among, LanguageRegistry};
pub use settings::{AddressingScheme, RedirectKind, Settings};
