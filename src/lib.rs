//! Translation groups and language-aware URLs for multilingual content sites.
//!
//! - `i18n`: the language registry and site settings
//! - `translations`: translation groups linking objects across languages
//! - `links`: URL parsing, language markers, request resolution
//! - `site`: the services wired together
//! - `server`: the HTTP front controller

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod i18n;
pub mod links;
pub mod server;
pub mod site;
pub mod translations;

pub use error::{ErrorKind, LangError, LangResult};
pub use site::Site;
