//! URLs and the language they carry.
//!
//! - `url`: `LocalizedUrl`, the structured URL every other part works on
//! - `engine`: detecting, inserting and stripping language markers
//! - `policy`: resolving the language of a request and the redirect to issue
//! - `filter`: `lang=` filters on listings

mod engine;
mod filter;
mod policy;
mod url;

pub use engine::{Detection, DetectionHook, LinkEngine, LinkFilter, SuspendGuard};
pub use filter::{LanguageFilter, LanguageSelector};
pub use policy::{LanguageResolver, Redirect, Resolution, ResolveRequest};
pub use url::{DetectionSource, LocalizedUrl, UrlParts};
