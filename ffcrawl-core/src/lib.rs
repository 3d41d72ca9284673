pub mod error;
pub mod extract;
pub mod policy;
pub mod trail;
pub mod traversal;

pub use error::CrawlError;
pub use extract::{Candidate, DEFAULT_CONTAINER_ID, ScanScope};
pub use policy::LinkPolicy;
pub use trail::{Page, Trail};
pub use traversal::{Crawler, Outcome, ProgressCallback, Trip};

/// The corpus everything defaults to.
pub const DEFAULT_BASE: &str = "https://en.wikipedia.org/wiki/";

/// Resolves an article name against a corpus base URL, e.g.
/// (`https://en.wikipedia.org/wiki/`, `Vehicle`) into the full
/// identifier. Fails before any fetch happens.
pub fn resolve_article(base: &str, name: &str) -> error::Result<url::Url> {
    url::Url::parse(&format!("{base}{name}"))
        .map_err(|e| CrawlError::InvalidUrl(format!("{base}{name}: {e}")))
}
