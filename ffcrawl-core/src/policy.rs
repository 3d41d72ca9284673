use std::collections::HashSet;
use tracing::trace;
use url::Url;

/// Decides whether a candidate link may be followed.
///
/// A pure function of the candidate and the visited set; the rules are
/// checked in order and short-circuit:
/// 1. never revisit a page,
/// 2. never leave the corpus (candidate must start with `base`),
/// 3. only top-level articles: the part after `base` may not contain a
///    namespace separator (`:`), a path separator (`/`) or a fragment
///    marker (`#`).
/// With `article_only` off, only rule 1 applies.
#[derive(Debug, Clone)]
pub struct LinkPolicy {
    base: String,
    article_only: bool,
}

impl LinkPolicy {
    pub fn new(base: impl Into<String>) -> Self {
        // Candidates arrive Url-normalized (lowercase scheme and host),
        // so the boundary must be normalized the same way or every
        // prefix check fails. A base without a trailing slash would
        // leave a '/' in the stripped remainder and reject everything.
        let raw = base.into();
        let mut base = Url::parse(&raw).map(|u| u.to_string()).unwrap_or(raw);
        if !base.ends_with('/') {
            base.push('/');
        }
        Self {
            base,
            article_only: true,
        }
    }

    pub fn with_article_only(mut self, article_only: bool) -> Self {
        self.article_only = article_only;
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// The identifier with the corpus base stripped, e.g.
    /// `https://en.wikipedia.org/wiki/Car` -> `Car`. `None` when the
    /// URL lies outside the corpus.
    pub fn strip_base<'a>(&self, url: &'a Url) -> Option<&'a str> {
        url.as_str().strip_prefix(self.base.as_str())
    }

    pub fn accept(&self, candidate: &Url, visited: &HashSet<String>) -> bool {
        // Don't revisit pages
        if visited.contains(candidate.as_str()) {
            trace!("rejecting {candidate}: already visited");
            return false;
        }

        if !self.article_only {
            return true;
        }

        // Don't leave the world of the corpus
        let Some(rest) = self.strip_base(candidate) else {
            trace!("rejecting {candidate}: outside corpus");
            return false;
        };

        // Cannot be a namespaced resource page, a sub page, or a
        // same-page hash link
        if rest.contains(':') || rest.contains('/') || rest.contains('#') {
            trace!("rejecting {candidate}: not a top-level article");
            return false;
        }

        true
    }
}
