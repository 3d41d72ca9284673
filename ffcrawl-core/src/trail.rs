use url::Url;

/// One visited article on the trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Canonical URL of this page. Immutable once created.
    pub url: Url,
    /// Human-readable label taken from the accepted anchor, when present.
    /// The seed page never has one.
    pub title: Option<String>,
}

impl Page {
    pub fn new(url: Url) -> Self {
        Self { url, title: None }
    }

    pub fn with_title(url: Url, title: Option<String>) -> Self {
        Self { url, title }
    }
}

/// The ordered sequence of pages visited so far. Index 0 is the start
/// article; the tail is the page currently being scanned for a link.
///
/// Doubles as the backtrack stack: a dead end pops the tail, but the
/// start page can never be removed, so the trail is never empty.
#[derive(Debug, Clone)]
pub struct Trail {
    pages: Vec<Page>,
}

impl Trail {
    pub fn new(start: Page) -> Self {
        Self { pages: vec![start] }
    }

    pub fn tail(&self) -> &Page {
        // Invariant: pages is never empty.
        self.pages.last().expect("trail is never empty")
    }

    /// Appends a newly followed page, making it the tail.
    pub fn advance(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// Removes the tail after a dead end. Returns the popped page, or
    /// `None` when only the start page remains (backtracking exhausted).
    pub fn backtrack(&mut self) -> Option<Page> {
        if self.pages.len() > 1 {
            self.pages.pop()
        } else {
            None
        }
    }

    pub fn at_start(&self) -> bool {
        self.pages.len() == 1
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }
}
