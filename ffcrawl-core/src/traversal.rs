use crate::error::{CrawlError, Result};
use crate::extract::{Candidate, ScanScope, first_accepted_link};
use crate::policy::LinkPolicy;
use crate::trail::{Page, Trail};
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use url::Url;

/// Called once per step with the follow count so far and the current
/// article name, before its page is fetched.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// How a finished trip ended.
#[derive(Debug)]
pub enum Outcome {
    /// The tail article matched the target pattern.
    Matched { follows: usize },
    /// An external interrupt stopped the crawl between steps.
    Cancelled,
    /// Transport or markup failure, or the start page dead-ended.
    Failed(CrawlError),
}

/// A completed (or interrupted) trip: every page still on the trail in
/// visit order, start first, plus how the run ended. Pages backtracked
/// past are not part of the report.
#[derive(Debug)]
pub struct Trip {
    pub pages: Vec<Page>,
    pub outcome: Outcome,
}

impl Trip {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Outcome::Matched { .. })
    }
}

/// Drives the step-extract-accept-advance-or-backtrack cycle over a
/// corpus of articles until the target pattern matches, a dead end at
/// the start page is hit, or the crawl is cancelled.
pub struct Crawler {
    client: Client,
    policy: LinkPolicy,
    scope: ScanScope,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_timeout(base, 10)
    }

    pub fn with_timeout(base: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent("ffcrawl/0.1 (https://github.com/trapdoorsec/ffcrawl)")
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(timeout_secs.div_ceil(2)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            policy: LinkPolicy::new(base),
            scope: ScanScope::default(),
            progress_callback: None,
        }
    }

    pub fn with_scope(mut self, scope: ScanScope) -> Self {
        self.scope = scope;
        self
    }

    /// Accept-almost-anything mode: drop the corpus-boundary and
    /// article-shape rules, keeping only visited-set dedup.
    pub fn with_article_only(mut self, article_only: bool) -> Self {
        self.policy = self.policy.with_article_only(article_only);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn policy(&self) -> &LinkPolicy {
        &self.policy
    }

    /// Runs the traversal from `start` until the base-stripped tail
    /// identifier matches `target`.
    ///
    /// `cancel` is a cooperative flag set by an external listener; it is
    /// observed between steps, so at most one extra fetch happens after
    /// it is raised. Whatever the trail holds at a terminal state is the
    /// report, for failures and interrupts as much as for a match.
    pub async fn run(&self, start: Url, target: &Regex, cancel: Arc<AtomicBool>) -> Trip {
        info!("Starting first-link crawl at {start}");

        let mut trail = Trail::new(Page::new(start));
        let mut visited: HashSet<String> = HashSet::new();

        let outcome = loop {
            if cancel.load(Ordering::SeqCst) {
                info!("crawl interrupted after {} follows", trail.len() - 1);
                break Outcome::Cancelled;
            }

            let tail = trail.tail().clone();
            // Once visited, never revisited, even after a backtrack.
            visited.insert(tail.url.as_str().to_string());

            let name = self
                .policy
                .strip_base(&tail.url)
                .unwrap_or_else(|| tail.url.as_str());
            if target.is_match(name) {
                let follows = trail.len() - 1;
                info!("Found match at {name}, took {follows} follows");
                break Outcome::Matched { follows };
            }

            if let Some(ref callback) = self.progress_callback {
                callback(trail.len() - 1, name.to_string());
            }

            match self.follow_first_link(&tail.url, &visited).await {
                Ok(Some(candidate)) => {
                    debug!("following {}", candidate.url);
                    trail.advance(Page::with_title(candidate.url, candidate.title));
                }
                Ok(None) => match trail.backtrack() {
                    // The popped page stays in the visited set, so the
                    // re-exposed tail cannot re-propose this branch.
                    Some(popped) => {
                        warn!("no qualifying link on {}, backtracking", popped.url);
                    }
                    None => break Outcome::Failed(CrawlError::StartDeadEnd),
                },
                Err(e) => break Outcome::Failed(e),
            }
        };

        Trip {
            pages: trail.into_pages(),
            outcome,
        }
    }

    /// Fetches one document and scans it for the first link the policy
    /// accepts. `Ok(None)` means the page is a dead end.
    async fn follow_first_link(
        &self,
        url: &Url,
        visited: &HashSet<String>,
    ) -> Result<Option<Candidate>> {
        debug!("Fetching {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;

        first_accepted_link(&body, url, &self.scope, |candidate| {
            self.policy.accept(candidate, visited)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn article(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(format!(
                r#"<html><body><div id="mw-content-text">{body}</div></body></html>"#
            ))
    }

    async fn mount_article(server: &MockServer, name: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/wiki/{name}")))
            .respond_with(article(body))
            .mount(server)
            .await;
    }

    fn crawler_for(server: &MockServer) -> (Crawler, String) {
        let base = format!("{}/wiki/", server.uri());
        (Crawler::new(base.clone()), base)
    }

    fn names(trip: &Trip, base: &str) -> Vec<String> {
        trip.pages
            .iter()
            .map(|p| p.url.as_str().trim_start_matches(base).to_string())
            .collect()
    }

    /// Vehicle -> Transport -> Car, each page's first in-scope anchor
    /// pointing at the next.
    #[tokio::test]
    async fn follows_first_links_until_the_target_matches() {
        let server = MockServer::start().await;
        mount_article(
            &server,
            "Vehicle",
            r#"<p>A <a href="/wiki/Transport" title="Transport">transport</a> machine.</p>"#,
        )
        .await;
        mount_article(
            &server,
            "Transport",
            r#"<p>Moving a <a href="/wiki/Car" title="Car">car</a> around.</p>"#,
        )
        .await;
        // No mock for Car: the match is decided before any fetch of the
        // matching page, so requesting it would 404 and fail the run.

        let (crawler, base) = crawler_for(&server);
        let start = Url::parse(&format!("{base}Vehicle")).unwrap();
        let target = Regex::new("Car").unwrap();

        let trip = crawler
            .run(start, &target, Arc::new(AtomicBool::new(false)))
            .await;

        assert!(trip.succeeded());
        assert!(matches!(trip.outcome, Outcome::Matched { follows: 2 }));
        assert_eq!(names(&trip, &base), vec!["Vehicle", "Transport", "Car"]);
        assert_eq!(trip.pages[2].title.as_deref(), Some("Car"));
    }

    /// A page whose only anchor points back at itself is a dead end at
    /// the start: the self-link is rejected as visited.
    #[tokio::test]
    async fn self_link_only_start_page_is_a_dead_end() {
        let server = MockServer::start().await;
        mount_article(
            &server,
            "Ouroboros",
            r#"<p>See <a href="/wiki/Ouroboros">itself</a>.</p>"#,
        )
        .await;

        let (crawler, base) = crawler_for(&server);
        let start = Url::parse(&format!("{base}Ouroboros")).unwrap();
        let target = Regex::new("Unreachable").unwrap();

        let trip = crawler
            .run(start, &target, Arc::new(AtomicBool::new(false)))
            .await;

        assert!(matches!(
            trip.outcome,
            Outcome::Failed(CrawlError::StartDeadEnd)
        ));
        assert_eq!(names(&trip, &base), vec!["Ouroboros"]);
    }

    /// Start -> Linkless dead-ends and backtracks; the re-scan of Start
    /// must skip the now-visited first candidate and take the second.
    #[tokio::test]
    async fn backtracking_takes_the_next_distinct_branch() {
        let server = MockServer::start().await;
        mount_article(
            &server,
            "Start",
            r#"<p><a href="/wiki/Linkless">first</a> then <a href="/wiki/Car">second</a></p>"#,
        )
        .await;
        mount_article(&server, "Linkless", r#"<p>Nothing to follow here.</p>"#).await;

        let (crawler, base) = crawler_for(&server);
        let start = Url::parse(&format!("{base}Start")).unwrap();
        let target = Regex::new("^Car$").unwrap();

        let trip = crawler
            .run(start, &target, Arc::new(AtomicBool::new(false)))
            .await;

        assert!(matches!(trip.outcome, Outcome::Matched { follows: 1 }));
        assert_eq!(names(&trip, &base), vec!["Start", "Car"]);
    }

    /// Every branch dead-ends: backtracking strictly shrinks the trail
    /// back to the start and reports the distinguished condition, with
    /// no candidate ever proposed twice.
    #[tokio::test]
    async fn exhausted_backtracking_ends_at_the_start_dead_end() {
        let server = MockServer::start().await;
        mount_article(
            &server,
            "Start",
            r#"<p><a href="/wiki/A">a</a> <a href="/wiki/B">b</a></p>"#,
        )
        .await;
        mount_article(&server, "A", r#"<p>dead end</p>"#).await;
        mount_article(&server, "B", r#"<p>also <a href="/wiki/A">a</a></p>"#).await;

        let (crawler, base) = crawler_for(&server);
        let start = Url::parse(&format!("{base}Start")).unwrap();
        let target = Regex::new("Unreachable").unwrap();

        let trip = crawler
            .run(start, &target, Arc::new(AtomicBool::new(false)))
            .await;

        assert!(matches!(
            trip.outcome,
            Outcome::Failed(CrawlError::StartDeadEnd)
        ));
        assert_eq!(names(&trip, &base), vec!["Start"]);
        // A was fetched exactly once even though B links to it again.
        let fetches = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/wiki/A")
            .count();
        assert_eq!(fetches, 1);
    }

    /// A cancellation raised during a step is observed before the next
    /// one: at most one extra follow happens, and the report is a strict
    /// prefix of the uninterrupted trip.
    #[tokio::test]
    async fn cancellation_yields_a_prefix_of_the_trip() {
        let server = MockServer::start().await;
        mount_article(
            &server,
            "Vehicle",
            r#"<p><a href="/wiki/Transport">next</a></p>"#,
        )
        .await;
        mount_article(
            &server,
            "Transport",
            r#"<p><a href="/wiki/Car">next</a></p>"#,
        )
        .await;

        let cancel = Arc::new(AtomicBool::new(false));
        let raise = cancel.clone();

        let (crawler, base) = crawler_for(&server);
        let crawler = crawler.with_progress_callback(Arc::new(move |_, _| {
            raise.store(true, Ordering::SeqCst);
        }));
        let start = Url::parse(&format!("{base}Vehicle")).unwrap();
        let target = Regex::new("Car").unwrap();

        let trip = crawler.run(start, &target, cancel).await;

        assert!(matches!(trip.outcome, Outcome::Cancelled));
        // Flag raised while scanning Vehicle; the in-flight step still
        // advances to Transport, then the flag is observed.
        assert_eq!(names(&trip, &base), vec!["Vehicle", "Transport"]);
    }

    #[tokio::test]
    async fn cancellation_before_the_first_step_reports_only_the_start() {
        let server = MockServer::start().await;
        let (crawler, base) = crawler_for(&server);
        let start = Url::parse(&format!("{base}Vehicle")).unwrap();
        let target = Regex::new("Car").unwrap();

        let trip = crawler
            .run(start, &target, Arc::new(AtomicBool::new(true)))
            .await;

        assert!(matches!(trip.outcome, Outcome::Cancelled));
        assert_eq!(names(&trip, &base), vec!["Vehicle"]);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_fatal_and_keeps_the_partial_trail() {
        let server = MockServer::start().await;
        mount_article(
            &server,
            "Vehicle",
            r#"<p><a href="/wiki/Broken">next</a></p>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/wiki/Broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (crawler, base) = crawler_for(&server);
        let start = Url::parse(&format!("{base}Vehicle")).unwrap();
        let target = Regex::new("Unreachable").unwrap();

        let trip = crawler
            .run(start, &target, Arc::new(AtomicBool::new(false)))
            .await;

        assert!(matches!(trip.outcome, Outcome::Failed(CrawlError::Http(_))));
        assert_eq!(names(&trip, &base), vec!["Vehicle", "Broken"]);
    }

    /// A stream cut off mid-tag is a markup fault, not a dead end: the
    /// run aborts with the parse condition and the trail up to the bad
    /// page is still the report.
    #[tokio::test]
    async fn mangled_markup_is_fatal_and_keeps_the_partial_trail() {
        let server = MockServer::start().await;
        mount_article(
            &server,
            "Vehicle",
            r#"<p><a href="/wiki/Mangled">next</a></p>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/wiki/Mangled"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(r#"<div id="mw-content-text"><p><a href="/wiki/Cut"#),
            )
            .mount(&server)
            .await;

        let (crawler, base) = crawler_for(&server);
        let start = Url::parse(&format!("{base}Vehicle")).unwrap();
        let target = Regex::new("Unreachable").unwrap();

        let trip = crawler
            .run(start, &target, Arc::new(AtomicBool::new(false)))
            .await;

        assert!(matches!(
            trip.outcome,
            Outcome::Failed(CrawlError::Parse(_))
        ));
        assert_eq!(names(&trip, &base), vec!["Vehicle", "Mangled"]);
    }

    /// A start article that already matches the target needs no fetch.
    #[tokio::test]
    async fn start_article_matching_the_target_is_an_immediate_match() {
        let server = MockServer::start().await;
        let (crawler, base) = crawler_for(&server);
        let start = Url::parse(&format!("{base}Car")).unwrap();
        let target = Regex::new("Car").unwrap();

        let trip = crawler
            .run(start, &target, Arc::new(AtomicBool::new(false)))
            .await;

        assert!(matches!(trip.outcome, Outcome::Matched { follows: 0 }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
