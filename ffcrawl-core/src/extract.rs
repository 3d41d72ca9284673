use crate::error::Result;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, trace};
use url::Url;

/// Wikipedia puts the main section of an article within a div tag
/// with the id "mw-content-text".
pub const DEFAULT_CONTAINER_ID: &str = "mw-content-text";

/// Which part of a document is eligible for link extraction.
///
/// With the defaults, an accepted tag sequence looks like the
/// pseudo-expression `<div id="mw-content-text"><div>*<p>+<a href=..>`.
#[derive(Debug, Clone)]
pub struct ScanScope {
    /// `id` attribute of the div that demarcates the article body.
    /// `None` scans the whole document.
    pub container_id: Option<String>,
    /// Only consider anchors nested inside a `<p>` element.
    pub paragraphs_only: bool,
}

impl Default for ScanScope {
    fn default() -> Self {
        Self {
            container_id: Some(DEFAULT_CONTAINER_ID.to_string()),
            paragraphs_only: true,
        }
    }
}

impl ScanScope {
    pub fn anywhere() -> Self {
        Self {
            container_id: None,
            paragraphs_only: false,
        }
    }
}

/// A link the scan stopped at: the resolved destination plus the
/// anchor's `title` attribute when it carried one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: Url,
    pub title: Option<String>,
}

/// Streams the markup of `html` in document order and returns the first
/// anchor inside `scope` whose resolved destination `accept` approves.
///
/// Rejection does not stop the scan; it continues through the remaining
/// anchors of the stream. Exhausting the stream without an acceptance is
/// the `Ok(None)` outcome, distinct from a malformed-stream error.
/// Anchors whose href cannot be resolved against `base` are skipped.
pub fn first_accepted_link<F>(
    html: &str,
    base: &Url,
    scope: &ScanScope,
    mut accept: F,
) -> Result<Option<Candidate>>
where
    F: FnMut(&Url) -> bool,
{
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    // Scope state: whether the scan position is inside the container div
    // (with a depth counter so inner divs don't end the scope early) and
    // how many qualifying <p> elements are currently open.
    let mut in_container = scope.container_id.is_none();
    let mut div_depth = 0usize;
    let mut p_depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(tag) => {
                let name = tag.local_name();
                if name.as_ref().eq_ignore_ascii_case(b"script")
                    || name.as_ref().eq_ignore_ascii_case(b"style")
                {
                    // Raw-text elements: their content is code, not
                    // markup. A "</div>" inside a script string must not
                    // close the scope, so consume up to the matching end
                    // tag without touching the counters.
                    reader.read_to_end(tag.name())?;
                } else if name.as_ref().eq_ignore_ascii_case(b"div") {
                    if scope.container_id.is_none() {
                        continue;
                    }
                    if in_container {
                        // Descend into an inner div
                        div_depth += 1;
                    } else if attr_value(&tag, b"id").as_deref()
                        == scope.container_id.as_deref()
                    {
                        trace!("entering content container");
                        in_container = true;
                        div_depth = 0;
                    }
                } else if in_container && name.as_ref().eq_ignore_ascii_case(b"p") {
                    p_depth += 1;
                } else if name.as_ref().eq_ignore_ascii_case(b"a")
                    && in_container
                    && (!scope.paragraphs_only || p_depth > 0)
                    && let Some(found) = propose_anchor(&tag, base, &mut accept)
                {
                    return Ok(Some(found));
                }
            }
            // Self-closing tags carry no content: an empty div or p needs
            // no depth bookkeeping, but a self-closing anchor still has a
            // followable href.
            Event::Empty(tag) => {
                if tag.local_name().as_ref().eq_ignore_ascii_case(b"a")
                    && in_container
                    && (!scope.paragraphs_only || p_depth > 0)
                    && let Some(found) = propose_anchor(&tag, base, &mut accept)
                {
                    return Ok(Some(found));
                }
            }
            Event::End(tag) => {
                let name = tag.local_name();
                if name.as_ref().eq_ignore_ascii_case(b"div") {
                    if in_container && scope.container_id.is_some() {
                        if div_depth == 0 {
                            trace!("leaving content container");
                            in_container = false;
                            p_depth = 0;
                        } else {
                            div_depth -= 1;
                        }
                    }
                } else if in_container
                    && name.as_ref().eq_ignore_ascii_case(b"p")
                    && p_depth > 0
                {
                    p_depth -= 1;
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Resolves one anchor's href against the document URL and offers it to
/// `accept`. `None` covers a missing or unresolvable href (that anchor
/// is skipped) as well as a rejection; the caller keeps scanning either
/// way.
fn propose_anchor<F>(
    tag: &quick_xml::events::BytesStart<'_>,
    base: &Url,
    accept: &mut F,
) -> Option<Candidate>
where
    F: FnMut(&Url) -> bool,
{
    let href = attr_value(tag, b"href")?;
    let Ok(destination) = base.join(&href) else {
        debug!("skipping unparseable href {:?}", href);
        return None;
    };
    if accept(&destination) {
        let title = attr_value(tag, b"title");
        Some(Candidate {
            url: destination,
            title,
        })
    } else {
        None
    }
}

/// First occurrence of the named attribute on a start tag, unescaped.
/// Attribute parsing is html-relaxed; broken attributes are ignored.
fn attr_value(tag: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> Option<String> {
    tag.html_attributes()
        .with_checks(false)
        .flatten()
        .find(|attr| attr.key.as_ref().eq_ignore_ascii_case(name))
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}
