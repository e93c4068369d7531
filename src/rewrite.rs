use regex::Regex;
use scraper::{Html, Node, Selector};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

/// Name of the query parameter that carries the target URL on the entry point
pub const URL_PARAM: &str = "url";

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").unwrap()
});

/// Generated HTML whose links all route back through the entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPage {
    pub processed_html: String,
}

/// Faults raised while rewriting; never surfaced past [`LinkRewriter::rewrite`]
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("origin URL {0:?} cannot be parsed")]
    Origin(String),

    #[error("failed to rebuild anchor element")]
    Rebuild,

    #[error("anchor node vanished from the document tree")]
    MissingNode,

    #[error("HTML parser panicked")]
    Parser,
}

/// Rewrites every `<a href>` so that following it re-enters the browse endpoint
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    entry_point: Url,
}

impl LinkRewriter {
    /// Create a rewriter that points links at `entry_point` (e.g. `http://localhost:5001/browse`)
    pub fn new(entry_point: Url) -> Self {
        let mut entry_point = entry_point;
        entry_point.set_query(None);
        entry_point.set_fragment(None);
        Self { entry_point }
    }

    pub fn entry_point(&self) -> &Url {
        &self.entry_point
    }

    /// Builds the entry point URL that browses `target`
    pub fn browse_url(&self, target: &str) -> Url {
        let mut url = self.entry_point.clone();
        url.query_pairs_mut().append_pair(URL_PARAM, target);
        url
    }

    /// Rewrites `raw_html` generated for `origin`
    ///
    /// Never fails: on any internal fault the input is passed through unrewritten.
    pub fn rewrite(&self, raw_html: &str, origin: &str) -> RenderedPage {
        let html = strip_code_fence(raw_html);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_rewrite(html, origin)))
            .unwrap_or(Err(RewriteError::Parser));

        let processed_html = match outcome {
            Ok(rewritten) => rewritten,
            Err(e) => {
                ::log::warn!("Serving {} with unrewritten links: {}", origin, e);
                html.to_string()
            }
        };

        RenderedPage { processed_html }
    }

    fn try_rewrite(&self, html: &str, origin: &str) -> Result<String, RewriteError> {
        let base = crate::target::parse_lenient(origin)
            .ok_or_else(|| RewriteError::Origin(origin.to_string()))?;

        let mut doc = Html::parse_document(html);
        let anchor_selector = Selector::parse("a[href]").map_err(|_| RewriteError::Rebuild)?;

        // Collected up front; the tree cannot be mutated while selecting
        let edits = doc
            .select(&anchor_selector)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                let rewritten = self.rewrite_href(&base, href)?;
                let attrs = anchor
                    .value()
                    .attrs()
                    .map(|(name, value)| {
                        let value = if name == "href" { rewritten.as_str() } else { value };
                        (name.to_string(), value.to_string())
                    })
                    .collect::<Vec<(String, String)>>();
                Some((anchor.id(), attrs))
            })
            .collect::<Vec<_>>();

        ::log::debug!("Rewriting {} links on {}", edits.len(), origin);

        for (id, attrs) in edits {
            let element = build_anchor(&attrs)?;
            let mut node = doc.tree.get_mut(id).ok_or(RewriteError::MissingNode)?;
            *node.value() = element;
        }

        Ok(doc.html())
    }

    /// Returns the replacement for `href`, or `None` when it should be left alone
    fn rewrite_href(&self, base: &Url, href: &str) -> Option<String> {
        if self.is_entry_link(href) {
            return None;
        }

        match base.join(href.trim()) {
            Ok(resolved) => Some(self.browse_url(resolved.as_str()).to_string()),
            Err(e) => {
                ::log::debug!("Leaving unresolvable href {:?}: {}", href, e);
                None
            }
        }
    }

    /// Whether `href` already targets the entry point
    fn is_entry_link(&self, href: &str) -> bool {
        let Ok(url) = Url::parse(href) else {
            return false;
        };
        url.origin() == self.entry_point.origin()
            && url.path() == self.entry_point.path()
            && url.query_pairs().any(|(name, _)| name == URL_PARAM)
    }
}

/// Removes a Markdown code fence wrapped around the whole document
fn strip_code_fence(html: &str) -> &str {
    CODE_FENCE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map_or(html, |body| body.as_str())
}

/// Builds a fresh `<a>` element node carrying `attrs`
fn build_anchor(attrs: &[(String, String)]) -> Result<Node, RewriteError> {
    let mut markup = String::from("<a");
    for (name, value) in attrs {
        markup.push(' ');
        markup.push_str(name);
        markup.push_str("=\"");
        markup.push_str(&escape_attr(value));
        markup.push('"');
    }
    markup.push_str("></a>");

    let fragment = Html::parse_fragment(&markup);
    let selector = Selector::parse("a").map_err(|_| RewriteError::Rebuild)?;
    fragment
        .select(&selector)
        .next()
        .map(|anchor| Node::Element(anchor.value().clone()))
        .ok_or(RewriteError::Rebuild)
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
