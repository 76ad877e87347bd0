//! CSS-selector accessors over fetched HTML, shared by whole pages and by
//! HTML fragments embedded in feed entries.
//!
//! Crawler definitions read single attributes off single elements, so the
//! accessors return `Option<String>` and a selector that matches nothing is
//! simply `None`. Relative URLs are resolved against the document URL.

use scraper::{Html, Selector};
use tracing::warn;
use url::Url;

/// A fetched HTML document.
#[derive(Debug, Clone)]
pub struct Page {
    base: Option<Url>,
    html: String,
}

impl Page {
    pub(crate) fn new(base: Option<Url>, html: String) -> Self {
        Self { base, html }
    }

    /// `src` attribute of the first element matching the selector, resolved
    /// to an absolute URL.
    pub fn src(&self, selector: &str) -> Option<String> {
        self.url_attr(selector, "src")
    }

    /// `href` attribute of the first match, resolved to an absolute URL.
    pub fn href(&self, selector: &str) -> Option<String> {
        self.url_attr(selector, "href")
    }

    /// `alt` attribute of the first match.
    pub fn alt(&self, selector: &str) -> Option<String> {
        self.attr(selector, "alt")
    }

    /// `title` attribute of the first match. Hover text, for the comics that
    /// hide the punchline there.
    pub fn title_attr(&self, selector: &str) -> Option<String> {
        self.attr(selector, "title")
    }

    /// Concatenated text content of the first match.
    pub fn text(&self, selector: &str) -> Option<String> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(&self.html);
        let element = document.select(&selector).next()?;
        let text: String = element.text().collect();
        let text = text.trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    pub fn attr(&self, selector: &str, attr: &str) -> Option<String> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(&self.html);
        let element = document.select(&selector).next()?;
        element.value().attr(attr).map(str::to_string)
    }

    fn url_attr(&self, selector: &str, attr: &str) -> Option<String> {
        let raw = self.attr(selector, attr)?;
        Some(self.resolve(&raw))
    }

    fn resolve(&self, raw: &str) -> String {
        match &self.base {
            Some(base) => base
                .join(raw)
                .map(String::from)
                .unwrap_or_else(|_| raw.to_string()),
            None => raw.to_string(),
        }
    }
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!("Invalid CSS selector {:?}: {}", selector, err);
            None
        }
    }
}
