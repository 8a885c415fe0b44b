//! HTML-to-Markdown conversion for activity content.
//!
//! Converts content fragments scraped from course pages to Markdown using the
//! `htmd` crate, after removing tags the caller wants gone, then applies a
//! series of cleanup passes to normalize whitespace and links.

mod cleanup;

use regex::Regex;
use tracing::{debug, instrument};
use url::Url;

use moodleget_shared::{MoodleGetError, Result};

/// Tags stripped from activity content: headings duplicate the activity
/// name and images are collected separately.
pub const ACTIVITY_STRIP_TAGS: &[&str] = &["h3", "img"];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for the HTML-to-Markdown conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Page URL used for resolving relative links.
    pub base_url: Option<String>,
    /// Tags removed before conversion. Their text content is kept; void
    /// elements such as `img` disappear entirely.
    pub strip_tags: Vec<String>,
}

impl ConvertOptions {
    /// Options for activity content scraped from the course page at `base_url`.
    pub fn for_activity(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url.map(String::from),
            strip_tags: ACTIVITY_STRIP_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert an HTML fragment to cleaned Markdown.
///
/// 1. Removes the tags listed in `opts.strip_tags` (keeping inner text)
/// 2. Converts HTML → Markdown via `htmd`, dropping scripts and styles
/// 3. Runs the cleanup pipeline
#[instrument(skip_all, fields(len = html.len()))]
pub fn convert_content(html: &str, opts: &ConvertOptions) -> Result<String> {
    if html.trim().is_empty() {
        return Ok(String::new());
    }

    let html = strip_tags(html, &opts.strip_tags)?;

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript"])
        .build();

    let raw_markdown = converter
        .convert(&html)
        .map_err(|e| MoodleGetError::Conversion(format!("htmd conversion failed: {e}")))?;

    debug!(raw_len = raw_markdown.len(), "htmd conversion complete");

    let base_url = opts.base_url.as_deref().and_then(|u| Url::parse(u).ok());
    Ok(cleanup::run_pipeline(&raw_markdown, base_url.as_ref()))
}

/// Remove opening, closing and self-closing forms of `tags`, leaving the
/// markup between them in place.
fn strip_tags(html: &str, tags: &[String]) -> Result<String> {
    if tags.is_empty() {
        return Ok(html.to_string());
    }

    if let Some(bad) = tags.iter().find(|t| !is_tag_name(t)) {
        return Err(MoodleGetError::Conversion(format!(
            "invalid tag name in strip list: '{bad}'"
        )));
    }

    let names = tags.join("|");
    let re = Regex::new(&format!(r"(?i)</?(?:{names})\b[^>]*>"))
        .map_err(|e| MoodleGetError::Conversion(format!("invalid strip tag list: {e}")))?;

    Ok(re.replace_all(html, "").into_owned())
}

fn is_tag_name(tag: &str) -> bool {
    tag.starts_with(|c: char| c.is_ascii_alphabetic())
        && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
