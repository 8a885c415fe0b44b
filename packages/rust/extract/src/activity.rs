//! Activity extraction from a course view page.
//!
//! Each activity element is mapped on its own: missing blocks fall back to
//! default field values, and a failure while rendering the content degrades
//! only that activity's content and images.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

use moodleget_markdown::{ConvertOptions, convert_content};
use moodleget_shared::{Activity, DEFAULT_ACTIVITY_KIND, Result, ZOOM_KIND, ZOOM_NAME};

use crate::query::{children_named, class_matches, descend, has_class, leading_text};

/// Activity elements of the topic/weekly course format.
const ACTIVITY_SELECTOR: &str =
    r#"div[class="course-content"] > ul > li > div[class="content"] > ul > li"#;

/// Wrapper levels between an activity element and its instance/content blocks.
const BLOCK_PATH: &[&str] = &["div", "div", "div", "div"];

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of extracting one activity.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityExtraction {
    /// Every step succeeded.
    Complete(Activity),
    /// Content rendering failed; `content` is empty and `images` is empty,
    /// the remaining fields are intact.
    Degraded { activity: Activity, error: String },
}

impl ActivityExtraction {
    pub fn activity(&self) -> &Activity {
        match self {
            Self::Complete(activity) | Self::Degraded { activity, .. } => activity,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Complete(_) => None,
            Self::Degraded { error, .. } => Some(error),
        }
    }

    pub fn into_activity(self) -> Activity {
        match self {
            Self::Complete(activity) | Self::Degraded { activity, .. } => activity,
        }
    }
}

/// All activities of a page, in document order, with per-item failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityBatch {
    /// Every activity found, degraded ones included.
    pub activities: Vec<Activity>,
    /// `(activity id, error message)` for each degraded activity.
    pub errors: Vec<(String, String)>,
}

impl ActivityBatch {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract every activity of a course page.
///
/// `base_url` is the course page URL, used to resolve relative links in the
/// rendered content.
pub fn extract_activities(doc: &Html, base_url: Option<&str>) -> ActivityBatch {
    extract_activities_with(doc, &ConvertOptions::for_activity(base_url))
}

/// [`extract_activities`] with explicit content conversion options.
#[instrument(skip_all, fields(base_url = opts.base_url.as_deref()))]
pub fn extract_activities_with(doc: &Html, opts: &ConvertOptions) -> ActivityBatch {
    static ACTIVITY_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(ACTIVITY_SELECTOR).expect("valid selector"));

    let mut batch = ActivityBatch::default();

    for element in doc.select(&ACTIVITY_SEL) {
        let outcome = extract_activity(element, opts);
        if let Some(error) = outcome.error() {
            batch
                .errors
                .push((outcome.activity().id.clone(), error.to_string()));
        }
        batch.activities.push(outcome.into_activity());
    }

    debug!(
        activities = batch.activities.len(),
        errors = batch.error_count(),
        "activities extracted"
    );
    batch
}

/// Extract one activity from its `<li>` element.
pub fn extract_activity(root: ElementRef<'_>, opts: &ConvertOptions) -> ActivityExtraction {
    let id = root.value().attr("id").unwrap_or_default();
    let mut activity = Activity::empty(id);

    let blocks = descend(root, BLOCK_PATH);

    if let Some(instance) = blocks.iter().find(|b| class_matches(b, "activityinstance")) {
        if let Some((name, kind)) = instance_name(*instance) {
            activity.name = name;
            activity.kind = kind;
        }
    }

    activity.weblink = blocks.first().and_then(|block| {
        children_named(*block, "a").find_map(|a| a.value().attr("href").map(String::from))
    });

    match render_content(&blocks, opts) {
        Ok((content, images)) => {
            activity.content = content;
            activity.images = images;
            apply_zoom_override(&mut activity);
            ActivityExtraction::Complete(activity)
        }
        Err(e) => {
            warn!(id = %activity.id, error = %e, "activity content extraction failed");
            ActivityExtraction::Degraded {
                activity,
                error: e.to_string(),
            }
        }
    }
}

/// Name and type label from `a > span.instancename` of the instance block.
fn instance_name(instance: ElementRef<'_>) -> Option<(String, String)> {
    let span = children_named(instance, "a")
        .flat_map(|a| children_named(a, "span"))
        .find(|span| has_class(span, "instancename"))?;

    let kind = children_named(span, "span")
        .next()
        .map(|marker| leading_text(&marker))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| DEFAULT_ACTIVITY_KIND.to_string());

    Some((leading_text(&span), kind))
}

/// Render the content block to Markdown and collect its image sources.
fn render_content(blocks: &[ElementRef<'_>], opts: &ConvertOptions) -> Result<(String, Vec<String>)> {
    static IMG_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("img[src]").expect("valid selector"));

    let Some(content_block) = blocks.iter().find(|b| class_matches(b, "content")) else {
        return Ok((String::new(), Vec::new()));
    };

    let mut fragments = Vec::new();
    let mut images = Vec::new();

    for element in descend(*content_block, &["div", "div"])
        .into_iter()
        .flat_map(|wrapper| wrapper.children().filter_map(ElementRef::wrap))
    {
        let nested = element.select(&IMG_SEL);
        images.extend(
            std::iter::once(element)
                .filter(|el| el.value().name() == "img")
                .chain(nested)
                .filter_map(|img| img.value().attr("src").map(String::from)),
        );
        fragments.push(element.html().trim().replace("\r\n", ""));
    }

    let content = convert_content(&fragments.concat(), opts)?;
    Ok((content, images))
}

// ---------------------------------------------------------------------------
// Zoom heuristic
// ---------------------------------------------------------------------------

/// First Zoom meeting URL (`https://<host>zoom.us/j/<id>...`) in `content`.
pub fn find_zoom_link(content: &str) -> Option<&str> {
    static ZOOM_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"https?://[^\s()\[\]<>"]*zoom\.us/j/[^\s()\[\]<>"]*"#).expect("valid regex")
    });

    ZOOM_RE.find(content).map(|m| m.as_str())
}

/// Relabel an activity as a Zoom meeting when its content links one.
fn apply_zoom_override(activity: &mut Activity) {
    if let Some(link) = find_zoom_link(&activity.content) {
        activity.weblink = Some(link.to_string());
        activity.name = ZOOM_NAME.to_string();
        activity.kind = ZOOM_KIND.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COURSE_URL: &str = "https://lms.example.edu/course/view.php?id=42";

    fn page(items: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><body><div class="course-content"><ul class="topics"><li class="section main"><div class="content"><ul class="section">{items}</ul></div></li></ul></div></body></html>"#
        ))
    }

    fn instance_item(id: &str, name: &str, kind: &str, href: &str, content: Option<&str>) -> String {
        let content = content
            .map(|c| format!(r#"<div class="contentafterlink"><div class="no-overflow"><div class="no-overflow">{c}</div></div></div>"#))
            .unwrap_or_default();
        format!(
            r#"<li class="activity" id="{id}"><div><div class="mod-indent-outer"><div class="mod-indent"></div><div><div class="activityinstance"><a href="{href}"><span class="instancename">{name}<span class="accesshide "> {kind}</span></span></a></div>{content}</div></div></div></li>"#
        )
    }

    fn label_item(id: &str, content: &str) -> String {
        format!(
            r#"<li class="activity label" id="{id}"><div><div class="mod-indent-outer"><div class="mod-indent"></div><div><div class="contentwithoutlink "><div class="no-overflow"><div class="no-overflow">{content}</div></div></div></div></div></div></li>"#
        )
    }

    #[test]
    fn instance_block_gives_name_type_and_link() {
        let doc = page(&instance_item(
            "module-1",
            "Essay 1",
            "Assignment",
            "https://lms.example.edu/mod/assign/view.php?id=1",
            None,
        ));
        let batch = extract_activities(&doc, Some(COURSE_URL));
        let activity = &batch.activities[0];

        assert_eq!(activity.id, "module-1");
        assert_eq!(activity.name, "Essay 1");
        assert_eq!(activity.kind, " Assignment");
        assert_eq!(
            activity.weblink.as_deref(),
            Some("https://lms.example.edu/mod/assign/view.php?id=1")
        );
        assert_eq!(activity.content, "");
        assert!(activity.images.is_empty());
    }

    #[test]
    fn missing_instance_block_defaults_name_and_type() {
        let doc = page(&label_item("module-2", "<p>Office hours moved to Tuesday.</p>"));
        let activity = &extract_activities(&doc, None).activities[0];

        assert_eq!(activity.name, "");
        assert_eq!(activity.kind, " Post");
        assert!(activity.weblink.is_none());
        assert!(activity.content.contains("Office hours moved to Tuesday."));
    }

    #[test]
    fn instance_name_without_type_marker_is_post() {
        let doc = page(
            r#"<li id="module-3"><div><div><div><div class="activityinstance"><a href="/x"><span class="instancename">Plain</span></a></div></div></div></div></li>"#,
        );
        let activity = &extract_activities(&doc, None).activities[0];
        assert_eq!(activity.name, "Plain");
        assert_eq!(activity.kind, " Post");
    }

    #[test]
    fn images_collected_in_document_order() {
        let doc = page(&label_item(
            "module-4",
            r#"<p><img src="https://lms.example.edu/a.png"></p><div><span><img src="https://lms.example.edu/b.png"></span></div><p><img src="https://lms.example.edu/c.png"></p>"#,
        ));
        let activity = &extract_activities(&doc, None).activities[0];
        assert_eq!(
            activity.images,
            vec![
                "https://lms.example.edu/a.png",
                "https://lms.example.edu/b.png",
                "https://lms.example.edu/c.png",
            ]
        );
        assert!(!activity.content.contains(".png"));
    }

    #[test]
    fn h3_text_kept_without_heading_marker() {
        let doc = page(&label_item("module-5", "<h3>Week 2</h3><p>Graphs</p>"));
        let activity = &extract_activities(&doc, None).activities[0];
        assert!(activity.content.contains("Week 2"));
        assert!(!activity.content.contains("###"));
    }

    #[test]
    fn zoom_link_overrides_name_type_and_weblink() {
        let doc = page(&instance_item(
            "module-6",
            "Lecture",
            "Page",
            "https://lms.example.edu/mod/page/view.php?id=6",
            Some(r#"<p>Meeting: <a href="https://us02web.zoom.us/j/81234567890?pwd=abc">join</a> or https://zoom.us/j/999</p>"#),
        ));
        let activity = &extract_activities(&doc, None).activities[0];

        assert_eq!(activity.name, "Zoom Meeting");
        assert_eq!(activity.kind, " Zoom");
        assert_eq!(
            activity.weblink.as_deref(),
            Some("https://us02web.zoom.us/j/81234567890?pwd=abc")
        );
    }

    #[test]
    fn zoom_domain_without_meeting_path_is_not_overridden() {
        let doc = page(&label_item("module-7", "<p>Install from https://zoom.us/download</p>"));
        let activity = &extract_activities(&doc, None).activities[0];
        assert_eq!(activity.name, "");
        assert_eq!(activity.kind, " Post");
        assert!(activity.weblink.is_none());
    }

    #[test]
    fn find_zoom_link_stops_at_delimiters() {
        assert_eq!(
            find_zoom_link("[Join](https://us06web.zoom.us/j/123?pwd=x) now"),
            Some("https://us06web.zoom.us/j/123?pwd=x")
        );
        assert_eq!(
            find_zoom_link("<http://zoom.us/j/42>"),
            Some("http://zoom.us/j/42")
        );
        assert_eq!(find_zoom_link("no meeting here"), None);
    }

    #[test]
    fn missing_content_block_isolated_from_neighbours() {
        let items = [
            instance_item("module-10", "Intro", "Page", "https://lms.example.edu/p/10", Some("<p>Hello class</p><p><img src=\"https://lms.example.edu/i10.png\"></p>")),
            instance_item("module-11", "Quiz", "Quiz", "https://lms.example.edu/q/11", None),
            instance_item("module-12", "Outro", "Page", "https://lms.example.edu/p/12", Some("<p>See you</p><img src=\"https://lms.example.edu/i12.png\">")),
        ]
        .concat();
        let batch = extract_activities(&page(&items), None);

        assert_eq!(batch.activities.len(), 3);
        assert_eq!(batch.error_count(), 0);

        let [first, second, third] = &batch.activities[..] else {
            panic!("expected three activities");
        };
        assert_eq!(second.content, "");
        assert!(second.images.is_empty());
        assert_eq!(second.name, "Quiz");

        assert!(first.content.contains("Hello class"));
        assert_eq!(first.images, vec!["https://lms.example.edu/i10.png"]);
        assert!(third.content.contains("See you"));
        assert_eq!(third.images, vec!["https://lms.example.edu/i12.png"]);
    }

    #[test]
    fn bare_item_degrades_to_defaults() {
        let doc = page(r#"<li id="module-13">Loose text</li>"#);
        let batch = extract_activities(&doc, None);
        assert_eq!(batch.activities, vec![Activity::empty("module-13")]);
    }

    #[test]
    fn extraction_is_idempotent() {
        let doc = page(&[
            instance_item("module-20", "A", "Forum", "https://lms.example.edu/f/20", Some("<p>Body <b>bold</b></p>")),
            label_item("module-21", "<p>Zoom: https://zoom.us/j/555</p>"),
        ]
        .concat());
        assert_eq!(extract_activities(&doc, None), extract_activities(&doc, None));
    }

    #[test]
    fn failed_content_conversion_degrades_only_that_activity() {
        let items = [
            instance_item("module-30", "Syllabus", "Page", "https://lms.example.edu/p/30", None),
            instance_item(
                "module-31",
                "Welcome",
                "Forum",
                "https://lms.example.edu/f/31",
                Some(r#"<p>Hello</p><img src="https://lms.example.edu/w.png">"#),
            ),
            r#"<li id="module-32">Loose text</li>"#.to_string(),
        ]
        .concat();
        let opts = ConvertOptions {
            base_url: None,
            strip_tags: vec!["h3>".into()],
        };

        let batch = extract_activities_with(&page(&items), &opts);

        assert_eq!(batch.activities.len(), 3);
        assert_eq!(batch.error_count(), 1);
        assert_eq!(batch.errors[0].0, "module-31");
        assert!(batch.errors[0].1.contains("h3>"));

        let degraded = &batch.activities[1];
        assert_eq!(degraded.id, "module-31");
        assert_eq!(degraded.name, "Welcome");
        assert_eq!(degraded.kind, " Forum");
        assert_eq!(degraded.weblink.as_deref(), Some("https://lms.example.edu/f/31"));
        assert_eq!(degraded.content, "");
        assert!(degraded.images.is_empty());

        assert_eq!(batch.activities[0].name, "Syllabus");
        assert_eq!(batch.activities[2], Activity::empty("module-32"));
    }

    #[test]
    fn extract_activity_reports_outcome() {
        let doc = page(&label_item("module-33", "<p>Notes</p>"));
        let sel = Selector::parse(ACTIVITY_SELECTOR).unwrap();
        let element = doc.select(&sel).next().unwrap();

        let complete = extract_activity(element, &ConvertOptions::for_activity(None));
        assert!(complete.error().is_none());
        assert_eq!(complete.activity().content, "Notes");

        let opts = ConvertOptions {
            base_url: None,
            strip_tags: vec![String::new()],
        };
        let degraded = extract_activity(element, &opts);
        assert!(degraded.error().is_some());
        assert_eq!(degraded.into_activity(), Activity::empty("module-33"));
    }

    #[test]
    fn page_without_course_content_is_empty() {
        let doc = Html::parse_document("<html><body><p>Not a course</p></body></html>");
        let batch = extract_activities(&doc, None);
        assert!(batch.activities.is_empty());
        assert!(batch.errors.is_empty());
    }
}
