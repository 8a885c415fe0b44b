//! Domain records produced by the extractors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress reported for a course the backend sends no `progress` for.
pub const DEFAULT_PROGRESS: &str = "0";

/// Activity type used when the markup carries no type marker.
pub const DEFAULT_ACTIVITY_KIND: &str = " Post";

/// Name given to an activity whose content links a Zoom meeting.
pub const ZOOM_NAME: &str = "Zoom Meeting";

/// Activity type given to an activity whose content links a Zoom meeting.
pub const ZOOM_KIND: &str = " Zoom";

// ---------------------------------------------------------------------------
// Course
// ---------------------------------------------------------------------------

/// One enrollment, as listed by the timeline classification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Opaque course identifier.
    pub id: String,
    /// Display title with HTML entities decoded.
    pub name: String,
    /// Short name.
    pub shortname: String,
    /// URL of the course view page.
    pub weblink: String,
    /// Completion percentage, `"0"` when the backend omits it.
    pub progress: String,
    pub startdate: DateTime<Utc>,
    pub enddate: DateTime<Utc>,
}

impl std::fmt::Display for Course {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

/// One item of a course's activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// `id` attribute of the activity element.
    pub id: String,
    /// Short type label such as `" Assignment"`. Keeps the leading space the
    /// portal renders inside its accessibility span.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    /// Absent for pure content blocks.
    pub weblink: Option<String>,
    /// Content region rendered as Markdown.
    pub content: String,
    /// Image sources from the content region, in document order.
    pub images: Vec<String>,
}

impl Activity {
    /// An activity with every field at its fallback value.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: DEFAULT_ACTIVITY_KIND.to_string(),
            name: String::new(),
            weblink: None,
            content: String::new(),
            images: Vec::new(),
        }
    }
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.name, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_activity_uses_fallbacks() {
        let activity = Activity::empty("module-12");
        assert_eq!(activity.id, "module-12");
        assert_eq!(activity.name, "");
        assert_eq!(activity.kind, " Post");
        assert!(activity.weblink.is_none());
        assert!(activity.images.is_empty());
    }

    #[test]
    fn activity_serializes_kind_as_type() {
        let activity = Activity::empty("module-1");
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["type"], " Post");
        assert!(json["weblink"].is_null());
    }

    #[test]
    fn course_display_is_name() {
        let course = Course {
            id: "7".into(),
            name: "Algorithms & Data".into(),
            shortname: "ALGO".into(),
            weblink: "https://lms.example.com/course/view.php?id=7".into(),
            progress: DEFAULT_PROGRESS.into(),
            startdate: DateTime::from_timestamp(0, 0).unwrap(),
            enddate: DateTime::from_timestamp(0, 0).unwrap(),
        };
        assert_eq!(course.to_string(), "Algorithms & Data");
    }
}
