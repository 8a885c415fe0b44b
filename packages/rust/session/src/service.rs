//! Request payload for the AJAX web service endpoint.

use serde_json::{Value, json};

/// Web service function listing the user's enrolled courses.
pub const COURSES_METHOD: &str = "core_course_get_enrolled_courses_by_timeline_classification";

/// Largest page of courses requested in one call.
pub const COURSES_LIMIT: u32 = 96;

/// Single-call batch asking for every enrolled course, sorted by full name.
pub(crate) fn courses_payload() -> Value {
    json!([{
        "index": 0,
        "methodname": COURSES_METHOD,
        "args": {
            "offset": 0,
            "limit": COURSES_LIMIT,
            "classification": "all",
            "sort": "fullname"
        }
    }])
}
