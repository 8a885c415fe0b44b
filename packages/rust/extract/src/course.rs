//! Course extraction from the timeline classification service response.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use moodleget_shared::{Course, DEFAULT_PROGRESS, MoodleGetError, Result};

use crate::query::decode_entities;

/// Course object as sent by `core_course_get_enrolled_courses_by_timeline_classification`.
#[derive(Debug, Deserialize)]
struct RawCourse {
    id: Value,
    fullname: String,
    shortname: String,
    viewurl: String,
    #[serde(default)]
    progress: Option<Value>,
    #[serde(default)]
    startdate: i64,
    #[serde(default)]
    enddate: i64,
}

/// Build a [`Course`] from one course object.
pub fn extract_course(raw: &Value) -> Result<Course> {
    let raw = RawCourse::deserialize(raw)
        .map_err(|e| MoodleGetError::parse(format!("malformed course object: {e}")))?;

    Ok(Course {
        id: scalar_to_string(&raw.id)
            .ok_or_else(|| MoodleGetError::parse(format!("course id is not a scalar: {}", raw.id)))?,
        name: decode_entities(&raw.fullname),
        shortname: raw.shortname,
        weblink: raw.viewurl,
        progress: raw
            .progress
            .as_ref()
            .and_then(scalar_to_string)
            .unwrap_or_else(|| DEFAULT_PROGRESS.to_string()),
        startdate: epoch_to_utc(raw.startdate)?,
        enddate: epoch_to_utc(raw.enddate)?,
    })
}

/// Map the whole JSON envelope to courses, preserving the backend's order.
///
/// Fails with [`MoodleGetError::Backend`] when the envelope is empty, flags an
/// error, or does not carry `result[0].data.courses`.
pub fn extract_courses(envelope: &Value) -> Result<Vec<Course>> {
    let first = match envelope {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| MoodleGetError::Backend("empty response envelope".into()))?,
        Value::Object(map) if map.contains_key("error") => {
            return Err(MoodleGetError::Backend(error_detail(envelope)));
        }
        other => {
            return Err(MoodleGetError::Backend(format!(
                "unexpected response shape: {}",
                type_name(other)
            )));
        }
    };

    if is_error_flagged(first) {
        return Err(MoodleGetError::Backend(error_detail(first)));
    }

    let courses = first
        .pointer("/data/courses")
        .and_then(Value::as_array)
        .ok_or_else(|| MoodleGetError::Backend("response has no data.courses list".into()))?;

    let courses = courses
        .iter()
        .map(|raw| extract_course(raw).map_err(|e| MoodleGetError::Backend(e.to_string())))
        .collect::<Result<Vec<_>>>()?;

    debug!(count = courses.len(), "courses extracted");
    Ok(courses)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_error_flagged(item: &Value) -> bool {
    match item.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(_) => true,
    }
}

/// Best human-readable message the backend gave for an error envelope.
fn error_detail(item: &Value) -> String {
    let message = item
        .pointer("/exception/message")
        .or_else(|| item.get("message"))
        .or_else(|| item.get("error"))
        .and_then(Value::as_str);

    match message {
        Some(m) => m.to_string(),
        None => "service reported an error".to_string(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn epoch_to_utc(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| MoodleGetError::parse(format!("timestamp out of range: {secs}")))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_course() -> Value {
        json!({
            "id": 42,
            "fullname": "Algorithms &amp; Data Structures",
            "shortname": "CS201",
            "viewurl": "https://lms.example.edu/course/view.php?id=42",
            "progress": 37,
            "startdate": 1612137600,
            "enddate": 1627776000
        })
    }

    #[test]
    fn extracts_all_fields() {
        let course = extract_course(&raw_course()).unwrap();
        assert_eq!(course.id, "42");
        assert_eq!(course.name, "Algorithms & Data Structures");
        assert_eq!(course.shortname, "CS201");
        assert_eq!(course.weblink, "https://lms.example.edu/course/view.php?id=42");
        assert_eq!(course.progress, "37");
        assert_eq!(course.startdate.to_rfc3339(), "2021-02-01T00:00:00+00:00");
        assert_eq!(course.enddate.to_rfc3339(), "2021-08-01T00:00:00+00:00");
    }

    #[test]
    fn missing_progress_defaults_to_zero() {
        let mut raw = raw_course();
        raw.as_object_mut().unwrap().remove("progress");
        assert_eq!(extract_course(&raw).unwrap().progress, "0");
    }

    #[test]
    fn null_progress_defaults_to_zero() {
        let mut raw = raw_course();
        raw["progress"] = Value::Null;
        assert_eq!(extract_course(&raw).unwrap().progress, "0");
    }

    #[test]
    fn fractional_progress_keeps_precision() {
        let mut raw = raw_course();
        raw["progress"] = json!(33.5);
        assert_eq!(extract_course(&raw).unwrap().progress, "33.5");
    }

    #[test]
    fn string_id_is_kept() {
        let mut raw = raw_course();
        raw["id"] = json!("abc");
        assert_eq!(extract_course(&raw).unwrap().id, "abc");
    }

    #[test]
    fn missing_required_field_is_parse_error() {
        let mut raw = raw_course();
        raw.as_object_mut().unwrap().remove("viewurl");
        assert!(matches!(extract_course(&raw), Err(MoodleGetError::Parse { .. })));
    }

    #[test]
    fn envelope_preserves_order() {
        let mut second = raw_course();
        second["id"] = json!(7);
        second["fullname"] = json!("Calculus");
        let envelope = json!([{ "error": false, "data": { "courses": [raw_course(), second] } }]);

        let ids: Vec<_> = extract_courses(&envelope)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["42", "7"]);
    }

    #[test]
    fn empty_envelope_is_backend_error() {
        assert!(matches!(
            extract_courses(&json!([])),
            Err(MoodleGetError::Backend(_))
        ));
    }

    #[test]
    fn flagged_error_is_backend_error_with_message() {
        let envelope = json!([{ "error": true, "exception": { "message": "Session timed out" } }]);
        let err = extract_courses(&envelope).unwrap_err();
        assert!(matches!(err, MoodleGetError::Backend(_)));
        assert!(err.to_string().contains("Session timed out"));
    }

    #[test]
    fn top_level_error_object_is_backend_error() {
        let envelope = json!({ "error": "Invalid sesskey", "errorcode": "invalidsesskey" });
        let err = extract_courses(&envelope).unwrap_err();
        assert!(err.to_string().contains("Invalid sesskey"));
    }

    #[test]
    fn missing_course_list_is_backend_error() {
        let envelope = json!([{ "error": false, "data": {} }]);
        assert!(matches!(
            extract_courses(&envelope),
            Err(MoodleGetError::Backend(_))
        ));
    }

    #[test]
    fn malformed_course_entry_is_backend_error() {
        let envelope = json!([{ "error": false, "data": { "courses": [{ "id": 1 }] } }]);
        assert!(matches!(
            extract_courses(&envelope),
            Err(MoodleGetError::Backend(_))
        ));
    }
}
