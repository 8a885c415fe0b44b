//! Course and activity extraction from portal responses.
//!
//! This crate provides:
//! - [`query`]: small tree-query helpers over `scraper` documents
//! - [`course`]: JSON course objects → [`Course`](moodleget_shared::Course)
//! - [`activity`]: course page markup → [`Activity`](moodleget_shared::Activity),
//!   including the Zoom meeting heuristic

pub mod activity;
pub mod course;
pub mod query;

pub use activity::{
    ActivityBatch, ActivityExtraction, extract_activities, extract_activities_with, extract_activity,
    find_zoom_link,
};
pub use course::{extract_course, extract_courses};
