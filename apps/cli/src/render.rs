//! Text and JSON rendering of courses and activities.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use moodleget_shared::{Activity, Course};

/// Output format for listing commands.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub(crate) fn courses(courses: &[Course], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(courses)?),
        OutputFormat::Text => {
            let mut out = String::new();
            for course in courses {
                out.push_str(&course_text(course));
                out.push('\n');
            }
            Ok(out)
        }
    }
}

pub(crate) fn activities(
    course: &Course,
    activities: &[Activity],
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(activities)?),
        OutputFormat::Text => {
            let mut out = format!("{course}\n{}\n\n", course.weblink);
            for (i, activity) in activities.iter().enumerate() {
                let _ = writeln!(out, "[{}/{}]", i + 1, activities.len());
                out.push_str(&activity_text(activity));
                out.push('\n');
            }
            Ok(out)
        }
    }
}

fn course_text(course: &Course) -> String {
    format!(
        "{}\n  Progress:   {}/100\n  Start Date: {}\n  End Date:   {}\n  Link:       {}\n",
        course.name,
        course.progress,
        date(&course.startdate),
        date(&course.enddate),
        course.weblink,
    )
}

fn activity_text(activity: &Activity) -> String {
    let title = if activity.name.is_empty() {
        "No title."
    } else {
        &activity.name
    };
    let content = if activity.content.is_empty() {
        "No content."
    } else {
        &activity.content
    };

    let mut out = format!("{title} ({})\n", activity.kind.trim());
    if let Some(link) = &activity.weblink {
        let _ = writeln!(out, "{link}");
    }
    let _ = writeln!(out, "\n{content}");

    if !activity.images.is_empty() {
        out.push_str("\nImages:\n");
        for image in &activity.images {
            let _ = writeln!(out, "  {image}");
        }
    }
    out
}

fn date(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M UTC").to_string()
}
