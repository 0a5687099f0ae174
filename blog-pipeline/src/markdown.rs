use crate::types::{Document, PipelineError, Result, Summary};
use crate::utils::text::{normalize_whitespace, slugify};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;

const NO_SUMMARY: &str = "No summary available.";

/// Renders summaries as markdown posts with front matter.
///
/// Output depends only on the arguments, so the same inputs always give
/// byte-identical bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentRenderer;

impl DocumentRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, title: &str, summary: &Summary, now: DateTime<Utc>) -> Result<Document> {
        let title = single_line(title);
        if title.is_empty() {
            return Err(PipelineError::InvalidTitle);
        }

        let estimated_size =
            title.len() * 2 + summary.summary.len() + summary.key_points.iter().map(|p| p.len() + 3).sum::<usize>() + 128;
        let mut body = String::with_capacity(estimated_size);

        // Writing into a String cannot fail
        let _ = writeln!(body, "---");
        let _ = writeln!(body, "title: \"{}\"", escape_front_matter(&title));
        let _ = writeln!(body, "date: {}", now.to_rfc3339_opts(SecondsFormat::Secs, true));
        let _ = writeln!(body, "---");
        let _ = writeln!(body);
        let _ = writeln!(body, "# {}", title);
        let _ = writeln!(body);
        let _ = writeln!(body, "## Summary");
        let _ = writeln!(body);

        let summary_text = summary.summary.trim();
        if summary_text.is_empty() {
            let _ = writeln!(body, "{}", NO_SUMMARY);
        } else {
            let _ = writeln!(body, "{}", summary_text);
        }

        if !summary.key_points.is_empty() {
            let _ = writeln!(body);
            let _ = writeln!(body, "## Key Points");
            let _ = writeln!(body);
            for point in summary.key_points.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
                let _ = writeln!(body, "- {}", point);
            }
        }

        Ok(Document {
            title,
            date: now.format("%Y-%m-%d").to_string(),
            body,
        })
    }
}

/// Title on one line: control characters become spaces and runs of
/// whitespace collapse, so it cannot break the front matter or the heading.
fn single_line(title: &str) -> String {
    let spaced: String = title.chars().map(|c| if c.is_control() { ' ' } else { c }).collect();
    normalize_whitespace(&spaced)
}

fn escape_front_matter(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Expand `{date}` and `{slug}` in an output path.
pub fn expand_path(template: &str, document: &Document) -> String {
    template
        .replace("{date}", &document.date)
        .replace("{slug}", &slugify(&document.title))
}
