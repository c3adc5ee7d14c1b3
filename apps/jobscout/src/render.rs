//! Plain-text rendering of session output for the terminal front end.

use crate::models::{JobListing, ResumeMatchResult};
use crate::stream::{SearchNotification, SessionSnapshot, SourceState};

pub fn notification_line(note: &SearchNotification) -> String {
    match note {
        SearchNotification::SearchStarted { sources } => {
            let names: Vec<&str> = sources.iter().map(|s| s.as_str()).collect();
            format!("searching {}…", names.join(", "))
        }
        SearchNotification::SourceProgressed {
            source,
            new_results,
            total_results,
            ..
        } => format!("{source}: +{new_results} ({total_results} total)"),
        SearchNotification::SourceTimedOut { source } => {
            format!("{source}: no results yet, giving up on it")
        }
        SearchNotification::SearchCompleted { total_results } => {
            format!("done: {total_results} jobs")
        }
        SearchNotification::SearchFailed { message } => format!("search failed: {message}"),
    }
}

pub fn sources_line(states: &[SourceState]) -> String {
    states
        .iter()
        .map(SourceState::label)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Per-source labels, plus the sources that never answered if the session
/// ended early.
pub fn session_summary(snapshot: &SessionSnapshot) -> String {
    let mut line = sources_line(&snapshot.sources);
    if !snapshot.is_settled() {
        let names: Vec<&str> = snapshot.outstanding.iter().map(|s| s.as_str()).collect();
        line.push_str(&format!(" (no answer from {})", names.join(", ")));
    }
    line
}

pub fn listing_line(index: usize, job: &JobListing) -> String {
    let mut line = format!("{:>3}. {} — {}", index + 1, job.title, job.company);
    let extras: Vec<&str> = [
        job.location.as_deref(),
        job.job_type.as_deref(),
        job.salary_range.as_deref(),
        job.posted_date.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|s| !s.trim().is_empty())
    .collect();
    if !extras.is_empty() {
        line.push_str(&format!(" ({})", extras.join(", ")));
    }
    line.push_str(&format!(" [{}:{}] {}", job.platform, job.id, job.url));
    line
}

pub fn job_detail(job: &JobListing) -> String {
    let mut out = listing_line(0, job);
    out.push_str("\n\n");
    out.push_str(
        job.description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or("(no description available)"),
    );
    out
}

pub fn match_report(result: &ResumeMatchResult) -> String {
    let mut out = format!("match: {}%\n", result.match_percentage);
    for (title, items) in [
        ("matching skills", &result.matching_skills),
        ("missing skills", &result.missing_skills),
        ("recommendations", &result.recommendations),
    ] {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("{title}:\n"));
        for item in items {
            out.push_str(&format!("  - {item}\n"));
        }
    }
    out
}
