#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// A single listing as the backend reports it.
///
/// `id` is only unique within its `platform`; anything that needs identity
/// across sources must use [`JobListing::key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
    /// Absent in stream batches; filled in by a detail fetch.
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    pub platform: String,
    #[serde(default)]
    pub posted_date: Option<String>,
}

impl JobListing {
    /// Identity of the listing: (source, id).
    pub fn key(&self) -> (&str, &str) {
        (&self.platform, &self.id)
    }

    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}

/// Response of the blocking (non-streaming) search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSearchResponse {
    pub jobs: Vec<JobListing>,
    pub total: usize,
}

/// Server-side score of a resume against one posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeMatchResult {
    pub match_percentage: u32, // 0 – 100
    #[serde(default)]
    pub matching_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}
