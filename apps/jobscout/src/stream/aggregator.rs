#![allow(dead_code)]

//! Result aggregator — the append-only, arrival-ordered result set of a session.

use crate::models::JobListing;

/// Owns the session's results. Callers only ever see copies.
///
/// Batches are appended exactly as they arrive: no sorting, no merging across
/// sources and no de-duplication of repeated (source, id) pairs.
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    results: Vec<JobListing>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one batch and returns the range of indices it now occupies.
    pub fn append(&mut self, batch: Vec<JobListing>) -> std::ops::Range<usize> {
        let start = self.results.len();
        self.results.extend(batch);
        start..self.results.len()
    }

    /// Point-in-time copy of every result so far.
    pub fn snapshot(&self) -> Vec<JobListing> {
        self.results.clone()
    }

    /// Copy of the results appended at or after `from`.
    pub fn since(&self, from: usize) -> Vec<JobListing> {
        self.results
            .get(from..)
            .map(<[JobListing]>::to_vec)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of results delivered for `source` (wire name).
    pub fn count_for(&self, source: &str) -> usize {
        self.results.iter().filter(|r| r.platform == source).count()
    }
}

#[cfg(test)]
pub(crate) fn listing(source: &str, id: &str) -> JobListing {
    JobListing {
        id: id.to_string(),
        title: format!("Engineer {id}"),
        company: "Acme".to_string(),
        location: None,
        job_type: None,
        salary_range: None,
        description: None,
        url: format!("https://{source}.example/jobs/{id}"),
        platform: source.to_string(),
        posted_date: None,
    }
}
