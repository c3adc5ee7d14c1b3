use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SearchError;

/// A job board the backend knows how to query.
/// Serialized with the backend's "platform" names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    LinkedIn,
    Glassdoor,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::LinkedIn, Source::Glassdoor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::LinkedIn => "linkedin",
            Source::Glassdoor => "glassdoor",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linkedin" => Ok(Source::LinkedIn),
            "glassdoor" => Ok(Source::Glassdoor),
            other => Err(SearchError::InvalidRequest(format!(
                "unknown source '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Remote,
    Onsite,
    Hybrid,
    #[default]
    All,
}

impl FromStr for JobType {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(JobType::Remote),
            "onsite" => Ok(JobType::Onsite),
            "hybrid" => Ok(JobType::Hybrid),
            "all" => Ok(JobType::All),
            other => Err(SearchError::InvalidRequest(format!(
                "unknown job type '{other}'"
            ))),
        }
    }
}

/// One search as sent to the backend. The session takes its own copy, so
/// the request cannot change once a search is running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub job_type: JobType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<u32>,
    #[serde(rename = "platforms")]
    pub sources: Vec<Source>,
}

impl SearchRequest {
    /// Request for `query` against every known source.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            location: None,
            job_type: JobType::All,
            salary_min: None,
            salary_max: None,
            sources: Source::ALL.to_vec(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        let location = location.into();
        // The backend treats an empty location as "anywhere"; send nothing instead.
        self.location = if location.trim().is_empty() {
            None
        } else {
            Some(location)
        };
        self
    }

    pub fn with_job_type(mut self, job_type: JobType) -> Self {
        self.job_type = job_type;
        self
    }

    pub fn with_salary_range(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.salary_min = min;
        self.salary_max = max;
        self
    }

    /// Replaces the source set. Duplicates are collapsed, first occurrence wins.
    pub fn with_sources(mut self, sources: impl IntoIterator<Item = Source>) -> Self {
        let mut unique = Vec::new();
        for source in sources {
            if !unique.contains(&source) {
                unique.push(source);
            }
        }
        self.sources = unique;
        self
    }

    /// Rejects requests the backend could not run. Called before any transport activity.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.query.trim().is_empty() {
            return Err(SearchError::InvalidRequest(
                "query cannot be empty".to_string(),
            ));
        }
        if self.sources.is_empty() {
            return Err(SearchError::InvalidRequest(
                "at least one source is required".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (self.salary_min, self.salary_max) {
            if min > max {
                return Err(SearchError::InvalidRequest(format!(
                    "salary_min ({min}) is greater than salary_max ({max})"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_round_trips_wire_names() {
        assert_eq!("linkedin".parse::<Source>().unwrap(), Source::LinkedIn);
        assert_eq!("Glassdoor".parse::<Source>().unwrap(), Source::Glassdoor);
        assert_eq!(Source::LinkedIn.to_string(), "linkedin");
        assert!("indeed".parse::<Source>().is_err());
    }

    #[test]
    fn test_new_request_targets_all_sources() {
        let request = SearchRequest::new("rust engineer");
        assert_eq!(request.sources, vec![Source::LinkedIn, Source::Glassdoor]);
        assert_eq!(request.job_type, JobType::All);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_whitespace_query_is_invalid() {
        let err = SearchRequest::new("   \t ").validate().unwrap_err();
        assert!(matches!(err, SearchError::InvalidRequest(_)));
    }

    #[test]
    fn test_empty_sources_is_invalid() {
        let request = SearchRequest::new("rust").with_sources([]);
        assert!(matches!(
            request.validate(),
            Err(SearchError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_inverted_salary_range_is_invalid() {
        let request = SearchRequest::new("rust").with_salary_range(Some(200_000), Some(100_000));
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_duplicate_sources_collapse() {
        let request = SearchRequest::new("rust").with_sources([
            Source::Glassdoor,
            Source::LinkedIn,
            Source::Glassdoor,
        ]);
        assert_eq!(request.sources, vec![Source::Glassdoor, Source::LinkedIn]);
    }

    #[test]
    fn test_blank_location_is_dropped() {
        let request = SearchRequest::new("rust").with_location("  ");
        assert_eq!(request.location, None);
    }

    #[test]
    fn test_request_serializes_backend_shape() {
        let request = SearchRequest::new("rust")
            .with_location("Berlin")
            .with_job_type(JobType::Remote)
            .with_sources([Source::LinkedIn]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "query": "rust",
                "location": "Berlin",
                "job_type": "remote",
                "platforms": ["linkedin"]
            })
        );
    }
}
