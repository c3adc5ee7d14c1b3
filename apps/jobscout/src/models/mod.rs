pub mod job;
pub mod search;

pub use job::{JobListing, JobSearchResponse, ResumeMatchResult};
pub use search::{JobType, SearchRequest, Source};
