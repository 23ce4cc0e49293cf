use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::app::{Result, SummaristError};

const MAX_ID_LEN: usize = 128;

/// Identifier of a summarization job.
///
/// Always a safe file name: ASCII alphanumerics, `-` and `_`, at most 128
/// characters. Ids derived from links are SHA-256 hex digests, so the same
/// article submitted twice maps to the same job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Accept a caller-supplied id
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if Self::is_valid(&id) {
            Ok(Self(id))
        } else {
            Err(SummaristError::InvalidJobId(id))
        }
    }

    /// Deterministic id for an article link
    pub fn for_link(link: &str) -> Self {
        let normalized = normalize_link(link);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Random id for records that carry no link
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(id: &str) -> bool {
        !id.is_empty()
            && id.len() <= MAX_ID_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for JobId {
    type Error = SummaristError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

/// Lowercase scheme and host, drop the fragment and any trailing slash
fn normalize_link(link: &str) -> String {
    let trimmed = link.trim();
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string().trim_end_matches('/').to_string()
        }
        Err(_) => trimmed.trim_end_matches('/').to_string(),
    }
}

/// Lifecycle of a job inside the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    InFlight,
    Done,
    Failed,
}

/// Outcome reported to a submitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    /// A new job was queued
    Started,
    /// A result for this id is already persisted
    AlreadyExist,
    /// The id is in flight
    MayBeSummarizing,
}

impl SubmitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitStatus::Started => "started",
            SubmitStatus::AlreadyExist => "already_exist",
            SubmitStatus::MayBeSummarizing => "may_be_summarizing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub id: JobId,
    pub status: SubmitStatus,
}

/// Persisted result of a finished job, one artifact per id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryArtifact {
    pub id: JobId,
    pub title: String,
    pub link: String,
    pub image_url: Option<String>,
    pub summary: String,
    /// Label of the worker that produced the summary
    pub worker: String,
    pub attempts: u32,
    pub completed_at: DateTime<Utc>,
}

/// Answer to a result lookup
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Done(SummaryArtifact),
    Pending,
    Failed { reason: String },
    /// Never submitted (or forgotten after a restart)
    Unknown,
}

impl JobResult {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobResult::Done(_) | JobResult::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_id_deterministic() {
        let a = JobId::for_link("https://kr.investing.com/news/stock-market-news/article-1");
        let b = JobId::for_link("https://kr.investing.com/news/stock-market-news/article-1");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_link_id_ignores_fragment_case_and_trailing_slash() {
        let a = JobId::for_link("https://KR.Investing.com/news/a-1/");
        let b = JobId::for_link("https://kr.investing.com/news/a-1#comments");
        assert_eq!(a, b);
    }

    #[test]
    fn test_link_id_differs_by_path() {
        let a = JobId::for_link("https://kr.investing.com/news/a-1");
        let b = JobId::for_link("https://kr.investing.com/news/a-2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_ids_are_valid_and_distinct() {
        let a = JobId::random();
        let b = JobId::random();
        assert_ne!(a, b);
        assert!(JobId::new(a.as_str()).is_ok());
    }

    #[test]
    fn test_caller_ids_validated() {
        assert!(JobId::new("7").is_ok());
        assert!(JobId::new("job_7-b").is_ok());
        assert!(JobId::new("").is_err());
        assert!(JobId::new("../etc/passwd").is_err());
        assert!(JobId::new("a b").is_err());
        assert!(JobId::new("x".repeat(129)).is_err());
    }

    #[test]
    fn test_job_id_serde_rejects_invalid() {
        let id: JobId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(id.as_str(), "42");
        assert!(serde_json::from_str::<JobId>("\"../x\"").is_err());
    }

    #[test]
    fn test_submit_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&SubmitStatus::MayBeSummarizing).unwrap(),
            "\"may_be_summarizing\""
        );
        assert_eq!(SubmitStatus::AlreadyExist.as_str(), "already_exist");
        assert_eq!(SubmitStatus::Started.as_str(), "started");
    }
}
