pub mod article;
pub mod job;

pub use article::{ArticleContent, ArticleMeta, ArticleRecord};
pub use job::{JobId, JobResult, JobState, SubmitOutcome, SubmitStatus, SummaryArtifact};
