use crate::core::domain::{RunConfig, RunResult};

/// Grades one submission. Never fails: every problem ends up in the result.
#[mockall::automock]
#[async_trait::async_trait]
pub trait SubmissionRunner: std::fmt::Debug + Send + Sync {
    async fn run(&self, config: RunConfig) -> RunResult;
}
