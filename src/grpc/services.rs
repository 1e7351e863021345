use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::{
    core::{domain::RunConfig, traits::runner::SubmissionRunner},
    grpc::{
        mappers::ConversionError,
        models::{RunSubmissionRequest, RunSubmissionResponse, grading_service_server::GradingService},
    },
};

#[derive(Clone, Debug)]
pub struct GradingServiceImpl {
    runner: Arc<dyn SubmissionRunner>,
}

#[tonic::async_trait]
impl GradingService for GradingServiceImpl {
    #[tracing::instrument(skip_all)]
    async fn run_submission(
        &self,
        request: Request<RunSubmissionRequest>,
    ) -> Result<Response<RunSubmissionResponse>, Status> {
        tracing::info!("Received request: {:?}", request.get_ref());

        let config: Result<RunConfig, ConversionError> = request.into_inner().try_into();
        let config = config.map_err(|error| {
            tracing::warn!(%error, "Rejected request");
            Status::invalid_argument(error.to_string())
        })?;

        let result = self.runner.run(config).await;
        Ok(Response::new(result.into()))
    }
}

impl GradingServiceImpl {
    pub fn new(runner: Arc<dyn SubmissionRunner>) -> Self {
        Self { runner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{domain::RunResult, traits::runner::MockSubmissionRunner};

    fn create_valid_request() -> RunSubmissionRequest {
        RunSubmissionRequest {
            user_solution_path: "/srv/solutions/9".to_string(),
            organizer_files_path: "/srv/organizer/3".to_string(),
            output_path: "/srv/output/9".to_string(),
            cpu_limit: 1,
            memory_limit: "512m".to_string(),
            timeout_seconds: 120,
            grader_file_name: None,
            image_name: Some("grader-py:1".to_string()),
            instance_name: None,
        }
    }

    fn create_result(exit_code: i32, score: Option<f64>) -> RunResult {
        RunResult {
            success: exit_code == 0,
            exit_code,
            timed_out: exit_code == 124,
            execution_time_seconds: 12.5,
            error_detail: None,
            score,
            report_text: "Status: SUCCESS\nExit code: 0\nExecution time: 12.50s".to_string(),
            finished_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_run_submission_success() {
        let mut runner = MockSubmissionRunner::new();
        runner
            .expect_run()
            .withf(|config| {
                config.cpu_limit.get() == 1
                    && config.timeout_seconds.get() == 120
                    && config.image_name.as_deref() == Some("grader-py:1")
            })
            .times(1)
            .return_const(create_result(0, Some(75.0)));

        let service = GradingServiceImpl::new(Arc::new(runner));
        let response = service
            .run_submission(Request::new(create_valid_request()))
            .await
            .unwrap()
            .into_inner();

        assert!(response.success);
        assert_eq!(response.exit_code, 0);
        assert_eq!(response.score, Some(75.0));
        assert!(response.finished_at.is_some());
        assert!(response.report_text.starts_with("Status: SUCCESS"));
    }

    #[tokio::test]
    async fn test_run_submission_failure_is_still_ok() {
        let mut runner = MockSubmissionRunner::new();
        runner
            .expect_run()
            .times(1)
            .return_const(create_result(124, None));

        let service = GradingServiceImpl::new(Arc::new(runner));
        let response = service
            .run_submission(Request::new(create_valid_request()))
            .await
            .unwrap()
            .into_inner();

        assert!(!response.success);
        assert!(response.timed_out);
        assert_eq!(response.exit_code, 124);
        assert_eq!(response.score, None);
    }

    #[tokio::test]
    async fn test_run_submission_invalid_request() {
        let mut runner = MockSubmissionRunner::new();
        runner.expect_run().never();

        let mut request = create_valid_request();
        request.memory_limit = "lots".to_string();

        let service = GradingServiceImpl::new(Arc::new(runner));
        let status = service
            .run_submission(Request::new(request))
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert!(status.message().contains("memory_limit"));
    }
}
