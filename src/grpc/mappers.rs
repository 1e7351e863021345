use std::{
    num::{NonZeroU32, NonZeroU64},
    path::{Component, Path, PathBuf},
};

use crate::{
    core::domain::{self, MemoryLimit},
    grpc::models,
};

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },
    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl ConversionError {
    fn invalid(field: &str, reason: impl ToString) -> Self {
        ConversionError::InvalidField {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl TryFrom<models::RunSubmissionRequest> for domain::RunConfig {
    type Error = ConversionError;

    fn try_from(req: models::RunSubmissionRequest) -> Result<Self, ConversionError> {
        let cpu_limit = NonZeroU32::new(req.cpu_limit)
            .ok_or_else(|| ConversionError::invalid("cpu_limit", "must be greater than zero"))?;
        let timeout_seconds = NonZeroU64::new(req.timeout_seconds).ok_or_else(|| {
            ConversionError::invalid("timeout_seconds", "must be greater than zero")
        })?;
        let memory_limit = req
            .memory_limit
            .parse::<MemoryLimit>()
            .map_err(|e| ConversionError::invalid("memory_limit", e))?;

        let grader_file_name = non_empty(req.grader_file_name);
        if let Some(name) = &grader_file_name {
            if !is_plain_relative(Path::new(name)) {
                return Err(ConversionError::invalid(
                    "grader_file_name",
                    "must be a relative path inside the organizer files",
                ));
            }
        }

        let image_name = non_empty(req.image_name);
        if let Some(image) = &image_name {
            if image.chars().any(char::is_whitespace) {
                return Err(ConversionError::invalid(
                    "image_name",
                    "must not contain whitespace",
                ));
            }
        }

        let instance_name = non_empty(req.instance_name);
        if let Some(name) = &instance_name {
            if !is_valid_instance_name(name) {
                return Err(ConversionError::invalid(
                    "instance_name",
                    "must match [a-zA-Z0-9][a-zA-Z0-9_.-]+",
                ));
            }
        }

        Ok(Self {
            user_solution_path: required_path("user_solution_path", req.user_solution_path)?,
            organizer_files_path: required_path("organizer_files_path", req.organizer_files_path)?,
            output_path: required_path("output_path", req.output_path)?,
            cpu_limit,
            memory_limit,
            timeout_seconds,
            grader_file_name,
            image_name,
            instance_name,
        })
    }
}

impl From<domain::RunResult> for models::RunSubmissionResponse {
    fn from(result: domain::RunResult) -> Self {
        Self {
            success: result.success,
            exit_code: result.exit_code,
            timed_out: result.timed_out,
            execution_time_seconds: result.execution_time_seconds,
            error_detail: result.error_detail,
            score: result.score,
            report_text: result.report_text,
            finished_at: Some(models::chrono_to_prost(result.finished_at)),
        }
    }
}

fn required_path(field: &str, value: String) -> Result<PathBuf, ConversionError> {
    if value.trim().is_empty() {
        return Err(ConversionError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(PathBuf::from(value))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

// Same rule docker applies to container names.
fn is_valid_instance_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    let rest = chars.as_str();
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
