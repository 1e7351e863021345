use std::time::Duration;

use itertools::Itertools;

use crate::{
    constants::{LAUNCH_FAILURE_EXIT_CODE, TIMEOUT_EXIT_CODE},
    core::{capture::Capture, domain::RunResult},
};

/// What actually happened to the sandbox, before normalization.
#[derive(Debug)]
pub enum Outcome {
    LaunchFailed {
        message: String,
    },
    TimedOut {
        timeout_seconds: u64,
        stdout: Capture,
    },
    Exited {
        exit_code: i32,
        stdout: Capture,
        stderr: Capture,
    },
}

impl RunResult {
    pub fn from_outcome(outcome: Outcome, elapsed: Duration) -> Self {
        let (success, exit_code, timed_out, error_detail, score, stdout) = match outcome {
            Outcome::LaunchFailed { message } => (
                false,
                LAUNCH_FAILURE_EXIT_CODE,
                false,
                Some(message),
                None,
                None,
            ),
            Outcome::TimedOut {
                timeout_seconds,
                stdout,
            } => (
                false,
                TIMEOUT_EXIT_CODE,
                true,
                Some(format!(
                    "Execution timed out after {timeout_seconds} seconds"
                )),
                None,
                Some(stdout),
            ),
            Outcome::Exited {
                exit_code,
                stdout,
                stderr,
            } => {
                let error_detail = (!stderr.is_empty()).then(|| render_capture(&stderr, "stderr"));
                let score = Some(parse_score(&stdout.text()));
                (exit_code == 0, exit_code, false, error_detail, score, Some(stdout))
            }
        };

        let execution_time_seconds = elapsed.as_secs_f64();
        let output = stdout
            .filter(|capture| !capture.is_empty())
            .map(|capture| render_capture(&capture, "stdout"));
        let report_text = build_report(
            success,
            exit_code,
            execution_time_seconds,
            timed_out,
            error_detail.as_deref(),
            output.as_deref(),
        );

        Self {
            success,
            exit_code,
            timed_out,
            execution_time_seconds,
            error_detail,
            score,
            report_text,
            finished_at: chrono::Utc::now(),
        }
    }
}

/// Whole trimmed stdout as a number. Anything that is not a finite number
/// scores zero rather than leaving the submission unscored.
pub fn parse_score(stdout: &str) -> f64 {
    match stdout.trim().parse::<f64>() {
        Ok(score) if score.is_finite() => score,
        _ => {
            tracing::warn!(output = %stdout.trim(), "Grader output is not a number, scoring 0");
            0.0
        }
    }
}

fn render_capture(capture: &Capture, name: &str) -> String {
    let mut text = capture.text();
    if let (true, Some(limit)) = (capture.is_truncated(), capture.limit()) {
        if !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&format!("[{name} truncated after {limit} bytes]"));
    }
    text
}

fn build_report(
    success: bool,
    exit_code: i32,
    execution_time_seconds: f64,
    timed_out: bool,
    error_detail: Option<&str>,
    output: Option<&str>,
) -> String {
    let header = format!(
        "Status: {}\nExit code: {}\nExecution time: {:.2}s",
        if success { "SUCCESS" } else { "FAILURE" },
        exit_code,
        execution_time_seconds
    );
    let warning = timed_out.then(|| "WARNING: Execution timed out".to_string());
    let errors = error_detail.map(|detail| format!("Errors:\n{}", detail.trim_end()));
    let output = output.map(|output| format!("Output:\n{}", output.trim_end()));

    [Some(header), warning, errors, output]
        .into_iter()
        .flatten()
        .join("\n\n")
}
