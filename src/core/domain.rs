use std::{
    fmt,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::constants::{DEFAULT_GRADER_FILE_NAME, DEFAULT_IMAGE_NAME};

/// Caller-supplied description of one grading run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub user_solution_path: PathBuf,
    pub organizer_files_path: PathBuf,
    pub output_path: PathBuf,
    pub cpu_limit: NonZeroU32,
    pub memory_limit: MemoryLimit,
    pub timeout_seconds: NonZeroU64,
    pub grader_file_name: Option<String>,
    pub image_name: Option<String>,
    pub instance_name: Option<String>,
}

impl RunConfig {
    pub fn resolve(self, defaults: &RunDefaults) -> ResolvedRunConfig {
        ResolvedRunConfig {
            user_solution_path: self.user_solution_path,
            organizer_files_path: self.organizer_files_path,
            output_path: self.output_path,
            cpu_limit: self.cpu_limit,
            memory_limit: self.memory_limit,
            timeout_seconds: self.timeout_seconds,
            grader_file_name: self
                .grader_file_name
                .unwrap_or_else(|| defaults.grader_file_name.clone()),
            image_name: self
                .image_name
                .unwrap_or_else(|| defaults.image_name.clone()),
            instance_name: self.instance_name.unwrap_or_else(generate_instance_name),
        }
    }
}

/// Values applied to the optional fields of a [`RunConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunDefaults {
    pub image_name: String,
    pub grader_file_name: String,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            image_name: DEFAULT_IMAGE_NAME.to_string(),
            grader_file_name: DEFAULT_GRADER_FILE_NAME.to_string(),
        }
    }
}

/// A [`RunConfig`] with every optional field filled in.
#[derive(Clone, Debug)]
pub struct ResolvedRunConfig {
    pub user_solution_path: PathBuf,
    pub organizer_files_path: PathBuf,
    pub output_path: PathBuf,
    pub cpu_limit: NonZeroU32,
    pub memory_limit: MemoryLimit,
    pub timeout_seconds: NonZeroU64,
    pub grader_file_name: String,
    pub image_name: String,
    pub instance_name: String,
}

impl ResolvedRunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.get())
    }
}

/// `grader-<utc timestamp>-<random token>`, valid as a container name.
pub fn generate_instance_name() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!(
        "grader-{}-{}",
        Utc::now().format("%Y%m%d%H%M%S%3f"),
        &token[..12]
    )
}

/// Docker-style memory quantity such as `512m` or `4g`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryLimit {
    quantity: String,
    bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryLimitError {
    #[error("memory limit is empty")]
    Empty,
    #[error("malformed memory limit: {0:?}")]
    Malformed(String),
    #[error("memory limit must be greater than zero")]
    Zero,
}

impl MemoryLimit {
    pub fn as_str(&self) -> &str {
        &self.quantity
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl FromStr for MemoryLimit {
    type Err = MemoryLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let quantity = s.trim().to_ascii_lowercase();
        let (digits, multiplier) = match quantity.char_indices().last() {
            None => return Err(MemoryLimitError::Empty),
            Some((idx, 'b')) => (&quantity[..idx], 1),
            Some((idx, 'k')) => (&quantity[..idx], 1 << 10),
            Some((idx, 'm')) => (&quantity[..idx], 1 << 20),
            Some((idx, 'g')) => (&quantity[..idx], 1 << 30),
            Some(_) => (quantity.as_str(), 1),
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MemoryLimitError::Malformed(s.to_string()));
        }
        let bytes = digits
            .parse::<u64>()
            .ok()
            .and_then(|value| value.checked_mul(multiplier))
            .ok_or_else(|| MemoryLimitError::Malformed(s.to_string()))?;
        if bytes == 0 {
            return Err(MemoryLimitError::Zero);
        }

        Ok(Self { quantity, bytes })
    }
}

impl fmt::Display for MemoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.quantity)
    }
}

/// Normalized outcome of one grading run. Built once, never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct RunResult {
    pub success: bool,
    pub exit_code: i32,
    pub timed_out: bool,
    pub execution_time_seconds: f64,
    pub error_detail: Option<String>,
    pub score: Option<f64>,
    pub report_text: String,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_config() -> RunConfig {
        RunConfig {
            user_solution_path: "/data/solutions/42".into(),
            organizer_files_path: "/data/organizer/7".into(),
            output_path: "/data/output/42".into(),
            cpu_limit: NonZeroU32::new(2).unwrap(),
            memory_limit: "4g".parse().unwrap(),
            timeout_seconds: NonZeroU64::new(300).unwrap(),
            grader_file_name: None,
            image_name: None,
            instance_name: None,
        }
    }

    #[test]
    fn test_memory_limit_units() {
        let cases = [
            ("512m", 512 * 1024 * 1024),
            ("4g", 4 * 1024 * 1024 * 1024),
            ("4G", 4 * 1024 * 1024 * 1024),
            ("64k", 64 * 1024),
            ("100b", 100),
            ("1048576", 1048576),
        ];

        for (input, bytes) in cases {
            let limit: MemoryLimit = input.parse().unwrap();
            assert_eq!(limit.bytes(), bytes, "input {input}");
        }
        assert_eq!("4G".parse::<MemoryLimit>().unwrap().as_str(), "4g");
    }

    #[test]
    fn test_memory_limit_rejects_garbage() {
        assert_eq!("".parse::<MemoryLimit>(), Err(MemoryLimitError::Empty));
        assert_eq!("0m".parse::<MemoryLimit>(), Err(MemoryLimitError::Zero));
        for input in ["m", "4x", "-4g", "4.5g", "4 g", "99999999999999999999g"] {
            assert!(
                matches!(
                    input.parse::<MemoryLimit>(),
                    Err(MemoryLimitError::Malformed(_))
                ),
                "input {input}"
            );
        }
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let resolved = create_config().resolve(&RunDefaults::default());

        assert_eq!(resolved.grader_file_name, DEFAULT_GRADER_FILE_NAME);
        assert_eq!(resolved.image_name, DEFAULT_IMAGE_NAME);
        assert!(resolved.instance_name.starts_with("grader-"));
        assert_eq!(resolved.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_resolve_keeps_caller_values() {
        let mut config = create_config();
        config.grader_file_name = Some("score.py".to_string());
        config.image_name = Some("custom:1".to_string());
        config.instance_name = Some("run-42".to_string());

        let resolved = config.resolve(&RunDefaults::default());

        assert_eq!(resolved.grader_file_name, "score.py");
        assert_eq!(resolved.image_name, "custom:1");
        assert_eq!(resolved.instance_name, "run-42");
    }

    #[test]
    fn test_generated_instance_names_are_unique() {
        let first = generate_instance_name();
        let second = generate_instance_name();

        assert_ne!(first, second);
        assert!(
            first
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        );
    }
}
