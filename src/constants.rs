use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "[::1]:50051";
pub const DEFAULT_DOCKER_BIN: &str = "docker";
pub const DEFAULT_IMAGE_NAME: &str = "hackathon-grader:latest";
pub const DEFAULT_GRADER_FILE_NAME: &str = "grade.py";

/// Interpreter baked into the default grading image.
pub const GRADER_INTERPRETER: &str = "python3";

pub const SUBMISSION_MOUNT: &str = "/submission";
pub const ORGANIZER_MOUNT: &str = "/organizer";
pub const OUTPUT_MOUNT: &str = "/output";

pub const SCRATCH_MOUNT: &str = "/tmp";
pub const SCRATCH_SIZE: &str = "64m";
pub const SANDBOX_USER: &str = "65534:65534";
pub const PIDS_LIMIT: u32 = 256;

pub const KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub const TIMEOUT_EXIT_CODE: i32 = 124;
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = -1;
