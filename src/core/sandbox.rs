use std::path::{Path, PathBuf};

use crate::{
    constants::{
        GRADER_INTERPRETER, ORGANIZER_MOUNT, OUTPUT_MOUNT, PIDS_LIMIT, SANDBOX_USER,
        SCRATCH_MOUNT, SCRATCH_SIZE, SUBMISSION_MOUNT,
    },
    core::domain::{MemoryLimit, ResolvedRunConfig},
};

/// Isolation flags applied to every sandbox. Callers never choose these,
/// only the resource quantities in [`SandboxSpec`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsolationPolicy {
    pub network_disabled: bool,
    pub read_only_root: bool,
    pub no_new_privileges: bool,
    pub drop_all_capabilities: bool,
    pub user: String,
    pub pids_limit: u32,
    pub scratch: ScratchMount,
}

impl IsolationPolicy {
    pub fn strict() -> Self {
        Self {
            network_disabled: true,
            read_only_root: true,
            no_new_privileges: true,
            drop_all_capabilities: true,
            user: SANDBOX_USER.to_string(),
            pids_limit: PIDS_LIMIT,
            scratch: ScratchMount {
                target: SCRATCH_MOUNT.to_string(),
                size: SCRATCH_SIZE.to_string(),
            },
        }
    }
}

/// In-memory scratch directory, always mounted `noexec,nosuid`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScratchMount {
    pub target: String,
    pub size: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: String,
    pub read_only: bool,
}

/// Everything a launcher needs to start one sandboxed grading process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SandboxSpec {
    pub instance_name: String,
    pub image: String,
    pub policy: IsolationPolicy,
    pub cpus: u32,
    pub memory: MemoryLimit,
    /// Equal to `memory`, so the sandbox gets no extra swap.
    pub memory_swap: MemoryLimit,
    pub mounts: Vec<BindMount>,
    pub command: Vec<String>,
}

impl SandboxSpec {
    pub fn from_config(config: &ResolvedRunConfig) -> Self {
        let grader_path = Path::new(ORGANIZER_MOUNT).join(&config.grader_file_name);

        Self {
            instance_name: config.instance_name.clone(),
            image: config.image_name.clone(),
            policy: IsolationPolicy::strict(),
            cpus: config.cpu_limit.get(),
            memory: config.memory_limit.clone(),
            memory_swap: config.memory_limit.clone(),
            mounts: vec![
                BindMount {
                    source: host_path(&config.user_solution_path),
                    target: SUBMISSION_MOUNT.to_string(),
                    read_only: true,
                },
                BindMount {
                    source: host_path(&config.organizer_files_path),
                    target: ORGANIZER_MOUNT.to_string(),
                    read_only: true,
                },
                BindMount {
                    source: host_path(&config.output_path),
                    target: OUTPUT_MOUNT.to_string(),
                    read_only: false,
                },
            ],
            command: vec![
                GRADER_INTERPRETER.to_string(),
                grader_path.to_string_lossy().into_owned(),
                SUBMISSION_MOUNT.to_string(),
                OUTPUT_MOUNT.to_string(),
            ],
        }
    }

    /// Arguments for `docker run`, starting with the `run` subcommand.
    pub fn docker_run_args(&self) -> Vec<String> {
        let policy = &self.policy;
        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--name".into(),
            self.instance_name.clone(),
        ];

        if policy.network_disabled {
            args.extend(["--network".into(), "none".into()]);
        }
        if policy.read_only_root {
            args.push("--read-only".into());
        }
        args.extend([
            "--tmpfs".into(),
            format!(
                "{}:rw,noexec,nosuid,size={}",
                policy.scratch.target, policy.scratch.size
            ),
        ]);
        if policy.no_new_privileges {
            args.extend(["--security-opt".into(), "no-new-privileges".into()]);
        }
        if policy.drop_all_capabilities {
            args.extend(["--cap-drop".into(), "ALL".into()]);
        }
        args.extend([
            "--user".into(),
            policy.user.clone(),
            "--pids-limit".into(),
            policy.pids_limit.to_string(),
            "--cpus".into(),
            self.cpus.to_string(),
            "--memory".into(),
            self.memory.to_string(),
            "--memory-swap".into(),
            self.memory_swap.to_string(),
        ]);

        for mount in &self.mounts {
            let mut fields = vec![
                "type=bind".to_string(),
                mount_field("source", &mount.source.to_string_lossy()),
                mount_field("target", &mount.target),
            ];
            if mount.read_only {
                fields.push("readonly".to_string());
            }
            args.extend(["--mount".into(), fields.join(",")]);
        }

        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

// `--mount` is parsed as one CSV record, so a comma in a path has to be quoted.
fn mount_field(key: &str, value: &str) -> String {
    let field = format!("{key}={value}");
    if field.contains([',', '"']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field
    }
}

// Docker rejects relative bind sources.
fn host_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
