use std::sync::Mutex;

use tokio::process::Command;

use crate::{
    core::{
        sandbox::SandboxSpec,
        traits::launcher::{LaunchError, SandboxLauncher, SandboxProcess},
    },
    host::process::ChildProcess,
};

/// Runs a host shell script in place of the container. No isolation at all,
/// it only stands in for the grading program.
///
/// The script sees the [`SandboxSpec`] through `SANDBOX_INSTANCE`, `SANDBOX_CPUS` and
/// `SANDBOX_MEMORY`.
#[derive(Debug)]
pub struct ShellLauncher {
    script: String,
    pids: Mutex<Vec<u32>>,
}

impl ShellLauncher {
    pub fn new(script: &str) -> Self {
        Self {
            script: script.to_string(),
            pids: Mutex::new(Vec::new()),
        }
    }

    /// Pids of every process launched so far.
    pub fn pids(&self) -> Vec<u32> {
        self.pids.lock().expect("pids lock poisoned").clone()
    }
}

#[async_trait::async_trait]
impl SandboxLauncher for ShellLauncher {
    #[tracing::instrument(skip(self, spec), fields(instance = %spec.instance_name))]
    async fn launch(&self, spec: &SandboxSpec) -> Result<Box<dyn SandboxProcess>, LaunchError> {
        tracing::debug!("Start stub sandbox: script={:?}", self.script);

        let mut command = Command::new("/bin/sh");
        command
            .arg("-c")
            .arg(&self.script)
            .env("SANDBOX_INSTANCE", &spec.instance_name)
            .env("SANDBOX_CPUS", spec.cpus.to_string())
            .env("SANDBOX_MEMORY", spec.memory.as_str());

        let process = ChildProcess::spawn(command)?;
        if let Some(pid) = process.id() {
            self.pids.lock().expect("pids lock poisoned").push(pid);
        }

        Ok(Box::new(process))
    }
}
