use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use crate::{
    core::{
        sandbox::SandboxSpec,
        traits::launcher::{LaunchError, OutputStream, SandboxLauncher, SandboxProcess},
    },
    host::process::ChildProcess,
};

/// Runs sandboxes as containers through the docker CLI.
#[derive(Clone, Debug)]
pub struct DockerLauncher {
    docker_bin: PathBuf,
}

impl DockerLauncher {
    pub fn new<T: AsRef<Path>>(docker_bin: T) -> Self {
        DockerLauncher {
            docker_bin: docker_bin.as_ref().into(),
        }
    }

    pub fn command(&self, spec: &SandboxSpec) -> Command {
        let mut command = Command::new(&self.docker_bin);
        command.args(spec.docker_run_args());
        command
    }
}

#[async_trait::async_trait]
impl SandboxLauncher for DockerLauncher {
    #[tracing::instrument(skip(self, spec), fields(instance = %spec.instance_name, image = %spec.image))]
    async fn launch(&self, spec: &SandboxSpec) -> Result<Box<dyn SandboxProcess>, LaunchError> {
        let process = ChildProcess::spawn(self.command(spec))?;
        tracing::debug!(
            pid = ?process.id(),
            cpus = spec.cpus,
            memory_bytes = spec.memory.bytes(),
            "Container client started"
        );

        Ok(Box::new(ContainerProcess {
            process,
            docker_bin: self.docker_bin.clone(),
            instance_name: spec.instance_name.clone(),
            exited: false,
        }))
    }
}

/// The `docker run` client process plus the name of the container it drives.
///
/// Dropping it before an exit was observed kills the container too, since
/// killing only the client leaves the container running.
#[derive(Debug)]
struct ContainerProcess {
    process: ChildProcess,
    docker_bin: PathBuf,
    instance_name: String,
    exited: bool,
}

impl ContainerProcess {
    fn kill_container(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(instance = %self.instance_name, "No runtime to run docker kill on");
            return;
        };

        let mut docker_kill = Command::new(&self.docker_bin);
        docker_kill
            .arg("kill")
            .arg(&self.instance_name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let instance = self.instance_name.clone();
        runtime.spawn(async move {
            match docker_kill.status().await {
                Ok(status) if status.success() => {
                    tracing::debug!(instance = %instance, "Container killed")
                }
                Ok(status) => {
                    tracing::debug!(instance = %instance, %status, "docker kill did not succeed")
                }
                Err(e) => tracing::warn!(instance = %instance, error = %e, "Failed to run docker kill"),
            }
        });
    }
}

impl Drop for ContainerProcess {
    fn drop(&mut self) {
        if !self.exited {
            tracing::warn!(instance = %self.instance_name, "Sandbox abandoned while running, killing container");
            self.kill_container();
        }
    }
}

#[async_trait::async_trait]
impl SandboxProcess for ContainerProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.process.take_stdout()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.process.take_stderr()
    }

    async fn wait(&mut self) -> io::Result<i32> {
        let status = self.process.wait().await;
        self.exited = status.is_ok();
        status
    }

    // `docker run` forwards SIGTERM to the container.
    fn terminate(&mut self) -> io::Result<()> {
        self.process.terminate()
    }

    // SIGKILL is not forwarded, so the container is killed by name as well.
    fn kill(&mut self) -> io::Result<()> {
        self.kill_container();
        self.process.kill()
    }
}
