use std::{io, os::unix::process::ExitStatusExt, process::Stdio};

use nix::{
    sys::signal::{self, Signal},
    unistd::Pid,
};
use tokio::process::{Child, Command};

use crate::core::traits::launcher::{LaunchError, OutputStream, SandboxProcess};

/// A host child process with piped stdout and stderr.
pub struct ChildProcess {
    child: Child,
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
}

impl ChildProcess {
    pub fn spawn(mut command: Command) -> Result<Self, LaunchError> {
        let program = command
            .as_std()
            .get_program()
            .to_string_lossy()
            .into_owned();

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::FailedToSpawn { program, source })?;

        let stdout = child
            .stdout
            .take()
            .ok_or(LaunchError::MissingStream("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(LaunchError::MissingStream("stderr"))?;

        Ok(Self {
            child,
            stdout: Some(Box::new(stdout)),
            stderr: Some(Box::new(stderr)),
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

impl std::fmt::Debug for ChildProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildProcess")
            .field("pid", &self.child.id())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl SandboxProcess for ChildProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take()
    }

    async fn wait(&mut self) -> io::Result<i32> {
        let status = self.child.wait().await?;
        // Shell convention for signal deaths: 128 + signal number.
        Ok(status
            .code()
            .or_else(|| status.signal().map(|signal| 128 + signal))
            .unwrap_or(-1))
    }

    fn terminate(&mut self) -> io::Result<()> {
        match self.child.id() {
            Some(pid) => signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
                .map_err(io::Error::from),
            None => Ok(()),
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }
}
