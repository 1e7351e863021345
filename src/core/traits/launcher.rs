use std::io;

use tokio::io::AsyncRead;

use crate::core::sandbox::SandboxSpec;

pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Starts sandboxed processes. The only place where the host is asked to
/// spawn anything.
#[mockall::automock]
#[async_trait::async_trait]
pub trait SandboxLauncher: std::fmt::Debug + Send + Sync {
    async fn launch(&self, spec: &SandboxSpec) -> Result<Box<dyn SandboxProcess>, LaunchError>;
}

/// Handle to one running sandbox.
#[async_trait::async_trait]
pub trait SandboxProcess: Send {
    fn take_stdout(&mut self) -> Option<OutputStream>;

    fn take_stderr(&mut self) -> Option<OutputStream>;

    /// Waits for exit. Must be cancel safe: the supervisor drops this future
    /// whenever a timer fires and calls it again afterwards.
    async fn wait(&mut self) -> io::Result<i32>;

    /// Asks the process to stop (SIGTERM).
    fn terminate(&mut self) -> io::Result<()>;

    /// Stops the process unconditionally (SIGKILL).
    fn kill(&mut self) -> io::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to spawn {program}: {source}")]
    FailedToSpawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("sandbox process has no {0} pipe")]
    MissingStream(&'static str),
}
