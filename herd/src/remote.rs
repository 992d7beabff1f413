use async_trait::async_trait;

use crate::topology::Instance;

/// Exit status and combined output of a remote command.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
        }
    }

    pub fn failure(exit_code: i32, stdout: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Options for [`Remote::execute_command`].
#[derive(Clone, Copy, Debug)]
pub struct ExecOptions {
    pub run_as_root: bool,
    /// Turn a non-zero exit code into an error.
    pub raise_when_error: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            run_as_root: false,
            raise_when_error: true,
        }
    }
}

impl ExecOptions {
    pub fn as_root() -> Self {
        Self {
            run_as_root: true,
            ..Self::default()
        }
    }

    pub fn unchecked() -> Self {
        Self {
            raise_when_error: false,
            ..Self::default()
        }
    }
}

/// An open connection to one instance.
///
/// Dropping the handle releases the connection, so it is released on every
/// exit path of the code holding it.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Run `command` and report its exit status without interpreting it.
    async fn run(&self, command: &str, run_as_root: bool) -> anyhow::Result<CommandOutput>;

    async fn read_file_from(&self, path: &str) -> anyhow::Result<String>;

    async fn write_file_to(&self, path: &str, content: &str, run_as_root: bool) -> anyhow::Result<()>;

    /// Run `command`, failing on a non-zero exit code when
    /// `opts.raise_when_error` is set.
    async fn execute_command(&self, command: &str, opts: ExecOptions) -> anyhow::Result<CommandOutput> {
        let output = self.run(command, opts.run_as_root).await?;
        if opts.raise_when_error && !output.is_success() {
            anyhow::bail!(
                "command `{command}` exited with status {}: {}",
                output.exit_code,
                output.stdout.trim()
            );
        }
        Ok(output)
    }
}

/// Opens remote connections to cluster instances.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, instance: &Instance) -> anyhow::Result<Box<dyn Remote>>;
}
