use async_trait::async_trait;
use herd::*;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A command issued on an instance through [`MockRemote`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandRecord {
    pub instance: String,
    pub command: String,
    pub run_as_root: bool,
}

struct State {
    distro: String,
    commands: Vec<CommandRecord>,
    /// Keyed by `(instance, path)`.
    files: HashMap<(String, String), String>,
    /// Scripted outputs; the first pattern contained in a command wins.
    responses: Vec<(String, CommandOutput)>,
    failing: Vec<String>,
    unreachable: HashSet<String>,
    open: usize,
    opened: usize,
}

/// Connector handing out scripted, recording remotes.
///
/// Commands succeed with empty output unless scripted otherwise. `ls <path>`
/// succeeds only if a file was stored at `path` on that instance, and
/// `lsb_release -is` reports the configured distribution.
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<Mutex<State>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        Self::with_distro("Ubuntu")
    }

    pub fn with_distro(distro: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                distro: distro.to_string(),
                commands: Vec::new(),
                files: HashMap::new(),
                responses: Vec::new(),
                failing: Vec::new(),
                unreachable: HashSet::new(),
                open: 0,
                opened: 0,
            })),
        }
    }

    /// Reply to commands containing `pattern` with `output`.
    pub fn respond(&self, pattern: &str, output: CommandOutput) {
        self.state.lock().responses.push((pattern.to_string(), output));
    }

    /// Fail (exit status 1) every command containing `pattern`.
    pub fn fail_command(&self, pattern: &str) {
        self.state.lock().failing.push(pattern.to_string());
    }

    /// Refuse connections to the named instance.
    pub fn unreachable(&self, instance: &str) {
        self.state.lock().unreachable.insert(instance.to_string());
    }

    pub fn put_file(&self, instance: &str, path: &str, content: &str) {
        self.state
            .lock()
            .files
            .insert((instance.to_string(), path.to_string()), content.to_string());
    }

    pub fn file(&self, instance: &str, path: &str) -> Option<String> {
        self.state
            .lock()
            .files
            .get(&(instance.to_string(), path.to_string()))
            .cloned()
    }

    pub fn commands(&self) -> Vec<CommandRecord> {
        self.state.lock().commands.clone()
    }

    pub fn commands_for(&self, instance: &str) -> Vec<String> {
        self.state
            .lock()
            .commands
            .iter()
            .filter(|record| record.instance == instance)
            .map(|record| record.command.clone())
            .collect()
    }

    /// Whether any instance ran a command containing `pattern`.
    pub fn ran(&self, pattern: &str) -> bool {
        self.state
            .lock()
            .commands
            .iter()
            .any(|record| record.command.contains(pattern))
    }

    /// Instances that ran a command containing `pattern`.
    pub fn instances_that_ran(&self, pattern: &str) -> HashSet<String> {
        self.state
            .lock()
            .commands
            .iter()
            .filter(|record| record.command.contains(pattern))
            .map(|record| record.instance.clone())
            .collect()
    }

    /// Connections currently held open.
    pub fn open_connections(&self) -> usize {
        self.state.lock().open
    }

    pub fn connections_opened(&self) -> usize {
        self.state.lock().opened
    }
}

#[async_trait]
impl RemoteConnector for MockConnector {
    async fn connect(&self, instance: &Instance) -> anyhow::Result<Box<dyn Remote>> {
        let mut state = self.state.lock();
        if state.unreachable.contains(&instance.name) {
            anyhow::bail!("connection to {} refused", instance.name);
        }
        state.open += 1;
        state.opened += 1;
        Ok(Box::new(MockRemote {
            instance: instance.name.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

/// Remote handle returned by [`MockConnector`]; releases its connection on drop.
pub struct MockRemote {
    instance: String,
    state: Arc<Mutex<State>>,
}

impl Drop for MockRemote {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.open = state.open.saturating_sub(1);
    }
}

#[async_trait]
impl Remote for MockRemote {
    async fn run(&self, command: &str, run_as_root: bool) -> anyhow::Result<CommandOutput> {
        let mut state = self.state.lock();
        state.commands.push(CommandRecord {
            instance: self.instance.clone(),
            command: command.to_string(),
            run_as_root,
        });

        if let Some((_, output)) = state
            .responses
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
        {
            return Ok(output.clone());
        }
        if state.failing.iter().any(|pattern| command.contains(pattern.as_str())) {
            tracing::debug!(instance = %self.instance, command, "injecting command failure");
            return Ok(CommandOutput::failure(1, "injected failure"));
        }
        if command == "lsb_release -is" {
            return Ok(CommandOutput::success(format!("{}\n", state.distro)));
        }
        if let Some(path) = command.strip_prefix("ls ") {
            let key = (self.instance.clone(), path.trim().to_string());
            return Ok(if state.files.contains_key(&key) {
                CommandOutput::success(path)
            } else {
                CommandOutput::failure(2, format!("ls: cannot access '{path}': No such file or directory"))
            });
        }
        Ok(CommandOutput::success(""))
    }

    async fn read_file_from(&self, path: &str) -> anyhow::Result<String> {
        self.state
            .lock()
            .files
            .get(&(self.instance.clone(), path.to_string()))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{path} not found on {}", self.instance))
    }

    async fn write_file_to(&self, path: &str, content: &str, _run_as_root: bool) -> anyhow::Result<()> {
        self.state
            .lock()
            .files
            .insert((self.instance.clone(), path.to_string()), content.to_string());
        Ok(())
    }
}
