//! Tasks - the named commands a session can dispatch to

pub mod defaults;

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Once};

use thiserror::Error;

use crate::interrupt::{CancelState, CancelToken};
use crate::shell::parser::Command;

/// Help text for one argument of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentDescription {
    pub name: String,
    pub lines: Vec<String>,
}

/// Static metadata of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    /// Display name, used in error reports.
    pub name: String,
    /// Primary dispatch key.
    pub command: String,
    pub aliases: Vec<String>,
    pub description: Vec<String>,
    pub arguments: Vec<ArgumentDescription>,
    /// The task polls its cancel token, so an interrupt cancels it instead of the session.
    pub handles_cancel: bool,
    /// Successful execution ends the session.
    pub is_exit: bool,
}

impl TaskDescriptor {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            aliases: Vec::new(),
            description: Vec::new(),
            arguments: Vec::new(),
            handles_cancel: false,
            is_exit: false,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Append one line of description.
    pub fn description(mut self, line: impl Into<String>) -> Self {
        self.description.push(line.into());
        self
    }

    pub fn argument(mut self, name: impl Into<String>, lines: &[&str]) -> Self {
        self.arguments.push(ArgumentDescription {
            name: name.into(),
            lines: lines.iter().map(|l| l.to_string()).collect(),
        });
        self
    }

    pub fn cancellable(mut self) -> Self {
        self.handles_cancel = true;
        self
    }

    pub fn exits(mut self) -> Self {
        self.is_exit = true;
        self
    }

    /// Command followed by aliases.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.command.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Case-insensitive match on the command or any alias.
    pub fn matches(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.keys().any(|k| k.to_lowercase() == key)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("command '{key}' of task '{task}' is already registered by task '{existing}'")]
    Duplicate {
        key: String,
        task: String,
        existing: String,
    },
}

/// Missing or malformed task arguments.
///
/// Return it from [`Task::exec`] (through `anyhow`) to have the failure reported as an
/// argument error rather than a runtime error.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ArgumentError(pub String);

impl ArgumentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// What a task can reach while it runs.
pub struct TaskContext<'a> {
    pub cwd: &'a mut PathBuf,
    pub out: &'a mut dyn Write,
    pub width: u16,
    /// Descriptors of every registered task, in registration order.
    pub catalog: &'a [TaskDescriptor],
    pub cancel: CancelToken,
}

impl TaskContext<'_> {
    pub fn lookup(&self, key: &str) -> Option<&TaskDescriptor> {
        self.catalog.iter().find(|d| d.matches(key))
    }
}

/// A named command.
///
/// `parse` runs before every `exec` with the arguments of the submitted line. It must
/// not fail: store what is usable and let `exec` report what is missing.
pub trait Task: Send {
    fn describe(&self) -> TaskDescriptor;

    fn parse(&mut self, _arguments: &[String]) {}

    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Argument(String),
    Runtime(String),
}

impl Failure {
    pub fn message(&self) -> &str {
        match self {
            Failure::Argument(m) | Failure::Runtime(m) => m,
        }
    }
}

/// Outcome of dispatching one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Blank line.
    Empty,
    Unknown(String),
    Completed { task: String, exit: bool },
    Failed { task: String, failure: Failure },
}

impl Dispatch {
    pub fn is_success(&self) -> bool {
        matches!(self, Dispatch::Empty | Dispatch::Completed { .. })
    }

    /// Line reported to the user, if any.
    pub fn report(&self) -> Option<String> {
        match self {
            Dispatch::Unknown(_) => Some("> Unknown command".to_string()),
            Dispatch::Failed { task, failure } => {
                Some(format!("> {} error : {}", task, failure.message()))
            }
            Dispatch::Empty | Dispatch::Completed { .. } => None,
        }
    }
}

/// Registered tasks, keyed by lowercase command and alias.
#[derive(Default)]
pub struct Registry {
    tasks: Vec<Box<dyn Task>>,
    descriptors: Vec<TaskDescriptor>,
    keys: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tasks.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        defaults::register_all(&mut registry)?;
        Ok(registry)
    }

    pub fn register(&mut self, task: Box<dyn Task>) -> Result<(), RegistryError> {
        let descriptor = task.describe();
        let mut keys: Vec<String> = Vec::new();
        for key in descriptor.keys() {
            let key = key.to_lowercase();
            let existing = match self.keys.get(&key) {
                Some(&index) => Some(self.descriptors[index].name.clone()),
                None if keys.contains(&key) => Some(descriptor.name.clone()),
                None => None,
            };
            if let Some(existing) = existing {
                return Err(RegistryError::Duplicate {
                    key,
                    task: descriptor.name.clone(),
                    existing,
                });
            }
            keys.push(key);
        }

        let index = self.tasks.len();
        for key in keys {
            self.keys.insert(key, index);
        }
        tracing::debug!(task = %descriptor.name, command = %descriptor.command, "task registered");
        self.descriptors.push(descriptor);
        self.tasks.push(task);
        Ok(())
    }

    pub fn lookup(&self, action: &str) -> Option<&TaskDescriptor> {
        self.keys
            .get(&action.to_lowercase())
            .map(|&index| &self.descriptors[index])
    }

    pub fn descriptors(&self) -> &[TaskDescriptor] {
        &self.descriptors
    }

    /// Run the task named by `command`.
    ///
    /// Task failures, panics included, are returned as [`Dispatch::Failed`]; nothing a
    /// task does can unwind out of here.
    pub fn dispatch(
        &mut self,
        command: &Command,
        cwd: &mut PathBuf,
        out: &mut dyn Write,
        width: u16,
        cancel: &Arc<CancelState>,
    ) -> Dispatch {
        let Some(action) = command.action.as_deref() else {
            return Dispatch::Empty;
        };
        let Some(&index) = self.keys.get(&action.to_lowercase()) else {
            tracing::info!(action, "unknown command");
            return Dispatch::Unknown(action.to_string());
        };

        let descriptor = &self.descriptors[index];
        let task = &mut self.tasks[index];
        let mut ctx = TaskContext {
            cwd,
            out,
            width,
            catalog: &self.descriptors,
            cancel: cancel.token(),
        };

        tracing::debug!(task = %descriptor.name, args = ?command.arguments, "dispatching");
        cancel.begin_task(descriptor.handles_cancel);
        let result = {
            let _scope = TaskScope::enter();
            panic::catch_unwind(AssertUnwindSafe(|| {
                task.parse(&command.arguments);
                task.exec(&mut ctx)
            }))
        };
        cancel.end_task();

        let failure = match result {
            Ok(Ok(())) => {
                return Dispatch::Completed {
                    task: descriptor.name.clone(),
                    exit: descriptor.is_exit,
                };
            }
            Ok(Err(err)) => match err.downcast_ref::<ArgumentError>() {
                Some(arg) => Failure::Argument(arg.0.clone()),
                None => Failure::Runtime(format!("{:#}", err)),
            },
            Err(payload) => Failure::Runtime(panic_message(payload.as_ref())),
        };
        tracing::warn!(task = %descriptor.name, ?failure, "task failed");
        Dispatch::Failed {
            task: descriptor.name.clone(),
            failure,
        }
    }
}

thread_local! {
    static IN_TASK: Cell<bool> = const { Cell::new(false) };
}

/// Panics raised while a task runs go to the log; the dispatch report is what the user
/// sees. Every other panic reaches the previously installed hook.
fn install_task_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_TASK.with(Cell::get) {
                tracing::error!(target: "task.panic", %info, "task panicked");
            } else {
                previous(info);
            }
        }));
    });
}

/// Marks the current thread as running a task until dropped.
struct TaskScope;

impl TaskScope {
    fn enter() -> Self {
        install_task_panic_hook();
        IN_TASK.with(|flag| flag.set(true));
        TaskScope
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        IN_TASK.with(|flag| flag.set(false));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::parser;
    use pretty_assertions::assert_eq;

    struct Echo {
        words: Vec<String>,
    }

    impl Task for Echo {
        fn describe(&self) -> TaskDescriptor {
            TaskDescriptor::new("Echo", "echo").alias("say")
        }

        fn parse(&mut self, arguments: &[String]) {
            self.words = arguments.to_vec();
        }

        fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
            writeln!(ctx.out, "{}", self.words.join(" "))?;
            Ok(())
        }
    }

    struct Fails(bool);

    impl Task for Fails {
        fn describe(&self) -> TaskDescriptor {
            TaskDescriptor::new("Fails", "fails")
        }

        fn exec(&mut self, _ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
            if self.0 {
                return Err(ArgumentError::new("need a value").into());
            }
            anyhow::bail!("disk on fire")
        }
    }

    struct Panics;

    impl Task for Panics {
        fn describe(&self) -> TaskDescriptor {
            TaskDescriptor::new("Panics", "panics")
        }

        fn exec(&mut self, _ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
            panic!("boom")
        }
    }

    /// Records whether task panics were being kept off the terminal while it ran.
    struct ChecksScope(Arc<std::sync::atomic::AtomicBool>);

    impl Task for ChecksScope {
        fn describe(&self) -> TaskDescriptor {
            TaskDescriptor::new("Checks scope", "scope")
        }

        fn exec(&mut self, _ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
            self.0.store(IN_TASK.with(Cell::get), std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    fn echo() -> Box<dyn Task> {
        Box::new(Echo { words: Vec::new() })
    }

    fn run(registry: &mut Registry, line: &str) -> (Dispatch, String) {
        let mut cwd = PathBuf::from(".");
        let mut out = Vec::new();
        let cancel = Arc::new(CancelState::default());
        let outcome = registry.dispatch(&parser::parse(line), &mut cwd, &mut out, 80, &cancel);
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_dispatch_is_case_insensitive() {
        let mut registry = Registry::new();
        registry.register(echo()).unwrap();

        let (outcome, out) = run(&mut registry, "ECHO hello world");
        assert_eq!(
            outcome,
            Dispatch::Completed {
                task: "Echo".to_string(),
                exit: false
            }
        );
        assert_eq!(out, "hello world\n");

        let (_, out) = run(&mut registry, "Say hi");
        assert_eq!(out, "hi\n");
    }

    #[test]
    fn test_unknown_and_empty() {
        let mut registry = Registry::new();
        let (outcome, _) = run(&mut registry, "nope");
        assert_eq!(outcome, Dispatch::Unknown("nope".to_string()));
        assert_eq!(outcome.report().as_deref(), Some("> Unknown command"));
        assert!(!outcome.is_success());

        let (outcome, _) = run(&mut registry, "   ");
        assert_eq!(outcome, Dispatch::Empty);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_duplicate_command_is_rejected() {
        let mut registry = Registry::new();
        registry.register(echo()).unwrap();
        let err = registry.register(echo()).unwrap_err();
        assert_eq!(
            err,
            RegistryError::Duplicate {
                key: "echo".to_string(),
                task: "Echo".to_string(),
                existing: "Echo".to_string(),
            }
        );
        assert_eq!(registry.descriptors().len(), 1);
    }

    #[test]
    fn test_alias_colliding_with_command_differing_in_case() {
        struct Shout;
        impl Task for Shout {
            fn describe(&self) -> TaskDescriptor {
                TaskDescriptor::new("Shout", "shout").alias("ECHO")
            }
            fn exec(&mut self, _ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let mut registry = Registry::new();
        registry.register(echo()).unwrap();
        assert!(matches!(
            registry.register(Box::new(Shout)),
            Err(RegistryError::Duplicate { ref key, .. }) if key == "echo"
        ));
        // The rejected task left nothing behind.
        assert!(registry.lookup("shout").is_none());
    }

    #[test]
    fn test_alias_repeating_own_command() {
        struct Twice;
        impl Task for Twice {
            fn describe(&self) -> TaskDescriptor {
                TaskDescriptor::new("Twice", "twice").alias("Twice")
            }
            fn exec(&mut self, _ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let mut registry = Registry::new();
        assert!(registry.register(Box::new(Twice)).is_err());
    }

    #[test]
    fn test_argument_and_runtime_errors() {
        let mut registry = Registry::new();
        registry.register(Box::new(Fails(true))).unwrap();
        let (outcome, _) = run(&mut registry, "fails");
        assert_eq!(
            outcome,
            Dispatch::Failed {
                task: "Fails".to_string(),
                failure: Failure::Argument("need a value".to_string()),
            }
        );
        assert_eq!(outcome.report().as_deref(), Some("> Fails error : need a value"));

        let mut registry = Registry::new();
        registry.register(Box::new(Fails(false))).unwrap();
        let (outcome, _) = run(&mut registry, "fails");
        assert_eq!(
            outcome.report().as_deref(),
            Some("> Fails error : disk on fire")
        );
    }

    #[test]
    fn test_panic_becomes_runtime_error() {
        let mut registry = Registry::new();
        registry.register(Box::new(Panics)).unwrap();
        let (outcome, _) = run(&mut registry, "panics");
        assert_eq!(
            outcome,
            Dispatch::Failed {
                task: "Panics".to_string(),
                failure: Failure::Runtime("boom".to_string()),
            }
        );
    }

    #[test]
    fn test_lookup_by_alias() {
        let mut registry = Registry::new();
        registry.register(echo()).unwrap();
        assert_eq!(registry.lookup("SAY").map(|d| d.command.as_str()), Some("echo"));
        assert!(registry.lookup("nothing").is_none());
    }

    #[test]
    fn test_task_panics_are_routed_to_the_log() {
        let seen = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut registry = Registry::new();
        registry.register(Box::new(ChecksScope(Arc::clone(&seen)))).unwrap();
        registry.register(Box::new(Panics)).unwrap();

        run(&mut registry, "scope");
        assert!(seen.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!IN_TASK.with(Cell::get));

        let (outcome, _) = run(&mut registry, "panics");
        assert!(!outcome.is_success());
        assert!(!IN_TASK.with(Cell::get), "scope left set after a panic");
    }
}
