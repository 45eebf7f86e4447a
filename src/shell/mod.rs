//! Shell core module

pub mod buffer;
pub mod completer;
pub mod history;
pub mod input;
pub mod parser;
pub mod path;
pub mod terminal;

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use crossterm::style::Color;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use unicode_width::UnicodeWidthStr;

use crate::config::ConsoleConfig;
use crate::interrupt::{CancelState, InterruptRouter};
use crate::task::{Dispatch, Registry, RegistryError, Task};

use buffer::{LineBuffer, Render};
use completer::{Completion, DoublePress, PathCompleter};
use history::History;
use input::{InputPump, Key, KeySource, PumpMessage};
use terminal::Terminal;

const PROMPT_COLOR: Color = Color::DarkYellow;
const INFO_COLOR: Color = Color::Cyan;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// An exit task ran.
    Graceful,
    /// Interrupt with no task able to absorb it.
    Forced,
    /// The key source ran dry.
    InputClosed,
}

/// Interactive session state
pub struct Session<T: Terminal> {
    config: ConsoleConfig,
    terminal: T,
    buffer: LineBuffer,
    history: History,
    registry: Registry,
    completer: PathCompleter,
    double_press: DoublePress,
    /// Session working directory, independent of the process one
    cwd: PathBuf,
    /// Listing to print above the input line on the next render
    info: Option<String>,
    cancel: Arc<CancelState>,
    events_tx: UnboundedSender<PumpMessage>,
    events_rx: UnboundedReceiver<PumpMessage>,
    exit_requested: bool,
    on_exit: Option<Box<dyn FnOnce() + Send>>,
}

impl<T: Terminal> Session<T> {
    /// New session with the built-in tasks registered, rooted at the process cwd.
    pub fn new(config: ConsoleConfig, terminal: T) -> Result<Self> {
        let cwd = env::current_dir().context("cannot determine current directory")?;
        let registry = Registry::with_defaults()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            completer: PathCompleter::new(config.max_suggestions),
            double_press: DoublePress::new(config.double_press_window),
            config,
            terminal,
            buffer: LineBuffer::new(),
            history: History::new(),
            registry,
            cwd,
            info: None,
            cancel: Arc::new(CancelState::default()),
            events_tx,
            events_rx,
            exit_requested: false,
            on_exit: None,
        })
    }

    pub fn register(&mut self, task: Box<dyn Task>) -> Result<(), RegistryError> {
        self.registry.register(task)
    }

    /// Handle for delivering interrupts from outside the key reader (signal handlers).
    pub fn interrupt_router(&self) -> InterruptRouter {
        InterruptRouter::new(Arc::clone(&self.cancel), self.events_tx.clone())
    }

    /// Called once when [`Session::start`] returns.
    pub fn on_exit(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_exit = Some(Box::new(callback));
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn set_cwd(&mut self, cwd: impl Into<PathBuf>) {
        self.cwd = cwd.into();
    }

    pub fn buffer(&self) -> &LineBuffer {
        &self.buffer
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// An exit task has run.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Run the edit loop until an exit task runs, an interrupt forces exit or `keys`
    /// ends. The terminal is back in its normal mode when this returns.
    pub async fn start<K>(&mut self, keys: K) -> Result<ExitReason>
    where
        K: KeySource + 'static,
    {
        tracing::info!(prompt = %self.config.prompt, cwd = %self.cwd.display(), "session started");
        while self.events_rx.try_recv().is_ok() {}
        self.cancel.reset();
        self.exit_requested = false;

        let result = match self.terminal.enter_raw_mode() {
            Ok(()) => self.run(keys).await,
            Err(err) => Err(anyhow::Error::new(err).context("failed to enable raw mode")),
        };
        let restored = self.terminal.leave_raw_mode();

        match &result {
            Ok(reason) => tracing::info!(?reason, "session ended"),
            Err(err) => tracing::error!(error = %format!("{:#}", err), "session failed"),
        }
        if let Some(callback) = self.on_exit.take() {
            callback();
        }
        let reason = result?;
        restored.context("failed to restore terminal mode")?;
        Ok(reason)
    }

    async fn run<K>(&mut self, keys: K) -> Result<ExitReason>
    where
        K: KeySource + 'static,
    {
        let mut pump = InputPump::spawn(keys, self.events_tx.clone(), self.interrupt_router())
            .context("failed to start key reader")?;
        self.write_prompt()?;
        self.terminal.flush()?;

        let reason = loop {
            if self.cancel.forced_exit() {
                break ExitReason::Forced;
            }
            let Some(message) = self.events_rx.recv().await else {
                break ExitReason::InputClosed;
            };
            match message {
                PumpMessage::Key(key) => {
                    pump.dispatched();
                    self.handle_key(key, Instant::now())
                        .context("failed to update terminal")?;
                }
                PumpMessage::Interrupt => continue,
                PumpMessage::Closed => break ExitReason::InputClosed,
                PumpMessage::Failed(err) => {
                    pump.terminate();
                    return Err(anyhow::Error::new(err).context("failed to read key"));
                }
            }

            if self.cancel.forced_exit() {
                break ExitReason::Forced;
            }
            if self.exit_requested {
                break ExitReason::Graceful;
            }
            pump.release();
        };
        pump.terminate();
        Ok(reason)
    }

    /// Apply one key to the editor state and render the result.
    pub fn handle_key(&mut self, key: Key, now: Instant) -> io::Result<()> {
        let double = self.double_press.register(key, now);
        let render = match key {
            Key::Char(c) => self.buffer.insert(c),
            Key::Backspace => self.buffer.delete_backward(),
            Key::Delete => self.buffer.delete_forward(),
            Key::Left => self.buffer.move_left(),
            Key::Right => self.buffer.move_right(),
            Key::Up => match self.history.older() {
                Some(line) => self.buffer.load(line),
                None => Render::NONE,
            },
            Key::Down => match self.history.newer() {
                Some(line) => self.buffer.load(line),
                None => Render::NONE,
            },
            Key::Tab if double => self.complete(),
            Key::Tab | Key::Interrupt => Render::NONE,
            Key::Enter => return self.submit(),
        };
        self.render(render)
    }

    fn complete(&mut self) -> Render {
        match self.completer.complete(&mut self.buffer, &self.cwd) {
            Completion::Unchanged => Render::NONE,
            Completion::Replaced(_) => Render::LINE,
            Completion::Listing(listing) => {
                self.info = Some(listing);
                Render::LINE
            }
        }
    }

    fn render(&mut self, render: Render) -> io::Result<()> {
        if render == Render::NONE {
            return Ok(());
        }
        self.terminal.set_cursor_visible(false)?;
        if let Some(info) = self.info.take() {
            self.write_line()?;
            self.write_info(&info)?;
        }
        if render.redraw {
            self.write_line()?;
        }
        if render.reposition {
            let column = self.prompt().width() + self.buffer.before_cursor().width();
            self.terminal
                .move_to_column(u16::try_from(column).unwrap_or(u16::MAX))?;
        }
        self.terminal.set_cursor_visible(true)?;
        self.terminal.flush()
    }

    fn prompt(&self) -> String {
        format!("@{}> ", self.config.prompt)
    }

    fn write_prompt(&mut self) -> io::Result<()> {
        let prompt = self.prompt();
        self.terminal.set_foreground(PROMPT_COLOR)?;
        self.terminal.write_all(prompt.as_bytes())?;
        self.terminal.reset_color()
    }

    /// Prompt and buffer over a cleared line.
    fn write_line(&mut self) -> io::Result<()> {
        self.terminal.clear_line()?;
        self.write_prompt()?;
        self.terminal.write_all(self.buffer.as_str().as_bytes())
    }

    fn write_info(&mut self, info: &str) -> io::Result<()> {
        self.terminal.newline()?;
        self.terminal.set_foreground(INFO_COLOR)?;
        for line in info.lines() {
            self.terminal.write_all(line.as_bytes())?;
            self.terminal.newline()?;
        }
        self.terminal.reset_color()?;
        self.terminal.newline()
    }

    /// Enter: record the line, run it with the terminal in normal mode, then prompt again
    /// unless the session is ending.
    fn submit(&mut self) -> io::Result<()> {
        self.terminal.set_cursor_visible(false)?;
        self.write_line()?;
        self.terminal.newline()?;
        self.terminal.flush()?;

        let line = self.buffer.as_str().to_string();
        self.history.push(line.clone());
        self.buffer.clear();

        self.terminal.leave_raw_mode()?;
        self.execute_line(&line)?;
        self.terminal.enter_raw_mode()?;

        if !self.exit_requested && !self.cancel.forced_exit() {
            self.terminal.newline()?;
            self.write_prompt()?;
        }
        self.terminal.set_cursor_visible(true)?;
        self.terminal.flush()
    }

    /// Tokenize and dispatch one line, printing the failure report if there is one.
    pub fn execute_line(&mut self, line: &str) -> io::Result<Dispatch> {
        let command = parser::parse(line);
        let width = self.terminal.width();
        let outcome = self.registry.dispatch(
            &command,
            &mut self.cwd,
            &mut self.terminal,
            width,
            &self.cancel,
        );
        if let Some(report) = outcome.report() {
            writeln!(self.terminal, "{}", report)?;
        }
        if let Dispatch::Completed { exit: true, .. } = outcome {
            self.exit_requested = true;
        }
        self.terminal.flush()?;
        Ok(outcome)
    }

    /// Execute each line of a script. Empty lines and `#` comments are skipped.
    ///
    /// Returns the failed lines as `(line number, report)`. Stops early if a line exits.
    pub fn run_script(&mut self, script: &str) -> io::Result<Vec<(usize, String)>> {
        let mut failures = Vec::new();
        for (idx, line) in script.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let outcome = self.execute_line(line)?;
            if let Some(report) = outcome.report() {
                failures.push((idx + 1, report));
            }
            if self.exit_requested {
                break;
            }
        }
        Ok(failures)
    }
}
