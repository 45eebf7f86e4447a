//! Key input for the session loop
//!
//! A dedicated reader thread waits on the terminal and hands keys to the session one
//! at a time: after sending a key it waits until the session releases it, so there is
//! never more than one unprocessed key in flight. Ctrl+C bypasses the handshake and
//! goes straight to the interrupt router.
//!
//! The reader waits for input in slices of [`READ_POLL`]. Between slices it stops once
//! the session has been forced to exit or its [`InputPump`] was dropped, so a finished
//! session does not keep consuming keys meant for the host or a later session.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::interrupt::InterruptRouter;

/// A key the editor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Left,
    Right,
    Up,
    Down,
    Enter,
    Tab,
    Backspace,
    Delete,
    /// Ctrl+C.
    Interrupt,
}

impl Key {
    /// Map a crossterm key event; `None` for releases and keys the editor ignores.
    pub fn from_event(key: KeyEvent) -> Option<Key> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => Some(Key::Interrupt),
            KeyCode::Char(_) if ctrl || key.modifiers.contains(KeyModifiers::ALT) => None,
            KeyCode::Char(c) => Some(Key::Char(c)),
            KeyCode::Left => Some(Key::Left),
            KeyCode::Right => Some(Key::Right),
            KeyCode::Up => Some(Key::Up),
            KeyCode::Down => Some(Key::Down),
            KeyCode::Enter => Some(Key::Enter),
            KeyCode::Tab => Some(Key::Tab),
            KeyCode::Backspace => Some(Key::Backspace),
            KeyCode::Delete => Some(Key::Delete),
            _ => None,
        }
    }
}

/// How long the reader waits for a key before checking whether it should stop.
pub const READ_POLL: Duration = Duration::from_millis(100);

/// Result of one wait on a [`KeySource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRead {
    Key(Key),
    /// Nothing arrived within the timeout.
    Idle,
    /// The input has ended.
    Closed,
}

/// Source of keys for the reader thread.
pub trait KeySource: Send {
    /// Wait up to `timeout` for the next key.
    fn read_key(&mut self, timeout: Duration) -> io::Result<KeyRead>;
}

/// Keys from the real terminal. The terminal must be in raw mode.
pub struct CrosstermKeys;

impl KeySource for CrosstermKeys {
    fn read_key(&mut self, timeout: Duration) -> io::Result<KeyRead> {
        if !event::poll(timeout)? {
            return Ok(KeyRead::Idle);
        }
        if let Event::Key(key) = event::read()? {
            if let Some(key) = Key::from_event(key) {
                return Ok(KeyRead::Key(key));
            }
        }
        Ok(KeyRead::Idle)
    }
}

/// Messages delivered to the session loop.
#[derive(Debug)]
pub enum PumpMessage {
    Key(Key),
    /// Wake-up after an interrupt that forces the session to stop.
    Interrupt,
    /// The key source reached its end.
    Closed,
    Failed(io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    /// The reader may produce a key.
    Reading,
    /// A key was handed over and is being processed.
    Dispatched,
    Terminated,
}

/// Session side of the reader thread.
pub struct InputPump {
    resume: UnboundedSender<()>,
    state: PumpState,
    stopped: Arc<AtomicBool>,
}

impl InputPump {
    /// Start the reader thread. Keys and end-of-input are sent on `events`.
    pub fn spawn<K>(
        keys: K,
        events: UnboundedSender<PumpMessage>,
        interrupts: InterruptRouter,
    ) -> io::Result<Self>
    where
        K: KeySource + 'static,
    {
        let (resume_tx, resume_rx) = mpsc::unbounded_channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let reader = Reader {
            events,
            resume: resume_rx,
            interrupts,
            stopped: Arc::clone(&stopped),
        };
        thread::Builder::new()
            .name("key-reader".to_string())
            .spawn(move || reader.run(keys))?;
        Ok(Self {
            resume: resume_tx,
            state: PumpState::Reading,
            stopped,
        })
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    /// A key was received from the reader.
    pub fn dispatched(&mut self) {
        self.state = PumpState::Dispatched;
    }

    /// Processing finished; let the reader produce the next key.
    pub fn release(&mut self) {
        if self.state != PumpState::Dispatched {
            return;
        }
        if self.resume.send(()).is_ok() {
            self.state = PumpState::Reading;
        } else {
            self.state = PumpState::Terminated;
        }
    }

    /// Stop the reader at its next poll.
    pub fn terminate(&mut self) {
        self.state = PumpState::Terminated;
        self.stopped.store(true, Ordering::SeqCst);
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Reader thread side of the pump.
struct Reader {
    events: UnboundedSender<PumpMessage>,
    resume: UnboundedReceiver<()>,
    interrupts: InterruptRouter,
    stopped: Arc<AtomicBool>,
}

impl Reader {
    fn should_stop(&self) -> bool {
        self.stopped.load(Ordering::SeqCst) || self.interrupts.forced_exit()
    }

    fn run<K: KeySource>(mut self, mut keys: K) {
        while !self.should_stop() {
            match keys.read_key(READ_POLL) {
                Ok(KeyRead::Idle) => {}
                // Read after the session let go of the pump; dropped.
                Ok(KeyRead::Key(_)) if self.should_stop() => break,
                Ok(KeyRead::Key(Key::Interrupt)) => {
                    self.interrupts.raise();
                }
                Ok(KeyRead::Key(key)) => {
                    if self.events.send(PumpMessage::Key(key)).is_err() {
                        break;
                    }
                    if self.resume.blocking_recv().is_none() {
                        break;
                    }
                }
                Ok(KeyRead::Closed) => {
                    let _ = self.events.send(PumpMessage::Closed);
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "key reader failed");
                    let _ = self.events.send(PumpMessage::Failed(err));
                    break;
                }
            }
        }
        tracing::debug!("key reader stopped");
    }
}

/// Replays a fixed list of keys, then reports end of input.
#[cfg(test)]
pub(crate) struct ScriptedKeys(std::collections::VecDeque<Key>);

#[cfg(test)]
impl ScriptedKeys {
    pub(crate) fn new(keys: impl IntoIterator<Item = Key>) -> Self {
        Self(keys.into_iter().collect())
    }

    /// `\n` is Enter and `\t` is Tab.
    pub(crate) fn typed(text: &str) -> Self {
        Self::new(text.chars().map(|c| match c {
            '\n' => Key::Enter,
            '\t' => Key::Tab,
            c => Key::Char(c),
        }))
    }
}

#[cfg(test)]
impl KeySource for ScriptedKeys {
    fn read_key(&mut self, _timeout: Duration) -> io::Result<KeyRead> {
        Ok(self.0.pop_front().map_or(KeyRead::Closed, KeyRead::Key))
    }
}

/// Keys fed from another thread; waits like a terminal with nobody typing.
/// Sets the shared flag when the reader thread drops it.
#[cfg(test)]
pub(crate) struct ChannelKeys {
    keys: std::sync::mpsc::Receiver<Key>,
    dropped: Arc<AtomicBool>,
}

#[cfg(test)]
impl ChannelKeys {
    pub(crate) fn new() -> (std::sync::mpsc::Sender<Key>, Arc<AtomicBool>, Self) {
        let (tx, rx) = std::sync::mpsc::channel();
        let dropped = Arc::new(AtomicBool::new(false));
        let keys = Self {
            keys: rx,
            dropped: Arc::clone(&dropped),
        };
        (tx, dropped, keys)
    }
}

#[cfg(test)]
impl KeySource for ChannelKeys {
    fn read_key(&mut self, timeout: Duration) -> io::Result<KeyRead> {
        use std::sync::mpsc::RecvTimeoutError;
        match self.keys.recv_timeout(timeout) {
            Ok(key) => Ok(KeyRead::Key(key)),
            Err(RecvTimeoutError::Timeout) => Ok(KeyRead::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(KeyRead::Closed),
        }
    }
}

#[cfg(test)]
impl Drop for ChannelKeys {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

/// Poll `flag` until it is set or two seconds pass.
#[cfg(test)]
pub(crate) fn wait_for(flag: &AtomicBool) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if flag.load(Ordering::SeqCst) {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    flag.load(Ordering::SeqCst)
}
