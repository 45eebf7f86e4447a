//! Interrupt (Ctrl+C) routing.
//!
//! An interrupt either becomes a cancellation request for the running task, when that
//! task declared it handles cancellation, or a forced exit of the whole session. The
//! decision is made on whatever thread observed the interrupt; the session loop is
//! woken through its event channel so it can stop without waiting for another key.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::shell::input::PumpMessage;

/// Flags shared between the session, the key reader and signal handlers.
#[derive(Debug, Default)]
pub struct CancelState {
    task_handles_cancel: AtomicBool,
    cancel_requested: AtomicBool,
    forced_exit: AtomicBool,
}

impl CancelState {
    /// Mark a task as running. Clears any cancellation left over from the previous one.
    pub fn begin_task(&self, handles_cancel: bool) {
        self.cancel_requested.store(false, Ordering::SeqCst);
        self.task_handles_cancel.store(handles_cancel, Ordering::SeqCst);
    }

    pub fn end_task(&self) {
        self.task_handles_cancel.store(false, Ordering::SeqCst);
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn forced_exit(&self) -> bool {
        self.forced_exit.load(Ordering::SeqCst)
    }

    /// Clear every flag so a new session run starts from a clean slate.
    pub fn reset(&self) {
        self.task_handles_cancel.store(false, Ordering::SeqCst);
        self.cancel_requested.store(false, Ordering::SeqCst);
        self.forced_exit.store(false, Ordering::SeqCst);
    }

    pub fn token(self: &Arc<Self>) -> CancelToken {
        CancelToken(Arc::clone(self))
    }
}

/// Read-only view handed to tasks so long-running work can stop early.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<CancelState>);

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.0.cancel_requested()
    }
}

/// What an interrupt turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The running task was asked to cancel; the session keeps going.
    Absorbed,
    ForcedExit,
}

#[derive(Debug, Clone)]
pub struct InterruptRouter {
    state: Arc<CancelState>,
    wake: UnboundedSender<PumpMessage>,
}

impl InterruptRouter {
    pub fn new(state: Arc<CancelState>, wake: UnboundedSender<PumpMessage>) -> Self {
        Self { state, wake }
    }

    /// Route one interrupt. Safe to call from any thread, any number of times.
    pub fn raise(&self) -> Interrupt {
        if self.state.task_handles_cancel.load(Ordering::SeqCst) {
            self.state.cancel_requested.store(true, Ordering::SeqCst);
            tracing::info!("interrupt absorbed by running task");
            return Interrupt::Absorbed;
        }
        if !self.state.forced_exit.swap(true, Ordering::SeqCst) {
            tracing::info!("interrupt forces session exit");
            let _ = self.wake.send(PumpMessage::Interrupt);
        }
        Interrupt::ForcedExit
    }

    pub fn forced_exit(&self) -> bool {
        self.state.forced_exit()
    }
}

/// Forward process-level Ctrl+C signals to `router` until the signal stream fails.
///
/// In raw mode the terminal reports Ctrl+C as a key instead; this covers the time a
/// task runs with the terminal in its normal mode.
pub async fn forward_ctrl_c(router: InterruptRouter) {
    while tokio::signal::ctrl_c().await.is_ok() {
        if router.raise() == Interrupt::ForcedExit {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_interrupt_without_task_forces_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let state = Arc::new(CancelState::default());
        let router = InterruptRouter::new(state.clone(), tx);

        assert_eq!(router.raise(), Interrupt::ForcedExit);
        assert!(state.forced_exit());
        assert!(matches!(rx.try_recv(), Ok(PumpMessage::Interrupt)));
    }

    #[test]
    fn test_repeated_interrupt_wakes_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let router = InterruptRouter::new(Arc::new(CancelState::default()), tx);

        router.raise();
        router.raise();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cancel_handling_task_absorbs_interrupt() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let state = Arc::new(CancelState::default());
        let router = InterruptRouter::new(state.clone(), tx);
        let token = state.token();

        state.begin_task(true);
        assert!(!token.is_cancelled());
        assert_eq!(router.raise(), Interrupt::Absorbed);
        assert!(token.is_cancelled());
        assert!(!state.forced_exit());
        assert!(rx.try_recv().is_err());

        state.end_task();
        state.begin_task(true);
        assert!(!token.is_cancelled(), "next task starts uncancelled");
    }

    #[test]
    fn test_task_without_cancel_support_forces_exit() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let state = Arc::new(CancelState::default());
        let router = InterruptRouter::new(state.clone(), tx);

        state.begin_task(false);
        assert_eq!(router.raise(), Interrupt::ForcedExit);
        assert!(state.forced_exit());
    }

    #[test]
    fn test_reset_clears_forced_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let state = Arc::new(CancelState::default());
        let router = InterruptRouter::new(state.clone(), tx);

        router.raise();
        assert!(state.forced_exit());
        state.reset();
        assert!(!state.forced_exit());
        assert!(!state.cancel_requested());

        assert_eq!(router.raise(), Interrupt::ForcedExit);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok(), "interrupt after reset wakes the loop again");
    }
}
