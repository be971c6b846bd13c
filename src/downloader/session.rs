// Download session state, one atomic phase instead of separate flags

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Running,
    Paused,
    /// Cancel requested; the owning operation resets to `Idle` when it unwinds
    Cancelled,
}

impl SessionPhase {
    fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Paused => 2,
            Self::Cancelled => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Paused,
            3 => Self::Cancelled,
            _ => Self::Idle,
        }
    }
}

/// Lifecycle of the single download a controller owns.
///
/// Every transition is a compare-and-swap, so pause/cancel requests coming
/// from another task never interleave with the owner's own updates.
#[derive(Debug)]
pub struct SessionState {
    phase: AtomicU8,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(SessionPhase::Idle.to_u8()),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn transition(&self, from: SessionPhase, to: SessionPhase) -> bool {
        self.phase
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Idle -> Running; `false` when another session is active
    pub fn try_start(&self) -> bool {
        self.transition(SessionPhase::Idle, SessionPhase::Running)
    }

    /// Running -> Paused
    pub fn mark_paused(&self) -> bool {
        self.transition(SessionPhase::Running, SessionPhase::Paused)
    }

    /// Paused -> Running
    pub fn mark_resumed(&self) -> bool {
        self.transition(SessionPhase::Paused, SessionPhase::Running)
    }

    /// Running or Paused -> Cancelled. Returns the phase it replaced.
    pub fn request_cancel(&self) -> Option<SessionPhase> {
        let mut current = self.phase.load(Ordering::SeqCst);
        loop {
            let phase = SessionPhase::from_u8(current);
            if !matches!(phase, SessionPhase::Running | SessionPhase::Paused) {
                return None;
            }
            match self.phase.compare_exchange(
                current,
                SessionPhase::Cancelled.to_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Some(phase),
                Err(actual) => current = actual,
            }
        }
    }

    /// Back to Idle after a terminal transition
    pub fn reset(&self) {
        self.phase.store(SessionPhase::Idle.to_u8(), Ordering::SeqCst);
    }

    /// Running or paused
    pub fn is_running(&self) -> bool {
        matches!(self.phase(), SessionPhase::Running | SessionPhase::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.phase() == SessionPhase::Paused
    }

    pub fn is_cancelled(&self) -> bool {
        self.phase() == SessionPhase::Cancelled
    }
}
