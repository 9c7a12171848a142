//! Two-stack undo/redo history with an explicit reentrancy guard.
//!
//! Entries are whole packet snapshots, stored by value; there is no diff
//! path. The phase machine admits at most one recording or replaying
//! operation at a time, and `before_replace` routes the pre-swap snapshot
//! by the active phase: the default path records to the undo stack and
//! clears redo, a replay feeds the opposite stack instead.

use thiserror::Error;

use crate::packet::DecodedPacket;

/// Which stack a replay draws its snapshot from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayDirection {
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum HistoryPhase {
    #[default]
    Idle,
    Recording,
    Replaying(ReplayDirection),
}

/// A recording or replay was requested while another one is active.
#[derive(Debug, Error)]
#[error("a history operation is already in progress")]
pub struct HistoryBusy;

#[derive(Debug, Default)]
pub(crate) struct HistoryManager {
    undo: Vec<DecodedPacket>,
    redo: Vec<DecodedPacket>,
    phase: HistoryPhase,
}

impl HistoryManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn phase(&self) -> HistoryPhase {
        self.phase
    }

    pub(crate) fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub(crate) fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Enter the Recording phase for a user edit.
    pub(crate) fn begin_recording(&mut self) -> Result<(), HistoryBusy> {
        if self.phase != HistoryPhase::Idle {
            return Err(HistoryBusy);
        }
        self.phase = HistoryPhase::Recording;
        Ok(())
    }

    /// Enter the Replaying phase, popping the snapshot to restore.
    ///
    /// Returns `Ok(None)` and stays Idle when the source stack is empty.
    /// Once popped, the snapshot belongs to the caller: if the replay
    /// fails, it is not pushed back.
    pub(crate) fn begin_replay(
        &mut self,
        direction: ReplayDirection,
    ) -> Result<Option<DecodedPacket>, HistoryBusy> {
        if self.phase != HistoryPhase::Idle {
            return Err(HistoryBusy);
        }
        let source = match direction {
            ReplayDirection::Undo => &mut self.undo,
            ReplayDirection::Redo => &mut self.redo,
        };
        let Some(snapshot) = source.pop() else {
            return Ok(None);
        };
        self.phase = HistoryPhase::Replaying(direction);
        Ok(Some(snapshot))
    }

    /// Route the pre-swap snapshot of a successful replacement.
    ///
    /// Must be called exactly once per replacement, while the phase that
    /// started the operation is still active.
    pub(crate) fn before_replace(&mut self, old: DecodedPacket) {
        match self.phase {
            HistoryPhase::Idle | HistoryPhase::Recording => {
                self.undo.push(old);
                self.redo.clear();
            }
            HistoryPhase::Replaying(ReplayDirection::Undo) => self.redo.push(old),
            HistoryPhase::Replaying(ReplayDirection::Redo) => self.undo.push(old),
        }
    }

    /// Return to Idle, whatever the outcome of the operation was.
    pub(crate) fn finish(&mut self) {
        self.phase = HistoryPhase::Idle;
    }

    /// Drop every snapshot from both stacks.
    pub(crate) fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
