//! Drag-and-drop stack reordering as an all-or-nothing transaction.
//!
//! ```text
//! Idle -> Dragging -> Processing -> Idle
//!                          \-> RollingBack -> Idle
//! ```
//!
//! A candidate ordering is trial-compiled before the stack is touched, so the session never
//! commits an ordering the engine rejected. Transactions are strictly sequential: a new drag
//! is refused until the previous one has been processed, and a transaction whose snapshot no
//! longer matches the session revision is discarded instead of committed.

use crate::{
    engine::EffectEngine,
    foundation::core::LayerId,
    model::Layer,
    session::LayerSession,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReorderState {
    Idle,
    Dragging,
    Processing,
    RollingBack,
}

/// Side of the drop target, in stack terms: `Above` lands on top of the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPosition {
    Above,
    Below,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// Candidate accepted; call [`ReorderTransaction::process`].
    Pending,
    /// Nothing to do; the transaction is back to idle (or was not dragging).
    Ignored,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReorderOutcome {
    Committed { order: Vec<LayerId> },
    RolledBack { reason: String },
    /// The stack changed underneath the transaction; nothing was applied.
    Superseded,
    /// `process` was called outside of `Processing`.
    NotProcessing,
}

struct Snapshot {
    source: LayerId,
    layers: Vec<Layer>,
    program_text: Option<String>,
    revision: u64,
}

type Notifier = Box<dyn FnMut(&str)>;

pub struct ReorderTransaction {
    state: ReorderState,
    snapshot: Option<Snapshot>,
    candidate: Option<Vec<LayerId>>,
    notifier: Option<Notifier>,
}

impl Default for ReorderTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl ReorderTransaction {
    pub fn new() -> Self {
        Self {
            state: ReorderState::Idle,
            snapshot: None,
            candidate: None,
            notifier: None,
        }
    }

    /// Called with the failure reason whenever a reorder is rolled back.
    pub fn with_notifier(mut self, notifier: impl FnMut(&str) + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn state(&self) -> ReorderState {
        self.state
    }

    /// Start dragging `layer`. Refused for the base layer, unknown layers, or while another
    /// transaction is in flight.
    pub fn drag_start<E: EffectEngine>(
        &mut self,
        session: &LayerSession<E>,
        layer: LayerId,
    ) -> bool {
        if self.state != ReorderState::Idle {
            tracing::debug!(state = ?self.state, "reorder already in flight; drag refused");
            return false;
        }
        let stack = session.stack();
        if stack.get(layer).is_none() || stack.base_id() == Some(layer) {
            return false;
        }
        self.snapshot = Some(Snapshot {
            source: layer,
            layers: session.layers(),
            program_text: session.program_text().map(str::to_string),
            revision: session.revision(),
        });
        self.state = ReorderState::Dragging;
        true
    }

    /// Drag released without a drop.
    pub fn drag_end(&mut self) {
        if self.state == ReorderState::Dragging {
            self.reset();
        }
    }

    /// Explicit abort, e.g. the escape key.
    pub fn cancel(&mut self) {
        self.drag_end();
    }

    /// Drop the dragged layer next to `target`.
    pub fn drop_on(&mut self, target: LayerId, position: DropPosition) -> DropOutcome {
        if self.state != ReorderState::Dragging {
            return DropOutcome::Ignored;
        }
        let Some(snapshot) = &self.snapshot else {
            self.reset();
            return DropOutcome::Ignored;
        };
        let order: Vec<LayerId> = snapshot.layers.iter().map(|l| l.id).collect();
        match reorder_candidate(&order, snapshot.source, target, position) {
            Some(candidate) => {
                self.candidate = Some(candidate);
                self.state = ReorderState::Processing;
                DropOutcome::Pending
            }
            None => {
                self.reset();
                DropOutcome::Ignored
            }
        }
    }

    /// Trial-compile the candidate and commit it, or roll back to the snapshot.
    pub fn process<E: EffectEngine>(&mut self, session: &mut LayerSession<E>) -> ReorderOutcome {
        if self.state != ReorderState::Processing {
            return ReorderOutcome::NotProcessing;
        }
        let (Some(snapshot), Some(candidate)) = (self.snapshot.take(), self.candidate.take())
        else {
            self.reset();
            return ReorderOutcome::NotProcessing;
        };

        if session.revision() != snapshot.revision {
            tracing::debug!(
                expected = snapshot.revision,
                actual = session.revision(),
                "stack changed during drag; discarding reorder"
            );
            self.reset();
            return ReorderOutcome::Superseded;
        }

        let candidate_layers = session.stack().arranged(&candidate);
        let text = session.build_dsl_from_layers(&candidate_layers);
        if let Err(e) = session.try_compile(&text) {
            return self.roll_back(session, snapshot, e.to_string());
        }

        let committed = session
            .commit_order(candidate.clone())
            .and_then(|()| session.rebuild(true));
        match committed {
            Ok(_) => {
                tracing::info!(order = ?candidate, "reorder committed");
                self.reset();
                ReorderOutcome::Committed { order: candidate }
            }
            Err(e) => self.roll_back(session, snapshot, e.to_string()),
        }
    }

    /// [`Self::drop_on`] followed by [`Self::process`] when the drop produced a candidate.
    pub fn drop_and_process<E: EffectEngine>(
        &mut self,
        session: &mut LayerSession<E>,
        target: LayerId,
        position: DropPosition,
    ) -> Option<ReorderOutcome> {
        match self.drop_on(target, position) {
            DropOutcome::Pending => Some(self.process(session)),
            DropOutcome::Ignored => None,
        }
    }

    fn roll_back<E: EffectEngine>(
        &mut self,
        session: &mut LayerSession<E>,
        snapshot: Snapshot,
        reason: String,
    ) -> ReorderOutcome {
        self.state = ReorderState::RollingBack;
        tracing::warn!(%reason, "reorder rejected; restoring previous stack");

        if let Err(e) = session.set_layers(snapshot.layers) {
            tracing::warn!(error = %e, "recompiling restored stack failed");
        } else if session.program_text() != snapshot.program_text.as_deref() {
            tracing::warn!("restored program differs from the pre-drag program");
        }
        if let Some(notify) = self.notifier.as_mut() {
            notify(&reason);
        }

        self.reset();
        ReorderOutcome::RolledBack { reason }
    }

    fn reset(&mut self) {
        self.snapshot = None;
        self.candidate = None;
        self.state = ReorderState::Idle;
    }
}

/// Move `source` next to `target` in a bottom-to-top ordering.
///
/// Returns `None` for degenerate moves: unknown ids, the base as source, or no change. The
/// base (index 0) always stays in place.
pub fn reorder_candidate(
    order: &[LayerId],
    source: LayerId,
    target: LayerId,
    position: DropPosition,
) -> Option<Vec<LayerId>> {
    if source == target || order.first() == Some(&source) {
        return None;
    }
    let mut next = order.to_vec();
    let from = next.iter().position(|&id| id == source)?;
    next.remove(from);
    let at = next.iter().position(|&id| id == target)?;
    let insert_at = match position {
        DropPosition::Above => at + 1,
        DropPosition::Below => at,
    }
    .max(1);
    next.insert(insert_at, source);
    (next != order).then_some(next)
}

#[cfg(test)]
#[path = "../tests/unit/reorder.rs"]
mod tests;
