//! The seam between the executor and the subsystems that perform actions.
//!
//! The executor never moves units or fires weapons itself. It hands an
//! [`ActionInvocation`] to an [`ActionDispatcher`] and, for blocking
//! actions, polls the returned [`InvocationHandle`] once per tick until the
//! collaborator reports completion.
//!
//! Handles are cheap to clone and thread-safe, so a collaborator running on
//! another thread can report completion without touching executor state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use stratagem_types::{ActionInvocation, ActionKind, EntityId};

/// Why a dispatch was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The collaborator refused the action.
    #[error("dispatch rejected: {message}")]
    Rejected {
        /// Collaborator-supplied reason.
        message: String,
    },

    /// The action's target no longer exists.
    #[error("target {target} no longer exists")]
    TargetMissing {
        /// The missing entity.
        target: EntityId,
    },
}

/// State of a dispatched action as reported by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    /// No report yet.
    Pending,
    /// The action finished successfully.
    Succeeded,
    /// The action failed.
    Failed,
}

const PENDING: u8 = 0;
const SUCCEEDED: u8 = 1;
const FAILED: u8 = 2;

/// Completion slot for one dispatched action.
///
/// The first call to [`completed`](Self::completed) wins; later reports
/// are ignored.
#[derive(Debug, Clone, Default)]
pub struct InvocationHandle {
    status: Arc<AtomicU8>,
}

impl InvocationHandle {
    /// A pending handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report completion. Returns `false` if a report was already made.
    pub fn completed(&self, success: bool) -> bool {
        let value = if success { SUCCEEDED } else { FAILED };
        self.status
            .compare_exchange(PENDING, value, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// The current status.
    pub fn status(&self) -> InvocationStatus {
        match self.status.load(Ordering::Acquire) {
            SUCCEEDED => InvocationStatus::Succeeded,
            FAILED => InvocationStatus::Failed,
            _ => InvocationStatus::Pending,
        }
    }

    /// Whether no report has been made yet.
    pub fn is_pending(&self) -> bool {
        self.status() == InvocationStatus::Pending
    }
}

/// Starts actions on behalf of the executor.
///
/// Implementations must not block: the executor calls them inside the
/// tick. Long-running work is started here and reported later through the
/// handle.
pub trait ActionDispatcher: Send {
    /// Start an action.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] if the action cannot be started. The
    /// executor marks the step failed and moves on.
    fn dispatch(&mut self, invocation: ActionInvocation) -> Result<InvocationHandle, DispatchError>;

    /// Stop an interruptible action whose plan was abandoned.
    fn cancel(&mut self, entity_id: EntityId, action: ActionKind, handle: &InvocationHandle) {
        let _ = (entity_id, action, handle);
    }
}

/// A dispatcher that records what it is asked to do.
///
/// Every dispatch succeeds unless the action was marked with
/// [`reject_action`](Self::reject_action). Handles stay pending until the
/// test completes them.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    /// Every invocation received, in order.
    pub invocations: Vec<ActionInvocation>,
    /// Handles returned, parallel to `invocations`.
    pub handles: Vec<InvocationHandle>,
    /// Cancellation requests, in order.
    pub cancelled: Vec<(EntityId, ActionKind)>,
    rejections: Vec<(ActionKind, String)>,
}

impl RecordingDispatcher {
    /// An empty recorder that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every future dispatch of `action` with `message`.
    pub fn reject_action(&mut self, action: ActionKind, message: &str) {
        self.rejections.push((action, message.to_owned()));
    }

    /// Report success on every pending handle.
    pub fn complete_all(&self) {
        for handle in &self.handles {
            handle.completed(true);
        }
    }

    /// The most recent handle, if any.
    pub fn last_handle(&self) -> Option<&InvocationHandle> {
        self.handles.last()
    }

    /// Actions dispatched so far, in order.
    pub fn actions(&self) -> Vec<ActionKind> {
        self.invocations.iter().map(|i| i.action).collect()
    }
}

impl ActionDispatcher for RecordingDispatcher {
    fn dispatch(&mut self, invocation: ActionInvocation) -> Result<InvocationHandle, DispatchError> {
        if let Some((_, message)) = self
            .rejections
            .iter()
            .find(|(action, _)| *action == invocation.action)
        {
            return Err(DispatchError::Rejected {
                message: message.clone(),
            });
        }
        let handle = InvocationHandle::new();
        self.invocations.push(invocation);
        self.handles.push(handle.clone());
        Ok(handle)
    }

    fn cancel(&mut self, entity_id: EntityId, action: ActionKind, _handle: &InvocationHandle) {
        self.cancelled.push((entity_id, action));
    }
}
