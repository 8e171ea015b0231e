//! Single-consumer approval rendezvous (§4.7): the dispatcher blocks on
//! [`ApprovalGate::request`] when it hits a tool whose `approvalType` isn't
//! covered by the thread's auto-approve policy; the UI resolves it later from
//! another task via [`ApprovalGate::resolve`].

use std::collections::HashSet;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::tool_source::ApprovalType;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("a tool call is already awaiting approval on this thread")]
    AlreadyPending,
    #[error("no tool call is awaiting approval on this thread")]
    NoPendingApproval,
    #[error("the approval request was dropped before it was resolved")]
    Cancelled,
}

/// The UI's answer to a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject,
    /// Approve this call, and auto-approve every future call of the same
    /// `ApprovalType` on this thread without prompting again.
    ApproveAndEnableAuto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Rejected,
}

struct PendingApproval {
    approval_type: ApprovalType,
    sender: oneshot::Sender<ApprovalDecision>,
}

/// Per-thread approval state: at most one pending request, and a set of
/// `ApprovalType`s the user has already blanket-approved for that thread.
pub struct ApprovalGate {
    pending: DashMap<String, PendingApproval>,
    auto_approved: DashMap<String, HashSet<ApprovalType>>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            auto_approved: DashMap::new(),
        }
    }

    fn is_auto_approved(&self, thread_id: &str, approval_type: ApprovalType) -> bool {
        approval_type == ApprovalType::None
            || self
                .auto_approved
                .get(thread_id)
                .map(|set| set.contains(&approval_type))
                .unwrap_or(false)
    }

    /// Resolves immediately if `approval_type` is already covered by this
    /// thread's auto-approve policy; otherwise registers a pending approval
    /// and awaits [`ApprovalGate::resolve`]. Only one request may be pending
    /// per thread at a time.
    pub async fn request(&self, thread_id: &str, approval_type: ApprovalType) -> Result<ApprovalOutcome, ApprovalError> {
        if self.is_auto_approved(thread_id, approval_type) {
            return Ok(ApprovalOutcome::Approved);
        }
        if self.pending.contains_key(thread_id) {
            return Err(ApprovalError::AlreadyPending);
        }

        let (sender, receiver) = oneshot::channel();
        self.pending.insert(
            thread_id.to_string(),
            PendingApproval { approval_type, sender },
        );

        let decision = receiver.await.map_err(|_| ApprovalError::Cancelled)?;
        match decision {
            ApprovalDecision::Reject => Ok(ApprovalOutcome::Rejected),
            ApprovalDecision::Approve => Ok(ApprovalOutcome::Approved),
            ApprovalDecision::ApproveAndEnableAuto => {
                self.auto_approved
                    .entry(thread_id.to_string())
                    .or_default()
                    .insert(approval_type);
                Ok(ApprovalOutcome::Approved)
            }
        }
    }

    /// Resolves the single pending approval on `thread_id`.
    pub fn resolve(&self, thread_id: &str, decision: ApprovalDecision) -> Result<(), ApprovalError> {
        let (_, pending) = self
            .pending
            .remove(thread_id)
            .ok_or(ApprovalError::NoPendingApproval)?;
        pending.sender.send(decision).map_err(|_| ApprovalError::Cancelled)
    }

    pub fn has_pending(&self, thread_id: &str) -> bool {
        self.pending.contains_key(thread_id)
    }
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}
