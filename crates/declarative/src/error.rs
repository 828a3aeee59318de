//! Errors raised by the reconciliation core

use crate::types::ApplyReport;

/// Errors that end a change or a run early
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A symbolic reference in a descriptor names nothing on the remote side
    #[error("unresolvable reference: no {kind} named '{name}'")]
    UnresolvableReference {
        /// What kind of entity was referenced (e.g. "team")
        kind: String,
        /// The symbolic name as declared
        name: String,
    },

    /// A failure that makes every later remote call pointless
    #[error("run aborted while applying {description}: {reason}")]
    Aborted {
        /// Change being applied when the run stopped
        description: String,
        /// Underlying failure
        reason: String,
        /// Every outcome recorded up to and including the aborted change
        report: Box<ApplyReport>,
    },
}

impl ReconcileError {
    pub fn unresolvable(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnresolvableReference {
            kind: kind.into(),
            name: name.into(),
        }
    }
}
