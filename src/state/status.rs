use serde::Serialize;
use std::fmt;

/// Lifecycle of an indexing or searching operation.
///
/// ```text
/// NotStarted -> InProgress -> Finished
///                          -> Failed
///                          -> Cancelling -> Cancelled | Failed
/// ```
///
/// `Cancelling` may also be entered straight from `NotStarted`. Single
/// operations collapse `Cancelling` and go straight to `Cancelled`; the
/// pass-through state only shows up in combined index+search reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    NotStarted,
    InProgress,
    Cancelling,
    Cancelled,
    Finished,
    Failed,
}

impl OperationStatus {
    pub const ALL: [OperationStatus; 6] = [
        OperationStatus::NotStarted,
        OperationStatus::InProgress,
        OperationStatus::Cancelling,
        OperationStatus::Cancelled,
        OperationStatus::Finished,
        OperationStatus::Failed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationStatus::Cancelled | OperationStatus::Finished | OperationStatus::Failed
        )
    }

    pub fn can_transition_to(self, next: OperationStatus) -> bool {
        use OperationStatus::*;
        match (self, next) {
            (NotStarted, InProgress | Cancelling | Cancelled | Finished | Failed) => true,
            (InProgress, Cancelling | Cancelled | Finished | Failed) => true,
            (Cancelling, Cancelled | Failed) => true,
            _ => false,
        }
    }

    /// Status of a combined index+search operation.
    ///
    /// A search is only legitimately running or finished once indexing has
    /// finished; any pairing implying otherwise is reported as `Failed`.
    pub fn combine(index: OperationStatus, search: OperationStatus) -> OperationStatus {
        use OperationStatus::*;
        match (search, index) {
            (Failed, _) | (_, Failed) => Failed,

            (NotStarted, Finished) => InProgress,
            (NotStarted, index) => index,

            (InProgress, Finished) => InProgress,
            (InProgress, _) => Failed,

            (Cancelling, Cancelled) => Cancelled,
            (Cancelling, _) => Cancelling,

            (Cancelled, _) => Cancelled,

            (Finished, Finished) => Finished,
            (Finished, Cancelled) => Cancelled,
            (Finished, _) => Failed,
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationStatus::NotStarted => "not started",
            OperationStatus::InProgress => "in progress",
            OperationStatus::Cancelling => "cancelling",
            OperationStatus::Cancelled => "cancelled",
            OperationStatus::Finished => "finished",
            OperationStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}
