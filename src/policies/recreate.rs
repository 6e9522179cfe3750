//! # Recreate policies for survey responders.
//!
//! [`RecreatePolicy`] decides what happens to a question whose responder was
//! interrupted because its consumer instance was destroyed.
//!
//! - [`RecreatePolicy::Rerun`] keep the question; the next instance bound to the same
//!   retained identity runs it again (default).
//! - [`RecreatePolicy::Cancel`] record [`SurveyError::Cancelled`](crate::SurveyError::Cancelled)
//!   for that responder and move on.
//!
//! The policy only applies to teardown:
//! ```text
//! responder answered / returned Err   → settled, never rerun
//! newer question (Latest)             → Superseded, newer one proceeds
//! receiver replaced while running     → retried against the new receiver
//! instance destroyed while running    → Rerun | Cancel
//! ```

/// Policy for questions in flight across a destroy/recreate boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RecreatePolicy {
    /// Re-issue the question to the recreated instance (default).
    #[default]
    Rerun,
    /// Settle the question as cancelled; no retry.
    Cancel,
}

impl RecreatePolicy {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            RecreatePolicy::Rerun => "rerun",
            RecreatePolicy::Cancel => "cancel",
        }
    }
}
