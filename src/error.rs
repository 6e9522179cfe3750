//! Error types used by the delivery engine and surveys.
//!
//! This module defines two enums:
//!
//! - [`Error`]: programming errors raised by the engine itself (illegal usage).
//! - [`SurveyError`]: error entries that appear in an answer sequence.
//!
//! Both provide `as_label` / `as_message` helpers for logs and metrics.
//! Event delivery never surfaces errors: preemption and teardown are recovered
//! internally and a LATEST drop is an intentional loss.

use thiserror::Error;

use crate::delivery::TopicId;

/// # Errors produced by the engine.
///
/// These fail fast and are never retried.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A handle created by another [`Hub`](crate::Hub) was used to post or ask.
    #[error("topic {topic} belongs to another hub")]
    ForeignHandle {
        /// Topic the handle points at.
        topic: TopicId,
    },
}

impl Error {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use handoff::{Error, TopicId};
    ///
    /// let err = Error::ForeignHandle { topic: TopicId::from_raw(7) };
    /// assert_eq!(err.as_label(), "foreign_handle");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::ForeignHandle { .. } => "foreign_handle",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            Error::ForeignHandle { topic } => {
                format!("illegal usage: topic {topic} is owned by another hub")
            }
        }
    }
}

/// # Error entries in a survey's answer sequence.
///
/// Every responder that was active when the question was asked contributes
/// exactly one element: an answer or one of these.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurveyError {
    /// The responder returned an error.
    #[error("responder failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// The responder panicked.
    #[error("responder panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },

    /// The responder's instance was destroyed under
    /// [`RecreatePolicy::Cancel`](crate::RecreatePolicy::Cancel), or the responder cancelled on its own.
    #[error("question cancelled")]
    Cancelled,

    /// A newer question replaced this one in a `Latest` queue before it was answered.
    #[error("question superseded by a newer one")]
    Superseded,

    /// The responder's retained identity was invalidated before it answered.
    #[error("responder disposed")]
    Disposed,
}

impl SurveyError {
    /// Shorthand for [`SurveyError::Failed`].
    ///
    /// # Example
    /// ```
    /// use handoff::SurveyError;
    ///
    /// let err = SurveyError::fail("no network");
    /// assert_eq!(err.to_string(), "responder failed: no network");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        SurveyError::Failed {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SurveyError::Failed { .. } => "survey_failed",
            SurveyError::Panicked { .. } => "survey_panicked",
            SurveyError::Cancelled => "survey_cancelled",
            SurveyError::Superseded => "survey_superseded",
            SurveyError::Disposed => "survey_disposed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SurveyError::Failed { error } => format!("error: {error}"),
            SurveyError::Panicked { info } => format!("panic: {info}"),
            SurveyError::Cancelled => "cancelled".to_string(),
            SurveyError::Superseded => "superseded".to_string(),
            SurveyError::Disposed => "disposed".to_string(),
        }
    }

    /// True if the responder never produced a result of its own
    /// (`Cancelled`, `Superseded`, `Disposed`).
    ///
    /// # Example
    /// ```
    /// use handoff::SurveyError;
    ///
    /// assert!(SurveyError::Superseded.is_interruption());
    /// assert!(!SurveyError::fail("boom").is_interruption());
    /// ```
    pub fn is_interruption(&self) -> bool {
        matches!(
            self,
            SurveyError::Cancelled | SurveyError::Superseded | SurveyError::Disposed
        )
    }
}
