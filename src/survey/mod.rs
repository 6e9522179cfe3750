//! Surveys: one question broadcast to every responder, one answer back from each.
//!
//! - [`Survey`]: owned by a [`Hub`](crate::Hub); consumers `respond`, the hub asks;
//! - [`PublicSurvey`]: same, but anyone may ask;
//! - [`Poll`]: the producer half; [`Poll::ask`] returns a lazy [`Answers`] stream.
//!
//! What happens to a question whose responder's instance is torn down is
//! decided per responder by [`RecreatePolicy`](crate::RecreatePolicy).

mod poll;
mod questionnaire;
mod respond;

pub use poll::{Answers, Poll};
pub use respond::{PublicSurvey, Survey};
