//! Admission outcome classification.
//!
//! | Outcome                                   | Class     |
//! |-------------------------------------------|-----------|
//! | no error, `accepted == true`              | Success   |
//! | `Aborted`                                 | Permanent |
//! | `NotFound`                                | Permanent |
//! | `AlreadyExists`                           | Transient |
//! | any other code                            | Transient |
//! | no error, `accepted == false`             | Transient |
//!
//! The last row is a broker contract gap: a decline without a status code.
//! It is retried until the deadline.

use super::{BrokerError, StatusCode};
use crate::models::AdmissionResult;

/// What the requester should do after one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionClass {
    /// The connection was admitted.
    Success,
    /// The request can never succeed; stop retrying.
    Permanent,
    /// The request may succeed later; retry on the next tick.
    Transient,
}

impl std::fmt::Display for AdmissionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionClass::Success => write!(f, "SUCCESS"),
            AdmissionClass::Permanent => write!(f, "PERMANENT"),
            AdmissionClass::Transient => write!(f, "TRANSIENT"),
        }
    }
}

/// Classify the outcome of one admission attempt.
pub fn classify(outcome: &Result<AdmissionResult, BrokerError>) -> AdmissionClass {
    match outcome {
        Ok(result) if result.accepted => AdmissionClass::Success,
        Ok(_) => AdmissionClass::Transient,
        Err(err) => match err.code {
            StatusCode::Aborted | StatusCode::NotFound => AdmissionClass::Permanent,
            StatusCode::AlreadyExists | StatusCode::Other(_) => AdmissionClass::Transient,
        },
    }
}
