//! Action-report lifecycle.
//!
//! `state_machine` holds the pure transition table and content checks,
//! `ledger` records review decisions on the report row, and `service`
//! wires both to the store and the policy evaluator.

pub mod ledger;
pub mod service;
pub mod state_machine;

use crate::errors::AppError;
use crate::models::action_report::ReportStatus;

pub use ledger::{record_review, ReviewDecision};
pub use service::{resolve_principal, ReportWorkflow};
pub use state_machine::{next_status, ReportEvent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("cannot {event} a report that is {from}")]
    InvalidTransition { from: ReportStatus, event: ReportEvent },
}

impl WorkflowError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(value: WorkflowError) -> Self {
        match value {
            WorkflowError::Unauthorized(message) => AppError::unauthorized(message),
            WorkflowError::Validation { field, message } => AppError::validation(field, message),
            err @ WorkflowError::InvalidTransition { .. } => AppError::conflict(err.to_string()),
        }
    }
}
