use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::line_item::{LineItemId, RequestId, Status};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("invalid status transition from {from:?} to {to:?}")]
    InvalidStatusTransition { from: Status, to: Status },
    #[error("unit price of `{item_id:?}` is not editable in status {status:?}")]
    PriceNotEditable { item_id: LineItemId, status: Status },
    #[error("unit price of `{item_id:?}` cannot be negative (got {unit_price})")]
    NegativeUnitPrice { item_id: LineItemId, unit_price: Decimal },
    #[error("request `{request_id:?}` already carries an IRQ1 reference")]
    Irq1AlreadyAssigned { request_id: RequestId },
    #[error("group headers cannot be edited directly")]
    HeaderRowNotEditable,
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("backend rejected the operation: {0}")]
    Backend(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Short toast-safe wording; details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::PriceNotEditable { .. }) => {
                "This price can no longer be edited."
            }
            Self::Domain(DomainError::NegativeUnitPrice { .. }) => {
                "Unit price cannot be negative."
            }
            Self::Domain(DomainError::Irq1AlreadyAssigned { .. }) => {
                "An IRQ1 reference is already assigned."
            }
            Self::Domain(_) => "The request could not be processed. Check inputs and try again.",
            Self::Backend(_) => "The server rejected the operation. Please retry shortly.",
            Self::Transport(_) => "Connection to the server was lost. Please retry shortly.",
            Self::Configuration(_) => "The application is misconfigured. Contact an administrator.",
        }
    }
}
