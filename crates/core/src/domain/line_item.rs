use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineItemId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    NewRequest,
    PendingApproval,
    Approved,
    Denied,
    OnHold,
    Completed,
    Cancelled,
}

/// What a reviewer may do with an item in a given status. Derived from the
/// status alone; there is no per-item override.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub can_approve: bool,
    pub can_deny: bool,
    pub can_comment: bool,
    pub can_follow_up: bool,
}

impl Status {
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Status::NewRequest | Status::PendingApproval => Capabilities {
                can_approve: true,
                can_deny: true,
                can_comment: true,
                can_follow_up: true,
            },
            Status::OnHold => Capabilities {
                can_approve: false,
                can_deny: false,
                can_comment: true,
                can_follow_up: true,
            },
            Status::Approved => Capabilities {
                can_approve: false,
                can_deny: false,
                can_comment: true,
                can_follow_up: true,
            },
            Status::Denied | Status::Completed | Status::Cancelled => Capabilities {
                can_approve: false,
                can_deny: false,
                can_comment: true,
                can_follow_up: false,
            },
        }
    }

    /// Unit price may change only before the approve/deny decision lands.
    pub const fn price_editable(self) -> bool {
        matches!(self, Status::NewRequest | Status::PendingApproval)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub request_id: RequestId,
    pub item_id: LineItemId,
    pub irq1_id: Option<String>,
    pub requester: String,
    pub budget_object_code: String,
    pub fund: String,
    pub location: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub description: String,
    pub justification: String,
    pub status: Status,
    pub submitted_at: DateTime<Utc>,
}

/// Pre-edit price snapshot, kept so a rejected backend update can restore the
/// exact prior values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceEdit {
    pub prior_unit_price: Decimal,
    pub prior_line_total: Decimal,
}

impl LineItem {
    pub fn can_transition_to(&self, next: Status) -> bool {
        matches!(
            (self.status, next),
            (Status::NewRequest, Status::PendingApproval)
                | (Status::NewRequest, Status::Approved)
                | (Status::NewRequest, Status::Denied)
                | (Status::PendingApproval, Status::Approved)
                | (Status::PendingApproval, Status::Denied)
                | (Status::OnHold, Status::PendingApproval)
                | (Status::Approved, Status::Completed)
                | (_, Status::OnHold)
                | (_, Status::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: Status) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidStatusTransition { from: self.status, to: next })
    }

    /// Applies a unit-price edit, recomputing `line_total`, and returns the
    /// prior values for rollback. Rejected when the status no longer permits
    /// price changes or the price is negative.
    pub fn set_unit_price(&mut self, new_unit_price: Decimal) -> Result<PriceEdit, DomainError> {
        if !self.status.price_editable() {
            return Err(DomainError::PriceNotEditable {
                item_id: self.item_id.clone(),
                status: self.status,
            });
        }
        if new_unit_price < Decimal::ZERO {
            return Err(DomainError::NegativeUnitPrice {
                item_id: self.item_id.clone(),
                unit_price: new_unit_price,
            });
        }

        let edit = PriceEdit { prior_unit_price: self.unit_price, prior_line_total: self.line_total };
        self.unit_price = new_unit_price;
        self.line_total = new_unit_price * Decimal::from(self.quantity);
        Ok(edit)
    }

    /// Restores the price fields captured before an optimistic edit.
    pub fn revert_price(&mut self, edit: PriceEdit) {
        self.unit_price = edit.prior_unit_price;
        self.line_total = edit.prior_line_total;
    }

    /// IRQ1 references are assigned exactly once and immutable afterwards.
    pub fn assign_irq1(&mut self, irq1_id: impl Into<String>) -> Result<(), DomainError> {
        if self.irq1_id.is_some() {
            return Err(DomainError::Irq1AlreadyAssigned { request_id: self.request_id.clone() });
        }

        self.irq1_id = Some(irq1_id.into());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{LineItem, LineItemId, RequestId, Status};
    use crate::errors::DomainError;

    pub(crate) fn item(request_id: &str, item_id: &str, status: Status) -> LineItem {
        LineItem {
            request_id: RequestId(request_id.to_string()),
            item_id: LineItemId(item_id.to_string()),
            irq1_id: None,
            requester: "j.marshall".to_string(),
            budget_object_code: "3101".to_string(),
            fund: "GEN-2026".to_string(),
            location: "Records Annex".to_string(),
            quantity: 4,
            unit_price: Decimal::new(1250, 2),
            line_total: Decimal::new(5000, 2),
            description: "Toner cartridges".to_string(),
            justification: "Quarterly restock".to_string(),
            status,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn approve_and_deny_are_limited_to_actionable_statuses() {
        for status in [Status::NewRequest, Status::PendingApproval] {
            let caps = status.capabilities();
            assert!(caps.can_approve && caps.can_deny, "{status:?} should be actionable");
        }
        for status in
            [Status::Approved, Status::Denied, Status::OnHold, Status::Completed, Status::Cancelled]
        {
            let caps = status.capabilities();
            assert!(!caps.can_approve && !caps.can_deny, "{status:?} should not be actionable");
        }
    }

    #[test]
    fn price_edit_recomputes_line_total() {
        let mut item = item("R1", "A1", Status::PendingApproval);
        item.set_unit_price(Decimal::new(2000, 2)).expect("edit should be allowed");

        assert_eq!(item.unit_price, Decimal::new(2000, 2));
        assert_eq!(item.line_total, Decimal::new(8000, 2));
    }

    #[test]
    fn price_edit_rollback_restores_exact_prior_values() {
        let mut item = item("R1", "A1", Status::NewRequest);
        let before = item.clone();

        let edit = item.set_unit_price(Decimal::new(999, 2)).expect("edit should be allowed");
        item.revert_price(edit);

        assert_eq!(item.unit_price, before.unit_price);
        assert_eq!(item.line_total, before.line_total);
    }

    #[test]
    fn price_edit_is_rejected_after_decision() {
        let mut item = item("R1", "A1", Status::Approved);
        let error = item.set_unit_price(Decimal::ONE).expect_err("approved item is frozen");
        assert!(matches!(error, DomainError::PriceNotEditable { .. }));
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut item = item("R1", "A1", Status::NewRequest);
        let error = item.set_unit_price(Decimal::NEGATIVE_ONE).expect_err("negative price");
        assert!(matches!(error, DomainError::NegativeUnitPrice { .. }));
    }

    #[test]
    fn irq1_is_assign_once() {
        let mut item = item("R1", "A1", Status::PendingApproval);
        item.assign_irq1("IRQ1-77").expect("first assignment");

        let error = item.assign_irq1("IRQ1-78").expect_err("second assignment must fail");
        assert!(matches!(error, DomainError::Irq1AlreadyAssigned { .. }));
        assert_eq!(item.irq1_id.as_deref(), Some("IRQ1-77"));
    }

    #[test]
    fn lifecycle_transitions_follow_the_approval_flow() {
        let mut item = item("R1", "A1", Status::NewRequest);
        item.transition_to(Status::PendingApproval).expect("new -> pending");
        item.transition_to(Status::Approved).expect("pending -> approved");
        item.transition_to(Status::Completed).expect("approved -> completed");

        let error =
            item.transition_to(Status::Denied).expect_err("completed items cannot be denied");
        assert!(matches!(error, DomainError::InvalidStatusTransition { .. }));
    }
}
