//! Wire DTOs for the approval endpoints and the ingest normalization step.

use chrono::{DateTime, Utc};
use procura_core::{LineItem, LineItemId, RequestId, Status};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One line item as the backend serves it. `item_id` is optional on the wire
/// because historic rows exist without one; normalization flags those.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLineItem {
    pub request_id: String,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub irq1_id: Option<String>,
    pub requester: String,
    pub budget_object_code: String,
    pub fund: String,
    pub location: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub line_total: Option<Decimal>,
    pub description: String,
    pub justification: String,
    pub status: Status,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Data-quality findings from one normalization pass. Synthesized keys are
/// unstable across refetches and will desynchronize any selection that holds
/// them, so every occurrence is recorded rather than silently tolerated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub synthesized_keys: Vec<String>,
    pub recomputed_totals: usize,
}

impl NormalizeReport {
    pub fn is_clean(&self) -> bool {
        self.synthesized_keys.is_empty() && self.recomputed_totals == 0
    }
}

/// Converts wire rows into domain line items.
///
/// Rows missing an identity key get a positional `row-<index>` key so one bad
/// row cannot blank the whole table, but each synthesis is logged at WARN and
/// reported back as a backend-contract defect. `line_total` is recomputed
/// whenever the served value is absent or disagrees with
/// `unit_price * quantity`, which must hold at rest.
pub fn normalize_items(raw: Vec<RawLineItem>) -> (Vec<LineItem>, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let mut items = Vec::with_capacity(raw.len());

    for (index, row) in raw.into_iter().enumerate() {
        let item_id = match row.item_id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => {
                let synthesized = format!("row-{index}");
                warn!(
                    event_name = "ingest.identity_synthesized",
                    request_id = %row.request_id,
                    row_index = index,
                    synthesized_key = %synthesized,
                    "backend served a line item without an identity key"
                );
                report.synthesized_keys.push(synthesized.clone());
                synthesized
            }
        };

        let expected_total = row.unit_price * Decimal::from(row.quantity);
        let line_total = match row.line_total {
            Some(total) if total == expected_total => total,
            _ => {
                report.recomputed_totals += 1;
                expected_total
            }
        };

        items.push(LineItem {
            request_id: RequestId(row.request_id),
            item_id: LineItemId(item_id),
            irq1_id: row.irq1_id,
            requester: row.requester,
            budget_object_code: row.budget_object_code,
            fund: row.fund,
            location: row.location,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_total,
            description: row.description,
            justification: row.justification,
            status: row.status,
            submitted_at: row.submitted_at.unwrap_or_else(Utc::now),
        });
    }

    (items, report)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Approve,
    Deny,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalBatchEntry {
    pub item_id: LineItemId,
    pub fund: String,
    pub line_total: Decimal,
    pub target_status: Status,
}

/// One batched approve/deny request. Atomic from the client's perspective:
/// either the backend accepts the whole batch or the client surfaces one
/// error and changes nothing locally.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalBatch {
    pub action: Action,
    pub items: Vec<ApprovalBatchEntry>,
}

impl ApprovalBatch {
    pub fn approve(items: &[LineItem]) -> Self {
        Self::build(items, Action::Approve, Status::Approved)
    }

    pub fn deny(items: &[LineItem]) -> Self {
        Self::build(items, Action::Deny, Status::Denied)
    }

    fn build(items: &[LineItem], action: Action, target_status: Status) -> Self {
        Self {
            action,
            items: items
                .iter()
                .map(|item| ApprovalBatchEntry {
                    item_id: item.item_id.clone(),
                    fund: item.fund.clone(),
                    line_total: item.line_total,
                    target_status,
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemComment {
    pub item_id: LineItemId,
    pub comment: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCommentPayload {
    pub group_key: RequestId,
    pub comments: Vec<ItemComment>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub item_id: LineItemId,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignIrq1Payload {
    pub request_id: RequestId,
    pub irq1_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignCoPayload {
    pub request_ids: Vec<RequestId>,
    pub contracting_officer: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementOfNeedRequest {
    pub request_id: RequestId,
    pub items: Vec<LineItem>,
}
